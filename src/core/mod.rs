pub mod errors;
pub mod http;
pub mod models;
pub mod utils;

pub use errors::BookToCardsError;
pub use models::{
    DocStats,
    ItemKind,
    ItemQuery,
    KanjiRecord,
    KbItem,
    SeqId,
    SequenceRecord,
    SourceRecord,
    TokenRecord,
};
