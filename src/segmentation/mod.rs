pub mod pos_filter;
pub mod sentencizer;
pub mod token_models;
pub mod tokenizer;

pub use pos_filter::PosFilter;
pub use sentencizer::{
    sentencize,
    N_LINES_PER_CHUNK,
};
pub use token_models::Morpheme;
pub use tokenizer::{
    init_vibrato,
    Lemmatizer,
    VibratoLemmatizer,
};
