use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookToCardsError {
    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Reqwest error: {0}")]
    Reqwest(Box<reqwest::Error>),

    #[error("Vibrato error: {0}")]
    Vibrato(Box<vibrato::errors::VibratoError>),

    #[error("Cache encoding error: {0}")]
    Cache(String),

    #[error("index.json must have either 'format' or 'version'")]
    MissingVersion,

    #[error("No processed dictionary found at {0}")]
    NoProcessedDictionary(String),

    #[error("No knowledge base file at {0}")]
    NoKnowledgeBase(String),

    #[error("Document '{0}' already exists in the knowledge base")]
    DocumentAlreadyExists(String),

    #[error("Token '{token}' already exists for source '{source_name}'")]
    TokenAlreadyExistsForSource { token: String, source_name: String },

    #[error("'{0}' has no entry in the dictionary")]
    NotInDictionary(String),

    #[error("No addable entry for '{item}' in source '{source_name}'")]
    NoAddableEntry { item: String, source_name: String },

    #[error("Already {added}/{max} items added for the next round")]
    EnoughItemsAdded { added: usize, max: usize },

    #[error("Some kanji of '{token}' are not known: {kanjis:?}")]
    KanjiNotKnown { token: String, kanjis: Vec<char> },

    #[error("Some kanji of '{token}' are neither known nor added for study: {kanjis:?}")]
    KanjiNotKnownOrAdded { token: String, kanjis: Vec<char> },

    #[error("{0} vocabulary items still wait for their kanji to be checked")]
    UncertainVocabRemains(usize),

    #[error("'{token}' for '{source_name}' is not waiting for a kanji check")]
    NotUncertain { token: String, source_name: String },

    #[error("Invalid study settings: {0}")]
    InvalidStudySettings(String),

    #[error("No DeepL API key configured")]
    MissingApiKey,

    #[error("BookToCardsError: {0}")]
    Custom(String),
}

impl From<std::io::Error> for BookToCardsError {
    fn from(error: std::io::Error) -> Self {
        BookToCardsError::Io(Box::new(error))
    }
}

impl From<reqwest::Error> for BookToCardsError {
    fn from(error: reqwest::Error) -> Self {
        BookToCardsError::Reqwest(Box::new(error))
    }
}

impl From<vibrato::errors::VibratoError> for BookToCardsError {
    fn from(error: vibrato::errors::VibratoError) -> Self {
        BookToCardsError::Vibrato(Box::new(error))
    }
}

impl From<bincode::error::EncodeError> for BookToCardsError {
    fn from(error: bincode::error::EncodeError) -> Self {
        BookToCardsError::Cache(error.to_string())
    }
}

impl From<bincode::error::DecodeError> for BookToCardsError {
    fn from(error: bincode::error::DecodeError) -> Self {
        BookToCardsError::Cache(error.to_string())
    }
}
