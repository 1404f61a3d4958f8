use std::{
    path::Path,
    time::Instant,
};

use rayon::prelude::*;
use tracing::info;
use vibrato::Tokenizer;

use super::token_models::Morpheme;
use crate::{
    core::BookToCardsError,
    dictionary::token_dictionary::{
        ensure_dictionary,
        load_dictionary,
        DictType,
    },
};

/// Turns a sentence into morphemes carrying their dictionary forms.
pub trait Lemmatizer: Sync {
    fn lemmatize(&self, sentence: &str) -> Vec<Morpheme>;

    fn lemmatize_batch(&self, sentences: &[String]) -> Vec<Vec<Morpheme>> {
        sentences.par_iter().map(|sentence| self.lemmatize(sentence)).collect()
    }
}

pub fn init_vibrato(dict_type: &DictType, dict_dir: &Path) -> Result<Tokenizer, BookToCardsError> {
    let start = Instant::now();
    let dict_path = ensure_dictionary(dict_type, dict_dir)?;
    let dict = load_dictionary(&dict_path)?;
    info!("Loaded tokenizer model in {:?}", start.elapsed());

    Ok(Tokenizer::new(dict))
}

pub struct VibratoLemmatizer {
    tokenizer: Tokenizer,
}

impl VibratoLemmatizer {
    pub fn new(tokenizer: Tokenizer) -> Self {
        VibratoLemmatizer { tokenizer }
    }

    pub fn load(dict_dir: &Path) -> Result<Self, BookToCardsError> {
        Ok(VibratoLemmatizer::new(init_vibrato(&DictType::Unidic, dict_dir)?))
    }
}

fn tokenize_with(worker: &mut vibrato::tokenizer::worker::Worker<'_>, sentence: &str) -> Vec<Morpheme> {
    worker.reset_sentence(sentence);
    worker.tokenize();
    worker
        .token_iter()
        .map(|token| Morpheme::from_unidic(token.surface(), token.feature()))
        .collect()
}

impl Lemmatizer for VibratoLemmatizer {
    fn lemmatize(&self, sentence: &str) -> Vec<Morpheme> {
        let mut worker = self.tokenizer.new_worker();
        tokenize_with(&mut worker, sentence)
    }

    // One worker per rayon thread instead of one per sentence
    fn lemmatize_batch(&self, sentences: &[String]) -> Vec<Vec<Morpheme>> {
        sentences
            .par_iter()
            .map_init(
                || self.tokenizer.new_worker(),
                |worker, sentence| tokenize_with(worker, sentence),
            )
            .collect()
    }
}
