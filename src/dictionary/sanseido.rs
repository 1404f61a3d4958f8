use std::{
    collections::HashMap,
    path::Path,
};

use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;

use super::{
    yomitan::{
        dictionary_folders,
        glossary_texts,
        load_or_build,
        parse_bank,
        Revisioned,
    },
    TermBankV3,
};
use crate::core::BookToCardsError;

/// Definitions of one lemma, per reading in dictionary order.
pub type ReadingDefinitions = Vec<(String, Vec<String>)>;

/// Monolingual dictionary: lemma -> reading -> definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sanseido {
    pub title: String,
    pub revision: String,
    terms: HashMap<String, ReadingDefinitions>,
}

impl Revisioned for Sanseido {
    fn revision(&self) -> &str {
        &self.revision
    }
}

impl Sanseido {
    pub fn from_term_bank(title: String, revision: String, rows: Vec<TermBankV3>) -> Self {
        let mut terms: HashMap<String, ReadingDefinitions> = HashMap::new();
        for row in rows {
            let Some(definition) = row.glossary.first().map(|item| glossary_texts(item).join("\n"))
            else {
                continue;
            };
            if definition.trim().is_empty() {
                continue;
            }
            let readings = terms.entry(row.term).or_default();
            match readings.iter_mut().find(|(reading, _)| *reading == row.reading) {
                Some((_, definitions)) => definitions.push(definition),
                None => readings.push((row.reading, vec![definition])),
            }
        }
        Sanseido { title, revision, terms }
    }

    pub fn lookup(&self, lemma: &str) -> Option<&[(String, Vec<String>)]> {
        self.terms.get(lemma).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

pub fn load_sanseido(dir_path: &Path) -> Result<Option<Sanseido>, BookToCardsError> {
    for folder in dictionary_folders(dir_path)? {
        let loaded = load_or_build(&folder, |index| {
            let rows: Vec<TermBankV3> = parse_bank(&folder, "term_bank")?;
            Ok(Sanseido::from_term_bank(index.title, index.revision, rows))
        })?;
        if let Some(sanseido) = loaded {
            info!("Loaded '{}' ({} lemmas)", sanseido.title, sanseido.len());
            return Ok(Some(sanseido));
        }
    }
    Ok(None)
}
