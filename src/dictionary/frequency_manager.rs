use std::{
    collections::BTreeMap,
    path::Path,
    sync::Mutex,
    time::Instant,
};

use rayon::prelude::*;
use tracing::{
    info,
    warn,
};

use super::{
    frequency_dict::FrequencyDictionary,
    yomitan::{
        dictionary_folders,
        load_or_build,
        parse_bank,
    },
    TermMetaBankV3,
};
use crate::core::{
    utils::harmonic_frequency,
    BookToCardsError,
};

/// Every rank dictionary found under the frequency directory.
#[derive(Debug, Default)]
pub struct FrequencyManager {
    dictionaries: BTreeMap<String, FrequencyDictionary>,
}

impl FrequencyManager {
    pub fn add_dictionary(&mut self, dictionary: FrequencyDictionary) {
        self.dictionaries.insert(dictionary.title.clone(), dictionary);
    }

    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }

    pub fn get_dictionary_names(&self) -> Vec<String> {
        self.dictionaries.keys().cloned().collect()
    }

    /// Rank per dictionary title, for the dictionaries that know the pair.
    pub fn build_freq_map(&self, term: &str, reading: &str) -> BTreeMap<String, u32> {
        self.dictionaries
            .iter()
            .filter_map(|(title, dict)| {
                dict.get_frequency(term, reading).map(|freq| (title.clone(), freq.rank))
            })
            .collect()
    }

    /// Harmonic mean of the ranks of a (term, reading) pair over all dictionaries.
    pub fn get_harmonic_frequency_for_pair(&self, term: &str, reading: &str) -> Option<u32> {
        let ranks: Vec<u32> = self.build_freq_map(term, reading).into_values().collect();
        harmonic_frequency(&ranks)
    }

    /// Best (lowest) harmonic rank among several readings of a term.
    pub fn best_rank(&self, term: &str, readings: &[String]) -> Option<u32> {
        readings
            .iter()
            .filter_map(|reading| self.get_harmonic_frequency_for_pair(term, reading))
            .min()
    }
}

pub fn process_frequency_dictionaries(dir_path: &Path) -> Result<FrequencyManager, BookToCardsError> {
    let manager = Mutex::new(FrequencyManager::default());
    let start = Instant::now();

    info!("Loading frequency dictionaries...");
    let folders = dictionary_folders(dir_path)?;

    folders.par_iter().for_each(|path| {
        let built = load_or_build(path, |index| {
            let term_meta_list: Vec<TermMetaBankV3> = parse_bank(path, "term_meta_bank")?;
            Ok(FrequencyDictionary::new(index.title, index.revision, term_meta_list))
        });

        match built {
            Ok(Some(dictionary)) => {
                info!("Frequency dictionary '{}': {} terms", dictionary.title, dictionary.terms.len());
                if let Ok(mut guard) = manager.lock() {
                    guard.add_dictionary(dictionary);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load frequency dictionary {:?}: {}", path, e),
        }
    });

    info!("Total processing time: {:?}", start.elapsed());

    manager
        .into_inner()
        .map_err(|e| BookToCardsError::Custom(format!("Frequency manager lock poisoned: {}", e)))
}
