use std::collections::HashMap;

use serde::{
    Deserialize,
    Serialize,
};
use wana_kana::{
    ConvertJapanese,
    IsJapaneseStr,
};

use super::{
    yomitan::Revisioned,
    FrequencyEntry,
    TermMetaBankV3,
};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FrequencyDictionary {
    pub title: String,
    pub revision: String,
    pub terms: HashMap<String, Vec<FrequencyEntry>>,
}

impl Revisioned for FrequencyDictionary {
    fn revision(&self) -> &str {
        &self.revision
    }
}

fn same_reading(entry_reading: &str, reading: &str) -> bool {
    let normalized = if entry_reading.is_hiragana() {
        reading.to_hiragana()
    } else {
        reading.to_katakana()
    };
    normalized == entry_reading
}

impl FrequencyDictionary {
    pub fn new(title: String, revision: String, term_meta_list: Vec<TermMetaBankV3>) -> Self {
        let mut terms: HashMap<String, Vec<FrequencyEntry>> = HashMap::new();

        for term_meta in term_meta_list {
            if term_meta.data_type != "freq" {
                continue;
            }
            if let Some(raw) = term_meta.data {
                terms.entry(term_meta.term).or_default().push(raw.into());
            }
        }

        FrequencyDictionary { title, revision, terms }
    }

    /// Rank of a (term, reading) pair. Kana terms prefer the kana-only entries,
    /// and entries without reading are the last resort.
    pub fn get_frequency(&self, term: &str, reading: &str) -> Option<&FrequencyEntry> {
        let entries = self.terms.get(term)?;
        let wants_kana = term.is_kana();
        let for_reading = |entry: &&FrequencyEntry| {
            entry.reading.as_deref().is_some_and(|r| same_reading(r, reading))
        };

        entries
            .iter()
            .filter(for_reading)
            .filter(|entry| entry.kana_only == wants_kana)
            .min_by_key(|entry| entry.rank)
            .or_else(|| entries.iter().filter(for_reading).min_by_key(|entry| entry.rank))
            .or_else(|| entries.iter().find(|entry| entry.reading.is_none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> FrequencyDictionary {
        let rows: Vec<TermMetaBankV3> = serde_json::from_str(
            r#"[
                ["初","freq",{"reading":"はつ","frequency":{"value":5000,"displayValue":"5000"}}],
                ["初","freq",{"reading":"しょ","frequency":900}],
                ["初","freq",{"reading":"しょ","frequency":1200}],
                ["ねこ","freq",{"reading":"ねこ","frequency":{"value":300,"displayValue":"300㋕"}}],
                ["ねこ","freq",{"reading":"ねこ","frequency":{"value":40,"displayValue":"40"}}],
                ["犬","freq",77]
            ]"#,
        )
        .unwrap();
        FrequencyDictionary::new("Test".to_string(), "1".to_string(), rows)
    }

    #[test]
    fn test_lowest_rank_for_reading() {
        let dict = dictionary();
        assert_eq!(dict.get_frequency("初", "しょ").map(|f| f.rank), Some(900));
        assert_eq!(dict.get_frequency("初", "ハツ").map(|f| f.rank), Some(5000));
        assert!(dict.get_frequency("初", "うい").is_none());
    }

    #[test]
    fn test_kana_terms_use_kana_entries() {
        let dict = dictionary();
        assert_eq!(dict.get_frequency("ねこ", "ねこ").map(|f| f.rank), Some(300));
    }

    #[test]
    fn test_simple_entry_without_reading() {
        let dict = dictionary();
        assert_eq!(dict.get_frequency("犬", "いぬ").map(|f| f.rank), Some(77));
    }
}
