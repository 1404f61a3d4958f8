pub mod frequency_dict;
pub mod frequency_manager;
pub mod install;
pub mod jmdict;
pub mod sanseido;
pub mod token_dictionary;
pub mod yomitan;

use serde::{
    Deserialize,
    Serialize,
};

use crate::core::utils::deserialize_number_or_numeric_string;

/// `index.json` of a Yomitan dictionary. Old exports only carry `version`.
#[derive(Deserialize, Debug, Clone)]
pub struct DictionaryIndex {
    pub title: String,
    pub revision: String,
    pub format: Option<u8>,
    pub version: Option<u8>,
}

/// One row of a `term_bank_*.json` file.
#[derive(Deserialize, Debug, Clone)]
pub struct TermBankV3 {
    pub term: String,
    pub reading: String,
    pub definition_tags: Option<String>,
    pub rules: String,
    pub score: f64,
    pub glossary: Vec<serde_json::Value>,
    pub sequence: i64,
    pub term_tags: String,
}

impl TermBankV3 {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.term_tags
            .split_whitespace()
            .chain(self.definition_tags.as_deref().unwrap_or("").split_whitespace())
            .any(|t| t == tag)
    }
}

/// Rank as written in a meta bank: a bare number or `{value, displayValue}`.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum RawRank {
    #[serde(deserialize_with = "deserialize_number_or_numeric_string")]
    Plain(u32),
    Detailed {
        #[serde(deserialize_with = "deserialize_number_or_numeric_string")]
        value: u32,
        #[serde(rename = "displayValue")]
        display_value: Option<String>,
    },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum RawFrequency {
    ForReading { reading: String, frequency: RawRank },
    Any(RawRank),
}

/// One row of a `term_meta_bank_*.json` file; `data` is only read for "freq" rows.
#[derive(Deserialize, Debug)]
pub struct TermMetaBankV3 {
    pub term: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub data: Option<RawFrequency>,
}

/// Cached form of a frequency row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FrequencyEntry {
    pub reading: Option<String>,
    pub rank: u32,
    /// Rank of the kana spelling, flagged with ㋕ in the display value.
    pub kana_only: bool,
}

impl From<RawFrequency> for FrequencyEntry {
    fn from(raw: RawFrequency) -> Self {
        let (reading, rank) = match raw {
            RawFrequency::ForReading { reading, frequency } => (Some(reading), frequency),
            RawFrequency::Any(rank) => (None, rank),
        };
        let (rank, kana_only) = match rank {
            RawRank::Plain(value) => (value, false),
            RawRank::Detailed { value, display_value } => {
                (value, display_value.is_some_and(|display| display.contains('㋕')))
            }
        };
        FrequencyEntry { reading, rank, kana_only }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_bank_row_from_array() {
        let row: TermBankV3 = serde_json::from_str(
            r#"["食べる","たべる","v1 vt","v1",100,["to eat"],1358280,"P ichi"]"#,
        )
        .unwrap();
        assert_eq!(row.term, "食べる");
        assert_eq!(row.sequence, 1358280);
        assert!(row.has_tag("P"));
        assert!(row.has_tag("vt"));
        assert!(!row.has_tag("news"));
    }

    #[test]
    fn test_meta_bank_frequency_shapes() {
        let plain: TermMetaBankV3 = serde_json::from_str(r#"["猫","freq","1200"]"#).unwrap();
        let detailed: TermMetaBankV3 = serde_json::from_str(
            r#"["ねこ","freq",{"reading":"ねこ","frequency":{"value":800,"displayValue":"800㋕"}}]"#,
        )
        .unwrap();

        let plain: FrequencyEntry = plain.data.unwrap().into();
        let detailed: FrequencyEntry = detailed.data.unwrap().into();
        assert_eq!(plain, FrequencyEntry { reading: None, rank: 1200, kana_only: false });
        assert_eq!(
            detailed,
            FrequencyEntry { reading: Some("ねこ".to_string()), rank: 800, kana_only: true }
        );
    }
}
