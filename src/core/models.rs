use chrono::NaiveDate;
use serde::{
    Deserialize,
    Serialize,
};

pub type SeqId = usize;

/// One lemma as found in one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub count: usize,
    pub seq_ids: Vec<SeqId>,
    pub source_name: String,
    pub is_known: bool,
    pub is_added_to_anki: bool,
    pub is_suspended_for_source: bool,
    pub to_be_studied_from: Option<NaiveDate>,
}

impl TokenRecord {
    pub fn new(token: String, source_name: String) -> Self {
        TokenRecord {
            token,
            count: 0,
            seq_ids: Vec::new(),
            source_name,
            is_known: false,
            is_added_to_anki: false,
            is_suspended_for_source: false,
            to_be_studied_from: None,
        }
    }

    pub fn first_seq_id(&self) -> Option<SeqId> {
        self.seq_ids.iter().min().copied()
    }
}

/// One kanji as found in one source, with the source tokens containing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KanjiRecord {
    pub kanji: char,
    pub associated_toks_from_source: Vec<String>,
    pub source_name: String,
    pub is_known: bool,
    pub is_added_to_anki: bool,
    pub is_suspended_for_source: bool,
}

impl KanjiRecord {
    pub fn new(kanji: char, source_name: String) -> Self {
        KanjiRecord {
            kanji,
            associated_toks_from_source: Vec::new(),
            source_name,
            is_known: false,
            is_added_to_anki: false,
            is_suspended_for_source: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub seq_id: SeqId,
    pub seq: String,
    pub source_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_name: String,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Token,
    Kanji,
}

/// Shared view over token and kanji rows, so both tables filter the same way.
pub trait KbItem {
    fn value(&self) -> String;
    fn source_name(&self) -> &str;
    fn is_known(&self) -> bool;
    fn is_added_to_anki(&self) -> bool;
    fn is_suspended_for_source(&self) -> bool;
    fn study_date(&self) -> Option<NaiveDate> {
        None
    }
    fn set_known(&mut self, value: bool);
    fn set_added_to_anki(&mut self, value: bool);
    fn set_suspended_for_source(&mut self, value: bool);
}

impl KbItem for TokenRecord {
    fn value(&self) -> String {
        self.token.clone()
    }
    fn source_name(&self) -> &str {
        &self.source_name
    }
    fn is_known(&self) -> bool {
        self.is_known
    }
    fn is_added_to_anki(&self) -> bool {
        self.is_added_to_anki
    }
    fn is_suspended_for_source(&self) -> bool {
        self.is_suspended_for_source
    }
    fn study_date(&self) -> Option<NaiveDate> {
        self.to_be_studied_from
    }
    fn set_known(&mut self, value: bool) {
        self.is_known = value;
    }
    fn set_added_to_anki(&mut self, value: bool) {
        self.is_added_to_anki = value;
    }
    fn set_suspended_for_source(&mut self, value: bool) {
        self.is_suspended_for_source = value;
    }
}

impl KbItem for KanjiRecord {
    fn value(&self) -> String {
        self.kanji.to_string()
    }
    fn source_name(&self) -> &str {
        &self.source_name
    }
    fn is_known(&self) -> bool {
        self.is_known
    }
    fn is_added_to_anki(&self) -> bool {
        self.is_added_to_anki
    }
    fn is_suspended_for_source(&self) -> bool {
        self.is_suspended_for_source
    }
    fn set_known(&mut self, value: bool) {
        self.is_known = value;
    }
    fn set_added_to_anki(&mut self, value: bool) {
        self.is_added_to_anki = value;
    }
    fn set_suspended_for_source(&mut self, value: bool) {
        self.is_suspended_for_source = value;
    }
}

/// Row filter for [`crate::kb::KnowledgeBase`] lookups. Every flag narrows the result.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub only_not_added: bool,
    pub only_not_known: bool,
    pub only_not_suspended: bool,
    pub only_no_study_date: bool,
    pub item_value: Option<String>,
    pub source_name: Option<String>,
    pub max_study_date: Option<NaiveDate>,
}

impl ItemQuery {
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows that are neither added, known, suspended nor dated.
    pub fn addable() -> Self {
        ItemQuery {
            only_not_added: true,
            only_not_known: true,
            only_not_suspended: true,
            only_no_study_date: true,
            ..Self::default()
        }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.item_value = Some(value.into());
        self
    }

    pub fn source(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    pub fn source_opt(mut self, source_name: Option<&str>) -> Self {
        self.source_name = source_name.map(str::to_string);
        self
    }

    pub fn max_study_date(mut self, date: NaiveDate) -> Self {
        self.max_study_date = Some(date);
        self
    }

    pub fn matches<T: KbItem>(&self, item: &T) -> bool {
        if self.only_not_added && item.is_added_to_anki() {
            return false;
        }
        if self.only_not_known && item.is_known() {
            return false;
        }
        if self.only_not_suspended && item.is_suspended_for_source() {
            return false;
        }
        if self.only_no_study_date && item.study_date().is_some() {
            return false;
        }
        if let Some(value) = &self.item_value {
            if &item.value() != value {
                return false;
            }
        }
        if let Some(source_name) = &self.source_name {
            if item.source_name() != source_name {
                return false;
            }
        }
        if let Some(max_date) = self.max_study_date {
            match item.study_date() {
                Some(date) if date <= max_date => {}
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocStats {
    pub n_tokens: usize,
    pub n_unique_tokens: usize,
    pub n_unique_tokens_unknown: usize,
    pub n_unique_kanjis: usize,
    pub n_unique_kanjis_unknown: usize,
}
