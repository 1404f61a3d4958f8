use std::{
    collections::HashMap,
    path::Path,
    time::Instant,
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub text: String,
    pub is_frequent: bool,
}

/// One JMdict entry: all spellings and readings sharing a sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictEntry {
    pub entry_id: i64,
    pub kanji_forms: Vec<Form>,
    pub kana_forms: Vec<Form>,
    pub meanings: Vec<String>,
}

impl DictEntry {
    pub fn is_frequent(&self) -> bool {
        self.kanji_forms.iter().chain(self.kana_forms.iter()).any(|form| form.is_frequent)
    }

    pub fn readings(&self) -> Vec<String> {
        self.kana_forms.iter().map(|form| form.text.clone()).collect()
    }

    pub fn kanji_texts(&self) -> Vec<String> {
        self.kanji_forms.iter().map(|form| form.text.clone()).collect()
    }
}

fn push_form(forms: &mut Vec<Form>, text: &str, is_frequent: bool) {
    match forms.iter_mut().find(|form| form.text == text) {
        Some(form) => form.is_frequent |= is_frequent,
        None => forms.push(Form { text: text.to_string(), is_frequent }),
    }
}

fn keep_frequent_forms(forms: &[Form]) -> Vec<Form> {
    if forms.iter().any(|form| form.is_frequent) {
        forms.iter().filter(|form| form.is_frequent).cloned().collect()
    } else {
        forms.to_vec()
    }
}

/// If one entry is frequent, the others are dropped.
pub fn drop_unfrequent_entries(entries: Vec<DictEntry>) -> Vec<DictEntry> {
    if entries.iter().any(DictEntry::is_frequent) {
        entries.into_iter().filter(DictEntry::is_frequent).collect()
    } else {
        entries
    }
}

/// Within kanji forms and within kana forms, drops the unfrequent ones when a
/// frequent one exists.
pub fn drop_unfrequent_readings(entry: &DictEntry) -> DictEntry {
    DictEntry {
        entry_id: entry.entry_id,
        kanji_forms: keep_frequent_forms(&entry.kanji_forms),
        kana_forms: keep_frequent_forms(&entry.kana_forms),
        meanings: entry.meanings.clone(),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jmdict {
    pub title: String,
    pub revision: String,
    entries: Vec<DictEntry>,
    index: HashMap<String, Vec<usize>>,
}

impl Revisioned for Jmdict {
    fn revision(&self) -> &str {
        &self.revision
    }
}

impl Jmdict {
    pub fn from_term_bank(title: String, revision: String, rows: Vec<TermBankV3>) -> Self {
        let mut entries: Vec<DictEntry> = Vec::new();
        let mut by_sequence: HashMap<i64, usize> = HashMap::new();

        for row in rows {
            let is_frequent = row.has_tag("P") || row.score > 0.0;
            let position = if row.sequence > 0 {
                *by_sequence.entry(row.sequence).or_insert_with(|| {
                    entries.push(DictEntry {
                        entry_id: row.sequence,
                        kanji_forms: Vec::new(),
                        kana_forms: Vec::new(),
                        meanings: Vec::new(),
                    });
                    entries.len() - 1
                })
            } else {
                // Rows without a sequence number stand alone
                entries.push(DictEntry {
                    entry_id: -(entries.len() as i64) - 1,
                    kanji_forms: Vec::new(),
                    kana_forms: Vec::new(),
                    meanings: Vec::new(),
                });
                entries.len() - 1
            };

            let entry = &mut entries[position];
            if row.reading.is_empty() || row.reading == row.term {
                push_form(&mut entry.kana_forms, &row.term, is_frequent);
            } else {
                push_form(&mut entry.kanji_forms, &row.term, is_frequent);
                push_form(&mut entry.kana_forms, &row.reading, is_frequent);
            }
            for meaning in row.glossary.iter().flat_map(glossary_texts) {
                if !entry.meanings.contains(&meaning) {
                    entry.meanings.push(meaning);
                }
            }
        }

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, entry) in entries.iter().enumerate() {
            for form in entry.kanji_forms.iter().chain(entry.kana_forms.iter()) {
                let positions = index.entry(form.text.clone()).or_default();
                if positions.last() != Some(&position) {
                    positions.push(position);
                }
            }
        }

        Jmdict { title, revision, entries, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries having `query` as a kanji or kana form.
    pub fn lookup(&self, query: &str) -> Vec<&DictEntry> {
        self.index
            .get(query)
            .map(|positions| positions.iter().filter_map(|&p| self.entries.get(p)).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, query: &str) -> bool {
        self.index.contains_key(query)
    }

    pub fn get_dict_entries(
        &self,
        query: &str,
        drop_unfreq_entries: bool,
        drop_unfreq_readings: bool,
    ) -> Vec<DictEntry> {
        let mut entries: Vec<DictEntry> = self.lookup(query).into_iter().cloned().collect();
        if drop_unfreq_entries {
            entries = drop_unfrequent_entries(entries);
        }
        if drop_unfreq_readings {
            entries = entries.iter().map(drop_unfrequent_readings).collect();
        }
        entries
    }
}

/// Loads the first JMdict export found in `dir_path`.
pub fn load_jmdict(dir_path: &Path) -> Result<Jmdict, BookToCardsError> {
    let start = Instant::now();
    for folder in dictionary_folders(dir_path)? {
        let loaded = load_or_build(&folder, |index| {
            let rows: Vec<TermBankV3> = parse_bank(&folder, "term_bank")?;
            Ok(Jmdict::from_term_bank(index.title, index.revision, rows))
        })?;
        if let Some(jmdict) = loaded {
            info!("Loaded '{}' ({} entries) in {:?}", jmdict.title, jmdict.len(), start.elapsed());
            return Ok(jmdict);
        }
    }

    Err(BookToCardsError::NoProcessedDictionary(dir_path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 初 has a frequent entry with two readings, only one of them frequent,
    // and a second unfrequent entry.
    fn rows() -> Vec<TermBankV3> {
        serde_json::from_str(
            r#"[
                ["初","はつ","n","",5,["first","new"],1,"P"],
                ["初","うい","n","",0,["first (archaic)"],1,""],
                ["初","しょ","pref","",0,["beginning"],2,""],
                ["自由研究","じゆうけんきゅう","n","",0,["independent research"],3,""],
                ["はつ","","n","",0,["first"],1,""]
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_group_by_sequence() {
        let jmdict = Jmdict::from_term_bank("JMdict".into(), "1".into(), rows());
        let entries = jmdict.lookup("初");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_id, 1);
        assert_eq!(entries[0].readings(), vec!["はつ", "うい"]);
        assert_eq!(entries[0].meanings, vec!["first", "new", "first (archaic)"]);
        assert_eq!(jmdict.lookup("はつ").len(), 1);
        assert!(!jmdict.contains("猫"));
    }

    #[test]
    fn test_drop_unfrequent_entries() {
        let jmdict = Jmdict::from_term_bank("JMdict".into(), "1".into(), rows());
        let entries = jmdict.get_dict_entries("初", true, false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_id, 1);

        // Nothing frequent: everything stays
        let entries = jmdict.get_dict_entries("自由研究", true, false);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_drop_unfrequent_readings() {
        let jmdict = Jmdict::from_term_bank("JMdict".into(), "1".into(), rows());
        let entry = drop_unfrequent_readings(jmdict.lookup("初")[0]);
        assert_eq!(entry.kanji_texts(), vec!["初"]);
        assert_eq!(entry.readings(), vec!["はつ"]);
    }

    #[test]
    fn test_load_from_folder_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_jmdict(dir.path()),
            Err(BookToCardsError::NoProcessedDictionary(_))
        ));

        let folder = dir.path().join("jmdict_english");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("index.json"), r#"{"title":"JMdict","revision":"a","format":3}"#)
            .unwrap();
        std::fs::write(
            folder.join("term_bank_1.json"),
            r#"[["猫","ねこ","n","",1,["cat"],10,"P"]]"#,
        )
        .unwrap();
        let jmdict = load_jmdict(dir.path()).unwrap();
        assert_eq!(jmdict.lookup("ねこ")[0].meanings, vec!["cat"]);
    }
}
