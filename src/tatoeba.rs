use std::{
    collections::{
        HashMap,
        HashSet,
    },
    fs,
    path::{
        Path,
        PathBuf,
    },
    time::Instant,
};

use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    info,
    warn,
};

use crate::{
    core::BookToCardsError,
    persistence::{
        load_json,
        save_json,
    },
    segmentation::{
        Lemmatizer,
        PosFilter,
    },
};

pub const CORPUS_FILE: &str = "corpus.json";
pub const INVERTED_INDEX_FILE: &str = "inverted_index.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TatoebaEntry {
    pub sent_jpn: String,
    pub sent_eng: String,
    pub toks_jpn: Vec<String>,
}

/// Japanese/English sentence pairs searchable by lemma.
#[derive(Debug, Clone, Default)]
pub struct TatoebaCorpus {
    entries: Vec<TatoebaEntry>,
    inverted_index: HashMap<String, Vec<usize>>,
}

/// Reads `jpn_id\tjpn\teng_id\teng` rows. A Japanese sentence with several
/// translations keeps the first one.
pub fn read_sentence_pairs(path: &Path) -> Result<Vec<(String, String)>, BookToCardsError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_path(path)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record?;
        let (Some(jpn_id), Some(jpn), Some(eng)) = (record.get(0), record.get(1), record.get(3)) else {
            continue;
        };
        if jpn.trim().is_empty() || !seen.insert(jpn_id.to_string()) {
            continue;
        }
        pairs.push((jpn.trim().to_string(), eng.trim().to_string()));
    }
    Ok(pairs)
}

impl TatoebaCorpus {
    pub fn build(pairs: Vec<(String, String)>, lemmatizer: &dyn Lemmatizer) -> Self {
        let start = Instant::now();
        let sentences: Vec<String> = pairs.iter().map(|(jpn, _)| jpn.clone()).collect();
        let filter = PosFilter::default();
        let lemmatized = lemmatizer.lemmatize_batch(&sentences);

        let entries: Vec<TatoebaEntry> = pairs
            .into_iter()
            .zip(lemmatized.iter())
            .map(|((sent_jpn, sent_eng), morphemes)| TatoebaEntry {
                sent_jpn,
                sent_eng,
                toks_jpn: filter.lemmas(morphemes).into_iter().map(str::to_string).collect(),
            })
            .collect();

        let mut inverted_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            for token in &entry.toks_jpn {
                let ids = inverted_index.entry(token.clone()).or_default();
                if ids.last() != Some(&idx) {
                    ids.push(idx);
                }
            }
        }

        info!(
            "Indexed {} tatoeba sentences ({} lemmas) in {:?}",
            entries.len(),
            inverted_index.len(),
            start.elapsed()
        );
        TatoebaCorpus { entries, inverted_index }
    }

    /// Loads the cached corpus in `dir`, or builds it from the first `.tsv`
    /// file found there. `None` when neither exists.
    pub fn load_or_build(
        dir: &Path,
        lemmatizer: Option<&dyn Lemmatizer>,
    ) -> Result<Option<Self>, BookToCardsError> {
        let corpus_path = dir.join(CORPUS_FILE);
        let index_path = dir.join(INVERTED_INDEX_FILE);
        if corpus_path.exists() && index_path.exists() {
            let entries: Vec<TatoebaEntry> = load_json(&corpus_path)?;
            let inverted_index: HashMap<String, Vec<usize>> = load_json(&index_path)?;
            info!("Loaded {} tatoeba sentences from cache", entries.len());
            return Ok(Some(TatoebaCorpus { entries, inverted_index }));
        }

        let Some(tsv_path) = find_tsv(dir)? else {
            return Ok(None);
        };
        let Some(lemmatizer) = lemmatizer else {
            warn!("Found {} but no tokenizer to index it", tsv_path.display());
            return Ok(None);
        };
        info!("-- No prepared corpus found. Making corpus and index from {}", tsv_path.display());
        let corpus = TatoebaCorpus::build(read_sentence_pairs(&tsv_path)?, lemmatizer);
        save_json(&corpus.entries, &corpus_path)?;
        save_json(&corpus.inverted_index, &index_path)?;
        Ok(Some(corpus))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `max` (japanese, english) pairs containing `lemma`.
    pub fn examples(&self, lemma: &str, max: usize) -> Vec<(String, String)> {
        self.inverted_index
            .get(lemma)
            .map(|ids| {
                ids.iter()
                    .filter_map(|&idx| self.entries.get(idx))
                    .take(max)
                    .map(|entry| (entry.sent_jpn.clone(), entry.sent_eng.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_tsv(dir: &Path) -> Result<Option<PathBuf>, BookToCardsError> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut tsv_files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "tsv"))
        .collect();
    tsv_files.sort();
    Ok(tsv_files.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeLemmatizer;

    const TSV: &str = "1\t猫が走る。\t10\tThe cat runs.\n\
                       1\t猫が走る。\t11\tA cat is running.\n\
                       2\t犬を見る。\t12\tI see the dog.\n\
                       3\t猫を見る。\t13\tI see the cat.\n";

    #[test]
    fn test_read_pairs_keeps_first_translation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.tsv");
        fs::write(&path, TSV).unwrap();
        let pairs = read_sentence_pairs(&path).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], ("猫が走る。".to_string(), "The cat runs.".to_string()));
    }

    #[test]
    fn test_examples_by_lemma() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pairs.tsv"), TSV).unwrap();
        let lemmatizer = FakeLemmatizer::new();
        let corpus = TatoebaCorpus::load_or_build(dir.path(), Some(&lemmatizer)).unwrap().unwrap();

        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.examples("猫", 5).len(), 2);
        assert_eq!(corpus.examples("猫", 1), vec![("猫が走る。".to_string(), "The cat runs.".to_string())]);
        assert!(corpus.examples("が", 5).is_empty());

        // Second load comes from the cache, no tokenizer needed
        fs::remove_file(dir.path().join("pairs.tsv")).unwrap();
        let cached = TatoebaCorpus::load_or_build(dir.path(), None).unwrap().unwrap();
        assert_eq!(cached.examples("見る", 5).len(), 2);
    }

    #[test]
    fn test_nothing_to_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TatoebaCorpus::load_or_build(dir.path(), None).unwrap().is_none());
    }
}
