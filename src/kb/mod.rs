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

use chrono::NaiveDate;
use tracing::{
    debug,
    info,
};

use crate::{
    core::{
        utils::{
            ordered_counts,
            unique_kanjis,
        },
        BookToCardsError,
        DocStats,
        ItemKind,
        ItemQuery,
        KanjiRecord,
        KbItem,
        SeqId,
        SequenceRecord,
        SourceRecord,
        TokenRecord,
    },
    dictionary::jmdict::Jmdict,
    parser::ParsedDocument,
    persistence::{
        load_json,
        save_json,
    },
    segmentation::Lemmatizer,
};

pub const TOKENS_FILE: &str = "tokens.json";
pub const KANJIS_FILE: &str = "kanjis.json";
pub const SEQS_FILE: &str = "seqs.json";
pub const SOURCES_FILE: &str = "sources.json";
pub const BACKUP_DIR: &str = "backup";

/// Source collecting text added piece by piece.
pub const INCR_DOC_NAME: &str = "General source";

/// Persistent store of tokens, kanji and sentences per source document.
#[derive(Debug)]
pub struct KnowledgeBase {
    dir: PathBuf,
    tokens: Vec<TokenRecord>,
    kanjis: Vec<KanjiRecord>,
    seqs: Vec<SequenceRecord>,
    sources: Vec<SourceRecord>,
}

impl KnowledgeBase {
    /// Loads the tables in `dir`. Missing tables start empty and are written
    /// right away, together with a backup copy.
    pub fn open(dir: &Path) -> Result<Self, BookToCardsError> {
        fs::create_dir_all(dir)?;
        let mut created = false;
        for file in [TOKENS_FILE, KANJIS_FILE, SEQS_FILE, SOURCES_FILE] {
            if !dir.join(file).exists() {
                info!("-- {} did not exist in kb. Initializing it.", file);
                created = true;
            }
        }

        let kb = KnowledgeBase {
            dir: dir.to_path_buf(),
            tokens: load_json(&dir.join(TOKENS_FILE))?,
            kanjis: load_json(&dir.join(KANJIS_FILE))?,
            seqs: load_json(&dir.join(SEQS_FILE))?,
            sources: load_json(&dir.join(SOURCES_FILE))?,
        };
        if created {
            kb.save(true)?;
        }
        debug!(
            "Opened kb at {:?}: {} tokens, {} kanji, {} sentences",
            dir,
            kb.tokens.len(),
            kb.kanjis.len(),
            kb.seqs.len()
        );
        Ok(kb)
    }

    /// Like [`KnowledgeBase::open`] for commands that need documents already
    /// added: errors with `NoKnowledgeBase` instead of creating the tables.
    pub fn open_existing(dir: &Path) -> Result<Self, BookToCardsError> {
        let tokens_path = dir.join(TOKENS_FILE);
        if !tokens_path.exists() {
            return Err(BookToCardsError::NoKnowledgeBase(tokens_path.display().to_string()));
        }
        KnowledgeBase::open(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, make_backup: bool) -> Result<(), BookToCardsError> {
        self.write_tables(&self.dir)?;
        if make_backup {
            self.write_tables(&self.dir.join(BACKUP_DIR))?;
        }
        Ok(())
    }

    fn write_tables(&self, dir: &Path) -> Result<(), BookToCardsError> {
        save_json(&self.tokens, &dir.join(TOKENS_FILE))?;
        save_json(&self.kanjis, &dir.join(KANJIS_FILE))?;
        save_json(&self.seqs, &dir.join(SEQS_FILE))?;
        save_json(&self.sources, &dir.join(SOURCES_FILE))?;
        Ok(())
    }

    pub fn tokens(&self) -> &[TokenRecord] {
        &self.tokens
    }

    pub fn kanjis(&self) -> &[KanjiRecord] {
        &self.kanjis
    }

    pub fn seqs(&self) -> &[SequenceRecord] {
        &self.seqs
    }

    pub fn sources(&self) -> &[SourceRecord] {
        &self.sources
    }

    fn next_seq_id(&self) -> SeqId {
        self.seqs.iter().map(|s| s.seq_id + 1).max().unwrap_or(0)
    }

    fn token_known_anywhere(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t.token == token && t.is_known)
    }

    fn kanji_known_anywhere(&self, kanji: char) -> bool {
        self.kanjis.iter().any(|k| k.kanji == kanji && k.is_known)
    }

    pub fn has_source(&self, source_name: &str) -> bool {
        self.sources.iter().any(|s| s.source_name == source_name)
            || self.tokens.iter().any(|t| t.source_name == source_name)
            || self.seqs.iter().any(|s| s.source_name == source_name)
    }

    pub fn create_source(&mut self, source_name: &str, hidden: bool) {
        if !self.sources.iter().any(|s| s.source_name == source_name) {
            self.sources.push(SourceRecord { source_name: source_name.to_string(), hidden });
        }
    }

    /// Parses `doc` and merges its sentences, tokens and kanji into `doc_name`.
    ///
    /// Sentences already stored for the source are skipped, so adding the same
    /// text twice leaves the tables unchanged.
    pub fn add_doc(
        &mut self,
        doc: &str,
        doc_name: &str,
        lemmatizer: &dyn Lemmatizer,
        drop_ascii_alphanum: bool,
        sep_tok: Option<&str>,
    ) -> Result<(), BookToCardsError> {
        let start = Instant::now();
        info!("-- parsing {}", doc_name);
        let parsed = ParsedDocument::parse(doc, sep_tok, lemmatizer, drop_ascii_alphanum);
        self.create_source(doc_name, false);

        let known_sentences: HashSet<&str> = self
            .seqs
            .iter()
            .filter(|s| s.source_name == doc_name)
            .map(|s| s.seq.as_str())
            .collect();
        let new_sentences: Vec<_> = parsed
            .sentences
            .into_iter()
            .filter(|sentence| !known_sentences.contains(sentence.text.as_str()))
            .collect();

        let mut next_id = self.next_seq_id();
        let mut sentence_lemmas: Vec<(SeqId, Vec<String>)> = Vec::with_capacity(new_sentences.len());
        for sentence in new_sentences {
            self.seqs.push(SequenceRecord {
                seq_id: next_id,
                seq: sentence.text,
                source_name: doc_name.to_string(),
            });
            sentence_lemmas.push((next_id, sentence.lemmas));
            next_id += 1;
        }

        let counts =
            ordered_counts(sentence_lemmas.iter().flat_map(|(_, lemmas)| lemmas.iter().cloned()));
        let mut seq_ids: HashMap<&str, Vec<SeqId>> = HashMap::new();
        for (seq_id, lemmas) in &sentence_lemmas {
            for lemma in lemmas {
                let ids = seq_ids.entry(lemma.as_str()).or_default();
                if ids.last() != Some(seq_id) {
                    ids.push(*seq_id);
                }
            }
        }

        let n_new_sentences = sentence_lemmas.len();
        for (token, count) in &counts {
            let ids = seq_ids.get(token.as_str()).cloned().unwrap_or_default();
            self.merge_token(token, doc_name, *count, &ids);
        }

        info!(
            "-- Added {} sentences and {} distinct tokens to {} in {:?}",
            n_new_sentences,
            counts.len(),
            doc_name,
            start.elapsed()
        );
        Ok(())
    }

    fn merge_token(&mut self, token: &str, source_name: &str, count: usize, seq_ids: &[SeqId]) {
        let known = self.token_known_anywhere(token);
        match self.tokens.iter_mut().find(|t| t.token == token && t.source_name == source_name) {
            Some(row) => {
                row.count += count;
                for id in seq_ids {
                    if !row.seq_ids.contains(id) {
                        row.seq_ids.push(*id);
                    }
                }
                row.seq_ids.sort_unstable();
            }
            None => {
                let mut row = TokenRecord::new(token.to_string(), source_name.to_string());
                row.count = count;
                row.seq_ids = seq_ids.to_vec();
                row.is_known = known;
                self.tokens.push(row);
            }
        }

        for kanji in unique_kanjis(token) {
            let known = self.kanji_known_anywhere(kanji);
            match self.kanjis.iter_mut().find(|k| k.kanji == kanji && k.source_name == source_name) {
                Some(row) => {
                    if !row.associated_toks_from_source.iter().any(|t| t == token) {
                        row.associated_toks_from_source.push(token.to_string());
                    }
                }
                None => {
                    let mut row = KanjiRecord::new(kanji, source_name.to_string());
                    row.associated_toks_from_source.push(token.to_string());
                    row.is_known = known;
                    self.kanjis.push(row);
                }
            }
        }
    }

    /// Adds a single token, with an optional example sentence, to a source.
    /// A source created this way is hidden from full-document listings.
    pub fn add_token_with_sequence(
        &mut self,
        token: &str,
        sequence: Option<&str>,
        source_name: &str,
        jmdict: &Jmdict,
    ) -> Result<(), BookToCardsError> {
        if !jmdict.contains(token) {
            return Err(BookToCardsError::NotInDictionary(token.to_string()));
        }
        if self.tokens.iter().any(|t| t.token == token && t.source_name == source_name) {
            return Err(BookToCardsError::TokenAlreadyExistsForSource {
                token: token.to_string(),
                source_name: source_name.to_string(),
            });
        }
        self.create_source(source_name, true);

        let mut seq_ids = Vec::new();
        if let Some(sequence) = sequence.map(str::trim).filter(|s| !s.is_empty()) {
            let seq_id = self.next_seq_id();
            self.seqs.push(SequenceRecord {
                seq_id,
                seq: sequence.to_string(),
                source_name: source_name.to_string(),
            });
            seq_ids.push(seq_id);
        }
        self.merge_token(token, source_name, 1, &seq_ids);
        info!("-- Added token {} to {}", token, source_name);
        Ok(())
    }

    pub fn remove_doc(&mut self, doc_name: &str) {
        self.tokens.retain(|t| t.source_name != doc_name);
        self.kanjis.retain(|k| k.source_name != doc_name);
        self.seqs.retain(|s| s.source_name != doc_name);
        self.sources.retain(|s| s.source_name != doc_name);
        info!("-- Dropped {} from kb.", doc_name);
    }

    pub fn list_doc_names(&self, include_hidden: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .sources
            .iter()
            .filter(|s| include_hidden || !s.hidden)
            .map(|s| s.source_name.clone())
            .collect();
        // Rows written before sources were tracked
        for token in &self.tokens {
            if !names.contains(&token.source_name)
                && !self.sources.iter().any(|s| s.source_name == token.source_name)
            {
                names.push(token.source_name.clone());
            }
        }
        names
    }

    /// Marks an item known for every source. Returns the number of rows changed.
    pub fn set_known(&mut self, kind: ItemKind, value: &str) -> usize {
        let query = ItemQuery::all().value(value);
        match kind {
            ItemKind::Token => set_flag(&mut self.tokens, &query, |row| row.set_known(true)),
            ItemKind::Kanji => set_flag(&mut self.kanjis, &query, |row| row.set_known(true)),
        }
    }

    pub fn set_added_to_anki(&mut self, kind: ItemKind, value: &str, source_name: &str) -> usize {
        let query = ItemQuery::all().value(value).source(source_name);
        match kind {
            ItemKind::Token => set_flag(&mut self.tokens, &query, |row| row.set_added_to_anki(true)),
            ItemKind::Kanji => set_flag(&mut self.kanjis, &query, |row| row.set_added_to_anki(true)),
        }
    }

    pub fn set_suspended_for_source(
        &mut self,
        kind: ItemKind,
        value: &str,
        source_name: &str,
    ) -> usize {
        let query = ItemQuery::all().value(value).source(source_name);
        match kind {
            ItemKind::Token => {
                set_flag(&mut self.tokens, &query, |row| row.set_suspended_for_source(true))
            }
            ItemKind::Kanji => {
                set_flag(&mut self.kanjis, &query, |row| row.set_suspended_for_source(true))
            }
        }
    }

    pub fn set_study_from_date(&mut self, token: &str, source_name: &str, date: NaiveDate) -> usize {
        let query = ItemQuery::all().value(token).source(source_name);
        set_flag(&mut self.tokens, &query, |row| row.to_be_studied_from = Some(date))
    }

    pub fn token_items(&self, query: &ItemQuery) -> Vec<&TokenRecord> {
        self.tokens.iter().filter(|t| query.matches(*t)).collect()
    }

    pub fn kanji_items(&self, query: &ItemQuery) -> Vec<&KanjiRecord> {
        self.kanjis.iter().filter(|k| query.matches(*k)).collect()
    }

    pub fn token(&self, token: &str, source_name: &str) -> Option<&TokenRecord> {
        self.tokens.iter().find(|t| t.token == token && t.source_name == source_name)
    }

    pub fn kanji(&self, kanji: char, source_name: &str) -> Option<&KanjiRecord> {
        self.kanjis.iter().find(|k| k.kanji == kanji && k.source_name == source_name)
    }

    /// Sentences with the given ids, in id order.
    pub fn sequences(&self, seq_ids: &[SeqId]) -> Vec<&SequenceRecord> {
        let mut seqs: Vec<&SequenceRecord> =
            self.seqs.iter().filter(|s| seq_ids.contains(&s.seq_id)).collect();
        seqs.sort_by_key(|s| s.seq_id);
        seqs
    }

    /// Counts for one source, ignoring tokens seen fewer than `min_count` times.
    pub fn doc_stats(&self, source_name: &str, min_count: usize) -> DocStats {
        let rows: Vec<&TokenRecord> = self
            .tokens
            .iter()
            .filter(|t| t.source_name == source_name && t.count >= min_count)
            .collect();
        let kanjis: Vec<&KanjiRecord> =
            self.kanjis.iter().filter(|k| k.source_name == source_name).collect();

        DocStats {
            n_tokens: rows.iter().map(|t| t.count).sum(),
            n_unique_tokens: rows.len(),
            n_unique_tokens_unknown: rows
                .iter()
                .filter(|t| !t.is_known && !t.is_added_to_anki)
                .count(),
            n_unique_kanjis: kanjis.len(),
            n_unique_kanjis_unknown: kanjis
                .iter()
                .filter(|k| !k.is_known && !k.is_added_to_anki)
                .count(),
        }
    }
}

fn set_flag<T: KbItem>(rows: &mut [T], query: &ItemQuery, mut update: impl FnMut(&mut T)) -> usize {
    let mut changed = 0;
    for row in rows.iter_mut().filter(|row| query.matches(&**row)) {
        update(row);
        changed += 1;
    }
    changed
}
