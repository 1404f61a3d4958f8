use std::path::{
    Path,
    PathBuf,
};

use chrono::{
    Days,
    Local,
    NaiveDate,
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
    cards::{
        write_kanji_csv,
        write_vocab_csv,
        CardFactory,
    },
    core::{
        utils::unique_kanjis,
        BookToCardsError,
        ItemKind,
        ItemQuery,
        KanjiRecord,
        TokenRecord,
    },
    kb::KnowledgeBase,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledToken {
    pub token: String,
    pub source_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledKanji {
    pub kanji: char,
    pub source_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaterToken {
    pub token: String,
    pub source_name: String,
    pub study_from: NaiveDate,
}

fn first_seq(token: &TokenRecord) -> usize {
    token.first_seq_id().unwrap_or(usize::MAX)
}

fn token_key(token: &str, source_name: &str) -> ScheduledToken {
    ScheduledToken { token: token.to_string(), source_name: source_name.to_string() }
}

/// Where `add_vocab_of_interest` put a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    NextRound,
    Uncertain,
}

/// What `resolve_uncertain_vocab` did with the uncertain list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub next_round: Vec<String>,
    pub later_rounds: Vec<String>,
    pub dropped: Vec<String>,
}

/// Paths of the card files written by `end_scheduling`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFiles {
    pub vocab: PathBuf,
    pub kanji: PathBuf,
}

/// One study-planning session. Nothing touches the knowledge base before
/// [`Scheduler::end_scheduling`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduler {
    pub n_days_study: u32,
    pub n_cards_days: u32,
    pub min_days_btwn_kanji_and_voc: u32,
    pub today: NaiveDate,
    pub due_vocab: Vec<ScheduledToken>,
    pub vocab_for_next_round: Vec<ScheduledToken>,
    pub kanji_for_next_round: Vec<ScheduledKanji>,
    pub vocab_for_rounds_after_next: Vec<LaterToken>,
    pub uncertain_vocab: Vec<ScheduledToken>,
    pub vocab_to_add_to_known: Vec<String>,
    pub vocab_to_add_to_suspended: Vec<ScheduledToken>,
    pub kanji_to_add_to_known: Vec<char>,
    pub kanji_to_add_to_suspended: Vec<ScheduledKanji>,
}

impl Scheduler {
    pub fn new(
        kb: &KnowledgeBase,
        n_days_study: u32,
        n_cards_days: u32,
        min_days_btwn_kanji_and_voc: u32,
        today: NaiveDate,
    ) -> Result<Self, BookToCardsError> {
        if n_days_study >= min_days_btwn_kanji_and_voc {
            return Err(BookToCardsError::InvalidStudySettings(format!(
                "n_days_study ({}) must be lower than min_days_btwn_kanji_and_voc ({})",
                n_days_study, min_days_btwn_kanji_and_voc
            )));
        }
        if n_days_study == 0 || n_cards_days == 0 {
            return Err(BookToCardsError::InvalidStudySettings(
                "n_days_study and n_cards_days must be positive".to_string(),
            ));
        }

        let mut scheduler = Scheduler {
            n_days_study,
            n_cards_days,
            min_days_btwn_kanji_and_voc,
            today,
            due_vocab: Vec::new(),
            vocab_for_next_round: Vec::new(),
            kanji_for_next_round: Vec::new(),
            vocab_for_rounds_after_next: Vec::new(),
            uncertain_vocab: Vec::new(),
            vocab_to_add_to_known: Vec::new(),
            vocab_to_add_to_suspended: Vec::new(),
            kanji_to_add_to_known: Vec::new(),
            kanji_to_add_to_suspended: Vec::new(),
        };

        let horizon = scheduler.date_after(n_days_study);
        let due_query = ItemQuery {
            only_not_added: true,
            only_not_known: true,
            only_not_suspended: true,
            ..ItemQuery::default()
        }
        .max_study_date(horizon);
        for row in kb.token_items(&due_query) {
            if scheduler.n_scheduled() >= scheduler.capacity() {
                warn!("Too many due items, {} left for later", row.token);
                continue;
            }
            let key = token_key(&row.token, &row.source_name);
            scheduler.due_vocab.push(key.clone());
            scheduler.vocab_for_next_round.push(key);
        }
        info!("{} due vocabulary items scheduled for the next round", scheduler.due_vocab.len());
        Ok(scheduler)
    }

    fn date_after(&self, days: u32) -> NaiveDate {
        self.today.checked_add_days(Days::new(u64::from(days))).unwrap_or(NaiveDate::MAX)
    }

    pub fn capacity(&self) -> usize {
        (self.n_days_study as usize).saturating_mul(self.n_cards_days as usize)
    }

    pub fn n_scheduled(&self) -> usize {
        self.vocab_for_next_round.len() + self.kanji_for_next_round.len()
    }

    fn check_capacity(&self) -> Result<(), BookToCardsError> {
        if self.n_scheduled() >= self.capacity() {
            return Err(BookToCardsError::EnoughItemsAdded {
                added: self.n_scheduled(),
                max: self.capacity(),
            });
        }
        Ok(())
    }

    fn is_vocab_scheduled(&self, token: &str) -> bool {
        self.vocab_for_next_round.iter().any(|v| v.token == token)
            || self.vocab_for_rounds_after_next.iter().any(|v| v.token == token)
            || self.uncertain_vocab.iter().any(|v| v.token == token)
    }

    fn is_vocab_pending(&self, token: &str, source_name: &str) -> bool {
        self.vocab_to_add_to_known.iter().any(|t| t == token)
            || self.vocab_to_add_to_suspended.contains(&token_key(token, source_name))
    }

    fn is_kanji_pending(&self, kanji: char, source_name: &str) -> bool {
        self.kanji_to_add_to_known.contains(&kanji)
            || self
                .kanji_to_add_to_suspended
                .iter()
                .any(|k| k.kanji == kanji && k.source_name == source_name)
    }

    fn is_kanji_for_next_round(&self, kanji: char) -> bool {
        self.kanji_for_next_round.iter().any(|k| k.kanji == kanji)
    }

    fn ensure_addable_vocab(
        &self,
        kb: &KnowledgeBase,
        token: &str,
        source_name: &str,
    ) -> Result<(), BookToCardsError> {
        let in_kb = !kb.token_items(&ItemQuery::addable().value(token).source(source_name)).is_empty();
        let already_placed = self.vocab_for_next_round.iter().any(|v| v.token == token)
            || self.vocab_for_rounds_after_next.iter().any(|v| v.token == token);
        if !in_kb || already_placed || self.is_vocab_pending(token, source_name) {
            return Err(BookToCardsError::NoAddableEntry {
                item: token.to_string(),
                source_name: source_name.to_string(),
            });
        }
        Ok(())
    }

    fn is_kanji_known(&self, kb: &KnowledgeBase, kanji: char) -> bool {
        self.kanji_to_add_to_known.contains(&kanji)
            || kb.kanji_items(&ItemQuery::all().value(kanji.to_string())).iter().any(|k| k.is_known)
    }

    /// Kanji of `token` that are neither known nor about to be marked known.
    pub fn unknown_kanjis(&self, kb: &KnowledgeBase, token: &str) -> Vec<char> {
        unique_kanjis(token).into_iter().filter(|&k| !self.is_kanji_known(kb, k)).collect()
    }

    /// Adds the token to the next round when all its kanji are known,
    /// otherwise keeps it aside until its kanji are checked.
    pub fn add_vocab_of_interest(
        &mut self,
        kb: &KnowledgeBase,
        token: &str,
        source_name: &str,
    ) -> Result<Placement, BookToCardsError> {
        if !self.uncertain_vocab.is_empty() {
            return Err(BookToCardsError::UncertainVocabRemains(self.uncertain_vocab.len()));
        }
        self.place_vocab_of_interest(kb, token, source_name)
    }

    /// Same as [`Scheduler::add_vocab_of_interest`] for a whole selection: the
    /// uncertain list must be empty before the selection, not between items.
    pub fn add_vocabs_of_interest(
        &mut self,
        kb: &KnowledgeBase,
        tokens: &[String],
        source_name: &str,
    ) -> Result<Vec<(String, Placement)>, BookToCardsError> {
        if !self.uncertain_vocab.is_empty() {
            return Err(BookToCardsError::UncertainVocabRemains(self.uncertain_vocab.len()));
        }
        let mut placed = Vec::with_capacity(tokens.len());
        for token in tokens {
            let placement = self.place_vocab_of_interest(kb, token, source_name)?;
            placed.push((token.clone(), placement));
        }
        Ok(placed)
    }

    fn place_vocab_of_interest(
        &mut self,
        kb: &KnowledgeBase,
        token: &str,
        source_name: &str,
    ) -> Result<Placement, BookToCardsError> {
        self.check_capacity()?;
        self.ensure_addable_vocab(kb, token, source_name)?;
        if self.uncertain_vocab.contains(&token_key(token, source_name)) {
            return Err(BookToCardsError::NoAddableEntry {
                item: token.to_string(),
                source_name: source_name.to_string(),
            });
        }

        if self.unknown_kanjis(kb, token).is_empty() {
            self.vocab_for_next_round.push(token_key(token, source_name));
            Ok(Placement::NextRound)
        } else {
            self.uncertain_vocab.push(token_key(token, source_name));
            Ok(Placement::Uncertain)
        }
    }

    pub fn add_vocab_for_next_round(
        &mut self,
        kb: &KnowledgeBase,
        token: &str,
        source_name: &str,
    ) -> Result<(), BookToCardsError> {
        self.check_capacity()?;
        self.ensure_addable_vocab(kb, token, source_name)?;
        let unknown = self.unknown_kanjis(kb, token);
        if !unknown.is_empty() {
            return Err(BookToCardsError::KanjiNotKnown { token: token.to_string(), kanjis: unknown });
        }

        let key = token_key(token, source_name);
        self.uncertain_vocab.retain(|v| v != &key);
        self.vocab_for_next_round.push(key);
        Ok(())
    }

    pub fn add_kanji_for_next_round(
        &mut self,
        kb: &KnowledgeBase,
        kanji: char,
        source_name: &str,
    ) -> Result<(), BookToCardsError> {
        self.check_capacity()?;
        let in_kb = !kb
            .kanji_items(&ItemQuery::addable().value(kanji.to_string()).source(source_name))
            .is_empty();
        if !in_kb || self.is_kanji_for_next_round(kanji) || self.is_kanji_pending(kanji, source_name) {
            return Err(BookToCardsError::NoAddableEntry {
                item: kanji.to_string(),
                source_name: source_name.to_string(),
            });
        }
        self.kanji_for_next_round.push(ScheduledKanji { kanji, source_name: source_name.to_string() });
        Ok(())
    }

    /// Schedules an uncertain token after its kanji have been studied.
    pub fn add_vocab_for_rounds_after_next(
        &mut self,
        kb: &KnowledgeBase,
        token: &str,
        source_name: &str,
    ) -> Result<NaiveDate, BookToCardsError> {
        let key = token_key(token, source_name);
        if !self.uncertain_vocab.contains(&key) {
            return Err(BookToCardsError::NotUncertain {
                token: token.to_string(),
                source_name: source_name.to_string(),
            });
        }
        let missing: Vec<char> = self
            .unknown_kanjis(kb, token)
            .into_iter()
            .filter(|&k| !self.is_kanji_for_next_round(k))
            .collect();
        if !missing.is_empty() {
            return Err(BookToCardsError::KanjiNotKnownOrAdded {
                token: token.to_string(),
                kanjis: missing,
            });
        }

        let study_from = self.date_after(self.min_days_btwn_kanji_and_voc);
        self.uncertain_vocab.retain(|v| v != &key);
        self.vocab_for_rounds_after_next.push(LaterToken {
            token: token.to_string(),
            source_name: source_name.to_string(),
            study_from,
        });
        Ok(study_from)
    }

    pub fn set_vocab_to_add_to_known(&mut self, token: &str) {
        if !self.vocab_to_add_to_known.iter().any(|t| t == token) {
            self.vocab_to_add_to_known.push(token.to_string());
        }
        self.uncertain_vocab.retain(|v| v.token != token);
    }

    pub fn set_vocab_to_add_to_suspended(&mut self, token: &str, source_name: &str) {
        let key = token_key(token, source_name);
        self.uncertain_vocab.retain(|v| v != &key);
        if !self.vocab_to_add_to_suspended.contains(&key) {
            self.vocab_to_add_to_suspended.push(key);
        }
    }

    pub fn set_kanji_to_add_to_known(&mut self, kanji: char) {
        if !self.kanji_to_add_to_known.contains(&kanji) {
            self.kanji_to_add_to_known.push(kanji);
        }
    }

    pub fn set_kanji_to_add_to_suspended(&mut self, kanji: char, source_name: &str) {
        let key = ScheduledKanji { kanji, source_name: source_name.to_string() };
        if !self.kanji_to_add_to_suspended.contains(&key) {
            self.kanji_to_add_to_suspended.push(key);
        }
    }

    /// Vocabulary that can still be picked, most frequent first when
    /// `sort_by_count`, earliest first appearance first when `sort_by_seq_id`.
    pub fn studiable_vocab<'a>(
        &self,
        kb: &'a KnowledgeBase,
        min_count: usize,
        sort_by_seq_id: bool,
        sort_by_count: bool,
        source_name: Option<&str>,
    ) -> Vec<&'a TokenRecord> {
        let mut rows: Vec<&TokenRecord> = kb
            .token_items(&ItemQuery::addable().source_opt(source_name))
            .into_iter()
            .filter(|t| t.count >= min_count)
            .filter(|t| !self.is_vocab_scheduled(&t.token))
            .filter(|t| !self.is_vocab_pending(&t.token, &t.source_name))
            .collect();

        match (sort_by_count, sort_by_seq_id) {
            (true, true) => {
                rows.sort_by(|a, b| b.count.cmp(&a.count).then(first_seq(a).cmp(&first_seq(b))))
            }
            (true, false) => rows.sort_by(|a, b| b.count.cmp(&a.count)),
            (false, true) => rows.sort_by_key(|t| first_seq(t)),
            (false, false) => {}
        }
        rows
    }

    pub fn studiable_kanji<'a>(
        &self,
        kb: &'a KnowledgeBase,
        source_name: Option<&str>,
    ) -> Vec<&'a KanjiRecord> {
        kb.kanji_items(&ItemQuery::addable().source_opt(source_name))
            .into_iter()
            .filter(|k| !self.is_kanji_for_next_round(k.kanji))
            .filter(|k| !self.is_kanji_pending(k.kanji, &k.source_name))
            .collect()
    }

    /// Kanji of the uncertain vocabulary the user still has to decide on.
    pub fn kanjis_to_check<'a>(&self, kb: &'a KnowledgeBase) -> Vec<&'a KanjiRecord> {
        let mut kanjis: Vec<&KanjiRecord> = Vec::new();
        for vocab in &self.uncertain_vocab {
            for kanji in unique_kanjis(&vocab.token) {
                if self.is_kanji_for_next_round(kanji) || self.is_kanji_pending(kanji, &vocab.source_name)
                {
                    continue;
                }
                let query = ItemQuery {
                    only_not_added: true,
                    only_not_known: true,
                    only_not_suspended: true,
                    ..ItemQuery::default()
                }
                .value(kanji.to_string())
                .source(vocab.source_name.as_str());
                for row in kb.kanji_items(&query) {
                    if !kanjis.iter().any(|k| k.kanji == row.kanji) {
                        kanjis.push(row);
                    }
                }
            }
        }
        kanjis
    }

    /// Places every uncertain token once its kanji have all been decided on.
    pub fn resolve_uncertain_vocab(
        &mut self,
        kb: &KnowledgeBase,
    ) -> Result<Resolution, BookToCardsError> {
        if !self.kanjis_to_check(kb).is_empty() {
            return Err(BookToCardsError::UncertainVocabRemains(self.uncertain_vocab.len()));
        }

        let mut resolution = Resolution::default();
        let uncertain = self.uncertain_vocab.clone();
        for vocab in uncertain {
            match self.add_vocab_for_next_round(kb, &vocab.token, &vocab.source_name) {
                Ok(()) => resolution.next_round.push(vocab.token),
                Err(BookToCardsError::KanjiNotKnown { .. }) => {
                    match self.add_vocab_for_rounds_after_next(kb, &vocab.token, &vocab.source_name) {
                        Ok(_) => resolution.later_rounds.push(vocab.token),
                        Err(BookToCardsError::KanjiNotKnownOrAdded { kanjis, .. }) => {
                            warn!("Dropping {}: kanji {:?} will not be studied", vocab.token, kanjis);
                            self.uncertain_vocab.retain(|v| v != &vocab);
                            resolution.dropped.push(vocab.token);
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(BookToCardsError::EnoughItemsAdded { .. }) => {
                    warn!("Next round is full, dropping the remaining uncertain vocabulary");
                    resolution.dropped.extend(self.uncertain_vocab.drain(..).map(|v| v.token));
                    break;
                }
                Err(BookToCardsError::NoAddableEntry { .. }) => {
                    self.uncertain_vocab.retain(|v| v != &vocab);
                    resolution.dropped.push(vocab.token);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(resolution)
    }

    pub fn empty_uncertain_vocab(&mut self) {
        self.uncertain_vocab.clear();
    }

    /// Writes the cards of the next round, applies every pending change to
    /// the knowledge base and saves it with a backup.
    pub fn end_scheduling(
        self,
        kb: &mut KnowledgeBase,
        card_factory: &dyn CardFactory,
        cards_dir: &Path,
        for_anki: bool,
    ) -> Result<CardFiles, BookToCardsError> {
        if !self.uncertain_vocab.is_empty() {
            warn!("{} uncertain vocabulary items are dropped", self.uncertain_vocab.len());
        }

        let vocab_rows: Vec<TokenRecord> = self
            .vocab_for_next_round
            .iter()
            .filter_map(|v| kb.token(&v.token, &v.source_name).cloned())
            .collect();
        let kanji_rows: Vec<KanjiRecord> = self
            .kanji_for_next_round
            .iter()
            .filter_map(|k| kb.kanji(k.kanji, &k.source_name).cloned())
            .collect();
        let vocab_cards = card_factory.make_vocab_cards(kb, &vocab_rows, for_anki)?;
        let kanji_cards = card_factory.make_kanji_cards(kb, &kanji_rows, for_anki)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let files = CardFiles {
            vocab: cards_dir.join(format!("{}_vocab.csv", timestamp)),
            kanji: cards_dir.join(format!("{}_kanji.csv", timestamp)),
        };
        write_vocab_csv(&files.vocab, &vocab_cards, for_anki)?;
        write_kanji_csv(&files.kanji, &kanji_cards, for_anki)?;

        for vocab in &self.vocab_for_next_round {
            kb.set_added_to_anki(ItemKind::Token, &vocab.token, &vocab.source_name);
        }
        for kanji in &self.kanji_for_next_round {
            kb.set_added_to_anki(ItemKind::Kanji, &kanji.kanji.to_string(), &kanji.source_name);
        }
        for vocab in &self.vocab_for_rounds_after_next {
            kb.set_study_from_date(&vocab.token, &vocab.source_name, vocab.study_from);
        }
        for token in &self.vocab_to_add_to_known {
            kb.set_known(ItemKind::Token, token);
        }
        for vocab in &self.vocab_to_add_to_suspended {
            kb.set_suspended_for_source(ItemKind::Token, &vocab.token, &vocab.source_name);
        }
        for kanji in &self.kanji_to_add_to_known {
            kb.set_known(ItemKind::Kanji, &kanji.to_string());
        }
        for kanji in &self.kanji_to_add_to_suspended {
            kb.set_suspended_for_source(ItemKind::Kanji, &kanji.kanji.to_string(), &kanji.source_name);
        }
        kb.save(true)?;

        info!(
            "Wrote {} vocabulary and {} kanji cards to {}",
            vocab_cards.len(),
            kanji_cards.len(),
            cards_dir.display()
        );
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cards::{
            KanjiCard,
            VocabCard,
        },
        test_support::FakeLemmatizer,
    };

    const DOC: &str = "食べる飲む歌う。歌う。感じる。笑う。寝る。";
    const DOC2: &str = "眠る？起きる？食べる。";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn kb_with(docs: &[(&str, &str)]) -> (tempfile::TempDir, KnowledgeBase) {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = KnowledgeBase::open(dir.path()).unwrap();
        for (doc, name) in docs {
            kb.add_doc(doc, name, &FakeLemmatizer::new(), false, None).unwrap();
        }
        (dir, kb)
    }

    fn scheduler(kb: &KnowledgeBase) -> Scheduler {
        Scheduler::new(kb, 2, 3, 5, today()).unwrap()
    }

    struct MockCardFactory;

    impl CardFactory for MockCardFactory {
        fn make_vocab_cards(
            &self,
            _kb: &KnowledgeBase,
            tokens: &[TokenRecord],
            _for_anki: bool,
        ) -> Result<Vec<VocabCard>, BookToCardsError> {
            Ok(tokens
                .iter()
                .map(|t| VocabCard { token: t.token.clone(), ..VocabCard::default() })
                .collect())
        }

        fn make_kanji_cards(
            &self,
            _kb: &KnowledgeBase,
            kanjis: &[KanjiRecord],
            _for_anki: bool,
        ) -> Result<Vec<KanjiCard>, BookToCardsError> {
            Ok(kanjis
                .iter()
                .map(|k| KanjiCard { kanji: k.kanji.to_string(), ..KanjiCard::default() })
                .collect())
        }
    }

    #[test]
    fn test_init_checks_settings() {
        let (_dir, kb) = kb_with(&[]);
        assert!(matches!(
            Scheduler::new(&kb, 5, 3, 5, today()),
            Err(BookToCardsError::InvalidStudySettings(_))
        ));
        assert!(Scheduler::new(&kb, 4, 3, 5, today()).is_ok());
        assert!(matches!(
            Scheduler::new(&kb, 0, 3, 5, today()),
            Err(BookToCardsError::InvalidStudySettings(_))
        ));
        assert!(matches!(
            Scheduler::new(&kb, 4, 0, 5, today()),
            Err(BookToCardsError::InvalidStudySettings(_))
        ));
    }

    #[test]
    fn test_capacity_of_large_settings() {
        let (_dir, kb) = kb_with(&[]);
        let scheduler = Scheduler::new(&kb, u32::MAX - 1, u32::MAX, u32::MAX, today()).unwrap();
        assert_eq!(scheduler.capacity(), (u32::MAX as usize - 1).saturating_mul(u32::MAX as usize));
    }

    #[test]
    fn test_init_schedules_due_vocab() {
        let (_dir, mut kb) = kb_with(&[(DOC, "doc1")]);
        kb.set_study_from_date("食べる", "doc1", today());
        kb.set_study_from_date("飲む", "doc1", today().checked_add_days(Days::new(2)).unwrap());
        kb.set_study_from_date("歌う", "doc1", today().checked_add_days(Days::new(3)).unwrap());

        let scheduler = scheduler(&kb);
        let due: Vec<&str> = scheduler.due_vocab.iter().map(|v| v.token.as_str()).collect();
        assert_eq!(due, vec!["食べる", "飲む"]);
        assert_eq!(scheduler.vocab_for_next_round.len(), 2);
    }

    #[test]
    fn test_init_caps_due_vocab_at_capacity() {
        let (_dir, mut kb) = kb_with(&[(DOC, "doc1")]);
        for token in ["食べる", "飲む", "歌う", "感じる", "笑う", "寝る"] {
            kb.set_study_from_date(token, "doc1", today());
        }
        let scheduler = Scheduler::new(&kb, 1, 4, 5, today()).unwrap();
        assert_eq!(scheduler.vocab_for_next_round.len(), 4);
    }

    #[test]
    fn test_add_vocab_of_interest() {
        let (_dir, mut kb) = kb_with(&[(DOC, "doc1")]);
        kb.set_known(ItemKind::Kanji, "食");
        let mut scheduler = scheduler(&kb);

        assert_eq!(scheduler.add_vocab_of_interest(&kb, "食べる", "doc1").unwrap(), Placement::NextRound);
        assert_eq!(scheduler.add_vocab_of_interest(&kb, "飲む", "doc1").unwrap(), Placement::Uncertain);
        assert!(matches!(
            scheduler.add_vocab_of_interest(&kb, "歌う", "doc1"),
            Err(BookToCardsError::UncertainVocabRemains(1))
        ));

        scheduler.empty_uncertain_vocab();
        assert!(matches!(
            scheduler.add_vocab_of_interest(&kb, "食べる", "doc1"),
            Err(BookToCardsError::NoAddableEntry { .. })
        ));
        assert!(matches!(
            scheduler.add_vocab_of_interest(&kb, "鳥", "doc1"),
            Err(BookToCardsError::NoAddableEntry { .. })
        ));

        scheduler.set_kanji_to_add_to_known('歌');
        assert_eq!(scheduler.add_vocab_of_interest(&kb, "歌う", "doc1").unwrap(), Placement::NextRound);
    }

    #[test]
    fn test_add_vocabs_of_interest_checks_uncertain_once() {
        let (_dir, kb) = kb_with(&[(DOC, "doc1")]);
        let mut scheduler = scheduler(&kb);
        let tokens = vec!["食べる".to_string(), "飲む".to_string()];
        let placed = scheduler.add_vocabs_of_interest(&kb, &tokens, "doc1").unwrap();
        assert_eq!(placed.iter().filter(|(_, p)| *p == Placement::Uncertain).count(), 2);
        assert!(scheduler.add_vocabs_of_interest(&kb, &["歌う".to_string()], "doc1").is_err());
    }

    #[test]
    fn test_capacity_is_enforced() {
        let (_dir, kb) = kb_with(&[(DOC, "doc1")]);
        let mut scheduler = Scheduler::new(&kb, 1, 2, 5, today()).unwrap();
        scheduler.add_kanji_for_next_round(&kb, '食', "doc1").unwrap();
        scheduler.add_kanji_for_next_round(&kb, '飲', "doc1").unwrap();
        assert!(matches!(
            scheduler.add_kanji_for_next_round(&kb, '歌', "doc1"),
            Err(BookToCardsError::EnoughItemsAdded { added: 2, max: 2 })
        ));
        assert!(matches!(
            scheduler.add_vocab_of_interest(&kb, "歌う", "doc1"),
            Err(BookToCardsError::EnoughItemsAdded { .. })
        ));
    }

    #[test]
    fn test_add_vocab_for_next_round() {
        let (_dir, mut kb) = kb_with(&[(DOC, "doc1")]);
        kb.set_known(ItemKind::Kanji, "食");
        let mut scheduler = scheduler(&kb);

        scheduler.add_vocab_for_next_round(&kb, "食べる", "doc1").unwrap();
        assert!(matches!(
            scheduler.add_vocab_for_next_round(&kb, "食べる", "doc1"),
            Err(BookToCardsError::NoAddableEntry { .. })
        ));

        // A kanji studied in the same round is not known yet
        scheduler.add_kanji_for_next_round(&kb, '飲', "doc1").unwrap();
        assert!(matches!(
            scheduler.add_vocab_for_next_round(&kb, "飲む", "doc1"),
            Err(BookToCardsError::KanjiNotKnown { .. })
        ));

        scheduler.set_kanji_to_add_to_known('歌');
        scheduler.add_vocab_for_next_round(&kb, "歌う", "doc1").unwrap();
        assert_eq!(scheduler.n_scheduled(), 3);
    }

    #[test]
    fn test_add_kanji_for_next_round() {
        let (_dir, mut kb) = kb_with(&[(DOC, "doc1")]);
        kb.set_known(ItemKind::Kanji, "食");
        let mut scheduler = scheduler(&kb);

        scheduler.add_kanji_for_next_round(&kb, '飲', "doc1").unwrap();
        for kanji in ['飲', '食', '猫'] {
            assert!(matches!(
                scheduler.add_kanji_for_next_round(&kb, kanji, "doc1"),
                Err(BookToCardsError::NoAddableEntry { .. })
            ));
        }
    }

    #[test]
    fn test_add_vocab_for_rounds_after_next() {
        let (_dir, kb) = kb_with(&[(DOC, "doc1")]);
        let mut scheduler = scheduler(&kb);

        assert!(matches!(
            scheduler.add_vocab_for_rounds_after_next(&kb, "飲む", "doc1"),
            Err(BookToCardsError::NotUncertain { .. })
        ));
        scheduler.add_vocab_of_interest(&kb, "飲む", "doc1").unwrap();
        assert!(matches!(
            scheduler.add_vocab_for_rounds_after_next(&kb, "飲む", "doc1"),
            Err(BookToCardsError::KanjiNotKnownOrAdded { .. })
        ));

        scheduler.add_kanji_for_next_round(&kb, '飲', "doc1").unwrap();
        let date = scheduler.add_vocab_for_rounds_after_next(&kb, "飲む", "doc1").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert!(scheduler.uncertain_vocab.is_empty());
        assert_eq!(scheduler.vocab_for_rounds_after_next.len(), 1);
    }

    #[test]
    fn test_get_studiable_voc_1_doc() {
        let (_dir, mut kb) = kb_with(&[(DOC, "doc1")]);
        kb.set_known(ItemKind::Kanji, "食");
        let mut scheduler = scheduler(&kb);
        assert_eq!(scheduler.studiable_vocab(&kb, 1, true, true, Some("doc1")).len(), 6);

        scheduler.add_vocab_for_next_round(&kb, "食べる", "doc1").unwrap();
        assert_eq!(scheduler.studiable_vocab(&kb, 1, true, true, Some("doc1")).len(), 5);
        scheduler.set_vocab_to_add_to_known("歌う");
        assert_eq!(scheduler.studiable_vocab(&kb, 1, true, true, Some("doc1")).len(), 4);
        scheduler.set_vocab_to_add_to_suspended("感じる", "doc1");
        assert_eq!(scheduler.studiable_vocab(&kb, 1, true, true, Some("doc1")).len(), 3);
        scheduler.add_vocab_of_interest(&kb, "飲む", "doc1").unwrap();
        assert_eq!(scheduler.studiable_vocab(&kb, 1, true, true, Some("doc1")).len(), 2);
    }

    #[test]
    fn test_get_studiable_voc_2_docs() {
        let (_dir, kb) = kb_with(&[(DOC, "doc1"), (DOC2, "doc2")]);
        let scheduler = scheduler(&kb);
        assert_eq!(scheduler.studiable_vocab(&kb, 1, false, false, None).len(), 9);
        assert_eq!(scheduler.studiable_vocab(&kb, 1, false, false, Some("doc2")).len(), 3);
    }

    #[test]
    fn test_studiable_vocab_sorting() {
        let (_dir, kb) = kb_with(&[(DOC, "doc1")]);
        let scheduler = scheduler(&kb);
        let tokens = |rows: Vec<&TokenRecord>| -> Vec<String> {
            rows.iter().map(|t| t.token.clone()).collect()
        };

        let by_count = tokens(scheduler.studiable_vocab(&kb, 1, true, true, None));
        assert_eq!(by_count, vec!["歌う", "食べる", "飲む", "感じる", "笑う", "寝る"]);
        let frequent = tokens(scheduler.studiable_vocab(&kb, 2, true, true, None));
        assert_eq!(frequent, vec!["歌う"]);
        let by_seq = tokens(scheduler.studiable_vocab(&kb, 1, true, false, None));
        assert_eq!(by_seq[0], "食べる");
    }

    #[test]
    fn test_get_studiable_kanji() {
        let (_dir, mut kb) = kb_with(&[(DOC, "doc1")]);
        let mut scheduler = scheduler(&kb);
        assert_eq!(scheduler.studiable_kanji(&kb, Some("doc1")).len(), 6);

        kb.set_known(ItemKind::Kanji, "食");
        assert_eq!(scheduler.studiable_kanji(&kb, Some("doc1")).len(), 5);
        scheduler.add_kanji_for_next_round(&kb, '飲', "doc1").unwrap();
        assert_eq!(scheduler.studiable_kanji(&kb, Some("doc1")).len(), 4);
        scheduler.set_kanji_to_add_to_known('歌');
        assert_eq!(scheduler.studiable_kanji(&kb, Some("doc1")).len(), 3);
        scheduler.set_kanji_to_add_to_suspended('感', "doc1");
        assert_eq!(scheduler.studiable_kanji(&kb, Some("doc1")).len(), 2);
    }

    #[test]
    fn test_kanjis_to_check_and_resolve() {
        let (_dir, kb) = kb_with(&[(DOC, "doc1")]);
        let mut scheduler = scheduler(&kb);
        let tokens = vec!["飲む".to_string(), "歌う".to_string(), "感じる".to_string()];
        scheduler.add_vocabs_of_interest(&kb, &tokens, "doc1").unwrap();

        let to_check: Vec<char> = scheduler.kanjis_to_check(&kb).iter().map(|k| k.kanji).collect();
        assert_eq!(to_check, vec!['飲', '歌', '感']);
        assert!(matches!(
            scheduler.resolve_uncertain_vocab(&kb),
            Err(BookToCardsError::UncertainVocabRemains(3))
        ));

        scheduler.set_kanji_to_add_to_known('飲');
        scheduler.add_kanji_for_next_round(&kb, '歌', "doc1").unwrap();
        scheduler.set_kanji_to_add_to_suspended('感', "doc1");
        assert!(scheduler.kanjis_to_check(&kb).is_empty());

        let resolution = scheduler.resolve_uncertain_vocab(&kb).unwrap();
        assert_eq!(resolution.next_round, vec!["飲む"]);
        assert_eq!(resolution.later_rounds, vec!["歌う"]);
        assert_eq!(resolution.dropped, vec!["感じる"]);
        assert!(scheduler.uncertain_vocab.is_empty());
    }

    #[test]
    fn test_resolve_empties_list_when_full() {
        let (_dir, kb) = kb_with(&[(DOC, "doc1")]);
        let mut scheduler = Scheduler::new(&kb, 1, 2, 5, today()).unwrap();
        let tokens = vec!["飲む".to_string(), "歌う".to_string()];
        scheduler.add_vocabs_of_interest(&kb, &tokens, "doc1").unwrap();
        scheduler.set_kanji_to_add_to_known('飲');
        scheduler.set_kanji_to_add_to_known('歌');
        scheduler.add_kanji_for_next_round(&kb, '食', "doc1").unwrap();

        let resolution = scheduler.resolve_uncertain_vocab(&kb).unwrap();
        assert_eq!(resolution.next_round, vec!["飲む"]);
        assert_eq!(resolution.dropped, vec!["歌う"]);
        assert!(scheduler.uncertain_vocab.is_empty());
    }

    #[test]
    fn test_end_scheduling() {
        let (dir, mut kb) = kb_with(&[(DOC, "doc1")]);
        kb.set_known(ItemKind::Kanji, "食");
        let mut scheduler = scheduler(&kb);

        scheduler.add_vocab_of_interest(&kb, "食べる", "doc1").unwrap();
        scheduler.add_vocab_of_interest(&kb, "飲む", "doc1").unwrap();
        scheduler.add_kanji_for_next_round(&kb, '飲', "doc1").unwrap();
        scheduler.add_vocab_for_rounds_after_next(&kb, "飲む", "doc1").unwrap();
        scheduler.add_vocab_of_interest(&kb, "歌う", "doc1").unwrap();
        scheduler.set_vocab_to_add_to_known("笑う");
        scheduler.set_vocab_to_add_to_suspended("寝る", "doc1");
        scheduler.set_kanji_to_add_to_known('感');
        scheduler.set_kanji_to_add_to_suspended('歌', "doc1");

        let cards_dir = dir.path().join("cards");
        let files = scheduler.end_scheduling(&mut kb, &MockCardFactory, &cards_dir, false).unwrap();
        assert!(files.vocab.exists());
        assert!(files.kanji.exists());

        assert!(kb.token("食べる", "doc1").unwrap().is_added_to_anki);
        assert!(kb.kanji('飲', "doc1").unwrap().is_added_to_anki);
        assert_eq!(
            kb.token("飲む", "doc1").unwrap().to_be_studied_from,
            NaiveDate::from_ymd_opt(2024, 5, 6)
        );
        assert!(!kb.token("飲む", "doc1").unwrap().is_added_to_anki);
        assert!(kb.token("笑う", "doc1").unwrap().is_known);
        assert!(kb.token("寝る", "doc1").unwrap().is_suspended_for_source);
        assert!(kb.kanji('感', "doc1").unwrap().is_known);
        assert!(kb.kanji('歌', "doc1").unwrap().is_suspended_for_source);
        // Uncertain vocabulary is dropped untouched
        let uta = kb.token("歌う", "doc1").unwrap();
        assert!(!uta.is_added_to_anki && uta.to_be_studied_from.is_none());

        let reloaded = KnowledgeBase::open(kb.dir()).unwrap();
        assert!(reloaded.token("食べる", "doc1").unwrap().is_added_to_anki);
        assert!(kb.dir().join(crate::kb::BACKUP_DIR).join(crate::kb::TOKENS_FILE).exists());
    }

    #[test]
    fn test_state_survives_serialization() {
        let (_dir, kb) = kb_with(&[(DOC, "doc1")]);
        let mut scheduler = scheduler(&kb);
        scheduler.add_vocab_of_interest(&kb, "飲む", "doc1").unwrap();
        scheduler.set_kanji_to_add_to_known('食');

        let json = serde_json::to_string(&scheduler).unwrap();
        let restored: Scheduler = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, scheduler);
    }
}
