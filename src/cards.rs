use std::{
    fs,
    path::Path,
};

use serde::Serialize;
use tracing::{
    info,
    warn,
};

use crate::{
    core::{
        BookToCardsError,
        KanjiRecord,
        TokenRecord,
    },
    dictionary::{
        frequency_manager::FrequencyManager,
        jmdict::{
            DictEntry,
            Jmdict,
        },
        sanseido::Sanseido,
    },
    kb::KnowledgeBase,
    settings::CardSettings,
    tatoeba::TatoebaCorpus,
    translate::Translator,
};

/// One card per dictionary entry of a lemma.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VocabCard {
    pub entry_id: i64,
    #[serde(rename = "lemma")]
    pub token: String,
    pub count: usize,
    pub kana_forms_str: String,
    pub kanji_forms_str: String,
    pub is_frequent: bool,
    pub frequency_rank: Option<u32>,
    pub meanings_str: String,
    pub sanseido_def_str: String,
    pub examples_str: String,
    pub source_name_str: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KanjiCard {
    #[serde(rename = "lemma")]
    pub kanji: String,
    pub source_name_str: String,
    pub tokens_str: String,
}

pub trait CardFactory {
    fn make_vocab_cards(
        &self,
        kb: &KnowledgeBase,
        tokens: &[TokenRecord],
        for_anki: bool,
    ) -> Result<Vec<VocabCard>, BookToCardsError>;

    fn make_kanji_cards(
        &self,
        kb: &KnowledgeBase,
        kanjis: &[KanjiRecord],
        for_anki: bool,
    ) -> Result<Vec<KanjiCard>, BookToCardsError>;
}

/// `# m1\n# m2` for several meanings, the bare meaning otherwise.
pub fn format_meanings(meanings: &[String]) -> String {
    match meanings {
        [] => String::new(),
        [single] => single.clone(),
        _ => format!("# {}", meanings.join("\n# ")),
    }
}

pub fn format_examples(
    source_name: &str,
    source_examples: &[String],
    source_translations: &[String],
    tatoeba_examples: &[(String, String)],
) -> String {
    let mut lines: Vec<String> = source_examples
        .iter()
        .enumerate()
        .map(|(i, example)| match source_translations.get(i) {
            Some(translation) => format!("[{}] {} ({})", source_name, example, translation),
            None => format!("[{}] {}", source_name, example),
        })
        .collect();
    lines.extend(tatoeba_examples.iter().map(|(jpn, eng)| format!("[tatoeba] {} ({})", jpn, eng)));

    if lines.is_empty() {
        String::new()
    } else {
        format!("# {}", lines.join("\n# "))
    }
}

pub fn format_sanseido(definitions: &[(String, Vec<String>)]) -> String {
    definitions
        .iter()
        .enumerate()
        .map(|(i, (reading, defs))| format!("Reading {}) {}\n- [def] {}", i, reading, defs.join("[def] ")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn anki_field(field: &str) -> String {
    field.replace('\n', "<br>")
}

/// Builds cards from JMdict and whatever optional sources are loaded.
pub struct CardBuilder<'a> {
    jmdict: &'a Jmdict,
    sanseido: Option<&'a Sanseido>,
    tatoeba: Option<&'a TatoebaCorpus>,
    translator: Option<&'a dyn Translator>,
    frequencies: Option<&'a FrequencyManager>,
    settings: CardSettings,
}

impl<'a> CardBuilder<'a> {
    pub fn new(jmdict: &'a Jmdict, settings: CardSettings) -> Self {
        CardBuilder { jmdict, sanseido: None, tatoeba: None, translator: None, frequencies: None, settings }
    }

    pub fn with_sanseido(mut self, sanseido: Option<&'a Sanseido>) -> Self {
        self.sanseido = sanseido;
        self
    }

    pub fn with_tatoeba(mut self, tatoeba: Option<&'a TatoebaCorpus>) -> Self {
        self.tatoeba = tatoeba;
        self
    }

    pub fn with_translator(mut self, translator: Option<&'a dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_frequencies(mut self, frequencies: Option<&'a FrequencyManager>) -> Self {
        self.frequencies = frequencies.filter(|manager| !manager.is_empty());
        self
    }

    fn source_examples(&self, kb: &KnowledgeBase, token: &TokenRecord, for_anki: bool) -> Vec<String> {
        kb.sequences(&token.seq_ids)
            .into_iter()
            .take(self.settings.max_source_examples)
            .map(|seq| {
                if for_anki {
                    seq.seq.replace('\n', &self.settings.example_linebreak)
                } else {
                    seq.seq.clone()
                }
            })
            .collect()
    }

    fn translations(&self, examples: &[String]) -> Vec<String> {
        let Some(translator) = self.translator else {
            return Vec::new();
        };
        if !self.settings.translate_source_examples {
            return Vec::new();
        }
        match translator.translate(examples) {
            Ok(translations) => translations,
            Err(e) => {
                warn!("Translation failed, keeping examples untranslated: {}", e);
                Vec::new()
            }
        }
    }

    fn vocab_card(
        &self,
        token: &TokenRecord,
        entry: &DictEntry,
        examples_str: &str,
        sanseido_def_str: &str,
    ) -> VocabCard {
        VocabCard {
            entry_id: entry.entry_id,
            token: token.token.clone(),
            count: token.count,
            kana_forms_str: entry.readings().join(", "),
            kanji_forms_str: entry.kanji_texts().join(", "),
            is_frequent: entry.is_frequent(),
            frequency_rank: self
                .frequencies
                .and_then(|manager| manager.best_rank(&token.token, &entry.readings())),
            meanings_str: format_meanings(&entry.meanings),
            sanseido_def_str: sanseido_def_str.to_string(),
            examples_str: examples_str.to_string(),
            source_name_str: token.source_name.clone(),
        }
    }

    fn reading_of(&self, token: &str) -> Option<String> {
        self.jmdict
            .get_dict_entries(token, true, true)
            .first()
            .and_then(|entry| entry.readings().into_iter().next())
    }
}

impl CardFactory for CardBuilder<'_> {
    fn make_vocab_cards(
        &self,
        kb: &KnowledgeBase,
        tokens: &[TokenRecord],
        for_anki: bool,
    ) -> Result<Vec<VocabCard>, BookToCardsError> {
        let mut cards = Vec::new();
        for token in tokens {
            let entries = self.jmdict.get_dict_entries(&token.token, true, true);
            if entries.is_empty() {
                warn!("No dictionary entry for {}, no card made", token.token);
                continue;
            }

            let source_examples = self.source_examples(kb, token, for_anki);
            let translations = self.translations(&source_examples);
            let tatoeba_examples = self
                .tatoeba
                .map(|corpus| corpus.examples(&token.token, self.settings.max_tatoeba_examples))
                .unwrap_or_default();
            let examples_str =
                format_examples(&token.source_name, &source_examples, &translations, &tatoeba_examples);
            let sanseido_def_str = self
                .sanseido
                .and_then(|sanseido| sanseido.lookup(&token.token))
                .map(format_sanseido)
                .unwrap_or_default();

            cards.extend(
                entries.iter().map(|entry| self.vocab_card(token, entry, &examples_str, &sanseido_def_str)),
            );
        }
        info!("Made {} vocabulary cards for {} tokens", cards.len(), tokens.len());
        Ok(cards)
    }

    fn make_kanji_cards(
        &self,
        _kb: &KnowledgeBase,
        kanjis: &[KanjiRecord],
        _for_anki: bool,
    ) -> Result<Vec<KanjiCard>, BookToCardsError> {
        Ok(kanjis
            .iter()
            .map(|kanji| KanjiCard {
                kanji: kanji.kanji.to_string(),
                source_name_str: kanji.source_name.clone(),
                tokens_str: kanji
                    .associated_toks_from_source
                    .iter()
                    .map(|token| match self.reading_of(token) {
                        Some(reading) => format!("{} ({})", token, reading),
                        None => token.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            })
            .collect())
    }
}

fn csv_writer(path: &Path, for_anki: bool) -> Result<csv::Writer<fs::File>, BookToCardsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(csv::WriterBuilder::new().has_headers(!for_anki).from_path(path)?)
}

/// Anki imports want no header and `<br>` for line breaks.
pub fn write_vocab_csv(path: &Path, cards: &[VocabCard], for_anki: bool) -> Result<(), BookToCardsError> {
    let mut writer = csv_writer(path, for_anki)?;
    for card in cards {
        if for_anki {
            let mut card = card.clone();
            card.meanings_str = anki_field(&card.meanings_str);
            card.sanseido_def_str = anki_field(&card.sanseido_def_str);
            card.examples_str = anki_field(&card.examples_str);
            writer.serialize(card)?;
        } else {
            writer.serialize(card)?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_kanji_csv(path: &Path, cards: &[KanjiCard], for_anki: bool) -> Result<(), BookToCardsError> {
    let mut writer = csv_writer(path, for_anki)?;
    for card in cards {
        if for_anki {
            let mut card = card.clone();
            card.tokens_str = anki_field(&card.tokens_str);
            writer.serialize(card)?;
        } else {
            writer.serialize(card)?;
        }
    }
    writer.flush()?;
    Ok(())
}
