use std::{
    collections::HashMap,
    fs,
    path::Path,
    time::Instant,
};

use tracing::info;

use crate::{
    core::{
        utils::{
            is_ascii_alphanumeric_token,
            ordered_counts,
        },
        BookToCardsError,
        SeqId,
    },
    segmentation::{
        sentencize,
        Lemmatizer,
        PosFilter,
        N_LINES_PER_CHUNK,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSentence {
    pub id: SeqId,
    pub text: String,
    pub lemmas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOccurrences {
    pub count: usize,
    pub seq_ids: Vec<SeqId>,
}

/// Sentences of a document and its lemmas, in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub sentences: Vec<ParsedSentence>,
    pub tokens: Vec<(String, TokenOccurrences)>,
}

impl ParsedDocument {
    pub fn parse(
        doc: &str,
        sep_tok: Option<&str>,
        lemmatizer: &dyn Lemmatizer,
        drop_ascii_alphanum: bool,
    ) -> ParsedDocument {
        let start = Instant::now();
        let texts = sentencize(doc, sep_tok, N_LINES_PER_CHUNK);
        info!("Sentencized document into {} sentences", texts.len());

        let filter = PosFilter::default();
        let sentences: Vec<ParsedSentence> = lemmatizer
            .lemmatize_batch(&texts)
            .iter()
            .zip(texts.iter())
            .enumerate()
            .map(|(id, (morphemes, text))| {
                let lemmas = filter
                    .lemmas(morphemes)
                    .into_iter()
                    .filter(|lemma| !(drop_ascii_alphanum && is_ascii_alphanumeric_token(lemma)))
                    .map(str::to_string)
                    .collect();
                ParsedSentence { id, text: text.clone(), lemmas }
            })
            .collect();

        let counts =
            ordered_counts(sentences.iter().flat_map(|s| s.lemmas.iter().map(String::as_str)));

        let mut seq_ids: HashMap<&str, Vec<SeqId>> = HashMap::new();
        for sentence in &sentences {
            for lemma in &sentence.lemmas {
                let ids = seq_ids.entry(lemma.as_str()).or_default();
                if ids.last() != Some(&sentence.id) {
                    ids.push(sentence.id);
                }
            }
        }

        let tokens = counts
            .into_iter()
            .map(|(lemma, count)| {
                let ids = seq_ids.get(lemma).cloned().unwrap_or_default();
                (lemma.to_string(), TokenOccurrences { count, seq_ids: ids })
            })
            .collect::<Vec<_>>();

        info!(
            "Parsed {} sentences, {} unique lemmas in {:?}",
            sentences.len(),
            tokens.len(),
            start.elapsed()
        );

        ParsedDocument { sentences, tokens }
    }

    pub fn token(&self, lemma: &str) -> Option<&TokenOccurrences> {
        self.tokens.iter().find(|(token, _)| token == lemma).map(|(_, occurrences)| occurrences)
    }
}

/// Subtitle text of a SubRip file, one line per subtitle line.
pub fn read_srt(path: &Path) -> Result<String, BookToCardsError> {
    let content = fs::read_to_string(path)?.replace("\r\n", "\n");
    let lines: Vec<&str> = content
        .trim_start_matches('\u{feff}')
        .split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .flat_map(|block| {
            block
                .trim()
                .lines()
                .skip_while(|line| !line.contains("-->"))
                .skip(1)
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
        })
        .collect();

    if lines.is_empty() {
        return Err(BookToCardsError::Custom("No subtitles found in the file.".to_string()));
    }

    Ok(lines.join("\n"))
}

pub fn read_txt(path: &Path) -> Result<String, BookToCardsError> {
    let content = fs::read_to_string(path)?;
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(BookToCardsError::Custom("No sentences found in the file.".to_string()));
    }
    Ok(content.to_string())
}

pub fn read_document(path: &Path) -> Result<String, BookToCardsError> {
    match path.extension().and_then(|ext| ext.to_str()).map(|ext| ext.to_lowercase()) {
        Some(ext) if ext == "srt" => read_srt(path),
        _ => read_txt(path),
    }
}
