use super::token_models::Morpheme;

/// Grammatical parts of speech that never become study items.
pub const EXCLUDED_POS: &[&[&str]] = &[
    &["助詞", "格助詞"],
    &["助詞", "係助詞"],
    &["助詞", "副助詞"],
    &["形状詞", "助動詞語幹"],
    &["助動詞"],
    &["接尾辞", "形容詞的"],
    &["動詞", "非自立可能"],
    &["名詞", "助動詞語幹"],
    &["連体詞"],
    &["名詞", "数詞"],
    &["助詞", "終助詞"],
    &["接尾辞", "形状詞的"],
    &["接尾辞", "動詞的"],
    &["補助記号"],
    &["絵文字・記号等"],
    &["助詞", "準体助詞"],
    &["助詞", "接続助詞"],
    &["空白"],
];

#[derive(Debug, Clone)]
pub struct PosFilter {
    excluded: Vec<Vec<String>>,
}

impl Default for PosFilter {
    fn default() -> Self {
        PosFilter::new(EXCLUDED_POS)
    }
}

impl PosFilter {
    pub fn new(excluded: &[&[&str]]) -> Self {
        PosFilter {
            excluded: excluded
                .iter()
                .map(|pattern| pattern.iter().map(|p| p.to_string()).collect())
                .collect(),
        }
    }

    /// A pattern of n levels excludes morphemes whose first n POS levels are equal to it.
    pub fn is_excluded(&self, morpheme: &Morpheme) -> bool {
        self.excluded.iter().any(|pattern| {
            pattern.len() <= morpheme.pos.len()
                && pattern.iter().zip(morpheme.pos.iter()).all(|(p, m)| p == m)
        })
    }

    pub fn keep(&self, morpheme: &Morpheme) -> bool {
        !morpheme.dictionary_form.trim().is_empty() && !self.is_excluded(morpheme)
    }

    pub fn lemmas<'a>(&self, morphemes: &'a [Morpheme]) -> Vec<&'a str> {
        morphemes
            .iter()
            .filter(|m| self.keep(m))
            .map(|m| m.dictionary_form.as_str())
            .collect()
    }
}
