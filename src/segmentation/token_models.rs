//UniDic feature layout: https://gist.github.com/masayu-a/e3eee0637c07d4019ec9

use wana_kana::ConvertJapanese;

fn is_unset(field: &str) -> bool {
    field.is_empty() || field == "*"
}

// Zero-based UniDic columns
const POS_LEVELS: usize = 4;
const ORTH_BASE: usize = 10;
const PRON_BASE: usize = 11;
const KANA_BASE: usize = 21;

/// One analysed word: what was written, its dictionary form and its POS path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Morpheme {
    pub surface: String,
    pub dictionary_form: String,
    pub reading: String,
    pub pos: Vec<String>,
}

impl Morpheme {
    pub fn new(surface: &str, dictionary_form: &str, pos: &[&str]) -> Self {
        Morpheme {
            surface: surface.to_string(),
            dictionary_form: dictionary_form.to_string(),
            reading: String::new(),
            pos: pos.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Builds a morpheme from a surface and its comma-separated UniDic features.
    /// The dictionary form falls back to the surface for unknown words.
    pub fn from_unidic(surface: &str, features: &str) -> Self {
        let fields: Vec<&str> = features.split(',').collect();
        let field = |idx: usize| fields.get(idx).copied().filter(|f| !is_unset(f));

        let dictionary_form = field(ORTH_BASE).unwrap_or(surface).to_string();
        let reading = field(KANA_BASE)
            .or_else(|| field(PRON_BASE))
            .map(|kana| kana.to_hiragana())
            .unwrap_or_default();
        let pos = (0..POS_LEVELS).filter_map(field).map(str::to_string).collect();

        Morpheme { surface: surface.to_string(), dictionary_form, reading, pos }
    }
}
