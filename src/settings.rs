use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    core::BookToCardsError,
    persistence::{
        load_json_or_default,
        save_json,
        AppPaths,
    },
};

pub const DEEPL_API_KEY_ENV: &str = "DEEPL_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudySettings {
    pub n_days_study: u32,
    pub n_cards_days: u32,
    pub min_count: usize,
    pub min_days_btwn_kanji_and_voc: u32,
    pub n_shown_tokens: usize,
}

impl Default for StudySettings {
    fn default() -> Self {
        StudySettings {
            n_days_study: 7,
            n_cards_days: 5,
            min_count: 4,
            min_days_btwn_kanji_and_voc: 22,
            n_shown_tokens: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardSettings {
    pub max_source_examples: usize,
    pub max_tatoeba_examples: usize,
    pub example_linebreak: String,
    pub translate_source_examples: bool,
}

impl Default for CardSettings {
    fn default() -> Self {
        CardSettings {
            max_source_examples: 3,
            max_tatoeba_examples: 3,
            example_linebreak: " // ".to_string(),
            translate_source_examples: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsData {
    pub study: StudySettings,
    pub cards: CardSettings,
    pub deepl_api_key: Option<String>,
    pub drop_ascii_alphanum_tokens: Option<bool>,
}

impl SettingsData {
    pub fn load(paths: &AppPaths) -> Self {
        load_json_or_default(&paths.settings_file())
    }

    pub fn save(&self, paths: &AppPaths) -> Result<(), BookToCardsError> {
        save_json(self, &paths.settings_file())
    }

    /// The environment wins over the settings file.
    pub fn deepl_api_key(&self) -> Option<String> {
        std::env::var(DEEPL_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.deepl_api_key.clone())
    }

    pub fn drop_ascii_alphanum_tokens(&self) -> bool {
        self.drop_ascii_alphanum_tokens.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings: SettingsData =
            serde_json::from_str(r#"{"study": {"n_days_study": 3}}"#).unwrap();
        assert_eq!(settings.study.n_days_study, 3);
        assert_eq!(settings.study.n_cards_days, 5);
        assert_eq!(settings.cards.example_linebreak, " // ");
        assert!(settings.drop_ascii_alphanum_tokens());
    }

    #[test]
    fn test_settings_saved_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());
        let mut settings = SettingsData::default();
        settings.study.min_count = 2;
        settings.save(&paths).unwrap();
        assert_eq!(SettingsData::load(&paths).study.min_count, 2);
    }
}
