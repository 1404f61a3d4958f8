use reqwest::{
    blocking::Client,
    header::AUTHORIZATION,
};
use serde::{
    Deserialize,
    Serialize,
};
use tracing::debug;

use crate::core::{
    http::{
        checked,
        http_client,
    },
    BookToCardsError,
};

const DEEPL_FREE_ENDPOINT: &str = "https://api-free.deepl.com/v2/translate";
const DEEPL_PRO_ENDPOINT: &str = "https://api.deepl.com/v2/translate";
const SOURCE_LANG: &str = "JA";
pub const TARGET_LANG: &str = "EN-US";

pub trait Translator {
    /// One translation per input text, in order.
    fn translate(&self, texts: &[String]) -> Result<Vec<String>, BookToCardsError>;
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a [String],
    source_lang: &'a str,
    target_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

pub struct DeeplTranslator {
    client: Client,
    api_key: String,
    endpoint: &'static str,
}

/// Free-tier keys end with `:fx` and use their own host.
pub fn deepl_endpoint(api_key: &str) -> &'static str {
    if api_key.ends_with(":fx") {
        DEEPL_FREE_ENDPOINT
    } else {
        DEEPL_PRO_ENDPOINT
    }
}

impl DeeplTranslator {
    pub fn new(api_key: Option<String>) -> Result<Self, BookToCardsError> {
        let api_key =
            api_key.filter(|key| !key.trim().is_empty()).ok_or(BookToCardsError::MissingApiKey)?;
        Ok(DeeplTranslator { client: http_client()?, endpoint: deepl_endpoint(&api_key), api_key })
    }
}

impl Translator for DeeplTranslator {
    fn translate(&self, texts: &[String]) -> Result<Vec<String>, BookToCardsError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = TranslateRequest { text: texts, source_lang: SOURCE_LANG, target_lang: TARGET_LANG };
        let response = checked(
            self.client
                .post(self.endpoint)
                .header(AUTHORIZATION, format!("DeepL-Auth-Key {}", self.api_key))
                .json(&request)
                .send()?,
        )?;

        let body: TranslateResponse = response.json()?;
        debug!("Translated {} texts", body.translations.len());
        if body.translations.len() != texts.len() {
            return Err(BookToCardsError::Custom(format!(
                "DeepL returned {} translations for {} texts",
                body.translations.len(),
                texts.len()
            )));
        }
        Ok(body.translations.into_iter().map(|t| t.text).collect())
    }
}
