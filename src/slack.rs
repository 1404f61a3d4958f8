use std::{
    collections::HashMap,
    fs::{
        self,
        OpenOptions,
    },
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

use rand::{
    rngs::StdRng,
    seq::IndexedRandom,
    SeedableRng,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{
    info,
    warn,
};
use walkdir::WalkDir;
use wana_kana::IsJapaneseStr;
use whatlang::Lang;

use crate::core::BookToCardsError;

pub const USERS_FILE: &str = "users.json";
pub const MSG_SEPARATOR: &str = "-|-";
pub const MIN_MSG_LENGTH: usize = 15;
pub const SEED: u64 = 42;
pub const SAMPLE_PROP: f64 = 0.12;
const NON_LOG_FILES: [&str; 3] = ["channels.json", "integration_logs.json", USERS_FILE];

#[derive(Debug, Deserialize)]
struct SlackUser {
    id: String,
    #[serde(default)]
    profile: SlackProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    real_name: String,
}

/// One entry of a channel-day file. Edits, joins and bot posts carry a subtype.
#[derive(Debug, Deserialize)]
pub struct SlackEntry {
    #[serde(rename = "type", default)]
    pub entry_type: String,
    pub user: Option<String>,
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: String,
    pub blocks: Option<Vec<SlackBlock>>,
}

#[derive(Debug, Deserialize)]
pub struct SlackBlock {
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub elements: Vec<SlackElement>,
}

#[derive(Debug, Deserialize)]
pub struct SlackElement {
    #[serde(rename = "type", default)]
    pub element_type: String,
    #[serde(default)]
    pub elements: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageInfo {
    pub user_id: String,
    pub original_msg: String,
    pub msg_wo_user_ref: String,
}

#[derive(Debug, Clone)]
pub struct SlackOptions {
    pub user_ids: Option<Vec<String>>,
    pub sample_prop: f64,
    pub min_msg_length: usize,
    pub seed: u64,
}

impl Default for SlackOptions {
    fn default() -> Self {
        SlackOptions { user_ids: None, sample_prop: SAMPLE_PROP, min_msg_length: MIN_MSG_LENGTH, seed: SEED }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlackSummary {
    pub n_files: usize,
    pub n_messages: usize,
}

/// Plain text of a message; with rich-text blocks only the section texts.
pub fn extract_text(entry: &SlackEntry) -> String {
    let Some(blocks) = &entry.blocks else {
        return entry.text.clone();
    };
    let mut text = String::new();
    for block in blocks.iter().filter(|b| b.block_type == "rich_text") {
        for element in block.elements.iter().filter(|e| e.element_type == "rich_text_section") {
            for item in &element.elements {
                if let Some(t) = item.get("text").and_then(Value::as_str) {
                    text.push_str(t);
                }
            }
        }
    }
    text
}

pub fn parse_slack_entries(entries: &[SlackEntry], user_ids: Option<&[String]>) -> Vec<MessageInfo> {
    entries
        .iter()
        .filter(|e| e.entry_type == "message" && e.subtype.is_none())
        .filter_map(|e| e.user.as_ref().map(|user| (e, user)))
        .filter(|(_, user)| user_ids.map_or(true, |ids| ids.contains(user)))
        .map(|(e, user)| MessageInfo {
            user_id: user.clone(),
            original_msg: e.text.clone(),
            msg_wo_user_ref: extract_text(e),
        })
        .collect()
}

fn has_kana(text: &str) -> bool {
    let mut buf = [0u8; 4];
    text.chars().any(|c| {
        let as_str: &str = c.encode_utf8(&mut buf);
        as_str.is_kana()
    })
}

/// Language identification of the message. Kanji-heavy Japanese can be
/// classified as Mandarin, which never contains kana.
pub fn is_japanese(text: &str) -> bool {
    match whatlang::detect(&text.replace('\n', " ")).map(|info| info.lang()) {
        Some(Lang::Jpn) => true,
        Some(Lang::Cmn) => has_kana(text),
        _ => false,
    }
}

/// Removes embedded links and replaces `<@ID>` mentions by real names.
pub struct MessageCleaner {
    embedded_url: Regex,
    user_ref: Regex,
    users: HashMap<String, String>,
}

impl MessageCleaner {
    pub fn new(users: HashMap<String, String>) -> Result<Self, BookToCardsError> {
        Ok(MessageCleaner {
            embedded_url: Regex::new(r"<http[^>]*>")?,
            user_ref: Regex::new(r"<@([A-Z0-9]*)>")?,
            users,
        })
    }

    pub fn clean(&self, message: &str) -> String {
        let without_urls = self.embedded_url.replace_all(message, "");
        self.user_ref
            .replace_all(&without_urls, |caps: &regex::Captures| {
                let id = &caps[1];
                match self.users.get(id) {
                    Some(name) => name.clone(),
                    None => {
                        warn!("user id {} not found in the users lookup", id);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}

pub fn load_users(export_dir: &Path) -> Result<HashMap<String, String>, BookToCardsError> {
    let raw = fs::read_to_string(export_dir.join(USERS_FILE))?;
    let users: Vec<SlackUser> = serde_json::from_str(&raw)?;
    Ok(users.into_iter().map(|u| (u.id, u.profile.real_name)).collect())
}

fn log_files(export_dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(export_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .filter(|p| {
            p.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| !NON_LOG_FILES.contains(&name))
        })
        .collect();
    paths.sort();
    paths
}

/// Cleaned Japanese messages of one channel-day file.
pub fn messages_of_file(
    path: &Path,
    cleaner: &MessageCleaner,
    options: &SlackOptions,
) -> Result<Vec<String>, BookToCardsError> {
    let entries: Vec<SlackEntry> = serde_json::from_str(&fs::read_to_string(path)?)?;
    Ok(parse_slack_entries(&entries, options.user_ids.as_deref())
        .into_iter()
        .filter(|info| is_japanese(&info.msg_wo_user_ref))
        .map(|info| cleaner.clean(&info.original_msg))
        .filter(|msg| msg.chars().count() >= options.min_msg_length)
        .collect())
}

/// Writes the Japanese messages of a Slack export to `out_path`, each
/// followed by [`MSG_SEPARATOR`].
pub fn extract_slack_export(
    export_dir: &Path,
    out_path: &Path,
    options: &SlackOptions,
) -> Result<SlackSummary, BookToCardsError> {
    let cleaner = MessageCleaner::new(load_users(export_dir)?)?;
    let all_paths = log_files(export_dir);

    let k = ((options.sample_prop * all_paths.len() as f64) as usize).min(all_paths.len());
    let mut rng = StdRng::seed_from_u64(options.seed);
    let paths: Vec<&PathBuf> = all_paths.choose_multiple(&mut rng, k).collect();
    info!("-- Shuffle and keep {} of {} files", paths.len(), all_paths.len());
    info!("-- (only messages with {} chars or more are kept)", options.min_msg_length);

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(out_path, "")?;

    let mut summary = SlackSummary::default();
    for path in paths {
        let messages = messages_of_file(path, &cleaner, options)?;
        summary.n_files += 1;
        if messages.is_empty() {
            continue;
        }
        let mut file = OpenOptions::new().append(true).open(out_path)?;
        write!(file, "{}{}", messages.join(MSG_SEPARATOR), MSG_SEPARATOR)?;
        summary.n_messages += messages.len();
    }
    info!("Extracted {} messages from {} files", summary.n_messages, summary.n_files);
    Ok(summary)
}
