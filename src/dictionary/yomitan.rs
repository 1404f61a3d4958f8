use std::{
    fs::{
        self,
        File,
    },
    io::{
        BufReader,
        Read,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
};

use regex::Regex;
use serde::{
    de::DeserializeOwned,
    Serialize,
};
use serde_json::Value;
use tracing::{
    debug,
    info,
    warn,
};
use zip::ZipArchive;

use super::DictionaryIndex;
use crate::core::BookToCardsError;

pub const CACHE_FILE_NAME: &str = "cache.bin";

/// Reads `index.json`. Returns `None` for dictionaries not in format 3.
pub fn parse_index_json(folder_path: &Path) -> Result<Option<DictionaryIndex>, BookToCardsError> {
    let index_path = folder_path.join("index.json");
    let index_data = fs::read_to_string(index_path)?;
    let index: DictionaryIndex = serde_json::from_str(&index_data)?;

    let version = index.format.or(index.version).ok_or(BookToCardsError::MissingVersion)?;

    if version == 3 {
        Ok(Some(index))
    } else {
        Ok(None)
    }
}

/// Every row of the `<prefix>_N.json` bank files in `folder_path`. Rows that do
/// not deserialize are skipped.
pub fn parse_bank<T: DeserializeOwned>(
    folder_path: &Path,
    prefix: &str,
) -> Result<Vec<T>, BookToCardsError> {
    let re = Regex::new(&format!(r"^{}_\d+\.json$", regex::escape(prefix)))?;
    let mut bank_files: Vec<PathBuf> = fs::read_dir(folder_path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name().and_then(|n| n.to_str()).map_or(false, |name| re.is_match(name))
        })
        .collect();
    bank_files.sort_by_key(|path| bank_number(path));

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for path in bank_files {
        let data = fs::read_to_string(&path)?;
        let raw_rows: Vec<Value> = serde_json::from_str(&data)?;
        for raw in raw_rows {
            match serde_json::from_value::<T>(raw) {
                Ok(row) => rows.push(row),
                Err(_) => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed rows of {} in {:?}", skipped, prefix, folder_path);
    }
    debug!("Parsed {} rows from {} files in {:?}", rows.len(), prefix, folder_path);
    Ok(rows)
}

fn bank_number(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.rsplit('_').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

pub fn load_cached<T: DeserializeOwned>(cache_path: &Path) -> Result<T, BookToCardsError> {
    let file = File::open(cache_path)?;
    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    let (value, _): (T, usize) =
        bincode::serde::decode_from_slice(&buffer, bincode::config::standard())?;

    Ok(value)
}

pub fn save_cached<T: Serialize>(value: &T, cache_path: &Path) -> Result<(), BookToCardsError> {
    let encoded = bincode::serde::encode_to_vec(value, bincode::config::standard())?;

    let mut file = File::create(cache_path)?;
    file.write_all(&encoded)?;
    Ok(())
}

pub fn extract_zip(zip_path: &Path, extract_to: &Path) -> Result<(), BookToCardsError> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;
    archive.extract(extract_to)?;

    Ok(())
}

/// Extracts every `.zip` in `dir_path` next to itself, then lists the
/// dictionary folders (those holding an `index.json`).
pub fn dictionary_folders(dir_path: &Path) -> Result<Vec<PathBuf>, BookToCardsError> {
    fs::create_dir_all(dir_path)?;

    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("zip") {
            let Some(stem) = path.file_stem() else {
                continue;
            };
            let extract_dir = dir_path.join(stem);
            if !extract_dir.exists() {
                info!("Extracting {:?}", path);
                fs::create_dir_all(&extract_dir)?;
                extract_zip(&path, &extract_dir)?;
            }
        }
    }

    let mut folders: Vec<PathBuf> = fs::read_dir(dir_path)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| path.is_dir() && path.join("index.json").exists())
        .collect();
    folders.sort();

    Ok(folders)
}

/// A processed dictionary that remembers which `index.json` revision it was built from.
pub trait Revisioned {
    fn revision(&self) -> &str;
}

/// Loads a dictionary from its bincode cache when the revision still matches,
/// otherwise builds it with `build` and refreshes the cache.
pub fn load_or_build<T, F>(folder_path: &Path, build: F) -> Result<Option<T>, BookToCardsError>
where
    T: Serialize + DeserializeOwned + Revisioned,
    F: FnOnce(DictionaryIndex) -> Result<T, BookToCardsError>,
{
    let Some(index) = parse_index_json(folder_path)? else {
        warn!("Skipping {:?} due to unsupported format version.", folder_path);
        return Ok(None);
    };
    let cache_path = folder_path.join(CACHE_FILE_NAME);

    match load_cached::<T>(&cache_path) {
        Ok(cached) if cached.revision() == index.revision => {
            info!("Loaded '{}' from cache", index.title);
            return Ok(Some(cached));
        }
        Ok(cached) => {
            info!(
                "Revision mismatch for '{}': cache={}, index={}",
                index.title,
                cached.revision(),
                index.revision
            );
        }
        Err(e) => {
            debug!("No usable cache for '{}': {}, rebuilding from JSON", index.title, e);
        }
    }

    let title = index.title.clone();
    let built = build(index)?;
    if let Err(e) = save_cached(&built, &cache_path) {
        warn!("Failed to save cache for '{}': {}", title, e);
    }
    Ok(Some(built))
}

/// Plain-text glosses of a glossary item. Structured content is flattened,
/// one gloss per list item when the content is a list.
pub fn glossary_texts(item: &Value) -> Vec<String> {
    match item {
        Value::String(text) => vec![text.clone()],
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some("text") => {
                map.get("text").and_then(Value::as_str).map(|t| vec![t.to_string()]).unwrap_or_default()
            }
            Some("structured-content") => {
                let Some(content) = map.get("content") else {
                    return Vec::new();
                };
                let mut items = Vec::new();
                collect_list_items(content, &mut items);
                if items.is_empty() {
                    let text = flatten(content);
                    if !text.trim().is_empty() {
                        items.push(text.trim().to_string());
                    }
                }
                items
            }
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

const SKIPPED_CONTENT: [&str; 5] = ["attribution", "example-sentence", "notes", "references", "xref"];

fn is_skipped(map: &serde_json::Map<String, Value>) -> bool {
    map.get("data")
        .and_then(|data| data.get("content"))
        .and_then(Value::as_str)
        .map_or(false, |content| SKIPPED_CONTENT.contains(&content))
}

fn collect_list_items(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::Array(children) => children.iter().for_each(|child| collect_list_items(child, out)),
        Value::Object(map) => {
            if is_skipped(map) {
                return;
            }
            if map.get("tag").and_then(Value::as_str) == Some("li") {
                let text = flatten(node);
                if !text.trim().is_empty() {
                    out.push(text.trim().to_string());
                }
            } else if let Some(content) = map.get("content") {
                collect_list_items(content, out);
            }
        }
        _ => {}
    }
}

fn flatten(node: &Value) -> String {
    match node {
        Value::String(text) => text.clone(),
        Value::Array(children) => children.iter().map(flatten).collect(),
        Value::Object(map) => {
            if is_skipped(map) {
                return String::new();
            }
            map.get("content").map(flatten).unwrap_or_default()
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dictionary::TermBankV3;

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Built {
        revision: String,
        terms: Vec<String>,
    }

    impl Revisioned for Built {
        fn revision(&self) -> &str {
            &self.revision
        }
    }

    #[test]
    fn test_glossary_shapes() {
        assert_eq!(glossary_texts(&json!("to eat")), vec!["to eat"]);
        assert_eq!(glossary_texts(&json!({"type": "text", "text": "to drink"})), vec!["to drink"]);
        assert!(glossary_texts(&json!({"type": "image", "path": "a.png"})).is_empty());

        let structured = json!({
            "type": "structured-content",
            "content": [
                {"tag": "ul", "content": [
                    {"tag": "li", "content": "to sing"},
                    {"tag": "li", "content": ["to ", {"tag": "span", "content": "chant"}]}
                ]},
                {"tag": "div", "data": {"content": "example-sentence"}, "content": "歌を歌う"}
            ]
        });
        assert_eq!(glossary_texts(&structured), vec!["to sing", "to chant"]);
    }

    #[test]
    fn test_bank_files_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.json"), r#"{"title":"Test","revision":"r1","format":3}"#)
            .unwrap();
        fs::write(
            dir.path().join("term_bank_2.json"),
            r#"[["飲む","のむ","","v5",0,["to drink"],2,""]]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("term_bank_1.json"),
            r#"[["食べる","たべる","","v1",0,["to eat"],1,""], ["broken"]]"#,
        )
        .unwrap();

        let rows: Vec<TermBankV3> = parse_bank(dir.path(), "term_bank").unwrap();
        let terms: Vec<&str> = rows.iter().map(|r| r.term.as_str()).collect();
        assert_eq!(terms, vec!["食べる", "飲む"]);

        let built: Option<Built> = load_or_build(dir.path(), |index| {
            Ok(Built { revision: index.revision, terms: vec!["built".to_string()] })
        })
        .unwrap();
        assert_eq!(built.unwrap().terms, vec!["built"]);

        let cached: Option<Built> = load_or_build(dir.path(), |_| {
            Err(BookToCardsError::Custom("cache should have been used".to_string()))
        })
        .unwrap();
        assert_eq!(cached.unwrap().terms, vec!["built"]);
    }
}
