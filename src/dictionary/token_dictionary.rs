use std::{
    fs::{
        self,
        File,
    },
    io::{
        BufReader,
        BufWriter,
    },
    path::{
        Path,
        PathBuf,
    },
    time::Instant,
};

use liblzma::read::XzDecoder;
use tar::Archive;
use tracing::info;
use vibrato::Dictionary;
use zstd::stream::copy_decode;

use crate::core::{
    http::{
        download_to_file,
        http_client,
    },
    BookToCardsError,
};

const RELEASE_URL: &str = "https://github.com/daac-tools/vibrato/releases/download/v0.5.0";
const SYSTEM_DIC: &str = "system.dic";
const LICENSE_FILES: [&str; 2] = ["BSD", "NOTICE"];

/// Tokenizer models published with vibrato releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictType {
    Unidic,
    Ipadic,
}

impl DictType {
    fn model_name(&self) -> &'static str {
        match self {
            DictType::Unidic => "bccwj-suw+unidic-cwj-3_1_1",
            DictType::Ipadic => "ipadic-mecab-2_7_0",
        }
    }

    fn url(&self) -> String {
        format!("{}/{}.tar.xz", RELEASE_URL, self.model_name())
    }

    pub fn system_dic_path(&self, dict_dir: &Path) -> PathBuf {
        dict_dir.join(self.model_name()).join(SYSTEM_DIC)
    }
}

/// Unpacks a `.tar.xz` release into `staging` in one pass.
fn unpack_release(archive_path: &Path, staging: &Path) -> Result<(), BookToCardsError> {
    let xz = XzDecoder::new(BufReader::new(File::open(archive_path)?));
    Archive::new(xz).unpack(staging).map_err(|e| {
        BookToCardsError::Custom(format!(
            "Cannot unpack {}: {}. The download may be corrupt.",
            archive_path.display(),
            e
        ))
    })
}

/// Decompresses `system.dic.zst` from the unpacked release into `target`
/// and moves the license files next to it.
fn install_system_dic(release_dir: &Path, target: &Path) -> Result<(), BookToCardsError> {
    let zst_path = release_dir.join(format!("{}.zst", SYSTEM_DIC));
    if !zst_path.exists() {
        return Err(BookToCardsError::Custom(format!("{} missing from the release", zst_path.display())));
    }
    fs::create_dir_all(target)?;
    copy_decode(
        BufReader::new(File::open(&zst_path)?),
        BufWriter::new(File::create(target.join(SYSTEM_DIC))?),
    )?;
    for license in LICENSE_FILES {
        let from = release_dir.join(license);
        if from.exists() {
            fs::copy(&from, target.join(license))?;
        }
    }
    Ok(())
}

/// Downloads and installs the tokenizer model into `dict_dir` unless it is
/// already there. Returns the path of `system.dic`.
pub fn ensure_dictionary(dict_type: &DictType, dict_dir: &Path) -> Result<PathBuf, BookToCardsError> {
    let dic_path = dict_type.system_dic_path(dict_dir);
    if dic_path.exists() {
        return Ok(dic_path);
    }

    let start = Instant::now();
    let name = dict_type.model_name();
    let archive_path = dict_dir.join(format!("{}.tar.xz", name));
    let staging = dict_dir.join(format!("{}.partial", name));
    fs::create_dir_all(dict_dir)?;
    fs::remove_dir_all(&staging).ok();

    info!("Downloading tokenizer model from {}...", dict_type.url());
    let n_bytes = download_to_file(&http_client()?, &dict_type.url(), &archive_path)?;
    info!("Downloaded {} MB, extracting...", n_bytes / 1_000_000);

    unpack_release(&archive_path, &staging)?;
    install_system_dic(&staging.join(name), &dict_dir.join(name))?;

    fs::remove_dir_all(&staging)?;
    fs::remove_file(&archive_path)?;
    info!("Tokenizer model ready at {} ({:?})", dic_path.display(), start.elapsed());
    Ok(dic_path)
}

pub fn load_dictionary(path: &Path) -> Result<Dictionary, BookToCardsError> {
    Ok(Dictionary::read(BufReader::new(File::open(path)?))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_paths() {
        let dir = Path::new("/data/tokenizer");
        assert_eq!(
            DictType::Unidic.system_dic_path(dir),
            dir.join("bccwj-suw+unidic-cwj-3_1_1").join("system.dic")
        );
        assert!(DictType::Ipadic.url().ends_with("/ipadic-mecab-2_7_0.tar.xz"));
    }

    #[test]
    fn test_installed_model_is_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let dic_path = DictType::Unidic.system_dic_path(dir.path());
        fs::create_dir_all(dic_path.parent().unwrap()).unwrap();
        fs::write(&dic_path, b"dic").unwrap();
        assert_eq!(ensure_dictionary(&DictType::Unidic, dir.path()).unwrap(), dic_path);
    }

    #[test]
    fn test_install_from_unpacked_release() {
        let dir = tempfile::tempdir().unwrap();
        let release = dir.path().join("release");
        fs::create_dir_all(&release).unwrap();
        let compressed = zstd::stream::encode_all(&b"system dictionary"[..], 3).unwrap();
        fs::write(release.join("system.dic.zst"), compressed).unwrap();
        fs::write(release.join("BSD"), "license").unwrap();

        let target = dir.path().join("model");
        install_system_dic(&release, &target).unwrap();
        assert_eq!(fs::read(target.join("system.dic")).unwrap(), b"system dictionary");
        assert!(target.join("BSD").exists());
        assert!(!target.join("NOTICE").exists());
    }
}
