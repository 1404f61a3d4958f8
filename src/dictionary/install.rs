use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use tracing::info;

use crate::core::BookToCardsError;

/// Copies dictionary zips into `target_dir`, skipping the ones already there.
/// They are extracted on next load.
pub fn copy_dictionaries(zip_paths: &[PathBuf], target_dir: &Path) -> Result<usize, BookToCardsError> {
    fs::create_dir_all(target_dir)?;

    let mut copied_count = 0;

    for zip_path in zip_paths {
        let Some(filename) = zip_path.file_name() else {
            continue;
        };
        let destination = target_dir.join(filename);

        if destination.exists() {
            info!(
                "Skipping '{}' - already exists in {}",
                filename.to_string_lossy(),
                target_dir.display()
            );
            continue;
        }

        fs::copy(zip_path, &destination)?;
        copied_count += 1;

        info!("Copied dictionary: {} -> {}", zip_path.display(), destination.display());
    }

    Ok(copied_count)
}
