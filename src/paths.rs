//! Turning user-supplied paths into the list of image files to upload.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Whether the file name carries one of the supported image extensions.
/// Case-insensitive, looks at the name only.
pub fn is_supported_image(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Resolve files and directories into the flat list of images to upload.
///
/// Top-level files keep argument order and are dropped silently when they are
/// not images. Directories are walked recursively in file-name order without
/// following directory links; a link to an image file is uploaded, a dangling
/// link is skipped with a warning. A target that cannot be stat'ed is skipped
/// with a warning; a directory that cannot be read part way aborts the whole
/// resolution. Duplicates are kept.
pub fn resolve<P: AsRef<Path>>(targets: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for target in targets {
        let target = target.as_ref();
        let meta = match std::fs::metadata(target) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(path = %target.display(), error = %err, "skip file because of stat error");
                continue;
            }
        };

        if meta.is_dir() {
            collect_from_directory(target, &mut files)?;
        } else if meta.is_file() && is_supported_image(target) {
            files.push(target.to_path_buf());
        }
    }

    Ok(files)
}

fn collect_from_directory(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|source| Error::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if !is_supported_image(entry.path()) {
            continue;
        }
        let file_type = entry.file_type();
        if file_type.is_file() {
            files.push(entry.into_path());
        } else if file_type.is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skip broken link");
                }
            }
        }
    }
    Ok(())
}
