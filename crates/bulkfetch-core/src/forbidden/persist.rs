use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::task::FileId;

pub const FORBIDDEN_FILE_NAME: &str = "forbidden.json";

/// `<out_dir>/forbidden.json`
pub fn default_path(out_dir: &Path) -> PathBuf {
    out_dir.join(FORBIDDEN_FILE_NAME)
}

/// Load a saved set. A missing file is an empty set; an unreadable one is
/// logged, removed and treated as empty.
pub fn load_from_path(path: &Path) -> Result<BTreeSet<FileId>> {
    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    match serde_json::from_slice::<Vec<FileId>>(&data) {
        Ok(ids) => Ok(ids.into_iter().collect()),
        Err(e) => {
            tracing::warn!(path = %path.display(), "discarding corrupt forbidden list: {}", e);
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), "could not remove corrupt forbidden list: {}", e);
            }
            Ok(BTreeSet::new())
        }
    }
}

/// Write the set as a JSON array through a uniquely named sibling temp file
/// and a rename. Safe to call from several threads on the same path.
pub fn save_to_path(path: &Path, ids: &BTreeSet<FileId>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let json = serde_json::to_vec(ids).context("serializing forbidden list")?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(&json)
        .with_context(|| format!("writing {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
