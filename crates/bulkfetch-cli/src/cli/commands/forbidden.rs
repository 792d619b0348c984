//! `bulkfetch forbidden` – inspect or reset the forbidden list.

use anyhow::{Context, Result};
use bulkfetch_core::forbidden;
use std::path::Path;

pub async fn run_forbidden(out_dir: &Path, clear: bool) -> Result<()> {
    let path = forbidden::default_path(out_dir);
    if clear {
        match std::fs::remove_file(&path) {
            Ok(()) => println!("removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => println!("nothing to clear"),
            Err(e) => return Err(e).with_context(|| format!("removing {}", path.display())),
        }
        return Ok(());
    }
    let ids = forbidden::load_from_path(&path)?;
    if ids.is_empty() {
        println!("no forbidden files recorded in {}", path.display());
        return Ok(());
    }
    for id in &ids {
        println!("{}", id);
    }
    println!("{} forbidden file(s)", ids.len());
    Ok(())
}
