//! `sprout export`

use anyhow::{Context, Result};
use sprout_core::config::DataLayout;
use sprout_core::{export_archive, StoreHandle};
use std::path::{Path, PathBuf};

pub fn execute(data_dir: &Path, output: Option<&Path>) -> Result<()> {
    let layout = DataLayout::new(data_dir);
    if !layout.database.exists() {
        anyhow::bail!("No store found at {}", layout.database.display());
    }

    let store = StoreHandle::open(&layout.database)
        .with_context(|| format!("failed to open {}", layout.database.display()))?;
    let exported = export_archive(&store, &layout).context("export failed")?;

    let target = resolve_output(output, &exported.file_name);
    std::fs::write(&target, &exported.bytes)
        .with_context(|| format!("failed to write {}", target.display()))?;

    println!("Exported backup to {}", target.display());
    println!("  Database: {} bytes", exported.manifest.database.size);
    println!("  Upload files: {}", exported.manifest.uploads.len());
    if !exported.missing_files().is_empty() {
        println!(
            "Warning: {} photo file(s) were missing and are not in the archive:",
            exported.missing_files().len()
        );
        for name in exported.missing_files() {
            println!("  {name}");
        }
    }

    Ok(())
}

/// A directory (or nothing) gets the generated archive name appended
fn resolve_output(output: Option<&Path>, file_name: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_output() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            resolve_output(Some(temp.path()), "b.zip"),
            temp.path().join("b.zip")
        );
        assert_eq!(
            resolve_output(Some(&temp.path().join("x.zip")), "b.zip"),
            temp.path().join("x.zip")
        );
        assert_eq!(resolve_output(None, "b.zip"), PathBuf::from("b.zip"));
    }
}
