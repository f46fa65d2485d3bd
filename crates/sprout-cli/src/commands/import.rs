//! `sprout import`

use anyhow::{Context, Result};
use sprout_core::config::DataLayout;
use sprout_core::{import_archive, recover_interrupted_imports, ImportOptions, StoreHandle};
use std::path::Path;
use std::time::Duration;

pub fn execute(data_dir: &Path, archive: &Path, quiesce_timeout_secs: u64) -> Result<()> {
    if !archive.is_file() {
        anyhow::bail!("Archive not found: {}", archive.display());
    }

    let layout = DataLayout::new(data_dir);
    layout
        .ensure_dirs()
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let recovery = recover_interrupted_imports(&layout).context("failed to recover interrupted import")?;
    if recovery.restored > 0 {
        println!("Reverted {} unfinished import(s) first", recovery.restored);
    }
    layout.ensure_dirs()?;

    let store = StoreHandle::open(&layout.database)
        .with_context(|| format!("failed to open {}", layout.database.display()))?;
    let options = ImportOptions {
        quiesce_timeout: Duration::from_secs(quiesce_timeout_secs),
    };
    let report = import_archive(&store, &layout, archive, &options).context("import failed")?;

    println!("Imported {}", archive.display());
    println!("  Projects: {}", report.projects);
    println!("  Photos: {}", report.photos);
    println!("  Upload files: {}", report.uploads);
    if !report.manifest_verified {
        println!("Note: archive had no manifest; contents were not checksum-verified");
    }
    if !report.missing_files.is_empty() {
        println!(
            "Warning: {} photo file(s) referenced by the store are missing:",
            report.missing_files.len()
        );
        for name in &report.missing_files {
            println!("  {name}");
        }
    }

    Ok(())
}
