//! `sprout inspect`

use anyhow::{Context, Result};
use sprout_core::archive::StagedArchive;
use std::path::Path;

pub fn execute(archive: &Path, json: bool) -> Result<()> {
    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    let staged = StagedArchive::extract(archive, scratch.path())
        .with_context(|| format!("{} is not a usable backup", archive.display()))?;

    let summary = staged.summary();
    let manifest = staged.manifest();

    if json {
        let output = serde_json::json!({
            "format_version": manifest.map(|m| m.format_version),
            "generator": manifest.map(|m| m.generator.as_str()),
            "created_at": manifest.map(|m| m.created_at),
            "manifest_verified": manifest.is_some(),
            "schema_version": summary.schema_version,
            "projects": summary.projects,
            "photos": summary.photos,
            "uploads": staged.upload_count(),
            "missing_files": staged.missing_files(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Backup archive: {}", archive.display());
    match manifest {
        Some(m) => {
            println!("  Format version: {}", m.format_version);
            if !m.generator.is_empty() {
                println!("  Written by: {}", m.generator);
            }
            println!("  Created: {}", m.created_at.to_rfc3339());
            println!("  Checksums: verified");
        }
        None => println!("  Checksums: none (archive has no manifest)"),
    }
    println!("  Schema version: {}", summary.schema_version);
    println!("  Projects: {}", summary.projects);
    println!("  Photos: {}", summary.photos);
    println!("  Upload files: {}", staged.upload_count());

    if !staged.missing_files().is_empty() {
        println!(
            "Warning: {} photo file(s) are not in the archive:",
            staged.missing_files().len()
        );
        for name in staged.missing_files() {
            println!("  {name}");
        }
    }

    Ok(())
}
