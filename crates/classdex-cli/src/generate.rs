//! The `generate` run: scan, resolve, and write the index and reflection manifest

use crate::config::GenerateConfig;
use crate::output::{write_if_changed, WrittenFile};
use crate::sources::{index_classes, is_jar, ClassDirectory, CorruptClassPolicy, JarArchive, SourceError};
use anyhow::{Context, Result};
use classdex_core::names::to_dotted;
use classdex_core::{
    collect_implementations, format_index, merge_fragments, merge_reflect_config, HeaderIndex,
    PrecomputedIndex,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

/// What a generate run did
#[derive(Debug, Default, Serialize)]
pub struct GenerateReport {
    /// The classes directory did not exist, so nothing was done
    pub skipped: bool,
    /// Headers in the combined index
    pub headers: usize,
    /// Dependencies satisfied entirely by precomputed fragments
    pub precomputed_archives: usize,
    /// Dependencies whose class headers were read
    pub scanned_archives: usize,
    /// Dependencies that could not be opened or read
    pub failed_archives: usize,
    /// Implementations per base, internal names, in configured base order
    pub implementations: IndexMap<String, BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<WrittenFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflect_config: Option<WrittenFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveOutcome {
    Precomputed,
    Scanned,
}

/// Run the whole analysis described by `config`
pub fn run(config: &GenerateConfig) -> Result<GenerateReport> {
    config.validate()?;

    let classes_dir = &config.classes_dir;
    if !classes_dir.is_dir() {
        info!("No classes dir (skipping): {}", classes_dir.display());
        return Ok(GenerateReport {
            skipped: true,
            ..Default::default()
        });
    }

    let bases = config.base_internal_names();
    let allowed_bases: BTreeSet<String> = bases.iter().cloned().collect();
    let prefix = config.fragment_prefix();
    let mut report = GenerateReport::default();

    let mut index = HeaderIndex::new();
    let mut precomputed = PrecomputedIndex::new();

    index_classes(
        &mut ClassDirectory::new(classes_dir),
        &mut index,
        CorruptClassPolicy::Fail,
    )
    .with_context(|| format!("Failed to read compiled classes in {}", classes_dir.display()))?;

    for dependency in &config.dependencies {
        if !is_jar(dependency) {
            debug!("Not a jar, ignoring: {}", dependency.display());
            continue;
        }
        let outcome = process_archive(
            dependency,
            &mut index,
            &mut precomputed,
            &allowed_bases,
            &prefix,
            config.use_precomputed,
        );
        match outcome {
            Ok(ArchiveOutcome::Precomputed) => report.precomputed_archives += 1,
            Ok(ArchiveOutcome::Scanned) => report.scanned_archives += 1,
            Err(err) => {
                error!("Jar scan failed for {}: {}", dependency.display(), err);
                report.failed_archives += 1;
            }
        }
    }

    report.headers = index.len();
    info!(headers = index.len(), "Header index assembled");

    let mut results = IndexMap::new();
    for base in &bases {
        let found = collect_implementations(base, &index, precomputed.get(base));
        info!("Implementations found for {} = {}", to_dotted(base), found.len());
        results.insert(base.clone(), found);
    }

    report.index = Some(write_if_changed(&config.index_path(), &format_index(&results))?);

    if config.reflect_config {
        let names: BTreeSet<String> = results
            .values()
            .flatten()
            .map(|name| to_dotted(name))
            .chain(config.reflected_class_names())
            .collect();
        report.reflect_config = write_reflect_config(config, &names)?;
    } else {
        info!("reflect-config.json generation disabled");
    }

    report.implementations = results;
    Ok(report)
}

/// Read one dependency, preferring its precomputed fragments when they cover every base
fn process_archive(
    path: &Path,
    index: &mut HeaderIndex,
    precomputed: &mut PrecomputedIndex,
    allowed_bases: &BTreeSet<String>,
    prefix: &str,
    use_precomputed: bool,
) -> Result<ArchiveOutcome, SourceError> {
    let mut jar = JarArchive::open(path)?;

    if use_precomputed && !allowed_bases.is_empty() {
        let merge = merge_fragments(jar.fragments(prefix)?, prefix, allowed_bases);
        if merge.matched_all(allowed_bases) {
            info!("Using precomputed properties from {}", path.display());
            precomputed.absorb(merge);
            return Ok(ArchiveOutcome::Precomputed);
        }
        info!(
            "Precomputed files in {} missing entries for configured bases, will scan classes",
            path.display()
        );
    }

    info!("Scanning classes in {}", path.display());
    index_classes(&mut jar, index, CorruptClassPolicy::Skip)?;
    Ok(ArchiveOutcome::Scanned)
}

fn write_reflect_config(config: &GenerateConfig, names: &BTreeSet<String>) -> Result<Option<WrittenFile>> {
    if names.is_empty() {
        info!("Nothing to write to reflect-config.json");
        return Ok(None);
    }

    let path = config.reflect_config_path()?;
    let existing = fs::read_to_string(&path).ok();
    let merged = merge_reflect_config(names.iter().map(String::as_str), existing.as_deref());
    let written = write_if_changed(&path, &merged)?;
    info!("Updated {} classes into {}", names.len(), path.display());
    Ok(Some(written))
}
