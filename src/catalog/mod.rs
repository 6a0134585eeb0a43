use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::index;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod manifest;

use manifest::{find_manifest, read_manifest};

use crate::model::{Category, TrialSpec};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },
    #[error("insufficient data: no trial items available for {}", join_categories(.missing))]
    InsufficientData { missing: Vec<Category> },
    #[error("requested trial count must be at least 1")]
    ZeroCount,
}

fn join_categories(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One candidate trial as listed by the external catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub category: Category,
    pub item_ref: String,
    pub items: Vec<String>,
    pub ground_truth: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TrialCatalog {
    entries: Vec<CatalogEntry>,
}

impl TrialCatalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let mut seen = BTreeSet::new();
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert((entry.category, entry.item_ref.clone())) {
                warn!(
                    "duplicate catalog entry; keeping first (category {}, item {})",
                    entry.category, entry.item_ref
                );
                continue;
            }
            kept.push(entry);
        }
        Self { entries: kept }
    }

    /// Scans `root/<category>/manifest.tsv(.gz)` for every known category.
    pub fn discover(root: &Path) -> Result<Self, CatalogError> {
        let mut entries = Vec::new();
        for &category in Category::all() {
            let dir = root.join(category.as_str());
            if !dir.is_dir() {
                warn!(
                    "{} not found or is not a directory; no {} trials available",
                    dir.display(),
                    category
                );
                continue;
            }
            let Some(path) = find_manifest(&dir) else {
                warn!(
                    "{} has no manifest.tsv or manifest.tsv.gz; no {} trials available",
                    dir.display(),
                    category
                );
                continue;
            };
            let found = read_manifest(&path, category)?;
            info!(
                "catalog: {} {} entries from {}",
                found.len(),
                category,
                path.display()
            );
            entries.extend(found);
        }
        let catalog = Self::from_entries(entries);
        debug!("catalog counts by category: {:?}", catalog.count_by_category());
        Ok(catalog)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn count_by_category(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn build_trial_set<R: Rng + ?Sized>(
        &self,
        categories: &BTreeSet<Category>,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<TrialSpec>, CatalogError> {
        build_trial_set(self.entries(), categories, count, rng)
    }
}

/// Draws `min(count, available)` distinct entries of the requested categories.
/// Draw order assigns trial indices `1..=k`. An empty category set means all
/// categories.
pub fn build_trial_set<R: Rng + ?Sized>(
    source_items: &[CatalogEntry],
    categories: &BTreeSet<Category>,
    count: usize,
    rng: &mut R,
) -> Result<Vec<TrialSpec>, CatalogError> {
    if count == 0 {
        return Err(CatalogError::ZeroCount);
    }
    let requested: Vec<Category> = if categories.is_empty() {
        Category::all().to_vec()
    } else {
        categories.iter().copied().collect()
    };

    let mut seen = BTreeSet::new();
    let available: Vec<&CatalogEntry> = source_items
        .iter()
        .filter(|e| requested.contains(&e.category))
        .filter(|e| seen.insert((e.category, e.item_ref.as_str())))
        .collect();

    if available.is_empty() {
        return Err(CatalogError::InsufficientData { missing: requested });
    }
    for &category in &requested {
        if !available.iter().any(|e| e.category == category) {
            warn!("no trial items available for category {}", category);
        }
    }

    let k = count.min(available.len());
    if k < count {
        info!(
            "requested {} trials but only {} items are available; clamping",
            count, k
        );
    }

    let trials = index::sample(rng, available.len(), k)
        .into_iter()
        .enumerate()
        .map(|(pos, idx)| {
            let entry = available[idx];
            TrialSpec {
                trial_index: pos as u32 + 1,
                category: entry.category,
                item_ref: entry.item_ref.clone(),
                items: entry.items.clone(),
                ground_truth: entry.ground_truth.clone(),
            }
        })
        .collect();

    Ok(trials)
}

#[cfg(test)]
#[path = "../../tests/src_inline/catalog/tests.rs"]
mod tests;
