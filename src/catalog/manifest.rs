use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::warn;

use crate::catalog::{CatalogEntry, CatalogError};
use crate::model::Category;

pub const MANIFEST_CANDIDATES: [&str; 2] = ["manifest.tsv", "manifest.tsv.gz"];

pub fn find_manifest(category_dir: &Path) -> Option<PathBuf> {
    MANIFEST_CANDIDATES
        .iter()
        .map(|name| category_dir.join(name))
        .find(|path| path.exists())
}

pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>, CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Reads one category manifest. Columns are located by header name
/// (`item`, `items`, `ground_truth`); bad lines are skipped with a warning.
pub fn read_manifest(path: &Path, category: Category) -> Result<Vec<CatalogEntry>, CatalogError> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut reader = open_maybe_gz(path)?;
    let io_err = |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut buf = String::new();
    let mut line_no = 0usize;
    let header = loop {
        buf.clear();
        if reader.read_line(&mut buf).map_err(io_err)? == 0 {
            return Err(CatalogError::Manifest {
                path: path.to_path_buf(),
                message: "manifest is empty".to_string(),
            });
        }
        line_no += 1;
        let line = buf.trim_end();
        if !line.is_empty() {
            break line
                .split('\t')
                .map(|s| s.trim().to_ascii_lowercase())
                .collect::<Vec<_>>();
        }
    };

    let column = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| CatalogError::Manifest {
                path: path.to_path_buf(),
                message: format!("header is missing the {name:?} column"),
            })
    };
    let item_col = column("item")?;
    let items_col = column("items")?;
    let truth_col = column("ground_truth")?;

    let mut entries = Vec::new();
    loop {
        buf.clear();
        if reader.read_line(&mut buf).map_err(io_err)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        match parse_entry(line, header.len(), item_col, items_col, truth_col) {
            Ok((item, items, ground_truth)) => {
                let item_path = Path::new(&item);
                let item_ref = if item_path.is_absolute() {
                    item
                } else {
                    base_dir.join(item_path).display().to_string()
                };
                entries.push(CatalogEntry {
                    category,
                    item_ref,
                    items,
                    ground_truth,
                });
            }
            Err(reason) => {
                warn!(
                    "skipping manifest line {} of {}: {}",
                    line_no,
                    path.display(),
                    reason
                );
            }
        }
    }

    Ok(entries)
}

type ParsedEntry = (String, Vec<String>, BTreeSet<String>);

fn parse_entry(
    line: &str,
    n_columns: usize,
    item_col: usize,
    items_col: usize,
    truth_col: usize,
) -> Result<ParsedEntry, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != n_columns {
        return Err(format!(
            "expected {} columns, found {}",
            n_columns,
            fields.len()
        ));
    }

    let item = fields[item_col].trim();
    if item.is_empty() {
        return Err("empty item reference".to_string());
    }

    let items = parse_id_list(fields[items_col])?;
    if items.is_empty() {
        return Err("trial shows no sub-items".to_string());
    }
    let mut seen = BTreeSet::new();
    for id in &items {
        if !seen.insert(id.as_str()) {
            return Err(format!("sub-item {id:?} listed twice"));
        }
    }

    let ground_truth: BTreeSet<String> = parse_id_list(fields[truth_col])?.into_iter().collect();
    if let Some(stray) = ground_truth.iter().find(|id| !seen.contains(id.as_str())) {
        return Err(format!(
            "ground truth item {stray:?} is not among the trial's sub-items"
        ));
    }

    Ok((item.to_string(), items, ground_truth))
}

/// Comma-separated sub-item ids. Quotes are refused so ids stay safe to
/// write into quoted ledger columns.
pub fn parse_id_list(field: &str) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    for raw in field.split(',') {
        let id = raw.trim();
        if id.is_empty() {
            continue;
        }
        if id.contains('"') {
            return Err(format!("sub-item id {id:?} contains a quote"));
        }
        out.push(id.to_string());
    }
    Ok(out)
}
