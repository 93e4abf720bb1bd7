use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::input::{InputError, for_each_line};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub id: String,
    pub symbol: String,
    pub feature_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGene {
    pub symbol: String,
    pub first_row: usize,
    pub dup_row: usize,
    pub renamed: String,
}

#[derive(Debug, Clone)]
pub struct GeneIndex {
    pub rows: Vec<FeatureRow>,
    pub duplicates: Vec<DuplicateGene>,
    /// Symbols made unique along the gene axis (`X`, `X.1`, `X.2`, ...).
    pub unique_symbols: Vec<String>,
}

pub fn read_features(path: &Path) -> Result<GeneIndex, InputError> {
    let mut rows = Vec::new();
    for_each_line(path, |line_no, line| {
        if line.trim().is_empty() {
            return Err(InputError::InvalidTsvRow {
                line: line_no,
                reason: "empty feature row".to_string(),
            });
        }
        let mut parts = line.split('\t');
        let id = parts.next().unwrap_or("").trim();
        if id.is_empty() {
            return Err(InputError::InvalidTsvRow {
                line: line_no,
                reason: "missing feature id".to_string(),
            });
        }
        let symbol = match parts.next().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => id,
        };
        let feature_type = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        rows.push(FeatureRow {
            id: id.to_string(),
            symbol: symbol.to_string(),
            feature_type,
        });
        Ok(())
    })?;

    if rows.is_empty() {
        return Err(InputError::InvalidTsvRow {
            line: 0,
            reason: "no feature rows found".to_string(),
        });
    }

    Ok(build_gene_index(rows))
}

pub fn build_gene_index(rows: Vec<FeatureRow>) -> GeneIndex {
    let mut duplicates = Vec::new();
    let mut first_row_by_symbol: HashMap<&str, usize> = HashMap::new();
    let mut taken: HashSet<String> = rows.iter().map(|r| r.symbol.clone()).collect();
    let mut next_suffix: HashMap<&str, usize> = HashMap::new();
    let mut unique_symbols = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let row_no = idx + 1;
        match first_row_by_symbol.get(row.symbol.as_str()).copied() {
            None => {
                first_row_by_symbol.insert(row.symbol.as_str(), row_no);
                unique_symbols.push(row.symbol.clone());
            }
            Some(first_row) => {
                let suffix = next_suffix.entry(row.symbol.as_str()).or_insert(1);
                let mut renamed = format!("{}.{}", row.symbol, suffix);
                while taken.contains(&renamed) {
                    *suffix += 1;
                    renamed = format!("{}.{}", row.symbol, suffix);
                }
                *suffix += 1;
                taken.insert(renamed.clone());
                duplicates.push(DuplicateGene {
                    symbol: row.symbol.clone(),
                    first_row,
                    dup_row: row_no,
                    renamed: renamed.clone(),
                });
                unique_symbols.push(renamed);
            }
        }
    }

    GeneIndex {
        rows,
        duplicates,
        unique_symbols,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/features.rs"]
mod tests;
