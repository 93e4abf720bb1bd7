use std::path::{Path, PathBuf};

use crate::input::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenXFormat {
    TenXv2,
    TenXv3,
}

impl std::fmt::Display for TenXFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenXFormat::TenXv2 => write!(f, "tenx_v2"),
            TenXFormat::TenXv3 => write!(f, "tenx_v3"),
        }
    }
}

/// Resolved file paths of one 10x matrix directory.
#[derive(Debug, Clone)]
pub struct TenXLayout {
    pub format: TenXFormat,
    pub matrix_path: PathBuf,
    pub features_path: PathBuf,
    pub barcodes_path: PathBuf,
}

impl TenXLayout {
    pub fn is_gzipped(&self) -> bool {
        [&self.matrix_path, &self.features_path, &self.barcodes_path]
            .iter()
            .any(|p| p.extension().and_then(|s| s.to_str()) == Some("gz"))
    }

    /// Format label recorded with the dataset, e.g. `tenx_v3+gz`.
    pub fn describe(&self) -> String {
        if self.is_gzipped() {
            format!("{}+gz", self.format)
        } else {
            self.format.to_string()
        }
    }
}

/// Locates the matrix, feature and barcode files of a 10x directory. A
/// `features.tsv` marks the v3 layout, a `genes.tsv` the v2 one.
pub fn detect_10x_dir(dir: &Path) -> Result<TenXLayout, InputError> {
    if !dir.is_dir() {
        return Err(InputError::MissingFile(format!(
            "input directory {}",
            dir.to_string_lossy()
        )));
    }
    let ds = kira_scio::discover(dir).map_err(|e| InputError::MissingFile(e.message))?;
    let barcodes = ds
        .barcodes
        .ok_or_else(|| InputError::MissingFile("barcodes.tsv[.gz]".to_string()))?;

    let (features_path, format) = if let Some(features) = ds.features {
        (features, TenXFormat::TenXv3)
    } else if let Some(genes) = ds.genes {
        (genes, TenXFormat::TenXv2)
    } else {
        return Err(InputError::MissingFile(
            "features.tsv/genes.tsv[.gz]".to_string(),
        ));
    };

    for path in [&ds.matrix, &features_path, &barcodes] {
        if !path.is_file() {
            return Err(InputError::MissingFile(path.to_string_lossy().to_string()));
        }
    }

    Ok(TenXLayout {
        format,
        matrix_path: ds.matrix,
        features_path,
        barcodes_path: barcodes,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/detect.rs"]
mod tests;
