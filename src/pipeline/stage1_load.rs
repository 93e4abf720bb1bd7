use std::path::Path;

use tracing::{debug, warn};

use crate::expr::csc::CountMatrix;
use crate::input::InputError;
use crate::input::barcodes::read_barcodes;
use crate::input::detect::detect_10x_dir;
use crate::input::features::read_features;
use crate::input::mtx::{read_entries, read_header};
use crate::model::config::LoadConfig;
use crate::model::dataset::{CellTable, Dataset, GeneTable, SourceInfo};
use crate::pipeline::{PipelineError, StageId};

fn input_error(e: InputError) -> PipelineError {
    match e {
        InputError::Io(source) => PipelineError::Io {
            stage: StageId::Load,
            source,
        },
        other => PipelineError::format(StageId::Load, other),
    }
}

/// Reads a 10x directory into a dataset. Cells with fewer than `min_features`
/// detected genes are dropped first, then genes detected in fewer than
/// `min_cells` of the remaining cells.
pub fn run_stage1(input_dir: &Path, cfg: &LoadConfig) -> Result<Dataset, PipelineError> {
    let layout = detect_10x_dir(input_dir).map_err(input_error)?;
    let barcodes = read_barcodes(&layout.barcodes_path).map_err(input_error)?;
    let gene_index = read_features(&layout.features_path).map_err(input_error)?;

    // Dimensions are checked before the entries are read.
    let header = read_header(&layout.matrix_path).map_err(input_error)?;
    if header.n_rows != gene_index.rows.len() {
        return Err(input_error(InputError::DimensionMismatch {
            what: "feature",
            expected: header.n_rows,
            found: gene_index.rows.len(),
        }));
    }
    if header.n_cols != barcodes.len() {
        return Err(input_error(InputError::DimensionMismatch {
            what: "barcode",
            expected: header.n_cols,
            found: barcodes.len(),
        }));
    }

    let (header, entries) = read_entries(&layout.matrix_path).map_err(input_error)?;
    let raw = CountMatrix::from_entries(header.n_rows, header.n_cols, entries).map_err(input_error)?;
    debug!(
        format = %layout.describe(),
        genes = raw.n_genes,
        cells = raw.n_cells,
        nnz = raw.nnz(),
        "matrix read"
    );

    if !gene_index.duplicates.is_empty() {
        warn!(
            duplicates = gene_index.duplicates.len(),
            "duplicate gene symbols renamed"
        );
    }

    let detected = raw.genes_per_cell();
    let keep_cells: Vec<usize> = (0..raw.n_cells)
        .filter(|&c| detected[c] as usize >= cfg.min_features)
        .collect();
    if keep_cells.is_empty() {
        return Err(PipelineError::empty(
            StageId::Load,
            format!("no cell has at least {} detected genes", cfg.min_features),
        ));
    }
    let by_cell = raw.subset_cells(&keep_cells);

    let cells_per_gene = by_cell.cells_per_gene();
    let keep_genes: Vec<usize> = (0..by_cell.n_genes)
        .filter(|&g| cells_per_gene[g] as usize >= cfg.min_cells)
        .collect();
    if keep_genes.is_empty() {
        return Err(PipelineError::empty(
            StageId::Load,
            format!("no gene is detected in at least {} cells", cfg.min_cells),
        ));
    }
    let counts = by_cell.subset_genes(&keep_genes);

    let stats = counts.cell_stats();
    let cells = CellTable {
        barcodes: keep_cells.iter().map(|&c| barcodes[c].clone()).collect(),
        n_count: stats.iter().map(|s| s.libsize).collect(),
        n_feature: stats.iter().map(|s| s.detected).collect(),
        ..CellTable::default()
    };
    let genes = GeneTable {
        ids: keep_genes
            .iter()
            .map(|&g| gene_index.rows[g].id.clone())
            .collect(),
        symbols: keep_genes
            .iter()
            .map(|&g| gene_index.unique_symbols[g].clone())
            .collect(),
        feature_types: keep_genes
            .iter()
            .map(|&g| gene_index.rows[g].feature_type.clone())
            .collect(),
        n_cells: counts.cells_per_gene(),
        hvg: None,
    };

    debug!(
        cells_dropped = raw.n_cells - keep_cells.len(),
        genes_dropped = raw.n_genes - keep_genes.len(),
        "load filters applied"
    );

    Ok(Dataset {
        source: SourceInfo {
            input_dir: input_dir.to_string_lossy().to_string(),
            format: layout.describe(),
            n_genes_raw: raw.n_genes,
            n_cells_raw: raw.n_cells,
            nnz_raw: raw.nnz(),
            duplicate_genes: gene_index.duplicates,
        },
        counts,
        data: None,
        scale_factor: None,
        cells,
        genes,
        scaled: None,
        pca: None,
        neighbors: None,
        clusterings: Default::default(),
        umap: None,
        qc: None,
        history: Vec::new(),
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_load.rs"]
mod tests;
