use std::fs::File;
use std::path::Path;

use crate::model::dataset::{Dataset, QcReport};
use crate::model::reductions::PcaResult;
use crate::report::ReportError;

fn tsv_writer(path: &Path) -> Result<csv::Writer<File>, ReportError> {
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?)
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// One row per cell seen by QC, kept and dropped alike.
pub fn write_qc(path: &Path, qc: &QcReport) -> Result<(), ReportError> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["barcode", "n_count", "n_feature", "percent_mt", "pass"])?;
    for row in &qc.rows {
        wtr.write_record([
            row.barcode.clone(),
            row.n_count.to_string(),
            row.n_feature.to_string(),
            row.percent_mt.to_string(),
            row.pass.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Variance-stabilizing statistics for every gene; `rank` is empty for
/// genes outside the selection.
pub fn write_variable_features(path: &Path, ds: &Dataset) -> Result<(), ReportError> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record([
        "gene_id",
        "symbol",
        "mean",
        "variance",
        "variance_expected",
        "variance_standardized",
        "variable",
        "rank",
    ])?;
    let Some(hvg) = &ds.genes.hvg else {
        wtr.flush()?;
        return Ok(());
    };
    for g in 0..ds.genes.len() {
        wtr.write_record([
            ds.genes.ids[g].clone(),
            ds.genes.symbols[g].clone(),
            hvg.mean[g].to_string(),
            hvg.variance[g].to_string(),
            hvg.variance_expected[g].to_string(),
            hvg.variance_standardized[g].to_string(),
            hvg.variable[g].to_string(),
            opt(hvg.rank[g]),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_elbow(path: &Path, pca: &PcaResult) -> Result<(), ReportError> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["component", "stdev", "variance", "variance_ratio"])?;
    for point in pca.elbow() {
        wtr.write_record([
            point.component.to_string(),
            point.stdev.to_string(),
            pca.variance[point.component - 1].to_string(),
            point.variance_ratio.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// The `n` most positive and most negative genes of every component.
pub fn write_loadings_top(
    path: &Path,
    ds: &Dataset,
    pca: &PcaResult,
    n: usize,
) -> Result<(), ReportError> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["component", "direction", "rank", "gene_id", "symbol", "loading"])?;
    for pc in 0..pca.n_components {
        let top = pca.top_loadings(pc, n);
        let sides = [("positive", &top.positive), ("negative", &top.negative)];
        for (direction, genes) in sides {
            for (rank, &(gene, loading)) in genes.iter().enumerate() {
                wtr.write_record([
                    top.component.to_string(),
                    direction.to_string(),
                    (rank + 1).to_string(),
                    ds.genes.ids[gene].clone(),
                    ds.genes.symbols[gene].clone(),
                    loading.to_string(),
                ])?;
            }
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Per-cell metrics, one column per clustering, and the embedding.
pub fn write_cells(path: &Path, ds: &Dataset) -> Result<(), ReportError> {
    let cells = &ds.cells;
    let mut wtr = tsv_writer(path)?;

    let mut header = vec![
        "barcode".to_string(),
        "n_count".to_string(),
        "n_feature".to_string(),
        "percent_mt".to_string(),
    ];
    header.extend(cells.clusters.keys().cloned());
    if cells.umap.is_some() {
        header.push("umap_1".to_string());
        header.push("umap_2".to_string());
    }
    wtr.write_record(&header)?;

    for i in 0..cells.len() {
        let mut record = vec![
            cells.barcodes[i].clone(),
            cells.n_count[i].to_string(),
            cells.n_feature[i].to_string(),
            opt(cells.percent_mt.as_ref().map(|v| v[i])),
        ];
        record.extend(cells.clusters.values().map(|labels| labels[i].to_string()));
        if let Some(umap) = &cells.umap {
            record.push(umap[i][0].to_string());
            record.push(umap[i][1].to_string());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/tsv.rs"]
mod tests;
