use regex::Regex;
use tracing::{debug, info};

use crate::model::dataset::{Dataset, QcReport, QcRow};
use crate::model::thresholds::{QcFailures, QcThresholds};
use crate::pipeline::{PipelineError, Stage, StageId};

/// Mitochondrial read fraction per cell over the genes whose symbol matches `mito`.
pub fn percent_mt(ds: &Dataset, mito: &Regex) -> Vec<f64> {
    let is_mito: Vec<bool> = ds.genes.symbols.iter().map(|s| mito.is_match(s)).collect();
    (0..ds.n_cells())
        .map(|cell| {
            let total = ds.cells.n_count[cell];
            if total == 0 {
                return 0.0;
            }
            let mt: u64 = ds
                .counts
                .iter_cell(cell)
                .filter(|&(gene, _)| is_mito[gene as usize])
                .map(|(_, v)| v as u64)
                .sum();
            mt as f64 / total as f64
        })
        .collect()
}

/// Evaluates the thresholds on every cell and keeps the passing ones. Genes are
/// not re-filtered afterwards.
pub struct QcStage {
    thresholds: QcThresholds,
    mito: Regex,
}

impl QcStage {
    pub fn new(thresholds: QcThresholds, mito: Regex) -> Self {
        Self { thresholds, mito }
    }
}

impl Stage for QcStage {
    fn id(&self) -> StageId {
        StageId::Qc
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.thresholds).unwrap_or_default()
    }

    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        let pct = percent_mt(ds, &self.mito);
        let n_mito = ds
            .genes
            .symbols
            .iter()
            .filter(|s| self.mito.is_match(s))
            .count();
        debug!(pattern = %self.thresholds.mito_pattern, genes = n_mito, "mitochondrial genes");

        let mut failures = QcFailures::default();
        let mut rows = Vec::with_capacity(ds.n_cells());
        let mut keep = Vec::new();
        for cell in 0..ds.n_cells() {
            let n_count = ds.cells.n_count[cell];
            let n_feature = ds.cells.n_feature[cell];
            let (bad_feature, bad_count, bad_mt) =
                self.thresholds
                    .check(n_feature as f64, n_count as f64, pct[cell]);
            failures.n_feature += bad_feature as usize;
            failures.n_count += bad_count as usize;
            failures.percent_mt += bad_mt as usize;
            let pass = !(bad_feature || bad_count || bad_mt);
            if pass {
                keep.push(cell);
            }
            rows.push(QcRow {
                barcode: ds.cells.barcodes[cell].clone(),
                n_count,
                n_feature,
                percent_mt: pct[cell],
                pass,
            });
        }

        if keep.is_empty() {
            return Err(PipelineError::empty(
                StageId::Qc,
                format!("no cell passed QC out of {}", ds.n_cells()),
            ));
        }

        let report = QcReport {
            thresholds: self.thresholds.clone(),
            n_before: ds.n_cells(),
            n_after: keep.len(),
            failures,
            rows,
        };
        info!(
            before = report.n_before,
            after = report.n_after,
            fail_n_feature = failures.n_feature,
            fail_n_count = failures.n_count,
            fail_percent_mt = failures.percent_mt,
            "qc applied"
        );

        ds.cells.percent_mt = Some(pct);
        ds.invalidate_from(StageId::Hvg);
        ds.retain_cells(&keep);
        ds.qc = Some(report);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_qc.rs"]
mod tests;
