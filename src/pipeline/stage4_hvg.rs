use tracing::{debug, info};

use crate::expr::csc::CountMatrix;
use crate::model::config::HvgConfig;
use crate::model::dataset::{Dataset, HvgStats};
use crate::pipeline::{PipelineError, Stage, StageId};
use crate::stats::loess::{LoessError, loess_fit};

/// Per-gene moments of the raw counts and their variance-stabilized form.
#[derive(Debug, Clone, PartialEq)]
pub struct VstStats {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    pub variance_expected: Vec<f64>,
    pub variance_standardized: Vec<f64>,
}

/// Fits `log10(variance) ~ log10(mean)` by loess over genes with positive
/// variance and standardizes every gene against the fitted trend. Standardized
/// values are clipped above at `sqrt(n_cells)`. Constant genes get 0 throughout.
pub fn vst(counts: &CountMatrix, span: f64) -> Result<VstStats, LoessError> {
    let n_genes = counts.n_genes;
    let n = counts.n_cells as f64;
    let nnz = counts.cells_per_gene();

    let mut sum = vec![0.0f64; n_genes];
    for (&row, &v) in counts.row_idx.iter().zip(&counts.values) {
        sum[row as usize] += v as f64;
    }
    let mean: Vec<f64> = sum.iter().map(|s| s / n).collect();

    let mut ss = vec![0.0f64; n_genes];
    for (&row, &v) in counts.row_idx.iter().zip(&counts.values) {
        let d = v as f64 - mean[row as usize];
        ss[row as usize] += d * d;
    }
    let variance: Vec<f64> = (0..n_genes)
        .map(|g| (ss[g] + (n - nnz[g] as f64) * mean[g] * mean[g]) / (n - 1.0))
        .collect();

    let fit_genes: Vec<usize> = (0..n_genes).filter(|&g| variance[g] > 0.0).collect();
    let x: Vec<f64> = fit_genes.iter().map(|&g| mean[g].log10()).collect();
    let y: Vec<f64> = fit_genes.iter().map(|&g| variance[g].log10()).collect();
    let fitted = loess_fit(&x, &y, span)?;

    let mut variance_expected = vec![0.0f64; n_genes];
    for (&g, &f) in fit_genes.iter().zip(&fitted) {
        variance_expected[g] = 10f64.powf(f);
    }

    let clip = n.sqrt();
    let mut acc = vec![0.0f64; n_genes];
    for (&row, &v) in counts.row_idx.iter().zip(&counts.values) {
        let g = row as usize;
        if variance_expected[g] > 0.0 {
            let z = ((v as f64 - mean[g]) / variance_expected[g].sqrt()).min(clip);
            acc[g] += z * z;
        }
    }
    let variance_standardized: Vec<f64> = (0..n_genes)
        .map(|g| {
            if variance_expected[g] <= 0.0 {
                return 0.0;
            }
            let zero = mean[g] / variance_expected[g].sqrt();
            (acc[g] + (n - nnz[g] as f64) * zero * zero) / (n - 1.0)
        })
        .collect();

    Ok(VstStats {
        mean,
        variance,
        variance_expected,
        variance_standardized,
    })
}

/// Indices of the `n` genes with the largest standardized variance among genes
/// with positive variance, in rank order; ties go to the lower index.
pub fn select_top(stats: &VstStats, n: usize) -> Vec<usize> {
    let mut candidates: Vec<usize> = (0..stats.variance.len())
        .filter(|&g| stats.variance[g] > 0.0)
        .collect();
    candidates.sort_by(|&a, &b| {
        stats.variance_standardized[b]
            .total_cmp(&stats.variance_standardized[a])
            .then(a.cmp(&b))
    });
    candidates.truncate(n);
    candidates
}

pub struct HvgStage {
    cfg: HvgConfig,
}

impl HvgStage {
    pub fn new(cfg: HvgConfig) -> Self {
        Self { cfg }
    }
}

impl Stage for HvgStage {
    fn id(&self) -> StageId {
        StageId::Hvg
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.cfg).unwrap_or_default()
    }

    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        if ds.n_cells() < 2 {
            return Err(PipelineError::numeric(
                StageId::Hvg,
                format!("variance needs at least 2 cells, got {}", ds.n_cells()),
            ));
        }
        let stats = vst(&ds.counts, self.cfg.span).map_err(|e| match e {
            LoessError::TooFewPoints(0) => {
                PipelineError::empty(StageId::Hvg, "no gene varies across cells")
            }
            other => PipelineError::numeric(StageId::Hvg, other.to_string()),
        })?;
        let selected = select_top(&stats, self.cfg.n_features);
        if selected.len() < self.cfg.n_features {
            debug!(
                requested = self.cfg.n_features,
                available = selected.len(),
                "fewer variable genes than requested"
            );
        }

        let n_genes = ds.n_genes();
        let mut variable = vec![false; n_genes];
        let mut rank = vec![None; n_genes];
        for (r, &g) in selected.iter().enumerate() {
            variable[g] = true;
            rank[g] = Some(r as u32 + 1);
        }

        let top: Vec<&str> = selected
            .iter()
            .take(self.cfg.report_top)
            .map(|&g| ds.genes.symbols[g].as_str())
            .collect();
        info!(selected = selected.len(), top = ?top, "variable features");

        let hvg = HvgStats {
            mean: stats.mean,
            variance: stats.variance,
            variance_expected: stats.variance_expected,
            variance_standardized: stats.variance_standardized,
            variable,
            rank,
            selected,
            span: self.cfg.span,
        };
        ds.invalidate_from(StageId::Hvg);
        ds.genes.hvg = Some(hvg);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_hvg.rs"]
mod tests;
