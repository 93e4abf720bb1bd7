use tracing::{debug, info, warn};

use crate::expr::dense::ScaledMatrix;
use crate::linalg::rsvd::{RsvdParams, randomized_svd};
use crate::model::config::PcaConfig;
use crate::model::dataset::Dataset;
use crate::model::reductions::PcaResult;
use crate::pipeline::{PipelineError, Stage, StageId};

/// Sum of the per-gene sample variances of the scaled matrix.
pub fn total_variance(scaled: &ScaledMatrix) -> f64 {
    let width = scaled.n_genes();
    let n = scaled.n_cells as f64;
    if n < 2.0 || width == 0 {
        return 0.0;
    }
    let mut mean = vec![0.0f64; width];
    for cell in 0..scaled.n_cells {
        for (m, &v) in mean.iter_mut().zip(scaled.cell(cell)) {
            *m += v;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);
    let mut ss = 0.0;
    for cell in 0..scaled.n_cells {
        for (&m, &v) in mean.iter().zip(scaled.cell(cell)) {
            ss += (v - m) * (v - m);
        }
    }
    ss / (n - 1.0)
}

/// Truncated PCA of the scaled matrix; cells are the observations.
pub fn run_pca(scaled: &ScaledMatrix, cfg: &PcaConfig, seed: u64) -> Result<PcaResult, PipelineError> {
    let n_cells = scaled.n_cells;
    let n_genes = scaled.n_genes();
    if n_cells < 2 {
        return Err(PipelineError::numeric(
            StageId::Pca,
            format!("pca needs at least 2 cells, got {}", n_cells),
        ));
    }
    if cfg.n_components == 0 {
        return Err(PipelineError::parameter(
            StageId::Pca,
            "pca.n_components",
            "must be at least 1",
        ));
    }
    let rank = cfg.n_components.min(n_cells).min(n_genes);
    if rank < cfg.n_components {
        warn!(
            requested = cfg.n_components,
            rank,
            cells = n_cells,
            genes = n_genes,
            "n_components exceeds matrix rank, clamping"
        );
    }

    let svd = randomized_svd(
        &scaled.to_dmatrix(),
        RsvdParams {
            rank,
            oversample: cfg.oversample,
            power_iterations: cfg.power_iterations,
            seed,
        },
    )
    .map_err(|e| PipelineError::numeric(StageId::Pca, e.to_string()))?;
    let k = svd.s.len();

    let mut scores = Vec::with_capacity(n_cells * k);
    for cell in 0..n_cells {
        for pc in 0..k {
            scores.push(svd.u[(cell, pc)] * svd.s[pc]);
        }
    }
    let mut loadings = Vec::with_capacity(n_genes * k);
    for gene in 0..n_genes {
        for pc in 0..k {
            loadings.push(svd.v[(gene, pc)]);
        }
    }

    let denom = (n_cells - 1) as f64;
    let stdev: Vec<f64> = svd.s.iter().map(|s| s / denom.sqrt()).collect();
    let variance: Vec<f64> = svd.s.iter().map(|s| s * s / denom).collect();
    let total = total_variance(scaled);
    let variance_ratio: Vec<f64> = variance
        .iter()
        .map(|v| if total > 0.0 { v / total } else { 0.0 })
        .collect();

    Ok(PcaResult {
        genes: scaled.genes.clone(),
        n_cells,
        n_components: k,
        loadings,
        scores,
        stdev,
        variance,
        variance_ratio,
        total_variance: total,
    })
}

pub struct PcaStage {
    cfg: PcaConfig,
    seed: u64,
}

impl PcaStage {
    pub fn new(cfg: PcaConfig, seed: u64) -> Self {
        Self { cfg, seed }
    }
}

impl Stage for PcaStage {
    fn id(&self) -> StageId {
        StageId::Pca
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "n_components": self.cfg.n_components,
            "oversample": self.cfg.oversample,
            "power_iterations": self.cfg.power_iterations,
            "seed": self.seed,
        })
    }

    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        let Some(scaled) = ds.scaled.as_ref() else {
            return Err(PipelineError::parameter(
                StageId::Pca,
                "scaled",
                "scaled data is required before pca",
            ));
        };
        let pca = run_pca(scaled, &self.cfg, self.seed)?;

        for pc in 0..pca.n_components.min(5) {
            let top = pca.top_loadings(pc, self.cfg.report_loadings);
            let positive: Vec<&str> = top
                .positive
                .iter()
                .map(|&(g, _)| ds.genes.symbols[g].as_str())
                .collect();
            let negative: Vec<&str> = top
                .negative
                .iter()
                .map(|&(g, _)| ds.genes.symbols[g].as_str())
                .collect();
            debug!(component = pc + 1, positive = ?positive, negative = ?negative, "top loadings");
        }
        info!(
            components = pca.n_components,
            pc1_ratio = pca.variance_ratio.first().copied().unwrap_or(0.0),
            "pca computed"
        );

        ds.invalidate_from(StageId::Pca);
        ds.pca = Some(pca);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage6_pca.rs"]
mod tests;
