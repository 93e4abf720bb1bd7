use rayon::prelude::*;
use tracing::debug;

use crate::expr::csc::NormMatrix;
use crate::expr::dense::ScaledMatrix;
use crate::model::config::ScaleConfig;
use crate::model::dataset::Dataset;
use crate::pipeline::{PipelineError, Stage, StageId};

/// Centers each listed gene and divides by its sample standard deviation, zeros
/// included. Genes with zero deviation scale to 0; values are clipped to
/// `[-clip, clip]` when a clip is set.
pub fn scale_genes(data: &NormMatrix, genes: &[usize], clip: Option<f64>) -> ScaledMatrix {
    let width = genes.len();
    let n_cells = data.n_cells;
    let mut position = vec![usize::MAX; data.n_genes];
    for (pos, &g) in genes.iter().enumerate() {
        position[g] = pos;
    }

    let mut values = vec![0.0f64; n_cells * width];
    values
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(cell, row)| {
            for (gene, v) in data.iter_cell(cell) {
                let pos = position[gene as usize];
                if pos != usize::MAX {
                    row[pos] = v as f64;
                }
            }
        });

    let n = n_cells as f64;
    let mut gene_means = vec![0.0f64; width];
    let mut lo = vec![f64::INFINITY; width];
    let mut hi = vec![f64::NEG_INFINITY; width];
    for row in values.chunks(width.max(1)) {
        for (j, &v) in row.iter().enumerate() {
            gene_means[j] += v;
            lo[j] = lo[j].min(v);
            hi[j] = hi[j].max(v);
        }
    }
    gene_means.iter_mut().for_each(|m| *m /= n);

    let mut gene_sds = vec![0.0f64; width];
    for row in values.chunks(width.max(1)) {
        for ((s, &v), &m) in gene_sds.iter_mut().zip(row).zip(&gene_means) {
            *s += (v - m) * (v - m);
        }
    }
    for (j, s) in gene_sds.iter_mut().enumerate() {
        // constant columns get an exact zero, not rounding residue
        *s = if n > 1.0 && lo[j] < hi[j] {
            (*s / (n - 1.0)).sqrt()
        } else {
            0.0
        };
    }

    values
        .par_chunks_mut(width.max(1))
        .for_each(|row| {
            for ((v, &m), &sd) in row.iter_mut().zip(&gene_means).zip(&gene_sds) {
                let mut z = if sd > 0.0 { (*v - m) / sd } else { 0.0 };
                if let Some(c) = clip {
                    z = z.clamp(-c, c);
                }
                *v = z;
            }
        });

    ScaledMatrix {
        genes: genes.to_vec(),
        n_cells,
        values,
        gene_means,
        gene_sds,
        clip,
    }
}

pub struct ScaleStage {
    cfg: ScaleConfig,
}

impl ScaleStage {
    pub fn new(cfg: ScaleConfig) -> Self {
        Self { cfg }
    }
}

impl Stage for ScaleStage {
    fn id(&self) -> StageId {
        StageId::Scale
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.cfg).unwrap_or_default()
    }

    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        let Some(data) = ds.data.as_ref() else {
            return Err(PipelineError::parameter(
                StageId::Scale,
                "data",
                "scaling raw counts is not supported; normalize first",
            ));
        };
        let genes: Vec<usize> = if self.cfg.all_genes {
            (0..ds.n_genes()).collect()
        } else {
            match ds.genes.variable_genes() {
                Some(selected) => selected.to_vec(),
                None => {
                    return Err(PipelineError::parameter(
                        StageId::Scale,
                        "scale.all_genes",
                        "variable features have not been selected",
                    ));
                }
            }
        };
        if genes.is_empty() {
            return Err(PipelineError::empty(StageId::Scale, "no gene to scale"));
        }

        let scaled = scale_genes(data, &genes, self.cfg.clip_bound());
        let constant = scaled.gene_sds.iter().filter(|&&s| s == 0.0).count();
        debug!(
            genes = scaled.n_genes(),
            cells = scaled.n_cells,
            constant,
            "scaled"
        );

        ds.invalidate_from(StageId::Scale);
        ds.scaled = Some(scaled);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage5_scale.rs"]
mod tests;
