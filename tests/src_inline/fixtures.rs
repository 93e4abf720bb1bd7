//! Synthetic 10x inputs shared by the stage tests.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Poisson;

use crate::model::config::PipelineConfig;
use crate::model::dataset::Dataset;
use crate::pipeline::{Pipeline, StageId, run_stage};
use crate::model::thresholds::{Bound, Cmp};

pub(crate) const N_MITO: usize = 10;
pub(crate) const N_HOUSEKEEPING: usize = 240;
pub(crate) const MARKERS_PER_TYPE: usize = 10;
pub(crate) const N_TYPES: usize = 3;
pub(crate) const CELLS_PER_TYPE: usize = 30;
pub(crate) const N_HIGH_MITO: usize = 3;
pub(crate) const N_SPARSE: usize = 2;
pub(crate) const N_RARE_GENES: usize = 5;

pub(crate) struct Synthetic {
    /// (id, symbol) per gene
    pub genes: Vec<(String, String)>,
    pub barcodes: Vec<String>,
    /// (gene, cell, count), zero-based, nonzero counts only
    pub triplets: Vec<(usize, usize, u32)>,
    /// Cell type per cell; `None` for the damaged and near-empty cells.
    pub cell_type: Vec<Option<usize>>,
}

impl Synthetic {
    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_cells(&self) -> usize {
        self.barcodes.len()
    }
}

/// Three cell types separated by marker blocks over Poisson background genes, plus
/// cells with a high mitochondrial fraction, cells with too few genes and genes seen
/// in a single cell.
pub(crate) fn synthetic(seed: u64) -> Synthetic {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut genes = Vec::new();
    for i in 0..N_MITO {
        genes.push((format!("ENSG9{:04}", i), format!("MT-G{}", i)));
    }
    for i in 0..N_HOUSEKEEPING {
        // two housekeeping genes share a symbol
        let symbol = if i == 7 || i == 8 {
            "DUP".to_string()
        } else {
            format!("HK{}", i)
        };
        genes.push((format!("ENSG1{:04}", i), symbol));
    }
    for t in 0..N_TYPES {
        for i in 0..MARKERS_PER_TYPE {
            genes.push((format!("ENSG2{}{:03}", t, i), format!("MARK{}_{}", t, i)));
        }
    }
    for i in 0..N_RARE_GENES {
        genes.push((format!("ENSG3{:04}", i), format!("RARE{}", i)));
    }
    let marker_start = N_MITO + N_HOUSEKEEPING;
    let rare_start = marker_start + N_TYPES * MARKERS_PER_TYPE;

    let mut cell_type = Vec::new();
    for t in 0..N_TYPES {
        for _ in 0..CELLS_PER_TYPE {
            cell_type.push(Some(t));
        }
    }
    for _ in 0..N_HIGH_MITO + N_SPARSE {
        cell_type.push(None);
    }
    let n_cells = cell_type.len();
    let high_mito_start = N_TYPES * CELLS_PER_TYPE;
    let sparse_start = high_mito_start + N_HIGH_MITO;

    let draw = |rng: &mut StdRng, rate: f64| -> u32 {
        let dist = Poisson::new(rate).expect("poisson rate");
        rng.sample(dist) as u32
    };

    let mut triplets = Vec::new();
    for cell in 0..n_cells {
        let sparse = cell >= sparse_start;
        let high_mito = (high_mito_start..sparse_start).contains(&cell);

        for g in 0..N_MITO {
            let count = if high_mito {
                30
            } else if sparse {
                0
            } else {
                draw(&mut rng, 0.3)
            };
            if count > 0 {
                triplets.push((g, cell, count));
            }
        }
        for i in 0..N_HOUSEKEEPING {
            let count = if sparse {
                (i < 40) as u32
            } else {
                // rates log-spaced over 0.3..5
                let rate = 0.3 * (50.0f64 / 3.0).powf(i as f64 / (N_HOUSEKEEPING - 1) as f64);
                draw(&mut rng, rate)
            };
            if count > 0 {
                triplets.push((N_MITO + i, cell, count));
            }
        }
        if let Some(t) = cell_type[cell] {
            for i in 0..MARKERS_PER_TYPE {
                // rates log-spaced over 2..8
                let rate = 2.0 * 4f64.powf(i as f64 / (MARKERS_PER_TYPE - 1) as f64);
                let count = draw(&mut rng, rate);
                if count > 0 {
                    triplets.push((marker_start + t * MARKERS_PER_TYPE + i, cell, count));
                }
            }
        }
    }
    // rare genes: each seen in exactly one cell
    for i in 0..N_RARE_GENES {
        triplets.push((rare_start + i, i * 3, 5));
    }

    let barcodes = (0..n_cells).map(|c| format!("CELL{:04}-1", c)).collect();
    Synthetic {
        genes,
        barcodes,
        triplets,
        cell_type,
    }
}

pub(crate) fn write_mtx(path: &Path, n_genes: usize, n_cells: usize, triplets: &[(usize, usize, u32)]) {
    let mut out = String::from("%%MatrixMarket matrix coordinate integer general\n");
    out.push_str("% synthetic\n");
    out.push_str(&format!("{} {} {}\n", n_genes, n_cells, triplets.len()));
    for &(g, c, v) in triplets {
        out.push_str(&format!("{} {} {}\n", g + 1, c + 1, v));
    }
    fs::write(path, out).expect("write matrix");
}

pub(crate) fn write_10x(dir: &Path, data: &Synthetic) {
    write_mtx(
        &dir.join("matrix.mtx"),
        data.n_genes(),
        data.n_cells(),
        &data.triplets,
    );
    let features: String = data
        .genes
        .iter()
        .map(|(id, sym)| format!("{}\t{}\tGene Expression\n", id, sym))
        .collect();
    fs::write(dir.join("features.tsv"), features).expect("write features");
    let barcodes: String = data.barcodes.iter().map(|b| format!("{}\n", b)).collect();
    fs::write(dir.join("barcodes.tsv"), barcodes).expect("write barcodes");
}

pub(crate) fn synthetic_dir(seed: u64) -> (tempfile::TempDir, Synthetic) {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = synthetic(seed);
    write_10x(dir.path(), &data);
    (dir, data)
}

/// Defaults scaled down to the synthetic data size.
pub(crate) fn small_config() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.load.min_features = 100;
    cfg.qc.n_feature = vec![Bound::new(Cmp::Gt, 120.0)];
    cfg.hvg.n_features = 100;
    cfg.pca.n_components = 10;
    cfg.pca.report_loadings = 3;
    cfg.neighbors.dims = 5;
    cfg.neighbors.k = 10;
    cfg.umap.dims = 5;
    cfg.umap.n_neighbors = 10;
    cfg.umap.n_epochs = Some(60);
    cfg
}

/// Synthetic data loaded with [`small_config`] and run through every stage up to `upto`.
pub(crate) fn prepared(seed: u64, upto: StageId) -> Dataset {
    let (dir, _) = synthetic_dir(seed);
    let pipeline = Pipeline::new(small_config()).expect("pipeline");
    let mut ds = pipeline.load(dir.path()).expect("load");
    for stage in pipeline.stages.iter().filter(|s| s.id() <= upto) {
        run_stage(stage.as_ref(), &mut ds).expect("stage");
    }
    ds
}
