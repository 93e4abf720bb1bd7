use super::*;
use crate::expr::csc::CountMatrix;
use crate::expr::normalize::log_normalize;
use crate::pipeline::ErrorKind;
use crate::pipeline::fixtures::prepared;
use approx::assert_abs_diff_eq;

fn norm(rows: &[&[u32]], n_cells: usize) -> NormMatrix {
    let mut entries = Vec::new();
    for (g, row) in rows.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            if v > 0 {
                entries.push((c as u32, g as u32, v));
            }
        }
    }
    let counts = CountMatrix::from_entries(rows.len(), n_cells, entries).expect("matrix");
    let mut data = log_normalize(&counts, &counts.cell_stats(), 1.0);
    // identity transform keeps the arithmetic readable
    for (v, &c) in data.values.iter_mut().zip(&counts.values) {
        *v = c as f32;
    }
    data
}

#[test]
fn columns_have_zero_mean_and_unit_sd() {
    let data = norm(&[&[1, 2, 3, 4, 0], &[0, 0, 5, 0, 0], &[2, 2, 2, 2, 2]], 5);
    let scaled = scale_genes(&data, &[0, 1, 2], None);

    for pos in 0..2 {
        let col: Vec<f64> = (0..5).map(|c| scaled.get(pos, c)).collect();
        let mean = col.iter().sum::<f64>() / 5.0;
        let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / 4.0;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(scaled.gene_means[0], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(scaled.gene_sds[0], 2.5f64.sqrt(), epsilon = 1e-12);
}

#[test]
fn constant_gene_scales_to_zero() {
    let data = norm(&[&[1, 2, 3], &[2, 2, 2]], 3);
    let scaled = scale_genes(&data, &[0, 1], Some(10.0));
    assert_eq!(scaled.gene_sds[1], 0.0);
    assert!((0..3).all(|c| scaled.get(1, c) == 0.0));
}

#[test]
fn clipping_is_symmetric() {
    // one outlier among many zeros gives a z-score far above 2
    let mut row = vec![0u32; 30];
    row[0] = 9;
    let data = norm(&[&row], 30);
    let scaled = scale_genes(&data, &[0], Some(2.0));
    assert_abs_diff_eq!(scaled.get(0, 0), 2.0, epsilon = 1e-12);
    assert!((0..30).all(|c| scaled.get(0, c).abs() <= 2.0));

    let mut row = vec![9u32; 30];
    row[0] = 0;
    let data = norm(&[&row], 30);
    let scaled = scale_genes(&data, &[0], Some(2.0));
    assert_abs_diff_eq!(scaled.get(0, 0), -2.0, epsilon = 1e-12);
}

#[test]
fn column_order_follows_gene_list() {
    let data = norm(&[&[1, 2, 3], &[3, 0, 3]], 3);
    let scaled = scale_genes(&data, &[1, 0], None);
    assert_eq!(scaled.genes, vec![1, 0]);
    assert_abs_diff_eq!(scaled.gene_means[0], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(scaled.gene_means[1], 2.0, epsilon = 1e-12);
    assert!(scaled.get(0, 1) < 0.0);
}

#[test]
fn scales_variable_genes_in_rank_order() {
    let ds = prepared(9, StageId::Scale);
    let scaled = ds.scaled.as_ref().expect("scaled");
    let selected = ds.genes.variable_genes().expect("hvg");
    assert_eq!(scaled.genes, selected);
    assert_eq!(scaled.n_cells, ds.n_cells());
    assert!(scaled.values.iter().all(|v| v.abs() <= 10.0));
}

#[test]
fn all_genes_option_scales_everything() {
    let mut ds = prepared(9, StageId::Hvg);
    ScaleStage::new(ScaleConfig {
        all_genes: true,
        clip: f64::INFINITY,
    })
    .apply(&mut ds)
    .expect("scale");
    assert_eq!(ds.scaled.as_ref().map(|s| s.n_genes()), Some(ds.n_genes()));
}

#[test]
fn scaling_raw_counts_is_rejected() {
    let mut ds = prepared(9, StageId::Qc);
    let err = ScaleStage::new(ScaleConfig::default())
        .apply(&mut ds)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert!(ds.scaled.is_none());
}

#[test]
fn missing_variable_genes_is_rejected() {
    let mut ds = prepared(9, StageId::Normalize);
    let err = ScaleStage::new(ScaleConfig::default())
        .apply(&mut ds)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parameter);
}
