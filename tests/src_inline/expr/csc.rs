use super::*;

fn tiny() -> CountMatrix {
    // gene x cell:
    // [1 4 0]
    // [2 0 0]
    // [0 3 6]
    CountMatrix::from_entries(
        3,
        3,
        vec![(1, 2, 3), (0, 0, 1), (2, 2, 6), (0, 1, 2), (1, 0, 4)],
    )
    .expect("csc")
}

#[test]
fn build_csc_tiny() {
    let csc = tiny();
    assert_eq!(csc.col_ptr, vec![0, 2, 4, 5]);
    assert_eq!(csc.row_idx, vec![0, 1, 0, 2, 2]);
    assert_eq!(csc.values, vec![1, 2, 4, 3, 6]);

    let stats = csc.cell_stats();
    assert_eq!(stats[0].libsize, 3);
    assert_eq!(stats[0].detected, 2);
    assert_eq!(stats[1].libsize, 7);
    assert_eq!(stats[2].libsize, 6);
    assert_eq!(stats[2].detected, 1);
}

#[test]
fn duplicate_coordinates_are_rejected() {
    let err = CountMatrix::from_entries(2, 2, vec![(0, 1, 3), (0, 1, 4)]).unwrap_err();
    assert!(matches!(err, InputError::InvalidMtxDimensions(_)));
}

#[test]
fn subset_cells_keeps_order() {
    let sub = tiny().subset_cells(&[2, 0]);
    assert_eq!(sub.n_cells, 2);
    assert_eq!(sub.col_ptr, vec![0, 1, 3]);
    assert_eq!(sub.row_idx, vec![2, 0, 1]);
    assert_eq!(sub.values, vec![6, 1, 2]);
}

#[test]
fn subset_genes_remaps_rows() {
    let sub = tiny().subset_genes(&[0, 2]);
    assert_eq!(sub.n_genes, 2);
    assert_eq!(sub.col_ptr, vec![0, 1, 3, 4]);
    assert_eq!(sub.row_idx, vec![0, 0, 1, 1]);
    assert_eq!(sub.values, vec![1, 4, 3, 6]);
}

#[test]
fn detection_counts() {
    let csc = tiny();
    assert_eq!(csc.cells_per_gene(), vec![2, 1, 2]);
    assert_eq!(csc.genes_per_cell(), vec![2, 2, 1]);
}
