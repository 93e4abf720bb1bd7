use super::*;

fn pca() -> PcaResult {
    // three genes, two cells, two components
    PcaResult {
        genes: vec![4, 7, 9],
        n_cells: 2,
        n_components: 2,
        loadings: vec![0.6, -0.1, -0.8, 0.2, 0.0, 0.9],
        scores: vec![1.0, 2.0, 3.0, 4.0],
        stdev: vec![2.0, 1.0],
        variance: vec![4.0, 1.0],
        variance_ratio: vec![0.5, 0.125],
        total_variance: 8.0,
    }
}

#[test]
fn leading_scores_take_the_first_components() {
    let p = pca();
    assert_eq!(p.leading_scores(1), vec![1.0, 3.0]);
    assert_eq!(p.leading_scores(2), p.scores);
    assert_eq!(p.leading_scores(5), p.scores);
    assert_eq!(p.score(1, 0), 3.0);
}

#[test]
fn elbow_is_one_based() {
    let elbow = pca().elbow();
    assert_eq!(elbow.len(), 2);
    assert_eq!(elbow[0].component, 1);
    assert_eq!(elbow[1].stdev, 1.0);
    assert_eq!(elbow[1].variance_ratio, 0.125);
}

#[test]
fn top_loadings_split_by_sign() {
    let top = pca().top_loadings(0, 2);
    assert_eq!(top.component, 1);
    assert_eq!(top.positive, vec![(4, 0.6)]);
    assert_eq!(top.negative, vec![(7, -0.8)]);

    let top = pca().top_loadings(1, 1);
    assert_eq!(top.positive, vec![(9, 0.9)]);
    assert_eq!(top.negative, vec![(4, -0.1)]);
}

#[test]
fn snn_rows_list_weighted_neighbours() {
    // 0-1 (0.5), 1-2 (1.0)
    let g = SnnGraph {
        n_nodes: 3,
        row_ptr: vec![0, 1, 3, 4],
        col_idx: vec![1, 0, 2, 1],
        weights: vec![0.5, 0.5, 1.0, 1.0],
    };
    assert_eq!(g.n_edges(), 2);
    assert_eq!(g.neighbors(1).collect::<Vec<_>>(), vec![(0, 0.5), (2, 1.0)]);
    assert_eq!(g.neighbors(2).count(), 1);
}

#[test]
fn clustering_keys_use_shortest_resolution_text() {
    assert_eq!(clustering_key(0.5), "snn_res.0.5");
    assert_eq!(clustering_key(1.0), "snn_res.1");
    assert_eq!(clustering_key(1.25), "snn_res.1.25");
}
