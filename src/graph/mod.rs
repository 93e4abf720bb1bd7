pub mod knn;
pub mod louvain;
pub mod snn;
