pub mod umap;
