use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::knn::Metric;
use crate::model::thresholds::{Bound, QcThresholds};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("invalid parameter `{name}`: {reason}")]
    Parameter { name: String, reason: String },
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Parameter {
        name: name.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Keep genes detected in at least this many cells.
    pub min_cells: usize,
    /// Keep cells with at least this many detected genes.
    pub min_features: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            min_cells: 3,
            min_features: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    pub scale_factor: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            scale_factor: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HvgConfig {
    pub n_features: usize,
    /// Loess span for the mean-variance trend.
    pub span: f64,
    /// How many top variable genes are reported.
    pub report_top: usize,
}

impl Default for HvgConfig {
    fn default() -> Self {
        Self {
            n_features: 2000,
            span: 0.3,
            report_top: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScaleConfig {
    /// Scale every gene instead of the variable ones only.
    pub all_genes: bool,
    /// Scaled values are clipped to `[-clip, clip]`; `inf` disables clipping.
    pub clip: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            all_genes: false,
            clip: 10.0,
        }
    }
}

impl ScaleConfig {
    pub fn clip_bound(&self) -> Option<f64> {
        self.clip.is_finite().then_some(self.clip)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PcaConfig {
    pub n_components: usize,
    pub oversample: usize,
    pub power_iterations: usize,
    /// Genes reported per direction and component.
    pub report_loadings: usize,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            n_components: 50,
            oversample: 10,
            power_iterations: 7,
            report_loadings: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NeighborsConfig {
    /// Leading principal components used for the graph.
    pub dims: usize,
    /// Neighbours per cell, the cell itself included.
    pub k: usize,
    /// Jaccard weights below this are dropped.
    pub prune: f64,
}

impl Default for NeighborsConfig {
    fn default() -> Self {
        Self {
            dims: 4,
            k: 20,
            prune: 1.0 / 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    pub resolutions: Vec<f64>,
    pub n_starts: usize,
    pub n_iterations: usize,
    pub min_clusters: usize,
    pub group_singletons: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            resolutions: vec![0.5],
            n_starts: 10,
            n_iterations: 10,
            min_clusters: 2,
            group_singletons: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UmapConfig {
    pub dims: usize,
    pub n_neighbors: usize,
    pub metric: Metric,
    pub min_dist: f64,
    pub spread: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_epochs: Option<usize>,
    pub learning_rate: f64,
    pub negative_sample_rate: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<f64>,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            dims: 20,
            n_neighbors: 30,
            metric: Metric::Cosine,
            min_dist: 0.3,
            spread: 1.0,
            n_epochs: None,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            a: None,
            b: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistConfig {
    pub overwrite: bool,
    pub include_scaled: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            include_scaled: true,
        }
    }
}

/// Every pipeline parameter, resolved once before the first stage runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub seed: u64,
    pub load: LoadConfig,
    pub qc: QcThresholds,
    pub normalize: NormalizeConfig,
    pub hvg: HvgConfig,
    pub scale: ScaleConfig,
    pub pca: PcaConfig,
    pub neighbors: NeighborsConfig,
    pub cluster: ClusterConfig,
    pub umap: UmapConfig,
    pub persist: PersistConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            load: LoadConfig::default(),
            qc: QcThresholds::default(),
            normalize: NormalizeConfig::default(),
            hvg: HvgConfig::default(),
            scale: ScaleConfig::default(),
            pca: PcaConfig::default(),
            neighbors: NeighborsConfig::default(),
            cluster: ClusterConfig::default(),
            umap: UmapConfig::default(),
            persist: PersistConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn mito_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.qc.mito_pattern)
            .map_err(|e| invalid("qc.mito_pattern", e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mito_regex()?;
        check_bounds("qc.n_feature", &self.qc.n_feature)?;
        check_bounds("qc.n_count", &self.qc.n_count)?;
        check_bounds("qc.percent_mt", &self.qc.percent_mt)?;

        positive("normalize.scale_factor", self.normalize.scale_factor)?;

        if self.hvg.n_features == 0 {
            return Err(invalid("hvg.n_features", "must be at least 1"));
        }
        if !(self.hvg.span > 0.0 && self.hvg.span <= 1.0) {
            return Err(invalid("hvg.span", "must be in (0, 1]"));
        }

        if self.scale.clip.is_nan() || self.scale.clip <= 0.0 {
            return Err(invalid("scale.clip", "must be positive or inf"));
        }

        if self.pca.n_components == 0 {
            return Err(invalid("pca.n_components", "must be at least 1"));
        }

        if self.neighbors.dims == 0 {
            return Err(invalid("neighbors.dims", "must be at least 1"));
        }
        if self.neighbors.dims > self.pca.n_components {
            return Err(invalid(
                "neighbors.dims",
                format!(
                    "{} exceeds pca.n_components {}",
                    self.neighbors.dims, self.pca.n_components
                ),
            ));
        }
        if self.neighbors.k < 2 {
            return Err(invalid("neighbors.k", "must be at least 2"));
        }
        if !(0.0..1.0).contains(&self.neighbors.prune) {
            return Err(invalid("neighbors.prune", "must be in [0, 1)"));
        }

        if self.cluster.resolutions.is_empty() {
            return Err(invalid("cluster.resolutions", "at least one resolution is required"));
        }
        for &r in &self.cluster.resolutions {
            positive("cluster.resolutions", r)?;
        }
        if self.cluster.n_starts == 0 {
            return Err(invalid("cluster.n_starts", "must be at least 1"));
        }
        if self.cluster.n_iterations == 0 {
            return Err(invalid("cluster.n_iterations", "must be at least 1"));
        }

        if self.umap.dims == 0 {
            return Err(invalid("umap.dims", "must be at least 1"));
        }
        if self.umap.dims > self.pca.n_components {
            return Err(invalid(
                "umap.dims",
                format!(
                    "{} exceeds pca.n_components {}",
                    self.umap.dims, self.pca.n_components
                ),
            ));
        }
        if self.umap.n_neighbors < 2 {
            return Err(invalid("umap.n_neighbors", "must be at least 2"));
        }
        positive("umap.spread", self.umap.spread)?;
        if !self.umap.min_dist.is_finite() || self.umap.min_dist < 0.0 {
            return Err(invalid("umap.min_dist", "must be non-negative"));
        }
        if self.umap.min_dist > self.umap.spread {
            return Err(invalid("umap.min_dist", "must not exceed umap.spread"));
        }
        positive("umap.learning_rate", self.umap.learning_rate)?;
        if self.umap.n_epochs == Some(0) {
            return Err(invalid("umap.n_epochs", "must be at least 1"));
        }
        if let Some(a) = self.umap.a {
            positive("umap.a", a)?;
        }
        if let Some(b) = self.umap.b {
            positive("umap.b", b)?;
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be a positive number, got {}", value)))
    }
}

fn check_bounds(name: &str, bounds: &[Bound]) -> Result<(), ConfigError> {
    match bounds.iter().find(|b| !b.value.is_finite()) {
        Some(b) => Err(invalid(name, format!("bound {} is not finite", b))),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/config.rs"]
mod tests;
