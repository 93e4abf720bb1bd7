use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cmp {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Cmp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
        }
    }
}

/// One inequality on a per-cell QC metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bound {
    pub op: Cmp,
    pub value: f64,
}

impl Bound {
    pub const fn new(op: Cmp, value: f64) -> Self {
        Self { op, value }
    }

    pub fn accepts(&self, x: f64) -> bool {
        match self.op {
            Cmp::Gt => x > self.value,
            Cmp::Ge => x >= self.value,
            Cmp::Lt => x < self.value,
            Cmp::Le => x <= self.value,
        }
    }
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.op.symbol(), self.value)
    }
}

/// Cell QC predicate: a cell is kept when every bound of every metric accepts it.
/// An empty list leaves that metric unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QcThresholds {
    pub mito_pattern: String,
    pub n_feature: Vec<Bound>,
    pub n_count: Vec<Bound>,
    /// Mitochondrial fraction in [0, 1].
    pub percent_mt: Vec<Bound>,
}

impl Default for QcThresholds {
    fn default() -> Self {
        Self {
            mito_pattern: "^MT-".to_string(),
            n_feature: vec![Bound::new(Cmp::Gt, 400.0)],
            // upper bound; flip to Gt for a library-size floor
            n_count: vec![Bound::new(Cmp::Lt, 2000.0)],
            percent_mt: vec![Bound::new(Cmp::Lt, 0.05)],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcFailures {
    pub n_feature: usize,
    pub n_count: usize,
    pub percent_mt: usize,
}

impl QcThresholds {
    /// Which metrics reject the cell, as (n_feature, n_count, percent_mt).
    pub fn check(&self, n_feature: f64, n_count: f64, percent_mt: f64) -> (bool, bool, bool) {
        (
            !self.n_feature.iter().all(|b| b.accepts(n_feature)),
            !self.n_count.iter().all(|b| b.accepts(n_count)),
            !self.percent_mt.iter().all(|b| b.accepts(percent_mt)),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/thresholds.rs"]
mod tests;
