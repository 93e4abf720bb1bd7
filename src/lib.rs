pub mod cli;
pub mod embed;
pub mod expr;
pub mod graph;
pub mod input;
pub mod linalg;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod simd;
pub mod stats;
pub mod store;

pub mod prelude {
    pub use crate::input::detect::TenXFormat;
    pub use crate::model::config::PipelineConfig;
    pub use crate::model::dataset::Dataset;
    pub use crate::pipeline::{ErrorKind, Pipeline, PipelineError, Stage, StageId};
    pub use crate::store::snapshot::{read_snapshot, write_snapshot};
}
