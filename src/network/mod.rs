pub mod model;
pub mod spec;

pub use model::{top_k_match, Model, Sample, TestReport};
pub use spec::{LayerSpec, ModelSpec};
