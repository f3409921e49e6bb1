pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use error::{NetError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::{Input, Layer, LayerKind, ParamGrad, ParamsMut, Shape, Signal};
pub use network::{Model, ModelSpec, LayerSpec, Sample, TestReport};
pub use loss::{LossType, MseLoss};
pub use optim::sgd::Sgd;
pub use train::{train_loop, EpochStats, TrainConfig};
