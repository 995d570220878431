pub mod chart;
pub mod config;
pub mod dataset;
pub mod error;
pub mod http;
pub mod model;
pub mod telemetry;
pub mod types;

pub use chart::{ChartEngine, ChartType};
pub use config::ServiceConfig;
pub use error::ChartError;
pub use http::{router, AppState};
pub use model::RegressionModel;
