pub mod app;
pub mod client;
pub mod config;
pub mod form;
pub mod render;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use client::{AnalysisClient, ServiceError, UploadFile};
pub use config::Config;
pub use form::{AnalysisRequest, Feature, FeatureSelection, Scenario};
pub use render::{Download, DownloadKind};
