//! Globe image dashboard: wires the point store, clusterer, visibility
//! evaluator and interaction layer to the image service and a renderer.

pub mod commands;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod headless;
pub mod http;

pub use config::DashboardConfig;
pub use dashboard::{Dashboard, FetchOutcome, FrameStats, UploadTicket, run_upload};
pub use error::ActionError;
pub use headless::HeadlessGlobe;
pub use http::HttpImageService;
