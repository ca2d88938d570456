pub mod bpm;
pub mod config;
pub mod drivers;
pub mod types;
pub mod viewer;
pub use config::ViewerConfig;
pub use viewer::Viewer;
