// bundlecfg - Installer bundle configuration resolution
//
// This is the library crate containing the resolution engine and data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod xml;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use engine::{ConfigEngine, EngineError, StartupSources};
pub use metrics::ResolutionMetrics;
pub use models::{EngineSettings, FormDesign, PageDesign, ProductSettings, RequirementGroup};
pub use xml::{XmlDocument, XmlError, XmlNode};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
