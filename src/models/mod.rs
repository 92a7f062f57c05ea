//! Data models for bundle configuration resolution.
//!
//! - [`ProductSettings`]: the flat per-product record projected from a `<Product>` node
//! - [`RequirementGroup`] / [`Requirement`]: the nested requirement tree gating a product
//! - [`FormDesign`], [`PageDesign`], [`ControlsLayout`]: opaque layout records for the UI layer
//! - [`EngineSettings`]: operational settings loaded from `engine.yaml`
//!
//! # Architecture Note
//!
//! Projected records are plain values. They are rebuilt wholesale by
//! [`ConfigEngine`](crate::engine::ConfigEngine) when the document changes and
//! are never mutated afterwards.

pub mod config;
pub mod design;
pub mod product;
pub mod requirement;

pub use config::{EngineSection, EngineSettings};
pub use design::{Color, ControlsLayout, FormDesign, PageDesign};
pub use product::{DownloadUrl, ProductEvent, ProductSettings};
pub use requirement::{LogicalOperator, Requirement, RequirementGroup, RequirementKey};
