//! Services module - Pure resolution logic over configuration nodes.
//!
//! Everything here is framework-agnostic and free of engine state: inputs are
//! nodes and collaborators, outputs are model values. The
//! [`ConfigEngine`](crate::engine::ConfigEngine) decides when to call what.
//!
//! # Components
//!
//! - [`requirements`]: builds the nested [`RequirementGroup`](crate::models::RequirementGroup)
//!   tree and materializes product custom variables through a [`RequirementEvaluator`]
//! - [`locale`]: locale strategy, OS language probing and resource lookup
//! - [`projector`]: projects `<Product>`, `<FormDesign>` and `<Flow>` nodes into
//!   [`ProductSettings`](crate::models::ProductSettings) and design records
//!
//! # Seams
//!
//! [`RequirementEvaluator`], [`OsLocaleProbe`] and [`LocaleResources`] are the
//! points where the host system plugs in. Tests mock the first two with
//! `mockall` and use [`InMemoryLocales`] for the third.

pub mod locale;
pub mod projector;
pub mod requirements;

pub use locale::{
    FixedLocaleProbe, InMemoryLocales, LocaleDirectory, LocaleResources, LocaleSession, LocaleStatus,
    LocaleStrategy, OsLocaleProbe, SystemLocaleProbe, negotiate_locale,
};
pub use projector::{ProjectionContext, build_form_design, build_pages_design, project_product};
pub use requirements::{
    NullEvaluator, RequirementEvaluator, build_requirement, build_requirements_group, build_requirements_root,
    eval_custom_variables,
};
