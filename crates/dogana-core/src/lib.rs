//! Deterministic retrieval routing for customs and export-control questions.
//!
//! A question is classified into an [`intent::Intent`], scanned for codes
//! listed in the [`registry::Registry`], answered from collateral tables or
//! similarity search, and closed with source citations that never come from
//! the language model. [`orchestrator::Orchestrator`] ties the steps together.

pub mod attribution;
pub mod config;
pub mod error;
pub mod evidence;
pub mod intent;
pub mod lookup;
pub mod matcher;
pub mod normalizer;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod search;
pub mod vault;

pub use attribution::{Attribution, Citation};
pub use config::Config;
pub use error::{ErrorKind, ProviderError, RouteError, ValidationError};
pub use evidence::EvidenceRow;
pub use intent::Intent;
pub use orchestrator::{
    CodeSpecificMode, Fallback, Orchestrator, RetrievalSettings, RouteOutcome, RouteReport,
    RoutingTrace,
};
pub use registry::{Registry, RegistryEntry, RegistryError};
