pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::ServerConfig;
pub use core::pipeline::{PipelineHandle, PipelineSettings, VerificationPipeline};
pub use core::registry::{DedupPolicy, DedupRegistry};
pub use core::verifier::RegistryVerifier;
pub use domain::model::{Enrichment, Item};
pub use domain::ports::{ItemStore, MarketLookup, Verifier};
pub use utils::error::{Result, TokenError};
