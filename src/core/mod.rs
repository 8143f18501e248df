pub mod ingress;
pub mod pipeline;
pub mod registry;
pub mod throttle;
pub mod verifier;
pub mod worker;

pub use crate::domain::model::{Enrichment, Item};
pub use crate::domain::ports::{ItemStore, MarketLookup, Verifier};
pub use crate::utils::error::Result;
