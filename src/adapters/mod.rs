// Adapters layer: concrete implementations for external systems (remote lookup, storage, http ingress).

pub mod http;
pub mod server;
pub mod storage;

pub use http::CoinGeckoClient;
pub use server::IngressServer;
pub use storage::{JsonFileStore, MemoryStore};
