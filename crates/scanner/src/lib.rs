//! Platform scanner
//!
//! A background worker that periodically visits each agent's declared
//! platform URLs, dispatches to the right connector, normalizes the result
//! into a [`isnad_domain::PlatformDatum`], and persists it next to the
//! ledger. One supervisor task runs the cycle; outbound requests share a
//! token-bucket rate limiter and carry a per-call deadline. A connector
//! never raises: failures come back as `alive = false` results, and one
//! agent's failure never aborts a cycle.

pub mod connectors;
pub mod error;
pub mod limiter;
pub mod store;
pub mod worker;

pub use connectors::{Connector, ConnectorRegistry};
pub use error::ScannerError;
pub use limiter::TokenBucket;
pub use store::PlatformStore;
pub use worker::{InMemoryDirectory, PlatformDirectory, PlatformRef, PlatformWorker, ScannerConfig};
