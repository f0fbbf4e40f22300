//! EMQX-Client
//!
//! Negotiates which admin API dialect an EMQX cluster speaks and exposes the
//! cluster metrics through a single facade, [`Cluster`].

pub mod config;
pub use config::{DiscoveryOptions, EndpointConfig, Scheme, TlsOptions};

pub mod errors;
pub use errors::{ClientError, Result};

pub mod types;

pub mod dialect;
pub use dialect::{Dialect, DialectClient};

mod discovery;
pub use discovery::DiscoveryLoop;

mod cluster;
pub use cluster::{remaining_days, ClientSlot, Cluster};

#[cfg(test)]
mod test_dialect;
