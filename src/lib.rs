//! vwgen - VXLAN-over-WireGuard mesh configuration generator
//!
//! Compiles a declarative description of a mesh network (nodes, keys,
//! addressing, VXLAN parameters and a peer blacklist) into the `wg-quick`
//! configuration of each node. Every node gets a WireGuard interface whose
//! lifecycle scripts create a VXLAN device on top of it, so the whole mesh
//! behaves like one Ethernet segment.
//!
//! # Features
//!
//! - Deterministic output, one `[Peer]` section per node in declaration order
//! - Public keys recovered from declared private keys
//! - MAC and overlay IPv6 addresses derived from public keys
//! - Blacklisted links emitted commented out instead of dropped

pub mod config;
pub mod error;
pub mod keys;
pub mod model;
pub mod showconf;

pub use config::Network;
pub use error::{Error, Result};
pub use model::{Blacklist, NamePair, NetworkConfig, NetworkModel, NodeConfig, NodeTable};
pub use showconf::{compile, Compiled, Warning};
