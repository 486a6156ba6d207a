//! Network configuration files
//!
//! A network named `mesh` lives in `mesh.conf` inside the configuration
//! directory. The file is TOML with a `[Network]` table, one
//! `[Node.<name>]` table per node (declaration order is kept), and a
//! top-level `Blacklist` list of name pairs.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::model::{Blacklist, NetworkConfig, NetworkModel, NodeTable, MAX_VXLAN_MTU};

/// Extension of network configuration files
pub const CONFIG_EXTENSION: &str = "conf";

/// A loaded network
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Network {
    /// Name the network was loaded under (the file stem)
    #[serde(skip)]
    pub id: String,

    #[serde(rename = "Network", default)]
    pub network: NetworkConfig,

    #[serde(rename = "Node", default)]
    pub nodes: NodeTable,

    #[serde(rename = "Blacklist", default)]
    pub blacklist: Blacklist,
}

impl Network {
    /// Path of the configuration file for `name` inside `dir`
    pub fn path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.{}", name, CONFIG_EXTENSION))
    }

    /// Load the network `name` from `dir`
    pub fn load(dir: &Path, name: &str) -> crate::Result<Self> {
        let path = Self::path(dir, name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(crate::Error::NetworkNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let network = Self::from_str(name, &content)?;
        info!(
            "Loaded network '{}' from {:?} ({} nodes, {} blacklisted links)",
            name,
            path,
            network.nodes.len(),
            network.blacklist.len()
        );
        Ok(network)
    }

    /// Parse a network from TOML text
    pub fn from_str(name: &str, content: &str) -> crate::Result<Self> {
        let mut network: Network = toml::from_str(content)?;
        network.id = name.to_string();
        if network.network.name.is_empty() {
            network.network.name = name.to_string();
        }
        network.validate()?;
        Ok(network)
    }

    /// Validate the loaded model
    pub fn validate(&self) -> crate::Result<()> {
        if self.network.name.is_empty() {
            return Err(crate::Error::Config("Network.Name cannot be empty".into()));
        }

        if self.network.vxlan_mtu > MAX_VXLAN_MTU {
            return Err(crate::Error::Config(format!(
                "Network.VxlanMTU {} exceeds {}",
                self.network.vxlan_mtu, MAX_VXLAN_MTU
            )));
        }

        for (name, _) in self.nodes.iter() {
            if name.is_empty() {
                return Err(crate::Error::Config("node names cannot be empty".into()));
            }
        }

        for pair in self.blacklist.iter() {
            let (a, b) = pair.names();
            if a == b {
                return Err(crate::Error::Config(format!(
                    "Blacklist entry pairs node '{}' with itself",
                    a
                )));
            }
            if !self.nodes.contains(a) || !self.nodes.contains(b) {
                debug!("Blacklist entry {} names an unknown node", pair);
            }
        }

        Ok(())
    }
}

impl NetworkModel for Network {
    fn network_id(&self) -> &str {
        &self.id
    }

    fn network_name(&self) -> &str {
        &self.network.name
    }

    fn network(&self) -> &NetworkConfig {
        &self.network
    }

    fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }
}
