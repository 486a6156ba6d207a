//! Network model
//!
//! Read-only view of a mesh network: network-wide VXLAN settings, the
//! ordered node table, and the blacklist of disabled peer links.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use ipnet::Ipv6Net;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Read-only accessor consumed by the config compiler
pub trait NetworkModel {
    /// Name the network was requested under
    fn network_id(&self) -> &str;

    /// Display name of the network
    fn network_name(&self) -> &str;

    /// Network-wide settings
    fn network(&self) -> &NetworkConfig;

    /// All nodes, in declaration order
    fn nodes(&self) -> &NodeTable;

    /// Disabled peer links
    fn blacklist(&self) -> &Blacklist;
}

/// Network-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkConfig {
    /// Display name (empty means "use the network file name")
    #[serde(default)]
    pub name: String,

    /// MTU of the VXLAN device
    #[serde(rename = "VxlanMTU", default = "default_vxlan_mtu")]
    pub vxlan_mtu: u32,

    /// VXLAN network identifier
    #[serde(rename = "VxlanID", default)]
    pub vxlan_id: u32,

    /// VXLAN UDP destination port
    #[serde(default = "default_vxlan_port")]
    pub vxlan_port: u16,

    /// Pool for self-assigned overlay IPv6 addresses
    #[serde(rename = "AddressPoolIPv6", default)]
    pub address_pool_ipv6: Option<Ipv6Net>,
}

impl NetworkConfig {
    /// WireGuard MTU: VXLAN MTU plus encapsulation overhead
    ///
    /// `None` when the VXLAN MTU leaves no room for the overhead.
    pub fn wireguard_mtu(&self) -> Option<u32> {
        if self.vxlan_mtu > MAX_VXLAN_MTU {
            return None;
        }
        Some(self.vxlan_mtu + VXLAN_OVERHEAD)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            vxlan_mtu: default_vxlan_mtu(),
            vxlan_id: 0,
            vxlan_port: default_vxlan_port(),
            address_pool_ipv6: None,
        }
    }
}

/// Bytes reserved for the VXLAN header inside the tunnel
pub const VXLAN_OVERHEAD: u32 = 50;

/// Largest VXLAN MTU whose WireGuard MTU still fits a link MTU
pub const MAX_VXLAN_MTU: u32 = u16::MAX as u32 - VXLAN_OVERHEAD;

fn default_vxlan_mtu() -> u32 {
    1500
}

fn default_vxlan_port() -> u16 {
    4789
}

/// Per-node settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeConfig {
    pub listen_port: u16,

    /// Base64 encoded Curve25519 private key
    pub private_key: Option<String>,

    /// Addresses of the WireGuard interface itself
    pub link_layer_address: Vec<String>,

    /// Overlay addresses assigned to the VXLAN device
    pub address: Vec<String>,

    pub fw_mark: u32,
    pub save_config: bool,

    pub pre_up: Vec<String>,
    pub post_up: Vec<String>,
    pub pre_down: Vec<String>,
    pub post_down: Vec<String>,

    /// Request a UDP port mapping from the router on startup
    #[serde(rename = "UPnP")]
    pub upnp: bool,

    #[serde(rename = "AllowedIPs")]
    pub allowed_ips: Vec<String>,

    pub endpoint: Option<String>,
    pub persistent_keepalive: u32,
}

impl NodeConfig {
    /// Declared private key, ignoring empty values
    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Declared endpoint, ignoring empty values
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|ep| !ep.is_empty())
    }
}

/// Node name to settings, iterated in declaration order
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    entries: Vec<(String, NodeConfig)>,
    index: HashMap<String, usize>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing the settings of an existing one in place
    pub fn insert(&mut self, name: impl Into<String>, node: NodeConfig) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1 = node,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, node));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&NodeConfig> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All nodes in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeConfig)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Every node except `name`, in declaration order
    pub fn peers_of<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a NodeConfig)> {
        self.iter().filter(move |(peer, _)| *peer != name)
    }
}

impl<N: Into<String>> FromIterator<(N, NodeConfig)> for NodeTable {
    fn from_iter<I: IntoIterator<Item = (N, NodeConfig)>>(iter: I) -> Self {
        let mut table = NodeTable::new();
        for (name, node) in iter {
            table.insert(name, node);
        }
        table
    }
}

impl<'de> Deserialize<'de> for NodeTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeTableVisitor;

        impl<'de> Visitor<'de> for NodeTableVisitor {
            type Value = NodeTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of node names to node settings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<NodeTable, A::Error> {
                let mut table = NodeTable::new();
                while let Some((name, node)) = map.next_entry::<String, NodeConfig>()? {
                    table.insert(name, node);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(NodeTableVisitor)
    }
}

/// Unordered pair of node names
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamePair(String, String);

impl NamePair {
    /// Build a pair; `new(a, b) == new(b, a)`
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn names(&self) -> (&str, &str) {
        (&self.0, &self.1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0 == name || self.1 == name
    }
}

impl fmt::Display for NamePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.0, self.1)
    }
}

/// Set of peer links that are generated but commented out
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<Vec<String>>")]
pub struct Blacklist {
    pairs: BTreeSet<NamePair>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the pair was already present
    pub fn insert(&mut self, a: &str, b: &str) -> bool {
        self.pairs.insert(NamePair::new(a, b))
    }

    pub fn contains(&self, a: &str, b: &str) -> bool {
        self.pairs.contains(&NamePair::new(a, b))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamePair> {
        self.pairs.iter()
    }
}

impl TryFrom<Vec<Vec<String>>> for Blacklist {
    type Error = String;

    fn try_from(entries: Vec<Vec<String>>) -> Result<Self, Self::Error> {
        let mut pairs = BTreeSet::new();
        for entry in entries {
            match <[String; 2]>::try_from(entry) {
                Ok([a, b]) => {
                    pairs.insert(NamePair::new(a, b));
                }
                Err(entry) => {
                    return Err(format!(
                        "blacklist entry must name exactly two nodes, got {:?}",
                        entry
                    ));
                }
            }
        }
        Ok(Self { pairs })
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Blacklist {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut blacklist = Blacklist::new();
        for (a, b) in iter {
            blacklist.insert(a, b);
        }
        blacklist
    }
}
