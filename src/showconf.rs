//! WireGuard configuration compiler
//!
//! Turns the network model into the `wg-quick` configuration of one node:
//! the `[Interface]` section, the scripts that create the VXLAN device on
//! top of the WireGuard interface, and one `[Peer]` section per other node.
//!
//! Blacklisted links are never dropped. Their peer sections and forwarding
//! entries are emitted commented out so an operator can re-enable them by
//! hand.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;
use tracing::{debug, warn};

use crate::keys::{self, KeyError};
use crate::model::{NetworkModel, NodeConfig};

/// Name stamped into the header and trailer comments
pub const GENERATOR: &str = "VxWireguard-Generator";

/// Problems that leave the output usable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("Node '{peer}' has incorrect PrivateKey: {reason}")]
    BadPeerKey { peer: String, reason: KeyError },
}

/// Output of a successful compile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compiled {
    pub lines: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl Compiled {
    /// Newline terminated configuration text
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// Line sink that optionally comments everything it receives
struct Emitter {
    lines: Vec<String>,
}

impl Emitter {
    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn maybe_commented(&mut self, commented: bool, line: impl AsRef<str>) {
        let prefix = if commented { "#" } else { "" };
        self.lines.push(format!("{}{}", prefix, line.as_ref()));
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }
}

/// Compile the configuration of `node_name`
///
/// Fails when the node does not exist or the network MTU is out of range;
/// bad peer keys are reported as warnings next to a complete output.
pub fn compile<M: NetworkModel + ?Sized>(model: &M, node_name: &str) -> crate::Result<Compiled> {
    let network_name = model.network_name();
    let network = model.network();
    let nodes = model.nodes();
    let blacklist = model.blacklist();

    let node = nodes.get(node_name).ok_or_else(|| crate::Error::NodeNotFound {
        network: model.network_id().to_string(),
        node: node_name.to_string(),
    })?;
    let mtu = network.wireguard_mtu().ok_or_else(|| {
        crate::Error::Config(format!("VxlanMTU {} is out of range", network.vxlan_mtu))
    })?;

    let mut out = Emitter { lines: Vec::new() };
    let mut warnings = Vec::new();

    out.line(format!("# Network {}, generated by {}", network_name, GENERATOR));
    out.blank();

    // Interface
    out.line(format!("# Node {}", node_name));
    out.line("[Interface]");
    out.line(format!("ListenPort = {}", node.listen_port));
    if let Some(private_key) = node.private_key() {
        out.line(format!("PrivateKey = {}", private_key));
    }
    if !node.link_layer_address.is_empty() {
        out.line(format!("Address = {}", node.link_layer_address.join(", ")));
    }
    out.line(format!("MTU = {}", mtu));
    out.line("Table = off");
    if node.fw_mark != 0 {
        out.line(format!("FwMark = {:x}", node.fw_mark));
    }
    if node.save_config {
        out.line("SaveConfig = true");
    }

    // Bring-up scripts
    for script in &node.pre_up {
        out.line(format!("PreUp = {}", script));
    }

    let mac_address = keys::link_layer_address(node);
    if node.private_key().is_some() && mac_address.is_none() {
        debug!("Node '{}' has an unusable PrivateKey, no MAC address derived", node_name);
    }
    let mac_address_cmdline = mac_address
        .map(|mac| format!("address {} ", mac))
        .unwrap_or_default();
    out.line(format!(
        "PreUp = ip link add v%i {}mtu {} type vxlan id {} dstport {} ttl 1 noudpcsum || true",
        mac_address_cmdline, network.vxlan_mtu, network.vxlan_id, network.vxlan_port
    ));
    out.line("PreUp = ethtool -K v%i tx off rx off");
    out.line(
        "PreUp = sysctl -w net.ipv4.conf.v%i.accept_redirects=0 \
         net.ipv4.conf.v%i.send_redirects=0 net.ipv6.conf.v%i.accept_redirects=0",
    );

    for address in &node.address {
        out.line(format!("PreUp = ip address add {} dev v%i || true", address));
    }
    if let Some(ipv6) = keys::overlay_ipv6(network, node) {
        out.line(format!("PreUp = ip address add {} dev v%i || true", ipv6));
    }
    if node.upnp && node.listen_port != 0 {
        out.line(format!("PreUp = upnpc -r {} udp &", node.listen_port));
    }

    for (peer_name, peer) in nodes.peers_of(node_name) {
        let disabled = blacklist.contains(node_name, peer_name);
        for address in &peer.link_layer_address {
            out.maybe_commented(
                disabled,
                format!(
                    "PostUp = bridge fdb append 00:00:00:00:00:00 dev v%i dst {} via %i",
                    strip_prefix_len(address)
                ),
            );
        }
    }
    out.line("PostUp = ip link set v%i up");
    for script in &node.post_up {
        out.line(format!("PostUp = {}", script));
    }

    // Tear-down scripts
    for script in &node.pre_down {
        out.line(format!("PreDown = {}", script));
    }
    out.line("PreDown = ip link set v%i down");
    out.line("PostDown = ip link delete v%i");
    for script in &node.post_down {
        out.line(format!("PostDown = {}", script));
    }

    out.blank();

    // Peers
    for (peer_name, peer) in nodes.peers_of(node_name) {
        let disabled = blacklist.contains(node_name, peer_name);
        if disabled {
            debug!("Link {} <-> {} is blacklisted, commenting out", node_name, peer_name);
        }
        if let Err(warning) = emit_peer(&mut out, disabled, peer_name, peer) {
            warn!("{}", warning);
            warnings.push(warning);
        }
        out.blank();
    }

    out.line(format!(
        "# Network {}, node {}, generated by {}",
        network_name, node_name, GENERATOR
    ));

    Ok(Compiled { lines: out.lines, warnings })
}

/// Emit one peer section; a bad key only skips the `PublicKey` line
fn emit_peer(
    out: &mut Emitter,
    disabled: bool,
    peer_name: &str,
    peer: &NodeConfig,
) -> Result<(), Warning> {
    let mut result = Ok(());

    out.maybe_commented(disabled, format!("# Peer node {}", peer_name));
    out.maybe_commented(disabled, "[Peer]");

    if let Some(private_key) = peer.private_key() {
        match keys::decode_private_key(private_key) {
            Ok(secret) => {
                let public_key = BASE64.encode(keys::derive_public_key(&secret));
                out.maybe_commented(disabled, format!("PublicKey = {}", public_key));
            }
            Err(reason) => {
                result = Err(Warning::BadPeerKey {
                    peer: peer_name.to_string(),
                    reason,
                });
            }
        }
    }
    if !peer.allowed_ips.is_empty() {
        out.maybe_commented(disabled, format!("AllowedIPs = {}", peer.allowed_ips.join(", ")));
    }
    if let Some(endpoint) = peer.endpoint() {
        out.maybe_commented(disabled, format!("Endpoint = {}", endpoint));
    }
    if peer.persistent_keepalive != 0 {
        out.maybe_commented(
            disabled,
            format!("PersistentKeepalive = {}", peer.persistent_keepalive),
        );
    }

    result
}

/// `10.0.0.1/24` -> `10.0.0.1`
fn strip_prefix_len(address: &str) -> &str {
    address.split_once('/').map_or(address, |(addr, _)| addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;

    #[test]
    fn test_strip_prefix_len() {
        assert_eq!(strip_prefix_len("10.0.0.1/24"), "10.0.0.1");
        assert_eq!(strip_prefix_len("fd00::1/64"), "fd00::1");
        assert_eq!(strip_prefix_len("10.0.0.1"), "10.0.0.1");
    }

    #[test]
    fn test_render_terminates_with_newline() {
        let compiled = Compiled {
            lines: vec!["a".into(), String::new(), "b".into()],
            warnings: Vec::new(),
        };
        assert_eq!(compiled.render(), "a\n\nb\n");
    }

    #[test]
    fn test_interface_section_minimal() {
        let network = Network::from_str("mesh", "[Node.solo]\n").unwrap();
        let compiled = compile(&network, "solo").unwrap();

        assert_eq!(
            compiled.lines,
            [
                "# Network mesh, generated by VxWireguard-Generator",
                "",
                "# Node solo",
                "[Interface]",
                "ListenPort = 0",
                "MTU = 1550",
                "Table = off",
                "PreUp = ip link add v%i mtu 1500 type vxlan id 0 dstport 4789 ttl 1 noudpcsum || true",
                "PreUp = ethtool -K v%i tx off rx off",
                "PreUp = sysctl -w net.ipv4.conf.v%i.accept_redirects=0 net.ipv4.conf.v%i.send_redirects=0 net.ipv6.conf.v%i.accept_redirects=0",
                "PostUp = ip link set v%i up",
                "PreDown = ip link set v%i down",
                "PostDown = ip link delete v%i",
                "",
                "# Network mesh, node solo, generated by VxWireguard-Generator",
            ]
        );
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn test_fwmark_is_hex_and_upnp_needs_port() {
        let toml = r#"
[Node.a]
FwMark = 51820
UPnP = true
SaveConfig = true

[Node.b]
UPnP = true
"#;
        let network = Network::from_str("mesh", toml).unwrap();

        let a = compile(&network, "a").unwrap().lines;
        assert!(a.contains(&"FwMark = ca6c".to_string()));
        assert!(a.contains(&"SaveConfig = true".to_string()));
        assert!(!a.iter().any(|l| l.starts_with("PreUp = upnpc")));

        let b = compile(&network, "b").unwrap().lines;
        assert!(!b.iter().any(|l| l.starts_with("FwMark")));
        assert!(!b.iter().any(|l| l.starts_with("SaveConfig")));
    }

    #[test]
    fn test_oversized_mtu_is_an_error() {
        let mut network = Network::from_str("mesh", "[Node.a]\n").unwrap();
        network.network.vxlan_mtu = u32::MAX;

        let err = compile(&network, "a").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_unknown_node_names_requested_network() {
        let toml = "[Network]\nName = \"Office\"\n[Node.a]\n";
        let network = Network::from_str("mesh", toml).unwrap();
        let err = compile(&network, "z").unwrap_err();
        assert_eq!(err.to_string(), "Network 'mesh' does not have node 'z'");
    }

    #[test]
    fn test_unknown_node() {
        let network = Network::from_str("mesh", "[Node.a]\n").unwrap();
        let err = compile(&network, "z").unwrap_err();
        assert!(matches!(err, crate::Error::NodeNotFound { ref node, .. } if node == "z"));
    }
}
