//! Network selection shared by every route and service.
//!
//! The UI exposes the same three environments through its network switcher;
//! requests carry one of these and the server maps it onto an RPC endpoint
//! and an explorer link format.

use anchor_client::Cluster;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::CONFIG;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Localnet,
    Devnet,
    Mainnet,
}

impl Network {
    /// RPC endpoint for this network, from configuration.
    pub fn rpc_url(&self) -> String {
        match self {
            Network::Localnet => CONFIG.rpc.localnet_url.clone(),
            Network::Devnet => CONFIG.rpc.devnet_url.clone(),
            Network::Mainnet => CONFIG.rpc.mainnet_url.clone(),
        }
    }

    pub fn cluster(&self) -> Cluster {
        match self {
            Network::Localnet => Cluster::Localnet,
            Network::Devnet => Cluster::Devnet,
            Network::Mainnet => Cluster::Mainnet,
        }
    }

    /// Explorer link for a confirmed transaction. Localnet uses the custom-URL
    /// form so the hosted explorer can point at the local validator.
    pub fn explorer_tx_url(&self, signature: &str) -> String {
        match self {
            Network::Localnet => format!(
                "https://explorer.solana.com/tx/{signature}?cluster=custom&customUrl=http%3A%2F%2Flocalhost%3A8899"
            ),
            Network::Devnet => {
                format!("https://explorer.solana.com/tx/{signature}?cluster=devnet")
            }
            Network::Mainnet => format!("https://explorer.solana.com/tx/{signature}"),
        }
    }

    /// Test-token minting is only allowed off mainnet.
    pub fn allows_minting(&self) -> bool {
        !matches!(self, Network::Mainnet)
    }

    /// Pull a network override out of free text ("on devnet", "local", ...).
    pub fn from_hint(text: &str) -> Option<Network> {
        let lower = text.to_lowercase();
        if lower.contains("devnet") {
            Some(Network::Devnet)
        } else if lower.contains("mainnet") {
            Some(Network::Mainnet)
        } else if lower.contains("localnet") || lower.contains("local") {
            Some(Network::Localnet)
        } else {
            None
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Localnet => write!(f, "localnet"),
            Network::Devnet => write!(f, "devnet"),
            Network::Mainnet => write!(f, "mainnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "localnet" | "local" => Ok(Network::Localnet),
            "devnet" => Ok(Network::Devnet),
            "mainnet" | "mainnet-beta" => Ok(Network::Mainnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("local".parse::<Network>().unwrap(), Network::Localnet);
        assert_eq!("mainnet-beta".parse::<Network>().unwrap(), Network::Mainnet);
        assert!("testnet".parse::<Network>().is_err());
    }

    #[test]
    fn hints_from_free_text() {
        assert_eq!(Network::from_hint("send 1 sol on devnet"), Some(Network::Devnet));
        assert_eq!(Network::from_hint("use my local validator"), Some(Network::Localnet));
        assert_eq!(Network::from_hint("send 1 sol"), None);
    }

    #[test]
    fn explorer_urls_carry_cluster() {
        assert!(Network::Localnet.explorer_tx_url("sig").contains("customUrl"));
        assert!(Network::Devnet.explorer_tx_url("sig").ends_with("cluster=devnet"));
        assert!(!Network::Mainnet.explorer_tx_url("sig").contains('?'));
    }
}
