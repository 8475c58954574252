use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;

use drp_quorum::QuorumConfig;

/// Command-line / environment surface of the node.
///
/// The environment variable set here is authoritative; no other variables
/// are consulted by the core.
#[derive(Parser, Debug)]
#[command(
    name = "drp-node",
    version,
    about = "DRP core node — elder quorum, policy engine, decision ledger"
)]
pub struct Args {
    /// Committee size n.
    #[arg(long, env = "ELDER_COUNT", default_value_t = 1)]
    pub elder_count: u32,

    /// Quorum threshold m. Defaults to min(1, n).
    #[arg(long, env = "QUORUM_M")]
    pub quorum_m: Option<u32>,

    /// Directory for elder and operator key material.
    #[arg(long, env = "KEYSTORE_DIR", default_value = ".keystore")]
    pub keystore_dir: PathBuf,

    /// Development-mode deterministic seed. Unsafe for production.
    #[arg(long, env = "DEV_SEED")]
    pub dev_seed: Option<String>,

    /// Wide-column store contact host.
    #[arg(long, env = "STORE_HOST", default_value = "127.0.0.1")]
    pub store_host: String,

    /// Wide-column store contact port.
    #[arg(long, env = "STORE_PORT", default_value_t = 9042)]
    pub store_port: u16,

    /// Directory for the embedded ledger database.
    #[arg(long, default_value = "~/.drp/data")]
    pub data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8545")]
    pub rpc_addr: SocketAddr,
}

/// External store contact points.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
}

/// Typed boot configuration assembled from `Args`.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub quorum: QuorumConfig,
    pub keystore_dir: PathBuf,
    pub dev_seed: Option<String>,
    pub store: StoreConfig,
    pub data_dir: PathBuf,
    pub rpc_addr: SocketAddr,
}

impl NodeConfig {
    pub fn from_args(args: Args) -> Self {
        let n = args.elder_count;
        let m = args.quorum_m.unwrap_or_else(|| 1.min(n));
        Self {
            quorum: QuorumConfig { n, m },
            keystore_dir: expand_tilde(&args.keystore_dir),
            dev_seed: args.dev_seed,
            store: StoreConfig {
                host: args.store_host,
                port: args.store_port,
            },
            data_dir: expand_tilde(&args.data_dir),
            rpc_addr: args.rpc_addr,
        }
    }
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_m_defaults_to_one() {
        let args = Args::parse_from(["drp-node", "--elder-count", "5"]);
        let config = NodeConfig::from_args(args);
        assert_eq!(config.quorum.m, 1);
        assert_eq!(config.quorum.n, 5);
    }

    #[test]
    fn explicit_quorum_m_wins() {
        let args = Args::parse_from(["drp-node", "--elder-count", "5", "--quorum-m", "3"]);
        let config = NodeConfig::from_args(args);
        assert_eq!(config.quorum.m, 3);
    }

    #[test]
    fn zero_committee_fails_validation() {
        let args = Args::parse_from(["drp-node", "--elder-count", "0"]);
        let config = NodeConfig::from_args(args);
        assert!(config.quorum.validate().is_err());
    }

    #[test]
    fn store_defaults_to_local_wide_column_port() {
        let args = Args::parse_from(["drp-node"]);
        let config = NodeConfig::from_args(args);
        assert_eq!(config.store.host, "127.0.0.1");
        assert_eq!(config.store.port, 9042);
    }
}
