//! Node configuration.

use crate::Args;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name.
    pub node_name: String,
    /// Network (mainnet, regtest).
    pub network: String,
    /// Data directory.
    pub data_dir: PathBuf,
    /// RPC configuration.
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Staking configuration.
    #[serde(default)]
    pub staking: StakingConfig,
    /// Probe for the external IP on startup.
    #[serde(default = "default_true")]
    pub discover_external_ip: bool,
}

/// RPC server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Bind address.
    pub bind_address: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8344".to_string(),
        }
    }
}

/// Staking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Run the staking loop.
    pub enabled: bool,
    /// Initial reserve balance in coins.
    #[serde(default)]
    pub reserve_balance: f64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reserve_balance: 0.0,
        }
    }
}

fn default_true() -> bool {
    true
}

impl NodeConfig {
    /// Load configuration from file, overridden by CLI args.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default_for_network(&args.network)
        };

        config.network = args.network.clone();
        if let Some(ref data_dir) = args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(ref rpc_bind) = args.rpc_bind {
            config.rpc.bind_address = rpc_bind.clone();
        }
        if args.no_staking {
            config.staking.enabled = false;
        }
        if args.no_stun {
            config.discover_external_ip = false;
        }

        Ok(config)
    }

    /// Default configuration for a network.
    pub fn default_for_network(network: &str) -> Self {
        let data_dir = match network {
            "regtest" => PathBuf::from(".solidus-regtest"),
            _ => PathBuf::from(".solidus"),
        };
        Self {
            node_name: "solidus-node".to_string(),
            network: network.to_string(),
            data_dir,
            rpc: RpcConfig::default(),
            staking: StakingConfig::default(),
            discover_external_ip: true,
        }
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
