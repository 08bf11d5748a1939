// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Distributor configuration, loaded from a TOML file.

use std::path::Path;

use alloy::primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use url::Url;

use crate::{errors::DistributionError, retry::RetryPolicy, slots::uint_key};

pub mod defaults {
    pub const fn balances_slot() -> u64 {
        // OpenZeppelin ERC20 `_balances`
        0
    }

    pub const fn total_supply_slot() -> u64 {
        // OpenZeppelin ERC20 `_totalSupply`
        2
    }

    pub const fn chest_owners_slot() -> u64 {
        // OpenZeppelin ERC721 `_owners`
        2
    }

    pub const fn chest_vesting_slot() -> u64 {
        13
    }

    pub const fn chest_counter_slot() -> u64 {
        14
    }

    pub const fn voting_delay() -> u64 {
        1
    }

    pub const fn voting_period() -> u64 {
        // One week of 12s blocks.
        50_400
    }

    pub fn description() -> String {
        "Create {kind} reward epoch {epoch}".to_string()
    }
}

/// JSON-RPC node settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RpcConfig {
    pub url: Url,
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Subgraph GraphQL endpoint settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SubgraphConfig {
    pub url: Url,
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Contract addresses.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ContractsConfig {
    pub lp_distributor: Address,
    pub staking_distributor: Address,
    pub governor: Address,
    pub chest: Address,
}

/// Base slots of the storage variables read without an ABI.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StorageLayout {
    /// `mapping(address => uint256)` of LP token balances.
    #[serde(default = "defaults::balances_slot")]
    pub balances_slot: u64,
    /// `uint256` LP token total supply.
    #[serde(default = "defaults::total_supply_slot")]
    pub total_supply_slot: u64,
    /// `mapping(uint256 => address)` of chest owners.
    #[serde(default = "defaults::chest_owners_slot")]
    pub chest_owners_slot: u64,
    /// `mapping(uint256 => VestingPosition)` of packed chest metadata.
    #[serde(default = "defaults::chest_vesting_slot")]
    pub chest_vesting_slot: u64,
    /// Next chest token id.
    #[serde(default = "defaults::chest_counter_slot")]
    pub chest_counter_slot: u64,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            balances_slot: defaults::balances_slot(),
            total_supply_slot: defaults::total_supply_slot(),
            chest_owners_slot: defaults::chest_owners_slot(),
            chest_vesting_slot: defaults::chest_vesting_slot(),
            chest_counter_slot: defaults::chest_counter_slot(),
        }
    }
}

pub(crate) fn slot(index: u64) -> B256 {
    uint_key(U256::from(index))
}

/// Re-attribution of a vault-held position to the holders of a nested pool.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NestedPoolConfig {
    /// Subgraph id of the pool whose LP tokens are held by `vault`.
    pub pool_id: String,
    /// Holder whose official-pool share is redistributed to `pool_id` holders.
    pub vault: Address,
}

/// LP reward settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LpConfig {
    /// Share of each token mint allotted to LP rewards, in basis points.
    pub allocation_weight_bps: u32,
    #[serde(default)]
    pub nested: Option<NestedPoolConfig>,
}

/// Governance proposal parameters.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GovernanceConfig {
    #[serde(default = "defaults::voting_delay")]
    pub voting_delay: u64,
    #[serde(default = "defaults::voting_period")]
    pub voting_period: u64,
    /// Proposal description; `{kind}` and `{epoch}` are substituted.
    #[serde(default = "defaults::description")]
    pub description: String,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            voting_delay: defaults::voting_delay(),
            voting_period: defaults::voting_period(),
            description: defaults::description(),
        }
    }
}

/// Content store settings. The JWT may also come from `PINATA_JWT`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ContentStoreConfig {
    pub pinata_jwt: Option<String>,
    pub pinata_api_url: Option<Url>,
    pub mirror_url: Option<Url>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Recipients of run notifications.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Top level config file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DistributorConfig {
    pub rpc: RpcConfig,
    pub subgraph: SubgraphConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub storage_layout: StorageLayout,
    pub lp: LpConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub content_store: ContentStoreConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl DistributorConfig {
    /// Load and validate a config file.
    pub async fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file from {path:?}"))?;
        let config: Self = toml::from_str(&data).context("Failed to parse toml file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DistributionError> {
        if self.lp.allocation_weight_bps > 10_000 {
            return Err(DistributionError::Config(format!(
                "lp.allocation_weight_bps must be at most 10000, got {}",
                self.lp.allocation_weight_bps
            )));
        }
        if let Some(nested) = &self.lp.nested {
            if nested.pool_id.is_empty() {
                return Err(DistributionError::Config("lp.nested.pool_id is empty".into()));
            }
        }
        if self.governance.voting_period == 0 {
            return Err(DistributionError::Config("governance.voting_period must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write, time::Duration};
    use tempfile::NamedTempFile;

    const CONFIG_TEMPL: &str = r#"
[rpc]
url = "http://localhost:8545"
retry = { retries = 5, delay = "500ms" }

[subgraph]
url = "http://localhost:8000/subgraphs/name/pools"

[contracts]
lp_distributor = "0x0000000000000000000000000000000000000001"
staking_distributor = "0x0000000000000000000000000000000000000002"
governor = "0x0000000000000000000000000000000000000003"
chest = "0x0000000000000000000000000000000000000004"

[storage_layout]
chest_counter_slot = 20

[lp]
allocation_weight_bps = 2500

[lp.nested]
pool_id = "0xabc"
vault = "0x00000000000000000000000000000000000000aa"
"#;

    fn write_config(data: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn config_parser() {
        let file = write_config(CONFIG_TEMPL);
        let config = DistributorConfig::load(file.path()).await.unwrap();

        assert_eq!(config.rpc.retry, RetryPolicy { retries: 5, delay: Duration::from_millis(500) });
        assert_eq!(config.subgraph.retry, RetryPolicy::default());
        assert_eq!(config.storage_layout.chest_counter_slot, 20);
        assert_eq!(config.storage_layout.balances_slot, defaults::balances_slot());
        assert_eq!(config.lp.allocation_weight_bps, 2500);
        assert_eq!(config.lp.nested.as_ref().unwrap().pool_id, "0xabc");
        assert_eq!(config.governance.voting_period, defaults::voting_period());
        assert!(config.content_store.mirror_url.is_none());
    }

    #[tokio::test]
    async fn rejects_out_of_range_weight() {
        let file = write_config(&CONFIG_TEMPL.replace("2500", "12000"));
        let err = DistributorConfig::load(file.path()).await.unwrap_err();
        assert!(format!("{err:?}").contains("allocation_weight_bps"));
    }

    #[tokio::test]
    #[should_panic(expected = "Failed to parse toml file")]
    async fn bad_config() {
        let file = write_config("[rpc]\nurl = ?");
        DistributorConfig::load(file.path()).await.unwrap();
    }
}
