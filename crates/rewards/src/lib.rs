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

//! Epoch reward allocation for LP and staking programs.
//!
//! Balances and chest positions are read at each of an epoch's seven daily snapshot
//! blocks, averaged into per-address amounts, committed to in an OpenZeppelin-compatible
//! Merkle tree and proposed to governance as a `createEpoch` call.

use std::fmt;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

pub mod chain;
pub mod config;
pub mod errors;
pub mod fixed;
pub mod lp;
pub mod merkle;
pub mod notify;
pub mod pipeline;
pub mod publisher;
pub mod retry;
pub mod slots;
pub mod snapshots;
pub mod staking;
pub mod store;
pub mod subgraph;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use chain::{ChainStorageReader, RpcStorageReader, StorageReader};
pub use config::DistributorConfig;
pub use errors::{CodedError, DistributionError};
pub use lp::LpDistributionCalculator;
pub use merkle::{MerkleArtifact, MerkleContentBuilder, StandardMerkleTree};
pub use publisher::{DistributionPublisher, GovernanceClient, PublishTarget};
pub use retry::RetryPolicy;
pub use snapshots::{EpochSelector, EpochSnapshotResolver, EpochSnapshots, RpcSnapshotSource};
pub use staking::{RpcChestPower, StakingDistributionCalculator};
pub use subgraph::SubgraphClient;

/// Daily snapshots per epoch.
pub const DAYS_PER_EPOCH: usize = 7;

/// The two reward programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    Lp,
    Staking,
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lp => f.write_str("LP"),
            Self::Staking => f.write_str("staking"),
        }
    }
}

/// One Merkle leaf: `amount` claimable by `address`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientAllocation {
    pub address: Address,
    pub amount: U256,
}
