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

//! Staking reward shares from chest voting power.

use std::collections::BTreeMap;

use alloy::{
    eips::BlockId,
    primitives::{Address, U256},
    providers::Provider,
    transports::RpcError,
};
use async_trait::async_trait;
use auto_impl::auto_impl;
use epoch_rewards_contracts::IChest;

use crate::{
    chain::{ChainStorageReader, StorageReader},
    errors::DistributionError,
    fixed::{ratio, WAD},
    retry::RetryPolicy,
    slots::VestingPosition,
    snapshots::EpochSnapshots,
    RecipientAllocation, DAYS_PER_EPOCH,
};

/// Voting power lookup for a single chest.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait ChestPowerSource: Send + Sync {
    /// Power of `token_id` at `block`, or `None` if the chest does not exist there.
    ///
    /// Transport failures are errors, never `None`.
    async fn chest_power(
        &self,
        chest: Address,
        token_id: U256,
        block: u64,
    ) -> Result<Option<U256>, DistributionError>;
}

/// [`ChestPowerSource`] calling `getChestPower` through an alloy [`Provider`].
#[derive(Clone, Debug)]
pub struct RpcChestPower<P> {
    provider: P,
}

impl<P> RpcChestPower<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider> ChestPowerSource for RpcChestPower<P> {
    async fn chest_power(
        &self,
        chest: Address,
        token_id: U256,
        block: u64,
    ) -> Result<Option<U256>, DistributionError> {
        let result = IChest::new(chest, &self.provider)
            .getChestPower(token_id)
            .block(BlockId::number(block))
            .call()
            .await;
        match result {
            Ok(power) => Ok(Some(power)),
            Err(alloy::contract::Error::TransportError(RpcError::ErrorResp(payload)))
                if payload.as_revert_data().is_some() || payload.message.contains("revert") =>
            {
                tracing::trace!("getChestPower({token_id}) reverted at block {block}: {payload}");
                Ok(None)
            }
            Err(e) => Err(DistributionError::rpc("getChestPower", e)),
        }
    }
}

/// A chest as seen at one snapshot block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChestPosition {
    pub token_id: U256,
    pub owner: Address,
    pub voting_power: U256,
    pub vesting: VestingPosition,
}

/// Computes per-owner staking shares from chest voting power.
#[derive(Clone, Debug)]
pub struct StakingDistributionCalculator<R, C> {
    chain: ChainStorageReader<R>,
    power: C,
    chest: Address,
    retry: RetryPolicy,
}

impl<R: StorageReader, C: ChestPowerSource> StakingDistributionCalculator<R, C> {
    pub fn new(chain: ChainStorageReader<R>, power: C, chest: Address, retry: RetryPolicy) -> Self {
        Self { chain, power, chest, retry }
    }

    /// Reads chest `token_id` at `block`. `None` means no live position at that index: the
    /// chest is unowned (burned or never minted), or its power lookup reverted.
    pub async fn try_chest(
        &self,
        token_id: U256,
        block: u64,
    ) -> Result<Option<ChestPosition>, DistributionError> {
        let owner = self.chain.chest_owner_at(self.chest, token_id, block).await?;
        if owner.is_zero() {
            return Ok(None);
        }

        let power = self
            .retry
            .run("getChestPower", || self.power.chest_power(self.chest, token_id, block))
            .await?;
        let Some(voting_power) = power else {
            return Ok(None);
        };

        let vesting = self.chain.vesting_position_at(self.chest, token_id, block).await?;
        Ok(Some(ChestPosition { token_id, owner, voting_power, vesting }))
    }

    /// Live chests among `0..counter` at `block`. The counter bounds the scan; burned chests
    /// inside it are skipped.
    pub async fn enumerate_chests(&self, block: u64) -> Result<Vec<ChestPosition>, DistributionError> {
        let counter = self.chain.chest_counter_at(self.chest, block).await?;
        let Some(last) = counter.checked_sub(U256::from(1)) else {
            return Ok(Vec::new());
        };

        let mut positions = Vec::new();
        let mut token_id = U256::ZERO;
        while token_id <= last {
            match self.try_chest(token_id, block).await? {
                Some(position) => positions.push(position),
                None => tracing::debug!("Chest {token_id} has no live position at block {block}"),
            }
            token_id += U256::from(1);
        }
        Ok(positions)
    }

    /// Each owner's share of total voting power at `block`, scaled by 1e18.
    pub async fn block_shares(&self, block: u64) -> Result<BTreeMap<Address, U256>, DistributionError> {
        let positions = self.enumerate_chests(block).await?;

        let mut power_by_owner: BTreeMap<Address, U256> = BTreeMap::new();
        let mut total = U256::ZERO;
        for position in &positions {
            *power_by_owner.entry(position.owner).or_default() += position.voting_power;
            total += position.voting_power;
        }
        if total.is_zero() {
            tracing::warn!("No voting power at block {block}");
            return Ok(BTreeMap::new());
        }

        power_by_owner
            .into_iter()
            .map(|(owner, power)| {
                Ok::<_, DistributionError>((owner, ratio(power, total, WAD, "chest power share")?))
            })
            .collect()
    }

    /// Shares summed per block and averaged over the epoch's seven days.
    ///
    /// Amounts are 1e18-scaled fractions of the epoch, not token amounts.
    pub async fn compute(
        &self,
        snapshots: &EpochSnapshots,
    ) -> Result<Vec<RecipientAllocation>, DistributionError> {
        let mut buckets: BTreeMap<u64, BTreeMap<Address, U256>> = BTreeMap::new();
        for &block in &snapshots.blocks {
            let shares = self.block_shares(block).await?;
            let bucket = buckets.entry(block).or_default();
            for (owner, share) in shares {
                *bucket.entry(owner).or_default() += share;
            }
        }

        let mut totals: BTreeMap<Address, U256> = BTreeMap::new();
        for bucket in buckets.values() {
            for (owner, share) in bucket {
                *totals.entry(*owner).or_default() += *share;
            }
        }

        let days = U256::from(DAYS_PER_EPOCH);
        Ok(totals
            .into_iter()
            .map(|(address, sum)| RecipientAllocation { address, amount: sum / days })
            .filter(|r| !r.amount.is_zero())
            .collect())
    }
}
