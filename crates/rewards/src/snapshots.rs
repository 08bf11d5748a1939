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

//! Resolution of an epoch into its seven daily snapshot blocks.

use std::{fmt, str::FromStr};

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
};
use async_trait::async_trait;
use auto_impl::auto_impl;
use epoch_rewards_contracts::IDistributor;
use serde::{Deserialize, Serialize};

use crate::{errors::DistributionError, retry::RetryPolicy, DistributionKind, DAYS_PER_EPOCH};

/// Read access to a distributor's epoch bookkeeping.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait SnapshotSource: Send + Sync {
    /// The distributor's current epoch counter.
    async fn current_epoch(&self, distributor: Address) -> Result<U256, DistributionError>;

    /// Block recorded for `day` of `epoch`. Zero when nothing was recorded.
    async fn daily_snapshot(
        &self,
        distributor: Address,
        epoch: U256,
        day: u8,
    ) -> Result<U256, DistributionError>;
}

/// [`SnapshotSource`] calling the distributor contract through an alloy [`Provider`].
#[derive(Clone, Debug)]
pub struct RpcSnapshotSource<P> {
    provider: P,
}

impl<P> RpcSnapshotSource<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider> SnapshotSource for RpcSnapshotSource<P> {
    async fn current_epoch(&self, distributor: Address) -> Result<U256, DistributionError> {
        IDistributor::new(distributor, &self.provider)
            .epoch()
            .call()
            .await
            .map_err(|e| DistributionError::rpc("epoch", e))
    }

    async fn daily_snapshot(
        &self,
        distributor: Address,
        epoch: U256,
        day: u8,
    ) -> Result<U256, DistributionError> {
        IDistributor::new(distributor, &self.provider)
            .dailySnapshotsPerEpoch(epoch, U256::from(day))
            .call()
            .await
            .map_err(|e| DistributionError::rpc("dailySnapshotsPerEpoch", e))
    }
}

/// The seven snapshot blocks of an epoch, in day order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSnapshots {
    pub epoch: U256,
    pub blocks: [u64; DAYS_PER_EPOCH],
}

impl EpochSnapshots {
    pub fn first_block(&self) -> u64 {
        self.blocks[0]
    }

    pub fn last_block(&self) -> u64 {
        self.blocks[DAYS_PER_EPOCH - 1]
    }
}

/// Which epoch a run targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpochSelector {
    /// The distributor's current epoch counter.
    Current,
    Number(U256),
}

impl FromStr for EpochSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("current") {
            return Ok(Self::Current);
        }
        U256::from_str_radix(s, 10)
            .map(Self::Number)
            .map_err(|_| format!("expected `current` or an epoch number, got `{s}`"))
    }
}

impl fmt::Display for EpochSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Maps epochs to snapshot blocks for both distributors.
#[derive(Clone, Debug)]
pub struct EpochSnapshotResolver<S> {
    source: S,
    lp_distributor: Address,
    staking_distributor: Address,
    retry: RetryPolicy,
}

impl<S: SnapshotSource> EpochSnapshotResolver<S> {
    pub fn new(
        source: S,
        lp_distributor: Address,
        staking_distributor: Address,
        retry: RetryPolicy,
    ) -> Self {
        Self { source, lp_distributor, staking_distributor, retry }
    }

    pub fn distributor(&self, kind: DistributionKind) -> Address {
        match kind {
            DistributionKind::Lp => self.lp_distributor,
            DistributionKind::Staking => self.staking_distributor,
        }
    }

    pub async fn current_lp_epoch(&self) -> Result<U256, DistributionError> {
        self.current_epoch(DistributionKind::Lp).await
    }

    pub async fn current_staking_epoch(&self) -> Result<U256, DistributionError> {
        self.current_epoch(DistributionKind::Staking).await
    }

    pub async fn current_epoch(&self, kind: DistributionKind) -> Result<U256, DistributionError> {
        let distributor = self.distributor(kind);
        self.retry.run("epoch", || self.source.current_epoch(distributor)).await
    }

    pub async fn resolve(
        &self,
        kind: DistributionKind,
        selector: EpochSelector,
    ) -> Result<U256, DistributionError> {
        match selector {
            EpochSelector::Current => self.current_epoch(kind).await,
            EpochSelector::Number(n) => Ok(n),
        }
    }

    /// Reads days `0..7` of `epoch` from the distributor for `kind`.
    ///
    /// Blocks are returned as recorded; repeats are allowed and not reordered.
    pub async fn get_epoch_snapshots(
        &self,
        kind: DistributionKind,
        epoch: U256,
    ) -> Result<EpochSnapshots, DistributionError> {
        let distributor = self.distributor(kind);
        let mut blocks = [0u64; DAYS_PER_EPOCH];
        for (day, slot) in blocks.iter_mut().enumerate() {
            let day = day as u8;
            let block = self
                .retry
                .run("dailySnapshotsPerEpoch", || {
                    self.source.daily_snapshot(distributor, epoch, day)
                })
                .await?;
            if block.is_zero() {
                return Err(DistributionError::SnapshotMissing { epoch, day });
            }
            *slot = u64::try_from(block).map_err(|_| DistributionError::Overflow("snapshot block"))?;
        }
        tracing::debug!("{kind} epoch {epoch} snapshots: {blocks:?}");
        Ok(EpochSnapshots { epoch, blocks })
    }
}
