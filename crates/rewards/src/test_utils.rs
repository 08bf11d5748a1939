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

//! In-memory collaborators for tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Mutex,
    },
};

use alloy::primitives::{Address, B256, U256};
use anyhow::anyhow;
use async_trait::async_trait;

use crate::{
    chain::StorageReader,
    config::{slot, StorageLayout},
    errors::DistributionError,
    publisher::{Governance, Proposal, ProposalReceipt},
    slots::{address_key, mapping_slot, uint_key, VestingPosition},
    snapshots::SnapshotSource,
    staking::ChestPowerSource,
    store::{ContentStore, StorageError},
    subgraph::{OfficialPool, PoolShares, ShareSource, TokenMint},
    DAYS_PER_EPOCH,
};

fn take_failure(counter: &AtomicU32) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

/// Contract storage keyed by `(contract, slot, block)`; unset words read as zero.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    words: Mutex<HashMap<(Address, B256, u64), B256>>,
    timestamps: Mutex<HashMap<u64, u64>>,
    failures: AtomicU32,
}

impl MemoryStorage {
    pub fn set_word(&self, contract: Address, slot: B256, block: u64, word: B256) {
        self.words.lock().unwrap().insert((contract, slot, block), word);
    }

    pub fn set_balance(
        &self,
        pool: Address,
        layout: &StorageLayout,
        holder: Address,
        block: u64,
        balance: U256,
    ) {
        let slot = mapping_slot(address_key(holder), slot(layout.balances_slot));
        self.set_word(pool, slot, block, uint_key(balance));
    }

    pub fn set_total_supply(&self, pool: Address, layout: &StorageLayout, block: u64, supply: U256) {
        self.set_word(pool, slot(layout.total_supply_slot), block, uint_key(supply));
    }

    pub fn set_chest_counter(&self, chest: Address, layout: &StorageLayout, block: u64, counter: U256) {
        self.set_word(chest, slot(layout.chest_counter_slot), block, uint_key(counter));
    }

    pub fn set_chest_owner(
        &self,
        chest: Address,
        layout: &StorageLayout,
        token_id: U256,
        block: u64,
        owner: Address,
    ) {
        let slot = mapping_slot(uint_key(token_id), slot(layout.chest_owners_slot));
        self.set_word(chest, slot, block, address_key(owner));
    }

    pub fn set_vesting(
        &self,
        chest: Address,
        layout: &StorageLayout,
        token_id: U256,
        block: u64,
        vesting: VestingPosition,
    ) {
        let slot = mapping_slot(uint_key(token_id), slot(layout.chest_vesting_slot));
        self.set_word(chest, slot, block, vesting.encode());
    }

    pub fn set_block_timestamp(&self, block: u64, timestamp: u64) {
        self.timestamps.lock().unwrap().insert(block, timestamp);
    }

    /// The next `n` reads fail with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageReader for MemoryStorage {
    async fn storage_at(
        &self,
        contract: Address,
        slot: B256,
        block: u64,
    ) -> Result<B256, DistributionError> {
        if take_failure(&self.failures) {
            return Err(DistributionError::rpc("eth_getStorageAt", anyhow!("connection reset")));
        }
        Ok(self.words.lock().unwrap().get(&(contract, slot, block)).copied().unwrap_or_default())
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, DistributionError> {
        self.timestamps
            .lock()
            .unwrap()
            .get(&block)
            .copied()
            .ok_or(DistributionError::BlockNotFound(block))
    }
}

/// Subgraph data keyed by block.
#[derive(Debug, Default)]
pub struct MemoryShares {
    official: Mutex<HashMap<u64, Vec<OfficialPool>>>,
    shares: Mutex<HashMap<(u64, String), PoolShares>>,
    mints: Mutex<Vec<TokenMint>>,
}

impl MemoryShares {
    pub fn set_official_pools(&self, block: u64, pools: Vec<OfficialPool>) {
        self.official.lock().unwrap().insert(block, pools);
    }

    pub fn set_pool_shares(&self, block: u64, shares: PoolShares) {
        self.shares.lock().unwrap().insert((block, shares.pool_id.clone()), shares);
    }

    pub fn add_token_mint(&self, mint: TokenMint) {
        let mut mints = self.mints.lock().unwrap();
        mints.push(mint);
        mints.sort_by_key(|m| m.timestamp);
    }
}

#[async_trait]
impl ShareSource for MemoryShares {
    async fn official_pools(&self, block: u64) -> Result<Vec<OfficialPool>, DistributionError> {
        Ok(self.official.lock().unwrap().get(&block).cloned().unwrap_or_default())
    }

    async fn pool_shares(&self, pool_id: &str, block: u64) -> Result<PoolShares, DistributionError> {
        self.shares
            .lock()
            .unwrap()
            .get(&(block, pool_id.to_string()))
            .cloned()
            .ok_or_else(|| DistributionError::PoolNotFound { pool_id: pool_id.to_string(), block })
    }

    async fn token_mints(&self, from: u64, to: u64) -> Result<Vec<TokenMint>, DistributionError> {
        Ok(self
            .mints
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.timestamp >= from && m.timestamp < to)
            .cloned()
            .collect())
    }
}

/// Distributor epoch bookkeeping.
#[derive(Debug, Default)]
pub struct MemorySnapshots {
    current: Mutex<HashMap<Address, U256>>,
    days: Mutex<HashMap<(Address, U256, u8), U256>>,
}

impl MemorySnapshots {
    /// Records the seven snapshots of `epoch` and makes it the distributor's current epoch.
    pub fn set_epoch(&self, distributor: Address, epoch: u64, blocks: [u64; DAYS_PER_EPOCH]) {
        let epoch = U256::from(epoch);
        self.current.lock().unwrap().insert(distributor, epoch);
        let mut days = self.days.lock().unwrap();
        for (day, block) in blocks.into_iter().enumerate() {
            days.insert((distributor, epoch, day as u8), U256::from(block));
        }
    }
}

#[async_trait]
impl SnapshotSource for MemorySnapshots {
    async fn current_epoch(&self, distributor: Address) -> Result<U256, DistributionError> {
        Ok(self.current.lock().unwrap().get(&distributor).copied().unwrap_or_default())
    }

    async fn daily_snapshot(
        &self,
        distributor: Address,
        epoch: U256,
        day: u8,
    ) -> Result<U256, DistributionError> {
        Ok(self.days.lock().unwrap().get(&(distributor, epoch, day)).copied().unwrap_or_default())
    }
}

/// Chest power keyed by `(token_id, block)`; unknown chests behave like a revert.
#[derive(Debug, Default)]
pub struct MemoryChestPower {
    power: Mutex<HashMap<(U256, u64), U256>>,
    failures: AtomicU32,
}

impl MemoryChestPower {
    pub fn set_power(&self, token_id: U256, block: u64, power: U256) {
        self.power.lock().unwrap().insert((token_id, block), power);
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChestPowerSource for MemoryChestPower {
    async fn chest_power(
        &self,
        _chest: Address,
        token_id: U256,
        block: u64,
    ) -> Result<Option<U256>, DistributionError> {
        if take_failure(&self.failures) {
            return Err(DistributionError::rpc("getChestPower", anyhow!("connection reset")));
        }
        Ok(self.power.lock().unwrap().get(&(token_id, block)).copied())
    }
}

/// Records uploads and answers with a fixed identifier.
#[derive(Debug)]
pub struct MemoryStore {
    id: String,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), uploads: Mutex::default() }
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upload(&self, name: &str, content: &[u8]) -> Result<String, StorageError> {
        self.uploads.lock().unwrap().push((name.to_string(), content.to_vec()));
        Ok(self.id.clone())
    }
}

/// Records proposals; every submission gets the same transaction hash.
#[derive(Debug, Default)]
pub struct RecordingGovernance {
    proposals: Mutex<Vec<Proposal>>,
    fail_receipts: AtomicBool,
}

impl RecordingGovernance {
    pub fn tx_hash(&self) -> B256 {
        B256::repeat_byte(0xab)
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        self.proposals.lock().unwrap().clone()
    }

    /// Receipts time out after submission.
    pub fn fail_receipts(&self) {
        self.fail_receipts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Governance for RecordingGovernance {
    async fn submit(&self, proposal: &Proposal) -> Result<B256, DistributionError> {
        self.proposals.lock().unwrap().push(proposal.clone());
        Ok(self.tx_hash())
    }

    async fn await_receipt(&self, tx_hash: B256) -> Result<ProposalReceipt, DistributionError> {
        if self.fail_receipts.load(Ordering::SeqCst) {
            return Err(DistributionError::SubmissionOutcomeUnknown {
                tx_hash: Some(tx_hash),
                source: anyhow!("timed out waiting for receipt"),
            });
        }
        Ok(ProposalReceipt { tx_hash, block_number: Some(1) })
    }
}
