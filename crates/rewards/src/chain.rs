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

//! Raw storage reads pinned to historical blocks.

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::{Address, B256, U256},
    providers::Provider,
};
use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::{
    config::{slot, StorageLayout},
    errors::DistributionError,
    retry::RetryPolicy,
    slots::{address_key, mapping_slot, uint_key, word_to_address, word_to_u256, VestingPosition},
};

/// Source of raw contract storage words and block headers.
///
/// Every read names an explicit block; there is no "latest" variant.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait StorageReader: Send + Sync {
    /// `eth_getStorageAt(contract, slot, block)`.
    async fn storage_at(
        &self,
        contract: Address,
        slot: B256,
        block: u64,
    ) -> Result<B256, DistributionError>;

    /// Timestamp of `block`.
    async fn block_timestamp(&self, block: u64) -> Result<u64, DistributionError>;
}

/// [`StorageReader`] backed by an alloy [`Provider`].
#[derive(Clone, Debug)]
pub struct RpcStorageReader<P> {
    provider: P,
}

impl<P> RpcStorageReader<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider> StorageReader for RpcStorageReader<P> {
    async fn storage_at(
        &self,
        contract: Address,
        slot: B256,
        block: u64,
    ) -> Result<B256, DistributionError> {
        let value = self
            .provider
            .get_storage_at(contract, word_to_u256(slot))
            .block_id(BlockId::number(block))
            .await
            .map_err(|e| DistributionError::rpc("eth_getStorageAt", e))?;
        Ok(uint_key(value))
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, DistributionError> {
        let header = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await
            .map_err(|e| DistributionError::rpc("eth_getBlockByNumber", e))?
            .ok_or(DistributionError::BlockNotFound(block))?;
        Ok(header.header.timestamp)
    }
}

/// Typed accessors over a [`StorageReader`], each call retried on transient failure.
#[derive(Clone, Debug)]
pub struct ChainStorageReader<R> {
    reader: R,
    layout: StorageLayout,
    retry: RetryPolicy,
}

impl<R: StorageReader> ChainStorageReader<R> {
    pub fn new(reader: R, layout: StorageLayout, retry: RetryPolicy) -> Self {
        Self { reader, layout, retry }
    }

    /// Reads a single word. An all-zero word is a valid value.
    pub async fn read_word(
        &self,
        contract: Address,
        slot: B256,
        block: u64,
    ) -> Result<B256, DistributionError> {
        self.retry.run("eth_getStorageAt", || self.reader.storage_at(contract, slot, block)).await
    }

    pub async fn block_timestamp(&self, block: u64) -> Result<u64, DistributionError> {
        self.retry.run("eth_getBlockByNumber", || self.reader.block_timestamp(block)).await
    }

    /// `balanceOf[holder]` of an LP token, read from its balances mapping.
    pub async fn balance_at(
        &self,
        pool: Address,
        holder: Address,
        block: u64,
    ) -> Result<U256, DistributionError> {
        let slot = mapping_slot(address_key(holder), slot(self.layout.balances_slot));
        Ok(word_to_u256(self.read_word(pool, slot, block).await?))
    }

    pub async fn total_supply_at(&self, pool: Address, block: u64) -> Result<U256, DistributionError> {
        Ok(word_to_u256(self.read_word(pool, slot(self.layout.total_supply_slot), block).await?))
    }

    /// Next chest token id; chests `0..counter` may exist.
    pub async fn chest_counter_at(&self, chest: Address, block: u64) -> Result<U256, DistributionError> {
        Ok(word_to_u256(self.read_word(chest, slot(self.layout.chest_counter_slot), block).await?))
    }

    /// Owner of chest `token_id`; the zero address when unminted or burned.
    pub async fn chest_owner_at(
        &self,
        chest: Address,
        token_id: U256,
        block: u64,
    ) -> Result<Address, DistributionError> {
        let slot = mapping_slot(uint_key(token_id), slot(self.layout.chest_owners_slot));
        Ok(word_to_address(self.read_word(chest, slot, block).await?))
    }

    pub async fn vesting_position_at(
        &self,
        chest: Address,
        token_id: U256,
        block: u64,
    ) -> Result<VestingPosition, DistributionError> {
        let slot = mapping_slot(uint_key(token_id), slot(self.layout.chest_vesting_slot));
        Ok(VestingPosition::decode(self.read_word(chest, slot, block).await?))
    }
}
