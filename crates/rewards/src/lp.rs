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

//! LP reward allocation.
//!
//! For each snapshot block every holder of an official pool earns
//! `balance / totalShares * weight / totalWeight` of that block's reward. Fractions are
//! carried at [`SHARE_SCALE`] through the whole epoch and the final token amount is taken
//! with a single truncating division by `7 * SHARE_SCALE`.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};

use crate::{
    chain::{ChainStorageReader, StorageReader},
    config::NestedPoolConfig,
    errors::DistributionError,
    fixed::{mul_div, ratio, SHARE_SCALE},
    snapshots::EpochSnapshots,
    subgraph::ShareSource,
    RecipientAllocation, DAYS_PER_EPOCH,
};

const SECONDS_PER_DAY: u64 = 86_400;
const BPS_DENOMINATOR: u64 = 10_000;

/// Holder fractions of one pool at one block, scaled by [`SHARE_SCALE`].
pub type HolderFractions = BTreeMap<Address, U256>;

/// Pool id to holder fractions, for one block.
pub type PoolFractions = BTreeMap<String, HolderFractions>;

/// Weighted fractions for every snapshot block of an epoch.
///
/// A block recorded for more than one day accumulates into a single entry, so it keeps
/// counting once per day.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WeightedAllocation {
    blocks: BTreeMap<u64, PoolFractions>,
}

impl WeightedAllocation {
    pub fn add_block(&mut self, block: u64, pools: PoolFractions) {
        let entry = self.blocks.entry(block).or_default();
        for (pool_id, holders) in pools {
            let pool = entry.entry(pool_id).or_default();
            for (holder, fraction) in holders {
                *pool.entry(holder).or_default() += fraction;
            }
        }
    }

    /// Sum of each holder's fractions across all pools and blocks.
    pub fn holder_totals(&self) -> BTreeMap<Address, U256> {
        let mut totals: BTreeMap<Address, U256> = BTreeMap::new();
        for pools in self.blocks.values() {
            for holders in pools.values() {
                for (holder, fraction) in holders {
                    *totals.entry(*holder).or_default() += *fraction;
                }
            }
        }
        totals
    }
}

/// Computes LP allocations from subgraph share data, with optional nested pool re-attribution.
#[derive(Clone, Debug)]
pub struct LpDistributionCalculator<S, R> {
    shares: S,
    chain: ChainStorageReader<R>,
    nested: Option<NestedPoolConfig>,
}

impl<S: ShareSource, R: StorageReader> LpDistributionCalculator<S, R> {
    pub fn new(shares: S, chain: ChainStorageReader<R>, nested: Option<NestedPoolConfig>) -> Self {
        Self { shares, chain, nested }
    }

    /// Epoch reward budget: the mint emitted during the epoch, times `weight_bps / 10000`.
    ///
    /// The mint is searched from the first snapshot's timestamp up to one day after the
    /// last snapshot's timestamp.
    pub async fn epoch_allocation(
        &self,
        snapshots: &EpochSnapshots,
        weight_bps: u32,
    ) -> Result<U256, DistributionError> {
        let from = self.chain.block_timestamp(snapshots.first_block()).await?;
        let to = self.chain.block_timestamp(snapshots.last_block()).await? + SECONDS_PER_DAY;

        let mints = self.shares.token_mints(from, to).await?;
        let Some(mint) = mints.first() else {
            return Err(DistributionError::MissingTokenMint { epoch: snapshots.epoch });
        };
        if mints.len() > 1 {
            tracing::warn!(
                "{} token mints between {from} and {to}, using the one at {}",
                mints.len(),
                mint.timestamp
            );
        }

        mul_div(
            mint.amount,
            U256::from(weight_bps),
            U256::from(BPS_DENOMINATOR),
            "lp allocation",
        )
    }

    /// Weighted fractions of every holder at one block.
    pub async fn block_fractions(&self, block: u64) -> Result<PoolFractions, DistributionError> {
        let official = self.shares.official_pools(block).await?;
        let total_weight = official.iter().fold(U256::ZERO, |acc, p| acc + p.weight);
        if official.is_empty() || total_weight.is_zero() {
            return Err(DistributionError::NoOfficialPools { block });
        }

        let mut pools = PoolFractions::new();
        for pool in &official {
            // Holders of the nested pool are paid from the vault share only. Its own
            // weight stays in `total_weight` and is left unallocated.
            if self.nested.as_ref().is_some_and(|n| n.pool_id == pool.id) {
                tracing::debug!("Official pool {} is the nested pool, skipping its weight", pool.id);
                continue;
            }

            let shares = self.shares.pool_shares(&pool.id, block).await?;
            if shares.total_shares.is_zero() {
                tracing::warn!("Pool {} has zero total shares at block {block}, skipping", pool.id);
                continue;
            }

            let holders = pools.entry(pool.id.clone()).or_default();
            for share in &shares.shares {
                let fraction = ratio(share.balance, shares.total_shares, SHARE_SCALE, "pool share")?;
                let weighted = mul_div(fraction, pool.weight, total_weight, "pool weight")?;
                *holders.entry(share.user).or_default() += weighted;
            }
        }

        if let Some(nested) = &self.nested {
            self.reattribute_nested(nested, block, &mut pools).await?;
        }
        Ok(pools)
    }

    /// Moves the vault's fractions to the holders of the nested pool, pro rata to their
    /// on-chain LP balance. The vault itself ends with nothing.
    async fn reattribute_nested(
        &self,
        nested: &NestedPoolConfig,
        block: u64,
        pools: &mut PoolFractions,
    ) -> Result<(), DistributionError> {
        let mut vault_amount = U256::ZERO;
        for holders in pools.values_mut() {
            if let Some(fraction) = holders.remove(&nested.vault) {
                vault_amount += fraction;
            }
        }
        pools.retain(|_, holders| !holders.is_empty());
        if vault_amount.is_zero() {
            return Ok(());
        }

        let nested_pool = self.shares.pool_shares(&nested.pool_id, block).await?;
        let total = self.chain.total_supply_at(nested_pool.address, block).await?;
        if total.is_zero() {
            tracing::warn!(
                "Nested pool {} has zero supply at block {block}, vault share is dropped",
                nested.pool_id
            );
            return Ok(());
        }

        let holders = pools.entry(nested.pool_id.clone()).or_default();
        for share in &nested_pool.shares {
            if share.user == nested.vault {
                continue;
            }
            let balance = self.chain.balance_at(nested_pool.address, share.user, block).await?;
            let fraction = mul_div(vault_amount, balance, total, "nested share")?;
            if !fraction.is_zero() {
                *holders.entry(share.user).or_default() += fraction;
            }
        }
        tracing::debug!(
            "Re-attributed {vault_amount} of vault {} to {} holders of {} at block {block}",
            nested.vault,
            holders.len(),
            nested.pool_id
        );
        Ok(())
    }

    pub async fn weighted_allocation(
        &self,
        snapshots: &EpochSnapshots,
    ) -> Result<WeightedAllocation, DistributionError> {
        let mut allocation = WeightedAllocation::default();
        for &block in &snapshots.blocks {
            let pools = self.block_fractions(block).await?;
            allocation.add_block(block, pools);
        }
        Ok(allocation)
    }

    /// Token amounts per holder for the epoch, ordered by address. Zero amounts are omitted.
    pub async fn compute(
        &self,
        snapshots: &EpochSnapshots,
        total_allocation: U256,
    ) -> Result<Vec<RecipientAllocation>, DistributionError> {
        let allocation = self.weighted_allocation(snapshots).await?;
        finalize(&allocation, total_allocation)
    }
}

/// `floor(total_allocation * sum / (7 * SHARE_SCALE))` per holder.
pub fn finalize(
    allocation: &WeightedAllocation,
    total_allocation: U256,
) -> Result<Vec<RecipientAllocation>, DistributionError> {
    let denominator = SHARE_SCALE * U256::from(DAYS_PER_EPOCH);
    let mut recipients = Vec::new();
    for (address, sum) in allocation.holder_totals() {
        let amount = mul_div(total_allocation, sum, denominator, "lp amount")?;
        if !amount.is_zero() {
            recipients.push(RecipientAllocation { address, amount });
        }
    }
    Ok(recipients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StorageLayout,
        fixed::WAD,
        retry::RetryPolicy,
        subgraph::{OfficialPool, PoolShares, ShareRecord, TokenMint},
        test_utils::{MemoryShares, MemoryStorage},
    };
    use alloy::primitives::address;

    const POOL_A: Address = address!("00000000000000000000000000000000000000a1");
    const POOL_B: Address = address!("00000000000000000000000000000000000000a2");
    const NESTED: Address = address!("00000000000000000000000000000000000000a3");
    const VAULT: Address = address!("00000000000000000000000000000000000000ff");
    const ALICE: Address = address!("0000000000000000000000000000000000000011");
    const BOB: Address = address!("0000000000000000000000000000000000000012");
    const CAROL: Address = address!("0000000000000000000000000000000000000013");
    const DAVE: Address = address!("0000000000000000000000000000000000000014");

    fn wad(n: u64) -> U256 {
        U256::from(n) * WAD
    }

    fn pool(id: &str, address: Address, weight: u64) -> OfficialPool {
        OfficialPool { id: id.into(), address, weight: wad(weight) }
    }

    fn shares(id: &str, address: Address, holders: &[(Address, u64)]) -> PoolShares {
        let shares: Vec<_> =
            holders.iter().map(|(user, b)| ShareRecord { user: *user, balance: wad(*b) }).collect();
        let total_shares = shares.iter().fold(U256::ZERO, |acc, s| acc + s.balance);
        PoolShares { pool_id: id.into(), address, shares, total_shares }
    }

    fn snapshots(blocks: [u64; DAYS_PER_EPOCH]) -> EpochSnapshots {
        EpochSnapshots { epoch: U256::from(1), blocks }
    }

    fn calculator<'a>(
        shares: &'a MemoryShares,
        storage: &'a MemoryStorage,
        nested: Option<NestedPoolConfig>,
    ) -> LpDistributionCalculator<&'a MemoryShares, &'a MemoryStorage> {
        let chain = ChainStorageReader::new(storage, StorageLayout::default(), RetryPolicy::NONE);
        LpDistributionCalculator::new(shares, chain, nested)
    }

    fn two_pool_source(blocks: &[u64]) -> MemoryShares {
        let source = MemoryShares::default();
        for &block in blocks {
            source.set_official_pools(block, vec![pool("a", POOL_A, 60), pool("b", POOL_B, 40)]);
            source.set_pool_shares(block, shares("a", POOL_A, &[(ALICE, 3), (BOB, 1)]));
            source.set_pool_shares(block, shares("b", POOL_B, &[(BOB, 1), (CAROL, 1)]));
        }
        source
    }

    #[tokio::test]
    async fn weighted_fractions_sum_to_pool_weight() {
        let source = two_pool_source(&[5]);
        let storage = MemoryStorage::default();
        let pools = calculator(&source, &storage, None).block_fractions(5).await.unwrap();

        let a: U256 = pools["a"].values().copied().fold(U256::ZERO, |x, y| x + y);
        let b: U256 = pools["b"].values().copied().fold(U256::ZERO, |x, y| x + y);
        assert_eq!(a, SHARE_SCALE * U256::from(6) / U256::from(10));
        assert_eq!(b, SHARE_SCALE * U256::from(4) / U256::from(10));
        assert_eq!(pools["a"][&ALICE], SHARE_SCALE * U256::from(45) / U256::from(100));
    }

    #[tokio::test]
    async fn epoch_amounts_are_averaged_over_seven_days() {
        let blocks = [1, 2, 3, 4, 5, 6, 7];
        let source = two_pool_source(&blocks);
        let storage = MemoryStorage::default();
        let recipients = calculator(&source, &storage, None)
            .compute(&snapshots(blocks), U256::from(1_000_000))
            .await
            .unwrap();

        // alice 0.45, bob 0.15 + 0.2, carol 0.2 of every day
        assert_eq!(
            recipients,
            vec![
                RecipientAllocation { address: ALICE, amount: U256::from(450_000) },
                RecipientAllocation { address: BOB, amount: U256::from(350_000) },
                RecipientAllocation { address: CAROL, amount: U256::from(200_000) },
            ]
        );
    }

    #[tokio::test]
    async fn repeated_block_counts_once_per_day() {
        let source = MemoryShares::default();
        for block in [1, 2] {
            source.set_official_pools(block, vec![pool("a", POOL_A, 1)]);
        }
        source.set_pool_shares(1, shares("a", POOL_A, &[(ALICE, 1)]));
        source.set_pool_shares(2, shares("a", POOL_A, &[(BOB, 1)]));
        let storage = MemoryStorage::default();

        let recipients = calculator(&source, &storage, None)
            .compute(&snapshots([1, 1, 1, 1, 1, 1, 2]), U256::from(7_000))
            .await
            .unwrap();
        assert_eq!(recipients[0], RecipientAllocation { address: ALICE, amount: U256::from(6_000) });
        assert_eq!(recipients[1], RecipientAllocation { address: BOB, amount: U256::from(1_000) });
    }

    #[tokio::test]
    async fn zero_supply_pool_is_skipped() {
        let source = MemoryShares::default();
        source.set_official_pools(3, vec![pool("a", POOL_A, 1), pool("b", POOL_B, 1)]);
        source.set_pool_shares(3, shares("a", POOL_A, &[(ALICE, 1)]));
        source.set_pool_shares(3, shares("b", POOL_B, &[]));
        let storage = MemoryStorage::default();

        let pools = calculator(&source, &storage, None).block_fractions(3).await.unwrap();
        assert!(!pools.contains_key("b"));
        assert_eq!(pools["a"][&ALICE], SHARE_SCALE / U256::from(2));
    }

    #[tokio::test]
    async fn no_official_pools_is_fatal() {
        let source = MemoryShares::default();
        source.set_official_pools(3, vec![]);
        let storage = MemoryStorage::default();

        let err = calculator(&source, &storage, None).block_fractions(3).await.unwrap_err();
        assert!(matches!(err, DistributionError::NoOfficialPools { block: 3 }));
    }

    #[tokio::test]
    async fn vault_is_an_ordinary_holder_without_nested_config() {
        let source = MemoryShares::default();
        source.set_official_pools(3, vec![pool("a", POOL_A, 1)]);
        source.set_pool_shares(3, shares("a", POOL_A, &[(ALICE, 1), (VAULT, 1)]));
        let storage = MemoryStorage::default();

        let pools = calculator(&source, &storage, None).block_fractions(3).await.unwrap();
        assert_eq!(pools["a"][&VAULT], SHARE_SCALE / U256::from(2));
    }

    #[tokio::test]
    async fn vault_share_moves_to_nested_holders() {
        let layout = StorageLayout::default();
        let source = MemoryShares::default();
        source.set_official_pools(3, vec![pool("a", POOL_A, 1)]);
        source.set_pool_shares(3, shares("a", POOL_A, &[(ALICE, 1), (VAULT, 1)]));
        source.set_pool_shares(3, shares("nested", NESTED, &[(DAVE, 1), (CAROL, 1)]));

        // On-chain balances differ from the subgraph's and are the ones that count.
        let storage = MemoryStorage::default();
        storage.set_total_supply(NESTED, &layout, 3, U256::from(4));
        storage.set_balance(NESTED, &layout, DAVE, 3, U256::from(3));
        storage.set_balance(NESTED, &layout, CAROL, 3, U256::from(1));

        let nested = NestedPoolConfig { pool_id: "nested".into(), vault: VAULT };
        let pools = calculator(&source, &storage, Some(nested)).block_fractions(3).await.unwrap();

        assert!(!pools["a"].contains_key(&VAULT));
        let half = SHARE_SCALE / U256::from(2);
        assert_eq!(pools["nested"][&DAVE], half * U256::from(3) / U256::from(4));
        assert_eq!(pools["nested"][&CAROL], half / U256::from(4));
        assert_eq!(pools["a"][&ALICE], half);
    }

    #[tokio::test]
    async fn official_nested_pool_is_paid_from_vault_share_only() {
        let layout = StorageLayout::default();
        let source = MemoryShares::default();
        source.set_official_pools(3, vec![pool("a", POOL_A, 1), pool("nested", NESTED, 1)]);
        source.set_pool_shares(3, shares("a", POOL_A, &[(VAULT, 1)]));
        source.set_pool_shares(3, shares("nested", NESTED, &[(DAVE, 1), (CAROL, 1)]));

        let storage = MemoryStorage::default();
        storage.set_total_supply(NESTED, &layout, 3, U256::from(2));
        storage.set_balance(NESTED, &layout, DAVE, 3, U256::from(1));
        storage.set_balance(NESTED, &layout, CAROL, 3, U256::from(1));

        let nested = NestedPoolConfig { pool_id: "nested".into(), vault: VAULT };
        let pools = calculator(&source, &storage, Some(nested)).block_fractions(3).await.unwrap();

        let quarter = SHARE_SCALE / U256::from(4);
        assert_eq!(pools["nested"][&DAVE], quarter);
        assert_eq!(pools["nested"][&CAROL], quarter);
        assert!(!pools.contains_key("a"));
    }

    #[tokio::test]
    async fn missing_nested_pool_is_fatal() {
        let source = MemoryShares::default();
        source.set_official_pools(3, vec![pool("a", POOL_A, 1)]);
        source.set_pool_shares(3, shares("a", POOL_A, &[(VAULT, 1)]));
        let storage = MemoryStorage::default();

        let nested = NestedPoolConfig { pool_id: "nested".into(), vault: VAULT };
        let err = calculator(&source, &storage, Some(nested)).block_fractions(3).await.unwrap_err();
        assert!(matches!(err, DistributionError::PoolNotFound { .. }));
    }

    #[tokio::test]
    async fn epoch_allocation_from_mint_window() {
        let source = MemoryShares::default();
        source.add_token_mint(TokenMint { amount: wad(1_000), timestamp: 1_000 + 6 * 86_400 + 100 });
        let storage = MemoryStorage::default();
        for (day, block) in (1..=7).enumerate() {
            storage.set_block_timestamp(block, 1_000 + day as u64 * 86_400);
        }

        let calc = calculator(&source, &storage, None);
        let allocation =
            calc.epoch_allocation(&snapshots([1, 2, 3, 4, 5, 6, 7]), 2_500).await.unwrap();
        assert_eq!(allocation, wad(250));

        let empty = MemoryShares::default();
        let err = calculator(&empty, &storage, None)
            .epoch_allocation(&snapshots([1, 2, 3, 4, 5, 6, 7]), 2_500)
            .await
            .unwrap_err();
        assert!(matches!(err, DistributionError::MissingTokenMint { .. }));
    }
}
