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

//! Pool and share data from the indexing subgraph, queried at historical blocks.

use alloy::primitives::{Address, U256};
use anyhow::anyhow;
use async_trait::async_trait;
use auto_impl::auto_impl;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::{errors::DistributionError, fixed::parse_decimal, retry::RetryPolicy};

/// Rows requested per page.
pub const PAGE_SIZE: usize = 1000;

const OFFICIAL_POOLS_QUERY: &str = r#"
query OfficialPools($block: Int!, $first: Int!, $skip: Int!) {
  pools(
    first: $first
    skip: $skip
    orderBy: id
    where: { officialPoolWeight_gt: "0" }
    block: { number: $block }
  ) {
    id
    address
    officialPoolWeight
  }
}"#;

const POOL_SHARES_QUERY: &str = r#"
query PoolShares($poolId: ID!, $block: Int!, $first: Int!, $skip: Int!) {
  pools(where: { id: $poolId }, block: { number: $block }) {
    id
    address
    totalShares
    shares(first: $first, skip: $skip, orderBy: id, where: { balance_gt: "0" }) {
      userAddress { id }
      balance
    }
  }
}"#;

const TOKEN_MINTS_QUERY: &str = r#"
query TokenMints($from: BigInt!, $to: BigInt!, $first: Int!, $skip: Int!) {
  tokenMints(
    first: $first
    skip: $skip
    orderBy: timestamp
    where: { timestamp_gte: $from, timestamp_lt: $to }
  ) {
    amount
    timestamp
  }
}"#;

/// A pool with a non-zero official reward weight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfficialPool {
    pub id: String,
    pub address: Address,
    /// Weight scaled by 1e18.
    pub weight: U256,
}

/// One holder's LP balance in a pool, scaled by 1e18.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareRecord {
    pub user: Address,
    pub balance: U256,
}

/// Every non-zero holder of a pool at a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolShares {
    pub pool_id: String,
    pub address: Address,
    pub shares: Vec<ShareRecord>,
    /// Scaled by 1e18.
    pub total_shares: U256,
}

/// A token emission event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenMint {
    pub amount: U256,
    pub timestamp: u64,
}

/// Query interface the calculators depend on.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait ShareSource: Send + Sync {
    async fn official_pools(&self, block: u64) -> Result<Vec<OfficialPool>, DistributionError>;

    /// All holders of `pool_id` at `block`. Fails with `PoolNotFound` if the pool does not exist.
    async fn pool_shares(&self, pool_id: &str, block: u64) -> Result<PoolShares, DistributionError>;

    /// Mints with `from <= timestamp < to`, oldest first.
    async fn token_mints(&self, from: u64, to: u64) -> Result<Vec<TokenMint>, DistributionError>;
}

#[derive(Serialize)]
struct GraphQlRequest<'a, V> {
    query: &'a str,
    variables: V,
}

#[derive(Deserialize)]
struct GraphQlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OfficialPoolsVars {
    block: u64,
    first: usize,
    skip: usize,
}

#[derive(Deserialize)]
struct OfficialPoolsData {
    pools: Vec<OfficialPoolRow>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficialPoolRow {
    id: String,
    address: Address,
    official_pool_weight: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolSharesVars<'a> {
    pool_id: &'a str,
    block: u64,
    first: usize,
    skip: usize,
}

#[derive(Deserialize)]
struct PoolSharesData {
    pools: Vec<PoolSharesRow>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolSharesRow {
    id: String,
    address: Address,
    total_shares: String,
    shares: Vec<ShareRow>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareRow {
    user_address: UserRef,
    balance: String,
}

#[derive(Deserialize)]
struct UserRef {
    id: Address,
}

#[derive(Serialize)]
struct TokenMintsVars {
    from: String,
    to: String,
    first: usize,
    skip: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenMintsData {
    token_mints: Vec<TokenMintRow>,
}

#[derive(Deserialize)]
struct TokenMintRow {
    amount: String,
    timestamp: String,
}

/// HTTP client for the pools subgraph.
#[derive(Clone, Debug)]
pub struct SubgraphClient {
    client: Client,
    url: Url,
    retry: RetryPolicy,
}

impl SubgraphClient {
    pub fn new(url: Url, retry: RetryPolicy) -> Self {
        Self { client: Client::new(), url, retry }
    }

    async fn post_once<V: Serialize + Sync, D: DeserializeOwned + Send>(
        &self,
        query: &str,
        variables: &V,
    ) -> Result<D, DistributionError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&GraphQlRequest { query, variables })
            .send()
            .await
            .map_err(|e| DistributionError::Subgraph(e.into()))?
            .error_for_status()
            .map_err(|e| DistributionError::Subgraph(e.into()))?;

        let body: GraphQlResponse<D> =
            response.json().await.map_err(|e| DistributionError::Subgraph(e.into()))?;

        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(DistributionError::SubgraphResponse(messages.join("; ")));
        }
        body.data.ok_or_else(|| DistributionError::Subgraph(anyhow!("response has no data")))
    }

    async fn post<V: Serialize + Send + Sync, D: DeserializeOwned + Send>(
        &self,
        operation: &str,
        query: &str,
        variables: V,
    ) -> Result<D, DistributionError> {
        self.retry.run(operation, || self.post_once(query, &variables)).await
    }

    /// Fetches every page of `pool_id` shares. Any page failure aborts the whole fetch.
    pub async fn fetch_all_shares(
        &self,
        pool_id: &str,
        block: u64,
    ) -> Result<PoolShares, DistributionError> {
        let mut shares = Vec::new();
        let mut skip = 0;
        loop {
            let data: PoolSharesData = self
                .post(
                    "PoolShares",
                    POOL_SHARES_QUERY,
                    PoolSharesVars { pool_id, block, first: PAGE_SIZE, skip },
                )
                .await?;
            let Some(pool) = data.pools.into_iter().next() else {
                return Err(DistributionError::PoolNotFound { pool_id: pool_id.to_string(), block });
            };

            let page_len = pool.shares.len();
            for row in pool.shares {
                shares.push(ShareRecord {
                    user: row.user_address.id,
                    balance: parse_decimal(&row.balance)?,
                });
            }

            if page_len < PAGE_SIZE {
                tracing::debug!("Fetched {} shares of pool {pool_id} at block {block}", shares.len());
                // totalShares is taken from the final page.
                return Ok(PoolShares {
                    pool_id: pool.id,
                    address: pool.address,
                    shares,
                    total_shares: parse_decimal(&pool.total_shares)?,
                });
            }
            skip += PAGE_SIZE;
        }
    }
}

#[async_trait]
impl ShareSource for SubgraphClient {
    async fn official_pools(&self, block: u64) -> Result<Vec<OfficialPool>, DistributionError> {
        let mut pools = Vec::new();
        let mut skip = 0;
        loop {
            let data: OfficialPoolsData = self
                .post(
                    "OfficialPools",
                    OFFICIAL_POOLS_QUERY,
                    OfficialPoolsVars { block, first: PAGE_SIZE, skip },
                )
                .await?;
            let page_len = data.pools.len();
            for row in data.pools {
                pools.push(OfficialPool {
                    id: row.id,
                    address: row.address,
                    weight: parse_decimal(&row.official_pool_weight)?,
                });
            }
            if page_len < PAGE_SIZE {
                return Ok(pools);
            }
            skip += PAGE_SIZE;
        }
    }

    async fn pool_shares(&self, pool_id: &str, block: u64) -> Result<PoolShares, DistributionError> {
        self.fetch_all_shares(pool_id, block).await
    }

    async fn token_mints(&self, from: u64, to: u64) -> Result<Vec<TokenMint>, DistributionError> {
        let mut mints = Vec::new();
        let mut skip = 0;
        loop {
            let vars =
                TokenMintsVars { from: from.to_string(), to: to.to_string(), first: PAGE_SIZE, skip };
            let data: TokenMintsData = self.post("TokenMints", TOKEN_MINTS_QUERY, vars).await?;
            let page_len = data.token_mints.len();
            for row in data.token_mints {
                let timestamp = row
                    .timestamp
                    .parse()
                    .map_err(|_| DistributionError::InvalidDecimal(row.timestamp.clone()))?;
                mints.push(TokenMint { amount: parse_decimal(&row.amount)?, timestamp });
            }
            if page_len < PAGE_SIZE {
                return Ok(mints);
            }
            skip += PAGE_SIZE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::WAD;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    const POOL: &str = "0x00000000000000000000000000000000000000b1";

    fn share_rows(start: usize, len: usize) -> Vec<serde_json::Value> {
        (start..start + len)
            .map(|i| json!({ "userAddress": { "id": format!("{:#042x}", i + 1) }, "balance": "1" }))
            .collect()
    }

    fn pool_page(rows: Vec<serde_json::Value>, total: &str) -> serde_json::Value {
        json!({ "data": { "pools": [{
            "id": POOL, "address": POOL, "totalShares": total, "shares": rows
        }]}})
    }

    #[tokio::test]
    async fn paginates_until_short_page() {
        let server = MockServer::start();
        let pages = [(0, PAGE_SIZE, "2400"), (1000, PAGE_SIZE, "2450"), (2000, 500, "2500")];
        let mocks: Vec<_> = pages
            .iter()
            .map(|(skip, len, total)| {
                server.mock(|when, then| {
                    when.method(POST).json_body_partial(
                        json!({ "variables": { "skip": skip, "block": 77 } }).to_string(),
                    );
                    then.status(200).json_body(pool_page(share_rows(*skip, *len), total));
                })
            })
            .collect();

        let client = SubgraphClient::new(server.base_url().parse().unwrap(), RetryPolicy::NONE);
        let shares = client.fetch_all_shares(POOL, 77).await.unwrap();

        for mock in &mocks {
            mock.assert_hits(1);
        }
        assert_eq!(shares.shares.len(), 2500);
        assert_eq!(shares.total_shares, U256::from(2500) * WAD);
        assert_eq!(shares.shares[0].user, Address::with_last_byte(1));
        assert_eq!(shares.shares[0].balance, WAD);
    }

    #[tokio::test]
    async fn failed_page_aborts_fetch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).json_body_partial(json!({ "variables": { "skip": 0 } }).to_string());
            then.status(200).json_body(pool_page(share_rows(0, PAGE_SIZE), "2000"));
        });
        let failing = server.mock(|when, then| {
            when.method(POST).json_body_partial(json!({ "variables": { "skip": 1000 } }).to_string());
            then.status(502);
        });

        let retry = RetryPolicy { retries: 1, delay: Duration::from_millis(1) };
        let client = SubgraphClient::new(server.base_url().parse().unwrap(), retry);
        let err = client.fetch_all_shares(POOL, 1).await.unwrap_err();

        failing.assert_hits(2);
        assert!(matches!(err, DistributionError::RetriesExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn missing_pool_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({ "data": { "pools": [] } }));
        });

        let client = SubgraphClient::new(server.base_url().parse().unwrap(), RetryPolicy::NONE);
        let err = client.pool_shares("0xdead", 5).await.unwrap_err();
        assert!(matches!(err, DistributionError::PoolNotFound { block: 5, .. }));
    }

    #[tokio::test]
    async fn graphql_errors_are_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200)
                .json_body(json!({ "errors": [{ "message": "indexing error" }], "data": null }));
        });

        let retry = RetryPolicy { retries: 3, delay: Duration::from_millis(1) };
        let client = SubgraphClient::new(server.base_url().parse().unwrap(), retry);
        let err = client.official_pools(5).await.unwrap_err();

        mock.assert_hits(1);
        assert!(matches!(err, DistributionError::SubgraphResponse(msg) if msg == "indexing error"));
    }

    #[tokio::test]
    async fn official_pools_are_paged() {
        let server = MockServer::start();
        let pool_rows = |start: usize, len: usize| -> Vec<serde_json::Value> {
            (start..start + len)
                .map(|i| {
                    let address = format!("{:#042x}", i + 1);
                    json!({ "id": address, "address": address, "officialPoolWeight": "1" })
                })
                .collect()
        };
        let first = server.mock(|when, then| {
            when.method(POST)
                .body_contains("OfficialPools")
                .json_body_partial(json!({ "variables": { "skip": 0, "first": 1000 } }).to_string());
            then.status(200).json_body(json!({ "data": { "pools": pool_rows(0, PAGE_SIZE) } }));
        });
        let second = server.mock(|when, then| {
            when.method(POST)
                .body_contains("OfficialPools")
                .json_body_partial(json!({ "variables": { "skip": 1000 } }).to_string());
            then.status(200).json_body(json!({ "data": { "pools": pool_rows(PAGE_SIZE, 5) } }));
        });

        let client = SubgraphClient::new(server.base_url().parse().unwrap(), RetryPolicy::NONE);
        let pools = client.official_pools(12).await.unwrap();

        first.assert_hits(1);
        second.assert_hits(1);
        assert_eq!(pools.len(), PAGE_SIZE + 5);
        let last: Address = format!("{:#042x}", PAGE_SIZE + 5).parse().unwrap();
        assert_eq!(pools[PAGE_SIZE + 4].address, last);
    }

    #[tokio::test]
    async fn parses_official_pools_and_mints() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).body_contains("OfficialPools");
            then.status(200).json_body(json!({ "data": { "pools": [
                { "id": "a", "address": POOL, "officialPoolWeight": "0.6" },
                { "id": "b", "address": POOL, "officialPoolWeight": "0.4" }
            ]}}));
        });
        server.mock(|when, then| {
            when.method(POST)
                .body_contains("TokenMints")
                .json_body_partial(json!({ "variables": { "from": "100", "to": "200" } }).to_string());
            then.status(200).json_body(json!({ "data": { "tokenMints": [
                { "amount": "1000000", "timestamp": "150" }
            ]}}));
        });

        let client = SubgraphClient::new(server.base_url().parse().unwrap(), RetryPolicy::NONE);
        let pools = client.official_pools(9).await.unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].weight, U256::from(6) * WAD / U256::from(10));

        let mints = client.token_mints(100, 200).await.unwrap();
        assert_eq!(mints, vec![TokenMint { amount: U256::from(1_000_000) * WAD, timestamp: 150 }]);
    }
}
