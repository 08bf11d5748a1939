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

//! Coded error types shared by every stage of the distribution pipeline.

use alloy::primitives::{B256, U256};
use thiserror::Error;

use crate::store::StorageError;

/// An error carrying a stable, greppable code.
pub trait CodedError: std::error::Error {
    fn code(&self) -> &str;
}

/// Implements `Debug` as `<code> <display>` so that `{:?}` in logs keeps the code.
#[macro_export]
macro_rules! impl_coded_debug {
    ($name:ident) => {
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} {}", $crate::errors::CodedError::code(self), self)
            }
        }
    };
}

/// Failure of a single pipeline run.
///
/// Variants fall in four families: transient I/O (retried before surfacing), data
/// preconditions (fatal, never retried), arithmetic/encoding faults, and submission
/// outcomes that could not be confirmed.
#[derive(Error)]
#[non_exhaustive]
pub enum DistributionError {
    #[error("RPC call `{operation}` failed: {source}")]
    Rpc {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("subgraph request failed: {0}")]
    Subgraph(#[source] anyhow::Error),

    #[error("subgraph returned errors: {0}")]
    SubgraphResponse(String),

    #[error("content store error: {0}")]
    Storage(#[from] StorageError),

    #[error("`{operation}` failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<DistributionError>,
    },

    #[error("no token mint recorded for epoch {epoch}")]
    MissingTokenMint { epoch: U256 },

    #[error("pool {pool_id} not found at block {block}")]
    PoolNotFound { pool_id: String, block: u64 },

    #[error("no official pools at block {block}")]
    NoOfficialPools { block: u64 },

    #[error("epoch {epoch} has no snapshot recorded for day {day}")]
    SnapshotMissing { epoch: U256, day: u8 },

    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("distribution has no recipients")]
    NoRecipients,

    #[error("invalid decimal value `{0}`")]
    InvalidDecimal(String),

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The proposal may or may not exist on-chain; it must be checked manually.
    #[error("proposal submission outcome unknown (tx: {tx_hash:?}): {source}")]
    SubmissionOutcomeUnknown {
        tx_hash: Option<B256>,
        #[source]
        source: anyhow::Error,
    },
}

impl_coded_debug!(DistributionError);

impl CodedError for DistributionError {
    fn code(&self) -> &str {
        match self {
            DistributionError::Rpc { .. } => "[E-IO-1001]",
            DistributionError::Subgraph(_) => "[E-IO-1002]",
            DistributionError::SubgraphResponse(_) => "[E-IO-1003]",
            DistributionError::Storage(_) => "[E-IO-1004]",
            DistributionError::RetriesExhausted { .. } => "[E-IO-1005]",
            DistributionError::BlockNotFound(_) => "[E-IO-1006]",
            DistributionError::MissingTokenMint { .. } => "[E-DATA-2001]",
            DistributionError::PoolNotFound { .. } => "[E-DATA-2002]",
            DistributionError::NoOfficialPools { .. } => "[E-DATA-2003]",
            DistributionError::NoRecipients => "[E-DATA-2004]",
            DistributionError::InvalidDecimal(_) => "[E-DATA-2005]",
            DistributionError::SnapshotMissing { .. } => "[E-DATA-2006]",
            DistributionError::Overflow(_) => "[E-CALC-3001]",
            DistributionError::Serialize(_) => "[E-CALC-3002]",
            DistributionError::Config(_) => "[E-CFG-4001]",
            DistributionError::SubmissionOutcomeUnknown { .. } => "[E-GOV-5001]",
        }
    }
}

impl DistributionError {
    pub(crate) fn rpc(operation: impl Into<String>, err: impl Into<anyhow::Error>) -> Self {
        Self::Rpc { operation: operation.into(), source: err.into() }
    }

    /// True for failures that a retry can plausibly fix.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DistributionError::Rpc { .. }
                | DistributionError::Subgraph(_)
                | DistributionError::BlockNotFound(_)
        ) || matches!(self, DistributionError::Storage(err) if err.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_includes_code() {
        let err = DistributionError::MissingTokenMint { epoch: U256::from(5) };
        assert_eq!(format!("{err:?}"), "[E-DATA-2001] no token mint recorded for epoch 5");
    }

    #[test]
    fn preconditions_are_not_transient() {
        assert!(!DistributionError::NoRecipients.is_transient());
        assert!(DistributionError::rpc("eth_getStorageAt", anyhow::anyhow!("timeout")).is_transient());
    }
}
