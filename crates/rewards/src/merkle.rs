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

//! Merkle trees over `(address, uint256)` leaves, compatible with OpenZeppelin's
//! `StandardMerkleTree` (`standard-v1`) and `MerkleProof.verify`.
//!
//! Leaves are double hashed, `keccak256(keccak256(abi.encode(address, amount)))`, and
//! internal nodes hash the sorted pair of their children. Leaves are placed in input order.

use alloy::{
    primitives::{keccak256, Address, B256, U256},
    sol_types::SolValue,
};
use serde::{Deserialize, Serialize};

use crate::{errors::DistributionError, snapshots::EpochSnapshots, RecipientAllocation};

const FORMAT: &str = "standard-v1";
const LEAF_ENCODING: [&str; 2] = ["address", "uint256"];

/// `keccak256(keccak256(abi.encode(address, amount)))`
pub fn leaf_hash(address: Address, amount: U256) -> B256 {
    keccak256(keccak256((address, amount).abi_encode()))
}

fn hash_pair(a: &B256, b: &B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(lo.as_slice());
    preimage[32..].copy_from_slice(hi.as_slice());
    keccak256(preimage)
}

fn sibling(index: usize) -> usize {
    if index % 2 == 1 {
        index + 1
    } else {
        index - 1
    }
}

fn parent(index: usize) -> usize {
    (index - 1) / 2
}

/// Checks `proof` against `root` the way `MerkleProof.verify` does.
pub fn verify(root: B256, leaf: B256, proof: &[B256]) -> bool {
    proof.iter().fold(leaf, |acc, node| hash_pair(&acc, node)) == root
}

/// A complete binary tree stored as a flat array, root at index 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandardMerkleTree {
    tree: Vec<B256>,
    values: Vec<RecipientAllocation>,
}

impl StandardMerkleTree {
    /// Builds the tree. Leaf `i` is stored at `tree[len - 1 - i]`.
    pub fn of(values: &[RecipientAllocation]) -> Result<Self, DistributionError> {
        if values.is_empty() {
            return Err(DistributionError::NoRecipients);
        }

        let len = 2 * values.len() - 1;
        let mut tree = vec![B256::ZERO; len];
        for (i, value) in values.iter().enumerate() {
            tree[len - 1 - i] = leaf_hash(value.address, value.amount);
        }
        for i in (0..len - values.len()).rev() {
            tree[i] = hash_pair(&tree[2 * i + 1], &tree[2 * i + 2]);
        }

        Ok(Self { tree, values: values.to_vec() })
    }

    pub fn root(&self) -> B256 {
        self.tree[0]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn tree_index(&self, value_index: usize) -> usize {
        self.tree.len() - 1 - value_index
    }

    /// Sibling path from leaf `value_index` to the root.
    pub fn proof(&self, value_index: usize) -> Option<Vec<B256>> {
        if value_index >= self.values.len() {
            return None;
        }
        let mut index = self.tree_index(value_index);
        let mut proof = Vec::new();
        while index > 0 {
            proof.push(self.tree[sibling(index)]);
            index = parent(index);
        }
        Some(proof)
    }

    /// Proof for the first leaf paying `address`.
    pub fn proof_for(&self, address: Address) -> Option<(RecipientAllocation, Vec<B256>)> {
        let index = self.values.iter().position(|v| v.address == address)?;
        Some((self.values[index].clone(), self.proof(index)?))
    }

    pub fn dump(&self) -> StandardMerkleTreeDump {
        StandardMerkleTreeDump {
            format: FORMAT.to_string(),
            leaf_encoding: LEAF_ENCODING.iter().map(|s| s.to_string()).collect(),
            tree: self.tree.clone(),
            values: self
                .values
                .iter()
                .enumerate()
                .map(|(i, v)| DumpValue {
                    value: (v.address.to_checksum(None), v.amount.to_string()),
                    tree_index: self.tree_index(i),
                })
                .collect(),
        }
    }
}

/// Serialized tree, as produced by OpenZeppelin's `StandardMerkleTree.dump()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardMerkleTreeDump {
    pub format: String,
    pub leaf_encoding: Vec<String>,
    pub tree: Vec<B256>,
    pub values: Vec<DumpValue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpValue {
    /// `[address, amount]` with the amount in base 10.
    pub value: (String, String),
    pub tree_index: usize,
}

/// The document uploaded to the content store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleArtifact {
    pub merkle_tree: StandardMerkleTreeDump,
    pub merkle_tree_root: B256,
    pub block_numbers: Vec<u64>,
    pub name: String,
    pub epoch: String,
}

impl MerkleArtifact {
    /// Canonical serialized form; identical inputs produce identical bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, DistributionError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Builds the published artifact for one epoch's allocations.
pub struct MerkleContentBuilder;

impl MerkleContentBuilder {
    pub fn build(
        name: &str,
        snapshots: &EpochSnapshots,
        recipients: &[RecipientAllocation],
    ) -> Result<MerkleArtifact, DistributionError> {
        let tree = StandardMerkleTree::of(recipients)?;
        tracing::info!("Built Merkle tree {name} with {} leaves, root {}", tree.len(), tree.root());
        Ok(MerkleArtifact {
            merkle_tree_root: tree.root(),
            merkle_tree: tree.dump(),
            block_numbers: snapshots.blocks.to_vec(),
            name: name.to_string(),
            epoch: snapshots.epoch.to_string(),
        })
    }
}
