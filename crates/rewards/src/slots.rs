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

//! Solidity storage layout helpers.
//!
//! Only two layouts are consumed: `mapping(K => V)` at a known base slot, and the packed
//! chest vesting struct. Both are pure and operate on raw 32-byte words.

use alloy::primitives::{keccak256, Address, B256, U256};

/// Slot of `mapping[key]` for a mapping declared at `base`: `keccak256(pad32(key) ++ pad32(base))`.
pub fn mapping_slot(key: B256, base: B256) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(key.as_slice());
    preimage[32..].copy_from_slice(base.as_slice());
    keccak256(preimage)
}

/// Left-pads an address to a 32-byte mapping key.
pub fn address_key(address: Address) -> B256 {
    address.into_word()
}

/// Big-endian 32-byte encoding of an integer key or slot index.
pub fn uint_key(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

/// Interprets a storage word as an unsigned integer.
pub fn word_to_u256(word: B256) -> U256 {
    U256::from_be_bytes(word.0)
}

/// Takes the low 20 bytes of a word holding an `address`.
pub fn word_to_address(word: B256) -> Address {
    Address::from_slice(&word[12..])
}

// Packed layout, declared order from the low-order end of the word:
// nerfParameter uint8 | accumulatedBooster uint120 | vestingDuration uint32 |
// boosterTimestamp uint48 | cliffTimestamp uint48
const CLIFF_TIMESTAMP: core::ops::Range<usize> = 0..6;
const BOOSTER_TIMESTAMP: core::ops::Range<usize> = 6..12;
const VESTING_DURATION: core::ops::Range<usize> = 12..16;
const ACCUMULATED_BOOSTER: core::ops::Range<usize> = 16..31;
const NERF_PARAMETER: core::ops::Range<usize> = 31..32;

/// Maximum of the 120-bit booster field.
pub const MAX_ACCUMULATED_BOOSTER: u128 = (1u128 << 120) - 1;
/// Maximum of the 48-bit timestamp fields.
pub const MAX_TIMESTAMP: u64 = (1u64 << 48) - 1;

/// The vesting metadata of a chest, as packed into a single storage word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VestingPosition {
    pub nerf_parameter: u8,
    pub accumulated_booster: u128,
    pub vesting_duration: u32,
    pub booster_timestamp: u64,
    pub cliff_timestamp: u64,
}

fn be_bytes_to_u128(bytes: &[u8]) -> u128 {
    bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b))
}

fn write_be(dst: &mut [u8], value: u128) {
    let full = value.to_be_bytes();
    dst.copy_from_slice(&full[full.len() - dst.len()..]);
}

impl VestingPosition {
    /// Decodes the packed struct by slicing fixed byte ranges of the big-endian word.
    pub fn decode(word: B256) -> Self {
        let bytes = word.as_slice();
        Self {
            nerf_parameter: bytes[NERF_PARAMETER.start],
            accumulated_booster: be_bytes_to_u128(&bytes[ACCUMULATED_BOOSTER]),
            vesting_duration: be_bytes_to_u128(&bytes[VESTING_DURATION]) as u32,
            booster_timestamp: be_bytes_to_u128(&bytes[BOOSTER_TIMESTAMP]) as u64,
            cliff_timestamp: be_bytes_to_u128(&bytes[CLIFF_TIMESTAMP]) as u64,
        }
    }

    /// Packs the struct into a word. Values wider than their field are truncated to it.
    pub fn encode(&self) -> B256 {
        let mut word = [0u8; 32];
        word[NERF_PARAMETER].copy_from_slice(&[self.nerf_parameter]);
        write_be(&mut word[ACCUMULATED_BOOSTER], self.accumulated_booster);
        write_be(&mut word[VESTING_DURATION], u128::from(self.vesting_duration));
        write_be(&mut word[BOOSTER_TIMESTAMP], u128::from(self.booster_timestamp));
        write_be(&mut word[CLIFF_TIMESTAMP], u128::from(self.cliff_timestamp));
        B256::from(word)
    }
}
