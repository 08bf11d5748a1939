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

//! Smart contract interfaces for the reward distributors, the governor and the chest registry.

alloy::sol! {
    /// Merkle distributor shared by the LP and staking reward programs.
    #[sol(rpc, all_derives)]
    interface IDistributor {
        /// Current epoch counter.
        function epoch() external view returns (uint256);

        /// Block number recorded for `dayIndex` (0..6) of `epochId`.
        function dailySnapshotsPerEpoch(uint256 epochId, uint256 dayIndex) external view returns (uint256);

        /// Registers a new epoch with its Merkle root and the IPFS hash of the tree.
        function createEpoch(bytes32 merkleRoot, string ipfsHash) external;
    }

    /// Governor accepting proposals with per-proposal voting parameters.
    #[sol(rpc, all_derives)]
    interface IGovernor {
        function proposeCustom(
            address[] targets,
            uint256[] values,
            bytes[] calldatas,
            string description,
            uint256 votingDelay,
            uint256 votingPeriod
        ) external returns (uint256 proposalId);
    }

    /// Chest registry; voting power is read through the contract, everything else from storage.
    #[sol(rpc, all_derives)]
    interface IChest {
        function getChestPower(uint256 tokenId) external view returns (uint256);
    }
}
