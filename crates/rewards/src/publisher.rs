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

//! Publication of a Merkle artifact: content upload followed by a governance proposal
//! that calls `createEpoch(root, contentHash)` on the distributor.

use std::{fmt, sync::Arc};

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    providers::{PendingTransactionBuilder, Provider},
    sol_types::SolCall,
};
use anyhow::anyhow;
use async_trait::async_trait;
use auto_impl::auto_impl;
use epoch_rewards_contracts::{IDistributor, IGovernor};

use crate::{
    config::GovernanceConfig,
    errors::DistributionError,
    merkle::MerkleArtifact,
    retry::RetryPolicy,
    store::ContentStore,
    DistributionKind,
};

/// Stages of a publication, in order. There are no back edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishStage {
    ComputeContent,
    UploadToStore,
    EncodeCall,
    SubmitProposal,
    AwaitConfirmation,
    Done,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ComputeContent => "COMPUTE_CONTENT",
            Self::UploadToStore => "UPLOAD_TO_STORE",
            Self::EncodeCall => "ENCODE_CALL",
            Self::SubmitProposal => "SUBMIT_PROPOSAL",
            Self::AwaitConfirmation => "AWAIT_CONFIRMATION",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Which distributor the proposal targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishTarget {
    pub kind: DistributionKind,
    pub distributor: Address,
}

/// Arguments of `proposeCustom`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub targets: Vec<Address>,
    pub values: Vec<U256>,
    pub calldatas: Vec<Bytes>,
    pub description: String,
    pub voting_delay: U256,
    pub voting_period: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Governance contract access.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait Governance: Send + Sync {
    /// Broadcasts `proposeCustom` and returns the transaction hash.
    async fn submit(&self, proposal: &Proposal) -> Result<B256, DistributionError>;

    /// Waits for `tx_hash` to be mined.
    async fn await_receipt(&self, tx_hash: B256) -> Result<ProposalReceipt, DistributionError>;
}

/// [`Governance`] over an alloy [`Provider`] with a wallet attached.
#[derive(Clone, Debug)]
pub struct GovernanceClient<P> {
    provider: P,
    governor: Address,
}

impl<P> GovernanceClient<P> {
    pub fn new(provider: P, governor: Address) -> Self {
        Self { provider, governor }
    }
}

#[async_trait]
impl<P: Provider> Governance for GovernanceClient<P> {
    async fn submit(&self, proposal: &Proposal) -> Result<B256, DistributionError> {
        let governor = IGovernor::new(self.governor, &self.provider);
        let pending = governor
            .proposeCustom(
                proposal.targets.clone(),
                proposal.values.clone(),
                proposal.calldatas.clone(),
                proposal.description.clone(),
                proposal.voting_delay,
                proposal.voting_period,
            )
            .send()
            .await
            .map_err(|e| DistributionError::SubmissionOutcomeUnknown {
                tx_hash: None,
                source: e.into(),
            })?;
        Ok(*pending.tx_hash())
    }

    async fn await_receipt(&self, tx_hash: B256) -> Result<ProposalReceipt, DistributionError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await
            .map_err(|e| DistributionError::SubmissionOutcomeUnknown {
                tx_hash: Some(tx_hash),
                source: e.into(),
            })?;
        if !receipt.status() {
            return Err(DistributionError::SubmissionOutcomeUnknown {
                tx_hash: Some(tx_hash),
                source: anyhow!("proposal transaction reverted"),
            });
        }
        Ok(ProposalReceipt { tx_hash, block_number: receipt.block_number })
    }
}

/// ABI-encoded `createEpoch(merkleRoot, contentHash)`.
pub fn encode_create_epoch(merkle_root: B256, content_hash: &str) -> Bytes {
    IDistributor::createEpochCall { merkleRoot: merkle_root, ipfsHash: content_hash.to_string() }
        .abi_encode()
        .into()
}

/// Result of a completed publication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOutcome {
    pub content_hash: String,
    pub calldata: Bytes,
    pub receipt: ProposalReceipt,
}

/// Runs the publication stages for one artifact.
pub struct DistributionPublisher<S, G> {
    store: S,
    mirror: Option<Arc<dyn ContentStore>>,
    governance: G,
    config: GovernanceConfig,
    retry: RetryPolicy,
}

impl<S: ContentStore, G: Governance> DistributionPublisher<S, G> {
    pub fn new(store: S, governance: G, config: GovernanceConfig, retry: RetryPolicy) -> Self {
        Self { store, mirror: None, governance, config, retry }
    }

    pub fn with_mirror(self, mirror: Arc<dyn ContentStore>) -> Self {
        Self { mirror: Some(mirror), ..self }
    }

    fn description(&self, target: PublishTarget, artifact: &MerkleArtifact) -> String {
        self.config
            .description
            .replace("{kind}", &target.kind.to_string())
            .replace("{epoch}", &artifact.epoch)
    }

    pub fn proposal(&self, target: PublishTarget, artifact: &MerkleArtifact, calldata: Bytes) -> Proposal {
        Proposal {
            targets: vec![target.distributor],
            values: vec![U256::ZERO],
            calldatas: vec![calldata],
            description: self.description(target, artifact),
            voting_delay: U256::from(self.config.voting_delay),
            voting_period: U256::from(self.config.voting_period),
        }
    }

    async fn upload(&self, name: &str, content: &[u8]) -> Result<String, DistributionError> {
        let content_hash = self
            .retry
            .run("content upload", || async {
                self.store.upload(name, content).await.map_err(DistributionError::from)
            })
            .await?;

        if let Some(mirror) = &self.mirror {
            if let Err(err) = mirror.upload(name, content).await {
                tracing::warn!("Mirror upload of {name} failed, continuing: {err}");
            }
        }
        Ok(content_hash)
    }

    /// Uploads `artifact` and proposes it to governance, returning once the proposal
    /// transaction is mined.
    ///
    /// Failures after the proposal was broadcast are `SubmissionOutcomeUnknown`; the
    /// proposal may exist and must be checked before retrying.
    pub async fn publish(
        &self,
        target: PublishTarget,
        artifact: &MerkleArtifact,
    ) -> Result<PublishOutcome, DistributionError> {
        let name = format!("{}.json", artifact.name);

        tracing::info!(stage = %PublishStage::ComputeContent, "Serializing {name}");
        let content = artifact.to_json()?;

        tracing::info!(stage = %PublishStage::UploadToStore, "Uploading {} bytes", content.len());
        let content_hash = self.upload(&name, &content).await?;
        tracing::info!("Stored {name} as {content_hash}");

        tracing::info!(stage = %PublishStage::EncodeCall, "createEpoch on {}", target.distributor);
        let calldata = encode_create_epoch(artifact.merkle_tree_root, &content_hash);

        let proposal = self.proposal(target, artifact, calldata.clone());
        tracing::info!(stage = %PublishStage::SubmitProposal, "{}", proposal.description);
        let tx_hash = self.governance.submit(&proposal).await?;

        tracing::info!(stage = %PublishStage::AwaitConfirmation, "Waiting for {tx_hash}");
        let receipt = self.governance.await_receipt(tx_hash).await?;

        tracing::info!(stage = %PublishStage::Done, "Proposal mined in block {:?}", receipt.block_number);
        Ok(PublishOutcome { content_hash, calldata, receipt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        merkle::MerkleContentBuilder,
        snapshots::EpochSnapshots,
        store::StorageError,
        test_utils::{MemoryStore, RecordingGovernance},
        RecipientAllocation,
    };
    use alloy::primitives::{address, hex};
    use tracing_test::traced_test;

    const DISTRIBUTOR: Address = address!("00000000000000000000000000000000000000d1");

    struct FailingStore;

    #[async_trait]
    impl ContentStore for FailingStore {
        async fn upload(&self, _name: &str, _content: &[u8]) -> Result<String, StorageError> {
            Err(StorageError::MissingConfig("mirror offline"))
        }
    }

    fn artifact() -> MerkleArtifact {
        let snapshots = EpochSnapshots { epoch: U256::from(5), blocks: [1, 2, 3, 4, 5, 6, 7] };
        let recipients = vec![RecipientAllocation {
            address: address!("0000000000000000000000000000000000000011"),
            amount: U256::from(100),
        }];
        MerkleContentBuilder::build("lp-epoch-5", &snapshots, &recipients).unwrap()
    }

    fn target() -> PublishTarget {
        PublishTarget { kind: DistributionKind::Lp, distributor: DISTRIBUTOR }
    }

    #[test]
    fn create_epoch_encoding() {
        let root = B256::repeat_byte(0x11);
        let calldata = encode_create_epoch(root, "bafy");
        let decoded = IDistributor::createEpochCall::abi_decode(&calldata).unwrap();
        assert_eq!(decoded.merkleRoot, root);
        assert_eq!(decoded.ipfsHash, "bafy");
        assert_eq!(&calldata[..4], IDistributor::createEpochCall::SELECTOR.as_slice());
        assert_eq!(hex::encode(&calldata[4..36]), "11".repeat(32));
    }

    #[tokio::test]
    async fn publishes_through_every_stage() {
        let store = MemoryStore::new("bafy-cid");
        let governance = RecordingGovernance::default();
        let publisher = DistributionPublisher::new(
            &store,
            &governance,
            GovernanceConfig::default(),
            RetryPolicy::NONE,
        );

        let artifact = artifact();
        let outcome = publisher.publish(target(), &artifact).await.unwrap();

        assert_eq!(outcome.content_hash, "bafy-cid");
        assert_eq!(store.uploads(), vec![("lp-epoch-5.json".to_string(), artifact.to_json().unwrap())]);

        let proposals = governance.proposals();
        assert_eq!(proposals.len(), 1);
        let proposal = &proposals[0];
        assert_eq!(proposal.targets, vec![DISTRIBUTOR]);
        assert_eq!(proposal.values, vec![U256::ZERO]);
        assert_eq!(proposal.calldatas, vec![encode_create_epoch(artifact.merkle_tree_root, "bafy-cid")]);
        assert_eq!(proposal.description, "Create LP reward epoch 5");
        assert_eq!(proposal.voting_period, U256::from(50_400));
        assert_eq!(outcome.receipt.tx_hash, governance.tx_hash());
    }

    #[tokio::test]
    #[traced_test]
    async fn mirror_failure_is_not_fatal() {
        let store = MemoryStore::new("bafy-cid");
        let governance = RecordingGovernance::default();
        let publisher =
            DistributionPublisher::new(&store, &governance, GovernanceConfig::default(), RetryPolicy::NONE)
                .with_mirror(Arc::new(FailingStore));

        publisher.publish(target(), &artifact()).await.unwrap();
        assert!(logs_contain("Mirror upload of lp-epoch-5.json failed"));
        assert_eq!(governance.proposals().len(), 1);
    }

    #[tokio::test]
    async fn primary_store_failure_stops_before_submission() {
        let governance = RecordingGovernance::default();
        let publisher = DistributionPublisher::new(
            FailingStore,
            &governance,
            GovernanceConfig::default(),
            RetryPolicy::NONE,
        );

        let err = publisher.publish(target(), &artifact()).await.unwrap_err();
        assert!(matches!(err, DistributionError::Storage(_)));
        assert!(governance.proposals().is_empty());
    }

    #[tokio::test]
    async fn only_server_side_upload_failures_are_retried() {
        use crate::store::PinataStore;
        use httpmock::prelude::*;
        use std::time::Duration;

        let retry = RetryPolicy { retries: 3, delay: Duration::from_millis(1) };
        for (status, attempts) in [(401, 1), (503, 4)] {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(POST).path("/v3/files");
                then.status(status);
            });
            let store = PinataStore::new("jwt".into(), server.base_url().parse().unwrap());
            let governance = RecordingGovernance::default();
            let publisher =
                DistributionPublisher::new(store, &governance, GovernanceConfig::default(), retry);

            let err = publisher.publish(target(), &artifact()).await.unwrap_err();
            mock.assert_hits(attempts);
            if status == 401 {
                assert!(matches!(err, DistributionError::Storage(_)));
            } else {
                assert!(matches!(err, DistributionError::RetriesExhausted { attempts: 4, .. }));
            }
            assert!(governance.proposals().is_empty());
        }
    }

    #[tokio::test]
    async fn unconfirmed_submission_reports_tx_hash() {
        let store = MemoryStore::new("bafy-cid");
        let governance = RecordingGovernance::default();
        governance.fail_receipts();
        let publisher =
            DistributionPublisher::new(&store, &governance, GovernanceConfig::default(), RetryPolicy::NONE);

        let err = publisher.publish(target(), &artifact()).await.unwrap_err();
        match err {
            DistributionError::SubmissionOutcomeUnknown { tx_hash, .. } => {
                assert_eq!(tx_hash, Some(governance.tx_hash()))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
