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

//! End-to-end runs: epoch resolution, allocation, artifact construction and publication.

use alloy::primitives::U256;

use crate::{
    chain::StorageReader,
    errors::DistributionError,
    lp::LpDistributionCalculator,
    merkle::{MerkleArtifact, MerkleContentBuilder},
    notify::{notify_all, Notifier},
    publisher::{DistributionPublisher, Governance, PublishOutcome, PublishTarget},
    snapshots::{EpochSelector, EpochSnapshotResolver, SnapshotSource},
    staking::{ChestPowerSource, StakingDistributionCalculator},
    store::ContentStore,
    subgraph::ShareSource,
    DistributionKind,
};

/// Name of the artifact for `kind` and `epoch`, e.g. `lp-epoch-12`.
pub fn artifact_name(kind: DistributionKind, epoch: U256) -> String {
    match kind {
        DistributionKind::Lp => format!("lp-epoch-{epoch}"),
        DistributionKind::Staking => format!("staking-epoch-{epoch}"),
    }
}

pub async fn compute_lp_artifact<Q, S, R>(
    resolver: &EpochSnapshotResolver<Q>,
    calculator: &LpDistributionCalculator<S, R>,
    selector: EpochSelector,
    allocation_weight_bps: u32,
) -> Result<MerkleArtifact, DistributionError>
where
    Q: SnapshotSource,
    S: ShareSource,
    R: StorageReader,
{
    let epoch = resolver.resolve(DistributionKind::Lp, selector).await?;
    let snapshots = resolver.get_epoch_snapshots(DistributionKind::Lp, epoch).await?;

    let total = calculator.epoch_allocation(&snapshots, allocation_weight_bps).await?;
    tracing::info!("LP epoch {epoch}: allocating {total}");

    let recipients = calculator.compute(&snapshots, total).await?;
    tracing::info!("LP epoch {epoch}: {} recipients", recipients.len());
    MerkleContentBuilder::build(&artifact_name(DistributionKind::Lp, epoch), &snapshots, &recipients)
}

pub async fn compute_staking_artifact<Q, R, C>(
    resolver: &EpochSnapshotResolver<Q>,
    calculator: &StakingDistributionCalculator<R, C>,
    selector: EpochSelector,
) -> Result<MerkleArtifact, DistributionError>
where
    Q: SnapshotSource,
    R: StorageReader,
    C: ChestPowerSource,
{
    let epoch = resolver.resolve(DistributionKind::Staking, selector).await?;
    let snapshots = resolver.get_epoch_snapshots(DistributionKind::Staking, epoch).await?;

    let recipients = calculator.compute(&snapshots).await?;
    tracing::info!("Staking epoch {epoch}: {} recipients", recipients.len());
    MerkleContentBuilder::build(
        &artifact_name(DistributionKind::Staking, epoch),
        &snapshots,
        &recipients,
    )
}

/// Publishes `artifact` and reports the result to `recipients`.
pub async fn publish_and_notify<S, G>(
    publisher: &DistributionPublisher<S, G>,
    target: PublishTarget,
    artifact: &MerkleArtifact,
    notifier: &dyn Notifier,
    recipients: &[String],
) -> Result<PublishOutcome, DistributionError>
where
    S: ContentStore,
    G: Governance,
{
    let result = publisher.publish(target, artifact).await;
    let (subject, body) = match &result {
        Ok(outcome) => (
            format!("{} published", artifact.name),
            format!(
                "root {} stored as {}, proposal tx {}",
                artifact.merkle_tree_root, outcome.content_hash, outcome.receipt.tx_hash
            ),
        ),
        Err(err) => (format!("{} failed", artifact.name), format!("{err:?}")),
    };
    notify_all(notifier, recipients, &subject, &body).await;
    result
}
