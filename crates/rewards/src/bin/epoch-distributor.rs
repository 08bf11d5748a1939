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

use std::{path::PathBuf, sync::Arc};

use alloy::{providers::ProviderBuilder, signers::local::PrivateKeySigner};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use epoch_rewards::{
    config::ContentStoreConfig,
    merkle::MerkleArtifact,
    notify::LogNotifier,
    pipeline::{compute_lp_artifact, compute_staking_artifact, publish_and_notify},
    store::{HttpMirror, PinataStore},
    ChainStorageReader, DistributionKind, DistributionPublisher, DistributorConfig, EpochSelector,
    EpochSnapshotResolver, GovernanceClient, LpDistributionCalculator, PublishTarget,
    RpcChestPower, RpcSnapshotSource, RpcStorageReader, StakingDistributionCalculator,
    SubgraphClient,
};
use url::Url;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// Path to the distributor TOML config.
    #[clap(short, long, env = "DISTRIBUTOR_CONFIG", default_value = "distributor.toml")]
    config: PathBuf,
    /// URL of the Ethereum RPC endpoint. Overrides `rpc.url`.
    #[clap(short, long, env)]
    rpc_url: Option<Url>,
    /// Private key used to sign the governance proposal. Required with `--publish`.
    #[clap(long, env)]
    private_key: Option<PrivateKeySigner>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the snapshot blocks of an epoch.
    Snapshots {
        #[clap(long, value_enum)]
        kind: DistributionKind,
        /// Epoch number, or `current`.
        #[clap(long, default_value = "current")]
        epoch: EpochSelector,
    },
    /// Compute the LP distribution of an epoch.
    Lp(RunArgs),
    /// Compute the staking distribution of an epoch.
    Staking(RunArgs),
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Epoch number, or `current`.
    #[clap(long, default_value = "current")]
    epoch: EpochSelector,
    /// Write the artifact JSON to this file instead of stdout.
    #[clap(long)]
    out: Option<PathBuf>,
    /// Upload the artifact and submit the governance proposal.
    #[clap(long)]
    publish: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }

    let args = MainArgs::parse();
    run(&args).await
}

async fn run(args: &MainArgs) -> Result<()> {
    let mut config = DistributorConfig::load(&args.config).await?;
    if let Some(url) = &args.rpc_url {
        config.rpc.url = url.clone();
    }

    let provider = ProviderBuilder::new().connect_http(config.rpc.url.clone());
    let resolver = EpochSnapshotResolver::new(
        RpcSnapshotSource::new(provider.clone()),
        config.contracts.lp_distributor,
        config.contracts.staking_distributor,
        config.rpc.retry,
    );
    let chain = ChainStorageReader::new(
        RpcStorageReader::new(provider.clone()),
        config.storage_layout.clone(),
        config.rpc.retry,
    );

    match &args.command {
        Command::Snapshots { kind, epoch } => {
            let epoch = resolver.resolve(*kind, *epoch).await?;
            let snapshots = resolver.get_epoch_snapshots(*kind, epoch).await?;
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        }
        Command::Lp(run_args) => {
            let subgraph = SubgraphClient::new(config.subgraph.url.clone(), config.subgraph.retry);
            let calculator = LpDistributionCalculator::new(subgraph, chain, config.lp.nested.clone());
            let artifact = compute_lp_artifact(
                &resolver,
                &calculator,
                run_args.epoch,
                config.lp.allocation_weight_bps,
            )
            .await
            .context("Failed to compute LP distribution")?;
            finish(args, &config, run_args, DistributionKind::Lp, &artifact).await?;
        }
        Command::Staking(run_args) => {
            let calculator = StakingDistributionCalculator::new(
                chain,
                RpcChestPower::new(provider.clone()),
                config.contracts.chest,
                config.rpc.retry,
            );
            let artifact = compute_staking_artifact(&resolver, &calculator, run_args.epoch)
                .await
                .context("Failed to compute staking distribution")?;
            finish(args, &config, run_args, DistributionKind::Staking, &artifact).await?;
        }
    }

    Ok(())
}

fn pinata_store(config: &ContentStoreConfig) -> Result<PinataStore> {
    match &config.pinata_jwt {
        Some(jwt) => {
            let api_url = match &config.pinata_api_url {
                Some(url) => url.clone(),
                None => PinataStore::default_api_url()?,
            };
            Ok(PinataStore::new(jwt.clone(), api_url))
        }
        None => PinataStore::from_env().context("Pinata JWT not configured"),
    }
}

async fn finish(
    args: &MainArgs,
    config: &DistributorConfig,
    run_args: &RunArgs,
    kind: DistributionKind,
    artifact: &MerkleArtifact,
) -> Result<()> {
    match &run_args.out {
        Some(path) => {
            tokio::fs::write(path, artifact.to_json()?)
                .await
                .with_context(|| format!("Failed to write artifact to {path:?}"))?;
            tracing::info!("Wrote {} to {path:?}", artifact.name);
        }
        None => println!("{}", serde_json::to_string_pretty(artifact)?),
    }

    if !run_args.publish {
        return Ok(());
    }

    let Some(signer) = args.private_key.clone() else {
        bail!("--private-key is required with --publish");
    };
    let wallet_provider = ProviderBuilder::new().wallet(signer).connect_http(config.rpc.url.clone());

    let governance = GovernanceClient::new(wallet_provider, config.contracts.governor);
    let mut publisher = DistributionPublisher::new(
        pinata_store(&config.content_store)?,
        governance,
        config.governance.clone(),
        config.content_store.retry,
    );
    if let Some(url) = &config.content_store.mirror_url {
        publisher = publisher.with_mirror(Arc::new(HttpMirror::new(url.clone())));
    }

    let distributor = match kind {
        DistributionKind::Lp => config.contracts.lp_distributor,
        DistributionKind::Staking => config.contracts.staking_distributor,
    };
    let outcome = publish_and_notify(
        &publisher,
        PublishTarget { kind, distributor },
        artifact,
        &LogNotifier,
        &config.notify.recipients,
    )
    .await?;

    tracing::info!(
        "Proposed {} (content {}) in tx {}",
        artifact.name,
        outcome.content_hash,
        outcome.receipt.tx_hash
    );
    Ok(())
}
