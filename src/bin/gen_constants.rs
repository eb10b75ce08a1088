use anyhow::Context;
use bundle_fixtures::aggregator::{account_bundles, aggregate};
use bundle_fixtures::config::Config;
use bundle_fixtures::constants::{render, AccountBundles, Constants, TransferBundle};
use bundle_fixtures::derivation::AddressDeriver;
use bundle_fixtures::node::HttpNode;
use bundle_fixtures::reconciler::find_bundle;
use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,
}

#[tokio::main]
async fn main() {
    let result = _main().await;
    result.unwrap();
}

async fn _main() -> anyhow::Result<()> {
    // Start logging setup block
    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry().with(fmt_layer).init();

    let Cli { config_path } = Cli::parse();

    tracing::info!("Config file {:?}", config_path);
    let config = Config::load(&config_path)?;

    let deriver: Arc<dyn AddressDeriver> = Arc::new(config.address_book());
    let node = HttpNode::new(
        config.endpoint.clone(),
        config.timeout(),
        deriver.clone(),
        config.security,
    )
    .with_context(|| format!("Cannot set up client for {}", config.endpoint))?;

    let mut snapshots = Vec::with_capacity(config.accounts.len());
    for (index, account) in config.accounts.iter().enumerate() {
        let snapshot = aggregate(&node, &account.seed, account.horizon)
            .await
            .with_context(|| format!("Cannot fetch account {}", index + 1))?;
        snapshots.push(snapshot);
    }

    let mut transfers = Vec::with_capacity(config.transfers.len());
    for transfer in config.transfers.iter() {
        let bundle = find_bundle(&node, &transfer.seed, &transfer.destination, transfer.value)
            .await
            .with_context(|| {
                format!(
                    "Could not find bundle for trx {} ({}i)",
                    transfer.destination, transfer.value
                )
            })?;
        tracing::info!("{}: bundle {}", transfer.label, bundle.hash());
        transfers.push(TransferBundle {
            label: transfer.label.clone(),
            bundle,
        });
    }

    let mut listings = Vec::with_capacity(config.account_bundles.len());
    for number in config.account_bundles.iter().copied() {
        let account = &config.accounts[number - 1];
        let bundles = account_bundles(&node, &account.seed, account.horizon)
            .await
            .with_context(|| format!("Cannot list bundles of account {}", number))?;
        listings.push(AccountBundles {
            account: number,
            bundles,
        });
    }

    let header = render(
        &Constants {
            accounts: &snapshots,
            transfers: &transfers,
            account_bundles: &listings,
            pow_level: config.pow_level,
        },
        deriver.as_ref(),
    )?;

    let mut output = File::create(&config.output_path).with_context(|| {
        format!(
            "Cannot create output file {path}",
            path = config.output_path.display()
        )
    })?;
    output.write_all(header.as_bytes())?;
    tracing::info!("constants written to {:?}", config.output_path);

    Ok(())
}
