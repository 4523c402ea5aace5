pub mod worker;

mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use roam_service::Providers;
use roam_storage::GeoIndexCache;

use crate::worker::WorkerState;

#[derive(Debug, Parser)]
#[command(
	version = roam_cli::VERSION,
	rename_all = "kebab",
	styles = roam_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = roam_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let store = roam_storage::open_store(&config.storage).await?;
	let providers = Providers::from_config(&config.upstream)?;
	let state = WorkerState {
		cache: GeoIndexCache::new(store, &config.cache),
		upstream: providers.upstream,
		cfg: config.worker,
	};
	let cancel = CancellationToken::new();

	tokio::spawn({
		let cancel = cancel.clone();

		async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::info!("Shutdown requested.");
			}

			cancel.cancel();
		}
	});

	worker::run_worker(state, cancel).await;

	Ok(())
}
