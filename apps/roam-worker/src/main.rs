use clap::Parser;

use roam_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	roam_worker::run(Args::parse()).await
}
