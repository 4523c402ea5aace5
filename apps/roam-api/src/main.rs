use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = roam_api::Args::parse();

	roam_api::run(args).await
}
