use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = glance_api::Args::parse();
	glance_api::run(args).await
}
