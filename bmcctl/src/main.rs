use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = bmcctl::Cli::parse();
    if let Err(err) = bmcctl::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
