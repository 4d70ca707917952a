use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url_load_tester::{CliArgs, load_test_url};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the report on stdout stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let args = CliArgs::parse_normalized();
    let json = args.json;

    let Some(config) = args.into_config()? else {
        println!("A target URL is required. Pass it with -url <URL>.");
        return Ok(());
    };

    if !json {
        println!(
            "Starting load test on {} with {} requests and {} concurrent workers.",
            config.url, config.total_requests, config.concurrency
        );
    }
    info!(?config, "Configuration loaded");

    let report = load_test_url(&config).await?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!();
        print!("{}", report);
    }

    Ok(())
}
