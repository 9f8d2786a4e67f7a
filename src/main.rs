use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "alphabet-extractor-rust",
    version,
    about = "Extract annotated letters from an image into a zip archive"
)]
struct Cli {
    /// Run the HTTP extraction service
    #[arg(long = "server")]
    server: bool,

    /// Listen address for --server (overrides settings [server] addr)
    #[arg(long = "addr")]
    addr: Option<String>,

    /// Source image to extract letters from
    #[arg(short = 'i', long = "image")]
    image: Option<PathBuf>,

    /// JSON batch descriptor (canvas size, letters, metadata)
    #[arg(short = 'r', long = "regions")]
    regions: Option<PathBuf>,

    /// Output archive path or directory (default: ./<batch name>.zip)
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 's', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    alphabet_extractor_rust::logging::init(cli.verbose)?;
    let settings =
        alphabet_extractor_rust::settings::load_settings(cli.read_settings.as_deref().map(Path::new))?;

    if cli.server {
        let addr = cli.addr.unwrap_or_else(|| settings.server_addr.clone());
        return alphabet_extractor_rust::server::run_server(settings, addr).await;
    }

    let (Some(image), Some(regions)) = (cli.image, cli.regions) else {
        return Err(anyhow!(
            "--image and --regions are required unless --server is given"
        ));
    };
    let config = alphabet_extractor_rust::Config {
        image,
        regions,
        out: cli.out,
    };
    let path = tokio::task::spawn_blocking(move || {
        alphabet_extractor_rust::run(&config, &settings)
    })
    .await??;

    println!("{}", path.display());
    Ok(())
}
