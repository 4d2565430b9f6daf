use clap::Parser;
use pagepilot::page::html::parse_page;
use pagepilot::{AgentConfig, CaptureSession};
use std::path::PathBuf;
use tracing::info;

/// Scan a saved page and print its labeled interactive elements.
#[derive(Parser)]
#[command(name = "pagepilot")]
struct Cli {
    /// HTML file to scan.
    html: PathBuf,
    /// URL the page is treated as loaded from.
    #[arg(long, default_value = "https://example.com/")]
    url: String,
    /// Print the full semantic descriptor for each labeled hint.
    #[arg(long)]
    describe: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = AgentConfig::default();
    let html = std::fs::read_to_string(&cli.html)?;
    let mut page = parse_page(&cli.url, &html);

    let session = CaptureSession::begin(&mut page, &config.detection);
    info!(hints = session.markers().len(), "detection pass complete");

    if cli.describe {
        let described = session.enrich(&page, &config.enrichment);
        println!("{}", serde_json::to_string_pretty(&described)?);
    } else {
        for marker in session.markers() {
            let rect = marker.hint.rect;
            println!(
                "{:>4}  {:<10} at ({:.0}, {:.0}) {:.0}x{:.0}",
                marker.label,
                page.tag(marker.hint.element),
                rect.x,
                rect.y,
                rect.width,
                rect.height
            );
        }
    }
    Ok(())
}
