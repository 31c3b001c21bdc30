//! hairmatte CLI
//!
//! Command-line interface for hair-preserving background removal.

#[cfg(feature = "cli")]
use hairmatte::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
