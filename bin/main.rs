//! Dex CLI Entry Point
//!
//! This binary provides the command-line interface for Dex.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dex_interface::run_cli().await?;
    Ok(())
}
