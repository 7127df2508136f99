use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    sessioncap_cli::cli::run().await
}
