use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    locode_cli::run().await
}
