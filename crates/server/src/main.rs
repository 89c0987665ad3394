//! titlecat server binary.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let config = ServerConfig::load()?;
    server::start_server(config).await?;

    Ok(())
}
