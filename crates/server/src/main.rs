use anyhow::Context;

use restkit_server::{ServerConfig, demo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    restkit_observability::init();

    let config = ServerConfig::from_env().context("invalid RESTKIT_* configuration")?;
    let host = std::env::var("RESTKIT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = match std::env::var("RESTKIT_PORT") {
        Ok(port) => port.parse().context("RESTKIT_PORT must be a port number")?,
        Err(_) => 5001,
    };

    let simple = std::env::args().nth(1).as_deref() == Some("simple");
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    if simple {
        demo::simple_server(config)?.serve(listener).await?;
    } else {
        demo::advanced_server(config)?.serve(listener).await?;
    }
    Ok(())
}
