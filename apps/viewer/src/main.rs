use anyhow::{Context, Result};
use stock::{ChartSize, PriceClient};
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewer::{
    MenuLoop, browser::SystemBrowser, config::Config, render::BrowserRenderer, terminal::Terminal,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    info!(version = %config.version, "starting stock viewer");

    let price_client = PriceClient::from_env().context("init price client failed")?;
    let renderer = BrowserRenderer::new(
        config.chart_output.clone(),
        ChartSize::default(),
        config.open_chart,
        SystemBrowser,
    );

    let mut menu = MenuLoop::new(
        price_client,
        renderer,
        SystemBrowser,
        Terminal::stdio(),
        config,
    );
    let finish = menu.run().await?;

    info!(?finish, "Shutdown complete.");
    Ok(())
}
