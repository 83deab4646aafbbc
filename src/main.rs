use anyhow::Context;
use clap::Parser;
use tracing::info;

use calcrelay::app;
use calcrelay::config::Config;
use calcrelay::logging;
use calcrelay::realtime::Relay;
use calcrelay::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(config.verbose, config.log_format)?;

    let relay = Relay::new(config.relay_settings());
    let hub = relay.spawn_hub();

    let server = Server::bind(&config.addr)
        .await
        .with_context(|| format!("cannot listen on {}", config.addr))?;
    info!(
        address = %server.local_addr(),
        queue_capacity = relay.settings().queue_capacity,
        backpressure = %relay.settings().backpressure,
        "starting calcrelay"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    server.run_until(app::build_router(&relay), shutdown).await?;

    relay.shutdown(hub).await;
    info!("calcrelay stopped");
    Ok(())
}
