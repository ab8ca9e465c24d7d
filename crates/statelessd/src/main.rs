//! statelessd - stateless Inform controller, one shared network config
//! for every adopted AP.

use clap::Parser;
use gofi_net::{Manager, RusshAdopt, Server, SharedConfig};
use statelessd::config::Config;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("statelessd=info".parse().unwrap()))
        .init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let controller_host = match &config.addr {
        Some(addr) => addr.clone(),
        None => match local_ip_address::local_ip() {
            Ok(ip) => ip.to_string(),
            Err(e) => {
                error!("failed to autodetect local address: {e}");
                return ExitCode::FAILURE;
            }
        },
    };
    info!("controller will run on {controller_host}");

    let manager = Arc::new(Manager::new(
        controller_host,
        format!(":{}", config.listener.port()),
        Arc::new(RusshAdopt::new()),
        Arc::new(SharedConfig(config.network_config())),
    ));

    let eviction_handle = spawn_stale_adopting_eviction(manager.clone());

    let server = Arc::new(Server::new(manager, config.listener));
    tokio::spawn({
        let server = server.clone();
        async move {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal");
            server.close();
        }
    });

    if let Err(e) = server.run().await {
        error!("server error: {e}");
        eviction_handle.abort();
        return ExitCode::FAILURE;
    }

    eviction_handle.abort();
    ExitCode::SUCCESS
}

fn spawn_stale_adopting_eviction(manager: Arc<Manager>) -> tokio::task::JoinHandle<()> {
    const MAX_ADOPTING_AGE: Duration = Duration::from_secs(5 * 60);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            manager.evict_stale_adopting(MAX_ADOPTING_AGE);
        }
    })
}
