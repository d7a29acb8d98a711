use alternate::plugin::Handler;
use alternate::{Config, Fallback, Forwarder, ForwarderFactory, SharedConfig};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("alternate".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file)?;

    let primary = Arc::new(Forwarder::new(config.primary_upstream()));
    let rules = config.rule_table()?;
    tracing::info!("forwarding to {}", primary.upstream());
    tracing::info!("{} alternate rule(s) configured", rules.len());
    let chain = Arc::new(Fallback::new(
        primary.clone(),
        rules,
        Arc::new(ForwarderFactory),
    ));

    primary.on_startup().await?;
    chain.on_startup().await?;

    tracing::info!("DNS listening on UDP {}", &config.dns_udp_bind_addr);
    tracing::info!("DNS listening on TCP {}", &config.dns_tcp_bind_addr);
    let dns_server = alternate::dns::new(config.clone(), chain.clone()).await?;
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        Ok(dns_res) = dns_handle => {
            if let Err(err) = dns_res {
                return Err(alternate::error::Error::DNSError(err).into())
            }
        }
    }

    chain.on_shutdown().await?;
    primary.on_shutdown().await?;
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alternate=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)?;
            tracing::debug!("loaded config from {config_file}");
            Ok(Arc::new(config))
        }
    }
}
