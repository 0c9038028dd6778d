use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use leancanvas::channels::repl::run_repl;
use leancanvas::channels::web::{BffState, start_server};
use leancanvas::cli::{Cli, Command, run_doctor_command};
use leancanvas::config::Config;
use leancanvas::llm::{DifyClient, UpstreamGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    leancanvas::bootstrap::load_env();
    let cli = Cli::parse();
    let command = cli.resolved_command();

    // The wizard owns the terminal, so it only logs warnings by default.
    let default_filter = match command {
        Command::Serve { .. } => "leancanvas=info,tower_http=info",
        _ => "leancanvas=warn",
    };
    init_tracing(default_filter);

    match command {
        Command::Doctor { strict } => run_doctor_command(cli.config.as_deref(), strict).await,
        Command::Run { keyword } => {
            let config = Config::from_env_with_toml(cli.config.as_deref())?;
            let gateway = DifyClient::new(config.upstream.clone())?;
            run_repl(&gateway, config.workflow, keyword).await
        }
        Command::Serve { port } => {
            let mut config = Config::from_env_with_toml(cli.config.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if !config.upstream.has_api_key() {
        tracing::warn!("DIFY_API_KEY is not set; generation requests will fail");
    }

    let gateway: Arc<dyn UpstreamGateway> = Arc::new(DifyClient::new(config.upstream.clone())?);
    let state = Arc::new(BffState::new(
        gateway,
        config.workflow.timeout,
        config.server.body_limit_bytes,
    ));
    let addr = start_server(config.server.socket_addr()?, Arc::clone(&state)).await?;
    eprintln!("leancanvas BFF listening on http://{addr}");

    tokio::signal::ctrl_c().await?;
    tracing::info!("received ctrl-c");
    state.shutdown().await?;
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
