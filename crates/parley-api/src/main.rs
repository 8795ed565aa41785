//! Parley CLI and REST API entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, resolves configuration, installs tracing, then
//! either serves the REST API or runs a terminal chat.

use clap::Parser;
use console::style;

use parley_api::cli::{self, Cli, Commands};
use parley_api::http::router::build_router;
use parley_api::state::AppState;
use parley_infra::config::{LoadedConfig, resolve_config};
use parley_observe::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let LoadedConfig {
        mut config,
        warnings,
    } = resolve_config(&cli.config).await?;

    if let Commands::Config = cli.command {
        for warning in &warnings {
            eprintln!("  {} {warning}", style("!").yellow().bold());
        }
        return cli::config::show_config(&config, cli.json);
    }

    if let Commands::Serve { port, host } = &cli.command {
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(host) = host {
            config.server.host = host.clone();
        }
    }

    init_tracing(&config.log, cli.log_filter())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    let state = AppState::init(config)?;
    let result = match cli.command {
        Commands::Serve { .. } => serve(state, cli.quiet).await,
        Commands::Chat => cli::chat::run_chat_loop(&state).await,
        Commands::Config => Ok(()),
    };

    shutdown_tracing();
    result
}

async fn serve(state: AppState, quiet: bool) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let sweeper = state.sweeper().spawn(state.shutdown.child_token());

    if !quiet {
        println!(
            "  {} Parley API listening on {}",
            style("⚡").bold(),
            style(format!("http://{addr}")).cyan()
        );
        println!("  {}", style("Press Ctrl+C to stop").dim());
    }
    tracing::info!(
        %addr,
        provider = state.conversation.provider_name(),
        model = %state.config.model,
        environment = %state.config.server.environment,
        "Server started"
    );

    let shutdown = state.shutdown.clone();
    let router = build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "expiry sweeper task failed");
    }

    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
