//! # Host Bridge - Entry Point
//! src/main.rs
//!
//! Arranca el servidor HTTP en threads propios y deja el main thread al
//! host: aquí corre el main loop que conduce al pump. `POST
//! /system/shutdown` lo detiene.

use std::process::ExitCode;

use host_bridge::app;
use host_bridge::config::Config;
use host_bridge::host::{Host, SimulatedHost};
use host_bridge::logging;
use tracing::{error, info};

fn main() -> ExitCode {
    let config = Config::new();

    let level = logging::parse_level(&config.log_level).unwrap_or_else(|_| "info".to_string());
    logging::init(&level);

    if let Err(err) = config.validate() {
        error!(error = %err, "invalid configuration");
        return ExitCode::FAILURE;
    }
    config.log_summary();

    // El host se crea en este thread y nunca sale de él
    let mut host = SimulatedHost::new();
    info!(host = host.name(), capabilities = ?host.capabilities(), "host ready");

    let app = match app::assemble(&config, &host) {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "route registration failed");
            return ExitCode::FAILURE;
        }
    };

    match app.spawn_server(&config) {
        Ok((addr, _server)) => info!(%addr, "bridge ready"),
        Err(err) => {
            error!(address = %config.address(), error = %err, "could not bind");
            return ExitCode::FAILURE;
        }
    }

    let summary = app.into_main_loop(&config).run(&mut host);
    info!(
        ticks = summary.ticks,
        completed = summary.completed,
        failed = summary.failed,
        orphaned = summary.orphaned,
        flushed = summary.flushed,
        "shutdown complete"
    );

    ExitCode::SUCCESS
}
