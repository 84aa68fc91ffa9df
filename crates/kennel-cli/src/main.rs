//! `kennel-cli` – Kennel Edge Controller binary
//!
//! This binary is the primary entry point ("leash") for the kennel stack.
//! It:
//!
//! 1. Loads `~/.kennel/config.toml` (writing defaults on first run) and
//!    applies `KENNEL_*` environment overrides.
//! 2. Initialises structured logging and optional OTLP trace export.
//! 3. Probes the configured vision service and reports whether it is online.
//! 4. Binds the WebSocket gateway, starts the edge controller, and
//!    intercepts **Ctrl-C** for a graceful drain.

mod config;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info};

use kennel_middleware::{LocalBus, Transport, WsBridge};
use kennel_perception::{GestureClassifier, HttpClassifier, ScriptedClassifier};
use kennel_runtime::{EdgeService, telemetry};
use kennel_types::EdgeError;

use crate::config::ClassifierMode;

fn main() -> ExitCode {
    let (cfg, config_note) = load_or_init_config();

    // ── Structured logging ────────────────────────────────────────────────
    // Tracing must come up before the Tokio runtime is built: the OTLP
    // exporter is synchronous and must not be created inside the runtime.
    // The CLI's user-facing output still uses println! for UX consistency.
    let _telemetry = telemetry::init_tracing(
        "kennel-edge",
        cfg.log_format == config::LogFormat::Json,
        (!cfg.otlp_endpoint.is_empty()).then_some(cfg.otlp_endpoint.as_str()),
    );

    print_banner();
    println!("{config_note}");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build the Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "edge controller failed");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller wiring
// ─────────────────────────────────────────────────────────────────────────────

async fn run(cfg: config::Config) -> Result<(), EdgeError> {
    // ── Classifier ────────────────────────────────────────────────────────
    let classifier: Arc<dyn GestureClassifier> = match cfg.classifier_mode {
        ClassifierMode::Remote => {
            let mut remote = HttpClassifier::new(cfg.classifier_url.clone());
            if !cfg.classifier_auth_token.is_empty() {
                remote = remote.with_auth_token(cfg.classifier_auth_token.clone());
            }

            print!(
                "\n  Probing the vision service at {} … ",
                cfg.classifier_url.dimmed()
            );
            match remote.probe().await {
                Ok(()) => println!("{}", "online".green()),
                Err(_) => {
                    println!("{}", "offline".yellow());
                    println!(
                        "  {}  Robot uploads will be dropped until it responds.",
                        "No vision service detected.".dimmed()
                    );
                }
            }
            Arc::new(remote)
        }
        ClassifierMode::Scripted => {
            println!(
                "\n  {}  Scripted classifier selected – canned gestures, no vision service.",
                "⚠".yellow()
            );
            Arc::new(ScriptedClassifier::smoke_test())
        }
    };

    // ── Bus, gateway, and controller ──────────────────────────────────────
    let bus = Arc::new(LocalBus::default());
    let gateway = WsBridge::new(
        Arc::clone(&bus),
        cfg.upload_topic.clone(),
        cfg.control_topic.clone(),
    );

    let addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .map_err(|e| EdgeError::Channel(format!("invalid listen_addr {}: {e}", cfg.listen_addr)))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EdgeError::Channel(format!("ws bind error on {addr}: {e}")))?;
    info!(addr = %addr, "websocket gateway bound");

    let service = EdgeService::new(
        Arc::clone(&bus) as Arc<dyn Transport>,
        classifier,
        cfg.edge_config(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut gateway_task = tokio::spawn(gateway.serve(listener));
    let service_task = tokio::spawn(service.run(shutdown_rx));

    println!();
    println!(
        "  {} Gateway listening on {}",
        "✓".green().bold(),
        cfg.listen_addr.bold()
    );
    println!(
        "  {} Edge controller running (fail-safe window: {} × {} ms)",
        "✓".green().bold(),
        cfg.watchdog_window_ticks,
        cfg.watchdog_tick_ms
    );
    println!("  Press {} to stop.\n", "Ctrl-C".bold().cyan());

    // ── Supervise until Ctrl-C or a gateway fault ─────────────────────────
    let mut gateway_failure: Option<EdgeError> = None;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            println!();
            match signal {
                Ok(()) => println!(
                    "{}",
                    "⚠  Ctrl-C received – initiating graceful shutdown …".yellow().bold()
                ),
                Err(e) => error!(error = %e, "Ctrl-C handler failed; shutting down"),
            }
        }
        res = &mut gateway_task => {
            let failure = match res {
                Ok(Ok(())) => EdgeError::Channel("websocket gateway stopped unexpectedly".to_string()),
                Ok(Err(e)) => e,
                Err(e) => EdgeError::Channel(format!("websocket gateway task failed: {e}")),
            };
            error!(error = %failure, "gateway terminated; shutting down");
            gateway_failure = Some(failure);
        }
    }

    // Drain: stop the watchdogs, flush queued control frames, then drop the
    // gateway's accept loop.
    let _ = shutdown_tx.send(true);
    let service_result = match service_task.await {
        Ok(result) => result,
        Err(e) => Err(EdgeError::Channel(format!("edge service task failed: {e}"))),
    };
    gateway_task.abort();

    println!("{}", "  ✓ Watchdogs stopped, queued frames drained.".green());
    println!("{}", "  ✓ Exiting kennel.".green());

    match gateway_failure {
        Some(e) => Err(e),
        None => service_result,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config bootstrap
// ─────────────────────────────────────────────────────────────────────────────

/// Load the config, writing defaults on first run.  Returns the config plus
/// a status line to print once the banner is up.
fn load_or_init_config() -> (config::Config, String) {
    match config::load() {
        Ok(Some(cfg)) => {
            let note = format!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            (cfg, note)
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            let note = match config::save(&cfg) {
                Ok(()) => format!(
                    "  No config found – wrote defaults to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => format!("{}: {e}", "Config error".red()),
            };
            // The file carries the defaults; the environment still wins.
            config::apply_env_overrides(&mut cfg);
            (cfg, note)
        }
        Err(e) => {
            let note = format!(
                "{}: {e}\n  Using default configuration.",
                "Config error".red()
            );
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            (cfg, note)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __ __                          __"#.bold().cyan());
    println!("{}", r#"  / //_/ ___   ___   ___  ___    / /"#.bold().cyan());
    println!("{}", r#" / ,<   / -_) / _ \ / _ \/ -_)  / / "#.bold().cyan());
    println!("{}", r#"/_/|_|  \__/ /_//_//_//_/\__/  /_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Kennel".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Gesture-Driven Robot-Dog Edge Controller");
    println!();
}
