/*!
 * Logbay Daemon
 *
 * A configurable log-routing daemon: text log lines flow in through typed
 * ingress endpoints, through bounded per-ingress pipelines, and out through
 * zero or more digest consumers.
 *
 * ## Architecture Overview
 *
 * ```text
 * ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
 * │ TLS listener │  │ Redis psub   │  │  simulator   │   ingress endpoints
 * └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
 *        │                 │                 │
 *   bounded pipeline  bounded pipeline  bounded pipeline  (drop on full)
 *        │                 │                 │
 *        └────────┬────────┴────────┬────────┘
 *                 ▼                 ▼
 *          dispatcher task   dispatcher task              (one per ingress)
 *                 │                 │
 *        consume()│ fan-out         │
 *        ┌────────┼────────┐        │
 *        ▼        ▼        ▼        ▼
 *    Redis pub  WebSocket  Elastic _bulk                  digest endpoints
 * ```
 *
 * Startup is configuration-driven: endpoints are constructed once from the
 * TOML file, digests declare which ingresses they consume by name, and the
 * dispatcher joins the two sides. A misconfigured endpoint degrades the
 * daemon (logged, skipped); only an unreadable config file aborts it.
 */

use logbay::{dispatcher, startup};
use tracing::{error, info};

use logbay_common::{init_logging, AppConfig};

#[tokio::main]
async fn main() {
    let config_path = config_path_from(std::env::args().skip(1));

    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Can not load config file at {config_path}. Err: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.logger);
    logbay_ingest::install_crypto_provider();

    info!("🚀 Starting Logbay");
    info!(
        "   - Ingest points: {}, digest points: {}",
        config.ingest_points.len(),
        config.digest_points.len()
    );

    startup::prepare_ingests(&config.ingest_points).await;
    let bindings = startup::prepare_digests(&config.digest_points).await;
    dispatcher::dispatch(bindings);

    info!("✅ Logbay is running. Press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal. Err: {e}");
        std::future::pending::<()>().await
    }

    info!("Shutdown signal received. Exiting");
}

/// Resolve the config file path from the command line (`-c <path>` or
/// `--config <path>`); defaults to `config.toml`.
fn config_path_from(mut args: impl Iterator<Item = String>) -> String {
    while let Some(arg) = args.next() {
        if arg == "-c" || arg == "--config" {
            if let Some(path) = args.next() {
                return path;
            }
        }
    }

    "config.toml".to_string()
}
