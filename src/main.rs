//! Service entry point — CLI wiring, config loading, and driver/server
//! startup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use city_bms::api::{self, AppState};
use city_bms::auth::TokenStore;
use city_bms::config::ServiceConfig;
use city_bms::io::export::export_csv;
use city_bms::store::Store;
use city_bms::tick::TickDriver;

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    port_override: Option<u16>,
    data_dir_override: Option<String>,
    seed_override: Option<u64>,
    no_tick: bool,
    export_history: Option<String>,
}

fn print_help() {
    eprintln!("city-bms — smart-city energy-management service");
    eprintln!();
    eprintln!("Usage: city-bms [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>           Load service config from TOML file");
    eprintln!("  --port <u16>              Override listener port");
    eprintln!("  --data-dir <path>         Override data directory");
    eprintln!("  --seed <u64>              Override tick RNG seed");
    eprintln!("  --no-tick                 Disable the tick driver");
    eprintln!("  --export-history <path>   Dump the history log to CSV and exit");
    eprintln!("  --help                    Show this help message");
    eprintln!();
    eprintln!("Without --config, built-in defaults are used.");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        port_override: None,
        data_dir_override: None,
        seed_override: None,
        no_tick: false,
        export_history: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --config requires a path argument");
                    process::exit(1);
                }
                cli.config_path = Some(args[i].clone());
            }
            "--port" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --port requires a u16 argument");
                    process::exit(1);
                }
                if let Ok(p) = args[i].parse::<u16>() {
                    cli.port_override = Some(p);
                } else {
                    eprintln!("error: --port value \"{}\" is not a valid u16", args[i]);
                    process::exit(1);
                }
            }
            "--data-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --data-dir requires a path argument");
                    process::exit(1);
                }
                cli.data_dir_override = Some(args[i].clone());
            }
            "--seed" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --seed requires a u64 argument");
                    process::exit(1);
                }
                if let Ok(s) = args[i].parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{}\" is not a valid u64", args[i]);
                    process::exit(1);
                }
            }
            "--no-tick" => {
                cli.no_tick = true;
            }
            "--export-history" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --export-history requires a path argument");
                    process::exit(1);
                }
                cli.export_history = Some(args[i].clone());
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn load_config(cli: &CliArgs) -> ServiceConfig {
    let mut config = if let Some(ref path) = cli.config_path {
        match ServiceConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ServiceConfig::default()
    };

    if let Some(port) = cli.port_override {
        config.server.port = port;
    }
    if let Some(ref dir) = cli.data_dir_override {
        config.storage.data_dir = dir.clone();
    }
    if let Some(seed) = cli.seed_override {
        config.tick.seed = seed;
    }
    if cli.no_tick {
        config.tick.enabled = false;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    config
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = parse_args();
    let config = load_config(&cli);

    let data_dir = PathBuf::from(&config.storage.data_dir);
    let mut store = match Store::open(&data_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error: cannot open store in {}: {e}", data_dir.display());
            process::exit(1);
        }
    };

    // One-shot export mode: no server, no provisioning.
    if let Some(ref path) = cli.export_history {
        let records: Vec<_> = store.history().iter().cloned().collect();
        if let Err(e) = export_csv(&records, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("{} history records written to {path}", records.len());
        return;
    }

    match store.ensure_provisioned(&config.auth.admin_password, &config.auth.guest_password) {
        Ok(true) => tracing::info!("provisioned default state, inventory, and accounts"),
        Ok(false) => {}
        Err(e) => {
            eprintln!("error: provisioning failed: {e}");
            process::exit(1);
        }
    }

    let shared = store.into_shared();
    let state = AppState {
        store: shared.clone(),
        tokens: Arc::new(TokenStore::new(ChronoDuration::hours(
            config.auth.token_ttl_hours,
        ))),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver_handle = if config.tick.enabled {
        let driver = TickDriver::new(
            shared,
            Duration::from_secs(config.tick.interval_secs),
            Duration::from_secs(config.tick.timeout_secs),
            config.tick.seed,
        );
        Some(tokio::spawn(driver.run(shutdown_rx)))
    } else {
        tracing::info!("tick driver disabled");
        None
    };

    let addr: SocketAddr = match format!("{}:{}", config.server.bind, config.server.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!(
                "error: invalid bind address {}:{}: {e}",
                config.server.bind, config.server.port
            );
            process::exit(1);
        }
    };

    let served = api::serve(state, addr, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
        }
    })
    .await;

    // Stop the driver and let any in-flight tick finish cleanly.
    let _ = shutdown_tx.send(true);
    if let Some(handle) = driver_handle {
        let _ = handle.await;
    }

    if let Err(e) = served {
        eprintln!("error: server failed: {e}");
        process::exit(1);
    }
}
