//! st-core - speedtest telemetry backend.

use clap::{Args, Parser, Subcommand};
use st_config::{resolve_config, Config, ConfigPaths};
use st_core::exit_codes::ExitCode;
use st_core::logging::init_logging;
use st_core::web::{self, open_store, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "st-core", author, version, about = "Speedtest telemetry backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to config.toml (overrides SPEEDTEST_CONFIG)
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        #[command(flatten)]
        config: ConfigArgs,
        /// Listen port, overriding server.port
        #[arg(long, short)]
        port: Option<u16>,
    },
    /// Validate the configuration and open the telemetry store
    Check {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print every stored record as JSON
    Dump {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Serve { config, port } => run_serve(config, port),
        Commands::Check { config } => run_check(config),
        Commands::Dump { config } => run_dump(config),
    };
    std::process::exit(code.as_i32());
}

fn load_config(args: &ConfigArgs) -> Result<(Config, ConfigPaths), ExitCode> {
    resolve_config(args.config.as_deref()).map_err(|e| {
        eprintln!("st-core: {e}");
        ExitCode::ConfigError
    })
}

fn run_serve(args: ConfigArgs, port: Option<u16>) -> ExitCode {
    let (mut config, paths) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    if let Some(port) = port {
        config.server.port = port;
    }

    if let Err(e) = init_logging(&config.log) {
        eprintln!("st-core: {e}");
        return ExitCode::ConfigError;
    }
    match &paths.config_file {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("no config file found, using defaults"),
    }

    let model = config.database.model;
    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, %model, "failed to open telemetry store");
            return ExitCode::StorageError;
        }
    };
    info!(
        base_path = %state.config.server.normalized_base_path(),
        %model,
        lookup = state.lookup.name(),
        chart_list = state.config.frontend.chart_list,
        "starting speedtest backend"
    );

    match web::serve(Arc::new(state)) {
        Ok(()) => ExitCode::Clean,
        Err(e) => {
            error!(error = %e, code = e.code(), "server failed");
            ExitCode::for_error(&e)
        }
    }
}

fn run_check(args: ConfigArgs) -> ExitCode {
    let (config, paths) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let source = match &paths.config_file {
        Some(path) => path.display().to_string(),
        None => "built-in defaults".to_string(),
    };
    println!("configuration ok ({source})");
    println!("listen: {}", config.server.bind_address());
    println!("database: {}", config.database.model);

    match open_store(&config.database) {
        Ok(Some(store)) => match store.count() {
            Ok(n) => {
                println!("records: {n}");
                ExitCode::Clean
            }
            Err(e) => {
                eprintln!("st-core: {e}");
                ExitCode::StorageError
            }
        },
        Ok(None) => {
            println!("telemetry disabled");
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("st-core: {e}");
            ExitCode::StorageError
        }
    }
}

fn run_dump(args: ConfigArgs) -> ExitCode {
    let (config, _) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let store = match open_store(&config.database) {
        Ok(Some(store)) => store,
        Ok(None) => {
            println!("[]");
            return ExitCode::Clean;
        }
        Err(e) => {
            eprintln!("st-core: {e}");
            return ExitCode::StorageError;
        }
    };

    let records = match store.get_all() {
        Ok(records) => records,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => {
            eprintln!("st-core: {e}");
            return ExitCode::StorageError;
        }
    };

    match serde_json::to_string_pretty(&records) {
        Ok(json) => {
            println!("{json}");
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("st-core: {e}");
            ExitCode::InternalError
        }
    }
}
