pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod inventory;
pub mod logger;
pub mod pipeline;
pub mod repository;
pub mod system;

use crate::app::{App, Running};
use crate::config::{env_vars, AppConfig};
use crate::error::{TenantryError, TenantryResult};
use crate::pipeline::OperationKind;
use serde_json::{json, Value};
use std::io;
use std::path::Path;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

const USAGE: &str = "usage:
  tenantry <operation> [json-input]   run one inventory operation
  tenantry serve [addr]               serve the inventory operations over HTTP
  tenantry list                       list operation names";

/// Entry point of the `tenantry` binary; returns the process exit code
pub fn run(args: Vec<String>) -> i32 {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tenantry: {}", e);
            return 2;
        }
    };
    logger::init_tracing(&config.logging);

    let app = match App::new(config).start() {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to start: {}", e);
            eprintln!("tenantry: {}", e);
            return 2;
        }
    };

    let code = dispatch(&app, &args);
    app.stop();
    code
}

fn load_config() -> TenantryResult<AppConfig> {
    let config = match std::env::var(env_vars::CONFIG_PATH) {
        Ok(path) => AppConfig::load(Path::new(&path))?,
        Err(_) => AppConfig::default(),
    };
    config.with_env_overrides()
}

fn dispatch(app: &App<Running>, args: &[String]) -> i32 {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    match args.first().map(String::as_str) {
        None | Some("help") | Some("--help") | Some("-h") => {
            println!("{}", USAGE);
            0
        }
        Some("list") => {
            for operation in inventory::operations(app, OperationKind::Cli) {
                println!("{}", operation.name());
            }
            0
        }
        Some("serve") => {
            let addr = args.get(1).map(String::as_str).unwrap_or(DEFAULT_ADDR);
            match serve(app, addr) {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!("HTTP adapter failed: {}", e);
                    eprintln!("tenantry: {}", e);
                    1
                }
            }
        }
        Some(name) => {
            let input = match parse_input(args.get(1).map(String::as_str)) {
                Ok(input) => input,
                Err(e) => {
                    eprintln!("tenantry: {}", e);
                    return 2;
                }
            };
            let operations = inventory::operations(app, OperationKind::Cli);
            match operations.iter().find(|operation| operation.name() == name) {
                Some(operation) => adapters::cli::run(operation, input, &mut stdout, &mut stderr),
                None => {
                    eprintln!("tenantry: unknown operation '{}'\n{}", name, USAGE);
                    2
                }
            }
        }
    }
}

fn parse_input(raw: Option<&str>) -> TenantryResult<Value> {
    match raw {
        None => Ok(json!({})),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| TenantryError::SerializationError(format!("invalid input: {}", e))),
    }
}

fn serve(app: &App<Running>, addr: &str) -> TenantryResult<()> {
    let router = adapters::http::router(inventory::operations(app, OperationKind::Http));
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        adapters::http::serve(listener, router).await
    })
}
