//! Process entry point (§6): loads configuration, builds the composition
//! root, starts the background supervisory tasks, and serves the
//! WebSocket fan-out layer.
//!
//! The LLM-driven planner that actually consumes `Agent`'s subsystems to
//! build prompts and issue action commands is out of scope (§1); this
//! binary wires the in-scope control plane up and keeps it alive.

mod agent;
mod combat;
mod hurt;
mod mode;

use agent_bridge::bridge::HttpBridgeClient;
use agent_bridge::llm::ReqwestLlmClient;
use agent_config::load_or_migrate;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("failed to initialize logger");

    let config_path = PathBuf::from("config.toml");
    let config = match load_or_migrate(&config_path) {
        Ok(config) => config,
        Err(e) => {
            // §7: a malformed config with no recoverable default is fatal.
            log::error!(target: "agent::main", "failed to load {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    log::info!(target: "agent::main", "loaded config.toml (version {})", config.version);

    let data_dir = PathBuf::from("data");
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        log::error!(target: "agent::main", "failed to create data dir {}: {e}", data_dir.display());
        std::process::exit(1);
    }

    let bridge = Arc::new(HttpBridgeClient::new(
        std::env::var("AGENT_BRIDGE_URL").unwrap_or_else(|_| "http://127.0.0.1:20913".to_string()),
    ));
    let llm = Arc::new(ReqwestLlmClient::new(config.llm.clone()));

    let app = match self::agent::Agent::new(config, bridge, llm, data_dir).await {
        Ok(app) => app,
        Err(e) => {
            log::error!(target: "agent::main", "failed to initialize agent: {e}");
            std::process::exit(1);
        }
    };

    app.spawn_background_tasks();

    let heartbeat = app.ws_heartbeat_config();
    let ws_router = agent_ws::tasks_router(app.ws_registry.clone(), app.tasks_channel.clone(), heartbeat);

    let server_config = app
        .config
        .api
        .as_ref()
        .map(|api| api.server.clone())
        .unwrap_or_default();
    let addr = format!("{}:{}", server_config.host, server_config.port);

    log::info!(target: "agent::main", "serving /ws/tasks on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!(target: "agent::main", "failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, ws_router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log::error!(target: "agent::main", "server error: {e}");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    log::info!(target: "agent::main", "shutdown signal received");
}
