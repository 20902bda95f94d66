mod config;
mod db;
mod feedback;
mod gateway;
mod ipc;
mod models;
mod store;
mod sync;
mod throttle;
mod views;

use std::io::{self, BufRead, Write};

use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    // stdout carries replies; logs go to stderr only.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = config::Config::load();
    let transport = match gateway::HttpTransport::new() {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("failed to build http client: {e}");
            std::process::exit(1);
        }
    };
    let mut state = match ipc::AppState::new(config, Box::new(transport)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("failed to initialize: {e:#}");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; report and move on.
                tracing::warn!("bad request line: {e}");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        tracing::debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
