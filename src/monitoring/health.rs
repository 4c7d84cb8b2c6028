//! Health check HTTP endpoint.
//!
//! A tiny HTTP server that answers any request with the status of each
//! refresh loop as JSON. Used by external uptime monitors.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::feed::fallback::PLACEHOLDER_STAGE;

/// Shared health state updated by the refresh loops.
#[derive(Clone)]
pub struct HealthState {
    inner: Arc<RwLock<HealthData>>,
}

#[derive(Debug, Clone, Serialize)]
struct HealthData {
    status: String,
    started_at: DateTime<Utc>,
    uptime_seconds: i64,
    loops: BTreeMap<String, LoopStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopStatus {
    pub runs: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub records: usize,
    /// Fallback stage that served the last run, when the loop has one.
    pub stage: Option<String>,
    pub last_error: Option<String>,
}

impl LoopStatus {
    fn degraded(&self) -> bool {
        self.last_error.is_some() || self.stage.as_deref() == Some(PLACEHOLDER_STAGE)
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthData {
                status: "starting".to_string(),
                started_at: Utc::now(),
                uptime_seconds: 0,
                loops: BTreeMap::new(),
            })),
        }
    }

    pub async fn record_run(&self, loop_name: &str, records: usize, stage: Option<&str>) {
        let mut data = self.inner.write().await;
        let entry = data.loops.entry(loop_name.to_string()).or_default();
        entry.runs += 1;
        entry.last_run_at = Some(Utc::now());
        entry.records = records;
        entry.stage = stage.map(str::to_string);
        entry.last_error = None;
        refresh_status(&mut data);
    }

    pub async fn record_failure(&self, loop_name: &str, error: &anyhow::Error) {
        let mut data = self.inner.write().await;
        let entry = data.loops.entry(loop_name.to_string()).or_default();
        entry.runs += 1;
        entry.last_run_at = Some(Utc::now());
        entry.last_error = Some(format!("{error:#}"));
        refresh_status(&mut data);
    }

    pub async fn loop_status(&self, loop_name: &str) -> Option<LoopStatus> {
        self.inner.read().await.loops.get(loop_name).cloned()
    }

    async fn render(&self) -> String {
        let mut data = self.inner.read().await.clone();
        data.uptime_seconds = (Utc::now() - data.started_at).num_seconds();
        serde_json::to_string(&data).unwrap_or_else(|_| {
            r#"{"status":"error","message":"serialization failed"}"#.to_string()
        })
    }
}

fn refresh_status(data: &mut HealthData) {
    data.status = if data.loops.values().any(LoopStatus::degraded) {
        "degraded".to_string()
    } else {
        "ok".to_string()
    };
}

/// Bind the health server and serve it in the background.
/// Returns the bound address (useful with port 0) and an abortable handle.
pub async fn spawn_health_server(state: HealthState, bind: &str, port: u16) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("Failed to bind health server on {bind}:{port}"))?;
    let addr = listener.local_addr().context("Health server has no local address")?;
    info!(%addr, "Health check server listening");

    let handle = tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Failed to accept health check connection");
                    continue;
                }
            };

            let state = state.clone();
            tokio::spawn(async move {
                // Request contents are irrelevant; every path gets the status.
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;

                let body = state.render().await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\
                     \r\n\
                     {}",
                    body.len(),
                    body
                );

                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    Ok((addr, handle))
}
