//! Admin listener.
//!
//! Runs next to the proxy listener and shares its [`Hoverfly`] instance, so
//! simulation imports, cache flushes, state edits and mode switches made
//! here are seen by the next proxied request.

use crate::admin_api::router::route_request;
use crate::hoverfly::Hoverfly;
use anyhow::Context;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub struct AdminApiServer {
    addr: SocketAddr,
    hoverfly: Arc<Hoverfly>,
}

impl AdminApiServer {
    pub fn new(addr: SocketAddr, hoverfly: Arc<Hoverfly>) -> Self {
        Self { addr, hoverfly }
    }

    /// Bind the configured admin port, then serve until accepting fails.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind admin port {}", self.addr))?;
        self.serve(listener).await
    }

    /// Serve admin requests on `listener`. Tests bind port 0 and pass the
    /// listener in.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let settings = self.hoverfly.mode_settings();
        info!(
            mode = %settings.mode,
            matching_strategy = %settings.matching_strategy,
            "Admin API listening on http://{}",
            listener.local_addr()?
        );

        loop {
            let (stream, remote) = listener.accept().await?;
            let hoverfly = Arc::clone(&self.hoverfly);

            tokio::spawn(async move {
                let service = service_fn(move |req| route_request(req, Arc::clone(&hoverfly)));
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!(%remote, "Admin connection closed with error: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_serves_admin_routes_on_bound_listener() {
        let hoverfly = Arc::new(Hoverfly::new(&Config::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(AdminApiServer::new(addr, hoverfly).serve(listener));

        let resp = reqwest::get(format!("http://{addr}/api/v2/hoverfly/mode"))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["mode"], "simulate");
    }

    #[tokio::test]
    async fn test_run_reports_port_in_use() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let hoverfly = Arc::new(Hoverfly::new(&Config::default()));

        let err = AdminApiServer::new(addr, hoverfly).run().await.unwrap_err();
        assert!(err.to_string().contains("Failed to bind admin port"));
    }
}
