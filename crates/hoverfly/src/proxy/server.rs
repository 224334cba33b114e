//! ProxyServer struct and main run loop.

use super::handler::{handle_request, ProxyContext};
use crate::hoverfly::Hoverfly;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// The proxy (or webserver) listener.
pub struct ProxyServer {
    addr: SocketAddr,
    context: Arc<ProxyContext>,
}

impl ProxyServer {
    /// Create a proxy serving `hoverfly`. Requests forwarded upstream give
    /// up after `upstream_timeout`.
    pub fn new(
        addr: SocketAddr,
        hoverfly: Arc<Hoverfly>,
        upstream_timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(upstream_timeout)
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            addr,
            context: Arc::new(ProxyContext { hoverfly, client }),
        })
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let kind = if self.context.hoverfly.is_webserver() {
            "webserver"
        } else {
            "proxy"
        };
        info!("Hoverfly {} listening on http://{}", kind, listener.local_addr()?);

        loop {
            let (stream, remote) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let context = Arc::clone(&self.context);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let context = Arc::clone(&context);
                    async move { handle_request(req, context).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Proxy connection error from {}: {}", remote, e);
                }
            });
        }
    }
}
