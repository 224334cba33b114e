//! Listener configuration for the proxy and admin ports.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ListenConfig {
    /// Interface both listeners bind to
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Port of the proxy (or webserver) listener
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,
    /// Port of the admin API
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_proxy_port() -> u16 {
    8500
}

fn default_admin_port() -> u16 {
    8888
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            proxy_port: default_proxy_port(),
            admin_port: default_admin_port(),
        }
    }
}

impl ListenConfig {
    pub fn proxy_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.proxy_port)
    }

    pub fn admin_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.admin_port)
    }
}
