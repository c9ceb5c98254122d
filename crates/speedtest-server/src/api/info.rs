//! Server information endpoint.
//!
//! GET /info - hostname and the LAN addresses other devices can reach the
//! server on.

use std::net::{IpAddr, Ipv4Addr};

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub hostname: String,
    pub local_ips: Vec<IpAddr>,
    pub port: u16,
    pub access_urls: Vec<String>,
}

pub async fn server_info(State(state): State<AppState>) -> Json<ServerInfo> {
    let port = state.config().listen.port();
    let hostname = hostname().await;

    let mut local_ips = resolve_private(&hostname).await;
    if local_ips.is_empty() {
        local_ips.push(outbound_address().await.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    let access_urls = local_ips.iter().map(|ip| access_url(*ip, port)).collect();
    Json(ServerInfo {
        hostname,
        local_ips,
        port,
        access_urls,
    })
}

async fn hostname() -> String {
    for path in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Ok(raw) = tokio::fs::read_to_string(path).await {
            let name = raw.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".into())
}

/// Private IPv4 addresses `hostname` resolves to, deduplicated in order.
async fn resolve_private(hostname: &str) -> Vec<IpAddr> {
    let addrs = match tokio::net::lookup_host((hostname, 0)).await {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::debug!(hostname = %hostname, error = %e, "hostname lookup failed");
            return Vec::new();
        }
    };
    filter_private(addrs.map(|addr| addr.ip()))
}

fn filter_private(addrs: impl IntoIterator<Item = IpAddr>) -> Vec<IpAddr> {
    let mut out = Vec::new();
    for ip in addrs {
        let private = matches!(ip, IpAddr::V4(v4) if v4.is_private());
        if private && !out.contains(&ip) {
            out.push(ip);
        }
    }
    out
}

/// Local address of the default route. Connecting a UDP socket sends
/// nothing; it only selects the interface.
async fn outbound_address() -> Option<IpAddr> {
    let socket = tokio::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).await.ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

fn access_url(ip: IpAddr, port: u16) -> String {
    format!("http://{ip}:{port}")
}
