use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::info;
use webrtc::turn::auth::{generate_auth_key, AuthHandler};
use webrtc::turn::relay::relay_range::RelayAddressGeneratorRanges;
use webrtc::turn::server::config::{ConnConfig, ServerConfig};
use webrtc::turn::server::Server;
use webrtc::util::vnet::net::Net;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind TURN socket: {0}")]
    Bind(#[from] std::io::Error),
    #[error("failed to start TURN server: {0}")]
    Turn(#[from] webrtc::turn::Error),
}

/// Accepts exactly one operator-configured identity, regardless of the
/// requester's source address. The key is derived once at startup.
pub struct StaticAuthHandler {
    username: String,
    key: Vec<u8>,
}

impl StaticAuthHandler {
    pub fn new(username: &str, realm: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            key: generate_auth_key(username, realm, password),
        }
    }
}

impl AuthHandler for StaticAuthHandler {
    fn auth_handle(
        &self,
        username: &str,
        _realm: &str,
        _src_addr: SocketAddr,
    ) -> Result<Vec<u8>, webrtc::turn::Error> {
        if username == self.username {
            Ok(self.key.clone())
        } else {
            Err(webrtc::turn::Error::Other(format!(
                "unknown TURN username {username}"
            )))
        }
    }
}

/// TURN relay whose allocations are restricted to the configured relay IP
/// and port window. Lives for the whole process; signaling must not come up
/// without it.
pub struct RelayService {
    server: Server,
    addr: SocketAddr,
}

impl RelayService {
    pub async fn spawn(config: &Config) -> Result<Self, RelayError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.turn_port)).await?;
        let local = socket.local_addr()?;

        let server = Server::new(ServerConfig {
            conn_configs: vec![ConnConfig {
                conn: Arc::new(socket),
                relay_addr_generator: Box::new(RelayAddressGeneratorRanges {
                    relay_address: config.relay_ip,
                    min_port: config.relay_ports.min,
                    max_port: config.relay_ports.max,
                    max_retries: 10,
                    address: Ipv4Addr::UNSPECIFIED.to_string(),
                    net: Arc::new(Net::new(None)),
                }),
            }],
            realm: config.realm.clone(),
            auth_handler: Arc::new(StaticAuthHandler::new(
                &config.username,
                &config.realm,
                &config.password,
            )),
            channel_bind_timeout: Duration::from_secs(0),
            alloc_close_notify: None,
        })
        .await?;

        info!(
            addr = %local,
            relay_ip = %config.relay_ip,
            port_min = config.relay_ports.min,
            port_max = config.relay_ports.max,
            "TURN relay listening"
        );

        Ok(Self {
            server,
            addr: local,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn close(&self) -> Result<(), RelayError> {
        self.server.close().await?;
        Ok(())
    }
}
