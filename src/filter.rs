use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use webrtc::util::Conn;

use crate::config::PortWindow;

type ConnResult<T> = Result<T, webrtc::util::Error>;

/// Where filtered datagrams appear to come from. The ICE agent holds no
/// candidate for this address, so the empty read is dropped upstream.
pub const SENTINEL_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1);

/// `Conn` decorator that only passes inbound datagrams whose source port
/// falls inside the TURN relay's allocation window.
///
/// The ICE agent offers no hook to veto a peer address, so the gate sits at
/// the socket boundary instead: anything from outside the window is rewritten
/// into a zero-length datagram attributed to [`SENTINEL_ADDR`] before the
/// agent sees it, and no connectivity check can ever succeed against a
/// directly-reachable address. Outbound traffic is not restricted.
pub struct RelayGate {
    inner: Arc<dyn Conn + Send + Sync>,
    window: PortWindow,
}

impl RelayGate {
    pub fn new(inner: Arc<dyn Conn + Send + Sync>, window: PortWindow) -> Self {
        Self { inner, window }
    }
}

#[async_trait]
impl Conn for RelayGate {
    async fn connect(&self, addr: SocketAddr) -> ConnResult<()> {
        self.inner.connect(addr).await
    }

    async fn recv(&self, buf: &mut [u8]) -> ConnResult<usize> {
        self.inner.recv(buf).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> ConnResult<(usize, SocketAddr)> {
        let (n, addr) = self.inner.recv_from(buf).await?;
        if self.window.contains(addr.port()) {
            Ok((n, addr))
        } else {
            Ok((0, SENTINEL_ADDR))
        }
    }

    async fn send(&self, buf: &[u8]) -> ConnResult<usize> {
        self.inner.send(buf).await
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> ConnResult<usize> {
        self.inner.send_to(buf, target).await
    }

    fn local_addr(&self) -> ConnResult<SocketAddr> {
        self.inner.local_addr()
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr()
    }

    async fn close(&self) -> ConnResult<()> {
        self.inner.close().await
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}
