// SPDX-License-Identifier: AGPL-3.0-or-later

//! A thin async wrapper over a UDP socket bound to an ephemeral port. Every
//! datagram is returned together with its source address so the Session
//! can discard spoofed replies from unrelated hosts.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::trace;

use crate::{error::Result, utils::HexPreview};

const READ_BUFFER_LEN: usize = 8 * 1024;

pub struct Transport {
    socket: UdpSocket,
}

impl Transport {
    /// Binds an ephemeral local port and connects it to `target` so that
    /// `send`/`recv` can use the connected-socket fast path, while still
    /// reporting the peer address on every receive.
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if target.is_ipv6() {
            "[::]:0".parse().expect("valid literal")
        } else {
            "0.0.0.0:0".parse().expect("valid literal")
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;
        Ok(Self { socket })
    }

    /// Binds an unconnected ephemeral socket, used for one-shot discovery
    /// probes that must accept a reply from any source and compare it
    /// against the probed target themselves.
    pub async fn bind_any() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn send(&self, buf: &[u8]) -> Result<()> {
        trace!(len = buf.len(), data = ?HexPreview(buf), "send");
        self.socket.send(buf).await?;
        Ok(())
    }

    pub async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<()> {
        trace!(len = buf.len(), %target, data = ?HexPreview(buf), "send_to");
        self.socket.send_to(buf, target).await?;
        Ok(())
    }

    pub async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; READ_BUFFER_LEN];
        let (n, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(n);
        trace!(len = n, %from, data = ?HexPreview(&buf), "recv");
        Ok((buf, from))
    }
}
