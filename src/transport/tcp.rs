//! TCP transport factory, the reference transport.

use std::sync::Arc;

use async_trait::async_trait;
use socket2::SockRef;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::factory::MessageFactory;
use crate::net::url::Url;
use crate::transport::framed::FramedTransport;
use crate::transport::registry::TransportFactory;
use crate::transport::Transport;

/// Socket buffer sizing applied to fresh connections.
const SOCKET_BUFFER_SIZE: usize = 8192;

/// Creates [`FramedTransport`]s over TCP for `tcp://host:port` urls.
pub struct TcpTransportFactory {
    message_factory: Arc<MessageFactory>,
}

impl TcpTransportFactory {
    pub fn new(message_factory: Arc<MessageFactory>) -> Self {
        Self { message_factory }
    }
}

#[async_trait]
impl TransportFactory for TcpTransportFactory {
    fn supports(&self, protocol: &str) -> bool {
        protocol == "tcp"
    }

    async fn create_transport(&self, url: &Url) -> Result<Box<dyn Transport>> {
        let port = url
            .port()
            .ok_or_else(|| Error::MalformedUrl("tcp url requires a port".to_owned()))?;

        debug!("connecting to {}:{port}", url.hostname());
        let stream = TcpStream::connect((url.hostname(), port)).await?;

        // Low-latency options: no Nagle, bounded kernel buffers.
        stream.set_nodelay(true)?;
        let sock = SockRef::from(&stream);
        sock.set_recv_buffer_size(SOCKET_BUFFER_SIZE)?;
        sock.set_send_buffer_size(SOCKET_BUFFER_SIZE)?;

        debug!("connected to {}", stream.peer_addr()?);
        Ok(Box::new(FramedTransport::new(
            stream,
            Handle::current(),
            self.message_factory.clone(),
        )))
    }
}
