//! In-process transport between the client loop and the simulated server

use drift_netcode::Connection;
use std::io;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Client side of an in-memory link
pub struct ChannelConnection {
    outbound: Option<UnboundedSender<Vec<u8>>>,
    inbound: UnboundedReceiver<Vec<u8>>,
}

/// Server side of an in-memory link
pub struct ServerEnd {
    pub inbound: UnboundedReceiver<Vec<u8>>,
    pub outbound: UnboundedSender<Vec<u8>>,
}

/// Create a connected pair
pub fn pair() -> (ChannelConnection, ServerEnd) {
    let (to_server, from_client) = mpsc::unbounded_channel();
    let (to_client, from_server) = mpsc::unbounded_channel();
    (
        ChannelConnection {
            outbound: Some(to_server),
            inbound: from_server,
        },
        ServerEnd {
            inbound: from_client,
            outbound: to_client,
        },
    )
}

impl ChannelConnection {
    /// Wait for the next message from the server
    ///
    /// Returns `None` once the server has gone away.
    pub async fn next_message(&mut self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection closed")
}

impl Connection for ChannelConnection {
    type Error = io::Error;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let outbound = self.outbound.as_ref().ok_or_else(closed)?;
        outbound.send(data.to_vec()).map_err(|_| closed())
    }

    fn recv(&mut self) -> Result<Option<Vec<u8>>, Self::Error> {
        match self.inbound.try_recv() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(closed()),
        }
    }

    fn is_connected(&self) -> bool {
        self.outbound.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        // dropping the sender ends the server loop
        self.outbound = None;
        self.inbound.close();
        Ok(())
    }
}
