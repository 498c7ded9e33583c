//! Wire protocol and transport seam
//!
//! The engine never touches sockets. It produces and consumes the message
//! enums below; a `Connection` implementation carries their encoded bytes
//! over whatever the game uses (WebSocket, UDP, an in-process channel).

use crate::clock_sync::{PingReply, PingRequest};
use crate::Result;
use drift_core::{EntitySnapshot, PeerId};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Snapshots per peer, in the order the server listed them
pub type BulkState = IndexMap<PeerId, Vec<EntitySnapshot>>;

/// Client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Clock calibration probe
    Ping(PingRequest),
    /// Periodic state of the locally controlled entity
    LocalUpdate(EntitySnapshot),
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Echo of a `Ping`, stamped with server time
    Pong(PingReply),
    /// Buffered snapshots for any number of peers
    BulkState(BulkState),
    /// A peer left the session
    RemovePeer(PeerId),
}

/// Encode a message with bincode
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(message)?)
}

/// Decode a message with bincode
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Ordered, not necessarily lossless, message channel to the server
pub trait Connection {
    /// Error type for this connection
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send one encoded message
    fn send(&mut self, data: &[u8]) -> std::result::Result<(), Self::Error>;

    /// Receive one encoded message (non-blocking)
    ///
    /// Returns `Ok(None)` if nothing is pending.
    fn recv(&mut self) -> std::result::Result<Option<Vec<u8>>, Self::Error>;

    /// Check if the connection is still alive
    fn is_connected(&self) -> bool;

    /// Close the connection
    fn close(&mut self) -> std::result::Result<(), Self::Error>;
}

/// Encode and send a client message
pub fn send_message<C: Connection>(connection: &mut C, message: &ClientMessage) -> Result<()> {
    let bytes = encode(message)?;
    connection
        .send(&bytes)
        .map_err(|e| crate::Error::Transport(e.to_string()))
}

/// Receive and decode every pending server message
pub fn drain_messages<C: Connection>(connection: &mut C) -> Result<Vec<ServerMessage>> {
    let mut messages = Vec::new();
    while let Some(bytes) = connection
        .recv()
        .map_err(|e| crate::Error::Transport(e.to_string()))?
    {
        messages.push(decode(&bytes)?);
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use drift_core::Vector2;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Loopback {
        queue: VecDeque<Vec<u8>>,
        open: bool,
    }

    impl Connection for Loopback {
        type Error = std::io::Error;

        fn send(&mut self, data: &[u8]) -> std::result::Result<(), Self::Error> {
            if !self.open {
                return Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "closed"));
            }
            self.queue.push_back(data.to_vec());
            Ok(())
        }

        fn recv(&mut self) -> std::result::Result<Option<Vec<u8>>, Self::Error> {
            Ok(self.queue.pop_front())
        }

        fn is_connected(&self) -> bool {
            self.open
        }

        fn close(&mut self) -> std::result::Result<(), Self::Error> {
            self.open = false;
            Ok(())
        }
    }

    #[test]
    fn test_bulk_state_keeps_peer_order() {
        let mut state = BulkState::new();
        state.insert(
            PeerId::new("zed"),
            vec![EntitySnapshot::new("zed", Vector2::new(1.0, 1.0), 10.0)],
        );
        state.insert(
            PeerId::new("amy"),
            vec![EntitySnapshot::new("amy", Vector2::new(2.0, 2.0), 20.0)],
        );

        let bytes = encode(&ServerMessage::BulkState(state)).unwrap();
        let ServerMessage::BulkState(decoded) = decode(&bytes).unwrap() else {
            panic!("expected bulk state");
        };
        let order: Vec<_> = decoded.keys().map(PeerId::as_str).collect();
        assert_eq!(order, vec!["zed", "amy"]);
    }

    #[test]
    fn test_garbage_is_codec_error() {
        let result: Result<ServerMessage> = decode(&[0xff, 0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(Error::Codec(_))));
    }

    #[test]
    fn test_drain_over_connection() {
        let mut link = Loopback {
            open: true,
            ..Default::default()
        };
        let pong = ServerMessage::Pong(PingReply::answer(PingRequest { client_send: 5.0 }, 9.0));
        link.send(&encode(&pong).unwrap()).unwrap();
        link.send(&encode(&ServerMessage::RemovePeer("p2".into())).unwrap())
            .unwrap();

        let messages = drain_messages(&mut link).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], pong);
        assert!(drain_messages(&mut link).unwrap().is_empty());
    }

    #[test]
    fn test_send_on_closed_connection() {
        let mut link = Loopback::default();
        let ping = ClientMessage::Ping(PingRequest { client_send: 1.0 });
        assert!(matches!(
            send_message(&mut link, &ping),
            Err(Error::Transport(_))
        ));
    }
}
