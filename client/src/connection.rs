//! Does all communication related stuff with the web socket.
//!
//! The game client only talks to a [`Transport`], which moves raw frames. The native
//! implementation is [`WebSocketTransport`] on top of ewebsock; tests plug in their own.

use common::ProtocolError;
use derive_more::{Display, Error};
use ewebsock::WsEvent::{Closed, Error as WsError, Message, Opened};
use ewebsock::{WsMessage, WsReceiver, WsSender};

/// Everything that can go wrong below the game logic.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum ConnectionError {
    #[display("could not reach {url}: {reason}")]
    Unreachable { url: String, reason: String },
    #[display("connection closed by server")]
    Closed,
    #[display("connection error: {reason}")]
    Transport { reason: String },
    #[display("protocol error: {_0}")]
    Protocol(ProtocolError),
    #[display("{text}")]
    Server { text: String },
}

/// Moves binary frames between the client and the server.
pub trait Transport {
    /// Queues a frame for sending.
    fn send_frame(&mut self, frame: &[u8]);

    /// The next received frame, `Ok(None)` if nothing is pending right now.
    fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, ConnectionError>;

    /// Asks the transport to close. Further frames are dropped.
    fn close(&mut self) {}
}

/// The native web socket connection.
pub struct WebSocketTransport {
    sender: WsSender,
    receiver: WsReceiver,
}

impl WebSocketTransport {
    /// Initiates the connection. Frames sent before the socket is open get queued by ewebsock.
    pub fn connect(url: &str) -> Result<WebSocketTransport, ConnectionError> {
        let options = ewebsock::Options::default();
        let (sender, receiver) =
            ewebsock::connect(url, options).map_err(|reason| ConnectionError::Unreachable {
                url: url.to_string(),
                reason,
            })?;
        Ok(WebSocketTransport { sender, receiver })
    }
}

impl Transport for WebSocketTransport {
    fn send_frame(&mut self, frame: &[u8]) {
        self.sender.send(WsMessage::Binary(frame.to_vec()));
    }

    fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        loop {
            match self.receiver.try_recv() {
                Some(Message(WsMessage::Binary(msg))) => return Ok(Some(msg)),
                Some(Closed) => return Err(ConnectionError::Closed),
                Some(WsError(reason)) => return Err(ConnectionError::Transport { reason }),
                Some(Opened) => tracing::debug!("Web socket opened."),
                Some(_) => continue, // Ignore other message types, keep checking
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self) {
        self.sender.close();
    }
}
