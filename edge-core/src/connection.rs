//! Relay connection state machine.
//!
//! One instance per socket. Socket frames and group channel messages go in as
//! [`Event`]s, and [`Action`]s come out for the server to execute. The machine
//! owns the only piece of per-connection state the relay keeps: the client
//! identity, which is learned at most once.

use edge_types::{BinaryFrame, ClientId, Payload, Pong, TextFrame, IDENTITY_LEN};

/// What the relay knows about who is on the other end of a socket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// No identity learned yet.
    #[default]
    Anonymous,
    /// Identity learned from a hint, a `sender` field or a binary prefix.
    Identified(ClientId),
}

impl Identity {
    /// The client id, if identified.
    pub fn client_id(&self) -> Option<&ClientId> {
        match self {
            Identity::Anonymous => None,
            Identity::Identified(id) => Some(id),
        }
    }
}

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgrade in progress, not yet subscribed.
    Connecting,
    /// Socket open and subscribed to the group channel.
    Open {
        /// Identity sub-state; once identified, never reverts.
        identity: Identity,
    },
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Create a new state machine in the Connecting state.
    pub fn new() -> Self {
        Self::Connecting
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Connecting
            (Self::Connecting, Event::Opened { hint }) => match hint {
                Some(id) => (
                    Self::Open {
                        identity: Identity::Identified(id.clone()),
                    },
                    vec![Action::Identify(id)],
                ),
                None => (
                    Self::Open {
                        identity: Identity::Anonymous,
                    },
                    vec![],
                ),
            },

            // From Open
            (Self::Open { identity }, Event::TextReceived(text)) => {
                let frame = TextFrame::parse(&text);
                let sender = frame
                    .routing()
                    .and_then(|routing| routing.sender.clone())
                    .map(ClientId::new);
                let (identity, mut actions) = learn_identity(identity, sender);
                actions.push(Action::Publish(Payload::Text(text)));
                (Self::Open { identity }, actions)
            }
            (Self::Open { identity }, Event::BinaryReceived(bytes)) => {
                let frame = BinaryFrame::parse(&bytes);
                let (identity, mut actions) = learn_identity(identity, frame.client_id().cloned());
                match frame {
                    BinaryFrame::Ping { timestamp, .. } => {
                        actions.push(Action::Reply(Pong::new(timestamp).to_json()));
                        let mut prefix = bytes;
                        prefix.truncate(IDENTITY_LEN);
                        actions.push(Action::Publish(Payload::Binary(prefix)));
                    }
                    BinaryFrame::Short | BinaryFrame::Identity { .. } => {
                        actions.push(Action::Publish(Payload::Binary(bytes)));
                    }
                    // Too short to carry a timestamp: identity only.
                    BinaryFrame::Truncated { .. } => {}
                }
                (Self::Open { identity }, actions)
            }
            (Self::Open { identity }, Event::ChannelMessage(payload)) => {
                let actions = if should_deliver(&identity, &payload) {
                    vec![Action::Deliver(payload)]
                } else {
                    vec![]
                };
                (Self::Open { identity }, actions)
            }

            // Errors and closes from any live state
            (Self::Open { .. } | Self::Connecting, Event::Errored { error }) => {
                let transient = is_transient_error(&error);
                (
                    Self::Closed,
                    vec![
                        Action::Close {
                            reason: error,
                            transient,
                        },
                        Action::Unsubscribe,
                    ],
                )
            }
            (Self::Open { .. } | Self::Connecting, Event::Closed) => {
                (Self::Closed, vec![Action::Unsubscribe])
            }

            // Closed is terminal; frames before Opened are ignored
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the socket is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Check if the connection has ended.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The learned client id, if any.
    pub fn client_id(&self) -> Option<&ClientId> {
        match self {
            Self::Open { identity } => identity.client_id(),
            _ => None,
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// First-write-wins identity update.
fn learn_identity(identity: Identity, candidate: Option<ClientId>) -> (Identity, Vec<Action>) {
    match (identity, candidate) {
        (Identity::Anonymous, Some(id)) => {
            (Identity::Identified(id.clone()), vec![Action::Identify(id)])
        }
        (identity, _) => (identity, vec![]),
    }
}

/// Events that can occur on a relay connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Upgrade finished and the group channel is subscribed.
    Opened {
        /// Client id supplied as a query parameter, if any.
        hint: Option<ClientId>,
    },
    /// A text frame arrived from the socket.
    TextReceived(String),
    /// A binary frame arrived from the socket.
    BinaryReceived(Vec<u8>),
    /// Another connection in the group published a message.
    ChannelMessage(Payload),
    /// The socket failed.
    Errored {
        /// Error description from the transport.
        error: String,
    },
    /// The socket closed cleanly or the stream ended.
    Closed,
}

/// Actions to be executed by the server.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The connection now has this identity (emitted at most once).
    Identify(ClientId),
    /// Publish to the group channel.
    Publish(Payload),
    /// Send a text frame back to this socket only.
    Reply(String),
    /// Forward a channel message to this socket.
    Deliver(Payload),
    /// Close the socket.
    Close {
        /// Error description to log.
        reason: String,
        /// Expected network churn (ping timeout, EOF) rather than a fault.
        transient: bool,
    },
    /// Drop the channel subscription.
    Unsubscribe,
}

/// Decide whether a channel message should be forwarded to a connection.
///
/// Only a JSON text frame with an explicit `receiver` that differs from this
/// connection's known id is dropped. Binary, non-JSON and unaddressed frames
/// always pass, as does everything while the connection is anonymous.
pub fn should_deliver(identity: &Identity, payload: &Payload) -> bool {
    let (Identity::Identified(me), Payload::Text(text)) = (identity, payload) else {
        return true;
    };

    match TextFrame::parse(text) {
        TextFrame::Routed(routing) => match routing.receiver {
            Some(receiver) => *me == *receiver,
            None => true,
        },
        TextFrame::Opaque => true,
    }
}

/// Classify a transport error as expected network churn.
///
/// Ping timeouts and unexpected end-of-stream happen whenever a peer drops
/// off the network and only warrant a warning.
pub fn is_transient_error(error: &str) -> bool {
    let lower = error.to_ascii_lowercase();
    [
        "no response from ping frame",
        "ping timeout",
        "unexpected eof",
        "unexpected end",
        "connection reset",
        "without closing handshake",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}
