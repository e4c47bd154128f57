//! Per-connection relay session.
//!
//! Each WebSocket gets a Session that feeds socket frames and group channel
//! messages into the [`ConnectionState`] machine and executes the actions it
//! returns.

use crate::groups::GroupSubscription;
use crate::server::EdgeServer;
use axum::extract::ws::{Message, WebSocket};
use edge_core::{Action, ConnectionState, Event};
use edge_types::{ClientId, GroupId, Payload};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::Instrument;

/// A per-connection session.
pub struct Session {
    server: Arc<EdgeServer>,
    group: GroupId,
    hint: Option<ClientId>,
    state: ConnectionState,
    subscription: Option<GroupSubscription>,
}

impl Session {
    /// Create a new session for a socket joining `group`.
    pub fn new(server: Arc<EdgeServer>, group: GroupId, hint: Option<ClientId>) -> Self {
        Self {
            server,
            group,
            hint,
            state: ConnectionState::new(),
            subscription: None,
        }
    }

    /// Run the session until the socket closes.
    pub async fn run(self, socket: WebSocket) {
        let span = tracing::info_span!(
            "relay",
            group = %self.group,
            client = tracing::field::Empty
        );
        self.run_inner(socket).instrument(span).await
    }

    async fn run_inner(mut self, socket: WebSocket) {
        self.server
            .metrics()
            .connections_total
            .fetch_add(1, Ordering::Relaxed);

        let (mut sink, mut stream) = socket.split();
        self.subscription = Some(self.server.groups().join(&self.group));
        tracing::info!("Connection opened");

        let opened = Event::Opened {
            hint: self.hint.take(),
        };
        self.step(opened, &mut sink).await;

        while !self.state.is_closed() {
            let event = tokio::select! {
                frame = stream.next() => match self.frame_event(frame) {
                    Some(event) => event,
                    None => continue,
                },
                payload = next_channel_message(&mut self.subscription) => match payload {
                    Some(payload) => Event::ChannelMessage(payload),
                    None => Event::Closed,
                },
            };

            self.step(event, &mut sink).await;
        }

        tracing::info!("Connection closed");
    }

    /// Translate a socket read into a state machine event.
    ///
    /// Returns `None` for frames that are handled elsewhere or dropped.
    fn frame_event(&self, frame: Option<Result<Message, axum::Error>>) -> Option<Event> {
        let max = self.server.config().relay.max_frame_bytes;
        match frame {
            Some(Ok(Message::Text(text))) => {
                if text.len() > max {
                    self.drop_oversized(text.len(), max);
                    return None;
                }
                Some(Event::TextReceived(text))
            }
            Some(Ok(Message::Binary(bytes))) => {
                if bytes.len() > max {
                    self.drop_oversized(bytes.len(), max);
                    return None;
                }
                Some(Event::BinaryReceived(bytes))
            }
            // Transport-level keepalive; pongs are sent by the socket itself.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => None,
            Some(Ok(Message::Close(_))) | None => Some(Event::Closed),
            Some(Err(e)) => Some(Event::Errored {
                error: e.to_string(),
            }),
        }
    }

    fn drop_oversized(&self, len: usize, max: usize) {
        self.server
            .metrics()
            .frames_dropped
            .fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Dropping {} byte frame (limit: {})", len, max);
    }

    /// Advance the state machine and execute the resulting actions.
    async fn step(&mut self, event: Event, sink: &mut SplitSink<WebSocket, Message>) {
        let state = std::mem::take(&mut self.state);
        let (state, actions) = state.on_event(event);
        self.state = state;

        if let Err(e) = self.execute(actions, sink).await {
            // A failed write ends the connection like a failed read.
            let state = std::mem::take(&mut self.state);
            let (state, actions) = state.on_event(Event::Errored {
                error: e.to_string(),
            });
            self.state = state;
            let _ = self.execute(actions, sink).await;
        }
    }

    async fn execute(
        &mut self,
        actions: Vec<Action>,
        sink: &mut SplitSink<WebSocket, Message>,
    ) -> Result<(), axum::Error> {
        let metrics = self.server.metrics();

        for action in actions {
            match action {
                Action::Identify(client_id) => {
                    tracing::Span::current().record("client", client_id.as_str());
                    tracing::info!("Identified as {}", client_id);
                }
                Action::Publish(payload) => {
                    if let Some(subscription) = &self.subscription {
                        let receivers = subscription.publish(payload);
                        metrics.frames_relayed.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!("Published to {} member(s)", receivers);
                    }
                }
                Action::Reply(text) => {
                    sink.send(Message::Text(text)).await?;
                    metrics.pongs_sent.fetch_add(1, Ordering::Relaxed);
                }
                Action::Deliver(payload) => {
                    sink.send(to_message(payload)).await?;
                    metrics.frames_delivered.fetch_add(1, Ordering::Relaxed);
                }
                Action::Close { reason, transient } => {
                    if transient {
                        tracing::warn!("Connection lost: {}", reason);
                    } else {
                        tracing::error!("Connection error: {}", reason);
                    }
                    let _ = sink.send(Message::Close(None)).await;
                }
                Action::Unsubscribe => {
                    self.subscription = None;
                }
            }
        }

        Ok(())
    }
}

fn to_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::Text(text),
        Payload::Binary(bytes) => Message::Binary(bytes),
    }
}

/// Next message for this connection; pends forever once unsubscribed.
async fn next_channel_message(subscription: &mut Option<GroupSubscription>) -> Option<Payload> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
