//! Per-connection WebSocket handler.
//!
//! Keeps framing and heartbeats at the edge while deferring every
//! application decision to the presence port. The public contract pings
//! every 5s and considers a connection idle after 10s without client
//! traffic; tests shorten these intervals to speed up feedback.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::sync::mpsc;
use tokio::time;
use tracing::warn;
use uuid::Uuid;

use crate::domain::order::OrderId;
use crate::domain::user::User;
use crate::inbound::ws::messages::{ClientMessage, ServerMessage};
use crate::inbound::ws::state::WsState;

#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

pub(super) async fn handle_ws_session(
    state: WsState,
    user: User,
    session: Session,
    stream: MessageStream,
) {
    WsConnection::new(state, user).run(session, stream).await;
}

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Protocol(ProtocolError),
    InvalidPayload,
    Network(Closed),
}

enum CloseAction {
    None,
    Close(Option<CloseReason>),
}

struct WsConnection {
    state: WsState,
    user: User,
    connection_id: Uuid,
    subscriptions: HashSet<OrderId>,
    sender: mpsc::UnboundedSender<ServerMessage>,
    inbox: mpsc::UnboundedReceiver<ServerMessage>,
}

impl WsConnection {
    fn new(state: WsState, user: User) -> Self {
        let (sender, inbox) = mpsc::unbounded_channel();
        Self {
            state,
            user,
            connection_id: Uuid::new_v4(),
            subscriptions: HashSet::new(),
            sender,
            inbox,
        }
    }

    async fn run(&mut self, mut session: Session, mut stream: MessageStream) {
        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);

        loop {
            let result = tokio::select! {
                _ = heartbeat.tick() => {
                    Self::handle_heartbeat_tick(&mut session, &last_heartbeat).await
                }
                forwarded = self.inbox.recv() => {
                    self.deliver_forwarded(&mut session, forwarded).await
                }
                message = stream.recv() => {
                    self.handle_stream_message(&mut session, &mut last_heartbeat, message)
                        .await
                }
            };

            if let Err(error) = result {
                self.log_shutdown_reason(&error);
                self.state.registry.drop_connection(&self.connection_id);
                let close_action = Self::close_action_for(&error);
                Self::close_session_if_needed(session, close_action).await;
                return;
            }
        }
    }

    async fn handle_heartbeat_tick(
        session: &mut Session,
        last_heartbeat: &Instant,
    ) -> Result<(), SessionError> {
        if Instant::now().duration_since(*last_heartbeat) > CLIENT_TIMEOUT {
            return Err(SessionError::HeartbeatTimeout);
        }

        session.ping(b"").await.map_err(SessionError::Network)
    }

    async fn deliver_forwarded(
        &self,
        session: &mut Session,
        forwarded: Option<ServerMessage>,
    ) -> Result<(), SessionError> {
        match forwarded {
            // The sender half lives in `self`, so the channel never closes
            // while the connection runs.
            None => Ok(()),
            Some(message) => self
                .send_frame(session, &message)
                .await
                .map_err(SessionError::Network),
        }
    }

    async fn handle_stream_message(
        &mut self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), SessionError> {
        let Some(message) = message else {
            return Err(SessionError::StreamClosed);
        };

        match message {
            Ok(message) => self.handle_message(session, last_heartbeat, message).await,
            Err(error) => Err(SessionError::Protocol(error)),
        }
    }

    async fn handle_message(
        &mut self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Message,
    ) -> Result<(), SessionError> {
        match message {
            Message::Ping(payload) => {
                *last_heartbeat = Instant::now();
                session
                    .pong(&payload)
                    .await
                    .map_err(SessionError::Network)?;
                Ok(())
            }
            Message::Text(text) => {
                *last_heartbeat = Instant::now();
                self.handle_text_message(session, text.as_ref()).await
            }
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                *last_heartbeat = Instant::now();
                Ok(())
            }
            Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
        }
    }

    async fn handle_text_message(
        &mut self,
        session: &mut Session,
        text: &str,
    ) -> Result<(), SessionError> {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(error) => {
                warn!(error = %error, "Rejected malformed WebSocket payload");
                return Err(SessionError::InvalidPayload);
            }
        };

        for reply in self.apply_client_message(message).await {
            self.send_frame(session, &reply)
                .await
                .map_err(SessionError::Network)?;
        }
        Ok(())
    }

    /// Apply one client frame, returning the frames owed to this connection.
    ///
    /// Domain rejections become error frames rather than closing the
    /// connection; fan-out to other subscribers goes through the registry.
    async fn apply_client_message(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        match message {
            ClientMessage::DriverLocation {
                latitude,
                longitude,
            } => match self
                .state
                .presence
                .publish_position(&self.user, latitude, longitude)
                .await
            {
                Ok(Some(update)) => {
                    self.state.registry.publish(update);
                    Vec::new()
                }
                Ok(None) => Vec::new(),
                Err(error) => vec![ServerMessage::from_error(&error)],
            },
            ClientMessage::Subscribe { order_id } => {
                let order_id = OrderId::from_uuid(order_id);
                match self
                    .state
                    .presence
                    .authorize_subscription(&self.user, order_id)
                    .await
                {
                    Ok(()) => {
                        self.subscriptions.insert(order_id);
                        self.state.registry.subscribe(
                            order_id,
                            self.connection_id,
                            self.sender.clone(),
                        );
                        Vec::new()
                    }
                    Err(error) => vec![ServerMessage::from_error(&error)],
                }
            }
            ClientMessage::Unsubscribe { order_id } => {
                let order_id = OrderId::from_uuid(order_id);
                self.subscriptions.remove(&order_id);
                self.state
                    .registry
                    .unsubscribe(&order_id, &self.connection_id);
                Vec::new()
            }
        }
    }

    async fn send_frame(&self, session: &mut Session, frame: &ServerMessage) -> Result<(), Closed> {
        match serde_json::to_string(frame) {
            Ok(body) => session.text(body).await,
            Err(error) => {
                warn!(error = %error, "Failed to serialize WebSocket payload");
                Ok(())
            }
        }
    }

    fn log_shutdown_reason(&self, error: &SessionError) {
        match error {
            SessionError::HeartbeatTimeout => {
                warn!("WebSocket heartbeat timeout; closing connection");
            }
            SessionError::Protocol(error) => {
                warn!(error = %error, "WebSocket protocol error");
            }
            SessionError::Network(error) => {
                warn!(error = %error, "WebSocket send failed; closing connection");
            }
            SessionError::InvalidPayload
            | SessionError::ClientClosed(_)
            | SessionError::StreamClosed => {}
        }
    }

    fn close_action_for(error: &SessionError) -> CloseAction {
        match error {
            SessionError::HeartbeatTimeout => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Normal,
                description: Some("heartbeat timeout".to_owned()),
            })),
            SessionError::Protocol(_) => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Protocol,
                description: Some("protocol error".to_owned()),
            })),
            SessionError::InvalidPayload => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Policy,
                description: Some("invalid payload".to_owned()),
            })),
            SessionError::ClientClosed(reason) => CloseAction::Close(reason.clone()),
            SessionError::StreamClosed | SessionError::Network(_) => CloseAction::None,
        }
    }

    async fn close_session_if_needed(session: Session, close_action: CloseAction) {
        if let CloseAction::Close(reason) = close_action {
            if let Err(error) = session.close(reason).await {
                warn!(error = %error, "Failed to close WebSocket session");
            }
        }
    }
}
