//! Connection manager: keeps a logical channel to the hub across transient
//! failures and re-joins the identity's group after every (re)connect.
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──handshake──▶ Connected
//!      ▲                          │                       │   ▲
//!      │                       failure              link drop │ re-handshake
//!      │                          ▼                       ▼   │
//!      └──────disconnect()─── (any state)            Reconnecting ──budget spent──▶ Failed
//! ```
//!
//! All scheduled work lives in one session task owned through a
//! cancellation token, so `disconnect()` cannot leave a reconnect or tick
//! behind.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use riff_protocol::{ClientCommand, ServerMessage, StatusEvent, user_group};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;

use crate::backoff::ReconnectPolicy;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::subscribers::{Subscribers, Subscription};
use crate::token::TokenFactory;
use crate::transport::{Connector, Link};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal disconnected: the retry budget is spent. Only an explicit
    /// `connect()` leaves this state.
    Failed,
}

impl ConnectionState {
    /// Whether a session is live or being established.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub policy: ReconnectPolicy,
    pub handshake_timeout: Duration,
    pub leave_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        ManagerOptions::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for ManagerOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            policy: config.reconnect_policy(),
            handshake_timeout: config.handshake_timeout(),
            leave_timeout: config.leave_timeout(),
        }
    }
}

enum Control {
    Send(ClientCommand, oneshot::Sender<Result<(), ClientError>>),
}

struct Session {
    identity: String,
    cancel: CancellationToken,
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

/// Everything the session task needs, shared with the manager.
#[derive(Clone)]
struct Shared {
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenFactory>,
    options: ManagerOptions,
    state: Arc<watch::Sender<ConnectionState>>,
    events: Subscribers<StatusEvent>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Connection state {} -> {}", previous, state);
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Fetch a fresh token, handshake, and join `group`.
    async fn establish(&self, group: &str) -> Result<Box<dyn Link>, ClientError> {
        let token = self.tokens.token().await?;
        let mut link = timeout(self.options.handshake_timeout, self.connector.connect(&token))
            .await
            .map_err(|_| ClientError::Transport("handshake timed out".to_string()))??;

        let join = ClientCommand::JoinGroup {
            group: group.to_string(),
        };
        if let Err(e) = link.send(join).await {
            link.close().await;
            return Err(e);
        }

        info!(
            "Connected via {} as {} and joined {}",
            link.transport(),
            link.connection_id(),
            group
        );
        Ok(link)
    }
}

/// Owns the transport and the reconnect state machine for one identity.
pub struct ConnectionManager {
    shared: Shared,
    session: Mutex<Option<Session>>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenFactory>,
        options: ManagerOptions,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Shared {
                connector,
                tokens,
                options,
                state: Arc::new(state),
                events: Subscribers::new(),
            },
            session: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Register a callback for status events, invoked in registration order.
    ///
    /// Events are not buffered: anything delivered before the first
    /// subscription is lost.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(callback)
    }

    /// Connect and join `identity`'s group.
    ///
    /// A no-op while a session for the same identity is live. Authentication
    /// and handshake failures are returned; nothing is retried until the first
    /// successful connect.
    pub async fn connect(&self, identity: &str) -> Result<(), ClientError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(ClientError::Protocol("identity must not be empty".to_string()));
        }

        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref()
            && !existing.task.is_finished()
            && self.state().is_active()
        {
            if existing.identity == identity {
                debug!("Already {} as {}, ignoring connect", self.state(), identity);
                return Ok(());
            }
            return Err(ClientError::Protocol(format!(
                "session already active for {}",
                existing.identity
            )));
        }
        if let Some(stale) = session.take() {
            stale.cancel.cancel();
            let _ = stale.task.await;
        }

        self.shared.set_state(ConnectionState::Connecting);
        let group = user_group(identity);
        let link = match self.shared.establish(&group).await {
            Ok(link) => link,
            Err(e) => {
                warn!("Connect for {} failed: {}", identity, e);
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        self.shared.set_state(ConnectionState::Connected);

        let cancel = CancellationToken::new();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let runner = SessionRunner {
            shared: self.shared.clone(),
            group,
            cancel: cancel.clone(),
            control: control_rx,
        };
        let task = tokio::spawn(runner.run(link));

        *session = Some(Session {
            identity: identity.to_string(),
            cancel,
            control: control_tx,
            task,
        });
        Ok(())
    }

    /// Leave the group if connected, tear down the transport, and cancel any
    /// pending reconnect. Always ends in `Disconnected`.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        if let Some(session) = session.take() {
            session.cancel.cancel();
            if let Err(e) = session.task.await
                && e.is_panic()
            {
                error!("Session task for {} panicked", session.identity);
            }
            info!("Disconnected {}", session.identity);
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    pub async fn join_group(&self, group: &str) -> Result<(), ClientError> {
        self.group_command(ClientCommand::JoinGroup {
            group: group.to_string(),
        })
        .await
    }

    pub async fn leave_group(&self, group: &str) -> Result<(), ClientError> {
        self.group_command(ClientCommand::LeaveGroup {
            group: group.to_string(),
        })
        .await
    }

    /// Send a group command through the live link. Failures are logged and
    /// returned but never change the connection state.
    async fn group_command(&self, command: ClientCommand) -> Result<(), ClientError> {
        let result = self.try_group_command(command.clone()).await;
        if let Err(e) = &result {
            warn!("Group operation {:?} failed: {}", command, e);
        }
        result
    }

    async fn try_group_command(&self, command: ClientCommand) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let control = match self.session.lock().await.as_ref() {
            Some(session) => session.control.clone(),
            None => return Err(ClientError::NotConnected),
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        control
            .send(Control::Send(command, reply_tx))
            .map_err(|_| ClientError::NotConnected)?;

        match timeout(self.shared.options.leave_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::NotConnected),
            Err(_) => Err(ClientError::Transport("group operation timed out".to_string())),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Ok(session) = self.session.try_lock()
            && let Some(session) = session.as_ref()
        {
            session.cancel.cancel();
        }
    }
}

enum Step {
    Cancelled,
    Control(Option<Control>),
    Message(Option<Result<ServerMessage, ClientError>>),
}

enum Exit {
    Cancelled,
    Dropped(String),
}

struct SessionRunner {
    shared: Shared,
    group: String,
    cancel: CancellationToken,
    control: mpsc::UnboundedReceiver<Control>,
}

impl SessionRunner {
    async fn run(mut self, mut link: Box<dyn Link>) {
        loop {
            match self.pump(link.as_mut()).await {
                Exit::Cancelled => {
                    self.teardown(link.as_mut()).await;
                    return;
                }
                Exit::Dropped(reason) => {
                    warn!("Connection {} lost: {}", link.connection_id(), reason);
                    link.close().await;
                    self.shared.set_state(ConnectionState::Reconnecting);

                    match self.reconnect().await {
                        Some(next) => link = next,
                        None => return,
                    }
                }
            }
        }
    }

    /// Deliver server messages and forward commands until the link drops or
    /// the session is cancelled.
    async fn pump(&mut self, link: &mut dyn Link) -> Exit {
        loop {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Cancelled,
                control = self.control.recv() => Step::Control(control),
                message = link.recv() => Step::Message(message),
            };

            match step {
                Step::Cancelled | Step::Control(None) => return Exit::Cancelled,
                Step::Control(Some(Control::Send(command, reply))) => {
                    let _ = reply.send(link.send(command).await);
                }
                Step::Message(Some(Ok(message))) => self.handle_message(link, message).await,
                Step::Message(Some(Err(e))) => return Exit::Dropped(e.to_string()),
                Step::Message(None) => return Exit::Dropped("closed by server".to_string()),
            }
        }
    }

    async fn handle_message(&mut self, link: &mut dyn Link, message: ServerMessage) {
        match message {
            ServerMessage::AgentStatus { event } => {
                self.shared.events.emit(&event);
            }
            ServerMessage::Ping => {
                if let Err(e) = link.send(ClientCommand::Pong).await {
                    debug!("Failed to answer ping: {}", e);
                }
            }
            ServerMessage::Error { message } => {
                warn!("Server reported error on {}: {}", link.connection_id(), message);
            }
            ServerMessage::GroupJoined { group } => debug!("Joined {}", group),
            ServerMessage::GroupLeft { group } => debug!("Left {}", group),
            ServerMessage::Connected { connection_id, .. } => {
                debug!("Unexpected connected message for {}", connection_id);
            }
        }
    }

    /// Retry with linear backoff until connected, cancelled, or out of budget.
    async fn reconnect(&mut self) -> Option<Box<dyn Link>> {
        let policy = self.shared.options.policy;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let Some(delay) = policy.delay(attempt) else {
                error!(
                    "Giving up on {} after {} reconnect attempts",
                    self.group, policy.max_attempts
                );
                self.shared.set_state(ConnectionState::Failed);
                return None;
            };

            info!(
                "Reconnecting {} in {:?} (attempt {}/{})",
                self.group, delay, attempt, policy.max_attempts
            );
            if !self.wait(delay).await {
                return None;
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                result = self.shared.establish(&self.group) => result,
            };

            match result {
                Ok(link) => {
                    self.shared.set_state(ConnectionState::Connected);
                    return Some(link);
                }
                Err(e) => warn!("Reconnect attempt {} failed: {}", attempt, e),
            }
        }
    }

    /// Sleep for `delay`, refusing group commands meanwhile. Returns false if
    /// cancelled.
    async fn wait(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                _ = sleep_until(deadline) => return true,
                control = self.control.recv() => match control {
                    Some(Control::Send(_, reply)) => {
                        let _ = reply.send(Err(ClientError::NotConnected));
                    }
                    None => return false,
                },
            }
        }
    }

    /// Leave first if connected; tear down regardless of how the leave went.
    async fn teardown(&mut self, link: &mut dyn Link) {
        let bound = self.shared.options.leave_timeout;

        if self.shared.state() == ConnectionState::Connected {
            let leave = ClientCommand::LeaveGroup {
                group: self.group.clone(),
            };
            match timeout(bound, link.send(leave)).await {
                Ok(Ok(())) => debug!("Left {}", self.group),
                Ok(Err(e)) => warn!("Leave for {} failed: {}", self.group, e),
                Err(_) => warn!("Leave for {} timed out", self.group),
            }
        }

        if timeout(bound, link.close()).await.is_err() {
            warn!("Closing connection {} timed out", link.connection_id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use riff_protocol::{EventStatus, TransportKind};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::token::StaticToken;

    type Inbound = mpsc::UnboundedSender<Result<ServerMessage, ClientError>>;

    #[derive(Default)]
    struct FakeConnector {
        script: StdMutex<VecDeque<Result<(), ClientError>>>,
        calls: AtomicUsize,
        closed: Arc<AtomicUsize>,
        sent: Arc<StdMutex<Vec<ClientCommand>>>,
        links: StdMutex<Vec<Inbound>>,
        fail_leave: bool,
    }

    impl FakeConnector {
        fn scripted(results: Vec<Result<(), ClientError>>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(results.into()),
                ..Self::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn sent(&self) -> Vec<ClientCommand> {
            self.sent.lock().unwrap().clone()
        }

        fn push(&self, message: ServerMessage) {
            let links = self.links.lock().unwrap();
            links.last().unwrap().send(Ok(message)).unwrap();
        }

        /// Simulate the server dropping every open link.
        fn drop_links(&self) {
            self.links.lock().unwrap().clear();
        }
    }

    struct FakeLink {
        id: String,
        inbound: mpsc::UnboundedReceiver<Result<ServerMessage, ClientError>>,
        sent: Arc<StdMutex<Vec<ClientCommand>>>,
        closed: Arc<AtomicUsize>,
        fail_leave: bool,
    }

    #[async_trait]
    impl Link for FakeLink {
        fn transport(&self) -> TransportKind {
            TransportKind::WebSocket
        }

        fn connection_id(&self) -> &str {
            &self.id
        }

        async fn send(&mut self, command: ClientCommand) -> Result<(), ClientError> {
            let leave = matches!(command, ClientCommand::LeaveGroup { .. });
            self.sent.lock().unwrap().push(command);
            if leave && self.fail_leave {
                return Err(ClientError::Transport("leave refused".into()));
            }
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<ServerMessage, ClientError>> {
            self.inbound.recv().await
        }

        async fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        fn kind(&self) -> TransportKind {
            TransportKind::WebSocket
        }

        async fn connect(&self, _token: &str) -> Result<Box<dyn Link>, ClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transport("refused".into())));
            result?;

            let (tx, rx) = mpsc::unbounded_channel();
            self.links.lock().unwrap().push(tx);
            Ok(Box::new(FakeLink {
                id: format!("conn-{}", call),
                inbound: rx,
                sent: self.sent.clone(),
                closed: self.closed.clone(),
                fail_leave: self.fail_leave,
            }))
        }
    }

    fn options() -> ManagerOptions {
        ManagerOptions {
            policy: ReconnectPolicy {
                max_attempts: 5,
                step: Duration::from_secs(1),
                jitter: false,
            },
            handshake_timeout: Duration::from_secs(1),
            leave_timeout: Duration::from_millis(500),
        }
    }

    fn manager(connector: &Arc<FakeConnector>) -> ConnectionManager {
        ConnectionManager::new(
            connector.clone(),
            Arc::new(StaticToken::new("dev:alice")),
            options(),
        )
    }

    fn join(identity: &str) -> ClientCommand {
        ClientCommand::JoinGroup {
            group: user_group(identity),
        }
    }

    fn leave(identity: &str) -> ClientCommand {
        ClientCommand::LeaveGroup {
            group: user_group(identity),
        }
    }

    async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
        let mut rx = manager.watch_state();
        rx.wait_for(|s| *s == state).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_joins_identity_group_once() {
        let connector = FakeConnector::scripted(vec![Ok(())]);
        let manager = manager(&connector);

        manager.connect("alice").await.unwrap();
        manager.connect("alice").await.unwrap();

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(connector.calls(), 1);
        assert_eq!(connector.sent(), vec![join("alice")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_is_reported_without_retry() {
        let connector =
            FakeConnector::scripted(vec![Err(ClientError::Unauthorized("bad token".into()))]);
        let manager = manager(&connector);

        let err = manager.connect("alice").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_delivered_in_order() {
        let connector = FakeConnector::scripted(vec![Ok(())]);
        let manager = manager(&connector);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            manager.subscribe(move |event| seen.lock().unwrap().push(event.message.clone()))
        };

        manager.connect("alice").await.unwrap();
        for step in ["one", "two", "three"] {
            connector.push(ServerMessage::AgentStatus {
                event: StatusEvent::new(EventStatus::Processing).with_message(step),
            });
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Some("one".to_string()),
                Some("two".to_string()),
                Some("three".to_string())
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_answered_with_pong() {
        let connector = FakeConnector::scripted(vec![Ok(())]);
        let manager = manager(&connector);
        manager.connect("alice").await.unwrap();

        connector.push(ServerMessage::Ping);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(connector.sent(), vec![join("alice"), ClientCommand::Pong]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_rejoins_group() {
        let connector = FakeConnector::scripted(vec![Ok(()), Ok(())]);
        let manager = manager(&connector);
        manager.connect("alice").await.unwrap();

        connector.drop_links();
        wait_for_state(&manager, ConnectionState::Reconnecting).await;
        wait_for_state(&manager, ConnectionState::Connected).await;

        assert_eq!(connector.calls(), 2);
        assert_eq!(connector.sent(), vec![join("alice"), join("alice")]);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retry_budget() {
        let connector = FakeConnector::scripted(vec![Ok(())]);
        let manager = manager(&connector);
        manager.connect("alice").await.unwrap();

        let dropped_at = Instant::now();
        connector.drop_links();
        wait_for_state(&manager, ConnectionState::Failed).await;

        // One initial connect plus five attempts spaced 1s, 2s, 3s, 4s, 5s.
        assert_eq!(connector.calls(), 6);
        let waited = dropped_at.elapsed();
        assert!(waited >= Duration::from_secs(15), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(16), "waited {:?}", waited);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.calls(), 6);
        assert_eq!(manager.state(), ConnectionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_after_failed_starts_fresh() {
        let connector = FakeConnector::scripted(vec![Ok(())]);
        let manager = manager(&connector);
        manager.connect("alice").await.unwrap();
        connector.drop_links();
        wait_for_state(&manager, ConnectionState::Failed).await;

        connector.script.lock().unwrap().push_back(Ok(()));
        manager.connect("alice").await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let connector = FakeConnector::scripted(vec![Ok(())]);
        let manager = manager(&connector);
        manager.connect("alice").await.unwrap();

        connector.drop_links();
        wait_for_state(&manager, ConnectionState::Reconnecting).await;
        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.calls(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_leaves_before_teardown() {
        let connector = FakeConnector::scripted(vec![Ok(())]);
        let manager = manager(&connector);
        manager.connect("alice").await.unwrap();

        manager.disconnect().await;

        assert_eq!(connector.sent(), vec![join("alice"), leave("alice")]);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_proceeds_when_leave_fails() {
        let connector = Arc::new(FakeConnector {
            script: StdMutex::new(vec![Ok(())].into()),
            fail_leave: true,
            ..FakeConnector::default()
        });
        let manager = manager(&connector);
        manager.connect("alice").await.unwrap();

        manager.disconnect().await;

        assert_eq!(connector.sent(), vec![join("alice"), leave("alice")]);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_operations_require_connection() {
        let connector = FakeConnector::scripted(vec![]);
        let manager = manager(&connector);

        assert_eq!(
            manager.join_group("user-alice").await,
            Err(ClientError::NotConnected)
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_operation_through_live_link() {
        let connector = FakeConnector::scripted(vec![Ok(())]);
        let manager = manager(&connector);
        manager.connect("alice").await.unwrap();

        manager.leave_group("user-alice").await.unwrap();
        assert_eq!(connector.sent(), vec![join("alice"), leave("alice")]);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }
}
