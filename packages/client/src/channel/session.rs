//! Generic session channel shared by the lobby and game namespaces.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    config::{ClientConfig, Endpoint, Namespace},
    contract::{ChannelContract, EventKind, InboundEvent, OutboundEvent},
    error::{ConnectionError, EmitError, NotConnected, ProtocolError, TransportError},
    transport::{
        Connector, SignalReceiver, TransportHandle, TransportOptions, TransportSignal,
        WebSocketConnector,
    },
};

use super::{Acknowledgement, ChannelNotice, ConnectionState, Delivery};

type KindOf<C> = <<C as ChannelContract>::Inbound as InboundEvent>::Kind;
type Listener<E> = Arc<dyn Fn(E) + Send + Sync>;
type NoticeHook = Arc<dyn Fn(&ChannelNotice) + Send + Sync>;
/// `None` until the first connect or connect-error signal of a generation.
type Outcome = Option<Result<(), ConnectionError>>;

struct Inner<C: ChannelContract> {
    state: ConnectionState,
    /// Bumped on every teardown; signals from older generations are ignored.
    generation: u64,
    handle: Option<Box<dyn TransportHandle>>,
    pending: Option<watch::Receiver<Outcome>>,
    dispatcher: Option<JoinHandle<()>>,
    listeners: HashMap<KindOf<C>, Listener<C::Inbound>>,
    notice_hook: Option<NoticeHook>,
}

impl<C: ChannelContract> Inner<C> {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            handle: None,
            pending: None,
            dispatcher: None,
            listeners: HashMap::new(),
            notice_hook: None,
        }
    }

    /// Close and release the transport handle. Returns whether one existed.
    fn teardown(&mut self) -> bool {
        let had_handle = match self.handle.take() {
            Some(mut handle) => {
                handle.close();
                true
            }
            None => false,
        };
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        self.generation += 1;
        self.pending = None;
        self.listeners.clear();
        self.state = ConnectionState::Disconnected;
        had_handle
    }
}

struct Shared<C: ChannelContract> {
    inner: Mutex<Inner<C>>,
}

impl<C: ChannelContract> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` only if `generation` is still the live one.
    fn if_current<R>(&self, generation: u64, f: impl FnOnce(&mut Inner<C>) -> R) -> Option<R> {
        let mut inner = self.lock();
        (inner.generation == generation).then(|| f(&mut inner))
    }
}

/// One logical real-time connection scoped to the namespace of `C`.
///
/// The channel exclusively owns its transport handle. `connect` is the only
/// suspending operation; everything else reads or writes local state and
/// returns immediately. Dropping the channel disconnects it.
pub struct SessionChannel<C: ChannelContract> {
    endpoint: Endpoint,
    options: TransportOptions,
    connect_timeout: Option<Duration>,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared<C>>,
}

impl<C: ChannelContract> SessionChannel<C> {
    pub fn new(config: &ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            endpoint: config.endpoint(C::NAMESPACE),
            options: TransportOptions::from(config.reconnect),
            connect_timeout: config.connect_timeout,
            connector,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::new()),
            }),
        }
    }

    /// Channel backed by the Socket.IO WebSocket transport.
    pub fn websocket(config: &ClientConfig) -> Self {
        Self::new(config, Arc::new(WebSocketConnector::new()))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn namespace(&self) -> Namespace {
        C::NAMESPACE
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Connect to the endpoint.
    ///
    /// Resolves on the first connect signal and fails with the first
    /// connect error; later reconnection attempts never touch this result.
    /// Calling it while connected is a no-op, and while connecting joins the
    /// attempt in progress.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let (generation, outcome) = {
            let mut inner = self.shared.lock();
            match (inner.state, inner.pending.clone()) {
                (ConnectionState::Connected, _) => {
                    tracing::debug!("Already connected to {}", self.endpoint);
                    return Ok(());
                }
                (ConnectionState::Connecting, Some(pending)) => (inner.generation, pending),
                _ => self.start_connection(&mut inner)?,
            }
        };

        match self.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, await_outcome(outcome)).await {
                Ok(result) => result,
                Err(_) => {
                    self.abandon(generation, limit);
                    Err(ConnectionError::Timeout(limit))
                }
            },
            None => await_outcome(outcome).await,
        }
    }

    fn start_connection(
        &self,
        inner: &mut Inner<C>,
    ) -> Result<(u64, watch::Receiver<Outcome>), ConnectionError> {
        // A handle left over from a failed attempt may still be retrying.
        if inner.teardown() {
            tracing::debug!("Discarded previous transport for {}", self.endpoint);
        }
        inner.state = ConnectionState::Connecting;
        tracing::info!("Connecting to {}", self.endpoint);

        let link = match self.connector.open(&self.endpoint, &self.options) {
            Ok(link) => link,
            Err(e) => {
                inner.state = ConnectionState::Disconnected;
                tracing::error!("Failed to open transport for {}: {}", self.endpoint, e);
                return Err(e.into());
            }
        };

        let (outcome_tx, outcome_rx) = watch::channel(None);
        inner.handle = Some(link.handle);
        inner.pending = Some(outcome_rx.clone());
        inner.dispatcher = Some(tokio::spawn(dispatch(
            Arc::clone(&self.shared),
            inner.generation,
            link.signals,
            outcome_tx,
        )));

        Ok((inner.generation, outcome_rx))
    }

    fn abandon(&self, generation: u64, limit: Duration) {
        let abandoned = self.shared.if_current(generation, |inner| {
            inner.state == ConnectionState::Connecting && inner.teardown()
        });
        if abandoned == Some(true) {
            tracing::warn!("Connection to {} timed out after {:?}", self.endpoint, limit);
        }
    }

    /// Tear the connection down. Idempotent and synchronous; in-flight sends
    /// are not awaited.
    pub fn disconnect(&self) {
        let hook = {
            let mut inner = self.shared.lock();
            if !inner.teardown() {
                return;
            }
            inner.notice_hook.clone()
        };

        tracing::info!("Disconnected from {}", self.endpoint);
        notify(
            hook,
            &ChannelNotice::Disconnected {
                reason: "io client disconnect".to_string(),
            },
        );
    }

    /// Register the callback for an inbound event kind, replacing any
    /// previous one. Ignored while the channel holds no transport handle.
    pub fn on<F>(&self, kind: KindOf<C>, callback: F)
    where
        F: Fn(C::Inbound) + Send + Sync + 'static,
    {
        let mut inner = self.shared.lock();
        if inner.handle.is_none() {
            tracing::debug!(
                "Ignoring listener for '{}': {} is not connected",
                kind.event_name(),
                self.endpoint
            );
            return;
        }
        if inner.listeners.insert(kind, Arc::new(callback)).is_some() {
            tracing::debug!("Replaced listener for '{}'", kind.event_name());
        }
    }

    /// Remove the callback for an inbound event kind.
    pub fn off(&self, kind: KindOf<C>) {
        let mut inner = self.shared.lock();
        if inner.handle.is_some() {
            inner.listeners.remove(&kind);
        }
    }

    /// Set the lifecycle notification hook. Unlike event listeners it
    /// survives `disconnect`.
    pub fn on_notice<F>(&self, callback: F)
    where
        F: Fn(&ChannelNotice) + Send + Sync + 'static,
    {
        self.shared.lock().notice_hook = Some(Arc::new(callback));
    }

    /// Send an event, fire-and-forget. While not connected the event is
    /// dropped with a warning.
    pub fn emit(&self, event: C::Outbound) -> Delivery {
        match self.with_handle(&event, |handle, name, payload| handle.send(name, payload)) {
            Ok(()) => Delivery::Sent,
            Err(EmitError::NotConnected(e)) => {
                tracing::warn!("{}", e);
                Delivery::Dropped
            }
            Err(e) => {
                tracing::error!("Failed to emit '{}': {}", event.event_name(), e);
                Delivery::Dropped
            }
        }
    }

    /// Send an event that asks the server for an acknowledgment.
    pub fn emit_with_ack(&self, event: C::Outbound) -> Result<Acknowledgement, EmitError> {
        self.with_handle(&event, |handle, name, payload| {
            handle.send_with_ack(name, payload)
        })
        .map(|receiver| Acknowledgement::new(event.event_name(), receiver))
        .inspect_err(|e| tracing::warn!("{}", e))
    }

    fn with_handle<R>(
        &self,
        event: &C::Outbound,
        send: impl FnOnce(&dyn TransportHandle, &str, Value) -> Result<R, TransportError>,
    ) -> Result<R, EmitError> {
        let inner = self.shared.lock();
        let handle = match (inner.state, inner.handle.as_deref()) {
            (ConnectionState::Connected, Some(handle)) => handle,
            _ => {
                return Err(NotConnected {
                    namespace: C::NAMESPACE.to_string(),
                    event: event.event_name().to_string(),
                }
                .into());
            }
        };

        let payload = event.payload()?;
        Ok(send(handle, event.event_name(), payload)?)
    }
}

impl<C: ChannelContract> Drop for SessionChannel<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn await_outcome(mut outcome: watch::Receiver<Outcome>) -> Result<(), ConnectionError> {
    match outcome.wait_for(Option::is_some).await {
        Ok(resolved) => resolved.clone().unwrap_or(Err(ConnectionError::Aborted)),
        Err(_) => Err(ConnectionError::Aborted),
    }
}

/// Settle the pending connect result. Returns `false` if it was already settled.
fn settle(outcome: &watch::Sender<Outcome>, result: Result<(), ConnectionError>) -> bool {
    outcome.send_if_modified(|slot| {
        if slot.is_some() {
            return false;
        }
        *slot = Some(result);
        true
    })
}

fn notify(hook: Option<NoticeHook>, notice: &ChannelNotice) {
    if let Some(hook) = hook {
        hook(notice);
    }
}

/// Consume one generation's transport signals in arrival order.
async fn dispatch<C: ChannelContract>(
    shared: Arc<Shared<C>>,
    generation: u64,
    mut signals: SignalReceiver,
    outcome: watch::Sender<Outcome>,
) {
    let namespace = C::NAMESPACE;

    while let Some(signal) = signals.recv().await {
        match signal {
            TransportSignal::Connected => {
                let Some(hook) = shared.if_current(generation, |inner| {
                    inner.state = ConnectionState::Connected;
                    inner.notice_hook.clone()
                }) else {
                    return;
                };
                if settle(&outcome, Ok(())) {
                    tracing::info!("Connected to {}", namespace);
                } else {
                    tracing::info!("Reconnected to {}", namespace);
                }
                notify(hook, &ChannelNotice::Connected);
            }
            TransportSignal::ConnectError(error) => {
                let Some(hook) = shared.if_current(generation, |inner| {
                    inner.state = ConnectionState::Disconnected;
                    inner.notice_hook.clone()
                }) else {
                    return;
                };
                if settle(&outcome, Err(error.clone())) {
                    tracing::error!("Connection to {} failed: {}", namespace, error);
                } else {
                    tracing::warn!("Reconnection to {} failed: {}", namespace, error);
                }
                notify(hook, &ChannelNotice::ConnectFailed(error));
            }
            TransportSignal::Disconnected(reason) => {
                let Some(hook) = shared.if_current(generation, |inner| {
                    inner.state = ConnectionState::Disconnected;
                    inner.notice_hook.clone()
                }) else {
                    return;
                };
                tracing::info!("Disconnected from {}: {}", namespace, reason);
                notify(hook, &ChannelNotice::Disconnected { reason });
            }
            TransportSignal::Event { name, payload } => match C::Inbound::decode(&name, payload) {
                Ok(event) => {
                    let kind = event.kind();
                    let Some(listener) = shared
                        .if_current(generation, |inner| inner.listeners.get(&kind).cloned())
                    else {
                        return;
                    };
                    match listener {
                        Some(listener) => listener(event),
                        None => tracing::debug!("No listener for '{}' on {}", name, namespace),
                    }
                }
                Err(error) => {
                    if !reject(&shared, generation, error) {
                        return;
                    }
                }
            },
            TransportSignal::Malformed(error) => {
                if !reject(&shared, generation, error) {
                    return;
                }
            }
        }
    }

    // The transport stopped for good.
    let hook = shared.if_current(generation, |inner| {
        inner.state = ConnectionState::Disconnected;
        inner.handle = None;
        inner.pending = None;
        inner.dispatcher = None;
        inner.listeners.clear();
        inner.notice_hook.clone()
    });
    if let Some(hook) = hook {
        tracing::info!("Transport for {} closed", namespace);
        notify(hook, &ChannelNotice::TransportClosed);
    }
}

/// Drop an inbound message that violates the contract. Returns `false` if
/// the generation is stale.
fn reject<C: ChannelContract>(shared: &Shared<C>, generation: u64, error: ProtocolError) -> bool {
    let Some(hook) = shared.if_current(generation, |inner| inner.notice_hook.clone()) else {
        return false;
    };
    tracing::warn!("Rejected inbound message on {}: {}", C::NAMESPACE, error);
    notify(hook, &ChannelNotice::ProtocolViolation(error));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        contract::{
            CreateLobbyRequest, GameContract, GameEventKind, GameInbound, GameOutbound,
            GameStatus, LobbyContract, LobbyEventKind, LobbyOutbound, RoomRef,
        },
        transport::{
            MockConnector, MockTransportHandle, TransportLink,
            fake::{FakeConnector, OnOpen},
        },
    };
    use serde_json::json;
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(1);

    fn lobby(connector: &FakeConnector) -> SessionChannel<LobbyContract> {
        SessionChannel::new(&ClientConfig::default(), Arc::new(connector.clone()))
    }

    fn game(connector: &FakeConnector) -> SessionChannel<GameContract> {
        SessionChannel::new(&ClientConfig::default(), Arc::new(connector.clone()))
    }

    fn create(name: &str) -> LobbyOutbound {
        LobbyOutbound::Create(CreateLobbyRequest {
            name: name.to_string(),
        })
    }

    fn update_payload(status: &str) -> Value {
        json!({
            "gameId": "g-1",
            "whitePlayer": { "name": "alice", "socketId": "a", "isCurrent": true },
            "blackPlayer": { "name": "bob", "socketId": "b", "isCurrent": false },
            "fen": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "legalMoves": ["e2e4"],
            "gameStatus": status
        })
    }

    /// Collect notices into a channel the test can await.
    fn record_notices<C: ChannelContract>(
        channel: &SessionChannel<C>,
    ) -> mpsc::UnboundedReceiver<ChannelNotice> {
        let (tx, rx) = mpsc::unbounded_channel();
        channel.on_notice(move |notice| {
            let _ = tx.send(notice.clone());
        });
        rx
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed")
    }

    /// Mock connector handing out one link whose signals the test drives.
    fn mock_link(
        handle: MockTransportHandle,
    ) -> (MockConnector, mpsc::UnboundedSender<TransportSignal>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let mut connector = MockConnector::new();
        connector.expect_open().times(1).return_once(move |_, _| {
            Ok(TransportLink {
                handle: Box::new(handle),
                signals: signal_rx,
            })
        });
        (connector, signal_tx)
    }

    #[tokio::test]
    async fn test_connect_resolves_on_connect_signal() {
        // テスト項目: 接続シグナルで connect が成功し Connected になる
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = lobby(&connector);
        assert_eq!(channel.state(), ConnectionState::Disconnected);

        // when (操作):
        let result = channel.connect().await;

        // then (期待する結果):
        assert_eq!(result, Ok(()));
        assert!(channel.is_connected());
        assert_eq!(channel.endpoint().url(), "http://localhost:3000/lobby");
    }

    #[tokio::test]
    async fn test_connect_twice_opens_one_transport() {
        // テスト項目: 接続済みで connect を呼んでも新しい接続は開かれない
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = lobby(&connector);
        channel.connect().await.unwrap();

        // when (操作):
        let result = channel.connect().await;

        // then (期待する結果):
        assert_eq!(result, Ok(()));
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn test_connect_fails_with_first_connect_error() {
        // テスト項目: 最初の接続エラーで connect が原因付きで失敗し、再接続の成功は結果を変えない
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Fail);
        let channel = game(&connector);
        let mut notices = record_notices(&channel);

        // when (操作):
        let result = channel.connect().await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConnectionError::Transport("connection refused".to_string()))
        );
        assert!(!channel.is_connected());
        assert!(matches!(next(&mut notices).await, ChannelNotice::ConnectFailed(_)));

        // The transport keeps retrying and eventually gets through.
        connector.last().push(TransportSignal::Connected);
        assert_eq!(next(&mut notices).await, ChannelNotice::Connected);
        assert!(channel.is_connected());
    }

    #[tokio::test]
    async fn test_connect_times_out_without_signal() {
        // テスト項目: シグナルが来ないままタイムアウトすると Timeout で失敗しハンドルが閉じられる
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Nothing);
        let config = ClientConfig {
            connect_timeout: Some(Duration::from_millis(50)),
            ..ClientConfig::default()
        };
        let channel: SessionChannel<LobbyContract> =
            SessionChannel::new(&config, Arc::new(connector.clone()));

        // when (操作):
        let result = channel.connect().await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConnectionError::Timeout(Duration::from_millis(50)))
        );
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(connector.last().is_closed());
    }

    #[tokio::test]
    async fn test_emit_while_disconnected_never_reaches_transport() {
        // テスト項目: 切断中の emit はトランスポートに送信されず Dropped になる
        // given (前提条件):
        let mut handle = MockTransportHandle::new();
        handle.expect_send().times(0);
        handle.expect_send_with_ack().times(0);
        handle.expect_close().returning(|| ());
        let (connector, signals) = mock_link(handle);
        let channel: SessionChannel<LobbyContract> =
            SessionChannel::new(&ClientConfig::default(), Arc::new(connector));
        signals
            .send(TransportSignal::ConnectError(ConnectionError::Rejected(
                "namespace closed".to_string(),
            )))
            .unwrap();
        assert!(channel.connect().await.is_err());

        // when (操作):
        let delivery = channel.emit(create("alice"));
        let acked = channel.emit_with_ack(create("alice"));

        // then (期待する結果):
        assert_eq!(delivery, Delivery::Dropped);
        assert!(matches!(acked, Err(EmitError::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_emit_never_opens_a_connection() {
        // テスト項目: 一度も接続していないチャネルの emit は接続を開かない
        // given (前提条件):
        let mut connector = MockConnector::new();
        connector.expect_open().times(0);
        let channel: SessionChannel<LobbyContract> =
            SessionChannel::new(&ClientConfig::default(), Arc::new(connector));

        // when (操作):
        let delivery = channel.emit(create("alice"));

        // then (期待する結果):
        assert!(!delivery.is_sent());
    }

    #[tokio::test]
    async fn test_emit_sends_exactly_one_message() {
        // テスト項目: 接続中の emit はイベント名とペイロードをそのまま1件送信する
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = lobby(&connector);
        channel.connect().await.unwrap();

        // when (操作):
        let delivery = channel.emit(create("alice"));

        // then (期待する結果):
        assert_eq!(delivery, Delivery::Sent);
        assert_eq!(
            connector.last().sent(),
            vec![("lobby:create".to_string(), json!({ "name": "alice" }))]
        );
    }

    #[tokio::test]
    async fn test_emit_with_ack_resolves_with_server_arguments() {
        // テスト項目: emit_with_ack の確認応答がサーバーの引数で解決される
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = lobby(&connector);
        channel.connect().await.unwrap();
        let ack = channel.emit_with_ack(create("alice")).unwrap();

        // when (操作):
        connector.last().ack_all(vec![json!({ "ok": true })]);

        // then (期待する結果):
        assert_eq!(ack.event_name(), "lobby:create");
        assert_eq!(ack.wait_timeout(WAIT).await, Ok(vec![json!({ "ok": true })]));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        // テスト項目: disconnect を2回呼んでも2回目は何もしない
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = lobby(&connector);
        channel.connect().await.unwrap();
        let mut notices = record_notices(&channel);

        // when (操作):
        channel.disconnect();
        channel.disconnect();

        // then (期待する結果):
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(connector.last().is_closed());
        assert_eq!(
            notices.try_recv(),
            Ok(ChannelNotice::Disconnected {
                reason: "io client disconnect".to_string()
            })
        );
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_closes_nothing() {
        // テスト項目: 未接続の disconnect はトランスポートに触れない
        // given (前提条件):
        let mut connector = MockConnector::new();
        connector.expect_open().times(0);
        let channel: SessionChannel<GameContract> =
            SessionChannel::new(&ClientConfig::default(), Arc::new(connector));

        // when (操作):
        channel.disconnect();

        // then (期待する結果):
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_listener_receives_decoded_events_in_order() {
        // テスト項目: リスナーが受信順にデコード済みイベントを受け取る
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = game(&connector);
        channel.connect().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        channel.on(GameEventKind::Update, move |event| {
            let _ = tx.send(event);
        });

        // when (操作):
        let remote = connector.last();
        remote.event("game:update", update_payload("waiting"));
        remote.event("game:update", update_payload("playing"));

        // then (期待する結果):
        for expected in [GameStatus::Waiting, GameStatus::Playing] {
            match next(&mut rx).await {
                GameInbound::Update(session) => assert_eq!(session.game_status, Some(expected)),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_listener_registration_last_writer_wins() {
        // テスト項目: 同じ種別に2回登録すると後のコールバックだけが呼ばれる
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = lobby(&connector);
        channel.connect().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let first = tx.clone();
        channel.on(LobbyEventKind::LobbyError, move |_| {
            let _ = first.send("first");
        });
        channel.on(LobbyEventKind::LobbyError, move |_| {
            let _ = tx.send("second");
        });

        // when (操作):
        connector
            .last()
            .event("lobby:error", json!({ "message": "Lobby is full" }));

        // then (期待する結果):
        assert_eq!(next(&mut rx).await, "second");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_listener_before_connect_is_ignored() {
        // テスト項目: 接続前に登録したリスナーは無視される
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = lobby(&connector);
        let (tx, mut rx) = mpsc::unbounded_channel();
        channel.on(LobbyEventKind::Created, move |event| {
            let _ = tx.send(event);
        });
        channel.connect().await.unwrap();
        let mut notices = record_notices(&channel);

        // when (操作):
        let remote = connector.last();
        remote.event(
            "lobby:created",
            json!({ "roomId": "r1", "players": [], "message": "Lobby created" }),
        );
        // A rejected frame after the event proves the event was dispatched.
        remote.event("lobby:unknown", json!({}));

        // then (期待する結果):
        assert!(matches!(
            next(&mut notices).await,
            ChannelNotice::ProtocolViolation(_)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_off_removes_listener() {
        // テスト項目: off で解除したリスナーは呼ばれない
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = lobby(&connector);
        channel.connect().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let removed = tx.clone();
        channel.on(LobbyEventKind::Update, move |_| {
            let _ = removed.send("update");
        });
        channel.on(LobbyEventKind::ServerError, move |_| {
            let _ = tx.send("err");
        });

        // when (操作):
        channel.off(LobbyEventKind::Update);
        let remote = connector.last();
        remote.event(
            "lobby:update",
            json!({ "roomId": "r1", "players": [], "message": "Player joined" }),
        );
        remote.event("err", json!({ "message": "boom" }));

        // then (期待する結果):
        assert_eq!(next(&mut rx).await, "err");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bogus_game_status_is_rejected() {
        // テスト項目: 不正な gameStatus を含む game:update はリスナーに届かず違反として通知される
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = game(&connector);
        channel.connect().await.unwrap();
        let mut notices = record_notices(&channel);
        let (tx, mut rx) = mpsc::unbounded_channel();
        channel.on(GameEventKind::Update, move |event| {
            let _ = tx.send(event);
        });

        // when (操作):
        connector
            .last()
            .event("game:update", update_payload("bogus"));

        // then (期待する結果):
        match next(&mut notices).await {
            ChannelNotice::ProtocolViolation(ProtocolError::InvalidPayload { event, .. }) => {
                assert_eq!(event, "game:update")
            }
            other => panic!("unexpected notice {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_transport_disconnect_then_reconnect() {
        // テスト項目: トランスポート切断で Disconnected になり、再接続で Connected に戻る
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = game(&connector);
        channel.connect().await.unwrap();
        let mut notices = record_notices(&channel);
        let remote = connector.last();

        // when (操作):
        remote.push(TransportSignal::Disconnected("transport close".to_string()));
        let disconnected = next(&mut notices).await;
        let dropped = channel.emit(GameOutbound::Resign(RoomRef {
            room_id: "r1".to_string(),
        }));
        remote.push(TransportSignal::Connected);
        let reconnected = next(&mut notices).await;

        // then (期待する結果):
        assert_eq!(
            disconnected,
            ChannelNotice::Disconnected {
                reason: "transport close".to_string()
            }
        );
        assert_eq!(dropped, Delivery::Dropped);
        assert_eq!(reconnected, ChannelNotice::Connected);
        assert!(channel.is_connected());
        assert!(remote.sent().is_empty());
    }

    #[tokio::test]
    async fn test_transport_giving_up_releases_handle() {
        // テスト項目: シグナルストリームが終わるとハンドルが解放され TransportClosed が通知される
        // given (前提条件):
        let mut handle = MockTransportHandle::new();
        handle.expect_close().times(0);
        let (connector, signals) = mock_link(handle);
        let channel: SessionChannel<GameContract> =
            SessionChannel::new(&ClientConfig::default(), Arc::new(connector));
        signals.send(TransportSignal::Connected).unwrap();
        channel.connect().await.unwrap();
        let mut notices = record_notices(&channel);

        // when (操作):
        signals
            .send(TransportSignal::Disconnected("ping timeout".to_string()))
            .unwrap();
        drop(signals);

        // then (期待する結果):
        assert!(matches!(
            next(&mut notices).await,
            ChannelNotice::Disconnected { .. }
        ));
        assert_eq!(next(&mut notices).await, ChannelNotice::TransportClosed);
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        channel.disconnect();
    }

    #[tokio::test]
    async fn test_channel_reusable_after_disconnect() {
        // テスト項目: 切断後に再度 connect すると新しい接続が開かれる
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = lobby(&connector);
        channel.connect().await.unwrap();
        channel.disconnect();

        // when (操作):
        let result = channel.connect().await;

        // then (期待する結果):
        assert_eq!(result, Ok(()));
        assert_eq!(connector.opened(), 2);
        assert!(!connector.last().is_closed());
    }

    #[tokio::test]
    async fn test_lobby_and_game_channels_are_independent() {
        // テスト項目: ロビーとゲームのチャネルはそれぞれ独立したトランスポートを持つ
        // given (前提条件):
        let connector = FakeConnector::new(OnOpen::Connect);
        let lobby_channel = lobby(&connector);
        let game_channel = game(&connector);

        // when (操作):
        lobby_channel.connect().await.unwrap();
        game_channel.connect().await.unwrap();
        lobby_channel.disconnect();

        // then (期待する結果):
        assert_eq!(connector.opened(), 2);
        assert!(!lobby_channel.is_connected());
        assert!(game_channel.is_connected());
        assert_eq!(game_channel.namespace(), Namespace::Game);
    }
}
