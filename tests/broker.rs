//! End-to-end lifecycle tests through `Broker::accept`.
//!
//! Each link is a pair of unbounded channels: the test pushes decoded
//! `Inbound` units in and reads `Outbound` packets out. The outbound
//! channel closes when the link task finishes teardown.

use std::io;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{sink, stream};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use mqtt_lifecycle::{
    Broker, BrokerOptions, Cause, ClientBindings, ClientId, ConnAck, Connect, ConnectReturnCode,
    Connection, ControlPacket, Error, FileSessionStore, Inbound, MemorySessionStore, Message,
    MessageDispatcher, Outbound, PacketType, Publish, QoS, Result, Session, SessionStore,
    WillMessage,
};

// ============================================================================
// Harness
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal CONNECT / PUBLISH / DISCONNECT handling.
struct Connector {
    store: Arc<dyn SessionStore>,
    bindings: OnceLock<Arc<ClientBindings>>,
    published: Mutex<Vec<Publish>>,
}

impl Connector {
    fn new(store: Arc<dyn SessionStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            bindings: OnceLock::new(),
            published: Mutex::new(Vec::new()),
        })
    }

    fn published(&self) -> Vec<Publish> {
        self.published.lock().clone()
    }

    async fn on_connect(&self, connection: &Connection, connect: Connect) -> Result<()> {
        if connect.protocol_level != 4 {
            return Err(Error::unacceptable_protocol_version(connect.protocol_level));
        }
        if connect.client_id.is_empty() && !connect.clean_session {
            return Err(Error::identifier_rejected(connect.client_id.as_str()));
        }
        if connect.password.as_deref() == Some(b"wrong".as_slice()) {
            return Err(Error::authentication("password mismatch"));
        }
        if connect.username.as_deref() == Some("banned") {
            return Err(Error::authorization("user is banned"));
        }

        let stored = if connect.clean_session {
            self.store.remove(&connect.client_id).await?;
            None
        } else {
            self.store.load(&connect.client_id).await?
        };
        let session_present = stored.is_some();

        let mut session =
            stored.unwrap_or_else(|| Session::new(connect.client_id.clone(), connect.clean_session));
        session.set_clear_session(connect.clean_session);
        session.set_will(connect.will);
        connection.attach_session(session);

        if let Some(bindings) = self.bindings.get()
            && let Some(previous) = bindings.bind(connect.client_id, connection)
        {
            previous.close();
        }

        connection.send(ConnAck::accepted(session_present))
    }
}

#[async_trait]
impl MessageDispatcher for Connector {
    async fn dispatch(&self, connection: &Connection, message: Message) -> Result<()> {
        match message {
            Message::Connect(connect) => self.on_connect(connection, connect).await,
            Message::Publish(publish) => {
                self.published.lock().push(publish);
                Ok(())
            }
            Message::Control(control) if control.packet_type == PacketType::Disconnect => {
                connection.with_session(Session::take_will);
                connection.close();
                Ok(())
            }
            Message::Control(control) if control.packet_type == PacketType::PingReq => connection
                .send(Outbound::Control(ControlPacket::empty(PacketType::PingResp))),
            Message::Control(_) => Ok(()),
        }
    }
}

/// Test side of one accepted link.
struct Link {
    connection: Connection,
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl Link {
    fn open(broker: &Broker) -> Self {
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Inbound>();
        let reader = Box::pin(stream::unfold(in_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }));

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let writer = Box::pin(sink::unfold(out_tx, |tx, packet: Outbound| async move {
            tx.send(packet)
                .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
            Ok::<_, io::Error>(tx)
        }));

        let connection = broker.accept(None, reader, writer);
        Self {
            connection,
            inbound: Some(in_tx),
            outbound: out_rx,
        }
    }

    fn push(&self, inbound: impl Into<Inbound>) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(inbound.into());
        }
    }

    /// Simulates the peer closing its side.
    fn hang_up(&mut self) {
        self.inbound = None;
    }

    async fn next(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Collects everything written until the link finishes teardown.
    async fn closed(&mut self) -> Vec<Outbound> {
        let mut written = Vec::new();
        while let Some(packet) = self.outbound.recv().await {
            written.push(packet);
        }
        written
    }
}

fn connect(client_id: &str, clean_session: bool) -> Connect {
    Connect {
        protocol_level: 4,
        client_id: ClientId::from(client_id),
        clean_session,
        keep_alive: 60,
        will: None,
        username: None,
        password: None,
    }
}

fn refused(code: ConnectReturnCode) -> Outbound {
    Outbound::ConnAck(ConnAck::refused(code))
}

struct Fixture {
    broker: Broker,
    connector: Arc<Connector>,
}

fn fixture(options: BrokerOptions, store: Arc<dyn SessionStore>) -> Fixture {
    init_tracing();

    let connector = Connector::new(Arc::clone(&store));
    let broker = Broker::builder()
        .dispatcher(connector.clone())
        .session_store(store)
        .options(options)
        .build()
        .unwrap();
    let _ = connector.bindings.set(Arc::clone(broker.bindings()));

    Fixture { broker, connector }
}

fn memory_fixture(options: BrokerOptions) -> (Fixture, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    (fixture(options, store.clone()), store)
}

// ============================================================================
// Connect / Refusals
// ============================================================================

#[tokio::test]
async fn test_accept_registers_link_immediately() {
    let (fx, _store) = memory_fixture(BrokerOptions::new().without_idle());

    let link = Link::open(&fx.broker);
    assert_eq!(fx.broker.connection_count(), 1);
    assert!(fx.broker.registry().contains(link.connection.id()));

    fx.broker.shutdown().await;
    assert_eq!(fx.broker.connection_count(), 0);
}

#[tokio::test]
async fn test_accepted_connect_binds_client() {
    let (fx, _store) = memory_fixture(BrokerOptions::new().without_idle());
    let mut link = Link::open(&fx.broker);

    link.push(Message::Connect(connect("c1", true)));

    assert_eq!(link.next().await, Some(Outbound::ConnAck(ConnAck::accepted(false))));
    assert!(fx.broker.bindings().contains(&ClientId::from("c1")));
    assert!(link.connection.has_session());

    fx.broker.shutdown().await;
}

#[tokio::test]
async fn test_connect_refusals_write_connack_then_close() {
    let cases: [(Connect, ConnectReturnCode); 4] = [
        (
            Connect {
                protocol_level: 3,
                ..connect("c1", true)
            },
            ConnectReturnCode::UnacceptableProtocolVersion,
        ),
        (connect("", false), ConnectReturnCode::IdentifierRejected),
        (
            Connect {
                password: Some(b"wrong".to_vec()),
                ..connect("c1", true)
            },
            ConnectReturnCode::BadUsernameOrPassword,
        ),
        (
            Connect {
                username: Some("banned".into()),
                ..connect("c1", true)
            },
            ConnectReturnCode::NotAuthorized,
        ),
    ];

    for (packet, code) in cases {
        let (fx, store) = memory_fixture(BrokerOptions::new().without_idle());
        let mut link = Link::open(&fx.broker);

        link.push(Message::Connect(packet));
        // Queued behind the refusal; must never reach the dispatcher.
        link.push(Message::Publish(Publish::new("late", b"x".to_vec())));

        assert_eq!(link.closed().await, vec![refused(code)]);
        assert!(fx.connector.published().is_empty());
        assert_eq!(fx.broker.connection_count(), 0);
        assert!(fx.broker.bindings().is_empty());
        assert!(store.is_empty());
    }
}

#[tokio::test]
async fn test_decode_failure_refuses_without_dispatch() {
    let (fx, _store) = memory_fixture(BrokerOptions::new().without_idle());
    let mut link = Link::open(&fx.broker);

    link.push(Inbound::Malformed(Cause::IdentifierRejected {
        reason: "identifier longer than 23 bytes".into(),
    }));

    assert_eq!(
        link.closed().await,
        vec![refused(ConnectReturnCode::IdentifierRejected)]
    );
    assert_eq!(fx.broker.connection_count(), 0);
}

#[tokio::test]
async fn test_transport_failure_closes_silently() {
    let (fx, _store) = memory_fixture(BrokerOptions::new().without_idle());
    let mut link = Link::open(&fx.broker);

    link.push(Inbound::Malformed(
        io::Error::from(io::ErrorKind::ConnectionReset).into(),
    ));

    assert!(link.closed().await.is_empty());
    assert_eq!(fx.broker.connection_count(), 0);
}

// ============================================================================
// Idle / Will
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_link_publishes_will_and_closes() {
    let (fx, _store) =
        memory_fixture(BrokerOptions::new().with_all_idle(Duration::from_secs(10)));
    let mut link = Link::open(&fx.broker);
    let will = WillMessage::new("status/c1", b"offline".to_vec(), QoS::AtLeastOnce, true);

    let start = Instant::now();
    link.push(Message::Connect(Connect {
        will: Some(will.clone()),
        ..connect("c1", true)
    }));

    assert_eq!(link.closed().await, vec![Outbound::ConnAck(ConnAck::accepted(false))]);
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert_eq!(fx.connector.published(), vec![will.to_publish()]);
    assert!(fx.broker.bindings().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pings_keep_link_alive() {
    let (fx, _store) =
        memory_fixture(BrokerOptions::new().with_all_idle(Duration::from_secs(10)));
    let mut link = Link::open(&fx.broker);
    let ping = || Message::Control(ControlPacket::empty(PacketType::PingReq));

    link.push(Message::Connect(connect("c1", true)));
    assert!(link.next().await.is_some());

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_secs(6)).await;
        link.push(ping());
        assert_eq!(
            link.next().await,
            Some(Outbound::Control(ControlPacket::empty(PacketType::PingResp)))
        );
    }

    assert!(link.connection.is_open());
    fx.broker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_discards_will() {
    let (fx, _store) =
        memory_fixture(BrokerOptions::new().with_all_idle(Duration::from_secs(10)));
    let mut link = Link::open(&fx.broker);

    link.push(Message::Connect(Connect {
        will: Some(WillMessage::new("status/c1", b"gone".to_vec(), QoS::AtMostOnce, false)),
        ..connect("c1", true)
    }));
    link.push(Message::Control(ControlPacket::empty(PacketType::Disconnect)));

    link.closed().await;
    assert!(fx.connector.published().is_empty());
}

// ============================================================================
// Teardown / Persistence
// ============================================================================

#[tokio::test]
async fn test_persistent_session_survives_reconnect() -> anyhow::Result<()> {
    let (fx, store) = memory_fixture(BrokerOptions::new().without_idle());

    let mut first = Link::open(&fx.broker);
    first.push(Message::Connect(connect("c1", false)));
    assert_eq!(first.next().await, Some(Outbound::ConnAck(ConnAck::accepted(false))));
    first.connection.with_session(Session::next_message_id);
    first.hang_up();
    first.closed().await;

    fx.broker.controller().persister().drain().await;
    let stored = store
        .load(&ClientId::from("c1"))
        .await?
        .ok_or_else(|| anyhow::anyhow!("session not persisted"))?;
    assert_eq!(stored.message_id(), 1);

    let mut second = Link::open(&fx.broker);
    second.push(Message::Connect(connect("c1", false)));
    assert_eq!(second.next().await, Some(Outbound::ConnAck(ConnAck::accepted(true))));
    assert_eq!(second.connection.with_session(|s| s.message_id()), Some(1));

    fx.broker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_clean_session_not_persisted() {
    let (fx, store) = memory_fixture(BrokerOptions::new().without_idle());

    let mut link = Link::open(&fx.broker);
    link.push(Message::Connect(connect("c1", true)));
    link.next().await;
    link.hang_up();
    link.closed().await;

    fx.broker.shutdown().await;
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_takeover_keeps_newest_binding() {
    let (fx, _store) = memory_fixture(BrokerOptions::new().without_idle());
    let id = ClientId::from("c1");

    let mut old = Link::open(&fx.broker);
    old.push(Message::Connect(connect("c1", true)));
    old.next().await;

    let mut new = Link::open(&fx.broker);
    new.push(Message::Connect(connect("c1", true)));
    assert!(new.next().await.is_some());

    // The connector closed the superseded link; its teardown must not
    // evict the replacement.
    old.closed().await;

    assert_eq!(
        fx.broker.bindings().get(&id).map(|c| c.id()),
        Some(new.connection.id())
    );
    assert_eq!(fx.broker.connection_count(), 1);

    fx.broker.shutdown().await;
    assert!(fx.broker.bindings().is_empty());
}

#[tokio::test]
async fn test_shutdown_closes_and_persists_everything() {
    let (fx, store) = memory_fixture(BrokerOptions::new().without_idle());

    let mut links = Vec::new();
    for i in 0..8 {
        let mut link = Link::open(&fx.broker);
        link.push(Message::Connect(connect(&format!("c{i}"), i % 2 == 0)));
        assert!(link.next().await.is_some());
        links.push(link);
    }
    assert_eq!(fx.broker.connection_count(), 8);

    fx.broker.shutdown().await;

    assert_eq!(fx.broker.connection_count(), 0);
    assert!(fx.broker.bindings().is_empty());
    assert_eq!(store.len(), 4);
    for link in &links {
        assert!(!link.connection.is_open());
    }
}

#[tokio::test]
async fn test_file_store_end_to_end() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(FileSessionStore::open(dir.path()).await?);
    let fx = fixture(BrokerOptions::new().without_idle(), store.clone());

    let mut link = Link::open(&fx.broker);
    link.push(Message::Connect(connect("sensor/42", false)));
    link.next().await;
    link.hang_up();
    link.closed().await;

    fx.broker.shutdown().await;

    let reopened = FileSessionStore::open(dir.path()).await?;
    let session = reopened
        .load(&ClientId::from("sensor/42"))
        .await?
        .ok_or_else(|| anyhow::anyhow!("session file missing"))?;
    assert!(!session.clear_session());
    Ok(())
}
