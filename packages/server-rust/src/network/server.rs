//! TCP acceptor and per-connection workers.
//!
//! Each accepted socket gets three tasks: a writer draining the bounded
//! outbound queue (the only task that touches the socket's write half), a
//! reader running the greet/read/operate loop, and a pusher forwarding
//! verified events into the same queue. The reader owns the connection
//! lifecycle: it holds the lifecycle ticket, and when it exits (EOF,
//! socket error, or server shutdown) it deregisters the connection and
//! tells the writer to close.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use super::config::ConnectionConfig;
use super::connection::{ConnectionHandle, ConnectionRegistry, OutboundMessage};
use super::shutdown::Lifecycle;
use crate::bus::DataEvent;
use crate::driver::Driver;

/// First line written to every accepted connection.
pub const GREETING: &str =
    "Successfully connected to RapidoDB. Please run AUTH <user> <pass> to access the DB";

/// How long the drain at shutdown waits for connection workers.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything one connection needs: its driver (already layered over the
/// observer and auth stack) and the receiver of its verified events.
pub struct ClientStack {
    /// Executes this connection's queries.
    pub driver: Driver,
    /// Yields the events the connection's active client subscribed to.
    pub events: mpsc::Receiver<DataEvent>,
}

/// Builds one [`ClientStack`] per accepted connection.
///
/// The composition root implements this; the transport stays ignorant of
/// how the layers are assembled.
pub trait ClientStackFactory: Send + Sync + 'static {
    fn create(&self) -> ClientStack;
}

/// Accepts connections until `signal` resolves, then drains.
///
/// # Errors
///
/// Currently only I/O errors from the accept loop that are fatal to the
/// listener; individual connection failures are logged and survived.
pub(crate) async fn run(
    listener: TcpListener,
    factory: Arc<dyn ClientStackFactory>,
    registry: Arc<ConnectionRegistry>,
    lifecycle: Arc<Lifecycle>,
    config: ConnectionConfig,
    signal: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    lifecycle.mark_serving();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        info!(%peer, "client connected");
                        let stack = factory.create();
                        spawn_client(socket, peer, stack, &registry, &lifecycle, &config);
                    }
                    Err(err) => {
                        warn!(%err, "failed to accept connection");
                    }
                }
            }
            () = &mut signal => break,
        }
    }

    let open = registry.count();
    if open > 0 {
        info!(count = open, "draining connections");
    }
    if lifecycle.drain(&registry, DRAIN_TIMEOUT).await {
        info!("all connections drained");
    } else {
        warn!("drain timeout expired with connections still open");
    }

    Ok(())
}

fn spawn_client(
    socket: TcpStream,
    peer: SocketAddr,
    stack: ClientStack,
    registry: &Arc<ConnectionRegistry>,
    lifecycle: &Arc<Lifecycle>,
    config: &ConnectionConfig,
) {
    let ClientStack { driver, events } = stack;
    let (handle, outbound_rx) = registry.register(config);
    let (read_half, write_half) = socket.into_split();

    tokio::spawn(write_loop(write_half, outbound_rx, peer));
    spawn_event_pusher(Arc::clone(&handle), events);

    let ticket = lifecycle.open_connection();
    let stop = lifecycle.stop_signal();
    let registry = Arc::clone(registry);
    let max_line_length = config.max_line_length;

    tokio::spawn(async move {
        // Returned (by drop) when this worker finishes; the shutdown drain
        // waits on it.
        let _ticket = ticket;

        read_loop(read_half, peer, &handle, &driver, max_line_length, stop).await;

        registry.remove(handle.id);
        handle.close();
        info!(%peer, lines = handle.lines_pushed(), "client disconnected");
    });
}

/// Forwards verified events onto the connection's outbound queue.
fn spawn_event_pusher(handle: Arc<ConnectionHandle>, mut events: mpsc::Receiver<DataEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if handle.push_line(event.to_string()).await.is_err() {
                break;
            }
        }
    });
}

/// The connection worker: greet, then read one line at a time, run it
/// through the driver, and queue the replies.
async fn read_loop(
    read_half: tokio::net::tcp::OwnedReadHalf,
    peer: SocketAddr,
    handle: &ConnectionHandle,
    driver: &Driver,
    max_line_length: usize,
    mut stop: tokio::sync::watch::Receiver<bool>,
) {
    if handle.push_line(GREETING).await.is_err() {
        return;
    }

    let codec = LinesCodec::new_with_max_length(max_line_length);
    let mut lines = FramedRead::new(read_half, codec);

    loop {
        let line = tokio::select! {
            line = lines.next() => line,
            _ = stop.changed() => return,
        };

        match line {
            Some(Ok(line)) => {
                let (replies, err) = driver.operate(line.trim());

                for reply in replies {
                    if handle.push_line(reply).await.is_err() {
                        return;
                    }
                }
                if let Some(err) = err {
                    if handle.push_line(format!("ERR: {err}")).await.is_err() {
                        return;
                    }
                }
            }
            Some(Err(err)) => {
                warn!(%peer, %err, "read failed");
                return;
            }
            // EOF: the client hung up.
            None => return,
        }
    }
}

/// The single writer for a connection's socket. Draining one queue keeps
/// every line write atomic regardless of which task produced it.
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<OutboundMessage>,
    peer: SocketAddr,
) {
    while let Some(msg) = outbound.recv().await {
        match msg {
            OutboundMessage::Line(line) => {
                let framed = format!("{line}\n");
                if let Err(err) = write_half.write_all(framed.as_bytes()).await {
                    debug!(%peer, %err, "write failed");
                    break;
                }
            }
            OutboundMessage::Close => break,
        }
    }

    let _ = write_half.shutdown().await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    use super::super::shutdown::Phase;
    use super::*;
    use crate::auth::{SecureStore, UserCatalog};
    use crate::bus::EventBus;
    use crate::observer::{topics, ObservedStore};
    use crate::store::{Store, StoreConfig};

    const IO_TIMEOUT: Duration = Duration::from_secs(5);

    /// Minimal factory over fresh stores, enough to exercise the transport.
    struct TestFactory {
        data: Store,
        users: UserCatalog,
        bus: Arc<EventBus>,
    }

    impl TestFactory {
        fn new() -> Self {
            let users = UserCatalog::new(Store::open(StoreConfig::default()).unwrap());
            users.ensure_admin("admin", "pass");
            Self {
                data: Store::open(StoreConfig::default()).unwrap(),
                users,
                bus: Arc::new(EventBus::new()),
            }
        }
    }

    impl ClientStackFactory for TestFactory {
        fn create(&self) -> ClientStack {
            let secure = Arc::new(SecureStore::new(self.data.clone(), self.users.clone()));
            let observed = ObservedStore::new(secure, Arc::clone(&self.bus));
            let events = observed.private_bus().subscribe(topics::VERIFIED_EVENT, 8);
            ClientStack {
                driver: Driver::new(observed),
                events,
            }
        }
    }

    struct Harness {
        port: u16,
        registry: Arc<ConnectionRegistry>,
        lifecycle: Arc<Lifecycle>,
        stop: Option<oneshot::Sender<()>>,
    }

    async fn start() -> Harness {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let registry = Arc::new(ConnectionRegistry::new());
        let lifecycle = Arc::new(Lifecycle::new());
        let (stop, stopped) = oneshot::channel::<()>();

        tokio::spawn(run(
            listener,
            Arc::new(TestFactory::new()),
            Arc::clone(&registry),
            Arc::clone(&lifecycle),
            ConnectionConfig::default(),
            async move {
                let _ = stopped.await;
            },
        ));

        Harness {
            port,
            registry,
            lifecycle,
            stop: Some(stop),
        }
    }

    async fn read_line(
        reader: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    ) -> Option<String> {
        timeout(IO_TIMEOUT, reader.next_line())
            .await
            .expect("read should not time out")
            .expect("read should succeed")
    }

    #[tokio::test]
    async fn connection_is_greeted_and_registered() {
        let mut harness = start().await;

        let socket = TcpStream::connect(("127.0.0.1", harness.port)).await.unwrap();
        let (read_half, _write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half).lines();

        assert_eq!(read_line(&mut reader).await.as_deref(), Some(GREETING));

        // Registration happens before the greeting is queued.
        assert_eq!(harness.registry.count(), 1);
        assert_eq!(harness.lifecycle.phase(), Phase::Serving);

        let _ = harness.stop.take().unwrap().send(());
    }

    #[tokio::test]
    async fn replies_and_errors_are_line_framed() {
        let mut harness = start().await;

        let socket = TcpStream::connect(("127.0.0.1", harness.port)).await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half).lines();
        read_line(&mut reader).await; // greeting

        write_half.write_all(b"GET k;\n").await.unwrap();
        assert_eq!(
            read_line(&mut reader).await.as_deref(),
            Some("ERR: Access denied")
        );

        write_half
            .write_all(b"AUTH admin pass; SET k 1;\n")
            .await
            .unwrap();
        assert_eq!(
            read_line(&mut reader).await.as_deref(),
            Some("Successfully Authenticated")
        );
        assert_eq!(read_line(&mut reader).await.as_deref(), Some("Success"));

        let _ = harness.stop.take().unwrap().send(());
    }

    #[tokio::test]
    async fn client_disconnect_deregisters() {
        let mut harness = start().await;

        let socket = TcpStream::connect(("127.0.0.1", harness.port)).await.unwrap();
        let (read_half, write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half).lines();
        read_line(&mut reader).await; // greeting
        assert_eq!(harness.registry.count(), 1);

        drop(write_half);
        drop(reader);

        // The reader observes EOF, removes the connection, and returns its
        // lifecycle ticket.
        timeout(IO_TIMEOUT, async {
            while harness.registry.count() > 0 || harness.lifecycle.open_connections() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("deregistration should happen");

        let _ = harness.stop.take().unwrap().send(());
    }

    #[tokio::test]
    async fn shutdown_drains_connections() {
        let mut harness = start().await;

        let socket = TcpStream::connect(("127.0.0.1", harness.port)).await.unwrap();
        let (read_half, _write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half).lines();
        read_line(&mut reader).await; // greeting

        let _ = harness.stop.take().unwrap().send(());

        // The server closes the socket on drain.
        assert_eq!(read_line(&mut reader).await, None);

        timeout(IO_TIMEOUT, async {
            while harness.lifecycle.phase() != Phase::Halted {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("shutdown should reach Halted");
        assert_eq!(harness.registry.count(), 0);
        assert_eq!(harness.lifecycle.open_connections(), 0);
    }
}
