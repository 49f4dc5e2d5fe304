//! TCP change feed server
//!
//! Clients subscribe to groups and publish changes. Each published change is
//! forwarded to every other connection subscribed to the change's group.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Change, Message};

/// Maximum number of open connections
const MAX_CONNECTIONS: usize = 256;

/// Outgoing queue depth per connection
const QUEUE_DEPTH: usize = 64;

type ConnId = u64;

/// Connected subscriber state
struct Conn {
    tx: mpsc::Sender<Message>,
    groups: HashSet<Uuid>,
}

/// Server state shared across tasks
#[derive(Default)]
struct FeedState {
    conns: HashMap<ConnId, Conn>,
    next_id: ConnId,
}

impl FeedState {
    /// Queues for every subscriber of `group_id` except `except`
    fn subscribers(&self, group_id: Uuid, except: Option<ConnId>) -> Vec<mpsc::Sender<Message>> {
        self.conns
            .iter()
            .filter(|(id, c)| Some(**id) != except && c.groups.contains(&group_id))
            .map(|(_, c)| c.tx.clone())
            .collect()
    }
}

/// Change feed server handle
pub struct FeedServer {
    addr: SocketAddr,
    state: Arc<RwLock<FeedState>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl FeedServer {
    /// Bind and start accepting connections
    pub async fn start<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Feed server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(RwLock::new(FeedState::default()));

        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(accept_loop(listener, state.clone(), shutdown_rx));

        Ok(FeedServer {
            addr: bound_addr,
            state,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Deliver a change originating on the server itself
    pub async fn publish(&self, change: Change) {
        deliver(&self.state, change, None).await;
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.conns.len()
    }

    /// Number of connections subscribed to a group
    pub async fn subscriber_count(&self, group_id: Uuid) -> usize {
        self.state.read().await.subscribers(group_id, None).len()
    }

    /// Tell clients we are going away and stop accepting
    pub async fn shutdown(&self) {
        let queues: Vec<_> = {
            let s = self.state.read().await;
            s.conns.values().map(|c| c.tx.clone()).collect()
        };
        for tx in queues {
            let _ = tx.send(Message::ServerShutdown).await;
        }
        let _ = self.shutdown_tx.send(());
        info!("Feed server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    state: Arc<RwLock<FeedState>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let state = state.clone();
                        let shutdown_rx = shutdown_rx.resubscribe();
                        tokio::spawn(handle_connection(stream, addr, state, shutdown_rx));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<RwLock<FeedState>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, writer) = tokio::io::split(stream);
    let (msg_tx, msg_rx) = mpsc::channel(QUEUE_DEPTH);

    let conn_id = {
        let mut s = state.write().await;
        if s.conns.len() >= MAX_CONNECTIONS {
            warn!(addr = %addr, "Connection limit reached");
            return;
        }
        let id = s.next_id;
        s.next_id += 1;
        s.conns.insert(
            id,
            Conn {
                tx: msg_tx.clone(),
                groups: HashSet::new(),
            },
        );
        id
    };

    let writer_handle = tokio::spawn(writer_task(writer, msg_rx));

    loop {
        tokio::select! {
            result = read_frame(&mut reader) => {
                match result {
                    Ok(msg) => handle_message(msg, conn_id, &msg_tx, &state).await,
                    Err(Error::ConnectionClosed) => {
                        debug!(conn_id, "Connection closed");
                        break;
                    }
                    Err(e) => {
                        warn!(conn_id, error = %e, "Read error");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    state.write().await.conns.remove(&conn_id);
    // Let queued frames (ServerShutdown) drain before the socket drops
    drop(msg_tx);
    let _ = writer_handle.await;

    debug!(conn_id, addr = %addr, "Subscriber disconnected");
}

/// Writer task - sends messages to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Handle an incoming message
async fn handle_message(
    msg: Message,
    conn_id: ConnId,
    reply: &mpsc::Sender<Message>,
    state: &Arc<RwLock<FeedState>>,
) {
    match msg {
        Message::Subscribe { group_id } => {
            if let Some(conn) = state.write().await.conns.get_mut(&conn_id) {
                conn.groups.insert(group_id);
            }
            debug!(conn_id, %group_id, "Subscribed");
            let _ = reply.send(Message::Subscribed { group_id }).await;
        }
        Message::Unsubscribe { group_id } => {
            if let Some(conn) = state.write().await.conns.get_mut(&conn_id) {
                conn.groups.remove(&group_id);
            }
        }
        Message::Publish(change) => {
            deliver(state, change, Some(conn_id)).await;
        }
        Message::Ping => {
            let _ = reply.send(Message::Pong).await;
        }
        _ => {
            debug!(conn_id, "Ignoring unexpected message type");
        }
    }
}

/// Forward a change to its group's subscribers
async fn deliver(state: &Arc<RwLock<FeedState>>, change: Change, except: Option<ConnId>) {
    let group_id = change.group_id();
    // Collect first so no lock is held across sends
    let queues = state.read().await.subscribers(group_id, except);
    debug!(%group_id, count = queues.len(), "Delivering change");
    for tx in queues {
        let _ = tx.send(Message::Change(change.clone())).await;
    }
}
