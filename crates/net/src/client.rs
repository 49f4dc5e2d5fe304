//! TCP client for the change feed

use std::collections::HashSet;
use std::sync::Arc;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Change, Message};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Event received from the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Subscription confirmed
    Subscribed { group_id: Uuid },
    /// A change in a subscribed group
    Change(Change),
    /// Server is shutting down
    ServerShutdown,
    /// Connection lost
    Disconnected,
}

/// Client handle for feed operations
pub struct FeedClient {
    state: Arc<RwLock<ClientState>>,
    event_rx: mpsc::Receiver<FeedEvent>,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

struct ClientState {
    connection: ConnectionState,
    groups: HashSet<Uuid>,
}

enum ClientCommand {
    Send(Message),
    Disconnect,
}

impl FeedClient {
    /// Connect to a feed server
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        info!(addr = %peer, "Connected to change feed");

        let (reader, writer) = tokio::io::split(stream);

        let state = Arc::new(RwLock::new(ClientState {
            connection: ConnectionState::Connected,
            groups: HashSet::new(),
        }));

        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(connection_task(
            reader,
            writer,
            state.clone(),
            event_tx,
            cmd_rx,
        ));

        Ok(FeedClient {
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Get the next feed event
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.event_rx.recv().await
    }

    async fn send(&self, msg: Message) -> Result<()> {
        self.cmd_tx
            .send(ClientCommand::Send(msg))
            .await
            .map_err(|_| Error::NotConnected)
    }

    /// Start receiving changes for a group
    pub async fn subscribe(&self, group_id: Uuid) -> Result<()> {
        self.state.write().await.groups.insert(group_id);
        self.send(Message::Subscribe { group_id }).await
    }

    pub async fn unsubscribe(&self, group_id: Uuid) -> Result<()> {
        self.state.write().await.groups.remove(&group_id);
        self.send(Message::Unsubscribe { group_id }).await
    }

    /// Announce a change to other subscribers of its group
    pub async fn publish(&self, change: Change) -> Result<()> {
        self.send(Message::Publish(change)).await
    }

    /// Send a ping
    pub async fn ping(&self) -> Result<()> {
        self.send(Message::Ping).await
    }

    /// Disconnect from the server
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    /// Groups this client asked to follow
    pub async fn subscriptions(&self) -> HashSet<Uuid> {
        self.state.read().await.groups.clone()
    }
}

/// Main connection task
async fn connection_task(
    mut reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    state: Arc<RwLock<ClientState>>,
    event_tx: mpsc::Sender<FeedEvent>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    loop {
        tokio::select! {
            result = read_frame(&mut reader) => {
                match result {
                    Ok(msg) => {
                        if !handle_server_message(msg, &event_tx).await {
                            break;
                        }
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!("Server closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(msg)) => {
                        if let Err(e) = write_frame(&mut writer, &msg).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(ClientCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    state.write().await.connection = ConnectionState::Disconnected;
    let _ = event_tx.send(FeedEvent::Disconnected).await;
    info!("Disconnected from change feed");
}

/// Handle a message from the server; false ends the connection
async fn handle_server_message(msg: Message, event_tx: &mpsc::Sender<FeedEvent>) -> bool {
    match msg {
        Message::Change(change) => {
            let _ = event_tx.send(FeedEvent::Change(change)).await;
        }
        Message::Subscribed { group_id } => {
            let _ = event_tx.send(FeedEvent::Subscribed { group_id }).await;
        }
        Message::ServerShutdown => {
            let _ = event_tx.send(FeedEvent::ServerShutdown).await;
            return false;
        }
        Message::Pong => {
            debug!("Received pong");
        }
        _ => {
            debug!("Ignoring unexpected message");
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::FeedServer;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn subscribed(client: &mut FeedClient, group_id: Uuid) {
        client.subscribe(group_id).await.unwrap();
        let event = timeout(WAIT, client.next_event()).await.unwrap();
        assert_eq!(event, Some(FeedEvent::Subscribed { group_id }));
    }

    #[tokio::test]
    async fn test_changes_reach_group_subscribers_only() {
        let server = FeedServer::start("127.0.0.1:0").await.unwrap();
        let group_a = Uuid::new_v4();
        let group_b = Uuid::new_v4();

        let mut publisher = FeedClient::connect(server.addr()).await.unwrap();
        let mut watcher = FeedClient::connect(server.addr()).await.unwrap();
        let mut other = FeedClient::connect(server.addr()).await.unwrap();

        subscribed(&mut publisher, group_a).await;
        subscribed(&mut watcher, group_a).await;
        subscribed(&mut other, group_b).await;

        let change = Change::TaskChanged {
            group_id: group_a,
            task_id: Uuid::new_v4(),
            completed: true,
        };
        publisher.publish(change.clone()).await.unwrap();

        let event = timeout(WAIT, watcher.next_event()).await.unwrap();
        assert_eq!(event, Some(FeedEvent::Change(change)));

        // Neither the publisher nor the other group's subscriber hear it
        assert!(timeout(Duration::from_millis(200), other.next_event())
            .await
            .is_err());
        assert!(timeout(Duration::from_millis(200), publisher.next_event())
            .await
            .is_err());

        publisher.disconnect().await;
        watcher.disconnect().await;
        other.disconnect().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let server = FeedServer::start("127.0.0.1:0").await.unwrap();
        let group_id = Uuid::new_v4();
        let mut client = FeedClient::connect(server.addr()).await.unwrap();

        subscribed(&mut client, group_id).await;
        assert_eq!(server.subscriber_count(group_id).await, 1);

        client.unsubscribe(group_id).await.unwrap();
        client.ping().await.unwrap();
        // Pong is not surfaced, so give the server a moment to apply both
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.subscriber_count(group_id).await, 0);
        assert!(client.subscriptions().await.is_empty());

        server
            .publish(Change::MembersChanged {
                group_id,
                user_id: Uuid::new_v4(),
            })
            .await;
        assert!(timeout(Duration::from_millis(200), client.next_event())
            .await
            .is_err());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_server_shutdown_notifies_clients() {
        let server = FeedServer::start("127.0.0.1:0").await.unwrap();
        let group_id = Uuid::new_v4();
        let mut client = FeedClient::connect(server.addr()).await.unwrap();
        subscribed(&mut client, group_id).await;

        server.shutdown().await;
        let event = timeout(WAIT, client.next_event()).await.unwrap();
        assert_eq!(event, Some(FeedEvent::ServerShutdown));
        let event = timeout(WAIT, client.next_event()).await.unwrap();
        assert_eq!(event, Some(FeedEvent::Disconnected));
        assert_eq!(
            client.connection_state().await,
            ConnectionState::Disconnected
        );
    }
}
