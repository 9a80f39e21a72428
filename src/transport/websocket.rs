use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::catalog::CatalogService;
use crate::transport::TransportError;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::watcher::{Notice, Notifier, WatchOutcome, WatchSet};

/// Binds `addr` and serves connections until the task is dropped.
pub async fn start_websocket_server(
    addr: &str,
    service: CatalogService,
) -> Result<(), TransportError> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, service).await
}

/// Serves connections from an already bound listener.
pub async fn serve(listener: TcpListener, service: CatalogService) -> Result<(), TransportError> {
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                spawn(handle_connection(stream, peer, service.clone()));
            }
            Err(e) => warn!("Failed to accept connection: {e}"),
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, service: CatalogService) {
    let connection_id = format!("conn-{}", uuid::Uuid::new_v4());

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "WebSocket handshake error: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Replies and pushed notices share one outgoing channel.
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let forward_id = connection_id.clone();
    let forward = spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                debug!(connection_id = %forward_id, "Failed to send message: {e}");
                break;
            }
        }
    });

    let notifier: Arc<dyn Notifier> = Arc::new(ConnectionNotifier::new(
        tx.clone(),
        service.notifier(),
    ));
    let mut watches = WatchSet::new();
    info!(%connection_id, %peer, "client connected");

    while let Some(frame) = ws_receiver.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                debug!(%connection_id, "WebSocket read error: {e}");
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else {
            continue;
        };

        let reply = handle_message(&service, &mut watches, &notifier, text);
        if !send(&tx, &reply) {
            break;
        }
    }

    let cancelled = watches
        .shutdown()
        .await
        .iter()
        .filter(|outcome| **outcome == WatchOutcome::Cancelled)
        .count();
    info!(%connection_id, cancelled_watches = cancelled, "client disconnected");

    drop(notifier);
    drop(tx);
    let _ = forward.await;
}

/// Applies one client request and builds the reply.
///
/// Watchers started by a `subscribe` request are added to `watches`, so
/// they live only as long as the connection.
pub(crate) fn handle_message(
    service: &CatalogService,
    watches: &mut WatchSet,
    notifier: &Arc<dyn Notifier>,
    text: &str,
) -> ServerMessage {
    watches.prune();

    let request = match serde_json::from_str::<ClientMessage>(text) {
        Ok(request) => request,
        Err(e) => {
            debug!("Invalid client message: {e} | {text}");
            return ServerMessage::Error {
                message: format!("invalid message: {e}"),
            };
        }
    };

    let result = match request {
        ClientMessage::ListBooks => service
            .list_books()
            .map(|books| ServerMessage::Books { books }),
        ClientMessage::GetBook { id } => service.get_book(id).map(|book| ServerMessage::Book { book }),
        ClientMessage::AddBook { book } => service
            .add_book(&book)
            .map(|id| ServerMessage::BookAdded { id }),
        ClientMessage::UpdateBook { book } => service
            .update_book(&book)
            .map(|rows| ServerMessage::RowsAffected { rows }),
        ClientMessage::RemoveBook { id } => service
            .remove_book(id)
            .map(|rows| ServerMessage::RowsAffected { rows }),
        ClientMessage::Subscribe { email, book_id } => service
            .create_subscriber_with(&email, book_id, notifier.clone())
            .map(|(subscriber, handle)| {
                watches.insert(handle);
                ServerMessage::Subscribed {
                    subscriber_id: subscriber.id,
                    book_id,
                }
            }),
        ClientMessage::Notify { book_id } => service
            .send_notification(book_id)
            .map(|subscribers| ServerMessage::Notified {
                count: subscribers.len(),
            }),
    };

    result.unwrap_or_else(|e| ServerMessage::Error {
        message: e.to_string(),
    })
}

/// Queues `msg` for the connection. Returns `false` once the connection
/// is gone.
fn send(tx: &UnboundedSender<WsMessage>, msg: &ServerMessage) -> bool {
    match msg.to_ws() {
        Ok(ws_msg) => tx.send(ws_msg).is_ok(),
        Err(e) => {
            warn!("Failed to serialize message: {e}");
            true
        }
    }
}

/// Pushes an `available` message to the subscribing connection, then
/// hands the notice to the service-wide notifier.
pub struct ConnectionNotifier {
    sender: UnboundedSender<WsMessage>,
    inner: Arc<dyn Notifier>,
}

impl ConnectionNotifier {
    /// Wraps the connection's outgoing queue around `inner`.
    pub fn new(sender: UnboundedSender<WsMessage>, inner: Arc<dyn Notifier>) -> Self {
        Self { sender, inner }
    }
}

impl Notifier for ConnectionNotifier {
    fn notify(&self, notice: &Notice) {
        let msg = ServerMessage::Available {
            subscriber_id: notice.subscriber_id,
            book_id: notice.book_id,
            payload: notice.payload.clone(),
            timestamp: notice.timestamp,
        };
        if !send(&self.sender, &msg) {
            debug!(
                subscriber_id = notice.subscriber_id,
                "connection closed before notice could be pushed"
            );
        }
        self.inner.notify(notice);
    }
}
