use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::broker::{AVAILABLE, Broker};
use crate::catalog::{Book, CatalogService};
use crate::persistence::SledStore;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::websocket::{ConnectionNotifier, handle_message, serve};
use crate::watcher::{LogNotifier, Notifier, WatchSet, Watcher};

fn new_service() -> CatalogService {
    CatalogService::new(
        Arc::new(SledStore::temporary().unwrap()),
        Watcher::new(Broker::new(), None),
        Arc::new(LogNotifier),
    )
}

fn book(title: &str, available: bool) -> Book {
    Book {
        id: 0,
        title: title.to_string(),
        author: "N. K. Jemisin".to_string(),
        year: "2015".to_string(),
        available,
    }
}

#[test]
fn test_client_message_wire_format() {
    let msg: ClientMessage =
        serde_json::from_value(json!({ "type": "subscribe", "email": "a@b.c", "book_id": 42 }))
            .unwrap();
    assert_eq!(
        msg,
        ClientMessage::Subscribe {
            email: "a@b.c".to_string(),
            book_id: 42
        }
    );

    let msg: ClientMessage = serde_json::from_value(json!({ "type": "list_books" })).unwrap();
    assert_eq!(msg, ClientMessage::ListBooks);

    // A book without id/available still parses for add requests.
    let msg: ClientMessage = serde_json::from_value(json!({
        "type": "add_book",
        "book": { "title": "T", "author": "A", "year": "2000" }
    }))
    .unwrap();
    match msg {
        ClientMessage::AddBook { book } => {
            assert_eq!(book.id, 0);
            assert!(!book.available);
        }
        other => panic!("Expected AddBook, got {other:?}"),
    }
}

#[test]
fn test_server_message_wire_format() {
    let value = serde_json::to_value(ServerMessage::Available {
        subscriber_id: 1,
        book_id: 42,
        payload: AVAILABLE.to_string(),
        timestamp: 5,
    })
    .unwrap();
    assert_eq!(value["type"], "available");
    assert_eq!(value["book_id"], 42);
    assert_eq!(value["payload"], "Available");

    let value = serde_json::to_value(ServerMessage::Subscribed {
        subscriber_id: 3,
        book_id: 42,
    })
    .unwrap();
    assert_eq!(
        value,
        json!({ "type": "subscribed", "subscriber_id": 3, "book_id": 42 })
    );
}

#[tokio::test]
async fn test_handle_invalid_message() {
    let service = new_service();
    let mut watches = WatchSet::new();
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let reply = handle_message(&service, &mut watches, &notifier, "{\"type\":\"bogus\"}");
    assert!(matches!(reply, ServerMessage::Error { .. }));
}

#[tokio::test]
async fn test_handle_book_requests() {
    let service = new_service();
    let mut watches = WatchSet::new();
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let add = json!({ "type": "add_book", "book": book("The Fifth Season", true) }).to_string();
    let id = match handle_message(&service, &mut watches, &notifier, &add) {
        ServerMessage::BookAdded { id } => id,
        other => panic!("Expected BookAdded, got {other:?}"),
    };

    let get = json!({ "type": "get_book", "id": id }).to_string();
    match handle_message(&service, &mut watches, &notifier, &get) {
        ServerMessage::Book { book } => assert_eq!(book.title, "The Fifth Season"),
        other => panic!("Expected Book, got {other:?}"),
    }

    let remove = json!({ "type": "remove_book", "id": id }).to_string();
    assert_eq!(
        handle_message(&service, &mut watches, &notifier, &remove),
        ServerMessage::RowsAffected { rows: 1 }
    );

    match handle_message(&service, &mut watches, &notifier, &get) {
        ServerMessage::Error { message } => assert_eq!(message, format!("book {id} not found")),
        other => panic!("Expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handle_subscribe_tracks_watch_and_pushes_notice() {
    let service = new_service();
    let mut watches = WatchSet::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier: Arc<dyn Notifier> = Arc::new(ConnectionNotifier::new(tx, Arc::new(LogNotifier)));

    let subscribe = json!({ "type": "subscribe", "email": "reader@example.com", "book_id": 42 })
        .to_string();
    match handle_message(&service, &mut watches, &notifier, &subscribe) {
        ServerMessage::Subscribed { book_id, .. } => assert_eq!(book_id, 42),
        other => panic!("Expected Subscribed, got {other:?}"),
    }
    assert_eq!(watches.len(), 1);
    assert_eq!(service.broker().listener_count(42), 1);

    service.broker().publish(42, AVAILABLE);

    let pushed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("notice not pushed")
        .expect("channel closed");
    let msg: ServerMessage = serde_json::from_slice(&pushed.into_data()).unwrap();
    match msg {
        ServerMessage::Available {
            book_id, payload, ..
        } => {
            assert_eq!(book_id, 42);
            assert_eq!(payload, AVAILABLE);
        }
        other => panic!("Expected Available, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handle_subscribe_rejects_invalid_email() {
    let service = new_service();
    let mut watches = WatchSet::new();
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let subscribe = json!({ "type": "subscribe", "email": "nobody", "book_id": 1 }).to_string();
    assert!(matches!(
        handle_message(&service, &mut watches, &notifier, &subscribe),
        ServerMessage::Error { .. }
    ));
    assert!(watches.is_empty());
}

async fn start_server() -> (SocketAddr, CatalogService) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = new_service();
    tokio::spawn(serve(listener, service.clone()));
    (addr, service)
}

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn request(ws: &mut Client, msg: &ClientMessage) -> ServerMessage {
    ws.send(WsMessage::text(serde_json::to_string(msg).unwrap()))
        .await
        .expect("Failed to send message");
    next_message(ws).await
}

async fn next_message(ws: &mut Client) -> ServerMessage {
    let response = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Timed out waiting for response")
        .expect("Did not receive response")
        .unwrap();
    let raw_data = response.into_data();
    serde_json::from_slice(&raw_data).unwrap_or_else(|e| {
        panic!("Failed to deserialize ServerMessage from '{raw_data:?}': {e}");
    })
}

#[tokio::test]
async fn integration_availability_reaches_subscribed_connection() {
    let (addr, _service) = start_server().await;
    let url = format!("ws://{addr}");
    let (mut librarian, _) = tokio_tungstenite::connect_async(url.clone())
        .await
        .expect("librarian connect");
    let (mut reader, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("reader connect");

    let id = match request(
        &mut librarian,
        &ClientMessage::AddBook {
            book: book("The Obelisk Gate", false),
        },
    )
    .await
    {
        ServerMessage::BookAdded { id } => id,
        other => panic!("Expected BookAdded, got {other:?}"),
    };

    match request(
        &mut reader,
        &ClientMessage::Subscribe {
            email: "reader@example.com".to_string(),
            book_id: id,
        },
    )
    .await
    {
        ServerMessage::Subscribed { book_id, .. } => assert_eq!(book_id, id),
        other => panic!("Expected Subscribed, got {other:?}"),
    }

    let mut returned = book("The Obelisk Gate", true);
    returned.id = id;
    assert_eq!(
        request(&mut librarian, &ClientMessage::UpdateBook { book: returned }).await,
        ServerMessage::RowsAffected { rows: 1 }
    );

    match next_message(&mut reader).await {
        ServerMessage::Available { book_id, payload, .. } => {
            assert_eq!(book_id, id);
            assert_eq!(payload, AVAILABLE);
        }
        other => panic!("Expected Available, got {other:?}"),
    }

    match request(&mut librarian, &ClientMessage::ListBooks).await {
        ServerMessage::Books { books } => {
            assert_eq!(books.len(), 1);
            assert!(books[0].available);
        }
        other => panic!("Expected Books, got {other:?}"),
    }
}

#[tokio::test]
async fn integration_disconnect_releases_listeners() {
    let (addr, service) = start_server().await;
    let (mut reader, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("reader connect");

    for book_id in [1, 2] {
        let reply = request(
            &mut reader,
            &ClientMessage::Subscribe {
                email: "leaver@example.com".to_string(),
                book_id,
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::Subscribed { .. }));
    }
    assert_eq!(service.broker().total_listeners(), 2);

    reader.close(None).await.expect("Failed to close WebSocket");
    drop(reader);

    for _ in 0..100 {
        if service.broker().total_listeners() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(service.broker().total_listeners(), 0);
    assert_eq!(service.broker().key_count(), 0);
}
