use crate::catalog::model::Book;
use crate::persistence::sled_store::record_id;
use crate::persistence::{CatalogStore, SledStore, StoreError};

use tempfile::tempdir;

fn book(title: &str, available: bool) -> Book {
    Book {
        id: 0,
        title: title.to_string(),
        author: "Ursula K. Le Guin".to_string(),
        year: "1969".to_string(),
        available,
    }
}

#[test]
fn test_add_and_get_book() {
    let store = SledStore::temporary().unwrap();
    let id = store.add_book(&book("The Left Hand of Darkness", false)).unwrap();
    assert!(id >= 1);

    let stored = store.book(id).unwrap().expect("book should exist");
    assert_eq!(stored.id, id);
    assert_eq!(stored.title, "The Left Hand of Darkness");
    assert!(!stored.available);
}

#[test]
fn test_add_book_ignores_incoming_id() {
    let store = SledStore::temporary().unwrap();
    let mut incoming = book("The Dispossessed", true);
    incoming.id = 999;

    let id = store.add_book(&incoming).unwrap();
    assert_ne!(id, 999);
    assert!(store.book(999).unwrap().is_none());
}

#[test]
fn test_missing_book_returns_none() {
    let store = SledStore::temporary().unwrap();
    assert!(store.book(12345).unwrap().is_none());
}

#[test]
fn test_books_lists_in_id_order() {
    let store = SledStore::temporary().unwrap();
    let a = store.add_book(&book("A Wizard of Earthsea", true)).unwrap();
    let b = store.add_book(&book("The Tombs of Atuan", true)).unwrap();

    let books = store.books().unwrap();
    let ids: Vec<_> = books.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![a, b]);
}

#[test]
fn test_update_book_counts_rows() {
    let store = SledStore::temporary().unwrap();
    let id = store.add_book(&book("The Lathe of Heaven", false)).unwrap();

    let mut updated = store.book(id).unwrap().unwrap();
    updated.available = true;
    assert_eq!(store.update_book(&updated).unwrap(), 1);
    assert!(store.book(id).unwrap().unwrap().available);

    let mut missing = book("Nowhere", true);
    missing.id = id + 100;
    assert_eq!(store.update_book(&missing).unwrap(), 0);
    assert!(store.book(id + 100).unwrap().is_none());
}

#[test]
fn test_remove_book_counts_rows() {
    let store = SledStore::temporary().unwrap();
    let id = store.add_book(&book("Always Coming Home", true)).unwrap();

    assert_eq!(store.remove_book(id).unwrap(), 1);
    assert_eq!(store.remove_book(id).unwrap(), 0);
    assert!(store.books().unwrap().is_empty());
}

#[test]
fn test_subscribers_are_filtered_by_book() {
    let store = SledStore::temporary().unwrap();
    let a = store.add_subscriber("a@example.com", 42).unwrap();
    let _ = store.add_subscriber("b@example.com", 7).unwrap();
    let c = store.add_subscriber("c@example.com", 42).unwrap();
    assert_ne!(a.id, c.id);

    let subs = store.subscribers_for(42).unwrap();
    let emails: Vec<_> = subs.iter().map(|s| s.email.as_str()).collect();
    assert_eq!(emails, vec!["a@example.com", "c@example.com"]);
    assert!(store.subscribers_for(1).unwrap().is_empty());
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempdir().unwrap();
    let id = {
        let store = SledStore::open(dir.path()).unwrap();
        let id = store.add_book(&book("Lavinia", true)).unwrap();
        store.add_subscriber("reader@example.com", id).unwrap();
        store.flush().unwrap();
        id
    };

    let store = SledStore::open(dir.path()).unwrap();
    assert_eq!(store.book(id).unwrap().unwrap().title, "Lavinia");
    assert_eq!(store.subscribers_for(id).unwrap().len(), 1);
}

#[test]
fn test_record_id_rejects_ids_past_i64() {
    assert_eq!(record_id(0).unwrap(), 1);
    assert_eq!(record_id(41).unwrap(), 42);

    for generated in [i64::MAX as u64, u64::MAX] {
        match record_id(generated) {
            Err(StoreError::IdExhausted(id)) => assert_eq!(id, generated),
            other => panic!("Expected IdExhausted, got {other:?}"),
        }
    }
}
