#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use streamrelay_client::identity::CLIENT_ID_KEY;
use streamrelay_client::{ClientIdentity, FileStore, KeyValueStore, MemoryStore};

#[test]
fn id_is_stable_within_one_store() {
    let store = Arc::new(MemoryStore::new());
    let a = ClientIdentity::new(store.clone()).get_or_create_id();
    let b = ClientIdentity::new(store.clone()).get_or_create_id();
    assert_eq!(a, b);
}

#[test]
fn wiped_store_yields_a_new_id() {
    let store = Arc::new(MemoryStore::new());
    let a = ClientIdentity::new(store.clone()).get_or_create_id();
    store.clear();
    let b = ClientIdentity::new(store.clone()).get_or_create_id();
    assert_ne!(a, b);
}

#[test]
fn cached_id_survives_a_wipe_for_the_same_identity() {
    let store = Arc::new(MemoryStore::new());
    let identity = ClientIdentity::new(store.clone());
    let a = identity.get_or_create_id();
    store.clear();
    assert_eq!(identity.get_or_create_id(), a);
}

#[test]
fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.json");

    let first = {
        let store = Arc::new(FileStore::open(&path).unwrap());
        ClientIdentity::new(store).get_or_create_id()
    };
    let store = Arc::new(FileStore::open(&path).unwrap());
    assert_eq!(store.get(CLIENT_ID_KEY).unwrap().as_deref(), Some(first.as_str()));
    assert_eq!(ClientIdentity::new(store).get_or_create_id(), first);
}

#[test]
fn file_store_remove_and_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.json");

    let store = FileStore::open(&path).unwrap();
    store.set("activity_id", "evt1").unwrap();
    store.remove("activity_id").unwrap();
    assert_eq!(FileStore::open(&path).unwrap().get("activity_id").unwrap(), None);

    std::fs::write(&path, "{not json").unwrap();
    let err = FileStore::open(&path).err().expect("corrupt file must fail");
    assert_eq!(err.client_code().as_str(), "STORAGE");
}
