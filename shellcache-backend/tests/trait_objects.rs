use std::sync::Arc;

use shellcache_backend::{CacheStore, DeleteStatus, MemoryStore};
use shellcache_core::{EntryKey, ResponseSnapshot};
use url::Url;

fn key(path: &str) -> EntryKey {
    EntryKey::get(&Url::parse(&format!("https://school.example{path}")).unwrap())
}

#[tokio::test]
async fn test_arc_dyn_store_shares_state() {
    let memory = MemoryStore::new().with_label("primary");
    let store: Arc<dyn CacheStore> = Arc::new(memory.clone());

    store
        .write("app:v1:shell", &key("/"), ResponseSnapshot::ok("root"))
        .await
        .unwrap();

    assert_eq!(store.label(), "primary");
    assert_eq!(memory.len("app:v1:shell"), Some(1));
    let hit = store.read("app:v1:shell", &key("/")).await.unwrap().unwrap();
    assert_eq!(hit.body().as_ref(), b"root");
}

#[tokio::test]
async fn test_boxed_store_keys_and_remove() {
    let store: Box<dyn CacheStore> = Box::new(MemoryStore::new());
    store
        .write("ns", &key("/a"), ResponseSnapshot::ok("a"))
        .await
        .unwrap();
    store
        .write("ns", &key("/b"), ResponseSnapshot::ok("b"))
        .await
        .unwrap();

    let mut keys: Vec<String> = store
        .keys("ns")
        .await
        .unwrap()
        .iter()
        .map(|k| k.url().to_owned())
        .collect();
    keys.sort();
    assert_eq!(
        keys,
        vec!["https://school.example/a", "https://school.example/b"]
    );

    assert_eq!(
        store.remove("ns", &key("/a")).await.unwrap(),
        DeleteStatus::Deleted(1)
    );
    assert_eq!(
        store.remove("ns", &key("/a")).await.unwrap(),
        DeleteStatus::Missing
    );
    assert!(store.keys("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_writes_to_one_namespace() {
    let store = Arc::new(MemoryStore::new());
    let writes = (0..32).map(|i| {
        let store = Arc::clone(&store);
        async move {
            store
                .write("ns", &key(&format!("/{i}")), ResponseSnapshot::ok(i.to_string()))
                .await
        }
    });
    for result in futures::future::join_all(writes).await {
        result.unwrap();
    }
    assert_eq!(store.len("ns"), Some(32));
}
