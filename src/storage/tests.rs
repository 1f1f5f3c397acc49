//! Storage Module Tests
//!
//! Validates key addressing, both local stores and owner selection.
//!
//! ## Test Scopes
//! - **KeyConfig**: the three accepted shapes and sanitizing.
//! - **MemStore / DiskStore**: put, get, del, listing and idempotence.
//! - **DistributedKv**: deterministic owner choice and reconfiguration.
//!
//! *Note: network round trips through the owner are tested in `node::tests`.*

#[cfg(test)]
mod tests {
    use crate::codec::Value;
    use crate::comm::{GroupComm, Transport};
    use crate::error::ErrorKind;
    use crate::identity::Placement;
    use crate::membership::groups::GroupTable;
    use crate::membership::types::{Node, members_of};
    use crate::storage::protocol::sanitize;
    use crate::storage::{DiskStore, DistributedKv, KeyConfig, KvKind, MemStore};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestBook {
        id: String,
        title: String,
        author: String,
    }

    fn book(id: &str, title: &str) -> Value {
        Value::from_serde(&TestBook {
            id: id.to_string(),
            title: title.to_string(),
            author: "Steve".to_string(),
        })
        .unwrap()
    }

    fn temp_store() -> DiskStore {
        DiskStore::new(std::env::temp_dir().join(format!("store-test-{}", uuid::Uuid::new_v4())))
    }

    // ============================================================
    // KEY CONFIG
    // ============================================================

    #[test]
    fn test_key_config_shapes() {
        assert_eq!(KeyConfig::from_value(&Value::Null), Some(KeyConfig::all("local")));
        assert_eq!(KeyConfig::from_value(&Value::from("k1")), Some(KeyConfig::new("k1")));

        let scoped = Value::object([
            ("key".to_string(), Value::from("k1")),
            ("gid".to_string(), Value::from("g")),
        ]);
        assert_eq!(
            KeyConfig::from_value(&scoped),
            Some(KeyConfig::scoped("g", Some("k1".to_string())))
        );
        assert_eq!(KeyConfig::from_value(&Value::from(3.0)), None);
    }

    #[test]
    fn test_sanitize_keeps_alphanumerics() {
        assert_eq!(sanitize("user:42/../etc"), "user42etc");
        assert_eq!(sanitize("--"), "");
    }

    // ============================================================
    // MEM STORE
    // ============================================================

    #[test]
    fn test_mem_put_get_del() {
        let mem = MemStore::new();
        let value = book("book-001", "Rust Programming");

        mem.put(value.clone(), &KeyConfig::new("b1")).unwrap();
        assert_eq!(mem.get(&KeyConfig::new("b1")).unwrap(), value);

        assert_eq!(mem.del(&KeyConfig::new("b1")).unwrap(), value);
        let error = mem.get(&KeyConfig::new("b1")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_mem_put_is_idempotent() {
        let mem = MemStore::new();
        let value = book("book-001", "Original Title");
        mem.put(value.clone(), &KeyConfig::new("b1")).unwrap();
        mem.put(value.clone(), &KeyConfig::new("b1")).unwrap();

        assert_eq!(mem.keys("local"), vec!["b1".to_string()]);
        assert_eq!(mem.get(&KeyConfig::new("b1")).unwrap(), value);
    }

    #[test]
    fn test_mem_put_without_key_uses_content_id() {
        let mem = MemStore::new();
        let value = book("book-002", "Untitled");
        mem.put(value.clone(), &KeyConfig::all("local")).unwrap();

        let key = crate::identity::content_id(&value).unwrap();
        assert_eq!(mem.get(&KeyConfig::new(key)).unwrap(), value);
    }

    #[test]
    fn test_mem_gids_are_separate() {
        let mem = MemStore::new();
        mem.put(Value::from("a"), &KeyConfig::scoped("g1", Some("k".to_string())))
            .unwrap();

        assert!(mem.get(&KeyConfig::new("k")).is_err());
        assert_eq!(
            mem.get(&KeyConfig::all("g1")).unwrap(),
            Value::array([Value::from("k")])
        );
    }

    #[test]
    fn test_mem_del_requires_key() {
        let mem = MemStore::new();
        let error = mem.del(&KeyConfig::all("local")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
    }

    // ============================================================
    // DISK STORE
    // ============================================================

    #[tokio::test]
    async fn test_disk_put_get_del() {
        let store = temp_store();
        let value = book("book-001", "Rust Programming");
        let config = KeyConfig::scoped("g", Some("book-001".to_string()));

        store.put(value.clone(), &config).await.unwrap();
        assert_eq!(store.get(&config).await.unwrap(), value);
        assert_eq!(
            store.get(&KeyConfig::all("g")).await.unwrap(),
            Value::array([Value::from("book001")])
        );

        assert_eq!(store.del(&config).await.unwrap(), value);
        let error = store.get(&config).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::KeyNotFound);

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test]
    async fn test_disk_preserves_cycles() {
        let store = temp_store();
        let value = Value::empty_object();
        value.set("me", value.clone());

        store.put(value, &KeyConfig::new("loop")).await.unwrap();
        let back = store.get(&KeyConfig::new("loop")).await.unwrap();
        assert!(back.get("me").unwrap().same(&back));

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_disk_readers_never_see_partial_writes() {
        let store = temp_store();
        let config = KeyConfig::scoped("g", Some("k".to_string()));
        let value = Value::array((0..2000).map(|i| Value::from(format!("{i:0>100}"))));
        store.put(value.clone(), &config).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let (store, config, value) = (store.clone(), config.clone(), value.clone());
            tasks.spawn(async move {
                let mut failures = 0;
                for _ in 0..50 {
                    if store.put(value.clone(), &config).await.is_err() {
                        failures += 1;
                    }
                }
                failures
            });
        }
        for _ in 0..8 {
            let (store, config, value) = (store.clone(), config.clone(), value.clone());
            tasks.spawn(async move {
                let mut failures = 0;
                for _ in 0..50 {
                    match store.get(&config).await {
                        Ok(read) if read == value => {}
                        _ => failures += 1,
                    }
                }
                failures
            });
        }

        let mut failures = 0;
        while let Some(joined) = tasks.join_next().await {
            failures += joined.unwrap();
        }
        assert_eq!(failures, 0);

        // no temp file is left behind or listed
        assert_eq!(
            store.get(&KeyConfig::all("g")).await.unwrap(),
            Value::array([Value::from("k")])
        );
        let mut entries = tokio::fs::read_dir(store.root().join("g")).await.unwrap();
        let mut files = 0;
        while entries.next_entry().await.unwrap().is_some() {
            files += 1;
        }
        assert_eq!(files, 1);

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test]
    async fn test_disk_del_and_put_do_not_interleave() {
        let store = temp_store();
        let config = KeyConfig::scoped("g", Some("k".to_string()));
        store.put(Value::from("first"), &config).await.unwrap();

        let deleting = {
            let (store, config) = (store.clone(), config.clone());
            tokio::spawn(async move { store.del(&config).await })
        };
        let putting = {
            let (store, config) = (store.clone(), config.clone());
            tokio::spawn(async move { store.put(Value::from("second"), &config).await })
        };
        let deleted = deleting.await.unwrap().unwrap();
        putting.await.unwrap().unwrap();

        // whichever ran first, del returns exactly what it removed
        match store.get(&config).await {
            Ok(left) => {
                assert_eq!(left, Value::from("second"));
                assert_eq!(deleted, Value::from("first"));
            }
            Err(error) => {
                assert_eq!(error.kind(), ErrorKind::KeyNotFound);
                assert_eq!(deleted, Value::from("second"));
            }
        }

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test]
    async fn test_disk_listing_of_unknown_gid_is_empty() {
        let store = temp_store();
        assert_eq!(
            store.get(&KeyConfig::all("nothing")).await.unwrap(),
            Value::array([])
        );
    }

    #[tokio::test]
    async fn test_disk_rejects_unusable_key() {
        let store = temp_store();
        let error = store
            .put(Value::from(1.0), &KeyConfig::new("///"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
    }

    // ============================================================
    // DISTRIBUTED KV (owner selection)
    // ============================================================

    fn kv(placement: Placement, nodes: Vec<Node>) -> DistributedKv {
        let table = Arc::new(GroupTable::new());
        table.put("g", members_of(nodes));
        let comm = GroupComm::new("g", table, Transport::new(Duration::from_secs(1)));
        DistributedKv::new(KvKind::Store, comm, placement)
    }

    #[test]
    fn test_owner_is_deterministic_member() {
        let nodes: Vec<Node> = (0..4).map(|i| Node::new("127.0.0.1", 9100 + i)).collect();
        for placement in Placement::ALL {
            let store = kv(placement, nodes.clone());
            for i in 0..50 {
                let key = format!("key{}", i);
                let owner = store.owner(&key).unwrap();
                assert!(nodes.contains(&owner));
                assert_eq!(store.owner(&key).unwrap(), owner);
            }
        }
    }

    #[test]
    fn test_owner_of_empty_group() {
        let store = kv(Placement::Naive, vec![]);
        assert_eq!(store.owner("k").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_reconf_swaps_strategy() {
        let store = kv(Placement::Naive, vec![Node::new("127.0.0.1", 9200)]);
        assert_eq!(store.reconf(Placement::Consistent), Placement::Naive);
        assert_eq!(store.placement(), Placement::Consistent);
    }
}
