//! Node Module Tests
//!
//! End-to-end checks against real nodes on ephemeral ports.
//!
//! ## Test Scopes
//! - **Dispatcher**: status codes for bad methods, paths, bodies and unknown routes.
//! - **Groups**: forming a group across nodes and converging after `add`.
//! - **Storage**: distributed mem and store round trips through the key owner.
//! - **RPC and Routes**: exported stubs and services installed from descriptors.
//! - **Lifecycle**: spawning and stopping nodes.

#[cfg(test)]
mod tests {
    use crate::codec::natives::{self, ID_MODULE};
    use crate::codec::{self, Value};
    use crate::comm::{Aggregate, Envelope, RemoteTarget, Transport};
    use crate::config::NodeConfig;
    use crate::error::{Error, ErrorKind};
    use crate::membership::types::{ALL, GroupConfig, Members, Node, members_of};
    use crate::node::{NodeHandle, parse_path, start};
    use crate::routes::rpc::descriptor;
    use reqwest::StatusCode;
    use std::time::Duration;
    use uuid::Uuid;

    async fn start_node() -> NodeHandle {
        let root = std::env::temp_dir().join(format!("node-test-{}", Uuid::new_v4()));
        let config = NodeConfig::new(Node::new("127.0.0.1", 0))
            .with_store_root(root)
            .with_request_timeout(Duration::from_secs(5));
        start(config).await.unwrap()
    }

    fn transport() -> Transport {
        Transport::new(Duration::from_secs(5))
    }

    async fn call(
        node: &Node,
        gid: &str,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, Error> {
        let target = RemoteTarget::new(node.clone(), service, method).with_gid(gid);
        transport().call(&args, &target).await
    }

    /// Calls a group-scoped service whose reply is a per-member aggregate.
    async fn fan(node: &Node, gid: &str, service: &str, method: &str, args: Vec<Value>) -> Aggregate {
        let target = RemoteTarget::new(node.clone(), service, method).with_gid(gid);
        Aggregate::from_envelope(&transport().send(&args, &target).await.unwrap())
    }

    /// Two nodes sharing group `g`, set up through the distributed groups service.
    async fn pair() -> (NodeHandle, NodeHandle, Members) {
        let a = start_node().await;
        let b = start_node().await;
        let members = members_of([a.node().clone(), b.node().clone()]);

        a.context().groups.put("g", members.clone());
        let aggregate = a
            .context()
            .group("g")
            .unwrap()
            .groups
            .put(&GroupConfig::new("g"), &members)
            .await
            .unwrap();
        assert!(aggregate.is_complete(), "{:?}", aggregate.errors);
        assert_eq!(aggregate.results.len(), 2);
        (a, b, members)
    }

    // ============================================================
    // DISPATCHER
    // ============================================================

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("/local/status/get").unwrap(), ("local", "status", "get"));
        assert!(parse_path("/local/status").is_err());
        assert!(parse_path("/local/status/get/extra").is_err());
        assert!(parse_path("/local//get").is_err());
    }

    #[tokio::test]
    async fn test_status_over_http() {
        let a = start_node().await;
        let node = a.node().clone();
        assert_ne!(node.port, 0);

        let reply = call(&node, "local", "status", "get", vec![Value::from("sid")]).await;
        assert_eq!(reply.unwrap(), Value::from(node.sid()));

        let reply = call(&node, "local", "status", "get", vec![Value::from("port")]).await;
        assert_eq!(reply.unwrap(), Value::from(node.port));

        let error = call(&node, "local", "status", "get", vec![Value::from("nope")])
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::KeyNotFound);
        a.stop().await;
    }

    #[tokio::test]
    async fn test_dispatcher_status_codes() {
        let a = start_node().await;
        let base = format!("http://{}", a.node().addr());
        let client = reqwest::Client::new();
        let args = codec::serialize(&Value::array([Value::from("sid")])).unwrap();

        let response = client.get(format!("{base}/local/status/get")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = client
            .put(format!("{base}/local/status"))
            .body(args.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = client
            .put(format!("{base}/local/status/get"))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let not_a_list = codec::serialize(&Value::from("sid")).unwrap();
        let response = client
            .put(format!("{base}/local/status/get"))
            .body(not_a_list)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        for path in ["/local/nope/get", "/local/status/nope", "/nogroup/status/get"] {
            let response = client
                .put(format!("{base}{path}"))
                .body(args.clone())
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        }

        let response = client
            .put(format!("{base}/local/status/get"))
            .body(args)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        a.stop().await;
    }

    #[tokio::test]
    async fn test_dispatcher_errors_carry_kind() {
        let a = start_node().await;
        let target = RemoteTarget::new(a.node().clone(), "nope", "get");
        let error = transport().call(&[], &target).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        a.stop().await;
    }

    #[tokio::test]
    async fn test_messages_are_counted() {
        let a = start_node().await;
        let node = a.node().clone();
        call(&node, "local", "status", "get", vec![Value::from("sid")]).await.unwrap();
        call(&node, "local", "status", "get", vec![Value::from("sid")]).await.unwrap();

        // the counting call itself is dispatched before it reads the counter
        let reply = call(&node, "local", "status", "get", vec![Value::from("counts")]).await;
        assert_eq!(reply.unwrap(), Value::from(3));
        a.stop().await;
    }

    // ============================================================
    // GROUPS
    // ============================================================

    #[tokio::test]
    async fn test_group_forms_on_every_member() {
        let (a, b, members) = pair().await;

        assert_eq!(b.context().groups.get("g").unwrap(), members);
        assert!(b.context().group("g").is_some());
        assert!(b.context().groups.get(ALL).unwrap().contains_key(&a.node().sid()));

        let aggregate = fan(b.node(), "g", "status", "get", vec![Value::from("sid")]).await;
        assert!(aggregate.is_complete());
        assert_eq!(aggregate.results.get(&a.node().sid()), Some(&Value::from(a.node().sid())));
        assert_eq!(aggregate.results.get(&b.node().sid()), Some(&Value::from(b.node().sid())));

        let reply = call(b.node(), "g", "status", "get", vec![Value::from("counts")]).await;
        let total = reply.unwrap().as_f64().unwrap();
        assert!(total >= 2.0);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_membership_converges_after_add() {
        let (a, b, _) = pair().await;
        let c = start_node().await;

        let aggregate = a
            .context()
            .group("g")
            .unwrap()
            .groups
            .add("g", c.node())
            .await
            .unwrap();
        assert!(aggregate.is_complete());

        for handle in [&a, &b] {
            let members = handle.context().groups.get("g").unwrap();
            assert_eq!(members.len(), 3);
            assert!(members.contains_key(&c.node().sid()));
        }

        let reply = call(a.node(), "local", "groups", "add", vec![Value::from("unknown"), c.node().to_value()]).await;
        assert_eq!(reply.unwrap(), Value::Null);

        a.stop().await;
        b.stop().await;
        c.stop().await;
    }

    #[tokio::test]
    async fn test_group_del_on_every_member() {
        let (a, b, _) = pair().await;
        let aggregate = a.context().group("g").unwrap().groups.del("g").await.unwrap();
        assert!(aggregate.is_complete());
        assert!(a.context().groups.get("g").is_err());
        assert!(b.context().group("g").is_none());

        let reply = call(b.node(), "local", "groups", "get", vec![Value::from("g")]).await;
        assert_eq!(reply.unwrap_err().kind(), ErrorKind::GroupNotFound);
        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_unreachable_member_is_reported() {
        let (a, b, _) = pair().await;
        let b_sid = b.node().sid();
        b.stop().await;

        let aggregate = a.context().group("g").unwrap().status.get("sid").await.unwrap();
        assert!(aggregate.results.contains_key(&a.node().sid()));
        assert_eq!(aggregate.errors.get(&b_sid).map(|e| e.kind()), Some(ErrorKind::ConnectionError));
        a.stop().await;
    }

    // ============================================================
    // STORAGE
    // ============================================================

    #[tokio::test]
    async fn test_store_round_trip() {
        let (a, b, _) = pair().await;
        let value = Value::object([
            ("first".to_string(), Value::from("Josiah")),
            ("last".to_string(), Value::from("Carberry")),
        ]);

        let group_a = a.context().group("g").unwrap();
        let store_a = &group_a.store;
        store_a.put(value.clone(), Some("jcarb")).await.unwrap();

        let group_b = b.context().group("g").unwrap();
        let store_b = &group_b.store;
        assert_eq!(store_b.owner("jcarb").unwrap(), store_a.owner("jcarb").unwrap());
        assert_eq!(store_b.get(Some("jcarb")).await.unwrap(), value);

        let keys = store_b.get(None).await.unwrap().items().unwrap();
        assert_eq!(keys, vec![Value::from("jcarb")]);

        assert_eq!(store_b.del("jcarb").await.unwrap(), value);
        let error = store_a.get(Some("jcarb")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::KeyNotFound);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_mem_over_http() {
        let (a, b, _) = pair().await;
        let value = Value::array([Value::from(1), Value::from("two")]);

        let reply = call(a.node(), "g", "mem", "put", vec![value.clone(), Value::from("k")]).await;
        assert_eq!(reply.unwrap(), value);

        let reply = call(b.node(), "g", "mem", "get", vec![Value::from("k")]).await;
        assert_eq!(reply.unwrap(), value);

        // stored under the group's gid, not the local one
        let reply = call(a.node(), "local", "mem", "get", vec![Value::from("k")]).await;
        assert_eq!(reply.unwrap_err().kind(), ErrorKind::KeyNotFound);

        let reply = call(b.node(), "g", "mem", "del", vec![Value::from("k")]).await;
        assert_eq!(reply.unwrap(), value);
        let reply = call(a.node(), "g", "mem", "get", vec![Value::from("k")]).await;
        assert_eq!(reply.unwrap_err().kind(), ErrorKind::KeyNotFound);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_put_without_key_uses_content_id() {
        let (a, b, _) = pair().await;
        let value = Value::from("content addressed");
        let key = crate::identity::content_id(&value).unwrap();

        a.context().group("g").unwrap().mem.put(value.clone(), None).await.unwrap();
        let found = b.context().group("g").unwrap().mem.get(Some(&key)).await.unwrap();
        assert_eq!(found, value);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_reconf_over_http() {
        let (a, b, _) = pair().await;
        let hash = natives::native(ID_MODULE, "rendezvousHash");
        let reply = call(a.node(), "g", "store", "reconf", vec![Value::Function(hash)]).await;
        assert_eq!(
            reply.unwrap(),
            crate::identity::Placement::Rendezvous.to_value()
        );
        assert_eq!(
            a.context().group("g").unwrap().store.placement(),
            crate::identity::Placement::Rendezvous
        );
        a.stop().await;
        b.stop().await;
    }

    // ============================================================
    // RPC AND ROUTES
    // ============================================================

    #[tokio::test]
    async fn test_exported_stub_is_callable_from_another_node() {
        let (a, b, _) = pair().await;
        let stub = a.context().export(|_ctx, args| async move {
            let n = args.first().and_then(Value::as_f64).unwrap_or_default();
            Envelope::ok(n * 2.0)
        });

        let result = stub.invoke(&b.context().comm, vec![Value::from(21)]).await.unwrap();
        assert_eq!(result, Value::from(42));

        // the stub survives a trip through the codec
        let shipped = codec::deserialize(&codec::serialize(&Value::Function(stub.clone())).unwrap()).unwrap();
        let shipped = shipped.as_callable().unwrap().clone();
        assert_eq!(shipped.invoke(&b.context().comm, vec![Value::from(1)]).await.unwrap(), Value::from(2));

        assert!(a.context().rpc.revoke(&stub));
        let error = stub.invoke(&b.context().comm, vec![Value::from(1)]).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_distributed_routes_put_and_rem() {
        let (a, b, _) = pair().await;
        let stub = a.context().export(|ctx, _args| async move { Envelope::ok(ctx.node().to_value()) });
        let mapping = descriptor([("sid", natives::native(ID_MODULE, "getSID")), ("home", stub)]);

        let group = a.context().group("g").unwrap();
        let routes = &group.routes;
        let aggregate = routes.put(mapping, "ids").await.unwrap();
        assert!(aggregate.is_complete(), "{:?}", aggregate.errors);

        let reply = call(b.node(), "local", "ids", "sid", vec![b.node().to_value()]).await;
        assert_eq!(reply.unwrap(), Value::from(b.node().sid()));

        // the stub runs where it was exported
        let reply = call(b.node(), "local", "ids", "home", vec![]).await;
        assert_eq!(reply.unwrap(), a.node().to_value());

        let reply = call(b.node(), "local", "routes", "get", vec![Value::from("ids")]).await;
        assert_eq!(
            reply.unwrap(),
            Value::array([Value::from("home"), Value::from("sid")])
        );

        routes.rem("ids").await.unwrap();
        let reply = call(b.node(), "local", "routes", "get", vec![Value::from("ids")]).await;
        assert_eq!(reply.unwrap_err().kind(), ErrorKind::ServiceNotFound);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_comm_send_relays() {
        let (a, b, _) = pair().await;
        let target = RemoteTarget::new(b.node().clone(), "status", "get");
        let reply = call(
            a.node(),
            "local",
            "comm",
            "send",
            vec![Value::array([Value::from("sid")]), target.to_value()],
        )
        .await;
        assert_eq!(reply.unwrap(), Value::from(b.node().sid()));
        a.stop().await;
        b.stop().await;
    }

    // ============================================================
    // LIFECYCLE
    // ============================================================

    #[tokio::test]
    async fn test_spawn_and_stop() {
        let a = start_node().await;
        let child = a.context().spawn(Node::new("127.0.0.1", 0)).await.unwrap();
        assert_ne!(child.port, 0);
        assert!(a.context().groups.get(ALL).unwrap().contains_key(&child.sid()));
        assert_eq!(a.context().children(), vec![child.clone()]);

        let reply = call(&child, "local", "status", "get", vec![Value::from("sid")]).await;
        assert_eq!(reply.unwrap(), Value::from(child.sid()));

        let reply = call(&child, "local", "status", "stop", vec![]).await;
        assert_eq!(reply.unwrap(), child.to_value());

        let target = RemoteTarget::new(child.clone(), "status", "get");
        let mut stopped = false;
        for _ in 0..50 {
            if transport().send(&[Value::from("sid")], &target).await.is_err() {
                stopped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(stopped, "child should stop accepting requests");
        a.stop().await;
    }

    #[tokio::test]
    async fn test_group_spawn_joins_group() {
        let (a, b, _) = pair().await;
        let aggregate = fan(
            a.node(),
            "g",
            "status",
            "spawn",
            vec![Node::new("127.0.0.1", 0).to_value()],
        )
        .await;
        assert!(aggregate.is_complete(), "{:?}", aggregate.errors);

        let child = a.context().children().pop().unwrap();
        assert!(a.context().groups.get("g").unwrap().contains_key(&child.sid()));
        assert!(b.context().groups.get("g").unwrap().contains_key(&child.sid()));

        a.stop().await;
        b.stop().await;
    }
}
