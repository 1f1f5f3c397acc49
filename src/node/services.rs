//! Wire bindings of the built-in services.
//!
//! Each function below turns one subsystem into a [`ServiceObject`]: it pulls
//! the positional arguments out of the message, calls the subsystem and wraps
//! the outcome in an envelope. Argument shapes that do not parse are answered
//! with `BadRequest`.

use super::context::NodeContext;
use crate::codec::Value;
use crate::comm::{Aggregate, Envelope, FanoutTarget, RemoteTarget};
use crate::error::{DispatchError, Error};
use crate::identity::Placement;
use crate::membership::bindings::GroupServices;
use crate::membership::types::{
    GroupConfig, MemberRef, Members, Node, members_from_value, members_to_value,
};
use crate::routes::ServiceKey;
use crate::routes::rpc::service_from_descriptor;
use crate::routes::service::ServiceObject;
use crate::status::{self, SUMMED_KEYS};
use crate::storage::{KeyConfig, KvKind};

use std::future::Future;
use std::sync::Arc;

static UNDEFINED: Value = Value::Undefined;

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&UNDEFINED)
}

fn bad_request(message: impl Into<String>) -> Envelope {
    Envelope::from_error(&DispatchError::BadRequest(message.into()).into())
}

fn fanout_reply<E: Into<Error>>(result: Result<Aggregate, E>) -> Envelope {
    match result {
        Ok(aggregate) => aggregate.to_envelope(),
        Err(e) => Envelope::from_error(&e.into()),
    }
}

fn members_reply(members: Option<Members>) -> Envelope {
    Envelope::ok(members.as_ref().map(members_to_value).unwrap_or(Value::Null))
}

/// `null`, a key string, or `{key}`; the outer `None` means unparseable.
fn key_arg(value: &Value) -> Option<Option<String>> {
    match value {
        Value::String(key) => Some(Some(key.clone())),
        other => KeyConfig::from_value(other).map(|config| config.key),
    }
}

/// Services bound under gid `local` on every node.
pub(crate) fn local_services() -> Vec<ServiceObject> {
    vec![
        status_service(),
        groups_service(),
        routes_service(),
        comm_service(),
        mem_service(),
        store_service(),
    ]
}

fn status_service() -> ServiceObject {
    ServiceObject::new("status")
        .with("get", |ctx, args| async move {
            let Some(key) = arg(&args, 0).as_str() else {
                return bad_request("status.get expects a key");
            };
            Envelope::from_result(ctx.status.get(key).map_err(Error::from))
        })
        .with("spawn", |ctx, args| async move {
            let Some(node) = Node::from_value(arg(&args, 0)) else {
                return bad_request("status.spawn expects a node {ip, port}");
            };
            Envelope::from_result(ctx.spawn(node).await.map(|node| node.to_value()))
        })
        .with("stop", |ctx, _args| async move {
            ctx.stop();
            Envelope::ok(ctx.node().to_value())
        })
}

fn groups_service() -> ServiceObject {
    ServiceObject::new("groups")
        .with("get", |ctx, args| async move {
            let Some(name) = arg(&args, 0).as_str() else {
                return bad_request("groups.get expects a group name");
            };
            Envelope::from_result(
                ctx.groups
                    .get(name)
                    .map(|members| members_to_value(&members))
                    .map_err(Error::from),
            )
        })
        .with("put", |ctx, args| async move {
            let Some(config) = GroupConfig::from_value(arg(&args, 0)) else {
                return bad_request("groups.put expects a gid or {gid, hash}");
            };
            let members = match arg(&args, 1) {
                value if value.is_nullish() => Members::new(),
                value => match members_from_value(value) {
                    Some(members) => members,
                    None => return bad_request("groups.put expects a {sid: node} mapping"),
                },
            };
            Envelope::ok(members_to_value(&ctx.groups.put(config, members)))
        })
        .with("del", |ctx, args| async move {
            let Some(name) = arg(&args, 0).as_str() else {
                return bad_request("groups.del expects a group name");
            };
            Envelope::from_result(
                ctx.groups
                    .del(name)
                    .map(|members| members_to_value(&members))
                    .map_err(Error::from),
            )
        })
        .with("add", |ctx, args| async move {
            let (Some(name), Some(node)) = (arg(&args, 0).as_str(), Node::from_value(arg(&args, 1)))
            else {
                return bad_request("groups.add expects a group name and a node");
            };
            members_reply(ctx.groups.add(name, node))
        })
        .with("rem", |ctx, args| async move {
            let (Some(name), Some(member)) =
                (arg(&args, 0).as_str(), MemberRef::from_value(arg(&args, 1)))
            else {
                return bad_request("groups.rem expects a group name and a node or sid");
            };
            members_reply(ctx.groups.rem(name, &member))
        })
}

fn method_list(service: &ServiceObject) -> Value {
    Value::array(service.method_names().into_iter().map(Value::from))
}

fn routes_service() -> ServiceObject {
    ServiceObject::new("routes")
        .with("get", |ctx, args| async move {
            let Some(key) = ServiceKey::from_value(arg(&args, 0)) else {
                return bad_request("routes.get expects a service name or {service, gid}");
            };
            Envelope::from_result(
                ctx.routes
                    .get(&key)
                    .map(|service| method_list(&service))
                    .map_err(Error::from),
            )
        })
        .with("put", |ctx, args| async move {
            let Some(key) = ServiceKey::from_value(arg(&args, 1)) else {
                return bad_request("routes.put expects a service name or {service, gid}");
            };
            let Some(service) = service_from_descriptor(&key.service, arg(&args, 0)) else {
                return bad_request("routes.put expects a {method: function} mapping");
            };
            let name = Value::from(key.service.as_str());
            ctx.routes.put(Arc::new(service), key);
            Envelope::ok(name)
        })
        .with("rem", |ctx, args| async move {
            let Some(key) = ServiceKey::from_value(arg(&args, 0)) else {
                return bad_request("routes.rem expects a service name or {service, gid}");
            };
            Envelope::from_result(
                ctx.routes
                    .rem(&key)
                    .map(|service| method_list(&service))
                    .map_err(Error::from),
            )
        })
}

fn comm_service() -> ServiceObject {
    ServiceObject::new("comm").with("send", |ctx, args| async move {
        let Some(message) = arg(&args, 0).items() else {
            return bad_request("comm.send expects an argument list");
        };
        let target = RemoteTarget::from_value(arg(&args, 1));
        match ctx.comm.send(&message, &target).await {
            Ok(envelope) => envelope,
            Err(e) => Envelope::from_error(&e.into()),
        }
    })
}

fn mem_service() -> ServiceObject {
    ServiceObject::new("mem")
        .with("get", |ctx, args| async move {
            match KeyConfig::from_value(arg(&args, 0)) {
                Some(config) => Envelope::from_result(ctx.mem.get(&config)),
                None => bad_request("mem.get expects a key configuration"),
            }
        })
        .with("put", |ctx, args| async move {
            match KeyConfig::from_value(arg(&args, 1)) {
                Some(config) => Envelope::from_result(ctx.mem.put(arg(&args, 0).clone(), &config)),
                None => bad_request("mem.put expects a key configuration"),
            }
        })
        .with("del", |ctx, args| async move {
            match KeyConfig::from_value(arg(&args, 0)) {
                Some(config) => Envelope::from_result(ctx.mem.del(&config)),
                None => bad_request("mem.del expects a key configuration"),
            }
        })
}

fn store_service() -> ServiceObject {
    ServiceObject::new("store")
        .with("get", |ctx, args| async move {
            match KeyConfig::from_value(arg(&args, 0)) {
                Some(config) => Envelope::from_result(ctx.store.get(&config).await),
                None => bad_request("store.get expects a key configuration"),
            }
        })
        .with("put", |ctx, args| async move {
            match KeyConfig::from_value(arg(&args, 1)) {
                Some(config) => {
                    Envelope::from_result(ctx.store.put(arg(&args, 0).clone(), &config).await)
                }
                None => bad_request("store.put expects a key configuration"),
            }
        })
        .with("del", |ctx, args| async move {
            match KeyConfig::from_value(arg(&args, 0)) {
                Some(config) => Envelope::from_result(ctx.store.del(&config).await),
                None => bad_request("store.del expects a key configuration"),
            }
        })
}

/// Adapts a handler that also needs the group's services.
fn scoped<F, Fut>(
    services: &Arc<GroupServices>,
    handler: F,
) -> impl Fn(Arc<NodeContext>, Vec<Value>) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<GroupServices>, Arc<NodeContext>, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Envelope> + Send + 'static,
{
    let services = services.clone();
    move |ctx, args| handler(services.clone(), ctx, args)
}

/// Services bound under a group's gid when the group is put.
pub(crate) fn group_services(services: &Arc<GroupServices>) -> Vec<ServiceObject> {
    vec![
        group_status(services),
        group_comm(services),
        group_groups(services),
        group_routes(services),
        group_kv(services, KvKind::Mem),
        group_kv(services, KvKind::Store),
    ]
}

fn group_status(services: &Arc<GroupServices>) -> ServiceObject {
    ServiceObject::new("status")
        .with(
            "get",
            scoped(services, |group, _ctx, args| async move {
                let Some(key) = arg(&args, 0).as_str().map(str::to_string) else {
                    return bad_request("status.get expects a key");
                };
                let aggregate = match group.status.get(&key).await {
                    Ok(aggregate) => aggregate,
                    Err(e) => return Envelope::from_error(&e.into()),
                };
                let summed = SUMMED_KEYS
                    .contains(&key.as_str())
                    .then(|| status::total(&aggregate))
                    .flatten();
                match summed {
                    Some(sum) => Envelope::pair(aggregate.to_envelope().error, Value::from(sum)),
                    None => aggregate.to_envelope(),
                }
            }),
        )
        .with(
            "spawn",
            scoped(services, |group, ctx, args| async move {
                let Some(node) = Node::from_value(arg(&args, 0)) else {
                    return bad_request("status.spawn expects a node {ip, port}");
                };
                fanout_reply(group.status.spawn(&ctx, node).await)
            }),
        )
        .with(
            "stop",
            scoped(services, |group, _ctx, _args| async move {
                fanout_reply(group.status.stop().await)
            }),
        )
}

fn group_comm(services: &Arc<GroupServices>) -> ServiceObject {
    ServiceObject::new("comm").with(
        "send",
        scoped(services, |group, _ctx, args| async move {
            let (Some(message), Some(target)) =
                (arg(&args, 0).items(), FanoutTarget::from_value(arg(&args, 1)))
            else {
                return bad_request("comm.send expects an argument list and {service, method}");
            };
            fanout_reply(group.comm.send(message, &target).await)
        }),
    )
}

fn group_groups(services: &Arc<GroupServices>) -> ServiceObject {
    ServiceObject::new("groups")
        .with(
            "get",
            scoped(services, |group, _ctx, args| async move {
                let Some(name) = arg(&args, 0).as_str().map(str::to_string) else {
                    return bad_request("groups.get expects a group name");
                };
                fanout_reply(group.groups.get(&name).await)
            }),
        )
        .with(
            "put",
            scoped(services, |group, _ctx, args| async move {
                let Some(config) = GroupConfig::from_value(arg(&args, 0)) else {
                    return bad_request("groups.put expects a gid or {gid, hash}");
                };
                let Some(members) = members_from_value(arg(&args, 1)) else {
                    return bad_request("groups.put expects a {sid: node} mapping");
                };
                fanout_reply(group.groups.put(&config, &members).await)
            }),
        )
        .with(
            "del",
            scoped(services, |group, _ctx, args| async move {
                let Some(name) = arg(&args, 0).as_str().map(str::to_string) else {
                    return bad_request("groups.del expects a group name");
                };
                fanout_reply(group.groups.del(&name).await)
            }),
        )
        .with(
            "add",
            scoped(services, |group, _ctx, args| async move {
                let (Some(name), Some(node)) = (
                    arg(&args, 0).as_str().map(str::to_string),
                    Node::from_value(arg(&args, 1)),
                ) else {
                    return bad_request("groups.add expects a group name and a node");
                };
                fanout_reply(group.groups.add(&name, &node).await)
            }),
        )
        .with(
            "rem",
            scoped(services, |group, _ctx, args| async move {
                let (Some(name), Some(member)) = (
                    arg(&args, 0).as_str().map(str::to_string),
                    MemberRef::from_value(arg(&args, 1)),
                ) else {
                    return bad_request("groups.rem expects a group name and a node or sid");
                };
                fanout_reply(group.groups.rem(&name, &member).await)
            }),
        )
}

fn group_routes(services: &Arc<GroupServices>) -> ServiceObject {
    ServiceObject::new("routes")
        .with(
            "put",
            scoped(services, |group, _ctx, args| async move {
                let Some(name) = arg(&args, 1).as_str().map(str::to_string) else {
                    return bad_request("routes.put expects a service name");
                };
                fanout_reply(group.routes.put(arg(&args, 0).clone(), &name).await)
            }),
        )
        .with(
            "rem",
            scoped(services, |group, _ctx, args| async move {
                let Some(name) = arg(&args, 0).as_str().map(str::to_string) else {
                    return bad_request("routes.rem expects a service name");
                };
                fanout_reply(group.routes.rem(&name).await)
            }),
        )
}

fn group_kv(services: &Arc<GroupServices>, kind: KvKind) -> ServiceObject {
    ServiceObject::new(kind.service())
        .with(
            "get",
            scoped(services, move |group, _ctx, args| async move {
                let Some(key) = key_arg(arg(&args, 0)) else {
                    return bad_request("get expects a key or null");
                };
                Envelope::from_result(group.kv(kind).get(key.as_deref()).await)
            }),
        )
        .with(
            "put",
            scoped(services, move |group, _ctx, args| async move {
                let Some(key) = key_arg(arg(&args, 1)) else {
                    return bad_request("put expects a key or null");
                };
                let value = arg(&args, 0).clone();
                Envelope::from_result(group.kv(kind).put(value, key.as_deref()).await)
            }),
        )
        .with(
            "del",
            scoped(services, move |group, _ctx, args| async move {
                let Some(Some(key)) = key_arg(arg(&args, 0)) else {
                    return bad_request("del expects a key");
                };
                Envelope::from_result(group.kv(kind).del(&key).await)
            }),
        )
        .with(
            "reconf",
            scoped(services, move |group, _ctx, args| async move {
                let config = arg(&args, 0);
                let hash = Placement::from_value(config)
                    .or_else(|| config.get("hash").and_then(|hash| Placement::from_value(&hash)));
                let Some(placement) = hash else {
                    return bad_request("reconf expects a placement function");
                };
                group.kv(kind).reconf(placement);
                Envelope::ok(placement.to_value())
            }),
        )
}
