//! Demo services used by the `restkit-demo` binary and the integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};

use restkit_core::{EndpointError, HttpMethod, Members, ParamSchema, Reply, RestCode, Service};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::server::{BaseServer, CompositeServer};

/// A plain server with a handful of sample endpoints.
#[derive(Default)]
pub struct MyServer {
    access_count: AtomicU64,
}

impl MyServer {
    pub fn hello_world(&self) -> Result<Reply, EndpointError> {
        Reply::json(json!({"message": "Hello, world!"}))
    }

    pub fn spesific_http_code(&self) -> Result<Reply, EndpointError> {
        Reply::with_code(
            json!({"message": "This endpoint returns a specific HTTP status code."}),
            RestCode::Created,
        )
    }

    pub fn post_example(&self, var1: &Value, var2: &Value, var3: &Value) -> Result<Reply, EndpointError> {
        Reply::json(format!(
            "var1={}, var2={}, var3={}",
            repr(var1),
            repr(var2),
            repr(var3)
        ))
    }

    /// Each read bumps the counter.
    pub fn server_property(&self) -> Result<Reply, EndpointError> {
        let access_count = self.access_count.fetch_add(1, Ordering::SeqCst) + 1;
        Reply::json(json!({"message": "This is a server property.", "access_count": access_count}))
    }
}

impl Service for MyServer {
    fn describe(m: &mut Members<Self>) {
        m.method("hello_world", |s, _| s.hello_world())
            .doc("Return a simple hello world JSON payload.");

        m.method("error_endpoint", |_, _| Err(EndpointError::failed("This is an error message.")))
            .doc("Intentionally fail to show error handling.");

        m.method("spesific_http_code", |s, _| s.spesific_http_code())
            .doc("Return a custom success payload with HTTP 201 status code.");

        m.method("post_example", |s, args| {
            let get = |name: &str| args.raw(name).cloned().unwrap_or(Value::Null);
            s.post_example(&get("var1"), &get("var2"), &get("var3"))
        })
        .doc("Echo provided POST arguments.")
        .params(ParamSchema::new().required("var1").required("var2").optional("var3", "default"))
        .methods([HttpMethod::Post]);

        m.property("server_property", |s| s.server_property())
            .doc("A read-only property that counts its reads.");

        m.property("another_property", |_| Reply::json(json!({"message": "This is another property."})));
    }
}

/// Sample unit with every member kind.
#[derive(Default)]
pub struct Foo {
    test_property_count: AtomicU64,
}

impl Service for Foo {
    fn describe(m: &mut Members<Self>) {
        m.method("bar", |_, _| Reply::json(json!({"message": "Hello from Foo.bar!"})))
            .doc("Return a greeting from Foo.bar.");

        m.method("echo", |_, args| {
            Reply::json(json!({"message": "Hello from Foo.echo!", "args": [], "kwargs": args.extra()}))
        })
        .doc("Return received keyword arguments.")
        .params(ParamSchema::new().accept_extra());

        m.static_method("test_static", |_| Reply::json(json!({"message": "Hello from Foo.test_static!"})));

        m.class_method("test_class_method", |cls, _| {
            Reply::json(json!({"message": format!("Hello from {}.test_class_method!", cls.name)}))
        });

        m.property("test_property", |s| {
            let access_count = s.test_property_count.fetch_add(1, Ordering::SeqCst) + 1;
            Reply::json(json!({"message": "Hello from Foo.test_property!", "access_count": access_count}))
        });
    }
}

/// Sample unit whose `error` member always fails.
pub struct Fizz;

impl Service for Fizz {
    fn describe(m: &mut Members<Self>) {
        m.method("buzz", |_, _| Reply::json(json!({"message": "Hello from Fizz.buzz!"})))
            .doc("Return a greeting from Fizz.buzz.");
        m.method("error", |_, _| Err(EndpointError::failed("Error from Fizz.error")))
            .doc("Fail to exercise error propagation.");
    }
}

/// Composite demo: [`MyServer`]'s endpoints plus a `hello` of its own.
#[derive(Default)]
pub struct MyAdvancedServer {
    base: MyServer,
}

impl Service for MyAdvancedServer {
    fn describe(m: &mut Members<Self>) {
        m.inherit(|s: &MyAdvancedServer| &s.base);
        m.method("hello", |_, _| Reply::json(json!({"message": "Hello from MyAdvancedServer.hello!"})))
            .doc("Return a greeting specific to MyAdvancedServer.");
    }
}

pub fn simple_server(config: ServerConfig) -> Result<BaseServer, ServerError> {
    BaseServer::builder(MyServer::default())
        .app_name("MyServer")
        .config(config)
        .build()
}

/// [`MyAdvancedServer`] with `foo` and `fizz` mounted.
pub fn advanced_server(config: ServerConfig) -> Result<CompositeServer, ServerError> {
    CompositeServer::builder(MyAdvancedServer::default())
        .app_name("MyAdvancedServer")
        .config(config)
        .unit("foo", Arc::new(Foo::default()))
        .unit("fizz", Arc::new(Fizz))
        .build()
}

/// Strings quoted, everything else as JSON.
fn repr(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_example_formats_like_keyword_echo() {
        let reply = MyServer::default()
            .post_example(&json!("a"), &json!("b"), &json!("default"))
            .unwrap();
        assert_eq!(reply, Reply::from(json!("var1='a', var2='b', var3='default'")));
    }

    #[test]
    fn advanced_server_inherits_and_extends() {
        let members = Members::<MyAdvancedServer>::of();
        let names: Vec<_> = members.iter().map(|m| m.name()).collect();
        assert!(names.contains(&"hello_world"));
        assert!(names.contains(&"server_property"));
        assert!(names.contains(&"hello"));
    }

    #[test]
    fn property_counts_reads() {
        let server = MyServer::default();
        let first = server.server_property().unwrap();
        let second = server.server_property().unwrap();
        match (first, second) {
            (Reply::Json { data: a, .. }, Reply::Json { data: b, .. }) => {
                assert_eq!(b["access_count"].as_u64().unwrap(), a["access_count"].as_u64().unwrap() + 1);
            }
            other => panic!("unexpected replies {other:?}"),
        }
    }
}
