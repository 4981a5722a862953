//! Servers: a service plus built-ins, registered and ready to route.
//!
//! [`ServerBuilder`] collects the service, configuration and method
//! restrictions. [`BaseServer`] owns the populated registry. Routing consumes
//! the server, so nothing can be registered once it serves.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};

use restkit_core::{
    Discovered, EndpointBinder, EndpointRegistry, HttpMethod, Service, is_exposable,
};
use restkit_observability::LogContext;

use crate::app::builtins::Builtins;
use crate::app::routes;
use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::error::{ConfigError, ServerError};

/// Constructing state of a [`BaseServer`].
pub struct ServerBuilder<S: Service> {
    service: Arc<S>,
    app_name: Option<String>,
    config: Option<ServerConfig>,
    overrides: HashMap<String, BTreeSet<HttpMethod>>,
}

impl<S: Service> ServerBuilder<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            app_name: None,
            config: None,
            overrides: HashMap::new(),
        }
    }

    /// Name used for the welcome message, logger and log file.
    /// Defaults to the service's type name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Serve `member` only for `methods`, whatever the member declares.
    pub fn restrict(mut self, member: impl Into<String>, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.overrides.insert(member.into(), methods.into_iter().collect());
        self
    }

    /// Discover and register every endpoint.
    pub fn build(self) -> Result<BaseServer, ServerError> {
        let discovered = Discovered::from_service(self.service);
        let app_name = self.app_name.unwrap_or_else(|| discovered.class.clone());
        let config = self.config.unwrap_or_default();

        let logs = LogContext::create(&app_name, &config.log_directory, config.stream_log_level)?;
        let binder = EndpointBinder::new(app_name.as_str())
            .with_dispatch(logs.dispatch())
            .verbose(config.verbose);
        let demo_mode = config.demo_mode;
        let ctx = ServerContext::new(app_name.as_str(), config, logs);

        let mut registry = EndpointRegistry::new(binder).with_method_overrides(self.overrides);
        let builtins = Discovered::from_service(Arc::new(Builtins::new(ctx.clone())));
        registry.register(builtins.overlay(discovered))?;

        ctx.logs().in_scope(|| {
            tracing::info!(app = %app_name, endpoints = registry.len(), "server created");
            if demo_mode {
                tracing::info!("running in demo mode");
            }
        });
        Ok(BaseServer { registry, ctx })
    }
}

/// A server whose endpoints are registered.
pub struct BaseServer {
    registry: EndpointRegistry,
    ctx: ServerContext,
}

impl BaseServer {
    pub fn builder<S: Service>(service: S) -> ServerBuilder<S> {
        ServerBuilder::new(Arc::new(service))
    }

    pub fn app_name(&self) -> &str {
        self.ctx.app_name()
    }

    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Turn entry/exit logging of every endpoint on or off.
    ///
    /// Unit endpoints share the switch. A clone of `registry().binder()`
    /// keeps it reachable after the server is turned into a router.
    pub fn set_verbose(&self, verbose: bool) {
        self.registry.binder().set_verbose(verbose);
        self.ctx.logs().in_scope(|| tracing::info!(verbose, "verbosity changed"));
    }

    pub fn is_verbose(&self) -> bool {
        self.registry.binder().is_verbose()
    }

    /// Build the axum router. Consumes the server.
    pub fn into_router(self) -> Router {
        let unused = self.registry.unused_overrides();
        if !unused.is_empty() {
            self.ctx.logs().in_scope(|| {
                tracing::warn!(members = ?unused, "method restrictions name unknown members");
            });
        }
        routes::router(self.registry.into_entries(), self.ctx)
    }

    /// Serve on an already bound listener until the task is cancelled.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let logs = self.ctx.logs().clone();
        let addr = listener.local_addr()?;
        logs.in_scope(|| tracing::info!(%addr, "listening"));
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }

    /// Bind `addr` and serve.
    pub async fn run(self, addr: impl ToSocketAddrs) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }
}

/// Constructing state of a [`CompositeServer`].
pub struct CompositeServerBuilder<S: Service> {
    base: ServerBuilder<S>,
    units: Vec<(String, Discovered)>,
}

impl<S: Service> CompositeServerBuilder<S> {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.base = self.base.app_name(name);
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.base = self.base.config(config);
        self
    }

    /// See [`ServerBuilder::restrict`]. Unit members are named `{unit}_{member}`.
    pub fn restrict(mut self, member: impl Into<String>, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.base = self.base.restrict(member, methods);
        self
    }

    /// Mount `unit` under `/{name}/` when the server is built.
    pub fn unit<U: Service>(mut self, name: impl Into<String>, unit: Arc<U>) -> Self {
        self.units.push((name.into(), Discovered::from_service(unit)));
        self
    }

    pub fn build(self) -> Result<CompositeServer, ServerError> {
        let mut server = CompositeServer {
            base: self.base.build()?,
        };
        for (name, unit) in self.units {
            server.mount_discovered(&name, unit)?;
        }
        Ok(server)
    }
}

/// A server that also exposes the members of named units.
pub struct CompositeServer {
    base: BaseServer,
}

impl CompositeServer {
    pub fn builder<S: Service>(service: S) -> CompositeServerBuilder<S> {
        CompositeServerBuilder {
            base: ServerBuilder::new(Arc::new(service)),
            units: Vec::new(),
        }
    }

    /// Graft `unit`'s public members under `/{name}/`.
    ///
    /// Atomic: on a path collision nothing is registered.
    pub fn mount_unit<U: Service>(&mut self, name: &str, unit: Arc<U>) -> Result<usize, ServerError> {
        self.mount_discovered(name, Discovered::from_service(unit))
    }

    fn mount_discovered(&mut self, name: &str, unit: Discovered) -> Result<usize, ServerError> {
        if !is_exposable(name) {
            return Err(ConfigError::InvalidValue {
                key: "unit name".to_string(),
                value: name.to_string(),
            }
            .into());
        }
        let class = unit.class.clone();
        let count = self.base.registry.mount_unit(name, unit)?;
        self.base.ctx.logs().in_scope(|| {
            tracing::info!(unit = name, class = %class, endpoints = count, "mounted unit");
        });
        Ok(count)
    }

    pub fn base(&self) -> &BaseServer {
        &self.base
    }

    pub fn app_name(&self) -> &str {
        self.base.app_name()
    }

    pub fn registry(&self) -> &EndpointRegistry {
        self.base.registry()
    }

    /// See [`BaseServer::set_verbose`].
    pub fn set_verbose(&self, verbose: bool) {
        self.base.set_verbose(verbose);
    }

    pub fn is_verbose(&self) -> bool {
        self.base.is_verbose()
    }

    pub fn into_router(self) -> Router {
        self.base.into_router()
    }

    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        self.base.serve(listener).await
    }

    pub async fn run(self, addr: impl ToSocketAddrs) -> Result<(), ServerError> {
        self.base.run(addr).await
    }
}

impl From<CompositeServer> for BaseServer {
    fn from(server: CompositeServer) -> Self {
        server.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restkit_core::{Members, Reply, RequestParams, RestCode};
    use serde_json::json;

    struct Hello;

    impl Service for Hello {
        fn describe(m: &mut Members<Self>) {
            m.method("hello_world", |_, _| Reply::json(json!({"message": "Hello, world!"})));
            m.method("index", |_, _| Reply::json("custom index"));
        }
    }

    struct Unit;

    impl Service for Unit {
        fn describe(m: &mut Members<Self>) {
            m.method("bar", |_, _| Reply::json("bar"));
            m.method("hello_world", |_, _| Reply::json("unit hello"));
        }
    }

    fn config(dir: &tempfile::TempDir) -> ServerConfig {
        ServerConfig::builder().log_directory(dir.path()).build().unwrap()
    }

    #[test]
    fn builtins_are_registered_and_overridable() {
        let dir = tempfile::tempdir().unwrap();
        let server = BaseServer::builder(Hello).config(config(&dir)).build().unwrap();
        assert_eq!(server.app_name(), "Hello");

        let reg = server.registry();
        for path in ["/index", "/get_run_mode", "/download", "/upload", "/list_logs", "/logs", "/hello_world"] {
            assert!(reg.contains(path), "{path}");
        }
        assert_eq!(reg.get("/upload").unwrap().http_methods, BTreeSet::from([HttpMethod::Post]));

        let index = reg.get("/index").unwrap().endpoint.call(RequestParams::default());
        assert_eq!(index.envelope().unwrap().data, json!("custom index"));
    }

    #[test]
    fn restrictions_apply_before_routing() {
        let dir = tempfile::tempdir().unwrap();
        let server = BaseServer::builder(Hello)
            .config(config(&dir))
            .restrict("hello_world", [HttpMethod::Get])
            .build()
            .unwrap();
        assert_eq!(
            server.registry().get("/hello_world").unwrap().http_methods,
            BTreeSet::from([HttpMethod::Get])
        );
    }

    #[test]
    fn units_do_not_clash_with_same_named_top_level_members() {
        let dir = tempfile::tempdir().unwrap();
        let server = CompositeServer::builder(Hello)
            .config(config(&dir))
            .unit("foo", Arc::new(Unit))
            .build()
            .unwrap();
        let reg = server.registry();
        assert!(reg.contains("/hello_world"));
        let outcome = reg.get("/foo/hello_world").unwrap().endpoint.call(RequestParams::default());
        assert_eq!(outcome.envelope().unwrap().data, json!("unit hello"));
    }

    #[test]
    fn mounting_the_same_unit_twice_fails_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = CompositeServer::builder(Hello).config(config(&dir)).build().unwrap();
        server.mount_unit("foo", Arc::new(Unit)).unwrap();
        let before = server.registry().len();

        let err = server.mount_unit("Foo", Arc::new(Unit)).unwrap_err();
        assert!(matches!(err, ServerError::Registry(_)));
        assert_eq!(server.registry().len(), before);
    }

    #[test]
    fn invalid_unit_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = CompositeServer::builder(Hello).config(config(&dir)).build().unwrap();
        let err = server.mount_unit("bad/name", Arc::new(Unit)).unwrap_err();
        assert!(matches!(err, ServerError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn verbosity_switch_reaches_unit_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let server = CompositeServer::builder(Hello)
            .config(config(&dir))
            .unit("foo", Arc::new(Unit))
            .build()
            .unwrap();
        assert!(!server.is_verbose());

        let bar = server.registry().get("/foo/bar").unwrap().endpoint.clone();
        bar.call(RequestParams::default());
        let log = server.base().context().logs().log_file().to_path_buf();
        assert!(!std::fs::read_to_string(&log).unwrap().contains("Entering bar"));

        server.set_verbose(true);
        assert!(server.is_verbose());
        bar.call(RequestParams::default());
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("Entering bar"), "{text}");
        assert!(text.contains("Exiting bar"), "{text}");
    }

    #[test]
    fn run_mode_reflects_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ServerConfig::builder().log_directory(dir.path()).demo_mode(true).build().unwrap();
        let server = BaseServer::builder(Hello).config(cfg).build().unwrap();
        let outcome = server
            .registry()
            .get("/get_run_mode")
            .unwrap()
            .endpoint
            .call(RequestParams::default());
        let resp = outcome.envelope().unwrap();
        assert_eq!(resp.code, RestCode::Ok.as_u16());
        assert_eq!(resp.data["run_mode"], "demo");
    }
}
