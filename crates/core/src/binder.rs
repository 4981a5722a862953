//! Request-to-call adaptation.
//!
//! [`EndpointBinder::wrap`] turns a handler into a [`BoundEndpoint`]. Calling a
//! bound endpoint merges the request's query string and JSON body, binds the
//! result against the endpoint's parameter schema, runs the handler, and folds
//! whatever happens (success, error, or panic) into an [`Outcome`]. Nothing
//! escapes a bound endpoint.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Dispatch;

use crate::error::EndpointError;
use crate::params::{Args, ParamSchema, RequestParams};
use crate::registry::MemberKind;
use crate::response::{Outcome, Reply, RestResponse};

/// An unwrapped handler: bound arguments in, reply out.
pub type HandlerFn = Arc<dyn Fn(&Args) -> Result<Reply, EndpointError> + Send + Sync>;

/// A handler that may or may not have been wrapped already.
#[derive(Clone)]
pub enum Handler {
    Raw(HandlerFn),
    Bound(BoundEndpoint),
}

impl Handler {
    pub fn raw<F>(f: F) -> Self
    where
        F: Fn(&Args) -> Result<Reply, EndpointError> + Send + Sync + 'static,
    {
        Handler::Raw(Arc::new(f))
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Handler::Bound(_))
    }
}

impl From<BoundEndpoint> for Handler {
    fn from(bound: BoundEndpoint) -> Self {
        Handler::Bound(bound)
    }
}

/// Wraps handlers for one server.
///
/// Everything a bound endpoint logs goes to the binder's logger identity and,
/// when set, its dispatch. Clones share one verbosity switch with every
/// endpoint they wrapped.
#[derive(Clone)]
pub struct EndpointBinder {
    logger: Arc<str>,
    dispatch: Option<Dispatch>,
    verbose: Arc<AtomicBool>,
}

impl EndpointBinder {
    pub fn new(logger: impl Into<Arc<str>>) -> Self {
        Self {
            logger: logger.into(),
            dispatch: None,
            verbose: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Route endpoint logs through `dispatch` instead of the global default.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Log entry and exit of every call together with its arguments.
    pub fn verbose(self, verbose: bool) -> Self {
        self.set_verbose(verbose);
        self
    }

    /// Switch entry/exit logging on or off for every endpoint this binder
    /// wrapped, including calls already in flight on other threads.
    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    pub fn dispatch(&self) -> Option<&Dispatch> {
        self.dispatch.as_ref()
    }

    /// Wrap `handler`. An already bound handler is returned as is.
    pub fn wrap(
        &self,
        name: impl Into<String>,
        kind: MemberKind,
        params: ParamSchema,
        handler: Handler,
    ) -> BoundEndpoint {
        match handler {
            Handler::Bound(bound) => bound,
            Handler::Raw(f) => BoundEndpoint {
                inner: Arc::new(BoundInner {
                    name: name.into(),
                    kind,
                    params,
                    handler: f,
                    logger: Arc::clone(&self.logger),
                    dispatch: self.dispatch.clone(),
                    verbose: Arc::clone(&self.verbose),
                }),
            },
        }
    }
}

struct BoundInner {
    name: String,
    kind: MemberKind,
    params: ParamSchema,
    handler: HandlerFn,
    logger: Arc<str>,
    dispatch: Option<Dispatch>,
    verbose: Arc<AtomicBool>,
}

/// A wrapped handler. Cheap to clone.
#[derive(Clone)]
pub struct BoundEndpoint {
    inner: Arc<BoundInner>,
}

impl core::fmt::Debug for BoundEndpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundEndpoint")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("logger", &self.inner.logger)
            .finish()
    }
}

impl BoundEndpoint {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> MemberKind {
        self.inner.kind
    }

    pub fn params(&self) -> &ParamSchema {
        &self.inner.params
    }

    pub fn logger(&self) -> &str {
        &self.inner.logger
    }

    /// Whether `self` and `other` are the same wrapping.
    pub fn ptr_eq(&self, other: &BoundEndpoint) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Serve one request.
    pub fn call(&self, request: RequestParams) -> Outcome {
        match &self.inner.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || self.call_inner(request)),
            None => self.call_inner(request),
        }
    }

    fn call_inner(&self, request: RequestParams) -> Outcome {
        let inner = &self.inner;
        let span = tracing::info_span!("endpoint", server = %inner.logger, endpoint = %inner.name);
        let _entered = span.enter();

        match self.invoke(request) {
            Ok(reply) => Outcome::from(reply),
            Err(err) => {
                tracing::error!(error = %err, detail = ?err, "endpoint {} failed", inner.name);
                Outcome::Envelope(RestResponse::error(err.to_string()))
            }
        }
    }

    fn invoke(&self, request: RequestParams) -> Result<Reply, EndpointError> {
        let inner = &self.inner;
        let merged = request.merge(&inner.name)?;
        let args = inner.params.bind(&inner.name, merged)?.with_files(request.files);
        let verbose = inner.verbose.load(Ordering::Relaxed);

        if verbose {
            let receiver = matches!(inner.kind, MemberKind::Method | MemberKind::PropertyGetter)
                .then_some("<self>");
            tracing::info!(receiver, args = %args.to_json(), "Entering {}", inner.name);
        }

        let result = catch_unwind(AssertUnwindSafe(|| (inner.handler)(&args)))
            .unwrap_or_else(|payload| Err(EndpointError::Panicked(panic_message(payload.as_ref()))));

        if verbose {
            tracing::info!("Exiting {}", inner.name);
        }
        result
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "endpoint panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn binder() -> EndpointBinder {
        EndpointBinder::new("TestServer")
    }

    fn echo() -> Handler {
        Handler::raw(|args| Reply::json(args.to_json()))
    }

    #[test]
    fn plain_return_value_is_wrapped_with_200() {
        let bound = binder().wrap(
            "hello_world",
            MemberKind::Method,
            ParamSchema::new(),
            Handler::raw(|_| Reply::json(json!({"message": "Hello, world!"}))),
        );
        let outcome = bound.call(RequestParams::default());
        let resp = outcome.envelope().unwrap();
        assert_eq!(
            resp.body(),
            json!({"status": "OK", "data": {"message": "Hello, world!"}, "code": 200})
        );
    }

    #[test]
    fn data_code_pairs_pass_through() {
        let bound = binder().wrap(
            "not_there",
            MemberKind::Method,
            ParamSchema::new(),
            Handler::raw(|_| Ok(Reply::error("File not found", 404))),
        );
        let outcome = bound.call(RequestParams::default());
        assert_eq!(outcome.status(), 404);
        assert_eq!(outcome.envelope().unwrap().data, json!({"error": "File not found"}));
    }

    #[test]
    fn business_errors_become_500_with_verbatim_message() {
        let bound = binder().wrap(
            "error_endpoint",
            MemberKind::Method,
            ParamSchema::new(),
            Handler::raw(|_| Err(EndpointError::failed("boom"))),
        );
        let outcome = bound.call(RequestParams::default());
        assert_eq!(outcome.status(), 500);
        assert_eq!(outcome.envelope().unwrap().data, json!({"error": "boom"}));
    }

    #[test]
    fn panics_are_contained() {
        let bound = binder().wrap(
            "explode",
            MemberKind::StaticMethod,
            ParamSchema::new(),
            Handler::raw(|_| panic!("kaboom")),
        );
        let outcome = bound.call(RequestParams::default());
        assert_eq!(outcome.status(), 500);
        assert_eq!(outcome.envelope().unwrap().data, json!({"error": "kaboom"}));
    }

    #[test]
    fn binding_errors_are_reported_like_business_errors() {
        let params = ParamSchema::new().required("var1").required("var2").optional("var3", "default");
        let bound = binder().wrap("post_example", MemberKind::Method, params, echo());

        let ok = bound.call(RequestParams::default().with_json(json!({"var1": "a", "var2": "b"})));
        assert_eq!(
            ok.envelope().unwrap().data,
            json!({"var1": "a", "var2": "b", "var3": "default"})
        );

        let missing = bound.call(RequestParams::default().with_json(json!({"var1": "a"})));
        assert_eq!(missing.status(), 500);
        let msg = missing.envelope().unwrap().data["error"].as_str().unwrap().to_string();
        assert!(msg.contains("missing 1 required positional argument"), "{msg}");
    }

    #[test]
    fn json_body_wins_over_query() {
        let bound = binder().wrap("f", MemberKind::Method, ParamSchema::new().required("x"), echo());
        let request = RequestParams::from_query([("x".to_string(), "1".to_string())]).with_json(json!({"x": 2}));
        assert_eq!(bound.call(request).envelope().unwrap().data, json!({"x": 2}));
    }

    #[test]
    fn wrapping_twice_returns_the_same_endpoint() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let once = binder().wrap(
            "count",
            MemberKind::Method,
            ParamSchema::new(),
            Handler::raw(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(EndpointError::failed("nope"))
            }),
        );
        let twice = binder().wrap("count", MemberKind::Method, ParamSchema::new(), once.clone().into());

        assert!(once.ptr_eq(&twice));
        let a = once.call(RequestParams::default());
        let b = twice.call(RequestParams::default());
        assert_eq!(a, b);
        assert_eq!(b.envelope().unwrap().data, json!({"error": "nope"}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[derive(Clone, Default)]
    struct Buf(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Buf {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Buf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn captured(logger: &str) -> (EndpointBinder, Buf) {
        let buf = Buf::default();
        let sink = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();
        (EndpointBinder::new(logger).with_dispatch(Dispatch::new(subscriber)), buf)
    }

    #[test]
    fn logs_go_through_the_binders_dispatch() {
        let (binder, buf) = captured("LoggedServer");
        let bound = binder.wrap(
            "error_endpoint",
            MemberKind::Method,
            ParamSchema::new(),
            Handler::raw(|_| Err(EndpointError::failed("This is an error message."))),
        );
        bound.call(RequestParams::default());

        let logged = buf.text();
        assert!(logged.contains("This is an error message."), "{logged}");
        assert!(logged.contains("LoggedServer"), "{logged}");
    }

    #[test]
    fn verbosity_can_be_switched_after_wrapping() {
        let (binder, buf) = captured("Toggled");
        let bound = binder.wrap("hello_world", MemberKind::Method, ParamSchema::new(), echo());
        assert!(!binder.is_verbose());

        bound.call(RequestParams::default());
        assert!(!buf.text().contains("Entering hello_world"), "{}", buf.text());

        binder.clone().set_verbose(true);
        assert!(binder.is_verbose());
        bound.call(RequestParams::default());
        let logged = buf.text();
        assert!(logged.contains("Entering hello_world"), "{logged}");
        assert!(logged.contains("Exiting hello_world"), "{logged}");
        assert!(logged.contains("<self>"), "{logged}");

        binder.set_verbose(false);
        let before = buf.text().matches("Entering").count();
        bound.call(RequestParams::default());
        assert_eq!(buf.text().matches("Entering").count(), before);
    }

    #[test]
    fn static_members_are_logged_without_a_receiver() {
        let (binder, buf) = captured("Static");
        let bound = binder
            .verbose(true)
            .wrap("test_static", MemberKind::StaticMethod, ParamSchema::new(), echo());
        bound.call(RequestParams::default());
        let logged = buf.text();
        assert!(logged.contains("Entering test_static"), "{logged}");
        assert!(!logged.contains("<self>"), "{logged}");
    }
}
