use axum::{
    extract::{DefaultBodyLimit, Path, Request},
    http::{Method, Uri},
    response::Response,
    routing::{MethodFilter, MethodRouter, any, on},
    Router,
};
use tower::ServiceBuilder;

use restkit_core::{BoundEndpoint, EndpointEntry, HttpMethod, Outcome, RestCode, RestResponse};

use crate::app::{errors, request};
use crate::context::{RouteInfo, ServerContext};
use crate::middleware;

/// Route every registry entry; `/` serves whatever is registered at `/index`
/// and `/logs/:log_file` feeds its segment to whatever is at `/logs`.
pub fn router(entries: Vec<EndpointEntry>, ctx: ServerContext) -> Router {
    ctx.publish_routes(route_table(&entries));

    let mut router = Router::new();
    for entry in &entries {
        router = router.route(&entry.path, endpoint_route(entry, ctx.clone()));
    }
    if let Some(index) = entries.iter().find(|e| e.path == "/index") {
        router = router.route("/", endpoint_route(index, ctx.clone()));
    }
    if let Some(logs) = entries.iter().find(|e| e.path == "/logs") {
        router = router.route("/logs/:log_file", segment_route(logs, "log_file", ctx.clone()));
    }

    router.fallback(not_found).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::redirect_lowercase))
            .layer(DefaultBodyLimit::disable()),
    )
}

fn endpoint_route(entry: &EndpointEntry, ctx: ServerContext) -> MethodRouter {
    let endpoint = entry.endpoint.clone();
    let handler = move |req: Request| {
        let endpoint = endpoint.clone();
        let ctx = ctx.clone();
        async move { dispatch(endpoint, ctx, req).await }
    };

    restrict(entry, handler)
}

/// Like [`endpoint_route`], with the last path segment passed as `param`.
/// The segment is merged as the first query value for `param`.
fn segment_route(entry: &EndpointEntry, param: &'static str, ctx: ServerContext) -> MethodRouter {
    let endpoint = entry.endpoint.clone();
    let handler = move |Path(segment): Path<String>, req: Request| {
        let endpoint = endpoint.clone();
        let ctx = ctx.clone();
        async move {
            let extra = Some((param.to_string(), segment));
            dispatch_with(endpoint, ctx, req, extra).await
        }
    };
    restrict(entry, handler)
}

fn restrict<H, T>(entry: &EndpointEntry, handler: H) -> MethodRouter
where
    H: axum::handler::Handler<T, ()>,
    T: 'static,
{
    let filter = entry
        .http_methods
        .iter()
        .map(|m| method_filter(*m))
        .reduce(MethodFilter::or);
    match filter {
        Some(filter) => on(filter, handler).fallback(method_not_allowed),
        None => any(method_not_allowed),
    }
}

async fn dispatch(endpoint: BoundEndpoint, ctx: ServerContext, req: Request) -> Response {
    dispatch_with(endpoint, ctx, req, None).await
}

async fn dispatch_with(
    endpoint: BoundEndpoint,
    ctx: ServerContext,
    req: Request,
    path_param: Option<(String, String)>,
) -> Response {
    let params = match request::extract(req, ctx.config().max_content_length).await {
        Ok(mut params) => {
            if let Some(pair) = path_param {
                params.query.insert(0, pair);
            }
            params
        }
        Err(err) => {
            ctx.logs().in_scope(|| {
                tracing::error!(endpoint = endpoint.name(), error = %err, "rejected request");
            });
            return errors::envelope_response(RestResponse::error(err.to_string()));
        }
    };

    let outcome = tokio::task::spawn_blocking(move || endpoint.call(params))
        .await
        .unwrap_or_else(|e| Outcome::Envelope(RestResponse::error(format!("endpoint task failed: {e}"))));
    errors::outcome_to_response(outcome)
}

async fn not_found(uri: Uri) -> Response {
    errors::json_error(RestCode::NotFound, format!("Not Found: {}", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    errors::json_error(
        RestCode::MethodNotAllowed,
        format!("Method {method} not allowed for {}", uri.path()),
    )
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Delete => MethodFilter::DELETE,
    }
}

fn route_table(entries: &[EndpointEntry]) -> Vec<RouteInfo> {
    let mut routes: Vec<RouteInfo> = entries
        .iter()
        .map(|e| RouteInfo {
            endpoint: e.member_name.clone(),
            methods: e.http_methods.iter().map(|m| m.as_str().to_string()).collect(),
            url: e.path.clone(),
            docs: e.doc.clone(),
        })
        .collect();
    if let Some(index) = routes.iter().find(|r| r.url == "/index").cloned() {
        routes.push(RouteInfo {
            url: "/".to_string(),
            ..index
        });
    }
    if let Some(logs) = routes.iter().find(|r| r.url == "/logs").cloned() {
        routes.push(RouteInfo {
            url: "/logs/<log_file>".to_string(),
            ..logs
        });
    }
    routes
}
