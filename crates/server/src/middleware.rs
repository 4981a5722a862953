use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

/// Paths are case-insensitive: any path with an uppercase character is
/// permanently redirected (308, method and body preserved) to its lowercase
/// form. The query string is carried over untouched.
pub async fn redirect_lowercase(req: Request, next: Next) -> Response {
    match lowercase_location(req.uri()) {
        Some(location) => {
            tracing::debug!(from = %req.uri(), to = %location, "redirecting to lowercase path");
            Redirect::permanent(&location).into_response()
        }
        None => next.run(req).await,
    }
}

fn lowercase_location(uri: &axum::http::Uri) -> Option<String> {
    let path = uri.path();
    if !path.chars().any(char::is_uppercase) {
        return None;
    }
    let mut location = path.to_lowercase();
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }
    Some(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_paths_pass_through() {
        let uri = "/hello_world?A=B".parse().unwrap();
        assert_eq!(lowercase_location(&uri), None);
    }

    #[test]
    fn mixed_case_keeps_query_verbatim() {
        let uri = "/Hello_World?param1=Value1&param2=value2".parse().unwrap();
        assert_eq!(
            lowercase_location(&uri).as_deref(),
            Some("/hello_world?param1=Value1&param2=value2")
        );
    }

    #[test]
    fn unit_paths_are_lowered_whole() {
        let uri = "/FOO/Property/Test_Property".parse().unwrap();
        assert_eq!(lowercase_location(&uri).as_deref(), Some("/foo/property/test_property"));
    }
}
