//! Passthrough proxy for upstream configuration endpoints.
//!
//! Requests under `/api` are rewritten by stripping the prefix and
//! forwarded to the upstream base host with the bearer credential
//! attached. The upstream response comes back verbatim, non-2xx status
//! and body included; only a transport failure maps to 502.

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::server::AppState;

/// Rewrite a matched route to its upstream URL by stripping the
/// leading `/api` portion.
#[must_use]
pub fn build_api_url(base: &str, route: &str) -> String {
    let api_route = route
        .strip_prefix("/api/")
        .or_else(|| route.strip_prefix("api/"))
        .or_else(|| route.strip_prefix('/'))
        .unwrap_or(route);
    format!("{}/{api_route}", base.trim_end_matches('/'))
}

/// GET `/api/{*path}` — forward to the upstream and relay the response.
pub async fn proxy_get(State(state): State<AppState>, uri: Uri) -> Response {
    forward(&state, reqwest::Method::GET, &uri, None).await
}

/// POST `/api/{*path}` — forward the JSON body to the upstream and
/// relay the response.
pub async fn proxy_post(State(state): State<AppState>, uri: Uri, body: String) -> Response {
    forward(&state, reqwest::Method::POST, &uri, Some(body)).await
}

async fn forward(
    state: &AppState,
    method: reqwest::Method,
    uri: &Uri,
    body: Option<String>,
) -> Response {
    let mut url = build_api_url(&state.config.upstream_base_url, uri.path());
    if let Some(query) = uri.query() {
        url = format!("{url}?{query}");
    }

    let mut request = state
        .http
        .request(method, &url)
        .bearer_auth(&state.config.api_token);
    if let Some(body) = body {
        request = request
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                error!(%url, status = status.as_u16(), "error from upstream API");
            }
            let status =
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let body = response.text().await.unwrap_or_else(|e| {
                warn!(error = %e, "failed to read upstream response body");
                String::new()
            });
            (status, body).into_response()
        }
        Err(e) => {
            error!(%url, error = %e, "failed to reach upstream");
            (StatusCode::BAD_GATEWAY, "Upstream unreachable").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://api.example.com";

    #[test]
    fn strips_slash_api_slash_prefix() {
        assert_eq!(
            build_api_url(BASE, "/api/2/tweets/search/stream/rules"),
            "https://api.example.com/2/tweets/search/stream/rules"
        );
    }

    #[test]
    fn strips_api_slash_prefix() {
        assert_eq!(
            build_api_url(BASE, "api/2/rules"),
            "https://api.example.com/2/rules"
        );
    }

    #[test]
    fn strips_bare_leading_slash() {
        assert_eq!(build_api_url(BASE, "/2/rules"), "https://api.example.com/2/rules");
    }

    #[test]
    fn passes_unprefixed_route_through() {
        assert_eq!(build_api_url(BASE, "2/rules"), "https://api.example.com/2/rules");
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        assert_eq!(
            build_api_url("https://api.example.com/", "/api/2/rules"),
            "https://api.example.com/2/rules"
        );
    }
}
