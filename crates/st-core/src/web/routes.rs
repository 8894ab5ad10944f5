//! Transport-independent request handling.
//!
//! [`handle_request`] maps an [`HttpRequest`] to an [`HttpResponse`]; the
//! socket adapter in [`super::server`] only converts to and from `tiny_http`.

use super::AppState;
use crate::chart::ChartAggregator;
use crate::net::{normalize_forwarded, normalize_peer};
use crate::recorder::{record_telemetry, RequestMeta, TelemetryForm};
use crate::report::report_address;
use serde_json::json;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{error, warn};
use url::form_urlencoded;

/// Secondary mount kept for front ends that expect a `/backend` prefix.
pub const BACKEND_MOUNT: &str = "/backend";

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Path plus optional query string.
    pub target: String,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub peer: Option<IpAddr>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn ok_json(body: String) -> Self {
        Self {
            status: 200,
            content_type: JSON,
            body,
        }
    }

    fn ok_text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: TEXT,
            body: body.into(),
        }
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            content_type: TEXT,
            body: String::new(),
        }
    }

    fn json_error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: JSON,
            body: json!({ "error": message }).to_string(),
        }
    }

    fn not_found() -> Self {
        Self::json_error(404, "Not Found")
    }

    fn method_not_allowed() -> Self {
        Self::json_error(405, "Method Not Allowed")
    }
}

/// Endpoints served under each mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Telemetry,
    ClientAddress,
    ChartData,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/results/telemetry" | "/results/telemetry.php" => Some(Route::Telemetry),
            "/getIP" | "/getIP.php" => Some(Route::ClientAddress),
            "/api/chart-data" => Some(Route::ChartData),
            _ => None,
        }
    }

    fn allows(self, method: &str) -> bool {
        match self {
            Route::Telemetry => method == "POST",
            Route::ClientAddress | Route::ChartData => method == "GET" || method == "HEAD",
        }
    }

    /// Resolve a request path against the `/backend` and base-path mounts.
    pub fn resolve(path: &str, base_path: &str) -> Option<Self> {
        [BACKEND_MOUNT, base_path]
            .into_iter()
            .filter_map(|mount| path.strip_prefix(mount))
            .find_map(Route::from_path)
    }
}

/// Dispatch one request.
pub fn handle_request(state: &AppState, request: &HttpRequest) -> HttpResponse {
    if request.method == "OPTIONS" {
        return HttpResponse::no_content();
    }

    let (path, query) = split_target(&request.target);
    let Some(route) = Route::resolve(path, state.config.server.normalized_base_path()) else {
        return HttpResponse::not_found();
    };
    if !route.allows(&request.method) {
        return HttpResponse::method_not_allowed();
    }

    match route {
        Route::Telemetry => telemetry(state, request, query),
        Route::ClientAddress => client_report(state, request, query),
        Route::ChartData => chart_data(state),
    }
}

fn telemetry(state: &AppState, request: &HttpRequest, query: Option<&str>) -> HttpResponse {
    let Some(store) = state.store.as_ref() else {
        return HttpResponse::ok_text("Telemetry is disabled");
    };

    // Query fields first so body fields override them.
    let mut pairs = parse_pairs(query.unwrap_or_default().as_bytes());
    match body_kind(request) {
        BodyKind::Empty => {}
        BodyKind::UrlEncoded => pairs.extend(parse_pairs(&request.body)),
        BodyKind::Unsupported => {
            warn!(
                content_type = request.header("content-type").unwrap_or_default(),
                "rejecting telemetry body"
            );
            return HttpResponse::json_error(415, "Unsupported Media Type");
        }
    }
    let form = TelemetryForm::from_pairs(pairs);
    let meta = RequestMeta {
        remote_address: client_address(state, request),
        user_agent: request.header("user-agent").unwrap_or_default().to_string(),
        language: request.header("accept-language").unwrap_or_default().to_string(),
    };

    match record_telemetry(store, form, meta) {
        Ok(id) => HttpResponse::ok_text(format!("id {id}")),
        Err(_) => HttpResponse {
            status: 500,
            content_type: TEXT,
            body: "Internal Server Error".to_string(),
        },
    }
}

fn client_report(state: &AppState, request: &HttpRequest, query: Option<&str>) -> HttpResponse {
    let want_isp = parse_pairs(query.unwrap_or_default().as_bytes())
        .iter()
        .any(|(key, value)| key == "isp" && value == "true");
    let address = client_address(state, request);
    let report = report_address(&address, want_isp, state.lookup.as_ref());

    match serde_json::to_string(&report) {
        Ok(body) => HttpResponse::ok_json(body),
        Err(e) => {
            error!(error = %e, "failed to encode address report");
            HttpResponse::json_error(500, "Internal Server Error")
        }
    }
}

fn chart_data(state: &AppState) -> HttpResponse {
    if !state.limiter.allow() {
        return HttpResponse::json_error(429, "Too Many Requests");
    }
    let Some(store) = state.store.as_ref() else {
        return HttpResponse::ok_json("[]".to_string());
    };

    let series = match ChartAggregator::new(store).build_chart_series(state.config.frontend.chart_list)
    {
        Ok(series) => series,
        Err(e) => {
            error!(error = %e, "failed to load chart data");
            return HttpResponse::json_error(500, "Internal Server Error");
        }
    };

    match serde_json::to_string(&series) {
        Ok(body) => HttpResponse::ok_json(body),
        Err(e) => {
            error!(error = %e, "failed to encode chart data");
            HttpResponse::json_error(500, "Internal Server Error")
        }
    }
}

/// Address the request is attributed to.
fn client_address(state: &AppState, request: &HttpRequest) -> String {
    if state.config.server.trust_proxy_headers {
        for header in ["x-real-ip", "x-forwarded-for"] {
            if let Some(address) = request.header(header).and_then(normalize_forwarded) {
                return address;
            }
        }
    }
    match request.peer {
        Some(ip) => normalize_peer(ip),
        None => {
            warn!("request has no peer address");
            String::new()
        }
    }
}

/// How a telemetry body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Empty,
    UrlEncoded,
    /// Multipart and every other non-form encoding.
    Unsupported,
}

fn body_kind(request: &HttpRequest) -> BodyKind {
    if request.body.is_empty() {
        return BodyKind::Empty;
    }
    match request.header("content-type") {
        None => BodyKind::UrlEncoded,
        Some(content_type)
            if content_type
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded") =>
        {
            BodyKind::UrlEncoded
        }
        Some(_) => BodyKind::Unsupported,
    }
}

fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

fn parse_pairs(input: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(input).into_owned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isp::{EnrichmentResult, IspLookup, LookupOutcome, NoopIspLookup};
    use st_config::Config;
    use st_telemetry::TelemetryStore;
    use std::net::Ipv4Addr;

    struct StaticLookup;

    impl IspLookup for StaticLookup {
        fn name(&self) -> &str {
            "static"
        }

        fn lookup(&self, address: &str) -> LookupOutcome {
            LookupOutcome::Found(EnrichmentResult {
                ip: address.to_string(),
                isp: "AS64500 Example ISP".into(),
                country_name: "Germany".into(),
                ..EnrichmentResult::default()
            })
        }
    }

    fn state_with(config: Config, store: Option<TelemetryStore>) -> AppState {
        AppState::new(config, store, Box::new(StaticLookup))
    }

    fn memory_state() -> AppState {
        state_with(Config::default(), Some(TelemetryStore::open_in_memory().unwrap()))
    }

    fn request(method: &str, target: &str, peer: [u8; 4]) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            target: target.to_string(),
            peer: Some(IpAddr::V4(Ipv4Addr::from(peer))),
            ..HttpRequest::default()
        }
    }

    fn telemetry_post(body: &str) -> HttpRequest {
        let mut req = request("POST", "/results/telemetry", [203, 0, 113, 9]);
        req.headers.insert(
            "content-type".into(),
            "application/x-www-form-urlencoded".into(),
        );
        req.headers.insert("user-agent".into(), "Mozilla/5.0".into());
        req.headers.insert("accept-language".into(), "de-DE".into());
        req.body = body.as_bytes().to_vec();
        req
    }

    #[test]
    fn routes_resolve_under_both_mounts() {
        assert_eq!(Route::resolve("/getIP", ""), Some(Route::ClientAddress));
        assert_eq!(Route::resolve("/backend/getIP.php", ""), Some(Route::ClientAddress));
        assert_eq!(Route::resolve("/speed/api/chart-data", "/speed"), Some(Route::ChartData));
        assert_eq!(
            Route::resolve("/backend/results/telemetry", "/speed"),
            Some(Route::Telemetry)
        );
        assert_eq!(Route::resolve("/api/chart-data", "/speed"), None);
        assert_eq!(Route::resolve("/garbage", ""), None);
    }

    #[test]
    fn unknown_route_is_404_and_options_is_204() {
        let state = memory_state();
        assert_eq!(handle_request(&state, &request("GET", "/nope", [127, 0, 0, 1])).status, 404);
        assert_eq!(handle_request(&state, &request("OPTIONS", "/getIP", [127, 0, 0, 1])).status, 204);
        assert_eq!(
            handle_request(&state, &request("GET", "/results/telemetry", [127, 0, 0, 1])).status,
            405
        );
    }

    #[test]
    fn telemetry_is_recorded_with_metadata() {
        let state = memory_state();
        let response = handle_request(&state, &telemetry_post("dl=123.4&ul=56.7&ping=10&jitter=1.5"));
        assert_eq!(response.status, 200);
        let id = response.body.strip_prefix("id ").unwrap();

        let stored = state.store.as_ref().unwrap().get_by_id(id).unwrap();
        assert_eq!(stored.client_address, "203.0.113.9");
        assert_eq!(stored.user_agent, "Mozilla/5.0");
        assert_eq!(stored.language, "de-DE");
        assert_eq!(stored.download, "123.4");
        assert_eq!(stored.isp_info, "{}");
    }

    #[test]
    fn body_fields_override_query_fields() {
        let state = memory_state();
        let mut req = telemetry_post("dl=2");
        req.target = "/results/telemetry.php?dl=1&ul=3".into();
        let response = handle_request(&state, &req);
        let id = response.body.strip_prefix("id ").unwrap();
        let stored = state.store.as_ref().unwrap().get_by_id(id).unwrap();
        assert_eq!(stored.download, "2");
        assert_eq!(stored.upload, "3");
    }

    #[test]
    fn multipart_telemetry_is_rejected_without_storing() {
        let state = memory_state();
        let mut req = telemetry_post(
            "--XyZ\r\nContent-Disposition: form-data; name=\"dl\"\r\n\r\n123.4\r\n--XyZ--\r\n",
        );
        req.headers.insert(
            "content-type".into(),
            "multipart/form-data; boundary=XyZ".into(),
        );

        let response = handle_request(&state, &req);
        assert_eq!(response.status, 415);
        assert_eq!(response.body, r#"{"error":"Unsupported Media Type"}"#);
        assert_eq!(state.store.as_ref().unwrap().count().unwrap(), 0);
    }

    #[test]
    fn telemetry_body_encodings() {
        let state = memory_state();

        let mut req = telemetry_post("dl=5");
        req.headers.insert(
            "content-type".into(),
            "Application/X-WWW-Form-Urlencoded; charset=UTF-8".into(),
        );
        assert_eq!(handle_request(&state, &req).status, 200);

        req.headers.remove("content-type");
        assert_eq!(handle_request(&state, &req).status, 200);

        req.headers.insert("content-type".into(), "application/json".into());
        req.body = br#"{"dl":"5"}"#.to_vec();
        assert_eq!(handle_request(&state, &req).status, 415);

        // An empty body with any content type falls back to the query string.
        req.body.clear();
        req.target = "/results/telemetry?dl=7".into();
        assert_eq!(handle_request(&state, &req).status, 200);

        assert_eq!(state.store.as_ref().unwrap().count().unwrap(), 3);
    }

    #[test]
    fn telemetry_disabled_stores_nothing() {
        let state = state_with(Config::default(), None);
        let response = handle_request(&state, &telemetry_post("dl=1"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "Telemetry is disabled");
    }

    #[test]
    fn chart_returns_anonymized_series() {
        let state = memory_state();
        let blob = r#"{"processedString":"203.0.113.9 - Example ISP","rawIspInfo":{"ip":"203.0.113.9"}}"#;
        let body: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("ispinfo", blob)
            .append_pair("dl", "123.4")
            .append_pair("ul", "56.7")
            .append_pair("ping", "10")
            .append_pair("jitter", "1.5")
            .finish();
        assert_eq!(handle_request(&state, &telemetry_post(&body)).status, 200);

        let response = handle_request(&state, &request("GET", "/api/chart-data", [127, 0, 0, 1]));
        assert_eq!(response.status, 200);
        let points: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        let points = points.as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["download"], 123.4);
        assert_eq!(points[0]["jitter"], 1.5);
        let isp = points[0]["isp"].as_str().unwrap();
        assert!(isp.contains("203.0.113.x"));
        assert!(!isp.contains("203.0.113.9"));
    }

    #[test]
    fn chart_is_rate_limited() {
        let mut config = Config::default();
        config.rate_limit.max_requests = 2;
        let state = state_with(config, None);
        let req = request("GET", "/backend/api/chart-data", [127, 0, 0, 1]);
        assert_eq!(handle_request(&state, &req).body, "[]");
        assert_eq!(handle_request(&state, &req).status, 200);
        let limited = handle_request(&state, &req);
        assert_eq!(limited.status, 429);
        assert_eq!(limited.body, r#"{"error":"Too Many Requests"}"#);
    }

    #[test]
    fn chart_store_failure_is_generic_500() {
        // No record written yet, so the bucket does not exist.
        let state = memory_state();
        let response = handle_request(&state, &request("GET", "/api/chart-data", [127, 0, 0, 1]));
        assert_eq!(response.status, 500);
        assert_eq!(response.body, r#"{"error":"Internal Server Error"}"#);
    }

    #[test]
    fn address_report_for_private_and_public_peers() {
        let state = memory_state();
        let private = handle_request(&state, &request("GET", "/getIP?isp=true", [192, 168, 1, 20]));
        let value: serde_json::Value = serde_json::from_str(&private.body).unwrap();
        assert_eq!(value["processedString"], "192.168.1.20 - private IPv4 access");

        let public = handle_request(&state, &request("GET", "/getIP?isp=true", [203, 0, 113, 9]));
        let value: serde_json::Value = serde_json::from_str(&public.body).unwrap();
        assert_eq!(value["processedString"], "203.0.113.9 - Example ISP, Germany");
        assert_eq!(value["rawIspInfo"]["ip"], "203.0.113.9");

        let bare = handle_request(&state, &request("GET", "/getIP", [203, 0, 113, 9]));
        let value: serde_json::Value = serde_json::from_str(&bare.body).unwrap();
        assert_eq!(value["processedString"], "203.0.113.9");
    }

    #[test]
    fn proxy_headers_only_when_trusted() {
        let mut req = request("GET", "/getIP", [127, 0, 0, 1]);
        req.headers.insert("x-forwarded-for".into(), "198.51.100.7, 10.0.0.1".into());

        let untrusted = AppState::new(Config::default(), None, Box::new(NoopIspLookup));
        let value: serde_json::Value =
            serde_json::from_str(&handle_request(&untrusted, &req).body).unwrap();
        assert_eq!(value["processedString"], "127.0.0.1 - localhost IPv4 access");

        let mut config = Config::default();
        config.server.trust_proxy_headers = true;
        let trusted = AppState::new(config, None, Box::new(NoopIspLookup));
        let value: serde_json::Value =
            serde_json::from_str(&handle_request(&trusted, &req).body).unwrap();
        assert_eq!(value["processedString"], "198.51.100.7");
    }
}
