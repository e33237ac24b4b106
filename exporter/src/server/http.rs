//! HTTP server: the scrape route, the settings API, self-metrics and
//! liveness.

use crate::audit;
use crate::handler::{ScrapeHandler, ScrapeTimeout};
use crate::metrics::{self, SETTINGS_UPDATES};
use crate::settings::{ExporterSettings, SettingsUpdate};
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const METRICS_PATH: &str = "/_prometheus/metrics";
pub const SETTINGS_PATH: &str = "/_prometheus/settings";
pub const SELF_METRICS_PATH: &str = "/metrics";
pub const HEALTH_PATH: &str = "/healthz";

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";
const SELF_METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Serve until `shutdown` is cancelled; in-flight requests are allowed to
/// finish.
pub async fn serve(
    addr: SocketAddr,
    handler: Arc<ScrapeHandler>,
    shutdown: CancellationToken,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let handler = handler.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                let handler = handler.clone();
                async move { handle(req, &handler).await }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    tracing::info!("HTTP server listening on {}", server.local_addr());
    server
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

pub async fn handle(req: Request<Body>, handler: &ScrapeHandler) -> Result<Response<Body>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (path.as_str(), &method) {
        (METRICS_PATH, &Method::GET) => scrape(handler).await,
        (SETTINGS_PATH, &Method::GET) => settings_response(handler.settings().snapshot().settings()),
        (SETTINGS_PATH, &Method::PUT) => {
            let body = hyper::body::to_bytes(req.into_body()).await?;
            update_settings(handler, &body)
        }
        (SELF_METRICS_PATH, &Method::GET) => match metrics::encode_metrics() {
            Ok(text) => text_response(StatusCode::OK, SELF_METRICS_CONTENT_TYPE, text),
            Err(e) => text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                EXPOSITION_CONTENT_TYPE,
                format!("{}\n", e),
            ),
        },
        (HEALTH_PATH, &Method::GET) => text_response(StatusCode::OK, EXPOSITION_CONTENT_TYPE, "ok\n"),
        (METRICS_PATH | SELF_METRICS_PATH | HEALTH_PATH, _) => method_not_allowed("GET"),
        (SETTINGS_PATH, _) => method_not_allowed("GET, PUT"),
        _ => text_response(StatusCode::NOT_FOUND, EXPOSITION_CONTENT_TYPE, "not found\n"),
    };

    audit::http_request(method.as_str(), &path, response.status().as_u16());
    Ok(response)
}

async fn scrape(handler: &ScrapeHandler) -> Response<Body> {
    match handler.scrape().await {
        Ok(text) => text_response(StatusCode::OK, EXPOSITION_CONTENT_TYPE, text),
        Err(e) => {
            let status = if e.is::<ScrapeTimeout>() {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            // Debug formatting renders the whole cause chain.
            text_response(status, EXPOSITION_CONTENT_TYPE, format!("{:?}\n", e))
        }
    }
}

fn update_settings(handler: &ScrapeHandler, body: &[u8]) -> Response<Body> {
    let doc = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(doc)) => doc,
        Ok(_) => return reject_settings("settings body must be a JSON object"),
        Err(e) => return reject_settings(&format!("invalid JSON body: {}", e)),
    };
    let update = match SettingsUpdate::from_json(&doc) {
        Ok(update) => update,
        Err(e) => return reject_settings(&e.to_string()),
    };

    let updated = handler.settings().update(update);
    let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
    audit::settings_updated(&keys);
    SETTINGS_UPDATES.with_label_values(&["ok"]).inc();
    settings_response(&updated)
}

fn reject_settings(reason: &str) -> Response<Body> {
    audit::settings_rejected(reason);
    SETTINGS_UPDATES.with_label_values(&["rejected"]).inc();
    json_response(&json!({ "error": reason }), StatusCode::BAD_REQUEST)
}

fn settings_response(settings: &ExporterSettings) -> Response<Body> {
    let doc: serde_json::Map<String, Value> = settings
        .to_map()
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v)))
        .collect();
    json_response(&Value::Object(doc), StatusCode::OK)
}

fn json_response(body: &Value, status: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::from(body.to_string()));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res
}

fn text_response(status: StatusCode, content_type: &'static str, body: impl Into<Body>) -> Response<Body> {
    let mut res = Response::new(body.into());
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    res
}

fn method_not_allowed(allow: &'static str) -> Response<Body> {
    let mut res = text_response(
        StatusCode::METHOD_NOT_ALLOWED,
        EXPOSITION_CONTENT_TYPE,
        "method not allowed\n",
    );
    res.headers_mut().insert(ALLOW, HeaderValue::from_static(allow));
    res
}
