//! End-to-end scrapes and HTTP routes against an in-memory cluster.

mod common;

use common::*;
use hyper::{Body, Method, Request, Response, StatusCode};
use osprom_exporter::client::ClusterClient;
use osprom_exporter::handler::{render_scrape, ScrapeHandler, ScrapeTimeout};
use osprom_exporter::server::handle;
use osprom_exporter::settings::{ExporterSettings, SettingsSnapshot, SettingsStore};
use osprom_shared::{CommonStats, DocsStats, IndexStatsGroup};
use std::sync::Arc;
use std::time::Duration;

const THREADPOOL_LINE: &str = r#"opensearch_threadpool_threads_count{cluster="test-cluster",node="node-1",nodeid="id-1",name="search",type="completed"} 42"#;

fn settings(indices: bool, cluster_settings: bool) -> ExporterSettings {
    ExporterSettings {
        indices,
        cluster_settings,
        ..ExporterSettings::default()
    }
}

fn handler(cluster: MockCluster, settings: ExporterSettings, timeout: Duration) -> ScrapeHandler {
    let client: Arc<dyn ClusterClient> = Arc::new(cluster);
    ScrapeHandler::new(client, Arc::new(SettingsStore::new(settings)), "opensearch_", timeout)
}

fn request(method: Method, path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn renders_thread_pool_without_cluster_settings() {
    let cluster = MockCluster::new();
    let text = render_scrape(&cluster, "opensearch_", &SettingsSnapshot::new(settings(true, false)))
        .await
        .unwrap();

    assert_eq!(text.lines().filter(|l| *l == THREADPOOL_LINE).count(), 1, "{}", text);
    assert!(text.contains(r#"opensearch_cluster_status{cluster="test-cluster"} 0"#));
    assert!(text.contains("# TYPE opensearch_threadpool_threads_count counter"));
    assert!(!text.contains("cluster_routing_allocation_disk"));
    assert!(text.contains(
        r#"opensearch_metrics_generate_time_seconds_count{cluster="test-cluster",node="node-1",nodeid="id-1"} 1"#
    ));
}

#[tokio::test]
async fn renders_index_and_disk_metrics_when_enabled() {
    let mut cluster = MockCluster::new();
    cluster.indices_stats.indices.insert(
        "logs".to_string(),
        IndexStatsGroup {
            primaries: CommonStats {
                docs: Some(DocsStats { count: 10, deleted: 0 }),
                ..CommonStats::default()
            },
            total: CommonStats {
                docs: Some(DocsStats { count: 20, deleted: 0 }),
                ..CommonStats::default()
            },
        },
    );
    cluster
        .settings
        .effective
        .insert("cluster.routing.allocation.disk.watermark.low", "85%");

    let text = render_scrape(&cluster, "opensearch_", &SettingsSnapshot::new(settings(true, true)))
        .await
        .unwrap();

    assert!(text.contains(r#"opensearch_index_doc_number{cluster="test-cluster",index="logs",context="primaries"} 10"#));
    assert!(text.contains(r#"opensearch_index_doc_number{cluster="test-cluster",index="logs",context="total"} 20"#));
    assert!(text.contains(r#"opensearch_cluster_routing_allocation_disk_watermark_low_pct{cluster="test-cluster"} 85"#));
    assert!(!text.contains("cluster_routing_allocation_disk_watermark_low_bytes{"));
}

#[tokio::test]
async fn disabled_indices_leave_no_index_lines() {
    let cluster = MockCluster::new();
    let text = render_scrape(&cluster, "opensearch_", &SettingsSnapshot::new(settings(false, false)))
        .await
        .unwrap();

    assert!(!text.contains("opensearch_index_"));
    assert!(text.contains(THREADPOOL_LINE));
}

#[tokio::test]
async fn custom_prefix_is_applied() {
    let cluster = MockCluster::new();
    let text = render_scrape(&cluster, "es_", &SettingsSnapshot::new(settings(false, false)))
        .await
        .unwrap();
    assert!(text.contains(r#"es_cluster_nodes_number{cluster="test-cluster"} 1"#));
    assert!(!text.contains("opensearch_"));
}

#[tokio::test]
async fn invalid_prefix_fails_the_scrape() {
    let cluster = MockCluster::new();
    let err = render_scrape(&cluster, "", &SettingsSnapshot::new(settings(false, false)))
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("metric prefix"));
}

#[tokio::test]
async fn metrics_route_serves_exposition() {
    let handler = handler(MockCluster::new(), settings(true, false), Duration::from_secs(5));
    let response = handle(request(Method::GET, "/_prometheus/metrics", ""), &handler)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/plain; charset=UTF-8"
    );
    assert!(body_text(response).await.contains(THREADPOOL_LINE));
}

#[tokio::test]
async fn failed_stage_is_a_server_error() {
    let handler = handler(
        MockCluster::new().failing_at(NODES_STATS),
        settings(true, true),
        Duration::from_secs(5),
    );
    let response = handle(request(Method::GET, "/_prometheus/metrics", ""), &handler)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("nodes stats request failed"), "{}", body);
    assert!(!body.contains("opensearch_"));
}

#[tokio::test]
async fn slow_cluster_times_out() {
    let handler = handler(
        MockCluster::new().slow(Duration::from_millis(500)),
        settings(false, false),
        Duration::from_millis(50),
    );
    let err = handler.scrape().await.unwrap_err();
    assert!(err.is::<ScrapeTimeout>());

    let response = handle(request(Method::GET, "/_prometheus/metrics", ""), &handler)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn settings_update_applies_to_next_scrape() {
    let handler = handler(MockCluster::new(), settings(true, true), Duration::from_secs(5));

    let response = handle(
        request(Method::PUT, "/_prometheus/settings", r#"{"prometheus.indices": false, "prometheus.nodes.filter": "_all"}"#),
        &handler,
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["prometheus.indices"], "false");
    assert_eq!(body["prometheus.nodes.filter"], "_all");

    let snapshot = handler.settings().snapshot();
    assert!(!snapshot.indices_enabled());
    assert_eq!(snapshot.nodes_filter(), "_all");
}

#[tokio::test]
async fn invalid_settings_update_is_rejected() {
    let handler = handler(MockCluster::new(), settings(true, true), Duration::from_secs(5));

    for body in [
        r#"{"prometheus.indices": false, "prometheus.unknown": 1}"#,
        r#"{"prometheus.indices_filter.selected_option": "EVERYTHING"}"#,
        r#"["not", "an", "object"]"#,
        "not json",
    ] {
        let response = handle(request(Method::PUT, "/_prometheus/settings", body), &handler)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
    }
    assert!(handler.settings().snapshot().indices_enabled());
}

#[tokio::test]
async fn settings_route_reports_current_values() {
    let handler = handler(MockCluster::new(), settings(true, false), Duration::from_secs(5));
    let response = handle(request(Method::GET, "/_prometheus/settings", ""), &handler)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["prometheus.cluster.settings"], "false");
    assert_eq!(body["prometheus.nodes.filter"], "_local");
    assert_eq!(
        body["prometheus.indices_filter.selected_option"],
        "STRICT_EXPAND_OPEN_FORBID_CLOSED"
    );
}

#[tokio::test]
async fn other_routes() {
    let handler = handler(MockCluster::new(), settings(false, false), Duration::from_secs(5));

    let health = handle(request(Method::GET, "/healthz", ""), &handler).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let missing = handle(request(Method::GET, "/nope", ""), &handler).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let wrong_method = handle(request(Method::POST, "/_prometheus/metrics", ""), &handler)
        .await
        .unwrap();
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(wrong_method.headers()["allow"], "GET");

    handler.scrape().await.unwrap();
    let self_metrics = handle(request(Method::GET, "/metrics", ""), &handler).await.unwrap();
    assert_eq!(self_metrics.status(), StatusCode::OK);
    assert!(body_text(self_metrics).await.contains("osprom_scrapes_total"));
}
