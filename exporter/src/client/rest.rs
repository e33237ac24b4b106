//! [`ClusterClient`] over the cluster's REST API

use super::{
    ClientError, ClusterClient, ClusterStateRequest, HealthRequest, IndicesStatsRequest,
    NodesInfoRequest, NodesStatsRequest,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hyper::client::HttpConnector;
use hyper::{header, Body, Client, Method, Request, Uri};
use osprom_shared::{
    ClusterHealth, ClusterSettingsLayers, IndicesStats, LocalNodeInfo, NodeStats,
    NodesStatsResponse, SettingsLayer,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Plain-HTTP REST client for one cluster endpoint.
#[derive(Debug, Clone)]
pub struct RestClusterClient {
    client: Client<HttpConnector>,
    base_url: String,
    authorization: Option<String>,
}

#[derive(Deserialize)]
struct NodesInfoResponse {
    #[serde(default)]
    cluster_name: String,
    #[serde(default)]
    nodes: BTreeMap<String, NodeName>,
}

#[derive(Deserialize)]
struct NodeName {
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ClusterSettingsResponse {
    transient: serde_json::Value,
    persistent: serde_json::Value,
    defaults: serde_json::Value,
}

impl RestClusterClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let uri: Uri = base_url.parse()?;
        match uri.scheme_str() {
            Some("http") => {}
            other => {
                return Err(ClientError::UnsupportedScheme(
                    other.unwrap_or_default().to_string(),
                ))
            }
        }
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: None,
        })
    }

    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        let token = STANDARD.encode(format!("{}:{}", username, password));
        self.authorization = Some(format!("Basic {}", token));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ClientError> {
        let uri: Uri = format!("{}{}", self.base_url, path_and_query).parse()?;
        debug!("GET {}", uri);

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        if let Some(auth) = &self.authorization {
            builder = builder.header(header::AUTHORIZATION, auth.as_str());
        }
        let request = builder.body(Body::empty())?;

        let response = self.client.request(request).await?;
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ClusterClient for RestClusterClient {
    async fn cluster_health(&self, request: &HealthRequest) -> Result<ClusterHealth, ClientError> {
        let path = format!(
            "/_cluster/health?local={}&level={}",
            request.local,
            request.level.as_str()
        );
        self.get_json(&path).await
    }

    async fn nodes_info(&self, request: &NodesInfoRequest) -> Result<LocalNodeInfo, ClientError> {
        let mut path = format!("/_nodes/{}", encode_segment(&request.selector));
        if request.minimal {
            path.push_str("?filter_path=cluster_name,nodes.*.name");
        }
        let response: NodesInfoResponse = self.get_json(&path).await?;
        let (node_id, node) = response.nodes.into_iter().next().ok_or_else(|| {
            ClientError::Missing(format!(
                "nodes info response for [{}] contains no node",
                request.selector
            ))
        })?;
        Ok(LocalNodeInfo {
            cluster_name: response.cluster_name,
            node_name: node.name,
            node_id,
        })
    }

    async fn nodes_stats(&self, request: &NodesStatsRequest) -> Result<Vec<NodeStats>, ClientError> {
        let mut path = format!("/_nodes/{}/stats", encode_segment(&request.selector));
        if request.all {
            path.push_str("/_all");
        }
        let response: NodesStatsResponse = self.get_json(&path).await?;
        Ok(response.into_nodes())
    }

    async fn indices_stats(&self, request: &IndicesStatsRequest) -> Result<IndicesStats, ClientError> {
        let target = if request.indices.is_empty() {
            String::new()
        } else {
            let joined = request
                .indices
                .iter()
                .map(|index| encode_segment(index))
                .collect::<Vec<_>>()
                .join(",");
            format!("/{}", joined)
        };
        let path = format!("{}/_stats?{}", target, request.options.query_string());
        self.get_json(&path).await
    }

    async fn cluster_state(&self, request: &ClusterStateRequest) -> Result<ClusterSettingsLayers, ClientError> {
        // The settings API serves the cluster state's settings metadata;
        // defaults stand in for the effective node layer.
        let mut path = format!(
            "/_cluster/settings?include_defaults=true&flat_settings=true&local={}",
            request.local
        );
        if request.metadata_only {
            path.push_str("&filter_path=transient,persistent,defaults");
        }
        let response: ClusterSettingsResponse = self.get_json(&path).await?;
        Ok(ClusterSettingsLayers {
            transient: SettingsLayer::from_json(&response.transient),
            persistent: SettingsLayer::from_json(&response.persistent),
            effective: SettingsLayer::from_json(&response.defaults),
        })
    }
}

/// Percent-encode a path segment, keeping the characters node and index
/// expressions use (`,`, `*`, `:`).
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b',' | b'*' | b':' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HealthLevel;
    use crate::settings::IndexFilterOption;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Response, Server, StatusCode};
    use osprom_shared::HealthStatus;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Seen {
        uri: String,
        authorization: Option<String>,
    }

    /// Serve `body` with `status` to every request on an ephemeral port.
    /// Returns the base URL and the requests received.
    fn stub(status: StatusCode, body: &'static str) -> (String, Arc<Mutex<Vec<Seen>>>) {
        let seen: Arc<Mutex<Vec<Seen>>> = Arc::default();
        let recorded = seen.clone();
        let make_svc = make_service_fn(move |_| {
            let recorded = recorded.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    recorded.lock().unwrap().push(Seen {
                        uri: req.uri().to_string(),
                        authorization: req
                            .headers()
                            .get(header::AUTHORIZATION)
                            .map(|v| v.to_str().unwrap().to_string()),
                    });
                    async move {
                        let mut res = Response::new(Body::from(body));
                        *res.status_mut() = status;
                        Ok::<_, Infallible>(res)
                    }
                }))
            }
        });
        let server = Server::try_bind(&([127, 0, 0, 1], 0).into())
            .unwrap()
            .serve(make_svc);
        let url = format!("http://{}", server.local_addr());
        tokio::spawn(server);
        (url, seen)
    }

    fn only_uri(seen: &Arc<Mutex<Vec<Seen>>>) -> String {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        seen[0].uri.clone()
    }

    #[test]
    fn test_new_rejects_https() {
        assert!(RestClusterClient::new("http://localhost:9200/").is_ok());
        assert!(matches!(
            RestClusterClient::new("https://localhost:9200"),
            Err(ClientError::UnsupportedScheme(s)) if s == "https"
        ));
        assert!(RestClusterClient::new("not a url").is_err());
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = RestClusterClient::new("http://localhost:9200/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:9200");
    }

    #[test]
    fn test_basic_auth_header() {
        let client = RestClusterClient::new("http://localhost:9200")
            .unwrap()
            .with_basic_auth("admin", "secret");
        assert_eq!(client.authorization.as_deref(), Some("Basic YWRtaW46c2VjcmV0"));
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("_local"), "_local");
        assert_eq!(encode_segment("logs-*,data:true"), "logs-*,data:true");
        assert_eq!(encode_segment("my index"), "my%20index");
        assert_eq!(encode_segment("a/b"), "a%2Fb");
    }

    #[tokio::test]
    async fn test_cluster_health_request() {
        let (url, seen) = stub(
            StatusCode::OK,
            r#"{"cluster_name":"c","status":"yellow","number_of_nodes":3,"indices":{"logs":{"status":"red","number_of_replicas":1}}}"#,
        );
        let client = RestClusterClient::new(&url).unwrap();
        let health = client
            .cluster_health(&HealthRequest {
                local: true,
                level: HealthLevel::Shards,
            })
            .await
            .unwrap();

        assert_eq!(only_uri(&seen), "/_cluster/health?local=true&level=shards");
        assert_eq!(health.status, HealthStatus::Yellow);
        assert_eq!(health.number_of_nodes, 3);
        assert_eq!(health.indices["logs"].status, HealthStatus::Red);
    }

    #[tokio::test]
    async fn test_nodes_info_request() {
        let (url, seen) = stub(
            StatusCode::OK,
            r#"{"cluster_name":"c","nodes":{"id-1":{"name":"node-1"}}}"#,
        );
        let client = RestClusterClient::new(&url).unwrap();
        let info = client
            .nodes_info(&NodesInfoRequest {
                selector: "_local".into(),
                minimal: true,
            })
            .await
            .unwrap();

        assert_eq!(only_uri(&seen), "/_nodes/_local?filter_path=cluster_name,nodes.*.name");
        assert_eq!(
            info,
            LocalNodeInfo {
                cluster_name: "c".into(),
                node_name: "node-1".into(),
                node_id: "id-1".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_nodes_info_without_nodes() {
        let (url, _seen) = stub(StatusCode::OK, r#"{"cluster_name":"c"}"#);
        let client = RestClusterClient::new(&url).unwrap();
        let err = client
            .nodes_info(&NodesInfoRequest {
                selector: "_local".into(),
                minimal: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Missing(_)));
    }

    #[tokio::test]
    async fn test_nodes_stats_request() {
        let (url, seen) = stub(
            StatusCode::OK,
            r#"{"cluster_name":"c","nodes":{"id-1":{"name":"node-1","process":{"cpu":{"total_in_millis":-1}}}}}"#,
        );
        let client = RestClusterClient::new(&url).unwrap();
        let nodes = client
            .nodes_stats(&NodesStatsRequest {
                selector: "_all".into(),
                all: true,
            })
            .await
            .unwrap();

        assert_eq!(only_uri(&seen), "/_nodes/_all/stats/_all");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "id-1");
        assert_eq!(nodes[0].process.as_ref().unwrap().cpu.total_in_millis, -1);
    }

    #[tokio::test]
    async fn test_indices_stats_request() {
        let (url, seen) = stub(
            StatusCode::OK,
            r#"{"_shards":{"total":2,"successful":2,"failed":0},"indices":{"logs":{"primaries":{"docs":{"count":5,"deleted":1}},"total":{}}}}"#,
        );
        let client = RestClusterClient::new(&url).unwrap();
        let options = IndexFilterOption::default().indices_options();

        let stats = client
            .indices_stats(&IndicesStatsRequest {
                indices: Vec::new(),
                options,
            })
            .await
            .unwrap();
        assert_eq!(stats.shards.successful, 2);
        assert_eq!(stats.indices["logs"].primaries.docs.as_ref().unwrap().count, 5);

        client
            .indices_stats(&IndicesStatsRequest {
                indices: vec!["logs-*".into(), "my index".into()],
                options,
            })
            .await
            .unwrap();

        let uris: Vec<String> = seen.lock().unwrap().iter().map(|s| s.uri.clone()).collect();
        assert_eq!(
            uris,
            vec![
                "/_stats?expand_wildcards=open&ignore_unavailable=false&allow_no_indices=true&ignore_throttled=false",
                "/logs-*,my%20index/_stats?expand_wildcards=open&ignore_unavailable=false&allow_no_indices=true&ignore_throttled=false",
            ]
        );
    }

    #[tokio::test]
    async fn test_cluster_state_request() {
        let (url, seen) = stub(
            StatusCode::OK,
            r#"{"transient":{},"persistent":{"cluster.routing.allocation.disk.watermark.low":"80%"},"defaults":{"cluster.routing.allocation.disk.threshold_enabled":"true"}}"#,
        );
        let client = RestClusterClient::new(&url).unwrap();
        let layers = client
            .cluster_state(&ClusterStateRequest {
                metadata_only: true,
                local: false,
            })
            .await
            .unwrap();

        assert_eq!(
            only_uri(&seen),
            "/_cluster/settings?include_defaults=true&flat_settings=true&local=false&filter_path=transient,persistent,defaults"
        );
        assert!(layers.transient.is_empty());
        assert_eq!(
            layers.persistent.get("cluster.routing.allocation.disk.watermark.low"),
            Some("80%")
        );
        assert_eq!(
            layers.effective.get("cluster.routing.allocation.disk.threshold_enabled"),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_error_status_and_auth_header() {
        let (url, seen) = stub(StatusCode::BAD_REQUEST, r#"{"error":"bad request"}"#);
        let client = RestClusterClient::new(&url)
            .unwrap()
            .with_basic_auth("admin", "secret");
        let err = client
            .cluster_health(&HealthRequest {
                local: true,
                level: HealthLevel::Cluster,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Status { status: 400, ref body } if body.contains("bad request")));
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].authorization.as_deref(), Some("Basic YWRtaW46c2VjcmV0"));
    }
}
