//! Upstream forwarding with header sanitization.
//!
//! Buffers the inbound request, replays it against the resolved upstream
//! through a shared `reqwest` client, and relays the upstream response back
//! verbatim. Hop-by-hop and framing headers are stripped in both directions
//! so each hop's transport layer computes its own framing; everything else,
//! including the caller identity header, passes through untouched.

use std::time::Duration;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::error::GatewayError;
use crate::registry::ServiceRecord;

/// Request headers never relayed to the upstream. `host` and the framing
/// headers are owned by the client library for the new connection.
const HOP_BY_HOP_REQUEST: [&str; 5] = [
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
];

/// Response headers never relayed back to the caller; the server side
/// recomputes framing for the re-emitted response.
const HOP_BY_HOP_RESPONSE: [&str; 4] = [
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "connection",
];

fn is_hop_by_hop_request(name: &str) -> bool {
    HOP_BY_HOP_REQUEST.contains(&name)
}

fn is_hop_by_hop_response(name: &str) -> bool {
    HOP_BY_HOP_RESPONSE.contains(&name)
}

/// Destination URL for a resolved target.
///
/// The stored base URL keeps its meaning exactly: when the resolver left no
/// subpath the destination is the base alone, with no trailing `/` appended
/// (a bare trailing slash changes many servers' routing).
#[must_use]
pub fn destination_url(record: &ServiceRecord, subpath: &str) -> String {
    let base = record.base_url();
    if subpath.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{subpath}")
    }
}

/// Forwards proxied requests to their resolved upstream.
pub struct ProxyForwarder {
    client: reqwest::Client,
}

impl ProxyForwarder {
    /// Build the forwarder with a bounded per-call timeout.
    ///
    /// `insecure_tls` disables upstream certificate verification and must
    /// only ever be set from the explicit configuration flag.
    pub fn new(timeout: Duration, insecure_tls: bool) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;
        Ok(Self { client })
    }

    /// Replay the buffered request against `destination` and relay the
    /// upstream response.
    ///
    /// Body and query string are forwarded verbatim. Connectivity failures
    /// (refused connection, DNS, timeout) come back as
    /// [`GatewayError::Upstream`]; anything else while building or sending
    /// the request is [`GatewayError::Internal`].
    pub async fn forward(
        &self,
        method: Method,
        destination: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, GatewayError> {
        let url = match query {
            Some(query) => format!("{destination}?{query}"),
            None => destination.to_string(),
        };

        let mut outbound = HeaderMap::new();
        for (name, value) in headers {
            if !is_hop_by_hop_request(name.as_str()) {
                outbound.append(name.clone(), value.clone());
            }
        }

        let mut request = self.client.request(method, &url).headers(outbound);
        if !body.is_empty() {
            request = request.body(body);
        }

        let upstream = request.send().await.map_err(|err| {
            if err.is_timeout() || err.is_connect() {
                tracing::warn!(destination = %url, error = %err, "upstream unreachable");
                GatewayError::Upstream(format!("{destination}: {err}"))
            } else {
                GatewayError::Internal(format!("forwarding to {destination} failed: {err}"))
            }
        })?;

        let status = upstream.status();
        let mut response = http::Response::builder().status(status);
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop_response(name.as_str()) {
                response = response.header(name, value);
            }
        }

        let bytes = upstream
            .bytes()
            .await
            .map_err(|err| GatewayError::Upstream(format!("{destination}: {err}")))?;

        response
            .body(Body::from(bytes))
            .map_err(|err| GatewayError::Internal(format!("assembling relayed response: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::extract::RawQuery;
    use axum::routing::{get, post};
    use http::HeaderValue;
    use http_body_util::BodyExt;
    use std::net::SocketAddr;

    fn record(url: &str) -> ServiceRecord {
        ServiceRecord::new("svc", url, ["receive"])
    }

    async fn spawn_upstream(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn forwarder() -> ProxyForwarder {
        ProxyForwarder::new(Duration::from_secs(5), false).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_destination_url_joins_subpath() {
        assert_eq!(
            destination_url(&record("http://svc:9000"), "v1/charge"),
            "http://svc:9000/v1/charge"
        );
        assert_eq!(
            destination_url(&record("http://svc:9000/"), "v1/charge"),
            "http://svc:9000/v1/charge"
        );
    }

    /// An exact id match forwards to the base URL with no trailing slash
    /// appended.
    #[test]
    fn test_destination_url_empty_subpath() {
        assert_eq!(destination_url(&record("http://svc:9000"), ""), "http://svc:9000");
        assert_eq!(destination_url(&record("http://svc:9000/"), ""), "http://svc:9000");
    }

    #[test]
    fn test_request_header_filter() {
        for name in ["host", "content-length", "transfer-encoding", "connection", "keep-alive"] {
            assert!(is_hop_by_hop_request(name), "{name} must be stripped");
        }
        assert!(!is_hop_by_hop_request("x-meshgate-caller"));
        assert!(!is_hop_by_hop_request("authorization"));
    }

    #[test]
    fn test_response_header_filter() {
        for name in ["content-encoding", "content-length", "transfer-encoding", "connection"] {
            assert!(is_hop_by_hop_response(name), "{name} must be stripped");
        }
        assert!(!is_hop_by_hop_response("content-type"));
        assert!(!is_hop_by_hop_response("x-upstream-version"));
    }

    #[tokio::test]
    async fn test_forward_relays_status_and_body() {
        let app = Router::new().route(
            "/hello",
            get(|| async { (http::StatusCode::IM_A_TEAPOT, "short and stout") }),
        );
        let addr = spawn_upstream(app).await;

        let response = forwarder()
            .forward(
                Method::GET,
                &format!("http://{addr}/hello"),
                None,
                &HeaderMap::new(),
                Bytes::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), http::StatusCode::IM_A_TEAPOT);
        assert_eq!(body_string(response).await, "short and stout");
    }

    #[tokio::test]
    async fn test_forward_relays_body_and_query() {
        let app = Router::new().route(
            "/echo",
            post(|RawQuery(query): RawQuery, body: String| async move {
                format!("{}|{}", query.unwrap_or_default(), body)
            }),
        );
        let addr = spawn_upstream(app).await;

        let response = forwarder()
            .forward(
                Method::POST,
                &format!("http://{addr}/echo"),
                Some("tenant=blue&dry_run=1"),
                &HeaderMap::new(),
                Bytes::from_static(b"payload bytes"),
            )
            .await
            .unwrap();

        assert_eq!(
            body_string(response).await,
            "tenant=blue&dry_run=1|payload bytes"
        );
    }

    /// Hop-by-hop request headers never reach the upstream; everything else,
    /// identity header included, does.
    #[tokio::test]
    async fn test_forward_strips_request_hop_headers() {
        let app = Router::new().route(
            "/",
            get(|headers: HeaderMap| async move {
                let names: Vec<String> = headers.keys().map(|k| k.as_str().to_string()).collect();
                Json(names)
            }),
        );
        let addr = spawn_upstream(app).await;

        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-meshgate-caller", HeaderValue::from_static("billing"));
        headers.insert("x-request-tag", HeaderValue::from_static("abc"));

        let response = forwarder()
            .forward(
                Method::GET,
                &format!("http://{addr}"),
                None,
                &headers,
                Bytes::new(),
            )
            .await
            .unwrap();

        let seen: Vec<String> = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(!seen.contains(&"connection".to_string()));
        assert!(!seen.contains(&"keep-alive".to_string()));
        assert!(seen.contains(&"x-meshgate-caller".to_string()));
        assert!(seen.contains(&"x-request-tag".to_string()));
    }

    #[tokio::test]
    async fn test_forward_strips_response_hop_headers() {
        let app = Router::new().route(
            "/",
            get(|| async {
                (
                    [
                        ("content-encoding", "identity"),
                        ("x-upstream-version", "7"),
                    ],
                    "ok",
                )
            }),
        );
        let addr = spawn_upstream(app).await;

        let response = forwarder()
            .forward(
                Method::GET,
                &format!("http://{addr}"),
                None,
                &HeaderMap::new(),
                Bytes::new(),
            )
            .await
            .unwrap();

        assert!(response.headers().get("content-encoding").is_none());
        assert_eq!(
            response.headers().get("x-upstream-version").unwrap(),
            "7"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_upstream_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = forwarder()
            .forward(
                Method::GET,
                &format!("http://{addr}/x"),
                None,
                &HeaderMap::new(),
                Bytes::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Upstream(_)), "got {err:?}");
    }

    /// A destination that cannot even be parsed into a request is a gateway
    /// malfunction, not an upstream failure.
    #[tokio::test]
    async fn test_unparseable_destination_is_internal_error() {
        let err = forwarder()
            .forward(
                Method::GET,
                "http://exa mple.com/x",
                None,
                &HeaderMap::new(),
                Bytes::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Internal(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out_as_upstream_error() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                "late"
            }),
        );
        let addr = spawn_upstream(app).await;

        let forwarder = ProxyForwarder::new(Duration::from_millis(50), false).unwrap();
        let err = forwarder
            .forward(
                Method::GET,
                &format!("http://{addr}/slow"),
                None,
                &HeaderMap::new(),
                Bytes::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Upstream(_)), "got {err:?}");
    }
}
