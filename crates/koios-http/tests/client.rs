//! Request execution and response decoding against a mock Koios server.

mod common;

use std::time::{Duration, Instant};

use koios_http::{Client, ClientOption, KoiosError, Request, DEFAULT_ORIGIN};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{api, client_for};

fn json_body(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_owned(), "application/json")
}

#[tokio::test]
async fn success_populates_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("/tip")))
        .respond_with(
            json_body(r#"[{"epoch":321,"abs_slot":72316896}]"#)
                .insert_header("content-range", "0-0/*"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, []);
    let rsp = client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap();

    assert_eq!(rsp.data[0]["epoch"], 321);
    assert_eq!(rsp.response.status_code, 200);
    assert_eq!(rsp.response.status, "200 OK");
    assert_eq!(rsp.response.request_method, "GET");
    assert_eq!(
        rsp.response.request_url,
        format!("http://127.0.0.1:{}/api/v0/tip", server.address().port())
    );
    assert_eq!(rsp.response.content_range.as_deref(), Some("0-0/*"));
    assert!(rsp.response.error.is_none());
    assert!(rsp.response.stats.is_none());
    assert_eq!(client.total_requests(), 1);
}

#[tokio::test]
async fn not_found_is_remote_error_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("/missing")))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_raw(r#"{"message":"not found"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, []);
    let failure = client
        .call::<Vec<Value>>(Request::get("/missing"))
        .await
        .unwrap_err();

    assert!(matches!(failure.kind, KoiosError::Remote { status: 404, .. }));
    assert_eq!(failure.status_code(), 404);
    assert_eq!(failure.response.status, "404 Not Found");
    assert_eq!(failure.response.error.as_ref().unwrap().message, "not found");
}

#[tokio::test]
async fn postgrest_error_fields_are_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("/asset_info")))
        .respond_with(ResponseTemplate::new(400).set_body_raw(
            r#"{"hint":null,"details":"bad column","code":"42703","message":"column does not exist"}"#,
            "application/json; charset=utf-8",
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, []);
    let failure = client
        .call::<Vec<Value>>(Request::get("/asset_info"))
        .await
        .unwrap_err();

    let error = failure.response.error.unwrap();
    assert_eq!(error.code, "42703");
    assert_eq!(error.details, "bad column");
    assert_eq!(error.hint, "");
    assert_eq!(error.message, "column does not exist");
}

#[tokio::test]
async fn html_body_is_not_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("/tip")))
        .respond_with(
            ResponseTemplate::new(502).set_body_raw("<html>Bad Gateway</html>", "text/html"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, []);
    let failure = client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap_err();

    match &failure.kind {
        KoiosError::NotJson { body } => assert_eq!(body, b"<html>Bad Gateway</html>"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.status_code(), 502);
    assert!(failure
        .response
        .error
        .as_ref()
        .unwrap()
        .message
        .contains("<html>Bad Gateway</html>"));
}

#[tokio::test]
async fn malformed_json_on_success_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("/tip")))
        .respond_with(json_body(r#"{"epoch": "#))
        .mount(&server)
        .await;

    let client = client_for(&server, []);
    let failure = client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap_err();
    assert!(matches!(failure.kind, KoiosError::Decode(_)));
    assert_eq!(failure.status_code(), 200);
}

#[tokio::test]
async fn headers_merge_with_call_specific_winning() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("/tip")))
        .and(header("Accept", "application/json"))
        .and(header("Origin", DEFAULT_ORIGIN))
        .and(header("X-Trace", "call"))
        .and(header("X-Team", "guild"))
        .respond_with(json_body("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        [
            ClientOption::CommonHeader("X-Trace".into(), "common".into()),
            ClientOption::CommonHeader("X-Team".into(), "guild".into()),
        ],
    );
    client
        .call::<Vec<Value>>(Request::get("/tip").header("x-trace", "call"))
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    let ua = received[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(ua.starts_with("koios-rs/"), "{ua}");
    assert_eq!(received[0].headers.get_all("x-trace").iter().count(), 1);
}

#[tokio::test]
async fn origin_option_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Origin", "https://example.com"))
        .respond_with(json_body("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, [ClientOption::Origin("https://example.com".into())]);
    client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap();
}

#[tokio::test]
async fn query_and_body_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api("/tx_info")))
        .and(query_param("select", "tx_hash"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"_tx_hashes": ["f144a8"]})))
        .respond_with(json_body(r#"[{"tx_hash":"f144a8"}]"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, []);
    let req = Request::post("/tx_info")
        .query([("select", "tx_hash")])
        .json(&json!({"_tx_hashes": ["f144a8"]}))
        .unwrap();
    let rsp = client.call::<Vec<Value>>(req).await.unwrap();
    assert_eq!(rsp.response.request_method, "POST");
    assert!(rsp.response.request_url.ends_with("/api/v0/tx_info?select=tx_hash"));
}

#[tokio::test]
async fn stats_collected_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(json_body("[]").set_delay(Duration::from_millis(30)))
        .mount(&server)
        .await;

    let client = client_for(&server, [ClientOption::CollectRequestStats(true)]);
    let rsp = client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap();
    let stats = rsp.response.stats.expect("stats enabled");
    let ttfb = stats.time_to_first_byte.expect("first byte marked");
    assert!(ttfb >= Duration::from_millis(30));
    assert!(stats.total >= ttfb);
    assert!(!stats.total_str.is_empty());
    // IP literal host: no lookup, but a fresh plain-http connection.
    assert!(stats.dns_lookup.is_none());
    assert!(stats.connection_establish.is_some());
    assert!(stats.tls_handshake.is_none());

    client.collect_request_stats(false).unwrap();
    let rsp = client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap();
    assert!(rsp.response.stats.is_none());
}

#[tokio::test]
async fn stats_phases_ordered_for_resolved_host() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("/tip")))
        .respond_with(json_body("[]"))
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        [
            ClientOption::Host("localhost".into()),
            ClientOption::CollectRequestStats(true),
        ],
    );
    let rsp = client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap();
    let stats = rsp.response.stats.expect("stats enabled");

    let dns = stats.dns_lookup.expect("localhost goes through the resolver");
    let connect = stats.connection_establish.expect("new connection");
    let ttfb = stats.time_to_first_byte.expect("first byte marked");
    assert!(dns <= connect, "{dns:?} > {connect:?}");
    assert!(connect <= ttfb, "{connect:?} > {ttfb:?}");
    assert!(ttfb <= stats.total);
    assert!(stats.tls_handshake.is_none());
}

#[tokio::test]
async fn stats_finalized_on_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_raw("[]", "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server, [ClientOption::CollectRequestStats(true)]);
    let failure = client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap_err();
    assert!(matches!(failure.kind, KoiosError::Remote { status: 500, .. }));
    assert!(failure.response.stats.is_some());
}

#[tokio::test]
async fn concurrent_calls_are_spaced_by_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(json_body("[]"))
        .expect(4)
        .mount(&server)
        .await;

    // 10 req/s: four starts span at least three intervals.
    let client = client_for(&server, [ClientOption::RateLimit(10)]);
    let started = Instant::now();
    let calls = (0..4).map(|_| {
        let client = client.clone();
        async move { client.call::<Vec<Value>>(Request::get("/tip")).await }
    });
    let results = futures::future::join_all(calls).await;
    let elapsed = started.elapsed();

    assert!(results.iter().all(Result::is_ok));
    assert!(elapsed >= Duration::from_millis(290), "{elapsed:?}");
    assert_eq!(client.total_requests(), 4);
}

#[tokio::test]
async fn base_url_change_applies_to_next_call() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        Mock::given(method("GET"))
            .respond_with(json_body("[]"))
            .expect(1)
            .mount(server)
            .await;
    }

    let client = client_for(&first, []);
    client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap();
    client.set_port(second.address().port()).unwrap();
    client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap();
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = Client::new([
        ClientOption::Schema("http".into()),
        ClientOption::Host("127.0.0.1".into()),
        ClientOption::Port(port),
    ])
    .unwrap();

    let failure = client.call::<Vec<Value>>(Request::get("/tip")).await.unwrap_err();
    assert!(failure.kind.is_transport());
    assert_eq!(failure.status_code(), 0);
    assert_eq!(
        failure.response.request_url,
        format!("http://127.0.0.1:{port}/api/v0/tip")
    );
    assert!(!failure.response.error.unwrap().message.is_empty());
}
