use funnel_core::{Config, Funnel, LineId, LineProfile, NightWindow};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::oneshot;

fn line(base_latency_ms: u64, error_rate: f64, timeout_rate: f64, enabled: bool) -> LineProfile {
    LineProfile {
        name: String::new(),
        enabled,
        base_latency_ms,
        jitter_ms: 0,
        error_rate,
        timeout_rate,
        timeout_ms: 50,
        night_block_enabled: false,
        night_block_window: NightWindow::default(),
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.metrics.ring_capacity = 16;
    config.metrics.window_secs = 10;
    config.rng.seed = Some(7);
    config.lines = BTreeMap::from([
        (LineId::from("ok"), line(5, 0.0, 0.0, true)),
        (LineId::from("flaky"), line(1, 1.0, 0.0, true)),
        (LineId::from("off"), line(1, 0.0, 0.0, false)),
        (LineId::from("stall"), line(1, 0.0, 1.0, true)),
    ]);
    config
}

/// Returns (base_url, shutdown_sender, join_handle)
async fn spawn_test_server() -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let funnel = Arc::new(Funnel::from_config(&test_config()).unwrap());

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        funnel_server::serve(listener, funnel, async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (base_url, shutdown_tx, handle)
}

async fn snapshot(client: &reqwest::Client, base: &str) -> Value {
    client
        .get(format!("{}/metrics/snapshot", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn it_serves_success_line() {
    let (base, shutdown, handle) = spawn_test_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/ok/api/ping", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-mock-line"], "ok");
    let latency: u64 = resp.headers()["x-mock-latency-ms"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(latency >= 5, "latency {}", latency);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["line"], "ok");
    assert_eq!(body["resource"], "ping");
    assert_eq!(body["data"]["resource"], "ping");
    assert!(body.get("error").is_none());

    drop(client);
    let _ = shutdown.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn it_maps_outcomes_to_status_codes() {
    let (base, shutdown, handle) = spawn_test_server().await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{}/flaky/api/grades", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "simulated upstream error");
    assert!(body.get("data").is_none());

    let resp = client.get(format!("{}/off/api/schedule", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "line disabled");

    let resp = client.get(format!("{}/stall/api/ping", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "simulated timeout");

    let resp = client.get(format!("{}/nope/api/ping", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.text().await.unwrap(), "unknown line");

    drop(client);
    let _ = shutdown.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn it_exposes_metrics_snapshot() {
    let (base, shutdown, handle) = spawn_test_server().await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        client.get(format!("{}/flaky/api/ping", base)).send().await.unwrap();
    }
    client.get(format!("{}/ok/api/ping", base)).send().await.unwrap();
    client.get(format!("{}/off/api/ping", base)).send().await.unwrap();

    let snap = snapshot(&client, &base).await;

    let flaky = &snap["totals"]["flaky"];
    assert_eq!(flaky["requests"], 3);
    assert_eq!(flaky["errors"], 3);
    assert_eq!(flaky["success"], 0);
    assert!(flaky["p50_ms"].is_u64());

    assert_eq!(snap["totals"]["ok"]["success"], 1);
    assert_eq!(snap["totals"]["off"]["errors"], 1);
    assert_eq!(snap["totals"]["stall"]["requests"], 0);
    assert!(snap["totals"]["stall"]["p99_ms"].is_null());

    for id in ["ok", "flaky", "off", "stall"] {
        let series = &snap["series"][id];
        for col in ["sec", "rps", "latency_avg", "success", "errors", "timeouts"] {
            assert_eq!(series[col].as_array().unwrap().len(), 10, "{}.{}", id, col);
        }
    }
    let rps_total: u64 = snap["series"]["flaky"]["rps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(rps_total, 3);

    drop(client);
    let _ = shutdown.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn it_resets_metrics() {
    let (base, shutdown, handle) = spawn_test_server().await;
    let client = reqwest::Client::new();

    client.get(format!("{}/ok/api/ping", base)).send().await.unwrap();
    client.get(format!("{}/flaky/api/ping", base)).send().await.unwrap();

    let resp = client.post(format!("{}/admin/reset/ok", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let snap = snapshot(&client, &base).await;
    assert_eq!(snap["totals"]["ok"]["requests"], 0);
    assert_eq!(snap["totals"]["flaky"]["requests"], 1);

    let resp = client.post(format!("{}/admin/reset", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let snap = snapshot(&client, &base).await;
    assert_eq!(snap["totals"]["flaky"]["requests"], 0);

    let resp = client.post(format!("{}/admin/reset/ghost", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    drop(client);
    let _ = shutdown.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn it_edits_line_profiles() {
    let (base, shutdown, handle) = spawn_test_server().await;
    let client = reqwest::Client::new();

    let config: Value = client
        .get(format!("{}/admin/config", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(config["lines"].as_object().unwrap().len(), 4);
    assert_eq!(config["lines"]["ok"]["base_latency_ms"], 5);

    // disable the "ok" line and verify the next request sees it
    let mut profile: Value = client
        .get(format!("{}/admin/line/ok", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    profile["enabled"] = Value::Bool(false);
    profile["name"] = Value::String("Renamed".to_string());
    let resp = client
        .post(format!("{}/admin/line/ok", base))
        .json(&profile)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["enabled"], false);
    assert_eq!(updated["name"], "Renamed");

    let resp = client.get(format!("{}/ok/api/ping", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    // empty name keeps the previous one
    let resp = client
        .post(format!("{}/admin/line/ok", base))
        .json(&serde_json::json!({ "enabled": true, "base_latency_ms": 1 }))
        .send()
        .await
        .unwrap();
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["enabled"], true);

    let resp = client
        .post(format!("{}/admin/line/ok", base))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "invalid json");

    let resp = client
        .post(format!("{}/admin/line/ok", base))
        .json(&serde_json::json!({ "error_rate": 3.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client.get(format!("{}/admin/line/ghost", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    drop(client);
    let _ = shutdown.send(());
    handle.await.unwrap();
}
