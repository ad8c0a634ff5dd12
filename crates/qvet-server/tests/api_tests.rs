//! Integration tests for the qvet HTTP API.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use qvet_core::{BackendProfile, DEGRADED_WARNING};
use qvet_server::{AppState, Config, create_router};
use serde_json::{Value, json};

// ============================================================================
// Test helpers
// ============================================================================

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::default())
}

fn test_server(state: Arc<AppState>) -> TestServer {
    let router = create_router(state);
    TestServer::new(router).expect("test server")
}

fn server_with(configure: impl FnOnce(&mut Config)) -> TestServer {
    let mut config = Config::default();
    configure(&mut config);
    test_server(Arc::new(AppState::from_config(&config)))
}

const BELL: &str = r#"from qiskit import QuantumCircuit

qc = QuantumCircuit(2, 2)
qc.h(0)
qc.cx(0, 1)
qc.measure([0, 1], [0, 1])
"#;

const WIDE: &str = "from qiskit import QuantumCircuit\nqc = QuantumCircuit(130)\nqc.h(range(130))\n";

// ============================================================================
// Health endpoints
// ============================================================================

#[tokio::test]
async fn test_health_returns_ok() {
    let server = test_server(test_state());
    for path in ["/", "/health"] {
        let response = server.get(path).await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], "1.0.0");
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }
}

#[tokio::test]
async fn test_ready_reports_circuit_library() {
    let server = test_server(test_state());
    let body: Value = server.get("/health/ready").await.json();
    assert_eq!(body["ready"], true);
    assert_eq!(body["circuit_library"], true);

    let server = server_with(|c| c.sandbox.circuit_library = false);
    let body: Value = server.get("/health/ready").await.json();
    assert_eq!(body["ready"], true);
    assert_eq!(body["circuit_library"], false);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_validate_bell_circuit() {
    let server = test_server(test_state());
    let response = server.post("/validate").json(&json!({ "code": BELL })).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["valid"], true);
    assert_eq!(body["qubits"], 2);
    assert_eq!(body["gates"], 3);
    assert_eq!(body["depth"], 3);
    assert_eq!(body["gate_types"]["h"], 1);
    assert_eq!(body["gate_types"]["cx"], 1);
    assert_eq!(body["circuit_hash"].as_str().unwrap().len(), 64);
    assert!(body["errors"].as_array().unwrap().is_empty());
    assert!(body["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_validate_syntax_error_is_a_verdict() {
    let server = test_server(test_state());
    let response = server
        .post("/validate")
        .json(&json!({ "code": "qc = QuantumCircuit(2\nqc.h(0)" }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["valid"], false);
    assert_eq!(body["qubits"], 0);
    let error = body["errors"][0].as_str().unwrap();
    assert!(error.starts_with("Python syntax error at line 1:"), "{error}");
}

#[tokio::test]
async fn test_validate_no_circuit() {
    let server = test_server(test_state());
    let body: Value = server
        .post("/validate")
        .json(&json!({ "code": "x = 1\n" }))
        .await
        .json();
    assert_eq!(body["valid"], false);
    assert_eq!(body["errors"][0], "No QuantumCircuit object found in code");
}

#[tokio::test]
async fn test_validate_empty_code_returns_422() {
    let server = test_server(test_state());
    let response = server.post("/validate").json(&json!({ "code": "" })).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_validate_optimization_level_out_of_range() {
    let server = test_server(test_state());
    for level in [-1, 4, 7] {
        let response = server
            .post("/validate")
            .json(&json!({ "code": BELL, "optimization_level": level }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let response = server
        .post("/validate")
        .json(&json!({ "code": BELL, "optimization_level": 3 }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_validate_missing_code_returns_422() {
    let server = test_server(test_state());
    let response = server
        .post("/validate")
        .json(&json!({ "backend_name": "ibm_brisbane" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_validate_malformed_json_returns_400() {
    let server = test_server(test_state());
    let response = server
        .post("/validate")
        .bytes("{\"code\": ".into())
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validate_body_over_limit_returns_413() {
    let server = server_with(|c| c.server.max_body_bytes = 256);
    let code = format!("{BELL}# {}\n", "x".repeat(1024));
    let response = server.post("/validate").json(&json!({ "code": code })).await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_validate_runaway_script_times_out() {
    let server = server_with(|c| {
        c.server.request_timeout_seconds = 1;
        c.sandbox.max_steps = u64::MAX;
    });
    let response = server
        .post("/validate")
        .json(&json!({ "code": "while True:\n    pass\n" }))
        .await;
    response.assert_status(StatusCode::GATEWAY_TIMEOUT);

    let body: Value = response.json();
    assert_eq!(body["error"], "timeout");
}

#[tokio::test]
async fn test_validate_hostile_scripts_get_verdicts() {
    let server = test_server(test_state());
    for code in [
        format!("x = 1{}\n", " + 1".repeat(20_000)),
        "s = f'{1:>99999999999}'\n".to_string(),
        "x = []\nfor i in range(100000):\n    x = [x]\nprint(x)\n".to_string(),
    ] {
        let response = server.post("/validate").json(&json!({ "code": code })).await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["valid"], false);
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_validate_degraded_mode() {
    let server = server_with(|c| c.sandbox.circuit_library = false);
    let body: Value = server
        .post("/validate")
        .json(&json!({ "code": BELL }))
        .await
        .json();
    assert_eq!(body["valid"], true);
    assert_eq!(body["depth"], 10);
    assert_eq!(body["qubits"], 2);
    assert_eq!(body["gates"], 15);
    assert_eq!(body["warnings"], json!([DEGRADED_WARNING]));
}

#[tokio::test]
async fn test_validate_backend_warnings() {
    let server = test_server(test_state());
    let body: Value = server
        .post("/validate")
        .json(&json!({ "code": WIDE, "backend_name": "ibm_brisbane" }))
        .await
        .json();
    assert_eq!(body["valid"], true);
    assert_eq!(body["qubits"], 130);
    let warnings = body["warnings"].as_array().unwrap();
    assert!(warnings.iter().any(|w| w.as_str().unwrap().contains("130")));
}

#[tokio::test]
async fn test_validate_named_backend_profile() {
    let server = server_with(|c| {
        c.backends = c.backends.clone().with_profile(
            "iqm_garnet",
            BackendProfile {
                basis_gates: Some(vec!["prx".to_string(), "cz".to_string()]),
                ..BackendProfile::with_qubits(20)
            },
        );
    });
    let body: Value = server
        .post("/validate")
        .json(&json!({ "code": BELL, "backend_name": "iqm_garnet" }))
        .await
        .json();
    assert_eq!(body["valid"], true);
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    let warning = warnings[0].as_str().unwrap();
    assert!(warning.contains("cx, h"), "{warning}");
    assert!(warning.contains("iqm_garnet"), "{warning}");
}

// ============================================================================
// Metrics
// ============================================================================

#[tokio::test]
async fn test_metrics_count_validations() {
    let server = test_server(test_state());
    server
        .post("/validate")
        .json(&json!({ "code": BELL }))
        .await
        .assert_status_ok();

    let response = server.get("/metrics").await;
    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("qvet_validations_total"));
    assert!(text.contains("outcome=\"valid\""));
    assert!(text.contains("qvet_validation_duration_milliseconds"));
}
