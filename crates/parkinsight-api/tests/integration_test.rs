//! End-to-end tests for the ParkInsight API.
//!
//! Each test builds the real router around an [`AppState`], publishes a
//! registry assembled in memory (or loaded from artifacts in a temp dir),
//! and drives it with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use parkinsight_api::{build_router, spawn_model_loading, AppState};
use parkinsight_core::{FusionConfig, ModelFileConfig, ServiceConfig, SCHEMA_LEN};
use parkinsight_models::tree::{Aggregation, DecisionTree, TreeEnsemble, TreeNode};
use parkinsight_models::{Classifier, ModelRegistry, PredictionService, StandardScaler};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const API_KEY: &str = "test-secret";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.auth.api_key = Some(API_KEY.to_string());
    config
}

/// One stump on `MDVP:Fo(Hz)`: `low` at or below 150 Hz, `high` above.
fn fo_stump(low: f64, high: f64) -> TreeEnsemble {
    TreeEnsemble {
        n_features: SCHEMA_LEN,
        trees: vec![DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 150.0,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }],
        aggregation: Aggregation::Average,
        feature_importances: None,
    }
}

fn identity_scaler() -> StandardScaler {
    StandardScaler {
        mean: vec![0.0; SCHEMA_LEN],
        scale: vec![1.0; SCHEMA_LEN],
    }
}

/// State with `registry` already published.
fn ready_state(registry: ModelRegistry) -> Arc<AppState> {
    let state = Arc::new(AppState::new(test_config()).unwrap());
    assert!(state.publish(PredictionService::new(
        Arc::new(registry),
        &FusionConfig::default()
    )));
    state
}

fn forest_app() -> Router {
    build_router(ready_state(
        ModelRegistry::empty()
            .with_scaler(identity_scaler())
            .with_model("random_forest", Classifier::Forest(fo_stump(0.2, 0.9))),
    ))
}

fn voice_features(fo: f64) -> Value {
    json!({
        "mdvpFo": fo,
        "mdvpFhi": 197.1,
        "mdvpFlo": 74.9,
        "mdvpJitter": 0.00784,
        "mdvpShimmer": 0.04374,
        "nhr": 0.02211,
        "hnr": 21.033,
        "rpde": 0.414783,
        "dfa": 0.815285,
        "spread1": -4.813031,
        "spread2": 0.266482,
        "d2": 2.301442,
        "ppe": 0.284654
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn get_with_key(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn multipart_upload(content_type: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let boundary = "parkinsight-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"audio_file\"; \
             filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::post("/api/v1/analyze_voice")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header("x-api-key", API_KEY)
        .body(Body::from(body))
        .unwrap()
}

fn sine_wav(freq: f32, sample_rate: u32, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let n = (sample_rate as f32 * seconds) as usize;
        for i in 0..n {
            let t = i as f32 / sample_rate as f32;
            let s = 0.5 * (2.0 * std::f32::consts::PI * freq * t).sin();
            writer.write_sample((s * f32::from(i16::MAX)) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

// ---------------------------------------------------------------------------
// Health, auth, readiness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_needs_no_key() {
    let app = build_router(Arc::new(AppState::new(test_config()).unwrap()));
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["ready"], false);
}

#[tokio::test]
async fn test_missing_or_wrong_key_is_forbidden() {
    let app = forest_app();
    let body = json!({ "features": voice_features(200.0) });

    let no_key = Request::post("/api/v1/predict")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let resp = app.clone().oneshot(no_key).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let wrong_key = Request::get("/api/v1/models")
        .header("x-api-key", "nope")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(wrong_key).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["type"], "auth_error");
}

#[tokio::test]
async fn test_requests_before_ready_get_503() {
    let app = build_router(Arc::new(AppState::new(test_config()).unwrap()));
    let resp = app
        .oneshot(post_json(
            "/api/v1/predict",
            &json!({ "features": voice_features(200.0) }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["type"], "service_unavailable");
}

#[tokio::test]
async fn test_welcome_has_timestamp() {
    let resp = forest_app().oneshot(get_with_key("/api/v1/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert!(json["timestamp"].is_string());
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let resp = forest_app().oneshot(get_with_key("/api/v1/")).await.unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_predict_with_random_forest() {
    let resp = forest_app()
        .oneshot(post_json(
            "/api/v1/predict",
            &json!({ "features": voice_features(200.0) }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["model_used"], "random_forest");
    assert_eq!(json["prediction"], 1);
    assert!((json["probability"].as_f64().unwrap() - 0.9).abs() < 1e-12);
    assert!((json["risk_score"].as_f64().unwrap() - 90.0).abs() < 1e-9);
    assert!(json["feature_importance"]["MDVP:Fo(Hz)"].as_f64().unwrap() > 0.0);
    assert_eq!(json["defaulted_features"].as_array().unwrap().len(), 9);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_predict_low_pitch_is_negative() {
    let resp = forest_app()
        .oneshot(post_json(
            "/api/v1/predict",
            &json!({ "features": voice_features(120.0) }),
        ))
        .await
        .unwrap();
    let json = json_body(resp).await;
    assert_eq!(json["prediction"], 0);
    assert!((json["confidence"].as_f64().unwrap() - 0.8).abs() < 1e-12);
}

#[tokio::test]
async fn test_predict_rejects_malformed_payload() {
    let app = forest_app();

    let missing = json!({ "features": { "mdvpFo": 200.0 } });
    let resp = app
        .clone()
        .oneshot(post_json("/api/v1/predict", &missing))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["type"], "invalid_input");
    assert!(json["error"]["expected"].is_string());

    let mut unknown = voice_features(200.0);
    unknown["loudness"] = json!(3.0);
    let resp = app
        .oneshot(post_json("/api/v1/predict", &json!({ "features": unknown })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["received"], "loudness");
}

#[tokio::test]
async fn test_predict_accepts_extra_known_aliases() {
    let mut features = voice_features(200.0);
    features["mdvpJitterAbs"] = json!(0.00007);
    let resp = forest_app()
        .oneshot(post_json("/api/v1/predict", &json!({ "features": features })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["defaulted_features"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_predict_without_scaler_is_unavailable() {
    let app = build_router(ready_state(
        ModelRegistry::empty()
            .with_model("random_forest", Classifier::Forest(fo_stump(0.2, 0.9))),
    ));
    let resp = app
        .oneshot(post_json(
            "/api/v1/predict",
            &json!({ "features": voice_features(200.0) }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_predict_all_summarises_models() {
    let app = build_router(ready_state(
        ModelRegistry::empty()
            .with_scaler(identity_scaler())
            .with_model("random_forest", Classifier::Forest(fo_stump(0.2, 0.9)))
            .with_model("extra_trees", Classifier::Forest(fo_stump(0.1, 0.7)))
            .with_model("adaboost", Classifier::Forest(fo_stump(0.6, 0.4))),
    ));
    let resp = app
        .oneshot(post_json(
            "/api/v1/predict_all",
            &json!({ "features": voice_features(200.0) }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;

    assert_eq!(json["models"].as_object().unwrap().len(), 3);
    let summary = &json["summary"];
    assert_eq!(summary["total_models"], 3);
    assert_eq!(summary["consensus_prediction"], 1);
    let mean = (0.9 + 0.7 + 0.4) / 3.0;
    assert!((summary["average_probability"].as_f64().unwrap() - mean).abs() < 1e-12);
    assert!((summary["agreement_ratio"].as_f64().unwrap() - 2.0 / 3.0).abs() < 1e-12);
    assert!(summary["probability_std"].as_f64().unwrap() > 0.0);
    assert!((json["ensemble"]["probability"].as_f64().unwrap() - mean).abs() < 1e-12);
    assert_eq!(json["model_kinds"]["adaboost"], "tree_ensemble");
    assert_eq!(json["features_used"].as_array().unwrap().len(), SCHEMA_LEN);
}

#[tokio::test]
async fn test_predict_all_with_no_models_is_unavailable() {
    let app = build_router(ready_state(
        ModelRegistry::empty().with_scaler(identity_scaler()),
    ));
    let resp = app
        .oneshot(post_json(
            "/api/v1/predict_all",
            &json!({ "features": voice_features(200.0) }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_models_lists_schema_and_latency() {
    let app = forest_app();
    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/v1/predict",
            &json!({ "features": voice_features(200.0) }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get_with_key("/api/v1/models")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["available_models"], json!(["random_forest"]));
    assert_eq!(json["feature_count"], SCHEMA_LEN);
    assert_eq!(json["features"][0], "MDVP:Fo(Hz)");
    assert_eq!(json["feature_aliases"]["MDVP:Fo(Hz)"], "mdvpFo");
    assert_eq!(json["scaler"]["source"], "in_memory");
    assert_eq!(json["models"][0]["kind"], "tree_ensemble");
    assert_eq!(json["inference_latency"]["random_forest"]["count"], 1);
}

// ---------------------------------------------------------------------------
// Models loaded from disk
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_ensemble_loaded_from_disk_is_preferred() {
    let dir = tempfile::tempdir().unwrap();
    let forest = serde_json::to_value(fo_stump(0.2, 0.9)).unwrap();
    let mut forest_artifact = forest.clone();
    forest_artifact["kind"] = json!("tree_ensemble");

    let ensemble = json!({
        "kind": "voting",
        "voting": "soft",
        "estimators": [
            { "name": "rf", "model": forest_artifact.clone() },
            { "name": "rf_low", "model": {
                "kind": "tree_ensemble",
                "n_features": SCHEMA_LEN,
                "trees": [{ "nodes": [{ "type": "leaf", "value": 0.5 }] }],
                "aggregation": { "method": "average" }
            }}
        ]
    });
    std::fs::write(dir.path().join("ensemble.json"), ensemble.to_string()).unwrap();
    // Primary file corrupt; the `_fixed` variant holds the real model.
    std::fs::write(dir.path().join("random_forest.json"), "{ not json").unwrap();
    std::fs::write(
        dir.path().join("random_forest_fixed.json"),
        forest_artifact.to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("scaler.json"),
        serde_json::to_string(&identity_scaler()).unwrap(),
    )
    .unwrap();

    let mut config = test_config();
    config.model_dir = dir.path().display().to_string();
    config.models = vec![
        ModelFileConfig::new("ensemble", "ensemble.json"),
        ModelFileConfig::new("random_forest", "random_forest.json"),
        ModelFileConfig::new("svm", "svm.json"),
    ];
    let state = Arc::new(AppState::new(config).unwrap());
    spawn_model_loading(Arc::clone(&state)).await.unwrap();
    assert!(state.is_ready());
    let app = build_router(state);

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/v1/predict",
            &json!({ "features": voice_features(200.0) }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["model_used"], "ensemble_voting_classifier");
    assert!((json["probability"].as_f64().unwrap() - 0.7).abs() < 1e-12);
    // Voting ensembles surface a member's importances.
    assert!(json["feature_importance"].is_object());

    let resp = app.oneshot(get_with_key("/api/v1/models")).await.unwrap();
    let json = json_body(resp).await;
    let models = json["models"].as_array().unwrap();
    let source_of = |name: &str| {
        models
            .iter()
            .find(|m| m["name"] == name)
            .map(|m| m["source"].clone())
            .unwrap()
    };
    assert_eq!(source_of("ensemble"), "primary");
    assert_eq!(source_of("random_forest"), "fixed_variant");
    assert_eq!(source_of("svm"), "missing");
    assert_eq!(json["scaler"]["source"], "primary");
}

// ---------------------------------------------------------------------------
// Clinical assessment
// ---------------------------------------------------------------------------

fn symptoms(tremor: bool, rigidity: bool, bradykinesia: bool, age: u32) -> Value {
    json!({
        "tremor": tremor,
        "rigidity": rigidity,
        "bradykinesia": bradykinesia,
        "posturalInstability": false,
        "voiceChanges": false,
        "handwriting": false,
        "age": age
    })
}

#[tokio::test]
async fn test_assess_clinical_only() {
    let resp = forest_app()
        .oneshot(post_json(
            "/api/v1/assess_clinical",
            &json!({ "clinical_symptoms": symptoms(true, false, true, 70) }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert!((json["risk_score"].as_f64().unwrap() - 61.25).abs() < 1e-9);
    assert_eq!(json["prediction"], 1);
    assert_eq!(json["model_used"], "clinical_assessment");
    assert_eq!(json["has_voice_data"], false);
}

#[tokio::test]
async fn test_assess_clinical_no_symptoms() {
    let resp = forest_app()
        .oneshot(post_json(
            "/api/v1/assess_clinical",
            &json!({ "clinical_symptoms": symptoms(false, false, false, 30) }),
        ))
        .await
        .unwrap();
    let json = json_body(resp).await;
    assert_eq!(json["risk_score"].as_f64().unwrap(), 0.0);
    assert_eq!(json["prediction"], 0);
}

#[tokio::test]
async fn test_assess_clinical_age_capped() {
    let resp = forest_app()
        .oneshot(post_json(
            "/api/v1/assess_clinical",
            &json!({ "clinical_symptoms": symptoms(true, true, true, 85) }),
        ))
        .await
        .unwrap();
    let json = json_body(resp).await;
    assert!((json["risk_score"].as_f64().unwrap() - 85.0).abs() < 1e-9);
    assert_eq!(json["prediction"], 1);
}

#[tokio::test]
async fn test_assess_clinical_fuses_voice() {
    let resp = forest_app()
        .oneshot(post_json(
            "/api/v1/assess_clinical",
            &json!({
                "clinical_symptoms": symptoms(true, false, true, 70),
                "voice_features": voice_features(200.0)
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    // 0.6 * 90 + 0.4 * 61.25
    assert!((json["risk_score"].as_f64().unwrap() - 78.5).abs() < 1e-9);
    assert!((json["probability"].as_f64().unwrap() - 0.785).abs() < 1e-9);
    assert_eq!(json["model_used"], "random_forest_with_clinical");
    assert_eq!(json["has_voice_data"], true);
}

#[tokio::test]
async fn test_assess_clinical_falls_back_when_voice_fails() {
    let app = build_router(ready_state(ModelRegistry::empty()));
    let resp = app
        .oneshot(post_json(
            "/api/v1/assess_clinical",
            &json!({
                "clinical_symptoms": symptoms(true, false, true, 70),
                "voice_features": voice_features(200.0)
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["model_used"], "clinical_assessment");
    assert_eq!(json["has_voice_data"], false);
}

// ---------------------------------------------------------------------------
// Voice analysis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_analyze_voice_rejects_non_audio() {
    let app = build_router(Arc::new(AppState::new(test_config()).unwrap()));
    let resp = app
        .oneshot(multipart_upload("text/plain", "notes.txt", b"hello"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["received"], "text/plain");
    assert!(json["error"]["expected"]
        .as_str()
        .unwrap()
        .contains("audio/webm"));
}

#[tokio::test]
async fn test_analyze_voice_requires_key() {
    let app = build_router(Arc::new(AppState::new(test_config()).unwrap()));
    let mut req = multipart_upload("audio/wav", "a.wav", &sine_wav(220.0, 22_050, 0.5));
    req.headers_mut().remove("x-api-key");
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_analyze_voice_extracts_from_wav() {
    let app = build_router(Arc::new(AppState::new(test_config()).unwrap()));
    let wav = sine_wav(220.0, 22_050, 1.0);
    let resp = app
        .oneshot(multipart_upload("audio/wav", "take.wav", &wav))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["synthetic_audio"], false);
    assert_eq!(json["decoder"], "wav");
    let fo = json["features"]["mdvpFo"].as_f64().unwrap();
    assert!((fo - 220.0).abs() < 5.0, "mdvpFo {fo}");
    let hnr = json["features"]["hnr"].as_f64().unwrap();
    assert!((12.0..=28.0).contains(&hnr));
    assert_eq!(json["stages"][0]["stage"], "f0");
    assert_eq!(json["stages"][0]["computed"], true);
}

#[tokio::test]
async fn test_analyze_voice_flags_synthetic_audio() {
    let app = build_router(Arc::new(AppState::new(test_config()).unwrap()));
    let resp = app
        .oneshot(multipart_upload(
            "audio/webm;codecs=opus",
            "recording.webm",
            b"this is not really webm",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["synthetic_audio"], true);
    assert_eq!(json["decoder"], "synthetic");
    let nhr = json["features"]["nhr"].as_f64().unwrap();
    assert!((0.01..=0.19).contains(&nhr));
}

#[tokio::test]
async fn test_analyze_voice_truncates_long_recordings() {
    let mut config = test_config();
    config.max_audio_seconds = 1;
    let app = build_router(Arc::new(AppState::new(config).unwrap()));
    let wav = sine_wav(180.0, 16_000, 2.5);
    let resp = app
        .oneshot(multipart_upload("audio/wav", "long.wav", &wav))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["synthetic_audio"], false);
    assert_eq!(json["truncated"], true);
    let duration = json["duration_seconds"].as_f64().unwrap();
    assert!((duration - 1.0).abs() < 1e-9, "duration {duration}");
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

async fn scrape(app: &Router) -> String {
    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_metrics_count_requests_and_inference() {
    let app = forest_app();
    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/v1/predict",
                &json!({ "features": voice_features(200.0) }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/v1/predict",
            &json!({ "features": { "mdvpFo": 200.0 } }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // No API key on the scrape.
    let text = scrape(&app).await;
    assert!(text.contains(
        "parkinsight_requests_total{path=\"/api/v1/predict\",status=\"200\"} 2"
    ));
    assert!(text.contains(
        "parkinsight_requests_total{path=\"/api/v1/predict\",status=\"400\"} 1"
    ));
    assert!(text.contains("parkinsight_request_duration_seconds_bucket"));
    assert!(text.contains(
        "parkinsight_inference_duration_seconds_count{model=\"random_forest\"} 2"
    ));
}

#[tokio::test]
async fn test_metrics_label_unknown_routes_as_unmatched() {
    let app = build_router(Arc::new(AppState::new(test_config()).unwrap()));
    let resp = app
        .clone()
        .oneshot(get_with_key("/api/v1/predict/12345"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let text = scrape(&app).await;
    assert!(text.contains("path=\"unmatched\",status=\"404\""));
    assert!(!text.contains("12345"));
}
