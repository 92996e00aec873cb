//! Backend client tests against a mock OCR service.

use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use guji::backend::{
    BackendClient, BackendError, ConversionType, DetMode, ImageId, OcrRequest, OcrVersion,
    PreprocessOptions, Settings,
};
use guji::session::ImageSelection;
use reqwest::StatusCode;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ocr_request(version: OcrVersion) -> OcrRequest {
    let selection = ImageSelection::sample();
    OcrRequest {
        image_path: selection.image_path,
        full_path: selection.full_path,
        image_id: selection.image_id,
        det_mode: DetMode::Sp,
        char_ocr: true,
        image_size: 1024,
        version,
        preprocess: false,
        preprocess_options: PreprocessOptions::default(),
        is_default_image: true,
    }
}

fn ocr_body() -> serde_json::Value {
    serde_json::json!({
        "ocr_result": {"data": {"text_lines": [
            {"text": "子曰學而時習之"},
            {"text": "不亦說乎"}
        ]}},
        "words_data": [
            {"text": "子", "confidence": 0.97},
            {"text": "曰", "confidence": 0.61}
        ],
        "image_id": "default_sample"
    })
}

#[tokio::test]
async fn default_engine_posts_to_ocr_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/ocr"))
        .and(body_partial_json(serde_json::json!({
            "version": "default",
            "det_mode": "sp",
            "image_id": "default_sample",
            "is_default_image": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ocr_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = BackendClient::new(server.uri());
    let response = client
        .run_ocr(&ocr_request(OcrVersion::Default))
        .await
        .expect("ocr should succeed");

    assert_eq!(response.text(), "子曰學而時習之\n不亦說乎");
    assert_eq!(response.words_data[1].confidence_percent(), 61);
    assert_eq!(response.image_id, Some(ImageId::Name("default_sample".to_string())));
}

#[tokio::test]
async fn baidu_engine_posts_to_its_own_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/baidu_ocr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ocr_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/ocr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ocr_body()))
        .expect(0)
        .mount(&server)
        .await;

    let client = BackendClient::new(format!("{}/", server.uri()));
    client
        .run_ocr(&ocr_request(OcrVersion::Baidu))
        .await
        .expect("ocr should succeed");
}

#[tokio::test]
async fn error_field_in_success_body_is_a_service_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/ocr"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "图片路径无效"})),
        )
        .mount(&server)
        .await;

    let client = BackendClient::new(server.uri());
    let err = client
        .run_ocr(&ocr_request(OcrVersion::Beta))
        .await
        .expect_err("error body should fail");

    assert!(matches!(err, BackendError::Service(message) if message == "图片路径无效"));
}

#[tokio::test]
async fn error_status_carries_backend_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/history/42"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "记录不存在"})),
        )
        .mount(&server)
        .await;

    let client = BackendClient::new(server.uri());
    let err = client
        .history_record("42")
        .await
        .expect_err("missing record should fail");

    match err {
        BackendError::Status {
            status, message, ..
        } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(message, "记录不存在");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn convert_sends_text_and_direction() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/convert_text"))
        .and(body_partial_json(serde_json::json!({"text": "学而时习之", "type": "s2t"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "converted_text": "學而時習之",
            "original_text": "学而时习之",
            "conversion_type": "s2t"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BackendClient::new(server.uri());
    let response = client
        .convert_text("学而时习之", ConversionType::S2t)
        .await
        .expect("conversion should succeed");

    assert_eq!(response.converted_text, "學而時習之");
    assert_eq!(response.conversion_type, Some(ConversionType::S2t));
}

#[tokio::test]
async fn history_list_delete_and_clear() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "20240101120000",
                "timestamp": "20240101120000",
                "created_date": "2024-01-01 12:00:00",
                "original_filename": "lunyu.jpg",
                "preview_text": "子曰學而時習之"
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/history/delete/20240101120000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "message": "记录已删除"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/history/clear"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "message": "历史记录已清空"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BackendClient::new(server.uri());
    let entries = client.history().await.expect("history should load");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].original_filename, "lunyu.jpg");

    let deleted = client
        .delete_history_record(&entries[0].id)
        .await
        .expect("delete should succeed");
    assert_eq!(deleted.message, "记录已删除");

    let cleared = client.clear_history().await.expect("clear should succeed");
    assert_eq!(cleared.status, "success");
}

#[tokio::test]
async fn settings_round_trip_through_backend() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "det_mode": "hp",
            "version": "beta"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/settings"))
        .and(body_partial_json(serde_json::json!({"det_mode": "hp", "image_size": 2048})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "message": "设置已保存"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BackendClient::new(server.uri());
    let mut settings: Settings = client.settings().await.expect("settings should load");
    assert_eq!(settings.det_mode(), DetMode::Hp);
    assert_eq!(settings.version(), OcrVersion::Beta);
    assert_eq!(settings.image_size, 1024);

    settings.image_size = 2048;
    let status = client
        .save_settings(&settings)
        .await
        .expect("save should succeed");
    assert_eq!(status.message, "设置已保存");
}

#[tokio::test]
async fn assistant_key_is_optional() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/deepseek_config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"api_key": ""})))
        .mount(&server)
        .await;

    let client = BackendClient::new(server.uri());
    assert_eq!(client.assistant_api_key().await.expect("request should succeed"), None);
}

#[tokio::test]
async fn upload_sends_multipart_image_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("name=\"image\""))
        .and(body_string_contains("filename=\"page.jpg\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "image_path": "uploads/7.jpg",
            "full_path": "/srv/uploads/7.jpg",
            "image_id": 7
        })))
        .expect(1)
        .mount(&server)
        .await;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("guji-upload-{nanos}"));
    fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let image = dir.join("page.jpg");
    fs::write(&image, b"not really a jpeg").expect("image should be writable");

    let client = BackendClient::new(server.uri());
    let upload = client.upload_image(&image).await.expect("upload should succeed");
    let selection = ImageSelection::from(upload);

    assert_eq!(selection.image_id, ImageId::Number(7));
    assert!(!selection.is_sample());
}

#[tokio::test]
async fn missing_image_file_is_reported() {
    let client = BackendClient::new("http://127.0.0.1:9");
    let err = client
        .upload_image(std::path::Path::new("/nonexistent/guji/page.jpg"))
        .await
        .expect_err("missing file should fail");

    assert!(matches!(err, BackendError::Image { .. }));
}

#[tokio::test]
async fn assets_download_as_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/static/history/20240101120000.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
        .mount(&server)
        .await;

    let client = BackendClient::new(server.uri());
    let bytes = client
        .fetch_asset("static/history/20240101120000.jpg")
        .await
        .expect("asset should download");
    assert_eq!(bytes.to_vec(), vec![1u8, 2, 3]);
}
