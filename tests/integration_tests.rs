//! Integration tests for the DeepL bridge
//!
//! These tests drive the public API end to end: configuration loaded from a
//! languages file, the on-disk localization cache, and a mocked DeepL API.

use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use deepl_bridge::{
    command::{dispatch, Command},
    config::Config,
    error::{Classification, Error},
    service::{AppContext, ReadinessState, TranslationRequest, TranslationService},
};

// ==================== Test Helpers ====================

const LANGUAGES_JSON: &str = r#"[
    {"host_id": "1017", "name": "default", "title": "English", "provider_code": "EN", "is_source": true},
    {"host_id": "1018", "name": "german", "title": "Deutsch", "provider_code": "DE"},
    {"host_id": "1019", "name": "french", "title": "Français", "provider_code": "FR"},
    {"host_id": "1020", "name": "japanese", "title": "日本語", "provider_code": "JA"}
]"#;

/// Create a test config with the DeepL API pointed at the mock server
fn create_test_config(deepl_url: Option<&str>, temp_dir: &TempDir) -> Config {
    let languages_path = temp_dir.path().join("languages.json");
    std::fs::write(&languages_path, LANGUAGES_JSON).expect("Failed to write languages");

    Config {
        deepl_api_key: deepl_url.map(|_| "test-deepl-key".to_string()),
        deepl_api_url: deepl_url.map(|u| u.to_string()),
        request_timeout_secs: 5,
        languages_file: languages_path,
        localization_cache_dir: temp_dir.path().join("localization"),
        ..Default::default()
    }
}

fn create_test_service(deepl_url: Option<&str>, temp_dir: &TempDir) -> TranslationService {
    let config = create_test_config(deepl_url, temp_dir);
    let context = AppContext::from_config(config).expect("Should build context");
    TranslationService::new(context).expect("Should build service")
}

async fn mount_usage(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/usage"))
        .and(header("Authorization", "DeepL-Auth-Key test-deepl-key"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "character_count": 1000,
            "character_limit": 500000
        })))
        .mount(server)
        .await;
}

/// Respond with `"<TARGET> #<n>"` for each `text` parameter in the request
struct TaggedTranslations;

impl wiremock::Respond for TaggedTranslations {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body).to_string();
        let target = body
            .split('&')
            .find_map(|p| p.strip_prefix("target_lang="))
            .unwrap_or("XX")
            .to_string();
        let translations: Vec<_> = body
            .split('&')
            .filter(|p| p.starts_with("text="))
            .enumerate()
            .map(|(i, _)| json!({"detected_source_language": "EN", "text": format!("{} #{}", target, i)}))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "translations": translations }))
    }
}

fn cache_files(temp_dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(temp_dir.path().join("localization"))
        .expect("Cache dir should exist")
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

// ==================== Startup Tests ====================

#[tokio::test]
async fn test_service_without_key_serves_host_data() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let service = create_test_service(None, &temp_dir);

    assert_eq!(service.state().await, ReadinessState::Uninitialized);

    let boot = service.boot_data("1020").await.expect("Should build boot data");
    assert!(!boot.current_language.url_valid);
    assert_eq!(boot.ui_strings["translateTrigger"], "Translate from English");

    // Reading synthesized and persisted the base for the page editor context
    assert_eq!(cache_files(&temp_dir), vec!["base_page_editor.json"]);
}

#[tokio::test]
async fn test_invalid_key_blocks_provider_calls() {
    let server = MockServer::start().await;
    mount_usage(&server, 403).await;

    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(Some(&server.uri()), &temp_dir);

    assert_eq!(service.verify_api_key().await, ReadinessState::KeyInvalid);

    let reply = dispatch(&service, Command::LocalizeModule).await;
    assert_eq!(reply.status, 503);
    assert_eq!(reply.body["error"], "not_configured");
    assert_eq!(reply.body["state"], "keyInvalid");
}

// ==================== Translation Tests ====================

#[tokio::test]
async fn test_translate_with_ignored_phrase() {
    let server = MockServer::start().await;
    mount_usage(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(header("Authorization", "DeepL-Auth-Key test-deepl-key"))
        .and(body_string_contains("tag_handling=xml"))
        .and(body_string_contains(
            "text=%3Cdeepl-ignore%3EHello%3C%2Fdeepl-ignore%3E+world",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [{"detected_source_language": "EN", "text": "<deepl-ignore>Hello</deepl-ignore> Welt"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(Some(&server.uri()), &temp_dir);

    let request = TranslationRequest {
        source_code: "EN".to_string(),
        target_code: "DE".to_string(),
        segments: vec!["Hello world".to_string()],
        ignored_phrases: vec!["Hello".to_string()],
        ..Default::default()
    };
    let result = service.translate(&request).await.expect("Should translate");

    assert_eq!(result.texts(), vec!["Hello Welt"]);
    assert!(!result.segments[0].text.contains("deepl-ignore"));
}

#[tokio::test]
async fn test_translate_preserves_segment_order_through_command() {
    let server = MockServer::start().await;
    mount_usage(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(TaggedTranslations)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(Some(&server.uri()), &temp_dir);

    let command = Command::from_json(json!({
        "req": "translate",
        "sourceLanguage": "en",
        "targetLanguage": "de",
        "content": ["a", "b", "c", "d"]
    }))
    .unwrap();
    let reply = dispatch(&service, command).await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["content"], json!(["DE #0", "DE #1", "DE #2", "DE #3"]));
}

// ==================== Localization Tests ====================

#[tokio::test]
async fn test_localize_all_writes_cache_and_isolates_failures() {
    let server = MockServer::start().await;
    mount_usage(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(body_string_contains("target_lang=FR"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(TaggedTranslations)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(Some(&server.uri()), &temp_dir);

    let report = service.localize_all().await.expect("Run should complete");
    assert_eq!(report.succeeded.len(), 3);
    assert!(matches!(
        report.failed.get("1019"),
        Some(Error::Provider {
            status: 429,
            classification: Classification::RateLimited
        })
    ));

    let files = cache_files(&temp_dir);
    assert!(files.contains(&"1018_translation_tool.json".to_string()));
    assert!(files.contains(&"1020_language_select_element.json".to_string()));
    assert!(files.contains(&"base_page_editor.json".to_string()));
    assert!(!files.iter().any(|f| f.starts_with("1019_")));

    let japanese = service.ui_strings("1020", "language_select_element").unwrap();
    assert!(japanese.values().all(|v| v.starts_with("JA #")));

    // French falls back to the base strings
    let french = service.ui_strings("1019", "page_editor").unwrap();
    assert_eq!(french["translateTrigger"], "Translate from English");
}

#[tokio::test]
async fn test_clear_all_then_read_regenerates_base() {
    let server = MockServer::start().await;
    mount_usage(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(TaggedTranslations)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(Some(&server.uri()), &temp_dir);
    let report = service.localize_all().await.unwrap();
    assert!(report.is_complete());

    let reply = dispatch(
        &service,
        Command::from_json(json!({"req": "clearLocalizationCache"})).unwrap(),
    )
    .await;
    assert_eq!(
        reply.body["cleared"],
        json!(["1017", "1018", "1019", "1020", "base"])
    );
    assert!(cache_files(&temp_dir).is_empty());

    let strings = service.ui_strings("1018", "translation_tool").unwrap();
    assert_eq!(strings["buttonTranslate"], "Translate");
    assert_eq!(cache_files(&temp_dir), vec!["base_translation_tool.json"]);
}

#[tokio::test]
async fn test_clear_single_language_via_command() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(None, &temp_dir);
    service.cache().regenerate_base().unwrap();

    let reply = dispatch(
        &service,
        Command::from_json(json!({"req": "clearLocalizationCache", "languageKey": "1018"})).unwrap(),
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["cleared"], json!([]));
    assert_eq!(cache_files(&temp_dir).len(), 3);

    let reply = dispatch(
        &service,
        Command::from_json(json!({"req": "clearLocalizationCache", "languageKey": "10_18"})).unwrap(),
    )
    .await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body["error"], "invalid_language");
}

// ==================== Config Integration Tests ====================

#[test]
fn test_context_creates_cache_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(None, &temp_dir);
    let cache_dir = config.localization_cache_dir.clone();

    assert!(!cache_dir.exists());
    let context = AppContext::from_config(config).expect("Should build context");
    assert!(cache_dir.is_dir());
    assert_eq!(context.languages.source().host_id, "1017");
    assert_eq!(context.languages.targets().len(), 3);
}

#[test]
fn test_context_rejects_missing_languages_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        languages_file: temp_dir.path().join("missing.json"),
        ..Default::default()
    };
    assert!(AppContext::from_config(config).is_err());
}
