/*!
 * Tests for speech backend implementations
 */

use anyhow::Result;
use sub2dub::app_config::{Config, SpeechProvider};
use sub2dub::errors::ProviderError;
use sub2dub::providers::{self, Provider, SpeechRequest};
use sub2dub::providers::edge::EdgeTts;
use sub2dub::providers::mock::MockProvider;
use sub2dub::providers::openai::{SpeechBody, rate_to_speed};
use crate::common;

/// Test that the configured backend is built
#[test]
fn test_build_provider_withEachBackend_shouldSelectImplementation() -> Result<()> {
    let mut config = Config::default();
    let edge = providers::build_provider(&config.synthesis)?;
    assert_eq!(edge.name(), "edge-tts");
    assert_eq!(edge.artifact_extension(), "mp3");

    config.synthesis.provider = SpeechProvider::OpenAI;
    let openai = providers::build_provider(&config.synthesis)?;
    assert_eq!(openai.name(), "openai");
    Ok(())
}

/// Test the edge-tts argument layout
#[test]
fn test_edge_build_args_withRequest_shouldMatchCliLayout() {
    let request = SpeechRequest::new("Hello there", "en-US-ChristopherNeural", "+10%");
    let args = EdgeTts::build_args(&request, std::path::Path::new("out/0001_Hellothere.mp3"));

    assert_eq!(args[0], "--voice=en-US-ChristopherNeural");
    assert_eq!(args[1], "--rate=+10%");
    assert_eq!(args[2], "--text=Hello there");
    assert_eq!(args[3], "--write-media");
    assert_eq!(args[4], "out/0001_Hellothere.mp3");
}

/// Test the speech request body sent to OpenAI-compatible endpoints
#[test]
fn test_openai_speech_body_withRate_shouldSerializeSpeed() -> Result<()> {
    let body = SpeechBody {
        model: "tts-1",
        input: "Hi",
        voice: "alloy",
        speed: rate_to_speed("+50%"),
        response_format: "mp3",
    };

    let json = serde_json::to_value(&body)?;

    assert_eq!(json["model"], "tts-1");
    assert_eq!(json["input"], "Hi");
    assert_eq!(json["voice"], "alloy");
    assert_eq!(json["speed"], 1.5);
    assert_eq!(json["response_format"], "mp3");
    Ok(())
}

/// Test that an unreachable endpoint fails after the configured retries
#[tokio::test]
async fn test_openai_synthesize_withUnreachableEndpoint_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let client = providers::openai::OpenAISpeech::new("http://127.0.0.1:9", "key", "tts-1", 2, 1, 1)?;

    let err = client
        .synthesize(&SpeechRequest::new("Hi", "alloy", "+0%"), &temp_dir.path().join("0000_Hi.mp3"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::ConnectionError(_) | ProviderError::RequestFailed(_)));
    assert!(!temp_dir.path().join("0000_Hi.mp3").exists());
    Ok(())
}

/// Test mock behaviors used throughout the suite
#[tokio::test]
async fn test_mock_provider_withFailingAndEmpty_shouldBehaveAsConfigured() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let request = SpeechRequest::new("x", "v", "+0%");

    let failing = MockProvider::failing();
    let err = failing.synthesize(&request, &temp_dir.path().join("a.wav")).await.unwrap_err();
    assert!(matches!(err, ProviderError::ApiError { status_code: 503, .. }));

    let empty = MockProvider::empty();
    empty.synthesize(&request, &temp_dir.path().join("b.wav")).await?;
    assert!(!temp_dir.path().join("b.wav").exists());
    Ok(())
}
