/*!
 * Tests for the bounded synthesis dispatcher
 */

use std::collections::HashSet;
use std::sync::Arc;
use anyhow::Result;

use sub2dub::dubbing::{Cue, DispatchOptions, SynthesisDispatcher, WavDecoder};
use sub2dub::errors::DubError;
use sub2dub::providers::mock::MockProvider;
use crate::common;

fn dispatcher(provider: Arc<MockProvider>, max_concurrent_requests: usize) -> SynthesisDispatcher {
    SynthesisDispatcher::new(
        provider,
        Arc::new(WavDecoder),
        DispatchOptions {
            max_concurrent_requests,
            sample_rate: 8000,
        },
    )
}

/// Test that no more than K synthesis calls are ever in flight
#[tokio::test]
async fn test_dispatch_withSlowBackend_shouldNeverExceedCap() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockProvider::working().with_clip(8000, 8, 0.5).with_delay(15));
    let cues: Vec<Cue> = (0..25).map(|i| Cue::new(i, i as u64 * 40, i as u64 * 40 + 30, format!("line {}", i))).collect();

    let report = dispatcher(provider.clone(), 5)
        .dispatch(&cues, "en-US-ChristopherNeural", "+0%", temp_dir.path(), |_, _| {})
        .await;

    assert_eq!(report.results.len(), 25);
    assert_eq!(provider.call_count(), 25);
    assert!(provider.max_in_flight() <= 5, "saw {} in flight", provider.max_in_flight());
    Ok(())
}

/// Test that empty cues never reach the backend
#[tokio::test]
async fn test_dispatch_withEmptyCues_shouldNotConsumeSlots() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockProvider::working().with_clip(8000, 8, 0.5));
    let cues = vec![
        Cue::new(0, 0, 100, ""),
        Cue::new(1, 100, 200, "spoken"),
        Cue::new(2, 200, 300, " \n "),
    ];

    let report = dispatcher(provider.clone(), 1)
        .dispatch(&cues, "v", "+0%", temp_dir.path(), |_, _| {})
        .await;

    assert_eq!(report.total, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(provider.requested_texts(), vec!["spoken".to_string()]);
    assert_eq!(report.results[0].cue_index, 1);
    Ok(())
}

/// Test that every failing cue is reported and the rest still succeed
#[tokio::test]
async fn test_dispatch_withIntermittentBackend_shouldIsolateFailures() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockProvider::intermittent(3).with_clip(8000, 8, 0.5));
    let cues: Vec<Cue> = (0..9).map(|i| Cue::new(i, 0, 10, format!("cue {}", i))).collect();

    let report = dispatcher(provider, 2)
        .dispatch(&cues, "v", "+0%", temp_dir.path(), |_, _| {})
        .await;

    assert_eq!(report.failures.len(), 3);
    assert_eq!(report.results.len(), 6);
    for failure in &report.failures {
        assert!(failure.error.is_per_cue());
        assert!(failure.text.starts_with("cue "));
        assert!(matches!(failure.error, DubError::Synthesis { .. }));
    }

    let seen: HashSet<usize> = report
        .results
        .iter()
        .map(|r| r.cue_index)
        .chain(report.failures.iter().map(|f| f.cue_index))
        .collect();
    assert_eq!(seen.len(), 9);
    Ok(())
}

/// Test that artifacts land in the work directory under indexed names
#[tokio::test]
async fn test_dispatch_withDuplicateTexts_shouldWriteDistinctArtifacts() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockProvider::working().with_clip(8000, 8, 0.5));
    let cues = vec![Cue::new(0, 0, 10, "Yes."), Cue::new(1, 20, 30, "Yes.")];

    let report = dispatcher(provider, 2)
        .dispatch(&cues, "v", "+0%", temp_dir.path(), |_, _| {})
        .await;

    assert_eq!(report.results.len(), 2);
    assert!(temp_dir.path().join("0000_Yes.wav").exists());
    assert!(temp_dir.path().join("0001_Yes.wav").exists());
    Ok(())
}

/// Test that a backend clip at the wrong rate becomes a decode failure
#[tokio::test]
async fn test_dispatch_withWrongClipRate_shouldReportDecodeFailure() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockProvider::working().with_clip(16000, 8, 0.5));
    let cues = vec![Cue::new(0, 0, 10, "Hello")];

    let report = dispatcher(provider, 2)
        .dispatch(&cues, "v", "+0%", temp_dir.path(), |_, _| {})
        .await;

    assert!(report.results.is_empty());
    assert!(matches!(report.failures[0].error, DubError::Decode { cue_index: 0, .. }));
    Ok(())
}
