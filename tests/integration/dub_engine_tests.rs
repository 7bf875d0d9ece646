/*!
 * Integration tests for the audio assembly engine
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use anyhow::Result;

use sub2dub::dubbing::{Cue, DubEngine, WavDecoder, export};
use sub2dub::providers::mock::MockProvider;
use crate::common;

/// Test the overlap scenario end to end, from cues to the exported WAV
#[tokio::test]
async fn test_assemble_withOverlappingUnitClips_shouldNormalizeAndExport() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::test_config(44100);
    let provider = MockProvider::working().with_clip(44100, 44100, 1.0);
    let engine = DubEngine::new(Arc::new(provider), Arc::new(WavDecoder), &config);

    let assembled = engine
        .assemble(&common::overlapping_cues(), &config.voice, &config.rate, temp_dir.path(), Some(1.5), |_, _| {})
        .await;

    assert_eq!(assembled.placed(), 2);
    assert_eq!(assembled.failed(), 0);
    assert!(assembled.limiter.scaled);
    assert_eq!(assembled.limiter.peak, 2.0);

    let track = &assembled.track;
    assert_eq!(track.len(), 66150);
    assert_eq!(track.samples()[22049], 0.5);
    assert_eq!(track.samples()[22050], 1.0);
    assert_eq!(track.samples()[44099], 1.0);
    assert_eq!(track.samples()[44100], 0.5);

    let wav_path = temp_dir.path().join("full_dub.wav");
    export::write_wav(track, &wav_path)?;
    let reader = hound::WavReader::open(&wav_path)?;
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len(), 66150);

    let decoded = export::read_wav_mono(&wav_path, 44100)?;
    assert!(decoded.iter().all(|s| s.abs() <= 1.0));
    assert!((decoded[30000] - 1.0).abs() < 1e-3);
    Ok(())
}

/// Test that failed cues are silent while the job still completes
#[tokio::test]
async fn test_assemble_withFailingCue_shouldLeaveItsRangeSilent() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let config = common::test_config(1000);
    let provider = MockProvider::working().with_clip(1000, 200, 0.5).failing_on("broken");
    let engine = DubEngine::new(Arc::new(provider), Arc::new(WavDecoder), &config);
    let cues = vec![
        Cue::new(0, 0, 200, "fine"),
        Cue::new(1, 1000, 1200, "broken"),
        Cue::new(2, 2000, 2200, "also fine"),
    ];

    let assembled = engine
        .assemble(&cues, "v", "+0%", temp_dir.path(), Some(3.0), |_, _| {})
        .await;

    assert_eq!(assembled.placed(), 2);
    assert_eq!(assembled.failed(), 1);
    assert_eq!(assembled.dispatch.failures[0].text, "broken");
    let samples = assembled.track.samples();
    assert!(samples[..200].iter().all(|s| *s == 0.5));
    assert!(samples[1000..1200].iter().all(|s| *s == 0.0));
    assert!(samples[2000..2200].iter().all(|s| *s == 0.5));
    Ok(())
}

/// Test that a clip running past the probed duration grows the track
#[tokio::test]
async fn test_assemble_withCueAfterMediaEnd_shouldGrowTrack() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::test_config(1000);
    let provider = MockProvider::working().with_clip(1000, 500, 0.25);
    let engine = DubEngine::new(Arc::new(provider), Arc::new(WavDecoder), &config);
    let cues = vec![Cue::new(0, 4800, 5300, "late line")];

    let assembled = engine
        .assemble(&cues, "v", "+0%", temp_dir.path(), Some(5.0), |_, _| {})
        .await;

    assert_eq!(assembled.track.len(), 5300);
    assert_eq!(assembled.mix.grown_by, 300);
    assert!(!assembled.limiter.scaled);
    Ok(())
}

/// Test progress reporting and concurrency through the engine
#[tokio::test]
async fn test_assemble_withManyCues_shouldReportProgressWithinCap() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::test_config(1000);
    let provider = Arc::new(MockProvider::working().with_clip(1000, 10, 0.01).with_delay(5));
    let engine = DubEngine::new(provider.clone(), Arc::new(WavDecoder), &config);
    let cues: Vec<Cue> = (0..20).map(|i| Cue::new(i, i as u64 * 50, i as u64 * 50 + 40, format!("line {}", i))).collect();
    let progress = Arc::new(AtomicUsize::new(0));
    let progress_in_callback = progress.clone();

    let assembled = engine
        .assemble(&cues, "v", "+0%", temp_dir.path(), None, move |done, total| {
            assert_eq!(total, 20);
            progress_in_callback.fetch_max(done, Ordering::SeqCst);
        })
        .await;

    assert_eq!(assembled.placed(), 20);
    assert_eq!(progress.load(Ordering::SeqCst), 20);
    assert!(provider.max_in_flight() <= config.synthesis.concurrent_requests);
    Ok(())
}
