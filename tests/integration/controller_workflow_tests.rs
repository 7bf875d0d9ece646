/*!
 * Integration tests for the job and batch workflows
 */

use std::fs;
use std::sync::Arc;
use anyhow::Result;
use indicatif::MultiProgress;

use sub2dub::app_controller::{Controller, ISSUES_LOG_FILE};
use sub2dub::errors::{DubError, JobStage};
use sub2dub::providers::mock::MockProvider;
use crate::common;

fn fatal_input(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<DubError>(), Some(DubError::FatalInput(_)))
}

/// Test that a missing video aborts before any synthesis
#[test]
fn test_run_withMissingVideo_shouldFailBeforeSynthesis() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let srt = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;
    let provider = Arc::new(MockProvider::working());
    let controller = common::mock_controller(common::test_config(8000), provider.clone());

    let result = tokio_test::block_on(async {
        controller
            .run(temp_dir.path().join("missing.mkv"), srt, temp_dir.path().join("out.mkv"))
            .await
    });
    let err = result.unwrap_err();

    assert!(fatal_input(&err));
    assert_eq!(provider.call_count(), 0);
    assert!(!temp_dir.path().join("out.mkv").exists());
    Ok(())
}

/// Test that a missing media tool is caught in preflight
#[tokio::test]
async fn test_run_withUnavailableFfmpeg_shouldFailBeforeSynthesis() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_file(temp_dir.path(), "movie.mkv", "not really a video")?;
    let srt = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;
    let provider = Arc::new(MockProvider::working());
    let controller = common::mock_controller(common::test_config(8000), provider.clone());

    let err = controller.run(video, srt, temp_dir.path().join("out.mkv")).await.unwrap_err();

    assert!(fatal_input(&err));
    assert_eq!(provider.call_count(), 0);
    Ok(())
}

/// Test that subtitle files with nothing to speak are rejected
#[test]
fn test_load_cues_withOnlyEmptyEntries_shouldBeFatal() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let srt = common::create_test_file(
        temp_dir.path(),
        "empty.srt",
        "1\n00:00:01,000 --> 00:00:02,000\n\n2\n00:00:03,000 --> 00:00:04,000\n   \n",
    )?;

    let err = Controller::load_cues(&srt).unwrap_err();
    assert!(fatal_input(&err));

    let err = Controller::load_cues(&temp_dir.path().join("nope.srt")).unwrap_err();
    assert!(fatal_input(&err));
    Ok(())
}

/// Test rendering a track from a subtitle file, including the issues log
#[tokio::test]
async fn test_render_track_withFailingCue_shouldExportAndLogIssue() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let srt = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;
    let provider = Arc::new(
        MockProvider::working()
            .with_clip(8000, 4000, 0.5)
            .failing_on("For testing purposes."),
    );
    let controller = common::mock_controller(common::test_config(8000), provider.clone());
    let cues = Controller::load_cues(&srt)?;
    let wav = temp_dir.path().join("full_dub.wav");
    let job_output = temp_dir.path().join("out/movie_dubbed.mkv");

    let summary = controller
        .render_track(&cues, None, temp_dir.path(), &wav, &job_output, &MultiProgress::new())
        .await?;

    assert_eq!(summary.cues, 3);
    assert_eq!(summary.synthesized, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.normalized);
    // last cue ends at 14 s, plus the 10 s trailing margin
    assert_eq!(summary.duration_secs, 24.0);
    assert_eq!(hound::WavReader::open(&wav)?.len(), 24 * 8000);

    let issues = fs::read_to_string(temp_dir.path().join("out").join(ISSUES_LOG_FILE))?;
    assert_eq!(issues.lines().count(), 1);
    assert!(issues.contains("cue 2 'For testing purposes.'"));
    Ok(())
}

/// Test that a track that cannot be written is reported as an export failure
#[tokio::test]
async fn test_render_track_withUnwritableTarget_shouldFailAtExportStage() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let srt = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;
    let controller = common::mock_controller(
        common::test_config(8000),
        Arc::new(MockProvider::working().with_clip(8000, 100, 0.5)),
    );
    let cues = Controller::load_cues(&srt)?;
    let wav = temp_dir.path().join("missing_dir/full_dub.wav");

    let err = controller
        .render_track(&cues, Some(15.0), temp_dir.path(), &wav, &temp_dir.path().join("out.mkv"), &MultiProgress::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DubError>(),
        Some(DubError::Stage { stage: JobStage::Export, .. })
    ));
    assert!(err.to_string().starts_with("export stage failed"));
    assert!(!wav.exists());
    Ok(())
}

/// Test that the clean command strips tags into a new file
#[test]
fn test_clean_subtitle_file_withTaggedInput_shouldWriteOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "raw.srt")?;
    let output = temp_dir.path().join("clean.srt");
    let controller = common::mock_controller(common::test_config(8000), Arc::new(MockProvider::working()));

    controller.clean_subtitle_file(&input, &output)?;

    let cleaned = fs::read_to_string(&output)?;
    assert!(cleaned.contains("It contains multiple entries."));
    assert!(!cleaned.contains("<i>"));
    assert!(controller.clean_subtitle_file(&temp_dir.path().join("missing.srt"), &output).is_err());
    Ok(())
}

/// Test that an empty input directory is an error
#[tokio::test]
async fn test_run_folder_withNoVideos_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "in/readme.txt", "nothing here")?;
    let controller = common::mock_controller(common::test_config(8000), Arc::new(MockProvider::working()));

    let result = controller
        .run_folder(temp_dir.path().join("in"), temp_dir.path().join("out"), false)
        .await;

    assert!(result.is_err());
    Ok(())
}

/// Test the skip rule and per-video failure isolation of the batch driver
#[tokio::test]
async fn test_run_folder_withExistingOutput_shouldSkipAndContinue() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let input_dir = temp_dir.path().join("in");
    let output_dir = temp_dir.path().join("out");
    common::create_test_file(&input_dir, "done.mkv", "")?;
    common::create_test_file(&input_dir, "season/todo.MP4", "")?;
    common::create_test_file(&output_dir, "done_dubbed.mkv", "already dubbed")?;
    let provider = Arc::new(MockProvider::working());
    let controller = common::mock_controller(common::test_config(8000), provider.clone());

    let summary = controller.run_folder(input_dir.clone(), output_dir.clone(), false).await?;

    // todo.MP4 fails at extraction because ffmpeg is unavailable
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 0);
    assert_eq!(provider.call_count(), 0);
    assert_eq!(fs::read_to_string(output_dir.join("done_dubbed.mkv"))?, "already dubbed");

    let forced = controller.run_folder(input_dir, output_dir, true).await?;
    assert_eq!(forced.skipped, 0);
    assert_eq!(forced.failed, 2);
    Ok(())
}
