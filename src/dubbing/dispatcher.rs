/*!
 * Bounded synthesis dispatcher.
 *
 * Fans a cue list out to the speech backend with at most `K` synthesis calls
 * in flight, decodes every artifact to raw samples, and collects the per-cue
 * outcomes. A failing cue is recorded and the rest of the batch carries on.
 */

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

use crate::app_config::Config;
use crate::errors::{DubError, ProviderError};
use crate::providers::{Provider, SpeechRequest};

use super::cue::Cue;
use super::export::ClipDecoder;

/// Decoded audio for one cue
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Index of the cue this audio belongs to
    pub cue_index: usize,
    /// Mono samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Sample rate of `samples`
    pub sample_rate: u32,
}

/// A cue whose audio could not be produced
#[derive(Debug)]
pub struct CueFailure {
    pub cue_index: usize,
    pub text: String,
    pub error: DubError,
}

/// Outcome of dispatching a cue list
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Successful results, in completion order
    pub results: Vec<SynthesisResult>,
    /// Per-cue failures, in completion order
    pub failures: Vec<CueFailure>,
    /// Cues with nothing to speak
    pub skipped: usize,
    /// Cues that were scheduled
    pub total: usize,
}

/// Dispatcher settings
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Maximum number of synthesis calls in flight
    pub max_concurrent_requests: usize,
    /// Rate every clip is decoded to
    pub sample_rate: u32,
}

impl DispatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_requests: config.synthesis.concurrent_requests,
            sample_rate: config.mixing.sample_rate,
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 5,
            sample_rate: 44100,
        }
    }
}

/// Runs synthesis for a cue list under a concurrency cap
#[derive(Debug, Clone)]
pub struct SynthesisDispatcher {
    provider: Arc<dyn Provider>,
    decoder: Arc<dyn ClipDecoder>,
    options: DispatchOptions,
}

impl SynthesisDispatcher {
    pub fn new(provider: Arc<dyn Provider>, decoder: Arc<dyn ClipDecoder>, options: DispatchOptions) -> Self {
        Self {
            provider,
            decoder,
            options,
        }
    }

    /// Synthesize and decode every non-empty cue.
    ///
    /// Artifacts are written into `work_dir`. `progress_callback` receives
    /// `(completed, total)` each time a cue finishes, whether it succeeded or not.
    pub async fn dispatch(
        &self,
        cues: &[Cue],
        voice: &str,
        rate: &str,
        work_dir: &Path,
        progress_callback: impl Fn(usize, usize) + Clone + Send + 'static,
    ) -> DispatchReport {
        let scheduled: Vec<&Cue> = cues.iter().filter(|cue| !cue.is_empty()).collect();
        let skipped = cues.len() - scheduled.len();
        let total = scheduled.len();
        if skipped > 0 {
            debug!("Skipping {} empty cues", skipped);
        }

        let max_concurrent = self.options.max_concurrent_requests.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let completed = Arc::new(AtomicUsize::new(0));
        let sample_rate = self.options.sample_rate;

        // Decoding happens after the permit is released, so let the stream
        // poll more tasks than there are permits.
        let outcomes = stream::iter(scheduled)
            .map(|cue| {
                let provider = self.provider.clone();
                let decoder = self.decoder.clone();
                let semaphore = semaphore.clone();
                let completed = completed.clone();
                let progress_callback = progress_callback.clone();
                let request = SpeechRequest::new(cue.text.clone(), voice, rate);
                let artifact = work_dir.join(cue.artifact_name(provider.artifact_extension()));

                async move {
                    let outcome = synthesize_cue(
                        provider.as_ref(),
                        decoder.as_ref(),
                        &semaphore,
                        cue,
                        &request,
                        artifact,
                        sample_rate,
                    )
                    .await;

                    let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress_callback(current, total);
                    outcome
                }
            })
            .buffer_unordered(max_concurrent * 2)
            .collect::<Vec<_>>()
            .await;

        let mut report = DispatchReport {
            skipped,
            total,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(result) => report.results.push(result),
                Err(failure) => report.failures.push(failure),
            }
        }
        report
    }
}

async fn synthesize_cue(
    provider: &dyn Provider,
    decoder: &dyn ClipDecoder,
    semaphore: &Semaphore,
    cue: &Cue,
    request: &SpeechRequest,
    artifact: PathBuf,
    sample_rate: u32,
) -> Result<SynthesisResult, CueFailure> {
    // The permit is held only for the synthesis call, decoding runs unbounded
    let synthesized = match semaphore.acquire().await {
        Ok(_permit) => provider.synthesize(request, &artifact).await,
        Err(closed) => Err(ProviderError::RequestFailed(closed.to_string())),
    };

    if let Err(source) = synthesized {
        warn!("Synthesis failed for cue {} ('{}'): {}", cue.index, cue.text, source);
        return Err(CueFailure {
            cue_index: cue.index,
            text: cue.text.clone(),
            error: DubError::Synthesis {
                cue_index: cue.index,
                text: cue.text.clone(),
                source,
            },
        });
    }

    match decoder.decode(&artifact, sample_rate).await {
        Ok(samples) => {
            debug!("Cue {} synthesized: {} samples", cue.index, samples.len());
            Ok(SynthesisResult {
                cue_index: cue.index,
                samples,
                sample_rate,
            })
        }
        Err(e) => {
            warn!("Could not decode audio for cue {} ('{}'): {:#}", cue.index, cue.text, e);
            Err(CueFailure {
                cue_index: cue.index,
                text: cue.text.clone(),
                error: DubError::Decode {
                    cue_index: cue.index,
                    message: format!("{:#}", e),
                },
            })
        }
    }
}
