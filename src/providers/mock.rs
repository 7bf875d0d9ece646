/*!
 * Mock speech backend for testing.
 *
 * This module provides a mock backend that writes deterministic WAV clips
 * instead of calling a real service:
 * - `MockProvider::working()` - Always succeeds with a constant-amplitude clip
 * - `MockProvider::intermittent(n)` - Fails every nth request
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::empty()` - Succeeds without writing any audio
 *
 * It also records how many calls were in flight at once, so callers can check
 * a concurrency bound.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{Provider, SpeechRequest};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Reports success but writes nothing
    Empty,
}

/// Mock provider for testing synthesis behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Sample rate of the written clips
    sample_rate: u32,
    /// Length of every written clip in samples
    clip_samples: usize,
    /// Amplitude of every written clip
    amplitude: f32,
    /// Simulated service latency
    delay: Duration,
    /// Texts that always fail regardless of behavior
    failing_texts: Vec<String>,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Calls currently in flight
    in_flight: Arc<AtomicUsize>,
    /// Highest number of calls seen in flight at once
    max_in_flight: Arc<AtomicUsize>,
    /// Texts received, in call order
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            sample_rate: 44100,
            clip_samples: 44100,
            amplitude: 1.0,
            delay: Duration::ZERO,
            failing_texts: Vec::new(),
            request_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that succeeds without producing audio
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Set the sample rate and length of written clips
    pub fn with_clip(mut self, sample_rate: u32, clip_samples: usize, amplitude: f32) -> Self {
        self.sample_rate = sample_rate;
        self.clip_samples = clip_samples;
        self.amplitude = amplitude;
        self
    }

    /// Simulate service latency on every call
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    /// Make requests for `text` fail
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing_texts.push(text.into());
        self
    }

    /// Total number of synthesize calls
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Texts received so far
    pub fn requested_texts(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn should_fail(&self, request: &SpeechRequest, call_number: usize) -> bool {
        if self.failing_texts.iter().any(|t| t == &request.text) {
            return true;
        }
        match self.behavior {
            MockBehavior::Working | MockBehavior::Empty => false,
            MockBehavior::Failing => true,
            MockBehavior::Intermittent { fail_every } => fail_every > 0 && call_number % fail_every == 0,
        }
    }

    /// Write the configured tone on the blocking pool
    async fn write_clip(&self, output_path: &Path) -> Result<(), ProviderError> {
        let path = output_path.to_path_buf();
        let (sample_rate, clip_samples, amplitude) = (self.sample_rate, self.clip_samples, self.amplitude);
        tokio::task::spawn_blocking(move || write_tone(&path, sample_rate, clip_samples, amplitude))
            .await
            .map_err(|e| ProviderError::Io(e.to_string()))?
    }
}

fn write_tone(path: &Path, sample_rate: u32, clip_samples: usize, amplitude: f32) -> Result<(), ProviderError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| ProviderError::Io(e.to_string()))?;
    for _ in 0..clip_samples {
        writer
            .write_sample(amplitude)
            .map_err(|e| ProviderError::Io(e.to_string()))?;
    }
    writer.finalize().map_err(|e| ProviderError::Io(e.to_string()))
}

/// Decrements the in-flight counter when a call ends, however it ends
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn artifact_extension(&self) -> &str {
        "wav"
    }

    async fn synthesize(&self, request: &SpeechRequest, output_path: &Path) -> Result<(), ProviderError> {
        let call_number = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.text.clone());

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(self.in_flight.clone());
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.should_fail(request, call_number) {
            return Err(ProviderError::ApiError {
                status_code: 503,
                message: format!("mock failure for '{}'", request.text),
            });
        }

        if self.behavior == MockBehavior::Empty {
            return Ok(());
        }

        self.write_clip(output_path).await
    }
}
