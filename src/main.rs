// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow, Context};
use log::{warn, info, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::path::{Path, PathBuf};
use std::io::Write;
use std::fs::File;
use std::io::BufReader;
use std::future::Future;
use clap::{Parser, ValueEnum, CommandFactory, Subcommand, Args};
use clap_complete::{generate, Shell};

use sub2dub::app_config::{self, Config, ProviderConfig, SpeechProvider};
use sub2dub::app_controller::Controller;

/// CLI Wrapper for SpeechProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliSpeechProvider {
    Edge,
    OpenAI,
}

impl From<CliSpeechProvider> for SpeechProvider {
    fn from(cli_provider: CliSpeechProvider) -> Self {
        match cli_provider {
            CliSpeechProvider::Edge => SpeechProvider::Edge,
            CliSpeechProvider::OpenAI => SpeechProvider::OpenAI,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dub a video using an SRT file
    Dub(DubArgs),

    /// Extract, clean and dub every video in a directory
    Batch {
        /// Directory searched recursively for .mkv/.mp4 files
        #[arg(value_name = "INPUT_DIR")]
        input_dir: PathBuf,

        /// Directory receiving subtitles and dubbed videos
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,

        /// Redo videos whose dubbed output already exists
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        voice: VoiceArgs,
    },

    /// Strip formatting tags from an SRT file
    Clean {
        /// Input SRT file
        input: PathBuf,
        /// Output SRT file
        output: PathBuf,
    },

    /// Generate shell completions for sub2dub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct DubArgs {
    /// Input video file
    #[arg(value_name = "VIDEO")]
    video: PathBuf,

    /// Input SRT subtitle file
    #[arg(value_name = "SRT")]
    srt: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "dubbed_output.mkv")]
    output: PathBuf,

    #[command(flatten)]
    voice: VoiceArgs,
}

#[derive(Args, Debug, Default)]
struct VoiceArgs {
    /// Voice identifier (e.g. en-US-ChristopherNeural)
    #[arg(long)]
    voice: Option<String>,

    /// Speech rate modifier (e.g. +10%, -5%)
    #[arg(long, allow_hyphen_values = true)]
    speed: Option<String>,

    /// Volume of the original audio under the dub (0.0 to 1.0)
    #[arg(long)]
    ducking: Option<f32>,
}

/// sub2dub - turn subtitles into a voice dub
///
/// Synthesizes every subtitle line, places the clips on a timeline that
/// matches the video and merges the result over the ducked original audio.
#[derive(Parser, Debug)]
#[command(name = "sub2dub")]
#[command(version)]
#[command(about = "Subtitle-driven voice dubbing tool")]
#[command(long_about = "sub2dub synthesizes speech for each subtitle line and mixes it into the video.

EXAMPLES:
    sub2dub dub movie.mkv movie.srt                    # Dub with default voice
    sub2dub dub movie.mkv movie.srt -o out.mkv --voice en-GB-RyanNeural --speed +10%
    sub2dub batch ./videos ./dubbed                   # Dub a whole directory
    sub2dub clean raw.srt clean.srt                    # Strip tags from subtitles
    sub2dub --provider openai dub movie.mkv movie.srt  # Use an OpenAI-compatible backend
    sub2dub completions bash > sub2dub.bash            # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Speech synthesis backend to use
    #[arg(short, long, value_enum, global = true)]
    provider: Option<CliSpeechProvider>,

    /// Maximum number of synthesis requests in flight
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// API key for HTTP backends
    #[arg(long, env = "SUB2DUB_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // The max level is raised or lowered after the config is read
        metadata.level() <= self.level.max(log::max_level())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config tells us otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "sub2dub", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_or_create_config(&cli.config)?;
    apply_global_overrides(&mut config, &cli);

    match cli.command {
        Commands::Dub(args) => {
            apply_voice_overrides(&mut config, &args.voice);
            let controller = prepare_controller(config, cli.log_level.is_none())?;
            run_until_interrupted(async {
                controller.run(args.video, args.srt, args.output).await.map(|_| ())
            })
            .await
        }
        Commands::Batch { input_dir, output_dir, force, voice } => {
            apply_voice_overrides(&mut config, &voice);
            let controller = prepare_controller(config, cli.log_level.is_none())?;
            run_until_interrupted(async {
                let summary = controller.run_folder(input_dir, output_dir, force).await?;
                if summary.failed > 0 {
                    warn!("{} videos failed", summary.failed);
                }
                Ok(())
            })
            .await
        }
        Commands::Clean { input, output } => {
            let controller = prepare_controller(config, cli.log_level.is_none())?;
            controller.clean_subtitle_file(&input, &output)
        }
        Commands::Completions { .. } => Ok(()),
    }
}

/// Race a job against Ctrl-C. Dropping the job removes its temporary files
/// and kills any child process it started.
async fn run_until_interrupted<F>(job: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        result = job => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cleaning up");
            Err(anyhow!("Interrupted by user"))
        }
    }
}

/// Load the config file, writing a default one when it does not exist
fn load_or_create_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?;
        return Ok(config);
    }

    warn!("Config file not found at '{}', creating default config.", config_path);
    let config = Config::default();
    let config_json = serde_json::to_string_pretty(&config)
        .context("Failed to serialize default config to JSON")?;
    std::fs::write(config_path, config_json)
        .context(format!("Failed to write default config to file: {}", config_path))?;
    Ok(config)
}

fn apply_global_overrides(config: &mut Config, cli: &CommandLineOptions) {
    if let Some(provider) = &cli.provider {
        config.synthesis.provider = provider.clone().into();
    }

    if let Some(concurrency) = cli.concurrency {
        config.synthesis.concurrent_requests = concurrency;
    }

    if let Some(api_key) = &cli.api_key {
        let provider = config.synthesis.provider;
        let provider_str = provider.to_lowercase_string();
        match config
            .synthesis
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            Some(provider_config) => provider_config.api_key = api_key.clone(),
            None => {
                let mut provider_config = ProviderConfig::new(provider);
                provider_config.api_key = api_key.clone();
                config.synthesis.available_providers.push(provider_config);
            }
        }
    }

    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }
}

fn apply_voice_overrides(config: &mut Config, args: &VoiceArgs) {
    if let Some(voice) = &args.voice {
        config.voice = voice.clone();
    }
    if let Some(speed) = &args.speed {
        config.rate = speed.clone();
    }
    if let Some(ducking) = args.ducking {
        config.ducking = ducking;
    }
}

/// Validate the final configuration and build the controller
fn prepare_controller(config: Config, level_from_config: bool) -> Result<Controller> {
    config.validate()
        .context("Configuration validation failed")?;

    if level_from_config {
        log::set_max_level(config.log_level.to_level_filter());
    }

    info!(
        "Backend: {} | voice {} | rate {} | ducking {:.2} | {} concurrent",
        config.synthesis.provider.display_name(),
        config.voice,
        config.rate,
        config.ducking,
        config.synthesis.concurrent_requests
    );

    Controller::with_config(config)
}
