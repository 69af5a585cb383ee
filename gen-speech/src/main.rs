//! gen-speech - Convert text documents to speech with a hosted TTS model

mod audio;
mod config;
mod document;
mod pipeline;
mod text;
mod tts;

use anyhow::{Context, Result};
use audio::{OutputFormat, StitchError};
use clap::{Parser, Subcommand};
use config::GenSpeechConfig;
use indicatif::{ProgressBar, ProgressStyle};
use pipeline::{ErrorPolicy, GenerationOptions, GenerationReport};
use std::path::{Path, PathBuf};
use tts::Voice;

#[derive(Parser, Debug)]
#[command(name = "gen-speech")]
#[command(about = "Convert text documents to speech with a hosted TTS model", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the input document (.txt or .docx)
    input: Option<PathBuf>,

    /// Output file path (default: <input-name>.wav or .mp3)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Prebuilt voice
    #[arg(long, value_enum)]
    voice: Option<Voice>,

    /// TTS model identifier
    #[arg(long)]
    model: Option<String>,

    /// Maximum chunk size in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Maximum number of synthesis calls
    #[arg(long)]
    max_calls: Option<usize>,

    /// Output format (default: from output extension, then config)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// What to do when a chunk fails
    #[arg(long, value_enum)]
    on_error: Option<ErrorPolicy>,

    /// Use the streaming synthesis endpoint
    #[arg(long)]
    stream: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show the start of a document and how it would be chunked
    Preview {
        /// Path to the document
        input: PathBuf,

        /// Maximum chunk size in characters
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// List available voices
    Voices,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default voice
    SetVoice {
        #[arg(value_enum)]
        voice: Voice,
    },
    /// Set default model (omit to use the TTS client default)
    SetModel { model: Option<String> },
    /// Set default chunk size in characters
    SetChunkSize { value: usize },
    /// Set maximum synthesis calls per run
    SetMaxCalls { value: usize },
    /// Set default output format
    SetFormat {
        #[arg(value_enum)]
        format: OutputFormat,
    },
    /// Set behaviour when a chunk fails
    SetErrorPolicy {
        #[arg(value_enum)]
        policy: ErrorPolicy,
    },
    /// Enable or disable streaming synthesis
    SetStreaming {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Set FFmpeg binary path (omit to use ffmpeg on PATH)
    SetFfmpeg { path: Option<PathBuf> },
}

/// Settings for one run after merging flags over config.
#[derive(Debug)]
struct RunSettings {
    output: PathBuf,
    format: OutputFormat,
    chunk_size: usize,
    model: Option<String>,
    options: GenerationOptions,
    ffmpeg_path: Option<PathBuf>,
}

impl RunSettings {
    fn resolve(args: &Args, input: &Path, config: &GenSpeechConfig) -> Result<Self> {
        let format = args
            .format
            .or_else(|| args.output.as_deref().and_then(OutputFormat::from_path))
            .unwrap_or(config.output_format);

        let output = args
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(input, format));

        let chunk_size = args.chunk_size.unwrap_or(config.chunk_size);
        if chunk_size == 0 {
            anyhow::bail!("Chunk size must be at least 1 character");
        }

        let max_calls = args.max_calls.unwrap_or(config.max_calls);
        if max_calls == 0 {
            anyhow::bail!("Call limit must be at least 1");
        }

        Ok(Self {
            output,
            format,
            chunk_size,
            model: args.model.clone().or_else(|| config.model.clone()),
            options: GenerationOptions {
                voice: args.voice.unwrap_or(config.voice),
                streaming: args.stream || config.streaming,
                max_calls,
                error_policy: args.on_error.unwrap_or(config.error_policy),
            },
            ffmpeg_path: config.ffmpeg_path.clone(),
        })
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    // Handle subcommands
    match &args.command {
        Some(Commands::Config { action }) => {
            return handle_config_command(action);
        }
        Some(Commands::Preview { input, chunk_size }) => {
            return handle_preview(input, *chunk_size);
        }
        Some(Commands::Voices) => {
            for voice in <Voice as clap::ValueEnum>::value_variants() {
                println!("{}", voice);
            }
            return Ok(());
        }
        None => {}
    }

    let input = args
        .input
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Input file is required. Run 'gen-speech --help' for usage."))?;

    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let config = GenSpeechConfig::load().context("Failed to load configuration")?;
    let settings = RunSettings::resolve(&args, &input, &config)?;
    log::debug!("Run settings: {:?}", settings);

    if settings.format == OutputFormat::Mp3
        && !audio::encoder::is_ffmpeg_available(settings.ffmpeg_path.as_deref())
    {
        anyhow::bail!("MP3 output requires ffmpeg. Install it or set a path with 'gen-speech config set-ffmpeg'.");
    }

    let text = document::read_document(&input).context("Failed to read document")?;
    log::debug!(
        "Document preview:\n{}",
        document::preview(&text, document::PREVIEW_CHARS)
    );

    let chunks = text::process_document(&text, settings.chunk_size);
    eprintln!(
        "Document: {} chars, {} chunk(s) of up to {} chars",
        text.chars().count(),
        chunks.len(),
        settings.chunk_size
    );

    let provider = tts::create_provider(settings.model.as_deref())?;
    eprintln!(
        "Using {} ({}), voice {}",
        provider.name(),
        provider.model(),
        settings.options.voice
    );

    let planned = chunks.len().min(settings.options.max_calls);
    let pb = ProgressBar::new(planned as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let result = pipeline::generate(
        provider.as_ref(),
        &chunks,
        &settings.options,
        |done, total| {
            pb.set_position(done as u64);
            pb.set_message(format!("chunk {} of {}", done, total));
        },
    )
    .await;

    let report = match result {
        Ok(report) => {
            pb.finish_with_message("Conversion complete!");
            report
        }
        Err(e) => {
            pb.abandon_with_message("Conversion failed");
            return Err(e.into());
        }
    };

    print_summary(&report, settings.options.max_calls);

    if report.fragments.is_empty() {
        anyhow::bail!("No audio was generated");
    }

    let wav = audio::stitch(&report.wavs()).map_err(|e| stitch_failure(&report, e))?;
    let bytes = audio::encode(wav, settings.format, settings.ffmpeg_path.as_deref())?;

    std::fs::write(&settings.output, &bytes)
        .with_context(|| format!("Failed to write {}", settings.output.display()))?;

    let size_mb = bytes.len() as f64 / (1024.0 * 1024.0);
    eprintln!("Output: {} ({:.1} MB)", settings.output.display(), size_mb);

    Ok(())
}

/// Report processed, failed and skipped chunks.
fn print_summary(report: &GenerationReport, max_calls: usize) {
    eprintln!(
        "\nGenerated: {}/{} chunks",
        report.succeeded(),
        report.total_chunks
    );

    if report.is_complete() {
        eprintln!("All chunks converted");
    }

    for failure in &report.failures {
        eprintln!("  Skipped chunk {}: {}", failure.chunk + 1, failure.reason);
    }

    if report.quota_reached {
        eprintln!(
            "Call limit of {} reached: processed {} of {} chunks. The output covers the generated chunks only.",
            max_calls, report.processed, report.total_chunks
        );
    }
}

/// Attach the chunk number to a stitching error.
fn stitch_failure(report: &GenerationReport, err: StitchError) -> anyhow::Error {
    let position = match &err {
        StitchError::InvalidFragment { index, .. }
        | StitchError::InvalidParameters { index, .. }
        | StitchError::ParameterMismatch { index, .. } => Some(*index),
        _ => None,
    };

    match position.and_then(|p| report.chunk_of_fragment(p)) {
        Some(chunk) => anyhow::Error::new(err)
            .context(format!("Audio for chunk {} could not be stitched", chunk + 1)),
        None => anyhow::Error::new(err).context("Failed to stitch audio"),
    }
}

/// `<input-stem>.<ext>` next to the input file.
fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    input.with_file_name(format!("{}.{}", stem.to_string_lossy(), format.extension()))
}

fn handle_preview(input: &Path, chunk_size: Option<usize>) -> Result<()> {
    let config = GenSpeechConfig::load()?;
    let chunk_size = chunk_size.unwrap_or(config.chunk_size);

    let text = document::read_document(input)?;
    let chunks = text::process_document(&text, chunk_size);

    println!("{}", document::preview(&text, document::PREVIEW_CHARS));
    println!();
    println!(
        "{} chars, {} chunk(s) at {} chars",
        text.chars().count(),
        chunks.len(),
        chunk_size
    );
    if chunks.len() > config.max_calls {
        println!(
            "Warning: only the first {} chunks fit within the call limit",
            config.max_calls
        );
    }
    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = GenSpeechConfig::load()?;
            println!("Configuration file: {:?}", GenSpeechConfig::config_path()?);
            println!();
            println!("voice = {}", config.voice);
            match &config.model {
                Some(model) => println!("model = \"{}\"", model),
                None => println!("model = (tts client default)"),
            }
            println!("chunk_size = {}", config.chunk_size);
            println!("max_calls = {}", config.max_calls);
            println!("output_format = {}", config.output_format);
            println!("error_policy = {:?}", config.error_policy);
            println!("streaming = {}", config.streaming);
            match &config.ffmpeg_path {
                Some(path) => println!("ffmpeg_path = \"{}\"", path.display()),
                None => println!("ffmpeg_path = (ffmpeg on PATH)"),
            }
        }
        ConfigAction::SetVoice { voice } => {
            let mut config = GenSpeechConfig::load()?;
            config.voice = *voice;
            config.save()?;
            println!("Default voice set to: {}", voice);
        }
        ConfigAction::SetModel { model } => {
            let mut config = GenSpeechConfig::load()?;
            config.model = model.clone();
            config.save()?;
            println!(
                "Default model set to: {}",
                model.as_deref().unwrap_or("(tts client default)")
            );
        }
        ConfigAction::SetChunkSize { value } => {
            let mut config = GenSpeechConfig::load()?;
            config.chunk_size = (*value).max(1);
            config.save()?;
            println!("Default chunk size set to: {}", config.chunk_size);
        }
        ConfigAction::SetMaxCalls { value } => {
            let mut config = GenSpeechConfig::load()?;
            config.max_calls = (*value).max(1);
            config.save()?;
            println!("Call limit set to: {}", config.max_calls);
        }
        ConfigAction::SetFormat { format } => {
            let mut config = GenSpeechConfig::load()?;
            config.output_format = *format;
            config.save()?;
            println!("Default output format set to: {}", format);
        }
        ConfigAction::SetErrorPolicy { policy } => {
            let mut config = GenSpeechConfig::load()?;
            config.error_policy = *policy;
            config.save()?;
            println!("Error policy set to: {:?}", policy);
        }
        ConfigAction::SetStreaming { enabled } => {
            let mut config = GenSpeechConfig::load()?;
            config.streaming = *enabled;
            config.save()?;
            println!("Streaming set to: {}", enabled);
        }
        ConfigAction::SetFfmpeg { path } => {
            let mut config = GenSpeechConfig::load()?;
            config.ffmpeg_path = path.clone();
            config.save()?;
            match path {
                Some(p) => println!("FFmpeg path set to: {}", p.display()),
                None => println!("FFmpeg path cleared"),
            }
        }
    }
    Ok(())
}
