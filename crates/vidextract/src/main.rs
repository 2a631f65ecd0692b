mod batch;
mod cli;
mod extract;
mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{CliArgs, OcrEngineChoice};
use extract::{ExtractionError, ExtractionRequest};
use settings::EffectiveSettings;
use vidextract_decoder::{Backend, Configuration, DynFrameSource, FrameError};
use vidextract_locator::{
    ExtractionSession, FrameRange, LocateError, LocatorConfig, SamplerConfig, SessionConfig,
};
use vidextract_ocr::{MockOcrEngine, OcrEngine, OcrError};
#[cfg(feature = "engine-tesseract")]
use vidextract_ocr::{TesseractConfig, TesseractOcrEngine};
use vidextract_timestamp::{OverlayInstant, ParseError, parse_overlay};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] settings::ConfigError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Extract(#[from] ExtractionError),

    #[error(transparent)]
    Batch(#[from] batch::BatchError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] ParseError),

    #[error("{0}")]
    Usage(String),
}

fn usage(message: impl Into<String>) -> AppError {
    AppError::Usage(message.into())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Locate(LocateError::Cancelled)) => {
            info!("cancelled");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let (args, sources) = cli::parse_cli();
    if args.list_backends {
        print_available_backends();
        return Ok(());
    }
    let settings = settings::resolve_settings(&args, &sources)?;

    let input = args
        .input
        .clone()
        .ok_or_else(|| usage("an input video path is required"))?;
    let source = open_source(&settings, input.clone())?;
    let engine = select_engine(&settings)?;
    let session_config = session_config(&settings, engine.name());

    match args.batch.as_deref() {
        Some(batch_dir) => {
            run_batch(
                &args, &settings, batch_dir, &input, source, engine, &session_config,
            )
            .await
        }
        None => run_single(&args, &settings, &input, source, engine, session_config).await,
    }
}

fn open_source(settings: &EffectiveSettings, input: PathBuf) -> Result<DynFrameSource, AppError> {
    let mut config = Configuration::from_env().unwrap_or_default();
    if let Some(backend) = settings.backend.as_deref() {
        config.backend = Backend::from_str(backend)?;
    }
    config.input = Some(input);

    let available = Configuration::available_backends();
    if !available.contains(&config.backend) {
        return Err(FrameError::unsupported(config.backend.as_str()).into());
    }
    info!(backend = config.backend.as_str(), "opening video");
    Ok(config.create_source()?)
}

fn select_engine(settings: &EffectiveSettings) -> Result<Arc<dyn OcrEngine>, AppError> {
    match settings.ocr_engine {
        OcrEngineChoice::Mock => Ok(Arc::new(MockOcrEngine)),
        OcrEngineChoice::Tesseract => {
            let engine = tesseract_engine(settings)?;
            engine.warm_up()?;
            Ok(engine)
        }
        OcrEngineChoice::Auto => {
            match tesseract_engine(settings) {
                Ok(engine) => match engine.warm_up() {
                    Ok(()) => return Ok(engine),
                    Err(err) => warn!("{err}; falling back to the mock engine"),
                },
                Err(err) => warn!("{err}; falling back to the mock engine"),
            }
            Ok(Arc::new(MockOcrEngine))
        }
    }
}

#[cfg(feature = "engine-tesseract")]
fn tesseract_engine(settings: &EffectiveSettings) -> Result<Arc<dyn OcrEngine>, AppError> {
    let mut config = TesseractConfig::default();
    if let Some(cmd) = settings.tesseract_cmd.clone() {
        config.executable = cmd;
    }
    Ok(Arc::new(TesseractOcrEngine::new(config)))
}

#[cfg(not(feature = "engine-tesseract"))]
fn tesseract_engine(_settings: &EffectiveSettings) -> Result<Arc<dyn OcrEngine>, AppError> {
    Err(AppError::Ocr(OcrError::unavailable(
        "tesseract",
        "not compiled in; rebuild with the \"engine-tesseract\" feature",
    )))
}

fn session_config(settings: &EffectiveSettings, engine_name: &str) -> SessionConfig {
    // The mock engine reads overlay bytes verbatim; normalization would
    // destroy them.
    let sampler = if engine_name == "mock" {
        SamplerConfig::passthrough()
    } else {
        SamplerConfig::default()
    };
    SessionConfig {
        region: settings.region.clone(),
        sampler,
        locator: LocatorConfig {
            tolerance_frames: settings.tolerance_frames,
            ..LocatorConfig::default()
        },
        confidence_floor: settings.confidence_floor,
    }
}

async fn run_single(
    args: &CliArgs,
    settings: &EffectiveSettings,
    input: &Path,
    source: DynFrameSource,
    engine: Arc<dyn OcrEngine>,
    session_config: SessionConfig,
) -> Result<(), AppError> {
    let start_text = args
        .start
        .as_deref()
        .ok_or_else(|| usage("--start is required (or use --batch)"))?;
    let end_text = args
        .end
        .as_deref()
        .ok_or_else(|| usage("--end is required (or use --batch)"))?;
    let output = args
        .output
        .clone()
        .ok_or_else(|| usage("--output is required (or use --batch)"))?;

    let hint = session_config.region.format_hint;
    let start = parse_overlay(start_text, hint)?;
    let end = parse_overlay(end_text, hint)?;

    let mut session = ExtractionSession::new(source, engine, session_config)?;
    let fps = session
        .metadata()
        .fps
        .ok_or(LocateError::UnknownTimeline)?;
    install_ctrl_c(&session);

    let range = locate_with_progress(&mut session, start, end).await?;
    let report = extract::extract(ExtractionRequest {
        input: input.to_path_buf(),
        range,
        fps,
        output,
        codec: settings.codec,
    })
    .await?;
    println!(
        "wrote {} ({} frames, {:.3}s)",
        report.output.display(),
        range.frame_count(),
        report.duration_secs
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_batch(
    args: &CliArgs,
    settings: &EffectiveSettings,
    batch_dir: &Path,
    input: &Path,
    source: DynFrameSource,
    engine: Arc<dyn OcrEngine>,
    session_config: &SessionConfig,
) -> Result<(), AppError> {
    let pad = chrono::Duration::milliseconds((args.batch_pad_secs * 1000.0).round() as i64);
    let range_files = batch::find_range_files(batch_dir)?;
    info!(files = range_files.len(), "starting batch run");

    let mut extracted = 0usize;
    let mut failed = 0usize;
    for range_file in &range_files {
        let rows = batch::parse_range_file(range_file, pad)?;
        for (row_index, row) in rows.iter().enumerate() {
            let output = batch::output_for_row(
                range_file,
                &settings.batch_output_name,
                row_index,
                rows.len(),
            );
            // One session (and one cache) per segment.
            let mut session =
                ExtractionSession::new(source.clone(), engine.clone(), session_config.clone())?;
            let fps = session
                .metadata()
                .fps
                .ok_or(LocateError::UnknownTimeline)?;
            install_ctrl_c(&session);

            match locate_with_progress(&mut session, row.start, row.end).await {
                Ok(range) => {
                    extract::extract(ExtractionRequest {
                        input: input.to_path_buf(),
                        range,
                        fps,
                        output,
                        codec: settings.codec,
                    })
                    .await?;
                    extracted += 1;
                }
                Err(err @ LocateError::Cancelled) => return Err(err.into()),
                Err(err) => {
                    // One unresolvable segment should not sink the batch.
                    warn!(
                        range_file = %range_file.display(),
                        row = row_index + 1,
                        "skipping segment: {err}"
                    );
                    failed += 1;
                }
            }
        }
    }
    println!("batch complete: {extracted} extracted, {failed} skipped");
    Ok(())
}

fn install_ctrl_c(session: &ExtractionSession) {
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

async fn locate_with_progress(
    session: &mut ExtractionSession,
    start: OverlayInstant,
    end: OverlayInstant,
) -> Result<FrameRange, LocateError> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan.bold} [{elapsed_precise}] {msg}")
            .expect("static template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("locating frames for {start} .. {end}"));

    let result = session.locate(start, end).await;
    match &result {
        Ok(range) => spinner.finish_with_message(format!(
            "located frames {}..={} ({} sampled)",
            range.start,
            range.end,
            session.cache().computed()
        )),
        Err(err) => spinner.abandon_with_message(format!("locate failed: {err}")),
    }
    result
}

fn print_available_backends() {
    let names: Vec<&'static str> = Configuration::available_backends()
        .iter()
        .map(Backend::as_str)
        .collect();
    println!("available backends: {}", names.join(", "));
}
