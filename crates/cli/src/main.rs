mod viewer;

use std::ffi::OsString;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use clap::{Parser, ValueEnum};
use crossterm::terminal::{Clear, ClearType};
use crossterm::Command;

use facewatch_core::detection::domain::coordinate_mapper::ScaleFactor;
use facewatch_core::detection::infrastructure::model_resolver;
use facewatch_core::detection::infrastructure::onnx_landmark_eye_detector::OnnxLandmarkEyeDetector;
use facewatch_core::detection::infrastructure::rustface_region_detector::RustfaceRegionDetector;
use facewatch_core::pipeline::detect_faces_use_case::{
    DetectFacesUseCase, SessionEnd, SessionSummary,
};
use facewatch_core::pipeline::detection_pipeline::DetectionPipeline;
use facewatch_core::pipeline::pipeline_config::PipelineConfig;
use facewatch_core::pipeline::session_error::SessionError;
use facewatch_core::pipeline::session_logger::StdoutSessionLogger;
use facewatch_core::presentation::domain::overlay::OverlayRenderer;
use facewatch_core::presentation::domain::presentation_sink::PresentationSink;
use facewatch_core::presentation::infrastructure::stats_panel::StatsPanel;
use facewatch_core::presentation::infrastructure::terminal_sink::TerminalSink;
use facewatch_core::presentation::infrastructure::window_sink::window_channel;
use facewatch_core::shared::constants::{
    CAPTURE_DEVICE, CAPTURE_FORMAT, CAPTURE_FPS, CAPTURE_HEIGHT, CAPTURE_WIDTH, EYE_MODEL_NAME,
    EYE_MODEL_URL, FACE_MODEL_NAME, FACE_MODEL_URL, SCREENSHOT_PATH, STATS_LOG_INTERVAL,
};
use facewatch_core::video::domain::frame_source::FrameSource;
use facewatch_core::video::infrastructure::ffmpeg_frame_source::{
    CaptureSettings, FfmpegFrameSource,
};
use facewatch_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Live face and eye detection from a camera or video file.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    /// Capture device or video file.
    #[arg(long, default_value = CAPTURE_DEVICE)]
    device: String,

    /// Capture input format (e.g. v4l2), or "auto" to let ffmpeg probe files.
    #[arg(long, default_value = CAPTURE_FORMAT)]
    input_format: String,

    /// Requested capture width.
    #[arg(long, default_value_t = CAPTURE_WIDTH)]
    width: u32,

    /// Requested capture height.
    #[arg(long, default_value_t = CAPTURE_HEIGHT)]
    height: u32,

    /// Requested capture frame rate.
    #[arg(long, default_value_t = CAPTURE_FPS)]
    fps: u32,

    /// Detection scale in (0, 1]; overrides the config file.
    #[arg(long)]
    scale: Option<f64>,

    /// Face model file (downloaded to the cache when omitted).
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Eye landmark model file (downloaded to the cache when omitted).
    #[arg(long)]
    eye_model: Option<PathBuf>,

    /// Extra directory to search for model files (repeatable).
    #[arg(long)]
    models_dir: Vec<PathBuf>,

    /// JSON file with detection scale and detector tuning.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where the 's' key saves the annotated frame.
    #[arg(long, default_value = SCREENSHOT_PATH)]
    screenshot: PathBuf,

    /// Log a performance line every N frames.
    #[arg(long, default_value_t = STATS_LOG_INTERVAL)]
    stats_interval: usize,

    /// Where annotated frames are shown; falls back to the terminal when
    /// no graphical session is available.
    #[arg(long, value_enum, default_value_t = DisplayMode::Window)]
    display: DisplayMode,

    /// TrueType font for the statistics panel (a system font when omitted).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Verify models and the capture source, then exit.
    #[arg(long)]
    check: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DisplayMode {
    Window,
    Terminal,
}

fn main() {
    let interactive = std::io::stderr().is_terminal();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            let line = log_line(
                &buf.timestamp().to_string(),
                record.level(),
                record.target(),
                &record.args().to_string(),
                interactive,
            );
            buf.write_all(line.as_bytes())
        })
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = load_config(&cli)?;
    if cli.check {
        return run_check(&cli);
    }

    let face_model = resolve_face_model(&cli)?;
    let eye_model = resolve_eye_model(&cli)?;
    log::info!("Face model: {}", face_model.display());
    log::info!("Eye model: {}", eye_model.display());

    let panel = match &cli.font {
        Some(path) => StatsPanel::from_font_file(path)?,
        None => StatsPanel::discover(),
    };
    let plan = SessionPlan {
        capture: capture_settings(&cli),
        config,
        face_model,
        eye_model,
        screenshot: cli.screenshot.clone(),
        stats_interval: cli.stats_interval,
    };

    let display = effective_display(
        cli.display,
        graphical_session(std::env::var_os("DISPLAY"), std::env::var_os("WAYLAND_DISPLAY")),
    );
    let summary = match display {
        DisplayMode::Terminal => {
            run_session(plan, TerminalSink::new(OverlayRenderer::default(), panel))?
        }
        DisplayMode::Window => {
            let (sink, link) = window_channel(OverlayRenderer::default(), panel);
            let session = thread::spawn(move || run_session(plan, sink));
            let shown = viewer::run(link, cli.width, cli.height);
            let summary = session
                .join()
                .map_err(|_| "detection session panicked")??;
            shown.map_err(|e| format!("display window failed: {e}"))?;
            summary
        }
    };

    let reason = match summary.end {
        SessionEnd::Quit => "stopped by user",
        SessionEnd::SourceExhausted => "source ended",
    };
    println!(
        "Processed {} frames in {:.1}s ({:.1} FPS average), {reason}",
        summary.frames,
        summary.elapsed.as_secs_f64(),
        summary.average_fps()
    );
    Ok(())
}

/// Everything a session needs besides its sink. Detectors are built on the
/// thread that runs the session.
struct SessionPlan {
    capture: CaptureSettings,
    config: PipelineConfig,
    face_model: PathBuf,
    eye_model: PathBuf,
    screenshot: PathBuf,
    stats_interval: usize,
}

fn run_session<S>(plan: SessionPlan, sink: S) -> Result<SessionSummary, SessionError>
where
    S: PresentationSink + 'static,
{
    let face = RustfaceRegionDetector::from_file(&plan.face_model)?;
    let eye = OnnxLandmarkEyeDetector::from_file(&plan.eye_model)?;
    log::info!(
        "Detection scale {}, face {:?}, eye {:?}",
        plan.config.detection_scale.value(),
        plan.config.face,
        plan.config.eye
    );
    let pipeline = DetectionPipeline::new(Box::new(face), Box::new(eye), plan.config);

    let mut use_case = DetectFacesUseCase::new(
        Box::new(FfmpegFrameSource::new(plan.capture)),
        pipeline,
        Box::new(sink),
        Box::new(ImageFileWriter::new()),
        plan.screenshot,
        Box::new(StdoutSessionLogger::new(plan.stats_interval)),
    );
    use_case.execute()
}

/// A window needs a display server on Linux and the BSDs; elsewhere one is
/// always there.
fn graphical_session(display: Option<OsString>, wayland: Option<OsString>) -> bool {
    if cfg!(any(target_os = "macos", target_os = "windows")) {
        return true;
    }
    [display, wayland]
        .into_iter()
        .flatten()
        .any(|value| !value.is_empty())
}

fn effective_display(requested: DisplayMode, graphical: bool) -> DisplayMode {
    if requested == DisplayMode::Window && !graphical {
        log::warn!("No graphical session found; showing detections in the terminal");
        return DisplayMode::Terminal;
    }
    requested
}

/// One formatted log record.
///
/// On an interactive terminal the record first clears the in-place status
/// line and every line ends in `\r\n`, so output starts at column 0 even
/// while the terminal is in raw mode.
fn log_line(
    timestamp: &str,
    level: log::Level,
    target: &str,
    message: &str,
    interactive: bool,
) -> String {
    let text = format!("[{timestamp} {level:<5} {target}] {message}");
    if !interactive {
        return format!("{text}\n");
    }
    let mut clear = String::new();
    if Clear(ClearType::CurrentLine).write_ansi(&mut clear).is_err() {
        clear.clear();
    }
    format!("\r{clear}{}\r\n", text.replace('\n', "\r\n"))
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, SessionError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(scale) = cli.scale {
        config.detection_scale = ScaleFactor::new(scale)?;
    }
    Ok(config)
}

fn capture_settings(cli: &Cli) -> CaptureSettings {
    let input_format = match cli.input_format.as_str() {
        "auto" => None,
        name => Some(name.to_string()),
    };
    CaptureSettings {
        device: cli.device.clone(),
        input_format,
        width: cli.width,
        height: cli.height,
        fps: cli.fps,
    }
}

/// `--models-dir` entries first, then `./models` and the working directory.
fn search_dirs(cli: &Cli) -> Vec<PathBuf> {
    let mut dirs = cli.models_dir.clone();
    dirs.push(PathBuf::from("models"));
    dirs.push(PathBuf::from("."));
    dirs
}

fn resolve_face_model(cli: &Cli) -> Result<PathBuf, SessionError> {
    resolve_model(cli, cli.face_model.as_deref(), FACE_MODEL_NAME, FACE_MODEL_URL, "face")
}

fn resolve_eye_model(cli: &Cli) -> Result<PathBuf, SessionError> {
    resolve_model(cli, cli.eye_model.as_deref(), EYE_MODEL_NAME, EYE_MODEL_URL, "eye")
}

/// An explicit path must exist; otherwise the model is searched for and
/// downloaded into the cache on first use.
fn resolve_model(
    cli: &Cli,
    explicit: Option<&Path>,
    name: &str,
    url: &str,
    label: &'static str,
) -> Result<PathBuf, SessionError> {
    if let Some(path) = explicit {
        return explicit_model(path);
    }
    let path = model_resolver::resolve(
        name,
        url,
        &search_dirs(cli),
        Some(Box::new(move |downloaded: u64, total: u64| {
            download_progress(label, downloaded, total)
        })),
    )?;
    Ok(path)
}

fn explicit_model(path: &Path) -> Result<PathBuf, SessionError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(SessionError::ConfigurationMissing(format!(
            "model file not found: {}",
            path.display()
        )))
    }
}

/// Reports every setup problem instead of stopping at the first one.
fn run_check(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut failures = 0;

    let face = resolve_face_model(cli).and_then(|path| {
        RustfaceRegionDetector::from_file(&path)?;
        Ok(path)
    });
    let eye = resolve_eye_model(cli).and_then(|path| {
        OnnxLandmarkEyeDetector::from_file(&path)?;
        Ok(path)
    });
    for (label, loaded) in [("face model", face), ("eye model", eye)] {
        match loaded {
            Ok(path) => println!("ok    {label}: {}", path.display()),
            Err(e) => {
                println!("FAIL  {label}: {e}");
                failures += 1;
            }
        }
    }

    let mut source = FfmpegFrameSource::new(capture_settings(cli));
    match source.open() {
        Ok(meta) => println!(
            "ok    source: {} ({}x{} @ {:.0} fps)",
            meta.source, meta.width, meta.height, meta.fps
        ),
        Err(e) => {
            println!("FAIL  source: {e}");
            failures += 1;
        }
    }
    source.close();

    if failures > 0 {
        return Err(format!("{failures} setup check(s) failed").into());
    }
    println!("All checks passed");
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.width == 0 || cli.height == 0 {
        return Err(format!(
            "Capture size must be positive, got {}x{}",
            cli.width, cli.height
        )
        .into());
    }
    if cli.fps == 0 {
        return Err("Frame rate must be positive".into());
    }
    if cli.input_format.is_empty() {
        return Err("Input format must not be empty".into());
    }
    if cli.stats_interval == 0 {
        return Err("Stats interval must be at least 1".into());
    }
    if let Some(scale) = cli.scale {
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(format!("Scale must be within (0, 1], got {scale}").into());
        }
    }
    Ok(())
}

fn download_progress(label: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {label} detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {label} detection model... {downloaded} bytes");
    }
}
