use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use arucam::aruco::{
    builtin_dictionary, render_marker, Dictionary, MarkerDetector, BUILTIN_NAMES,
    DEFAULT_DICTIONARY,
};
use arucam::config::{ConfigError, DisplayBackend, LiveConfig};
use arucam::convert::{luma_from_gray, rgb_from_color_frame};
use arucam::core::LogSpec;
use arucam::report::detect_file;
use arucam::{Annotator, KeyListener};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "arucam", version, about = "Live fiducial marker detection")]
struct Cli {
    /// Stderr log filter, e.g. `debug` or `info,arucam_aruco=warn`.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log through `tracing` (filter from RUST_LOG).
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    tracing: bool,

    /// With --tracing: emit JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the live detection loop until the quit key or end of stream.
    Run(RunArgs),
    /// Detect markers in a single image.
    Detect(DetectArgs),
    /// List the built-in dictionaries.
    Dictionaries {
        /// Generate each dictionary and print its size and correction bits.
        #[arg(long)]
        details: bool,
    },
    /// Write a printable marker image.
    Render(RenderArgs),
}

#[derive(Args, Debug, Default)]
struct DictionaryArgs {
    /// Built-in dictionary name.
    #[arg(long)]
    dictionary: Option<String>,
    /// JSON dictionary file; overrides --dictionary.
    #[arg(long)]
    dictionary_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON config file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// `synthetic`, a device index, an image file or a directory of images.
    #[arg(long)]
    source: Option<String>,
    #[command(flatten)]
    dict: DictionaryArgs,
    /// Write annotated frames as PNGs into this directory.
    #[arg(long, conflicts_with = "headless")]
    output_dir: Option<PathBuf>,
    /// Do not write frames anywhere.
    #[arg(long)]
    headless: bool,
    /// Window name (also the frame file prefix).
    #[arg(long)]
    window: Option<String>,
    /// Stop after this many frames.
    #[arg(long)]
    max_cycles: Option<u64>,
    /// Image sequences: playback rate.
    #[arg(long)]
    fps: Option<f64>,
    /// Image sequences: restart after the last file.
    #[arg(long = "loop")]
    loop_playback: bool,
    /// Outline candidates that did not decode.
    #[arg(long)]
    draw_rejected: bool,
    #[arg(long)]
    quit_key: Option<char>,
    /// Stop-signal poll interval per frame, milliseconds.
    #[arg(long)]
    refresh_ms: Option<u64>,
    /// Write the effective configuration as JSON and continue.
    #[arg(long)]
    save_config: Option<PathBuf>,
    /// Print the loop summary as JSON on stdout.
    #[arg(long)]
    summary_json: bool,
}

#[derive(Args, Debug)]
struct DetectArgs {
    image: PathBuf,
    #[command(flatten)]
    dict: DictionaryArgs,
    /// JSON config file; only detector and annotation settings are used.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the annotated image here.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write a JSON report here; printed to stdout otherwise.
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long)]
    draw_rejected: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[arg(long, default_value = DEFAULT_DICTIONARY)]
    dictionary: String,
    #[arg(long)]
    id: u32,
    /// Pixels per marker cell.
    #[arg(long, default_value_t = 20)]
    cell_px: usize,
    #[arg(long)]
    output: PathBuf,
}

/// Startup failures exit with 2, everything after with 1.
enum Failure {
    Config(Box<dyn Error>),
    Runtime(Box<dyn Error>),
}

impl From<ConfigError> for Failure {
    fn from(e: ConfigError) -> Self {
        Failure::Config(Box::new(e))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let outcome = match cli.command {
        Command::Run(args) => run(args),
        Command::Detect(args) => detect(args),
        Command::Dictionaries { details } => {
            list_dictionaries(details);
            Ok(())
        }
        Command::Render(args) => render(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Config(e)) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
        Err(Failure::Runtime(e)) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(cli: &Cli) {
    #[cfg(feature = "tracing")]
    if cli.tracing {
        arucam::core::init_tracing(cli.json_logs);
        return;
    }
    let spec = LogSpec::parse(&cli.log_level).unwrap_or_else(|| {
        eprintln!("invalid log filter {:?}, using info", cli.log_level);
        LogSpec::level(LevelFilter::Info)
    });
    if let Err(e) = arucam::core::init_with_spec(spec) {
        eprintln!("logger unavailable: {e}");
    }
}

fn apply_dictionary_args(cfg: &mut LiveConfig, args: DictionaryArgs) {
    if let Some(name) = args.dictionary {
        cfg.dictionary = name;
        cfg.dictionary_file = None;
    }
    if let Some(path) = args.dictionary_file {
        cfg.dictionary_file = Some(path);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<LiveConfig, ConfigError> {
    match path {
        Some(path) => LiveConfig::load_json(path),
        None => Ok(LiveConfig::default()),
    }
}

fn run(args: RunArgs) -> Result<(), Failure> {
    let mut cfg = load_config(args.config.as_ref())?;
    apply_dictionary_args(&mut cfg, args.dict);
    if let Some(source) = args.source {
        cfg.source = source;
    }
    if let Some(dir) = args.output_dir {
        cfg.display.backend = DisplayBackend::FrameDump;
        cfg.display.output_dir = Some(dir);
    }
    if args.headless {
        cfg.display.backend = DisplayBackend::Headless;
    }
    if let Some(window) = args.window {
        cfg.display.window_name = window;
    }
    if args.max_cycles.is_some() {
        cfg.max_cycles = args.max_cycles;
    }
    if args.fps.is_some() {
        cfg.fps = args.fps;
    }
    cfg.loop_playback |= args.loop_playback;
    cfg.annotation.draw_rejected |= args.draw_rejected;
    if let Some(key) = args.quit_key {
        cfg.quit_key = key;
    }
    if let Some(ms) = args.refresh_ms {
        cfg.refresh_interval = Duration::from_millis(ms);
    }
    if let Some(path) = &args.save_config {
        cfg.write_json(path)?;
        log::info!("configuration written to {}", path.display());
    }

    let controller = cfg.build_loop(KeyListener::stdin(cfg.quit_key))?;
    println!("Press '{}' then Enter to quit.", cfg.quit_key);
    let summary = controller
        .run()
        .map_err(|e| Failure::Runtime(Box::new(e)))?;

    if args.summary_json {
        let json = serde_json::to_string_pretty(&summary).map_err(|e| Failure::Runtime(e.into()))?;
        println!("{json}");
    } else {
        println!(
            "{} frames, {} markers in {} frames, {} invalid frames",
            summary.cycles, summary.markers, summary.frames_with_markers, summary.invalid_frames
        );
    }
    Ok(())
}

fn detect(args: DetectArgs) -> Result<(), Failure> {
    let mut cfg = load_config(args.config.as_ref())?;
    apply_dictionary_args(&mut cfg, args.dict);
    cfg.annotation.draw_rejected |= args.draw_rejected;
    let dict = cfg.resolve_dictionary()?;
    let detector: MarkerDetector = cfg.build_detector(dict)?;

    let (report, mut frame, result) =
        detect_file(&args.image, &detector).map_err(|e| Failure::Runtime(Box::new(e)))?;

    if let Some(path) = &args.output {
        Annotator::new(cfg.annotation.clone()).draw(&mut frame, &result);
        let img = rgb_from_color_frame(&frame)
            .ok_or_else(|| Failure::Runtime("annotated frame is malformed".into()))?;
        img.save(path).map_err(|e| Failure::Runtime(Box::new(e)))?;
        log::info!("annotated image written to {}", path.display());
    }

    match &args.report {
        Some(path) => report
            .write_json(path)
            .map_err(|e| Failure::Runtime(Box::new(e)))?,
        None => {
            let json =
                serde_json::to_string_pretty(&report).map_err(|e| Failure::Runtime(e.into()))?;
            println!("{json}");
        }
    }
    Ok(())
}

fn list_dictionaries(details: bool) {
    for name in BUILTIN_NAMES {
        let default = if name == DEFAULT_DICTIONARY {
            " (default)"
        } else {
            ""
        };
        if !details {
            println!("{name}{default}");
            continue;
        }
        if let Some(dict) = builtin_dictionary(name) {
            println!("{}", describe(&dict, default));
        }
    }
}

fn describe(dict: &Dictionary, suffix: &str) -> String {
    format!(
        "{}{suffix}: {}x{} bits, {} ids, corrects {} bits",
        dict.name,
        dict.marker_size,
        dict.marker_size,
        dict.len(),
        dict.max_correction_bits
    )
}

fn render(args: RenderArgs) -> Result<(), Failure> {
    let dict = builtin_dictionary(&args.dictionary).ok_or_else(|| {
        Failure::Config(format!("unknown dictionary {:?}", args.dictionary).into())
    })?;
    let marker = render_marker(&dict, args.id, args.cell_px).ok_or_else(|| {
        Failure::Config(
            format!(
                "id {} not in {} ({} ids)",
                args.id,
                dict.name,
                dict.len()
            )
            .into(),
        )
    })?;
    let img = luma_from_gray(&marker)
        .ok_or_else(|| Failure::Runtime("rendered marker is malformed".into()))?;
    img.save(&args.output)
        .map_err(|e| Failure::Runtime(Box::new(e)))?;
    println!("{} id {} -> {}", dict.name, args.id, args.output.display());
    Ok(())
}
