//! Stderr logger for the live loop.
//!
//! Lines look like `[   1.234s  INFO arucam] message`. The level can be set
//! per crate or module with a spec such as `info,arucam_aruco=warn`, which
//! keeps per-frame detector chatter out of an otherwise verbose run.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Default level plus `target prefix → level` overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSpec {
    pub default: LevelFilter,
    pub overrides: Vec<(String, LevelFilter)>,
}

impl LogSpec {
    pub fn level(default: LevelFilter) -> Self {
        Self {
            default,
            overrides: Vec::new(),
        }
    }

    /// Parse `LEVEL[,target=LEVEL]*`. Any part may be omitted, so
    /// `arucam_aruco=debug` alone keeps `info` as the default.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut out = Self::level(LevelFilter::Info);
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('=') {
                Some((target, level)) => {
                    out.overrides
                        .push((target.trim().to_string(), level.trim().parse().ok()?));
                }
                None => out.default = part.parse().ok()?,
            }
        }
        // Longest prefix first so the most specific override wins.
        out.overrides.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Some(out)
    }

    pub fn level_for(&self, target: &str) -> LevelFilter {
        self.overrides
            .iter()
            .find(|(prefix, _)| {
                target == prefix
                    || target
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            })
            .map_or(self.default, |(_, level)| *level)
    }

    fn max_level(&self) -> LevelFilter {
        self.overrides
            .iter()
            .map(|(_, l)| *l)
            .fold(self.default, Ord::max)
    }
}

struct StderrLogger {
    spec: LogSpec,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.spec.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let crate_name = record.target().split("::").next().unwrap_or("");
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {:>5} {}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            crate_name,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. Later calls are no-ops.
pub fn init_with_spec(spec: LogSpec) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let max = spec.max_level();
    let logger = LOGGER.get_or_init(|| StderrLogger {
        spec,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(max);
    Ok(())
}

/// Install the stderr logger with one level for every target.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    init_with_spec(LogSpec::level(level))
}

/// Install a `tracing` subscriber; `RUST_LOG` overrides the default `info`
/// filter. `log` records are forwarded by the subscriber's log bridge.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
