//! Telemetry initialization.
//!
//! Controlled by `VTMERGE_LOG`:
//! - unset or empty → no-op (tracing disabled, zero overhead)
//! - `"json"` → JSON spans/events to stderr
//! - anything else → human-readable events to stderr
//!
//! The event filter comes from `RUST_LOG` and defaults to `info`. The library
//! never calls [`init`]; only binaries do.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Environment variable selecting the output mode.
pub const LOG_ENV: &str = "VTMERGE_LOG";

/// Output mode selected by [`LOG_ENV`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogMode {
    /// No subscriber installed.
    Off,
    /// JSON lines on stderr.
    Json,
    /// Human-readable lines on stderr.
    Pretty,
}

impl LogMode {
    /// Interpret a raw `VTMERGE_LOG` value.
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Off,
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            Some(_) => Self::Pretty,
        }
    }
}

/// Initialize telemetry based on `VTMERGE_LOG`.
///
/// Installing a subscriber twice is not an error; the second call is ignored.
pub fn init() -> LogMode {
    let mode = LogMode::from_env_value(std::env::var(LOG_ENV).ok().as_deref());
    match mode {
        LogMode::Off => {}
        LogMode::Json => init_json(),
        LogMode::Pretty => init_pretty(),
    }
    mode
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// JSON spans/events to stderr via tracing-subscriber's JSON formatter.
fn init_json() {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE),
        )
        .try_init();
}

fn init_pretty() {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
