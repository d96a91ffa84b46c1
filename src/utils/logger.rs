use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "stockpile=info";
const VERBOSE_DIRECTIVE: &str = "stockpile=debug,info";

/// How the binary wants its logs: format, verbosity and an optional filter
/// directive from `[logging]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub json: bool,
    pub verbose: bool,
    pub directive: Option<String>,
}

/// 決定過濾條件: RUST_LOG > 設定檔 directive > verbose 預設
pub fn filter_directive(options: &LogOptions, env: Option<&str>) -> String {
    if let Some(env) = env.map(str::trim).filter(|env| !env.is_empty()) {
        return env.to_string();
    }
    if let Some(directive) = options.directive.as_deref().filter(|d| !d.trim().is_empty()) {
        return directive.to_string();
    }
    if options.verbose {
        VERBOSE_DIRECTIVE.to_string()
    } else {
        DEFAULT_DIRECTIVE.to_string()
    }
}

fn build_filter(options: &LogOptions) -> EnvFilter {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(options, env.as_deref());
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("⚠️ Ignoring log filter '{}': {}", directive, e);
        EnvFilter::new(DEFAULT_DIRECTIVE)
    })
}

/// Install the global subscriber. Logs go to stderr so record output on
/// stdout stays pipeable.
pub fn init_logger(options: &LogOptions) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(build_filter(options));
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(options.verbose)
        .with_file(false)
        .with_line_number(false);

    if options.json {
        // 給 log 收集器用
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer.compact()).try_init()
    }
}
