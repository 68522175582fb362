use std::sync::Once;

/// Filter used when neither the config nor `RUST_LOG` provides one.
///
/// wgpu and naga are chatty at `info`, so they only report warnings.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "debug" or
/// "scene_renderer=trace,wgpu_core=warn").
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.env_filter.or_else(|| std::env::var("RUST_LOG").ok()) {
            Some(filter) => builder.parse_filters(&filter),
            None => builder.parse_filters(DEFAULT_FILTER),
        };

        builder.write_style(config.write_style);
        builder.init();

        log::debug!("logging initialized");
    });
}
