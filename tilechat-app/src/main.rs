use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tilechat_common::observability::{LogFormat, init_logging};
use tilechat_config::{ChatConfig, ChatConfigLoader};
mod launch;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Terminal chat about tiles and tiling, answered by Gemini.
#[derive(Debug, Parser)]
#[command(name = "tilechat", version, about)]
struct Args {
    /// YAML config file; missing is fine when everything comes from the environment.
    #[arg(short, long, env = "TILECHAT_CONFIG", default_value = "tilechat.yaml")]
    config: PathBuf,

    /// Override the log encoding from the config file.
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,

    /// Start in dark mode for this run without saving the preference.
    #[arg(long, conflicts_with = "light")]
    dark: bool,

    /// Start in light mode for this run without saving the preference.
    #[arg(long)]
    light: bool,
}

impl Args {
    fn theme(&self) -> Option<bool> {
        match (self.dark, self.light) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1) Load config (env wins)
    let mut cfg: ChatConfig = ChatConfigLoader::new()
        .with_optional_file(&args.config)
        .load()
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(format) = args.log_format {
        cfg.logging.format = format.into();
    }

    // 2) Logging goes to a file; the terminal belongs to the UI
    let log_path = init_logging(cfg.logging.to_log_config())?;
    tracing::info!(
        log = %log_path.display(),
        config = %args.config.display(),
        model = %cfg.gemini.model,
        "tilechat starting"
    );

    // 3) Wire actors and run until /quit, Ctrl-C or Ctrl-Q
    launch::run(cfg, args.theme()).await
}
