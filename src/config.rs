use std::path::PathBuf;

use clap::Parser;

/// Startup configuration. Read once, never mutated.
#[derive(Parser, Debug, Clone)]
#[command(name = "signal-cli-rest-api", version, about = "REST API in front of signal-cli")]
pub struct Config {
    /// Config directory where signal-cli config is stored
    #[arg(long, env = "SIGNAL_CLI_CONFIG", default_value = "/root/.local/share/signal-cli/")]
    pub signal_cli_config: PathBuf,

    /// Attachment tmp directory
    #[arg(long, env = "SIGNAL_ATTACHMENT_TMP_DIR", default_value = "/tmp/")]
    pub attachment_tmp_dir: PathBuf,

    /// signal-cli executable
    #[arg(long, env = "SIGNAL_CLI_BIN", default_value = "signal-cli")]
    pub signal_cli_bin: PathBuf,

    /// Port to listen on
    #[arg(long, env = "SIGNAL_API_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Require `Authorization: Bearer <key>` on every request
    #[arg(long, env = "SIGNAL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}
