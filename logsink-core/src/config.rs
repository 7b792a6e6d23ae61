use std::sync::LazyLock;

use derive_from_env::FromEnv;

/// Process-wide defaults, read once from `LOGSINK_*` environment variables.
#[derive(FromEnv)]
#[from_env(prefix = "LOGSINK")]
#[allow(non_snake_case)]
pub struct LogsinkConfig {
    /// strftime pattern used to synthesize log file names.
    #[from_env(default = "%Y%m%d")]
    pub FILE_NAME_PATTERN: String,
    #[from_env(default = "err")]
    pub STD_STREAM: String,
    #[from_env(default = "/usr/sbin/sendmail")]
    pub SENDMAIL_PATH: String,
}

pub static LOGSINK_CONFIG: LazyLock<LogsinkConfig> =
    LazyLock::new(|| LogsinkConfig::from_env().unwrap());

#[test]
fn test_config_defaults() {
    // Only meaningful when the variables are unset, which is the case under `cargo test`.
    if std::env::var_os("LOGSINK_FILE_NAME_PATTERN").is_none() {
        assert_eq!(LOGSINK_CONFIG.FILE_NAME_PATTERN, "%Y%m%d");
    }
    if std::env::var_os("LOGSINK_STD_STREAM").is_none() {
        assert_eq!(LOGSINK_CONFIG.STD_STREAM, "err");
    }
}
