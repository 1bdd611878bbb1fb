use std::default::Default;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use lnpoker_game::countdown::AUTO_FOLD_DELAY_SECS;

/// Load settings from the layered configuration files and the environment.
///
/// `extra` names one more file, merged after the standard ones and before
/// the environment.
pub fn load(extra: Option<&Path>) -> Result<Settings, ConfigError> {
    let env = env::var(RUN_MODE_ENV).unwrap_or_else(|_| "development".into());
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CFG_PATH).required(false))
        .add_source(File::with_name(&format!("config/{}", env)).required(false))
        .add_source(File::with_name(LOCAL_CFG_PATH).required(false));
    if let Some(path) = extra {
        builder = builder.add_source(File::from(path));
    }
    builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

const DEFAULT_CFG_PATH: &str = "config/default";
const LOCAL_CFG_PATH: &str = "config/local";
const RUN_MODE_ENV: &str = "LNPOKER_RUN_MODE";
const ENV_PREFIX: &str = "lnpoker";

/// Shortest polling or tick period, in milliseconds.
pub const MIN_PERIOD_MS: u64 = 1;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: Logging,
    pub runtime: Runtime,
    pub backend: Backend,
    pub account: Account,
    pub table: TableSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    /// Log to files in this directory instead of stderr.
    pub directory: Option<PathBuf>,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: "info".into(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Runtime {
    pub threaded: bool,
    pub worker_threads: usize,
    pub thread_name: String,
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime {
            threaded: false,
            worker_threads: num_cpus::get_physical(),
            thread_name: "lnpoker-worker".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Backend {
    /// Where player moves are posted.
    pub action_url: String,
    /// Base of the deposit and presence endpoints.
    pub app_url: String,
    /// REST root of the document database.
    pub database_url: String,
    pub project_id: String,
    pub api_key: Option<String>,
    pub poll_interval_ms: u64,
}

impl Backend {
    /// Never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_PERIOD_MS))
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend {
            action_url: "https://us-central1-ln-pkr.cloudfunctions.net/action".into(),
            app_url: "http://127.0.0.1:8080/app/poker".into(),
            database_url: "https://firestore.googleapis.com/v1".into(),
            project_id: "ln-pkr".into(),
            api_key: None,
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Account {
    /// The client-local storage file holding the generated identity.
    pub storage_path: PathBuf,
    /// Use this account instead of the stored one.
    pub account_id: Option<String>,
    /// The chat bot user this account was handed out to; needed for
    /// deposits and presence.
    pub bot_id: Option<String>,
    /// Queried once when the account document is first created.
    pub ip_echo_url: Option<String>,
    pub user_agent: String,
    pub referrer: String,
}

impl Default for Account {
    fn default() -> Self {
        Account {
            storage_path: PathBuf::from(".lnpoker/storage"),
            account_id: None,
            bot_id: None,
            ip_echo_url: Some("https://httpbin.org/ip".into()),
            user_agent: format!("lnpoker/{}", lnpoker_game::CLIENT_VERSION),
            referrer: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    /// Length of the auto-fold window the countdown is drawn against.
    pub fold_delay_secs: i64,
    pub tick_ms: u64,
    pub lobby_limit: usize,
}

impl TableSettings {
    pub fn fold_delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.fold_delay_secs)
    }

    /// Never zero.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(MIN_PERIOD_MS))
    }
}

impl Default for TableSettings {
    fn default() -> Self {
        TableSettings {
            fold_delay_secs: AUTO_FOLD_DELAY_SECS,
            tick_ms: 750,
            lobby_limit: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_conventions() {
        let s = Settings::default();
        assert_eq!(s.table.fold_delay_secs, 25);
        assert_eq!(s.table.tick(), Duration::from_millis(750));
        assert_eq!(s.table.lobby_limit, 20);
        assert!(!s.runtime.threaded);
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn partial_sections_fill_from_defaults() {
        let s: Settings = Config::builder()
            .add_source(File::from_str(
                "[table]\ntick_ms = 500\n[backend]\nproject_id = \"test\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(s.table.tick_ms, 500);
        assert_eq!(s.table.fold_delay_secs, 25);
        assert_eq!(s.backend.project_id, "test");
        assert_eq!(s.backend.poll_interval_ms, 1000);
    }

    #[test]
    fn zero_poll_interval_is_raised_to_the_minimum() {
        let mut s = Settings::default();
        s.backend.poll_interval_ms = 0;
        assert_eq!(s.backend.poll_interval(), Duration::from_millis(MIN_PERIOD_MS));
    }

    #[test]
    fn zero_tick_is_raised_to_the_minimum() {
        let s: Settings = Config::builder()
            .add_source(File::from_str("[table]\ntick_ms = 0\n", config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(s.table.tick_ms, 0);
        assert_eq!(s.table.tick(), Duration::from_millis(MIN_PERIOD_MS));
    }
}
