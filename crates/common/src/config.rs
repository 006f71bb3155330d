/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Dashboard API
    pub api_token: String,
    pub api_port: u16,

    // Alert scheduler
    pub alert_check_interval_secs: u64,
    pub indicator_cache_capacity: usize,

    // Collaborators. `None` selects the local fallback (SQLite bars, log notifier).
    pub market_data_url: Option<String>,
    pub notify_webhook_url: Option<String>,

    // Extra strategies merged into the built-in library
    pub strategy_config_path: Option<String>,
}

impl Config {
    pub const DEFAULT_API_PORT: u16 = 8080;
    pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
    pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let alert_check_interval_secs = optional_env("ALERT_CHECK_INTERVAL_SECS")
            .map(|v| {
                v.parse::<u64>().unwrap_or_else(|_| {
                    panic!("ALERT_CHECK_INTERVAL_SECS must be a whole number of seconds, got: '{v}'")
                })
            })
            .unwrap_or(Self::DEFAULT_CHECK_INTERVAL_SECS);
        if alert_check_interval_secs == 0 {
            panic!("ALERT_CHECK_INTERVAL_SECS must be greater than zero");
        }

        Config {
            database_url: required_env("DATABASE_URL"),
            api_token: required_env("DASHBOARD_TOKEN"),
            api_port: optional_env("API_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(Self::DEFAULT_API_PORT),
            alert_check_interval_secs,
            indicator_cache_capacity: optional_env("INDICATOR_CACHE_CAPACITY")
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(Self::DEFAULT_CACHE_CAPACITY),
            market_data_url: optional_env("MARKET_DATA_URL"),
            notify_webhook_url: optional_env("NOTIFY_WEBHOOK_URL"),
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH"),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
