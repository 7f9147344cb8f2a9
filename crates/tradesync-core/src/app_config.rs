use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Destination sheet IDs, all optional: an entity with no configured sheet is
/// simply not syncable and its trigger route rejects with a config error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetIds {
    pub schedules_active: Option<i64>,
    pub schedules_archived: Option<i64>,
    pub quotes: Option<i64>,
    pub leads: Option<i64>,
    pub cost_centers_active: Option<i64>,
    pub cost_centers_archived: Option<i64>,
    pub scan_active: Option<i64>,
    pub scan_archived: Option<i64>,
    pub task_tracker: Option<i64>,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub smartsheet_access_token: String,
    pub simpro_base_url: String,
    pub simpro_api_key: String,
    pub http_timeout_secs: u64,
    pub simpro_max_retries: u32,
    pub simpro_retry_backoff_ms: u64,
    pub schedule_window_days: i64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub sheets: SheetIds,
    pub scan_enabled: bool,
    pub scan_cron: String,
    /// Accepted bearer tokens for the protected routes. Empty means auth is
    /// left to the server's environment policy.
    pub api_keys: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("smartsheet_access_token", &"[redacted]")
            .field("simpro_base_url", &self.simpro_base_url)
            .field("simpro_api_key", &"[redacted]")
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("simpro_max_retries", &self.simpro_max_retries)
            .field("simpro_retry_backoff_ms", &self.simpro_retry_backoff_ms)
            .field("schedule_window_days", &self.schedule_window_days)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("sheets", &self.sheets)
            .field("scan_enabled", &self.scan_enabled)
            .field("scan_cron", &self.scan_cron)
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .finish()
    }
}
