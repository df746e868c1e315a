use isnad_scanner::ScannerConfig;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// SQLite path; empty means the in-memory backend.
    pub db_path: String,
    /// ISNAD_PRODUCTION=1 hides the built-in route listing.
    pub production: bool,
    /// Allowed CORS origins; "*" allows any.
    pub allowed_origins: Vec<String>,
    pub scanner: ScannerConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            db_path: env::var("ISNAD_DB").unwrap_or_default(),
            production: env::var("ISNAD_PRODUCTION")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            scanner: ScannerConfig::from_env(),
        }
    }
}
