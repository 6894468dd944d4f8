use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Runtime settings. Every option can also come from the environment
/// (a `.env` file is honoured by the binary).
#[derive(Debug, Clone, Args)]
pub struct Settings {
    #[arg(long, env = "APP_NAME", default_value = "newsai-backend")]
    pub app_name: String,

    #[arg(long, env = "APP_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub app_version: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Storage backend: sqlite or memory
    #[arg(long, env = "STORAGE", default_value = "sqlite")]
    pub storage: String,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://newsai.db")]
    pub database_url: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    #[arg(long, env = "REQUEST_ID_HEADER", default_value = "X-Request-ID")]
    pub request_id_header: String,

    #[arg(long, env = "LOG_MAX_BODY_BYTES", default_value_t = 8192)]
    pub log_max_body_bytes: usize,

    #[arg(
        long,
        env = "LOG_REQUEST_HEADERS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub log_request_headers: bool,

    #[arg(
        long,
        env = "LOG_RESPONSE_HEADERS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub log_response_headers: bool,

    /// Comma separated; CORS is off when empty
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    #[arg(
        long,
        env = "CORS_ALLOW_CREDENTIALS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub cors_allow_credentials: bool,

    /// `*` mirrors the request
    #[arg(long, env = "CORS_ALLOW_METHODS", value_delimiter = ',', default_value = "*")]
    pub cors_allow_methods: Vec<String>,

    /// `*` mirrors the request
    #[arg(long, env = "CORS_ALLOW_HEADERS", value_delimiter = ',', default_value = "*")]
    pub cors_allow_headers: Vec<String>,

    #[arg(long, env = "SESSION_COOKIE_NAME", default_value = "sid")]
    pub session_cookie_name: String,

    #[arg(long, env = "SESSION_EXPIRES_MINUTES", default_value_t = 60 * 24)]
    pub session_expires_minutes: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "newsai-backend".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            storage: "sqlite".to_string(),
            database_url: "sqlite://newsai.db".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            request_id_header: "X-Request-ID".to_string(),
            log_max_body_bytes: 8192,
            log_request_headers: true,
            log_response_headers: true,
            cors_origins: Vec::new(),
            cors_allow_credentials: true,
            cors_allow_methods: vec!["*".to_string()],
            cors_allow_headers: vec!["*".to_string()],
            session_cookie_name: "sid".to_string(),
            session_expires_minutes: 60 * 24,
        }
    }
}

impl Settings {
    /// Session lifetime, never shorter than a minute.
    pub fn session_ttl_seconds(&self) -> i64 {
        (self.session_expires_minutes * 60).max(60)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let parsed = Harness::parse_from(["newsai"]).settings;
        let defaults = Settings::default();
        assert_eq!(parsed.port, defaults.port);
        assert_eq!(parsed.request_id_header, defaults.request_id_header);
        assert_eq!(parsed.cors_allow_methods, defaults.cors_allow_methods);
        assert!(parsed.cors_origins.is_empty());
        assert!(parsed.log_request_headers);
    }

    #[test]
    fn test_cors_origins_are_comma_separated() {
        let parsed = Harness::parse_from([
            "newsai",
            "--cors-origins",
            "http://localhost:3000,https://example.com",
            "--log-request-headers",
            "false",
        ])
        .settings;
        assert_eq!(
            parsed.cors_origins,
            vec!["http://localhost:3000".to_string(), "https://example.com".to_string()]
        );
        assert!(!parsed.log_request_headers);
    }

    #[test]
    fn test_session_ttl_has_floor() {
        let mut settings = Settings::default();
        assert_eq!(settings.session_ttl_seconds(), 86_400);
        settings.session_expires_minutes = 0;
        assert_eq!(settings.session_ttl_seconds(), 60);
    }
}
