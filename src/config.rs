/// Configuration management for Agora
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub reports: ReportsConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Public base URL used in emailed links
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_secs: i64,
    pub reset_token_ttl_secs: i64,
    /// Emails that receive the admin role on sign-up (comma-separated)
    pub bootstrap_admin_emails: Vec<String>,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Report listing and live feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    pub default_list_limit: i64,
    pub max_list_limit: i64,
    pub feed_capacity: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            default_list_limit: 100,
            max_list_limit: 500,
            feed_capacity: 256,
        }
    }
}

impl ReportsConfig {
    /// Clamp a requested limit into the configured range
    pub fn clamp_limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_list_limit)
            .clamp(1, self.max_list_limit)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("AGORA_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("AGORA_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("AGORA_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let data_directory: PathBuf = env::var("AGORA_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("AGORA_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("agora.sqlite"));
        let max_connections = env::var("AGORA_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let jwt_secret = env::var("AGORA_JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;
        let session_ttl_secs = env::var("AGORA_SESSION_TTL_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86400);
        let reset_token_ttl_secs = env::var("AGORA_RESET_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);

        // Parse bootstrap admins from comma-separated list
        let bootstrap_admin_emails = env::var("AGORA_BOOTSTRAP_ADMIN_EMAILS")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<String>>();

        let email = if let Ok(smtp_url) = env::var("AGORA_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("AGORA_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let defaults = ReportsConfig::default();
        let reports = ReportsConfig {
            default_list_limit: env::var("AGORA_REPORTS_DEFAULT_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_list_limit),
            max_list_limit: env::var("AGORA_REPORTS_MAX_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_list_limit),
            feed_capacity: env::var("AGORA_REPORTS_FEED_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.feed_capacity),
        };

        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = env::var("AGORA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
                max_connections,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl_secs,
                reset_token_ttl_secs,
                bootstrap_admin_emails,
            },
            email,
            reports,
            logging: LoggingConfig { level, format },
        })
    }

    /// Configuration rooted at `data_directory`, for tests and tooling
    pub fn for_directory(data_directory: PathBuf, jwt_secret: &str) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3000,
                public_url: "http://localhost:3000".to_string(),
            },
            storage: StorageConfig {
                database: data_directory.join("agora.sqlite"),
                data_directory,
                max_connections: 5,
            },
            authentication: AuthConfig {
                jwt_secret: jwt_secret.to_string(),
                session_ttl_secs: 86400,
                reset_token_ttl_secs: 3600,
                bootstrap_admin_emails: Vec::new(),
            },
            email: None,
            reports: ReportsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.session_ttl_secs <= 0 || self.authentication.reset_token_ttl_secs <= 0
        {
            return Err(AppError::Validation(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        if self.reports.default_list_limit < 1
            || self.reports.max_list_limit < self.reports.default_list_limit
        {
            return Err(AppError::Validation(
                "Report list limits are inconsistent".to_string(),
            ));
        }

        if self.reports.feed_capacity == 0 {
            return Err(AppError::Validation(
                "Report feed capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether a sign-up email should start with the admin role
    pub fn is_bootstrap_admin(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.authentication
            .bootstrap_admin_emails
            .iter()
            .any(|e| *e == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_validate_rejects_short_secret() {
        let config = ServerConfig::for_directory("./data".into(), "short");
        assert!(config.validate().is_err());

        let config = ServerConfig::for_directory("./data".into(), SECRET);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_clamp_limit() {
        let reports = ReportsConfig::default();
        assert_eq!(reports.clamp_limit(None), 100);
        assert_eq!(reports.clamp_limit(Some(0)), 1);
        assert_eq!(reports.clamp_limit(Some(10_000)), 500);
    }

    #[test]
    fn test_bootstrap_admin_match_is_case_insensitive() {
        let mut config = ServerConfig::for_directory("./data".into(), SECRET);
        config.authentication.bootstrap_admin_emails = vec!["root@example.com".to_string()];

        assert!(config.is_bootstrap_admin(" Root@Example.com "));
        assert!(!config.is_bootstrap_admin("user@example.com"));
    }
}
