use std::str::FromStr;

use crate::db::DatabaseUrlOptions;
use crate::domain::order::CancellationPolicy;

// ============================================================================
// Configuration - environment variables, optionally from a .env file
// ============================================================================
//
//   HTTP_HOST                  bind host (0.0.0.0)
//   HTTP_PORT                  bind port (8080)
//   DATABASE_URL               connection string; JDBC_DATABASE_URL as fallback
//                              unset: in-memory store
//   DATABASE_USERNAME          overrides the user in the URL
//   DATABASE_PASSWORD          overrides the password in the URL
//   DATABASE_SSLMODE           sslmode added when absent (require);
//                              "disable" or empty adds none
//   DATABASE_MAX_CONNECTIONS   pool size (5)
//   ORDER_CANCELLATION         retain | delete (retain)
//
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub url: String,
    pub url_options: DatabaseUrlOptions,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub http: HttpSettings,
    /// `None` runs the service on the in-memory store
    pub database: Option<DatabaseSettings>,
    pub cancellation: CancellationPolicy,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string());

        let http = HttpSettings {
            host: var("HTTP_HOST")
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("HTTP_PORT", var("HTTP_PORT"), 8080)?,
        };

        let url = var("DATABASE_URL")
            .filter(|u| !u.is_empty())
            .or_else(|| var("JDBC_DATABASE_URL").filter(|u| !u.is_empty()));

        let database = match url {
            None => None,
            Some(url) => {
                let default_sslmode = match var("DATABASE_SSLMODE") {
                    None => Some("require".to_string()),
                    Some(mode) if mode.is_empty() || mode.eq_ignore_ascii_case("disable") => None,
                    Some(mode) => Some(mode),
                };
                let max_connections =
                    parse_or("DATABASE_MAX_CONNECTIONS", var("DATABASE_MAX_CONNECTIONS"), 5)?;
                if max_connections == 0 {
                    return Err(ConfigError::Invalid {
                        name: "DATABASE_MAX_CONNECTIONS",
                        value: "0".to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }

                Some(DatabaseSettings {
                    url,
                    url_options: DatabaseUrlOptions {
                        username: var("DATABASE_USERNAME"),
                        password: var("DATABASE_PASSWORD"),
                        default_sslmode,
                    },
                    max_connections,
                })
            }
        };

        let cancellation = parse_or(
            "ORDER_CANCELLATION",
            var("ORDER_CANCELLATION"),
            CancellationPolicy::default(),
        )?;

        Ok(Self { http, database, cancellation })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value: v,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.http, HttpSettings { host: "0.0.0.0".to_string(), port: 8080 });
        assert_eq!(cfg.database, None);
        assert_eq!(cfg.cancellation, CancellationPolicy::Retain);
    }

    #[test]
    fn test_database_settings() {
        let cfg = config(&[
            ("JDBC_DATABASE_URL", "jdbc:postgresql://db/market"),
            ("DATABASE_USERNAME", "svc"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("DATABASE_SSLMODE", "disable"),
        ])
        .unwrap();

        let db = cfg.database.unwrap();
        assert_eq!(db.url, "jdbc:postgresql://db/market");
        assert_eq!(db.url_options.username.as_deref(), Some("svc"));
        assert_eq!(db.url_options.default_sslmode, None);
        assert_eq!(db.max_connections, 12);
    }

    #[test]
    fn test_database_url_takes_precedence() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://primary/market"),
            ("JDBC_DATABASE_URL", "jdbc:postgresql://fallback/market"),
        ])
        .unwrap();
        let db = cfg.database.unwrap();
        assert_eq!(db.url, "postgres://primary/market");
        assert_eq!(db.url_options.default_sslmode.as_deref(), Some("require"));
    }

    #[test]
    fn test_cancellation_policy() {
        let cfg = config(&[("ORDER_CANCELLATION", "DELETE")]).unwrap();
        assert_eq!(cfg.cancellation, CancellationPolicy::Delete);

        let err = config(&[("ORDER_CANCELLATION", "archive")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "ORDER_CANCELLATION", .. }));
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(config(&[("HTTP_PORT", "eighty")]).is_err());
        assert!(config(&[("DATABASE_URL", "postgres://db/market"), ("DATABASE_MAX_CONNECTIONS", "0")]).is_err());
    }
}
