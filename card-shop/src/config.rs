//! Card shop configuration

use crate::services::ShopRules;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Gateway checkout endpoint used when `PAY_URL` is not set
pub const DEFAULT_PAY_URL: &str = "https://credit.linux.do/epay/pay/submit.php";

/// Upper bound for the reservation, payment and sweep durations (30 days)
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Card shop configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL (`sqlite:path/to/shop.db`)
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Public origin used for gateway notify/return URLs
    pub public_base_url: String,
    /// Gateway merchant id (`pid`)
    pub merchant_id: String,
    /// Gateway signing key
    pub merchant_key: String,
    /// Gateway checkout endpoint
    pub pay_url: String,
    /// Lowercased usernames allowed into `/api/admin`
    pub admin_users: Vec<String>,
    /// How long a reservation blocks a card from other buyers
    pub reservation_window_secs: u64,
    /// How long a pending order waits for payment before it is cancelled
    pub payment_timeout_secs: u64,
    /// Background sweeper period
    pub sweep_interval_secs: u64,
    /// Permit checkout without a session
    pub allow_guest_checkout: bool,
    /// SQLite pool size
    pub db_max_connections: u32,
    /// Tracing level when `RUST_LOG` is unset
    pub log_level: String,
    /// Daily rolling log directory (stdout only when absent)
    pub log_dir: Option<String>,
}

impl Config {
    /// Require a secret: must be set and non-empty outside development.
    fn require_secret(
        lookup: &impl Fn(&str) -> Option<String>,
        name: &str,
        environment: &str,
    ) -> Result<String, BoxError> {
        let val = match lookup(name) {
            Some(v) => v,
            None => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BoxError> {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".into());
        let http_port = parse_or(&lookup, "HTTP_PORT", 8080)?;

        let config = Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:data/card-shop.db".into()),
            http_port,
            public_base_url: lookup("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{http_port}")),
            merchant_id: Self::require_secret(&lookup, "MERCHANT_ID", &environment)?,
            merchant_key: Self::require_secret(&lookup, "MERCHANT_KEY", &environment)?,
            pay_url: lookup("PAY_URL").unwrap_or_else(|| DEFAULT_PAY_URL.into()),
            admin_users: lookup("ADMIN_USERS")
                .map(|raw| parse_admin_users(&raw))
                .unwrap_or_default(),
            reservation_window_secs: parse_or(&lookup, "RESERVATION_WINDOW_SECS", 60)?,
            payment_timeout_secs: parse_or(&lookup, "PAYMENT_TIMEOUT_SECS", 300)?,
            sweep_interval_secs: parse_or(&lookup, "SWEEP_INTERVAL_SECS", 60)?,
            allow_guest_checkout: parse_or(&lookup, "ALLOW_GUEST_CHECKOUT", true)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: lookup("LOG_DIR").filter(|s| !s.is_empty()),
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BoxError> {
        for (name, secs) in [
            ("RESERVATION_WINDOW_SECS", self.reservation_window_secs),
            ("PAYMENT_TIMEOUT_SECS", self.payment_timeout_secs),
            ("SWEEP_INTERVAL_SECS", self.sweep_interval_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(format!("{name} ({secs}) exceeds {MAX_DURATION_SECS} seconds").into());
            }
        }
        if self.reservation_window_secs == 0 {
            return Err("RESERVATION_WINDOW_SECS must be positive".into());
        }
        if self.payment_timeout_secs < self.reservation_window_secs {
            return Err(format!(
                "PAYMENT_TIMEOUT_SECS ({}) must not be shorter than RESERVATION_WINDOW_SECS ({})",
                self.payment_timeout_secs, self.reservation_window_secs
            )
            .into());
        }
        if self.sweep_interval_secs == 0 {
            return Err("SWEEP_INTERVAL_SECS must be positive".into());
        }
        if self.db_max_connections == 0 {
            return Err("DB_MAX_CONNECTIONS must be positive".into());
        }
        Ok(())
    }

    /// Checkout and expiry rules derived from this configuration
    pub fn rules(&self) -> ShopRules {
        ShopRules {
            reservation_window_ms: secs_to_millis(self.reservation_window_secs),
            payment_timeout_ms: secs_to_millis(self.payment_timeout_secs),
            allow_guest_checkout: self.allow_guest_checkout,
        }
    }

    pub fn is_admin(&self, username: &str) -> bool {
        let username = username.to_lowercase();
        self.admin_users.iter().any(|admin| *admin == username)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, BoxError>
where
    T: std::str::FromStr,
{
    match lookup(name).filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{name} has invalid value: {raw}").into()),
        None => Ok(default),
    }
}

/// Saturates instead of wrapping for values `validate` would reject
fn secs_to_millis(secs: u64) -> i64 {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| secs.checked_mul(1000))
        .unwrap_or(i64::MAX)
}

fn parse_admin_users(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, BoxError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_in_development() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.environment, "development");
        assert_eq!(config.public_base_url, "http://localhost:8080");
        assert_eq!(config.pay_url, DEFAULT_PAY_URL);
        assert_eq!(config.merchant_key, "dev-MERCHANT_KEY-not-for-production");
        assert!(config.allow_guest_checkout);

        let rules = config.rules();
        assert_eq!(rules.reservation_window_ms, 60_000);
        assert_eq!(rules.payment_timeout_ms, 300_000);
    }

    #[test]
    fn test_production_requires_secrets() {
        let err = config_from(&[("ENVIRONMENT", "production")]).unwrap_err();
        assert!(err.to_string().contains("MERCHANT_ID"));

        let config = config_from(&[
            ("ENVIRONMENT", "production"),
            ("MERCHANT_ID", "1001"),
            ("MERCHANT_KEY", "secret"),
            ("PUBLIC_BASE_URL", "https://shop.example/"),
        ])
        .unwrap();
        assert_eq!(config.merchant_id, "1001");
        assert_eq!(config.public_base_url, "https://shop.example");
    }

    #[test]
    fn test_payment_timeout_must_cover_reservation() {
        let err = config_from(&[
            ("RESERVATION_WINDOW_SECS", "600"),
            ("PAYMENT_TIMEOUT_SECS", "300"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("PAYMENT_TIMEOUT_SECS"));
    }

    #[test]
    fn test_invalid_number() {
        let err = config_from(&[("HTTP_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("HTTP_PORT"));
    }

    #[test]
    fn test_admin_users_case_insensitive() {
        let config = config_from(&[("ADMIN_USERS", " Alice, bob ,,")]).unwrap();
        assert_eq!(config.admin_users, vec!["alice", "bob"]);
        assert!(config.is_admin("ALICE"));
        assert!(config.is_admin("bob"));
        assert!(!config.is_admin("carol"));
    }

    #[test]
    fn test_durations_are_bounded() {
        let err = config_from(&[("PAYMENT_TIMEOUT_SECS", "18446744073709551615")]).unwrap_err();
        assert!(err.to_string().contains("PAYMENT_TIMEOUT_SECS"));

        let err = config_from(&[("SWEEP_INTERVAL_SECS", "2592001")]).unwrap_err();
        assert!(err.to_string().contains("SWEEP_INTERVAL_SECS"));

        let config = config_from(&[
            ("RESERVATION_WINDOW_SECS", "2592000"),
            ("PAYMENT_TIMEOUT_SECS", "2592000"),
        ])
        .unwrap();
        assert_eq!(config.rules().payment_timeout_ms, 2_592_000_000);
    }

    #[test]
    fn test_rules_saturate_unvalidated_values() {
        let mut config = config_from(&[]).unwrap();
        config.reservation_window_secs = u64::MAX;
        config.payment_timeout_secs = u64::MAX / 1000 + 1;
        let rules = config.rules();
        assert_eq!(rules.reservation_window_ms, i64::MAX);
        assert_eq!(rules.payment_timeout_ms, i64::MAX);
        assert!(config.validate().is_err());
    }
}
