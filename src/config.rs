use std::env;

use chrono::FixedOffset;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    /// All units of a deployment share one wall clock.
    pub clinic_utc_offset_minutes: i32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let run_migrations = env::var("RUN_MIGRATIONS")
            .map(|s| parse_flag(&s))
            .unwrap_or(false);
        let clinic_utc_offset_minutes = match env::var("CLINIC_UTC_OFFSET_MINUTES") {
            Ok(s) => s
                .trim()
                .parse::<i32>()
                .map_err(|e| anyhow::anyhow!("CLINIC_UTC_OFFSET_MINUTES: {e}"))?,
            Err(_) => 0,
        };

        let cfg = Self {
            database_url,
            bind_addr,
            db_max_connections,
            run_migrations,
            clinic_utc_offset_minutes,
        };
        cfg.clinic_offset()?;
        Ok(cfg)
    }

    pub fn clinic_offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60).ok_or_else(|| {
            anyhow::anyhow!(
                "CLINIC_UTC_OFFSET_MINUTES out of range: {}",
                self.clinic_utc_offset_minutes
            )
        })
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_offset(minutes: i32) -> Config {
        Config {
            database_url: "postgres://localhost/agenda".into(),
            bind_addr: "127.0.0.1:8080".into(),
            db_max_connections: 10,
            run_migrations: false,
            clinic_utc_offset_minutes: minutes,
        }
    }

    #[test_case::test_case("1", true)]
    #[test_case::test_case("TRUE", true)]
    #[test_case::test_case(" yes ", true)]
    #[test_case::test_case("0", false)]
    #[test_case::test_case("", false)]
    fn flags(input: &str, expected: bool) {
        assert_eq!(parse_flag(input), expected);
    }

    #[test]
    fn offset_is_built_from_minutes() {
        let offset = config_with_offset(-180).clinic_offset().unwrap();
        assert_eq!(offset.local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn offset_beyond_a_day_is_rejected() {
        assert!(config_with_offset(24 * 60).clinic_offset().is_err());
    }
}
