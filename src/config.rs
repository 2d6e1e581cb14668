use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Largest accepted interval or window: one year.
pub const MAX_SECS: u64 = 365 * 24 * 3600;

/// Intervals of the background jobs, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub order_sweep_interval_secs: u64,
    /// Open orders older than this are auto-cancelled.
    pub order_staleness_secs: u64,
    pub recommendation_refresh_interval_secs: u64,
    pub health_refresh_interval_secs: u64,
    /// Upper bound on any single catalog/order/recommendation call.
    pub call_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            order_sweep_interval_secs: 60,
            order_staleness_secs: 3600,
            recommendation_refresh_interval_secs: 3600,
            health_refresh_interval_secs: 6 * 3600,
            call_timeout_secs: 10,
        }
    }
}

impl SchedulerConfig {
    pub fn order_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.order_sweep_interval_secs)
    }

    /// Saturates instead of wrapping; the sweep rejects windows it cannot apply.
    pub fn order_staleness(&self) -> time::Duration {
        i64::try_from(self.order_staleness_secs)
            .map(time::Duration::seconds)
            .unwrap_or(time::Duration::MAX)
    }

    pub fn recommendation_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.recommendation_refresh_interval_secs)
    }

    pub fn health_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.health_refresh_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub scheduler: SchedulerConfig,
    /// JSON file overriding the built-in nutrient rules.
    pub health_rules_path: Option<String>,
}

fn secs_var(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(v) => {
            let secs = v
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("{name}={v:?}: {e}"))?;
            anyhow::ensure!(secs > 0, "{name} must be positive");
            anyhow::ensure!(secs <= MAX_SECS, "{name} must be at most {MAX_SECS}, got {secs}");
            Ok(secs)
        }
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "cafebot".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "cafebot-users".into()),
        };

        let d = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            order_sweep_interval_secs: secs_var("ORDER_SWEEP_INTERVAL_SECS", d.order_sweep_interval_secs)?,
            order_staleness_secs: secs_var("ORDER_STALENESS_SECS", d.order_staleness_secs)?,
            recommendation_refresh_interval_secs: secs_var(
                "RECOMMENDATION_REFRESH_INTERVAL_SECS",
                d.recommendation_refresh_interval_secs,
            )?,
            health_refresh_interval_secs: secs_var(
                "HEALTH_REFRESH_INTERVAL_SECS",
                d.health_refresh_interval_secs,
            )?,
            call_timeout_secs: secs_var("CALL_TIMEOUT_SECS", d.call_timeout_secs)?,
        };

        let health_rules_path = std::env::var("HEALTH_RULES_PATH")
            .ok()
            .filter(|p| !p.is_empty());

        Ok(Self {
            database_url,
            jwt,
            scheduler,
            health_rules_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_never_wraps_negative() {
        let cfg = SchedulerConfig {
            order_staleness_secs: u64::MAX,
            ..SchedulerConfig::default()
        };
        assert!(cfg.order_staleness().is_positive());
        assert_eq!(SchedulerConfig::default().order_staleness(), time::Duration::hours(1));
    }

    #[test]
    fn reads_environment_with_defaults() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/cafebot");
        std::env::set_var("JWT_SECRET", "s3cret");
        std::env::set_var("ORDER_STALENESS_SECS", "1800");
        std::env::remove_var("ORDER_SWEEP_INTERVAL_SECS");

        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.jwt.secret, "s3cret");
        assert_eq!(cfg.scheduler.order_staleness(), time::Duration::minutes(30));
        assert_eq!(cfg.scheduler.order_sweep_interval(), Duration::from_secs(60));

        std::env::set_var("ORDER_STALENESS_SECS", "0");
        assert!(AppConfig::from_env().is_err());
        std::env::set_var("ORDER_STALENESS_SECS", "soon");
        assert!(AppConfig::from_env().is_err());
        std::env::set_var("ORDER_STALENESS_SECS", u64::MAX.to_string());
        assert!(AppConfig::from_env().is_err());
        std::env::set_var("ORDER_STALENESS_SECS", "1000000000000");
        assert!(AppConfig::from_env().is_err());
        std::env::set_var("ORDER_STALENESS_SECS", MAX_SECS.to_string());
        assert!(AppConfig::from_env().is_ok());
        std::env::set_var("ORDER_STALENESS_SECS", (MAX_SECS + 1).to_string());
        assert!(AppConfig::from_env().is_err());
        std::env::remove_var("ORDER_STALENESS_SECS");
    }
}
