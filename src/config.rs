use clap::Parser;
use std::time::Duration;

/// Live sports scores service
#[derive(Parser, Debug, Clone)]
#[command(name = "frames-scores", version, about)]
pub struct Config {
    /// HTTP listen address for the read API
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// SportScore API base URL
    #[arg(
        long,
        env = "SPORTS_API_HOST",
        default_value = "https://sportscore1.p.rapidapi.com"
    )]
    pub sports_api_host: String,

    /// SportScore RapidAPI key
    #[arg(long, env = "SPORTS_API_KEY", default_value = "")]
    pub sports_api_key: String,

    /// Seconds between refresh cycles
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value = "60")]
    pub refresh_interval_secs: u64,

    /// Per-request HTTP timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Upper bound on one fetch within a refresh cycle, in seconds
    #[arg(long, env = "FETCH_DEADLINE_SECS", default_value = "45")]
    pub fetch_deadline_secs: u64,

    /// Time allowed for in-flight work to finish on shutdown, in milliseconds
    #[arg(long, env = "GRACEFUL_SHUTDOWN_MS", default_value = "10000")]
    pub graceful_shutdown_ms: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sports_api_key.trim().is_empty() {
            anyhow::bail!("SPORTS_API_KEY is required");
        }
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be positive");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("request_timeout_ms must be positive");
        }
        if self.fetch_deadline_secs == 0 {
            anyhow::bail!("fetch_deadline_secs must be positive");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_secs(self.fetch_deadline_secs)
    }

    pub fn graceful_shutdown(&self) -> Duration {
        Duration::from_millis(self.graceful_shutdown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["frames-scores"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = parse(&["--sports-api-key", "k"]);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(60));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.sports_api_host, "https://sportscore1.p.rapidapi.com");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_missing_key_and_zero_interval() {
        let mut cfg = parse(&["--sports-api-key", "k"]);
        cfg.sports_api_key = String::new();
        assert!(cfg.validate().is_err());

        let cfg = parse(&["--sports-api-key", "k", "--refresh-interval-secs", "0"]);
        assert!(cfg.validate().is_err());
    }
}
