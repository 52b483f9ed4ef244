use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,

    pub notifier_enabled: bool,
    pub notifier_api_key: Option<String>,

    pub shared_queue_url: Option<String>,
    pub shared_queue_token: Option<String>,

    pub crawler_concurrency: usize,
    pub crawler_timeout: Duration,
    pub crawler_delay: Duration,
    pub crawler_max_pages: u32,
    pub crawler_respect_robots_txt: bool,
    pub crawler_user_agent: String,

    pub scan_frequency_daily_cron: String,
    pub scan_frequency_weekly_cron: String,
    pub scan_frequency_monthly_cron: String,

    pub max_concurrent_renderers: usize,
    pub renderer_script_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("PORT", "must be a valid u16"))?;

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let notifier_enabled = env::var("NOTIFIER_ENABLED")
            .map(|v| v == "true")
            .unwrap_or(false);
        let notifier_api_key = env::var("NOTIFIER_API_KEY").ok();

        let shared_queue_url = env::var("SHARED_QUEUE_URL").ok();
        let shared_queue_token = env::var("SHARED_QUEUE_TOKEN").ok();

        let crawler_concurrency = env::var("CRAWLER_CONCURRENCY")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("CRAWLER_CONCURRENCY", "must be a valid usize")
            })?;

        let crawler_timeout_ms = env::var("CRAWLER_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("CRAWLER_TIMEOUT_MS", "must be a valid u64")
            })?;

        let crawler_delay_ms = env::var("CRAWLER_DELAY_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("CRAWLER_DELAY_MS", "must be a valid u64"))?;

        let crawler_max_pages = env::var("CRAWLER_MAX_PAGES")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidValue("CRAWLER_MAX_PAGES", "must be a valid u32"))?;

        let crawler_respect_robots_txt = env::var("CRAWLER_RESPECT_ROBOTS_TXT")
            .map(|v| v != "false")
            .unwrap_or(true);

        let crawler_user_agent = env::var("CRAWLER_USER_AGENT")
            .unwrap_or_else(|_| "RankRiot Crawler/1.0 (+https://rankriot.app/bot)".to_string());

        let scan_frequency_daily_cron =
            env::var("SCAN_FREQUENCY_DAILY_CRON").unwrap_or_else(|_| "0 0 0 * * *".to_string());
        let scan_frequency_weekly_cron =
            env::var("SCAN_FREQUENCY_WEEKLY_CRON").unwrap_or_else(|_| "0 0 0 * * 0".to_string());
        let scan_frequency_monthly_cron =
            env::var("SCAN_FREQUENCY_MONTHLY_CRON").unwrap_or_else(|_| "0 0 0 1 * *".to_string());

        let max_concurrent_renderers = env::var("MAX_CONCURRENT_RENDERERS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("MAX_CONCURRENT_RENDERERS", "must be a valid usize")
            })?;

        let renderer_script_path = env::var("RENDERER_SCRIPT_PATH")
            .unwrap_or_else(|_| "/app/scripts/render-page.mjs".to_string());

        Ok(Config {
            port,
            database_url,
            notifier_enabled,
            notifier_api_key,
            shared_queue_url,
            shared_queue_token,
            crawler_concurrency,
            crawler_timeout: Duration::from_millis(crawler_timeout_ms),
            crawler_delay: Duration::from_millis(crawler_delay_ms),
            crawler_max_pages,
            crawler_respect_robots_txt,
            crawler_user_agent,
            scan_frequency_daily_cron,
            scan_frequency_weekly_cron,
            scan_frequency_monthly_cron,
            max_concurrent_renderers,
            renderer_script_path,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, &'static str),
}
