use crate::error::PatroError;
use crate::patro::config::SourceConfig;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Anything that can hand back the raw page for one BS month.
pub trait MonthSource {
    fn fetch(&self, lunar_year: i32, month_name: &str) -> Result<String, PatroError>;
}

pub struct HttpMonthFetcher {
    client: Client,
    base_url: String,
    user_agent: String,
    pacing: Duration,
}

impl HttpMonthFetcher {
    pub fn from_config(cfg: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            user_agent: cfg.user_agent.clone(),
            pacing: Duration::from_millis(cfg.pacing_ms),
        })
    }
}

impl MonthSource for HttpMonthFetcher {
    fn fetch(&self, lunar_year: i32, month_name: &str) -> Result<String, PatroError> {
        // The source throttles bursts; every request waits first.
        thread::sleep(self.pacing);

        let fetch_err = |reason: String| PatroError::Fetch {
            year: lunar_year,
            month: month_name.to_string(),
            reason,
        };
        let year = lunar_year.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("year", year.as_str()), ("month", month_name)])
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .map_err(|err| fetch_err(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PatroError::HttpStatus {
                year: lunar_year,
                month: month_name.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().map_err(|err| fetch_err(err.to_string()))?;
        debug!(lunar_year, month_name, bytes = body.len(), "fetched month page");
        Ok(body)
    }
}

/// Bounded retry: `max_attempts` tries in total with a fixed pause between
/// them. Only transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// `on_retry` sees the failed attempt number and its error before the
    /// pause.
    pub fn run<T, F, R>(&self, mut op: F, mut on_retry: R) -> Result<T, PatroError>
    where
        F: FnMut(u32) -> Result<T, PatroError>,
        R: FnMut(u32, &PatroError),
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    on_retry(attempt, &err);
                    thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
