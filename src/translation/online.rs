/*!
 * Online translation provider: credential check, time bound and rate limits
 * around a `TextTranslator`.
 */

use chrono::{Local, NaiveDate};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{ProviderError, TranslationError};
use crate::providers::TextTranslator;

/// Default online call budget
pub const DEFAULT_ONLINE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct RateState {
    last_call: Option<Instant>,
    day: NaiveDate,
    count_today: u32,
}

/// Minimum spacing between calls plus an optional daily cap
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    max_per_day: Option<u32>,
    state: Mutex<RateState>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, max_per_day: Option<u32>) -> Self {
        Self {
            min_interval,
            max_per_day,
            state: Mutex::new(RateState {
                last_call: None,
                day: Local::now().date_naive(),
                count_today: 0,
            }),
        }
    }

    /// No spacing, no cap
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, None)
    }

    /// Fail if a call now would break either limit
    pub fn check(&self) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        let today = Local::now().date_naive();
        if state.day != today {
            state.day = today;
            state.count_today = 0;
        }

        if let Some(max) = self.max_per_day {
            if state.count_today >= max {
                return Err(ProviderError::RateLimitExceeded(format!(
                    "daily limit of {} translations reached",
                    max
                )));
            }
        }

        if let Some(last) = state.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                return Err(ProviderError::RateLimitExceeded(format!(
                    "wait {} ms before the next translation",
                    (self.min_interval - elapsed).as_millis()
                )));
            }
        }

        Ok(())
    }

    /// Count a successful call
    pub fn record(&self) {
        let mut state = self.state.lock();
        state.last_call = Some(Instant::now());
        state.count_today = state.count_today.saturating_add(1);
    }

    pub fn count_today(&self) -> u32 {
        self.state.lock().count_today
    }
}

#[derive(Debug)]
pub struct OnlineProvider {
    translator: Option<Arc<dyn TextTranslator>>,
    timeout: Duration,
    limiter: RateLimiter,
}

impl OnlineProvider {
    pub fn new(translator: Option<Arc<dyn TextTranslator>>) -> Self {
        Self {
            translator,
            timeout: DEFAULT_ONLINE_TIMEOUT,
            limiter: RateLimiter::unlimited(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// True iff a usable credential is configured
    pub fn is_available(&self) -> bool {
        self.translator.as_ref().is_some_and(|t| t.is_configured())
    }

    /// Why `is_available` is false
    pub fn unavailable_reason(&self) -> &'static str {
        match &self.translator {
            None => "no online translator configured",
            Some(_) => "no API key configured",
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Translate through the network translator
    pub async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, TranslationError> {
        let translator = match &self.translator {
            Some(t) if t.is_configured() => t,
            _ => return Err(TranslationError::online_unavailable(self.unavailable_reason())),
        };

        self.limiter.check()?;

        debug!("Online translation {:?} -> {}", source, target);
        let translated = match tokio::time::timeout(self.timeout, translator.translate(text, source, target)).await {
            Ok(Ok(translated)) => translated,
            Ok(Err(e)) => {
                warn!("Online translation failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                return Err(ProviderError::Timeout(self.timeout.as_millis() as u64).into());
            }
        };

        if translated.trim().is_empty() {
            return Err(TranslationError::ProviderFailure(
                "online provider returned an empty translation".to_string(),
            ));
        }

        self.limiter.record();
        Ok(translated)
    }
}
