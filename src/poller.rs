use crate::fetch::{FetchError, FetchOutcome, Fetcher};
use crate::metrics::Metrics;
use crate::normalize::{normalize, NormalizeError};
use crate::notify::Notifier;
use crate::view::{local_timestamp, VersionedView, ViewSender};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

pub const TERMINAL_MESSAGE: &str =
    "The monitor API can not be invoked successfully. Please restart to try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_failures: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_failures: 10,
            delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

impl RetryPolicy {
    pub fn decide(&self, failures: u32) -> RetryDecision {
        if failures < self.max_failures {
            RetryDecision::RetryAfter(self.delay)
        } else {
            RetryDecision::GiveUp
        }
    }
}

pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub auth_key: Option<String>,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    RetryWaiting,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    Stopped,
    Exhausted { attempts: u32 },
}

#[derive(Debug, Error)]
enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl CycleError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(err) => err.kind(),
            Self::Normalize(_) => "normalize",
        }
    }
}

pub struct Poller<F, N> {
    fetcher: F,
    notifier: N,
    settings: PollSettings,
    views: ViewSender,
    metrics: Arc<Metrics>,
    phase: Phase,
    failures: u32,
    version: u64,
    skipping: bool,
}

impl<F: Fetcher, N: Notifier> Poller<F, N> {
    pub fn new(
        fetcher: F,
        notifier: N,
        settings: PollSettings,
        views: ViewSender,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            settings,
            views,
            metrics,
            phase: Phase::Idle,
            failures: 0,
            version: 0,
            skipping: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> PollExit {
        if self.phase == Phase::Terminal {
            return PollExit::Exhausted {
                attempts: self.failures,
            };
        }

        let mut delay = Duration::ZERO;
        loop {
            if *shutdown.borrow_and_update() {
                return self.stop();
            }
            let woke = tokio::select! {
                biased;
                _ = shutdown.changed() => false,
                _ = time::sleep(delay) => true,
            };
            if !woke {
                return self.stop();
            }

            self.phase = Phase::Fetching;
            self.metrics.inc_fetch_attempt();
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = shutdown.changed() => None,
                outcome = self.fetcher.fetch(self.settings.auth_key.as_deref()) => Some(outcome),
            };
            let Some(outcome) = outcome else {
                return self.stop();
            };
            let elapsed = started.elapsed();
            self.metrics.observe_fetch_latency(elapsed);

            match self.apply(outcome) {
                Ok(()) => {
                    if self.failures > 0 {
                        info!(failures = self.failures, "monitor API снова доступен");
                    }
                    self.failures = 0;
                    self.metrics.reset_failures();
                    self.phase = Phase::Idle;
                    delay = next_delay(self.settings.interval, elapsed);
                    debug!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        delay_ms = delay.as_millis() as u64,
                        "следующий опрос запланирован"
                    );
                }
                Err(err) => {
                    self.failures = self.failures.saturating_add(1);
                    self.metrics.inc_fetch_failure(err.kind(), self.failures);
                    match self.settings.retry.decide(self.failures) {
                        RetryDecision::RetryAfter(retry_delay) => {
                            warn!(
                                error = %err,
                                attempt = self.failures,
                                delay_ms = retry_delay.as_millis() as u64,
                                "повторный запрос к monitor API"
                            );
                            self.phase = Phase::RetryWaiting;
                            delay = retry_delay;
                        }
                        RetryDecision::GiveUp => {
                            self.phase = Phase::Terminal;
                            error!(
                                error = %err,
                                attempts = self.failures,
                                "попытки исчерпаны, опрос monitor API остановлен"
                            );
                            self.notifier.terminal_failure(TERMINAL_MESSAGE).await;
                            return PollExit::Exhausted {
                                attempts: self.failures,
                            };
                        }
                    }
                }
            }
        }
    }

    fn apply(&mut self, outcome: Result<FetchOutcome, FetchError>) -> Result<(), CycleError> {
        match outcome? {
            FetchOutcome::Skip(code) => {
                self.metrics.inc_skipped();
                if self.skipping {
                    debug!(code, "monitor API не готов, цикл пропущен");
                } else {
                    warn!(code, "monitor API вернул ненулевой код, обновление пропущено");
                    self.skipping = true;
                }
                Ok(())
            }
            FetchOutcome::Ready(raw) => {
                let mut view = normalize(&raw)?;
                view.last_update_time = Some(local_timestamp());
                if self.skipping {
                    info!("monitor API снова отдаёт данные");
                    self.skipping = false;
                }
                self.version += 1;
                self.metrics.update_from_view(&view, self.version);
                self.views.send_replace(Arc::new(VersionedView {
                    version: self.version,
                    view,
                }));
                debug!(version = self.version, "представление обновлено");
                Ok(())
            }
        }
    }

    fn stop(&mut self) -> PollExit {
        self.phase = Phase::Idle;
        info!("получен сигнал остановки цикла опроса");
        PollExit::Stopped
    }
}
