use crate::screener::Screener;
use crate::spam::SpamTrainer;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Runs screening and spam training on their intervals until shutdown.
///
/// Both jobs share one mailbox session, so a job always runs to completion before
/// the next one starts. Training runs first on startup so the first screening sees
/// fresh corpora.
pub struct Scheduler {
    screener: Screener,
    screening_interval: Duration,
    training: Option<(SpamTrainer, Duration)>,
}

impl Scheduler {
    pub fn new(screener: Screener, screening_interval: Duration) -> Self {
        Self {
            screener,
            screening_interval,
            training: None,
        }
    }

    pub fn with_training(mut self, trainer: SpamTrainer, interval: Duration) -> Self {
        self.training = Some((trainer, interval));
        self
    }

    pub async fn run<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        log::info!(
            "Screening every {}s{}",
            self.screening_interval.as_secs(),
            match &self.training {
                Some((_, interval)) => format!(", training every {}s", interval.as_secs()),
                None => String::new(),
            }
        );

        let mut screening = interval(self.screening_interval);
        let mut training = self.training.as_ref().map(|(_, every)| interval(*every));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                result = &mut shutdown => {
                    result?;
                    log::info!("Received shutdown signal, stopping");
                    return Ok(());
                }
                _ = next_tick(training.as_mut()) => {
                    if let Some((trainer, _)) = &self.training {
                        if let Err(e) = trainer.train().await {
                            log::error!("Spam training failed: {e:#}");
                        }
                    }
                }
                _ = screening.tick() => {
                    // Failures are logged by the screener; the next tick retries
                    let _ = self.screener.screen_mail().await;
                }
            }
        }
    }
}

fn interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
