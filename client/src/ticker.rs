//! The fold countdown's tick source.
//!
//! A [`Countdown`] recomputes the fold progress of one seat on a fixed tick
//! and publishes it. Dropping the countdown stops the tick; nothing is
//! recomputed afterwards.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future;
use log::debug;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use lnpoker_game::countdown::fold_progress;

const MIN_TICK: Duration = Duration::from_millis(1);

/// Wall clock time, injectable for tests.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct Countdown {
    deadline: DateTime<Utc>,
    rx: watch::Receiver<f64>,
    task: JoinHandle<()>,
}

impl Countdown {
    /// Start ticking towards `deadline`. Must be called within a tokio
    /// runtime.
    pub fn start(
        deadline: DateTime<Utc>,
        delay: chrono::Duration,
        tick: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, rx) = watch::channel(fold_progress(deadline, clock.now(), delay));
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(tick.max(MIN_TICK));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes at once and the initial value is
            // already published.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(fold_progress(deadline, clock.now(), delay)).is_err() {
                    break;
                }
            }
        });
        Countdown { deadline, rx, task }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Latest percentage of the window left; negative once overdue.
    pub fn progress(&self) -> f64 {
        *self.rx.borrow()
    }

    /// Wait for the next tick.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            future::pending::<()>().await;
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        debug!("stopping countdown to {}", self.deadline);
        self.task.abort();
    }
}
