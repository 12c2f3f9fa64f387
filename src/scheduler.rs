// src/scheduler.rs
//! Recurring per-destination triggers for scheduled runs.
//!
//! Triggers are keyed by destination: activating a destination that already
//! has a trigger replaces it, so a chat never receives parallel schedules.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::gauge;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::metrics::names;
use crate::notify::Destination;
use crate::pipeline::{Pipeline, RunMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Started,
    Replaced,
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    triggers: Mutex<HashMap<Destination, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            triggers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a recurring trigger for `dest`: first run after `initial_delay`,
    /// then every `interval`.
    pub fn activate(&self, dest: Destination, interval: Duration, initial_delay: Duration) -> Activation {
        let handle = spawn_trigger(self.pipeline.clone(), dest, interval, initial_delay);

        let mut triggers = self.triggers.lock().unwrap_or_else(|p| p.into_inner());
        let previous = triggers.insert(dest, handle);
        gauge!(names::SUBSCRIPTIONS).set(triggers.len() as f64);

        match previous {
            Some(old) => {
                old.abort();
                tracing::info!(dest = %dest, interval_secs = interval.as_secs(), "subscription re-activated");
                Activation::Replaced
            }
            None => {
                tracing::info!(dest = %dest, interval_secs = interval.as_secs(), "subscription activated");
                Activation::Started
            }
        }
    }

    pub fn is_active(&self, dest: Destination) -> bool {
        let triggers = self.triggers.lock().unwrap_or_else(|p| p.into_inner());
        triggers.get(&dest).is_some_and(|h| !h.is_finished())
    }

    pub fn active_destinations(&self) -> Vec<Destination> {
        let triggers = self.triggers.lock().unwrap_or_else(|p| p.into_inner());
        let mut out: Vec<Destination> = triggers
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(d, _)| *d)
            .collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.active_destinations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort every trigger. Called once at process shutdown.
    pub fn shutdown(&self) {
        let mut triggers = self.triggers.lock().unwrap_or_else(|p| p.into_inner());
        for (dest, handle) in triggers.drain() {
            handle.abort();
            tracing::debug!(dest = %dest, "trigger stopped");
        }
        gauge!(names::SUBSCRIPTIONS).set(0.0);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_trigger(
    pipeline: Arc<Pipeline>,
    dest: Destination,
    interval: Duration,
    initial_delay: Duration,
) -> JoinHandle<()> {
    // `interval_at` panics on a zero period.
    let interval = interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            // Each run gets its own task so a panic ends that run only.
            let p = pipeline.clone();
            let run = tokio::spawn(async move { p.run(dest, RunMode::Scheduled).await });
            match run.await {
                Ok(report) => tracing::debug!(dest = %dest, outcome = ?report.outcome, "scheduled tick"),
                Err(e) if e.is_panic() => {
                    tracing::error!(dest = %dest, error = %e, "scheduled run panicked");
                }
                Err(e) => {
                    tracing::warn!(dest = %dest, error = %e, "scheduled run cancelled");
                }
            }
        }
    })
}
