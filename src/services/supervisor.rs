// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lifecycle owner for playback samplers and reconciliation tasks.
//!
//! Every task is spawned on one [`TaskTracker`] and listens on a child of one
//! [`CancellationToken`]. Cancelling the parent reaches all of them at once;
//! waiting on the tracker blocks until each has exited.

use crate::db::Database;
use crate::error::AppError;
use crate::services::sampler::PlaybackSampler;
use crate::services::MusicProvider;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

struct WorkerHandle {
    /// Distinguishes a restarted sampler from the one it replaced.
    generation: u64,
    cancel: CancellationToken,
}

pub struct Supervisor {
    db: Database,
    music: Arc<dyn MusicProvider>,
    poll_interval: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    workers: Arc<DashMap<i64, WorkerHandle>>,
    next_generation: AtomicU64,
}

impl Supervisor {
    pub fn new(db: Database, music: Arc<dyn MusicProvider>, poll_interval: Duration) -> Self {
        Self {
            db,
            music,
            poll_interval,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            workers: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Launch a sampler for every user with a Spotify connection.
    ///
    /// Returns the number of samplers started.
    pub async fn start_all(&self) -> Result<usize, AppError> {
        let user_ids = self.db.get_user_ids_with_active_spotify().await?;
        let mut started = 0;
        for &user_id in &user_ids {
            if self.launch_one(user_id) {
                started += 1;
            }
        }
        tracing::info!(
            users = user_ids.len(),
            started,
            "Started playback samplers"
        );
        Ok(started)
    }

    /// Start a sampler for `user_id` unless one is already running.
    ///
    /// Returns `false` if the user already has a live sampler or shutdown
    /// has begun.
    pub fn launch_one(&self, user_id: i64) -> bool {
        if self.shutdown.is_cancelled() {
            tracing::debug!(user_id, "Not launching sampler during shutdown");
            return false;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();

        match self.workers.entry(user_id) {
            Entry::Occupied(_) => {
                tracing::debug!(user_id, "Sampler already running");
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(WorkerHandle {
                    generation,
                    cancel: cancel.clone(),
                });
            }
        }

        let sampler = PlaybackSampler::new(
            user_id,
            self.db.clone(),
            Arc::clone(&self.music),
            self.poll_interval,
        );
        let workers = Arc::clone(&self.workers);

        self.tracker.spawn(async move {
            sampler.run(cancel).await;
            workers.remove_if(&user_id, |_, handle| handle.generation == generation);
        });

        tracing::info!(user_id, "Launched playback sampler");
        true
    }

    /// Cancel one user's sampler. Returns `false` if none was running.
    pub fn stop_one(&self, user_id: i64) -> bool {
        match self.workers.remove(&user_id) {
            Some((_, handle)) => {
                handle.cancel.cancel();
                tracing::info!(user_id, "Stopping playback sampler");
                true
            }
            None => false,
        }
    }

    /// Users with a live sampler, in ascending order.
    pub fn running_workers(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.workers.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_running(&self, user_id: i64) -> bool {
        self.workers.contains_key(&user_id)
    }

    /// Run an ad-hoc task that [`Supervisor::shutdown_all`] will wait for.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Signal every task to stop and wait until all of them have exited.
    ///
    /// Safe to call more than once; later calls return once the tracker is
    /// empty.
    pub async fn shutdown_all(&self) {
        tracing::info!(
            samplers = self.workers.len(),
            tasks = self.tracker.len(),
            "Shutting down background tasks"
        );
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("All background tasks exited");
    }
}
