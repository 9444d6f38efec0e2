//! Past-due sweep: overdue open tasks move to verification exactly once.
//!
//! The sweep holds no lock. Each candidate is claimed by a conditional write
//! that re-checks the past-due predicate, so concurrent sweeps (the scheduler
//! and on-demand triggers) transition and notify each task once.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::Result;
use crate::notify::NotificationDispatcher;
use crate::store::SharedStore;

pub struct PastDueSweeper {
    store: SharedStore,
    dispatcher: NotificationDispatcher,
}

impl PastDueSweeper {
    pub fn new(store: SharedStore, dispatcher: NotificationDispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Transition every task overdue as of `now` (UTC day).
    ///
    /// Returns how many tasks this call transitioned. Tasks claimed by a
    /// concurrent sweep are skipped silently; a failed write on one task is
    /// logged and the rest are still processed. Only a failed candidate
    /// query is an error.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let today = now.date_naive();
        let candidates = self.store.find_past_due_tasks(today).await?;
        tracing::debug!("Past-due sweep for {}: {} candidates", today, candidates.len());

        let mut processed = 0;
        for candidate in candidates {
            let task = match self.store.mark_past_due(candidate.id, today, now).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    tracing::debug!("Task {} already claimed by another sweep", candidate.id);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to move past-due task {}: {}", candidate.id, e);
                    continue;
                }
            };
            processed += 1;

            let message = format!(
                "\"{}\" passed its due date and was submitted for verification automatically at {}%",
                task.title, task.progress
            );
            self.dispatcher.request_approval(&task, &message, now).await;
        }

        if processed > 0 {
            tracing::info!("Past-due sweep moved {} tasks to verification", processed);
        }
        Ok(processed)
    }
}

/// Runs a [`PastDueSweeper`] on a fixed interval.
pub struct SweepScheduler;

impl SweepScheduler {
    /// Spawn the recurring sweep. The first tick fires immediately; ticks
    /// missed while a sweep is running are skipped.
    ///
    /// Cancel the returned token to stop the loop.
    pub fn start(
        sweeper: Arc<PastDueSweeper>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!("Past-due sweep scheduled every {:?}", interval);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("Past-due sweep scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = sweeper.sweep(clock.now()).await {
                            tracing::warn!("Scheduled past-due sweep failed: {}", e);
                        }
                    }
                }
            }
        });

        cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notify::NotificationType;
    use crate::roster::{Capabilities, Employee, Role};
    use crate::store::{FaultyStore, InMemoryStore, SqliteStore};
    use crate::task::{NewTask, Task, TaskStatus};
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 0, 5, 0).unwrap()
    }

    async fn seed(store: &SharedStore) -> (Employee, Employee) {
        let assigner = Employee {
            id: Uuid::new_v4(),
            name: "Mira".into(),
            role: Role::Admin,
            capabilities: Capabilities::default(),
            team_lead: None,
        };
        let assignee = Employee {
            id: Uuid::new_v4(),
            name: "Jonas".into(),
            role: Role::Ordinary,
            capabilities: Capabilities::default(),
            team_lead: Some(assigner.id),
        };
        store.upsert_employee(&assigner).await.unwrap();
        store.upsert_employee(&assignee).await.unwrap();
        (assigner, assignee)
    }

    fn task_due(assigner: &Employee, assignee: &Employee, day: u32) -> Task {
        Task::new(
            assigner.id,
            NewTask {
                assignee_id: assignee.id,
                title: "Close the books".into(),
                due_date: NaiveDate::from_ymd_opt(2024, 3, day),
                ..Default::default()
            },
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    async fn approvals(store: &SharedStore, recipient: Uuid) -> usize {
        store
            .list_notifications(recipient, false)
            .await
            .unwrap()
            .iter()
            .filter(|n| n.kind == NotificationType::TaskApproval)
            .count()
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_transition_once() {
        let dir = tempfile::tempdir().unwrap();
        let backends: Vec<SharedStore> = vec![
            Arc::new(InMemoryStore::new()),
            Arc::new(SqliteStore::new(dir.path().to_path_buf()).await.unwrap()),
        ];

        for store in backends {
            let (assigner, assignee) = seed(&store).await;
            let mut task = task_due(&assigner, &assignee, 10);
            task.apply_progress(None, Some(45), now()).unwrap();
            store.insert_task(&task).await.unwrap();

            let sweeper = Arc::new(PastDueSweeper::new(
                store.clone(),
                NotificationDispatcher::new(store.clone()),
            ));
            let runs = (0..8).map(|_| {
                let sweeper = sweeper.clone();
                async move { sweeper.sweep(now()).await }
            });
            let counts: Vec<usize> = futures::future::join_all(runs)
                .await
                .into_iter()
                .map(|r| r.unwrap())
                .collect();

            assert_eq!(counts.iter().sum::<usize>(), 1);
            let stored = store.get_task(task.id).await.unwrap().unwrap();
            assert_eq!(stored.status, TaskStatus::PendingVerification);
            assert_eq!(stored.progress, 45);
            assert_eq!(stored.submitted_for_verification_date, Some(now()));
            assert_eq!(approvals(&store, assigner.id).await, 1);
            assert_eq!(approvals(&store, assignee.id).await, 0);
        }
    }

    #[tokio::test]
    async fn test_sweep_skips_submitted_rejected_and_not_yet_due() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let (assigner, assignee) = seed(&store).await;

        let mut submitted = task_due(&assigner, &assignee, 10);
        submitted.apply_progress(None, Some(100), now()).unwrap();
        let mut rejected = task_due(&assigner, &assignee, 10);
        rejected.rejection_reason = "redo the totals".into();
        let due_today = task_due(&assigner, &assignee, 14);
        let overdue = task_due(&assigner, &assignee, 13);
        for t in [&submitted, &rejected, &due_today, &overdue] {
            store.insert_task(t).await.unwrap();
        }

        let sweeper = PastDueSweeper::new(store.clone(), NotificationDispatcher::new(store.clone()));
        assert_eq!(sweeper.sweep(now()).await.unwrap(), 1);
        assert_eq!(sweeper.sweep(now()).await.unwrap(), 0);

        let get = |id| {
            let store = store.clone();
            async move { store.get_task(id).await.unwrap().unwrap() }
        };
        assert_eq!(get(overdue.id).await.status, TaskStatus::PendingVerification);
        assert_eq!(get(due_today.id).await.status, TaskStatus::Pending);
        assert_eq!(get(rejected.id).await.status, TaskStatus::Pending);
        assert_eq!(get(submitted.id).await.revision, submitted.revision);
    }

    #[tokio::test]
    async fn test_sweep_succeeds_when_notifications_fail() {
        let store: SharedStore = Arc::new(FaultyStore::new().with_notifications_down());
        let (assigner, assignee) = seed(&store).await;
        let task = task_due(&assigner, &assignee, 10);
        store.insert_task(&task).await.unwrap();

        let sweeper = PastDueSweeper::new(store.clone(), NotificationDispatcher::new(store.clone()));
        assert_eq!(sweeper.sweep(now()).await.unwrap(), 1);
        let stored = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::PendingVerification);
    }

    #[tokio::test]
    async fn test_failed_task_write_does_not_stop_sweep() {
        let seed_store: SharedStore = Arc::new(InMemoryStore::new());
        let (assigner, assignee) = seed(&seed_store).await;
        let broken = task_due(&assigner, &assignee, 9);
        let healthy = task_due(&assigner, &assignee, 11);

        let store: SharedStore = Arc::new(FaultyStore::new().with_broken_task(broken.id));
        store.upsert_employee(&assigner).await.unwrap();
        store.upsert_employee(&assignee).await.unwrap();
        store.insert_task(&broken).await.unwrap();
        store.insert_task(&healthy).await.unwrap();

        let sweeper = PastDueSweeper::new(store.clone(), NotificationDispatcher::new(store.clone()));
        assert_eq!(sweeper.sweep(now()).await.unwrap(), 1);

        let get = |id| {
            let store = store.clone();
            async move { store.get_task(id).await.unwrap().unwrap() }
        };
        assert_eq!(get(healthy.id).await.status, TaskStatus::PendingVerification);
        assert_eq!(get(broken.id).await.status, TaskStatus::Pending);
        assert_eq!(approvals(&store, assigner.id).await, 1);
    }

    #[tokio::test]
    async fn test_scheduler_sweeps_immediately_and_stops_on_cancel() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let (assigner, assignee) = seed(&store).await;
        let task = task_due(&assigner, &assignee, 10);
        store.insert_task(&task).await.unwrap();

        let sweeper = Arc::new(PastDueSweeper::new(
            store.clone(),
            NotificationDispatcher::new(store.clone()),
        ));
        let clock = Arc::new(FixedClock::new(now()));
        let cancel = SweepScheduler::start(sweeper, clock, Duration::from_secs(3600));

        let mut swept = false;
        for _ in 0..100 {
            let stored = store.get_task(task.id).await.unwrap().unwrap();
            if stored.status == TaskStatus::PendingVerification {
                swept = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        assert!(swept);
        assert!(cancel.is_cancelled());
    }
}
