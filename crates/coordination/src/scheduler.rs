//! Fleet-wide task scheduler.
//!
//! Runs named jobs with "one active runner" semantics across all backend
//! instances, without leader election: each instance keeps its own
//! in-process timers, and every firing of a recurring task first takes a
//! short-lived lock scoped to the task name. Losing that race is not an
//! error; it means another instance is already running the job.
//!
//! The registry is an explicit owned collection inside the scheduler
//! instance (no module-level global state), so multiple schedulers can
//! coexist in tests without cross-contamination.
//!
//! # Store connectivity
//!
//! Tasks only run while the coordination store is reachable: locks cannot
//! be taken safely otherwise. The scheduler consumes a
//! `watch::Receiver<StoreHealth>` (see [`crate::health`]):
//!
//! - `Unavailable`: all live timers are torn down. Cron registrations are
//!   retained in a quiesced state; pending timeout tasks are treated as
//!   lost and removed.
//! - `Ready`: cron tasks are re-attached; tasks registered with
//!   `run_immediately` fire once on each attach to fill the gap.
//!
//! Task state machine: `Unregistered -> Registered -> Scheduled ->
//! {Running -> Scheduled}* -> Cancelled`.

use crate::cron_expr::{interval_to_cron, is_coarsened_to_minute, lock_ttl_for_interval};
use crate::errors::CoordinationError;
use crate::health::StoreHealth;
use crate::mutex::MutexService;
use cron::Schedule;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Boxed future returned by a task action.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A task action: a factory producing one future per firing.
pub type TaskAction = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Lock name for a scheduled task, scoped by task name.
#[must_use]
pub fn task_lock_name(task: &str) -> String {
    format!("scheduled-task:{task}")
}

/// Fleet-wide scheduler of named cron and timeout tasks.
///
/// Cheaply cloneable; all clones share one registry. The caller spawns
/// [`TaskScheduler::run`] once to react to store health transitions.
#[derive(Clone)]
pub struct TaskScheduler {
    mutex: Arc<MutexService>,
    health: watch::Receiver<StoreHealth>,
    inner: Arc<Mutex<SchedulerInner>>,
    shutdown: CancellationToken,
}

struct SchedulerInner {
    tasks: HashMap<String, RegisteredTask>,
    /// Whether timers are currently attached (store observed Ready).
    attached: bool,
    shut_down: bool,
}

struct RegisteredTask {
    kind: TaskKind,
    action: TaskAction,
    /// Present while a timer is attached; cancelling it detaches the task.
    cancel: Option<CancellationToken>,
}

#[derive(Clone)]
enum TaskKind {
    Cron {
        schedule: Schedule,
        interval: Duration,
        run_immediately: bool,
    },
    Timeout {
        delay: Duration,
    },
}

/// Outcome of one guarded firing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Lock won, action ran successfully.
    Ran,
    /// Lock won, action returned an error (logged, scheduler unaffected).
    Failed,
    /// Lock held by another instance; firing skipped.
    SkippedHeldElsewhere,
    /// Coordination store unreachable; firing skipped (fail closed).
    StoreUnavailable,
}

impl TaskScheduler {
    #[must_use]
    pub fn new(mutex: Arc<MutexService>, health: watch::Receiver<StoreHealth>) -> Self {
        Self {
            mutex,
            health,
            inner: Arc::new(Mutex::new(SchedulerInner {
                tasks: HashMap::new(),
                attached: false,
                shut_down: false,
            })),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a recurring task.
    ///
    /// The interval is translated to a cron expression via
    /// [`interval_to_cron`]; per firing, a lock named
    /// `scheduled-task:{name}` is taken with a TTL slightly shorter than
    /// the interval, and the firing is skipped if another instance holds
    /// it. The lease is left to expire naturally after the action runs:
    /// its presence means "ran recently", not just "currently running".
    ///
    /// `run_immediately` makes the task fire once on each attach, in
    /// addition to its periodic schedule. The immediate run still goes
    /// through the lock; losing it is expected when another instance
    /// already ran the task.
    ///
    /// Re-registering an existing name is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchedule` for a zero interval and
    /// `SchedulerShutDown` after [`TaskScheduler::shutdown`].
    pub fn register_cron<F>(
        &self,
        name: &str,
        interval: Duration,
        run_immediately: bool,
        action: F,
    ) -> Result<(), CoordinationError>
    where
        F: Fn() -> TaskFuture + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(CoordinationError::InvalidSchedule(format!(
                "task '{name}' has a zero interval"
            )));
        }

        let expression = interval_to_cron(interval);
        let schedule = Schedule::from_str(&expression).map_err(|e| {
            CoordinationError::InvalidSchedule(format!(
                "task '{name}' synthesized invalid expression '{expression}': {e}"
            ))
        })?;

        if is_coarsened_to_minute(interval) {
            // Sub-minute cadence in the 30-59s band silently becomes
            // once-a-minute; surface the gap to operators.
            warn!(
                target: "coordination.scheduler",
                task = %name,
                requested_secs = interval.as_secs(),
                "Requested cadence coarsened to once per minute"
            );
        }

        let kind = TaskKind::Cron {
            schedule,
            interval,
            run_immediately,
        };
        self.insert_task(name, kind, Arc::new(action))
    }

    /// Register a one-shot task firing after `delay`.
    ///
    /// Timeout tasks take no fleet lock: they are inherently
    /// single-instance because only the instance that handled the
    /// triggering request schedules them. The registration is consumed by
    /// the firing, removed by [`TaskScheduler::cancel_task`], or dropped
    /// as lost if the store disconnects before it fires.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerShutDown` after [`TaskScheduler::shutdown`].
    pub fn register_timeout<F>(
        &self,
        name: &str,
        delay: Duration,
        action: F,
    ) -> Result<(), CoordinationError>
    where
        F: Fn() -> TaskFuture + Send + Sync + 'static,
    {
        self.insert_task(name, TaskKind::Timeout { delay }, Arc::new(action))
    }

    fn insert_task(
        &self,
        name: &str,
        kind: TaskKind,
        action: TaskAction,
    ) -> Result<(), CoordinationError> {
        let mut inner = lock_inner(&self.inner);

        if inner.shut_down {
            return Err(CoordinationError::SchedulerShutDown);
        }

        if inner.tasks.contains_key(name) {
            warn!(
                target: "coordination.scheduler",
                task = %name,
                "Task already registered, ignoring re-registration"
            );
            return Ok(());
        }

        let mut task = RegisteredTask {
            kind,
            action,
            cancel: None,
        };

        if inner.attached {
            self.attach(name, &mut task);
        }

        info!(
            target: "coordination.scheduler",
            task = %name,
            attached = task.cancel.is_some(),
            "Task registered"
        );
        inner.tasks.insert(name.to_string(), task);
        Ok(())
    }

    /// Cancel a task: stop its local timer and remove the registration
    /// permanently. Purely local bookkeeping; other instances' copies of
    /// the task and any currently held locks are unaffected.
    ///
    /// Returns `false` if no such task was registered.
    pub fn cancel_task(&self, name: &str) -> bool {
        let mut inner = lock_inner(&self.inner);
        match inner.tasks.remove(name) {
            Some(task) => {
                if let Some(cancel) = task.cancel {
                    cancel.cancel();
                }
                info!(
                    target: "coordination.scheduler",
                    task = %name,
                    "Task cancelled"
                );
                true
            }
            None => false,
        }
    }

    /// Names of currently registered tasks (sorted, for deterministic
    /// assertions).
    #[must_use]
    pub fn registered_task_names(&self) -> Vec<String> {
        let inner = lock_inner(&self.inner);
        let mut names: Vec<String> = inner.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether timers are currently attached (store observed Ready).
    #[must_use]
    pub fn is_attached(&self) -> bool {
        lock_inner(&self.inner).attached
    }

    /// Stop the scheduler: tear down all timers and reject further
    /// registrations.
    pub fn shutdown(&self) {
        {
            let mut inner = lock_inner(&self.inner);
            inner.shut_down = true;
        }
        self.shutdown.cancel();
    }

    /// React to store health transitions until shutdown. Spawn once:
    /// `tokio::spawn(scheduler.clone().run())`.
    pub async fn run(self) {
        let mut health = self.health.clone();

        info!(target: "coordination.scheduler", "Task scheduler started");

        if *health.borrow_and_update() == StoreHealth::Ready {
            self.attach_all();
        }

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    self.quiesce(true);
                    break;
                }
                changed = health.changed() => {
                    if changed.is_err() {
                        warn!(
                            target: "coordination.scheduler",
                            "Health monitor gone, quiescing scheduler"
                        );
                        self.quiesce(false);
                        break;
                    }
                    match *health.borrow_and_update() {
                        StoreHealth::Ready => {
                            info!(
                                target: "coordination.scheduler",
                                "Coordination store ready, attaching tasks"
                            );
                            self.attach_all();
                        }
                        StoreHealth::Unavailable => {
                            warn!(
                                target: "coordination.scheduler",
                                "Coordination store unavailable, quiescing tasks"
                            );
                            self.quiesce(false);
                        }
                    }
                }
            }
        }

        info!(target: "coordination.scheduler", "Task scheduler stopped");
    }

    /// Attach timers for every registered task that has none.
    fn attach_all(&self) {
        let mut inner = lock_inner(&self.inner);
        inner.attached = true;

        // Collect names first: attach() needs &mut access per entry
        let names: Vec<String> = inner.tasks.keys().cloned().collect();
        for name in names {
            if let Some(task) = inner.tasks.get_mut(&name) {
                if task.cancel.is_none() {
                    self.attach(&name, task);
                }
            }
        }
    }

    /// Tear down all timers. Cron registrations are retained (quiesced);
    /// pending timeout tasks are lost unless this is a final shutdown.
    fn quiesce(&self, final_shutdown: bool) {
        let mut inner = lock_inner(&self.inner);
        inner.attached = false;

        for task in inner.tasks.values_mut() {
            if let Some(cancel) = task.cancel.take() {
                cancel.cancel();
            }
        }

        if !final_shutdown {
            let before = inner.tasks.len();
            inner
                .tasks
                .retain(|_, task| matches!(task.kind, TaskKind::Cron { .. }));
            let lost = before - inner.tasks.len();
            if lost > 0 {
                warn!(
                    target: "coordination.scheduler",
                    lost_timeout_tasks = lost,
                    "Pending timeout tasks lost on store disconnect"
                );
            }
        }
    }

    /// Spawn the timer for one task and record its cancellation token.
    fn attach(&self, name: &str, task: &mut RegisteredTask) {
        let cancel = self.shutdown.child_token();
        task.cancel = Some(cancel.clone());

        match task.kind.clone() {
            TaskKind::Cron {
                schedule,
                interval,
                run_immediately,
            } => {
                tokio::spawn(run_cron_task(
                    name.to_string(),
                    schedule,
                    interval,
                    run_immediately,
                    Arc::clone(&task.action),
                    Arc::clone(&self.mutex),
                    cancel,
                ));
            }
            TaskKind::Timeout { delay } => {
                tokio::spawn(run_timeout_task(
                    name.to_string(),
                    delay,
                    Arc::clone(&task.action),
                    Arc::clone(&self.inner),
                    cancel,
                ));
            }
        }
    }
}

fn lock_inner(inner: &Arc<Mutex<SchedulerInner>>) -> MutexGuard<'_, SchedulerInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One guarded firing: take the task lock, run the action, let the lease
/// expire.
pub(crate) async fn fire_guarded(
    mutex: &MutexService,
    name: &str,
    interval: Duration,
    action: &TaskAction,
) -> FireOutcome {
    let ttl = lock_ttl_for_interval(interval);

    let guard = match mutex.acquire(&task_lock_name(name), ttl).await {
        Ok(Some(guard)) => guard,
        Ok(None) => {
            debug!(
                target: "coordination.scheduler",
                task = %name,
                "Task already running on another instance, skipping firing"
            );
            return FireOutcome::SkippedHeldElsewhere;
        }
        Err(e) => {
            warn!(
                target: "coordination.scheduler",
                task = %name,
                error = %e,
                "Coordination store unavailable, skipping firing"
            );
            return FireOutcome::StoreUnavailable;
        }
    };

    debug!(
        target: "coordination.scheduler",
        task = %name,
        ttl_secs = guard.ttl().as_secs(),
        "Task lock acquired, running action"
    );

    match (action)().await {
        Ok(()) => FireOutcome::Ran,
        Err(e) => {
            error!(
                target: "coordination.scheduler",
                task = %name,
                error = %e,
                "Task action failed"
            );
            FireOutcome::Failed
        }
    }
    // The lease is deliberately not released here; see register_cron.
}

async fn run_cron_task(
    name: String,
    schedule: Schedule,
    interval: Duration,
    run_immediately: bool,
    action: TaskAction,
    mutex: Arc<MutexService>,
    cancel: CancellationToken,
) {
    if run_immediately {
        fire_guarded(&mutex, &name, interval, &action).await;
    }

    loop {
        let Some(wait) = until_next_fire(&schedule) else {
            warn!(
                target: "coordination.scheduler",
                task = %name,
                "Schedule yields no further firings, detaching"
            );
            break;
        };

        tokio::select! {
            () = cancel.cancelled() => {
                debug!(
                    target: "coordination.scheduler",
                    task = %name,
                    "Cron task detached"
                );
                break;
            }
            () = tokio::time::sleep(wait) => {
                // Same-instance firings are serialized: the next sleep
                // only starts after the action completes.
                fire_guarded(&mutex, &name, interval, &action).await;
            }
        }
    }
}

async fn run_timeout_task(
    name: String,
    delay: Duration,
    action: TaskAction,
    inner: Arc<Mutex<SchedulerInner>>,
    cancel: CancellationToken,
) {
    tokio::select! {
        () = cancel.cancelled() => {
            debug!(
                target: "coordination.scheduler",
                task = %name,
                "Timeout task cancelled before firing"
            );
            return;
        }
        () = tokio::time::sleep(delay) => {}
    }

    debug!(target: "coordination.scheduler", task = %name, "Timeout task firing");
    if let Err(e) = (action)().await {
        error!(
            target: "coordination.scheduler",
            task = %name,
            error = %e,
            "Timeout task action failed"
        );
    }

    // One-shot: the registration is consumed by the firing
    lock_inner(&inner).tasks.remove(&name);
}

fn until_next_fire(schedule: &Schedule) -> Option<Duration> {
    let next = schedule.upcoming(chrono::Utc).next()?;
    let wait = (next - chrono::Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Some(wait)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::health::health_channel;
    use coordination_test_utils::MockLockStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn noop_action() -> TaskAction {
        Arc::new(|| Box::pin(async { Ok(()) }))
    }

    fn scheduler() -> (TaskScheduler, tokio::sync::watch::Sender<StoreHealth>) {
        let store = Arc::new(MockLockStore::new());
        let mutex = Arc::new(MutexService::new(store));
        let (tx, rx) = health_channel();
        (TaskScheduler::new(mutex, rx), tx)
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_noop() {
        let (scheduler, _tx) = scheduler();

        scheduler
            .register_cron("room-gc", Duration::from_secs(60), false, || {
                Box::pin(async { Ok(()) })
            })
            .unwrap();
        scheduler
            .register_cron("room-gc", Duration::from_secs(120), true, || {
                Box::pin(async { Ok(()) })
            })
            .unwrap();

        assert_eq!(scheduler.registered_task_names(), vec!["room-gc"]);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let (scheduler, _tx) = scheduler();

        let result = scheduler.register_cron("bad", Duration::ZERO, false, || {
            Box::pin(async { Ok(()) })
        });
        assert!(matches!(
            result,
            Err(CoordinationError::InvalidSchedule(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_task_removes_registration() {
        let (scheduler, _tx) = scheduler();

        scheduler
            .register_cron("room-gc", Duration::from_secs(60), false, || {
                Box::pin(async { Ok(()) })
            })
            .unwrap();

        assert!(scheduler.cancel_task("room-gc"));
        assert!(!scheduler.cancel_task("room-gc"));
        assert!(scheduler.registered_task_names().is_empty());
    }

    #[tokio::test]
    async fn test_register_after_shutdown_fails() {
        let (scheduler, _tx) = scheduler();
        scheduler.shutdown();

        let result = scheduler.register_cron("late", Duration::from_secs(60), false, || {
            Box::pin(async { Ok(()) })
        });
        assert!(matches!(result, Err(CoordinationError::SchedulerShutDown)));
    }

    #[tokio::test]
    async fn test_fire_guarded_runs_when_lock_free() {
        let store = Arc::new(MockLockStore::new());
        let mutex = MutexService::new(store);
        let count = Arc::new(AtomicU32::new(0));

        let action: TaskAction = {
            let count = Arc::clone(&count);
            Arc::new(move || {
                let count = Arc::clone(&count);
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
        };

        let outcome = fire_guarded(&mutex, "room-gc", Duration::from_secs(60), &action).await;
        assert_eq!(outcome, FireOutcome::Ran);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fire_guarded_skips_when_held_elsewhere() {
        let store = Arc::new(MockLockStore::new());
        let mutex = MutexService::new(Arc::clone(&store) as Arc<dyn crate::lock::LockStore>);

        // Simulate another instance holding the task lock
        store
            .try_acquire(
                &crate::lock::lock_key(&task_lock_name("room-gc")),
                "other-instance",
                Duration::from_secs(55),
            )
            .await
            .unwrap();

        let outcome =
            fire_guarded(&mutex, "room-gc", Duration::from_secs(60), &noop_action()).await;
        assert_eq!(outcome, FireOutcome::SkippedHeldElsewhere);
    }

    #[tokio::test]
    async fn test_fire_guarded_fails_closed_when_store_down() {
        let store = Arc::new(MockLockStore::new());
        store.set_unavailable(true);
        let mutex = MutexService::new(Arc::clone(&store) as Arc<dyn crate::lock::LockStore>);

        let outcome =
            fire_guarded(&mutex, "room-gc", Duration::from_secs(60), &noop_action()).await;
        assert_eq!(outcome, FireOutcome::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_action_failure_does_not_propagate() {
        let store = Arc::new(MockLockStore::new());
        let mutex = MutexService::new(store);

        let action: TaskAction =
            Arc::new(|| Box::pin(async { Err(anyhow::anyhow!("sweep exploded")) }));

        let outcome = fire_guarded(&mutex, "room-gc", Duration::from_secs(60), &action).await;
        assert_eq!(outcome, FireOutcome::Failed);
    }

    #[test]
    fn test_task_lock_name_scoping() {
        assert_eq!(task_lock_name("room-gc"), "scheduled-task:room-gc");
    }
}
