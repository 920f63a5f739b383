//! Async driver for [`ReminderEngine`].
//!
//! One task multiplexes the local scan interval, the feed poll interval,
//! the earliest deferred deadline and the command channel. The engine is
//! owned by that task, so no locking is involved. Dropping the
//! [`ReminderHandle`] (or calling [`ReminderHandle::shutdown`]) ends the
//! loop and abandons every queued alert and in-flight poll.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::alert::{deliver, AlertSink};
use super::{FeedNotification, NotificationFeed, ReminderEngine, ReminderNotification};
use crate::error::ApiError;
use crate::storage::{KeyValueStore, NotificationPermission, RemindersConfig};
use crate::task::Task;

/// Wall-clock source. Tests substitute one that follows paused tokio time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Clone)]
pub struct ServiceSettings {
    pub local_scan: Duration,
    pub feed_poll: Duration,
    pub feed_limit: u32,
    pub permission: NotificationPermission,
    pub clock: Clock,
}

impl ServiceSettings {
    pub fn from_config(reminders: &RemindersConfig, permission: NotificationPermission) -> Self {
        Self {
            local_scan: reminders.local_scan_interval(),
            feed_poll: reminders.feed_poll_interval(),
            feed_limit: reminders.feed_limit,
            permission,
            clock: system_clock(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            local_scan: super::LOCAL_SCAN_INTERVAL,
            feed_poll: super::FEED_POLL_INTERVAL,
            feed_limit: super::FEED_LIMIT,
            permission: NotificationPermission::Default,
            clock: system_clock(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderCommand {
    Dismiss,
    /// Switch the feed to another user (or none). Queued alerts are dropped.
    SetUser(Option<String>),
    Shutdown,
}

/// Inputs the service watches.
pub struct ReminderInputs {
    pub tasks: watch::Receiver<Vec<Task>>,
    pub visible: watch::Receiver<bool>,
    pub user_id: Option<String>,
}

pub struct ReminderHandle {
    commands: mpsc::UnboundedSender<ReminderCommand>,
    toast: watch::Receiver<Option<ReminderNotification>>,
    join: JoinHandle<()>,
}

impl ReminderHandle {
    /// Receiver for the active toast; `None` once dismissed.
    pub fn toasts(&self) -> watch::Receiver<Option<ReminderNotification>> {
        self.toast.clone()
    }

    pub fn active(&self) -> Option<ReminderNotification> {
        self.toast.borrow().clone()
    }

    pub fn dismiss(&self) {
        let _ = self.commands.send(ReminderCommand::Dismiss);
    }

    pub fn set_user(&self, user_id: Option<String>) {
        let _ = self.commands.send(ReminderCommand::SetUser(user_id));
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(ReminderCommand::Shutdown);
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "reminder service ended abnormally");
        }
    }
}

type FeedResult = Result<Vec<FeedNotification>, ApiError>;

/// Start the reminder loop on the current runtime.
pub fn spawn<S, F>(
    engine: ReminderEngine<S>,
    feed: Arc<F>,
    alerts: Arc<dyn AlertSink>,
    inputs: ReminderInputs,
    settings: ServiceSettings,
) -> ReminderHandle
where
    S: KeyValueStore + 'static,
    F: NotificationFeed + 'static,
{
    let (commands, command_rx) = mpsc::unbounded_channel();
    let (toast_tx, toast) = watch::channel(None);
    let service = Service {
        engine,
        feed,
        alerts,
        inputs,
        settings,
        toast: toast_tx,
        in_flight: None,
    };
    let join = tokio::spawn(service.run(command_rx));
    ReminderHandle {
        commands,
        toast,
        join,
    }
}

struct Service<S, F> {
    engine: ReminderEngine<S>,
    feed: Arc<F>,
    alerts: Arc<dyn AlertSink>,
    inputs: ReminderInputs,
    settings: ServiceSettings,
    toast: watch::Sender<Option<ReminderNotification>>,
    in_flight: Option<JoinHandle<FeedResult>>,
}

async fn join_poll(slot: &mut Option<JoinHandle<FeedResult>>) -> Option<FeedResult> {
    match slot {
        Some(handle) => {
            let joined = handle.await;
            *slot = None;
            joined.ok()
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

impl<S, F> Service<S, F>
where
    S: KeyValueStore + 'static,
    F: NotificationFeed + 'static,
{
    fn now(&self) -> DateTime<Utc> {
        (self.settings.clock)()
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<ReminderCommand>) {
        let mut local = tokio::time::interval(self.settings.local_scan);
        local.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll = tokio::time::interval(self.settings.feed_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first_poll = true;

        loop {
            let wait = self
                .engine
                .next_deadline()
                .map(|at| (at - self.now()).to_std().unwrap_or(Duration::ZERO));

            tokio::select! {
                _ = local.tick() => {
                    let tasks = self.inputs.tasks.borrow().clone();
                    let now = self.now();
                    let fired = self.engine.scan_local(&tasks, now);
                    self.emit(fired);
                }
                _ = poll.tick() => {
                    // The first poll runs regardless of visibility.
                    let visible = first_poll || *self.inputs.visible.borrow();
                    first_poll = false;
                    if visible {
                        self.start_poll();
                    }
                }
                Some(result) = join_poll(&mut self.in_flight) => {
                    match result {
                        Ok(feed) => {
                            let tasks = self.inputs.tasks.borrow().clone();
                            let now = self.now();
                            let fired = self.engine.ingest_feed(feed, &tasks, now);
                            self.emit(fired);
                        }
                        Err(e) => tracing::debug!(error = %e, "notification poll failed"),
                    }
                }
                _ = sleep_until(wait) => {
                    let now = self.now();
                    let fired = self.engine.fire_due(now);
                    self.emit(fired);
                }
                cmd = commands.recv() => match cmd {
                    Some(ReminderCommand::Dismiss) => {
                        let now = self.now();
                        if self.engine.dismiss(now).is_some() {
                            self.toast.send_replace(None);
                        }
                    }
                    Some(ReminderCommand::SetUser(user_id)) => {
                        tracing::debug!(user = ?user_id, "reminder user changed");
                        self.abort_poll();
                        self.engine.cancel_pending();
                        self.inputs.user_id = user_id;
                        first_poll = true;
                        poll.reset_immediately();
                    }
                    Some(ReminderCommand::Shutdown) | None => break,
                },
            }
        }

        self.abort_poll();
        self.engine.cancel_pending();
        tracing::debug!("reminder service stopped");
    }

    fn start_poll(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(user_id) = self.inputs.user_id.clone() else {
            return;
        };
        let feed = Arc::clone(&self.feed);
        let limit = self.settings.feed_limit;
        self.in_flight = Some(tokio::spawn(async move {
            feed.pending_notifications(&user_id, limit).await
        }));
    }

    fn abort_poll(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }

    fn emit(&mut self, fired: Vec<ReminderNotification>) {
        if fired.is_empty() {
            return;
        }
        for notification in &fired {
            deliver(self.alerts.as_ref(), self.settings.permission, notification);
        }
        self.toast.send_replace(self.engine.active().cloned());
    }
}
