//! Watch mode: live task list plus reminder toasts.

use chrono::Utc;
use clap::Args;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use taskflow_core::dashboard::task_line;
use taskflow_core::reminder::{self, DesktopAlerts, ReminderInputs, ReminderNotification, ServiceSettings};
use taskflow_core::storage::NotificationPermission;
use taskflow_core::task::cache::STALE_TIME;
use taskflow_core::{ApiClient, Config, DismissedLedger, ReminderEngine, SqliteStore, Summary, Task, TaskCache};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use super::task::FilterArgs;
use super::CmdResult;

#[derive(Args)]
pub struct WatchArgs {
    #[command(flatten)]
    filters: FilterArgs,
    /// Poll the notification feed for this user instead of auth.user_id
    #[arg(long)]
    user: Option<String>,
}

/// Ask once for desktop notification permission while it is still `default`.
fn ensure_permission(config: &mut Config) -> CmdResult {
    if config.notifications.permission != NotificationPermission::Default || !std::io::stdin().is_terminal() {
        return Ok(());
    }
    print!("Allow desktop notifications for due tasks? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    config.notifications.permission = if answer.trim().eq_ignore_ascii_case("y") {
        NotificationPermission::Granted
    } else {
        NotificationPermission::Denied
    };
    config.save()?;
    Ok(())
}

fn print_tasks(tasks: &[Task]) {
    super::dashboard::print_summary(&Summary::from_tasks(tasks));
    let now = Utc::now();
    for task in tasks {
        println!("{}", task_line(task, now));
    }
}

fn print_toast(toast: &ReminderNotification) {
    println!();
    println!("🔔 {}", toast.title);
    println!("   {}", toast.body);
    println!("   (press Enter to dismiss)");
}

pub fn run(args: WatchArgs) -> CmdResult {
    let mut config = Config::load()?;
    ensure_permission(&mut config)?;
    let api = super::api_client(&config)?;
    super::runtime()?.block_on(watch_loop(args, config, api))
}

async fn watch_loop(args: WatchArgs, config: Config, api: ApiClient) -> CmdResult {
    let query = args.filters.to_query(&config);
    let user_id = args.user.or_else(|| config.auth.user_id().map(str::to_string));
    if user_id.is_none() {
        tracing::info!("no auth.user_id configured, notification feed disabled");
    }

    let mut cache = TaskCache::new(api.clone());
    let initial = match cache.list(&query).await {
        Ok(tasks) => tasks,
        Err(e) => {
            tracing::warn!(error = %e, "initial task fetch failed");
            Vec::new()
        }
    };

    let ledger = DismissedLedger::new(SqliteStore::open()?);
    let engine = ReminderEngine::new(ledger, Utc::now());
    // The first feed poll runs at spawn and must see the fetched list.
    let (tasks_tx, tasks_rx) = watch::channel(initial.clone());
    // A terminal session stays visible until it exits.
    let (_visible_tx, visible_rx) = watch::channel(true);

    let handle = reminder::spawn(
        engine,
        Arc::new(api.clone()),
        Arc::new(DesktopAlerts::new(&config.notifications)),
        ReminderInputs {
            tasks: tasks_rx,
            visible: visible_rx,
            user_id,
        },
        ServiceSettings::from_config(&config.reminders, config.notifications.permission),
    );
    let mut toasts = handle.toasts();

    let mut refresh = tokio::time::interval_at(Instant::now() + STALE_TIME, STALE_TIME);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!("Watching tasks. Ctrl-C to quit.");
    println!();
    print_tasks(&initial);
    let mut shown = initial;
    loop {
        tokio::select! {
            _ = refresh.tick() => {
                cache.invalidate();
                match cache.list(&query).await {
                    Ok(tasks) => {
                        if shown != tasks {
                            println!();
                            print_tasks(&tasks);
                            shown = tasks.clone();
                        }
                        tasks_tx.send_replace(tasks);
                    }
                    Err(e) => tracing::warn!(error = %e, "task refresh failed"),
                }
            }
            changed = toasts.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(toast) = toasts.borrow_and_update().clone() {
                    print_toast(&toast);
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => handle.dismiss(),
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        tracing::debug!(error = %e, "stdin closed");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await;
    Ok(())
}
