use chrono::Utc;
use clap::Subcommand;
use taskflow_core::dashboard::{self, BulkResult};
use taskflow_core::{ApiClient, Config, Summary, TaskCache};

use super::task::FilterArgs;
use super::CmdResult;

#[derive(Subcommand)]
pub enum DashboardAction {
    /// Counters followed by the filtered task list
    Show {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Summary counters only
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Complete every open task in the filtered list
    CompleteAll {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Delete every completed task in the filtered list
    ClearCompleted {
        #[command(flatten)]
        filters: FilterArgs,
    },
}

pub fn print_summary(summary: &Summary) {
    println!(
        "{} total  {} completed  {} pending  {} high priority  {}% done",
        summary.total,
        summary.completed,
        summary.pending,
        summary.high_priority_pending,
        summary.completion_rate
    );
}

fn report(verb: &str, result: BulkResult) -> CmdResult {
    println!("{verb} {} task(s)", result.succeeded);
    for (id, e) in &result.failed {
        eprintln!("  {id}: {e}");
    }
    if result.failed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} task(s) failed", result.failed.len()).into())
    }
}

pub fn run(action: DashboardAction) -> CmdResult {
    let config = Config::load()?;
    let mut cache = TaskCache::new(super::api_client(&config)?);
    super::runtime()?.block_on(dispatch(action, &config, &mut cache))
}

async fn dispatch(action: DashboardAction, config: &Config, cache: &mut TaskCache<ApiClient>) -> CmdResult {
    match action {
        DashboardAction::Show { filters } => {
            let tasks = cache.list(&filters.to_query(config)).await?;
            print_summary(&Summary::from_tasks(&tasks));
            println!();
            let now = Utc::now();
            for task in &tasks {
                println!("{}", dashboard::task_line(task, now));
            }
            Ok(())
        }
        DashboardAction::Summary { filters, json } => {
            let tasks = cache.list(&filters.to_query(config)).await?;
            let summary = Summary::from_tasks(&tasks);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(())
        }
        DashboardAction::CompleteAll { filters } => {
            let tasks = cache.list(&filters.to_query(config)).await?;
            report("Completed", dashboard::mark_all_complete(cache, &tasks).await)
        }
        DashboardAction::ClearCompleted { filters } => {
            let tasks = cache.list(&filters.to_query(config)).await?;
            report("Deleted", dashboard::clear_completed(cache, &tasks).await)
        }
    }
}
