//! Task management commands for CLI.

use chrono::Utc;
use clap::{Args, Subcommand};
use taskflow_core::dashboard::task_line;
use taskflow_core::task::parse_tags;
use taskflow_core::{
    ApiClient, Config, SortOption, TaskCache, TaskCategory, TaskCreate, TaskPriority, TaskQuery,
    TaskUpdate,
};

use super::CmdResult;

/// Filters shared by `task list`, `dashboard` and `watch`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Free-text search
    #[arg(long)]
    pub search: Option<String>,
    /// Category: General, Work, Personal, Shopping or Health
    #[arg(long)]
    pub category: Option<TaskCategory>,
    /// Priority: High, Medium or Low
    #[arg(long)]
    pub priority: Option<TaskPriority>,
    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,
    /// newest, oldest, priority or alphabetical (default: dashboard.sort)
    #[arg(long)]
    pub sort: Option<SortOption>,
}

impl FilterArgs {
    pub fn to_query(&self, config: &Config) -> TaskQuery {
        let mut query = TaskQuery::sorted(self.sort.unwrap_or(config.dashboard.sort));
        if let Some(ref search) = self.search {
            query = query.search(search.clone());
        }
        if let Some(category) = self.category {
            query = query.category(category.as_str());
        }
        if let Some(priority) = self.priority {
            query = query.priority(priority.as_str());
        }
        if let Some(ref tags) = self.tags {
            query = query.tags(parse_tags(tags));
        }
        query
    }
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// List tasks
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Print JSON instead of one line per task
        #[arg(long)]
        json: bool,
    },
    /// Create a new task
    Create {
        /// Task description
        description: String,
        /// Task category (default: General)
        #[arg(long)]
        category: Option<TaskCategory>,
        /// Task priority (default: Medium)
        #[arg(long)]
        priority: Option<TaskPriority>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Due date, RFC 3339 or local YYYY-MM-DDTHH:MM
        #[arg(long)]
        due: Option<String>,
        /// Repeat the task
        #[arg(long)]
        recurring: bool,
        /// daily, weekly or monthly (default: daily)
        #[arg(long, requires = "recurring")]
        pattern: Option<String>,
    },
    /// Update a task
    Update {
        /// Task ID
        id: String,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New category
        #[arg(long)]
        category: Option<TaskCategory>,
        /// New priority
        #[arg(long)]
        priority: Option<TaskPriority>,
        /// Comma-separated tags (empty string clears them)
        #[arg(long)]
        tags: Option<String>,
        /// New due date
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        /// Turn recurrence on or off
        #[arg(long)]
        recurring: Option<bool>,
        /// New recurrence pattern
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Flip a task between open and completed
    Toggle {
        /// Task ID
        id: String,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> CmdResult {
    let config = Config::load()?;
    let mut cache = TaskCache::new(super::api_client(&config)?);
    super::runtime()?.block_on(dispatch(action, &config, &mut cache))
}

async fn dispatch(action: TaskAction, config: &Config, cache: &mut TaskCache<ApiClient>) -> CmdResult {
    match action {
        TaskAction::List { filters, json } => {
            let tasks = cache.list(&filters.to_query(config)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks found");
            } else {
                let now = Utc::now();
                for task in &tasks {
                    println!("{}", task_line(task, now));
                }
            }
        }
        TaskAction::Create {
            description,
            category,
            priority,
            tags,
            due,
            recurring,
            pattern,
        } => {
            let data = TaskCreate {
                description,
                category: Some(category.unwrap_or_default().to_string()),
                priority: Some(priority.unwrap_or_default().to_string()),
                tags: tags.as_deref().map(parse_tags),
                due_date: due,
                is_recurring: Some(recurring),
                recurrence_pattern: pattern,
            }
            .validated()?;
            let task = cache.create(data).await?;
            println!("Task created: {}", task.id);
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Update {
            id,
            description,
            category,
            priority,
            tags,
            due,
            clear_due,
            recurring,
            pattern,
        } => {
            let update = TaskUpdate {
                description: description.map(|d| d.trim().to_string()),
                completed: None,
                category: category.map(|c| c.to_string()),
                priority: priority.map(|p| p.to_string()),
                tags: tags.as_deref().map(parse_tags),
                due_date: if clear_due { Some(None) } else { due.map(Some) },
                is_recurring: recurring,
                recurrence_pattern: pattern.map(Some),
            };
            if update.is_empty() {
                return Err("nothing to update".into());
            }
            if update.description.as_deref() == Some("") {
                return Err(taskflow_core::ValidationError::EmptyDescription.into());
            }
            match cache.update(&id, update).await {
                Ok(task) => println!("{}", serde_json::to_string_pretty(&task)?),
                Err(e) => return Err(format!("Failed to save task: {e}").into()),
            }
        }
        TaskAction::Toggle { id } => {
            let query = TaskQuery::sorted(config.dashboard.sort);
            cache.list(&query).await?;
            let completed = cache
                .find(&id)
                .map(|t| t.completed)
                .ok_or_else(|| format!("task not found: {id}"))?;
            let task = cache.toggle(&id, !completed).await?;
            let state = if task.completed { "completed" } else { "reopened" };
            println!("Task {state}: {}", task.id);
        }
        TaskAction::Delete { id } => {
            cache.delete(&id).await?;
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}
