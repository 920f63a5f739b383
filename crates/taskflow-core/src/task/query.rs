//! Server-side filter and sort parameters for task lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Column the backend sorts by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    Priority,
    Description,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Priority => "priority",
            SortField::Description => "description",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Sort choices offered by the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
    #[default]
    Newest,
    Oldest,
    Priority,
    Alphabetical,
}

impl SortOption {
    pub const ALL: [SortOption; 4] = [
        SortOption::Newest,
        SortOption::Oldest,
        SortOption::Priority,
        SortOption::Alphabetical,
    ];

    /// Backend column and direction for this option.
    pub fn field_and_order(&self) -> (SortField, SortOrder) {
        match self {
            SortOption::Newest => (SortField::CreatedAt, SortOrder::Desc),
            SortOption::Oldest => (SortField::CreatedAt, SortOrder::Asc),
            SortOption::Priority => (SortField::Priority, SortOrder::Asc),
            SortOption::Alphabetical => (SortField::Description, SortOrder::Asc),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Newest => "newest",
            SortOption::Oldest => "oldest",
            SortOption::Priority => "priority",
            SortOption::Alphabetical => "alphabetical",
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOption {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortOption::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "sort".into(),
                message: format!("expected one of newest, oldest, priority, alphabetical; got '{s}'"),
            })
    }
}

/// One filtered, sorted view of the task list. Also the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub tags: Vec<String>,
    pub sort_by: SortField,
    pub order: SortOrder,
}

impl Default for TaskQuery {
    fn default() -> Self {
        TaskQuery::sorted(SortOption::Newest)
    }
}

impl TaskQuery {
    pub fn sorted(option: SortOption) -> Self {
        let (sort_by, order) = option.field_and_order();
        Self {
            search: None,
            category: None,
            priority: None,
            tags: Vec::new(),
            sort_by,
            order,
        }
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Query-string pairs; blank filters are left out.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let non_blank = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        if let Some(s) = non_blank(&self.search) {
            params.push(("search", s));
        }
        if let Some(c) = non_blank(&self.category) {
            params.push(("category", c));
        }
        if let Some(p) = non_blank(&self.priority) {
            params.push(("priority", p));
        }
        if !self.tags.is_empty() {
            params.push(("tags", self.tags.join(",")));
        }
        params.push(("sort_by", self.sort_by.as_str().to_string()));
        params.push(("order", self.order.as_str().to_string()));
        params
    }
}
