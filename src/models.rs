use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::conflict::{Booking, Window};

/// Workflow state of a task. Has no bearing on scheduling conflicts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Unstarted,
    Begin,
    Intermediate,
    Completed,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Unstarted, Stage::Begin, Stage::Intermediate, Stage::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Unstarted => "unstarted",
            Stage::Begin => "begin",
            Stage::Intermediate => "intermediate",
            Stage::Completed => "completed",
        }
    }

    /// Rough percentage of work done in this stage.
    pub fn progress(&self) -> u8 {
        match self {
            Stage::Unstarted => 0,
            Stage::Begin => 10,
            Stage::Intermediate => 70,
            Stage::Completed => 100,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unstarted" => Ok(Stage::Unstarted),
            "begin" => Ok(Stage::Begin),
            "intermediate" => Ok(Stage::Intermediate),
            "completed" => Ok(Stage::Completed),
            other => Err(format!(
                "unknown stage '{}' (expected unstarted, begin, intermediate or completed)",
                other
            )),
        }
    }
}

/// A company. Its name doubles as its identifier.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Company {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// Names of people belonging to the company.
    #[serde(default)]
    pub users: Vec<String>,
}

/// A project within a company.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Project {
    pub id: u64,
    /// Owning company id.
    pub company: String,
    pub name: String,
    /// Earliest instant a task of this project may be scheduled at.
    pub from: NaiveDateTime,
    /// Latest instant a task of this project may be scheduled at.
    pub to: NaiveDateTime,
    #[serde(default)]
    pub users: Vec<String>,
}

impl Project {
    /// The inclusive range tasks of this project must be scheduled within.
    ///
    /// `None` when the stored bounds are inverted.
    pub fn range(&self) -> Option<Window> {
        Window::new(self.from, self.to).ok()
    }
}

/// A single task on a project board.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub id: u64,
    pub company: String,
    pub project: u64,
    pub title: String,
    #[serde(default)]
    pub stage: Stage,
    /// Names of the people the task is assigned to.
    #[serde(default)]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub deadline_from: Option<NaiveDateTime>,
    #[serde(default)]
    pub deadline_to: Option<NaiveDateTime>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub priority: bool,
    /// Timestamp when the task was created (RFC 3339).
    pub created_on: String,
}

pub fn default_color() -> String {
    "#ffffff".to_string()
}

impl Task {
    /// The task's deadline window, if both ends are set and in order.
    pub fn window(&self) -> Option<Window> {
        match (self.deadline_from, self.deadline_to) {
            (Some(from), Some(to)) => Window::new(from, to).ok(),
            _ => None,
        }
    }

    /// A view of this task suitable for conflict checking.
    ///
    /// Unscheduled tasks (no window, or an inverted one) have no booking.
    pub fn booking(&self) -> Option<Booking<'_>> {
        let window = self.window()?;
        Some(Booking { id: self.id, assignees: &self.assigned_to, window })
    }

    pub fn in_scope(&self, company: &str, project: u64) -> bool {
        self.company == company && self.project == project
    }
}

/// A known assignee.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Assignee {
    pub name: String,
}

/// Fields of a task about to be created. The store assigns `id` and `created_on`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub company: String,
    pub project: u64,
    pub title: String,
    pub stage: Stage,
    pub assigned_to: Vec<String>,
    pub customer: String,
    pub deadline_from: Option<NaiveDateTime>,
    pub deadline_to: Option<NaiveDateTime>,
    /// `None` means the default white.
    pub color: Option<String>,
}

impl NewTask {
    pub fn into_task(self, id: u64, created_on: String) -> Task {
        Task {
            id,
            company: self.company,
            project: self.project,
            title: self.title,
            stage: self.stage,
            assigned_to: normalize_names(self.assigned_to),
            customer: self.customer,
            deadline_from: self.deadline_from,
            deadline_to: self.deadline_to,
            color: self.color.unwrap_or_else(default_color),
            priority: false,
            created_on,
        }
    }
}

/// A partial update of a task. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub stage: Option<Stage>,
    pub assigned_to: Option<Vec<String>>,
    pub customer: Option<String>,
    pub deadline_from: Option<NaiveDateTime>,
    pub deadline_to: Option<NaiveDateTime>,
    pub color: Option<String>,
    pub priority: Option<bool>,
}

impl TaskPatch {
    /// Whether applying this patch can change who is booked when.
    pub fn touches_schedule(&self) -> bool {
        self.assigned_to.is_some() || self.deadline_from.is_some() || self.deadline_to.is_some()
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(t) = &self.title { task.title = t.clone(); }
        if let Some(s) = self.stage { task.stage = s; }
        if let Some(a) = &self.assigned_to { task.assigned_to = normalize_names(a.clone()); }
        if let Some(c) = &self.customer { task.customer = c.clone(); }
        if let Some(f) = self.deadline_from { task.deadline_from = Some(f); }
        if let Some(t) = self.deadline_to { task.deadline_to = Some(t); }
        if let Some(c) = &self.color { task.color = c.clone(); }
        if let Some(p) = self.priority { task.priority = p; }
    }
}

/// Trims names, drops blanks and keeps only the first occurrence of each.
pub fn normalize_names(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for n in names {
        let n = n.trim();
        if !n.is_empty() && !out.iter().any(|o| o == n) {
            out.push(n.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parses_case_insensitively() {
        assert_eq!("Begin".parse::<Stage>(), Ok(Stage::Begin));
        assert_eq!(" completed ".parse::<Stage>(), Ok(Stage::Completed));
        assert!("test".parse::<Stage>().is_err());
    }

    #[test]
    fn normalize_drops_blanks_and_duplicates() {
        let names = vec![" Alice ".into(), "".into(), "Bob".into(), "Alice".into()];
        assert_eq!(normalize_names(names), vec!["Alice".to_string(), "Bob".to_string()]);
    }

    #[test]
    fn schedule_fields_mark_patch_as_scheduling() {
        assert!(!TaskPatch { stage: Some(Stage::Begin), ..Default::default() }.touches_schedule());
        assert!(TaskPatch { assigned_to: Some(vec![]), ..Default::default() }.touches_schedule());
    }
}
