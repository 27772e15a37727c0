use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conflict::{check_conflict, Booking, Candidate, Window};
use crate::models::{normalize_names, Assignee, Company, NewTask, Project, Task, TaskPatch};
use crate::{Error, Result};

/// Everything the board knows, as stored on disk.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Database {
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
}

impl Database {
    fn project(&self, company: &str, id: u64) -> Result<&Project> {
        self.projects
            .iter()
            .find(|p| p.company == company && p.id == id)
            .ok_or_else(|| Error::NotFound(format!("project {} in company '{}'", id, company)))
    }

    fn next_project_id(&self) -> u64 {
        self.projects.iter().map(|p| p.id).max().unwrap_or(0) + 1
    }

    fn next_task_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    fn scoped_tasks(&self, company: &str, project: u64) -> Vec<Task> {
        self.tasks.iter().filter(|t| t.in_scope(company, project)).cloned().collect()
    }

    /// Runs the conflict checker for `task` against the other tasks of its
    /// project, as they are in this snapshot.
    fn check_schedule(&self, task: &Task, exclude: Option<u64>, enforce_range: bool) -> Result<()> {
        let Some(window) = task.window() else {
            return Ok(());
        };
        let range = if enforce_range {
            let project = self.project(&task.company, task.project)?;
            Some(project.range().ok_or_else(|| {
                Error::InvalidInput(format!("project {} does not have a valid date range", project.id))
            })?)
        } else {
            None
        };
        let candidate = Candidate {
            assignees: &task.assigned_to,
            window,
            exclude_task_id: exclude,
        };
        let existing = bookings(self.tasks.iter().filter(|t| t.in_scope(&task.company, task.project)));
        check_conflict(&candidate, existing, range)?;
        Ok(())
    }
}

/// Bookings of the scheduled tasks among `tasks`.
///
/// Tasks without a window are skipped. A stored task whose window ends
/// before it starts is skipped too, with a warning.
pub fn bookings<'a, I>(tasks: I) -> impl Iterator<Item = Booking<'a>>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks.into_iter().filter_map(|t| {
        let booking = t.booking();
        if booking.is_none() && t.deadline_from.is_some() && t.deadline_to.is_some() {
            warn!(task = t.id, "skipping stored task with an inverted deadline window");
        }
        booking
    })
}

/// Rejects a task whose deadline ends before it starts.
fn validate_window(task: &Task) -> Result<()> {
    if let (Some(from), Some(to)) = (task.deadline_from, task.deadline_to) {
        Window::new(from, to)?;
    }
    Ok(())
}

struct Watcher {
    company: String,
    project: u64,
    tx: Sender<Vec<Task>>,
}

/// Receives the full task list of one project every time it changes.
pub struct Subscription {
    rx: Receiver<Vec<Task>>,
}

impl Subscription {
    /// Returns the next pending snapshot without blocking.
    pub fn try_next(&self) -> Option<Vec<Task>> {
        self.rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next snapshot.
    pub fn next_timeout(&self, timeout: Duration) -> Option<Vec<Task>> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Drains pending snapshots and returns the most recent one.
    pub fn latest(&self) -> Option<Vec<Task>> {
        self.rx.try_iter().last()
    }
}

/// A JSON-file document store for companies, projects, tasks and assignees.
///
/// Every operation loads the file, applies the change and writes the whole
/// file back.
pub struct Store {
    path: PathBuf,
    watchers: Mutex<Vec<Watcher>>,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Store { path: path.into(), watchers: Mutex::new(Vec::new()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole database. A missing file is an empty database.
    pub fn load(&self) -> Result<Database> {
        if !self.path.exists() {
            return Ok(Database::default());
        }
        let mut f = OpenOptions::new().read(true).open(&self.path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        if s.trim().is_empty() {
            return Ok(Database::default());
        }
        let db = serde_json::from_str(&s)?;
        debug!(path = %self.path.display(), "loaded database");
        Ok(db)
    }

    fn save(&self, db: &Database) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let s = serde_json::to_string_pretty(db)?;
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        f.write_all(s.as_bytes())?;
        debug!(path = %self.path.display(), "saved database");
        Ok(())
    }

    /// Deletes the store file.
    pub fn reset(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn companies(&self) -> Result<Vec<Company>> {
        Ok(self.load()?.companies)
    }

    pub fn company(&self, id: &str) -> Result<Company> {
        self.load()?
            .companies
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("company '{}'", id)))
    }

    /// Adds a company, using its name as id.
    pub fn add_company(&self, name: &str, address: &str, users: Vec<String>) -> Result<Company> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("company name cannot be empty".into()));
        }
        let mut db = self.load()?;
        if db.companies.iter().any(|c| c.id == name) {
            return Err(Error::AlreadyExists(format!("company '{}'", name)));
        }
        let company = Company {
            id: name.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            users: normalize_names(users),
        };
        db.companies.push(company.clone());
        self.save(&db)?;
        info!(company = %company.id, "company added");
        Ok(company)
    }

    pub fn update_company(&self, id: &str, address: Option<String>, users: Option<Vec<String>>) -> Result<Company> {
        let mut db = self.load()?;
        let company = db
            .companies
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("company '{}'", id)))?;
        if let Some(a) = address { company.address = a; }
        if let Some(u) = users { company.users = normalize_names(u); }
        let updated = company.clone();
        self.save(&db)?;
        info!(company = %id, "company updated");
        Ok(updated)
    }

    /// Deletes a company and its projects. Tasks of those projects are kept.
    ///
    /// Returns the number of projects removed.
    pub fn delete_company(&self, id: &str) -> Result<usize> {
        let mut db = self.load()?;
        let len_before = db.companies.len();
        db.companies.retain(|c| c.id != id);
        if db.companies.len() == len_before {
            return Err(Error::NotFound(format!("company '{}'", id)));
        }
        let projects_before = db.projects.len();
        db.projects.retain(|p| p.company != id);
        let removed = projects_before - db.projects.len();
        self.save(&db)?;
        info!(company = %id, projects = removed, "company deleted");
        Ok(removed)
    }

    pub fn projects(&self, company: &str) -> Result<Vec<Project>> {
        let db = self.load()?;
        Ok(db.projects.into_iter().filter(|p| p.company == company).collect())
    }

    pub fn project(&self, company: &str, id: u64) -> Result<Project> {
        self.load()?.project(company, id).cloned()
    }

    pub fn add_project(&self, company: &str, name: &str, range: Window, users: Vec<String>) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("project name cannot be empty".into()));
        }
        let mut db = self.load()?;
        if !db.companies.iter().any(|c| c.id == company) {
            return Err(Error::NotFound(format!("company '{}'", company)));
        }
        let project = Project {
            id: db.next_project_id(),
            company: company.to_string(),
            name: name.to_string(),
            from: range.from(),
            to: range.to(),
            users: normalize_names(users),
        };
        db.projects.push(project.clone());
        self.save(&db)?;
        info!(company = %company, project = project.id, "project added");
        Ok(project)
    }

    pub fn update_project(
        &self,
        company: &str,
        id: u64,
        name: Option<String>,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
        users: Option<Vec<String>>,
    ) -> Result<Project> {
        let mut db = self.load()?;
        let project = db
            .projects
            .iter_mut()
            .find(|p| p.company == company && p.id == id)
            .ok_or_else(|| Error::NotFound(format!("project {} in company '{}'", id, company)))?;
        let range = Window::new(from.unwrap_or(project.from), to.unwrap_or(project.to))?;
        if let Some(n) = name { project.name = n; }
        project.from = range.from();
        project.to = range.to();
        if let Some(u) = users { project.users = normalize_names(u); }
        let updated = project.clone();
        self.save(&db)?;
        info!(company = %company, project = id, "project updated");
        Ok(updated)
    }

    /// Deletes a project. Its tasks are kept.
    pub fn delete_project(&self, company: &str, id: u64) -> Result<()> {
        let mut db = self.load()?;
        let len_before = db.projects.len();
        db.projects.retain(|p| !(p.company == company && p.id == id));
        if db.projects.len() == len_before {
            return Err(Error::NotFound(format!("project {} in company '{}'", id, company)));
        }
        self.save(&db)?;
        info!(company = %company, project = id, "project deleted");
        Ok(())
    }

    pub fn assignees(&self) -> Result<Vec<Assignee>> {
        Ok(self.load()?.assignees)
    }

    pub fn add_assignee(&self, name: &str) -> Result<Assignee> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("assignee name cannot be empty".into()));
        }
        let mut db = self.load()?;
        if db.assignees.iter().any(|a| a.name == name) {
            return Err(Error::AlreadyExists(format!("assignee '{}'", name)));
        }
        let assignee = Assignee { name: name.to_string() };
        db.assignees.push(assignee.clone());
        self.save(&db)?;
        info!(assignee = %name, "assignee added");
        Ok(assignee)
    }

    /// All tasks of a project, in store order.
    pub fn tasks(&self, company: &str, project: u64) -> Result<Vec<Task>> {
        Ok(self.load()?.scoped_tasks(company, project))
    }

    pub fn task(&self, company: &str, project: u64, id: u64) -> Result<Task> {
        self.load()?
            .tasks
            .into_iter()
            .find(|t| t.id == id && t.in_scope(company, project))
            .ok_or_else(|| Error::NotFound(format!("task {} in project {}", id, project)))
    }

    /// Creates a task without checking the schedule.
    pub fn create_task(&self, draft: NewTask) -> Result<Task> {
        self.insert_task(draft, None)
    }

    /// Creates a task after checking it against the project's other tasks
    /// in the same snapshot that is written back.
    pub fn create_task_checked(&self, draft: NewTask, enforce_range: bool) -> Result<Task> {
        self.insert_task(draft, Some(enforce_range))
    }

    fn insert_task(&self, draft: NewTask, check: Option<bool>) -> Result<Task> {
        let mut db = self.load()?;
        db.project(&draft.company, draft.project)?;
        let task = draft.into_task(db.next_task_id(), Local::now().to_rfc3339());
        validate_window(&task)?;
        if let Some(enforce_range) = check {
            db.check_schedule(&task, None, enforce_range)?;
        }
        db.tasks.push(task.clone());
        self.save(&db)?;
        info!(company = %task.company, project = task.project, task = task.id, "task created");
        self.notify(&task.company, task.project, &db);
        Ok(task)
    }

    /// Merges `patch` into a task without checking the schedule.
    pub fn update_task(&self, company: &str, project: u64, id: u64, patch: &TaskPatch) -> Result<Task> {
        self.merge_task(company, project, id, patch, None)
    }

    /// Merges `patch` into a task. When the patch changes assignees or
    /// deadlines, the result is checked against the project's other tasks.
    pub fn update_task_checked(
        &self,
        company: &str,
        project: u64,
        id: u64,
        patch: &TaskPatch,
        enforce_range: bool,
    ) -> Result<Task> {
        let check = patch.touches_schedule().then_some(enforce_range);
        self.merge_task(company, project, id, patch, check)
    }

    fn merge_task(
        &self,
        company: &str,
        project: u64,
        id: u64,
        patch: &TaskPatch,
        check: Option<bool>,
    ) -> Result<Task> {
        let mut db = self.load()?;
        let idx = db
            .tasks
            .iter()
            .position(|t| t.id == id && t.in_scope(company, project))
            .ok_or_else(|| Error::NotFound(format!("task {} in project {}", id, project)))?;
        let mut merged = db.tasks[idx].clone();
        patch.apply(&mut merged);
        validate_window(&merged)?;
        if let Some(enforce_range) = check {
            db.check_schedule(&merged, Some(id), enforce_range)?;
        }
        db.tasks[idx] = merged.clone();
        self.save(&db)?;
        info!(company = %company, project, task = id, "task updated");
        self.notify(company, project, &db);
        Ok(merged)
    }

    pub fn delete_task(&self, company: &str, project: u64, id: u64) -> Result<()> {
        let mut db = self.load()?;
        let len_before = db.tasks.len();
        db.tasks.retain(|t| !(t.id == id && t.in_scope(company, project)));
        if db.tasks.len() == len_before {
            return Err(Error::NotFound(format!("task {} in project {}", id, project)));
        }
        self.save(&db)?;
        info!(company = %company, project, task = id, "task deleted");
        self.notify(company, project, &db);
        Ok(())
    }

    /// Subscribes to a project's task list. The current list is delivered
    /// right away, then again after every task write to that project made
    /// through this store.
    pub fn subscribe_tasks(&self, company: &str, project: u64) -> Result<Subscription> {
        let snapshot = self.tasks(company, project)?;
        let (tx, rx) = mpsc::channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(snapshot);
        let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        watchers.push(Watcher { company: company.to_string(), project, tx });
        debug!(company = %company, project, "task subscription added");
        Ok(Subscription { rx })
    }

    fn notify(&self, company: &str, project: u64, db: &Database) {
        let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        if watchers.is_empty() {
            return;
        }
        let snapshot = db.scoped_tasks(company, project);
        watchers.retain(|w| {
            if w.company != company || w.project != project {
                return true;
            }
            w.tx.send(snapshot.clone()).is_ok()
        });
    }
}
