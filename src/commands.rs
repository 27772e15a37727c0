use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use tracing::{debug, info};

use crate::config::Config;
use crate::conflict::{check_conflict, Candidate, ConflictResult, Window};
use crate::models::{normalize_names, Company, NewTask, Project, Stage, Task, TaskPatch};
use crate::storage::{bookings, Store};
use crate::{Error, Result};

const INSTANT_FORMATS: [&str; 4] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parses `YYYY-MM-DDTHH:MM[:SS]`, `YYYY-MM-DD HH:MM[:SS]` or `YYYY-MM-DD`.
///
/// A bare date is the start of that day, or its last second when
/// `end_of_day` is set.
pub fn parse_instant(s: &str, end_of_day: bool) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in INSTANT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)?
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)?
    };
    Some(date.and_time(time))
}

fn parse_field(s: &str, label: &str, end_of_day: bool) -> Result<NaiveDateTime> {
    parse_instant(s, end_of_day).ok_or_else(|| {
        Error::InvalidInput(format!(
            "invalid \"{}\" date or time '{}'. Use YYYY-MM-DD or YYYY-MM-DDTHH:MM.",
            label, s
        ))
    })
}

fn fmt_opt(dt: Option<NaiveDateTime>, time_format: &str) -> String {
    dt.map(|d| d.format(time_format).to_string()).unwrap_or_else(|| "-".into())
}

/// Adds a company. Its name becomes its id.
pub fn cmd_company_add(store: &Store, name: String, address: Option<String>, users: Vec<String>, silent: bool) -> Result<Company> {
    let company = store.add_company(&name, address.as_deref().unwrap_or_default(), users)?;
    if !silent { println!("Company '{}' added.", company.id); }
    Ok(company)
}

/// Lists all companies.
pub fn cmd_company_list(store: &Store) -> Result<()> {
    let companies = store.companies()?;
    if companies.is_empty() {
        println!("No companies found.");
        return Ok(());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL)
        .set_header(vec!["Company", "Address", "Users"]);
    for c in companies {
        table.add_row(vec![
            c.name,
            if c.address.is_empty() { "-".into() } else { c.address },
            c.users.join(", "),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn cmd_company_edit(store: &Store, id: String, address: Option<String>, users: Option<Vec<String>>, silent: bool) -> Result<Company> {
    let company = store.update_company(&id, address, users)?;
    if !silent { println!("Company '{}' updated.", id); }
    Ok(company)
}

/// Removes a company together with its projects.
pub fn cmd_company_remove(store: &Store, id: String, silent: bool) -> Result<()> {
    let removed = store.delete_company(&id)?;
    if !silent { println!("Company '{}' removed ({} project(s) deleted).", id, removed); }
    Ok(())
}

/// Adds a project. A bare `to` date covers that whole day.
pub fn cmd_project_add(store: &Store, company: String, name: String, from: String, to: String, users: Vec<String>, silent: bool) -> Result<Project> {
    let from = parse_field(&from, "from", false)?;
    let to = parse_field(&to, "to", true)?;
    let project = store.add_project(&company, &name, Window::new(from, to)?, users)?;
    if !silent { println!("Project added (id = {})", project.id); }
    Ok(project)
}

pub fn cmd_project_list(store: &Store, config: &Config, company: String) -> Result<()> {
    let projects = store.projects(&company)?;
    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL)
        .set_header(vec!["ID", "Name", "From", "To", "Users"]);
    for p in projects {
        table.add_row(vec![
            p.id.to_string(),
            p.name,
            p.from.format(&config.time_format).to_string(),
            p.to.format(&config.time_format).to_string(),
            p.users.join(", "),
        ]);
    }
    println!("{table}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_project_edit(store: &Store, company: String, id: u64, name: Option<String>, from: Option<String>, to: Option<String>, users: Option<Vec<String>>, silent: bool) -> Result<Project> {
    let from = from.map(|f| parse_field(&f, "from", false)).transpose()?;
    let to = to.map(|t| parse_field(&t, "to", true)).transpose()?;
    let project = store.update_project(&company, id, name, from, to, users)?;
    if !silent { println!("Project {} updated.", id); }
    Ok(project)
}

/// Removes a project. Its tasks stay in the store.
pub fn cmd_project_remove(store: &Store, company: String, id: u64, silent: bool) -> Result<()> {
    store.delete_project(&company, id)?;
    if !silent { println!("Project {} removed.", id); }
    Ok(())
}

pub fn cmd_assignee_add(store: &Store, name: String, silent: bool) -> Result<()> {
    let assignee = store.add_assignee(&name)?;
    if !silent { println!("Assignee '{}' added.", assignee.name); }
    Ok(())
}

pub fn cmd_assignee_list(store: &Store) -> Result<()> {
    let assignees = store.assignees()?;
    if assignees.is_empty() {
        println!("No assignees found.");
        return Ok(());
    }
    for a in assignees {
        println!("{}", a.name);
    }
    Ok(())
}

/// Adds a scheduled task.
///
/// Checks, in order: at least one assignee, parseable deadlines, `to` not
/// before `from`, then the project's schedule (range when enabled, and
/// assignee overlaps).
#[allow(clippy::too_many_arguments)]
pub fn cmd_task_add(
    store: &Store,
    config: &Config,
    company: String,
    project: u64,
    title: String,
    assignees: Vec<String>,
    from: String,
    to: String,
    customer: Option<String>,
    stage: Option<Stage>,
    color: Option<String>,
    silent: bool,
) -> Result<Task> {
    let assignees = normalize_names(assignees);
    if assignees.is_empty() {
        return Err(Error::InvalidInput("please select at least one assignee".into()));
    }
    let from = parse_field(&from, "from", false)?;
    let to = parse_field(&to, "to", false)?;
    Window::new(from, to)?;

    let draft = NewTask {
        company,
        project,
        title,
        stage: stage.unwrap_or_default(),
        assigned_to: assignees,
        customer: customer.unwrap_or_default(),
        deadline_from: Some(from),
        deadline_to: Some(to),
        color,
    };
    let task = store.create_task_checked(draft, config.enforce_project_range)?;
    if !silent { println!("Task added (id = {})", task.id); }
    Ok(task)
}

/// Edits a task in place. Schedule changes are checked against the rest of
/// the project, never against the task itself.
#[allow(clippy::too_many_arguments)]
pub fn cmd_task_edit(
    store: &Store,
    config: &Config,
    company: String,
    project: u64,
    id: u64,
    title: Option<String>,
    assignees: Option<Vec<String>>,
    from: Option<String>,
    to: Option<String>,
    customer: Option<String>,
    color: Option<String>,
    priority: Option<bool>,
    silent: bool,
) -> Result<Task> {
    let patch = TaskPatch {
        title,
        stage: None,
        assigned_to: assignees,
        customer,
        deadline_from: from.map(|f| parse_field(&f, "from", false)).transpose()?,
        deadline_to: to.map(|t| parse_field(&t, "to", false)).transpose()?,
        color,
        priority,
    };
    let task = store.update_task_checked(&company, project, id, &patch, config.enforce_project_range)?;
    if !silent { println!("Task {} updated.", id); }
    Ok(task)
}

/// Moves a task to another stage.
pub fn cmd_task_move(store: &Store, company: String, project: u64, id: u64, stage: Stage, silent: bool) -> Result<Task> {
    let patch = TaskPatch { stage: Some(stage), ..Default::default() };
    let task = store.update_task(&company, project, id, &patch)?;
    if !silent { println!("Task {} moved to {}.", id, stage); }
    Ok(task)
}

pub fn cmd_task_remove(store: &Store, company: String, project: u64, id: u64, silent: bool) -> Result<()> {
    store.delete_task(&company, project, id)?;
    if !silent { println!("Task {} removed.", id); }
    Ok(())
}

/// Keeps the tasks matching both filters, sorted by deadline start.
/// Unscheduled tasks go last.
pub fn filter_tasks(mut tasks: Vec<Task>, stage: Option<Stage>, assignee: Option<&str>) -> Vec<Task> {
    if let Some(s) = stage {
        tasks.retain(|t| t.stage == s);
    }
    if let Some(a) = assignee {
        tasks.retain(|t| t.assigned_to.iter().any(|n| n == a));
    }
    tasks.sort_by_key(|t| (t.deadline_from.is_none(), t.deadline_from, t.id));
    tasks
}

fn task_table(tasks: &[Task], time_format: &str) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Assignees").add_attribute(Attribute::Bold),
            Cell::new("Customer").add_attribute(Attribute::Bold),
            Cell::new("From").add_attribute(Attribute::Bold),
            Cell::new("To").add_attribute(Attribute::Bold),
            Cell::new("Color").add_attribute(Attribute::Bold),
        ]);

    for t in tasks {
        let stage_color = match t.stage {
            Stage::Unstarted => Color::Grey,
            Stage::Begin => Color::Yellow,
            Stage::Intermediate => Color::Cyan,
            Stage::Completed => Color::Green,
        };
        let title = if t.priority { format!("* {}", t.title) } else { t.title.clone() };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(title),
            Cell::new(t.stage).fg(stage_color),
            Cell::new(t.assigned_to.join(", ")),
            Cell::new(&t.customer),
            Cell::new(fmt_opt(t.deadline_from, time_format)),
            Cell::new(fmt_opt(t.deadline_to, time_format)),
            Cell::new(&t.color),
        ]);
    }
    table
}

/// Lists a project's tasks, optionally filtered by stage and assignee.
pub fn cmd_task_list(store: &Store, config: &Config, company: String, project: u64, stage: Option<Stage>, assignee: Option<String>) -> Result<()> {
    store.project(&company, project)?;
    let tasks = filter_tasks(store.tasks(&company, project)?, stage, assignee.as_deref());
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    println!("{}", task_table(&tasks, &config.time_format));
    Ok(())
}

/// Reprints a project's task list whenever the store file changes. Runs until
/// interrupted.
pub fn cmd_task_watch(store: &Store, config: &Config, company: String, project: u64) -> Result<()> {
    store.project(&company, project)?;
    let interval = Duration::from_millis(config.watch_interval_ms.max(50));
    info!(company = %company, project, ?interval, "watching tasks");
    let mut last: Option<Vec<Task>> = None;
    loop {
        let tasks = store.tasks(&company, project)?;
        if last.as_ref() != Some(&tasks) {
            debug!(count = tasks.len(), "task snapshot changed");
            if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                println!("{}", task_table(&tasks, &config.time_format));
            }
            last = Some(tasks);
        }
        thread::sleep(interval);
    }
}

/// Stage counts for one assignee, indexed like [`Stage::ALL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssigneeStages {
    pub assignee: String,
    pub counts: [usize; 4],
}

/// Progress overview of a project's tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
    pub total: usize,
    pub completed: usize,
    /// Per-assignee stage counts, in order of first appearance. A task with
    /// several assignees counts once for each of them.
    pub by_assignee: Vec<AssigneeStages>,
    /// Mean of the tasks' stage progress, 0 to 100.
    pub average_progress: f64,
}

impl ProjectSummary {
    pub fn pending(&self) -> usize {
        self.total - self.completed
    }

    /// Share of completed tasks, 0 to 100. Zero for an empty project.
    pub fn completion_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }
}

fn stage_index(stage: Stage) -> usize {
    Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0)
}

pub fn summarize(tasks: &[Task]) -> ProjectSummary {
    let mut by_assignee: Vec<AssigneeStages> = Vec::new();
    for t in tasks {
        let idx = stage_index(t.stage);
        for name in &t.assigned_to {
            match by_assignee.iter_mut().find(|a| &a.assignee == name) {
                Some(row) => row.counts[idx] += 1,
                None => {
                    let mut counts = [0; 4];
                    counts[idx] = 1;
                    by_assignee.push(AssigneeStages { assignee: name.clone(), counts });
                }
            }
        }
    }
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.stage == Stage::Completed).count();
    let average_progress = if total == 0 {
        0.0
    } else {
        tasks.iter().map(|t| f64::from(t.stage.progress())).sum::<f64>() / total as f64
    };
    ProjectSummary { total, completed, by_assignee, average_progress }
}

fn summary_table(summary: &ProjectSummary) -> Table {
    let mut header = vec![Cell::new("Assignee").add_attribute(Attribute::Bold)];
    header.extend(Stage::ALL.iter().map(|s| Cell::new(s).add_attribute(Attribute::Bold)));
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    for row in &summary.by_assignee {
        let mut cells = vec![Cell::new(&row.assignee)];
        cells.extend(row.counts.iter().map(|c| Cell::new(c)));
        table.add_row(cells);
    }
    table
}

/// Prints per-assignee stage counts and the completion rate of a project.
pub fn cmd_task_summary(store: &Store, company: String, project: u64, silent: bool) -> Result<ProjectSummary> {
    store.project(&company, project)?;
    let summary = summarize(&store.tasks(&company, project)?);
    if silent {
        return Ok(summary);
    }
    if summary.total == 0 {
        println!("No tasks found.");
        return Ok(summary);
    }
    if !summary.by_assignee.is_empty() {
        println!("{}", summary_table(&summary));
    }
    println!(
        "Completed: {:.0}% ({} of {}), pending: {}, average progress: {:.0}%",
        summary.completion_percent(),
        summary.completed,
        summary.total,
        summary.pending(),
        summary.average_progress
    );
    Ok(summary)
}

/// Dry-runs the conflict check for a proposed booking without writing.
///
/// Lookup and parse failures are errors; the verdict itself is returned as
/// data.
#[allow(clippy::too_many_arguments)]
pub fn cmd_check(
    store: &Store,
    config: &Config,
    company: String,
    project: u64,
    assignees: Vec<String>,
    from: String,
    to: String,
    exclude: Option<u64>,
    no_range: bool,
    silent: bool,
) -> Result<ConflictResult> {
    let from = parse_field(&from, "from", false)?;
    let to = parse_field(&to, "to", false)?;
    let window = Window::new(from, to)?;
    let proj = store.project(&company, project)?;
    let range = if config.enforce_project_range && !no_range {
        Some(proj.range().ok_or_else(|| {
            Error::InvalidInput(format!("project {} does not have a valid date range", proj.id))
        })?)
    } else {
        None
    };
    let tasks = store.tasks(&company, project)?;
    let assignees = normalize_names(assignees);
    let candidate = Candidate { assignees: &assignees, window, exclude_task_id: exclude };
    let verdict = check_conflict(&candidate, bookings(&tasks), range);
    if !silent {
        match &verdict {
            Ok(()) => println!("No conflicts."),
            Err(conflict) => println!("Conflict: {}", conflict),
        }
    }
    Ok(verdict)
}

/// Deletes the whole store file.
pub fn cmd_reset(store: &Store, force: bool) -> Result<()> {
    if !force {
        print!("Are you sure you want to delete all companies, projects and tasks? This cannot be undone. [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
    }
    store.reset()?;
    println!("Database reset successfully.");
    Ok(())
}
