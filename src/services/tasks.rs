use super::error::ServiceError;
use crate::db::DbPool;
use crate::models::{
    CreateTaskRequest, NewTask, Patch, Task, TaskChanges, TaskStatus, TaskView, UpdateTaskRequest,
};
use crate::schema::{categories, tasks};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

const MAX_TITLE_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Optional, AND-combined filters for listing tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    /// Compared verbatim with the stored status; an unknown value matches nothing.
    pub status: Option<String>,
    pub category_id: Option<i32>,
    pub due_date: Option<NaiveDate>,
}

impl TaskFilter {
    /// Builds a filter from raw query values. Empty values mean "no filter". The
    /// status is kept verbatim, so surrounding whitespace makes it match nothing.
    pub fn parse(
        status: Option<&str>,
        category_id: Option<&str>,
        due_date: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let status = status.filter(|s| !s.is_empty()).map(str::to_string);
        let category_id = non_blank(category_id)
            .map(|raw| {
                raw.parse::<i32>()
                    .map_err(|_| ServiceError::invalid(format!("Invalid category_id {raw:?}")))
            })
            .transpose()?;
        let due_date = non_blank(due_date).map(parse_due_date).transpose()?;

        Ok(TaskFilter {
            status,
            category_id,
            due_date,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_due_date(raw: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        ServiceError::invalid(format!("Invalid due_date {raw:?}, expected YYYY-MM-DD"))
    })
}

fn validate_title(raw: &str) -> Result<&str, ServiceError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ServiceError::invalid("Missing task title"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ServiceError::invalid(format!(
            "Task title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title)
}

fn validate_description(raw: &str) -> Result<Option<&str>, ServiceError> {
    let description = raw.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ServiceError::invalid(format!(
            "Task description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(Some(description).filter(|d| !d.is_empty()))
}

/// A task may only be filed under one of its owner's categories.
fn ensure_category_owned(
    conn: &mut SqliteConnection,
    category_id: i32,
    user_id: i32,
) -> Result<(), ServiceError> {
    let owner = categories::table
        .find(category_id)
        .select(categories::user_id)
        .first::<i32>(conn)
        .optional()?;

    match owner {
        Some(owner) if owner == user_id => Ok(()),
        _ => Err(ServiceError::invalid(format!("Unknown category {category_id}"))),
    }
}

/// Existence check, then ownership check.
fn load_owned(conn: &mut SqliteConnection, task_id: i32, user_id: i32) -> Result<Task, ServiceError> {
    let task = tasks::table
        .find(task_id)
        .select(Task::as_select())
        .first::<Task>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound(format!("Task {task_id} not found")))?;

    if task.user_id != user_id {
        tracing::warn!(task_id, user_id, "task access denied");
        return Err(ServiceError::Forbidden("Unauthorized".to_string()));
    }
    Ok(task)
}

fn view_of(conn: &mut SqliteConnection, task: Task) -> Result<TaskView, ServiceError> {
    let category = match task.category_id {
        Some(category_id) => categories::table
            .find(category_id)
            .select(categories::category_name)
            .first::<String>(conn)
            .optional()?,
        None => None,
    };
    Ok(TaskView::new(task, category))
}

pub fn create_task(
    pool: &DbPool,
    user_id: i32,
    create_req: &CreateTaskRequest,
) -> Result<TaskView, ServiceError> {
    let title = validate_title(create_req.title.as_deref().unwrap_or_default())?;
    let description = create_req
        .description
        .as_deref()
        .map(validate_description)
        .transpose()?
        .flatten();
    let due_date = non_blank(create_req.due_date.as_deref())
        .map(parse_due_date)
        .transpose()?;

    let mut conn = pool.get()?;
    if let Some(category_id) = create_req.category_id {
        ensure_category_owned(&mut conn, category_id, user_id)?;
    }

    let new_task = NewTask {
        title,
        description,
        due_date,
        status: TaskStatus::Pending,
        user_id,
        category_id: create_req.category_id,
        created_at: Utc::now().naive_utc(),
    };

    let task = diesel::insert_into(tasks::table)
        .values(&new_task)
        .returning(Task::as_returning())
        .get_result::<Task>(&mut conn)?;

    tracing::debug!(task_id = task.id, user_id, "task created");
    view_of(&mut conn, task)
}

pub fn get_task(pool: &DbPool, user_id: i32, task_id: i32) -> Result<TaskView, ServiceError> {
    let mut conn = pool.get()?;
    let task = load_owned(&mut conn, task_id, user_id)?;
    view_of(&mut conn, task)
}

pub fn list_tasks(
    pool: &DbPool,
    user_id: i32,
    filter: &TaskFilter,
) -> Result<Vec<TaskView>, ServiceError> {
    let mut conn = pool.get()?;

    let mut query = tasks::table
        .left_join(categories::table)
        .filter(tasks::user_id.eq(user_id))
        .select((Task::as_select(), categories::category_name.nullable()))
        .order(tasks::id.asc())
        .into_boxed();

    if let Some(ref status_filter) = filter.status {
        query = query.filter(tasks::status.eq(status_filter.clone()));
    }
    if let Some(category_filter) = filter.category_id {
        query = query.filter(tasks::category_id.eq(category_filter));
    }
    if let Some(due_filter) = filter.due_date {
        query = query.filter(tasks::due_date.eq(due_filter));
    }

    let rows = query.load::<(Task, Option<String>)>(&mut conn)?;
    Ok(rows
        .into_iter()
        .map(|(task, category)| TaskView::new(task, category))
        .collect())
}

/// Validates every field of the request before anything is written.
fn build_changes(
    conn: &mut SqliteConnection,
    user_id: i32,
    update_req: UpdateTaskRequest,
) -> Result<TaskChanges, ServiceError> {
    let title = match update_req.title {
        Patch::Absent => None,
        Patch::Null => return Err(ServiceError::invalid("Task title cannot be null")),
        Patch::Value(raw) => Some(validate_title(&raw)?.to_string()),
    };

    let description = match update_req.description {
        Patch::Absent => None,
        Patch::Null => Some(None),
        Patch::Value(raw) => Some(validate_description(&raw)?.map(str::to_string)),
    };

    let due_date = match update_req.due_date {
        Patch::Absent => None,
        Patch::Null => Some(None),
        Patch::Value(raw) => Some(non_blank(Some(raw.as_str())).map(parse_due_date).transpose()?),
    };

    let status = match update_req.status {
        Patch::Absent => None,
        Patch::Null => return Err(ServiceError::invalid("Task status cannot be null")),
        Patch::Value(raw) => Some(raw.parse::<TaskStatus>()?),
    };

    let category_id = match update_req.category_id {
        Patch::Absent => None,
        Patch::Null => Some(None),
        Patch::Value(category_id) => {
            ensure_category_owned(conn, category_id, user_id)?;
            Some(Some(category_id))
        }
    };

    Ok(TaskChanges {
        title,
        description,
        due_date,
        status,
        category_id,
    })
}

pub fn update_task(
    pool: &DbPool,
    user_id: i32,
    task_id: i32,
    update_req: UpdateTaskRequest,
) -> Result<TaskView, ServiceError> {
    let mut conn = pool.get()?;
    let task = load_owned(&mut conn, task_id, user_id)?;
    let changes = build_changes(&mut conn, user_id, update_req)?;

    if changes.is_empty() {
        return view_of(&mut conn, task);
    }

    let updated = diesel::update(tasks::table.find(task.id))
        .set(changes)
        .returning(Task::as_returning())
        .get_result::<Task>(&mut conn)?;

    tracing::debug!(task_id, user_id, status = %updated.status, "task updated");
    view_of(&mut conn, updated)
}

pub fn complete_task(pool: &DbPool, user_id: i32, task_id: i32) -> Result<TaskView, ServiceError> {
    let mut conn = pool.get()?;
    let task = load_owned(&mut conn, task_id, user_id)?;

    if task.status == TaskStatus::Completed {
        return view_of(&mut conn, task);
    }

    let updated = diesel::update(tasks::table.find(task.id))
        .set(tasks::status.eq(TaskStatus::Completed))
        .returning(Task::as_returning())
        .get_result::<Task>(&mut conn)?;
    view_of(&mut conn, updated)
}

pub fn delete_task(pool: &DbPool, user_id: i32, task_id: i32) -> Result<(), ServiceError> {
    let mut conn = pool.get()?;
    let task = load_owned(&mut conn, task_id, user_id)?;

    diesel::delete(tasks::table.find(task.id)).execute(&mut conn)?;
    tracing::debug!(task_id, user_id, "task deleted");
    Ok(())
}
