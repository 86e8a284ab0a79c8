use super::error::ServiceError;
use crate::db::DbPool;
use crate::models::{Category, CategoryView, NewCategory};
use crate::schema::{categories, tasks};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::ops::RangeInclusive;

/// Accepted length of a category name, in characters, after trimming.
pub const CATEGORY_NAME_LEN: RangeInclusive<usize> = 4..=20;

pub fn validate_category_name(raw: Option<&str>) -> Result<&str, ServiceError> {
    let name = raw.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ServiceError::invalid("Missing category_name"));
    }
    if !CATEGORY_NAME_LEN.contains(&name.chars().count()) {
        return Err(ServiceError::invalid(format!(
            "Category name must be between {} and {} characters",
            CATEGORY_NAME_LEN.start(),
            CATEGORY_NAME_LEN.end()
        )));
    }
    Ok(name)
}

pub fn create_category(
    pool: &DbPool,
    user_id: i32,
    category_name: Option<&str>,
) -> Result<CategoryView, ServiceError> {
    let name = validate_category_name(category_name)?;
    let mut conn = pool.get()?;

    let category = diesel::insert_into(categories::table)
        .values(&NewCategory {
            category_name: name,
            user_id,
        })
        .returning(Category::as_returning())
        .get_result::<Category>(&mut conn)?;

    tracing::debug!(category_id = category.id, user_id, "category created");
    Ok(category.into())
}

pub fn list_categories(pool: &DbPool, user_id: i32) -> Result<Vec<CategoryView>, ServiceError> {
    let mut conn = pool.get()?;
    let rows = categories::table
        .filter(categories::user_id.eq(user_id))
        .order(categories::id.asc())
        .select(Category::as_select())
        .load::<Category>(&mut conn)?;
    Ok(rows.into_iter().map(CategoryView::from).collect())
}

fn load_owned(
    conn: &mut SqliteConnection,
    category_id: i32,
    user_id: i32,
) -> Result<Category, ServiceError> {
    let category = categories::table
        .find(category_id)
        .select(Category::as_select())
        .first::<Category>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound(format!("Category {category_id} not found")))?;

    if category.user_id != user_id {
        tracing::warn!(category_id, user_id, "category access denied");
        return Err(ServiceError::Forbidden("Unauthorized".to_string()));
    }
    Ok(category)
}

/// Deletes a category. Tasks filed under it stay, with their category cleared.
/// Returns how many tasks were detached.
pub fn delete_category(pool: &DbPool, user_id: i32, category_id: i32) -> Result<usize, ServiceError> {
    let mut pooled = pool.get()?;
    let conn: &mut SqliteConnection = &mut pooled;

    conn.transaction::<_, ServiceError, _>(|conn| {
        let category = load_owned(conn, category_id, user_id)?;

        let detached = diesel::update(tasks::table.filter(tasks::category_id.eq(category.id)))
            .set(tasks::category_id.eq(None::<i32>))
            .execute(conn)?;
        diesel::delete(categories::table.find(category.id)).execute(conn)?;

        tracing::debug!(category_id, user_id, detached, "category deleted");
        Ok(detached)
    })
}
