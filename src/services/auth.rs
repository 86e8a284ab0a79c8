use super::error::ServiceError;
use crate::db::DbPool;
use crate::models::{NewUser, User};
use crate::schema::users;
use bcrypt::{hash, verify};
use chrono::Utc;
use diesel::prelude::*;

const MAX_USERNAME_LEN: usize = 150;
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Trims the username and checks both fields are present.
fn validate_credentials<'a>(
    username: Option<&'a str>,
    password: Option<&'a str>,
) -> Result<(&'a str, &'a str), ServiceError> {
    let username = username.map(str::trim).unwrap_or_default();
    let password = password.unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(ServiceError::invalid("Missing username or password"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ServiceError::invalid(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok((username, password))
}

pub fn register_user(
    pool: &DbPool,
    bcrypt_cost: u32,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<User, ServiceError> {
    let (username, password) = validate_credentials(username, password)?;
    let mut conn = pool.get()?;

    // Check if user already exists
    let existing_user = users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first::<User>(&mut conn)
        .optional()?;

    if existing_user.is_some() {
        return Err(ServiceError::Conflict("Username already exists".to_string()));
    }

    let hashed_password = hash(password, bcrypt_cost)?;

    let new_user = NewUser {
        username,
        password_hash: &hashed_password,
        created_at: Utc::now().naive_utc(),
    };

    // A concurrent registration can still win the race; the unique index catches it.
    let user = diesel::insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result::<User>(&mut conn)
        .map_err(|err| match ServiceError::from(err) {
            ServiceError::Conflict(_) => ServiceError::Conflict("Username already exists".to_string()),
            other => other,
        })?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Checks a username/password pair. Unknown users and wrong passwords fail the same way.
pub fn authenticate(
    pool: &DbPool,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<User, ServiceError> {
    let (username, password) = validate_credentials(username, password)?;
    let mut conn = pool.get()?;

    let found_user = users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first::<User>(&mut conn)
        .optional()?;

    match found_user {
        Some(user) if verify(password, &user.password_hash)? => Ok(user),
        _ => {
            tracing::info!(username, "login rejected");
            Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))
        }
    }
}
