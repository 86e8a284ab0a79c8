// task_manager/src/api.rs
use crate::models::{
    AuthRequest, CategoryView, CreateCategoryRequest, CreateTaskRequest, LoginResponse,
    MessageResponse, TaskView, UpdateTaskRequest, UserInfo,
};
use crate::services::{self, ApiError, ErrorDetail, ServiceError};
use crate::session::{clear_session_cookie, session_cookie, AuthError, CurrentUser, SessionToken};
use crate::services::tasks::TaskFilter;
use crate::TaskApp;
use rocket::http::{CookieJar, Status};
use rocket::request::Request;
use rocket::serde::json::Json;
use rocket::{catch, catchers, delete, get, patch, post, put, routes, Catcher, Route, State};

type ApiResult<T> = Result<T, ApiError>;

#[get("/")]
pub fn index() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to the Task Manager API"))
}

#[post("/register", data = "<body>")]
pub fn register(
    body: Option<Json<AuthRequest>>,
    app: &State<TaskApp>,
) -> ApiResult<(Status, Json<UserInfo>)> {
    let req = body.map(Json::into_inner).unwrap_or_default();
    let user = services::auth::register_user(
        &app.pool,
        app.bcrypt_cost,
        req.username.as_deref(),
        req.password.as_deref(),
    )?;
    Ok((Status::Created, Json(user.into())))
}

#[post("/login", data = "<body>")]
pub fn login(
    body: Option<Json<AuthRequest>>,
    previous: Option<SessionToken>,
    app: &State<TaskApp>,
    cookies: &CookieJar<'_>,
) -> ApiResult<Json<LoginResponse>> {
    let req = body.map(Json::into_inner).unwrap_or_default();
    let user = services::auth::authenticate(&app.pool, req.username.as_deref(), req.password.as_deref())?;

    let previous = previous.map(|SessionToken(token)| token);
    let session_token = app.sessions.rotate(previous.as_deref(), user.id);
    cookies.add(session_cookie(session_token.clone()));
    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(LoginResponse {
        session_token,
        user_id: user.id,
        username: user.username,
    }))
}

/// Always succeeds, whether or not the caller had a live session.
#[post("/logout")]
pub fn logout(
    token: Option<SessionToken>,
    app: &State<TaskApp>,
    cookies: &CookieJar<'_>,
) -> Json<MessageResponse> {
    if let Some(SessionToken(token)) = token {
        if let Some(user_id) = app.sessions.revoke(&token) {
            tracing::info!(user_id, "user logged out");
        }
    }
    clear_session_cookie(cookies);
    Json(MessageResponse::new("Logged out successfully"))
}

#[post("/tasks", data = "<body>")]
pub fn create_task(
    user: CurrentUser,
    app: &State<TaskApp>,
    body: Option<Json<CreateTaskRequest>>,
) -> ApiResult<(Status, Json<TaskView>)> {
    let Some(Json(req)) = body else {
        return Err(ServiceError::invalid("Missing task data").into());
    };
    let task = services::tasks::create_task(&app.pool, user.user_id, &req)?;
    Ok((Status::Created, Json(task)))
}

#[get("/tasks?<status>&<category_id>&<due_date>")]
pub fn list_tasks(
    user: CurrentUser,
    app: &State<TaskApp>,
    status: Option<&str>,
    category_id: Option<&str>,
    due_date: Option<&str>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let filter = TaskFilter::parse(status, category_id, due_date)?;
    let tasks = services::tasks::list_tasks(&app.pool, user.user_id, &filter)?;
    Ok(Json(tasks))
}

#[get("/tasks/<id>")]
pub fn get_task(id: i32, user: CurrentUser, app: &State<TaskApp>) -> ApiResult<Json<TaskView>> {
    Ok(Json(services::tasks::get_task(&app.pool, user.user_id, id)?))
}

#[put("/tasks/<id>", data = "<body>")]
pub fn update_task(
    id: i32,
    user: CurrentUser,
    app: &State<TaskApp>,
    body: Option<Json<UpdateTaskRequest>>,
) -> ApiResult<Json<TaskView>> {
    let Some(Json(req)) = body else {
        return Err(ServiceError::invalid("Missing or malformed task data").into());
    };
    let task = services::tasks::update_task(&app.pool, user.user_id, id, req)?;
    Ok(Json(task))
}

#[patch("/tasks/<id>/complete")]
pub fn complete_task(id: i32, user: CurrentUser, app: &State<TaskApp>) -> ApiResult<Json<TaskView>> {
    Ok(Json(services::tasks::complete_task(&app.pool, user.user_id, id)?))
}

#[delete("/tasks/<id>")]
pub fn delete_task(id: i32, user: CurrentUser, app: &State<TaskApp>) -> ApiResult<Json<MessageResponse>> {
    services::tasks::delete_task(&app.pool, user.user_id, id)?;
    Ok(Json(MessageResponse::new(format!("Task {id} deleted successfully"))))
}

#[get("/categories")]
pub fn list_categories(user: CurrentUser, app: &State<TaskApp>) -> ApiResult<Json<Vec<CategoryView>>> {
    Ok(Json(services::categories::list_categories(&app.pool, user.user_id)?))
}

#[post("/categories", data = "<body>")]
pub fn create_category(
    user: CurrentUser,
    app: &State<TaskApp>,
    body: Option<Json<CreateCategoryRequest>>,
) -> ApiResult<(Status, Json<CategoryView>)> {
    let req = body.map(Json::into_inner).unwrap_or_default();
    let category =
        services::categories::create_category(&app.pool, user.user_id, req.category_name.as_deref())?;
    Ok((Status::Created, Json(category)))
}

#[delete("/categories/<id>")]
pub fn delete_category(
    id: i32,
    user: CurrentUser,
    app: &State<TaskApp>,
) -> ApiResult<Json<MessageResponse>> {
    services::categories::delete_category(&app.pool, user.user_id, id)?;
    Ok(Json(MessageResponse::new(format!("Category {id} deleted successfully"))))
}

pub fn routes() -> Vec<Route> {
    routes![
        index,
        register,
        login,
        logout,
        create_task,
        list_tasks,
        get_task,
        update_task,
        complete_task,
        delete_task,
        list_categories,
        create_category,
        delete_category,
    ]
}

#[catch(401)] // Catches Unauthorized
fn unauthorized_catcher(req: &Request<'_>) -> Json<ErrorDetail> {
    match req.local_cache(|| None::<AuthError>) {
        Some(err) => Json(ErrorDetail::new(err.code(), err.message())),
        None => Json(ErrorDetail::new(
            "unauthorized",
            "Access denied. Valid authentication token required.",
        )),
    }
}

#[catch(400)]
fn bad_request_catcher() -> Json<ErrorDetail> {
    Json(ErrorDetail::new("invalid_input", "The request could not be understood."))
}

#[catch(404)]
fn not_found_catcher(req: &Request<'_>) -> Json<ErrorDetail> {
    Json(ErrorDetail::new(
        "not_found",
        format!("No API route for {} {}", req.method(), req.uri().path()),
    ))
}

#[catch(422)]
fn unprocessable_catcher() -> Json<ErrorDetail> {
    Json(ErrorDetail::new("invalid_input", "The request contained invalid parameters."))
}

#[catch(500)] // Catches Internal Server Error
fn internal_server_error_catcher(req: &Request<'_>) -> Json<ErrorDetail> {
    match req.local_cache(|| None::<AuthError>) {
        Some(AuthError::NoSessionState) => Json(ErrorDetail::new(
            AuthError::NoSessionState.code(),
            AuthError::NoSessionState.message(),
        )),
        _ => Json(ErrorDetail::new(
            "internal_server_error",
            "An unexpected error occurred on the server.",
        )),
    }
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> Json<ErrorDetail> {
    Json(ErrorDetail::new(
        "error",
        status.reason().unwrap_or("Unexpected error").to_string(),
    ))
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        unauthorized_catcher,
        bad_request_catcher,
        not_found_catcher,
        unprocessable_catcher,
        internal_server_error_catcher,
        default_catcher,
    ]
}
