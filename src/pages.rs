// task_manager/src/pages.rs
//
// Server-rendered pages over the same services as the JSON API.
use crate::models::{CreateTaskRequest, Patch, TaskStatus, UpdateTaskRequest};
use crate::services::tasks::TaskFilter;
use crate::services::{self, ServiceError};
use crate::session::{clear_session_cookie, session_cookie, CurrentUser, SessionToken};
use crate::TaskApp;
use rocket::form::Form;
use rocket::http::{CookieJar, Status};
use rocket::request::{FlashMessage, Request};
use rocket::response::status::Custom;
use rocket::response::{Flash, Redirect};
use rocket::{catch, catchers, get, post, routes, Catcher, FromForm, Responder, Route, State};
use rocket_dyn_templates::{context, Template};
use serde::Serialize;

#[derive(Responder)]
pub enum PageResponse {
    Page(Template),
    Redirect(Redirect),
    Flash(Flash<Redirect>),
    Error(Custom<Template>),
}

#[derive(Serialize)]
struct FlashView {
    kind: String,
    message: String,
}

fn flash_view(flash: Option<FlashMessage<'_>>) -> Option<FlashView> {
    flash.map(|f| FlashView {
        kind: f.kind().to_string(),
        message: f.message().to_string(),
    })
}

fn login_redirect() -> PageResponse {
    PageResponse::Redirect(Redirect::to("/login"))
}

fn error_page(status: Status, message: &str) -> PageResponse {
    PageResponse::Error(Custom(
        status,
        Template::render(
            "error",
            context! { status: status.code, message: message, logged_in: true },
        ),
    ))
}

/// Validation problems go back to the form as a flash message; anything else gets an
/// error page with the matching status.
fn service_failure(err: ServiceError, back_to: &str) -> PageResponse {
    match err {
        ServiceError::InvalidInput(_) | ServiceError::Conflict(_) | ServiceError::Unauthorized(_) => {
            PageResponse::Flash(Flash::error(Redirect::to(back_to.to_string()), err.message()))
        }
        other => error_page(other.status(), &other.message()),
    }
}

#[derive(FromForm, Debug)]
pub struct CredentialsForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(FromForm, Debug, Default)]
pub struct TaskForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub category_id: Option<String>,
    pub status: Option<String>,
}

fn parse_category_choice(raw: Option<&str>) -> Result<Option<i32>, ServiceError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<i32>()
            .map(Some)
            .map_err(|_| ServiceError::invalid(format!("Invalid category {raw:?}"))),
        None => Ok(None),
    }
}

impl TaskForm {
    fn into_create_request(self) -> Result<CreateTaskRequest, ServiceError> {
        Ok(CreateTaskRequest {
            category_id: parse_category_choice(self.category_id.as_deref())?,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
        })
    }

    /// A submitted edit form carries every field; blank optional fields clear the value.
    fn into_update_request(self) -> Result<UpdateTaskRequest, ServiceError> {
        let category_id = match parse_category_choice(self.category_id.as_deref())? {
            Some(id) => Patch::Value(id),
            None => Patch::Null,
        };
        Ok(UpdateTaskRequest {
            title: Patch::Value(self.title.unwrap_or_default()),
            description: self.description.map_or(Patch::Null, Patch::Value),
            due_date: self.due_date.map_or(Patch::Null, Patch::Value),
            category_id,
            status: self.status.map_or(Patch::Absent, Patch::Value),
        })
    }
}

#[derive(FromForm, Debug)]
pub struct CategoryForm {
    pub category_name: Option<String>,
}

#[get("/")]
pub fn home(user: Option<CurrentUser>) -> Redirect {
    match user {
        Some(_) => Redirect::to("/tasks"),
        None => Redirect::to("/login"),
    }
}

#[get("/register")]
pub fn register_page(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render("register", context! { flash: flash_view(flash), logged_in: false })
}

#[post("/register", data = "<form>")]
pub fn register_submit(form: Form<CredentialsForm>, app: &State<TaskApp>) -> PageResponse {
    match services::auth::register_user(
        &app.pool,
        app.bcrypt_cost,
        form.username.as_deref(),
        form.password.as_deref(),
    ) {
        Ok(_) => PageResponse::Flash(Flash::success(
            Redirect::to("/login"),
            "Account created, please log in.",
        )),
        Err(err) => service_failure(err, "/register"),
    }
}

#[get("/login")]
pub fn login_page(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render("login", context! { flash: flash_view(flash), logged_in: false })
}

#[post("/login", data = "<form>")]
pub fn login_submit(
    form: Form<CredentialsForm>,
    previous: Option<SessionToken>,
    app: &State<TaskApp>,
    cookies: &CookieJar<'_>,
) -> PageResponse {
    match services::auth::authenticate(&app.pool, form.username.as_deref(), form.password.as_deref()) {
        Ok(user) => {
            let previous = previous.map(|SessionToken(token)| token);
            cookies.add(session_cookie(app.sessions.rotate(previous.as_deref(), user.id)));
            tracing::info!(user_id = user.id, "user logged in");
            PageResponse::Redirect(Redirect::to("/tasks"))
        }
        Err(err) => service_failure(err, "/login"),
    }
}

#[post("/logout")]
pub fn logout_submit(
    token: Option<SessionToken>,
    app: &State<TaskApp>,
    cookies: &CookieJar<'_>,
) -> Flash<Redirect> {
    if let Some(SessionToken(token)) = token {
        if let Some(user_id) = app.sessions.revoke(&token) {
            tracing::info!(user_id, "user logged out");
        }
    }
    clear_session_cookie(cookies);
    Flash::success(Redirect::to("/login"), "Logged out successfully.")
}

#[get("/tasks?<status>&<category_id>&<due_date>")]
pub fn tasks_page(
    user: Option<CurrentUser>,
    app: &State<TaskApp>,
    flash: Option<FlashMessage<'_>>,
    status: Option<&str>,
    category_id: Option<&str>,
    due_date: Option<&str>,
) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };

    let filter = match TaskFilter::parse(status, category_id, due_date) {
        Ok(filter) => filter,
        Err(err) => return service_failure(err, "/tasks"),
    };
    let listing = services::tasks::list_tasks(&app.pool, user.user_id, &filter)
        .and_then(|tasks| {
            services::categories::list_categories(&app.pool, user.user_id)
                .map(|categories| (tasks, categories))
        });

    match listing {
        Ok((tasks, categories)) => PageResponse::Page(Template::render(
            "tasks",
            context! {
                tasks: tasks,
                categories: categories,
                statuses: TaskStatus::ALL,
                filter_status: filter.status,
                filter_category: filter.category_id,
                filter_due_date: filter.due_date.map(|d| d.to_string()),
                flash: flash_view(flash),
                logged_in: true,
            },
        )),
        Err(err) => service_failure(err, "/tasks"),
    }
}

#[get("/tasks/new")]
pub fn new_task_page(
    user: Option<CurrentUser>,
    app: &State<TaskApp>,
    flash: Option<FlashMessage<'_>>,
) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };
    match services::categories::list_categories(&app.pool, user.user_id) {
        Ok(categories) => PageResponse::Page(Template::render(
            "task_form",
            context! {
                task: Option::<()>::None,
                categories: categories,
                statuses: TaskStatus::ALL,
                action: "/tasks",
                flash: flash_view(flash),
                logged_in: true,
            },
        )),
        Err(err) => service_failure(err, "/tasks"),
    }
}

#[post("/tasks", data = "<form>")]
pub fn create_task_submit(
    user: Option<CurrentUser>,
    app: &State<TaskApp>,
    form: Form<TaskForm>,
) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };
    let created = form
        .into_inner()
        .into_create_request()
        .and_then(|req| services::tasks::create_task(&app.pool, user.user_id, &req));
    match created {
        Ok(task) => PageResponse::Flash(Flash::success(
            Redirect::to("/tasks"),
            format!("Task \"{}\" created.", task.title),
        )),
        Err(err) => service_failure(err, "/tasks/new"),
    }
}

#[get("/tasks/<id>/edit")]
pub fn edit_task_page(
    id: i32,
    user: Option<CurrentUser>,
    app: &State<TaskApp>,
    flash: Option<FlashMessage<'_>>,
) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };
    let loaded = services::tasks::get_task(&app.pool, user.user_id, id).and_then(|task| {
        services::categories::list_categories(&app.pool, user.user_id)
            .map(|categories| (task, categories))
    });
    match loaded {
        Ok((task, categories)) => PageResponse::Page(Template::render(
            "task_form",
            context! {
                action: format!("/tasks/{id}"),
                task: task,
                categories: categories,
                statuses: TaskStatus::ALL,
                flash: flash_view(flash),
                logged_in: true,
            },
        )),
        Err(err) => service_failure(err, "/tasks"),
    }
}

#[post("/tasks/<id>", data = "<form>")]
pub fn update_task_submit(
    id: i32,
    user: Option<CurrentUser>,
    app: &State<TaskApp>,
    form: Form<TaskForm>,
) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };
    let updated = form
        .into_inner()
        .into_update_request()
        .and_then(|req| services::tasks::update_task(&app.pool, user.user_id, id, req));
    match updated {
        Ok(_) => PageResponse::Flash(Flash::success(Redirect::to("/tasks"), "Task updated.")),
        Err(err) => service_failure(err, &format!("/tasks/{id}/edit")),
    }
}

#[post("/tasks/<id>/complete")]
pub fn complete_task_submit(id: i32, user: Option<CurrentUser>, app: &State<TaskApp>) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };
    match services::tasks::complete_task(&app.pool, user.user_id, id) {
        Ok(_) => PageResponse::Flash(Flash::success(Redirect::to("/tasks"), "Task marked as completed.")),
        Err(err) => service_failure(err, "/tasks"),
    }
}

#[post("/tasks/<id>/delete")]
pub fn delete_task_submit(id: i32, user: Option<CurrentUser>, app: &State<TaskApp>) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };
    match services::tasks::delete_task(&app.pool, user.user_id, id) {
        Ok(()) => PageResponse::Flash(Flash::success(Redirect::to("/tasks"), "Task deleted.")),
        Err(err) => service_failure(err, "/tasks"),
    }
}

#[get("/categories")]
pub fn categories_page(
    user: Option<CurrentUser>,
    app: &State<TaskApp>,
    flash: Option<FlashMessage<'_>>,
) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };
    match services::categories::list_categories(&app.pool, user.user_id) {
        Ok(categories) => PageResponse::Page(Template::render(
            "categories",
            context! { categories: categories, flash: flash_view(flash), logged_in: true },
        )),
        Err(err) => service_failure(err, "/categories"),
    }
}

#[post("/categories", data = "<form>")]
pub fn create_category_submit(
    user: Option<CurrentUser>,
    app: &State<TaskApp>,
    form: Form<CategoryForm>,
) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };
    match services::categories::create_category(&app.pool, user.user_id, form.category_name.as_deref()) {
        Ok(category) => PageResponse::Flash(Flash::success(
            Redirect::to("/categories"),
            format!("Category \"{}\" created.", category.name),
        )),
        Err(err) => service_failure(err, "/categories"),
    }
}

#[post("/categories/<id>/delete")]
pub fn delete_category_submit(id: i32, user: Option<CurrentUser>, app: &State<TaskApp>) -> PageResponse {
    let Some(user) = user else {
        return login_redirect();
    };
    match services::categories::delete_category(&app.pool, user.user_id, id) {
        Ok(_) => PageResponse::Flash(Flash::success(Redirect::to("/categories"), "Category deleted.")),
        Err(err) => service_failure(err, "/categories"),
    }
}

pub fn routes() -> Vec<Route> {
    routes![
        home,
        register_page,
        register_submit,
        login_page,
        login_submit,
        logout_submit,
        tasks_page,
        new_task_page,
        create_task_submit,
        edit_task_page,
        update_task_submit,
        complete_task_submit,
        delete_task_submit,
        categories_page,
        create_category_submit,
        delete_category_submit,
    ]
}

#[catch(404)]
fn not_found_page(req: &Request<'_>) -> Template {
    Template::render(
        "error",
        context! { status: 404, message: format!("Nothing at {}", req.uri().path()), logged_in: false },
    )
}

#[catch(422)]
fn unprocessable_page() -> Template {
    Template::render(
        "error",
        context! { status: 422, message: "The submitted form could not be read.", logged_in: false },
    )
}

#[catch(default)]
fn default_page(status: Status, _req: &Request<'_>) -> Template {
    Template::render(
        "error",
        context! {
            status: status.code,
            message: status.reason().unwrap_or("Unexpected error"),
            logged_in: false,
        },
    )
}

pub fn catchers() -> Vec<Catcher> {
    catchers![not_found_page, unprocessable_page, default_page]
}
