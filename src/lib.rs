pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod pages;
pub mod schema;
pub mod services;
pub mod session;

use rocket::fs::{relative, FileServer};
use rocket_dyn_templates::Template;

pub use config::AppConfig;
pub use models::LoginResponse;

use db::DbPool;
use session::SessionStore;

/// Everything request handlers share. Built once per process (or per test client)
/// and handed to Rocket as managed state.
pub struct TaskApp {
    pub pool: DbPool,
    pub sessions: SessionStore,
    pub bcrypt_cost: u32,
}

impl TaskApp {
    /// Opens the database pool and brings the schema up to date.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = db::init_pool(config)?;
        db::run_migrations(&pool)?;
        Ok(TaskApp {
            pool,
            sessions: SessionStore::new(),
            bcrypt_cost: config.bcrypt_cost,
        })
    }
}

// This function can be used by main.rs to launch the server
// and by tests to get a Rocket instance.
pub fn rocket_instance(app: TaskApp, config: &AppConfig) -> rocket::Rocket<rocket::Build> {
    let figment = rocket::Config::figment().merge(("template_dir", config.template_dir.as_str()));

    rocket::custom(figment)
        .manage(app)
        .attach(Template::fairing())
        .mount("/", pages::routes())
        .mount("/static", FileServer::from(relative!("static")))
        .mount("/api", api::routes())
        .register("/", pages::catchers())
        .register("/api", api::catchers())
}
