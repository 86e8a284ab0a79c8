#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Cookie, Header, Status};
    use rocket::local::blocking::{Client, LocalResponse};
    use serde_json::{json, Value};
    use task_manager::models::{CategoryView, TaskStatus, TaskView, UserInfo};
    use task_manager::{rocket_instance, AppConfig, LoginResponse, TaskApp};

    // Helper function to create a test client with its own in-memory database.
    // Tracked clients keep cookies between requests, like a browser session.
    fn test_client() -> Client {
        let config = AppConfig::in_memory();
        let app = TaskApp::new(&config).expect("in-memory app");
        Client::tracked(rocket_instance(app, &config)).expect("valid rocket instance")
    }

    // Untracked clients never store cookies, so each request carries only what it sets.
    fn untracked_client() -> Client {
        let config = AppConfig::in_memory();
        let app = TaskApp::new(&config).expect("in-memory app");
        Client::untracked(rocket_instance(app, &config)).expect("valid rocket instance")
    }

    fn post_json<'c>(client: &'c Client, uri: &str, body: Value) -> LocalResponse<'c> {
        client
            .post(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
    }

    fn put_json<'c>(client: &'c Client, uri: &str, body: Value) -> LocalResponse<'c> {
        client
            .put(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
    }

    fn register(client: &Client, username: &str, password: &str) -> UserInfo {
        let response = post_json(
            client,
            "/api/register",
            json!({ "username": username, "password": password }),
        );
        assert_eq!(response.status(), Status::Created, "Registration failed");
        response.into_json::<UserInfo>().unwrap()
    }

    fn login(client: &Client, username: &str, password: &str) -> LoginResponse {
        let response = post_json(
            client,
            "/api/login",
            json!({ "username": username, "password": password }),
        );
        assert_eq!(response.status(), Status::Ok, "Login failed");
        response.into_json::<LoginResponse>().unwrap()
    }

    fn create_task(client: &Client, body: Value) -> TaskView {
        let response = post_json(client, "/api/tasks", body);
        assert_eq!(response.status(), Status::Created, "Task creation failed");
        response.into_json::<TaskView>().unwrap()
    }

    fn list_tasks(client: &Client, uri: &str) -> Vec<TaskView> {
        let response = client.get(uri.to_string()).dispatch();
        assert_eq!(response.status(), Status::Ok);
        response.into_json::<Vec<TaskView>>().unwrap()
    }

    fn create_category(client: &Client, name: &str) -> CategoryView {
        let response = post_json(client, "/api/categories", json!({ "category_name": name }));
        assert_eq!(response.status(), Status::Created, "Category creation failed");
        response.into_json::<CategoryView>().unwrap()
    }

    fn error_code(response: LocalResponse<'_>) -> String {
        let body = response.into_json::<Value>().unwrap();
        body["error"].as_str().unwrap_or_default().to_string()
    }

    // --- Authentication ---

    #[test]
    fn test_register_and_login() {
        let client = test_client();
        let user = register(&client, "testuser", "testpass");
        assert_eq!(user.username, "testuser");

        let login_res = login(&client, "testuser", "testpass");
        assert!(!login_res.session_token.is_empty());
        assert_eq!(login_res.user_id, user.id);
        assert_eq!(login_res.username, "testuser");
    }

    #[test]
    fn test_register_response_has_no_password_material() {
        let client = test_client();
        let response = post_json(
            &client,
            "/api/register",
            json!({ "username": "hashme", "password": "plaintext-secret" }),
        );
        assert_eq!(response.status(), Status::Created);
        let body = response.into_string().unwrap();
        assert!(!body.contains("plaintext-secret"));
        assert!(!body.contains("password"));
    }

    #[test]
    fn test_register_user_conflict() {
        let client = test_client();
        register(&client, "duplicate", "password123");

        let response = post_json(
            &client,
            "/api/register",
            json!({ "username": "duplicate", "password": "another" }),
        );
        assert_eq!(response.status(), Status::Conflict);
        assert_eq!(error_code(response), "conflict");

        // The first account is untouched.
        login(&client, "duplicate", "password123");
    }

    #[test]
    fn test_register_missing_fields() {
        let client = test_client();
        for body in [
            json!({ "username": "nopassword" }),
            json!({ "password": "nousername" }),
            json!({ "username": "", "password": "x" }),
            json!({}),
        ] {
            let response = post_json(&client, "/api/register", body);
            assert_eq!(response.status(), Status::BadRequest);
        }

        let response = client.post("/api/register").dispatch();
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[test]
    fn test_login_failures_are_indistinguishable() {
        let client = test_client();
        register(&client, "realuser", "password123");

        let wrong_password = post_json(
            &client,
            "/api/login",
            json!({ "username": "realuser", "password": "wrongpassword" }),
        );
        assert_eq!(wrong_password.status(), Status::Unauthorized);
        let wrong_password_body = wrong_password.into_string().unwrap();

        let unknown_user = post_json(
            &client,
            "/api/login",
            json!({ "username": "nonexistentuser_test", "password": "password123" }),
        );
        assert_eq!(unknown_user.status(), Status::Unauthorized);
        assert_eq!(unknown_user.into_string().unwrap(), wrong_password_body);
    }

    #[test]
    fn test_protected_routes_require_session() {
        let client = test_client();
        for uri in ["/api/tasks", "/api/categories"] {
            let response = client.get(uri).dispatch();
            assert_eq!(response.status(), Status::Unauthorized);
            assert_eq!(error_code(response), "missing_credentials");
        }

        let response = client
            .get("/api/tasks")
            .header(Header::new("Authorization", "Bearer not-a-real-token"))
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(error_code(response), "invalid_token");

        let response = client
            .get("/api/tasks")
            .header(Header::new("Authorization", "Basic abc"))
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(error_code(response), "malformed_authorization_header");
    }

    #[test]
    fn test_bearer_token_without_cookie() {
        let client = untracked_client();

        register(&client, "tokenuser", "password123");
        let token = login(&client, "tokenuser", "password123").session_token;
        let auth = || Header::new("Authorization", format!("Bearer {}", token));

        let response = client
            .post("/api/tasks")
            .header(ContentType::JSON)
            .header(auth())
            .body(json!({ "title": "Via header" }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Created);

        let response = client.get("/api/tasks").header(auth()).dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_json::<Vec<TaskView>>().unwrap().len(), 1);

        // Without the header the untracked client has no session at all.
        let response = client.get("/api/tasks").dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[test]
    fn test_stale_cookie_falls_back_to_bearer_token() {
        let client = untracked_client();
        register(&client, "stalecookie", "password123");
        let token = login(&client, "stalecookie", "password123").session_token;

        let response = client
            .get("/api/tasks")
            .cookie(Cookie::new("session_token", "stale"))
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch();
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .get("/api/tasks")
            .cookie(Cookie::new("session_token", "stale"))
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(error_code(response), "invalid_token");
    }

    #[test]
    fn test_login_replaces_presented_session() {
        let client = untracked_client();
        register(&client, "relogin", "password123");
        let first = login(&client, "relogin", "password123").session_token;

        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .cookie(Cookie::new("session_token", first.clone()))
            .body(json!({ "username": "relogin", "password": "password123" }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        let second = response.into_json::<LoginResponse>().unwrap().session_token;
        assert_ne!(first, second);

        let bearer = |token: &str| Header::new("Authorization", format!("Bearer {}", token));
        let response = client.get("/api/tasks").header(bearer(&first)).dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(error_code(response), "invalid_token");
        let response = client.get("/api/tasks").header(bearer(&second)).dispatch();
        assert_eq!(response.status(), Status::Ok);
    }

    #[test]
    fn test_logout_and_attempt_access() {
        let client = test_client();
        register(&client, "logoutuser", "password123");
        let token = login(&client, "logoutuser", "password123").session_token;

        let response = client.post("/api/logout").dispatch();
        assert_eq!(response.status(), Status::Ok);

        let response = client.get("/api/tasks").dispatch();
        assert_eq!(response.status(), Status::Unauthorized);

        // The token itself is dead too, not just the cookie.
        let response = client
            .get("/api/tasks")
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(error_code(response), "invalid_token");

        // Logging out again is harmless.
        let response = client.post("/api/logout").dispatch();
        assert_eq!(response.status(), Status::Ok);
    }

    // --- Tasks ---

    #[test]
    fn test_task_lifecycle_scenario() {
        let client = test_client();
        register(&client, "alice", "pw1");
        login(&client, "alice", "pw1");

        let task = create_task(&client, json!({ "title": "Buy milk" }));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.category_id, None);
        assert_eq!(task.category, None);

        let tasks = list_tasks(&client, "/api/tasks");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, task.id);
        assert_eq!(tasks[0].status, TaskStatus::Pending);

        let response = client.patch(format!("/api/tasks/{}/complete", task.id)).dispatch();
        assert_eq!(response.status(), Status::Ok);

        let tasks = list_tasks(&client, "/api/tasks");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Completed);
    }

    #[test]
    fn test_create_task_with_all_fields() {
        let client = test_client();
        register(&client, "fulltask", "pw");
        login(&client, "fulltask", "pw");
        let work = create_category(&client, "Work");

        let task = create_task(
            &client,
            json!({
                "title": "Quarterly report",
                "description": "Numbers for Q2",
                "due_date": "2024-06-30",
                "category_id": work.id,
            }),
        );
        assert_eq!(task.description.as_deref(), Some("Numbers for Q2"));
        assert_eq!(task.due_date.map(|d| d.to_string()).as_deref(), Some("2024-06-30"));
        assert_eq!(task.category_id, Some(work.id));
        assert_eq!(task.category.as_deref(), Some("Work"));

        let response = client.get(format!("/api/tasks/{}", task.id)).dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_json::<TaskView>().unwrap(), task);
    }

    #[test]
    fn test_create_task_invalid_input() {
        let client = test_client();
        register(&client, "badtask", "pw");
        login(&client, "badtask", "pw");

        let response = client.post("/api/tasks").header(ContentType::JSON).dispatch();
        assert_eq!(response.status(), Status::BadRequest);

        for body in [
            json!({ "description": "no title" }),
            json!({ "title": "   " }),
            json!({ "title": "Bad date", "due_date": "30/06/2024" }),
            json!({ "title": "Ghost category", "category_id": 999 }),
        ] {
            let response = post_json(&client, "/api/tasks", body);
            assert_eq!(response.status(), Status::BadRequest);
            assert_eq!(error_code(response), "invalid_input");
        }
        assert!(list_tasks(&client, "/api/tasks").is_empty());
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let client = test_client();
        register(&client, "updater", "pw");
        login(&client, "updater", "pw");
        let task = create_task(
            &client,
            json!({ "title": "Draft", "description": "first pass", "due_date": "2024-07-01" }),
        );

        let response = put_json(
            &client,
            &format!("/api/tasks/{}", task.id),
            json!({ "title": "Final", "due_date": null }),
        );
        assert_eq!(response.status(), Status::Ok);
        let updated = response.into_json::<TaskView>().unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.description.as_deref(), Some("first pass"));
        assert_eq!(updated.due_date, None);
        assert_eq!(updated.status, TaskStatus::Pending);

        let response = put_json(
            &client,
            &format!("/api/tasks/{}", task.id),
            json!({ "status": "COMPLETED" }),
        );
        assert_eq!(response.into_json::<TaskView>().unwrap().status, TaskStatus::Completed);

        // COMPLETED is not terminal.
        let response = put_json(
            &client,
            &format!("/api/tasks/{}", task.id),
            json!({ "status": "PENDING" }),
        );
        assert_eq!(response.into_json::<TaskView>().unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_update_rejects_invalid_status() {
        let client = test_client();
        register(&client, "statususer", "pw");
        login(&client, "statususer", "pw");
        let task = create_task(&client, json!({ "title": "Keep me" }));

        for status in ["DONE", "completed", ""] {
            let response = put_json(
                &client,
                &format!("/api/tasks/{}", task.id),
                json!({ "title": "Changed", "status": status }),
            );
            assert_eq!(response.status(), Status::BadRequest);
        }

        let tasks = list_tasks(&client, "/api/tasks");
        assert_eq!(tasks, vec![task]);
    }

    #[test]
    fn test_complete_is_idempotent() {
        let client = test_client();
        register(&client, "idem", "pw");
        login(&client, "idem", "pw");
        let task = create_task(&client, json!({ "title": "Once is enough" }));

        for _ in 0..2 {
            let response = client.patch(format!("/api/tasks/{}/complete", task.id)).dispatch();
            assert_eq!(response.status(), Status::Ok);
            let completed = response.into_json::<TaskView>().unwrap();
            assert_eq!(completed.status, TaskStatus::Completed);
        }
    }

    #[test]
    fn test_missing_task_is_not_found() {
        let client = test_client();
        register(&client, "seeker", "pw");
        login(&client, "seeker", "pw");

        let response = put_json(&client, "/api/tasks/4242", json!({ "title": "nope" }));
        assert_eq!(response.status(), Status::NotFound);
        let response = client.patch("/api/tasks/4242/complete").dispatch();
        assert_eq!(response.status(), Status::NotFound);
        let response = client.delete("/api/tasks/4242").dispatch();
        assert_eq!(response.status(), Status::NotFound);
        let response = client.get("/api/tasks/4242").dispatch();
        assert_eq!(response.status(), Status::NotFound);
    }

    #[test]
    fn test_other_users_tasks_are_forbidden() {
        let client = test_client();
        register(&client, "userA", "pwA");
        register(&client, "userB", "pwB");

        login(&client, "userB", "pwB");
        let task = create_task(&client, json!({ "title": "B's secret plan" }));

        login(&client, "userA", "pwA");
        assert!(list_tasks(&client, "/api/tasks").is_empty());

        let response = client.delete(format!("/api/tasks/{}", task.id)).dispatch();
        assert_eq!(response.status(), Status::Forbidden);
        let response = put_json(
            &client,
            &format!("/api/tasks/{}", task.id),
            json!({ "title": "hijacked", "status": "COMPLETED" }),
        );
        assert_eq!(response.status(), Status::Forbidden);
        let response = client.patch(format!("/api/tasks/{}/complete", task.id)).dispatch();
        assert_eq!(response.status(), Status::Forbidden);
        let response = client.get(format!("/api/tasks/{}", task.id)).dispatch();
        assert_eq!(response.status(), Status::Forbidden);

        login(&client, "userB", "pwB");
        let tasks = list_tasks(&client, "/api/tasks");
        assert_eq!(tasks, vec![task]);
    }

    #[test]
    fn test_delete_task() {
        let client = test_client();
        register(&client, "deleter", "pw");
        login(&client, "deleter", "pw");
        let keep = create_task(&client, json!({ "title": "Keep" }));
        let drop = create_task(&client, json!({ "title": "Drop" }));

        let response = client.delete(format!("/api/tasks/{}", drop.id)).dispatch();
        assert_eq!(response.status(), Status::Ok);

        let tasks = list_tasks(&client, "/api/tasks");
        assert_eq!(tasks, vec![keep]);
        let response = client.delete(format!("/api/tasks/{}", drop.id)).dispatch();
        assert_eq!(response.status(), Status::NotFound);
    }

    #[test]
    fn test_list_tasks_with_combined_filters() {
        let client = test_client();
        register(&client, "filterer", "pw");
        login(&client, "filterer", "pw");
        let work = create_category(&client, "Work");
        let home = create_category(&client, "Home");

        let target = create_task(
            &client,
            json!({ "title": "Target", "due_date": "2024-06-01", "category_id": work.id }),
        );
        let pending = create_task(
            &client,
            json!({ "title": "Still pending", "due_date": "2024-06-01", "category_id": work.id }),
        );
        let other_category = create_task(
            &client,
            json!({ "title": "Home chore", "due_date": "2024-06-01", "category_id": home.id }),
        );
        let other_day = create_task(
            &client,
            json!({ "title": "Next day", "due_date": "2024-06-02", "category_id": work.id }),
        );
        for id in [target.id, other_category.id, other_day.id] {
            let response = client.patch(format!("/api/tasks/{}/complete", id)).dispatch();
            assert_eq!(response.status(), Status::Ok);
        }

        let found = list_tasks(
            &client,
            &format!(
                "/api/tasks?status=COMPLETED&category_id={}&due_date=2024-06-01",
                work.id
            ),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, target.id);

        let pending_only = list_tasks(&client, "/api/tasks?status=PENDING");
        assert_eq!(pending_only.len(), 1);
        assert_eq!(pending_only[0].id, pending.id);

        let work_tasks = list_tasks(&client, &format!("/api/tasks?category_id={}", work.id));
        assert_eq!(work_tasks.len(), 3);

        let june_first = list_tasks(&client, "/api/tasks?due_date=2024-06-01");
        assert_eq!(june_first.len(), 3);

        // Empty values mean no filter; unknown statuses match nothing.
        assert_eq!(list_tasks(&client, "/api/tasks?status=&category_id=&due_date=").len(), 4);
        assert!(list_tasks(&client, "/api/tasks?status=completed").is_empty());
        assert!(list_tasks(&client, "/api/tasks?status=%20PENDING%20").is_empty());
        assert!(list_tasks(&client, "/api/tasks?status=%20COMPLETED").is_empty());

        let response = client.get("/api/tasks?category_id=abc").dispatch();
        assert_eq!(response.status(), Status::BadRequest);
    }

    // --- Categories ---

    #[test]
    fn test_category_scenario() {
        let client = test_client();
        register(&client, "catuser", "1234");
        login(&client, "catuser", "1234");

        let created = create_category(&client, "Work");
        assert_eq!(created.name, "Work");

        let response = client.get("/api/categories").dispatch();
        assert_eq!(response.status(), Status::Ok);
        let categories = response.into_json::<Vec<CategoryView>>().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Work");

        let category_id = categories[0].id;
        let response = client.delete(format!("/api/categories/{}", category_id)).dispatch();
        assert_eq!(response.status(), Status::Ok);

        let response = client.get("/api/categories").dispatch();
        assert_eq!(response.into_json::<Vec<CategoryView>>().unwrap(), vec![]);
    }

    #[test]
    fn test_category_name_validation() {
        let client = test_client();
        register(&client, "namer", "pw");
        login(&client, "namer", "pw");

        for body in [
            json!({}),
            json!({ "category_name": "" }),
            json!({ "category_name": "abc" }),
            json!({ "category_name": "this name is much too long" }),
        ] {
            let response = post_json(&client, "/api/categories", body);
            assert_eq!(response.status(), Status::BadRequest);
        }
        assert_eq!(create_category(&client, "  Errands  ").name, "Errands");
    }

    #[test]
    fn test_delete_category_checks() {
        let client = test_client();
        register(&client, "owner", "pw");
        register(&client, "intruder", "pw");

        login(&client, "owner", "pw");
        let category = create_category(&client, "Private");

        login(&client, "intruder", "pw");
        let response = client.delete("/api/categories/999").dispatch();
        assert_eq!(response.status(), Status::NotFound);
        let response = client.delete(format!("/api/categories/{}", category.id)).dispatch();
        assert_eq!(response.status(), Status::Forbidden);
        let response = client.get("/api/categories").dispatch();
        assert_eq!(response.into_json::<Vec<CategoryView>>().unwrap(), vec![]);

        login(&client, "owner", "pw");
        let response = client.get("/api/categories").dispatch();
        assert_eq!(response.into_json::<Vec<CategoryView>>().unwrap(), vec![category]);
    }

    #[test]
    fn test_delete_category_keeps_its_tasks() {
        let client = test_client();
        register(&client, "detacher", "pw");
        login(&client, "detacher", "pw");
        let work = create_category(&client, "Work");
        let task = create_task(&client, json!({ "title": "Filed", "category_id": work.id }));

        let response = client.delete(format!("/api/categories/{}", work.id)).dispatch();
        assert_eq!(response.status(), Status::Ok);

        let tasks = list_tasks(&client, "/api/tasks");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, task.id);
        assert_eq!(tasks[0].category_id, None);
        assert_eq!(tasks[0].category, None);
    }

    #[test]
    fn test_unknown_api_route_is_json_404() {
        let client = test_client();
        let response = client.get("/api/nothing-here").dispatch();
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(response.content_type(), Some(ContentType::JSON));
        assert_eq!(error_code(response), "not_found");
    }

    #[test]
    fn test_api_index() {
        let client = test_client();
        let response = client.get("/api").dispatch();
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_json::<Value>().unwrap();
        assert_eq!(body["message"], "Welcome to the Task Manager API");
    }
}
