#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::module_inception)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use axum::http::StatusCode;
    use axum_extra::extract::cookie::{Cookie, Key};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use crate::auth::Accounts;
    use crate::catalog::{Catalog, SearchMode};
    use crate::db::{connect_in_memory, init_schema};
    use crate::session::SessionStore;

    use crate::http::auth::LOGIN_REQUIRED;
    use crate::http::context::SESSION_COOKIE;
    use crate::http::{router, AppState};

    async fn test_server() -> Result<TestServer> {
        test_server_with(SearchMode::CaseSensitive).await
    }

    async fn test_server_with(search_mode: SearchMode) -> Result<TestServer> {
        let db = connect_in_memory().await?;
        init_schema(&db).await?;
        let state = AppState {
            accounts: Accounts::new(db.clone()),
            catalog: Catalog::new(db, search_mode),
            sessions: SessionStore::new(Duration::from_secs(3600)),
            cookie_key: Key::generate(),
        };
        Ok(TestServer::new(router(state))?)
    }

    async fn register(server: &TestServer, username: &str, password: &str, email: &str) {
        let response = server
            .post("/register")
            .form(&json!({ "username": username, "password": password, "email": email }))
            .await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    }

    /// Registers alice and returns her session cookie.
    async fn signed_in_as_alice(server: &TestServer) -> Cookie<'static> {
        register(server, "alice", "pw123", "a@x.com").await;
        let response = server
            .post("/login")
            .form(&json!({ "username": "alice", "password": "pw123" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        response.cookie(SESSION_COOKIE)
    }

    fn matrix_form() -> Value {
        json!({
            "film_title": "Matrix",
            "film_author": "Wachowski",
            "film_date": "1999",
            "film_synopsis": "A hacker learns the truth.",
        })
    }

    fn flash_messages(body: &Value) -> Vec<String> {
        body["flashes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|flash| flash["message"].as_str().unwrap().to_string())
            .collect()
    }

    fn last_flash(body: &Value) -> String {
        flash_messages(body).pop().unwrap_or_default()
    }

    #[tokio::test]
    async fn home_renders_index_without_films() -> Result<()> {
        let server = test_server().await?;
        let response = server.get("/").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["view"], "index");
        assert_eq!(body["user"], Value::Null);
        assert!(body.get("films").is_none());
        assert_eq!(body["flashes"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn health_reports_film_count() -> Result<()> {
        let server = test_server().await?;
        let response = server.get("/health").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body, json!({ "status": "ok", "films": 0 }));
        Ok(())
    }

    #[tokio::test]
    async fn registration_redirects_home_with_one_shot_notice() -> Result<()> {
        let server = test_server().await?;
        let response = server
            .post("/register")
            .form(&json!({ "username": "alice", "password": "pw123", "email": "a@x.com" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/");
        let cookie = response.cookie(SESSION_COOKIE);

        let home: Value = server.get("/").add_cookie(cookie.clone()).await.json();
        assert_eq!(home["flashes"][0]["category"], "success");
        assert_eq!(home["user"], Value::Null);

        let again: Value = server.get("/").add_cookie(cookie).await.json();
        assert_eq!(again["flashes"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() -> Result<()> {
        let server = test_server().await?;
        register(&server, "alice", "pw123", "a@x.com").await;

        let response = server
            .post("/register")
            .form(&json!({ "username": "alice", "password": "pw999", "email": "b@x.com" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["view"], "register");
        assert_eq!(body["flashes"][0]["category"], "danger");
        assert_eq!(
            flash_messages(&body),
            vec!["This username is already in use"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn registration_with_missing_field_is_rejected() -> Result<()> {
        let server = test_server().await?;
        let response = server
            .post("/register")
            .form(&json!({ "username": "alice", "password": "pw123" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(flash_messages(&body), vec!["Email is required"]);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() -> Result<()> {
        let server = test_server().await?;
        register(&server, "alice", "pw123", "a@x.com").await;

        let wrong = server
            .post("/login")
            .form(&json!({ "username": "alice", "password": "wrong" }))
            .await;
        assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
        let body: Value = wrong.json();
        assert_eq!(body["view"], "login");
        assert_eq!(body["user"], Value::Null);

        let unknown = server
            .post("/login")
            .form(&json!({ "username": "bob", "password": "pw123" }))
            .await;
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn login_sets_session_and_logout_clears_it() -> Result<()> {
        let server = test_server().await?;
        let cookie = signed_in_as_alice(&server).await;

        let home: Value = server.get("/").add_cookie(cookie.clone()).await.json();
        assert_eq!(home["user"], json!({ "id_user": 1, "username": "alice" }));
        assert_eq!(flash_messages(&home), vec!["Hello alice!"]);

        let response = server.get("/logout").add_cookie(cookie.clone()).await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/");

        let after: Value = server.get("/").add_cookie(cookie.clone()).await.json();
        assert_eq!(after["user"], Value::Null);

        // logging out twice is harmless
        let response = server.get("/logout").add_cookie(cookie).await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        Ok(())
    }

    #[tokio::test]
    async fn login_replaces_the_previous_session() -> Result<()> {
        let server = test_server().await?;
        let response = server
            .post("/register")
            .form(&json!({ "username": "alice", "password": "pw123", "email": "a@x.com" }))
            .await;
        let anonymous = response.cookie(SESSION_COOKIE);

        let response = server
            .post("/login")
            .add_cookie(anonymous.clone())
            .form(&json!({ "username": "alice", "password": "pw123" }))
            .await;
        let signed_in = response.cookie(SESSION_COOKIE);
        assert_ne!(anonymous.value(), signed_in.value());

        // the registration notice went away with the old session
        let home: Value = server.get("/").add_cookie(signed_in).await.json();
        assert_eq!(flash_messages(&home), vec!["Hello alice!"]);

        let stale: Value = server.get("/").add_cookie(anonymous).await.json();
        assert_eq!(stale["user"], Value::Null);
        assert_eq!(stale["flashes"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn mutating_routes_redirect_anonymous_callers() -> Result<()> {
        let server = test_server().await?;

        for response in [
            server.get("/add").await,
            server.post("/add").form(&matrix_form()).await,
            server.post("/delete/1").await,
            server.get("/update/1").await,
        ] {
            assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
            assert_eq!(response.header("location"), "/");
        }

        let response = server.get("/add").await;
        let home: Value = server
            .get("/")
            .add_cookie(response.cookie(SESSION_COOKIE))
            .await
            .json();
        assert_eq!(home["flashes"][0]["category"], "danger");
        assert_eq!(flash_messages(&home), vec![LOGIN_REQUIRED]);

        let health: Value = server.get("/health").await.json();
        assert_eq!(health["films"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn add_film_records_author_and_fields() -> Result<()> {
        let server = test_server().await?;
        let cookie = signed_in_as_alice(&server).await;

        let form = server.get("/add").add_cookie(cookie.clone()).await;
        assert_eq!(form.status_code(), StatusCode::OK);
        assert_eq!(form.json::<Value>()["view"], "add");

        let response = server
            .post("/add")
            .add_cookie(cookie.clone())
            .form(&matrix_form())
            .await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/");

        let all: Value = server.get("/show_all").await.json();
        assert_eq!(all["view"], "index");
        assert_eq!(all["films"].as_array().unwrap().len(), 1);

        let film: Value = server.get("/film/1").await.json();
        assert_eq!(film["view"], "film");
        assert_eq!(film["film"]["id"], 1);
        assert_eq!(film["film"]["author"], "alice");
        assert_eq!(film["film"]["title"], "Matrix");
        assert_eq!(film["film"]["director"], "Wachowski");
        assert_eq!(film["film"]["release_date"], "1999");
        assert_eq!(film["film"]["synopsis"], "A hacker learns the truth.");
        assert_eq!(film["film"]["modified"], Value::Null);
        assert!(film["film"]["created"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn add_film_with_blank_field_rerenders_form() -> Result<()> {
        let server = test_server().await?;
        let cookie = signed_in_as_alice(&server).await;

        let mut form = matrix_form();
        form["film_date"] = json!("");
        let response = server.post("/add").add_cookie(cookie).form(&form).await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["view"], "add");
        assert_eq!(last_flash(&body), "Release date is required");

        let health: Value = server.get("/health").await.json();
        assert_eq!(health["films"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_film_renders_null() -> Result<()> {
        let server = test_server().await?;
        let response = server.get("/film/42").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["view"], "film");
        assert_eq!(body["film"], Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn update_film_returns_refreshed_entity() -> Result<()> {
        let server = test_server().await?;
        let cookie = signed_in_as_alice(&server).await;
        server
            .post("/add")
            .add_cookie(cookie.clone())
            .form(&matrix_form())
            .await;

        let form: Value = server
            .get("/update/1")
            .add_cookie(cookie.clone())
            .await
            .json();
        assert_eq!(form["view"], "update");
        assert_eq!(form["film"]["title"], "Matrix");

        let response = server
            .post("/update/1")
            .add_cookie(cookie.clone())
            .form(&json!({
                "title": "The Matrix",
                "realisateur": "Lana Wachowski",
                "date_sortie": "1999-03-31",
                "synopsis": "Red pill or blue pill.",
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["view"], "film");
        assert_eq!(body["film"]["title"], "The Matrix");
        assert_eq!(body["film"]["director"], "Lana Wachowski");
        assert_eq!(body["film"]["modified_by"], 1);
        assert!(body["film"]["modified"].is_string());
        assert_eq!(last_flash(&body), "Your changes have been saved");

        let film: Value = server.get("/film/1").await.json();
        assert_eq!(film["film"]["release_date"], "1999-03-31");
        Ok(())
    }

    #[tokio::test]
    async fn update_with_blank_field_keeps_the_film() -> Result<()> {
        let server = test_server().await?;
        let cookie = signed_in_as_alice(&server).await;
        server
            .post("/add")
            .add_cookie(cookie.clone())
            .form(&matrix_form())
            .await;

        let response = server
            .post("/update/1")
            .add_cookie(cookie)
            .form(&json!({ "title": "", "realisateur": "x", "date_sortie": "x", "synopsis": "x" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["view"], "update");
        assert_eq!(body["film"]["title"], "Matrix");
        assert_eq!(last_flash(&body), "Title is required");
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_silent_about_missing_rows() -> Result<()> {
        let server = test_server().await?;
        let cookie = signed_in_as_alice(&server).await;
        server
            .post("/add")
            .add_cookie(cookie.clone())
            .form(&matrix_form())
            .await;

        let response = server.post("/delete/1").add_cookie(cookie.clone()).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["view"], "index");
        assert_eq!(last_flash(&body), "The film has been deleted");

        let film: Value = server.get("/film/1").await.json();
        assert_eq!(film["film"], Value::Null);

        let again = server.get("/delete/1").add_cookie(cookie).await;
        assert_eq!(again.status_code(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn search_works_with_post_and_get() -> Result<()> {
        let server = test_server().await?;
        let cookie = signed_in_as_alice(&server).await;
        for title in ["The Matrix", "Alien", "Matrix Reloaded"] {
            let mut form = matrix_form();
            form["film_title"] = json!(title);
            server
                .post("/add")
                .add_cookie(cookie.clone())
                .form(&form)
                .await;
        }

        let posted: Value = server
            .post("/show_research")
            .form(&json!({ "film_title": "Matrix" }))
            .await
            .json();
        let titles: Vec<_> = posted["films"]
            .as_array()
            .unwrap()
            .iter()
            .map(|film| film["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["The Matrix", "Matrix Reloaded"]);

        let fetched: Value = server
            .get("/show_research")
            .add_query_param("film_title", "Matrix")
            .await
            .json();
        assert_eq!(fetched["films"], posted["films"]);

        let none: Value = server
            .post("/show_research")
            .form(&json!({ "film_title": "matrix" }))
            .await
            .json();
        assert_eq!(none["films"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn empty_search_is_rejected_with_notice() -> Result<()> {
        let server = test_server().await?;
        let response = server
            .post("/show_research")
            .form(&json!({ "film_title": "" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["view"], "index");
        assert!(body.get("films").is_none());
        assert_eq!(flash_messages(&body), vec!["Search query is required"]);

        let response = server.get("/show_research").await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        Ok(())
    }

    #[tokio::test]
    async fn case_insensitive_search_ignores_title_case() -> Result<()> {
        let server = test_server_with(SearchMode::CaseInsensitive).await?;
        let cookie = signed_in_as_alice(&server).await;
        for title in ["The Matrix", "the matrix revisited", "Alien"] {
            let mut form = matrix_form();
            form["film_title"] = json!(title);
            server
                .post("/add")
                .add_cookie(cookie.clone())
                .form(&form)
                .await;
        }

        let body: Value = server
            .get("/show_research")
            .add_query_param("film_title", "MATRIX")
            .await
            .json();
        let titles: Vec<_> = body["films"]
            .as_array()
            .unwrap()
            .iter()
            .map(|film| film["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["The Matrix", "the matrix revisited"]);
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_update_post_changes_nothing() -> Result<()> {
        let server = test_server().await?;
        let cookie = signed_in_as_alice(&server).await;
        server
            .post("/add")
            .add_cookie(cookie)
            .form(&matrix_form())
            .await;

        let response = server
            .post("/update/1")
            .form(&json!({
                "title": "Hijacked",
                "realisateur": "x",
                "date_sortie": "x",
                "synopsis": "x",
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/");

        let home: Value = server
            .get("/")
            .add_cookie(response.cookie(SESSION_COOKIE))
            .await
            .json();
        assert_eq!(flash_messages(&home), vec![LOGIN_REQUIRED]);

        let film: Value = server.get("/film/1").await.json();
        assert_eq!(film["film"]["title"], "Matrix");
        assert_eq!(film["film"]["modified_by"], Value::Null);
        assert_eq!(film["film"]["modified"], Value::Null);
        Ok(())
    }
}
