#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Header, Status};
    use serde_json::json;

    use crate::test::utils::test_utils::{
        body_json, bearer, create_standard_test_db, get_json, login_test_user, post_json,
        setup_test_client,
    };

    #[rocket::async_test]
    async fn test_register_defaults_to_client() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "  New.User@Example.com ",
                    "password": "secret1",
                    "name": "New User"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["email"], "new.user@example.com");
        assert_eq!(body["data"]["user"]["role"], "client");
        assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
        assert!(body["data"]["user"].get("password_hash").is_none());
    }

    #[rocket::async_test]
    async fn test_register_rejects_bad_input() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let cases = vec![
            json!({ "email": "not-an-email", "password": "secret1", "name": "A" }),
            json!({ "email": "a@example.com", "password": "short", "name": "A" }),
            json!({ "email": "a@example.com", "password": "secret1", "name": "   " }),
            json!({ "email": "a@example.com", "password": "secret1", "name": "A", "role": "admin" }),
        ];

        for case in cases {
            let response = client
                .post("/api/auth/register")
                .header(ContentType::JSON)
                .body(case.to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::BadRequest, "accepted {}", case);
            let body = body_json(response).await;
            assert_eq!(body["success"], false);
            assert!(body["error"].is_string());
        }
    }

    #[rocket::async_test]
    async fn test_register_duplicate_email_conflicts() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "COACH@example.com",
                    "password": "secret1",
                    "name": "Copycat",
                    "role": "coach"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn test_login_failures_share_one_message() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;

        sqlx::query("UPDATE users SET status = 'inactive' WHERE id = ?")
            .bind(test_db.user_id("other.client@example.com"))
            .execute(&test_db.pool)
            .await
            .unwrap();

        let attempts = vec![
            ("coach@example.com", "wrong-password"),
            ("nobody@example.com", "password123"),
            ("other.client@example.com", "password123"),
        ];

        for (email, password) in attempts {
            let response = client
                .post("/api/auth/login")
                .header(ContentType::JSON)
                .body(json!({ "email": email, "password": password }).to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Unauthorized, "{} logged in", email);
            let body = body_json(response).await;
            assert_eq!(body["error"], "Invalid email or password");
        }
    }

    #[rocket::async_test]
    async fn test_protected_routes_require_token() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let endpoints = vec![
            "/api/auth/me",
            "/api/users",
            "/api/programs",
            "/api/appointments",
            "/api/messages",
            "/api/notifications",
            "/api/stats",
        ];

        for endpoint in endpoints {
            let response = client.get(endpoint).dispatch().await;
            assert_eq!(
                response.status(),
                Status::Unauthorized,
                "Endpoint {} did not require authentication",
                endpoint
            );
            let body = body_json(response).await;
            assert_eq!(body["success"], false);
        }

        let response = client
            .get("/api/auth/me")
            .header(Header::new("Authorization", "Bearer forged.token.value"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_token_of_deactivated_user_is_rejected() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "client@example.com").await;

        let (status, _) = get_json(&client, &token, "/api/auth/me").await;
        assert_eq!(status, Status::Ok);

        sqlx::query("UPDATE users SET status = 'inactive' WHERE id = ?")
            .bind(test_db.user_id("client@example.com"))
            .execute(&test_db.pool)
            .await
            .unwrap();

        let (status, _) = get_json(&client, &token, "/api/auth/me").await;
        assert_eq!(status, Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_me_and_logout() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "coach@example.com").await;

        let (status, body) = get_json(&client, &token, "/api/auth/me").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"]["name"], "Coach Carter");
        assert_eq!(body["data"]["role"], "coach");

        let response = client
            .post("/api/auth/logout")
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn test_change_password() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "client@example.com").await;

        let (status, _) = post_json(
            &client,
            &token,
            "/api/auth/change-password",
            json!({ "current_password": "not-it", "new_password": "brand-new" }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) = post_json(
            &client,
            &token,
            "/api/auth/change-password",
            json!({ "current_password": "password123", "new_password": "brand-new" }),
        )
        .await;
        assert_eq!(status, Status::Ok);

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "email": "client@example.com", "password": "brand-new" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn test_health() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client.get("/api/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "OK");
    }
}
