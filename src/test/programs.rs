#[cfg(test)]
mod tests {
    use rocket::http::Status;
    use serde_json::json;

    use crate::test::utils::test_utils::{
        create_standard_test_db, delete, get_json, login_test_user, post_json, put_json,
        setup_test_client,
    };

    #[rocket::async_test]
    async fn test_program_visibility_follows_ownership() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let client_id = test_db.user_id("client@example.com");

        let coach = login_test_user(&client, "coach@example.com").await;
        let (status, body) = post_json(
            &client,
            &coach,
            "/api/programs",
            json!({
                "name": "Strength Block",
                "client_id": client_id,
                "program_type": "strength",
                "status": "active",
                "duration_weeks": 8
            }),
        )
        .await;
        assert_eq!(status, Status::Created, "{}", body);
        let program_id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["coach_id"], test_db.user_id("coach@example.com"));

        let owner = login_test_user(&client, "client@example.com").await;
        let (status, body) = get_json(&client, &owner, "/api/programs").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["pagination"]["total"], 1);

        let stranger = login_test_user(&client, "other.client@example.com").await;
        let (_, body) = get_json(&client, &stranger, "/api/programs").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        let uri = format!("/api/programs/{}", program_id);
        let (status, _) = get_json(&client, &stranger, &uri).await;
        assert_eq!(status, Status::NotFound);

        let other_coach = login_test_user(&client, "other.coach@example.com").await;
        let (status, _) = get_json(&client, &other_coach, &uri).await;
        assert_eq!(status, Status::NotFound);
        let (status, _) = put_json(&client, &other_coach, &uri, json!({ "name": "Mine now" })).await;
        assert_eq!(status, Status::NotFound);

        let admin = login_test_user(&client, "admin@example.com").await;
        let (status, _) = get_json(&client, &admin, &uri).await;
        assert_eq!(status, Status::Ok);

        // Missing rows look the same as hidden ones.
        let (status, _) = get_json(&client, &stranger, "/api/programs/9999").await;
        assert_eq!(status, Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_program_creation_rules() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;

        let client_token = login_test_user(&client, "client@example.com").await;
        let (status, _) = post_json(
            &client,
            &client_token,
            "/api/programs",
            json!({ "name": "DIY" }),
        )
        .await;
        assert_eq!(status, Status::Forbidden);

        let coach = login_test_user(&client, "coach@example.com").await;
        let (status, _) = post_json(
            &client,
            &coach,
            "/api/programs",
            json!({
                "name": "Unlinked",
                "client_id": test_db.user_id("other.client@example.com")
            }),
        )
        .await;
        assert_eq!(status, Status::Forbidden);

        let (status, _) = post_json(
            &client,
            &coach,
            "/api/programs",
            json!({ "name": "Backwards", "start_date": "2030-02-01", "end_date": "2030-01-01" }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) = post_json(
            &client,
            &coach,
            "/api/programs",
            json!({ "name": "Too long", "duration_weeks": 500 }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let admin = login_test_user(&client, "admin@example.com").await;
        let (status, _) = post_json(&client, &admin, "/api/programs", json!({ "name": "No coach" })).await;
        assert_eq!(status, Status::BadRequest);

        let (status, body) = post_json(
            &client,
            &admin,
            "/api/programs",
            json!({ "name": "On behalf", "coach_id": test_db.user_id("other.coach@example.com") }),
        )
        .await;
        assert_eq!(status, Status::Created);
        assert_eq!(body["data"]["status"], "draft");
    }

    #[rocket::async_test]
    async fn test_program_status_transitions() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        let coach = login_test_user(&client, "coach@example.com").await;

        let (_, body) = post_json(&client, &coach, "/api/programs", json!({ "name": "Cycle" })).await;
        let uri = format!("/api/programs/{}", body["data"]["id"].as_i64().unwrap());

        let (status, _) = put_json(&client, &coach, &uri, json!({ "status": "paused" })).await;
        assert_eq!(status, Status::BadRequest);

        for next in ["active", "paused", "active", "completed"] {
            let (status, body) = put_json(&client, &coach, &uri, json!({ "status": next })).await;
            assert_eq!(status, Status::Ok, "move to {} failed: {}", next, body);
            assert_eq!(body["data"]["status"], next);
        }

        let (status, _) = put_json(&client, &coach, &uri, json!({ "status": "active" })).await;
        assert_eq!(status, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_assign_notifies_client_and_delete_cascades() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let client_id = test_db.user_id("client@example.com");
        let coach = login_test_user(&client, "coach@example.com").await;

        let (_, body) = post_json(&client, &coach, "/api/programs", json!({ "name": "Later" })).await;
        let program_id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = post_json(
            &client,
            &coach,
            &format!("/api/programs/{}/assign", program_id),
            json!({ "client_id": client_id }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"]["client_id"], client_id);

        let owner = login_test_user(&client, "client@example.com").await;
        let (_, body) = get_json(&client, &owner, "/api/notifications").await;
        let notifications = body["data"].as_array().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["notification_type"], "program");
        assert_eq!(notifications[0]["reference_id"], program_id);

        let (status, _) = post_json(
            &client,
            &coach,
            "/api/workouts",
            json!({
                "client_id": client_id,
                "program_id": program_id,
                "name": "Day 1",
                "scheduled_date": "2030-01-10"
            }),
        )
        .await;
        assert_eq!(status, Status::Created);

        let (status, _) = delete(&client, &coach, &format!("/api/programs/{}", program_id)).await;
        assert_eq!(status, Status::Ok);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workouts WHERE program_id = ?")
            .bind(program_id)
            .fetch_one(&test_db.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
