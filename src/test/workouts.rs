#[cfg(test)]
mod tests {
    use rocket::http::Status;
    use serde_json::{Value, json};

    use crate::test::utils::test_utils::{
        create_standard_test_db, delete, get_json, login_test_user, post_json, put_json,
        setup_test_client,
    };

    async fn create_exercise(client: &rocket::local::asynchronous::Client, token: &str, name: &str) -> i64 {
        let (status, body) = post_json(
            client,
            token,
            "/api/exercises",
            json!({ "name": name, "category": "strength", "equipment": "barbell" }),
        )
        .await;
        assert_eq!(status, Status::Created, "{}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    #[rocket::async_test]
    async fn test_workout_with_ordered_exercises() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let coach = login_test_user(&client, "coach@example.com").await;

        let squat = create_exercise(&client, &coach, "Back Squat").await;
        let bench = create_exercise(&client, &coach, "Bench Press").await;

        let (status, body) = post_json(
            &client,
            &coach,
            "/api/workouts",
            json!({
                "client_id": test_db.user_id("client@example.com"),
                "name": "Lower body",
                "scheduled_date": "2030-03-01",
                "exercises": [
                    { "exercise_id": squat, "sets": 5, "reps": 5, "weight": 100.0 },
                    { "exercise_id": bench, "sets": 3, "reps": 8 }
                ]
            }),
        )
        .await;
        assert_eq!(status, Status::Created, "{}", body);
        assert_eq!(body["data"]["status"], "scheduled");

        let exercises = body["data"]["exercises"].as_array().unwrap();
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0]["exercise_id"], squat);
        assert_eq!(exercises[1]["exercise_id"], bench);
        assert!(exercises[0]["order_index"].as_i64() < exercises[1]["order_index"].as_i64());

        let (status, _) = post_json(
            &client,
            &coach,
            "/api/workouts",
            json!({
                "client_id": test_db.user_id("client@example.com"),
                "name": "Ghost",
                "scheduled_date": "2030-03-02",
                "exercises": [{ "exercise_id": 4242 }]
            }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_client_progress_updates() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let coach = login_test_user(&client, "coach@example.com").await;
        let squat = create_exercise(&client, &coach, "Front Squat").await;

        let (_, body) = post_json(
            &client,
            &coach,
            "/api/workouts",
            json!({
                "client_id": test_db.user_id("client@example.com"),
                "name": "Legs",
                "scheduled_date": "2030-03-01",
                "exercises": [{ "exercise_id": squat, "sets": 3, "reps": 10 }]
            }),
        )
        .await;
        let workout_id = body["data"]["id"].as_i64().unwrap();
        let entry_id = body["data"]["exercises"][0]["id"].as_i64().unwrap();
        let uri = format!("/api/workouts/{}", workout_id);

        let owner = login_test_user(&client, "client@example.com").await;
        let (status, _) = put_json(&client, &owner, &uri, json!({ "name": "Renamed" })).await;
        assert_eq!(status, Status::Forbidden);

        let (status, body) = put_json(
            &client,
            &owner,
            &format!("{}/exercises/{}", uri, entry_id),
            json!({ "completed": true, "sets": 99 }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"]["completed"], true);
        assert_eq!(body["data"]["sets"], 3);

        let (status, body) = put_json(
            &client,
            &owner,
            &uri,
            json!({ "status": "completed", "completion_rating": 4, "calories_burned": 350 }),
        )
        .await;
        assert_eq!(status, Status::Ok, "{}", body);
        assert_eq!(body["data"]["status"], "completed");
        assert!(body["data"]["completed_at"].is_string());

        let (status, _) = put_json(&client, &owner, &uri, json!({ "status": "scheduled" })).await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) = put_json(&client, &owner, &uri, json!({ "completion_rating": 9 })).await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) = delete(&client, &owner, &uri).await;
        assert_eq!(status, Status::Forbidden);

        let (status, _) = delete(&client, &coach, &uri).await;
        assert_eq!(status, Status::Ok);
    }

    #[rocket::async_test]
    async fn test_workout_listing_is_scoped() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let coach = login_test_user(&client, "coach@example.com").await;

        for day in ["2030-04-01", "2030-04-02"] {
            let (status, _) = post_json(
                &client,
                &coach,
                "/api/workouts",
                json!({
                    "client_id": test_db.user_id("client@example.com"),
                    "name": format!("Session {}", day),
                    "scheduled_date": day
                }),
            )
            .await;
            assert_eq!(status, Status::Created);
        }

        let (status, _) = post_json(
            &client,
            &coach,
            "/api/workouts",
            json!({
                "client_id": test_db.user_id("other.client@example.com"),
                "name": "Not my client",
                "scheduled_date": "2030-04-01"
            }),
        )
        .await;
        assert_eq!(status, Status::Forbidden);

        let owner = login_test_user(&client, "client@example.com").await;
        let (_, body) = get_json(&client, &owner, "/api/workouts?from=2030-04-02").await;
        let workouts: &Vec<Value> = body["data"].as_array().unwrap();
        assert_eq!(workouts.len(), 1);
        assert_eq!(workouts[0]["scheduled_date"], "2030-04-02");

        let stranger = login_test_user(&client, "other.client@example.com").await;
        let (_, body) = get_json(&client, &stranger, "/api/workouts").await;
        assert_eq!(body["pagination"]["total"], 0);

        let other_coach = login_test_user(&client, "other.coach@example.com").await;
        let (_, body) = get_json(&client, &other_coach, "/api/workouts").await;
        assert_eq!(body["pagination"]["total"], 0);

        let (_, body) = get_json(&client, &coach, "/api/workouts?limit=1").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["pagination"]["total"], 2);
        assert_eq!(body["pagination"]["totalPages"], 2);
    }

    #[rocket::async_test]
    async fn test_private_exercises_hidden_from_others() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        let coach = login_test_user(&client, "coach@example.com").await;

        let (status, body) = post_json(
            &client,
            &coach,
            "/api/exercises",
            json!({ "name": "Secret Sauce", "category": "balance", "is_public": false }),
        )
        .await;
        assert_eq!(status, Status::Created);
        let uri = format!("/api/exercises/{}", body["data"]["id"].as_i64().unwrap());

        let (status, _) = get_json(&client, &coach, &uri).await;
        assert_eq!(status, Status::Ok);

        let other_coach = login_test_user(&client, "other.coach@example.com").await;
        let (status, _) = get_json(&client, &other_coach, &uri).await;
        assert_eq!(status, Status::NotFound);
        let (_, body) = get_json(&client, &other_coach, "/api/exercises?category=balance").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        let owner = login_test_user(&client, "client@example.com").await;
        let (status, _) = post_json(&client, &owner, "/api/exercises", json!({ "name": "Nope" })).await;
        assert_eq!(status, Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_workouts_cannot_use_foreign_private_exercises() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let coach = login_test_user(&client, "coach@example.com").await;
        let other_coach = login_test_user(&client, "other.coach@example.com").await;
        let client_id = test_db.user_id("client@example.com");

        let (status, body) = post_json(
            &client,
            &other_coach,
            "/api/exercises",
            json!({ "name": "House Special", "category": "strength", "is_public": false }),
        )
        .await;
        assert_eq!(status, Status::Created);
        let private_id = body["data"]["id"].as_i64().unwrap();

        let (status, _) = post_json(
            &client,
            &coach,
            "/api/workouts",
            json!({
                "client_id": client_id,
                "name": "Borrowed",
                "scheduled_date": "2030-03-05",
                "exercises": [{ "exercise_id": private_id }]
            }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let (status, body) = post_json(
            &client,
            &coach,
            "/api/workouts",
            json!({ "client_id": client_id, "name": "Plain", "scheduled_date": "2030-03-05" }),
        )
        .await;
        assert_eq!(status, Status::Created);
        let exercises_uri = format!("/api/workouts/{}/exercises", body["data"]["id"].as_i64().unwrap());

        let (status, _) =
            post_json(&client, &coach, &exercises_uri, json!({ "exercise_id": private_id })).await;
        assert_eq!(status, Status::BadRequest);

        let own = create_exercise(&client, &coach, "Goblet Squat").await;
        let (status, body) =
            post_json(&client, &coach, &exercises_uri, json!({ "exercise_id": own, "sets": 3 })).await;
        assert_eq!(status, Status::Created, "{}", body);
    }
}
