#[cfg(test)]
mod tests {
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};

    use crate::db::appointments::complete_elapsed_appointments;
    use crate::error::AppError;
    use crate::test::utils::test_utils::{
        create_standard_test_db, delete, get_json, login_test_user, post_json, put_json,
        setup_test_client,
    };
    use crate::validation::parse_datetime;

    async fn insert_row(
        pool: &sqlx::SqlitePool,
        coach_id: i64,
        client_id: i64,
        start: &str,
        end: &str,
        status: &str,
    ) -> Result<i64, AppError> {
        let result = sqlx::query(
            "INSERT INTO appointments
                (coach_id, client_id, scheduled_at, duration_minutes, ends_at, status)
             VALUES (?, ?, ?, 30, ?, ?)",
        )
        .bind(coach_id)
        .bind(client_id)
        .bind(start)
        .bind(end)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn book(client: &Client, token: &str, body: Value) -> (Status, Value) {
        post_json(client, token, "/api/appointments", body).await
    }

    #[rocket::async_test]
    async fn test_overlapping_bookings_conflict() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let coach_id = test_db.user_id("coach@example.com");
        let owner = login_test_user(&client, "client@example.com").await;

        let (status, body) = book(
            &client,
            &owner,
            json!({ "coach_id": coach_id, "scheduled_at": "2030-01-15T10:00:00Z", "duration_minutes": 60 }),
        )
        .await;
        assert_eq!(status, Status::Created, "{}", body);
        assert_eq!(body["data"]["status"], "scheduled");
        assert_eq!(body["data"]["scheduled_at"], "2030-01-15T10:00:00Z");

        let (status, body) = book(
            &client,
            &owner,
            json!({ "coach_id": coach_id, "scheduled_at": "2030-01-15T10:30:00Z", "duration_minutes": 30 }),
        )
        .await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(body["success"], false);

        // Touching intervals do not overlap.
        let (status, _) = book(
            &client,
            &owner,
            json!({ "coach_id": coach_id, "scheduled_at": "2030-01-15T11:00:00Z", "duration_minutes": 30 }),
        )
        .await;
        assert_eq!(status, Status::Created);

        // Another coach's calendar is independent.
        let (status, _) = book(
            &client,
            &owner,
            json!({
                "coach_id": test_db.user_id("other.coach@example.com"),
                "scheduled_at": "2030-01-15T10:00:00Z"
            }),
        )
        .await;
        assert_eq!(status, Status::Created);
    }

    #[rocket::async_test]
    async fn test_cancelled_appointment_frees_the_slot() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let coach = login_test_user(&client, "coach@example.com").await;
        let client_id = test_db.user_id("client@example.com");

        let (status, body) = book(
            &client,
            &coach,
            json!({ "client_id": client_id, "scheduled_at": "2030-01-16T09:00:00Z", "duration_minutes": 45 }),
        )
        .await;
        assert_eq!(status, Status::Created);
        let uri = format!("/api/appointments/{}", body["data"]["id"].as_i64().unwrap());

        let (status, _) = delete(&client, &coach, &uri).await;
        assert_eq!(status, Status::Ok);
        let (_, body) = get_json(&client, &coach, &uri).await;
        assert_eq!(body["data"]["status"], "cancelled");

        let (status, _) = book(
            &client,
            &coach,
            json!({ "client_id": client_id, "scheduled_at": "2030-01-16T09:15:00Z", "duration_minutes": 30 }),
        )
        .await;
        assert_eq!(status, Status::Created);

        // Reviving the cancelled one now collides.
        let (status, _) = put_json(&client, &coach, &uri, json!({ "status": "scheduled" })).await;
        assert_eq!(status, Status::Conflict);
    }

    #[rocket::async_test]
    async fn test_booking_validation() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let coach_id = test_db.user_id("coach@example.com");
        let owner = login_test_user(&client, "client@example.com").await;

        let bad = vec![
            json!({ "scheduled_at": "2030-01-15T10:00:00Z" }),
            json!({ "coach_id": coach_id, "scheduled_at": "tomorrow-ish" }),
            json!({ "coach_id": coach_id, "scheduled_at": "2030-01-15T10:00:00Z", "duration_minutes": 4 }),
            json!({ "coach_id": coach_id, "scheduled_at": "2030-01-15T10:00:00Z", "duration_minutes": 481 }),
            json!({
                "coach_id": test_db.user_id("other.client@example.com"),
                "scheduled_at": "2030-01-15T10:00:00Z"
            }),
        ];
        for body in bad {
            let (status, _) = book(&client, &owner, body.clone()).await;
            assert_eq!(status, Status::BadRequest, "accepted {}", body);
        }

        let (status, _) = book(
            &client,
            &owner,
            json!({
                "coach_id": coach_id,
                "client_id": test_db.user_id("other.client@example.com"),
                "scheduled_at": "2030-01-15T10:00:00Z"
            }),
        )
        .await;
        assert_eq!(status, Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_client_status_changes_are_limited() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let owner = login_test_user(&client, "client@example.com").await;
        let coach = login_test_user(&client, "coach@example.com").await;

        let (_, body) = book(
            &client,
            &owner,
            json!({
                "coach_id": test_db.user_id("coach@example.com"),
                "scheduled_at": "2030-02-01T14:00:00Z"
            }),
        )
        .await;
        let uri = format!("/api/appointments/{}", body["data"]["id"].as_i64().unwrap());

        let (status, _) = put_json(&client, &owner, &uri, json!({ "status": "completed" })).await;
        assert_eq!(status, Status::Forbidden);
        let (status, _) = put_json(&client, &owner, &uri, json!({ "status": "no_show" })).await;
        assert_eq!(status, Status::Forbidden);
        let (status, _) = put_json(
            &client,
            &owner,
            &uri,
            json!({ "scheduled_at": "2030-02-01T15:00:00Z" }),
        )
        .await;
        assert_eq!(status, Status::Forbidden);

        let (status, body) = put_json(
            &client,
            &owner,
            &uri,
            json!({ "status": "confirmed", "notes": "See you there" }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"]["status"], "confirmed");
        assert_eq!(body["data"]["notes"], "See you there");

        // The coach hears about it.
        let (_, body) = get_json(&client, &coach, "/api/notifications?unread_only=true").await;
        let titles: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|n| n["title"].as_str())
            .collect();
        assert!(titles.contains(&"New appointment"));
        assert!(titles.contains(&"Appointment updated"));

        let (status, _) = put_json(
            &client,
            &coach,
            &uri,
            json!({ "scheduled_at": "2030-02-01T15:00:00Z" }),
        )
        .await;
        assert_eq!(status, Status::Ok);

        let (status, body) = put_json(&client, &coach, &uri, json!({ "status": "no_show" })).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"]["status"], "no_show");
    }

    #[rocket::async_test]
    async fn test_available_slots_skip_booked_time() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let coach_id = test_db.user_id("coach@example.com");
        let owner = login_test_user(&client, "client@example.com").await;

        let (status, _) = book(
            &client,
            &owner,
            json!({ "coach_id": coach_id, "scheduled_at": "2030-01-15T09:30:00Z", "duration_minutes": 60 }),
        )
        .await;
        assert_eq!(status, Status::Created);

        let (status, body) = get_json(
            &client,
            &owner,
            &format!(
                "/api/appointments/available-slots?coach_id={}&date=2030-01-15&duration=60",
                coach_id
            ),
        )
        .await;
        assert_eq!(status, Status::Ok);

        let slots: Vec<&str> = body["data"]["available_slots"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0], "2030-01-15T08:00:00Z");
        assert!(!slots.contains(&"2030-01-15T09:00:00Z"));
        assert!(!slots.contains(&"2030-01-15T10:00:00Z"));
        assert_eq!(slots[slots.len() - 1], "2030-01-15T17:00:00Z");

        let (status, _) = get_json(
            &client,
            &owner,
            &format!(
                "/api/appointments/available-slots?coach_id={}&date=2030-01-15",
                test_db.user_id("other.client@example.com")
            ),
        )
        .await;
        assert_eq!(status, Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_appointments_hidden_from_outsiders() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let owner = login_test_user(&client, "client@example.com").await;

        let (_, body) = book(
            &client,
            &owner,
            json!({
                "coach_id": test_db.user_id("coach@example.com"),
                "scheduled_at": "2030-05-05T12:00:00Z"
            }),
        )
        .await;
        let uri = format!("/api/appointments/{}", body["data"]["id"].as_i64().unwrap());

        for email in ["other.client@example.com", "other.coach@example.com"] {
            let token = login_test_user(&client, email).await;
            let (status, _) = get_json(&client, &token, &uri).await;
            assert_eq!(status, Status::NotFound, "{} saw the appointment", email);
            let (status, _) = delete(&client, &token, &uri).await;
            assert_eq!(status, Status::NotFound);
            let (_, body) = get_json(&client, &token, "/api/appointments").await;
            assert_eq!(body["pagination"]["total"], 0);
        }

        let (_, body) = get_json(&client, &owner, "/api/appointments?date=2030-05-05").await;
        assert_eq!(body["pagination"]["total"], 1);
        let (_, body) = get_json(&client, &owner, "/api/appointments?date=2030-05-06").await;
        assert_eq!(body["pagination"]["total"], 0);
    }

    #[rocket::async_test]
    async fn test_sweeper_completes_elapsed_confirmed_appointments() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let owner = login_test_user(&client, "client@example.com").await;
        let coach_id = test_db.user_id("coach@example.com");

        let mut ids = Vec::new();
        for at in ["2030-06-01T08:00:00Z", "2030-06-01T10:00:00Z"] {
            let (_, body) = book(&client, &owner, json!({ "coach_id": coach_id, "scheduled_at": at })).await;
            ids.push(body["data"]["id"].as_i64().unwrap());
        }
        let (status, _) = put_json(
            &client,
            &owner,
            &format!("/api/appointments/{}", ids[0]),
            json!({ "status": "confirmed" }),
        )
        .await;
        assert_eq!(status, Status::Ok);

        let later = parse_datetime("now", "2030-06-02T00:00:00Z").unwrap();
        let completed = complete_elapsed_appointments(&test_db.pool, later).await.unwrap();
        assert_eq!(completed, 1);

        let (_, body) = get_json(&client, &owner, &format!("/api/appointments/{}", ids[0])).await;
        assert_eq!(body["data"]["status"], "completed");
        let (_, body) = get_json(&client, &owner, &format!("/api/appointments/{}", ids[1])).await;
        assert_eq!(body["data"]["status"], "scheduled");
    }

    #[rocket::async_test]
    async fn test_bookings_do_not_grant_lasting_access() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let client_id = test_db.user_id("client@example.com");
        let summary_uri = format!("/api/nutrition/summary/{}", client_id);
        let other_coach = login_test_user(&client, "other.coach@example.com").await;
        let owner = login_test_user(&client, "client@example.com").await;

        let (status, _) = get_json(&client, &other_coach, &summary_uri).await;
        assert_eq!(status, Status::Forbidden);

        // A coach cannot book their way into an unrelated client's records.
        let (status, _) = book(
            &client,
            &other_coach,
            json!({ "client_id": client_id, "scheduled_at": "2030-07-01T10:00:00Z" }),
        )
        .await;
        assert_eq!(status, Status::Forbidden);

        // A client booking links the pair until it is cancelled.
        let (status, body) = book(
            &client,
            &owner,
            json!({
                "coach_id": test_db.user_id("other.coach@example.com"),
                "scheduled_at": "2030-07-01T10:00:00Z"
            }),
        )
        .await;
        assert_eq!(status, Status::Created);
        let uri = format!("/api/appointments/{}", body["data"]["id"].as_i64().unwrap());

        let (status, _) = get_json(&client, &other_coach, &summary_uri).await;
        assert_eq!(status, Status::Ok);

        let (status, _) = delete(&client, &other_coach, &uri).await;
        assert_eq!(status, Status::Ok);

        let (status, _) = get_json(&client, &other_coach, &summary_uri).await;
        assert_eq!(status, Status::Forbidden);
        let (status, _) = put_json(
            &client,
            &other_coach,
            &format!("/api/users/{}", client_id),
            json!({ "name": "Renamed" }),
        )
        .await;
        assert_eq!(status, Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_only_owner_or_admin_changes_email() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let uri = format!("/api/users/{}", test_db.user_id("client@example.com"));

        let coach = login_test_user(&client, "coach@example.com").await;
        let (status, _) = put_json(&client, &coach, &uri, json!({ "email": "taken@example.com" })).await;
        assert_eq!(status, Status::Forbidden);
        let (status, _) = put_json(&client, &coach, &uri, json!({ "goals": "Deadlift 150" })).await;
        assert_eq!(status, Status::Ok);

        let owner = login_test_user(&client, "client@example.com").await;
        let (status, body) =
            put_json(&client, &owner, &uri, json!({ "email": "Casey@Example.com" })).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"]["email"], "casey@example.com");

        let admin = login_test_user(&client, "admin@example.com").await;
        let (status, body) =
            put_json(&client, &admin, &uri, json!({ "email": "casey.c@example.com" })).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"]["email"], "casey.c@example.com");
    }

    #[rocket::async_test]
    async fn test_schema_rejects_overlapping_rows() {
        let test_db = create_standard_test_db().await;
        let pool = &test_db.pool;
        let coach_id = test_db.user_id("coach@example.com");
        let client_id = test_db.user_id("client@example.com");

        insert_row(pool, coach_id, client_id, "2030-08-01 10:30:00", "2030-08-01 11:00:00", "scheduled")
            .await
            .unwrap();

        let overlap = insert_row(
            pool,
            coach_id,
            client_id,
            "2030-08-01 10:45:00",
            "2030-08-01 11:15:00",
            "confirmed",
        )
        .await;
        assert!(matches!(overlap, Err(AppError::Conflict(_))), "{:?}", overlap);

        let touching = insert_row(
            pool,
            coach_id,
            client_id,
            "2030-08-01 11:00:00",
            "2030-08-01 11:30:00",
            "scheduled",
        )
        .await
        .unwrap();

        // Cancelled rows neither block nor are blocked.
        insert_row(pool, coach_id, client_id, "2030-08-01 10:30:00", "2030-08-01 11:00:00", "cancelled")
            .await
            .unwrap();

        let moved = sqlx::query(
            "UPDATE appointments SET scheduled_at = '2030-08-01 10:45:00', ends_at = '2030-08-01 11:15:00'
             WHERE id = ?",
        )
        .bind(touching)
        .execute(pool)
        .await
        .map_err(AppError::from);
        assert!(matches!(moved, Err(AppError::Conflict(_))), "{:?}", moved);

        sqlx::query(
            "UPDATE appointments SET scheduled_at = '2030-08-01 11:30:00', ends_at = '2030-08-01 12:00:00'
             WHERE id = ?",
        )
        .bind(touching)
        .execute(pool)
        .await
        .unwrap();
    }

    #[rocket::async_test]
    async fn test_default_listing_hides_cancelled() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let coach = login_test_user(&client, "coach@example.com").await;
        let client_id = test_db.user_id("client@example.com");

        let (_, body) = book(
            &client,
            &coach,
            json!({ "client_id": client_id, "scheduled_at": "2030-02-10T09:00:00Z" }),
        )
        .await;
        let uri = format!("/api/appointments/{}", body["data"]["id"].as_i64().unwrap());
        let (status, _) = book(
            &client,
            &coach,
            json!({ "client_id": client_id, "scheduled_at": "2030-02-10T11:00:00Z" }),
        )
        .await;
        assert_eq!(status, Status::Created);

        let (status, _) = delete(&client, &coach, &uri).await;
        assert_eq!(status, Status::Ok);

        let (_, body) = get_json(&client, &coach, "/api/appointments").await;
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["data"][0]["status"], "scheduled");

        let (_, body) = get_json(&client, &coach, "/api/appointments?status=cancelled").await;
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["data"][0]["status"], "cancelled");
    }
}
