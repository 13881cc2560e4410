#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::sync::Once;

    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde_json::{Value, json};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use tracing::log::LevelFilter;

    use crate::auth::{Role, UserStatus};
    use crate::config::AppConfig;
    use crate::db::users::{NewUser, create_user};
    use crate::error::AppError;
    use crate::init_rocket;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret-that-is-at-least-32-bytes-long".to_string(),
            token_ttl_hours: 24,
            max_connections: 1,
            bcrypt_cost: 4,
            working_day_start: 8,
            working_day_end: 18,
            sweep_interval_secs: 0,
            otlp_endpoint: None,
            otlp_api_key: None,
            otlp_api_key_header: "x-honeycomb-team".to_string(),
            environment: "test".to_string(),
        }
    }

    pub struct TestUser {
        pub email: String,
        pub name: String,
        pub role: Role,
        pub status: UserStatus,
        pub coach_email: Option<String>,
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn user(mut self, email: &str, name: &str, role: Role) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                name: name.to_string(),
                role,
                status: UserStatus::Active,
                coach_email: None,
            });
            self
        }

        pub fn client(self, email: &str, name: &str) -> Self {
            self.user(email, name, Role::Client)
        }

        pub fn coach(self, email: &str, name: &str) -> Self {
            self.user(email, name, Role::Coach)
        }

        pub fn admin(self, email: &str, name: &str) -> Self {
            self.user(email, name, Role::Admin)
        }

        /// A client explicitly assigned to an already-declared coach.
        pub fn client_of(mut self, email: &str, name: &str, coach_email: &str) -> Self {
            self = self.user(email, name, Role::Client);
            if let Some(user) = self.users.last_mut() {
                user.coach_email = Some(coach_email.to_string());
            }
            self
        }

        pub fn inactive(mut self, email: &str, name: &str, role: Role) -> Self {
            self = self.user(email, name, role);
            if let Some(user) = self.users.last_mut() {
                user.status = UserStatus::Inactive;
            }
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            // One connection keeps every query on the same in-memory database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;

            let mut user_ids: HashMap<String, i64> = HashMap::new();
            for user in &self.users {
                let coach_id = user
                    .coach_email
                    .as_ref()
                    .and_then(|email| user_ids.get(email).copied());

                let id = create_user(
                    &pool,
                    &NewUser {
                        email: user.email.clone(),
                        password: STANDARD_PASSWORD.to_string(),
                        name: user.name.clone(),
                        role: user.role,
                        phone: None,
                        coach_id,
                        status: user.status,
                    },
                    4,
                )
                .await?;
                user_ids.insert(user.email.clone(), id);
            }

            Ok(TestDb { pool, user_ids })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_ids: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, email: &str) -> i64 {
            self.user_ids[email]
        }
    }

    /// A coach, two clients (one assigned to the coach), a second coach and
    /// an admin.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .coach("coach@example.com", "Coach Carter")
            .coach("other.coach@example.com", "Other Coach")
            .client_of("client@example.com", "Casey Client", "coach@example.com")
            .client("other.client@example.com", "Olive Other")
            .admin("admin@example.com", "Ada Admin")
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), test_config());
        let client = Client::tracked(rocket)
            .await
            .expect("Failed to build rocket client");
        (client, test_db)
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }

    pub async fn body_json(response: LocalResponse<'_>) -> Value {
        let body = response.into_string().await.expect("response body");
        serde_json::from_str(&body).expect("response is JSON")
    }

    pub async fn login_test_user(client: &Client, email: &str) -> String {
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "email": email, "password": STANDARD_PASSWORD }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok, "login failed for {}", email);

        let body = body_json(response).await;
        body["data"]["token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    pub async fn get_json(client: &Client, token: &str, uri: &str) -> (Status, Value) {
        let response = client.get(uri.to_string()).header(bearer(token)).dispatch().await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn send_json(
        client: &Client,
        method: rocket::http::Method,
        token: &str,
        uri: &str,
        body: Value,
    ) -> (Status, Value) {
        let response = client
            .req(method, uri.to_string())
            .header(ContentType::JSON)
            .header(bearer(token))
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn post_json(client: &Client, token: &str, uri: &str, body: Value) -> (Status, Value) {
        send_json(client, rocket::http::Method::Post, token, uri, body).await
    }

    pub async fn put_json(client: &Client, token: &str, uri: &str, body: Value) -> (Status, Value) {
        send_json(client, rocket::http::Method::Put, token, uri, body).await
    }

    pub async fn delete(client: &Client, token: &str, uri: &str) -> (Status, Value) {
        let response = client
            .delete(uri.to_string())
            .header(bearer(token))
            .dispatch()
            .await;
        let status = response.status();
        (status, body_json(response).await)
    }
}
