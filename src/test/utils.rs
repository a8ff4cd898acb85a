#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use chrono::Duration;
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};
    use sqlx::{Pool, Sqlite};
    use tempfile::TempDir;

    use crate::auth::{Role, TokenService};
    use crate::config::AppConfig;
    use crate::database::{self, create_technique, create_user};
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::NewTechnique;
    use crate::telemetry::init_test_tracing;

    pub static STANDARD_PASSWORD: &str = "password123";
    pub static TEST_JWT_SECRET: &str = "test-secret";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        techniques: Vec<NewTechnique>,
    }

    pub struct TestUser {
        pub username: String,
        pub role: Role,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn member(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Member,
            });
            self
        }

        pub fn admin(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Admin,
            });
            self
        }

        pub fn technique(mut self, name: &str, style: &str, difficulty: &str) -> Self {
            self.techniques.push(NewTechnique {
                name: name.to_string(),
                description: Some(format!("How to perform {}", name)),
                style: Some(style.to_string()),
                difficulty: Some(difficulty.to_string()),
                reference_video_url: None,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            init_test_tracing();

            let dir = TempDir::new()?;
            let url = format!("sqlite://{}", dir.path().join("dojo.db").display());
            let pool = database::connect(&url).await?;

            let mut user_id_map = HashMap::new();
            let mut technique_id_map = HashMap::new();

            for user in &self.users {
                let created = create_user(
                    &pool,
                    &user.username,
                    &format!("{}@example.com", user.username),
                    STANDARD_PASSWORD,
                    user.role,
                    4,
                )
                .await?;
                user_id_map.insert(user.username.clone(), created.id);
            }

            for technique in &self.techniques {
                let created = create_technique(&pool, technique).await?;
                technique_id_map.insert(technique.name.clone(), created.id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                technique_id_map,
                dir,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub technique_id_map: HashMap<String, i64>,
        pub dir: TempDir,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> i64 {
            self.user_id_map[username]
        }

        pub fn technique_id(&self, name: &str) -> i64 {
            self.technique_id_map[name]
        }

        pub fn upload_dir(&self) -> PathBuf {
            self.dir.path().join("uploads")
        }

        /// Number of files written to the upload directory so far.
        pub fn stored_files(&self) -> usize {
            std::fs::read_dir(self.upload_dir())
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    /// Two members, one admin and a small mixed catalog.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .member("alice")
            .member("bob")
            .admin("sensei")
            .technique("Jab", "Boxing", "Beginner")
            .technique("Front Kick", "Karate", "Beginner")
            .technique("Armbar", "Brazilian Jiu-Jitsu", "Intermediate")
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub fn test_config(test_db: &TestDb) -> AppConfig {
        AppConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            upload_dir: test_db.upload_dir(),
            bcrypt_cost: 4,
            ..AppConfig::default()
        }
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let config = test_config(&test_db);
        let rocket = init_rocket(test_db.pool.clone(), config);
        let client = Client::tracked(rocket)
            .await
            .expect("Failed to create test client");
        (client, test_db)
    }

    /// A token the server will accept for `user_id`, issued with `ttl`.
    pub fn token_with_ttl(user_id: i64, ttl: Duration) -> String {
        TokenService::new(TEST_JWT_SECRET, ttl)
            .issue(user_id)
            .expect("Failed to issue token")
    }

    pub async fn login_test_user(client: &Client, username: &str, password: &str) -> String {
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "login failed for {}", username);

        let body: Value = response.into_json().await.expect("login body");
        body["access_token"]
            .as_str()
            .expect("access_token missing")
            .to_string()
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }

    pub const BOUNDARY: &str = "dojo-test-boundary";

    pub fn multipart_type() -> ContentType {
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
    }

    /// Builds a multipart body from text fields plus an optional `video` file part.
    pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }

        if let Some((filename, contents)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(contents);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    /// Uploads `filename` with the bearer `token` and returns the created video JSON.
    pub async fn upload_test_video(
        client: &Client,
        token: &str,
        filename: &str,
        fields: &[(&str, &str)],
    ) -> Value {
        let response = client
            .post("/api/training/videos")
            .header(multipart_type())
            .header(bearer(token))
            .body(multipart_body(fields, Some((filename, b"fake video bytes".as_slice()))))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        let body: Value = response.into_json().await.expect("upload body");
        body["video"].clone()
    }

    pub async fn create_test_session(client: &Client, token: &str, body: Value) -> Value {
        let response = client
            .post("/api/training/sessions")
            .header(ContentType::JSON)
            .header(bearer(token))
            .body(body.to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        let body: Value = response.into_json().await.expect("session body");
        body["session"].clone()
    }
}
