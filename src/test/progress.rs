#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};

    use crate::test::utils::test_utils::{
        STANDARD_PASSWORD, bearer, create_standard_test_db, login_test_user, setup_test_client,
    };

    async fn update(client: &Client, token: &str, technique_id: i64, body: Value) -> Value {
        let response = client
            .put(format!("/api/progress/techniques/{}", technique_id))
            .header(ContentType::JSON)
            .header(bearer(token))
            .body(body.to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        body["progress"].clone()
    }

    #[rocket::async_test]
    async fn test_start_tracking_is_idempotent() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "alice", STANDARD_PASSWORD).await;
        let jab = test_db.technique_id("Jab");

        let response = client
            .post(format!("/api/progress/techniques/{}", jab))
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let first: Value = response.into_json().await.unwrap();
        assert_eq!(first["progress"]["proficiency_status"], "learning");
        assert_eq!(first["progress"]["practice_count"], 0);
        assert_eq!(first["progress"]["technique"]["name"], "Jab");

        let response = client
            .post(format!("/api/progress/techniques/{}", jab))
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let second: Value = response.into_json().await.unwrap();
        assert_eq!(second["message"], "Already tracking this technique");
        assert_eq!(second["progress"]["id"], first["progress"]["id"]);

        let response = client
            .post("/api/progress/techniques/9999")
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_mastered_at_follows_status() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "alice", STANDARD_PASSWORD).await;
        let armbar = test_db.technique_id("Armbar");

        client
            .post(format!("/api/progress/techniques/{}", armbar))
            .header(bearer(&token))
            .dispatch()
            .await;

        let mastered = update(&client, &token, armbar, json!({ "proficiency_status": "mastered" })).await;
        let stamped = mastered["mastered_at"].clone();
        assert!(stamped.is_string());

        let again = update(&client, &token, armbar, json!({ "proficiency_status": "mastered" })).await;
        assert_eq!(again["mastered_at"], stamped);

        let practicing =
            update(&client, &token, armbar, json!({ "proficiency_status": "practicing" })).await;
        assert!(practicing["mastered_at"].is_null());

        let response = client
            .put(format!("/api/progress/techniques/{}", armbar))
            .header(ContentType::JSON)
            .header(bearer(&token))
            .body(json!({ "proficiency_status": "grandmaster" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_mark_practiced_accumulates() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "alice", STANDARD_PASSWORD).await;
        let jab = test_db.technique_id("Jab");

        client
            .post(format!("/api/progress/techniques/{}", jab))
            .header(bearer(&token))
            .dispatch()
            .await;

        update(&client, &token, jab, json!({ "mark_practiced": true, "practice_duration": 20 })).await;
        let progress = update(
            &client,
            &token,
            jab,
            json!({ "mark_practiced": true, "practice_duration": 15, "notes": "Keep elbow in" }),
        )
        .await;

        assert_eq!(progress["practice_count"], 2);
        assert_eq!(progress["total_practice_time"], 35);
        assert_eq!(progress["notes"], "Keep elbow in");
        assert!(progress["last_practiced"].is_string());

        let response = client
            .get(format!("/api/progress/techniques/{}", jab))
            .header(bearer(&token))
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["tracking"], true);
        assert_eq!(body["progress"]["practice_count"], 2);
    }

    #[rocket::async_test]
    async fn test_list_filters_and_stats() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "bob", STANDARD_PASSWORD).await;
        let jab = test_db.technique_id("Jab");
        let kick = test_db.technique_id("Front Kick");

        for id in [jab, kick] {
            client
                .post(format!("/api/progress/techniques/{}", id))
                .header(bearer(&token))
                .dispatch()
                .await;
        }
        update(
            &client,
            &token,
            kick,
            json!({ "is_favorite": true, "proficiency_status": "practicing", "mark_practiced": true, "practice_duration": 30 }),
        )
        .await;

        let response = client
            .get("/api/progress/techniques?favorites=true")
            .header(bearer(&token))
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["progress"][0]["technique_id"], kick);

        let response = client
            .get("/api/progress/techniques?status=learning")
            .header(bearer(&token))
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["progress"][0]["technique_id"], jab);

        let response = client
            .get("/api/progress/techniques?status=bogus")
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .get("/api/progress/stats")
            .header(bearer(&token))
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["total_tracked"], 2);
        assert_eq!(body["favorites_count"], 1);
        assert_eq!(body["total_practices"], 1);
        assert_eq!(body["total_practice_time"], 30);
        assert_eq!(body["by_status"]["learning"], 1);
        assert_eq!(body["by_status"]["practicing"], 1);
        assert_eq!(body["recently_practiced"][0]["technique_id"], kick);

        // Other users see none of it.
        let alice = login_test_user(&client, "alice", STANDARD_PASSWORD).await;
        let response = client
            .get("/api/progress/stats")
            .header(bearer(&alice))
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["total_tracked"], 0);
    }

    #[rocket::async_test]
    async fn test_stop_tracking() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "alice", STANDARD_PASSWORD).await;
        let jab = test_db.technique_id("Jab");

        client
            .post(format!("/api/progress/techniques/{}", jab))
            .header(bearer(&token))
            .dispatch()
            .await;

        let response = client
            .delete(format!("/api/progress/techniques/{}", jab))
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        for response in [
            client
                .get(format!("/api/progress/techniques/{}", jab))
                .header(bearer(&token))
                .dispatch()
                .await,
            client
                .delete(format!("/api/progress/techniques/{}", jab))
                .header(bearer(&token))
                .dispatch()
                .await,
        ] {
            assert_eq!(response.status(), Status::NotFound);
        }
    }
}
