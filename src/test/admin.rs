#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use serde_json::{Value, json};

    use crate::test::utils::test_utils::{
        STANDARD_PASSWORD, bearer, create_standard_test_db, login_test_user, setup_test_client,
    };

    #[rocket::async_test]
    async fn test_members_cannot_manage_catalog() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "alice", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/admin/techniques/bulk-import")
            .header(ContentType::JSON)
            .header(bearer(&token))
            .body(json!({ "techniques": [{ "name": "Jab" }] }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "Admin access required");

        let response = client
            .delete("/api/admin/techniques/bulk-delete")
            .header(ContentType::JSON)
            .header(bearer(&token))
            .body(json!({ "technique_ids": [test_db.technique_id("Jab")] }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .delete("/api/admin/techniques/clear-all")
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let remaining = crate::database::count_techniques(&test_db.pool).await.unwrap();
        assert_eq!(remaining, 3);
    }

    #[rocket::async_test]
    async fn test_bulk_import_skips_duplicates() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "sensei", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/admin/techniques/bulk-import")
            .header(ContentType::JSON)
            .header(bearer(&token))
            .body(
                json!({
                    "techniques": [
                        { "name": "Jab", "style": "Boxing" },
                        { "name": "Hook", "style": "Boxing" },
                        { "name": "Hook", "style": "Boxing" },
                        { "name": "Kata" },
                        { "style": "Judo" }
                    ]
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["imported"], 2);
        assert_eq!(body["skipped"], 2);
        assert_eq!(body["total_techniques"], 5);
        assert_eq!(
            body["errors"],
            json!([{ "name": "missing", "error": "Name is required" }])
        );

        let response = client
            .get("/api/techniques?style=General")
            .header(bearer(&token))
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        let techniques = body["techniques"].as_array().unwrap();
        assert_eq!(techniques.len(), 1);
        assert_eq!(techniques[0]["name"], "Kata");
        assert_eq!(techniques[0]["difficulty"], "Intermediate");
    }

    #[rocket::async_test]
    async fn test_bulk_import_requires_payload() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "sensei", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/admin/techniques/bulk-import")
            .header(ContentType::JSON)
            .header(bearer(&token))
            .body(json!({}).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "Missing techniques data");

        let response = client
            .post("/api/admin/techniques/bulk-import")
            .header(ContentType::JSON)
            .header(bearer(&token))
            .body(json!({ "techniques": "Jab" }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "Techniques must be an array");
    }

    #[rocket::async_test]
    async fn test_bulk_import_reports_malformed_items() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "sensei", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/admin/techniques/bulk-import")
            .header(ContentType::JSON)
            .header(bearer(&token))
            .body(
                json!({
                    "techniques": [
                        42,
                        { "name": "Uppercut", "style": "Boxing" },
                        "Cross"
                    ]
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["imported"], 1);
        assert_eq!(body["total_techniques"], 4);
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|error| error["name"] == "invalid"));
        assert_eq!(errors[0]["error"], "Technique must be an object");
    }

    #[rocket::async_test]
    async fn test_bulk_delete_and_clear_all() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "sensei", STANDARD_PASSWORD).await;

        let response = client
            .delete("/api/admin/techniques/bulk-delete")
            .header(ContentType::JSON)
            .header(bearer(&token))
            .body(
                json!({ "technique_ids": [test_db.technique_id("Jab"), 9999] }).to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["deleted_count"], 1);
        assert_eq!(body["total_remaining"], 2);
        assert_eq!(body["message"], "Deleted 1 techniques");

        let response = client
            .delete("/api/admin/techniques/clear-all")
            .header(bearer(&token))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["deleted_count"], 2);

        let remaining = crate::database::count_techniques(&test_db.pool).await.unwrap();
        assert_eq!(remaining, 0);
    }

    #[rocket::async_test]
    async fn test_technique_stats_visible_to_members() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "bob", STANDARD_PASSWORD).await;

        let response = client
            .get("/api/admin/techniques/stats")
            .header(bearer(&token))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["total"], 3);
        assert_eq!(body["by_style"]["Boxing"], 1);
        assert_eq!(body["by_difficulty"]["Beginner"], 2);
        assert_eq!(body["by_difficulty"]["Intermediate"], 1);
    }
}
