//! Daemon Tests
//!
//! Drive the router in-process with `tower::ServiceExt::oneshot`.

#[cfg(test)]
mod tests {
    use crate::daemon::{AppState, router};
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use dex_core::{RecordDraft, ServiceConfig};
    use dex_runtime::{EntrySource, ExternalEntry, SourceError, StaticEntrySource};
    use dex_storage::{RecordStore, SharedRecordStore, create_memory_store, create_sqlite_store};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn app_with(store: SharedRecordStore, entries: Vec<ExternalEntry>) -> Router {
        let source = Arc::new(StaticEntrySource::new(entries));
        let state = AppState::new(store, source, &ServiceConfig::default());
        router(state, Duration::from_secs(5))
    }

    fn app() -> (Router, SharedRecordStore) {
        let store = create_memory_store();
        (app_with(store.clone(), Vec::new()), store)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        role: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder.header("role", role);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn seed(store: &SharedRecordStore, count: i64) {
        for n in 1..=count {
            let mut draft = RecordDraft::new(n, format!("Mon {n:02}"));
            draft.total = 300 + n;
            draft.legendary = n == 12;
            draft.category_primary = Some(if n % 2 == 0 { "Water" } else { "Fire" }.to_string());
            store.insert(&draft).await.unwrap();
        }
    }

    fn numbers(body: &Value) -> Vec<i64> {
        body["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["number"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_health_needs_no_role() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_record_lifecycle() {
        let (app, _) = app();

        let (status, created) = send(
            &app,
            Method::POST,
            "/records/",
            Some("admin"),
            Some(json!({"number": 999, "name": "Testmon", "total": 500, "hp": 70})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(created["id"].as_i64().is_some());
        assert_eq!(created["attack"], 0);
        assert_eq!(created["legendary"], false);

        let (status, updated) = send(
            &app,
            Method::PATCH,
            "/records/999",
            Some("admin"),
            Some(json!({"attack": 80})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["attack"], 80);
        assert_eq!(updated["hp"], 70);
        assert_eq!(updated["total"], 500);
        assert_eq!(updated["name"], "Testmon");

        let (status, fetched) = send(&app, Method::GET, "/records/999", Some("user"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, updated);

        let (status, body) =
            send(&app, Method::DELETE, "/records/999", Some("admin"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, body) = send(&app, Method::GET, "/records/999", Some("admin"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = send(&app, Method::DELETE, "/records/999", Some("admin"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_updates_all_given_fields() {
        let (app, store) = app();
        seed(&store, 1).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/records/1",
            Some("user"),
            Some(json!({
                "id": 42, "number": 1, "name": "Renamed", "category_primary": null,
                "category_secondary": "Ghost", "total": 1, "hp": 2, "attack": 3,
                "defense": 4, "sp_atk": 5, "sp_def": 6, "speed": 7, "generation": 8,
                "legendary": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["name"], "Renamed");
        assert_eq!(body["category_primary"], Value::Null);
        assert_eq!(body["category_secondary"], "Ghost");
        assert_eq!(body["speed"], 7);
        assert_eq!(body["legendary"], true);

        let (status, _) = send(
            &app,
            Method::PUT,
            "/records/2",
            Some("user"),
            Some(json!({"attack": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_conflicts() {
        let (app, store) = app();
        seed(&store, 1).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/records",
            Some("user"),
            Some(json!({"number": 1, "name": "Mon 01"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");

        let (status, _) = send(
            &app,
            Method::POST,
            "/records",
            Some("user"),
            Some(json!({"number": 1, "name": "Someone else"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_malformed_input() {
        let (app, store) = app();
        seed(&store, 1).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/records/",
            Some("admin"),
            Some(json!({"name": "No number"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, _) = send(&app, Method::GET, "/records/abc", Some("admin"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/records/?page=two", Some("admin"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_role_gate() {
        let (app, _) = app();

        let (status, body) = send(&app, Method::GET, "/records/", Some("guest"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, _) = send(&app, Method::GET, "/records/", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, Method::POST, "/records/load", Some("user"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");

        // The gate runs before the body is read
        let (status, _) = send(
            &app,
            Method::POST,
            "/records/",
            Some("guest"),
            Some(json!({"number": 1, "name": "Sneaky"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_envelope_and_pagination() {
        let (app, store) = app();

        let (status, body) = send(&app, Method::GET, "/records", Some("user"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"results": []}));

        seed(&store, 12).await;

        let (status, body) = send(
            &app,
            Method::GET,
            "/records/?page=2&limit=5",
            Some("user"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(numbers(&body), vec![6, 7, 8, 9, 10]);

        let (_, body) = send(
            &app,
            Method::GET,
            "/records/?sort_by=total&sort_order=desc&limit=3",
            Some("user"),
            None,
        )
        .await;
        assert_eq!(numbers(&body), vec![12, 11, 10]);

        let (status, _) = send(&app, Method::GET, "/records/?limit=101", Some("user"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (app, store) = app();
        seed(&store, 12).await;

        let (_, body) = send(
            &app,
            Method::GET,
            "/records/?search_column=total&keyword=305",
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(numbers(&body), vec![5]);

        let (_, body) = send(
            &app,
            Method::GET,
            "/records/?search_column=legendary&keyword=True",
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(numbers(&body), vec![12]);

        let (_, body) = send(
            &app,
            Method::GET,
            "/records/?search_column=category_primary&keyword=wat&limit=100",
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(numbers(&body), vec![2, 4, 6, 8, 10, 12]);

        for query in [
            "search_column=total&keyword=abc",
            "search_column=legendary&keyword=yes",
            "search_column=password&keyword=x",
            "search_column=name",
            "sort_by=power",
        ] {
            let (status, body) = send(
                &app,
                Method::GET,
                &format!("/records/?{query}"),
                Some("admin"),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
            assert_eq!(body["error"], "bad_request");
        }
    }

    #[tokio::test]
    async fn test_load_reconciles_keys() {
        let store = create_memory_store();
        store.insert(&RecordDraft::new(1, "Bulbasaur")).await.unwrap();
        let app = app_with(
            store.clone(),
            vec![
                ExternalEntry::new(1, "Ivysaur"),
                ExternalEntry::new(1, "Venusaur"),
            ],
        );

        let (status, body) =
            send(&app, Method::POST, "/records/load", Some("admin"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], 2);
        assert_eq!(body["written"], 2);
        assert_eq!(body["mode"], "upsert");
        assert_eq!(
            body["reassigned"],
            json!([
                {"original": 1, "assigned": 2},
                {"original": 1, "assigned": 3}
            ])
        );
        assert!(body["message"].as_str().is_some());
        assert_eq!(store.count().await.unwrap(), 3);

        let (status, body) = send(
            &app,
            Method::POST,
            "/records/load?mode=bulk",
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "bulk");
        assert_eq!(store.count().await.unwrap(), 5);

        // Mode names are case-insensitive, as on the command line
        let (status, body) = send(
            &app,
            Method::POST,
            "/records/load?mode=BULK",
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "bulk");
        assert_eq!(store.count().await.unwrap(), 7);

        let (status, body) = send(
            &app,
            Method::POST,
            "/records/load?mode=sideways",
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    /// Feed that answers only after `delay`
    struct SlowSource {
        delay: Duration,
    }

    #[async_trait]
    impl EntrySource for SlowSource {
        fn describe(&self) -> String {
            "slow".to_string()
        }

        async fn fetch(&self) -> Result<Vec<ExternalEntry>, SourceError> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![ExternalEntry::new(1, "Bulbasaur")])
        }
    }

    #[tokio::test]
    async fn test_slow_load_times_out() {
        let store = create_memory_store();
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(500),
        });
        let state = AppState::new(store.clone(), source, &ServiceConfig::default());
        let app = router(state, Duration::from_millis(50));

        let (status, body) =
            send(&app, Method::POST, "/records/load", Some("admin"), None).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["error"], "timeout");
        assert!(body["detail"].as_str().is_some());
        assert_eq!(store.count().await.unwrap(), 0);

        // Fast routes are unaffected
        let (status, _) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sqlite_backed_router() {
        let dir = tempdir().unwrap();
        let store = create_sqlite_store(dir.path().join("records.db"), 2, Duration::from_secs(1))
            .await
            .unwrap();
        let app = app_with(store, Vec::new());

        let (status, _) = send(
            &app,
            Method::POST,
            "/records/",
            Some("admin"),
            Some(json!({"number": 999, "name": "Testmon"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Method::POST,
            "/records/",
            Some("admin"),
            Some(json!({"number": 999, "name": "Othermon"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");

        let (status, body) = send(
            &app,
            Method::GET,
            "/records/?search_column=name&keyword=TEST",
            Some("user"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(numbers(&body), vec![999]);
    }
}
