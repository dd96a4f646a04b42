//! End-to-end client behavior against a mock API server.

use anyhow::Result;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skywatch::{Alerts, Cameras, Collections, Error, Params, Session, TokenStore};

async fn mock_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
        .mount(server)
        .await;
}

fn session_for(server: &MockServer, store_dir: &std::path::Path) -> Session {
    Session::builder()
        .client_id("it-client")
        .client_secret("it-secret")
        .api_url(server.uri())
        .token_store(TokenStore::new(store_dir, "it-client"))
        .max_concurrency(4)
        .build()
        .expect("session")
}

fn feature_page(ids: &[&str], total: u64) -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": ids.iter().map(|id| json!({
            "id": id,
            "properties": {"severity": "Moderate"}
        })).collect::<Vec<_>>(),
        "properties": {"total": total},
    })
}

#[tokio::test]
async fn index_fans_out_across_pages_and_merges_in_order() -> Result<()> {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir()?;
    mock_token_endpoint(&server).await;

    // 250 results at limit 100: pages at skip 0, 100, 200.
    Mock::given(method("GET"))
        .and(path("/alerts"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feature_page(&["a0", "a1"], 250)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alerts"))
        .and(query_param("skip", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feature_page(&["a2"], 250)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alerts"))
        .and(query_param("skip", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feature_page(&["a3"], 250)))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server, dir.path());
    let alerts = Alerts::new(&session);
    let (collection, failures) = alerts
        .index(Params::new().set("state", "Maryland"))
        .await?;

    assert!(failures.is_empty());
    assert_eq!(collection.total, 250);
    assert!(!collection.truncated);
    let ids: Vec<_> = collection.features.iter().filter_map(|f| f.id.as_deref()).collect();
    // Pages merge in skip order regardless of completion order.
    assert_eq!(ids, vec!["a0", "a1", "a2", "a3"]);
    Ok(())
}

#[tokio::test]
async fn index_reports_failed_pages_without_aborting() -> Result<()> {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir()?;
    mock_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/alerts"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feature_page(&["a0"], 300)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alerts"))
        .and(query_param("skip", "100"))
        .respond_with(ResponseTemplate::new(500).set_body_string("worker crashed"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alerts"))
        .and(query_param("skip", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feature_page(&["a2"], 300)))
        .mount(&server)
        .await;

    let session = session_for(&server, dir.path());
    let (collection, failures) = Alerts::new(&session).index(Params::new()).await?;

    let ids: Vec<_> = collection.features.iter().filter_map(|f| f.id.as_deref()).collect();
    assert_eq!(ids, vec!["a0", "a2"]);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, 100);
    assert!(failures[0].error.is_transient());
    Ok(())
}

#[tokio::test]
async fn show_isolates_per_id_failures() -> Result<()> {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir()?;
    mock_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/cameras/cam-ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cam-ok",
            "properties": {"city": "Denver"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cameras/cam-gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("unknown camera"))
        .mount(&server)
        .await;

    let session = session_for(&server, dir.path());
    let outcome = Cameras::new(&session).show(&["cam-ok", "cam-gone"]).await;

    assert_eq!(outcome.successes.len(), 1);
    assert_eq!(outcome.successes[0].0, "cam-ok");
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].id, "cam-gone");
    assert!(matches!(outcome.failures[0].error, Error::Http { status: 404, .. }));
    assert_eq!(outcome.len(), 2);
    Ok(())
}

#[tokio::test]
async fn camera_image_download_writes_files_and_reports_failures() -> Result<()> {
    let server = MockServer::start().await;
    let store_dir = tempfile::tempdir()?;
    let out_dir = tempfile::tempdir()?;
    mock_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/cameras/cam-1/images/2024-02-01T00:00:00Z"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes-1".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cameras/cam-1/images/2024-02-01T01:00:00Z"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let session = session_for(&server, store_dir.path());
    let times = vec![
        "2024-02-01T00:00:00Z".to_string(),
        "2024-02-01T01:00:00Z".to_string(),
    ];
    let outcome = Cameras::new(&session)
        .show_image("cam-1", &times, Some(out_dir.path()), true)
        .await?;

    assert_eq!(outcome.successes.len(), 1);
    let (time, record) = &outcome.successes[0];
    assert_eq!(time, "2024-02-01T00:00:00Z");
    assert_eq!(record.bytes.as_deref(), Some(&b"jpeg-bytes-1"[..]));
    let written = record.path.as_ref().expect("written path");
    assert_eq!(std::fs::read(written)?, b"jpeg-bytes-1");

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].id, "2024-02-01T01:00:00Z");
    Ok(())
}

#[tokio::test]
async fn camera_image_times_follow_cursor_and_trim_past_end() -> Result<()> {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir()?;
    mock_token_endpoint(&server).await;

    // First page ends before the end bound; its last time becomes the next
    // cursor. Second page crosses the bound and is trimmed.
    Mock::given(method("GET"))
        .and(path("/cameras/cam-1/images"))
        .and(query_param("time", "2024-02-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "times": ["2024-02-01T00:00:00Z", "2024-02-01T06:00:00Z"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cameras/cam-1/images"))
        .and(query_param("time", "2024-02-01T06:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "times": ["2024-02-01T06:00:00Z", "2024-02-01T12:00:00Z", "2024-02-02T12:00:00Z"]
        })))
        .mount(&server)
        .await;

    let session = session_for(&server, dir.path());
    let times = Cameras::new(&session)
        .images("cam-1", "2024-02-01", Some("2024-02-02"))
        .await?;

    assert_eq!(
        times,
        vec![
            "2024-02-01T00:00:00Z",
            "2024-02-01T06:00:00Z",
            "2024-02-01T12:00:00Z",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn collection_create_update_and_image_walk() -> Result<()> {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir()?;
    mock_token_endpoint(&server).await;

    Mock::given(method("POST"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collection_id": "col-9"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/collections/col-9"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    // Image walk: the camera prefix seeds the marker; the page holding a
    // foreign image ends the walk.
    Mock::given(method("GET"))
        .and(path("/collections/col-9"))
        .and(query_param("marker", "cam-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "storms",
            "images": ["cam-1_0001.jpg", "cam-1_0002.jpg", "cam-2_0001.jpg"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server, dir.path());
    let collections = Collections::new(&session);

    let id = collections.create("storms", "february fronts", &["storm"]).await?;
    assert_eq!(id, "col-9");

    collections
        .update("col-9", None, Some("updated description"), None)
        .await?;

    let err = collections.update("col-9", None, None, None).await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let images = collections.images("col-9", Some("cam-1")).await?;
    assert_eq!(images, vec!["cam-1_0001.jpg", "cam-1_0002.jpg"]);
    Ok(())
}

#[tokio::test]
async fn collection_copy_and_image_removal() -> Result<()> {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir()?;
    mock_token_endpoint(&server).await;

    // Source collection details, read once for the description and once for
    // the image walk.
    Mock::given(method("GET"))
        .and(path("/collections/col-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "originals",
            "description": "route 7 cameras",
            "images": ["ab12-cam-7_0001.jpg", "ab12-cam-7_0002.jpg"]
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collection_id": "col-b"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/col-b/images"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/collections/col-a/images/ab12-cam-7_0001.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/collections/col-a/images/ab12-cam-7_0002.jpg"))
        .respond_with(ResponseTemplate::new(404).set_body_string("already gone"))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server, dir.path());
    let collections = Collections::new(&session);

    let (new_id, outcome) = collections.copy("col-a", "copies").await?;
    assert_eq!(new_id, "col-b");
    assert!(outcome.all_succeeded());
    assert_eq!(outcome.len(), 2);

    let removed = collections
        .remove_image(
            "col-a",
            &[
                "ab12-cam-7_0001.jpg".to_string(),
                "ab12-cam-7_0002.jpg".to_string(),
            ],
        )
        .await;
    assert_eq!(removed.successes.len(), 1);
    assert_eq!(removed.failures.len(), 1);
    assert_eq!(removed.failures[0].id, "ab12-cam-7_0002.jpg");
    assert!(matches!(removed.failures[0].error, Error::Http { status: 404, .. }));
    Ok(())
}
