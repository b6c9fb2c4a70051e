mod common;

use reqwest::{header, multipart, Method, StatusCode};
use serde_json::{json, Value};

use common::TestApp;

fn blob_count(app: &TestApp) -> usize {
    std::fs::read_dir(app.dir.path().join("uploads"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_upload_image_success() {
    let app = TestApp::spawn().await;

    let response = app.upload_png("croissant.png").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let image: Value = response.json().await.unwrap();
    assert_eq!(image["name"], "croissant.png");
    assert_eq!(image["extension"], "png");
    assert!(image.get("path_name").is_none());
    assert_eq!(blob_count(&app), 1);

    let url = image["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("{}/uploads/", app.base_url)));

    // Both the id route and the public URL stream the bytes back.
    let by_id = app
        .client
        .get(app.url(&format!("/api/image/{}", image["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(by_id.status(), StatusCode::OK);
    assert_eq!(by_id.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(by_id.bytes().await.unwrap().as_ref(), b"\x89PNG fake image bytes");

    let by_url = app.client.get(url).send().await.unwrap();
    assert_eq!(by_url.status(), StatusCode::OK);
    assert_eq!(by_url.bytes().await.unwrap().as_ref(), b"\x89PNG fake image bytes");
}

#[tokio::test]
async fn test_upload_image_unsupported_type() {
    let app = TestApp::spawn().await;

    let form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(b"just text".to_vec())
            .file_name("notes.txt")
            .mime_str("text/plain")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url("/api/admin/image"))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.owner_token))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Bad Request");
    assert_eq!(blob_count(&app), 0);
}

#[tokio::test]
async fn test_upload_requires_a_super_user() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register("regular").await;

    let form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(b"\x89PNG".to_vec())
            .file_name("sneaky.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url("/api/admin/image"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(blob_count(&app), 0);
}

#[tokio::test]
async fn test_unknown_blob_is_not_found() {
    let app = TestApp::spawn().await;

    app.expect(Method::GET, "/api/image/42", None, None, StatusCode::NOT_FOUND)
        .await;
    app.expect(
        Method::GET,
        "/uploads/missing.png",
        None,
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn test_soft_delete_keeps_the_blob() {
    let app = TestApp::spawn().await;
    let image = app.create_image().await;

    let response = app
        .admin(Method::DELETE, &format!("/image/{image}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    app.expect(
        Method::GET,
        &format!("/api/image/{image}"),
        None,
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
    assert_eq!(blob_count(&app), 1);
}

#[tokio::test]
async fn test_force_delete_removes_blob_and_references() {
    let app = TestApp::spawn().await;
    let image = app.create_image().await;
    let category = app.create_category("Bread", None).await;
    let response = app
        .admin(
            Method::PATCH,
            &format!("/category/{category}"),
            Some(&json!({ "image_id": image })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let product = app
        .create_product("Loaf", &[category], json!({}))
        .await;
    let thumbnail = product["thumbnail"]["id"].as_i64().unwrap();
    assert_eq!(blob_count(&app), 2);

    for id in [image, thumbnail] {
        let response = app
            .admin(Method::DELETE, &format!("/image/{id}?force=true"), None)
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
    assert_eq!(blob_count(&app), 0);

    let category = app.get_category(category).await;
    assert_eq!(category["image_id"], json!(null));
    let response = app
        .admin(Method::GET, &format!("/product/{}", product["id"]), None)
        .await;
    let product: Value = response.json().await.unwrap();
    assert_eq!(product["thumbnail_id"], json!(null));
    assert_eq!(product["thumbnail"], json!(null));

    let response = app
        .admin(Method::DELETE, &format!("/image/{image}?force=true"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
