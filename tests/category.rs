mod common;

use chrono::Utc;
use reqwest::{Method, StatusCode};
use rust_catalog::{
    entities::category,
    error::CatalogError,
    services::category_tree::ensure_not_ancestor,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;

use common::{ids, TestApp};

#[tokio::test]
async fn test_create_and_get_category() {
    let app = TestApp::spawn().await;
    let image = app.create_image().await;

    let response = app
        .admin(
            Method::POST,
            "/category",
            Some(&json!({ "name": "Bread", "image_id": image })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: serde_json::Value = response.json().await.unwrap();

    let body = app
        .expect(
            Method::GET,
            &format!("/api/category/{}", created["id"]),
            None,
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(body["name"], "Bread");
    assert_eq!(body["thumbnail"]["id"], image);
    assert_eq!(body["subcategories"], json!([]));
}

#[tokio::test]
async fn test_create_category_rejects_empty_name() {
    let app = TestApp::spawn().await;

    let response = app
        .admin(Method::POST, "/category", Some(&json!({ "name": "" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn test_category_admin_routes_need_a_super_user() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register("regular").await;

    app.expect(
        Method::POST,
        "/api/admin/category",
        None,
        Some(&json!({ "name": "Nope" })),
        StatusCode::UNAUTHORIZED,
    )
    .await;
    app.expect(
        Method::POST,
        "/api/admin/category",
        Some(token.as_str()),
        Some(&json!({ "name": "Nope" })),
        StatusCode::FORBIDDEN,
    )
    .await;
}

#[tokio::test]
async fn test_subcategory_of_itself_is_rejected() {
    let app = TestApp::spawn().await;
    let a = app.create_category("A", None).await;

    let response = app
        .admin(Method::POST, &format!("/category/{a}/sub/{a}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_ancestor_cannot_become_subcategory() {
    let app = TestApp::spawn().await;
    let root = app.create_category("Root", None).await;
    let middle = app.create_category("Middle", Some(root)).await;
    let leaf = app.create_category("Leaf", Some(middle)).await;

    let response = app
        .admin(Method::POST, &format!("/category/{leaf}/sub/{root}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Parent pointers are unchanged.
    assert_eq!(app.get_category(root).await["parent_id"], json!(null));
    assert_eq!(app.get_category(leaf).await["parent_id"], middle);
}

#[tokio::test]
async fn test_duplicate_subcategory_is_rejected() {
    let app = TestApp::spawn().await;
    let parent = app.create_category("Parent", None).await;
    let child = app.create_category("Child", None).await;

    let response = app
        .admin(Method::POST, &format!("/category/{parent}/sub/{child}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.get_category(child).await["parent_id"], parent);

    let response = app
        .admin(Method::POST, &format!("/category/{parent}/sub/{child}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_remove_subcategory_clears_only_the_parent() {
    let app = TestApp::spawn().await;
    let parent = app.create_category("Parent", None).await;
    let child = app.create_category("Child", Some(parent)).await;
    let grandchild = app.create_category("Grandchild", Some(child)).await;
    let stranger = app.create_category("Stranger", None).await;

    let response = app
        .admin(Method::DELETE, &format!("/category/{parent}/sub/{stranger}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .admin(Method::DELETE, &format!("/category/{parent}/sub/{child}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let child_body = app.get_category(child).await;
    assert_eq!(child_body["parent_id"], json!(null));
    assert_eq!(child_body["deleted_at"], json!(null));
    assert_eq!(app.get_category(grandchild).await["parent_id"], child);
}

#[tokio::test]
async fn test_delete_root_category() {
    let app = TestApp::spawn().await;
    let lonely = app.create_category("Lonely", None).await;
    let root = app.create_category("Root", None).await;
    app.create_category("Child", Some(root)).await;

    let response = app
        .admin(Method::DELETE, &format!("/category/{lonely}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .admin(Method::DELETE, &format!("/category/{root}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.expect(
        Method::GET,
        &format!("/api/category/{lonely}"),
        None,
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
    // Still retrievable when asked for explicitly.
    assert!(app.get_category(lonely).await["deleted_at"].is_string());
}

#[tokio::test]
async fn test_delete_reparents_children() {
    let app = TestApp::spawn().await;
    let root = app.create_category("Root", None).await;
    let middle = app.create_category("Middle", Some(root)).await;
    let first = app.create_category("First", Some(middle)).await;
    let second = app.create_category("Second", Some(middle)).await;

    let response = app
        .admin(Method::DELETE, &format!("/category/{middle}?force=true"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(app.get_category(first).await["parent_id"], root);
    assert_eq!(app.get_category(second).await["parent_id"], root);
    let response = app.admin(Method::GET, &format!("/category/{middle}?deleted=true"), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let root_body = app.get_category(root).await;
    assert_eq!(ids(&root_body["subcategories"]), vec![first, second]);
}

#[tokio::test]
async fn test_delete_category_with_products_is_rejected() {
    let app = TestApp::spawn().await;
    let category = app.create_category("Pastry", None).await;
    app.create_product("Croissant", &[category], json!({})).await;

    let response = app
        .admin(Method::DELETE, &format!("/category/{category}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_categories_is_paginated() {
    let app = TestApp::spawn().await;
    for n in 0..12 {
        app.create_category(&format!("Category {n}"), None).await;
    }

    let body = app
        .expect(
            Method::GET,
            "/api/category?page=1&size=50",
            None,
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(body["items"].as_array().unwrap().len(), 10);
    assert_eq!(body["has_next_page"], true);
    assert_eq!(body["total"], 12);

    let body = app
        .expect(
            Method::GET,
            "/api/category?page=2&size=10",
            None,
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["has_next_page"], false);

    app.expect(
        Method::GET,
        "/api/category?page=0",
        None,
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn test_update_category_rejects_cycle() {
    let app = TestApp::spawn().await;
    let root = app.create_category("Root", None).await;
    let child = app.create_category("Child", Some(root)).await;

    let response = app
        .admin(
            Method::PATCH,
            &format!("/category/{root}"),
            Some(&json!({ "parent_id": child })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .admin(
            Method::PATCH,
            &format!("/category/{child}"),
            Some(&json!({ "name": "Renamed" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.get_category(child).await["name"], "Renamed");
}

#[tokio::test]
async fn test_ancestor_walk_stops_on_stored_cycle() {
    let app = TestApp::spawn().await;
    let now = Utc::now();
    let insert = |name: &str| category::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let a = insert("A").insert(&*app.db).await.unwrap();
    let b = insert("B").insert(&*app.db).await.unwrap();
    let outsider = insert("Outsider").insert(&*app.db).await.unwrap();

    // Persist a -> b -> a directly, bypassing the guard.
    let mut a_active: category::ActiveModel = a.into();
    a_active.parent_id = Set(Some(b.id));
    let a = a_active.update(&*app.db).await.unwrap();
    let mut b_active: category::ActiveModel = b.into();
    b_active.parent_id = Set(Some(a.id));
    b_active.update(&*app.db).await.unwrap();

    ensure_not_ancestor(&*app.db, &a, outsider.id)
        .await
        .expect("Walk should terminate and accept an unrelated category");

    let err = ensure_not_ancestor(&*app.db, &a, a.parent_id.unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Conflict(_)));
}
