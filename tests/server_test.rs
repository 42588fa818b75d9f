// HTTP 接口测试：通过 oneshot 直接驱动路由

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use rust_blogengine::core::dto::NewUser;
use rust_blogengine::core::server::{router, AppState};
use rust_blogengine::core::{Site, SiteOptions};
use rust_blogengine::extensions::ExtensionManager;
use rust_blogengine::provider::XmlBlogProvider;
use rust_blogengine::repositories::UsersRepository;
use rust_blogengine::security::{Principal, ADMINISTRATORS};

fn test_app(dir: &TempDir) -> (Router, Arc<Site>) {
    let provider = Arc::new(XmlBlogProvider::new(dir.path()));
    let site = Arc::new(
        Site::open(
            provider,
            Arc::new(ExtensionManager::with_builtins()),
            SiteOptions {
                title: "Server Blog".to_string(),
                themes_dir: None,
            },
        )
        .unwrap(),
    );
    let instance = site.primary_instance().unwrap();
    UsersRepository::new(&instance, &Principal::System)
        .add(&NewUser {
            user_name: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password: "secret1".to_string(),
            roles: vec![ADMINISTRATORS.to_string()],
        })
        .unwrap();

    let state = Arc::new(AppState::new(site.clone(), "http://blog.test", 60));
    (router(state), site)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        json_request("POST", "/api/login", None, json!({ "userName": "admin", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    value["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_login_and_create_post() {
    let dir = TempDir::new().unwrap();
    let (app, _site) = test_app(&dir);

    // 未登录不能发文
    let post = json!({ "title": "From the API", "content": "Hello *there*", "isPublished": true });
    let (status, body) = send(&app, json_request("POST", "/api/posts", None, post.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("error"));

    let token = login(&app).await;
    let (status, body) = send(&app, json_request("POST", "/api/posts", Some(&token), post)).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(created["slug"], "from-the-api");
    assert_eq!(created["author"], "admin");

    let (status, body) = send(&app, get("/api/posts?filter=IsPublished%20%3D%3D%20true")).await;
    assert_eq!(status, StatusCode::OK);
    let list: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, body) = send(&app, json_request("GET", "/api/me", Some(&token), Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    let me: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(me["userName"], "admin");
    assert!(me["rights"].as_array().unwrap().iter().any(|r| r == "ManageBlogs"));
}

#[tokio::test]
async fn test_bad_credentials_and_tokens() {
    let dir = TempDir::new().unwrap();
    let (app, _site) = test_app(&dir);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/login", None, json!({ "userName": "admin", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let bogus = uuid::Uuid::new_v4().to_string();
    let (status, _) = send(&app, json_request("GET", "/api/dashboard", Some(&bogus), Value::Null)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 退出后令牌失效
    let token = login(&app).await;
    let (status, _) = send(&app, json_request("GET", "/api/dashboard", Some(&token), Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, json_request("POST", "/api/logout", Some(&token), Value::Null)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, json_request("GET", "/api/dashboard", Some(&token), Value::Null)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let dir = TempDir::new().unwrap();
    let (app, _site) = test_app(&dir);
    let token = login(&app).await;

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(
        &app,
        json_request("GET", &format!("/api/posts/{}", missing), Some(&token), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, json_request("GET", "/api/posts?filter=Title%20%3D%3D", Some(&token), Value::Null)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let user = json!({ "userName": "admin", "email": "a@example.com", "password": "secret1" });
    let (status, _) = send(&app, json_request("POST", "/api/users", Some(&token), user)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, json_request("POST", "/api/trash/widget/00000000-0000-0000-0000-000000000000/restore", Some(&token), Value::Null)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_front_end_pages_and_feeds() {
    let dir = TempDir::new().unwrap();
    let (app, _site) = test_app(&dir);
    let token = login(&app).await;

    let post = json!({ "title": "Rendered Post", "content": "Body text", "isPublished": true, "tags": ["rust"] });
    let (status, _) = send(&app, json_request("POST", "/api/posts", Some(&token), post)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Server Blog"));
    assert!(body.contains("Rendered Post"));

    let (status, body) = send(&app, get("/post/rendered-post")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<p>Body text</p>"));

    let (status, body) = send(&app, get("/tag/rust")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Rendered Post"));

    let (status, _) = send(&app, get("/post/no-such-post")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(get("/feed/rss")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/rss+xml"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let rss = String::from_utf8_lossy(&bytes);
    assert!(rss.contains("http://blog.test/post/rendered-post"));

    let (status, body) = send(&app, get("/feed/atom")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<feed"));
}

#[tokio::test]
async fn test_comment_form_posts_comment() {
    let dir = TempDir::new().unwrap();
    let (app, site) = test_app(&dir);
    let token = login(&app).await;

    let post = json!({ "title": "Open Thread", "content": "Talk", "isPublished": true });
    send(&app, json_request("POST", "/api/posts", Some(&token), post)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/post/open-thread/comments")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("author=Visitor&email=&website=&content=Great+read"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("/post/open-thread#id_"));

    let instance = site.primary_instance().unwrap();
    let posts = instance.posts.read();
    let comments = &posts.iter().find(|p| p.slug == "open-thread").unwrap().comments;
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].content, "Great read");

    let (_, body) = send(&app, get("/post/open-thread")).await;
    assert!(body.contains("Great read"));
}

#[tokio::test]
async fn test_blog_header_selects_blog() {
    let dir = TempDir::new().unwrap();
    let (app, _site) = test_app(&dir);
    let token = login(&app).await;

    let blog = json!({ "name": "Second", "virtualPath": "/second" });
    let (status, body) = send(&app, json_request("POST", "/api/blogs", Some(&token), blog)).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: Value = serde_json::from_str(&body).unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // 主博客的令牌不能用于其他博客
    let request = Request::builder()
        .uri("/api/dashboard")
        .header("x-blog", &id)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/posts")
        .header("x-blog", uuid::Uuid::new_v4().to_string())
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/second/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Second"));
}

#[tokio::test]
async fn test_tag_segment_keeps_ampersand() {
    let dir = TempDir::new().unwrap();
    let (app, _site) = test_app(&dir);
    let token = login(&app).await;

    let post = json!({ "title": "Research notes", "content": "Lab work", "isPublished": true, "tags": ["r&d"] });
    send(&app, json_request("POST", "/api/posts", Some(&token), post)).await;
    let post = json!({ "title": "Unrelated", "content": "Bench only", "isPublished": true, "tags": ["r"] });
    send(&app, json_request("POST", "/api/posts", Some(&token), post)).await;

    for uri in ["/tag/r&d", "/tag/r%26d"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Tag: r&amp;d"));
        assert!(body.contains("Lab work"));
        assert!(!body.contains("Bench only"));
    }
}
