//! HTTP 服务器：前台页面、订阅源、主题静态文件和 JSON 管理接口

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::api;
use super::dto::NewComment;
use super::error::RepositoryError;
use super::feed;
use super::store::{BlogInstance, Site};
use crate::models::Blog;
use crate::repositories::{CommentsRepository, PostRepository};
use crate::security::Principal;
use crate::theme::{FrontEnd, Listing, ThemeCache, THEMES_URL};

/// 选择博客的请求头（管理接口使用），值为博客 ID
pub const BLOG_HEADER: &str = "x-blog";

/// 登录会话
#[derive(Debug, Clone)]
pub struct Session {
    pub token: Uuid,
    pub blog_id: Uuid,
    pub user_name: String,
    pub expires: DateTime<Utc>,
}

/// 内存中的会话表
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            ttl: Duration::minutes(ttl_minutes.max(1)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 创建会话
    pub fn create(&self, blog_id: Uuid, user_name: &str) -> Session {
        let session = Session {
            token: Uuid::new_v4(),
            blog_id,
            user_name: user_name.to_string(),
            expires: Utc::now() + self.ttl,
        };
        let mut sessions = self.sessions.write();
        let now = Utc::now();
        sessions.retain(|_, s| s.expires > now);
        sessions.insert(session.token, session.clone());
        session
    }

    /// 获取未过期的会话
    pub fn get(&self, token: Uuid) -> Option<Session> {
        let session = self.sessions.read().get(&token).cloned()?;
        if session.expires <= Utc::now() {
            debug!("会话已过期: {}", session.user_name);
            self.sessions.write().remove(&token);
            return None;
        }
        Some(session)
    }

    pub fn remove(&self, token: Uuid) -> bool {
        self.sessions.write().remove(&token).is_some()
    }
}

/// 所有请求共享的状态
pub struct AppState {
    pub site: Arc<Site>,
    pub themes: ThemeCache,
    pub sessions: SessionStore,
    /// 站点对外地址，用于订阅源中的绝对链接
    pub site_url: String,
    pub themes_dir: Option<PathBuf>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(site: Arc<Site>, site_url: &str, session_ttl_minutes: i64) -> Self {
        let themes_dir = site.themes_dir().map(|p| p.to_path_buf());
        Self {
            site,
            themes: ThemeCache::new(themes_dir.clone()),
            sessions: SessionStore::new(session_ttl_minutes),
            site_url: site_url.to_string(),
            themes_dir,
        }
    }

    /// 按请求头选择博客：优先使用 X-Blog，否则按主机名解析
    fn select_blog(&self, headers: &HeaderMap) -> Result<Blog, ApiError> {
        if let Some(value) = headers.get(BLOG_HEADER) {
            let id = value
                .to_str()
                .ok()
                .and_then(|v| Uuid::parse_str(v.trim()).ok())
                .ok_or_else(|| ApiError::BadRequest(format!("无效的 {} 请求头", BLOG_HEADER)))?;
            return self
                .site
                .blog(id)
                .filter(|b| b.is_active && !b.is_deleted)
                .ok_or_else(|| RepositoryError::not_found(format!("博客 {}", id)).into());
        }
        self.site
            .resolve(host(headers), "/")
            .map(|(blog, _)| blog)
            .ok_or_else(|| RepositoryError::not_found("博客").into())
    }
}

fn host(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
}

/// 接口错误
#[derive(Debug)]
pub enum ApiError {
    Repository(RepositoryError),
    /// 令牌无效或已过期
    Unauthenticated,
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        ApiError::Repository(error)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal(error)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Repository(e) => {
                let status = match e {
                    RepositoryError::Unauthorized(_) | RepositoryError::Forbidden(_) => StatusCode::FORBIDDEN,
                    RepositoryError::NotFound(_) => StatusCode::NOT_FOUND,
                    RepositoryError::Validation(_) | RepositoryError::Query(_) => StatusCode::BAD_REQUEST,
                    RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                    RepositoryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "未登录或会话已过期".to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("请求处理失败: {}", message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// 管理接口的调用上下文：所选博客和调用者身份
pub struct ApiContext {
    pub site: Arc<Site>,
    pub instance: Arc<BlogInstance>,
    pub principal: Principal,
    pub token: Option<Uuid>,
}

#[async_trait]
impl FromRequestParts<SharedState> for ApiContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let blog = state.select_blog(&parts.headers)?;
        let instance = state.site.instance(blog.id)?;

        let token = match parts.headers.get(header::AUTHORIZATION) {
            Some(value) => {
                let token = value
                    .to_str()
                    .ok()
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .and_then(|v| Uuid::parse_str(v.trim()).ok())
                    .ok_or(ApiError::Unauthenticated)?;
                Some(token)
            }
            None => None,
        };

        let principal = match token {
            Some(token) => {
                let session = state.sessions.get(token).ok_or(ApiError::Unauthenticated)?;
                if session.blog_id != blog.id {
                    return Err(ApiError::Unauthenticated);
                }
                instance.principal_for(&session.user_name)
            }
            None => Principal::Anonymous,
        };

        Ok(Self {
            site: state.site.clone(),
            instance,
            principal,
            token,
        })
    }
}

/// 构建路由
pub fn router(state: SharedState) -> Router {
    let mut app = Router::new().nest("/api", api::routes());
    if let Some(dir) = &state.themes_dir {
        app = app.nest_service(THEMES_URL, ServeDir::new(dir));
    }
    app.fallback(front)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontQuery {
    page: Option<usize>,
    category: Option<Uuid>,
}

/// 前台页面入口：先按主机名和虚拟路径解析博客，再按剩余路径分发
async fn front(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<FrontQuery>,
    body: Bytes,
) -> Response {
    let Some((blog, rest)) = state.site.resolve(host(&headers), uri.path()) else {
        return not_found();
    };
    let instance = match state.site.instance(blog.id) {
        Ok(instance) => instance,
        Err(e) => return ApiError::Internal(e).into_response(),
    };
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    if method == Method::POST {
        return match segments.as_slice() {
            ["post", slug, "comments"] => post_comment(&instance, slug, &headers, &body),
            _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        };
    }
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    match segments.as_slice() {
        ["feed", "rss"] => {
            return feed_response(feed::rss(&instance, &state.site_url, query.category), "application/rss+xml")
        }
        ["feed", "atom"] => {
            return feed_response(feed::atom(&instance, &state.site_url, query.category), "application/atom+xml")
        }
        _ => {}
    }

    let theme = instance.settings.read().theme.clone();
    let renderer = match state.themes.get(&theme) {
        Ok(renderer) => renderer,
        Err(e) => return ApiError::Internal(e).into_response(),
    };
    let principal = Principal::Anonymous;
    let front = FrontEnd::new(&state.site, &instance, &principal, &renderer);
    let page = query.page.unwrap_or(1);

    let rendered = match segments.as_slice() {
        [] => front.home(page),
        ["post", slug] => front.post(&decode_segment(slug)),
        ["page", slug] => front.page(&decode_segment(slug)),
        ["category", id] => match Uuid::parse_str(id) {
            Ok(id) => front.index(&Listing::Category(id), page),
            Err(_) => return not_found(),
        },
        ["tag", tag] => front.index(&Listing::Tag(decode_segment(tag)), page),
        ["archive", year, month] => match (year.parse(), month.parse()) {
            (Ok(year), Ok(month)) => front.index(&Listing::Archive { year, month, day: None }, page),
            _ => return not_found(),
        },
        ["archive", year, month, day] => match (year.parse(), month.parse(), day.parse()) {
            (Ok(year), Ok(month), Ok(day)) => front.index(
                &Listing::Archive {
                    year,
                    month,
                    day: Some(day),
                },
                page,
            ),
            _ => return not_found(),
        },
        _ => return not_found(),
    };

    match rendered {
        Ok(html) => Html(html).into_response(),
        Err(RepositoryError::NotFound(what)) => {
            debug!("前台未找到: {}", what);
            not_found()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html("<h1>404 Not Found</h1>")).into_response()
}

fn feed_response(result: Result<String>, content_type: &'static str) -> Response {
    match result {
        Ok(xml) => ([(header::CONTENT_TYPE, content_type)], xml).into_response(),
        Err(e) => ApiError::Internal(e).into_response(),
    }
}

/// 解码路径片段中的百分号编码，无效的 UTF-8 保持原样
fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// 前台评论表单
fn post_comment(instance: &BlogInstance, slug: &str, headers: &HeaderMap, body: &[u8]) -> Response {
    let form: HashMap<String, String> = url::form_urlencoded::parse(body).into_owned().collect();
    let field = |name: &str| form.get(name).map(|v| v.trim().to_string()).unwrap_or_default();

    let principal = Principal::Anonymous;
    let post = match PostRepository::new(instance, &principal).get_by_slug(&decode_segment(slug)) {
        Ok(post) => post,
        Err(_) => return not_found(),
    };
    let comment = NewComment {
        post_id: post.id,
        parent_id: Uuid::parse_str(&field("parent_id")).ok(),
        author: field("author"),
        email: field("email"),
        website: field("website"),
        content: field("content"),
        ip: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .unwrap_or("")
            .trim()
            .to_string(),
    };

    match CommentsRepository::new(instance, &principal).add(&comment) {
        Ok(item) => {
            let base = instance.blog().normalized_virtual_path();
            Redirect::to(&format!("{}/post/{}#id_{}", base, post.slug, item.id)).into_response()
        }
        Err(e) => {
            warn!("前台评论被拒绝: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

/// HTTP 服务器
pub struct Server {
    state: SharedState,
    port: u16,
}

impl Server {
    pub fn new(state: SharedState, port: u16) -> Self {
        Self { state, port }
    }

    /// 启动服务器
    pub async fn start(self) -> Result<()> {
        let app = router(self.state);
        let addr: SocketAddr = format!("0.0.0.0:{}", self.port).parse()?;
        info!("服务器已启动: http://localhost:{}", self.port);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_expire() {
        let store = SessionStore::new(1);
        let blog = Uuid::new_v4();
        let session = store.create(blog, "admin");
        assert_eq!(store.get(session.token).map(|s| s.user_name), Some("admin".to_string()));

        store.sessions.write().get_mut(&session.token).unwrap().expires = Utc::now() - Duration::minutes(1);
        assert!(store.get(session.token).is_none());
        assert!(!store.remove(session.token));
    }

    #[test]
    fn decodes_path_segments() {
        assert_eq!(decode_segment("rust%20lang"), "rust lang");
        assert_eq!(decode_segment("c++"), "c++");
        assert_eq!(decode_segment("plain"), "plain");
        assert_eq!(decode_segment("r&d"), "r&d");
        assert_eq!(decode_segment("r%26d"), "r&d");
        assert_eq!(decode_segment("a=b"), "a=b");
    }
}
