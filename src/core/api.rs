//! JSON 管理接口
//!
//! 每个请求通过 [`ApiContext`] 选择博客并确定调用者身份，权限检查在仓储层完成。

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::dto::*;
use super::query::ListQuery;
use super::server::{ApiContext, ApiError, ApiResult, SharedState};
use crate::models::{BlogSettings, CustomField, ExtensionSettings, WidgetEntry, WidgetKind, WidgetZone};
use crate::repositories::*;
use crate::security::{Principal, Right};

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/posts", get(list_posts).post(add_post))
        .route("/posts/count", get(count_posts))
        .route("/posts/:id", get(get_post).put(update_post).delete(remove_post))
        .route("/posts/:id/publish", put(publish_post))
        .route("/pages", get(list_pages).post(add_page))
        .route("/pages/:id", get(get_page).put(update_page).delete(remove_page))
        .route("/comments", get(list_comments).post(add_comment))
        .route("/comments/spam", delete(purge_spam))
        .route("/comments/:id", get(get_comment).put(update_comment).delete(remove_comment))
        .route("/categories", get(list_categories).post(add_category))
        .route(
            "/categories/:id",
            get(get_category).put(update_category).delete(remove_category),
        )
        .route("/tags", get(list_tags))
        .route("/tags/:tag", put(rename_tag).delete(remove_tag))
        .route("/users", get(list_users).post(add_user))
        .route("/users/:name", get(get_user).put(update_user).delete(remove_user))
        .route("/users/:name/password", put(change_password))
        .route("/roles", get(list_roles).post(add_role))
        .route("/roles/:name", get(get_role).delete(remove_role))
        .route("/roles/:name/rights", get(get_rights).put(set_rights))
        .route("/blogs", get(list_blogs).post(add_blog))
        .route("/blogs/:id", get(get_blog).put(update_blog).delete(remove_blog))
        .route(
            "/customfields",
            get(list_custom_fields)
                .post(add_custom_field)
                .put(update_custom_field)
                .delete(remove_custom_field),
        )
        .route("/trash", get(list_trash).delete(purge_trash))
        .route("/trash/:kind/:id", delete(purge_trash_item))
        .route("/trash/:kind/:id/restore", post(restore_trash_item))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/dashboard", get(dashboard))
        .route("/widgets", get(widget_zones))
        .route("/widgets/available", get(available_widgets))
        .route("/widgets/:zone", post(add_widget))
        .route("/widgets/:zone/:id", put(update_widget).delete(remove_widget))
        .route("/widgets/:zone/:id/move", put(move_widget))
        .route("/blogroll", get(list_blogroll).post(add_blogroll))
        .route("/blogroll/:id", put(update_blogroll).delete(remove_blogroll))
        .route("/extensions", get(list_extensions))
        .route("/extensions/:name", put(update_extension))
        .route(
            "/extensions/:name/settings/:settings",
            get(get_extension_settings).put(save_extension_settings),
        )
        .route("/packages", get(list_packages))
        .route("/packages/:id", delete(uninstall_package))
        .route("/packages/:id/install", post(install_package))
}

fn parse_kind(kind: &str) -> ApiResult<TrashKind> {
    kind.parse().map_err(ApiError::BadRequest)
}

// ---- 会话 ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    user_name: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: Uuid,
    user_name: String,
    expires: DateTime<Utc>,
}

async fn login(
    State(state): State<SharedState>,
    ctx: ApiContext,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let anonymous = Principal::Anonymous;
    let users = UsersRepository::new(&ctx.instance, &anonymous);
    if !users.validate_user(&request.user_name, &request.password)? {
        return Err(ApiError::Unauthenticated);
    }
    // 使用存储中的用户名大小写
    let user_name = ctx
        .instance
        .users
        .read()
        .iter()
        .find(|u| u.user_name.eq_ignore_ascii_case(&request.user_name))
        .map(|u| u.user_name.clone())
        .unwrap_or(request.user_name);

    let session = state.sessions.create(ctx.instance.id(), &user_name);
    info!("用户 {} 登录博客 {}", user_name, ctx.instance.blog().name);
    Ok(Json(LoginResponse {
        token: session.token,
        user_name: session.user_name,
        expires: session.expires,
    }))
}

async fn logout(State(state): State<SharedState>, ctx: ApiContext) -> StatusCode {
    if let Some(token) = ctx.token {
        state.sessions.remove(token);
    }
    StatusCode::NO_CONTENT
}

async fn me(ctx: ApiContext) -> Json<Value> {
    let rights: Vec<&str> = Right::ALL
        .iter()
        .filter(|r| ctx.instance.can(&ctx.principal, **r))
        .map(|r| r.name())
        .collect();
    Json(json!({
        "userName": ctx.principal.name(),
        "authenticated": ctx.principal.is_authenticated(),
        "roles": ctx.principal.roles(),
        "rights": rights,
        "blog": BlogItem::from(&ctx.instance.blog()),
    }))
}

// ---- 文章 ----

async fn list_posts(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<PostItem>>> {
    Ok(Json(PostRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CountQuery {
    filter: String,
}

async fn count_posts(ctx: ApiContext, Query(query): Query<CountQuery>) -> ApiResult<Json<Value>> {
    let count = PostRepository::new(&ctx.instance, &ctx.principal).count(&query.filter)?;
    Ok(Json(json!({ "count": count })))
}

async fn get_post(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<Json<PostDetail>> {
    Ok(Json(PostRepository::new(&ctx.instance, &ctx.principal).find_by_id(id)?))
}

async fn add_post(ctx: ApiContext, Json(detail): Json<PostDetail>) -> ApiResult<(StatusCode, Json<PostDetail>)> {
    let created = PostRepository::new(&ctx.instance, &ctx.principal).add(&detail)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_post(
    ctx: ApiContext,
    Path(id): Path<Uuid>,
    Json(mut detail): Json<PostDetail>,
) -> ApiResult<Json<PostDetail>> {
    detail.id = Some(id);
    Ok(Json(PostRepository::new(&ctx.instance, &ctx.principal).update(&detail)?))
}

#[derive(Debug, Deserialize)]
struct PublishRequest {
    published: bool,
}

async fn publish_post(
    ctx: ApiContext,
    Path(id): Path<Uuid>,
    Json(request): Json<PublishRequest>,
) -> ApiResult<StatusCode> {
    PostRepository::new(&ctx.instance, &ctx.principal).set_published(id, request.published)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_post(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    PostRepository::new(&ctx.instance, &ctx.principal).remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 页面 ----

async fn list_pages(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<PageItem>>> {
    Ok(Json(PageRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

async fn get_page(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<Json<PageDetail>> {
    Ok(Json(PageRepository::new(&ctx.instance, &ctx.principal).find_by_id(id)?))
}

async fn add_page(ctx: ApiContext, Json(detail): Json<PageDetail>) -> ApiResult<(StatusCode, Json<PageDetail>)> {
    let created = PageRepository::new(&ctx.instance, &ctx.principal).add(&detail)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_page(
    ctx: ApiContext,
    Path(id): Path<Uuid>,
    Json(mut detail): Json<PageDetail>,
) -> ApiResult<Json<PageDetail>> {
    detail.id = Some(id);
    Ok(Json(PageRepository::new(&ctx.instance, &ctx.principal).update(&detail)?))
}

async fn remove_page(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    PageRepository::new(&ctx.instance, &ctx.principal).remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 评论 ----

async fn list_comments(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<CommentItem>>> {
    Ok(Json(CommentsRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

async fn get_comment(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<Json<CommentItem>> {
    Ok(Json(CommentsRepository::new(&ctx.instance, &ctx.principal).find_by_id(id)?))
}

async fn add_comment(
    ctx: ApiContext,
    Json(comment): Json<NewComment>,
) -> ApiResult<(StatusCode, Json<CommentItem>)> {
    let created = CommentsRepository::new(&ctx.instance, &ctx.principal).add(&comment)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_comment(
    ctx: ApiContext,
    Path(id): Path<Uuid>,
    Json(action): Json<CommentAction>,
) -> ApiResult<Json<CommentItem>> {
    Ok(Json(CommentsRepository::new(&ctx.instance, &ctx.principal).update(id, &action)?))
}

async fn remove_comment(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    CommentsRepository::new(&ctx.instance, &ctx.principal).remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn purge_spam(ctx: ApiContext) -> ApiResult<Json<Value>> {
    let removed = CommentsRepository::new(&ctx.instance, &ctx.principal).purge_spam()?;
    Ok(Json(json!({ "removed": removed })))
}

// ---- 分类和标签 ----

async fn list_categories(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<CategoryItem>>> {
    Ok(Json(CategoryRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

async fn get_category(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<Json<CategoryItem>> {
    Ok(Json(CategoryRepository::new(&ctx.instance, &ctx.principal).find_by_id(id)?))
}

async fn add_category(
    ctx: ApiContext,
    Json(item): Json<CategoryItem>,
) -> ApiResult<(StatusCode, Json<CategoryItem>)> {
    let created = CategoryRepository::new(&ctx.instance, &ctx.principal).add(&item)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_category(
    ctx: ApiContext,
    Path(id): Path<Uuid>,
    Json(mut item): Json<CategoryItem>,
) -> ApiResult<Json<CategoryItem>> {
    item.id = Some(id);
    Ok(Json(CategoryRepository::new(&ctx.instance, &ctx.principal).update(&item)?))
}

async fn remove_category(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    CategoryRepository::new(&ctx.instance, &ctx.principal).remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tags(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<TagItem>>> {
    Ok(Json(TagRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

#[derive(Debug, Deserialize)]
struct RenameTag {
    name: String,
}

async fn rename_tag(
    ctx: ApiContext,
    Path(tag): Path<String>,
    Json(request): Json<RenameTag>,
) -> ApiResult<Json<Value>> {
    let updated = TagRepository::new(&ctx.instance, &ctx.principal).update(&tag, &request.name)?;
    Ok(Json(json!({ "updated": updated })))
}

async fn remove_tag(ctx: ApiContext, Path(tag): Path<String>) -> ApiResult<Json<Value>> {
    let updated = TagRepository::new(&ctx.instance, &ctx.principal).remove(&tag)?;
    Ok(Json(json!({ "updated": updated })))
}

// ---- 用户和角色 ----

async fn list_users(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<UserItem>>> {
    Ok(Json(UsersRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

async fn get_user(ctx: ApiContext, Path(name): Path<String>) -> ApiResult<Json<UserItem>> {
    Ok(Json(UsersRepository::new(&ctx.instance, &ctx.principal).find_by_id(&name)?))
}

async fn add_user(ctx: ApiContext, Json(user): Json<NewUser>) -> ApiResult<(StatusCode, Json<UserItem>)> {
    let created = UsersRepository::new(&ctx.instance, &ctx.principal).add(&user)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_user(
    ctx: ApiContext,
    Path(name): Path<String>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<Json<UserItem>> {
    Ok(Json(UsersRepository::new(&ctx.instance, &ctx.principal).update(&name, &update)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange {
    #[serde(default)]
    old_password: Option<String>,
    new_password: String,
}

async fn change_password(
    ctx: ApiContext,
    Path(name): Path<String>,
    Json(change): Json<PasswordChange>,
) -> ApiResult<StatusCode> {
    UsersRepository::new(&ctx.instance, &ctx.principal).change_password(
        &name,
        change.old_password.as_deref(),
        &change.new_password,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_user(ctx: ApiContext, Path(name): Path<String>) -> ApiResult<StatusCode> {
    UsersRepository::new(&ctx.instance, &ctx.principal).remove(&name)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_roles(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<RoleItem>>> {
    Ok(Json(RolesRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

async fn get_role(ctx: ApiContext, Path(name): Path<String>) -> ApiResult<Json<RoleItem>> {
    Ok(Json(RolesRepository::new(&ctx.instance, &ctx.principal).find_by_id(&name)?))
}

#[derive(Debug, Deserialize)]
struct NewRole {
    name: String,
}

async fn add_role(ctx: ApiContext, Json(role): Json<NewRole>) -> ApiResult<(StatusCode, Json<RoleItem>)> {
    let created = RolesRepository::new(&ctx.instance, &ctx.principal).add(&role.name)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn remove_role(ctx: ApiContext, Path(name): Path<String>) -> ApiResult<StatusCode> {
    RolesRepository::new(&ctx.instance, &ctx.principal).remove(&name)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_rights(ctx: ApiContext, Path(name): Path<String>) -> ApiResult<Json<BTreeSet<Right>>> {
    Ok(Json(RolesRepository::new(&ctx.instance, &ctx.principal).get_rights(&name)?))
}

async fn set_rights(
    ctx: ApiContext,
    Path(name): Path<String>,
    Json(rights): Json<BTreeSet<Right>>,
) -> ApiResult<StatusCode> {
    RolesRepository::new(&ctx.instance, &ctx.principal).set_rights(&name, &rights)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 博客 ----

async fn list_blogs(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<BlogItem>>> {
    Ok(Json(BlogRepository::new(&ctx.site, &ctx.instance, &ctx.principal).find(&query)?))
}

async fn get_blog(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<Json<BlogItem>> {
    Ok(Json(BlogRepository::new(&ctx.site, &ctx.instance, &ctx.principal).find_by_id(id)?))
}

async fn add_blog(ctx: ApiContext, Json(detail): Json<BlogDetail>) -> ApiResult<(StatusCode, Json<BlogItem>)> {
    let created = BlogRepository::new(&ctx.site, &ctx.instance, &ctx.principal).add(&detail)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_blog(
    ctx: ApiContext,
    Path(id): Path<Uuid>,
    Json(mut detail): Json<BlogDetail>,
) -> ApiResult<Json<BlogItem>> {
    detail.id = Some(id);
    Ok(Json(BlogRepository::new(&ctx.site, &ctx.instance, &ctx.principal).update(&detail)?))
}

async fn remove_blog(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    BlogRepository::new(&ctx.site, &ctx.instance, &ctx.principal).remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 自定义字段 ----

async fn list_custom_fields(
    ctx: ApiContext,
    Query(query): Query<CountQuery>,
) -> ApiResult<Json<Vec<CustomField>>> {
    Ok(Json(CustomFieldRepository::new(&ctx.instance, &ctx.principal).find(&query.filter)?))
}

async fn add_custom_field(
    ctx: ApiContext,
    Json(field): Json<CustomField>,
) -> ApiResult<(StatusCode, Json<CustomField>)> {
    let created = CustomFieldRepository::new(&ctx.instance, &ctx.principal).add(&field)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_custom_field(ctx: ApiContext, Json(field): Json<CustomField>) -> ApiResult<Json<CustomField>> {
    Ok(Json(CustomFieldRepository::new(&ctx.instance, &ctx.principal).update(&field)?))
}

async fn remove_custom_field(ctx: ApiContext, Json(field): Json<CustomField>) -> ApiResult<StatusCode> {
    CustomFieldRepository::new(&ctx.instance, &ctx.principal).remove(&field)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 回收站 ----

async fn list_trash(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<TrashItem>>> {
    Ok(Json(TrashRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

async fn restore_trash_item(ctx: ApiContext, Path((kind, id)): Path<(String, Uuid)>) -> ApiResult<StatusCode> {
    TrashRepository::new(&ctx.instance, &ctx.principal).restore(parse_kind(&kind)?, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn purge_trash_item(ctx: ApiContext, Path((kind, id)): Path<(String, Uuid)>) -> ApiResult<StatusCode> {
    TrashRepository::new(&ctx.instance, &ctx.principal).purge(parse_kind(&kind)?, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn purge_trash(ctx: ApiContext) -> ApiResult<Json<Value>> {
    let removed = TrashRepository::new(&ctx.instance, &ctx.principal).purge_all()?;
    Ok(Json(json!({ "removed": removed })))
}

// ---- 设置和仪表盘 ----

async fn get_settings(ctx: ApiContext) -> ApiResult<Json<BlogSettings>> {
    Ok(Json(SettingsRepository::new(&ctx.instance, &ctx.principal).get()?))
}

async fn update_settings(
    State(state): State<SharedState>,
    ctx: ApiContext,
    Json(settings): Json<BlogSettings>,
) -> ApiResult<Json<BlogSettings>> {
    let saved = SettingsRepository::new(&ctx.instance, &ctx.principal).update(&settings)?;
    // 切换主题时重新加载模板
    state.themes.clear();
    Ok(Json(saved))
}

async fn dashboard(ctx: ApiContext) -> ApiResult<Json<DashboardItem>> {
    Ok(Json(DashboardRepository::new(&ctx.instance, &ctx.principal).get()?))
}

// ---- 小部件 ----

async fn widget_zones(ctx: ApiContext) -> ApiResult<Json<Vec<WidgetZone>>> {
    Ok(Json(WidgetsRepository::new(&ctx.instance, &ctx.principal).zones()?))
}

async fn available_widgets(ctx: ApiContext) -> ApiResult<Json<Vec<WidgetKindItem>>> {
    Ok(Json(WidgetsRepository::new(&ctx.instance, &ctx.principal).available()?))
}

#[derive(Debug, Deserialize)]
struct NewWidget {
    kind: WidgetKind,
    #[serde(default)]
    title: String,
}

async fn add_widget(
    ctx: ApiContext,
    Path(zone): Path<String>,
    Json(widget): Json<NewWidget>,
) -> ApiResult<(StatusCode, Json<WidgetEntry>)> {
    let created = WidgetsRepository::new(&ctx.instance, &ctx.principal).add(&zone, widget.kind, &widget.title)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_widget(
    ctx: ApiContext,
    Path((zone, id)): Path<(String, Uuid)>,
    Json(mut widget): Json<WidgetEntry>,
) -> ApiResult<Json<WidgetEntry>> {
    widget.id = id;
    Ok(Json(WidgetsRepository::new(&ctx.instance, &ctx.principal).update(&zone, &widget)?))
}

async fn remove_widget(ctx: ApiContext, Path((zone, id)): Path<(String, Uuid)>) -> ApiResult<StatusCode> {
    WidgetsRepository::new(&ctx.instance, &ctx.principal).remove(&zone, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct MoveWidget {
    index: usize,
}

async fn move_widget(
    ctx: ApiContext,
    Path((zone, id)): Path<(String, Uuid)>,
    Json(request): Json<MoveWidget>,
) -> ApiResult<StatusCode> {
    WidgetsRepository::new(&ctx.instance, &ctx.principal).move_widget(&zone, id, request.index)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 友情链接 ----

async fn list_blogroll(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<BlogRollDetail>>> {
    Ok(Json(BlogRollRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

async fn add_blogroll(
    ctx: ApiContext,
    Json(detail): Json<BlogRollDetail>,
) -> ApiResult<(StatusCode, Json<BlogRollDetail>)> {
    let created = BlogRollRepository::new(&ctx.instance, &ctx.principal).add(&detail)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_blogroll(
    ctx: ApiContext,
    Path(id): Path<Uuid>,
    Json(mut detail): Json<BlogRollDetail>,
) -> ApiResult<Json<BlogRollDetail>> {
    detail.id = Some(id);
    Ok(Json(BlogRollRepository::new(&ctx.instance, &ctx.principal).update(&detail)?))
}

async fn remove_blogroll(ctx: ApiContext, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    BlogRollRepository::new(&ctx.instance, &ctx.principal).remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 扩展和扩展包 ----

async fn list_extensions(ctx: ApiContext) -> ApiResult<Json<Vec<ExtensionItem>>> {
    Ok(Json(ExtensionRepository::new(&ctx.instance, &ctx.principal).list()?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtensionUpdate {
    enabled: Option<bool>,
    priority: Option<i32>,
}

async fn update_extension(
    ctx: ApiContext,
    Path(name): Path<String>,
    Json(update): Json<ExtensionUpdate>,
) -> ApiResult<Json<ExtensionItem>> {
    let repository = ExtensionRepository::new(&ctx.instance, &ctx.principal);
    let mut item = None;
    if let Some(enabled) = update.enabled {
        item = Some(repository.set_enabled(&name, enabled)?);
    }
    if let Some(priority) = update.priority {
        item = Some(repository.set_priority(&name, priority)?);
    }
    match item {
        Some(item) => Ok(Json(item)),
        None => Err(ApiError::BadRequest("需要 enabled 或 priority".to_string())),
    }
}

async fn get_extension_settings(
    ctx: ApiContext,
    Path((name, settings)): Path<(String, String)>,
) -> ApiResult<Json<ExtensionSettings>> {
    Ok(Json(ExtensionRepository::new(&ctx.instance, &ctx.principal).settings(&name, &settings)?))
}

async fn save_extension_settings(
    ctx: ApiContext,
    Path((name, settings)): Path<(String, String)>,
    Json(mut updated): Json<ExtensionSettings>,
) -> ApiResult<Json<ExtensionSettings>> {
    updated.name = settings;
    Ok(Json(ExtensionRepository::new(&ctx.instance, &ctx.principal).save_settings(&name, &updated)?))
}

async fn list_packages(ctx: ApiContext, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<PackageItem>>> {
    Ok(Json(PackageRepository::new(&ctx.instance, &ctx.principal).find(&query)?))
}

async fn install_package(ctx: ApiContext, Path(id): Path<String>) -> ApiResult<Json<PackageItem>> {
    Ok(Json(PackageRepository::new(&ctx.instance, &ctx.principal).install(&id)?))
}

async fn uninstall_package(ctx: ApiContext, Path(id): Path<String>) -> ApiResult<StatusCode> {
    PackageRepository::new(&ctx.instance, &ctx.principal).uninstall(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
