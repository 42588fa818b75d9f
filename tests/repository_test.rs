// 仓储层的集成测试：权限、查询、回收站和持久化

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_blogengine::core::dto::{
    BlogDetail, BlogRollDetail, CategoryRef, CommentAction, NewComment, NewUser, PageDetail,
    PostDetail, TrashKind, UserUpdate,
};
use rust_blogengine::core::query::ListQuery;
use rust_blogengine::core::{RepositoryError, Site, SiteOptions};
use rust_blogengine::extensions::ExtensionManager;
use rust_blogengine::models::{CustomField, CustomFieldType, ModerationType};
use rust_blogengine::provider::XmlBlogProvider;
use rust_blogengine::repositories::*;
use rust_blogengine::security::{Principal, Right, ADMINISTRATORS, ANONYMOUS, EDITORS};
use tempfile::TempDir;
use uuid::Uuid;

fn open_site(dir: &TempDir) -> Site {
    let provider = Arc::new(XmlBlogProvider::new(dir.path()));
    Site::open(
        provider,
        Arc::new(ExtensionManager::with_builtins()),
        SiteOptions {
            title: "Test Blog".to_string(),
            themes_dir: None,
        },
    )
    .unwrap()
}

fn visitor_comment(post_id: Uuid, website: &str) -> NewComment {
    NewComment {
        post_id,
        parent_id: None,
        author: "Visitor".to_string(),
        email: String::new(),
        website: website.to_string(),
        content: "Hello".to_string(),
        ip: String::new(),
    }
}

fn published(title: &str, tags: &[&str]) -> PostDetail {
    PostDetail {
        is_published: true,
        author: "admin".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..PostDetail::new(title, "Some **content**")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_post_visibility_and_filters() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let posts = PostRepository::new(&instance, &system);

        let hello = posts.add(&published("Hello World", &["Rust", "web"])).unwrap();
        assert_eq!(hello.slug, "hello-world");
        assert_eq!(hello.tags, vec!["rust".to_string(), "web".to_string()]);
        posts.add(&PostDetail::new("Draft Notes", "wip")).unwrap();

        // 同名文章得到不同的别名
        let again = posts.add(&published("Hello World", &[])).unwrap();
        assert_ne!(again.slug, hello.slug);

        let anonymous = Principal::Anonymous;
        let public = PostRepository::new(&instance, &anonymous);
        let visible = public.find(&ListQuery::all()).unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|p| p.is_published));

        let drafts = posts
            .find(&ListQuery::all().with_filter("IsPublished == false"))
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "Draft Notes");

        assert_eq!(posts.count("Tags.Contains(\"rust\")").unwrap(), 1);
        assert!(matches!(
            posts.find(&ListQuery::all().with_filter("Title ==")),
            Err(RepositoryError::Query(_))
        ));
    }

    #[test]
    pub fn test_anonymous_cannot_create_posts() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();

        let anonymous = Principal::Anonymous;
        let result = PostRepository::new(&instance, &anonymous).add(&published("Nope", &[]));
        assert!(matches!(result, Err(RepositoryError::Unauthorized(Right::CreateNewPosts))));
        assert!(instance.posts.read().is_empty());
    }

    #[test]
    pub fn test_editor_permissions() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;

        UsersRepository::new(&instance, &system)
            .add(&NewUser {
                user_name: "jane".to_string(),
                email: "jane@example.com".to_string(),
                password: "secret1".to_string(),
                roles: vec![EDITORS.to_string()],
            })
            .unwrap();
        let jane = instance.principal_for("jane");

        let post = PostRepository::new(&instance, &jane)
            .add(&PostDetail::new("Jane's post", "text"))
            .unwrap();
        assert_eq!(post.author, "jane");

        // 编辑不能删除别人的文章，也不能管理用户
        let admin_post = PostRepository::new(&instance, &system)
            .add(&published("Admin post", &[]))
            .unwrap();
        assert!(matches!(
            PostRepository::new(&instance, &jane).remove(admin_post.id.unwrap()),
            Err(RepositoryError::Unauthorized(Right::DeleteOtherUsersPosts))
        ));
        assert!(UsersRepository::new(&instance, &jane)
            .add(&NewUser {
                user_name: "mallory".to_string(),
                email: "m@example.com".to_string(),
                password: "secret1".to_string(),
                roles: Vec::new(),
            })
            .is_err());

        // 编辑只能看到自己
        let visible = UsersRepository::new(&instance, &jane).find(&ListQuery::all()).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].user_name, "jane");
    }

    #[test]
    pub fn test_users_and_passwords() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let users = UsersRepository::new(&instance, &system);

        users
            .add(&NewUser {
                user_name: "bob".to_string(),
                email: "bob@example.com".to_string(),
                password: "hunter22".to_string(),
                roles: Vec::new(),
            })
            .unwrap();
        assert!(users.validate_user("bob", "hunter22").unwrap());
        assert!(!users.validate_user("bob", "wrong").unwrap());
        assert!(!users.validate_user("nobody", "hunter22").unwrap());

        // 修改自己的密码需要旧密码
        let bob = instance.principal_for("bob");
        let own = UsersRepository::new(&instance, &bob);
        assert!(matches!(
            own.change_password("bob", Some("wrong"), "newpass1"),
            Err(RepositoryError::Validation(_))
        ));
        own.change_password("bob", Some("hunter22"), "newpass1").unwrap();
        assert!(users.validate_user("bob", "newpass1").unwrap());

        let updated = users
            .update(
                "bob",
                &UserUpdate {
                    email: Some("robert@example.com".to_string()),
                    ..UserUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.email, "robert@example.com");

        assert!(matches!(
            users.add(&NewUser {
                user_name: "bob".to_string(),
                email: "b@example.com".to_string(),
                password: "hunter22".to_string(),
                roles: Vec::new(),
            }),
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    pub fn test_comment_moderation() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;

        let mut settings = SettingsRepository::new(&instance, &system).get().unwrap();
        settings.moderation = ModerationType::Manual;
        SettingsRepository::new(&instance, &system).update(&settings).unwrap();

        let post = PostRepository::new(&instance, &system)
            .add(&published("Discuss", &[]))
            .unwrap();
        let anonymous = Principal::Anonymous;
        let comment = CommentsRepository::new(&instance, &anonymous)
            .add(&NewComment {
                post_id: post.id.unwrap(),
                parent_id: None,
                author: "Visitor".to_string(),
                email: String::new(),
                website: String::new(),
                content: "Nice post".to_string(),
                ip: "127.0.0.1".to_string(),
            })
            .unwrap();
        assert!(!comment.is_approved);

        // 匿名访客看不到待审核的评论
        let public = CommentsRepository::new(&instance, &anonymous)
            .find(&ListQuery::all())
            .unwrap();
        assert!(public.is_empty());

        let approved = CommentsRepository::new(&instance, &system)
            .update(comment.id, &CommentAction::Approve)
            .unwrap();
        assert!(approved.is_approved);

        let public = CommentsRepository::new(&instance, &anonymous)
            .find(&ListQuery::all())
            .unwrap();
        assert_eq!(public.len(), 1);
        assert!(CommentsRepository::new(&instance, &anonymous)
            .update(comment.id, &CommentAction::Spam)
            .is_err());
    }

    #[test]
    pub fn test_trash_restore_and_purge() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let posts = PostRepository::new(&instance, &system);
        let trash = TrashRepository::new(&instance, &system);

        let first = posts.add(&published("First", &[])).unwrap().id.unwrap();
        let second = posts.add(&published("Second", &[])).unwrap().id.unwrap();
        posts.remove(first).unwrap();
        posts.remove(second).unwrap();
        assert_eq!(trash.count(), 2);
        assert!(posts.find(&ListQuery::all()).unwrap().is_empty());

        trash.restore(TrashKind::Post, first).unwrap();
        assert_eq!(posts.find(&ListQuery::all()).unwrap().len(), 1);

        assert_eq!(trash.purge_all().unwrap(), 1);
        assert_eq!(trash.count(), 0);
        assert!(matches!(
            trash.restore(TrashKind::Post, second),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    pub fn test_categories_and_tags() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let posts = PostRepository::new(&instance, &system);

        let detail = PostDetail {
            categories: vec![CategoryRef {
                id: None,
                title: "Programming".to_string(),
            }],
            ..published("Categorised", &["rust", "async"])
        };
        posts.add(&detail).unwrap();
        posts.add(&published("Other", &["rust"])).unwrap();

        let categories = CategoryRepository::new(&instance, &system)
            .find(&ListQuery::all())
            .unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].title, "Programming");
        assert_eq!(categories[0].count, 1);

        let tags = TagRepository::new(&instance, &system);
        assert_eq!(tags.update("rust", "rustlang").unwrap(), 2);
        let names: Vec<String> = tags
            .find(&ListQuery::all())
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert!(names.contains(&"rustlang".to_string()));
        assert!(!names.contains(&"rust".to_string()));
        assert_eq!(tags.remove("async").unwrap(), 1);
    }

    #[test]
    pub fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let post_id = {
            let site = open_site(&dir);
            let instance = site.primary_instance().unwrap();
            let system = Principal::System;
            PostRepository::new(&instance, &system)
                .add(&published("Persistent", &["xml"]))
                .unwrap()
                .id
                .unwrap()
        };

        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let post = PostRepository::new(&instance, &system).find_by_id(post_id).unwrap();
        assert_eq!(post.title, "Persistent");
        assert_eq!(post.tags, vec!["xml".to_string()]);
        println!("测试通过: 重新打开站点后数据仍在");
    }

    #[test]
    pub fn test_multiple_blogs_are_isolated() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let primary = site.primary_instance().unwrap();
        let system = Principal::System;

        let team = BlogRepository::new(&site, &primary, &system)
            .add(&BlogDetail {
                virtual_path: "/team".to_string(),
                ..BlogDetail::new("Team")
            })
            .unwrap();

        let team_instance = site.instance(team.id).unwrap();
        PostRepository::new(&team_instance, &system)
            .add(&published("Team news", &[]))
            .unwrap();
        assert!(PostRepository::new(&primary, &system)
            .find(&ListQuery::all())
            .unwrap()
            .is_empty());

        let (blog, rest) = site.resolve("localhost", "/team/post/team-news").unwrap();
        assert_eq!(blog.id, team.id);
        assert_eq!(rest, "/post/team-news");

        // 主博客不能删除
        let primary_id = site.primary().unwrap().id;
        assert!(BlogRepository::new(&site, &primary, &system).remove(primary_id).is_err());
    }

    #[test]
    pub fn test_post_content_whitespace_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let content = "    let x = 1; // indented code block\n\n";
        let post_id = {
            let site = open_site(&dir);
            let instance = site.primary_instance().unwrap();
            PostRepository::new(&instance, &Principal::System)
                .add(&PostDetail {
                    content: content.to_string(),
                    ..published("Code sample", &[])
                })
                .unwrap()
                .id
                .unwrap()
        };

        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let post = PostRepository::new(&instance, &Principal::System)
            .find_by_id(post_id)
            .unwrap();
        assert_eq!(post.content, content);
    }

    #[test]
    pub fn test_failed_category_lookup_changes_nothing() {
        let dir = TempDir::new().unwrap();
        {
            let site = open_site(&dir);
            let instance = site.primary_instance().unwrap();
            let system = Principal::System;
            let detail = PostDetail {
                categories: vec![
                    CategoryRef {
                        id: None,
                        title: "Fresh".to_string(),
                    },
                    CategoryRef {
                        id: Some(Uuid::new_v4()),
                        title: String::new(),
                    },
                ],
                ..published("Broken refs", &[])
            };
            assert!(matches!(
                PostRepository::new(&instance, &system).add(&detail),
                Err(RepositoryError::NotFound(_))
            ));
            assert!(instance.categories.read().is_empty());
            assert!(instance.posts.read().is_empty());
        }

        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        assert!(instance.categories.read().is_empty());
    }

    #[test]
    pub fn test_comment_website_must_be_http() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let post_id = PostRepository::new(&instance, &Principal::System)
            .add(&published("Links", &[]))
            .unwrap()
            .id
            .unwrap();

        let anonymous = Principal::Anonymous;
        let comments = CommentsRepository::new(&instance, &anonymous);
        for website in ["javascript:alert(document.cookie)", "data:text/html,x", "example.com"] {
            assert!(matches!(
                comments.add(&visitor_comment(post_id, website)),
                Err(RepositoryError::Validation(_))
            ));
        }
        let added = comments
            .add(&visitor_comment(post_id, "https://visitor.example.com"))
            .unwrap();
        assert_eq!(added.website, "https://visitor.example.com");
        assert!(comments.add(&visitor_comment(post_id, "")).is_ok());
    }

    #[test]
    pub fn test_comments_close_after_configured_days() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;

        let mut settings = SettingsRepository::new(&instance, &system).get().unwrap();
        settings.days_comments_are_enabled = 7;
        SettingsRepository::new(&instance, &system).update(&settings).unwrap();

        let posts = PostRepository::new(&instance, &system);
        let old = posts
            .add(&PostDetail {
                date_created: Some(Utc::now() - Duration::days(30)),
                ..published("Old news", &[])
            })
            .unwrap();
        let recent = posts
            .add(&PostDetail {
                date_created: Some(Utc::now() - Duration::days(2)),
                ..published("Recent news", &[])
            })
            .unwrap();

        let anonymous = Principal::Anonymous;
        let comments = CommentsRepository::new(&instance, &anonymous);
        assert!(matches!(
            comments.add(&visitor_comment(old.id.unwrap(), "")),
            Err(RepositoryError::Forbidden(_))
        ));
        assert!(comments.add(&visitor_comment(recent.id.unwrap(), "")).is_ok());

        // 0 表示永远开放
        settings.days_comments_are_enabled = 0;
        SettingsRepository::new(&instance, &system).update(&settings).unwrap();
        assert!(comments.add(&visitor_comment(old.id.unwrap(), "")).is_ok());
    }

    #[test]
    pub fn test_page_hierarchy_front_page_and_slugs() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let pages = PageRepository::new(&instance, &system);

        let about = pages
            .add(&PageDetail {
                is_published: true,
                is_front_page: true,
                ..PageDetail::new("About", "About us")
            })
            .unwrap();
        let about_id = about.id.unwrap();
        let team = pages
            .add(&PageDetail {
                parent_id: Some(about_id),
                is_published: true,
                ..PageDetail::new("Team", "The team")
            })
            .unwrap();

        // 父页面不能是自己或后代
        let mut cyclic = about.clone();
        cyclic.parent_id = Some(about_id);
        assert!(matches!(pages.update(&cyclic), Err(RepositoryError::Validation(_))));
        cyclic.parent_id = team.id;
        assert!(matches!(pages.update(&cyclic), Err(RepositoryError::Validation(_))));

        // 同名页面得到不同的别名
        let again = pages.add(&PageDetail::new("About", "Second")).unwrap();
        assert_ne!(again.slug, about.slug);

        // 首页标记是唯一的
        let contact = pages
            .add(&PageDetail {
                is_published: true,
                is_front_page: true,
                ..PageDetail::new("Contact", "Write to us")
            })
            .unwrap();
        assert!(!pages.find_by_id(about_id).unwrap().is_front_page);
        let front = pages.front_page().unwrap().unwrap();
        assert_eq!(Some(front.id), contact.id);

        let listed = pages
            .find(&ListQuery::all().with_filter("IsFrontPage == true"))
            .unwrap();
        assert_eq!(listed.len(), 1);
        let parent = pages
            .find(&ListQuery::all().with_filter("HasChildren == true"))
            .unwrap();
        assert_eq!(parent[0].id, about_id);
    }

    #[test]
    pub fn test_system_roles_and_rights() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let roles = RolesRepository::new(&instance, &system);

        for name in [ADMINISTRATORS, EDITORS, ANONYMOUS] {
            assert!(matches!(roles.remove(name), Err(RepositoryError::Forbidden(_))));
        }

        roles.add("Writers").unwrap();
        assert!(matches!(roles.add("writers"), Err(RepositoryError::Conflict(_))));
        let rights: BTreeSet<Right> = [Right::CreateNewPosts, Right::EditOwnPosts].into_iter().collect();
        roles.set_rights("Writers", &rights).unwrap();
        assert_eq!(roles.get_rights("Writers").unwrap(), rights);

        // 管理员的权限不会被缩减
        roles.set_rights(ADMINISTRATORS, &BTreeSet::new()).unwrap();
        assert_eq!(roles.get_rights(ADMINISTRATORS).unwrap().len(), Right::ALL.len());

        roles.remove("Writers").unwrap();
        assert!(matches!(roles.get_rights("Writers"), Err(RepositoryError::NotFound(_))));
    }

    #[test]
    pub fn test_custom_fields() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let fields = CustomFieldRepository::new(&instance, &system);

        let mut field = CustomField {
            custom_type: CustomFieldType::Theme,
            object_id: "standard".to_string(),
            key: "accent".to_string(),
            value: "blue".to_string(),
            attribute: String::new(),
        };
        fields.add(&field).unwrap();
        assert!(matches!(fields.add(&field), Err(RepositoryError::Conflict(_))));

        field.value = "green".to_string();
        fields.update(&field).unwrap();
        let found = fields.find("CustomType == \"THEME\" && Key == \"accent\"").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "green");

        // 匿名访客只能读取
        let anonymous = Principal::Anonymous;
        assert_eq!(CustomFieldRepository::new(&instance, &anonymous).find("").unwrap().len(), 1);
        assert!(CustomFieldRepository::new(&instance, &anonymous).remove(&field).is_err());

        fields.remove(&field).unwrap();
        assert!(matches!(fields.remove(&field), Err(RepositoryError::NotFound(_))));
    }

    #[test]
    pub fn test_dashboard_counts() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let posts = PostRepository::new(&instance, &system);

        let live = posts.add(&published("Live", &[])).unwrap().id.unwrap();
        posts.add(&PostDetail::new("Draft one", "wip")).unwrap();
        let gone = posts.add(&published("Gone", &[])).unwrap().id.unwrap();
        posts.remove(gone).unwrap();
        PageRepository::new(&instance, &system)
            .add(&PageDetail::new("About", "text"))
            .unwrap();
        CommentsRepository::new(&instance, &Principal::Anonymous)
            .add(&visitor_comment(live, ""))
            .unwrap();

        let dashboard = DashboardRepository::new(&instance, &system).get().unwrap();
        assert_eq!(dashboard.published_posts, 1);
        assert_eq!(dashboard.draft_posts, 1);
        assert_eq!(dashboard.pages, 1);
        assert_eq!(dashboard.approved_comments, 1);
        assert_eq!(dashboard.pending_comments, 0);
        assert_eq!(dashboard.trash, 1);
        assert_eq!(dashboard.recent_drafts[0].title, "Draft one");
        assert_eq!(dashboard.recent_comments.len(), 1);

        assert!(DashboardRepository::new(&instance, &Principal::Anonymous).get().is_err());
    }

    #[test]
    pub fn test_blogroll_items() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let blogroll = BlogRollRepository::new(&instance, &system);

        let detail = BlogRollDetail {
            id: None,
            title: "Friend".to_string(),
            description: String::new(),
            blog_url: "https://friend.example.com".to_string(),
            feed_url: "https://friend.example.com/feed".to_string(),
            xfn: "friend".to_string(),
            sort_index: 1,
        };
        let bad = BlogRollDetail {
            blog_url: "javascript:alert(1)".to_string(),
            ..detail.clone()
        };
        assert!(matches!(blogroll.add(&bad), Err(RepositoryError::Validation(_))));

        let mut added = blogroll.add(&detail).unwrap();
        added.title = "Old friend".to_string();
        blogroll.update(&added).unwrap();
        let items = blogroll.find(&ListQuery::all()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Old friend");

        assert!(BlogRollRepository::new(&instance, &Principal::Anonymous)
            .remove(added.id.unwrap())
            .is_err());
        blogroll.remove(added.id.unwrap()).unwrap();
        assert!(blogroll.find(&ListQuery::all()).unwrap().is_empty());
    }

    #[test]
    pub fn test_new_blog_copies_template() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let primary = site.primary_instance().unwrap();
        let system = Principal::System;
        let blogs = BlogRepository::new(&site, &primary, &system);

        let source = blogs
            .add(&BlogDetail {
                virtual_path: "/source".to_string(),
                ..BlogDetail::new("Source")
            })
            .unwrap();
        let source_instance = site.instance(source.id).unwrap();
        let mut settings = SettingsRepository::new(&source_instance, &system).get().unwrap();
        settings.posts_per_page = 3;
        SettingsRepository::new(&source_instance, &system).update(&settings).unwrap();
        UsersRepository::new(&source_instance, &system)
            .add(&NewUser {
                user_name: "carol".to_string(),
                email: "carol@example.com".to_string(),
                password: "secret1".to_string(),
                roles: vec![EDITORS.to_string()],
            })
            .unwrap();
        RolesRepository::new(&source_instance, &system).add("Writers").unwrap();

        let copy = blogs
            .add(&BlogDetail {
                virtual_path: "/copy".to_string(),
                template_id: Some(source.id),
                ..BlogDetail::new("Copy")
            })
            .unwrap();
        let copy_instance = site.instance(copy.id).unwrap();
        let copied = SettingsRepository::new(&copy_instance, &system).get().unwrap();
        assert_eq!(copied.posts_per_page, 3);
        assert_eq!(copied.name, "Copy");
        assert!(UsersRepository::new(&copy_instance, &system)
            .validate_user("carol", "secret1")
            .unwrap());
        assert!(RolesRepository::new(&copy_instance, &system).find_by_id("Writers").is_ok());

        // 模板本身不受影响
        let source_settings = SettingsRepository::new(&source_instance, &system).get().unwrap();
        assert_eq!(source_settings.name, "Source");
        assert!(matches!(
            blogs.add(&BlogDetail {
                virtual_path: "/orphan".to_string(),
                template_id: Some(Uuid::new_v4()),
                ..BlogDetail::new("Orphan")
            }),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    pub fn test_rejects_path_like_user_names() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let users = UsersRepository::new(&instance, &Principal::System);

        for name in [".", "..", "a/b", "tab\tname"] {
            assert!(matches!(
                users.add(&NewUser {
                    user_name: name.to_string(),
                    email: "x@example.com".to_string(),
                    password: "secret1".to_string(),
                    roles: Vec::new(),
                }),
                Err(RepositoryError::Validation(_))
            ));
        }
        assert!(instance.users.read().is_empty());
        assert!(instance.profiles.read().is_empty());
    }

    #[test]
    pub fn test_unknown_fields_fail_on_empty_lists() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let posts = PostRepository::new(&instance, &Principal::System);

        assert!(matches!(
            posts.find(&ListQuery::all().with_filter("NoSuchField == 1")),
            Err(RepositoryError::Query(_))
        ));
        assert!(matches!(
            posts.find(&ListQuery::all().with_order("Bogus desc")),
            Err(RepositoryError::Query(_))
        ));
        assert!(matches!(posts.count("false && Nope == 1"), Err(RepositoryError::Query(_))));
    }
}
