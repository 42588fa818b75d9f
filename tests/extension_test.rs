// 扩展与小部件的集成测试

use std::sync::Arc;

use rust_blogengine::core::dto::{NewComment, PostDetail};
use rust_blogengine::core::{RepositoryError, Site, SiteOptions};
use rust_blogengine::extensions::ExtensionManager;
use rust_blogengine::models::{KeyValue, WidgetKind};
use rust_blogengine::provider::XmlBlogProvider;
use rust_blogengine::repositories::*;
use rust_blogengine::security::Principal;
use rust_blogengine::theme::{render_zone, UrlBuilder};
use tempfile::TempDir;
use uuid::Uuid;

fn open_site(dir: &TempDir) -> Site {
    let provider = Arc::new(XmlBlogProvider::new(dir.path()));
    Site::open(provider, Arc::new(ExtensionManager::with_builtins()), SiteOptions::default()).unwrap()
}

fn comment(post_id: Uuid, content: &str) -> NewComment {
    NewComment {
        post_id,
        parent_id: None,
        author: "Visitor".to_string(),
        email: "visitor@example.com".to_string(),
        website: String::new(),
        content: content.to_string(),
        ip: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_comment_filter_settings() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let anonymous = Principal::Anonymous;

        let post_id = PostRepository::new(&instance, &system)
            .add(&PostDetail {
                is_published: true,
                author: "admin".to_string(),
                ..PostDetail::new("Filtered", "text")
            })
            .unwrap()
            .id
            .unwrap();

        let extensions = ExtensionRepository::new(&instance, &system);
        let mut filters = extensions.settings("CommentFilter", "filters").unwrap();
        filters.parameters[0].values = vec!["casino".to_string()];
        extensions.save_settings("CommentFilter", &filters).unwrap();

        let comments = CommentsRepository::new(&instance, &anonymous);
        let flagged = comments.add(&comment(post_id, "Visit my CASINO")).unwrap();
        assert!(flagged.is_spam);
        assert!(!flagged.is_approved);
        let clean = comments.add(&comment(post_id, "Thanks")).unwrap();
        assert!(clean.is_approved);

        // 改为直接拒绝
        let mut action = extensions.settings("CommentFilter", "action").unwrap();
        action.parameters[0].values = vec!["reject".to_string()];
        extensions.save_settings("CommentFilter", &action).unwrap();
        assert!(matches!(
            comments.add(&comment(post_id, "casino again")),
            Err(RepositoryError::Forbidden(_))
        ));

        // 禁用后不再过滤
        extensions.set_enabled("CommentFilter", false).unwrap();
        assert!(comments.add(&comment(post_id, "casino once more")).unwrap().is_approved);

        // 清理垃圾评论
        assert_eq!(CommentsRepository::new(&instance, &system).purge_spam().unwrap(), 1);
    }

    #[test]
    pub fn test_extension_management_requires_rights() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();

        let anonymous = Principal::Anonymous;
        assert!(matches!(
            ExtensionRepository::new(&instance, &anonymous).list(),
            Err(RepositoryError::Unauthorized(_))
        ));

        let system = Principal::System;
        let extensions = ExtensionRepository::new(&instance, &system);
        let names: Vec<String> = extensions.list().unwrap().into_iter().map(|e| e.name).collect();
        assert!(names.contains(&"BBCode".to_string()));
        assert!(names.contains(&"CommentFilter".to_string()));

        assert!(matches!(
            extensions.set_enabled("NoSuchExtension", true),
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            extensions.settings("CommentFilter", "missing"),
            Err(RepositoryError::NotFound(_))
        ));

        let item = extensions.set_priority("BBCode", 42).unwrap();
        assert_eq!(item.priority, 42);
    }

    #[test]
    pub fn test_widget_zone_rendering() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let system = Principal::System;
        let urls = UrlBuilder::new("");

        let widgets = WidgetsRepository::new(&instance, &system);
        let mut text = widgets.add("footer", WidgetKind::TextBox, "About").unwrap();
        text.settings = vec![KeyValue::new("content", "<em>hello</em>")];
        widgets.update("footer", &text).unwrap();

        let html = render_zone(&instance, "footer", &urls);
        assert!(html.contains("<h4>About</h4>"));
        assert!(html.contains("<em>hello</em>"));

        // 新文章使侧边栏缓存失效
        let before = render_zone(&instance, "sidebar", &urls);
        assert!(!before.contains("Fresh Post"));
        PostRepository::new(&instance, &system)
            .add(&PostDetail {
                is_published: true,
                author: "admin".to_string(),
                tags: vec!["fresh".to_string()],
                ..PostDetail::new("Fresh Post", "text")
            })
            .unwrap();
        let after = render_zone(&instance, "sidebar", &urls);
        assert!(after.contains("Fresh Post"));
        assert!(after.contains("/tag/fresh"));

        widgets.remove("footer", text.id).unwrap();
        assert!(render_zone(&instance, "footer", &urls).is_empty());
    }
}
