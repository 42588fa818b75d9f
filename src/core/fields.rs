//! 各实体可用于过滤和排序的字段（字段名小写）

use super::dto::{CategoryItem, CommentItem, PackageItem, PageItem, PostItem, TagItem, TrashItem, UserItem};
use super::query::{Filterable, Value};
use crate::models::{Blog, BlogRollItem, CustomField, Role};

impl Filterable for PostItem {
    fn fields() -> &'static [&'static str] {
        &[
            "id", "title", "slug", "author", "datecreated", "datemodified", "ispublished",
            "hascommentsenabled", "commentcount", "pendingcount", "tags", "categories",
        ]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.to_string().into(),
            "title" => self.title.as_str().into(),
            "slug" => self.slug.as_str().into(),
            "author" => self.author.as_str().into(),
            "datecreated" => self.date_created.into(),
            "datemodified" => self.date_modified.into(),
            "ispublished" => self.is_published.into(),
            "hascommentsenabled" => self.has_comments_enabled.into(),
            "commentcount" => self.comment_count.into(),
            "pendingcount" => self.pending_count.into(),
            "tags" => self.tags.join(",").into(),
            "categories" => self
                .categories
                .iter()
                .map(|c| c.title.as_str())
                .collect::<Vec<_>>()
                .join(",")
                .into(),
            _ => return None,
        };
        Some(value)
    }
}

impl Filterable for PageItem {
    fn fields() -> &'static [&'static str] {
        &[
            "id", "title", "slug", "parentid", "ispublished", "isfrontpage", "showinlist",
            "sortorder", "datecreated", "haschildren",
        ]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.to_string().into(),
            "title" => self.title.as_str().into(),
            "slug" => self.slug.as_str().into(),
            "parentid" => self.parent_id.map(|id| id.to_string()).into(),
            "ispublished" => self.is_published.into(),
            "isfrontpage" => self.is_front_page.into(),
            "showinlist" => self.show_in_list.into(),
            "sortorder" => i64::from(self.sort_order).into(),
            "datecreated" => self.date_created.into(),
            "haschildren" => self.has_children.into(),
            _ => return None,
        };
        Some(value)
    }
}

impl Filterable for CommentItem {
    fn fields() -> &'static [&'static str] {
        &[
            "id", "postid", "posttitle", "parentid", "author", "email", "website", "content",
            "ip", "datecreated", "isapproved", "isspam", "isdeleted", "moderatedby",
        ]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.to_string().into(),
            "postid" => self.post_id.to_string().into(),
            "posttitle" => self.post_title.as_str().into(),
            "parentid" => self.parent_id.map(|id| id.to_string()).into(),
            "author" => self.author.as_str().into(),
            "email" => self.email.as_str().into(),
            "website" => self.website.as_str().into(),
            "content" => self.content.as_str().into(),
            "ip" => self.ip.as_str().into(),
            "datecreated" => self.date_created.into(),
            "isapproved" => self.is_approved.into(),
            "isspam" => self.is_spam.into(),
            "isdeleted" => self.is_deleted.into(),
            "moderatedby" => self.moderated_by.as_str().into(),
            _ => return None,
        };
        Some(value)
    }
}

impl Filterable for CategoryItem {
    fn fields() -> &'static [&'static str] {
        &["id", "title", "description", "parentid", "count"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.map(|id| id.to_string()).into(),
            "title" => self.title.as_str().into(),
            "description" => self.description.as_str().into(),
            "parentid" => self.parent_id.map(|id| id.to_string()).into(),
            "count" => self.count.into(),
            _ => return None,
        };
        Some(value)
    }
}

impl Filterable for TagItem {
    fn fields() -> &'static [&'static str] {
        &["name", "tag", "count"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "name" | "tag" => Some(self.name.as_str().into()),
            "count" => Some(self.count.into()),
            _ => None,
        }
    }
}

impl Filterable for UserItem {
    fn fields() -> &'static [&'static str] {
        &["username", "email", "datecreated", "lastlogin", "roles", "displayname"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "username" => self.user_name.as_str().into(),
            "email" => self.email.as_str().into(),
            "datecreated" => self.date_created.into(),
            "lastlogin" => self.last_login.into(),
            "roles" => self.roles.join(",").into(),
            "displayname" => self
                .profile
                .as_ref()
                .map(|p| p.display_name.clone())
                .into(),
            _ => return None,
        };
        Some(value)
    }
}

impl Filterable for Role {
    fn fields() -> &'static [&'static str] {
        &["name", "rolename", "usercount"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "name" | "rolename" => Some(self.name.as_str().into()),
            "usercount" => Some(self.users.len().into()),
            _ => None,
        }
    }
}

impl Filterable for Blog {
    fn fields() -> &'static [&'static str] {
        &[
            "id", "name", "hostname", "virtualpath", "storagecontainername", "isprimary",
            "isactive", "issiteaggregation",
        ]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.to_string().into(),
            "name" => self.name.as_str().into(),
            "hostname" => self.hostname.as_str().into(),
            "virtualpath" => self.virtual_path.as_str().into(),
            "storagecontainername" => self.storage_container_name.as_str().into(),
            "isprimary" => self.is_primary.into(),
            "isactive" => self.is_active.into(),
            "issiteaggregation" => self.is_site_aggregation.into(),
            _ => return None,
        };
        Some(value)
    }
}

impl Filterable for CustomField {
    fn fields() -> &'static [&'static str] {
        &["customtype", "objectid", "key", "value", "attribute"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "customtype" => self.custom_type.to_string().into(),
            "objectid" => self.object_id.as_str().into(),
            "key" => self.key.as_str().into(),
            "value" => self.value.as_str().into(),
            "attribute" => self.attribute.as_str().into(),
            _ => return None,
        };
        Some(value)
    }
}

impl Filterable for BlogRollItem {
    fn fields() -> &'static [&'static str] {
        &["id", "title", "description", "blogurl", "feedurl", "xfn", "sortindex"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.to_string().into(),
            "title" => self.title.as_str().into(),
            "description" => self.description.as_str().into(),
            "blogurl" => self.blog_url.as_str().into(),
            "feedurl" => self.feed_url.as_str().into(),
            "xfn" => self.xfn.as_str().into(),
            "sortindex" => i64::from(self.sort_index).into(),
            _ => return None,
        };
        Some(value)
    }
}

impl Filterable for TrashItem {
    fn fields() -> &'static [&'static str] {
        &["id", "title", "kind", "datecreated"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.to_string().into(),
            "title" => self.title.as_str().into(),
            "kind" => format!("{:?}", self.kind).into(),
            "datecreated" => self.date_created.into(),
            _ => return None,
        };
        Some(value)
    }
}

impl Filterable for PackageItem {
    fn fields() -> &'static [&'static str] {
        &["id", "title", "packagetype", "version", "installed", "updateavailable"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.as_str().into(),
            "title" => self.title.as_str().into(),
            "packagetype" => self.package_type.to_string().into(),
            "version" => self.version.as_str().into(),
            "installed" => self.installed.into(),
            "updateavailable" => self.update_available.into(),
            _ => return None,
        };
        Some(value)
    }
}
