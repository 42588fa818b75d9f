use crate::core::dto::{CommentItem, DashboardItem, PostItem};
use crate::core::error::RepositoryResult;
use crate::core::store::BlogInstance;
use crate::security::{Principal, Right};

use super::TrashRepository;

/// 最近条目数
const RECENT: usize = 5;

/// 仪表盘统计
pub struct DashboardRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> DashboardRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    pub fn get(&self) -> RepositoryResult<DashboardItem> {
        self.instance.require(self.principal, Right::ViewDashboard)?;

        let categories = self.instance.categories.read().clone();
        let posts = self.instance.posts.read();
        let live: Vec<_> = posts.iter().filter(|p| !p.is_deleted).collect();

        let published_posts = live.iter().filter(|p| p.is_published).count();
        let mut drafts: Vec<_> = live.iter().filter(|p| !p.is_published).collect();
        drafts.sort_by(|a, b| b.date_modified.cmp(&a.date_modified));

        let mut comments: Vec<CommentItem> = live
            .iter()
            .flat_map(|p| {
                p.comments
                    .iter()
                    .filter(|c| !c.is_deleted)
                    .map(move |c| CommentItem::from_comment(c, &p.title))
            })
            .collect();
        let approved_comments = comments.iter().filter(|c| c.is_approved && !c.is_spam).count();
        let pending_comments = comments.iter().filter(|c| !c.is_approved && !c.is_spam).count();
        let spam_comments = comments.iter().filter(|c| c.is_spam).count();
        comments.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        comments.truncate(RECENT);

        let item = DashboardItem {
            published_posts,
            draft_posts: drafts.len(),
            pages: self.instance.pages.read().iter().filter(|p| !p.is_deleted).count(),
            approved_comments,
            pending_comments,
            spam_comments,
            users: self.instance.users.read().len(),
            trash: 0,
            recent_drafts: drafts
                .iter()
                .take(RECENT)
                .map(|p| PostItem::from_post(p, &categories))
                .collect(),
            recent_comments: comments,
        };
        drop(posts);

        Ok(DashboardItem {
            trash: TrashRepository::new(self.instance, self.principal).count(),
            ..item
        })
    }
}
