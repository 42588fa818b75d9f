//! 权限、角色与调用者身份
//!
//! 每个博客有自己的 rights.xml（权限 → 角色列表）。调用者的权限是其所有角色权限的并集，
//! 再加上 Anonymous 角色的权限。Administrators 角色始终拥有全部权限。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub mod password;

/// 管理员角色
pub const ADMINISTRATORS: &str = "Administrators";
/// 编辑角色
pub const EDITORS: &str = "Editors";
/// 匿名访客角色
pub const ANONYMOUS: &str = "Anonymous";

/// 系统角色不可删除
pub const SYSTEM_ROLES: [&str; 3] = [ADMINISTRATORS, EDITORS, ANONYMOUS];

/// 判断是否为系统角色
pub fn is_system_role(name: &str) -> bool {
    SYSTEM_ROLES.iter().any(|r| r.eq_ignore_ascii_case(name))
}

macro_rules! rights {
    ($($name:ident),+ $(,)?) => {
        /// 权限目录
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub enum Right {
            $($name),+
        }

        impl Right {
            /// 全部权限
            pub const ALL: &'static [Right] = &[$(Right::$name),+];

            /// 权限名称
            pub fn name(&self) -> &'static str {
                match self {
                    $(Right::$name => stringify!($name)),+
                }
            }
        }
    };
}

rights! {
    ViewPublicPosts,
    ViewUnpublishedPosts,
    CreateNewPosts,
    EditOwnPosts,
    EditOtherUsersPosts,
    DeleteOwnPosts,
    DeleteOtherUsersPosts,
    PublishOwnPosts,
    PublishOtherUsersPosts,
    ViewPublicPages,
    ViewUnpublishedPages,
    CreateNewPages,
    EditPages,
    DeletePages,
    PublishPages,
    ViewPublicComments,
    ViewUnmoderatedComments,
    CreateComments,
    ModerateComments,
    ViewRatingsOnPosts,
    SubmitRatingsOnPosts,
    AccessAdminPages,
    AccessAdminSettingsPages,
    ViewDashboard,
    ManageCategories,
    ManageWidgets,
    ManageExtensions,
    ManagePackages,
    ManageThemes,
    ViewRoles,
    CreateNewRoles,
    EditRoles,
    DeleteRoles,
    EditOwnRoles,
    EditOtherUsersRoles,
    ViewUsers,
    CreateNewUsers,
    EditOwnUser,
    EditOtherUsers,
    DeleteUserSelf,
    DeleteUsersOtherThanSelf,
    ManageBlogs,
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Right {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Right::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("未知的权限: {}", s))
    }
}

impl From<Right> for String {
    fn from(value: Right) -> Self {
        value.name().to_string()
    }
}

impl TryFrom<String> for Right {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// rights.xml 中的一条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "right")]
pub struct RightEntry {
    pub name: Right,
    #[serde(rename = "role", default)]
    pub roles: Vec<String>,
}

/// 权限表：权限 → 拥有该权限的角色
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RightsTable {
    entries: BTreeMap<Right, BTreeSet<String>>,
}

impl RightsTable {
    /// 从持久化记录构建，Administrators 自动拥有全部权限
    pub fn from_entries(entries: Vec<RightEntry>) -> Self {
        let mut table = Self::default();
        for entry in entries {
            let roles = table.entries.entry(entry.name).or_default();
            roles.extend(entry.roles);
        }
        table.ensure_administrators();
        table
    }

    /// 转换为持久化记录
    pub fn to_entries(&self) -> Vec<RightEntry> {
        Right::ALL
            .iter()
            .map(|right| RightEntry {
                name: *right,
                roles: self
                    .entries
                    .get(right)
                    .map(|roles| roles.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// 新博客的默认权限表
    pub fn defaults() -> Self {
        use Right::*;

        let editor_rights = [
            ViewPublicPosts,
            ViewUnpublishedPosts,
            CreateNewPosts,
            EditOwnPosts,
            EditOtherUsersPosts,
            DeleteOwnPosts,
            PublishOwnPosts,
            ViewPublicPages,
            ViewUnpublishedPages,
            CreateNewPages,
            EditPages,
            PublishPages,
            ViewPublicComments,
            ViewUnmoderatedComments,
            CreateComments,
            ModerateComments,
            ViewRatingsOnPosts,
            SubmitRatingsOnPosts,
            AccessAdminPages,
            ViewDashboard,
            ManageCategories,
            EditOwnUser,
        ];
        let anonymous_rights = [
            ViewPublicPosts,
            ViewPublicPages,
            ViewPublicComments,
            CreateComments,
            ViewRatingsOnPosts,
            SubmitRatingsOnPosts,
        ];

        let mut table = Self::default();
        for right in editor_rights {
            table.grant(right, EDITORS);
        }
        for right in anonymous_rights {
            table.grant(right, ANONYMOUS);
        }
        table.ensure_administrators();
        table
    }

    fn ensure_administrators(&mut self) {
        for right in Right::ALL {
            self.entries
                .entry(*right)
                .or_default()
                .insert(ADMINISTRATORS.to_string());
        }
    }

    /// 授予角色某项权限
    pub fn grant(&mut self, right: Right, role: &str) {
        self.entries.entry(right).or_default().insert(role.to_string());
    }

    /// 角色是否拥有某项权限
    pub fn role_has(&self, role: &str, right: Right) -> bool {
        self.entries
            .get(&right)
            .map(|roles| roles.iter().any(|r| r.eq_ignore_ascii_case(role)))
            .unwrap_or(false)
    }

    /// 角色拥有的全部权限
    pub fn rights_for_role(&self, role: &str) -> BTreeSet<Right> {
        Right::ALL
            .iter()
            .copied()
            .filter(|right| self.role_has(role, *right))
            .collect()
    }

    /// 替换角色的权限集合；Administrators 的权限不可修改
    pub fn set_role_rights(&mut self, role: &str, rights: &BTreeSet<Right>) {
        if role.eq_ignore_ascii_case(ADMINISTRATORS) {
            return;
        }
        self.remove_role(role);
        for right in rights {
            self.entries.entry(*right).or_default().insert(role.to_string());
        }
    }

    /// 删除角色时移除其全部权限
    pub fn remove_role(&mut self, role: &str) {
        for roles in self.entries.values_mut() {
            roles.retain(|r| !r.eq_ignore_ascii_case(role));
        }
    }

    /// 调用者是否拥有某项权限
    pub fn is_authorized(&self, principal: &Principal, right: Right) -> bool {
        if principal.is_system() {
            return true;
        }
        if self.role_has(ANONYMOUS, right) {
            return true;
        }
        principal.roles().iter().any(|role| self.role_has(role, right))
    }
}

/// 发起操作的调用者
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// 未登录访客
    Anonymous,
    /// 已登录用户及其角色
    User { name: String, roles: Vec<String> },
    /// 命令行等内部调用，拥有全部权限
    System,
}

impl Principal {
    pub fn user(name: &str, roles: Vec<String>) -> Self {
        Principal::User {
            name: name.to_string(),
            roles,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Principal::Anonymous)
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Principal::System)
    }

    /// 用户名（系统调用为 "system"）
    pub fn name(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::User { name, .. } => Some(name),
            Principal::System => Some("system"),
        }
    }

    pub fn roles(&self) -> &[String] {
        match self {
            Principal::User { roles, .. } => roles,
            _ => &[],
        }
    }

    /// 是否为指定用户本人
    pub fn is_self(&self, user_name: &str) -> bool {
        matches!(self, Principal::User { name, .. } if name.eq_ignore_ascii_case(user_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn administrators_always_hold_every_right() {
        let mut table = RightsTable::from_entries(Vec::new());
        let admin = Principal::user("admin", vec![ADMINISTRATORS.to_string()]);
        for right in Right::ALL {
            assert!(table.is_authorized(&admin, *right));
        }

        table.set_role_rights(ADMINISTRATORS, &BTreeSet::new());
        assert!(table.is_authorized(&admin, Right::ManageBlogs));
    }

    #[test]
    fn anonymous_rights_apply_to_everyone() {
        let table = RightsTable::defaults();
        let editor = Principal::user("ed", vec![EDITORS.to_string()]);
        assert!(table.is_authorized(&Principal::Anonymous, Right::ViewPublicPosts));
        assert!(!table.is_authorized(&Principal::Anonymous, Right::CreateNewPosts));
        assert!(table.is_authorized(&editor, Right::CreateComments));
        assert!(table.is_authorized(&editor, Right::CreateNewPosts));
        assert!(!table.is_authorized(&editor, Right::ManageExtensions));
    }

    #[test]
    fn set_role_rights_replaces_previous_set() {
        let mut table = RightsTable::defaults();
        let rights: BTreeSet<Right> = [Right::ManageWidgets].into_iter().collect();
        table.set_role_rights(EDITORS, &rights);
        assert_eq!(table.rights_for_role(EDITORS), rights);

        let round_trip = RightsTable::from_entries(table.to_entries());
        assert_eq!(round_trip, table);
    }

    #[test]
    fn right_names_parse_case_insensitively() {
        assert_eq!("editownposts".parse::<Right>(), Ok(Right::EditOwnPosts));
        assert!("NoSuchRight".parse::<Right>().is_err());
    }
}
