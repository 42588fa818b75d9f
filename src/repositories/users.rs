use chrono::Utc;
use tracing::{info, warn};

use crate::core::dto::{NewUser, ProfileItem, UserItem, UserUpdate};
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::extensions::ExtensionEvent;
use crate::models::{AuthorProfile, BlogUser};
use crate::security::password::{hash_password, new_salt, verify_password, MIN_PASSWORD_LENGTH};
use crate::security::{Principal, Right, ADMINISTRATORS};
use crate::utils;

/// 用户仓储（成员、角色归属和作者资料）
pub struct UsersRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> UsersRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    fn to_item(&self, user: &BlogUser) -> UserItem {
        let profile = self
            .instance
            .profiles
            .read()
            .iter()
            .find(|p| p.user_name.eq_ignore_ascii_case(&user.user_name))
            .map(ProfileItem::from_profile);
        UserItem {
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            date_created: user.date_created,
            last_login: user.last_login,
            roles: self.instance.roles_of(&user.user_name),
            profile,
        }
    }

    /// 没有 ViewUsers 权限的登录用户只能看到自己
    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<UserItem>> {
        let all = self.instance.can(self.principal, Right::ViewUsers);
        if !all && !matches!(self.principal, Principal::User { .. }) {
            return Err(RepositoryError::Unauthorized(Right::ViewUsers));
        }
        let users = self.instance.users.read().clone();
        let items = users
            .iter()
            .filter(|u| all || self.principal.is_self(&u.user_name))
            .map(|u| self.to_item(u))
            .collect();
        Ok(query::apply(items, query, "UserName")?)
    }

    pub fn find_by_id(&self, user_name: &str) -> RepositoryResult<UserItem> {
        if !self.principal.is_self(user_name) {
            self.instance.require(self.principal, Right::ViewUsers)?;
        }
        let user = self.existing(user_name)?;
        Ok(self.to_item(&user))
    }

    fn existing(&self, user_name: &str) -> RepositoryResult<BlogUser> {
        self.instance
            .users
            .read()
            .iter()
            .find(|u| u.user_name.eq_ignore_ascii_case(user_name))
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("用户 {}", user_name)))
    }

    pub fn add(&self, new: &NewUser) -> RepositoryResult<UserItem> {
        self.instance.require(self.principal, Right::CreateNewUsers)?;

        let user_name = new.user_name.trim();
        if !is_valid_user_name(user_name) {
            return Err(RepositoryError::validation("用户名无效"));
        }
        if self.existing(user_name).is_ok() {
            return Err(RepositoryError::conflict(format!("用户已存在: {}", user_name)));
        }
        if !utils::is_valid_email(&new.email) {
            return Err(RepositoryError::validation("邮箱格式不正确"));
        }
        check_password(&new.password)?;
        self.check_roles(&new.roles)?;

        let salt = new_salt();
        let user = BlogUser {
            user_name: user_name.to_string(),
            email: new.email.trim().to_string(),
            password_hash: hash_password(&new.password, &salt),
            password_salt: salt,
            date_created: Utc::now(),
            last_login: None,
        };
        self.instance.users.write().push(user.clone());
        self.instance.persist_users()?;

        self.set_roles(&user.user_name, &new.roles)?;

        let mut profile = AuthorProfile::new(&user.user_name);
        profile.email = user.email.clone();
        self.instance.profiles.write().push(profile.clone());
        self.instance.persist_profile(&profile, true)?;

        self.instance
            .raise(&mut ExtensionEvent::UserCreated(&user.user_name));
        info!("新增用户: {}", user.user_name);
        Ok(self.to_item(&user))
    }

    pub fn update(&self, user_name: &str, update: &UserUpdate) -> RepositoryResult<UserItem> {
        let own = self.principal.is_self(user_name);
        self.instance.require(
            self.principal,
            if own { Right::EditOwnUser } else { Right::EditOtherUsers },
        )?;
        let mut user = self.existing(user_name)?;

        if let Some(roles) = &update.roles {
            self.instance.require(
                self.principal,
                if own { Right::EditOwnRoles } else { Right::EditOtherUsersRoles },
            )?;
            self.check_roles(roles)?;
            let keeps_admin = roles.iter().any(|r| r.eq_ignore_ascii_case(ADMINISTRATORS));
            if !keeps_admin {
                self.check_not_last_administrator(&user.user_name)?;
            }
        }

        if let Some(email) = &update.email {
            if !utils::is_valid_email(email) {
                return Err(RepositoryError::validation("邮箱格式不正确"));
            }
            user.email = email.trim().to_string();
            {
                let mut users = self.instance.users.write();
                if let Some(slot) = users.iter_mut().find(|u| u.user_name == user.user_name) {
                    slot.email = user.email.clone();
                }
            }
            self.instance.persist_users()?;
        }

        if let Some(roles) = &update.roles {
            self.set_roles(&user.user_name, roles)?;
        }

        if let Some(item) = &update.profile {
            let (profile, is_new) = {
                let mut profiles = self.instance.profiles.write();
                match profiles
                    .iter_mut()
                    .find(|p| p.user_name.eq_ignore_ascii_case(&user.user_name))
                {
                    Some(profile) => {
                        item.apply_to(profile);
                        (profile.clone(), false)
                    }
                    None => {
                        let mut profile = AuthorProfile::new(&user.user_name);
                        item.apply_to(&mut profile);
                        profiles.push(profile.clone());
                        (profile, true)
                    }
                }
            };
            self.instance.persist_profile(&profile, is_new)?;
        }

        Ok(self.to_item(&user))
    }

    /// 修改密码；修改自己的密码时需要提供旧密码
    pub fn change_password(
        &self,
        user_name: &str,
        old_password: Option<&str>,
        new_password: &str,
    ) -> RepositoryResult<()> {
        let own = self.principal.is_self(user_name);
        self.instance.require(
            self.principal,
            if own { Right::EditOwnUser } else { Right::EditOtherUsers },
        )?;
        check_password(new_password)?;

        let user = self.existing(user_name)?;
        if own {
            let old = old_password.unwrap_or_default();
            if !verify_password(old, &user.password_salt, &user.password_hash) {
                return Err(RepositoryError::validation("旧密码不正确"));
            }
        }

        {
            let mut users = self.instance.users.write();
            if let Some(slot) = users.iter_mut().find(|u| u.user_name == user.user_name) {
                slot.password_salt = new_salt();
                slot.password_hash = hash_password(new_password, &slot.password_salt);
            }
        }
        self.instance.persist_users()?;
        info!("用户 {} 的密码已修改", user.user_name);
        Ok(())
    }

    /// 删除用户、角色归属和作者资料
    pub fn remove(&self, user_name: &str) -> RepositoryResult<()> {
        let right = if self.principal.is_self(user_name) {
            Right::DeleteUserSelf
        } else {
            Right::DeleteUsersOtherThanSelf
        };
        self.instance.require(self.principal, right)?;
        let user = self.existing(user_name)?;
        self.check_not_last_administrator(&user.user_name)?;

        self.instance
            .users
            .write()
            .retain(|u| u.user_name != user.user_name);
        self.instance.persist_users()?;

        self.set_roles(&user.user_name, &[])?;

        let profile = {
            let mut profiles = self.instance.profiles.write();
            let index = profiles
                .iter()
                .position(|p| p.user_name.eq_ignore_ascii_case(&user.user_name));
            index.map(|i| profiles.remove(i))
        };
        if let Some(profile) = profile {
            self.instance.delete_profile_file(&profile)?;
        }
        info!("删除用户: {}", user.user_name);
        Ok(())
    }

    /// 校验用户名和密码，成功时记录登录时间
    pub fn validate_user(&self, user_name: &str, password: &str) -> RepositoryResult<bool> {
        let Ok(user) = self.existing(user_name) else {
            return Ok(false);
        };
        if !verify_password(password, &user.password_salt, &user.password_hash) {
            warn!("用户 {} 登录失败", user.user_name);
            return Ok(false);
        }
        {
            let mut users = self.instance.users.write();
            if let Some(slot) = users.iter_mut().find(|u| u.user_name == user.user_name) {
                slot.last_login = Some(Utc::now());
            }
        }
        self.instance.persist_users()?;
        Ok(true)
    }

    fn check_roles(&self, roles: &[String]) -> RepositoryResult<()> {
        let existing = self.instance.roles.read();
        for role in roles {
            if !existing.iter().any(|r| r.name.eq_ignore_ascii_case(role)) {
                return Err(RepositoryError::validation(format!("角色不存在: {}", role)));
            }
        }
        Ok(())
    }

    fn check_not_last_administrator(&self, user_name: &str) -> RepositoryResult<()> {
        let roles = self.instance.roles.read();
        let admins = roles
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(ADMINISTRATORS))
            .map(|r| r.users.clone())
            .unwrap_or_default();
        if admins.len() == 1 && admins[0].eq_ignore_ascii_case(user_name) {
            return Err(RepositoryError::forbidden("不能移除最后一个管理员"));
        }
        Ok(())
    }

    /// 替换用户的角色归属
    fn set_roles(&self, user_name: &str, roles: &[String]) -> RepositoryResult<()> {
        {
            let mut all = self.instance.roles.write();
            for role in all.iter_mut() {
                role.users.retain(|u| !u.eq_ignore_ascii_case(user_name));
                if roles.iter().any(|r| r.eq_ignore_ascii_case(&role.name)) {
                    role.users.push(user_name.to_string());
                }
            }
        }
        self.instance.persist_roles()?;
        Ok(())
    }
}

fn check_password(password: &str) -> RepositoryResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(RepositoryError::validation(format!(
            "密码长度至少为 {} 个字符",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// 用户名同时用作档案文件名，不能是路径或空白
fn is_valid_user_name(user_name: &str) -> bool {
    !user_name.is_empty()
        && user_name != "."
        && user_name != ".."
        && !user_name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\' | ':' | '<' | '>'))
}
