use std::collections::BTreeSet;

use tracing::info;

use crate::core::dto::RoleItem;
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::models::Role;
use crate::security::{is_system_role, Principal, Right, ADMINISTRATORS};

/// 角色与权限仓储
pub struct RolesRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> RolesRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<RoleItem>> {
        self.instance.require(self.principal, Right::ViewRoles)?;
        let roles: Vec<Role> = self.instance.roles.read().clone();
        let roles = query::apply(roles, query, "Name")?;
        Ok(roles.iter().map(to_item).collect())
    }

    pub fn find_by_id(&self, name: &str) -> RepositoryResult<RoleItem> {
        self.instance.require(self.principal, Right::ViewRoles)?;
        self.instance
            .roles
            .read()
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .map(to_item)
            .ok_or_else(|| RepositoryError::not_found(format!("角色 {}", name)))
    }

    pub fn add(&self, name: &str) -> RepositoryResult<RoleItem> {
        self.instance.require(self.principal, Right::CreateNewRoles)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RepositoryError::validation("角色名不能为空"));
        }
        let role = {
            let mut roles = self.instance.roles.write();
            if roles.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
                return Err(RepositoryError::conflict(format!("角色已存在: {}", name)));
            }
            let role = Role::new(name);
            roles.push(role.clone());
            role
        };
        self.instance.persist_roles()?;
        info!("新增角色: {}", name);
        Ok(to_item(&role))
    }

    /// 删除角色，系统角色不可删除
    pub fn remove(&self, name: &str) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::DeleteRoles)?;
        if is_system_role(name) {
            return Err(RepositoryError::forbidden(format!("系统角色不可删除: {}", name)));
        }
        {
            let mut roles = self.instance.roles.write();
            let index = roles
                .iter()
                .position(|r| r.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| RepositoryError::not_found(format!("角色 {}", name)))?;
            roles.remove(index);
        }
        self.instance.rights.write().remove_role(name);
        self.instance.persist_roles()?;
        self.instance.persist_rights()?;
        info!("删除角色: {}", name);
        Ok(())
    }

    /// 角色拥有的权限
    pub fn get_rights(&self, name: &str) -> RepositoryResult<BTreeSet<Right>> {
        self.instance.require(self.principal, Right::ViewRoles)?;
        self.ensure_exists(name)?;
        Ok(self.instance.rights.read().rights_for_role(name))
    }

    /// 替换角色的权限；管理员角色保持全部权限
    pub fn set_rights(&self, name: &str, rights: &BTreeSet<Right>) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::EditRoles)?;
        self.ensure_exists(name)?;
        if name.eq_ignore_ascii_case(ADMINISTRATORS) {
            return Ok(());
        }
        self.instance.rights.write().set_role_rights(name, rights);
        self.instance.persist_rights()?;
        info!("角色 {} 的权限已更新（{} 项）", name, rights.len());
        Ok(())
    }

    fn ensure_exists(&self, name: &str) -> RepositoryResult<()> {
        if self
            .instance
            .roles
            .read()
            .iter()
            .any(|r| r.name.eq_ignore_ascii_case(name))
        {
            Ok(())
        } else {
            Err(RepositoryError::not_found(format!("角色 {}", name)))
        }
    }
}

fn to_item(role: &Role) -> RoleItem {
    RoleItem {
        name: role.name.clone(),
        is_system: is_system_role(&role.name),
        users: role.users.clone(),
    }
}
