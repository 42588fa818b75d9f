use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::models::CustomField;
use crate::security::{Principal, Right};

/// 自定义字段仓储，以（类型, 对象 ID, 键）为主键
pub struct CustomFieldRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

fn same_key(a: &CustomField, b: &CustomField) -> bool {
    a.custom_type == b.custom_type
        && a.object_id.eq_ignore_ascii_case(&b.object_id)
        && a.key.eq_ignore_ascii_case(&b.key)
}

impl<'a> CustomFieldRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    pub fn find(&self, filter: &str) -> RepositoryResult<Vec<CustomField>> {
        self.instance.require(self.principal, Right::ViewPublicPosts)?;
        let fields = self.instance.custom_fields.read().clone();
        let query = ListQuery::all().with_filter(filter);
        Ok(query::apply(fields, &query, "CustomType, ObjectId, Key")?)
    }

    pub fn add(&self, field: &CustomField) -> RepositoryResult<CustomField> {
        self.instance.require(self.principal, Right::AccessAdminPages)?;
        validate(field)?;
        {
            let mut fields = self.instance.custom_fields.write();
            if fields.iter().any(|f| same_key(f, field)) {
                return Err(RepositoryError::conflict(format!(
                    "自定义字段已存在: {}/{}/{}",
                    field.custom_type, field.object_id, field.key
                )));
            }
            fields.push(field.clone());
        }
        self.instance.persist_custom_fields()?;
        Ok(field.clone())
    }

    pub fn update(&self, field: &CustomField) -> RepositoryResult<CustomField> {
        self.instance.require(self.principal, Right::AccessAdminPages)?;
        validate(field)?;
        {
            let mut fields = self.instance.custom_fields.write();
            let slot = fields
                .iter_mut()
                .find(|f| same_key(f, field))
                .ok_or_else(|| RepositoryError::not_found(format!("自定义字段 {}", field.key)))?;
            slot.value = field.value.clone();
            slot.attribute = field.attribute.clone();
        }
        self.instance.persist_custom_fields()?;
        Ok(field.clone())
    }

    pub fn remove(&self, field: &CustomField) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::AccessAdminPages)?;
        {
            let mut fields = self.instance.custom_fields.write();
            let before = fields.len();
            fields.retain(|f| !same_key(f, field));
            if fields.len() == before {
                return Err(RepositoryError::not_found(format!("自定义字段 {}", field.key)));
            }
        }
        self.instance.persist_custom_fields()?;
        Ok(())
    }
}

fn validate(field: &CustomField) -> RepositoryResult<()> {
    if field.key.trim().is_empty() || field.object_id.trim().is_empty() {
        return Err(RepositoryError::validation("自定义字段的对象和键不能为空"));
    }
    Ok(())
}
