// ==========================================
// 生产计划排程核心 - 可见性过滤引擎
// ==========================================
// 职责: 将调用方身份解析为 EIGENE 可见范围
// 规则: 无身份 → 所有 EIGENE 排除（不存在管理员旁路）；
//       有身份 → 本人 + 组织下属闭包，映射为本地 resource_id
// 非 EIGENE 类型永不经过此过滤
// ==========================================

use crate::domain::types::VisibilityScope;
use crate::gateway::org_directory::OrgDirectory;
use crate::repository::error::RepositoryError;
use crate::repository::resource_repo::ResourceCacheRepository;
use std::sync::Arc;
use thiserror::Error;

/// 可见性解析错误类型
#[derive(Error, Debug)]
pub enum VisibilityError {
    #[error("组织层级查询失败: {0}")]
    OrgLookup(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ==========================================
// VisibilityFilter - EIGENE 可见范围解析
// ==========================================
pub struct VisibilityFilter {
    org: Arc<dyn OrgDirectory>,
    resource_repo: Arc<ResourceCacheRepository>,
}

impl VisibilityFilter {
    /// 创建新的VisibilityFilter实例
    pub fn new(org: Arc<dyn OrgDirectory>, resource_repo: Arc<ResourceCacheRepository>) -> Self {
        Self { org, resource_repo }
    }

    /// 解析调用方身份为可见范围
    ///
    /// # 步骤
    /// 1. 无身份 → ExcludeEigene
    /// 2. 有身份 → 组织下属闭包 + 本人 (ERP 员工ID)
    /// 3. 映射为本地 resource_cache 员工ID（无镜像条目的被跳过）
    pub async fn resolve(
        &self,
        caller_erp_id: Option<i64>,
    ) -> Result<VisibilityScope, VisibilityError> {
        let caller = match caller_erp_id {
            Some(id) => id,
            None => return Ok(VisibilityScope::ExcludeEigene),
        };

        let mut erp_ids = self
            .org
            .subordinate_closure(caller)
            .await
            .map_err(|e| VisibilityError::OrgLookup(e.to_string()))?;
        erp_ids.push(caller);

        let local_ids = self.resource_repo.map_employee_erp_ids(&erp_ids)?;
        tracing::debug!(
            caller,
            closure = erp_ids.len(),
            resolved = local_ids.len(),
            "可见范围解析完成"
        );
        Ok(VisibilityScope::EigeneCreators(local_ids))
    }
}
