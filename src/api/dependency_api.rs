// ==========================================
// 生产计划排程核心 - 依赖边 API
// ==========================================
// 职责: 依赖边的 查询/创建/删除 业务接口
// 唯一性: 同序对重复创建复用既有边
// 已知开放问题: 创建时不做环检测（由测试固定该行为）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::dependency::TodoDependency;
use crate::domain::types::DependencyType;
use crate::repository::dependency_repo::TodoDependencyRepository;
use crate::repository::todo_repo::TodoRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// 请求/响应 DTO
// ==========================================

/// 依赖边创建请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDependencyRequest {
    pub predecessor_id: i64,
    pub successor_id: i64,
    pub dependency_type: Option<DependencyType>, // 缺省 FINISH_TO_START
    pub lag_minutes: Option<i64>,                // 缺省 0
}

/// 依赖边创建响应（created=false 表示复用既有边）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDependencyResponse {
    pub dependency: TodoDependency,
    pub created: bool,
}

// ==========================================
// DependencyApi
// ==========================================
pub struct DependencyApi {
    dependency_repo: Arc<TodoDependencyRepository>,
    todo_repo: Arc<TodoRepository>,
}

impl DependencyApi {
    /// 创建新的DependencyApi实例
    pub fn new(
        dependency_repo: Arc<TodoDependencyRepository>,
        todo_repo: Arc<TodoRepository>,
    ) -> Self {
        Self {
            dependency_repo,
            todo_repo,
        }
    }

    /// 依赖边列表（可按节点过滤）
    pub fn list(&self, todo_id: Option<i64>) -> ApiResult<Vec<TodoDependency>> {
        match todo_id {
            Some(id) => Ok(self.dependency_repo.find_for_todo(id)?),
            None => Ok(self.dependency_repo.list_all()?),
        }
    }

    /// 创建依赖边（同序对已存在时复用）
    ///
    /// # 说明
    /// - 端点不存在 → NotFound
    /// - 不做环检测: 当前没有全图拓扑排程消费方，环是否应拒绝仍属开放问题
    pub fn create(&self, request: &CreateDependencyRequest) -> ApiResult<CreateDependencyResponse> {
        // 端点存在性校验
        if self.todo_repo.find_by_id(request.predecessor_id)?.is_none() {
            return Err(ApiError::NotFound(format!(
                "Todo(id={})不存在",
                request.predecessor_id
            )));
        }
        if self.todo_repo.find_by_id(request.successor_id)?.is_none() {
            return Err(ApiError::NotFound(format!(
                "Todo(id={})不存在",
                request.successor_id
            )));
        }

        let (dependency_id, created) = self.dependency_repo.create_if_absent(
            request.predecessor_id,
            request.successor_id,
            request.dependency_type.unwrap_or(DependencyType::FinishToStart),
            request.lag_minutes.unwrap_or(0),
        )?;

        let dependency = self
            .dependency_repo
            .find_by_id(dependency_id)?
            .ok_or_else(|| {
                ApiError::InternalError(format!("依赖边 {} 创建后读取失败", dependency_id))
            })?;

        Ok(CreateDependencyResponse {
            dependency,
            created,
        })
    }

    /// 删除依赖边
    pub fn delete(&self, dependency_id: i64) -> ApiResult<()> {
        self.dependency_repo.delete(dependency_id)?;
        Ok(())
    }
}
