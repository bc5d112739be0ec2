// ==========================================
// 生产计划排程核心 - 冲突 API
// ==========================================
// 职责: 冲突的 查询/全量重检/人工解决 业务接口
// 重检语义: 未解决冲突整体替换为检测器新产出；已解决的行保留为历史
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::conflict::Conflict;
use crate::gateway::conflict_detector::ConflictDetector;
use crate::repository::conflict_repo::ConflictRepository;
use crate::repository::todo_repo::TodoRepository;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 全量重检响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub detected_count: usize, // 本次产出的冲突数
}

// ==========================================
// ConflictApi
// ==========================================
pub struct ConflictApi {
    conflict_repo: Arc<ConflictRepository>,
    todo_repo: Arc<TodoRepository>,
    detector: Arc<dyn ConflictDetector>,
}

impl ConflictApi {
    /// 创建新的ConflictApi实例
    pub fn new(
        conflict_repo: Arc<ConflictRepository>,
        todo_repo: Arc<TodoRepository>,
        detector: Arc<dyn ConflictDetector>,
    ) -> Self {
        Self {
            conflict_repo,
            todo_repo,
            detector,
        }
    }

    /// 冲突列表（可按节点/解决状态过滤）
    pub fn list(
        &self,
        todo_id: Option<i64>,
        resolved: Option<bool>,
    ) -> ApiResult<Vec<Conflict>> {
        Ok(self.conflict_repo.list(todo_id, resolved)?)
    }

    /// 触发外部检测器全量重检（POST /conflicts/check）
    ///
    /// # 协议
    /// 1. 加载全部节点交给外部检测器
    /// 2. 未解决冲突整体替换为新产出（原子）
    /// 3. 已解决冲突不动（无自动重解决）
    pub async fn check(&self) -> ApiResult<ConflictCheckResponse> {
        let todos = self.todo_repo.list_all()?;

        let detected = self
            .detector
            .detect(&todos)
            .await
            .map_err(|e| ApiError::UpstreamError(e.to_string()))?;

        let now = Utc::now().naive_utc();
        let count = self.conflict_repo.replace_unresolved(&detected, now)?;

        tracing::info!(todos = todos.len(), conflicts = count, "冲突全量重检完成");
        Ok(ConflictCheckResponse {
            detected_count: count,
        })
    }

    /// 人工解决冲突（PATCH /conflicts/{id}/resolve）
    pub fn resolve(&self, conflict_id: i64) -> ApiResult<Conflict> {
        Ok(self.conflict_repo.resolve(conflict_id)?)
    }
}
