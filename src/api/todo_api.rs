// ==========================================
// 生产计划排程核心 - Todo API
// ==========================================
// 职责: 节点的 查询/创建/更新/删除/拆分 业务接口
// 并发协议: 更新必须携带客户端最后观察到的 version；
//           不匹配 → 拒绝并返回双方版本号（不产生任何变更）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::todo::{Todo, TodoSegment};
use crate::domain::types::{TodoStatus, TodoType};
use crate::engine::duration::DurationEngine;
use crate::engine::rollup::RollupEngine;
use crate::engine::visibility::VisibilityFilter;
use crate::repository::conflict_repo::ConflictRepository;
use crate::repository::segment_repo::{NewSegment, TodoSegmentRepository};
use crate::repository::todo_repo::{TodoFilter, TodoRepository};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// 请求/响应 DTO
// ==========================================

/// 节点创建请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    pub todo_type: TodoType,
    pub parent_todo_id: Option<i64>,
    pub planned_start: Option<NaiveDateTime>,
    pub setup_time_minutes: Option<f64>,
    pub run_time_minutes: Option<f64>,
    pub quantity: Option<f64>,
    pub total_duration_minutes: Option<i64>,
    pub is_duration_manual: Option<bool>,
    pub department_resource_id: Option<i64>,
    pub machine_resource_id: Option<i64>,
    pub employee_resource_id: Option<i64>,
    pub creator_employee_id: Option<i64>,
    pub priority: Option<i64>,
    pub delivery_date: Option<NaiveDate>,
}

/// 节点更新请求（缺省字段不变；version 为客户端最后观察值）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTodoRequest {
    pub version: Option<i64>,
    pub title: Option<String>,
    pub status: Option<TodoStatus>,
    pub block_reason: Option<String>,
    pub planned_start: Option<NaiveDateTime>,
    pub actual_start: Option<NaiveDateTime>,
    pub actual_end: Option<NaiveDateTime>,
    pub setup_time_minutes: Option<f64>,
    pub run_time_minutes: Option<f64>,
    pub quantity: Option<f64>,
    pub total_duration_minutes: Option<i64>,
    pub is_duration_manual: Option<bool>,
    pub department_resource_id: Option<i64>,
    pub machine_resource_id: Option<i64>,
    pub employee_resource_id: Option<i64>,
    pub priority: Option<i64>,
    pub delivery_date: Option<NaiveDate>,
}

/// 列表条目（节点 + 未解决冲突数）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoListItem {
    #[serde(flatten)]
    pub todo: Todo,
    pub conflict_count: i64,
}

/// 列表响应（总数 + 当前页）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoListResponse {
    pub total: i64,
    pub items: Vec<TodoListItem>,
}

/// 拆分请求的分段载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub machine_resource_id: Option<i64>,
    pub employee_resource_id: Option<i64>,
}

// ==========================================
// TodoApi
// ==========================================
pub struct TodoApi {
    todo_repo: Arc<TodoRepository>,
    segment_repo: Arc<TodoSegmentRepository>,
    conflict_repo: Arc<ConflictRepository>,
    visibility: Arc<VisibilityFilter>,
    rollup_engine: Arc<RollupEngine>,
    duration_engine: DurationEngine,
}

impl TodoApi {
    /// 创建新的TodoApi实例
    pub fn new(
        todo_repo: Arc<TodoRepository>,
        segment_repo: Arc<TodoSegmentRepository>,
        conflict_repo: Arc<ConflictRepository>,
        visibility: Arc<VisibilityFilter>,
        rollup_engine: Arc<RollupEngine>,
    ) -> Self {
        Self {
            todo_repo,
            segment_repo,
            conflict_repo,
            visibility,
            rollup_engine,
            duration_engine: DurationEngine::new(),
        }
    }

    /// 节点列表查询（可见性 + 过滤 + 分页 + 冲突数标注）
    ///
    /// # 参数
    /// - filter: 过滤器（订单/状态/类型/区间/资源/冲突/父节点/全文/分页）
    /// - caller_erp_id: 调用方身份（X-Employee-ERP-ID 头；决定 EIGENE 可见性）
    pub async fn list(
        &self,
        filter: &TodoFilter,
        caller_erp_id: Option<i64>,
    ) -> ApiResult<TodoListResponse> {
        let scope = self.visibility.resolve(caller_erp_id).await?;
        let (total, todos) = self.todo_repo.list(filter, &scope)?;

        let ids: Vec<i64> = todos.iter().map(|t| t.todo_id).collect();
        let counts = self.conflict_repo.count_open_for_todos(&ids)?;

        let items = todos
            .into_iter()
            .map(|todo| {
                let conflict_count = counts.get(&todo.todo_id).copied().unwrap_or(0);
                TodoListItem {
                    todo,
                    conflict_count,
                }
            })
            .collect();
        Ok(TodoListResponse { total, items })
    }

    /// 按ID读取节点
    pub fn get(&self, todo_id: i64) -> ApiResult<Todo> {
        self.todo_repo
            .find_by_id(todo_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Todo(id={})不存在", todo_id)))
    }

    /// 创建节点（用户直接创建，version 从 1 开始）
    pub fn create(&self, request: &CreateTodoRequest) -> ApiResult<Todo> {
        // 参数验证
        if request.title.trim().is_empty() {
            return Err(ApiError::InvalidInput("标题不能为空".to_string()));
        }
        if request.todo_type == TodoType::Eigene && request.creator_employee_id.is_none() {
            return Err(ApiError::InvalidInput(
                "EIGENE 节点必须携带 creator_employee_id".to_string(),
            ));
        }
        // 子节点必须引用已存在的父节点（树由构造保证无环）
        if let Some(parent_id) = request.parent_todo_id {
            if self.todo_repo.find_by_id(parent_id)?.is_none() {
                return Err(ApiError::NotFound(format!(
                    "父节点(id={})不存在",
                    parent_id
                )));
            }
        }

        let now = Utc::now().naive_utc();
        let mut todo = Todo::new(request.todo_type, request.title.clone(), now);
        todo.parent_todo_id = request.parent_todo_id;
        todo.planned_start = request.planned_start;
        todo.setup_time_minutes = request.setup_time_minutes.unwrap_or(0.0);
        todo.run_time_minutes = request.run_time_minutes.unwrap_or(0.0);
        todo.quantity = request.quantity.unwrap_or(0.0);
        todo.total_duration_minutes = request.total_duration_minutes;
        todo.is_duration_manual = request.is_duration_manual.unwrap_or(false);
        todo.department_resource_id = request.department_resource_id;
        todo.machine_resource_id = request.machine_resource_id;
        todo.employee_resource_id = request.employee_resource_id;
        todo.creator_employee_id = request.creator_employee_id;
        todo.priority = request.priority.unwrap_or(0);
        todo.delivery_date = request.delivery_date;

        // 工时未显式给定时由 准备/单件/数量 推导
        if todo.total_duration_minutes.is_none()
            && (todo.setup_time_minutes > 0.0 || todo.run_time_minutes > 0.0)
        {
            todo.total_duration_minutes = Some(self.duration_engine.compute_leaf_duration(
                todo.setup_time_minutes,
                todo.run_time_minutes,
                todo.quantity,
            ));
        }
        todo.recompute_planned_end();

        let todo_id = self.todo_repo.insert(&todo)?;
        self.get(todo_id)
    }

    /// 更新节点（乐观锁协议）
    ///
    /// # 协议
    /// - request.version 给定且与存储版本不一致 → VersionConflict（不产生变更）
    /// - 接受的写入: 应用字段变更 → 重算派生字段 → version + 1 → 刷新时间戳
    ///
    /// # 派生字段
    /// - 准备/单件/数量变化且非人工覆盖 → 工时重算
    /// - 开始或工时变化 → planned_end 重算
    pub fn update(&self, todo_id: i64, request: &UpdateTodoRequest) -> ApiResult<Todo> {
        let now = Utc::now().naive_utc();
        let duration_engine = self.duration_engine;
        let req = request.clone();

        let updated = self
            .todo_repo
            .apply_if_version_matches(todo_id, request.version, now, move |todo| {
                let mut time_fields_changed = false;
                let mut schedule_changed = false;

                if let Some(title) = req.title {
                    todo.title = title;
                }
                if let Some(status) = req.status {
                    todo.status = status;
                }
                if let Some(reason) = req.block_reason {
                    todo.block_reason = Some(reason);
                }
                if let Some(start) = req.planned_start {
                    todo.planned_start = Some(start);
                    schedule_changed = true;
                }
                if let Some(actual_start) = req.actual_start {
                    todo.actual_start = Some(actual_start);
                }
                if let Some(actual_end) = req.actual_end {
                    todo.actual_end = Some(actual_end);
                }
                if let Some(setup) = req.setup_time_minutes {
                    todo.setup_time_minutes = setup;
                    time_fields_changed = true;
                }
                if let Some(run) = req.run_time_minutes {
                    todo.run_time_minutes = run;
                    time_fields_changed = true;
                }
                if let Some(quantity) = req.quantity {
                    todo.quantity = quantity;
                    time_fields_changed = true;
                }
                if let Some(manual) = req.is_duration_manual {
                    todo.is_duration_manual = manual;
                }
                if let Some(minutes) = req.total_duration_minutes {
                    todo.total_duration_minutes = Some(minutes);
                    schedule_changed = true;
                }
                if let Some(id) = req.department_resource_id {
                    todo.department_resource_id = Some(id);
                }
                if let Some(id) = req.machine_resource_id {
                    todo.machine_resource_id = Some(id);
                }
                if let Some(id) = req.employee_resource_id {
                    todo.employee_resource_id = Some(id);
                }
                if let Some(priority) = req.priority {
                    todo.priority = priority;
                }
                if let Some(date) = req.delivery_date {
                    todo.delivery_date = Some(date);
                }

                // 工时重算: 准备/单件/数量变化且非人工覆盖
                if time_fields_changed
                    && !todo.is_duration_manual
                    && req.total_duration_minutes.is_none()
                {
                    todo.total_duration_minutes = Some(duration_engine.compute_leaf_duration(
                        todo.setup_time_minutes,
                        todo.run_time_minutes,
                        todo.quantity,
                    ));
                    schedule_changed = true;
                }

                // planned_end 重算: 开始或工时变化
                if schedule_changed {
                    todo.recompute_planned_end();
                }
            })?;

        Ok(updated)
    }

    /// 删除节点（级联: 子节点/分段/依赖边/冲突）
    pub fn delete(&self, todo_id: i64) -> ApiResult<()> {
        self.todo_repo.delete(todo_id)?;
        tracing::info!(todo_id, "节点已删除（含级联）");
        Ok(())
    }

    /// 原子替换节点的分段集合（POST /todos/{id}/split）
    ///
    /// # 协议
    /// - 分段在该节点自身排程内不得重叠（不做全局校验）
    /// - 旧分段删除与新分段插入在一个事务内完成
    /// - 父节点 planned_start/planned_end 重算为新分段的 min/max
    pub fn split(&self, todo_id: i64, segments: &[SegmentSpec]) -> ApiResult<Vec<TodoSegment>> {
        // 1. 逐段校验时间窗
        for seg in segments {
            if seg.end_time <= seg.start_time {
                return Err(ApiError::InvalidInput(format!(
                    "分段时间窗无效: {} >= {}",
                    seg.start_time, seg.end_time
                )));
            }
        }

        // 2. 节点内不重叠校验（按开始时间排序后检查相邻对）
        let mut sorted: Vec<&SegmentSpec> = segments.iter().collect();
        sorted.sort_by_key(|s| s.start_time);
        for pair in sorted.windows(2) {
            if pair[1].start_time < pair[0].end_time {
                return Err(ApiError::ValidationError(format!(
                    "分段重叠: {} 早于前一分段结束 {}",
                    pair[1].start_time, pair[0].end_time
                )));
            }
        }

        // 3. 原子替换
        let payload: Vec<NewSegment> = sorted
            .iter()
            .map(|s| NewSegment {
                start_time: s.start_time,
                end_time: s.end_time,
                machine_resource_id: s.machine_resource_id,
                employee_resource_id: s.employee_resource_id,
            })
            .collect();
        let now = Utc::now().naive_utc();
        Ok(self.segment_repo.replace_for_todo(todo_id, &payload, now)?)
    }

    /// 读取节点的分段
    pub fn list_segments(&self, todo_id: i64) -> ApiResult<Vec<TodoSegment>> {
        Ok(self.segment_repo.find_by_todo(todo_id)?)
    }

    /// 对容器执行一次工时汇总
    pub fn rollup(&self, container_id: i64) -> ApiResult<i64> {
        let todo = self.get(container_id)?;
        if !todo.is_container() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "节点 {} 不是容器，无法汇总",
                container_id
            )));
        }
        let now = Utc::now().naive_utc();
        Ok(self.rollup_engine.rollup(container_id, now)?)
    }
}
