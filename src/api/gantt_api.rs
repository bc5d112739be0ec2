// ==========================================
// 生产计划排程核心 - 甘特互换 API
// ==========================================
// 职责: 层级树 + 依赖图 ↔ 扁平 task/link 互换格式
// 批量同步协议: 固定处理顺序 (a)删节点 (b)更新 (c)建节点
//               (d)删链接 (e)建链接；单项失败逐个捕获进 errors，
//               一个坏项永不中断批次其余部分
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::todo::Todo;
use crate::domain::types::{DependencyType, ResourceType, TodoType};
use crate::engine::visibility::VisibilityFilter;
use crate::repository::conflict_repo::ConflictRepository;
use crate::repository::dependency_repo::TodoDependencyRepository;
use crate::repository::resource_repo::ResourceCacheRepository;
use crate::repository::todo_repo::{TodoFilter, TodoRepository};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 甘特互换的时间文本格式（导出固定使用）
const GANTT_DATETIME_FMT: &str = "%Y-%m-%d %H:%M";

/// 导入时宽容接受的时间文本格式（至少覆盖 年-月-日 与 日.月.年 两种次序）
const GANTT_PARSE_FMTS: [&str; 6] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// 导入时宽容接受的纯日期格式（补 00:00）
const GANTT_PARSE_DATE_FMTS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d-%m-%Y"];

// ==========================================
// 导出 DTO
// ==========================================

/// 甘特任务记录（一个 todo 一条）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttTask {
    pub id: i64,
    pub text: String,                        // 显示标题
    pub start_date: Option<String>,          // "YYYY-MM-DD HH:MM" (未排程为空)
    pub duration: i64,                       // 工时(分钟)
    pub parent: i64,                         // 父节点 (根为 0)
    #[serde(rename = "type")]
    pub task_type: String,                   // 容器 → "project", 其余 → "task"
    pub progress: f64,                       // 仅由状态导出 (1.0/0.5/0.0)
    pub resource_id: Option<i64>,            // 首选指派 (机台 > 员工 > 部门)
    pub resource_name: Option<String>,       // 指派名称
    pub has_conflicts: bool,                 // 存在未解决冲突
    pub priority: i64,                       // 优先级
    pub delivery_date: Option<String>,       // 交付日期 "YYYY-MM-DD"
}

/// 甘特链接记录（一条生效依赖边一条；两端都在导出集内）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttLink {
    pub id: i64,
    pub source: i64,
    pub target: i64,
    #[serde(rename = "type")]
    pub link_type: String,                   // dhtmlx 编码: 0=FS 1=SS 2=FF 3=SF
    pub lag: i64,                            // 间隔(分钟)
}

/// 甘特导出响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttDataResponse {
    pub data: Vec<GanttTask>,
    pub links: Vec<GanttLink>,
}

// ==========================================
// 批量同步 DTO
// ==========================================

/// 更新项（按真实ID，缺省字段不变）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GanttTaskUpdate {
    pub id: i64,
    pub version: Option<i64>,                // 客户端最后观察到的版本
    pub text: Option<String>,
    pub start_date: Option<String>,          // 宽容解析; 解析失败仅跳过该字段
    pub duration: Option<i64>,
    pub parent: Option<i64>,
    pub resource_id: Option<i64>,            // 经资源镜像判定落到哪个指派字段
    pub priority: Option<i64>,
}

/// 创建项（临时客户端ID）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttTaskCreate {
    pub id: String,                          // 临时ID (映射关系在响应中返回)
    pub text: String,
    pub todo_type: Option<TodoType>,         // 缺省 TASK
    pub start_date: Option<String>,
    pub duration: Option<i64>,
    pub parent: Option<String>,              // 真实ID 或 同批次临时ID
    pub resource_id: Option<i64>,
    pub creator_employee_id: Option<i64>,    // EIGENE 创建时必填
    pub priority: Option<i64>,
}

/// 链接创建项（端点可为真实ID或同批次临时ID）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttLinkCreate {
    pub id: Option<String>,                  // 临时ID (可选)
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub link_type: Option<String>,
    pub lag: Option<i64>,
}

/// 批量同步请求（四张清单 + 链接删除）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GanttSyncRequest {
    #[serde(default)]
    pub deleted_task_ids: Vec<i64>,
    #[serde(default)]
    pub updated_tasks: Vec<GanttTaskUpdate>,
    #[serde(default)]
    pub created_tasks: Vec<GanttTaskCreate>,
    #[serde(default)]
    pub deleted_link_ids: Vec<i64>,
    #[serde(default)]
    pub created_links: Vec<GanttLinkCreate>,
}

/// 单项失败记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttSyncError {
    pub scope: String,                       // task_delete/task_update/task_create/link_delete/link_create
    pub id: String,                          // 项目ID (真实或临时)
    pub reason: String,                      // 失败原因
}

/// 批量同步响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttSyncResponse {
    pub success: bool,                       // 只要有任一项生效即为 true（空批次亦真）
    pub updated_count: usize,                // 更新的节点数
    pub created_count: usize,                // 新建的节点数 + 链接数
    pub deleted_count: usize,                // 删除的节点数 + 链接数
    pub errors: Vec<GanttSyncError>,
    pub created_task_ids: HashMap<String, i64>, // 临时ID → 真实ID
    pub created_link_ids: HashMap<String, i64>,
}

// ==========================================
// GanttApi
// ==========================================
pub struct GanttApi {
    todo_repo: Arc<TodoRepository>,
    dependency_repo: Arc<TodoDependencyRepository>,
    resource_repo: Arc<ResourceCacheRepository>,
    conflict_repo: Arc<ConflictRepository>,
    visibility: Arc<VisibilityFilter>,
}

impl GanttApi {
    /// 创建新的GanttApi实例
    pub fn new(
        todo_repo: Arc<TodoRepository>,
        dependency_repo: Arc<TodoDependencyRepository>,
        resource_repo: Arc<ResourceCacheRepository>,
        conflict_repo: Arc<ConflictRepository>,
        visibility: Arc<VisibilityFilter>,
    ) -> Self {
        Self {
            todo_repo,
            dependency_repo,
            resource_repo,
            conflict_repo,
            visibility,
        }
    }

    // ==========================================
    // 导出 (GET /gantt/data)
    // ==========================================

    /// 导出过滤后的节点集为 task/link 互换格式
    ///
    /// # 规则
    /// - 资源过滤的导出额外补入命中节点的父与祖父容器，
    ///   避免被过滤的工序在图上“悬空”
    /// - 链接仅导出两端都在任务集内的生效边
    pub async fn export(
        &self,
        filter: &TodoFilter,
        caller_erp_id: Option<i64>,
    ) -> ApiResult<GanttDataResponse> {
        let scope = self.visibility.resolve(caller_erp_id).await?;

        // 导出不分页
        let mut export_filter = filter.clone();
        export_filter.skip = 0;
        export_filter.limit = None;

        let (_, mut todos) = self.todo_repo.list(&export_filter, &scope)?;

        // 资源过滤: 补入父与祖父容器
        if filter.resource_id.is_some() {
            let mut present: HashSet<i64> = todos.iter().map(|t| t.todo_id).collect();
            let direct: Vec<Todo> = todos.clone();
            for todo in &direct {
                let mut cursor = todo.parent_todo_id;
                // 父 + 祖父 (两层)
                for _ in 0..2 {
                    let parent_id = match cursor {
                        Some(id) => id,
                        None => break,
                    };
                    if present.contains(&parent_id) {
                        break;
                    }
                    match self.todo_repo.find_by_id(parent_id)? {
                        Some(parent) => {
                            cursor = parent.parent_todo_id;
                            present.insert(parent_id);
                            todos.push(parent);
                        }
                        None => break,
                    }
                }
            }
        }

        todos.sort_by_key(|t| t.todo_id);
        let ids: Vec<i64> = todos.iter().map(|t| t.todo_id).collect();
        let conflict_counts = self.conflict_repo.count_open_for_todos(&ids)?;

        // 任务映射
        let mut data = Vec::with_capacity(todos.len());
        for todo in &todos {
            let resource_id = todo.preferred_resource_id();
            let resource_name = match resource_id {
                Some(id) => self.resource_repo.find_by_id(id)?.map(|r| r.name),
                None => None,
            };
            data.push(GanttTask {
                id: todo.todo_id,
                text: todo.title.clone(),
                start_date: todo
                    .planned_start
                    .map(|t| t.format(GANTT_DATETIME_FMT).to_string()),
                duration: todo.total_duration_minutes.unwrap_or(0),
                parent: todo.parent_todo_id.unwrap_or(0),
                task_type: todo.todo_type.gantt_type().to_string(),
                progress: todo.status.gantt_progress(),
                resource_id,
                resource_name,
                has_conflicts: conflict_counts.get(&todo.todo_id).copied().unwrap_or(0) > 0,
                priority: todo.priority,
                delivery_date: todo.delivery_date.map(|d| d.format("%Y-%m-%d").to_string()),
            });
        }

        // 链接: 两端都在任务集内的生效边
        let links = self
            .dependency_repo
            .find_active_within(&ids)?
            .into_iter()
            .map(|dep| GanttLink {
                id: dep.dependency_id,
                source: dep.predecessor_id,
                target: dep.successor_id,
                link_type: dep.dependency_type.gantt_code().to_string(),
                lag: dep.lag_minutes,
            })
            .collect();

        Ok(GanttDataResponse { data, links })
    }

    // ==========================================
    // 批量同步 (POST /gantt/sync)
    // ==========================================

    /// 应用一次批量同步（固定顺序 (a)-(e)，单项失败不阻断批次）
    pub fn sync(&self, request: &GanttSyncRequest) -> ApiResult<GanttSyncResponse> {
        let mut response = GanttSyncResponse {
            success: false,
            updated_count: 0,
            created_count: 0,
            deleted_count: 0,
            errors: Vec::new(),
            created_task_ids: HashMap::new(),
            created_link_ids: HashMap::new(),
        };

        // (a) 删除节点
        for todo_id in &request.deleted_task_ids {
            match self.todo_repo.delete(*todo_id) {
                Ok(()) => response.deleted_count += 1,
                Err(e) => response.errors.push(GanttSyncError {
                    scope: "task_delete".to_string(),
                    id: todo_id.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        // (b) 更新节点
        for update in &request.updated_tasks {
            match self.apply_task_update(update) {
                Ok(()) => response.updated_count += 1,
                Err(e) => response.errors.push(GanttSyncError {
                    scope: "task_update".to_string(),
                    id: update.id.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        // (c) 新建节点（记录 临时ID → 真实ID 映射）
        for create in &request.created_tasks {
            match self.apply_task_create(create, &response.created_task_ids) {
                Ok(todo_id) => {
                    response
                        .created_task_ids
                        .insert(create.id.clone(), todo_id);
                    response.created_count += 1;
                }
                Err(e) => response.errors.push(GanttSyncError {
                    scope: "task_create".to_string(),
                    id: create.id.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        // (d) 删除链接
        for link_id in &request.deleted_link_ids {
            match self.dependency_repo.delete(*link_id) {
                Ok(()) => response.deleted_count += 1,
                Err(e) => response.errors.push(GanttSyncError {
                    scope: "link_delete".to_string(),
                    id: link_id.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        // (e) 新建链接（端点经 (c) 的映射解析临时ID）
        for link in &request.created_links {
            match self.apply_link_create(link, &response.created_task_ids) {
                Ok(dependency_id) => {
                    if let Some(temp_id) = &link.id {
                        response
                            .created_link_ids
                            .insert(temp_id.clone(), dependency_id);
                    }
                    response.created_count += 1;
                }
                Err(e) => response.errors.push(GanttSyncError {
                    scope: "link_create".to_string(),
                    id: link.id.clone().unwrap_or_else(|| {
                        format!("{}->{}", link.source, link.target)
                    }),
                    reason: e.to_string(),
                }),
            }
        }

        let attempted = request.deleted_task_ids.len()
            + request.updated_tasks.len()
            + request.created_tasks.len()
            + request.deleted_link_ids.len()
            + request.created_links.len();
        let applied =
            response.updated_count + response.created_count + response.deleted_count;
        response.success = attempted == 0 || applied > 0;

        tracing::info!(
            attempted,
            applied,
            errors = response.errors.len(),
            "甘特批量同步完成"
        );
        Ok(response)
    }

    /// 单个更新项: 宽容解析 → 资源判定 → 乐观锁更新
    ///
    /// # 契约
    /// - 被处理的更新项总是递增 version，即使未提供任何可变字段
    ///   （已知的往返非幂等，作为契约固定）
    fn apply_task_update(&self, update: &GanttTaskUpdate) -> ApiResult<()> {
        // 开始时间宽容解析（解析失败仅跳过该字段，不致整项失败）
        let parsed_start = match &update.start_date {
            Some(raw) => {
                let parsed = parse_gantt_datetime(raw);
                if parsed.is_none() {
                    tracing::warn!(todo_id = update.id, %raw, "开始时间无法解析，字段跳过");
                }
                parsed
            }
            None => None,
        };

        // 资源判定: 经镜像决定落到 部门/机台/员工 哪个字段
        let resolved_resource = match update.resource_id {
            Some(resource_id) => match self.resource_repo.find_by_id(resource_id)? {
                Some(entry) => Some((entry.resource_type, resource_id)),
                None => {
                    tracing::warn!(
                        todo_id = update.id,
                        resource_id,
                        "资源镜像中不存在，字段跳过"
                    );
                    None
                }
            },
            None => None,
        };

        let now = Utc::now().naive_utc();
        let update = update.clone();
        self.todo_repo
            .apply_if_version_matches(update.id, update.version, now, move |todo| {
                let mut schedule_changed = false;

                if let Some(text) = update.text {
                    todo.title = text;
                }
                if let Some(start) = parsed_start {
                    todo.planned_start = Some(start);
                    schedule_changed = true;
                }
                if let Some(duration) = update.duration {
                    todo.total_duration_minutes = Some(duration);
                    schedule_changed = true;
                }
                if let Some(parent) = update.parent {
                    // 甘特约定 parent=0 表示根
                    todo.parent_todo_id = if parent == 0 { None } else { Some(parent) };
                }
                if let Some((resource_type, resource_id)) = resolved_resource {
                    // 命中字段设置，另两个清空（重新指派语义）
                    todo.department_resource_id = None;
                    todo.machine_resource_id = None;
                    todo.employee_resource_id = None;
                    match resource_type {
                        ResourceType::Department => {
                            todo.department_resource_id = Some(resource_id)
                        }
                        ResourceType::Machine => todo.machine_resource_id = Some(resource_id),
                        ResourceType::Employee => todo.employee_resource_id = Some(resource_id),
                    }
                }
                if let Some(priority) = update.priority {
                    todo.priority = priority;
                }

                // 开始或工时出现在更新中 → planned_end 重算
                if schedule_changed {
                    todo.recompute_planned_end();
                }
            })?;
        Ok(())
    }

    /// 单个创建项: 生成真实ID（父引用可为同批次临时ID）
    fn apply_task_create(
        &self,
        create: &GanttTaskCreate,
        temp_map: &HashMap<String, i64>,
    ) -> ApiResult<i64> {
        if create.text.trim().is_empty() {
            return Err(ApiError::InvalidInput("标题不能为空".to_string()));
        }

        let todo_type = create.todo_type.unwrap_or(TodoType::Task);
        if todo_type == TodoType::Eigene && create.creator_employee_id.is_none() {
            return Err(ApiError::InvalidInput(
                "EIGENE 节点必须携带 creator_employee_id".to_string(),
            ));
        }

        // 父引用解析: 真实ID 或 同批次临时ID（"0"/缺省 = 根）
        let parent_todo_id = match &create.parent {
            Some(raw) if raw != "0" => {
                let resolved = resolve_endpoint(raw, temp_map).ok_or_else(|| {
                    ApiError::InvalidInput(format!("父节点引用无法解析: {}", raw))
                })?;
                if self.todo_repo.find_by_id(resolved)?.is_none() {
                    return Err(ApiError::NotFound(format!("父节点(id={})不存在", resolved)));
                }
                Some(resolved)
            }
            _ => None,
        };

        let now = Utc::now().naive_utc();
        let mut todo = crate::domain::todo::Todo::new(todo_type, create.text.clone(), now);
        todo.parent_todo_id = parent_todo_id;
        todo.planned_start = create.start_date.as_deref().and_then(parse_gantt_datetime);
        todo.total_duration_minutes = create.duration;
        todo.creator_employee_id = create.creator_employee_id;
        todo.priority = create.priority.unwrap_or(0);
        todo.recompute_planned_end();

        if let Some(resource_id) = create.resource_id {
            if let Some(entry) = self.resource_repo.find_by_id(resource_id)? {
                match entry.resource_type {
                    ResourceType::Department => todo.department_resource_id = Some(resource_id),
                    ResourceType::Machine => todo.machine_resource_id = Some(resource_id),
                    ResourceType::Employee => todo.employee_resource_id = Some(resource_id),
                }
            }
        }

        Ok(self.todo_repo.insert(&todo)?)
    }

    /// 单个链接创建项: 端点可为真实ID或同批次临时ID
    fn apply_link_create(
        &self,
        link: &GanttLinkCreate,
        temp_map: &HashMap<String, i64>,
    ) -> ApiResult<i64> {
        let source = resolve_endpoint(&link.source, temp_map).ok_or_else(|| {
            ApiError::InvalidInput(format!("链接源引用无法解析: {}", link.source))
        })?;
        let target = resolve_endpoint(&link.target, temp_map).ok_or_else(|| {
            ApiError::InvalidInput(format!("链接目标引用无法解析: {}", link.target))
        })?;

        // 端点存在性校验（不存在 → 该项失败，批次继续）
        if self.todo_repo.find_by_id(source)?.is_none() {
            return Err(ApiError::NotFound(format!("Todo(id={})不存在", source)));
        }
        if self.todo_repo.find_by_id(target)?.is_none() {
            return Err(ApiError::NotFound(format!("Todo(id={})不存在", target)));
        }

        let dependency_type = link
            .link_type
            .as_deref()
            .map(DependencyType::from_str)
            .unwrap_or(DependencyType::FinishToStart);

        let (dependency_id, _created) = self.dependency_repo.create_if_absent(
            source,
            target,
            dependency_type,
            link.lag.unwrap_or(0),
        )?;
        Ok(dependency_id)
    }
}

/// 宽容解析甘特时间文本（至少覆盖两种日期次序；纯日期补 00:00）
fn parse_gantt_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for fmt in GANTT_PARSE_FMTS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed);
        }
    }
    for fmt in GANTT_PARSE_DATE_FMTS {
        if let Ok(parsed) = chrono::NaiveDate::parse_from_str(trimmed, fmt) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// 解析链接/父节点端点: 同批次临时ID优先，否则按真实ID解析
fn resolve_endpoint(raw: &str, temp_map: &HashMap<String, i64>) -> Option<i64> {
    if let Some(real_id) = temp_map.get(raw) {
        return Some(*real_id);
    }
    raw.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gantt_datetime_orderings() {
        // 年-月-日
        let a = parse_gantt_datetime("2026-03-05 08:30").unwrap();
        // 日.月.年
        let b = parse_gantt_datetime("05.03.2026 08:30").unwrap();
        assert_eq!(a, b);

        // 纯日期补 00:00
        let c = parse_gantt_datetime("2026-03-05").unwrap();
        assert_eq!(c.time(), chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());

        // 不可解析
        assert!(parse_gantt_datetime("kein datum").is_none());
    }

    #[test]
    fn test_resolve_endpoint() {
        let mut temp_map = HashMap::new();
        temp_map.insert("temp_1".to_string(), 99);

        assert_eq!(resolve_endpoint("temp_1", &temp_map), Some(99));
        assert_eq!(resolve_endpoint("42", &temp_map), Some(42));
        assert_eq!(resolve_endpoint("unbekannt", &temp_map), None);
    }
}
