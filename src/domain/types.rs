// ==========================================
// 生产计划排程核心 - 领域类型定义
// ==========================================
// 约束: 所有分支判断点（rollup 递归/甘特类型粗化/串行并行决策）
//       必须基于封闭枚举做穷尽匹配，禁止裸字符串分支
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 节点类型 (Todo Type)
// ==========================================
// CONTAINER_ORDER: 订单容器（根节点）
// TASK:            物料/工序容器（订单下的制品层，含 BOM 行待办）
// OPERATION:       工序叶子（对应一条工艺路线步骤）
// EIGENE:          个人待办（无 ERP 关联，仅组织可见性范围内可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoType {
    ContainerOrder,
    Task,
    Operation,
    Eigene,
}

impl TodoType {
    /// 是否为容器节点（工时由子节点 rollup 得出）
    pub fn is_container(&self) -> bool {
        matches!(self, TodoType::ContainerOrder | TodoType::Task)
    }

    /// 甘特图粗化类型（容器 → project，其余 → task）
    pub fn gantt_type(&self) -> &'static str {
        match self {
            TodoType::ContainerOrder | TodoType::Task => "project",
            TodoType::Operation | TodoType::Eigene => "task",
        }
    }

    /// 从字符串解析节点类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CONTAINER_ORDER" => Some(TodoType::ContainerOrder),
            "TASK" => Some(TodoType::Task),
            "OPERATION" => Some(TodoType::Operation),
            "EIGENE" => Some(TodoType::Eigene),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TodoType::ContainerOrder => "CONTAINER_ORDER",
            TodoType::Task => "TASK",
            TodoType::Operation => "OPERATION",
            TodoType::Eigene => "EIGENE",
        }
    }
}

impl fmt::Display for TodoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 节点状态 (Todo Status)
// ==========================================
// CANCELLED 同时覆盖“取消/阻塞”两种终止语义，阻塞原因见 block_reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoStatus {
    New,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    /// 甘特图进度值（仅由状态导出）
    pub fn gantt_progress(&self) -> f64 {
        match self {
            TodoStatus::Completed => 1.0,
            TodoStatus::InProgress => 0.5,
            TodoStatus::New | TodoStatus::Cancelled => 0.0,
        }
    }

    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NEW" => Some(TodoStatus::New),
            "IN_PROGRESS" => Some(TodoStatus::InProgress),
            "COMPLETED" => Some(TodoStatus::Completed),
            "CANCELLED" => Some(TodoStatus::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TodoStatus::New => "NEW",
            TodoStatus::InProgress => "IN_PROGRESS",
            TodoStatus::Completed => "COMPLETED",
            TodoStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 依赖类型 (Dependency Type)
// ==========================================
// 生成器目前只产出 FINISH_TO_START，其余类型由甘特前端写入时保留
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    /// 从字符串解析依赖类型（未知值回退 FINISH_TO_START）
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "FINISH_TO_START" | "0" => DependencyType::FinishToStart,
            "START_TO_START" | "1" => DependencyType::StartToStart,
            "FINISH_TO_FINISH" | "2" => DependencyType::FinishToFinish,
            "START_TO_FINISH" | "3" => DependencyType::StartToFinish,
            _ => DependencyType::FinishToStart,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FINISH_TO_START",
            DependencyType::StartToStart => "START_TO_START",
            DependencyType::FinishToFinish => "FINISH_TO_FINISH",
            DependencyType::StartToFinish => "START_TO_FINISH",
        }
    }

    /// 甘特互换格式的链接类型编码（dhtmlx 约定: 0=FS 1=SS 2=FF 3=SF）
    pub fn gantt_code(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "0",
            DependencyType::StartToStart => "1",
            DependencyType::FinishToFinish => "2",
            DependencyType::StartToFinish => "3",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 资源类型 (Resource Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Department,
    Machine,
    Employee,
}

impl ResourceType {
    /// 从字符串解析资源类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DEPARTMENT" => Some(ResourceType::Department),
            "MACHINE" => Some(ResourceType::Machine),
            "EMPLOYEE" => Some(ResourceType::Employee),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ResourceType::Department => "DEPARTMENT",
            ResourceType::Machine => "MACHINE",
            ResourceType::Employee => "EMPLOYEE",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 冲突类型 (Conflict Type)
// ==========================================
// 具体判定规则属于外部冲突检测器，本核心只持久化结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    ResourceOverlap,
    DeadlineRisk,
    DependencyViolation,
    Other,
}

impl ConflictType {
    /// 从字符串解析冲突类型（未知值归入 OTHER）
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "RESOURCE_OVERLAP" => ConflictType::ResourceOverlap,
            "DEADLINE_RISK" => ConflictType::DeadlineRisk,
            "DEPENDENCY_VIOLATION" => ConflictType::DependencyViolation,
            _ => ConflictType::Other,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ConflictType::ResourceOverlap => "RESOURCE_OVERLAP",
            ConflictType::DeadlineRisk => "DEADLINE_RISK",
            ConflictType::DependencyViolation => "DEPENDENCY_VIOLATION",
            ConflictType::Other => "OTHER",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 冲突严重度 (Conflict Severity)
// ==========================================
// 顺序: Info < Warning < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSeverity {
    Info,
    Warning,
    Critical,
}

impl ConflictSeverity {
    /// 从字符串解析严重度（未知值按 WARNING 处理）
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "INFO" => ConflictSeverity::Info,
            "WARNING" => ConflictSeverity::Warning,
            "CRITICAL" => ConflictSeverity::Critical,
            _ => ConflictSeverity::Warning,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ConflictSeverity::Info => "INFO",
            ConflictSeverity::Warning => "WARNING",
            ConflictSeverity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 可见性范围 (Visibility Scope)
// ==========================================
// 仅作用于 EIGENE 个人待办；非个人类型永不过滤
// 无调用方身份时不存在“管理员看全部”的旁路
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisibilityScope {
    /// 无调用方身份: 所有 EIGENE 节点从结果集中排除
    ExcludeEigene,
    /// EIGENE 节点限定创建者集合（本人 + 下属闭包，已映射为本地 resource_id）
    EigeneCreators(Vec<i64>),
}

impl VisibilityScope {
    /// 给定创建者是否在可见范围内
    pub fn allows_creator(&self, creator_employee_id: Option<i64>) -> bool {
        match self {
            VisibilityScope::ExcludeEigene => false,
            VisibilityScope::EigeneCreators(ids) => {
                creator_employee_id.map(|id| ids.contains(&id)).unwrap_or(false)
            }
        }
    }
}
