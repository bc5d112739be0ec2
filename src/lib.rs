// ==========================================
// 生产计划排程核心 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: ERP/CRM 宿主应用内嵌的 PPS 排程核心
//           (ERP 读取/组织层级/冲突判定均为外部协作方)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 外部协作方接口层 - ERP/组织/冲突检测
pub mod gateway;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 数据库基础设施（连接初始化/PRAGMA/schema 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ConflictSeverity, ConflictType, DependencyType, ResourceType, TodoStatus, TodoType,
    VisibilityScope,
};

// 领域实体
pub use domain::{Conflict, ResourceCacheEntry, Todo, TodoDependency, TodoSegment};

// 协作方接口
pub use gateway::{ConflictDetector, DetectedConflict, ErpGateway, OrgDirectory};

// 引擎
pub use engine::{
    DurationEngine, GenerateRequest, GenerationReport, OrderGenerator, RollupEngine,
    VisibilityFilter,
};

// API
pub use api::{ConflictApi, DependencyApi, GanttApi, GenerationApi, TodoApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产计划排程核心";

// ==========================================
// 预编译检查
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
