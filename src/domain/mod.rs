// ==========================================
// 生产计划排程核心 - 领域层
// ==========================================
// 职责: 实体与封闭类型定义，不含持久化细节
// ==========================================

pub mod conflict;
pub mod dependency;
pub mod erp;
pub mod resource;
pub mod todo;
pub mod types;

// 重导出核心实体
pub use conflict::Conflict;
pub use dependency::TodoDependency;
pub use erp::{ErpBomItem, ErpOrderArticle, ErpOrderHead, ErpResourceRow, ErpWorkplanStep};
pub use resource::ResourceCacheEntry;
pub use todo::{Todo, TodoSegment};
pub use types::{
    ConflictSeverity, ConflictType, DependencyType, ResourceType, TodoStatus, TodoType,
    VisibilityScope,
};
