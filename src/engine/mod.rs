// ==========================================
// 生产计划排程核心 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 通过仓储访问数据; 人工覆盖字段不回写
// ==========================================

pub mod duration;
pub mod generator;
pub mod rollup;
pub mod visibility;

// 重导出核心引擎
pub use duration::DurationEngine;
pub use generator::{GenerateRequest, GenerationError, GenerationReport, OrderGenerator};
pub use rollup::RollupEngine;
pub use visibility::{VisibilityError, VisibilityFilter};
