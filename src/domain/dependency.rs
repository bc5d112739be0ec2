// ==========================================
// 生产计划排程核心 - 依赖边领域模型
// ==========================================
// 唯一性: 每个有序 (predecessor, successor) 对至多一条边
// 已知开放问题: 创建时不拒绝环（当前没有全图拓扑排程消费方）
// ==========================================

use crate::domain::types::DependencyType;
use serde::{Deserialize, Serialize};

// ==========================================
// TodoDependency - 前驱→后继 依赖边
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoDependency {
    pub dependency_id: i64,                  // 边ID
    pub predecessor_id: i64,                 // 前驱节点
    pub successor_id: i64,                   // 后继节点
    pub dependency_type: DependencyType,     // 依赖类型 (生成器只产出 FS)
    pub lag_minutes: i64,                    // 间隔(分钟)
    pub is_active: bool,                     // 生效标志
}
