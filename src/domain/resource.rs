// ==========================================
// 生产计划排程核心 - 资源镜像领域模型
// ==========================================
// 用途: ERP 侧 机台/员工/部门 的本地镜像
//       排程只引用稳定的本地 resource_id，不依赖 ERP 在线查询
// ==========================================

use crate::domain::types::ResourceType;
use serde::{Deserialize, Serialize};

// ==========================================
// ResourceCacheEntry - 资源镜像条目
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCacheEntry {
    pub resource_id: i64,            // 本地ID (排程侧引用键)
    pub resource_type: ResourceType, // 资源类型
    pub erp_id: i64,                 // ERP 源键
    pub name: String,                // 显示名称
    pub is_active: bool,             // 是否有效
}
