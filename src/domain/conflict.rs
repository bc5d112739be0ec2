// ==========================================
// 生产计划排程核心 - 冲突领域模型
// ==========================================
// 生命周期: 由外部冲突检测器在重检时产出；仅人工显式解决
//           （本核心不做自动重解决）
// ==========================================

use crate::domain::types::{ConflictSeverity, ConflictType};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Conflict - 冲突记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub conflict_id: i64,                  // 冲突ID
    pub conflict_type: ConflictType,       // 冲突类型
    pub todo_id: i64,                      // 主节点
    pub related_todo_id: Option<i64>,      // 关联节点 (可空)
    pub description: String,               // 描述
    pub severity: ConflictSeverity,        // 严重度
    pub resolved: bool,                    // 已解决标志 (默认 false)
    pub created_at: NaiveDateTime,         // 产出时间
}
