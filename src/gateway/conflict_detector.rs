// ==========================================
// 生产计划排程核心 - 冲突检测器 Trait
// ==========================================
// 职责: 重叠判定规则引擎属于外部协作方；
//       本核心只触发“全量重检”并持久化其产出
// ==========================================

use crate::domain::todo::Todo;
use crate::domain::types::{ConflictSeverity, ConflictType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

// ==========================================
// DetectedConflict - 检测器产出
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedConflict {
    pub conflict_type: ConflictType,     // 冲突类型
    pub todo_id: i64,                    // 主节点
    pub related_todo_id: Option<i64>,    // 关联节点
    pub description: String,             // 描述
    pub severity: ConflictSeverity,      // 严重度
}

// ==========================================
// ConflictDetector Trait
// ==========================================
// 实现者: 宿主应用的规则引擎 / 测试 MockConflictDetector
#[async_trait]
pub trait ConflictDetector: Send + Sync {
    /// 对给定节点集合执行全量冲突检测
    ///
    /// # 参数
    /// - todos: 当前待检节点（已排程字段为准）
    ///
    /// # 返回
    /// - Ok(conflicts): 新产出的冲突列表（可为空）
    async fn detect(&self, todos: &[Todo]) -> Result<Vec<DetectedConflict>, Box<dyn Error>>;
}
