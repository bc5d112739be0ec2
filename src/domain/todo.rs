// ==========================================
// 生产计划排程核心 - Todo 领域模型
// ==========================================
// 层级: 订单容器 → 物料容器 → 工序叶子 (+ 扁平 Eigene 个人待办)
// 不变式:
// - planned_start 与 total_duration_minutes 同时存在时
//   planned_end = planned_start + total_duration_minutes
// - 容器工时 = 直接与间接子节点工时之和（除非 is_duration_manual）
// - version 严格递增；期望版本不匹配的写入必须被拒绝
// ==========================================

use crate::domain::types::{TodoStatus, TodoType};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Todo - 排程节点
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub todo_id: i64,                          // 节点ID
    pub parent_todo_id: Option<i64>,           // 父节点 (None = 根/订单容器)
    pub todo_type: TodoType,                   // 节点类型
    pub title: String,                         // 显示标题

    // ===== ERP 关联（仅用于再生成幂等匹配，读取时不做在线查询） =====
    pub erp_order_id: Option<i64>,             // ERP 订单
    pub erp_article_id: Option<i64>,           // ERP 订单物料
    pub erp_workplan_item_id: Option<i64>,     // ERP 工艺路线步骤

    // ===== 排程字段 =====
    pub planned_start: Option<NaiveDateTime>,  // 计划开始
    pub planned_end: Option<NaiveDateTime>,    // 计划结束
    pub actual_start: Option<NaiveDateTime>,   // 实际开始
    pub actual_end: Option<NaiveDateTime>,     // 实际结束
    pub status: TodoStatus,                    // 状态
    pub block_reason: Option<String>,          // 阻塞原因

    // ===== 工时字段 =====
    pub setup_time_minutes: f64,               // 准备工时(分钟)
    pub run_time_minutes: f64,                 // 单件工时(分钟)
    pub quantity: f64,                         // 数量
    pub total_duration_minutes: Option<i64>,   // 总工时(分钟, 15分钟槽)
    pub is_duration_manual: bool,              // 人工覆盖标志 (true 时引擎不回写)

    // ===== 指派字段（语义上至多一个生效） =====
    pub department_resource_id: Option<i64>,   // 部门
    pub machine_resource_id: Option<i64>,      // 机台
    pub employee_resource_id: Option<i64>,     // 员工

    // ===== 归属与元数据 =====
    pub creator_employee_id: Option<i64>,      // 创建人 (resource_cache ID, Eigene 可见性依据)
    pub priority: i64,                         // 优先级
    pub delivery_date: Option<NaiveDate>,      // 交付日期
    pub customer_name: Option<String>,         // 客户 (订单容器冗余)
    pub sort_order: i64,                       // 兄弟间排序 (工艺路线位置)

    // ===== 并发控制 =====
    pub version: i64,                          // 乐观锁版本号 (从1开始)
    pub created_at: NaiveDateTime,             // 创建时间
    pub updated_at: NaiveDateTime,             // 更新时间
}

impl Todo {
    /// 构造一个空白节点（版本号从 1 开始）
    pub fn new(todo_type: TodoType, title: impl Into<String>, now: NaiveDateTime) -> Self {
        Todo {
            todo_id: 0,
            parent_todo_id: None,
            todo_type,
            title: title.into(),
            erp_order_id: None,
            erp_article_id: None,
            erp_workplan_item_id: None,
            planned_start: None,
            planned_end: None,
            actual_start: None,
            actual_end: None,
            status: TodoStatus::New,
            block_reason: None,
            setup_time_minutes: 0.0,
            run_time_minutes: 0.0,
            quantity: 0.0,
            total_duration_minutes: None,
            is_duration_manual: false,
            department_resource_id: None,
            machine_resource_id: None,
            employee_resource_id: None,
            creator_employee_id: None,
            priority: 0,
            delivery_date: None,
            customer_name: None,
            sort_order: 0,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// 是否为容器节点
    pub fn is_container(&self) -> bool {
        self.todo_type.is_container()
    }

    /// 依据 planned_start 与工时重算 planned_end
    ///
    /// 不变式: 两者都存在时 planned_end = planned_start + duration
    pub fn recompute_planned_end(&mut self) {
        if let (Some(start), Some(minutes)) = (self.planned_start, self.total_duration_minutes) {
            self.planned_end = Some(start + Duration::minutes(minutes));
        }
    }

    /// 首选指派资源（机台 > 员工 > 部门）
    pub fn preferred_resource_id(&self) -> Option<i64> {
        self.machine_resource_id
            .or(self.employee_resource_id)
            .or(self.department_resource_id)
    }
}

// ==========================================
// TodoSegment - 执行分段
// ==========================================
// 用途: 一个 todo 跨时间/跨资源拆分执行
// 不变式: 同一 todo 的分段在其自身排程内不重叠（不做全局校验）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoSegment {
    pub segment_id: i64,                      // 分段ID
    pub todo_id: i64,                         // 所属节点
    pub segment_index: i64,                   // 顺序号 (0 起)
    pub start_time: NaiveDateTime,            // 分段开始
    pub end_time: NaiveDateTime,              // 分段结束
    pub machine_resource_id: Option<i64>,     // 机台覆盖
    pub employee_resource_id: Option<i64>,    // 员工覆盖
}

impl TodoSegment {
    /// 分段时长（分钟）
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}
