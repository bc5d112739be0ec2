// ==========================================
// 生产计划排程核心 - ERP 读取行类型
// ==========================================
// 用途: ErpGateway 返回的只读行结构
//       本核心只消费解析后的数值ID、名称与时间字段
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// ErpOrderHead - 订单抬头
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpOrderHead {
    pub erp_order_id: i64,                // ERP 订单ID
    pub order_no: String,                 // 订单号
    pub description: String,              // 订单名称
    pub customer_name: Option<String>,    // 客户
    pub delivery_date: Option<NaiveDate>, // 交付日期
    pub priority: i64,                    // 优先级
}

// ==========================================
// ErpOrderArticle - 订单物料行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpOrderArticle {
    pub erp_article_id: i64,              // ERP 订单物料ID
    pub article_no: String,               // 物料号
    pub name: String,                     // 物料名称
    pub quantity: f64,                    // 订单数量
    pub department_erp_id: Option<i64>,   // 负责部门 (ERP ID)
}

// ==========================================
// ErpWorkplanStep - 工艺路线步骤
// ==========================================
// machine_level: 机台层级；生成时仅物化 level ≤ workplan_level 的步骤
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpWorkplanStep {
    pub erp_workplan_item_id: i64,        // ERP 工艺路线步骤ID
    pub position: i64,                    // 步骤顺序 (工艺路线位置)
    pub name: String,                     // 步骤名称
    pub setup_time_minutes: f64,          // 准备工时(分钟)
    pub unit_time_minutes: f64,           // 单件工时(分钟)
    pub machine_erp_id: Option<i64>,      // 机台 (ERP ID)
    pub machine_level: i64,               // 机台层级
}

// ==========================================
// ErpBomItem - BOM 行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpBomItem {
    pub erp_bom_item_id: i64,             // ERP BOM 行ID
    pub name: String,                     // 物料名称
    pub quantity: f64,                    // 需求数量
}

// ==========================================
// ErpResourceRow - 资源主数据行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpResourceRow {
    pub erp_id: i64,                      // ERP 资源ID
    pub name: String,                     // 名称
}
