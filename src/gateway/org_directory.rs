// ==========================================
// 生产计划排程核心 - 组织层级查询 Trait
// ==========================================
// 职责: 计算员工的组织下属闭包（Eigene 可见性过滤依据）
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// OrgDirectory Trait
// ==========================================
// 实现者: 宿主应用的组织目录适配器 / 测试 MockOrgDirectory
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    /// 计算员工的下属闭包（直接与间接下属的 ERP 员工ID，不含本人）
    ///
    /// # 返回
    /// - Ok(ids): 下属 ERP 员工ID 列表（可为空）
    async fn subordinate_closure(
        &self,
        employee_erp_id: i64,
    ) -> Result<Vec<i64>, Box<dyn Error>>;
}
