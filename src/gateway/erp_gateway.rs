// ==========================================
// 生产计划排程核心 - ERP 读取网关 Trait
// ==========================================
// 职责: 订单/物料/工艺路线/BOM/资源主数据的只读查询接口
// 约束: 本核心只消费解析后的行数据；查询失败视为上游协作方失败，
//       生成事务整体回滚（不允许半生成的层级树落库）
// ==========================================

use crate::domain::erp::{
    ErpBomItem, ErpOrderArticle, ErpOrderHead, ErpResourceRow, ErpWorkplanStep,
};
use crate::domain::types::ResourceType;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ErpGateway Trait
// ==========================================
// 实现者: 宿主应用的 ERP 查询适配器 / 测试 MockErpGateway
#[async_trait]
pub trait ErpGateway: Send + Sync {
    /// 读取订单抬头
    ///
    /// # 返回
    /// - Ok(Some(head)): 订单存在
    /// - Ok(None): 订单不存在（生成器转换为用户可见的未找到错误）
    async fn find_order(&self, erp_order_id: i64) -> Result<Option<ErpOrderHead>, Box<dyn Error>>;

    /// 读取订单下的物料行（按 ERP 侧顺序）
    async fn list_order_articles(
        &self,
        erp_order_id: i64,
    ) -> Result<Vec<ErpOrderArticle>, Box<dyn Error>>;

    /// 读取物料挂接 BOM 的工艺路线步骤（含每步准备/单件工时与机台）
    ///
    /// # 说明
    /// - 返回按 position 升序；生成器据此串行排程
    async fn list_workplan_steps(
        &self,
        erp_article_id: i64,
    ) -> Result<Vec<ErpWorkplanStep>, Box<dyn Error>>;

    /// 读取物料下的 BOM 行
    async fn list_bom_items(
        &self,
        erp_article_id: i64,
    ) -> Result<Vec<ErpBomItem>, Box<dyn Error>>;

    /// 解析资源主数据（生成期间解析部门/机台 ERP ID 用）
    async fn find_resource(
        &self,
        resource_type: ResourceType,
        erp_id: i64,
    ) -> Result<Option<ErpResourceRow>, Box<dyn Error>>;
}
