// ==========================================
// 生产计划排程核心 - 订单生成 API
// ==========================================
// 职责: POST /generate-todos 的业务入口（薄包装生成引擎）
// ==========================================

use crate::api::error::ApiResult;
use crate::engine::generator::{GenerateRequest, GenerationReport, OrderGenerator};
use chrono::Utc;
use std::sync::Arc;

// ==========================================
// GenerationApi
// ==========================================
pub struct GenerationApi {
    generator: Arc<OrderGenerator>,
}

impl GenerationApi {
    /// 创建新的GenerationApi实例
    pub fn new(generator: Arc<OrderGenerator>) -> Self {
        Self { generator }
    }

    /// 从 ERP 订单生成/更新 todo 层级树
    ///
    /// # 错误
    /// - 订单不存在 → NotFound
    /// - ERP 读取失败 → UpstreamError（事务未开始或已整体回滚）
    pub async fn generate(&self, request: &GenerateRequest) -> ApiResult<GenerationReport> {
        let now = Utc::now().naive_utc();
        Ok(self.generator.generate_from_order(request, now).await?)
    }
}
