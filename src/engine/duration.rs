// ==========================================
// 生产计划排程核心 - 工时引擎
// ==========================================
// 红线: 下游排程一律以 15 分钟槽为单位；
//       凑整规则 (余数 < 7.5 向下, ≥ 7.5 向上) 是承载性规则，不可更改
// ==========================================

/// 排程槽宽（分钟）
pub const SLOT_MINUTES: i64 = 15;

/// 凑整阈值（分钟）: 余数达到该值向上取整
pub const HALF_SLOT_MINUTES: f64 = 7.5;

/// 叶子工时下限（分钟）
pub const MIN_DURATION_MINUTES: i64 = 15;

/// 无子节点容器的占位工时（分钟），避免甘特图上的零宽节点
pub const EMPTY_CONTAINER_MINUTES: i64 = 5;

/// BOM 行待办的缺省工时（分钟），人工编辑前生效
pub const BOM_FALLBACK_MINUTES: i64 = 60;

// ==========================================
// DurationEngine - 叶子工时计算
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationEngine;

impl DurationEngine {
    /// 创建新的DurationEngine实例
    pub fn new() -> Self {
        DurationEngine
    }

    /// 计算叶子工时（分钟）
    ///
    /// # 规则
    /// 1. raw = setup + unit × quantity
    /// 2. raw ≤ 0 → 下限 15
    /// 3. 否则按 7.5 分钟阈值凑整到最近的 15 分钟倍数，再取下限 15
    ///
    /// # 示例
    /// - raw=67 → 60 (67 % 15 = 7 < 7.5 向下)
    /// - raw=68 → 75 (68 % 15 = 8 ≥ 7.5 向上)
    /// - raw=0  → 15 (下限)
    pub fn compute_leaf_duration(
        &self,
        setup_minutes: f64,
        unit_minutes: f64,
        quantity: f64,
    ) -> i64 {
        let raw = setup_minutes + unit_minutes * quantity;
        if raw <= 0.0 {
            return MIN_DURATION_MINUTES;
        }
        self.round_to_slot(raw)
    }

    /// 按 15 分钟槽凑整（余数 < 7.5 向下, ≥ 7.5 向上），下限 15
    pub fn round_to_slot(&self, raw_minutes: f64) -> i64 {
        let slots = (raw_minutes / SLOT_MINUTES as f64).floor();
        let remainder = raw_minutes - slots * SLOT_MINUTES as f64;

        let rounded = if remainder >= HALF_SLOT_MINUTES {
            (slots as i64 + 1) * SLOT_MINUTES
        } else {
            slots as i64 * SLOT_MINUTES
        };

        rounded.max(MIN_DURATION_MINUTES)
    }
}
