// ==========================================
// 工时汇总引擎测试
// ==========================================
// 职责: 验证容器工时 rollup 的求和/人工覆盖/幂等行为
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod rollup_engine_test {
    use crate::test_helpers::TestEnv;
    use chrono::{NaiveDate, NaiveDateTime};
    use pps_core::{Todo, TodoType};

    fn test_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    /// 建树: 订单容器 → 物料容器 → 两个工序叶子 (40 + 50 分钟)
    fn build_tree(env: &TestEnv) -> (i64, i64, i64, i64) {
        let now = test_now();

        let mut order = Todo::new(TodoType::ContainerOrder, "AB-7000", now);
        order.planned_start = Some(now);
        let order_id = env.todo_repo.insert(&order).unwrap();

        let mut article = Todo::new(TodoType::Task, "ART-7001", now);
        article.parent_todo_id = Some(order_id);
        article.planned_start = Some(now);
        let article_id = env.todo_repo.insert(&article).unwrap();

        let mut op1 = Todo::new(TodoType::Operation, "Drehen", now);
        op1.parent_todo_id = Some(article_id);
        op1.total_duration_minutes = Some(40);
        let op1_id = env.todo_repo.insert(&op1).unwrap();

        let mut op2 = Todo::new(TodoType::Operation, "Bohren", now);
        op2.parent_todo_id = Some(article_id);
        op2.total_duration_minutes = Some(50);
        let op2_id = env.todo_repo.insert(&op2).unwrap();

        (order_id, article_id, op1_id, op2_id)
    }

    #[test]
    fn test_rollup_sums_direct_and_indirect_children() {
        let env = TestEnv::new();
        let (order_id, article_id, _, _) = build_tree(&env);

        let total = env.rollup_engine.rollup(order_id, test_now()).unwrap();
        assert_eq!(total, 90);

        // 容器存储值与 planned_end 一并回写
        let order = env.todo_repo.find_by_id(order_id).unwrap().unwrap();
        assert_eq!(order.total_duration_minutes, Some(90));
        assert_eq!(
            order.planned_end,
            Some(test_now() + chrono::Duration::minutes(90))
        );

        let article = env.todo_repo.find_by_id(article_id).unwrap().unwrap();
        assert_eq!(article.total_duration_minutes, Some(90));
    }

    #[test]
    fn test_rollup_respects_manual_override() {
        let env = TestEnv::new();
        let (order_id, article_id, _, _) = build_tree(&env);

        // 物料容器设为人工覆盖 120 分钟
        let article = env.todo_repo.find_by_id(article_id).unwrap().unwrap();
        env.todo_repo
            .apply_if_version_matches(article_id, Some(article.version), test_now(), |todo| {
                todo.is_duration_manual = true;
                todo.total_duration_minutes = Some(120);
            })
            .unwrap();

        let total = env.rollup_engine.rollup(order_id, test_now()).unwrap();

        // 人工覆盖值向上传播，容器自身不被回写
        assert_eq!(total, 120);
        let article = env.todo_repo.find_by_id(article_id).unwrap().unwrap();
        assert_eq!(article.total_duration_minutes, Some(120));
        let order = env.todo_repo.find_by_id(order_id).unwrap().unwrap();
        assert_eq!(order.total_duration_minutes, Some(120));
    }

    #[test]
    fn test_rollup_is_idempotent() {
        let env = TestEnv::new();
        let (order_id, _, _, _) = build_tree(&env);

        let first = env.rollup_engine.rollup(order_id, test_now()).unwrap();
        let version_after_first = env
            .todo_repo
            .find_by_id(order_id)
            .unwrap()
            .unwrap()
            .version;

        let second = env.rollup_engine.rollup(order_id, test_now()).unwrap();
        let version_after_second = env
            .todo_repo
            .find_by_id(order_id)
            .unwrap()
            .unwrap()
            .version;

        // 值一致；无中间变更时第二次不回写（version 不再递增）
        assert_eq!(first, second);
        assert_eq!(version_after_first, version_after_second);
    }

    #[test]
    fn test_rollup_converges_after_mutation() {
        let env = TestEnv::new();
        let (order_id, _, op1_id, _) = build_tree(&env);

        env.rollup_engine.rollup(order_id, test_now()).unwrap();

        // 叶子工时变化后重新汇总收敛到新和
        let op1 = env.todo_repo.find_by_id(op1_id).unwrap().unwrap();
        env.todo_repo
            .apply_if_version_matches(op1_id, Some(op1.version), test_now(), |todo| {
                todo.total_duration_minutes = Some(100);
            })
            .unwrap();

        let total = env.rollup_engine.rollup(order_id, test_now()).unwrap();
        assert_eq!(total, 150);
    }

    #[test]
    fn test_leaf_without_duration_counts_floor() {
        let env = TestEnv::new();
        let now = test_now();

        let mut order = Todo::new(TodoType::ContainerOrder, "AB-7100", now);
        order.planned_start = Some(now);
        let order_id = env.todo_repo.insert(&order).unwrap();

        let mut op = Todo::new(TodoType::Operation, "Messen", now);
        op.parent_todo_id = Some(order_id);
        // total_duration_minutes 缺省
        env.todo_repo.insert(&op).unwrap();

        let total = env.rollup_engine.rollup(order_id, test_now()).unwrap();
        assert_eq!(total, 15);
    }

    #[test]
    fn test_empty_container_gets_placeholder_width() {
        let env = TestEnv::new();
        let now = test_now();

        let mut order = Todo::new(TodoType::ContainerOrder, "AB-7200", now);
        order.planned_start = Some(now);
        let order_id = env.todo_repo.insert(&order).unwrap();

        // 无子节点 → 5 分钟占位，避免零宽节点
        let total = env.rollup_engine.rollup(order_id, test_now()).unwrap();
        assert_eq!(total, 5);
    }
}
