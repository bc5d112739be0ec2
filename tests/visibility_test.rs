// ==========================================
// 可见性过滤测试
// ==========================================
// 职责: 验证 EIGENE 个人待办的组织可见性范围
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod visibility_test {
    use crate::test_helpers::{
        seed_eigene, seed_employee, MockConflictDetector, MockErpGateway, MockOrgDirectory,
        TestEnv,
    };
    use pps_core::api::CreateTodoRequest;
    use pps_core::repository::TodoFilter;
    use pps_core::{TodoType, VisibilityScope};
    use std::sync::Arc;

    /// 组织夹具: 经理 10 → 下属 {11, 12}; 员工 20 无下属
    fn env_with_org() -> TestEnv {
        let mut org = MockOrgDirectory::default();
        org.closures.insert(10, vec![11, 12]);
        org.closures.insert(20, vec![]);

        TestEnv::with_gateways(
            Arc::new(MockErpGateway::default()),
            Arc::new(org),
            Arc::new(MockConflictDetector::default()),
        )
    }

    /// 数据夹具: 经理/两下属/无关员工各一条 EIGENE + 一条普通任务
    fn seed_todos(env: &TestEnv) -> (i64, i64, i64, i64) {
        let manager = seed_employee(env, 10, "M. Vogel");
        let sub_a = seed_employee(env, 11, "K. Brandt");
        let sub_b = seed_employee(env, 12, "J. Peters");
        let unrelated = seed_employee(env, 20, "T. Krüger");

        seed_eigene(env, manager, "Wochenbericht");
        seed_eigene(env, sub_a, "Schulung vorbereiten");
        seed_eigene(env, sub_b, "Werkzeuge prüfen");
        seed_eigene(env, unrelated, "Urlaubsplanung");

        // 普通任务不经过可见性过滤
        env.todo_api
            .create(&CreateTodoRequest {
                title: "AB-3000 Rahmen".to_string(),
                todo_type: TodoType::Task,
                parent_todo_id: None,
                planned_start: None,
                setup_time_minutes: None,
                run_time_minutes: None,
                quantity: None,
                total_duration_minutes: Some(60),
                is_duration_manual: None,
                department_resource_id: None,
                machine_resource_id: None,
                employee_resource_id: None,
                creator_employee_id: None,
                priority: None,
                delivery_date: None,
            })
            .unwrap();

        (manager, sub_a, sub_b, unrelated)
    }

    #[tokio::test]
    async fn test_no_identity_sees_zero_eigene_everywhere() {
        let env = env_with_org();
        seed_todos(&env);

        // 列表查询: 无身份 → EIGENE 全部排除，无管理员旁路
        let response = env
            .todo_api
            .list(&TodoFilter::default(), None)
            .await
            .unwrap();
        assert_eq!(response.total, 1);
        assert!(response
            .items
            .iter()
            .all(|item| item.todo.todo_type != TodoType::Eigene));

        // 甘特导出同样受限
        let gantt = env
            .gantt_api
            .export(&TodoFilter::default(), None)
            .await
            .unwrap();
        assert_eq!(gantt.data.len(), 1);
    }

    #[tokio::test]
    async fn test_manager_sees_own_and_subordinate_closure() {
        let env = env_with_org();
        seed_todos(&env);

        let filter = TodoFilter {
            todo_types: vec![TodoType::Eigene],
            ..Default::default()
        };
        let response = env.todo_api.list(&filter, Some(10)).await.unwrap();

        // 经理: 本人 + 两个下属；无关员工的不可见
        assert_eq!(response.total, 3);
        let titles: Vec<&str> = response
            .items
            .iter()
            .map(|item| item.todo.title.as_str())
            .collect();
        assert!(titles.contains(&"Wochenbericht"));
        assert!(titles.contains(&"Schulung vorbereiten"));
        assert!(titles.contains(&"Werkzeuge prüfen"));
        assert!(!titles.contains(&"Urlaubsplanung"));
    }

    #[tokio::test]
    async fn test_employee_without_subordinates_sees_only_own() {
        let env = env_with_org();
        seed_todos(&env);

        let filter = TodoFilter {
            todo_types: vec![TodoType::Eigene],
            ..Default::default()
        };
        let response = env.todo_api.list(&filter, Some(20)).await.unwrap();

        assert_eq!(response.total, 1);
        assert_eq!(response.items[0].todo.title, "Urlaubsplanung");
    }

    #[tokio::test]
    async fn test_non_eigene_types_are_never_filtered() {
        let env = env_with_org();
        seed_todos(&env);

        // 无身份也能看到全部非 EIGENE 节点
        let filter = TodoFilter {
            todo_types: vec![TodoType::Task],
            ..Default::default()
        };
        assert_eq!(env.todo_api.list(&filter, None).await.unwrap().total, 1);
        assert_eq!(env.todo_api.list(&filter, Some(20)).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_unknown_caller_resolves_to_own_entry_only() {
        let env = env_with_org();
        seed_todos(&env);

        // 身份在组织目录无闭包、在镜像中无条目 → 解析集为空 → EIGENE 全排除
        let filter = TodoFilter {
            todo_types: vec![TodoType::Eigene],
            ..Default::default()
        };
        let response = env.todo_api.list(&filter, Some(999)).await.unwrap();
        assert_eq!(response.total, 0);
    }

    #[test]
    fn test_scope_allows_creator_semantics() {
        // 范围值对象的判定语义
        let scope = VisibilityScope::EigeneCreators(vec![3, 4]);
        assert!(scope.allows_creator(Some(3)));
        assert!(!scope.allows_creator(Some(5)));
        assert!(!scope.allows_creator(None));
        assert!(!VisibilityScope::ExcludeEigene.allows_creator(Some(3)));
    }
}
