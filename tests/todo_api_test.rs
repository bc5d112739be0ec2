// ==========================================
// Todo API 测试
// ==========================================
// 职责: 验证 查询过滤/分页/级联删除/分段拆分 业务接口
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod todo_api_test {
    use crate::test_helpers::TestEnv;
    use chrono::{NaiveDate, NaiveDateTime};
    use pps_core::api::{ApiError, CreateTodoRequest, SegmentSpec, UpdateTodoRequest};
    use pps_core::gateway::conflict_detector::DetectedConflict;
    use pps_core::repository::TodoFilter;
    use pps_core::{ConflictSeverity, ConflictType, TodoStatus, TodoType};

    fn test_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 4)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap()
    }

    fn create_request(title: &str, todo_type: TodoType) -> CreateTodoRequest {
        CreateTodoRequest {
            title: title.to_string(),
            todo_type,
            parent_todo_id: None,
            planned_start: Some(test_now()),
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
        }
    }

    #[test]
    fn test_create_validates_input() {
        let env = TestEnv::new();

        // 空标题
        let result = env.todo_api.create(&create_request("  ", TodoType::Task));
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));

        // EIGENE 必须携带创建人
        let result = env
            .todo_api
            .create(&create_request("Privat", TodoType::Eigene));
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));

        // 父节点必须存在
        let mut request = create_request("Kind", TodoType::Operation);
        request.parent_todo_id = Some(9999);
        let result = env.todo_api.create(&request);
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let env = TestEnv::new();

        let order = env
            .todo_api
            .create(&create_request("AB-1000 Gehäuse", TodoType::ContainerOrder))
            .unwrap();
        for i in 0..5 {
            let mut request = create_request(&format!("Schritt {}", i), TodoType::Operation);
            request.parent_todo_id = Some(order.todo_id);
            let created = env.todo_api.create(&request).unwrap();
            if i < 2 {
                env.todo_api
                    .update(
                        created.todo_id,
                        &UpdateTodoRequest {
                            version: Some(1),
                            status: Some(TodoStatus::Completed),
                            ..Default::default()
                        },
                    )
                    .unwrap();
            }
        }

        // 状态过滤
        let filter = TodoFilter {
            statuses: vec![TodoStatus::Completed],
            ..Default::default()
        };
        let response = env.todo_api.list(&filter, None).await.unwrap();
        assert_eq!(response.total, 2);

        // 类型过滤
        let filter = TodoFilter {
            todo_types: vec![TodoType::ContainerOrder],
            ..Default::default()
        };
        let response = env.todo_api.list(&filter, None).await.unwrap();
        assert_eq!(response.total, 1);

        // 父节点过滤
        let filter = TodoFilter {
            parent_todo_id: Some(order.todo_id),
            ..Default::default()
        };
        let response = env.todo_api.list(&filter, None).await.unwrap();
        assert_eq!(response.total, 5);

        // 全文过滤
        let filter = TodoFilter {
            search: Some("Gehäuse".to_string()),
            ..Default::default()
        };
        let response = env.todo_api.list(&filter, None).await.unwrap();
        assert_eq!(response.total, 1);

        // 分页: total 为全量，items 为当前页
        let filter = TodoFilter {
            skip: 2,
            limit: Some(2),
            ..Default::default()
        };
        let response = env.todo_api.list(&filter, None).await.unwrap();
        assert_eq!(response.total, 6);
        assert_eq!(response.items.len(), 2);
    }

    #[tokio::test]
    async fn test_list_annotates_conflict_counts() {
        let env = TestEnv::new();
        let todo = env
            .todo_api
            .create(&create_request("Konfliktbehaftet", TodoType::Task))
            .unwrap();

        // 冲突由外部检测器产出，这里直接写入存储
        env.conflict_repo
            .replace_unresolved(
                &[
                    DetectedConflict {
                        conflict_type: ConflictType::ResourceOverlap,
                        todo_id: todo.todo_id,
                        related_todo_id: None,
                        description: "Maschine doppelt belegt".to_string(),
                        severity: ConflictSeverity::Warning,
                    },
                    DetectedConflict {
                        conflict_type: ConflictType::DeadlineRisk,
                        todo_id: todo.todo_id,
                        related_todo_id: None,
                        description: "Liefertermin gefährdet".to_string(),
                        severity: ConflictSeverity::Critical,
                    },
                ],
                test_now(),
            )
            .unwrap();

        let response = env
            .todo_api
            .list(&TodoFilter::default(), None)
            .await
            .unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].conflict_count, 2);

        // has_conflicts 过滤
        let filter = TodoFilter {
            has_conflicts: Some(true),
            ..Default::default()
        };
        assert_eq!(env.todo_api.list(&filter, None).await.unwrap().total, 1);
        let filter = TodoFilter {
            has_conflicts: Some(false),
            ..Default::default()
        };
        assert_eq!(env.todo_api.list(&filter, None).await.unwrap().total, 0);
    }

    #[test]
    fn test_delete_cascades_to_children_segments_dependencies() {
        let env = TestEnv::new();
        let now = test_now();

        let order = env
            .todo_api
            .create(&create_request("AB-2000", TodoType::ContainerOrder))
            .unwrap();
        let mut child_request = create_request("Schritt", TodoType::Operation);
        child_request.parent_todo_id = Some(order.todo_id);
        let child_a = env.todo_api.create(&child_request).unwrap();
        let child_b = env.todo_api.create(&child_request).unwrap();

        // 子节点间依赖边 + 子节点分段
        env.dependency_api
            .create(&pps_core::api::CreateDependencyRequest {
                predecessor_id: child_a.todo_id,
                successor_id: child_b.todo_id,
                dependency_type: None,
                lag_minutes: None,
            })
            .unwrap();
        env.todo_api
            .split(
                child_a.todo_id,
                &[SegmentSpec {
                    start_time: now,
                    end_time: now + chrono::Duration::minutes(30),
                    machine_resource_id: None,
                    employee_resource_id: None,
                }],
            )
            .unwrap();

        // 删除订单容器 → 全级联
        env.todo_api.delete(order.todo_id).unwrap();

        assert!(env.todo_repo.find_by_id(child_a.todo_id).unwrap().is_none());
        assert!(env.todo_repo.find_by_id(child_b.todo_id).unwrap().is_none());
        assert!(env.todo_api.list_segments(child_a.todo_id).unwrap().is_empty());
        assert!(env.dependency_api.list(None).unwrap().is_empty());

        // 再删报未找到
        assert!(matches!(
            env.todo_api.delete(order.todo_id),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_split_replaces_segments_atomically() {
        let env = TestEnv::new();
        let now = test_now();
        let todo = env
            .todo_api
            .create(&create_request("Härten", TodoType::Operation))
            .unwrap();

        // 第一组分段
        env.todo_api
            .split(
                todo.todo_id,
                &[
                    SegmentSpec {
                        start_time: now,
                        end_time: now + chrono::Duration::minutes(60),
                        machine_resource_id: None,
                        employee_resource_id: None,
                    },
                    SegmentSpec {
                        start_time: now + chrono::Duration::minutes(120),
                        end_time: now + chrono::Duration::minutes(180),
                        machine_resource_id: None,
                        employee_resource_id: None,
                    },
                ],
            )
            .unwrap();

        // 第二组分段整体替换第一组
        let replaced = env
            .todo_api
            .split(
                todo.todo_id,
                &[SegmentSpec {
                    start_time: now + chrono::Duration::minutes(30),
                    end_time: now + chrono::Duration::minutes(90),
                    machine_resource_id: None,
                    employee_resource_id: None,
                }],
            )
            .unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].segment_index, 0);

        let stored = env.todo_api.list_segments(todo.todo_id).unwrap();
        assert_eq!(stored.len(), 1);

        // 父节点起止 = 新分段集的 min/max
        let parent = env.todo_repo.find_by_id(todo.todo_id).unwrap().unwrap();
        assert_eq!(
            parent.planned_start,
            Some(now + chrono::Duration::minutes(30))
        );
        assert_eq!(
            parent.planned_end,
            Some(now + chrono::Duration::minutes(90))
        );
        // 系统侧写入同样递增 version
        assert!(parent.version > todo.version);
    }

    #[test]
    fn test_split_rejects_overlapping_segments() {
        let env = TestEnv::new();
        let now = test_now();
        let todo = env
            .todo_api
            .create(&create_request("Glühen", TodoType::Operation))
            .unwrap();

        let result = env.todo_api.split(
            todo.todo_id,
            &[
                SegmentSpec {
                    start_time: now,
                    end_time: now + chrono::Duration::minutes(60),
                    machine_resource_id: None,
                    employee_resource_id: None,
                },
                SegmentSpec {
                    start_time: now + chrono::Duration::minutes(30),
                    end_time: now + chrono::Duration::minutes(90),
                    machine_resource_id: None,
                    employee_resource_id: None,
                },
            ],
        );
        assert!(matches!(result, Err(ApiError::ValidationError(_))));

        // 时间窗倒置
        let result = env.todo_api.split(
            todo.todo_id,
            &[SegmentSpec {
                start_time: now + chrono::Duration::minutes(60),
                end_time: now,
                machine_resource_id: None,
                employee_resource_id: None,
            }],
        );
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_rollup_endpoint_rejects_leaf() {
        let env = TestEnv::new();
        let leaf = env
            .todo_api
            .create(&create_request("Messen", TodoType::Operation))
            .unwrap();

        assert!(matches!(
            env.todo_api.rollup(leaf.todo_id),
            Err(ApiError::BusinessRuleViolation(_))
        ));
    }

    #[test]
    fn test_get_unknown_todo_is_not_found() {
        let env = TestEnv::new();
        assert!(matches!(env.todo_api.get(12345), Err(ApiError::NotFound(_))));
    }
}
