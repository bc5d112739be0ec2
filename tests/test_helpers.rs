// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、协作方 mock、测试数据生成等功能
// ==========================================
#![allow(dead_code)]

use async_trait::async_trait;
use pps_core::api::{ConflictApi, DependencyApi, GanttApi, GenerationApi, TodoApi};
use pps_core::domain::erp::{
    ErpBomItem, ErpOrderArticle, ErpOrderHead, ErpResourceRow, ErpWorkplanStep,
};
use pps_core::domain::types::ResourceType;
use pps_core::engine::{OrderGenerator, RollupEngine, VisibilityFilter};
use pps_core::gateway::{ConflictDetector, DetectedConflict, ErpGateway, OrgDirectory};
use pps_core::repository::{
    ConflictRepository, ResourceCacheRepository, TodoDependencyRepository, TodoRepository,
    TodoSegmentRepository,
};
use pps_core::Todo;
use rusqlite::Connection;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = pps_core::db::open_sqlite_connection(&db_path)?;
    pps_core::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

// ==========================================
// 协作方 Mock: ERP 读取网关
// ==========================================

#[derive(Default)]
pub struct MockErpGateway {
    pub orders: HashMap<i64, ErpOrderHead>,
    pub articles: HashMap<i64, Vec<ErpOrderArticle>>,
    pub workplans: HashMap<i64, Vec<ErpWorkplanStep>>, // key: erp_article_id
    pub boms: HashMap<i64, Vec<ErpBomItem>>,           // key: erp_article_id
    pub resources: HashMap<(ResourceType, i64), ErpResourceRow>,
    pub fail_workplans: bool, // 模拟 ERP 读取失败（生成必须整体回滚）
}

#[async_trait]
impl ErpGateway for MockErpGateway {
    async fn find_order(
        &self,
        erp_order_id: i64,
    ) -> Result<Option<ErpOrderHead>, Box<dyn Error>> {
        Ok(self.orders.get(&erp_order_id).cloned())
    }

    async fn list_order_articles(
        &self,
        erp_order_id: i64,
    ) -> Result<Vec<ErpOrderArticle>, Box<dyn Error>> {
        Ok(self.articles.get(&erp_order_id).cloned().unwrap_or_default())
    }

    async fn list_workplan_steps(
        &self,
        erp_article_id: i64,
    ) -> Result<Vec<ErpWorkplanStep>, Box<dyn Error>> {
        if self.fail_workplans {
            return Err("ERP Workplan Abfrage fehlgeschlagen".into());
        }
        Ok(self
            .workplans
            .get(&erp_article_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_bom_items(
        &self,
        erp_article_id: i64,
    ) -> Result<Vec<ErpBomItem>, Box<dyn Error>> {
        Ok(self.boms.get(&erp_article_id).cloned().unwrap_or_default())
    }

    async fn find_resource(
        &self,
        resource_type: ResourceType,
        erp_id: i64,
    ) -> Result<Option<ErpResourceRow>, Box<dyn Error>> {
        Ok(self.resources.get(&(resource_type, erp_id)).cloned())
    }
}

// ==========================================
// 协作方 Mock: 组织层级
// ==========================================

#[derive(Default)]
pub struct MockOrgDirectory {
    pub closures: HashMap<i64, Vec<i64>>, // 员工 → 下属闭包 (ERP ID)
}

#[async_trait]
impl OrgDirectory for MockOrgDirectory {
    async fn subordinate_closure(
        &self,
        employee_erp_id: i64,
    ) -> Result<Vec<i64>, Box<dyn Error>> {
        Ok(self.closures.get(&employee_erp_id).cloned().unwrap_or_default())
    }
}

// ==========================================
// 协作方 Mock: 冲突检测器
// ==========================================

#[derive(Default)]
pub struct MockConflictDetector {
    pub detected: Mutex<Vec<DetectedConflict>>, // 下一次 detect 的产出
}

#[async_trait]
impl ConflictDetector for MockConflictDetector {
    async fn detect(&self, _todos: &[Todo]) -> Result<Vec<DetectedConflict>, Box<dyn Error>> {
        Ok(self.detected.lock().unwrap().clone())
    }
}

// ==========================================
// 测试环境: 全套仓储/引擎/API 装配
// ==========================================

pub struct TestEnv {
    pub temp_file: NamedTempFile,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub todo_repo: Arc<TodoRepository>,
    pub segment_repo: Arc<TodoSegmentRepository>,
    pub dependency_repo: Arc<TodoDependencyRepository>,
    pub resource_repo: Arc<ResourceCacheRepository>,
    pub conflict_repo: Arc<ConflictRepository>,
    pub rollup_engine: Arc<RollupEngine>,
    pub todo_api: Arc<TodoApi>,
    pub gantt_api: Arc<GanttApi>,
    pub dependency_api: Arc<DependencyApi>,
    pub conflict_api: Arc<ConflictApi>,
    pub generation_api: Arc<GenerationApi>,
}

impl TestEnv {
    /// 以空 mock 协作方装配测试环境
    pub fn new() -> Self {
        Self::with_gateways(
            Arc::new(MockErpGateway::default()),
            Arc::new(MockOrgDirectory::default()),
            Arc::new(MockConflictDetector::default()),
        )
    }

    /// 以给定协作方 mock 装配测试环境
    pub fn with_gateways(
        erp: Arc<MockErpGateway>,
        org: Arc<MockOrgDirectory>,
        detector: Arc<MockConflictDetector>,
    ) -> Self {
        let (temp_file, db_path) = create_test_db().unwrap();
        let conn = Arc::new(Mutex::new(
            pps_core::db::open_sqlite_connection(&db_path).unwrap(),
        ));

        let todo_repo = Arc::new(TodoRepository::new(conn.clone()));
        let segment_repo = Arc::new(TodoSegmentRepository::new(conn.clone()));
        let dependency_repo = Arc::new(TodoDependencyRepository::new(conn.clone()));
        let resource_repo = Arc::new(ResourceCacheRepository::new(conn.clone()));
        let conflict_repo = Arc::new(ConflictRepository::new(conn.clone()));

        let visibility = Arc::new(VisibilityFilter::new(org, resource_repo.clone()));
        let rollup_engine = Arc::new(RollupEngine::new(conn.clone()));
        let generator = Arc::new(OrderGenerator::new(conn.clone(), erp));

        let todo_api = Arc::new(TodoApi::new(
            todo_repo.clone(),
            segment_repo.clone(),
            conflict_repo.clone(),
            visibility.clone(),
            rollup_engine.clone(),
        ));
        let gantt_api = Arc::new(GanttApi::new(
            todo_repo.clone(),
            dependency_repo.clone(),
            resource_repo.clone(),
            conflict_repo.clone(),
            visibility.clone(),
        ));
        let dependency_api = Arc::new(DependencyApi::new(
            dependency_repo.clone(),
            todo_repo.clone(),
        ));
        let conflict_api = Arc::new(ConflictApi::new(
            conflict_repo.clone(),
            todo_repo.clone(),
            detector,
        ));
        let generation_api = Arc::new(GenerationApi::new(generator));

        TestEnv {
            temp_file,
            db_path,
            conn,
            todo_repo,
            segment_repo,
            dependency_repo,
            resource_repo,
            conflict_repo,
            rollup_engine,
            todo_api,
            gantt_api,
            dependency_api,
            conflict_api,
            generation_api,
        }
    }
}

// ==========================================
// 测试数据生成
// ==========================================

/// 标准订单夹具: 订单 1000 / 物料 2001 (数量 30, 部门 77) /
/// 三个工序步骤（工时 30/45/60 分钟）/ 两条 BOM 行 / 机台 501/502
pub fn sample_order_fixture() -> MockErpGateway {
    let mut erp = MockErpGateway::default();

    erp.orders.insert(
        1000,
        ErpOrderHead {
            erp_order_id: 1000,
            order_no: "AB-1000".to_string(),
            description: "Getriebegehäuse".to_string(),
            customer_name: Some("Maschinenbau Nord GmbH".to_string()),
            delivery_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 30),
            priority: 2,
        },
    );

    erp.articles.insert(
        1000,
        vec![ErpOrderArticle {
            erp_article_id: 2001,
            article_no: "ART-2001".to_string(),
            name: "Gehäuse roh".to_string(),
            quantity: 30.0,
            department_erp_id: Some(77),
        }],
    );

    // 工时: 0+1×30=30 / 15+1×30=45 / 0+2×30=60
    erp.workplans.insert(
        2001,
        vec![
            ErpWorkplanStep {
                erp_workplan_item_id: 9001,
                position: 10,
                name: "Sägen".to_string(),
                setup_time_minutes: 0.0,
                unit_time_minutes: 1.0,
                machine_erp_id: Some(501),
                machine_level: 1,
            },
            ErpWorkplanStep {
                erp_workplan_item_id: 9002,
                position: 20,
                name: "Fräsen".to_string(),
                setup_time_minutes: 15.0,
                unit_time_minutes: 1.0,
                machine_erp_id: Some(502),
                machine_level: 1,
            },
            ErpWorkplanStep {
                erp_workplan_item_id: 9003,
                position: 30,
                name: "Entgraten".to_string(),
                setup_time_minutes: 0.0,
                unit_time_minutes: 2.0,
                machine_erp_id: None,
                machine_level: 1,
            },
        ],
    );

    erp.boms.insert(
        2001,
        vec![
            ErpBomItem {
                erp_bom_item_id: 7001,
                name: "Rohling 120x80".to_string(),
                quantity: 30.0,
            },
            ErpBomItem {
                erp_bom_item_id: 7002,
                name: "Dichtungssatz".to_string(),
                quantity: 60.0,
            },
        ],
    );

    erp.resources.insert(
        (ResourceType::Department, 77),
        ErpResourceRow {
            erp_id: 77,
            name: "Mechanische Fertigung".to_string(),
        },
    );
    erp.resources.insert(
        (ResourceType::Machine, 501),
        ErpResourceRow {
            erp_id: 501,
            name: "Säge S1".to_string(),
        },
    );
    erp.resources.insert(
        (ResourceType::Machine, 502),
        ErpResourceRow {
            erp_id: 502,
            name: "Fräse F3".to_string(),
        },
    );

    erp
}

/// 缺省生成请求（含工序与 BOM, 层级 1）
pub fn default_generate_request(erp_order_id: i64) -> pps_core::GenerateRequest {
    pps_core::GenerateRequest {
        erp_order_id,
        article_filter: None,
        include_operations: true,
        include_bom_items: true,
        workplan_level: 1,
    }
}

/// 写入员工镜像条目，返回本地 resource_id
pub fn seed_employee(env: &TestEnv, erp_id: i64, name: &str) -> i64 {
    env.resource_repo
        .upsert(ResourceType::Employee, erp_id, name)
        .unwrap()
}

/// 创建 EIGENE 个人待办，返回 todo_id
pub fn seed_eigene(env: &TestEnv, creator_local_id: i64, title: &str) -> i64 {
    let request = pps_core::api::CreateTodoRequest {
        title: title.to_string(),
        todo_type: pps_core::TodoType::Eigene,
        parent_todo_id: None,
        planned_start: None,
        setup_time_minutes: None,
        run_time_minutes: None,
        quantity: None,
        total_duration_minutes: Some(30),
        is_duration_manual: None,
        department_resource_id: None,
        machine_resource_id: None,
        employee_resource_id: None,
        creator_employee_id: Some(creator_local_id),
        priority: None,
        delivery_date: None,
    };
    env.todo_api.create(&request).unwrap().todo_id
}
