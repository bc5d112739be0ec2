// ==========================================
// 生产计划排程核心 - 订单生成引擎
// ==========================================
// 职责: 读取 ERP 订单/工艺路线数据，物化/更新 todo 层级树、
//       工时与依赖边（一次调用，一个事务）
// 幂等性: 同一 ERP 订单重复生成按 ERP 关联字段原地匹配更新，不重复建树
// 红线: ERP 读取失败或任何意外错误 → 事务整体回滚，不允许半生成的树落库
// ==========================================

use crate::domain::erp::{ErpBomItem, ErpOrderArticle, ErpOrderHead, ErpResourceRow, ErpWorkplanStep};
use crate::domain::todo::Todo;
use crate::domain::types::{DependencyType, ResourceType, TodoType};
use crate::engine::duration::{DurationEngine, BOM_FALLBACK_MINUTES, EMPTY_CONTAINER_MINUTES};
use crate::gateway::erp_gateway::ErpGateway;
use crate::repository::dependency_repo::TodoDependencyRepository;
use crate::repository::error::RepositoryError;
use crate::repository::resource_repo::ResourceCacheRepository;
use crate::repository::todo_repo::TodoRepository;
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

// ==========================================
// 请求与结果
// ==========================================

/// 订单生成请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub erp_order_id: i64,                  // ERP 订单ID
    pub article_filter: Option<Vec<i64>>,   // 物料子集 (None = 全部)
    pub include_operations: bool,           // 是否物化工序叶子
    pub include_bom_items: bool,            // 是否物化 BOM 行待办
    pub workplan_level: i64,                // 机台层级上限 (更细层级的步骤跳过)
}

/// 订单生成结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: Uuid,                       // 生成批次 (日志关联)
    pub order_todo_id: i64,                 // 订单容器ID
    pub created_todos: usize,               // 新建节点数
    pub updated_todos: usize,               // 更新节点数
    pub created_dependencies: usize,        // 新建依赖边数
    pub errors: Vec<String>,                // 非致命错误 (兄弟物料继续处理)
}

/// 生成引擎错误类型
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("ERP订单不存在: erp_order_id={0}")]
    OrderNotFound(i64),

    #[error("ERP读取失败: {0}")]
    ErpGateway(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 单个物料的 ERP 数据包（事务开始前一次性收集）
struct ArticleBundle {
    article: ErpOrderArticle,
    steps: Vec<ErpWorkplanStep>,
    bom_items: Vec<ErpBomItem>,
    department: Option<ErpResourceRow>,
    machines: HashMap<i64, ErpResourceRow>,
}

// ==========================================
// OrderGenerator - 订单生成引擎
// ==========================================
pub struct OrderGenerator {
    conn: Arc<Mutex<Connection>>,
    erp: Arc<dyn ErpGateway>,
    duration_engine: DurationEngine,
}

impl OrderGenerator {
    /// 创建新的OrderGenerator实例
    pub fn new(conn: Arc<Mutex<Connection>>, erp: Arc<dyn ErpGateway>) -> Self {
        Self {
            conn,
            erp,
            duration_engine: DurationEngine::new(),
        }
    }

    /// 从 ERP 订单生成/更新 todo 层级树
    ///
    /// # 阶段
    /// 1. 收集: 订单抬头/物料/工艺路线/BOM/资源主数据（异步，只读，不落库）
    /// 2. 落库: 整棵树的物化在一个事务内完成（同步）
    ///
    /// # 排程规则
    /// - 工序串行: 首工序从订单开始时间起，后续工序首尾相接，
    ///   相邻工序建 FINISH_TO_START (lag 0) 依赖边，已存在的边复用
    /// - BOM 行并行: 全部从订单开始时间起，无依赖边，缺省工时 60 分钟
    /// - 物料容器工时: 恒由全量工艺路线求和（与是否物化工序无关）
    pub async fn generate_from_order(
        &self,
        request: &GenerateRequest,
        now: NaiveDateTime,
    ) -> Result<GenerationReport, GenerationError> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, erp_order_id = request.erp_order_id, "订单生成开始");

        // ===== 阶段 1: 收集 ERP 数据 =====
        let head = self
            .erp
            .find_order(request.erp_order_id)
            .await
            .map_err(|e| GenerationError::ErpGateway(e.to_string()))?
            .ok_or(GenerationError::OrderNotFound(request.erp_order_id))?;

        let mut articles = self
            .erp
            .list_order_articles(request.erp_order_id)
            .await
            .map_err(|e| GenerationError::ErpGateway(e.to_string()))?;

        // 物料子集过滤
        if let Some(filter) = &request.article_filter {
            articles.retain(|a| filter.contains(&a.erp_article_id));
        }

        let mut bundles = Vec::with_capacity(articles.len());
        for article in articles {
            let steps = self
                .erp
                .list_workplan_steps(article.erp_article_id)
                .await
                .map_err(|e| GenerationError::ErpGateway(e.to_string()))?;

            let bom_items = if request.include_bom_items {
                self.erp
                    .list_bom_items(article.erp_article_id)
                    .await
                    .map_err(|e| GenerationError::ErpGateway(e.to_string()))?
            } else {
                Vec::new()
            };

            let department = match article.department_erp_id {
                Some(erp_id) => self
                    .erp
                    .find_resource(ResourceType::Department, erp_id)
                    .await
                    .map_err(|e| GenerationError::ErpGateway(e.to_string()))?,
                None => None,
            };

            let mut machines = HashMap::new();
            for step in &steps {
                if let Some(machine_erp_id) = step.machine_erp_id {
                    if machines.contains_key(&machine_erp_id) {
                        continue;
                    }
                    if let Some(row) = self
                        .erp
                        .find_resource(ResourceType::Machine, machine_erp_id)
                        .await
                        .map_err(|e| GenerationError::ErpGateway(e.to_string()))?
                    {
                        machines.insert(machine_erp_id, row);
                    }
                }
            }

            bundles.push(ArticleBundle {
                article,
                steps,
                bom_items,
                department,
                machines,
            });
        }

        // ===== 阶段 2: 事务内落库 =====
        let report = self.apply(request, &head, &bundles, run_id, now)?;

        tracing::info!(
            %run_id,
            created = report.created_todos,
            updated = report.updated_todos,
            dependencies = report.created_dependencies,
            errors = report.errors.len(),
            "订单生成完成"
        );
        Ok(report)
    }

    /// 阶段 2: 一个事务内物化整棵树（出错整体回滚）
    fn apply(
        &self,
        request: &GenerateRequest,
        head: &ErpOrderHead,
        bundles: &[ArticleBundle],
        run_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<GenerationReport, GenerationError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        let mut report = GenerationReport {
            run_id,
            order_todo_id: 0,
            created_todos: 0,
            updated_todos: 0,
            created_dependencies: 0,
            errors: Vec::new(),
        };

        // 1. 订单容器 upsert（按根层 erp_order_id 匹配）
        let existing_order = TodoRepository::find_root_by_erp_order_in(&tx, head.erp_order_id)?;
        let (order_todo_id, order_start) = match existing_order {
            Some(mut order) => {
                order.title = format!("{} {}", head.order_no, head.description);
                order.customer_name = head.customer_name.clone();
                order.delivery_date = head.delivery_date;
                order.priority = head.priority;
                TodoRepository::update_in(&tx, &order, now)?;
                report.updated_todos += 1;
                (order.todo_id, order.planned_start.unwrap_or(now))
            }
            None => {
                let mut order = Todo::new(
                    TodoType::ContainerOrder,
                    format!("{} {}", head.order_no, head.description),
                    now,
                );
                order.erp_order_id = Some(head.erp_order_id);
                order.planned_start = Some(now);
                order.customer_name = head.customer_name.clone();
                order.delivery_date = head.delivery_date;
                order.priority = head.priority;
                let id = TodoRepository::insert_in(&tx, &order)?;
                report.created_todos += 1;
                (id, now)
            }
        };
        report.order_todo_id = order_todo_id;

        // 2. 逐物料处理（数据级异常记入 errors，兄弟物料继续）
        for (index, bundle) in bundles.iter().enumerate() {
            self.apply_article(
                &tx,
                request,
                head,
                bundle,
                order_todo_id,
                order_start,
                index as i64,
                now,
                &mut report,
            )?;
        }

        // 3. 订单容器工时 = 物料容器工时之和（manual 容器不回写）
        let order_children = TodoRepository::find_children_in(&tx, order_todo_id)?;
        let order_minutes: i64 = order_children
            .iter()
            .map(|c| c.total_duration_minutes.unwrap_or(0))
            .sum();
        let order_minutes = if order_children.is_empty() {
            EMPTY_CONTAINER_MINUTES
        } else {
            order_minutes
        };
        let order = TodoRepository::find_by_id_in(&tx, order_todo_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Todo".to_string(),
                id: order_todo_id.to_string(),
            }
        })?;
        if !order.is_duration_manual
            && (order.total_duration_minutes != Some(order_minutes)
                || order.planned_end != Some(order_start + Duration::minutes(order_minutes)))
        {
            TodoRepository::update_rollup_fields_in(
                &tx,
                order_todo_id,
                order_minutes,
                Some(order_start + Duration::minutes(order_minutes)),
                now,
            )?;
        }

        tx.commit().map_err(RepositoryError::from)?;
        Ok(report)
    }

    /// 处理单个物料: 容器 upsert + 工序串行物化 + BOM 行并行物化
    #[allow(clippy::too_many_arguments)]
    fn apply_article(
        &self,
        tx: &Connection,
        request: &GenerateRequest,
        head: &ErpOrderHead,
        bundle: &ArticleBundle,
        order_todo_id: i64,
        order_start: NaiveDateTime,
        sort_order: i64,
        now: NaiveDateTime,
        report: &mut GenerationReport,
    ) -> Result<(), GenerationError> {
        let article = &bundle.article;

        // 部门资源解析（缺失记为非致命错误）
        let department_resource_id = match (&bundle.department, article.department_erp_id) {
            (Some(row), _) => {
                Some(ResourceCacheRepository::upsert_in(
                    tx,
                    ResourceType::Department,
                    row.erp_id,
                    &row.name,
                )?)
            }
            (None, Some(erp_id)) => {
                report.errors.push(format!(
                    "物料 {} 的部门 {} 在ERP中不存在",
                    article.article_no, erp_id
                ));
                None
            }
            (None, None) => None,
        };

        // 物料容器工时: 恒由全量工艺路线求和（与 include_operations 无关）
        let article_minutes: i64 = if bundle.steps.is_empty() {
            report.errors.push(format!(
                "物料 {} 无工艺路线步骤，使用占位工时",
                article.article_no
            ));
            EMPTY_CONTAINER_MINUTES
        } else {
            bundle
                .steps
                .iter()
                .map(|step| {
                    self.duration_engine.compute_leaf_duration(
                        step.setup_time_minutes,
                        step.unit_time_minutes,
                        article.quantity,
                    )
                })
                .sum()
        };

        // 物料容器 upsert（按 erp_article_id 匹配）
        let existing_article =
            TodoRepository::find_child_by_erp_article_in(tx, order_todo_id, article.erp_article_id)?;
        let (article_todo_id, article_start) = match existing_article {
            Some(mut todo) => {
                // 部门缺失时补齐；工时仅在非人工覆盖时重算
                if todo.department_resource_id.is_none() {
                    todo.department_resource_id = department_resource_id;
                }
                if !todo.is_duration_manual {
                    todo.total_duration_minutes = Some(article_minutes);
                    todo.recompute_planned_end();
                }
                todo.quantity = article.quantity;
                TodoRepository::update_in(tx, &todo, now)?;
                report.updated_todos += 1;
                (todo.todo_id, todo.planned_start.unwrap_or(order_start))
            }
            None => {
                let mut todo = Todo::new(
                    TodoType::Task,
                    format!("{} {}", article.article_no, article.name),
                    now,
                );
                todo.parent_todo_id = Some(order_todo_id);
                todo.erp_order_id = Some(head.erp_order_id);
                todo.erp_article_id = Some(article.erp_article_id);
                todo.planned_start = Some(order_start);
                todo.total_duration_minutes = Some(article_minutes);
                todo.recompute_planned_end();
                todo.quantity = article.quantity;
                todo.department_resource_id = department_resource_id;
                todo.sort_order = sort_order;
                let id = TodoRepository::insert_in(tx, &todo)?;
                report.created_todos += 1;
                (id, order_start)
            }
        };

        // 工序叶子（串行排程 + FINISH_TO_START 依赖链）
        if request.include_operations {
            self.apply_operations(
                tx,
                request,
                head,
                bundle,
                article_todo_id,
                department_resource_id,
                article_start,
                now,
                report,
            )?;
        }

        // BOM 行待办（并行，缺省 60 分钟）
        if request.include_bom_items {
            for bom in &bundle.bom_items {
                let existing =
                    TodoRepository::find_bom_child_by_title_in(tx, article_todo_id, &bom.name)?;
                if existing.is_some() {
                    continue;
                }
                let mut todo = Todo::new(TodoType::Task, bom.name.clone(), now);
                todo.parent_todo_id = Some(article_todo_id);
                todo.erp_order_id = Some(head.erp_order_id);
                todo.erp_article_id = Some(article.erp_article_id);
                todo.planned_start = Some(order_start);
                todo.total_duration_minutes = Some(BOM_FALLBACK_MINUTES);
                todo.recompute_planned_end();
                todo.quantity = bom.quantity;
                todo.department_resource_id = department_resource_id;
                TodoRepository::insert_in(tx, &todo)?;
                report.created_todos += 1;
            }
        }

        Ok(())
    }

    /// 物化工序叶子: level ≤ workplan_level 的步骤按工艺路线位置串行首尾相接
    #[allow(clippy::too_many_arguments)]
    fn apply_operations(
        &self,
        tx: &Connection,
        request: &GenerateRequest,
        head: &ErpOrderHead,
        bundle: &ArticleBundle,
        article_todo_id: i64,
        department_resource_id: Option<i64>,
        article_start: NaiveDateTime,
        now: NaiveDateTime,
        report: &mut GenerationReport,
    ) -> Result<(), GenerationError> {
        let article = &bundle.article;
        let mut cursor = article_start;
        let mut previous_op_id: Option<i64> = None;

        let mut steps: Vec<&ErpWorkplanStep> = bundle
            .steps
            .iter()
            .filter(|s| s.machine_level <= request.workplan_level)
            .collect();
        steps.sort_by_key(|s| s.position);

        for step in steps {
            let minutes = self.duration_engine.compute_leaf_duration(
                step.setup_time_minutes,
                step.unit_time_minutes,
                article.quantity,
            );

            // 机台资源解析
            let machine_resource_id = match step.machine_erp_id {
                Some(erp_id) => match bundle.machines.get(&erp_id) {
                    Some(row) => Some(ResourceCacheRepository::upsert_in(
                        tx,
                        ResourceType::Machine,
                        row.erp_id,
                        &row.name,
                    )?),
                    None => {
                        report.errors.push(format!(
                            "工序 {} 的机台 {} 在ERP中不存在",
                            step.name, erp_id
                        ));
                        None
                    }
                },
                None => None,
            };

            // 工序 upsert（按 erp_workplan_item_id 匹配）
            let existing = TodoRepository::find_child_by_workplan_item_in(
                tx,
                article_todo_id,
                step.erp_workplan_item_id,
            )?;
            let (op_id, effective_minutes) = match existing {
                Some(mut todo) => {
                    if todo.machine_resource_id.is_none() {
                        todo.machine_resource_id = machine_resource_id;
                    }
                    if todo.department_resource_id.is_none() {
                        todo.department_resource_id = department_resource_id;
                    }
                    if !todo.is_duration_manual {
                        todo.total_duration_minutes = Some(minutes);
                    }
                    let effective = todo.total_duration_minutes.unwrap_or(minutes);
                    // 串行重排: 起点回到游标，终点 = 起点 + 有效工时
                    todo.planned_start = Some(cursor);
                    todo.planned_end = Some(cursor + Duration::minutes(effective));
                    todo.setup_time_minutes = step.setup_time_minutes;
                    todo.run_time_minutes = step.unit_time_minutes;
                    todo.quantity = article.quantity;
                    todo.sort_order = step.position;
                    TodoRepository::update_in(tx, &todo, now)?;
                    report.updated_todos += 1;
                    (todo.todo_id, effective)
                }
                None => {
                    let mut todo = Todo::new(TodoType::Operation, step.name.clone(), now);
                    todo.parent_todo_id = Some(article_todo_id);
                    todo.erp_order_id = Some(head.erp_order_id);
                    todo.erp_article_id = Some(article.erp_article_id);
                    todo.erp_workplan_item_id = Some(step.erp_workplan_item_id);
                    todo.planned_start = Some(cursor);
                    todo.total_duration_minutes = Some(minutes);
                    todo.recompute_planned_end();
                    todo.setup_time_minutes = step.setup_time_minutes;
                    todo.run_time_minutes = step.unit_time_minutes;
                    todo.quantity = article.quantity;
                    todo.machine_resource_id = machine_resource_id;
                    todo.department_resource_id = department_resource_id;
                    todo.sort_order = step.position;
                    let id = TodoRepository::insert_in(tx, &todo)?;
                    report.created_todos += 1;
                    (id, minutes)
                }
            };

            // 相邻工序 FINISH_TO_START (lag 0)；同序对已存在的边复用
            if let Some(prev_id) = previous_op_id {
                let (_, created) = TodoDependencyRepository::create_if_absent_in(
                    tx,
                    prev_id,
                    op_id,
                    DependencyType::FinishToStart,
                    0,
                )?;
                if created {
                    report.created_dependencies += 1;
                }
            }

            cursor += Duration::minutes(effective_minutes);
            previous_op_id = Some(op_id);
        }

        Ok(())
    }
}
