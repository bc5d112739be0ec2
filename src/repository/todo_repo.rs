// ==========================================
// 生产计划排程核心 - Todo 仓储
// ==========================================
// 职责: todo 表的数据访问，含乐观锁原语 apply_if_version_matches
// 红线: Repository 不含业务规则；派生字段重算由调用方闭包完成
// 约束: 所有查询参数化，防止 SQL 注入
// ==========================================

use crate::domain::todo::Todo;
use crate::domain::types::{TodoStatus, TodoType, VisibilityScope};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// todo 表列清单（SELECT 与 map_row 的索引必须一致）
const TODO_COLUMNS: &str = "todo_id, parent_todo_id, todo_type, title, \
    erp_order_id, erp_article_id, erp_workplan_item_id, \
    planned_start, planned_end, actual_start, actual_end, status, block_reason, \
    setup_time_minutes, run_time_minutes, quantity, total_duration_minutes, is_duration_manual, \
    department_resource_id, machine_resource_id, employee_resource_id, \
    creator_employee_id, priority, delivery_date, customer_name, sort_order, \
    version, created_at, updated_at";

/// 数据库时间格式
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
/// 数据库日期格式
const DATE_FMT: &str = "%Y-%m-%d";

// ==========================================
// TodoFilter - 列表查询过滤器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct TodoFilter {
    pub erp_order_id: Option<i64>,         // 订单过滤
    pub statuses: Vec<TodoStatus>,         // 状态集合 (空 = 不过滤)
    pub todo_types: Vec<TodoType>,         // 类型集合 (空 = 不过滤)
    pub date_from: Option<NaiveDateTime>,  // 区间起 (planned_end >= from)
    pub date_to: Option<NaiveDateTime>,    // 区间止 (planned_start <= to)
    pub resource_id: Option<i64>,          // 任一指派字段命中
    pub has_conflicts: Option<bool>,       // 存在未解决冲突
    pub parent_todo_id: Option<i64>,       // 父节点
    pub search: Option<String>,            // 标题模糊匹配
    pub skip: i64,                         // 分页偏移
    pub limit: Option<i64>,                // 分页大小 (None = 不限)
}

// ==========================================
// TodoRepository - 排程节点仓储
// ==========================================
pub struct TodoRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TodoRepository {
    /// 创建新的TodoRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 插入节点，返回分配的 todo_id
    pub fn insert(&self, todo: &Todo) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert_in(&conn, todo)
    }

    /// 插入节点（事务内变体，供生成器在同一事务中使用）
    pub fn insert_in(conn: &Connection, todo: &Todo) -> RepositoryResult<i64> {
        conn.execute(
            r#"INSERT INTO todo (
                parent_todo_id, todo_type, title,
                erp_order_id, erp_article_id, erp_workplan_item_id,
                planned_start, planned_end, actual_start, actual_end, status, block_reason,
                setup_time_minutes, run_time_minutes, quantity,
                total_duration_minutes, is_duration_manual,
                department_resource_id, machine_resource_id, employee_resource_id,
                creator_employee_id, priority, delivery_date, customer_name, sort_order,
                version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &todo.parent_todo_id,
                todo.todo_type.to_db_str(),
                &todo.title,
                &todo.erp_order_id,
                &todo.erp_article_id,
                &todo.erp_workplan_item_id,
                &todo.planned_start.map(|t| t.format(DATETIME_FMT).to_string()),
                &todo.planned_end.map(|t| t.format(DATETIME_FMT).to_string()),
                &todo.actual_start.map(|t| t.format(DATETIME_FMT).to_string()),
                &todo.actual_end.map(|t| t.format(DATETIME_FMT).to_string()),
                todo.status.to_db_str(),
                &todo.block_reason,
                &todo.setup_time_minutes,
                &todo.run_time_minutes,
                &todo.quantity,
                &todo.total_duration_minutes,
                &todo.is_duration_manual,
                &todo.department_resource_id,
                &todo.machine_resource_id,
                &todo.employee_resource_id,
                &todo.creator_employee_id,
                &todo.priority,
                &todo.delivery_date.map(|d| d.format(DATE_FMT).to_string()),
                &todo.customer_name,
                &todo.sort_order,
                &todo.version,
                &todo.created_at.format(DATETIME_FMT).to_string(),
                &todo.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// 全字段更新（事务内变体）
    ///
    /// # 说明
    /// - 系统侧写入（生成器再生成/rollup 回写走专用方法）
    /// - version 在 SQL 中 +1，满足“version 严格递增”不变式
    pub fn update_in(conn: &Connection, todo: &Todo, now: NaiveDateTime) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE todo SET
                parent_todo_id = ?, todo_type = ?, title = ?,
                erp_order_id = ?, erp_article_id = ?, erp_workplan_item_id = ?,
                planned_start = ?, planned_end = ?, actual_start = ?, actual_end = ?,
                status = ?, block_reason = ?,
                setup_time_minutes = ?, run_time_minutes = ?, quantity = ?,
                total_duration_minutes = ?, is_duration_manual = ?,
                department_resource_id = ?, machine_resource_id = ?, employee_resource_id = ?,
                creator_employee_id = ?, priority = ?, delivery_date = ?, customer_name = ?,
                sort_order = ?,
                version = version + 1, updated_at = ?
            WHERE todo_id = ?"#,
            params![
                &todo.parent_todo_id,
                todo.todo_type.to_db_str(),
                &todo.title,
                &todo.erp_order_id,
                &todo.erp_article_id,
                &todo.erp_workplan_item_id,
                &todo.planned_start.map(|t| t.format(DATETIME_FMT).to_string()),
                &todo.planned_end.map(|t| t.format(DATETIME_FMT).to_string()),
                &todo.actual_start.map(|t| t.format(DATETIME_FMT).to_string()),
                &todo.actual_end.map(|t| t.format(DATETIME_FMT).to_string()),
                todo.status.to_db_str(),
                &todo.block_reason,
                &todo.setup_time_minutes,
                &todo.run_time_minutes,
                &todo.quantity,
                &todo.total_duration_minutes,
                &todo.is_duration_manual,
                &todo.department_resource_id,
                &todo.machine_resource_id,
                &todo.employee_resource_id,
                &todo.creator_employee_id,
                &todo.priority,
                &todo.delivery_date.map(|d| d.format(DATE_FMT).to_string()),
                &todo.customer_name,
                &todo.sort_order,
                &now.format(DATETIME_FMT).to_string(),
                &todo.todo_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Todo".to_string(),
                id: todo.todo_id.to_string(),
            });
        }
        Ok(())
    }

    /// rollup 回写（事务内变体）: 只更新工时与计划结束
    ///
    /// # 说明
    /// - 系统侧重算写入，不做期望版本检查，但仍递增 version
    pub fn update_rollup_fields_in(
        conn: &Connection,
        todo_id: i64,
        total_duration_minutes: i64,
        planned_end: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE todo
               SET total_duration_minutes = ?, planned_end = ?,
                   version = version + 1, updated_at = ?
               WHERE todo_id = ?"#,
            params![
                &total_duration_minutes,
                &planned_end.map(|t| t.format(DATETIME_FMT).to_string()),
                &now.format(DATETIME_FMT).to_string(),
                &todo_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Todo".to_string(),
                id: todo_id.to_string(),
            });
        }
        Ok(())
    }

    /// 乐观锁更新原语
    ///
    /// # 协议
    /// 1. 事务内加载当前行
    /// 2. 调用方给定 expected_version 且与存储版本不一致 → VersionConflict
    ///    （携带双方版本号，未应用任何变更）
    /// 3. 否则执行 mutate 闭包（字段变更 + 派生字段重算由调用方完成），
    ///    version = 旧值 + 1，刷新 updated_at，整体持久化
    ///
    /// # 说明
    /// - 直接 PATCH 更新与甘特批量同步的更新项统一走此原语
    pub fn apply_if_version_matches<F>(
        &self,
        todo_id: i64,
        expected_version: Option<i64>,
        now: NaiveDateTime,
        mutate: F,
    ) -> RepositoryResult<Todo>
    where
        F: FnOnce(&mut Todo),
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // 1. 加载当前行
        let mut todo = Self::find_by_id_in(&tx, todo_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Todo".to_string(),
                id: todo_id.to_string(),
            }
        })?;

        // 2. 版本检查（被拒绝的写入不产生任何变更）
        if let Some(expected) = expected_version {
            if expected != todo.version {
                return Err(RepositoryError::VersionConflict {
                    todo_id,
                    expected,
                    actual: todo.version,
                });
            }
        }

        // 3. 应用变更并持久化
        let old_version = todo.version;
        mutate(&mut todo);
        todo.version = old_version + 1;
        todo.updated_at = now;

        let rows = tx.execute(
            r#"UPDATE todo SET
                parent_todo_id = ?, todo_type = ?, title = ?,
                erp_order_id = ?, erp_article_id = ?, erp_workplan_item_id = ?,
                planned_start = ?, planned_end = ?, actual_start = ?, actual_end = ?,
                status = ?, block_reason = ?,
                setup_time_minutes = ?, run_time_minutes = ?, quantity = ?,
                total_duration_minutes = ?, is_duration_manual = ?,
                department_resource_id = ?, machine_resource_id = ?, employee_resource_id = ?,
                creator_employee_id = ?, priority = ?, delivery_date = ?, customer_name = ?,
                sort_order = ?,
                version = ?, updated_at = ?
            WHERE todo_id = ? AND version = ?"#,
            params![
                &todo.parent_todo_id,
                todo.todo_type.to_db_str(),
                &todo.title,
                &todo.erp_order_id,
                &todo.erp_article_id,
                &todo.erp_workplan_item_id,
                &todo.planned_start.map(|t| t.format(DATETIME_FMT).to_string()),
                &todo.planned_end.map(|t| t.format(DATETIME_FMT).to_string()),
                &todo.actual_start.map(|t| t.format(DATETIME_FMT).to_string()),
                &todo.actual_end.map(|t| t.format(DATETIME_FMT).to_string()),
                todo.status.to_db_str(),
                &todo.block_reason,
                &todo.setup_time_minutes,
                &todo.run_time_minutes,
                &todo.quantity,
                &todo.total_duration_minutes,
                &todo.is_duration_manual,
                &todo.department_resource_id,
                &todo.machine_resource_id,
                &todo.employee_resource_id,
                &todo.creator_employee_id,
                &todo.priority,
                &todo.delivery_date.map(|d| d.format(DATE_FMT).to_string()),
                &todo.customer_name,
                &todo.sort_order,
                &todo.version,
                &todo.updated_at.format(DATETIME_FMT).to_string(),
                &todo_id,
                &old_version,
            ],
        )?;

        // 事务内重读后版本不可能漂移；0 行视为内部异常
        if rows == 0 {
            return Err(RepositoryError::InternalError(format!(
                "todo {} 乐观锁更新未命中任何行",
                todo_id
            )));
        }

        tx.commit()?;
        Ok(todo)
    }

    /// 删除节点（外键级联: 子节点/分段/依赖边/冲突一并删除）
    pub fn delete(&self, todo_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM todo WHERE todo_id = ?", params![todo_id])?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Todo".to_string(),
                id: todo_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按 todo_id 查询
    pub fn find_by_id(&self, todo_id: i64) -> RepositoryResult<Option<Todo>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, todo_id)
    }

    /// 按 todo_id 查询（事务内变体）
    pub fn find_by_id_in(conn: &Connection, todo_id: i64) -> RepositoryResult<Option<Todo>> {
        match conn.query_row(
            &format!("SELECT {} FROM todo WHERE todo_id = ?", TODO_COLUMNS),
            params![todo_id],
            Self::map_row,
        ) {
            Ok(todo) => Ok(Some(todo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询某 ERP 订单的根容器（幂等再生成匹配用）
    pub fn find_root_by_erp_order_in(
        conn: &Connection,
        erp_order_id: i64,
    ) -> RepositoryResult<Option<Todo>> {
        match conn.query_row(
            &format!(
                "SELECT {} FROM todo WHERE parent_todo_id IS NULL AND erp_order_id = ?",
                TODO_COLUMNS
            ),
            params![erp_order_id],
            Self::map_row,
        ) {
            Ok(todo) => Ok(Some(todo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询父节点下匹配 ERP 物料的容器（幂等再生成匹配用）
    pub fn find_child_by_erp_article_in(
        conn: &Connection,
        parent_todo_id: i64,
        erp_article_id: i64,
    ) -> RepositoryResult<Option<Todo>> {
        match conn.query_row(
            &format!(
                "SELECT {} FROM todo WHERE parent_todo_id = ? AND erp_article_id = ? AND todo_type = 'TASK' AND erp_workplan_item_id IS NULL",
                TODO_COLUMNS
            ),
            params![parent_todo_id, erp_article_id],
            Self::map_row,
        ) {
            Ok(todo) => Ok(Some(todo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询父节点下匹配工艺路线步骤的工序叶子（幂等再生成匹配用）
    pub fn find_child_by_workplan_item_in(
        conn: &Connection,
        parent_todo_id: i64,
        erp_workplan_item_id: i64,
    ) -> RepositoryResult<Option<Todo>> {
        match conn.query_row(
            &format!(
                "SELECT {} FROM todo WHERE parent_todo_id = ? AND erp_workplan_item_id = ?",
                TODO_COLUMNS
            ),
            params![parent_todo_id, erp_workplan_item_id],
            Self::map_row,
        ) {
            Ok(todo) => Ok(Some(todo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询父节点下同标题的 BOM 行待办（BOM 行无独立链接字段，按标题匹配）
    pub fn find_bom_child_by_title_in(
        conn: &Connection,
        parent_todo_id: i64,
        title: &str,
    ) -> RepositoryResult<Option<Todo>> {
        match conn.query_row(
            &format!(
                "SELECT {} FROM todo WHERE parent_todo_id = ? AND todo_type = 'TASK' AND title = ?",
                TODO_COLUMNS
            ),
            params![parent_todo_id, title],
            Self::map_row,
        ) {
            Ok(todo) => Ok(Some(todo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询直接子节点（sort_order 升序）
    pub fn find_children(&self, parent_todo_id: i64) -> RepositoryResult<Vec<Todo>> {
        let conn = self.get_conn()?;
        Self::find_children_in(&conn, parent_todo_id)
    }

    /// 查询直接子节点（事务内变体）
    pub fn find_children_in(
        conn: &Connection,
        parent_todo_id: i64,
    ) -> RepositoryResult<Vec<Todo>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM todo WHERE parent_todo_id = ? ORDER BY sort_order, todo_id",
            TODO_COLUMNS
        ))?;
        let todos = stmt
            .query_map(params![parent_todo_id], Self::map_row)?
            .collect::<Result<Vec<Todo>, _>>()?;
        Ok(todos)
    }

    /// 一次性加载整棵子树（根 + 全部后代）
    ///
    /// # 说明
    /// - rollup 在加载后的内存结构上做显式后序遍历，
    ///   避免递归期间反复访问存储
    /// - 树由构造保证无环（子节点创建时必须引用已存在的父节点）
    pub fn load_subtree(&self, root_id: i64) -> RepositoryResult<Vec<Todo>> {
        let conn = self.get_conn()?;
        Self::load_subtree_in(&conn, root_id)
    }

    /// 一次性加载整棵子树（事务内变体）
    pub fn load_subtree_in(conn: &Connection, root_id: i64) -> RepositoryResult<Vec<Todo>> {
        let root = match Self::find_by_id_in(conn, root_id)? {
            Some(t) => t,
            None => {
                return Err(RepositoryError::NotFound {
                    entity: "Todo".to_string(),
                    id: root_id.to_string(),
                })
            }
        };

        let mut all = vec![root];
        let mut frontier = vec![root_id];
        let mut seen: HashSet<i64> = HashSet::from([root_id]);

        // 逐层下探，直到无新的子节点
        while !frontier.is_empty() {
            let placeholders = frontier.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!(
                "SELECT {} FROM todo WHERE parent_todo_id IN ({}) ORDER BY sort_order, todo_id",
                TODO_COLUMNS, placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let values: Vec<Value> = frontier.iter().map(|id| Value::from(*id)).collect();
            let children = stmt
                .query_map(params_from_iter(values.iter()), Self::map_row)?
                .collect::<Result<Vec<Todo>, _>>()?;

            frontier = Vec::new();
            for child in children {
                if seen.insert(child.todo_id) {
                    frontier.push(child.todo_id);
                    all.push(child);
                }
            }
        }

        Ok(all)
    }

    /// 查询全部节点（系统侧使用: 冲突全量重检）
    pub fn list_all(&self) -> RepositoryResult<Vec<Todo>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM todo ORDER BY todo_id",
            TODO_COLUMNS
        ))?;
        let todos = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<Todo>, _>>()?;
        Ok(todos)
    }

    /// 过滤列表查询（含可见性范围与分页）
    ///
    /// # 返回
    /// - (total, page): 满足条件的总数 + 当前页
    pub fn list(
        &self,
        filter: &TodoFilter,
        scope: &VisibilityScope,
    ) -> RepositoryResult<(i64, Vec<Todo>)> {
        let conn = self.get_conn()?;

        let (where_clause, params) = Self::build_where(filter, scope);

        // 1. 总数
        let count_sql = format!("SELECT COUNT(*) FROM todo {}", where_clause);
        let total: i64 = conn.query_row(
            &count_sql,
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        // 2. 当前页
        let mut page_params = params;
        let mut page_sql = format!(
            "SELECT {} FROM todo {} ORDER BY planned_start IS NULL, planned_start, todo_id",
            TODO_COLUMNS, where_clause
        );
        if let Some(limit) = filter.limit {
            page_sql.push_str(" LIMIT ? OFFSET ?");
            page_params.push(Value::from(limit));
            page_params.push(Value::from(filter.skip));
        } else if filter.skip > 0 {
            page_sql.push_str(" LIMIT -1 OFFSET ?");
            page_params.push(Value::from(filter.skip));
        }

        let mut stmt = conn.prepare(&page_sql)?;
        let todos = stmt
            .query_map(params_from_iter(page_params.iter()), Self::map_row)?
            .collect::<Result<Vec<Todo>, _>>()?;

        Ok((total, todos))
    }

    /// 动态拼接 WHERE 子句（全部参数化）
    fn build_where(filter: &TodoFilter, scope: &VisibilityScope) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(order_id) = filter.erp_order_id {
            clauses.push("erp_order_id = ?".to_string());
            params.push(Value::from(order_id));
        }
        if !filter.statuses.is_empty() {
            let ph = filter.statuses.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("status IN ({})", ph));
            for s in &filter.statuses {
                params.push(Value::from(s.to_db_str().to_string()));
            }
        }
        if !filter.todo_types.is_empty() {
            let ph = filter.todo_types.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("todo_type IN ({})", ph));
            for t in &filter.todo_types {
                params.push(Value::from(t.to_db_str().to_string()));
            }
        }
        if let Some(from) = filter.date_from {
            clauses.push("planned_end >= ?".to_string());
            params.push(Value::from(from.format(DATETIME_FMT).to_string()));
        }
        if let Some(to) = filter.date_to {
            clauses.push("planned_start <= ?".to_string());
            params.push(Value::from(to.format(DATETIME_FMT).to_string()));
        }
        if let Some(resource_id) = filter.resource_id {
            clauses.push(
                "(department_resource_id = ? OR machine_resource_id = ? OR employee_resource_id = ?)"
                    .to_string(),
            );
            params.push(Value::from(resource_id));
            params.push(Value::from(resource_id));
            params.push(Value::from(resource_id));
        }
        if let Some(has_conflicts) = filter.has_conflicts {
            if has_conflicts {
                clauses.push(
                    "todo_id IN (SELECT todo_id FROM conflict WHERE resolved = 0)".to_string(),
                );
            } else {
                clauses.push(
                    "todo_id NOT IN (SELECT todo_id FROM conflict WHERE resolved = 0)".to_string(),
                );
            }
        }
        if let Some(parent_id) = filter.parent_todo_id {
            clauses.push("parent_todo_id = ?".to_string());
            params.push(Value::from(parent_id));
        }
        if let Some(search) = &filter.search {
            clauses.push("title LIKE ?".to_string());
            params.push(Value::from(format!("%{}%", search)));
        }

        // 可见性范围: 仅作用于 EIGENE
        match scope {
            VisibilityScope::ExcludeEigene => {
                clauses.push("todo_type != 'EIGENE'".to_string());
            }
            VisibilityScope::EigeneCreators(ids) if ids.is_empty() => {
                clauses.push("todo_type != 'EIGENE'".to_string());
            }
            VisibilityScope::EigeneCreators(ids) => {
                let ph = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                clauses.push(format!(
                    "(todo_type != 'EIGENE' OR creator_employee_id IN ({}))",
                    ph
                ));
                for id in ids {
                    params.push(Value::from(*id));
                }
            }
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (where_clause, params)
    }

    /// 映射数据库行到 Todo 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Todo> {
        let type_str: String = row.get(2)?;
        let status_str: String = row.get(11)?;

        Ok(Todo {
            todo_id: row.get(0)?,
            parent_todo_id: row.get(1)?,
            todo_type: TodoType::from_str(&type_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("未知节点类型: {}", type_str).into(),
                )
            })?,
            title: row.get(3)?,
            erp_order_id: row.get(4)?,
            erp_article_id: row.get(5)?,
            erp_workplan_item_id: row.get(6)?,
            planned_start: parse_opt_datetime(row, 7)?,
            planned_end: parse_opt_datetime(row, 8)?,
            actual_start: parse_opt_datetime(row, 9)?,
            actual_end: parse_opt_datetime(row, 10)?,
            status: TodoStatus::from_str(&status_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    11,
                    rusqlite::types::Type::Text,
                    format!("未知状态: {}", status_str).into(),
                )
            })?,
            block_reason: row.get(12)?,
            setup_time_minutes: row.get(13)?,
            run_time_minutes: row.get(14)?,
            quantity: row.get(15)?,
            total_duration_minutes: row.get(16)?,
            is_duration_manual: row.get(17)?,
            department_resource_id: row.get(18)?,
            machine_resource_id: row.get(19)?,
            employee_resource_id: row.get(20)?,
            creator_employee_id: row.get(21)?,
            priority: row.get(22)?,
            delivery_date: row
                .get::<_, Option<String>>(23)?
                .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok()),
            customer_name: row.get(24)?,
            sort_order: row.get(25)?,
            version: row.get(26)?,
            created_at: parse_datetime(row, 27)?,
            updated_at: parse_datetime(row, 28)?,
        })
    }
}

/// 解析非空时间列
fn parse_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 解析可空时间列
fn parse_opt_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) => NaiveDateTime::parse_from_str(&s, DATETIME_FMT)
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            }),
        None => Ok(None),
    }
}
