// ==========================================
// 生产计划排程核心 - 依赖边仓储
// ==========================================
// 职责: todo_dependency 表的数据访问
// 唯一性: (predecessor, successor) 有序对至多一条边，重复创建复用既有边
// 已知开放问题: 创建时不做环检测（详见测试 dependency_graph_test）
// ==========================================

use crate::domain::dependency::TodoDependency;
use crate::domain::types::DependencyType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// TodoDependencyRepository - 依赖边仓储
// ==========================================
pub struct TodoDependencyRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TodoDependencyRepository {
    /// 创建新的TodoDependencyRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建依赖边；同序对已存在时复用既有边
    ///
    /// # 返回
    /// - Ok((dependency_id, created)): created=false 表示复用
    pub fn create_if_absent(
        &self,
        predecessor_id: i64,
        successor_id: i64,
        dependency_type: DependencyType,
        lag_minutes: i64,
    ) -> RepositoryResult<(i64, bool)> {
        let conn = self.get_conn()?;
        Self::create_if_absent_in(&conn, predecessor_id, successor_id, dependency_type, lag_minutes)
    }

    /// 创建依赖边（事务内变体）
    pub fn create_if_absent_in(
        conn: &Connection,
        predecessor_id: i64,
        successor_id: i64,
        dependency_type: DependencyType,
        lag_minutes: i64,
    ) -> RepositoryResult<(i64, bool)> {
        // 1. 查找既有边
        if let Some(existing) = Self::find_by_pair_in(conn, predecessor_id, successor_id)? {
            return Ok((existing.dependency_id, false));
        }

        // 2. 插入新边
        conn.execute(
            r#"INSERT INTO todo_dependency (
                predecessor_id, successor_id, dependency_type, lag_minutes, is_active
            ) VALUES (?, ?, ?, ?, 1)"#,
            params![
                &predecessor_id,
                &successor_id,
                dependency_type.to_db_str(),
                &lag_minutes,
            ],
        )?;

        Ok((conn.last_insert_rowid(), true))
    }

    /// 按有序对查询（事务内变体）
    pub fn find_by_pair_in(
        conn: &Connection,
        predecessor_id: i64,
        successor_id: i64,
    ) -> RepositoryResult<Option<TodoDependency>> {
        match conn.query_row(
            r#"SELECT dependency_id, predecessor_id, successor_id, dependency_type, lag_minutes, is_active
               FROM todo_dependency
               WHERE predecessor_id = ? AND successor_id = ?"#,
            params![predecessor_id, successor_id],
            Self::map_row,
        ) {
            Ok(dep) => Ok(Some(dep)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按 dependency_id 查询
    pub fn find_by_id(&self, dependency_id: i64) -> RepositoryResult<Option<TodoDependency>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT dependency_id, predecessor_id, successor_id, dependency_type, lag_minutes, is_active
               FROM todo_dependency
               WHERE dependency_id = ?"#,
            params![dependency_id],
            Self::map_row,
        ) {
            Ok(dep) => Ok(Some(dep)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询全部依赖边
    pub fn list_all(&self) -> RepositoryResult<Vec<TodoDependency>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT dependency_id, predecessor_id, successor_id, dependency_type, lag_minutes, is_active
               FROM todo_dependency
               ORDER BY dependency_id"#,
        )?;
        let deps = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<TodoDependency>, _>>()?;
        Ok(deps)
    }

    /// 查询与某 todo 相连的边（作为前驱或后继）
    pub fn find_for_todo(&self, todo_id: i64) -> RepositoryResult<Vec<TodoDependency>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT dependency_id, predecessor_id, successor_id, dependency_type, lag_minutes, is_active
               FROM todo_dependency
               WHERE predecessor_id = ? OR successor_id = ?
               ORDER BY dependency_id"#,
        )?;
        let deps = stmt
            .query_map(params![todo_id, todo_id], Self::map_row)?
            .collect::<Result<Vec<TodoDependency>, _>>()?;
        Ok(deps)
    }

    /// 查询两端都落在给定节点集合内的生效边（甘特导出用）
    pub fn find_active_within(&self, todo_ids: &[i64]) -> RepositoryResult<Vec<TodoDependency>> {
        if todo_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;

        let ph = todo_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            r#"SELECT dependency_id, predecessor_id, successor_id, dependency_type, lag_minutes, is_active
               FROM todo_dependency
               WHERE is_active = 1
                 AND predecessor_id IN ({ph})
                 AND successor_id IN ({ph})
               ORDER BY dependency_id"#,
            ph = ph
        );

        let mut values: Vec<Value> = todo_ids.iter().map(|id| Value::from(*id)).collect();
        values.extend(todo_ids.iter().map(|id| Value::from(*id)));

        let mut stmt = conn.prepare(&sql)?;
        let deps = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<TodoDependency>, _>>()?;
        Ok(deps)
    }

    /// 删除依赖边
    pub fn delete(&self, dependency_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM todo_dependency WHERE dependency_id = ?",
            params![dependency_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "TodoDependency".to_string(),
                id: dependency_id.to_string(),
            });
        }
        Ok(())
    }

    /// 映射数据库行到 TodoDependency 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<TodoDependency> {
        let type_str: String = row.get(3)?;
        Ok(TodoDependency {
            dependency_id: row.get(0)?,
            predecessor_id: row.get(1)?,
            successor_id: row.get(2)?,
            dependency_type: DependencyType::from_str(&type_str),
            lag_minutes: row.get(4)?,
            is_active: row.get(5)?,
        })
    }
}
