// ==========================================
// 生产计划排程核心 - 冲突仓储
// ==========================================
// 职责: conflict 表的数据访问（存储与提供查询；判定规则在外部检测器）
// ==========================================

use crate::domain::conflict::Conflict;
use crate::domain::types::{ConflictSeverity, ConflictType};
use crate::gateway::conflict_detector::DetectedConflict;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 数据库时间格式
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// ConflictRepository - 冲突仓储
// ==========================================
pub struct ConflictRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ConflictRepository {
    /// 创建新的ConflictRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 以检测器产出原子替换未解决冲突集
    ///
    /// # 协议
    /// - 同一事务内: 删除全部 resolved = 0 的行，插入新产出
    /// - 已解决的行保留为历史（不做自动重解决）
    ///
    /// # 返回
    /// - Ok(count): 插入的冲突数
    pub fn replace_unresolved(
        &self,
        detected: &[DetectedConflict],
        now: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM conflict WHERE resolved = 0", [])?;

        let mut count = 0;
        for c in detected {
            tx.execute(
                r#"INSERT INTO conflict (
                    conflict_type, todo_id, related_todo_id, description, severity,
                    resolved, created_at
                ) VALUES (?, ?, ?, ?, ?, 0, ?)"#,
                params![
                    c.conflict_type.to_db_str(),
                    &c.todo_id,
                    &c.related_todo_id,
                    &c.description,
                    c.severity.to_db_str(),
                    &now.format(DATETIME_FMT).to_string(),
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    /// 冲突列表查询
    pub fn list(
        &self,
        todo_id: Option<i64>,
        resolved: Option<bool>,
    ) -> RepositoryResult<Vec<Conflict>> {
        let conn = self.get_conn()?;

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(id) = todo_id {
            clauses.push("todo_id = ?".to_string());
            values.push(Value::from(id));
        }
        if let Some(r) = resolved {
            clauses.push("resolved = ?".to_string());
            values.push(Value::from(r));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            r#"SELECT conflict_id, conflict_type, todo_id, related_todo_id,
                      description, severity, resolved, created_at
               FROM conflict {} ORDER BY conflict_id"#,
            where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let conflicts = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<Conflict>, _>>()?;
        Ok(conflicts)
    }

    /// 按节点集合统计未解决冲突数
    pub fn count_open_for_todos(
        &self,
        todo_ids: &[i64],
    ) -> RepositoryResult<HashMap<i64, i64>> {
        if todo_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.get_conn()?;

        let ph = todo_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            r#"SELECT todo_id, COUNT(*) FROM conflict
               WHERE resolved = 0 AND todo_id IN ({})
               GROUP BY todo_id"#,
            ph
        );
        let values: Vec<Value> = todo_ids.iter().map(|id| Value::from(*id)).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<(i64, i64)>, _>>()?;
        Ok(rows.into_iter().collect())
    }

    /// 将冲突标记为已解决（人工显式操作）
    pub fn resolve(&self, conflict_id: i64) -> RepositoryResult<Conflict> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            "UPDATE conflict SET resolved = 1 WHERE conflict_id = ?",
            params![conflict_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Conflict".to_string(),
                id: conflict_id.to_string(),
            });
        }

        conn.query_row(
            r#"SELECT conflict_id, conflict_type, todo_id, related_todo_id,
                      description, severity, resolved, created_at
               FROM conflict WHERE conflict_id = ?"#,
            params![conflict_id],
            Self::map_row,
        )
        .map_err(Into::into)
    }

    /// 映射数据库行到 Conflict 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Conflict> {
        let type_str: String = row.get(1)?;
        let severity_str: String = row.get(5)?;
        let created_raw: String = row.get(7)?;
        Ok(Conflict {
            conflict_id: row.get(0)?,
            conflict_type: ConflictType::from_str(&type_str),
            todo_id: row.get(2)?,
            related_todo_id: row.get(3)?,
            description: row.get(4)?,
            severity: ConflictSeverity::from_str(&severity_str),
            resolved: row.get(6)?,
            created_at: NaiveDateTime::parse_from_str(&created_raw, DATETIME_FMT).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
        })
    }
}
