// ==========================================
// 生产计划排程核心 - 执行分段仓储
// ==========================================
// 职责: todo_segment 表的数据访问
// 红线: 分段集合替换必须原子（删旧 + 插新 + 父节点起止重算，同一事务）
// ==========================================

use crate::domain::todo::TodoSegment;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 数据库时间格式
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// NewSegment - 分段写入载荷
// ==========================================
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub start_time: NaiveDateTime,         // 分段开始
    pub end_time: NaiveDateTime,           // 分段结束
    pub machine_resource_id: Option<i64>,  // 机台覆盖
    pub employee_resource_id: Option<i64>, // 员工覆盖
}

// ==========================================
// TodoSegmentRepository - 分段仓储
// ==========================================
pub struct TodoSegmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TodoSegmentRepository {
    /// 创建新的TodoSegmentRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 原子替换某 todo 的分段集合
    ///
    /// # 协议
    /// 1. 校验 todo 存在
    /// 2. 删除旧分段，按给定顺序插入新分段（segment_index 从 0 重编）
    /// 3. 父 todo 的 planned_start/planned_end 重算为新分段的 min/max，
    ///    version + 1（系统侧写入，无期望版本检查）
    ///
    /// # 返回
    /// - Ok(segments): 插入后的分段（含分配的ID）
    pub fn replace_for_todo(
        &self,
        todo_id: i64,
        segments: &[NewSegment],
        now: NaiveDateTime,
    ) -> RepositoryResult<Vec<TodoSegment>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // 1. 校验 todo 存在
        let exists: Option<i64> = match tx.query_row(
            "SELECT todo_id FROM todo WHERE todo_id = ?",
            params![todo_id],
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };
        if exists.is_none() {
            return Err(RepositoryError::NotFound {
                entity: "Todo".to_string(),
                id: todo_id.to_string(),
            });
        }

        // 2. 删旧插新
        tx.execute(
            "DELETE FROM todo_segment WHERE todo_id = ?",
            params![todo_id],
        )?;

        let mut inserted = Vec::with_capacity(segments.len());
        for (index, seg) in segments.iter().enumerate() {
            tx.execute(
                r#"INSERT INTO todo_segment (
                    todo_id, segment_index, start_time, end_time,
                    machine_resource_id, employee_resource_id
                ) VALUES (?, ?, ?, ?, ?, ?)"#,
                params![
                    &todo_id,
                    &(index as i64),
                    &seg.start_time.format(DATETIME_FMT).to_string(),
                    &seg.end_time.format(DATETIME_FMT).to_string(),
                    &seg.machine_resource_id,
                    &seg.employee_resource_id,
                ],
            )?;
            inserted.push(TodoSegment {
                segment_id: tx.last_insert_rowid(),
                todo_id,
                segment_index: index as i64,
                start_time: seg.start_time,
                end_time: seg.end_time,
                machine_resource_id: seg.machine_resource_id,
                employee_resource_id: seg.employee_resource_id,
            });
        }

        // 3. 父节点起止重算为 min/max（分段为空时起止保持不变）
        if !inserted.is_empty() {
            let min_start = inserted.iter().map(|s| s.start_time).min();
            let max_end = inserted.iter().map(|s| s.end_time).max();
            tx.execute(
                r#"UPDATE todo
                   SET planned_start = ?, planned_end = ?,
                       version = version + 1, updated_at = ?
                   WHERE todo_id = ?"#,
                params![
                    &min_start.map(|t| t.format(DATETIME_FMT).to_string()),
                    &max_end.map(|t| t.format(DATETIME_FMT).to_string()),
                    &now.format(DATETIME_FMT).to_string(),
                    &todo_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// 查询某 todo 的分段（segment_index 升序）
    pub fn find_by_todo(&self, todo_id: i64) -> RepositoryResult<Vec<TodoSegment>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT segment_id, todo_id, segment_index, start_time, end_time,
                      machine_resource_id, employee_resource_id
               FROM todo_segment
               WHERE todo_id = ?
               ORDER BY segment_index"#,
        )?;

        let segments = stmt
            .query_map(params![todo_id], Self::map_row)?
            .collect::<Result<Vec<TodoSegment>, _>>()?;
        Ok(segments)
    }

    /// 映射数据库行到 TodoSegment 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<TodoSegment> {
        Ok(TodoSegment {
            segment_id: row.get(0)?,
            todo_id: row.get(1)?,
            segment_index: row.get(2)?,
            start_time: parse_datetime(row, 3)?,
            end_time: parse_datetime(row, 4)?,
            machine_resource_id: row.get(5)?,
            employee_resource_id: row.get(6)?,
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
