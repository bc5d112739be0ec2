// ==========================================
// 生产计划排程核心 - 资源镜像仓储
// ==========================================
// 职责: resource_cache 表的数据访问
// 唯一性: (resource_type, erp_id) 为源键；upsert 以该键幂等
// ==========================================

use crate::domain::resource::ResourceCacheEntry;
use crate::domain::types::ResourceType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ResourceCacheRepository - 资源镜像仓储
// ==========================================
pub struct ResourceCacheRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ResourceCacheRepository {
    /// 创建新的ResourceCacheRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 以 (resource_type, erp_id) 幂等写入镜像条目，返回本地 resource_id
    pub fn upsert(
        &self,
        resource_type: ResourceType,
        erp_id: i64,
        name: &str,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::upsert_in(&conn, resource_type, erp_id, name)
    }

    /// 幂等写入（事务内变体）
    pub fn upsert_in(
        conn: &Connection,
        resource_type: ResourceType,
        erp_id: i64,
        name: &str,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"INSERT INTO resource_cache (resource_type, erp_id, name, is_active)
               VALUES (?, ?, ?, 1)
               ON CONFLICT(resource_type, erp_id)
               DO UPDATE SET name = excluded.name, is_active = 1"#,
            params![resource_type.to_db_str(), &erp_id, name],
        )?;

        let resource_id: i64 = conn.query_row(
            "SELECT resource_id FROM resource_cache WHERE resource_type = ? AND erp_id = ?",
            params![resource_type.to_db_str(), &erp_id],
            |row| row.get(0),
        )?;
        Ok(resource_id)
    }

    /// 按本地 resource_id 查询
    pub fn find_by_id(&self, resource_id: i64) -> RepositoryResult<Option<ResourceCacheEntry>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, resource_id)
    }

    /// 按本地 resource_id 查询（事务内变体）
    pub fn find_by_id_in(
        conn: &Connection,
        resource_id: i64,
    ) -> RepositoryResult<Option<ResourceCacheEntry>> {
        match conn.query_row(
            r#"SELECT resource_id, resource_type, erp_id, name, is_active
               FROM resource_cache WHERE resource_id = ?"#,
            params![resource_id],
            Self::map_row,
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按 (resource_type, erp_id) 查询
    pub fn find_by_erp_id(
        &self,
        resource_type: ResourceType,
        erp_id: i64,
    ) -> RepositoryResult<Option<ResourceCacheEntry>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT resource_id, resource_type, erp_id, name, is_active
               FROM resource_cache WHERE resource_type = ? AND erp_id = ?"#,
            params![resource_type.to_db_str(), erp_id],
            Self::map_row,
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按类型列出有效条目
    pub fn list_by_type(
        &self,
        resource_type: ResourceType,
    ) -> RepositoryResult<Vec<ResourceCacheEntry>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT resource_id, resource_type, erp_id, name, is_active
               FROM resource_cache
               WHERE resource_type = ? AND is_active = 1
               ORDER BY name"#,
        )?;
        let entries = stmt
            .query_map(params![resource_type.to_db_str()], Self::map_row)?
            .collect::<Result<Vec<ResourceCacheEntry>, _>>()?;
        Ok(entries)
    }

    /// 将一组 ERP 员工ID 映射为本地 resource_id（无镜像条目的 ID 被跳过）
    ///
    /// # 用途
    /// - 可见性过滤: 下属闭包(ERP ID) → 本地创建者集合
    pub fn map_employee_erp_ids(&self, erp_ids: &[i64]) -> RepositoryResult<Vec<i64>> {
        if erp_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;

        let ph = erp_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT resource_id FROM resource_cache WHERE resource_type = 'EMPLOYEE' AND erp_id IN ({})",
            ph
        );
        let values: Vec<Value> = erp_ids.iter().map(|id| Value::from(*id)).collect();

        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// 映射数据库行到 ResourceCacheEntry 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ResourceCacheEntry> {
        let type_str: String = row.get(1)?;
        Ok(ResourceCacheEntry {
            resource_id: row.get(0)?,
            resource_type: ResourceType::from_str(&type_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    format!("未知资源类型: {}", type_str).into(),
                )
            })?,
            erp_id: row.get(2)?,
            name: row.get(3)?,
            is_active: row.get(4)?,
        })
    }
}
