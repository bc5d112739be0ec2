// ==========================================
// 生产计划排程核心 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 内嵌 schema DDL，供主程序与测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（级联删除依赖它）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 解析默认数据库路径（<data_dir>/pps-core/pps.db）
///
/// 说明：
/// - data_dir 不可用时退回当前目录
pub fn default_db_path() -> String {
    let base = dirs::data_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    let dir = base.join("pps-core");
    let _ = std::fs::create_dir_all(&dir);
    dir.join("pps.db").to_string_lossy().to_string()
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 表清单:
/// - todo            排程节点（订单容器/工序容器/工序/个人待办）
/// - todo_segment    todo 的执行分段
/// - todo_dependency 前驱→后继 依赖边
/// - resource_cache  ERP 资源本地镜像（部门/机台/员工）
/// - conflict        冲突记录（由外部冲突检测器产出）
/// - schema_version  schema 版本标记
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS resource_cache (
            resource_id INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_type TEXT NOT NULL,
            erp_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            UNIQUE(resource_type, erp_id)
        );

        CREATE TABLE IF NOT EXISTS todo (
            todo_id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_todo_id INTEGER REFERENCES todo(todo_id) ON DELETE CASCADE,
            todo_type TEXT NOT NULL,
            title TEXT NOT NULL,
            -- ERP 关联字段: 仅用于再生成时的幂等匹配
            erp_order_id INTEGER,
            erp_article_id INTEGER,
            erp_workplan_item_id INTEGER,
            -- 排程字段
            planned_start TEXT,
            planned_end TEXT,
            actual_start TEXT,
            actual_end TEXT,
            status TEXT NOT NULL DEFAULT 'NEW',
            block_reason TEXT,
            -- 工时字段
            setup_time_minutes REAL NOT NULL DEFAULT 0,
            run_time_minutes REAL NOT NULL DEFAULT 0,
            quantity REAL NOT NULL DEFAULT 0,
            total_duration_minutes INTEGER,
            is_duration_manual INTEGER NOT NULL DEFAULT 0,
            -- 指派字段（语义上至多一个生效，三者独立可设）
            department_resource_id INTEGER REFERENCES resource_cache(resource_id),
            machine_resource_id INTEGER REFERENCES resource_cache(resource_id),
            employee_resource_id INTEGER REFERENCES resource_cache(resource_id),
            -- 归属（Eigene 可见性过滤依据）
            creator_employee_id INTEGER REFERENCES resource_cache(resource_id),
            priority INTEGER NOT NULL DEFAULT 0,
            delivery_date TEXT,
            customer_name TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            -- 乐观锁
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_todo_parent ON todo(parent_todo_id);
        CREATE INDEX IF NOT EXISTS idx_todo_erp_order ON todo(erp_order_id);
        CREATE INDEX IF NOT EXISTS idx_todo_type ON todo(todo_type);

        CREATE TABLE IF NOT EXISTS todo_segment (
            segment_id INTEGER PRIMARY KEY AUTOINCREMENT,
            todo_id INTEGER NOT NULL REFERENCES todo(todo_id) ON DELETE CASCADE,
            segment_index INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            machine_resource_id INTEGER REFERENCES resource_cache(resource_id),
            employee_resource_id INTEGER REFERENCES resource_cache(resource_id)
        );

        CREATE INDEX IF NOT EXISTS idx_segment_todo ON todo_segment(todo_id);

        CREATE TABLE IF NOT EXISTS todo_dependency (
            dependency_id INTEGER PRIMARY KEY AUTOINCREMENT,
            predecessor_id INTEGER NOT NULL REFERENCES todo(todo_id) ON DELETE CASCADE,
            successor_id INTEGER NOT NULL REFERENCES todo(todo_id) ON DELETE CASCADE,
            dependency_type TEXT NOT NULL DEFAULT 'FINISH_TO_START',
            lag_minutes INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            UNIQUE(predecessor_id, successor_id)
        );

        CREATE TABLE IF NOT EXISTS conflict (
            conflict_id INTEGER PRIMARY KEY AUTOINCREMENT,
            conflict_type TEXT NOT NULL,
            todo_id INTEGER NOT NULL REFERENCES todo(todo_id) ON DELETE CASCADE,
            related_todo_id INTEGER REFERENCES todo(todo_id) ON DELETE CASCADE,
            description TEXT NOT NULL,
            severity TEXT NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conflict_todo ON conflict(todo_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
