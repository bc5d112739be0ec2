// ==========================================
// 生产计划排程核心 - 无头入口
// ==========================================
// 用途: 初始化数据库与 schema，校验版本后就绪
//       (HTTP 路由/认证由宿主应用接驳，不属于本核心)
// ==========================================

use pps_core::db;

#[tokio::main]
async fn main() {
    pps_core::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", pps_core::APP_NAME);
    tracing::info!("系统版本: {}", pps_core::VERSION);
    tracing::info!("==================================================");

    // 数据库路径: 首个命令行参数，缺省取系统数据目录
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(db::default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let conn = match db::open_sqlite_connection(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("数据库打开失败: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db::init_schema(&conn) {
        tracing::error!("schema 初始化失败: {}", e);
        std::process::exit(1);
    }

    match db::read_schema_version(&conn) {
        Ok(Some(version)) if version == db::CURRENT_SCHEMA_VERSION => {
            tracing::info!("schema_version = {}", version);
        }
        Ok(Some(version)) => {
            tracing::warn!(
                "schema_version 不一致: 库中 {} / 期望 {}",
                version,
                db::CURRENT_SCHEMA_VERSION
            );
        }
        Ok(None) => tracing::warn!("schema_version 表缺失"),
        Err(e) => tracing::error!("schema_version 读取失败: {}", e),
    }

    tracing::info!("排程核心就绪（库模式集成请参见 pps_core::api）");
}
