// ==========================================
// 生产计划排程核心 - API 层
// ==========================================
// 职责: 提供业务 API 接口（传输无关; HTTP 路由由宿主应用接驳）
// ==========================================

pub mod conflict_api;
pub mod dependency_api;
pub mod error;
pub mod gantt_api;
pub mod generation_api;
pub mod todo_api;

// 重导出核心类型
pub use conflict_api::{ConflictApi, ConflictCheckResponse};
pub use dependency_api::{CreateDependencyRequest, CreateDependencyResponse, DependencyApi};
pub use error::{ApiError, ApiResult};
pub use gantt_api::{
    GanttApi, GanttDataResponse, GanttLink, GanttLinkCreate, GanttSyncError, GanttSyncRequest,
    GanttSyncResponse, GanttTask, GanttTaskCreate, GanttTaskUpdate,
};
pub use generation_api::GenerationApi;
pub use todo_api::{
    CreateTodoRequest, SegmentSpec, TodoApi, TodoListItem, TodoListResponse, UpdateTodoRequest,
};
