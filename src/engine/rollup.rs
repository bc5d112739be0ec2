// ==========================================
// 生产计划排程核心 - 工时汇总引擎 (Rollup)
// ==========================================
// 职责: 容器工时 = 直接与间接子节点工时之和（自底向上）
// 红线: is_duration_manual 的容器不回写
// 实现: 整棵子树一次加载，在内存结构上显式后序遍历，
//       避免递归期间反复访问存储；树由构造保证无环
// ==========================================

use crate::domain::todo::Todo;
use crate::engine::duration::{EMPTY_CONTAINER_MINUTES, MIN_DURATION_MINUTES};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::todo_repo::TodoRepository;
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// RollupEngine - 容器工时汇总
// ==========================================
pub struct RollupEngine {
    conn: Arc<Mutex<Connection>>,
}

impl RollupEngine {
    /// 创建新的RollupEngine实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 对容器执行一次工时汇总（独立事务）
    ///
    /// # 返回
    /// - Ok(minutes): 容器的汇总工时
    ///
    /// # 幂等性
    /// - 无中间变更时重复调用结果一致；仅在值实际变化时回写
    ///   （因此重复调用不产生多余的 version 递增）
    pub fn rollup(&self, container_id: i64, now: NaiveDateTime) -> RepositoryResult<i64> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction()?;

        let total = Self::rollup_in(&tx, container_id, now)?;

        tx.commit()?;
        Ok(total)
    }

    /// 事务内汇总（生成器在其生成事务中复用）
    ///
    /// # 步骤
    /// 1. 一次加载整棵子树
    /// 2. 后序遍历: 叶子取存储工时（缺省取下限 15），容器取子节点之和
    /// 3. 非 manual 且值变化的容器回写工时与 planned_end（version + 1）
    pub fn rollup_in(
        conn: &Connection,
        container_id: i64,
        now: NaiveDateTime,
    ) -> RepositoryResult<i64> {
        // 1. 加载子树并建立 父→子 索引
        let all = TodoRepository::load_subtree_in(conn, container_id)?;
        let mut children: HashMap<i64, Vec<&Todo>> = HashMap::new();
        let mut by_id: HashMap<i64, &Todo> = HashMap::new();
        for todo in &all {
            by_id.insert(todo.todo_id, todo);
            if let Some(parent_id) = todo.parent_todo_id {
                children.entry(parent_id).or_default().push(todo);
            }
        }

        // 2. 后序遍历计算，收集回写项
        let mut updates: Vec<(i64, i64, Option<NaiveDateTime>)> = Vec::new();
        let total = Self::compute_subtree(container_id, &by_id, &children, &mut updates);

        // 3. 回写（仅值变化的容器）
        for (todo_id, minutes, planned_end) in updates {
            TodoRepository::update_rollup_fields_in(conn, todo_id, minutes, planned_end, now)?;
        }

        tracing::debug!(container_id, total, "rollup 完成");
        Ok(total)
    }

    /// 后序遍历: 返回节点的有效工时，并在 updates 中收集需要回写的容器
    fn compute_subtree(
        todo_id: i64,
        by_id: &HashMap<i64, &Todo>,
        children: &HashMap<i64, Vec<&Todo>>,
        updates: &mut Vec<(i64, i64, Option<NaiveDateTime>)>,
    ) -> i64 {
        let todo = match by_id.get(&todo_id) {
            Some(t) => *t,
            None => return 0,
        };

        // 叶子: 取存储工时，缺省取引擎下限
        if !todo.is_container() {
            return todo.total_duration_minutes.unwrap_or(MIN_DURATION_MINUTES);
        }

        let child_list = children.get(&todo_id);
        let sum: i64 = match child_list {
            Some(list) => list
                .iter()
                .map(|child| Self::compute_subtree(child.todo_id, by_id, children, updates))
                .sum(),
            None => 0,
        };

        // 人工覆盖的容器: 保留存储值，不回写
        if todo.is_duration_manual {
            return todo.total_duration_minutes.unwrap_or(sum);
        }

        // 无子节点容器取占位工时，避免零宽节点
        let effective = if child_list.map(|l| !l.is_empty()).unwrap_or(false) {
            sum
        } else {
            EMPTY_CONTAINER_MINUTES
        };

        let new_end = todo
            .planned_start
            .map(|start| start + Duration::minutes(effective));

        // 仅在值实际变化时回写，保证幂等
        if todo.total_duration_minutes != Some(effective) || todo.planned_end != new_end {
            updates.push((todo_id, effective, new_end));
        }

        effective
    }
}
