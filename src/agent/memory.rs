//! 任务记忆：objective → 最近一次 TaskResult
//!
//! 按 objective upsert，历史按首次写入顺序返回；所有读操作返回副本。

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::agent::types::TaskResult;

#[derive(Debug, Default)]
pub struct TaskMemory {
    tasks: RwLock<Vec<TaskResult>>,
}

impl TaskMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<TaskResult>> {
        self.tasks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<TaskResult>> {
        self.tasks.write().unwrap_or_else(|e| e.into_inner())
    }

    /// 同一 objective 覆盖原记录，位置不变
    pub fn store_task(&self, task: &TaskResult) {
        let mut tasks = self.write();
        match tasks.iter_mut().find(|t| t.objective == task.objective) {
            Some(existing) => *existing = task.clone(),
            None => tasks.push(task.clone()),
        }
    }

    pub fn get_task_history(&self) -> Vec<TaskResult> {
        self.read().clone()
    }

    pub fn get_task(&self, objective: &str) -> Option<TaskResult> {
        self.read().iter().find(|t| t.objective == objective).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}
