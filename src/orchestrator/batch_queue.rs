//! 批次队列
//!
//! 把有序工作项切成固定大小的批次，按 FIFO 顺序出队。

use crate::error::ConfigError;
use crate::models::{Batch, WorkItem};
use std::collections::VecDeque;

/// 待分发批次队列
#[derive(Debug, Default)]
pub struct BatchQueue {
    pending: VecDeque<Batch>,
    total_batches: usize,
    total_items: usize,
}

impl BatchQueue {
    /// 切分工作项
    ///
    /// 连续切块，除最后一块外每块恰好 `batch_size` 个；不重排、不丢弃、不重复。
    /// 空输入得到空队列，由调用方决定跳过本次运行。
    pub fn load(items: Vec<WorkItem>, batch_size: usize) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(0));
        }

        let total_items = items.len();
        let pending: VecDeque<Batch> = items
            .chunks(batch_size)
            .zip(1u64..)
            .map(|(chunk, batch_id)| Batch::new(batch_id, chunk.to_vec()))
            .collect();

        Ok(Self {
            total_batches: pending.len(),
            pending,
            total_items,
        })
    }

    /// 取出下一个批次
    pub fn pop_front(&mut self) -> Option<Batch> {
        self.pending.pop_front()
    }

    /// 剩余未分发的批次数
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 创建过的批次总数
    pub fn total_batches(&self) -> usize {
        self.total_batches
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    /// 查看剩余批次（不出队）
    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.pending.iter()
    }
}
