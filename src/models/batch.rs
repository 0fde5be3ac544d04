use std::sync::Arc;

/// 工作项（本领域中是一个 URL）
pub type WorkItem = String;

/// 批次：一段不可变、有序的工作项
///
/// `batch_id` 从 1 开始，在一次运行中单调递增，不会复用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub batch_id: u64,
    pub items: Arc<[WorkItem]>,
}

impl Batch {
    pub fn new(batch_id: u64, items: impl Into<Arc<[WorkItem]>>) -> Self {
        Self {
            batch_id,
            items: items.into(),
        }
    }

    /// 工作项数量
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
