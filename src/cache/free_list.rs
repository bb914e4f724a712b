//! 空闲槽位链表
//!
//! 单链栈，链接保存在 [`SlotState::Free`] 中。

use super::slot::{Slot, SlotId, SlotState};

/// 空闲链表
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FreeList {
    head: Option<SlotId>,
    len: usize,
}

impl FreeList {
    /// 清空链表（不修改槽位）
    pub fn clear(&mut self) {
        self.head = None;
        self.len = 0;
    }

    /// 取出一个空闲槽位，链表为空时返回 None
    ///
    /// 取出的槽位处于 `Detached` 状态，由调用者负责装入索引或归还。
    pub fn acquire(&mut self, slots: &mut [Slot]) -> Option<SlotId> {
        let id = self.head?;
        match slots[id].state {
            SlotState::Free { next } => self.head = next,
            other => unreachable!("[CACHE] free list head {} is {:?}", id, other),
        }
        slots[id].state = SlotState::Detached;
        self.len -= 1;
        Some(id)
    }

    /// 归还槽位到链表头部
    ///
    /// 槽位必须已经离开哈希索引和 LRU 链表。
    pub fn release(&mut self, slots: &mut [Slot], id: SlotId) {
        let slot = &mut slots[id];
        assert!(
            slot.state == SlotState::Detached,
            "[CACHE] releasing slot {} in state {:?}",
            id,
            slot.state
        );
        slot.dirty = false;
        slot.lru_prev = None;
        slot.lru_next = None;
        slot.state = SlotState::Free { next: self.head };
        self.head = Some(id);
        self.len += 1;
    }

    /// 空闲槽位数量
    pub fn len(&self) -> usize {
        self.len
    }

    /// 链表头
    #[cfg(test)]
    pub fn head(&self) -> Option<SlotId> {
        self.head
    }
}
