//! LRU 双向链表
//!
//! 头部为最近使用，尾部为唯一的驱逐候选。链接保存在槽位的
//! `lru_prev` / `lru_next` 中。

use super::slot::{Slot, SlotId};

/// LRU 链表
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LruList {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl LruList {
    /// 清空链表（不修改槽位）
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// 最近使用的槽位
    #[cfg(test)]
    pub fn head(&self) -> Option<SlotId> {
        self.head
    }

    /// 驱逐候选
    pub fn tail(&self) -> Option<SlotId> {
        self.tail
    }

    /// 链表中的槽位数量
    pub fn len(&self) -> usize {
        self.len
    }

    /// 把槽位从当前位置摘下（头、尾或中间）
    pub fn remove(&mut self, slots: &mut [Slot], id: SlotId) {
        let prev = slots[id].lru_prev;
        let next = slots[id].lru_next;
        debug_assert!(
            prev.is_some() || self.head == Some(id),
            "[CACHE] slot {} not in LRU list",
            id
        );

        match prev {
            Some(p) => slots[p].lru_next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => slots[n].lru_prev = prev,
            None => self.tail = prev,
        }

        slots[id].lru_prev = None;
        slots[id].lru_next = None;
        self.len -= 1;
    }

    /// 插入到头部（成为最近使用）
    pub fn insert_front(&mut self, slots: &mut [Slot], id: SlotId) {
        slots[id].lru_prev = None;
        slots[id].lru_next = self.head;

        match self.head {
            Some(h) => slots[h].lru_prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
    }

    /// 命中时移到头部，已在头部则不动
    pub fn touch(&mut self, slots: &mut [Slot], id: SlotId) {
        if self.head == Some(id) {
            return;
        }
        self.remove(slots, id);
        self.insert_front(slots, id);
    }

    /// 从最近使用到最久未使用遍历
    pub fn iter<'a>(&self, slots: &'a [Slot]) -> impl Iterator<Item = SlotId> + 'a {
        let mut cur = self.head;
        core::iter::from_fn(move || {
            let id = cur?;
            cur = slots[id].lru_next;
            Some(id)
        })
    }
}
