//! 缓存槽位结构
//!
//! 槽位存放在固定大小的数组中，所有链接都是数组下标（[`SlotId`]），
//! 不存在悬垂指针。
//!
//! 原先由一个指针字段兼任的两种链接（哈希链 / 空闲链）在这里拆成
//! [`SlotState`] 的不同变体：空闲槽位只有空闲链链接，缓存槽位只有哈希链链接，
//! 因此"空闲槽位出现在哈希链中"在类型层面就无法表达。

use crate::consts::BLOCK_SIZE;
use crate::types::{BlockKey, SectorBuf};
use alloc::boxed::Box;
use alloc::vec::Vec;

/// 槽位编号（槽位数组下标）
pub type SlotId = usize;

/// 槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// 在空闲链表中，`next` 为链表中的下一个空闲槽位
    Free { next: Option<SlotId> },
    /// 已从空闲链表或驱逐中取出、尚未装入索引的过渡状态
    ///
    /// 只在单次操作内部出现，操作结束时槽位要么 `Cached` 要么 `Free`。
    Detached,
    /// 持有有效数据，位于某个哈希桶链中，`hash_next` 为链中的下一个槽位
    Cached { hash_next: Option<SlotId> },
}

/// 缓存槽位
pub(crate) struct Slot {
    /// 槽位对应的 (驱动器, 扇区)，仅在 `Cached` 状态下有意义
    pub key: BlockKey,
    /// 数据与设备内容不一致，需要写回
    pub dirty: bool,
    /// 链接状态
    pub state: SlotState,
    /// LRU 链表前驱（更近使用的一侧）
    pub lru_prev: Option<SlotId>,
    /// LRU 链表后继（更久未使用的一侧）
    pub lru_next: Option<SlotId>,
    /// 扇区数据
    pub data: SectorBuf,
}

impl Slot {
    /// 创建清零的槽位
    pub fn new() -> Self {
        Self {
            key: BlockKey::new(0, 0),
            dirty: false,
            state: SlotState::Detached,
            lru_prev: None,
            lru_next: None,
            data: [0u8; BLOCK_SIZE],
        }
    }

    /// 槽位是否持有有效的缓存数据
    pub fn is_cached(&self) -> bool {
        matches!(self.state, SlotState::Cached { .. })
    }

    /// 槽位是否在空闲链表中
    #[cfg(test)]
    pub fn is_free(&self) -> bool {
        matches!(self.state, SlotState::Free { .. })
    }

    /// 哈希链中的下一个槽位
    ///
    /// 只有缓存槽位可能出现在哈希链中；其他状态说明簿记已损坏。
    pub fn chain_next(&self) -> Option<SlotId> {
        match self.state {
            SlotState::Cached { hash_next } => hash_next,
            other => unreachable!("[CACHE] non-cached slot in hash chain: {:?}", other),
        }
    }

    /// 修改哈希链中的下一个槽位
    pub fn set_chain_next(&mut self, next: Option<SlotId>) {
        match &mut self.state {
            SlotState::Cached { hash_next } => *hash_next = next,
            other => unreachable!("[CACHE] relinking non-cached slot: {:?}", other),
        }
    }

    /// 恢复初始状态（不清空数据，数据在重新装入时覆盖）
    pub fn reset(&mut self) {
        self.key = BlockKey::new(0, 0);
        self.dirty = false;
        self.state = SlotState::Detached;
        self.lru_prev = None;
        self.lru_next = None;
    }
}

impl core::fmt::Debug for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Slot")
            .field("key", &self.key)
            .field("dirty", &self.dirty)
            .field("state", &self.state)
            .field("lru_prev", &self.lru_prev)
            .field("lru_next", &self.lru_next)
            .finish()
    }
}

/// 分配槽位池
///
/// 池在构造时一次性分配，之后不再增长。
pub(crate) fn new_pool(capacity: usize) -> Box<[Slot]> {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, Slot::new);
    slots.into_boxed_slice()
}
