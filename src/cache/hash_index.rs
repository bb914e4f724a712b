//! 哈希索引：(驱动器, 扇区) → 槽位
//!
//! 固定 [`HASH_SIZE`] 个桶，冲突用链表解决，新槽位插入链头。

use super::slot::{Slot, SlotId, SlotState};
use crate::consts::{DRIVE_HASH_SHIFT, HASH_MULTIPLIER, HASH_SIZE};
use crate::types::BlockKey;

/// 计算缓存键所在的桶
///
/// 先把地址（可能宽于 32 位）与驱动器号折叠成一个 32 位整数，
/// 再做乘法散列并对素数桶数取模。
pub(crate) fn hash_key(key: BlockKey) -> usize {
    #[cfg(feature = "lba64")]
    let folded = (key.lba as u32) ^ ((key.lba >> 32) as u32);
    #[cfg(not(feature = "lba64"))]
    let folded = key.lba;

    let value = folded ^ ((key.drive as u32) << DRIVE_HASH_SHIFT);
    (value.wrapping_mul(HASH_MULTIPLIER) % HASH_SIZE as u32) as usize
}

/// 哈希索引
pub(crate) struct HashIndex {
    buckets: [Option<SlotId>; HASH_SIZE],
}

impl HashIndex {
    /// 创建空索引
    pub fn new() -> Self {
        Self {
            buckets: [None; HASH_SIZE],
        }
    }

    /// 清空所有桶
    pub fn clear(&mut self) {
        self.buckets = [None; HASH_SIZE];
    }

    /// 查找缓存键对应的槽位
    ///
    /// 同时比较驱动器号和扇区地址；同桶的其他键只是散列冲突。
    pub fn lookup(&self, slots: &[Slot], key: BlockKey) -> Option<SlotId> {
        let mut cur = self.buckets[hash_key(key)];
        while let Some(id) = cur {
            let slot = &slots[id];
            if slot.key == key {
                return Some(id);
            }
            cur = slot.chain_next();
        }
        None
    }

    /// 把 `Detached` 槽位插入其键所在桶的链头，槽位转为 `Cached`
    pub fn insert(&mut self, slots: &mut [Slot], id: SlotId) {
        let slot = &mut slots[id];
        assert!(
            slot.state == SlotState::Detached,
            "[CACHE] indexing slot {} in state {:?}",
            id,
            slot.state
        );
        let bucket = hash_key(slot.key);
        slot.state = SlotState::Cached {
            hash_next: self.buckets[bucket],
        };
        self.buckets[bucket] = Some(id);
    }

    /// 从索引中摘除槽位，槽位转为 `Detached`
    ///
    /// # Panics
    ///
    /// 槽位不在其桶链中时 panic：索引已经损坏，继续运行会留下失效的链接。
    pub fn remove(&mut self, slots: &mut [Slot], id: SlotId) {
        let bucket = hash_key(slots[id].key);
        let next = slots[id].chain_next();

        let mut prev: Option<SlotId> = None;
        let mut cur = self.buckets[bucket];
        while let Some(c) = cur {
            if c == id {
                match prev {
                    None => self.buckets[bucket] = next,
                    Some(p) => slots[p].set_chain_next(next),
                }
                slots[id].state = SlotState::Detached;
                return;
            }
            prev = Some(c);
            cur = slots[c].chain_next();
        }

        unreachable!(
            "[CACHE] slot {} ({}) missing from hash bucket {}",
            id, slots[id].key, bucket
        );
    }

    /// 索引中的槽位总数（遍历所有桶链）
    #[cfg(test)]
    pub fn entry_count(&self, slots: &[Slot]) -> usize {
        let mut count = 0;
        for head in self.buckets.iter() {
            let mut cur = *head;
            while let Some(id) = cur {
                count += 1;
                cur = slots[id].chain_next();
            }
        }
        count
    }
}
