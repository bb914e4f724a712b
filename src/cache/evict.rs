//! 驱逐与写回

use super::block_cache::BlockCache;
use super::slot::SlotId;
use crate::block::BlockDevice;
use crate::error::{Error, ErrorKind, Result};

impl BlockCache {
    /// 回收 LRU 尾部的槽位
    ///
    /// 脏槽位先同步写回设备。写回失败时槽位保持原样（仍然脏、仍在索引和
    /// LRU 中），错误原样返回，缓存只是无法继续前进，不会丢数据。
    ///
    /// 成功时槽位已离开索引和 LRU，处于 `Detached` 状态，直接交给调用者，
    /// 不经过空闲链表。
    ///
    /// # 错误
    ///
    /// - 设备写错误：原样返回
    /// - `InvalidState`：没有可驱逐的缓存槽位（调用者本应先用空闲链表）
    pub(crate) fn evict_one<D: BlockDevice>(&mut self, dev: &mut D) -> Result<SlotId> {
        let victim = match self.lru.tail() {
            Some(id) if self.slots[id].is_cached() => id,
            tail => {
                log::error!("[CACHE] evict: no cached victim (LRU tail {:?})", tail);
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    "no cached slot to evict",
                ));
            }
        };

        let slot = &self.slots[victim];
        if slot.dirty {
            if let Err(err) = dev.write_sector(slot.key.drive, slot.key.lba, &slot.data) {
                log::warn!("[CACHE] evict: write-back of {} failed: {}", slot.key, err);
                return Err(err);
            }
            log::debug!("[CACHE] evict: wrote back dirty {}", slot.key);
        }

        log::debug!("[CACHE] evict: slot {} ({}) reclaimed", victim, self.slots[victim].key);
        self.index.remove(&mut self.slots, victim);
        self.lru.remove(&mut self.slots, victim);
        self.slots[victim].dirty = false;
        Ok(victim)
    }
}
