//! 扇区缓存门面
//!
//! # 架构
//!
//! ```text
//! struct BlockCache {
//!     slots: Box<[Slot]>,   // 固定槽位池，链接全部是下标
//!     index: HashIndex,     // 257 个桶，(驱动器, 扇区) → 槽位
//!     lru: LruList,         // 头 = 最近使用，尾 = 驱逐候选
//!     free: FreeList,       // 空闲槽位栈
//!     any_dirty: bool,      // 为 false 时 flush 直接返回
//!     stats: CacheStats,
//! }
//! ```
//!
//! 读写请求先查哈希索引；命中则更新 LRU 位置，未命中则从空闲链表
//! 取槽位，空闲链表为空时驱逐 LRU 尾部（脏则先写回），然后装入数据并
//! 同时加入索引和 LRU 头部。
//!
//! 缓存本身不持有设备，每个可能触发 I/O 的操作都显式传入设备。

use super::free_list::FreeList;
use super::hash_index::HashIndex;
use super::lru_list::LruList;
use super::slot::{new_pool, Slot, SlotId};
use crate::block::BlockDevice;
use crate::consts::DEFAULT_CACHE_SIZE;
use crate::error::Result;
use crate::types::{BlockKey, DriveId, Lba, SectorBuf};
use alloc::boxed::Box;
use bitflags::bitflags;
use core::num::NonZeroUsize;

bitflags! {
    /// 刷新选项
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FlushFlags: u8 {
        /// 写回所有脏槽位（否则写回第一个后即返回）
        const ALL        = 0x01;
        /// 访问过的槽位全部失效
        const INVALIDATE = 0x02;
    }
}

impl FlushFlags {
    /// 从布尔参数构造
    pub fn from_bools(flush_all: bool, invalidate_all: bool) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::ALL, flush_all);
        flags.set(Self::INVALIDATE, invalidate_all);
        flags
    }
}

/// 缓存统计信息
///
/// 纯观测用途，对缓存行为没有影响。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 带输出缓冲区的读取次数
    pub reads: u64,
    /// 预读次数（无输出缓冲区）
    pub read_ahead: u64,
    /// 读命中次数（不含预读）
    pub read_hits: u64,
    /// 读未命中时从空闲链表取得槽位的次数
    pub read_free: u64,
    /// 读未命中时需要驱逐的次数
    pub read_evictions: u64,
    /// 读未命中次数（不含预读）
    pub read_misses: u64,
    /// 写入次数
    pub writes: u64,
    /// 写命中次数
    pub write_hits: u64,
    /// 写未命中时从空闲链表取得槽位的次数
    pub write_free: u64,
    /// 写未命中时需要驱逐的次数
    pub write_evictions: u64,
    /// flush 写回的扇区数
    pub write_flushes: u64,
}

impl CacheStats {
    /// 读命中率
    pub fn hit_rate(&self) -> f64 {
        if self.reads == 0 {
            0.0
        } else {
            self.read_hits as f64 / self.reads as f64
        }
    }
}

impl core::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "block_cache:, Reads, {}, Ahead, {}, Hit, {}, Free, {}, Evict, {}, Miss, {}, ---, \
             Writes, {}, Hit, {}, Free, {}, Evict, {}, Flush, {},",
            self.reads,
            self.read_ahead,
            self.read_hits,
            self.read_free,
            self.read_evictions,
            self.read_misses,
            self.writes,
            self.write_hits,
            self.write_free,
            self.write_evictions,
            self.write_flushes,
        )
    }
}

/// 未命中时槽位的用途（决定计入哪个统计项）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    ReadAhead,
    Write,
}

/// 扇区缓存
///
/// 固定容量的写回缓存。每个 (驱动器, 扇区) 最多占用一个槽位；
/// 写未命中不读设备，写回推迟到驱逐或 flush。
///
/// # 并发
///
/// 内部没有任何同步，所有操作必须在同一执行上下文中串行调用。
/// 多个调用者（如中断处理程序和主循环）共享时，必须在整个缓存外
/// 加互斥，参见 [`SharedBlockDev`](crate::block::SharedBlockDev)。
pub struct BlockCache {
    pub(crate) slots: Box<[Slot]>,
    pub(crate) index: HashIndex,
    pub(crate) lru: LruList,
    pub(crate) free: FreeList,
    any_dirty: bool,
    stats: CacheStats,
}

impl BlockCache {
    /// 创建缓存
    ///
    /// 槽位池在这里一次性分配，之后容量不再变化。
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// let cache = BlockCache::new(NonZeroUsize::new(256).unwrap());  // 256 × 512B = 128KB
    /// ```
    pub fn new(capacity: NonZeroUsize) -> Self {
        let mut cache = Self {
            slots: new_pool(capacity.get()),
            index: HashIndex::new(),
            lru: LruList::default(),
            free: FreeList::default(),
            any_dirty: false,
            stats: CacheStats::default(),
        };
        cache.init();
        cache
    }

    /// 创建默认容量（[`DEFAULT_CACHE_SIZE`]）的缓存
    pub fn with_default_capacity() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN))
    }

    /// 重置为空缓存：所有槽位回到空闲链表，索引和 LRU 清空
    ///
    /// 只应在启动时调用。未写回的脏数据会被直接丢弃，这里不做检查，
    /// 由调用者负责先 flush。统计信息保留。
    pub fn init(&mut self) {
        self.index.clear();
        self.lru.clear();
        self.free.clear();
        for slot in self.slots.iter_mut() {
            slot.reset();
        }
        // 逆序压栈，使槽位按池顺序被取用
        for id in (0..self.slots.len()).rev() {
            self.free.release(&mut self.slots, id);
        }
        self.any_dirty = false;
        log::debug!("[CACHE] init: {} slots free", self.slots.len());
    }

    /// 读取一个扇区
    ///
    /// - 命中：更新 LRU，`out` 非空时拷出数据
    /// - 未命中：取得槽位（空闲链表，否则驱逐），从设备装入，加入索引和 LRU
    ///
    /// `out` 为 `None` 时是预读：只填充缓存，不计入读取统计。
    ///
    /// # 错误
    ///
    /// 驱逐写回失败或设备读失败时返回设备错误。装入失败的槽位回到
    /// 空闲链表，不会进入索引。
    pub fn read_block<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        drive: DriveId,
        lba: Lba,
        out: Option<&mut SectorBuf>,
    ) -> Result<()> {
        let key = BlockKey::new(drive, lba);
        let access = if out.is_some() {
            self.stats.reads += 1;
            Access::Read
        } else {
            self.stats.read_ahead += 1;
            Access::ReadAhead
        };

        if let Some(id) = self.index.lookup(&self.slots, key) {
            self.lru.touch(&mut self.slots, id);
            if let Some(out) = out {
                out.copy_from_slice(&self.slots[id].data);
                self.stats.read_hits += 1;
            }
            log::trace!("[CACHE] read {} HIT (dirty={})", key, self.slots[id].dirty);
            return Ok(());
        }

        let id = self.obtain_slot(dev, access)?;
        if access == Access::Read {
            self.stats.read_misses += 1;
        }
        log::debug!("[CACHE] read {} MISS -> slot {} ({:?})", key, id, access);

        if let Err(err) = dev.read_sector(drive, lba, &mut self.slots[id].data) {
            log::warn!("[CACHE] read {} load failed: {}", key, err);
            self.free.release(&mut self.slots, id);
            return Err(err);
        }

        self.install(id, key, false);
        if let Some(out) = out {
            out.copy_from_slice(&self.slots[id].data);
        }
        Ok(())
    }

    /// 预读一个扇区到缓存
    ///
    /// 等价于 `read_block(dev, drive, lba, None)`。
    pub fn prefetch<D: BlockDevice>(&mut self, dev: &mut D, drive: DriveId, lba: Lba) -> Result<()> {
        self.read_block(dev, drive, lba, None)
    }

    /// 写入一个扇区
    ///
    /// - 命中：原地覆盖并标记脏，不产生设备 I/O
    /// - 未命中：取得槽位后直接用 `data` 填充（不读设备），标记脏
    ///
    /// # 错误
    ///
    /// 只有驱逐写回失败时返回设备错误，此时缓存状态不变。
    pub fn write_block<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        drive: DriveId,
        lba: Lba,
        data: &SectorBuf,
    ) -> Result<()> {
        let key = BlockKey::new(drive, lba);
        self.stats.writes += 1;

        if let Some(id) = self.index.lookup(&self.slots, key) {
            let slot = &mut self.slots[id];
            slot.data.copy_from_slice(data);
            slot.dirty = true;
            self.any_dirty = true;
            self.lru.touch(&mut self.slots, id);
            self.stats.write_hits += 1;
            log::trace!("[CACHE] write {} HIT", key);
            return Ok(());
        }

        let id = self.obtain_slot(dev, Access::Write)?;
        log::debug!("[CACHE] write {} MISS -> slot {}", key, id);
        self.slots[id].data.copy_from_slice(data);
        self.install(id, key, true);
        Ok(())
    }

    /// 刷新脏槽位（布尔参数形式）
    ///
    /// 参见 [`flush_with`](Self::flush_with)。
    pub fn flush<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        flush_all: bool,
        invalidate_all: bool,
    ) -> Result<()> {
        self.flush_with(dev, FlushFlags::from_bools(flush_all, invalidate_all))
    }

    /// 刷新脏槽位
    ///
    /// 按槽位池顺序（不是 LRU 顺序）扫描：
    /// - 遇到脏槽位就写回；写回失败立即返回，后面的槽位不再访问
    /// - 没有 `ALL` 时，第一个写回成功后即返回（增量刷新，供周期性调用）
    /// - 有 `INVALIDATE` 时，访问过的槽位全部失效；写回失败的槽位除外
    ///
    /// 缓存没有脏槽位且不要求失效时直接返回，不扫描。
    pub fn flush_with<D: BlockDevice>(&mut self, dev: &mut D, flags: FlushFlags) -> Result<()> {
        let invalidate = flags.contains(FlushFlags::INVALIDATE);
        if !self.any_dirty && !invalidate {
            return Ok(());
        }

        for id in 0..self.slots.len() {
            if !self.slots[id].is_cached() {
                continue;
            }

            if self.slots[id].dirty {
                let slot = &self.slots[id];
                if let Err(err) = dev.write_sector(slot.key.drive, slot.key.lba, &slot.data) {
                    log::warn!("[CACHE] flush {} failed: {}", slot.key, err);
                    return Err(err);
                }
                log::debug!("[CACHE] flush {} (slot {})", slot.key, id);
                self.slots[id].dirty = false;
                self.stats.write_flushes += 1;

                if !flags.contains(FlushFlags::ALL) {
                    if invalidate {
                        self.invalidate_slot(id);
                    }
                    return Ok(());
                }
            }

            if invalidate {
                self.invalidate_slot(id);
            }
        }

        self.any_dirty = false;
        Ok(())
    }

    /// 丢弃一个缓存扇区（不写回）
    ///
    /// 未写回的数据会丢失。返回该扇区之前是否在缓存中。
    pub fn invalidate(&mut self, drive: DriveId, lba: Lba) -> bool {
        let key = BlockKey::new(drive, lba);
        match self.index.lookup(&self.slots, key) {
            Some(id) => {
                if self.slots[id].dirty {
                    log::warn!("[CACHE] invalidate {} discards pending write", key);
                }
                self.invalidate_slot(id);
                true
            }
            None => false,
        }
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// 清零统计信息
    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    /// 获取缓存容量
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 获取当前缓存的扇区数量
    pub fn len(&self) -> usize {
        self.lru.len()
    }

    /// 检查缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.lru.len() == 0
    }

    /// 获取空闲槽位数量
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// 获取脏扇区数量
    pub fn dirty_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_cached() && s.dirty).count()
    }

    /// 扇区是否在缓存中（不影响 LRU 顺序）
    pub fn contains(&self, drive: DriveId, lba: Lba) -> bool {
        self.index.lookup(&self.slots, BlockKey::new(drive, lba)).is_some()
    }

    /// 扇区是否为脏；不在缓存中返回 None
    pub fn is_dirty(&self, drive: DriveId, lba: Lba) -> Option<bool> {
        self.index
            .lookup(&self.slots, BlockKey::new(drive, lba))
            .map(|id| self.slots[id].dirty)
    }

    /// 从最近使用到最久未使用列出缓存中的扇区
    pub fn lru_keys(&self) -> impl Iterator<Item = BlockKey> + '_ {
        self.lru.iter(&self.slots).map(move |id| self.slots[id].key)
    }

    // 内部辅助方法

    /// 为未命中取得一个 `Detached` 槽位
    fn obtain_slot<D: BlockDevice>(&mut self, dev: &mut D, access: Access) -> Result<SlotId> {
        if let Some(id) = self.free.acquire(&mut self.slots) {
            match access {
                Access::Read | Access::ReadAhead => self.stats.read_free += 1,
                Access::Write => self.stats.write_free += 1,
            }
            return Ok(id);
        }

        match access {
            Access::Read | Access::ReadAhead => self.stats.read_evictions += 1,
            Access::Write => self.stats.write_evictions += 1,
        }
        self.evict_one(dev)
    }

    /// 把装好数据的槽位加入索引和 LRU 头部
    fn install(&mut self, id: SlotId, key: BlockKey, dirty: bool) {
        let slot = &mut self.slots[id];
        slot.key = key;
        slot.dirty = dirty;
        if dirty {
            self.any_dirty = true;
        }
        self.index.insert(&mut self.slots, id);
        self.lru.insert_front(&mut self.slots, id);
    }

    /// 缓存槽位 → 空闲
    fn invalidate_slot(&mut self, id: SlotId) {
        log::debug!("[CACHE] invalidate slot {} ({})", id, self.slots[id].key);
        self.index.remove(&mut self.slots, id);
        self.lru.remove(&mut self.slots, id);
        self.free.release(&mut self.slots, id);
    }
}

impl core::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("free", &self.free.len())
            .field("any_dirty", &self.any_dirty)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
impl BlockCache {
    /// 校验全部结构不变量
    pub(crate) fn check_invariants(&self) {
        use alloc::collections::BTreeSet;
        use alloc::vec::Vec;

        let cached: Vec<SlotId> = (0..self.slots.len())
            .filter(|id| self.slots[*id].is_cached())
            .collect();

        // 每个槽位要么空闲要么缓存
        for (id, slot) in self.slots.iter().enumerate() {
            assert!(slot.is_cached() || slot.is_free(), "slot {} is {:?}", id, slot.state);
            assert!(!slot.dirty || slot.is_cached(), "free slot {} is dirty", id);
        }

        // 空闲链表恰好包含所有空闲槽位
        let mut free_seen = 0;
        let mut cur = self.free.head();
        while let Some(id) = cur {
            match self.slots[id].state {
                super::slot::SlotState::Free { next } => cur = next,
                other => panic!("slot {} on free list is {:?}", id, other),
            }
            free_seen += 1;
            assert!(free_seen <= self.slots.len(), "free list cycle");
        }
        assert_eq!(free_seen, self.free.len());
        assert_eq!(free_seen + cached.len(), self.slots.len());

        // 索引：每个缓存槽位可以按键找到自己，键互不相同
        let mut keys = BTreeSet::new();
        for id in cached.iter() {
            let key = self.slots[*id].key;
            assert!(keys.insert(key), "duplicate key {}", key);
            assert_eq!(self.index.lookup(&self.slots, key), Some(*id));
        }
        assert_eq!(self.index.entry_count(&self.slots), cached.len());

        // LRU 恰好包含所有缓存槽位，前后链接一致
        let order: Vec<SlotId> = self.lru.iter(&self.slots).collect();
        assert_eq!(order.len(), cached.len());
        assert_eq!(order.len(), self.lru.len());
        let mut prev = None;
        for id in order.iter() {
            assert!(self.slots[*id].is_cached());
            assert_eq!(self.slots[*id].lru_prev, prev);
            prev = Some(*id);
        }
        assert_eq!(self.lru.tail(), prev);

        if !self.any_dirty {
            assert_eq!(self.dirty_count(), 0);
        }
    }
}
