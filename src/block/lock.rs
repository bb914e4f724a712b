//! 共享块设备的互斥边界
//!
//! [`BlockDev`] 与其中的缓存没有任何内部同步：哈希链、LRU 链接和空闲链表
//! 在并发修改下都会损坏。当中断处理程序和主循环都要访问同一个设备时，
//! 必须在整个包装器外加锁，让每个读/写/刷新操作完整执行后再让出。
//!
//! 使用自旋锁，不依赖操作系统。

use super::{BlockDev, BlockDevice};
use crate::cache::{CacheStats, FlushFlags};
use crate::error::Result;
use crate::types::{DriveId, Lba};
use spin::{Mutex, MutexGuard};

/// 加锁的块设备
///
/// # 示例
///
/// ```rust,ignore
/// static DISK: SharedBlockDev<SdCard> = SharedBlockDev::new(BlockDev::new(SdCard::new()));
///
/// // 主循环
/// DISK.read_sectors(0, lba, 1, &mut buf)?;
///
/// // 定时器中断
/// let _ = DISK.task();
/// ```
pub struct SharedBlockDev<D> {
    inner: Mutex<BlockDev<D>>,
}

impl<D: BlockDevice> SharedBlockDev<D> {
    /// 包装块设备
    pub const fn new(bdev: BlockDev<D>) -> Self {
        Self {
            inner: Mutex::new(bdev),
        }
    }

    /// 获取锁
    ///
    /// 持有守卫期间其他调用者自旋等待，守卫应尽快释放。
    pub fn lock(&self) -> MutexGuard<'_, BlockDev<D>> {
        self.inner.lock()
    }

    /// 尝试获取锁，已被占用时返回 None
    ///
    /// 中断上下文中应使用此方法，避免与被中断的持锁者死锁。
    pub fn try_lock(&self) -> Option<MutexGuard<'_, BlockDev<D>>> {
        self.inner.try_lock()
    }

    /// 在锁内执行闭包
    pub fn with<R>(&self, f: impl FnOnce(&mut BlockDev<D>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// 读取扇区，参见 [`BlockDev::read_sectors`]
    pub fn read_sectors(&self, drive: DriveId, lba: Lba, count: u32, buf: &mut [u8]) -> Result<()> {
        self.with(|bd| bd.read_sectors(drive, lba, count, buf))
    }

    /// 写入扇区，参见 [`BlockDev::write_sectors`]
    pub fn write_sectors(&self, drive: DriveId, lba: Lba, count: u32, buf: &[u8]) -> Result<()> {
        self.with(|bd| bd.write_sectors(drive, lba, count, buf))
    }

    /// 后台任务，参见 [`BlockDev::task`]
    ///
    /// 锁已被占用时跳过本次节拍，返回 `Ok(false)`。
    pub fn task(&self) -> Result<bool> {
        match self.inner.try_lock() {
            Some(mut bd) => bd.task().map(|()| true),
            None => Ok(false),
        }
    }

    /// 刷新缓存，参见 [`BlockDev::flush_cache`]
    pub fn flush_cache(&self, flags: FlushFlags) -> Result<()> {
        self.with(|bd| bd.flush_cache(flags))
    }

    /// 缓存统计信息
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.with(|bd| bd.cache_stats())
    }

    /// 取回内部的块设备
    pub fn into_inner(self) -> BlockDev<D> {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::mock::MockDevice;
    use crate::consts::BLOCK_SIZE;
    use crate::types::BlockKey;
    use core::num::NonZeroUsize;

    fn shared() -> SharedBlockDev<MockDevice> {
        SharedBlockDev::new(BlockDev::new_with_cache(
            MockDevice::new(),
            NonZeroUsize::new(4).unwrap(),
        ))
    }

    #[test]
    fn test_forwarding() {
        let disk = shared();
        disk.write_sectors(0, 1, 1, &[3; BLOCK_SIZE]).unwrap();

        let mut buf = [0u8; BLOCK_SIZE];
        disk.read_sectors(0, 1, 1, &mut buf).unwrap();
        assert_eq!(buf, [3; BLOCK_SIZE]);

        disk.flush_cache(FlushFlags::ALL).unwrap();
        assert_eq!(disk.with(|bd| bd.device().writes.len()), 1);
        assert_eq!(disk.cache_stats().map(|s| s.writes), Some(1));
    }

    #[test]
    fn test_task_skips_when_locked() {
        let disk = shared();
        let mut buf = [0u8; BLOCK_SIZE];
        disk.read_sectors(0, 1, 1, &mut buf).unwrap();

        {
            let _guard = disk.lock();
            assert!(disk.try_lock().is_none());
            assert_eq!(disk.task(), Ok(false));
        }

        assert_eq!(disk.task(), Ok(true));
        let bd = disk.into_inner();
        assert!(bd.cache().unwrap().contains(0, 2));
        assert_eq!(bd.device().reads, [BlockKey::new(0, 1), BlockKey::new(0, 2)]);
    }

    #[test]
    fn test_shared_across_threads() {
        use alloc::sync::Arc;

        let disk = Arc::new(shared());
        let handles: alloc::vec::Vec<_> = (0..4u8)
            .map(|t| {
                let disk = Arc::clone(&disk);
                std::thread::spawn(move || {
                    for i in 0..16 {
                        let lba = (t as Lba) * 100 + i;
                        disk.write_sectors(0, lba, 1, &[t; BLOCK_SIZE]).unwrap();
                        let _ = disk.task();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let disk = Arc::try_unwrap(disk).ok().unwrap();
        let mut bd = disk.into_inner();
        bd.flush().unwrap();
        assert_eq!(bd.cache().unwrap().dirty_count(), 0);
        for t in 0..4u8 {
            for i in 0..16 {
                let key = BlockKey::new(0, (t as Lba) * 100 + i);
                assert_eq!(bd.device().stored(key), Some([t; BLOCK_SIZE]));
            }
        }
    }
}
