//! 块 I/O 操作实现

use super::{BlockDev, BlockDevice};
use crate::cache::FlushFlags;
use crate::consts::BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{BlockKey, DriveId, Lba, SectorBuf};

/// 检查传输参数：扇区数非零且缓冲区长度恰好为 `count * BLOCK_SIZE`
fn check_transfer(count: u32, buf_len: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::new(ErrorKind::InvalidInput, "zero sector count"));
    }
    match (count as usize).checked_mul(BLOCK_SIZE) {
        Some(len) if len == buf_len => Ok(()),
        _ => Err(Error::new(
            ErrorKind::InvalidInput,
            "buffer length does not match sector count",
        )),
    }
}

impl<D: BlockDevice> BlockDev<D> {
    /// 读取扇区
    ///
    /// 单扇区读走缓存；多扇区读先全量刷新缓存，再直接从设备读取。
    /// 没有缓存时总是直接读设备。读成功后登记对下一个扇区的预读；
    /// 多扇区读登记的是整个传输之后的那个扇区（`lba + count`）。
    ///
    /// # 参数
    ///
    /// * `drive` - 驱动器号
    /// * `lba` - 起始扇区
    /// * `count` - 扇区数
    /// * `buf` - 目标缓冲区（长度必须为 `count * 512`）
    pub fn read_sectors(&mut self, drive: DriveId, lba: Lba, count: u32, buf: &mut [u8]) -> Result<()> {
        check_transfer(count, buf.len())?;
        self.read_count += count as u64;

        if let Some(cache) = self.bcache.as_mut() {
            if count == 1 {
                let sector = <&mut SectorBuf>::try_from(buf)
                    .map_err(|_| Error::new(ErrorKind::InvalidInput, "sector buffer size mismatch"))?;
                cache.read_block(&mut self.device, drive, lba, Some(sector))?;
                self.arm_read_ahead(drive, lba, count);
                return Ok(());
            }
            // 多扇区传输绕过缓存，先让设备看到所有待写数据
            cache.flush(&mut self.device, true, false)?;
        }

        log::trace!("[BDEV] direct read {}:{:#x} x{}", drive, lba, count);
        self.physical_read_count += count as u64;
        self.device.read_sectors(drive, lba, buf)?;
        self.arm_read_ahead(drive, lba, count);
        Ok(())
    }

    /// 写入扇区
    ///
    /// 单扇区写进入缓存（延迟写回）；多扇区写先全量刷新缓存，丢弃缓存中
    /// 将被覆盖扇区的旧副本，再直接写设备。
    ///
    /// # 错误
    ///
    /// 只读驱动器返回 `WriteProtected`。
    pub fn write_sectors(&mut self, drive: DriveId, lba: Lba, count: u32, buf: &[u8]) -> Result<()> {
        check_transfer(count, buf.len())?;
        if self.device.is_read_only(drive) {
            return Err(Error::new(ErrorKind::WriteProtected, "drive is read-only"));
        }
        self.write_count += count as u64;

        if let Some(cache) = self.bcache.as_mut() {
            if count == 1 {
                let sector = <&SectorBuf>::try_from(buf)
                    .map_err(|_| Error::new(ErrorKind::InvalidInput, "sector buffer size mismatch"))?;
                return cache.write_block(&mut self.device, drive, lba, sector);
            }
            cache.flush(&mut self.device, true, false)?;

            // 刷新后范围内的副本都是干净的；先丢弃，设备写到一半失败时也不会留下旧数据
            let mut key = Some(BlockKey::new(drive, lba));
            for _ in 0..count {
                let Some(k) = key else { break };
                cache.invalidate(k.drive, k.lba);
                key = k.next();
            }
        }

        log::trace!("[BDEV] direct write {}:{:#x} x{}", drive, lba, count);
        self.physical_write_count += count as u64;
        self.device.write_sectors(drive, lba, buf)
    }

    /// 读取单个扇区
    pub fn read_sector(&mut self, drive: DriveId, lba: Lba, buf: &mut SectorBuf) -> Result<()> {
        self.read_sectors(drive, lba, 1, buf)
    }

    /// 写入单个扇区
    pub fn write_sector(&mut self, drive: DriveId, lba: Lba, buf: &SectorBuf) -> Result<()> {
        self.write_sectors(drive, lba, 1, buf)
    }

    /// 后台任务：每个调度节拍执行一个有界的工作单元
    ///
    /// 有待执行的预读时只做预读（无论成败都会清除登记）；
    /// 否则增量刷新一个脏扇区。没有缓存时什么都不做。
    pub fn task(&mut self) -> Result<()> {
        let Some(cache) = self.bcache.as_mut() else {
            return Ok(());
        };

        if let Some(key) = self.read_ahead.take() {
            log::trace!("[BDEV] read-ahead {}", key);
            return cache.prefetch(&mut self.device, key.drive, key.lba);
        }

        cache.flush(&mut self.device, false, false)
    }

    /// 按指定选项刷新缓存
    pub fn flush_cache(&mut self, flags: FlushFlags) -> Result<()> {
        match self.bcache.as_mut() {
            Some(cache) => cache.flush_with(&mut self.device, flags),
            None => Ok(()),
        }
    }

    /// 写回所有脏扇区
    pub fn flush(&mut self) -> Result<()> {
        self.flush_cache(FlushFlags::ALL)
    }

    /// 写回所有脏扇区并清空缓存
    ///
    /// 用于需要保证设备视图完全干净的操作之前（例如重新初始化驱动器）。
    pub fn invalidate_cache(&mut self) -> Result<()> {
        self.flush_cache(FlushFlags::ALL | FlushFlags::INVALIDATE)
    }

    /// 同步驱动器
    ///
    /// 这是两层刷新：先写回缓存中的脏扇区，再调用设备的 sync。
    pub fn sync(&mut self, drive: DriveId) -> Result<()> {
        self.flush()?;
        self.device.sync(drive)
    }

    /// 关闭：写回所有脏扇区
    pub fn close(&mut self) -> Result<()> {
        self.flush()
    }

    /// 登记下一个扇区的预读（只在有缓存时）
    fn arm_read_ahead(&mut self, drive: DriveId, lba: Lba, count: u32) {
        if self.bcache.is_none() {
            return;
        }
        self.read_ahead = lba
            .checked_add(count as Lba)
            .map(|next| BlockKey::new(drive, next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::mock::{stamped, MockDevice};
    use alloc::vec;
    use core::num::NonZeroUsize;

    fn cached(n: usize) -> BlockDev<MockDevice> {
        BlockDev::new_with_cache(MockDevice::new(), NonZeroUsize::new(n).unwrap())
    }

    #[test]
    fn test_single_sector_goes_through_cache() {
        let mut bd = cached(4);
        let key = BlockKey::new(0, 3);
        bd.write_sector(0, 3, &stamped(key, 0x12)).unwrap();
        assert!(bd.device().writes.is_empty());

        let mut buf = [0u8; BLOCK_SIZE];
        bd.read_sector(0, 3, &mut buf).unwrap();
        assert_eq!(buf, stamped(key, 0x12));
        assert!(bd.device().reads.is_empty());

        assert_eq!(bd.read_count(), 1);
        assert_eq!(bd.write_count(), 1);
        assert_eq!(bd.physical_read_count(), 0);
    }

    #[test]
    fn test_multi_sector_write_flushes_and_bypasses() {
        let mut bd = cached(4);
        let dirty = BlockKey::new(0, 100);
        bd.write_sector(0, 100, &stamped(dirty, 0x21)).unwrap();
        // lba 1 已缓存（干净）
        let mut buf = [0u8; BLOCK_SIZE];
        bd.read_sector(0, 1, &mut buf).unwrap();

        let data = vec![0x7Eu8; 2 * BLOCK_SIZE];
        bd.write_sectors(0, 0, 2, &data).unwrap();

        let dev = bd.device();
        assert_eq!(dev.writes, [dirty, BlockKey::new(0, 0), BlockKey::new(0, 1)]);
        assert_eq!(bd.physical_write_count(), 2);

        // 旧副本已丢弃，重新读取得到新数据
        let cache = bd.cache().unwrap();
        assert!(!cache.contains(0, 1));
        assert!(cache.contains(0, 100));
        bd.read_sector(0, 1, &mut buf).unwrap();
        assert_eq!(buf, [0x7E; BLOCK_SIZE]);
    }

    #[test]
    fn test_multi_sector_read_flushes_first() {
        let mut bd = cached(4);
        let key = BlockKey::new(0, 5);
        bd.write_sector(0, 5, &stamped(key, 0x31)).unwrap();

        let mut buf = vec![0u8; 3 * BLOCK_SIZE];
        bd.read_sectors(0, 4, 3, &mut buf).unwrap();

        assert_eq!(&buf[BLOCK_SIZE..2 * BLOCK_SIZE], &stamped(key, 0x31)[..]);
        assert_eq!(bd.device().reads.len(), 3);
        assert_eq!(bd.physical_read_count(), 3);
        assert_eq!(bd.pending_read_ahead(), Some(BlockKey::new(0, 7)));
    }

    #[test]
    fn test_partial_bypass_write_leaves_no_stale_copy() {
        let mut bd = cached(4);
        let mut buf = [0u8; BLOCK_SIZE];
        bd.read_sector(0, 1, &mut buf).unwrap();
        assert!(bd.cache().unwrap().contains(0, 1));

        // lba 2 写失败：lba 0、1 已经写出新数据
        bd.device_mut().fail_write_at = Some(BlockKey::new(0, 2));
        let data = vec![0xEEu8; 3 * BLOCK_SIZE];
        let err = bd.write_sectors(0, 0, 3, &data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(bd.device().stored(BlockKey::new(0, 1)), Some([0xEE; BLOCK_SIZE]));
        assert!(!bd.cache().unwrap().contains(0, 1));

        bd.device_mut().fail_write_at = None;
        bd.read_sector(0, 1, &mut buf).unwrap();
        assert_eq!(buf, [0xEE; BLOCK_SIZE]);
    }

    #[test]
    fn test_flush_failure_blocks_bypass() {
        let mut bd = cached(4);
        bd.write_sector(0, 5, &[1; BLOCK_SIZE]).unwrap();
        bd.device_mut().fail_writes = true;

        let data = vec![0u8; 2 * BLOCK_SIZE];
        let err = bd.write_sectors(0, 10, 2, &data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(bd.physical_write_count(), 0);
    }

    #[test]
    fn test_without_cache_goes_direct() {
        let mut bd = BlockDev::new(MockDevice::new());
        let mut buf = [0u8; BLOCK_SIZE];
        bd.read_sector(1, 8, &mut buf).unwrap();
        bd.write_sector(1, 8, &buf).unwrap();

        assert_eq!(bd.device().reads, [BlockKey::new(1, 8)]);
        assert_eq!(bd.device().writes, [BlockKey::new(1, 8)]);
        assert_eq!(bd.pending_read_ahead(), None);
        bd.task().unwrap();
    }

    #[test]
    fn test_invalid_transfers() {
        let mut bd = cached(4);
        let mut buf = vec![0u8; BLOCK_SIZE];

        let err = bd.read_sectors(0, 0, 0, &mut []).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = bd.read_sectors(0, 0, 2, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = bd.write_sectors(0, 0, 1, &buf[..100]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(bd.read_count(), 0);
        assert_eq!(bd.write_count(), 0);
    }

    #[test]
    fn test_write_protected() {
        let mut bd = cached(4);
        bd.device_mut().read_only = Some(1);

        let err = bd.write_sector(1, 0, &[0; BLOCK_SIZE]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteProtected);
        bd.write_sector(0, 0, &[0; BLOCK_SIZE]).unwrap();
    }

    #[test]
    fn test_task_read_ahead_then_flush() {
        let mut bd = cached(4);
        let mut buf = [0u8; BLOCK_SIZE];
        bd.write_sector(0, 50, &[5; BLOCK_SIZE]).unwrap();
        bd.read_sector(0, 10, &mut buf).unwrap();
        assert_eq!(bd.pending_read_ahead(), Some(BlockKey::new(0, 11)));

        // 第一个节拍：只做预读
        bd.task().unwrap();
        assert_eq!(bd.pending_read_ahead(), None);
        assert!(bd.cache().unwrap().contains(0, 11));
        assert!(bd.device().writes.is_empty());

        let stats = bd.cache_stats().unwrap();
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.read_ahead, 1);

        // 第二个节拍：增量刷新
        bd.task().unwrap();
        assert_eq!(bd.device().writes, [BlockKey::new(0, 50)]);

        // 预读的扇区随后被真正读取时命中
        bd.read_sector(0, 11, &mut buf).unwrap();
        assert_eq!(bd.device().reads.len(), 2);
        assert_eq!(bd.cache_stats().unwrap().read_hits, 1);
    }

    #[test]
    fn test_failed_read_does_not_arm_read_ahead() {
        let mut bd = cached(4);
        bd.device_mut().fail_reads = true;
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(bd.read_sector(0, 10, &mut buf).is_err());
        assert_eq!(bd.pending_read_ahead(), None);
    }

    #[test]
    fn test_read_ahead_disarmed_on_failure() {
        let mut bd = cached(4);
        let mut buf = [0u8; BLOCK_SIZE];
        bd.read_sector(0, 10, &mut buf).unwrap();

        bd.device_mut().fail_reads = true;
        assert!(bd.task().is_err());
        assert_eq!(bd.pending_read_ahead(), None);
        assert!(!bd.cache().unwrap().contains(0, 11));
    }

    #[test]
    fn test_sync_and_invalidate() {
        let mut bd = cached(4);
        bd.write_sector(0, 1, &[1; BLOCK_SIZE]).unwrap();
        bd.write_sector(0, 2, &[2; BLOCK_SIZE]).unwrap();

        bd.sync(0).unwrap();
        assert_eq!(bd.device().writes.len(), 2);
        assert_eq!(bd.device().syncs, 1);
        assert_eq!(bd.cache().unwrap().len(), 2);

        bd.invalidate_cache().unwrap();
        assert!(bd.cache().unwrap().is_empty());
        assert_eq!(bd.device().writes.len(), 2);
    }

    #[test]
    fn test_close_flushes() {
        let mut bd = cached(4);
        bd.write_sector(0, 9, &[9; BLOCK_SIZE]).unwrap();
        bd.close().unwrap();
        let dev = bd.into_device();
        assert_eq!(dev.stored(BlockKey::new(0, 9)), Some([9; BLOCK_SIZE]));
    }
}
