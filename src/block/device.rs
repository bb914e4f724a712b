//! 块设备核心类型

use crate::cache::{BlockCache, CacheStats};
use crate::consts::BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{BlockKey, DriveId, Lba, SectorBuf};
use core::num::NonZeroUsize;

/// 块设备接口
///
/// 由外部驱动实现，每次调用读写恰好一个 512 字节扇区。
/// 重试策略（如果有）属于实现者，缓存不会重试。
///
/// # 示例
///
/// ```rust,ignore
/// use sector_cache::{BlockDevice, DriveId, Lba, SectorBuf, Result};
///
/// struct SdCard {
///     // ...
/// }
///
/// impl BlockDevice for SdCard {
///     fn read_sector(&mut self, drive: DriveId, lba: Lba, buf: &mut SectorBuf) -> Result<()> {
///         // 发起 SPI 读命令
///         Ok(())
///     }
///
///     fn write_sector(&mut self, drive: DriveId, lba: Lba, buf: &SectorBuf) -> Result<()> {
///         // 发起 SPI 写命令
///         Ok(())
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 读取一个扇区
    fn read_sector(&mut self, drive: DriveId, lba: Lba, buf: &mut SectorBuf) -> Result<()>;

    /// 写入一个扇区
    fn write_sector(&mut self, drive: DriveId, lba: Lba, buf: &SectorBuf) -> Result<()>;

    /// 读取连续多个扇区
    ///
    /// `buf` 长度必须是 [`BLOCK_SIZE`] 的整数倍。默认实现逐扇区读取，
    /// 支持多块传输命令的驱动应覆盖此方法。
    fn read_sectors(&mut self, drive: DriveId, lba: Lba, buf: &mut [u8]) -> Result<()> {
        if buf.len() % BLOCK_SIZE != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer length is not a multiple of the sector size",
            ));
        }
        let mut key = BlockKey::new(drive, lba);
        let count = buf.len() / BLOCK_SIZE;
        for (i, chunk) in buf.chunks_exact_mut(BLOCK_SIZE).enumerate() {
            let sector = <&mut SectorBuf>::try_from(chunk)
                .map_err(|_| Error::new(ErrorKind::InvalidInput, "sector chunk size mismatch"))?;
            self.read_sector(key.drive, key.lba, sector)?;
            if i + 1 < count {
                key = key.next().ok_or(Error::new(
                    ErrorKind::InvalidInput,
                    "transfer runs past the last sector",
                ))?;
            }
        }
        Ok(())
    }

    /// 写入连续多个扇区
    ///
    /// `buf` 长度必须是 [`BLOCK_SIZE`] 的整数倍。
    fn write_sectors(&mut self, drive: DriveId, lba: Lba, buf: &[u8]) -> Result<()> {
        if buf.len() % BLOCK_SIZE != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer length is not a multiple of the sector size",
            ));
        }
        let mut key = BlockKey::new(drive, lba);
        let count = buf.len() / BLOCK_SIZE;
        for (i, chunk) in buf.chunks_exact(BLOCK_SIZE).enumerate() {
            let sector = <&SectorBuf>::try_from(chunk)
                .map_err(|_| Error::new(ErrorKind::InvalidInput, "sector chunk size mismatch"))?;
            self.write_sector(key.drive, key.lba, sector)?;
            if i + 1 < count {
                key = key.next().ok_or(Error::new(
                    ErrorKind::InvalidInput,
                    "transfer runs past the last sector",
                ))?;
            }
        }
        Ok(())
    }

    /// 刷新设备自身的写缓存（对应 FatFs 的 `CTRL_SYNC`）
    fn sync(&mut self, _drive: DriveId) -> Result<()> {
        Ok(())
    }

    /// 驱动器是否只读
    fn is_read_only(&self, _drive: DriveId) -> bool {
        false
    }
}

/// 块设备包装器（文件系统胶水层）
///
/// 持有底层设备和可选的 [`BlockCache`]，负责：
/// - 单扇区传输走缓存，多扇区传输先全量刷新再绕过缓存
/// - 读成功后登记一次预读，由 [`task`](BlockDev::task) 在下一个调度节拍执行
/// - 逻辑/物理 I/O 计数
///
/// # 并发使用
///
/// BlockDev 本身不包含内部锁，只能在单一执行上下文中使用，
/// 每个操作都会完整执行后才返回。如果中断处理程序和主循环都要访问，
/// 必须用 [`SharedBlockDev`](super::SharedBlockDev) 包装：
///
/// ```rust,ignore
/// // 单一上下文
/// let mut bdev = BlockDev::with_default_cache(device);
///
/// // 中断 + 主循环
/// static DISK: SharedBlockDev<SdCard> = SharedBlockDev::new(BlockDev::new(SdCard::new()));
/// ```
pub struct BlockDev<D> {
    /// 底层设备
    pub(super) device: D,
    /// 块缓存（可选）
    pub(super) bcache: Option<BlockCache>,
    /// 待执行的预读
    pub(super) read_ahead: Option<BlockKey>,
    /// 逻辑读取扇区数（包括缓存命中）
    pub(super) read_count: u64,
    /// 逻辑写入扇区数（包括缓存写入）
    pub(super) write_count: u64,
    /// 绕过缓存的物理读取扇区数
    pub(super) physical_read_count: u64,
    /// 绕过缓存的物理写入扇区数
    pub(super) physical_write_count: u64,
}

impl<D: BlockDevice> BlockDev<D> {
    /// 创建新的块设备包装器（无缓存）
    pub const fn new(device: D) -> Self {
        Self {
            device,
            bcache: None,
            read_ahead: None,
            read_count: 0,
            write_count: 0,
            physical_read_count: 0,
            physical_write_count: 0,
        }
    }

    /// 创建带缓存的块设备包装器
    ///
    /// # 参数
    ///
    /// * `device` - 底层块设备
    /// * `cache_blocks` - 缓存槽位数量
    pub fn new_with_cache(device: D, cache_blocks: NonZeroUsize) -> Self {
        let mut bd = Self::new(device);
        bd.bcache = Some(BlockCache::new(cache_blocks));
        bd
    }

    /// 创建使用默认缓存大小的块设备包装器
    ///
    /// 使用 `DEFAULT_CACHE_SIZE` (128 个扇区) 作为缓存大小
    pub fn with_default_cache(device: D) -> Self {
        let mut bd = Self::new(device);
        bd.bcache = Some(BlockCache::with_default_capacity());
        bd
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取底层设备的可变引用
    ///
    /// 直接访问设备会绕过缓存，调用者需要自行保证一致性。
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 取回底层设备（不刷新缓存）
    pub fn into_device(self) -> D {
        self.device
    }

    /// 缓存的只读访问
    pub fn cache(&self) -> Option<&BlockCache> {
        self.bcache.as_ref()
    }

    /// 检查是否启用了缓存
    pub fn has_cache(&self) -> bool {
        self.bcache.is_some()
    }

    /// 获取缓存统计信息
    ///
    /// 如果启用了缓存，返回 Some(CacheStats)，否则返回 None
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.bcache.as_ref().map(|cache| cache.stats())
    }

    /// 获取逻辑读取扇区数（包括缓存命中）
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// 获取逻辑写入扇区数（包括缓存写入）
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// 获取绕过缓存的物理读取扇区数
    pub fn physical_read_count(&self) -> u64 {
        self.physical_read_count
    }

    /// 获取绕过缓存的物理写入扇区数
    pub fn physical_write_count(&self) -> u64 {
        self.physical_write_count
    }

    /// 当前登记的预读位置
    pub fn pending_read_ahead(&self) -> Option<BlockKey> {
        self.read_ahead
    }
}

impl<D> core::fmt::Debug for BlockDev<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockDev")
            .field("cache", &self.bcache)
            .field("read_ahead", &self.read_ahead)
            .field("read_count", &self.read_count)
            .field("write_count", &self.write_count)
            .field("physical_read_count", &self.physical_read_count)
            .field("physical_write_count", &self.physical_write_count)
            .finish()
    }
}
