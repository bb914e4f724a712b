//! C API 兼容层 - 磁盘操作
//!
//! 提供 FatFs `diskio.h` 兼容的函数名与结果码，仅在命名上保留 C 风格。
//! 所有函数都是 Rust 方法的简单包装。

use crate::{
    block::{BlockDev, BlockDevice},
    cache::{BlockCache, FlushFlags},
    error::{ErrorKind, Result},
    types::{DriveId, Lba},
};

/// FatFs 的 `DRESULT`
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DResult {
    /// RES_OK：成功
    Ok = 0,
    /// RES_ERROR：读写错误
    Error = 1,
    /// RES_WRPRT：写保护
    WrPrt = 2,
    /// RES_NOTRDY：未就绪
    NotRdy = 3,
    /// RES_PARERR：参数错误
    ParErr = 4,
}

impl From<Result<()>> for DResult {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => DResult::Ok,
            Err(err) => match err.kind() {
                ErrorKind::Io => DResult::Error,
                ErrorKind::WriteProtected => DResult::WrPrt,
                ErrorKind::NotReady => DResult::NotRdy,
                // 缓存簿记异常在 C 侧也报参数错误
                ErrorKind::InvalidInput | ErrorKind::InvalidState => DResult::ParErr,
            },
        }
    }
}

/// C API: disk_read
///
/// 读取 `count` 个扇区。内部调用 `BlockDev::read_sectors`。
pub fn disk_read<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    pdrv: DriveId,
    buff: &mut [u8],
    sector: Lba,
    count: u32,
) -> DResult {
    bdev.read_sectors(pdrv, sector, count, buff).into()
}

/// C API: disk_write
///
/// 写入 `count` 个扇区。内部调用 `BlockDev::write_sectors`。
pub fn disk_write<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    pdrv: DriveId,
    buff: &[u8],
    sector: Lba,
    count: u32,
) -> DResult {
    bdev.write_sectors(pdrv, sector, count, buff).into()
}

/// C API: disk_task
///
/// 周期性调用，执行一次预读或增量刷新。内部调用 `BlockDev::task`。
pub fn disk_task<D: BlockDevice>(bdev: &mut BlockDev<D>) -> DResult {
    bdev.task().into()
}

/// C API: disk_ioctl(CTRL_SYNC)
///
/// 内部调用 `BlockDev::sync`。
pub fn disk_sync<D: BlockDevice>(bdev: &mut BlockDev<D>, pdrv: DriveId) -> DResult {
    bdev.sync(pdrv).into()
}

/// C API: block_cache_init
///
/// 重置缓存；未写回的数据被丢弃。
pub fn block_cache_init(cache: &mut BlockCache) {
    cache.init();
}

/// C API: block_cache_flush
///
/// 内部调用 `BlockDev::flush_cache`。
pub fn block_cache_flush<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    flush_all: bool,
    invalidate_all: bool,
) -> DResult {
    bdev.flush_cache(FlushFlags::from_bools(flush_all, invalidate_all))
        .into()
}
