//! 基础类型定义
//!
//! 扇区地址宽度在编译期由 `lba64` 特性决定，对应 FatFs 的 `FF_LBA64`。

use crate::consts::BLOCK_SIZE;

/// 逻辑扇区地址（64 位寻址）
#[cfg(feature = "lba64")]
pub type Lba = u64;

/// 逻辑扇区地址（32 位寻址）
#[cfg(not(feature = "lba64"))]
pub type Lba = u32;

/// 物理驱动器号
pub type DriveId = u8;

/// 单个扇区的数据缓冲区
pub type SectorBuf = [u8; BLOCK_SIZE];

/// 缓存键：(驱动器号, 扇区地址)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    /// 驱动器号
    pub drive: DriveId,
    /// 扇区地址
    pub lba: Lba,
}

impl BlockKey {
    /// 创建缓存键
    pub const fn new(drive: DriveId, lba: Lba) -> Self {
        Self { drive, lba }
    }

    /// 下一个扇区的键（地址溢出时返回 None）
    pub fn next(self) -> Option<Self> {
        self.lba.checked_add(1).map(|lba| Self::new(self.drive, lba))
    }
}

impl core::fmt::Display for BlockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{:#x}", self.drive, self.lba)
    }
}
