//! sector_cache: 512 字节扇区的固定容量写回缓存
//!
//! 位于文件系统胶水层（如 FatFs 的 `diskio`）与物理块设备之间，提供：
//! - **固定内存占用**：槽位池构造时一次性分配
//! - **写回**：写入只标记脏，由空闲刷新或驱逐时写回
//! - **LRU 驱逐**与可选的单扇区预读
//! - **可选的 C API 兼容层**
//!
//! # 示例
//!
//! ```rust,ignore
//! use sector_cache::{BlockDev, BlockDevice, Result, SectorBuf};
//!
//! // 实现 BlockDevice trait
//! struct SdCard {
//!     // ...
//! }
//!
//! impl BlockDevice for SdCard {
//!     // 实现 read_sector / write_sector
//!     // ...
//! }
//!
//! fn main() -> Result<()> {
//!     let mut disk = BlockDev::with_default_cache(SdCard::new());
//!
//!     let mut buf = [0u8; 512];
//!     disk.read_sectors(0, 100, 1, &mut buf)?;
//!
//!     // 主循环空闲时
//!     disk.task()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`types`] - 扇区键与缓冲区类型
//! - [`block`] - 块设备抽象和 I/O 胶水层
//! - [`cache`] - 扇区缓存
//! - `c_api` - C API 兼容层（可选）

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 数据结构定义
pub mod types;

/// 块设备抽象
pub mod block;

/// 扇区缓存
pub mod cache;

// ===== C API 兼容层（可选）=====

/// C API 兼容层
///
/// 提供与 FatFs `diskio` 胶水层兼容的函数接口。
#[cfg(feature = "c-api")]
pub mod c_api;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDev, BlockDevice, SharedBlockDev};

// Cache
pub use cache::{BlockCache, CacheStats, FlushFlags, DEFAULT_CACHE_SIZE};

// 类型与常量
pub use consts::BLOCK_SIZE;
pub use types::{BlockKey, DriveId, Lba, SectorBuf};

// C API（当启用时）
#[cfg(feature = "c-api")]
pub use c_api::block::{
    block_cache_flush, block_cache_init, disk_read, disk_sync, disk_task, disk_write, DResult,
};
