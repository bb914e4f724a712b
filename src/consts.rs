//! 扇区缓存常量定义
//!
//! 这个模块包含了缓存的所有固定参数，包括：
//! - 扇区大小
//! - 默认缓存容量
//! - 哈希索引参数

//=============================================================================
// 基础常量
//=============================================================================

/// 扇区（缓存块）大小，固定 512 字节
pub const BLOCK_SIZE: usize = 512;

/// 默认缓存槽位数量（128 × 512B = 64KB）
pub const DEFAULT_CACHE_SIZE: usize = 128;

//=============================================================================
// 哈希索引
//=============================================================================

/// 哈希桶数量
///
/// 取素数，避免与 2 的幂次的扇区地址模式对齐
pub const HASH_SIZE: usize = 257;

/// 乘法散列常数（Knuth）
pub const HASH_MULTIPLIER: u32 = 2_654_435_761;

/// 驱动器号混入键值时的左移位数
///
/// 8 位驱动器号（0..=255）整体落在 32 位键值的最高字节。
pub const DRIVE_HASH_SHIFT: u32 = 24;
