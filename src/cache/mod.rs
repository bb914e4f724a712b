//! 扇区缓存模块
//!
//! 固定容量的写回缓存，位于文件系统胶水层与物理块设备之间，
//! 减少对重复访问或顺序访问的 512 字节扇区的设备 I/O。
//!
//! # 主要组件
//!
//! - 槽位池 + 空闲链表（`slot`、`free_list`）：固定数组，链接均为下标
//! - 哈希索引（`hash_index`）：(驱动器, 扇区) → 槽位，257 个素数桶，链式冲突
//! - LRU 链表（`lru_list`）：只用于挑选驱逐对象
//! - 驱逐/写回（`evict`）：回收 LRU 尾部，脏则先同步写回
//! - [`BlockCache`]：对外的 read/write/flush
//! - [`CacheStats`]：统计信息
//! - [`FlushFlags`]：刷新选项
//!
//! # 不变量
//!
//! - 每个槽位要么空闲（在空闲链表中），要么缓存（恰好在一个哈希桶链中、
//!   恰好在 LRU 链表的一个位置上）
//! - 每个 (驱动器, 扇区) 最多对应一个缓存槽位
//! - 脏槽位一定是缓存槽位
//! - 操作要么完全成功，要么失败且不改变任何槽位的索引/LRU 成员关系
//!
//! 簿记损坏（例如从哈希链中摘除不存在的槽位）直接 panic，不作为错误返回。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use sector_cache::cache::{BlockCache, FlushFlags};
//!
//! let mut cache = BlockCache::with_default_capacity();
//!
//! let mut buf = [0u8; 512];
//! cache.read_block(&mut device, 0, 100, Some(&mut buf))?;
//!
//! buf[0] = 42;
//! cache.write_block(&mut device, 0, 100, &buf)?;   // 只标记脏，不写设备
//!
//! cache.flush(&mut device, false, false)?;         // 空闲时写回一个
//! cache.flush_with(&mut device, FlushFlags::all())?; // 写回全部并清空缓存
//!
//! log::info!("{}", cache.stats());
//! ```
//!
//! # 内存分配要求
//!
//! 槽位池在构造时通过 `alloc` 一次性分配，之后不再分配。

mod slot;
mod free_list;
mod hash_index;
mod lru_list;
mod evict;
mod block_cache;

pub use block_cache::{BlockCache, CacheStats, FlushFlags};
pub use crate::consts::DEFAULT_CACHE_SIZE;
