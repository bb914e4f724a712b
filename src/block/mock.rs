//! 测试用内存块设备
//!
//! 稀疏存储，记录每次物理读写，可以注入读写故障。

use super::BlockDevice;
use crate::consts::BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{BlockKey, DriveId, Lba, SectorBuf};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 内存块设备
#[derive(Debug, Default)]
pub(crate) struct MockDevice {
    storage: BTreeMap<BlockKey, SectorBuf>,
    /// 物理读日志
    pub reads: Vec<BlockKey>,
    /// 物理写日志（只记录成功的写入）
    pub writes: Vec<BlockKey>,
    /// 所有读取失败
    pub fail_reads: bool,
    /// 所有写入失败
    pub fail_writes: bool,
    /// 只有写这个扇区时失败
    pub fail_write_at: Option<BlockKey>,
    /// 只读驱动器
    pub read_only: Option<DriveId>,
    /// sync 调用次数
    pub syncs: usize,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未写过的扇区内容：前 8 字节为地址，第 9 字节为驱动器号
    pub fn pattern(key: BlockKey) -> SectorBuf {
        let mut buf = [0u8; BLOCK_SIZE];
        LittleEndian::write_u64(&mut buf[..8], key.lba as u64);
        buf[8] = key.drive;
        buf
    }

    /// 设备上实际保存的内容（未写过返回 None）
    pub fn stored(&self, key: BlockKey) -> Option<SectorBuf> {
        self.storage.get(&key).copied()
    }

    /// 某个键被写入的次数
    pub fn write_count_of(&self, key: BlockKey) -> usize {
        self.writes.iter().filter(|k| **k == key).count()
    }
}

impl BlockDevice for MockDevice {
    fn read_sector(&mut self, drive: DriveId, lba: Lba, buf: &mut SectorBuf) -> Result<()> {
        if self.fail_reads {
            return Err(Error::new(ErrorKind::Io, "mock read failure"));
        }
        let key = BlockKey::new(drive, lba);
        self.reads.push(key);
        *buf = self.stored(key).unwrap_or_else(|| Self::pattern(key));
        Ok(())
    }

    fn write_sector(&mut self, drive: DriveId, lba: Lba, buf: &SectorBuf) -> Result<()> {
        let key = BlockKey::new(drive, lba);
        if self.fail_writes || self.fail_write_at == Some(key) {
            return Err(Error::new(ErrorKind::Io, "mock write failure"));
        }
        self.writes.push(key);
        self.storage.insert(key, *buf);
        Ok(())
    }

    fn sync(&mut self, _drive: DriveId) -> Result<()> {
        self.syncs += 1;
        Ok(())
    }

    fn is_read_only(&self, drive: DriveId) -> bool {
        self.read_only == Some(drive)
    }
}

/// 以键值填充的扇区数据（区别于 [`MockDevice::pattern`]）
pub(crate) fn stamped(key: BlockKey, fill: u8) -> SectorBuf {
    let mut buf = [fill; BLOCK_SIZE];
    LittleEndian::write_u64(&mut buf[..8], key.lba as u64);
    buf[8] = key.drive;
    buf
}
