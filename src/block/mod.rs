//! 块设备抽象
//!
//! 提供块设备接口和文件系统胶水层。
//! block/device.rs 定义外部驱动实现的设备接口，以及持有设备与缓存的 `BlockDev`

//! block/io.rs 决定每次传输走缓存还是绕过缓存：单扇区走缓存，多扇区先全量刷新再直接访问设备，
//! 并在读成功后登记预读，由 `task()` 在下一个调度节拍执行

//! block/lock.rs 为中断与主循环共享设备提供互斥边界

mod device;
mod io;
mod lock;

#[cfg(test)]
pub(crate) mod mock;

pub use device::{BlockDev, BlockDevice};
pub use lock::SharedBlockDev;
