//! # 后台（特权）上下文
//!
//! 拥有网络访问能力、没有文档。对页面侧只暴露消息总线上的 `fetchImage` 请求。
//!
//! - `fetch`：按 scheme 抓取图片字节并编码为 data URI
//! - `relay`：总线请求处理与并发调度

mod fetch;
mod relay;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::bus::{self, MessageBus};
use crate::scanner::ScanConfig;

pub use fetch::{FetchError, FetchedImage, ImageFetcher, parse_data_uri};
pub use relay::{FetchRelay, spawn_relay};

const BUS_CAPACITY: usize = 32;

/// 创建总线并启动代理服务，返回页面侧句柄。
///
/// # 示例
/// ```rust,no_run
/// use qr_scanner::background;
/// use qr_scanner::scanner::ScanConfig;
///
/// # async fn demo() -> Result<(), qr_scanner::background::FetchError> {
/// let (bus, _service) = background::start(ScanConfig::default())?;
/// # drop(bus);
/// # Ok(())
/// # }
/// ```
pub fn start(config: ScanConfig) -> Result<(MessageBus, JoinHandle<()>), FetchError> {
    let relay = Arc::new(FetchRelay::new(config)?);
    let (bus, rx) = bus::channel(BUS_CAPACITY);
    let handle = spawn_relay(relay, rx);
    Ok((bus, handle))
}
