//! # 扫码模块（页面上下文）
//!
//! ## 设计思路
//!
//! 将“图片引用 → 像素 → 文本”的全过程拆成职责单一的子模块：
//!
//! - `source`：图片引用、像素缓冲、解码结果等中间模型
//! - `origin`：页面来源与同源判断
//! - `acquire`：获取策略（同源直连 / 跨域经后台代理）
//! - `extract`：字节 → RGBA 像素缓冲
//! - `decode`：双极性二维码解码
//! - `pipeline`：按序编排并把一切失败转换为用户可见结果
//! - `events`：进度观察者
//!
//! ## 实现思路
//!
//! ```text
//! ImageReference ─ acquire ─→ bytes ─ extract ─→ PixelBuffer ─ decode ─→ DecodeResult ─→ ScanOutcome
//!                    │
//!                    └─(跨域) MessageBus → FetchRelay
//! ```

pub mod acquire;
mod config;
pub mod decode;
mod error;
pub mod events;
pub mod extract;
pub mod origin;
pub mod pipeline;
mod source;

pub use acquire::{DirectLoader, HttpDirectLoader, ImageAcquirer, LoadedImage};
pub use config::{DEFAULT_ACCEPTED_MIME_TYPES, ScanConfig};
pub use decode::{Polarity, decode};
pub use error::ScanError;
pub use events::{NoopObserver, ScanEvent, ScanObserver};
pub use extract::extract;
pub use origin::PageOrigin;
pub use pipeline::{NO_CODE_HINT, ScanOutcome, ScanPipeline};
pub use source::{DecodeResult, ImageReference, PixelBuffer};
