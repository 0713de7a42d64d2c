//! # 二维码识别工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────── 触发 (trigger) ─────────────────┐
//! │  右键图片 · 右键链接 · 粘贴快捷键 · 截图完成      │
//! └───────┬───────────────┬──────────────┬──────────┘
//!         ↓               ↓              ↓
//! ┌─ 页面上下文 ─────────────────────────────────────────────┐
//! │  scanner::ScanPipeline    dialog::DialogHost   screenshot │
//! │   ├─ acquire  同源直连 / 跨域走总线                        │
//! │   ├─ extract  字节 → RGBA                                 │
//! │   ├─ decode   双极性解码 (rqrr)                           │
//! │   └─ dispatch 打开 / 复制                                 │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ bus (RelayRequest / RelayResponse, mpsc + oneshot)
//! ┌─ 后台上下文 ──────────────────────────────────────────────┐
//! │  background::FetchRelay   http(s) / data: / file: 抓取    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 应用级错误 `AppError` |
//! | [`bus`] | 跨上下文请求/应答契约与通道 |
//! | [`background`] | 特权上下文：代理抓取图片并编码为 data URI |
//! | [`scanner`] | 获取、光栅化、解码与结果流水线 |
//! | [`dispatch`] | 文本分类、链接规范化、打开/复制动作 |
//! | [`clipboard_access`] | 剪贴板读写接口与系统实现 |
//! | [`dialog`] | 粘贴/拖放/选文件对话框状态机（每文档单例） |
//! | [`screenshot`] | 截图能力桥接 |
//! | [`trigger`] | 触发分发与只读一次的右键目标 |
//! | [`settings`] | 设置文件加载 |

pub mod background;
pub mod bus;
pub mod clipboard_access;
pub mod dialog;
pub mod dispatch;
pub mod error;
pub mod scanner;
pub mod screenshot;
pub mod settings;
pub mod trigger;

#[cfg(test)]
mod test_support;
