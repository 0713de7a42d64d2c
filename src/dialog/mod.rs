//! 截图粘贴对话框模块
//!
//! # 设计思路
//!
//! 交互式采集入口：用户可以粘贴、拖放或选择图片，对话框实时扫码并给出结果。
//! - **document**：页面文档模型（元素、焦点、文档级监听 + RAII 守卫）
//! - **state**：阶段、快照与输入处理结果
//! - **session**：单个对话框会话的状态机
//! - **host**：每文档单例（先查后建，已存在则只聚焦）
//!
//! # 实现思路
//!
//! - 所有关闭路径（关闭按钮、Esc、点击遮罩、程序关闭）汇入同一个 teardown，
//!   文档级监听守卫随会话一起释放，不会跨开关周期泄漏。
//! - 异步扫描完成时做活性检查，对话框已关闭或图片已替换则丢弃结果。

pub mod document;
mod host;
mod session;
mod state;

pub use document::{Document, DocumentEvent, KeyEvent, ListenerGuard, ListenerKind};
pub use host::{DialogHost, DialogOpen};
pub use session::{CONTAINER_ID, CaptureDialog, FileInput, OVERLAY_ID, SURFACE_ID};
pub use state::{DialogPhase, DialogSnapshot, ImagePreview, InputDisposition};
