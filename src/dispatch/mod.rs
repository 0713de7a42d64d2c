//! # 结果分发
//!
//! ## 设计思路
//!
//! 解码出的文本只有两种动作：
//! - **复制**：总是提供，原样写入剪贴板
//! - **打开**：仅当文本像链接且能规范化为 `http/https` 地址时提供
//!
//! 动作执行依赖 `LinkOpener` 与 `ClipboardAccess` 两个 trait，
//! 命令行使用系统实现，测试注入记录型实现。

mod classify;
mod opener;

use std::sync::Arc;

pub use classify::{
    ActionClassification, OpenUrlError, ResultActions, classify, normalize_open_url,
};
pub use opener::{LinkOpener, SystemOpener};

use crate::clipboard_access::ClipboardAccess;
use crate::error::AppError;

/// 执行“打开 / 复制”动作。
#[derive(Clone)]
pub struct ResultDispatcher {
    opener: Arc<dyn LinkOpener>,
    clipboard: Arc<dyn ClipboardAccess>,
}

impl ResultDispatcher {
    pub fn new(opener: Arc<dyn LinkOpener>, clipboard: Arc<dyn ClipboardAccess>) -> Self {
        Self { opener, clipboard }
    }

    /// 打开规范化后的链接，返回实际打开的地址。
    ///
    /// 非链接文本或协议被拒绝时返回错误，不会启动任何程序。
    pub fn open(&self, text: &str) -> Result<String, AppError> {
        if !classify(text).is_likely_url {
            return Err(AppError::Open("内容不是链接".to_string()));
        }

        let url = normalize_open_url(text).map_err(|e| AppError::Open(e.to_string()))?;
        self.opener.open(&url)?;
        log::info!("🔗 已打开链接 - {}", crate::scanner::origin::redact_url_for_log(&url));
        Ok(url)
    }

    /// 原样复制解码文本。
    pub async fn copy(&self, text: &str) -> Result<(), AppError> {
        self.clipboard
            .write_text(text)
            .await
            .map_err(|e| AppError::Clipboard(e.to_string()))?;
        log::info!("📋 已复制解码文本 - {} 字符", text.chars().count());
        Ok(())
    }
}
