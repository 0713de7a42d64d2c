//! # 进度观察者
//!
//! 进度提示（“正在跨域抓取…”、“解析中…”）不再穿插在流程代码里，
//! 而是作为状态迁移的旁路通知发给观察者，返回值只承载结果。

/// 流水线阶段事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// 跨域地址正在经由后台代理抓取（慢路径）。`url` 已脱敏，不含查询串与片段。
    Fetching { url: String },
    /// 图片已光栅化。
    Extracted { width: u32, height: u32 },
    /// 开始解码。
    Decoding,
}

/// 进度观察者。闭包可直接作为观察者使用。
pub trait ScanObserver: Send + Sync {
    fn on_event(&self, event: &ScanEvent);
}

impl<F> ScanObserver for F
where
    F: Fn(&ScanEvent) + Send + Sync,
{
    fn on_event(&self, event: &ScanEvent) {
        self(event)
    }
}

/// 不关心进度时使用。
pub struct NoopObserver;

impl ScanObserver for NoopObserver {
    fn on_event(&self, _event: &ScanEvent) {}
}
