//! 截图粘贴对话框会话
//!
//! # 设计思路
//!
//! 对话框是页面上下文里唯一的可变共享状态。所有输入（选文件、拖放、粘贴事件、
//! 主动读剪贴板）最终都汇入 `load_image`，由它完成 idle/loaded → scanning 的迁移，
//! 扫描结束后再迁移到 success / error。
//!
//! # 实现思路
//!
//! - **生命周期**：打开时挂载元素并注册文档级 `keydown` / `paste` 监听，守卫存放在会话里；
//!   关闭按钮、Esc、点击遮罩、程序关闭都走同一个 `teardown`，守卫随之释放。
//! - **单例**：会话挂接在文档的保留 id 下（文档持有），同一文档上的任何宿主都查得到；
//!   teardown 时摘除。
//! - **活性检查**：每次载入图片递增 `generation`，扫描完成时若代数不符或对话框已关闭则丢弃结果。
//! - **去重**：只在 loaded / scanning 时忽略相同图片；success / error 下再次粘贴同一张图会重新扫描。
//! - **粘贴优先级**：Ctrl/Cmd+V 只是预约一次延迟读取，宽限期内若粘贴事件已送达图片则跳过。
//! - **观察者**：状态变化以 `DialogSnapshot` 发布到 `watch` 通道，界面只订阅不轮询。

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;

use super::document::{
    Document, DocumentEvent, KeyEvent, ListenerGuard, ListenerKind, SessionHandle,
};
use super::state::{DialogPhase, DialogSnapshot, ImagePreview, InputDisposition};
use crate::clipboard_access::{self, ClipboardAccess, ClipboardItem};
use crate::scanner::{ImageReference, NoopObserver, ScanError, ScanPipeline};

/// 对话框容器的保留 id（单例标识）。
pub const CONTAINER_ID: &str = "qr-paste-dialog-container";
/// 遮罩层 id。
pub const OVERLAY_ID: &str = "qr-paste-dialog-overlay";
/// 对话框主体 id（获得焦点的元素）。
pub const SURFACE_ID: &str = "qr-paste-dialog";

pub(crate) const DIALOG_ELEMENT_IDS: [&str; 3] = [CONTAINER_ID, OVERLAY_ID, SURFACE_ID];

/// 选中或拖入的文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    pub name: String,
    /// 浏览器给出的类型，可能为空。
    pub mime: String,
    pub data: Vec<u8>,
}

impl FileInput {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data,
        }
    }

    /// 声明类型为空时按文件头识别。
    fn effective_mime(&self) -> String {
        if !self.mime.trim().is_empty() {
            return self.mime.trim().to_ascii_lowercase();
        }
        infer::get(&self.data)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_default()
    }
}

struct SessionState {
    snapshot: DialogSnapshot,
    current_image: Option<ImageReference>,
    /// 粘贴事件成功送达图片的次数。
    paste_deliveries: u64,
    listeners: Vec<ListenerGuard>,
}

struct DialogInner {
    document: Document,
    pipeline: ScanPipeline,
    clipboard: Arc<dyn ClipboardAccess>,
    runtime: Handle,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<DialogSnapshot>,
}

impl DialogInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, snapshot: &DialogSnapshot) {
        self.snapshots.send_replace(snapshot.clone());
    }
}

/// 对话框会话句柄。克隆指向同一会话。
#[derive(Clone)]
pub struct CaptureDialog {
    inner: Arc<DialogInner>,
}

impl CaptureDialog {
    /// 挂载元素、聚焦、挂接到文档并注册文档级监听。单例检查由 `DialogHost` 负责。
    pub(crate) fn open(
        document: Document,
        pipeline: ScanPipeline,
        clipboard: Arc<dyn ClipboardAccess>,
        runtime: Handle,
    ) -> Self {
        for id in DIALOG_ELEMENT_IDS {
            document.mount(id);
        }
        document.focus(SURFACE_ID);

        let (snapshots, _) = watch::channel(DialogSnapshot::idle());
        let inner = Arc::new(DialogInner {
            document: document.clone(),
            pipeline,
            clipboard,
            runtime,
            state: Mutex::new(SessionState {
                snapshot: DialogSnapshot::idle(),
                current_image: None,
                paste_deliveries: 0,
                listeners: Vec::new(),
            }),
            snapshots,
        });

        let weak = Arc::downgrade(&inner);
        let keydown = document.add_listener(
            ListenerKind::KeyDown,
            Arc::new({
                let weak = weak.clone();
                move |event: &DocumentEvent| {
                    if let (Some(dialog), DocumentEvent::KeyDown(key)) = (Self::upgrade(&weak), event) {
                        dialog.on_keydown(key);
                    }
                }
            }),
        );
        let paste = document.add_listener(
            ListenerKind::Paste,
            Arc::new(move |event: &DocumentEvent| {
                if let (Some(dialog), DocumentEvent::Paste(items)) = (Self::upgrade(&weak), event) {
                    dialog.on_paste_event(items.clone());
                }
            }),
        );
        inner.lock().listeners = vec![keydown, paste];

        if !document.attach_session(CONTAINER_ID, inner.clone()) {
            log::warn!("⚠️ 文档上已登记其他对话框会话");
        }

        log::info!("🪟 截图粘贴对话框已打开");
        Self { inner }
    }

    /// 按保留 id 查找文档上仍处于打开状态的对话框。
    pub fn find(document: &Document) -> Option<Self> {
        let inner = document
            .session(CONTAINER_ID)?
            .downcast::<DialogInner>()
            .ok()?;
        let dialog = Self { inner };
        dialog.is_open().then_some(dialog)
    }

    fn upgrade(weak: &Weak<DialogInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn snapshot(&self) -> DialogSnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn phase(&self) -> DialogPhase {
        self.inner.lock().snapshot.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase().is_open()
    }

    /// 订阅状态变化。
    pub fn subscribe(&self) -> watch::Receiver<DialogSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// 当前图片（`currentImage`）。
    pub fn current_image(&self) -> Option<ImageReference> {
        self.inner.lock().current_image.clone()
    }

    pub fn on_file_picked(&self, file: FileInput) -> Result<InputDisposition, ScanError> {
        self.accept_file(file)
    }

    /// 拖放：取第一个文件。
    pub fn on_drop(&self, files: Vec<FileInput>) -> Result<InputDisposition, ScanError> {
        match files.into_iter().next() {
            Some(file) => self.accept_file(file),
            None => {
                if !self.phase().accepts_file() {
                    return Ok(InputDisposition::Inactive);
                }
                let err = ScanError::UnsupportedFormat("未检测到文件".to_string());
                self.report_input_error(&err);
                Err(err)
            }
        }
    }

    /// 系统粘贴事件：携带剪贴板条目，任何打开状态下都替换当前图片。
    pub fn on_paste_event(&self, items: Vec<ClipboardItem>) -> InputDisposition {
        let Some(item) = items
            .into_iter()
            .find(|item| item.is_image() && !item.data.is_empty())
        else {
            log::debug!("📋 粘贴内容不含图片，忽略");
            return InputDisposition::Inactive;
        };

        {
            let mut state = self.inner.lock();
            if !state.snapshot.phase.is_open() {
                return InputDisposition::Inactive;
            }
            state.paste_deliveries += 1;
        }

        self.load_image(ImageReference::bytes(item.data, item.mime), false)
    }

    pub fn on_keydown(&self, key: &KeyEvent) {
        if key.is_escape() {
            self.close();
            return;
        }

        if key.is_paste_shortcut() && self.has_focus() {
            self.schedule_manual_read();
        }
    }

    /// 点击遮罩（对话框主体之外）关闭对话框。
    pub fn on_overlay_click(&self, inside_dialog: bool) {
        if !inside_dialog {
            self.close();
        }
    }

    /// 主动读取剪贴板（“读取剪贴板”按钮或 Ctrl+V 宽限期后）。
    pub async fn read_clipboard(&self) -> Result<InputDisposition, ScanError> {
        if !self.is_open() {
            return Ok(InputDisposition::Inactive);
        }

        match clipboard_access::read_first_image(self.inner.clipboard.as_ref()).await {
            Ok(reference) => Ok(self.load_image(reference, false)),
            Err(err) => {
                self.report_input_error(&err);
                Err(err)
            }
        }
    }

    /// 清除当前图片，回到 idle。
    pub fn clear(&self) -> bool {
        let mut state = self.inner.lock();
        if !state.snapshot.phase.can_clear() {
            return false;
        }

        let generation = state.snapshot.generation + 1;
        state.current_image = None;
        state.snapshot = DialogSnapshot {
            generation,
            ..DialogSnapshot::idle()
        };
        self.inner.publish(&state.snapshot);
        true
    }

    /// 重新扫描当前图片：success / error → loaded → scanning。
    pub fn rescan(&self) -> InputDisposition {
        let reference = {
            let state = self.inner.lock();
            if !state.snapshot.phase.can_rescan() {
                return InputDisposition::Inactive;
            }
            match state.current_image.clone() {
                Some(reference) => reference,
                None => return InputDisposition::Inactive,
            }
        };
        self.load_image(reference, false)
    }

    /// 关闭对话框（任意状态）。
    pub fn close(&self) {
        self.teardown();
    }

    /// 所有关闭路径的唯一出口：释放监听、卸载元素、丢弃图片。
    fn teardown(&self) {
        let listeners = {
            let mut state = self.inner.lock();
            if !state.snapshot.phase.is_open() {
                return;
            }
            state.snapshot.phase = DialogPhase::Closed;
            state.snapshot.generation += 1;
            state.snapshot.preview = None;
            state.snapshot.message = None;
            state.current_image = None;
            self.inner.publish(&state.snapshot);
            std::mem::take(&mut state.listeners)
        };

        drop(listeners);
        let handle: SessionHandle = self.inner.clone();
        if self.inner.document.detach_session(CONTAINER_ID, &handle) {
            for id in DIALOG_ELEMENT_IDS {
                self.inner.document.unmount(id);
            }
        }
        log::info!("🪟 截图粘贴对话框已关闭");
    }

    fn has_focus(&self) -> bool {
        self.inner
            .document
            .focused()
            .is_some_and(|id| DIALOG_ELEMENT_IDS.contains(&id.as_str()))
    }

    fn accept_file(&self, file: FileInput) -> Result<InputDisposition, ScanError> {
        if !self.phase().accepts_file() {
            log::debug!("🚫 已有图片，拖放区不可用 - {}", file.name);
            return Ok(InputDisposition::Inactive);
        }

        let mime = file.effective_mime();
        let config = self.inner.pipeline.config_snapshot();
        if !config.accepts_mime(&mime) {
            let shown = if mime.is_empty() { "未知类型" } else { mime.as_str() };
            let err = ScanError::UnsupportedFormat(format!("{}（{}）", shown, file.name));
            self.report_input_error(&err);
            return Err(err);
        }

        Ok(self.load_image(ImageReference::bytes(file.data, mime), true))
    }

    /// 输入错误不改变阶段，只更新提示。
    fn report_input_error(&self, err: &ScanError) {
        log::warn!("⚠️ 对话框输入被拒绝 - code={} {}", err.code(), err);
        let mut state = self.inner.lock();
        if state.snapshot.phase.is_open() {
            state.snapshot.message = Some(err.to_string());
            self.inner.publish(&state.snapshot);
        }
    }

    /// 载入图片并立即进入 scanning。
    fn load_image(&self, reference: ImageReference, require_idle: bool) -> InputDisposition {
        let generation = {
            let mut state = self.inner.lock();
            let phase = state.snapshot.phase;
            if !phase.is_open() || (require_idle && !phase.accepts_file()) {
                return InputDisposition::Inactive;
            }
            if phase.ignores_duplicates() && same_bytes(state.current_image.as_ref(), &reference) {
                log::debug!("🔁 与当前图片相同，跳过");
                return InputDisposition::Duplicate;
            }

            let preview = match &reference {
                ImageReference::Bytes { data, mime } => ImagePreview {
                    mime: mime.clone(),
                    byte_len: data.len(),
                },
                ImageReference::Url(url) => ImagePreview {
                    mime: String::new(),
                    byte_len: url.len(),
                },
            };

            let generation = state.snapshot.generation + 1;
            state.current_image = Some(reference.clone());
            state.snapshot = DialogSnapshot {
                phase: DialogPhase::Loaded,
                generation,
                preview: Some(preview),
                ..DialogSnapshot::idle()
            };
            self.inner.publish(&state.snapshot);

            state.snapshot.phase = DialogPhase::Scanning;
            self.inner.publish(&state.snapshot);
            generation
        };

        self.spawn_scan(reference, generation);
        InputDisposition::Accepted
    }

    fn spawn_scan(&self, reference: ImageReference, generation: u64) {
        let pipeline = self.inner.pipeline.clone();
        let weak = Arc::downgrade(&self.inner);

        self.inner.runtime.spawn(async move {
            let outcome = pipeline.scan(reference, &NoopObserver).await;

            let Some(dialog) = Self::upgrade(&weak) else {
                return;
            };
            let mut state = dialog.inner.lock();
            if !state.snapshot.phase.is_open() || state.snapshot.generation != generation {
                log::debug!("🗑️ 丢弃过期的扫描结果 - generation={}", generation);
                return;
            }
            state.snapshot.apply_outcome(outcome);
            dialog.inner.publish(&state.snapshot);
        });
    }

    /// 宽限期后主动读剪贴板；期间粘贴事件已送达图片则跳过。
    fn schedule_manual_read(&self) {
        let seen = self.inner.lock().paste_deliveries;
        let grace = Duration::from_millis(self.inner.pipeline.config_snapshot().paste_event_grace_ms);
        let weak = Arc::downgrade(&self.inner);

        self.inner.runtime.spawn(async move {
            tokio::time::sleep(grace).await;

            let Some(dialog) = Self::upgrade(&weak) else {
                return;
            };
            {
                let state = dialog.inner.lock();
                if !state.snapshot.phase.is_open() || state.paste_deliveries != seen {
                    return;
                }
            }
            if let Err(err) = dialog.read_clipboard().await {
                log::debug!("📋 快捷键读取剪贴板失败：{}", err);
            }
        });
    }
}

fn same_bytes(current: Option<&ImageReference>, incoming: &ImageReference) -> bool {
    match (current, incoming) {
        (Some(ImageReference::Bytes { data: a, .. }), ImageReference::Bytes { data: b, .. }) => a == b,
        (Some(ImageReference::Url(a)), ImageReference::Url(b)) => a == b,
        _ => false,
    }
}
