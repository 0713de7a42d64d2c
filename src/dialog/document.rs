//! 文档模型（页面上下文）
//!
//! # 设计思路
//!
//! 对话框需要的文档能力：
//! - **元素登记**：按 id 挂载 / 卸载
//! - **会话登记**：按保留 id 挂接活动会话，同一文档内的所有宿主共享，用于单例检测
//! - **焦点**：记录当前获得焦点的元素
//! - **文档级监听**：`keydown` 与 `paste`
//!
//! # 实现思路
//!
//! - 监听注册返回 `ListenerGuard`，`Drop` 时自动注销，
//!   持有者消失即释放，任何退出路径都不会遗留监听。
//! - `dispatch` 先在锁内克隆监听列表、再在锁外逐个调用，
//!   监听回调内部可以安全地注销自己或卸载元素。

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::clipboard_access::ClipboardItem;

/// 文档级监听类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ListenerKind {
    KeyDown,
    Paste,
}

/// 键盘事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            meta: false,
        }
    }

    pub fn escape() -> Self {
        Self::new("Escape")
    }

    /// Ctrl+V（macOS 上为 Cmd+V）。
    pub fn paste_shortcut() -> Self {
        Self {
            key: "v".to_string(),
            ctrl: !cfg!(target_os = "macos"),
            meta: cfg!(target_os = "macos"),
        }
    }

    pub fn is_escape(&self) -> bool {
        self.key == "Escape"
    }

    pub fn is_paste_shortcut(&self) -> bool {
        (self.ctrl || self.meta) && self.key.eq_ignore_ascii_case("v")
    }
}

/// 文档级事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    KeyDown(KeyEvent),
    /// 系统粘贴事件，直接携带剪贴板条目。
    Paste(Vec<ClipboardItem>),
}

impl DocumentEvent {
    pub fn kind(&self) -> ListenerKind {
        match self {
            Self::KeyDown(_) => ListenerKind::KeyDown,
            Self::Paste(_) => ListenerKind::Paste,
        }
    }
}

pub type Listener = Arc<dyn Fn(&DocumentEvent) + Send + Sync>;

/// 挂接在文档上的会话。文档持有强引用，会话关闭时自行摘除。
pub type SessionHandle = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct DocumentState {
    elements: BTreeSet<String>,
    focused: Option<String>,
    sessions: BTreeMap<String, SessionHandle>,
    listeners: BTreeMap<u64, (ListenerKind, Listener)>,
    next_listener_id: u64,
}

/// 页面文档。克隆共享同一份状态。
#[derive(Clone, Default)]
pub struct Document {
    state: Arc<Mutex<DocumentState>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 挂载元素；id 已存在时返回 `false`。
    pub fn mount(&self, id: &str) -> bool {
        self.lock().elements.insert(id.to_string())
    }

    pub fn unmount(&self, id: &str) {
        let mut state = self.lock();
        state.elements.remove(id);
        if state.focused.as_deref() == Some(id) {
            state.focused = None;
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().elements.contains(id)
    }

    /// 聚焦已挂载的元素。
    pub fn focus(&self, id: &str) -> bool {
        let mut state = self.lock();
        if state.elements.contains(id) {
            state.focused = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn focused(&self) -> Option<String> {
        self.lock().focused.clone()
    }

    /// 在保留 id 下挂接会话；已有会话时不覆盖，返回 `false`。
    pub fn attach_session(&self, id: &str, session: SessionHandle) -> bool {
        let mut state = self.lock();
        if state.sessions.contains_key(id) {
            return false;
        }
        state.sessions.insert(id.to_string(), session);
        true
    }

    /// 按保留 id 查找会话。
    pub fn session(&self, id: &str) -> Option<SessionHandle> {
        self.lock().sessions.get(id).cloned()
    }

    /// 摘除会话，只有登记的正是 `session` 时才生效。
    pub fn detach_session(&self, id: &str, session: &SessionHandle) -> bool {
        let mut state = self.lock();
        match state.sessions.get(id) {
            Some(registered) if Arc::ptr_eq(registered, session) => {
                state.sessions.remove(id);
                true
            }
            _ => false,
        }
    }

    /// 注册文档级监听，返回的守卫被丢弃时自动注销。
    pub fn add_listener(&self, kind: ListenerKind, listener: Listener) -> ListenerGuard {
        let mut state = self.lock();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(id, (kind, listener));

        ListenerGuard {
            state: Arc::downgrade(&self.state),
            id,
        }
    }

    pub fn listener_count(&self, kind: ListenerKind) -> usize {
        self.lock()
            .listeners
            .values()
            .filter(|(registered, _)| *registered == kind)
            .count()
    }

    /// 派发事件，返回被调用的监听数量。
    pub fn dispatch(&self, event: &DocumentEvent) -> usize {
        let kind = event.kind();
        let listeners: Vec<Listener> = self
            .lock()
            .listeners
            .values()
            .filter(|(registered, _)| *registered == kind)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }
}

/// 监听注册守卫（RAII）。
pub struct ListenerGuard {
    state: Weak<Mutex<DocumentState>>,
    id: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state.listeners.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn guard_drop_unregisters_listener() {
        let document = Document::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let guard = document.add_listener(
            ListenerKind::KeyDown,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(document.dispatch(&DocumentEvent::KeyDown(KeyEvent::escape())), 1);
        assert_eq!(document.dispatch(&DocumentEvent::Paste(Vec::new())), 0);

        drop(guard);
        assert_eq!(document.listener_count(ListenerKind::KeyDown), 0);
        assert_eq!(document.dispatch(&DocumentEvent::KeyDown(KeyEvent::escape())), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unmount_clears_focus() {
        let document = Document::new();
        assert!(document.mount("a"));
        assert!(!document.mount("a"));
        assert!(document.focus("a"));
        assert!(!document.focus("missing"));

        document.unmount("a");
        assert!(!document.contains("a"));
        assert_eq!(document.focused(), None);
    }

    #[test]
    fn sessions_are_detached_only_by_their_owner() {
        let document = Document::new();
        let first: SessionHandle = Arc::new(1_u32);
        let second: SessionHandle = Arc::new(2_u32);

        assert!(document.attach_session("dialog", first.clone()));
        assert!(!document.attach_session("dialog", second.clone()));
        assert!(!document.detach_session("dialog", &second));

        let found = document.session("dialog").expect("session attached");
        assert!(Arc::ptr_eq(&found, &first));

        assert!(document.detach_session("dialog", &first));
        assert!(document.session("dialog").is_none());
    }

    #[test]
    fn paste_shortcut_detection() {
        assert!(KeyEvent::paste_shortcut().is_paste_shortcut());
        assert!(!KeyEvent::new("v").is_paste_shortcut());
        assert!(KeyEvent::escape().is_escape());
    }
}
