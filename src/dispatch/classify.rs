//! 解码文本分类模块
//!
//! # 设计思路
//!
//! 二维码内容既可能是网址，也可能是任意文本（Wi-Fi 配置、纯文字等）。
//! 本模块判断文本“像不像链接”，并把它规范化为可以安全打开的 `http/https` 地址。
//!
//! # 实现思路
//!
//! - 使用 `once_cell::sync::Lazy` 预编译正则，首次调用时编译，后续零成本复用。
//! - 像链接 = 带 scheme，或形如域名（`example.com`、`www.a.co:8080/path`）。
//! - 规范化：无 scheme 的域名补 `https://`；最终 scheme 不是 `http/https` 一律拒绝。

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

static HTTP_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("HTTP_PREFIX 正则无效"));

static SCHEME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").expect("SCHEME_PREFIX 正则无效"));

static DOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:www\.)?[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*\.[a-zA-Z]{2,}(?::\d{1,5})?(?:[/?#]\S*)?$",
    )
    .expect("DOMAIN_PATTERN 正则无效")
});

/// 解码文本的动作分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionClassification {
    pub is_likely_url: bool,
}

/// 规范化失败原因。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenUrlError {
    #[error("内容为空")]
    Empty,

    #[error("不支持的协议：{0}")]
    UnsupportedScheme(String),

    #[error("链接格式错误：{0}")]
    Malformed(String),
}

/// 判断文本是否像链接。
pub fn classify(text: &str) -> ActionClassification {
    let trimmed = text.trim();
    let is_likely_url = !trimmed.is_empty()
        && !trimmed.chars().any(char::is_whitespace)
        && (SCHEME_PREFIX.is_match(trimmed) || DOMAIN_PATTERN.is_match(trimmed));

    ActionClassification { is_likely_url }
}

/// 生成“打开”动作使用的地址。
///
/// `example.com` → `https://example.com`；`javascript:alert(1)` → `UnsupportedScheme`。
pub fn normalize_open_url(text: &str) -> Result<String, OpenUrlError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(OpenUrlError::Empty);
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(OpenUrlError::Malformed("包含空白字符".to_string()));
    }

    let candidate = if HTTP_PREFIX.is_match(trimmed) {
        trimmed.to_string()
    } else if DOMAIN_PATTERN.is_match(trimmed) {
        format!("https://{}", trimmed)
    } else if SCHEME_PREFIX.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&candidate).map_err(|e| OpenUrlError::Malformed(e.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(OpenUrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }
    // `http:example.com` 能被解析，但不是可直接交给系统打开的形式
    if !HTTP_PREFIX.is_match(&candidate) {
        return Err(OpenUrlError::Malformed("缺少 // 分隔符".to_string()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(OpenUrlError::Malformed("缺少主机地址".to_string()));
    }

    Ok(candidate)
}

/// 成功结果对应的动作：复制总是可用，打开仅对像链接且可规范化的文本提供。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultActions {
    pub copy_text: String,
    pub open_url: Option<String>,
}

impl ResultActions {
    pub fn from_text(text: &str) -> Self {
        let open_url = if classify(text).is_likely_url {
            normalize_open_url(text).ok()
        } else {
            None
        };

        Self {
            copy_text: text.to_string(),
            open_url,
        }
    }
}
