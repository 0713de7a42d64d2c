//! # 同源判断
//!
//! 同源 = scheme + host + port 完全一致。`file:` 链接一律视为跨域，
//! 浏览器不允许跨上下文读取本地文件的像素。

use reqwest::Url;

use super::ScanError;

/// 规范化后的页面来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrigin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl PageOrigin {
    /// 从 `https://example.com` / `http://host:8080/any/path` 等形式解析来源。
    pub fn parse(origin: &str) -> Result<Self, ScanError> {
        let parsed = Url::parse(origin.trim())
            .map_err(|e| ScanError::InvalidReference(format!("页面来源格式错误：{}", e)))?;

        Self::from_url(&parsed).ok_or_else(|| {
            ScanError::InvalidReference(format!("页面来源缺少主机：{}", origin))
        })
    }

    fn from_url(url: &Url) -> Option<Self> {
        if url.scheme() == "file" {
            return None;
        }

        let host = url.host_str()?.to_ascii_lowercase();
        Some(Self {
            scheme: url.scheme().to_ascii_lowercase(),
            host,
            port: url.port_or_known_default(),
        })
    }

    /// 是否与给定 URL 同源。
    pub fn matches(&self, url: &Url) -> bool {
        match Self::from_url(url) {
            Some(other) => other == *self,
            None => false,
        }
    }
}

/// 解析图片 URL，支持相对页面来源的相对地址。
pub fn resolve_image_url(raw: &str, origin: Option<&PageOrigin>) -> Result<Url, ScanError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScanError::InvalidReference("图片地址为空".to_string()));
    }

    match Url::parse(trimmed) {
        Ok(url) => Ok(url),
        Err(e) if has_scheme(trimmed) => Err(ScanError::InvalidReference(format!(
            "图片地址格式错误：{}",
            e
        ))),
        Err(_) => {
            let origin = origin.ok_or_else(|| {
                ScanError::InvalidReference(format!("相对地址缺少页面来源：{}", trimmed))
            })?;
            let base = origin.base_url()?;
            base.join(trimmed)
                .map_err(|e| ScanError::InvalidReference(format!("图片地址解析失败：{}", e)))
        }
    }
}

fn has_scheme(text: &str) -> bool {
    let Some((scheme, _)) = text.split_once(':') else {
        return false;
    };

    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl PageOrigin {
    fn base_url(&self) -> Result<Url, ScanError> {
        let text = match self.port {
            Some(port) => format!("{}://{}:{}/", self.scheme, self.host, port),
            None => format!("{}://{}/", self.scheme, self.host),
        };
        Url::parse(&text).map_err(|e| ScanError::InvalidReference(format!("页面来源无效：{}", e)))
    }
}

/// 判断图片地址是否与页面同源；没有页面来源时一律视为跨域。
pub fn is_same_origin(url: &Url, origin: Option<&PageOrigin>) -> bool {
    match origin {
        Some(origin) => origin.matches(url),
        None => false,
    }
}

/// 日志用的脱敏 URL：只保留 scheme/host/port/path。
pub fn redact_url_for_log(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    if parsed.scheme() == "data" {
        return "data:<inline>".to_string();
    }

    let host = parsed.host_str().unwrap_or("");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
    format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(text: &str) -> PageOrigin {
        PageOrigin::parse(text).expect("parse origin")
    }

    #[test]
    fn same_scheme_host_port_is_same_origin() {
        let page = origin("https://example.com/some/page");
        let url = Url::parse("https://example.com:443/img/qr.png").expect("parse url");

        assert!(is_same_origin(&url, Some(&page)));
    }

    #[test]
    fn different_port_or_scheme_is_cross_origin() {
        let page = origin("https://example.com");

        for raw in [
            "http://example.com/qr.png",
            "https://example.com:8443/qr.png",
            "https://cdn.example.com/qr.png",
        ] {
            let url = Url::parse(raw).expect("parse url");
            assert!(!is_same_origin(&url, Some(&page)), "{raw}");
        }
    }

    #[test]
    fn file_urls_are_always_cross_origin() {
        let url = Url::parse("file:///tmp/qr.png").expect("parse url");
        assert!(!is_same_origin(&url, Some(&origin("https://example.com"))));
        assert!(PageOrigin::parse("file:///tmp/").is_err());
    }

    #[test]
    fn relative_urls_resolve_against_origin() {
        let page = origin("http://localhost:3000");
        let url = resolve_image_url("/static/qr.png", Some(&page)).expect("resolve");

        assert_eq!(url.as_str(), "http://localhost:3000/static/qr.png");
        assert!(is_same_origin(&url, Some(&page)));
    }

    #[test]
    fn malformed_urls_are_invalid_references() {
        assert!(matches!(
            resolve_image_url("", None),
            Err(ScanError::InvalidReference(_))
        ));
        assert!(matches!(
            resolve_image_url("/relative.png", None),
            Err(ScanError::InvalidReference(_))
        ));
        assert!(matches!(
            resolve_image_url("http://[::1", None),
            Err(ScanError::InvalidReference(_))
        ));
    }

    #[test]
    fn redaction_drops_query_and_inline_payloads() {
        assert_eq!(
            redact_url_for_log("https://example.com:8443/a.png?token=abc#x"),
            "https://example.com:8443/a.png"
        );
        assert_eq!(redact_url_for_log("data:image/png;base64,AAAA"), "data:<inline>");
    }
}
