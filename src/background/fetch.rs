//! # 抓取模块
//!
//! ## 设计思路
//!
//! 后台上下文不受同源限制，负责把任意图片地址变成“可移植”的 data URI。
//! 统一处理三类地址，并在“尽可能早”的阶段校验，尽快失败：
//!
//! - `http/https`：状态码 + 内容类型 + 体积校验 + 流式下载（首包/分块超时）
//! - `data:`：本地解析，不走网络
//! - `file:`：存在性 + metadata 体积限制 + 读取
//!
//! 单次请求只尝试一次，是否重试由调用方决定。

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use reqwest::Url;

use crate::scanner::ScanConfig;
use crate::scanner::origin::redact_url_for_log;

const STREAM_SIGNATURE_PROBE_BYTES: usize = 4096;
const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;

/// 抓取阶段错误。最终会被转换为应答里的 `error` 文本。
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("URL 格式错误：{0}")]
    InvalidUrl(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("超时：{0}")]
    Timeout(String),

    #[error("不是图片：{0}")]
    NotImage(String),

    #[error("资源限制：{0}")]
    TooLarge(String),

    #[error("文件错误：{0}")]
    FileSystem(String),
}

/// 抓取结果：原始字节与识别出的 MIME。
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl FetchedImage {
    /// 编码为 `data:<mime>;base64,<payload>`。
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// 图片抓取器，内部持有复用型 HTTP 客户端。
pub struct ImageFetcher {
    client: reqwest::Client,
    config: ScanConfig,
}

impl ImageFetcher {
    pub fn new(config: ScanConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| FetchError::Network(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self { client, config })
    }

    /// 按 scheme 分派抓取。
    pub async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let parsed = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => self.fetch_http(parsed).await,
            "data" => parse_data_uri(parsed.as_str(), self.config.max_file_size),
            "file" => self.read_file(&parsed).await,
            other => Err(FetchError::InvalidUrl(format!("不支持的协议：{}", other))),
        }
    }

    async fn fetch_http(&self, url: Url) -> Result<FetchedImage, FetchError> {
        let redacted = redact_url_for_log(url.as_str());
        log::info!("🌐 后台开始抓取图片 - URL: {}", redacted);

        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "image/avif,image/webp,image/apng,image/*,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status_message(status.as_u16())
            )));
        }

        let declared_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .and_then(image_mime_from_content_type);

        let total_len = response.content_length();
        if let Some(size) = total_len {
            if size > self.config.max_file_size {
                return Err(FetchError::TooLarge(format!(
                    "文件过大：{:.2} MB（限制：{:.2} MB）",
                    size as f64 / 1024.0 / 1024.0,
                    self.config.max_file_size as f64 / 1024.0 / 1024.0
                )));
            }
        }

        let initial_capacity = total_len
            .map(|len| len.min(self.config.max_file_size) as usize)
            .filter(|len| *len > 0)
            .unwrap_or(BUFFER_INITIAL_CAPACITY);
        let mut buffer = Vec::with_capacity(initial_capacity);
        let mut response = response;
        let mut signature_validated = false;
        let mut received_first_chunk = false;

        loop {
            let read_timeout = if received_first_chunk {
                Duration::from_millis(self.config.stream_chunk_timeout_ms)
            } else {
                Duration::from_millis(self.config.stream_first_byte_timeout_ms)
            };

            let next_chunk = tokio::time::timeout(read_timeout, response.chunk())
                .await
                .map_err(|_| {
                    if received_first_chunk {
                        FetchError::Timeout("下载数据流读取超时".to_string())
                    } else {
                        FetchError::Timeout("下载首包超时".to_string())
                    }
                })?;

            let Some(chunk) = next_chunk.map_err(|e| FetchError::Network(format!("下载失败：{}", e)))?
            else {
                break;
            };

            received_first_chunk = true;

            if (buffer.len() + chunk.len()) as u64 > self.config.max_file_size {
                return Err(FetchError::TooLarge("下载内容超过大小限制".to_string()));
            }
            buffer.extend_from_slice(&chunk);

            if !signature_validated {
                signature_validated =
                    validate_stream_signature_probe(&buffer, STREAM_SIGNATURE_PROBE_BYTES)?;
            }
        }

        let sniffed = sniff_image_mime(&buffer)?;
        log::debug!("✅ 后台抓取完成 - {} bytes", buffer.len());

        Ok(FetchedImage {
            bytes: buffer,
            mime: declared_mime.unwrap_or(sniffed),
        })
    }

    async fn read_file(&self, url: &Url) -> Result<FetchedImage, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|_| FetchError::InvalidUrl("无法转换为本地路径".to_string()))?;
        log::info!("📁 后台读取本地图片 - 路径: {}", path.display());

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FetchError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if metadata.len() > self.config.max_file_size {
            return Err(FetchError::TooLarge(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                self.config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| FetchError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        let mime = sniff_image_mime(&bytes)?;

        Ok(FetchedImage { bytes, mime })
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> FetchError {
        let message = match e.url() {
            Some(url) => e
                .to_string()
                .replace(url.as_str(), &redact_url_for_log(url.as_str())),
            None => e.to_string(),
        };

        if e.is_timeout() {
            FetchError::Timeout(format!("下载超时（{}秒）", self.config.download_timeout))
        } else if e.is_connect() {
            FetchError::Network(format!("无法连接：{}", message))
        } else {
            FetchError::Network(format!("请求失败：{}", message))
        }
    }
}

/// 解析 `data:` URI，只支持 base64 载荷。
pub fn parse_data_uri(data: &str, max_file_size: u64) -> Result<FetchedImage, FetchError> {
    let rest = data
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| FetchError::InvalidUrl("缺少 data: 前缀".to_string()))?;

    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidUrl("data URI 缺少数据段".to_string()))?;

    let Some(declared) = meta.strip_suffix(";base64") else {
        return Err(FetchError::InvalidUrl(
            "仅支持 base64 编码的 data URI".to_string(),
        ));
    };

    let estimated = (payload.len() as u64).div_ceil(4).saturating_mul(3);
    if estimated > max_file_size {
        return Err(FetchError::TooLarge(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| FetchError::NotImage(format!("Base64 解码失败：{}", e)))?;
    let sniffed = sniff_image_mime(&bytes)?;
    let mime = image_mime_from_content_type(declared).unwrap_or(sniffed);

    Ok(FetchedImage { bytes, mime })
}

/// 取 Content-Type 的主体部分，仅当它是 `image/*` 时返回。
fn image_mime_from_content_type(content_type: &str) -> Option<String> {
    let base = content_type.split(';').next()?.trim().to_ascii_lowercase();
    base.starts_with("image/").then_some(base)
}

/// 通过文件签名（magic bytes）确认内容是图片并返回其 MIME。
fn sniff_image_mime(bytes: &[u8]) -> Result<String, FetchError> {
    if bytes.is_empty() {
        return Err(FetchError::NotImage("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| FetchError::NotImage("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(FetchError::NotImage(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(kind.mime_type().to_string())
}

/// 流式下载阶段的签名探测：尽早拒绝非图片内容。
///
/// - `Ok(true)`：已识别为图片
/// - `Ok(false)`：字节不足，继续下载
/// - `Err(...)`：已识别为非图片，或达到探测上限仍无法识别
fn validate_stream_signature_probe(bytes: &[u8], probe_limit: usize) -> Result<bool, FetchError> {
    if bytes.is_empty() {
        return Ok(false);
    }

    if let Some(kind) = infer::get(bytes) {
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(FetchError::NotImage(format!(
                "下载内容不是图片类型：{}",
                kind.mime_type()
            )));
        }
        return Ok(true);
    }

    if bytes.len() >= probe_limit {
        return Err(FetchError::NotImage(format!(
            "下载前 {} 字节内无法识别图片类型",
            probe_limit
        )));
    }

    Ok(false)
}

fn status_message(code: u16) -> &'static str {
    match code {
        404 => "未找到",
        403 => "访问被拒绝",
        500..=599 => "服务器错误",
        _ => "请求失败",
    }
}
