//! # 二维码识别工具 — 命令行入口
//!
//! 本文件只负责参数解析、组装后台代理与扫码流水线、渲染结果。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use qr_scanner::background;
use qr_scanner::clipboard_access::{self, ClipboardAccess, SystemClipboard};
use qr_scanner::dispatch::{ResultDispatcher, SystemOpener};
use qr_scanner::error::AppError;
use qr_scanner::scanner::{ImageReference, ScanError, ScanEvent, ScanOutcome, ScanPipeline};
use qr_scanner::screenshot::{CaptureMode, ScreenshotBridge, ScreenshotOutcome};
use qr_scanner::settings;
use qr_scanner::trigger::{ContextTarget, TargetInfo, Trigger, TriggerOutcome, TriggerRouter};

/// 🔍 从图片地址、文件、剪贴板或屏幕截图中识别二维码
#[derive(Parser, Debug)]
#[command(name = "qr-scanner", version)]
#[command(about = "🔍 Decode QR codes from URLs, files, the clipboard or the screen")]
struct Cli {
    /// 设置文件路径（默认 `<config_dir>/qr-scanner/settings.json`）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 识别结果是链接时用系统浏览器打开
    #[arg(long, global = true)]
    open: bool,

    /// 将识别结果原样复制到剪贴板
    #[arg(long, global = true)]
    copy: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 识别网络图片（http/https、data: 或 file: 地址）
    Url {
        url: String,
        /// 当前页面来源，同源图片直接加载，其余经后台代理
        #[arg(long)]
        origin: Option<String>,
    },
    /// 识别本地图片文件
    File { path: PathBuf },
    /// 识别剪贴板中的图片
    Clipboard,
    /// 截取主显示器并识别
    Screenshot {
        /// 只识别选区：x,y,width,height
        #[arg(long, value_parser = parse_region)]
        region: Option<CaptureMode>,
    },
    /// 处理一条触发消息，例如 '{"action":"decodeQR","imageUrl":"…"}'
    Trigger {
        message: String,
        /// 最近一次右键目标的链接地址
        #[arg(long)]
        link_url: Option<String>,
        /// 最近一次右键目标的图片地址
        #[arg(long)]
        image_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("❌ {}", err);
            err.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, AppError> {
    let mut config = settings::load_settings(cli.config.as_deref())?;
    if let Command::Url {
        origin: Some(origin),
        ..
    } = &cli.command
    {
        config.page_origin = Some(origin.clone());
    }
    config.validate().map_err(AppError::Config)?;

    let (bus, _relay) = background::start(config.clone())?;
    let pipeline = ScanPipeline::connect(config, bus)?;
    let clipboard: Arc<dyn ClipboardAccess> = Arc::new(SystemClipboard);
    let dispatcher = ResultDispatcher::new(Arc::new(SystemOpener), Arc::clone(&clipboard));

    let progress = |event: &ScanEvent| match event {
        ScanEvent::Fetching { .. } => eprintln!("⏳ 正在通过后台代理获取图片…"),
        ScanEvent::Extracted { width, height } => log::debug!("🧩 图片尺寸 {}x{}", width, height),
        ScanEvent::Decoding => log::debug!("🔍 解析中…"),
    };

    let outcome = match cli.command {
        Command::Url { url, .. } => pipeline.scan(ImageReference::url(url), &progress).await,
        Command::File { path } => {
            let data = tokio::fs::read(&path).await?;
            let mime = infer::get(&data)
                .map(|kind| kind.mime_type())
                .unwrap_or("application/octet-stream");
            pipeline.scan(ImageReference::bytes(data, mime), &progress).await
        }
        Command::Clipboard => match clipboard_access::read_first_image(clipboard.as_ref()).await {
            Ok(reference) => pipeline.scan(reference, &progress).await,
            Err(err) => ScanOutcome::from_error(&err),
        },
        Command::Screenshot { region } => {
            let mode = region.unwrap_or(CaptureMode::PrimaryMonitor);
            let bridge = screenshot_bridge(pipeline, mode).ok_or_else(|| {
                ScanError::Capture(
                    "未启用 screen-capture 功能，请使用 --features screen-capture 重新构建".to_string(),
                )
            })?;
            match screenshot_result(bridge.run(&progress).await) {
                Ok(outcome) => outcome,
                Err(code) => return Ok(code),
            }
        }
        Command::Trigger {
            message,
            link_url,
            image_url,
        } => {
            let trigger: Trigger = serde_json::from_str(&message)
                .map_err(|e| ScanError::InvalidReference(format!("触发消息格式错误：{}", e)))?;

            let mut router = TriggerRouter::new(pipeline.clone(), Arc::new(ContextTarget::new()));
            if let Some(bridge) = screenshot_bridge(pipeline, CaptureMode::PrimaryMonitor) {
                router = router.with_screenshot(bridge);
            }
            if link_url.is_some() || image_url.is_some() {
                router.record_target(TargetInfo {
                    link_url,
                    image_url,
                });
            }

            match router.route(trigger, &progress).await {
                TriggerOutcome::Scanned(outcome) => outcome,
                TriggerOutcome::Screenshot(shot) => match screenshot_result(shot) {
                    Ok(outcome) => outcome,
                    Err(code) => return Ok(code),
                },
                other => {
                    eprintln!("⚠️ {}", other.message());
                    return Ok(1);
                }
            }
        }
    };

    render(outcome, &dispatcher, cli.open, cli.copy).await
}

#[cfg(feature = "screen-capture")]
fn screenshot_bridge(pipeline: ScanPipeline, mode: CaptureMode) -> Option<Arc<ScreenshotBridge>> {
    use qr_scanner::screenshot::XcapCapturer;

    Some(Arc::new(ScreenshotBridge::new(Arc::new(XcapCapturer), pipeline, mode)))
}

#[cfg(not(feature = "screen-capture"))]
fn screenshot_bridge(_pipeline: ScanPipeline, _mode: CaptureMode) -> Option<Arc<ScreenshotBridge>> {
    None
}

/// 截图结果：扫码结果继续渲染，取消与失败直接给出退出码。
fn screenshot_result(outcome: ScreenshotOutcome) -> Result<ScanOutcome, i32> {
    match outcome {
        ScreenshotOutcome::Scanned(outcome) => Ok(outcome),
        ScreenshotOutcome::Cancelled(reason) => {
            println!("📸 截图已取消：{}", reason);
            Err(0)
        }
        ScreenshotOutcome::Failed(message) => {
            eprintln!("❌ capture 失败：{}", message);
            Err(1)
        }
    }
}

async fn render(
    outcome: ScanOutcome,
    dispatcher: &ResultDispatcher,
    open: bool,
    copy: bool,
) -> Result<i32, AppError> {
    match outcome {
        ScanOutcome::Success { text, actions } => {
            println!("✅ {}", text);
            if let Some(url) = &actions.open_url {
                println!("🔗 可打开：{}", url);
            }

            if open {
                match actions.open_url {
                    Some(_) => {
                        dispatcher.open(&text)?;
                    }
                    None => eprintln!("⚠️ 识别结果不是可打开的链接"),
                }
            }
            if copy {
                dispatcher.copy(&actions.copy_text).await?;
                println!("📋 已复制到剪贴板");
            }
            Ok(0)
        }
        ScanOutcome::NoCode { hint } => {
            println!("🔍 {}", hint);
            Ok(1)
        }
        outcome @ ScanOutcome::Failed { .. } => {
            eprintln!("❌ {}", outcome.message());
            Ok(1)
        }
    }
}

/// 解析 `x,y,width,height`。
fn parse_region(value: &str) -> Result<CaptureMode, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("选区格式错误：{}", e))?;

    match parts.as_slice() {
        [x, y, width, height] => Ok(CaptureMode::Region {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        }),
        _ => Err("选区需要 4 个数字：x,y,width,height".to_string()),
    }
}
