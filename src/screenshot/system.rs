use std::io::Cursor;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbaImage, imageops};

use super::{CaptureError, CaptureMode, ScreenCapturer};

/// 基于 `xcap` 的系统截图。
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapCapturer;

#[async_trait]
impl ScreenCapturer for XcapCapturer {
    async fn capture(&self, mode: CaptureMode) -> Result<Vec<u8>, CaptureError> {
        tokio::task::spawn_blocking(move || capture_blocking(mode))
            .await
            .map_err(|e| CaptureError::Failed(format!("截图任务执行失败：{}", e)))?
    }
}

fn capture_blocking(mode: CaptureMode) -> Result<Vec<u8>, CaptureError> {
    let start = std::time::Instant::now();
    let screenshot = capture_primary_monitor()?;
    log::info!(
        "📸 xcap 截图 - {}x{} {}ms",
        screenshot.width(),
        screenshot.height(),
        start.elapsed().as_millis()
    );

    let image = match mode {
        CaptureMode::PrimaryMonitor => screenshot,
        CaptureMode::Region {
            x,
            y,
            width,
            height,
        } => crop_region(&screenshot, x, y, width, height)?,
    };

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| CaptureError::Failed(format!("编码截图失败：{}", e)))?;
    Ok(cursor.into_inner())
}

fn capture_primary_monitor() -> Result<RgbaImage, CaptureError> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| CaptureError::Failed(format!("枚举显示器失败：{}", e)))?;

    let monitor = monitors
        .iter()
        .find(|monitor| monitor.is_primary().unwrap_or(false))
        .or_else(|| monitors.first())
        .ok_or_else(|| CaptureError::Failed("没有可用的显示器".to_string()))?;

    monitor
        .capture_image()
        .map_err(|e| CaptureError::Failed(format!("截取显示器失败：{}", e)))
}

fn crop_region(
    screenshot: &RgbaImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<RgbaImage, CaptureError> {
    if width == 0 || height == 0 {
        return Err(CaptureError::Cancelled("选区为空".to_string()));
    }

    let fits_x = x.checked_add(width).is_some_and(|right| right <= screenshot.width());
    let fits_y = y.checked_add(height).is_some_and(|bottom| bottom <= screenshot.height());
    if !fits_x || !fits_y {
        return Err(CaptureError::Failed(format!(
            "选区 {}x{}+{}+{} 超出屏幕 {}x{}",
            width,
            height,
            x,
            y,
            screenshot.width(),
            screenshot.height()
        )));
    }

    Ok(imageops::crop_imm(screenshot, x, y, width, height).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crops_inside_bounds_only() {
        let screen = RgbaImage::new(100, 50);

        let cropped = crop_region(&screen, 10, 10, 20, 20).expect("crop");
        assert_eq!(cropped.dimensions(), (20, 20));

        assert!(matches!(crop_region(&screen, 90, 0, 20, 10), Err(CaptureError::Failed(_))));
        assert!(matches!(crop_region(&screen, 0, 0, 0, 10), Err(CaptureError::Cancelled(_))));
    }
}
