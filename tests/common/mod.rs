#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qr_scanner::background::FetchRelay;
use qr_scanner::bus::{self, MessageBus, RelayResponse};
use qr_scanner::scanner::ScanConfig;
use qrcode::{Color, QrCode};
use tokio::task::JoinHandle;

/// 生成二维码 PNG（每模块 8 像素，4 模块静区）。
pub fn qr_png(text: &str) -> Vec<u8> {
    render_qr(text, false)
}

/// 浅色码、深色底的二维码 PNG。
pub fn inverted_qr_png(text: &str) -> Vec<u8> {
    render_qr(text, true)
}

fn render_qr(text: &str, inverted: bool) -> Vec<u8> {
    let code = QrCode::new(text.as_bytes()).expect("encode qr");
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let scale = 8;
    let quiet = 4;
    let size = (modules + quiet * 2) * scale;
    let (dark, light) = if inverted { (255, 0) } else { (0, 255) };

    let image = GrayImage::from_fn(size, size, |x, y| {
        let mx = (x / scale) as i64 - quiet as i64;
        let my = (y / scale) as i64 - quiet as i64;
        let inside = mx >= 0 && my >= 0 && (mx as u32) < modules && (my as u32) < modules;
        if inside && colors[(my as u32 * modules + mx as u32) as usize] == Color::Dark {
            Luma([dark])
        } else {
            Luma([light])
        }
    });

    encode_png(DynamicImage::ImageLuma8(image))
}

pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        width,
        height,
        Luma([255]),
    )))
}

pub fn encode_png(image: DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("encode png");
    cursor.into_inner()
}

/// 本地 HTTP 夹具：对任意路径返回固定响应，并统计请求次数。
pub struct TestServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn serve(status: &str, content_type: &str, body: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        );

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut request = [0u8; 4096];
                let _ = stream.read(&mut request);
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&body);
                let _ = stream.flush();
            }
        });

        Self { addr, hits }
    }

    pub fn png(body: Vec<u8>) -> Self {
        Self::serve("200 OK", "image/png", body)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// 一个必然拒绝连接的本地地址。
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}/qr.png", addr)
}

/// 统计经过总线的请求数，并转交真实的代理处理。
pub struct CountingRelay {
    pub bus: MessageBus,
    requests: Arc<AtomicUsize>,
    _task: JoinHandle<()>,
}

impl CountingRelay {
    pub fn start(config: ScanConfig) -> Self {
        let relay = Arc::new(FetchRelay::new(config).expect("relay"));
        let (bus, mut rx) = bus::channel(8);
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let relay = relay.clone();
                tokio::spawn(async move {
                    let response: RelayResponse = relay.handle(envelope.request).await;
                    let _ = envelope.reply.send(response);
                });
            }
        });

        Self {
            bus,
            requests,
            _task: task,
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}
