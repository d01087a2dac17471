//! QR link generation for the mobile upload page.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::ImageFormat;
use qrcode::QrCode;

use crate::config::ServerConfig;

/// Absolute URL the phone lands on after scanning.
///
/// `PUBLIC_URL` wins when configured; otherwise the server guesses its LAN
/// address, preferring private IPv4 ranges so a phone on the same network
/// can reach it.
pub fn upload_url(config: &ServerConfig, transfer_id: &str) -> String {
    let base = match &config.public_url {
        Some(url) => url.clone(),
        None => format!("http://{}:{}", lan_ip(), config.port),
    };
    format!("{}/upload?transferId={}", base, transfer_id)
}

/// Pick a local IP, prioritizing LAN ranges (192.168.x.x, 10.x.x.x, 172.16.x.x)
fn lan_ip() -> String {
    local_ip_address::list_afinet_netifas()
        .ok()
        .and_then(|ips| {
            let mut best_ip = None;
            for (_name, ip) in ips {
                if ip.is_loopback() || !ip.is_ipv4() {
                    continue;
                }
                let ip_str = ip.to_string();
                if ip_str.starts_with("192.168.") {
                    return Some(ip_str);
                }
                if ip_str.starts_with("10.") {
                    best_ip = Some(ip_str);
                    continue;
                }
                if ip_str.starts_with("172.") && best_ip.is_none() {
                    best_ip = Some(ip_str);
                    continue;
                }
                if best_ip.is_none() {
                    best_ip = Some(ip_str);
                }
            }
            best_ip
        })
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Render a URL as a PNG QR code.
pub fn qr_png(url: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(url.as_bytes()).context("QR encoding failed")?;

    let qr_image = code
        .render::<image::Luma<u8>>()
        .min_dimensions(200, 200)
        .max_dimensions(400, 400)
        .build();

    let mut png = Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(qr_image)
        .write_to(&mut png, ImageFormat::Png)
        .context("QR PNG encoding failed")?;
    Ok(png.into_inner())
}
