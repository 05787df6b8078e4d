// downloader.rs — 图片下载与校验
// 下载到内存，确认是合法的 JPEG / PNG 之后才写入磁盘

use crate::error::{Error, IoContext, Result};
use image::ImageFormat;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// 部分 CDN 会拒绝没有浏览器 UA 的请求
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.0.0 Safari/537.36";

pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// 构建共享的 HTTP 客户端
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

/// 校验字节内容是完整的 JPEG 或 PNG 图片
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat> {
    if bytes.is_empty() {
        return Err(Error::InvalidImage("downloaded zero bytes".to_string()));
    }
    let format = image::guess_format(bytes)
        .map_err(|e| Error::InvalidImage(format!("unrecognised image data: {e}")))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(Error::InvalidImage(format!("format {format:?} is not JPEG or PNG")));
    }
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::InvalidImage(format!("corrupted {format:?} data: {e}")))?;
    Ok(format)
}

/// 下载图片并保存到 save_path（父目录不存在时自动创建）
pub async fn download_image(client: &reqwest::Client, url: &str, save_path: &Path) -> Result<ImageFormat> {
    info!("downloading image from {url} to {}", save_path.display());

    if let Some(parent) = save_path.parent() {
        tokio::fs::create_dir_all(parent).await.at(parent)?;
    }

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !content_type.starts_with("image/") {
        warn!("{url} did not return an image content-type (got '{content_type}'), validating anyway");
    }

    let bytes = response.bytes().await?;
    let format = validate_image(&bytes)?;
    info!("image validated ({format:?})");

    let mut file = File::create(save_path).await.at(save_path)?;
    file.write_all(&bytes).await.at(save_path)?;
    file.flush().await.at(save_path)?;

    info!("saved image to {}", save_path.display());
    Ok(format)
}

/// 下载任意文件（发布包、工具），不做图片校验，返回字节数
///
/// 没有重试：网络错误直接返回给调用方
pub async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    info!("downloading {url} to {}", dest.display());
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.at(parent)?;
    }

    let bytes = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    if bytes.is_empty() {
        return Err(Error::from(format!("{url} returned an empty body")));
    }

    let mut file = File::create(dest).await.at(dest)?;
    file.write_all(&bytes).await.at(dest)?;
    file.flush().await.at(dest)?;
    Ok(bytes.len() as u64)
}
