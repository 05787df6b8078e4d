// bing.rs — Bing 每日图片客户端
// 调用 HPImageArchive 接口获取当天的图片信息，并下载图片

use super::{SourceKind, WallpaperInfo, WallpaperSource};
use crate::downloader::{self, USER_AGENT};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const BING_BASE_URL: &str = "https://www.bing.com";

const API_TIMEOUT: Duration = Duration::from_secs(10);

/// 常用的 Bing 市场区域 (名称, 代码)
pub const BING_REGIONS: &[(&str, &str)] = &[
    ("USA (English)", "en-US"),
    ("Germany (German)", "de-DE"),
    ("UK (English)", "en-GB"),
    ("Australia (English)", "en-AU"),
    ("Japan (Japanese)", "ja-JP"),
    ("China (Chinese)", "zh-CN"),
    ("France (French)", "fr-FR"),
];

pub fn is_known_region(code: &str) -> bool {
    BING_REGIONS.iter().any(|(_, c)| *c == code)
}

/// HPImageArchive 响应的顶层结构
#[derive(Deserialize, Debug)]
struct ArchiveResponse {
    #[serde(default)]
    images: Vec<ArchiveImage>,
}

#[derive(Deserialize, Debug)]
struct ArchiveImage {
    /// 相对 URL，如 /th?id=OHR.Xxx_1920x1080.jpg&rf=...
    url: Option<String>,
    #[serde(default)]
    startdate: String,
    copyright: Option<String>,
    title: Option<String>,
}

/// 从接口返回的 JSON 提取第一张图片
fn parse_archive(body: &str, base: &Url) -> Result<WallpaperInfo> {
    let response: ArchiveResponse = serde_json::from_str(body)?;
    let image = response.images.into_iter().next().ok_or(Error::NoImages)?;
    let relative = image.url.filter(|u| !u.is_empty()).ok_or(Error::NoImages)?;
    let full = base.join(&relative)?;

    Ok(WallpaperInfo {
        url: full.to_string(),
        date: image.startdate,
        title: image.title.unwrap_or_else(|| "N/A".to_string()),
        copyright: image.copyright.unwrap_or_else(|| "N/A".to_string()),
        source: SourceKind::Bing,
    })
}

/// Bing 客户端
pub struct BingClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BingClient {
    pub fn new(client: reqwest::Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: Url::parse(BING_BASE_URL)?,
        })
    }

    fn archive_url(&self) -> Result<Url> {
        Ok(self.base_url.join("/HPImageArchive.aspx")?)
    }
}

#[async_trait]
impl WallpaperSource for BingClient {
    async fn latest(&self, region: &str) -> Result<WallpaperInfo> {
        if !is_known_region(region) {
            warn!("region '{region}' is not in the known list, asking Bing anyway");
        }
        let url = self.archive_url()?;
        info!("fetching Bing wallpaper info for region {region} from {url}");

        let body = self
            .client
            .get(url)
            .query(&[("format", "js"), ("idx", "0"), ("n", "1"), ("mkt", region)])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(API_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let info = parse_archive(&body, &self.base_url)?;
        info!("fetched Bing info: date={}, title={}", info.date, info.title);
        Ok(info)
    }

    async fn download(&self, info: &WallpaperInfo, save_path: &Path) -> Result<PathBuf> {
        downloader::download_image(&self.client, &info.url, save_path).await?;
        Ok(save_path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse(BING_BASE_URL).unwrap()
    }

    #[test]
    fn parses_first_image_and_joins_url() {
        let body = r#"{"images":[{"startdate":"20240315","url":"/th?id=OHR.CarrizoBloom_EN-US2504669059_1920x1080.jpg&rf=LaDigue_1920x1080.jpg&pid=hp","copyright":"Carrizo Plain (© Someone)","title":"Spring bloom"},{"startdate":"20240314","url":"/other"}]}"#;
        let info = parse_archive(body, &base()).unwrap();
        assert!(info.url.starts_with("https://www.bing.com/th?id=OHR.CarrizoBloom"));
        assert_eq!(info.date, "20240315");
        assert_eq!(info.title, "Spring bloom");
        assert_eq!(info.description(), "Carrizo Plain");
        assert_eq!(info.source, SourceKind::Bing);
    }

    #[test]
    fn missing_optional_fields_default_to_na() {
        let info = parse_archive(r#"{"images":[{"url":"/a.jpg"}]}"#, &base()).unwrap();
        assert_eq!(info.title, "N/A");
        assert_eq!(info.copyright, "N/A");
        assert_eq!(info.date, "");
    }

    #[test]
    fn empty_or_urlless_responses_are_errors() {
        assert!(matches!(parse_archive(r#"{"images":[]}"#, &base()), Err(Error::NoImages)));
        assert!(matches!(parse_archive(r#"{}"#, &base()), Err(Error::NoImages)));
        assert!(matches!(
            parse_archive(r#"{"images":[{"title":"x"}]}"#, &base()),
            Err(Error::NoImages)
        ));
        assert!(matches!(parse_archive("not json", &base()), Err(Error::Json(_))));
    }

    #[test]
    fn absolute_urls_are_kept() {
        let info = parse_archive(r#"{"images":[{"url":"https://cdn.example.com/x.png"}]}"#, &base()).unwrap();
        assert_eq!(info.url, "https://cdn.example.com/x.png");
    }

    #[test]
    fn known_regions() {
        assert!(is_known_region("de-DE"));
        assert!(!is_known_region("xx-XX"));
    }
}
