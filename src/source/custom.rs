// custom.rs — 用户指定 URL 的壁纸源

use super::{SourceKind, WallpaperInfo, WallpaperSource};
use crate::downloader;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;

/// 从固定 URL 获取图片
pub struct CustomUrlSource {
    client: reqwest::Client,
    url: Url,
}

impl CustomUrlSource {
    pub fn new(client: reqwest::Client, url: &str) -> Result<Self> {
        Ok(Self {
            client,
            url: Url::parse(url.trim())?,
        })
    }
}

#[async_trait]
impl WallpaperSource for CustomUrlSource {
    async fn latest(&self, _region: &str) -> Result<WallpaperInfo> {
        let title = self
            .url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or("custom")
            .to_string();
        Ok(WallpaperInfo {
            url: self.url.to_string(),
            date: String::new(),
            title,
            copyright: self.url.host_str().unwrap_or_default().to_string(),
            source: SourceKind::Custom,
        })
    }

    async fn download(&self, info: &WallpaperInfo, save_path: &Path) -> Result<PathBuf> {
        downloader::download_image(&self.client, &info.url, save_path).await?;
        Ok(save_path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_describes_the_url() {
        let src = CustomUrlSource::new(reqwest::Client::new(), " https://images.example.org/walls/lake.PNG ").unwrap();
        let info = src.latest("en-US").await.unwrap();
        assert_eq!(info.source, SourceKind::Custom);
        assert_eq!(info.title, "lake.PNG");
        assert_eq!(info.copyright, "images.example.org");
    }

    #[test]
    fn rejects_invalid_urls() {
        assert!(CustomUrlSource::new(reqwest::Client::new(), "not a url").is_err());
    }
}
