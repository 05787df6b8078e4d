// source/mod.rs — 壁纸源抽象接口模块
// 定义了所有壁纸来源（Bing 每日图片、自定义 URL）必须实现的通用 Trait

pub mod bing;
pub mod custom;

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 壁纸来源类别，决定历史文件的命名方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Bing,
    Custom,
}

/// 统一的壁纸元数据结构
#[derive(Debug, Clone)]
pub struct WallpaperInfo {
    /// 图片的完整下载 URL
    pub url: String,
    /// Bing 的 startdate (YYYYMMDD)；自定义图片为空
    pub date: String,
    pub title: String,
    pub copyright: String,
    pub source: SourceKind,
}

impl WallpaperInfo {
    /// 版权说明中第一个括号之前的部分
    pub fn description(&self) -> String {
        match self.copyright.find('(') {
            Some(idx) => self.copyright[..idx].trim().to_string(),
            None => self.copyright.trim().to_string(),
        }
    }
}

/// 壁纸源的抽象 Trait
#[async_trait]
pub trait WallpaperSource: Send + Sync {
    /// 获取当前的壁纸信息
    async fn latest(&self, region: &str) -> Result<WallpaperInfo>;

    /// 下载壁纸到指定的完整路径，返回保存后的路径
    async fn download(&self, info: &WallpaperInfo, save_path: &Path) -> Result<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(copyright: &str) -> WallpaperInfo {
        WallpaperInfo {
            url: String::new(),
            date: String::new(),
            title: String::new(),
            copyright: copyright.to_string(),
            source: SourceKind::Bing,
        }
    }

    #[test]
    fn description_drops_parenthesised_credit() {
        assert_eq!(
            info("Carrizo Plain, California (© Jane Doe/Getty)").description(),
            "Carrizo Plain, California"
        );
        assert_eq!(info("  Plain text  ").description(), "Plain text");
    }
}
