// paths.rs — 应用使用的所有文件系统位置
// 遵循 XDG 规范：优先读取 $XDG_*_HOME，未设置时回退到 $HOME 下的默认目录

use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

pub const APP_ID: &str = "chromadesk";
pub const APP_NAME: &str = "ChromaDesk";

/// 已安装二进制的固定文件名
pub const INSTALLED_BINARY_NAME: &str = "ChromaDesk.AppImage";

/// 读取 $HOME
pub fn home_dir() -> Result<PathBuf> {
    env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or(Error::MissingEnv("HOME"))
}

/// 当前架构对应的 AppImage 文件名，例如 ChromaDesk-x86_64.AppImage
pub fn appimage_file_name() -> String {
    format!("{}-{}.AppImage", APP_NAME, env::consts::ARCH)
}

fn xdg_dir(var: &str, home: &Path, fallback: &[&str]) -> PathBuf {
    match env::var_os(var) {
        Some(v) if Path::new(&v).is_absolute() => PathBuf::from(v),
        _ => fallback.iter().fold(home.to_path_buf(), |acc, p| acc.join(p)),
    }
}

/// 应用运行时用到的目录集合
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub home: PathBuf,
    /// ~/.config/chromadesk/config.toml
    pub config_file: PathBuf,
    /// ~/.config/chromadesk/chromadesk.log
    pub log_file: PathBuf,
    /// ~/.config/systemd/user
    pub unit_dir: PathBuf,
    /// ~/.local/share
    pub data_home: PathBuf,
    /// ~/.local/bin
    pub bin_dir: PathBuf,
    /// ~/.cache/chromadesk
    pub cache_dir: PathBuf,
}

impl AppPaths {
    /// 从环境变量解析
    pub fn from_env() -> Result<Self> {
        let home = home_dir()?;
        let config_home = xdg_dir("XDG_CONFIG_HOME", &home, &[".config"]);
        let data_home = xdg_dir("XDG_DATA_HOME", &home, &[".local", "share"]);
        let cache_home = xdg_dir("XDG_CACHE_HOME", &home, &[".cache"]);
        Ok(Self::with_roots(home, config_home, data_home, cache_home))
    }

    /// 以某个目录作为 $HOME 构造，所有 XDG 目录取默认值
    #[cfg(test)]
    pub fn under_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let config_home = home.join(".config");
        let data_home = home.join(".local").join("share");
        let cache_home = home.join(".cache");
        Self::with_roots(home, config_home, data_home, cache_home)
    }

    fn with_roots(home: PathBuf, config_home: PathBuf, data_home: PathBuf, cache_home: PathBuf) -> Self {
        let config_dir = config_home.join(APP_ID);
        Self {
            config_file: config_dir.join("config.toml"),
            log_file: config_dir.join(format!("{APP_ID}.log")),
            unit_dir: config_home.join("systemd").join("user"),
            bin_dir: home.join(".local").join("bin"),
            cache_dir: cache_home.join(APP_ID),
            data_home,
            home,
        }
    }
}
