// setter.rs — 系统壁纸设置模块
// GNOME 下通过 gsettings 设置；找不到 gsettings 时退回到 wallpaper 库

use crate::error::{Error, IoContext, Result};
use crate::runner::{CommandRunner, CommandSpec};
use std::path::Path;
use tracing::{error, info, warn};
use url::Url;

const SCHEMA_BACKGROUND: &str = "org.gnome.desktop.background";
const KEY_PICTURE_URI: &str = "picture-uri";
const KEY_PICTURE_URI_DARK: &str = "picture-uri-dark";
const KEY_PICTURE_OPTIONS: &str = "picture-options";

/// 能把图片设置为桌面壁纸的对象
pub trait WallpaperSetter: Send + Sync {
    fn set(&self, path: &Path) -> Result<()>;
}

/// GNOME 壁纸设置器
pub struct GnomeSetter<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GnomeSetter<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// 需要依次执行的 gsettings 命令
    fn commands(file_uri: &str) -> Vec<CommandSpec> {
        [
            (KEY_PICTURE_OPTIONS, "zoom"),
            (KEY_PICTURE_URI, file_uri),
            // 同时设置暗色主题下的壁纸，保持一致
            (KEY_PICTURE_URI_DARK, file_uri),
        ]
        .into_iter()
        .map(|(key, value)| {
            CommandSpec::new("gsettings")
                .arg("set")
                .arg(SCHEMA_BACKGROUND)
                .arg(key)
                .arg(value)
        })
        .collect()
    }
}

impl WallpaperSetter for GnomeSetter<'_> {
    fn set(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "wallpaper image not found"),
            ));
        }
        let abs = path.canonicalize().at(path)?;

        if self.runner.which("gsettings").is_none() {
            warn!("'gsettings' not found, falling back to the generic wallpaper setter");
            let path_str = abs
                .to_str()
                .ok_or_else(|| Error::from(format!("path is not valid UTF-8: {}", abs.display())))?;
            // wallpaper 库的错误类型不是 Send，这里立即转换为字符串
            return wallpaper::set_from_path(path_str).map_err(|e| Error::from(e.to_string()));
        }

        let file_uri = Url::from_file_path(&abs)
            .map_err(|_| Error::from(format!("cannot build file URI for {}", abs.display())))?;
        info!("setting GNOME wallpaper to {file_uri}");

        // 遇到第一个失败的命令就停止
        for cmd in Self::commands(file_uri.as_str()) {
            if let Err(e) = self.runner.run_checked(&cmd) {
                error!("failed to set GNOME wallpaper: {e}");
                return Err(e);
            }
        }
        info!("successfully set GNOME wallpaper");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::RecordingRunner;

    #[test]
    fn runs_gsettings_for_options_and_both_uris() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("bing_20240101.jpg");
        std::fs::write(&img, b"x").unwrap();

        let runner = RecordingRunner::with_tools(&["gsettings"]);
        GnomeSetter::new(&runner).set(&img).unwrap();

        let lines = runner.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "gsettings set org.gnome.desktop.background picture-options zoom");
        assert!(lines[1].starts_with("gsettings set org.gnome.desktop.background picture-uri file:///"));
        assert!(lines[1].ends_with("bing_20240101.jpg"));
        assert!(lines[2].contains("picture-uri-dark"));
    }

    #[test]
    fn stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("a.png");
        std::fs::write(&img, b"x").unwrap();

        let runner = RecordingRunner::with_tools(&["gsettings"]);
        runner.exit_code("gsettings", 1);
        assert!(GnomeSetter::new(&runner).set(&img).is_err());
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let runner = RecordingRunner::with_tools(&["gsettings"]);
        assert!(GnomeSetter::new(&runner).set(Path::new("/nonexistent/x.jpg")).is_err());
        assert!(runner.calls().is_empty());
    }
}
