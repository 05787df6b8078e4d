// desktop.rs — 桌面集成元数据
// .desktop 条目与内置图标，安装器和打包器共用

use crate::paths::{APP_ID, APP_NAME};
use std::fmt::Write as _;
use std::path::Path;

/// 内置的矢量图标
pub const ICON_SVG: &str = include_str!("../packaging/icons/chromadesk.svg");

/// PNG 图标可选尺寸，存在 packaging/icons/chromadesk-<N>.png 时才会安装
pub const ICON_SIZES: &[u32] = &[16, 32, 48, 64, 128, 256, 512];

/// freedesktop.org 桌面条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    pub name: String,
    pub comment: String,
    pub exec: String,
    pub icon: String,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub startup_wm_class: String,
}

impl DesktopEntry {
    /// 指向已安装二进制的条目
    pub fn for_binary(binary: &Path) -> Self {
        Self {
            name: APP_NAME.to_string(),
            comment: "Daily Bing and custom wallpapers for GNOME".to_string(),
            exec: format!("\"{}\"", binary.display()),
            icon: APP_ID.to_string(),
            categories: vec!["Utility".to_string(), "GTK".to_string()],
            keywords: ["wallpaper", "background", "bing", "desktop"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            startup_wm_class: APP_ID.to_string(),
        }
    }

    /// 生成 .desktop 文件内容，字段按固定顺序原样写出
    pub fn render(&self) -> String {
        let list = |items: &[String]| {
            let mut s = items.join(";");
            s.push(';');
            s
        };
        let mut out = String::from("[Desktop Entry]\n");
        let _ = writeln!(out, "Type=Application");
        let _ = writeln!(out, "Name={}", self.name);
        let _ = writeln!(out, "Comment={}", self.comment);
        let _ = writeln!(out, "Exec={}", self.exec);
        let _ = writeln!(out, "Icon={}", self.icon);
        let _ = writeln!(out, "Terminal=false");
        let _ = writeln!(out, "Categories={}", list(&self.categories));
        let _ = writeln!(out, "Keywords={}", list(&self.keywords));
        let _ = writeln!(out, "StartupWMClass={}", self.startup_wm_class);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fixed_keys() {
        let entry = DesktopEntry::for_binary(Path::new("/home/a/.local/bin/ChromaDesk.AppImage"));
        let text = entry.render();
        assert!(text.starts_with("[Desktop Entry]\n"));
        for line in [
            "Name=ChromaDesk",
            "Exec=\"/home/a/.local/bin/ChromaDesk.AppImage\"",
            "Icon=chromadesk",
            "Categories=Utility;GTK;",
            "Keywords=wallpaper;background;bing;desktop;",
            "StartupWMClass=chromadesk",
        ] {
            assert!(text.lines().any(|l| l == line), "missing {line}");
        }
    }

    #[test]
    fn icon_is_svg() {
        assert!(ICON_SVG.contains("<svg"));
    }
}
