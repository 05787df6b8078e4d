// packager.rs — 构建与打包
// 版本号更新 → cargo 编译 → 生成 AppDir → （可选）用 appimagetool 打成 AppImage
// 除图标缓存刷新外，每一步失败都会中止

use crate::desktop::{ICON_SIZES, ICON_SVG};
use crate::downloader;
use crate::error::{Error, IoContext, Result};
use crate::paths::{APP_ID, APP_NAME, appimage_file_name};
use crate::runner::{CommandRunner, CommandSpec};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// 需要同步版本号的文件（相对项目根目录）
pub const TRACKED_CARGO: &str = "Cargo.toml";
pub const TRACKED_DESKTOP: &str = "packaging/chromadesk.desktop";

const DESKTOP_VERSION_KEY: &str = "X-AppImage-Version=";

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("valid regex"));

const APP_RUN: &str = "#!/bin/sh\nHERE=\"$(dirname \"$(readlink -f \"$0\")\")\"\nexec \"$HERE/usr/bin/chromadesk\" \"$@\"\n";

fn appimagetool_url() -> String {
    format!(
        "https://github.com/AppImage/appimagetool/releases/download/continuous/appimagetool-{}.AppImage",
        env::consts::ARCH
    )
}

/// 构建选项，对应 `chromadesk build` 的参数
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub version_update: Option<String>,
    /// 只更新版本并编译，不生成 AppDir / AppImage
    pub build_only: bool,
    pub appimage: bool,
    /// 使用 debug profile 编译
    pub debug: bool,
}

/// 构建结果
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub version: Option<String>,
    pub binary: PathBuf,
    pub app_dir: Option<PathBuf>,
    pub appimage: Option<PathBuf>,
}

/// 校验 N.N.N 格式的版本号
pub fn validate_version(version: &str) -> Result<String> {
    let v = version.trim();
    if VERSION_RE.is_match(v) {
        Ok(v.to_string())
    } else {
        Err(Error::InvalidVersion(version.to_string()))
    }
}

/// 设置可执行权限 (0755)
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).at(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).at(path)?;
    }
    Ok(())
}

/// 按行改写，保留原有的换行结尾
fn rewrite_lines(contents: &str, mut edit: impl FnMut(&str) -> Option<String>) -> String {
    let mut out: Vec<String> = contents
        .lines()
        .map(|line| edit(line).unwrap_or_else(|| line.to_string()))
        .collect();
    if contents.ends_with('\n') {
        out.push(String::new());
    }
    out.join("\n")
}

/// 替换 Cargo.toml 中 [package] 节的 version，找不到时返回 None
fn replace_cargo_version(contents: &str, version: &str) -> Option<String> {
    let mut in_package = false;
    let mut done = false;
    let rewritten = rewrite_lines(contents, |line| {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            in_package = trimmed.starts_with("[package]");
            return None;
        }
        if !in_package || done {
            return None;
        }
        let (key, _) = trimmed.split_once('=')?;
        if key.trim() != "version" {
            return None;
        }
        done = true;
        let indent = &line[..line.len() - trimmed.len()];
        Some(format!("{indent}version = \"{version}\""))
    });
    done.then_some(rewritten)
}

/// 替换 .desktop 中的 X-AppImage-Version，找不到时返回 None
fn replace_desktop_version(contents: &str, version: &str) -> Option<String> {
    let mut found = false;
    let rewritten = rewrite_lines(contents, |line| {
        line.starts_with(DESKTOP_VERSION_KEY).then(|| {
            found = true;
            format!("{DESKTOP_VERSION_KEY}{version}")
        })
    });
    found.then_some(rewritten)
}

/// 同步两个受跟踪文件的版本号；两处都改写成功后才落盘
pub fn bump_version(root: &Path, version: &str) -> Result<()> {
    let cargo_path = root.join(TRACKED_CARGO);
    let desktop_path = root.join(TRACKED_DESKTOP);
    let cargo = fs::read_to_string(&cargo_path).at(&cargo_path)?;
    let desktop = fs::read_to_string(&desktop_path).at(&desktop_path)?;

    let new_cargo = replace_cargo_version(&cargo, version).ok_or_else(|| {
        Error::from(format!("no [package] version found in {}", cargo_path.display()))
    })?;
    let new_desktop = replace_desktop_version(&desktop, version).ok_or_else(|| {
        Error::from(format!("no {DESKTOP_VERSION_KEY} found in {}", desktop_path.display()))
    })?;

    fs::write(&cargo_path, new_cargo).at(&cargo_path)?;
    fs::write(&desktop_path, new_desktop).at(&desktop_path)?;
    info!("version updated to {version} in {TRACKED_CARGO} and {TRACKED_DESKTOP}");
    Ok(())
}

/// 打包器
pub struct Packager<'a> {
    root: PathBuf,
    runner: &'a dyn CommandRunner,
    http: reqwest::Client,
}

impl<'a> Packager<'a> {
    pub fn new(root: impl Into<PathBuf>, runner: &'a dyn CommandRunner, http: reqwest::Client) -> Self {
        Self {
            root: root.into(),
            runner,
            http,
        }
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.root.join("dist")
    }

    pub fn app_dir(&self) -> PathBuf {
        self.dist_dir().join(format!("{APP_NAME}.AppDir"))
    }

    pub fn appimage_path(&self) -> PathBuf {
        self.dist_dir().join(appimage_file_name())
    }

    /// 执行一次完整构建
    pub async fn run(&self, opts: &BuildOptions) -> Result<BuildReport> {
        // 先校验，保证版本号非法时不修改任何文件
        let version = opts
            .version_update
            .as_deref()
            .map(validate_version)
            .transpose()?;
        if let Some(v) = &version {
            bump_version(&self.root, v)?;
        }

        let binary = self.compile(opts.debug)?;
        if opts.build_only {
            if opts.appimage {
                warn!("--build-only given, skipping AppImage packaging");
            }
            return Ok(BuildReport {
                version,
                binary,
                app_dir: None,
                appimage: None,
            });
        }

        let app_dir = self.layout_app_dir(&binary)?;
        self.refresh_icon_cache(&app_dir);

        let appimage = if opts.appimage {
            Some(self.make_appimage(&app_dir).await?)
        } else {
            None
        };

        Ok(BuildReport {
            version,
            binary,
            app_dir: Some(app_dir),
            appimage,
        })
    }

    /// cargo build，返回生成的二进制路径
    fn compile(&self, debug: bool) -> Result<PathBuf> {
        let cargo = self
            .runner
            .which("cargo")
            .ok_or_else(|| Error::ToolMissing("cargo".to_string()))?;

        let mut cmd = CommandSpec::new(cargo).arg("build").current_dir(&self.root);
        if !debug {
            cmd = cmd.arg("--release");
        }
        info!("compiling: {cmd}");
        self.runner.run_checked(&cmd)?;

        let profile = if debug { "debug" } else { "release" };
        let binary = self.root.join("target").join(profile).join(APP_ID);
        if !binary.is_file() {
            return Err(Error::from(format!(
                "build finished but {} does not exist",
                binary.display()
            )));
        }
        Ok(binary)
    }

    /// 生成 AppDir 目录结构
    fn layout_app_dir(&self, binary: &Path) -> Result<PathBuf> {
        let app_dir = self.app_dir();
        if app_dir.exists() {
            debug!("removing stale {}", app_dir.display());
            fs::remove_dir_all(&app_dir).at(&app_dir)?;
        }

        let bin_dir = app_dir.join("usr").join("bin");
        let apps_dir = app_dir.join("usr").join("share").join("applications");
        let hicolor = app_dir.join("usr").join("share").join("icons").join("hicolor");
        let scalable = hicolor.join("scalable").join("apps");
        for dir in [&bin_dir, &apps_dir, &scalable] {
            fs::create_dir_all(dir).at(dir)?;
        }

        let bin_dest = bin_dir.join(APP_ID);
        fs::copy(binary, &bin_dest).at(&bin_dest)?;
        make_executable(&bin_dest)?;

        let desktop_src = self.root.join(TRACKED_DESKTOP);
        for dest in [
            apps_dir.join(format!("{APP_ID}.desktop")),
            app_dir.join(format!("{APP_ID}.desktop")),
        ] {
            fs::copy(&desktop_src, &dest).at(&dest)?;
        }

        for dest in [
            scalable.join(format!("{APP_ID}.svg")),
            app_dir.join(format!("{APP_ID}.svg")),
            app_dir.join(".DirIcon"),
        ] {
            fs::write(&dest, ICON_SVG).at(&dest)?;
        }

        for size in ICON_SIZES {
            let png = self.root.join("packaging").join("icons").join(format!("{APP_ID}-{size}.png"));
            if png.is_file() {
                let dir = hicolor.join(format!("{size}x{size}")).join("apps");
                fs::create_dir_all(&dir).at(&dir)?;
                let dest = dir.join(format!("{APP_ID}.png"));
                fs::copy(&png, &dest).at(&dest)?;
            }
        }

        let app_run = app_dir.join("AppRun");
        fs::write(&app_run, APP_RUN).at(&app_run)?;
        make_executable(&app_run)?;

        info!("AppDir ready at {}", app_dir.display());
        Ok(app_dir)
    }

    /// 刷新 AppDir 内的图标缓存，失败只警告
    fn refresh_icon_cache(&self, app_dir: &Path) {
        let Some(tool) = self.runner.which("gtk-update-icon-cache") else {
            warn!("gtk-update-icon-cache not found, skipping icon cache refresh");
            return;
        };
        let hicolor = app_dir.join("usr").join("share").join("icons").join("hicolor");
        let cmd = CommandSpec::new(tool).args(["-f", "-t"]).arg(&hicolor);
        if let Err(e) = self.runner.run_checked(&cmd) {
            warn!("icon cache refresh failed: {e}");
        }
    }

    /// 找到或下载 appimagetool
    async fn appimagetool(&self) -> Result<PathBuf> {
        if let Some(tool) = self.runner.which("appimagetool") {
            return Ok(tool);
        }
        let local = self
            .root
            .join("tools")
            .join(format!("appimagetool-{}.AppImage", env::consts::ARCH));
        if local.is_file() {
            return Ok(local);
        }
        info!("appimagetool not found, downloading it");
        downloader::download_file(&self.http, &appimagetool_url(), &local).await?;
        make_executable(&local)?;
        Ok(local)
    }

    async fn make_appimage(&self, app_dir: &Path) -> Result<PathBuf> {
        let tool = self.appimagetool().await?;
        let output = self.appimage_path();
        let cmd = CommandSpec::new(tool)
            .arg("--no-appstream")
            .arg(app_dir)
            .arg(&output)
            .env("ARCH", env::consts::ARCH)
            // 没有 FUSE 的环境（容器、CI）也能运行 appimagetool 自身
            .env("APPIMAGE_EXTRACT_AND_RUN", "1")
            .current_dir(&self.root);
        info!("packaging AppImage: {cmd}");
        self.runner.run_checked(&cmd)?;
        info!("AppImage created at {}", output.display());
        Ok(output)
    }
}
