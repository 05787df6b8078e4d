// install.rs — 安装与卸载
// 安装：定位 AppImage → 复制到 ~/.local/bin → 图标与桌面条目 → 刷新缓存 → 记录安装路径
// 卸载：检查已安装文件 → 确认 → 删除 → 刷新缓存 → 清除安装路径（--purge 时连同定时器与配置一起清理）

use crate::config::{ConfigStore, KEY_INSTALLED_PATH, STATE};
use crate::desktop::{DesktopEntry, ICON_SIZES, ICON_SVG};
use crate::downloader;
use crate::error::{Error, IoContext, Result};
use crate::fallback::{Strategy, first_success};
use crate::packager::{BuildOptions, Packager, make_executable};
use crate::paths::{APP_ID, AppPaths, INSTALLED_BINARY_NAME, appimage_file_name};
use crate::runner::{CommandRunner, CommandSpec};
use crate::service::ServiceManager;
use async_trait::async_trait;
use rust_i18n::t;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RELEASE_URL_BASE: &str = "https://github.com/anantdark/chromadesk/releases/latest/download";

fn release_url() -> String {
    format!("{RELEASE_URL_BASE}/{}", appimage_file_name())
}

/// 安装前检查：必需的 HTTP 客户端必须能初始化
pub fn preflight() -> Result<reqwest::Client> {
    if running_as_root() {
        warn!("running as root, files will be installed into root's home directory");
    }
    downloader::http_client().map_err(|e| Error::from(format!("HTTP client is unavailable: {e}")))
}

pub fn running_as_root() -> bool {
    // SAFETY: geteuid 没有前置条件，也不会失败
    unsafe { libc::geteuid() == 0 }
}

/// 安装涉及的全部位置
#[derive(Debug, Clone)]
pub struct InstallPaths {
    pub binary: PathBuf,
    pub applications_dir: PathBuf,
    pub desktop_entry: PathBuf,
    pub hicolor_dir: PathBuf,
    pub icon: PathBuf,
    pub pixmap: PathBuf,
    /// 下载的发布包暂存处
    pub download_dir: PathBuf,
    pub unit_dir: PathBuf,
}

impl InstallPaths {
    pub fn from_app_paths(paths: &AppPaths) -> Self {
        let applications_dir = paths.data_home.join("applications");
        let hicolor_dir = paths.data_home.join("icons").join("hicolor");
        Self {
            binary: paths.bin_dir.join(INSTALLED_BINARY_NAME),
            desktop_entry: applications_dir.join(format!("{APP_ID}.desktop")),
            icon: hicolor_dir.join("scalable").join("apps").join(format!("{APP_ID}.svg")),
            pixmap: paths.data_home.join("pixmaps").join(format!("{APP_ID}.svg")),
            download_dir: paths.cache_dir.clone(),
            unit_dir: paths.unit_dir.clone(),
            applications_dir,
            hicolor_dir,
        }
    }

    /// 卸载时检查的三个固定文件
    pub fn fixed_files(&self) -> [&Path; 3] {
        [
            self.binary.as_path(),
            self.desktop_entry.as_path(),
            self.icon.as_path(),
        ]
    }

    fn png_icon(&self, size: u32) -> PathBuf {
        self.hicolor_dir
            .join(format!("{size}x{size}"))
            .join("apps")
            .join(format!("{APP_ID}.png"))
    }
}

// ---- 定位 AppImage 的策略 ----

/// --from 指定的文件
pub struct FromPath(pub Option<PathBuf>);

#[async_trait]
impl Strategy for FromPath {
    type Output = PathBuf;

    fn name(&self) -> String {
        "--from".to_string()
    }

    async fn attempt(&self) -> Result<PathBuf> {
        let path = self.0.as_ref().ok_or("no --from path given")?;
        existing_file(path)
    }
}

/// 当前正在运行的 AppImage（$APPIMAGE）
pub struct EnvAppImage(pub Option<PathBuf>);

#[async_trait]
impl Strategy for EnvAppImage {
    type Output = PathBuf;

    fn name(&self) -> String {
        "$APPIMAGE".to_string()
    }

    async fn attempt(&self) -> Result<PathBuf> {
        let path = self.0.as_ref().ok_or(Error::MissingEnv("APPIMAGE"))?;
        existing_file(path)
    }
}

/// 项目 dist/ 下已经构建好的 AppImage
pub struct Prebuilt {
    pub root: PathBuf,
}

#[async_trait]
impl Strategy for Prebuilt {
    type Output = PathBuf;

    fn name(&self) -> String {
        "prebuilt dist/ AppImage".to_string()
    }

    async fn attempt(&self) -> Result<PathBuf> {
        existing_file(&self.root.join("dist").join(appimage_file_name()))
    }
}

/// 从源码构建（需要项目根目录下有 chromadesk 的 Cargo.toml）
pub struct BuildFromSource<'a> {
    pub root: PathBuf,
    pub runner: &'a dyn CommandRunner,
    pub http: reqwest::Client,
}

#[async_trait]
impl Strategy for BuildFromSource<'_> {
    type Output = PathBuf;

    fn name(&self) -> String {
        "build from source".to_string()
    }

    async fn attempt(&self) -> Result<PathBuf> {
        let manifest = self.root.join("Cargo.toml");
        if !manifest.is_file() {
            return Err(Error::from(format!("{} not found", manifest.display())));
        }
        let raw = fs::read_to_string(&manifest).at(&manifest)?;
        if !is_own_manifest(&raw) {
            return Err(Error::from(format!(
                "{} does not belong to {APP_ID}, not building it",
                manifest.display()
            )));
        }
        let packager = Packager::new(&self.root, self.runner, self.http.clone());
        let opts = BuildOptions {
            appimage: true,
            ..BuildOptions::default()
        };
        packager
            .run(&opts)
            .await?
            .appimage
            .ok_or_else(|| Error::from("build finished without an AppImage"))
    }
}

/// Cargo.toml 的 [package] name 是否为本项目
fn is_own_manifest(raw: &str) -> bool {
    toml::from_str::<toml::Table>(raw)
        .ok()
        .and_then(|t| t.get("package")?.get("name")?.as_str().map(|n| n == APP_ID))
        .unwrap_or(false)
}

/// 下载最新发布的 AppImage，失败立即返回，不重试
pub struct DownloadRelease {
    pub http: reqwest::Client,
    pub url: String,
    pub dest: PathBuf,
}

#[async_trait]
impl Strategy for DownloadRelease {
    type Output = PathBuf;

    fn name(&self) -> String {
        format!("download {}", self.url)
    }

    async fn attempt(&self) -> Result<PathBuf> {
        downloader::download_file(&self.http, &self.url, &self.dest).await?;
        make_executable(&self.dest)?;
        Ok(self.dest.clone())
    }
}

fn existing_file(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(Error::from(format!("{} is not a file", path.display())))
    }
}

// ---- 写配置的策略 ----

/// 直接通过配置服务写入
pub struct DirectConfigWrite<'a> {
    pub store: &'a ConfigStore,
    pub section: String,
    pub key: String,
    pub value: String,
}

#[async_trait]
impl Strategy for DirectConfigWrite<'_> {
    type Output = ();

    fn name(&self) -> String {
        "config service".to_string()
    }

    async fn attempt(&self) -> Result<()> {
        self.store.set(&self.section, &self.key, &self.value)
    }
}

/// 调用 `<binary> --internal-set-config SECTION KEY VALUE`
pub struct InternalFlagWrite<'a> {
    pub runner: &'a dyn CommandRunner,
    pub binary: PathBuf,
    pub section: String,
    pub key: String,
    pub value: String,
}

#[async_trait]
impl Strategy for InternalFlagWrite<'_> {
    type Output = ();

    fn name(&self) -> String {
        format!("{} --internal-set-config", self.binary.display())
    }

    async fn attempt(&self) -> Result<()> {
        existing_file(&self.binary)?;
        let cmd = CommandSpec::new(&self.binary)
            .arg("--internal-set-config")
            .args([&self.section, &self.key, &self.value]);
        self.runner.run_checked(&cmd)?;
        Ok(())
    }
}

/// 安装参数
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub from: Option<PathBuf>,
    /// $APPIMAGE 的值
    pub appimage_env: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub binary: PathBuf,
    /// 找到 AppImage 的策略
    pub strategy: String,
    /// 安装路径是否成功写入配置
    pub recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallOutcome {
    NotInstalled,
    Cancelled,
    Removed(Vec<PathBuf>),
}

/// 安装器
pub struct Installer<'a> {
    pub paths: InstallPaths,
    /// 项目根目录，用于查找 dist/、Cargo.toml 与 packaging/icons
    pub project_root: PathBuf,
    /// 卸载时写配置的备用程序（安装的二进制已被删除）
    pub self_exe: PathBuf,
    pub runner: &'a dyn CommandRunner,
    pub store: &'a ConfigStore,
    pub http: reqwest::Client,
}

impl Installer<'_> {
    fn artifact_chain(&self, opts: &InstallOptions) -> Vec<Box<dyn Strategy<Output = PathBuf> + '_>> {
        let mut chain: Vec<Box<dyn Strategy<Output = PathBuf> + '_>> = Vec::new();
        if opts.from.is_some() {
            chain.push(Box::new(FromPath(opts.from.clone())));
        }
        chain.push(Box::new(EnvAppImage(opts.appimage_env.clone())));
        chain.push(Box::new(Prebuilt {
            root: self.project_root.clone(),
        }));
        chain.push(Box::new(BuildFromSource {
            root: self.project_root.clone(),
            runner: self.runner,
            http: self.http.clone(),
        }));
        chain.push(Box::new(DownloadRelease {
            http: self.http.clone(),
            url: release_url(),
            dest: self.paths.download_dir.join(appimage_file_name()),
        }));
        chain
    }

    pub async fn install(&self, opts: &InstallOptions) -> Result<InstallReport> {
        info!("starting {} installation", APP_ID);
        let artifact = first_success("locate AppImage", &self.artifact_chain(opts)).await?;
        info!(
            "using AppImage from {} after {} failed attempts: {}",
            artifact.strategy,
            artifact.failures.len(),
            artifact.value.display()
        );

        self.place_binary(&artifact.value)?;
        self.install_icons()?;
        self.write_desktop_entry()?;
        self.refresh_caches();

        let binary = self.paths.binary.clone();
        let recorded = self
            .record_install_path(&binary.to_string_lossy(), &binary)
            .await;

        Ok(InstallReport {
            binary,
            strategy: artifact.strategy,
            recorded,
        })
    }

    /// 复制到临时文件再改名，避免覆盖正在运行的二进制
    fn place_binary(&self, artifact: &Path) -> Result<()> {
        let dest = &self.paths.binary;
        if same_file(artifact, dest) {
            info!("{} is already in place", dest.display());
            return make_executable(dest);
        }
        let dir = dest.parent().ok_or("binary path has no parent")?;
        fs::create_dir_all(dir).at(dir)?;
        let staging = dir.join(format!(".{INSTALLED_BINARY_NAME}.tmp"));
        fs::copy(artifact, &staging).at(&staging)?;
        make_executable(&staging)?;
        fs::rename(&staging, dest).at(dest)?;
        info!("installed binary to {}", dest.display());
        Ok(())
    }

    fn install_icons(&self) -> Result<()> {
        for dest in [&self.paths.icon, &self.paths.pixmap] {
            if let Some(dir) = dest.parent() {
                fs::create_dir_all(dir).at(dir)?;
            }
            fs::write(dest, ICON_SVG).at(dest)?;
            debug!("wrote icon {}", dest.display());
        }
        for size in ICON_SIZES {
            let src = self
                .project_root
                .join("packaging")
                .join("icons")
                .join(format!("{APP_ID}-{size}.png"));
            if !src.is_file() {
                continue;
            }
            let dest = self.paths.png_icon(*size);
            if let Some(dir) = dest.parent() {
                fs::create_dir_all(dir).at(dir)?;
            }
            fs::copy(&src, &dest).at(&dest)?;
            debug!("installed {size}x{size} icon");
        }
        Ok(())
    }

    fn write_desktop_entry(&self) -> Result<()> {
        let entry = DesktopEntry::for_binary(&self.paths.binary);
        let dest = &self.paths.desktop_entry;
        fs::create_dir_all(&self.paths.applications_dir).at(&self.paths.applications_dir)?;
        fs::write(dest, entry.render()).at(dest)?;
        info!("wrote desktop entry {}", dest.display());
        Ok(())
    }

    /// 刷新桌面数据库与图标缓存，工具缺失或失败时只警告
    fn refresh_caches(&self) {
        let steps = [
            ("update-desktop-database", vec![self.paths.applications_dir.clone()]),
            (
                "gtk-update-icon-cache",
                vec![PathBuf::from("-f"), PathBuf::from("-t"), self.paths.hicolor_dir.clone()],
            ),
        ];
        for (tool, args) in steps {
            let Some(program) = self.runner.which(tool) else {
                warn!("{tool} not found, skipping");
                continue;
            };
            if let Err(e) = self.runner.run_checked(&CommandSpec::new(program).args(args)) {
                warn!("{tool} failed: {e}");
            }
        }
    }

    /// 两级写入：配置服务 → 二进制的 --internal-set-config；都失败只警告
    async fn record_install_path(&self, value: &str, via_binary: &Path) -> bool {
        let chain: Vec<Box<dyn Strategy<Output = ()> + '_>> = vec![
            Box::new(DirectConfigWrite {
                store: self.store,
                section: STATE.to_string(),
                key: KEY_INSTALLED_PATH.to_string(),
                value: value.to_string(),
            }),
            Box::new(InternalFlagWrite {
                runner: self.runner,
                binary: via_binary.to_path_buf(),
                section: STATE.to_string(),
                key: KEY_INSTALLED_PATH.to_string(),
                value: value.to_string(),
            }),
        ];
        match first_success("record install path", &chain).await {
            Ok(done) => {
                debug!("install path recorded via {}", done.strategy);
                true
            }
            Err(e) => {
                warn!("could not record install path in config: {e}");
                false
            }
        }
    }

    /// 卸载。`input`/`output` 用于确认提示
    pub async fn uninstall(
        &self,
        input: &mut impl BufRead,
        output: &mut impl Write,
        yes: bool,
        purge: bool,
    ) -> Result<UninstallOutcome> {
        let present: Vec<PathBuf> = self
            .paths
            .fixed_files()
            .into_iter()
            .filter(|p| p.exists())
            .map(Path::to_path_buf)
            .collect();

        if present.is_empty() {
            writeln!(output, "{}", t!("uninstall_not_installed"))?;
            return Ok(UninstallOutcome::NotInstalled);
        }

        writeln!(output, "{}", t!("uninstall_found"))?;
        for path in &present {
            writeln!(output, "  {}", path.display())?;
        }
        if purge {
            writeln!(output, "{}", t!("uninstall_purge_note"))?;
        }

        if !yes {
            write!(output, "{} [y/N] ", t!("uninstall_confirm"))?;
            output.flush()?;
            let mut answer = String::new();
            input.read_line(&mut answer)?;
            if !matches!(answer.trim(), "y" | "Y") {
                writeln!(output, "{}", t!("uninstall_cancelled"))?;
                return Ok(UninstallOutcome::Cancelled);
            }
        }

        let mut removed = Vec::new();
        let extras = ICON_SIZES.iter().map(|s| self.paths.png_icon(*s));
        for path in present.into_iter().chain([self.paths.pixmap.clone()]).chain(extras) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("removed {}", path.display());
                    removed.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("could not remove {}: {e}", path.display()),
            }
        }
        self.refresh_caches();

        if purge {
            let manager = ServiceManager::new(&self.paths.unit_dir, self.runner);
            if let Err(e) = manager.disable_timer() {
                warn!("could not disable timer: {e}");
            }
            manager.remove_unit_files()?;
            self.store.delete()?;
        } else {
            self.record_install_path("", &self.self_exe).await;
        }

        writeln!(output, "{}", t!("uninstall_done"))?;
        Ok(UninstallOutcome::Removed(removed))
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBackend, MemoryBackend};
    use crate::runner::testing::RecordingRunner;
    use std::io::Cursor;
    use std::sync::Arc;

    struct Fixture {
        home: tempfile::TempDir,
        project: tempfile::TempDir,
        artifact: PathBuf,
        backend: Arc<MemoryBackend>,
        store: ConfigStore,
        runner: RecordingRunner,
    }

    impl Fixture {
        fn new() -> Self {
            let home = tempfile::tempdir().unwrap();
            let project = tempfile::tempdir().unwrap();
            let artifact = project.path().join("ChromaDesk-test.AppImage");
            fs::write(&artifact, b"appimage-bytes").unwrap();
            let backend = Arc::new(MemoryBackend::default());
            let store = ConfigStore::new(backend.clone(), home.path());
            Self {
                home,
                project,
                artifact,
                backend,
                store,
                runner: RecordingRunner::default(),
            }
        }

        fn installer(&self) -> Installer<'_> {
            Installer {
                paths: InstallPaths::from_app_paths(&AppPaths::under_home(self.home.path())),
                project_root: self.project.path().to_path_buf(),
                self_exe: PathBuf::from("/nonexistent/chromadesk"),
                runner: &self.runner,
                store: &self.store,
                http: reqwest::Client::new(),
            }
        }

        fn opts(&self) -> InstallOptions {
            InstallOptions {
                from: Some(self.artifact.clone()),
                appimage_env: None,
            }
        }
    }

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn installing_twice_leaves_one_copy_of_each_file() {
        let fx = Fixture::new();
        let installer = fx.installer();
        installer.install(&fx.opts()).await.unwrap();
        let report = installer.install(&fx.opts()).await.unwrap();

        let paths = &installer.paths;
        assert_eq!(report.strategy, "--from");
        assert!(report.recorded);
        assert_eq!(fs::read(&paths.binary).unwrap(), b"appimage-bytes");
        assert_eq!(file_count(paths.binary.parent().unwrap()), 1);
        assert_eq!(file_count(&paths.applications_dir), 1);
        assert_eq!(file_count(paths.icon.parent().unwrap()), 1);
        assert!(paths.pixmap.is_file());

        let entry = fs::read_to_string(&paths.desktop_entry).unwrap();
        assert!(entry.contains(&format!("Exec=\"{}\"", paths.binary.display())));
        assert_eq!(
            fx.store.get(STATE, KEY_INSTALLED_PATH).unwrap(),
            Some(paths.binary.to_string_lossy().into_owned())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn installed_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let fx = Fixture::new();
        let installer = fx.installer();
        installer.install(&fx.opts()).await.unwrap();
        let mode = fs::metadata(&installer.paths.binary).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn png_variants_are_copied_when_present() {
        let fx = Fixture::new();
        let icons = fx.project.path().join("packaging").join("icons");
        fs::create_dir_all(&icons).unwrap();
        fs::write(icons.join("chromadesk-48.png"), b"png").unwrap();
        let installer = fx.installer();
        installer.install(&fx.opts()).await.unwrap();
        assert!(installer.paths.png_icon(48).is_file());
        assert!(!installer.paths.png_icon(64).exists());
    }

    #[tokio::test]
    async fn caches_are_refreshed_when_tools_exist() {
        let mut fx = Fixture::new();
        fx.runner = RecordingRunner::with_tools(&["update-desktop-database", "gtk-update-icon-cache"]);
        fx.runner.exit_code("gtk-update-icon-cache", 1);
        let installer = fx.installer();
        installer.install(&fx.opts()).await.unwrap();
        assert!(fx.runner.ran("update-desktop-database"));
        assert!(fx.runner.ran("gtk-update-icon-cache"));
    }

    #[tokio::test]
    async fn uninstall_with_nothing_installed_does_not_prompt() {
        let fx = Fixture::new();
        let mut input = Cursor::new(b"y\n".to_vec());
        let mut output = Vec::new();
        let outcome = fx.installer().uninstall(&mut input, &mut output, false, false).await.unwrap();
        assert_eq!(outcome, UninstallOutcome::NotInstalled);
        assert_eq!(input.position(), 0);
        assert!(!String::from_utf8(output).unwrap().contains("[y/N]"));
    }

    #[tokio::test]
    async fn declining_keeps_every_file() {
        let fx = Fixture::new();
        let installer = fx.installer();
        installer.install(&fx.opts()).await.unwrap();

        for answer in ["n\n", "\n", "yes\n", ""] {
            let mut input = Cursor::new(answer.as_bytes().to_vec());
            let outcome = installer.uninstall(&mut input, &mut Vec::new(), false, false).await.unwrap();
            assert_eq!(outcome, UninstallOutcome::Cancelled, "answer {answer:?}");
            for path in installer.paths.fixed_files() {
                assert!(path.is_file(), "{} removed", path.display());
            }
        }
    }

    #[tokio::test]
    async fn confirming_removes_files_and_clears_path() {
        let fx = Fixture::new();
        let installer = fx.installer();
        installer.install(&fx.opts()).await.unwrap();

        let mut input = Cursor::new(b"Y\n".to_vec());
        let outcome = installer.uninstall(&mut input, &mut Vec::new(), false, false).await.unwrap();
        let UninstallOutcome::Removed(removed) = outcome else {
            panic!("expected removal");
        };
        assert!(removed.contains(&installer.paths.binary));
        for path in installer.paths.fixed_files() {
            assert!(!path.exists());
        }
        assert!(!installer.paths.pixmap.exists());
        assert_eq!(fx.store.get(STATE, KEY_INSTALLED_PATH).unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn purge_removes_timer_and_config() {
        let fx = Fixture::new();
        let installer = fx.installer();
        installer.install(&fx.opts()).await.unwrap();
        let unit_dir = &installer.paths.unit_dir;
        fs::create_dir_all(unit_dir).unwrap();
        fs::write(unit_dir.join("chromadesk-daily.service"), "").unwrap();
        fs::write(unit_dir.join("chromadesk-daily.timer"), "").unwrap();

        installer
            .uninstall(&mut Cursor::new(Vec::new()), &mut Vec::new(), true, true)
            .await
            .unwrap();
        assert!(fx.runner.lines().iter().any(|l| l.contains("disable --now chromadesk-daily.timer")));
        assert!(!unit_dir.join("chromadesk-daily.timer").exists());
        assert!(fx.backend.snapshot().is_none());
    }

    /// 总是失败的配置后端
    struct Broken;

    impl ConfigBackend for Broken {
        fn load(&self) -> Result<Option<String>> {
            Err(Error::from("read-only"))
        }
        fn save(&self, _: &str) -> Result<()> {
            Err(Error::from("read-only"))
        }
        fn delete(&self) -> Result<bool> {
            Err(Error::from("read-only"))
        }
        fn location(&self) -> String {
            "<broken>".to_string()
        }
    }

    #[tokio::test]
    async fn config_write_falls_back_to_internal_flag() {
        let mut fx = Fixture::new();
        fx.store = ConfigStore::new(Broken, fx.home.path());
        let installer = fx.installer();
        let report = installer.install(&fx.opts()).await.unwrap();
        assert!(report.recorded);

        let call = fx.runner.calls().into_iter().find(|c| c.program_name() == INSTALLED_BINARY_NAME).unwrap();
        assert_eq!(call.args[0], "--internal-set-config");
        assert_eq!(call.args[1], STATE);
        assert_eq!(call.args[2], KEY_INSTALLED_PATH);
    }

    #[tokio::test]
    async fn failed_config_write_is_only_a_warning() {
        let mut fx = Fixture::new();
        fx.store = ConfigStore::new(Broken, fx.home.path());
        fx.runner.exit_code(INSTALLED_BINARY_NAME, 1);
        let report = fx.installer().install(&fx.opts()).await.unwrap();
        assert!(!report.recorded);
    }

    #[tokio::test]
    async fn artifact_strategies() {
        let project = tempfile::tempdir().unwrap();
        assert!(FromPath(None).attempt().await.is_err());
        assert!(EnvAppImage(None).attempt().await.is_err());
        assert!(EnvAppImage(Some(project.path().join("gone"))).attempt().await.is_err());

        let prebuilt = Prebuilt {
            root: project.path().to_path_buf(),
        };
        assert!(prebuilt.attempt().await.is_err());
        let dist = project.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join(appimage_file_name()), b"").unwrap();
        assert_eq!(prebuilt.attempt().await.unwrap(), dist.join(appimage_file_name()));
    }

    #[tokio::test]
    async fn build_from_source_needs_a_manifest() {
        let project = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::with_tools(&["cargo"]);
        let strategy = BuildFromSource {
            root: project.path().to_path_buf(),
            runner: &runner,
            http: reqwest::Client::new(),
        };
        assert!(strategy.attempt().await.is_err());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn build_from_source_skips_foreign_projects() {
        let project = tempfile::tempdir().unwrap();
        fs::write(
            project.path().join("Cargo.toml"),
            "[package]\nname = \"someone-else\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        let runner = RecordingRunner::with_tools(&["cargo"]);
        let strategy = BuildFromSource {
            root: project.path().to_path_buf(),
            runner: &runner,
            http: reqwest::Client::new(),
        };
        let err = strategy.attempt().await.unwrap_err();
        assert!(err.to_string().contains("does not belong"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn own_manifest_is_recognised() {
        assert!(is_own_manifest("[package]\nname = \"chromadesk\"\n"));
        assert!(!is_own_manifest("[workspace]\nmembers = []\n"));
        assert!(!is_own_manifest("not toml = ="));
    }

    #[tokio::test]
    async fn env_appimage_wins_over_prebuilt() {
        let fx = Fixture::new();
        let dist = fx.project.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join(appimage_file_name()), b"prebuilt").unwrap();
        let opts = InstallOptions {
            from: None,
            appimage_env: Some(fx.artifact.clone()),
        };
        let report = fx.installer().install(&opts).await.unwrap();
        assert_eq!(report.strategy, "$APPIMAGE");
        assert_eq!(fs::read(&report.binary).unwrap(), b"appimage-bytes");
    }
}
