// service.rs — systemd 用户定时器管理
// 渲染 .service 模板（四个 @@TOKEN@@ 占位符）与 .timer 文件，
// 写入 ~/.config/systemd/user，并通过 `systemctl --user` 启用 / 停用

use crate::error::{Error, IoContext, Result};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

pub const SERVICE_FILE: &str = "chromadesk-daily.service";
pub const TIMER_FILE: &str = "chromadesk-daily.timer";

const SERVICE_TEMPLATE: &str = include_str!("../packaging/systemd/chromadesk-daily.service.in");
const TIMER_TEMPLATE: &str = include_str!("../packaging/systemd/chromadesk-daily.timer.in");

pub const TOKEN_DBUS_ADDRESS: &str = "@@DBUS_ADDRESS@@";
pub const TOKEN_WORKING_DIR: &str = "@@WORKING_DIR@@";
pub const TOKEN_VENV_PATH: &str = "@@VENV_PATH@@";
pub const TOKEN_SCRIPT_PATH: &str = "@@SCRIPT_PATH@@";

static LEFTOVER_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@@[A-Z_]+@@").expect("valid regex"));

/// 填充模板所需的运行时路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitParams {
    pub dbus_address: String,
    pub working_dir: PathBuf,
    /// 运行环境前缀，其 bin/ 目录会被加入 PATH
    pub venv_path: PathBuf,
    /// 定时器执行的程序
    pub script_path: PathBuf,
}

/// 替换模板中的全部占位符；有未识别的占位符残留时报错
pub fn render_template(template: &str, params: &UnitParams) -> Result<String> {
    let rendered = template
        .replace(TOKEN_DBUS_ADDRESS, &params.dbus_address)
        .replace(TOKEN_WORKING_DIR, &params.working_dir.to_string_lossy())
        .replace(TOKEN_VENV_PATH, &params.venv_path.to_string_lossy())
        .replace(TOKEN_SCRIPT_PATH, &params.script_path.to_string_lossy());

    let leftovers: Vec<&str> = LEFTOVER_TOKEN_RE
        .find_iter(&rendered)
        .map(|m| m.as_str())
        .collect();
    if leftovers.is_empty() {
        Ok(rendered)
    } else {
        Err(Error::Template(leftovers.join(", ")))
    }
}

/// 渲染后的 .service 内容
pub fn render_service(params: &UnitParams) -> Result<String> {
    render_template(SERVICE_TEMPLATE, params)
}

/// .timer 内容（模板中没有占位符，原样输出）
pub fn render_timer() -> &'static str {
    TIMER_TEMPLATE
}

/// 定时器执行的程序来自哪里
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// 当前正从 AppImage 运行
    RunningAppImage,
    /// 安装器记录在配置中的路径
    Installed,
    /// 当前可执行文件（开发或 cargo install）
    CurrentExe,
}

/// 按优先级确定执行目标：$APPIMAGE → 配置中的安装路径 → 当前可执行文件
pub fn resolve_target(
    appimage_env: Option<PathBuf>,
    installed: Option<PathBuf>,
    current_exe: &Path,
    home: &Path,
    dbus_address: String,
) -> (TargetKind, UnitParams) {
    let app_params = |path: PathBuf| UnitParams {
        dbus_address: dbus_address.clone(),
        working_dir: home.to_path_buf(),
        venv_path: prefix_of(&path),
        script_path: path,
    };

    if let Some(path) = appimage_env.filter(|p| p.is_file()) {
        info!("detected running from AppImage: {}", path.display());
        return (TargetKind::RunningAppImage, app_params(path));
    }

    match installed {
        Some(path) if path.is_file() => {
            info!("using installed AppImage path from config: {}", path.display());
            return (TargetKind::Installed, app_params(path));
        }
        Some(path) => warn!(
            "installed path '{}' from config is not a file, falling back",
            path.display()
        ),
        None => debug!("no installed path recorded in config"),
    }

    let working_dir = current_exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| home.to_path_buf());
    (
        TargetKind::CurrentExe,
        UnitParams {
            dbus_address,
            working_dir,
            venv_path: prefix_of(current_exe),
            script_path: current_exe.to_path_buf(),
        },
    )
}

/// ~/.local/bin/x → ~/.local
fn prefix_of(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or(Path::new("/"));
    if dir.file_name().is_some_and(|n| n == "bin") {
        dir.parent().unwrap_or(dir).to_path_buf()
    } else {
        dir.to_path_buf()
    }
}

/// 读取当前会话的 DBUS 地址，没有时通知可能无法送达
pub fn dbus_address_from_env() -> String {
    match env::var("DBUS_SESSION_BUS_ADDRESS") {
        Ok(addr) if !addr.is_empty() => addr,
        _ => {
            warn!("DBUS_SESSION_BUS_ADDRESS not set, notifications from the timer might fail");
            String::new()
        }
    }
}

/// 定时器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStatus {
    pub enabled: bool,
    pub active: bool,
    pub unit_files_present: bool,
}

/// systemd 用户单元管理器
pub struct ServiceManager<'a> {
    unit_dir: PathBuf,
    runner: &'a dyn CommandRunner,
}

impl<'a> ServiceManager<'a> {
    pub fn new(unit_dir: impl Into<PathBuf>, runner: &'a dyn CommandRunner) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            runner,
        }
    }

    pub fn service_path(&self) -> PathBuf {
        self.unit_dir.join(SERVICE_FILE)
    }

    pub fn timer_path(&self) -> PathBuf {
        self.unit_dir.join(TIMER_FILE)
    }

    fn systemctl(&self, args: &[&str]) -> Result<CommandOutput> {
        self.runner
            .run(&CommandSpec::new("systemctl").arg("--user").args(args))
    }

    fn systemctl_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        self.runner
            .run_checked(&CommandSpec::new("systemctl").arg("--user").args(args))
    }

    /// 写入 .service 与 .timer 文件并重新加载 systemd
    pub fn create_unit_files(&self, params: &UnitParams) -> Result<()> {
        info!("creating systemd unit files in {}", self.unit_dir.display());
        info!("ExecStart target: {}", params.script_path.display());
        let service = render_service(params)?;

        fs::create_dir_all(&self.unit_dir).at(&self.unit_dir)?;
        let service_path = self.service_path();
        fs::write(&service_path, service).at(&service_path)?;
        info!("wrote unit file {}", service_path.display());

        let timer_path = self.timer_path();
        fs::write(&timer_path, render_timer()).at(&timer_path)?;
        info!("wrote unit file {}", timer_path.display());

        self.systemctl_checked(&["daemon-reload"])?;
        Ok(())
    }

    /// 写入单元文件并立即启用定时器
    pub fn enable_timer(&self, params: &UnitParams) -> Result<()> {
        self.create_unit_files(params)?;
        self.systemctl_checked(&["enable", "--now", TIMER_FILE])?;
        info!("systemd timer {TIMER_FILE} enabled and started");
        Ok(())
    }

    /// 停用定时器；只有 systemctl 无法执行时才视为失败
    pub fn disable_timer(&self) -> Result<()> {
        let output = self.systemctl(&["disable", "--now", TIMER_FILE])?;
        if output.success() {
            info!("systemd timer {TIMER_FILE} disabled and stopped");
        } else {
            warn!(
                "systemctl disable {TIMER_FILE} returned {:?}: {}",
                output.code,
                output.stderr.trim()
            );
        }
        Ok(())
    }

    /// 删除单元文件，返回是否删除了任何文件
    pub fn remove_unit_files(&self) -> Result<bool> {
        let mut found = false;
        for path in [self.service_path(), self.timer_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("removed {}", path.display());
                    found = true;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("{} not found, skipping", path.display());
                }
                Err(e) => return Err(Error::io(&path, e)),
            }
        }

        if found {
            match self.systemctl_checked(&["daemon-reload"]) {
                Ok(_) => {}
                Err(e) => warn!("daemon-reload after removing unit files failed: {e}"),
            }
        } else {
            info!("no systemd unit files found to remove");
        }
        Ok(found)
    }

    pub fn status(&self) -> TimerStatus {
        let check = |verb: &str| {
            self.systemctl(&[verb, TIMER_FILE])
                .map(|o| o.success())
                .unwrap_or(false)
        };
        TimerStatus {
            enabled: check("is-enabled"),
            active: check("is-active"),
            unit_files_present: self.service_path().is_file() && self.timer_path().is_file(),
        }
    }
}
