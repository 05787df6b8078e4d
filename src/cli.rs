// cli.rs — 命令行接口定义模块
// 使用 clap 的 derive 模式定义所有子命令和参数

use crate::ci::ToolResult;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand}; // Parser: 解析命令行参数的 trait; Subcommand: 定义子命令的 trait
use clap_complete::Shell; // Shell 枚举：Bash, Zsh, Fish, Elvish, PowerShell
use std::path::PathBuf;

/// GNOME 每日壁纸工具
///
/// 获取 Bing 每日图片或自定义 URL 的图片，保存历史并设置为桌面壁纸，
/// 可通过 systemd 用户定时器每天自动更新。
#[derive(Parser, Debug)]
#[command(name = "chromadesk")]
#[command(version)] // 自动从 Cargo.toml 读取 version 字段
#[command(author)]
#[command(about = "GNOME 每日壁纸工具 — Bing 每日图片、自定义 URL、历史管理与自动更新")]
pub struct Cli {
    /// 在控制台输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 以无界面模式执行每日更新（供 systemd 定时器调用）
    #[arg(long, hide = true, conflicts_with = "internal_set_config")]
    pub headless: bool,

    /// 写入一个配置项后退出（供安装器调用）
    #[arg(
        long,
        hide = true,
        num_args = 3,
        value_names = ["SECTION", "KEY", "VALUE"],
        allow_hyphen_values = true
    )]
    pub internal_set_config: Option<Vec<String>>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 执行每日更新：获取今天的 Bing 图片并设置为壁纸
    ///
    /// 用法示例:
    ///   chromadesk update
    ///   chromadesk update --force
    Update {
        /// 忽略“未启用”与“今天已更新”检查
        #[arg(short, long)]
        force: bool,
    },

    /// 查看配置、定时器与最近壁纸的状态（默认命令）
    Status,

    /// 获取今天的 Bing 图片并保存到历史
    ///
    /// 用法示例:
    ///   chromadesk fetch
    ///   chromadesk fetch --region ja-JP --apply
    Fetch {
        /// Bing 市场区域（不指定则使用配置）
        #[arg(short, long)]
        region: Option<String>,

        /// 下载后立即设置为壁纸
        #[arg(short, long)]
        apply: bool,
    },

    /// 从指定 URL 下载图片，保存到历史并设置为壁纸
    ///
    /// 用法示例:
    ///   chromadesk custom https://example.com/picture.jpg
    Custom {
        /// 图片 URL（必须是 JPEG 或 PNG）
        url: String,

        /// 只保存，不设置为壁纸
        #[arg(long)]
        no_apply: bool,
    },

    /// 将本地图片设置为系统壁纸
    ///
    /// 用法示例:
    ///   chromadesk apply ~/Pictures/wallpapers/bing_20240101.jpg
    Apply {
        /// 图片的本地路径
        image: PathBuf,
    },

    /// 列出历史壁纸（新的在前）
    History {
        /// 最多显示的数量（默认使用 keep_history）
        #[arg(short = 'n', long, value_name = "N")]
        limit: Option<usize>,
    },

    /// 删除旧的历史壁纸
    Clean {
        /// 保留的数量（默认使用 keep_history）
        #[arg(short, long, value_name = "N")]
        keep: Option<usize>,
    },

    /// 列出可选的 Bing 区域
    Regions,

    /// 管理每日更新的 systemd 用户定时器
    ///
    /// 用法示例:
    ///   chromadesk timer enable
    ///   chromadesk timer status
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },

    /// 配置管理操作
    ///
    /// 用法示例:
    ///   chromadesk config show
    ///   chromadesk config set Settings region de-DE
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// 安装到 ~/.local（或使用 --uninstall 卸载）
    ///
    /// 用法示例:
    ///   chromadesk install
    ///   chromadesk install --from dist/ChromaDesk-x86_64.AppImage
    ///   chromadesk install --uninstall --purge
    Install {
        /// 卸载而不是安装
        #[arg(long)]
        uninstall: bool,

        /// 卸载时不询问确认
        #[arg(short, long, requires = "uninstall")]
        yes: bool,

        /// 卸载时一并删除定时器和配置文件
        #[arg(long, requires = "uninstall")]
        purge: bool,

        /// 使用指定的 AppImage
        #[arg(long, value_name = "PATH", conflicts_with = "uninstall")]
        from: Option<PathBuf>,

        /// 项目根目录（查找 dist/ 与 Cargo.toml）
        #[arg(long, value_name = "DIR", default_value = ".")]
        root: PathBuf,
    },

    /// 构建二进制并打包 AppDir / AppImage
    ///
    /// 用法示例:
    ///   chromadesk build --appimage
    ///   chromadesk build --version-update 1.2.3 --build-only
    Build {
        /// 更新 Cargo.toml 与 .desktop 中的版本号（格式 N.N.N）
        #[arg(long, value_name = "VER")]
        version_update: Option<String>,

        /// 只更新版本并编译，不打包
        #[arg(long)]
        build_only: bool,

        /// 生成 AppImage
        #[arg(long)]
        appimage: bool,

        /// 使用 debug profile 并输出调试日志
        #[arg(long)]
        debug: bool,

        /// 项目根目录
        #[arg(long, value_name = "DIR", default_value = ".")]
        root: PathBuf,
    },

    /// 生成 shell 补全脚本（支持 bash, zsh, fish, elvish, powershell）
    ///
    /// 用法示例：
    ///   chromadesk completions zsh > ~/.zsh/completions/_chromadesk
    Completions {
        /// 目标 shell 类型
        shell: Shell,
    },

    /// 渲染 lint 工作流的 PR 评论
    #[command(hide = true)]
    CiSummary {
        /// PR 编号
        #[arg(long)]
        pr: Option<u64>,

        /// 工具结果，格式 NAME=OUTCOME，可重复
        #[arg(long = "result", value_name = "NAME=OUTCOME", required = true)]
        results: Vec<ToolResult>,
    },
}

/// 定时器操作
#[derive(Subcommand, Debug)]
pub enum TimerAction {
    /// 写入单元文件并启用定时器
    Enable,
    /// 停用定时器
    Disable,
    /// 查看定时器状态
    Status,
    /// 删除单元文件
    Remove,
    /// 打印渲染后的单元文件，不修改系统
    Render,
}

/// 配置管理操作
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// 查看当前所有配置简报
    Show,
    /// 读取单个配置项
    Get {
        /// 节名 (Settings / State)
        section: String,
        key: String,
    },
    /// 设置配置项
    Set {
        /// 节名 (Settings / State)
        section: String,
        key: String,
        /// 要设置的值
        value: String,
    },
    /// 以 TOML 格式打印当前完整配置内容
    Dump,
    /// 生成配置文件对应的 JSON Schema
    Schema,
    /// 删除配置文件，下次运行时重新生成默认值
    Reset,
}

/// 解析失败时的退出码是否为 0：只有 --help / --version，缺少子命令属于用法错误
pub fn is_informational(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}
