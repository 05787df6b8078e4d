// main.rs — 程序入口
// 负责初始化语言与日志、解析命令行参数、分发子命令，并把错误映射为退出码

mod ci;
mod cli; // 声明 cli 模块，对应 src/cli.rs
mod config;
mod desktop;
mod downloader;
mod error;
mod fallback;
mod headless;
mod history;
mod install;
mod logging;
mod notify;
mod packager;
mod paths;
mod runner;
mod service;
mod setter;
mod source;

// 初始化多语言支持，嵌入 locales 目录下的所有翻译
rust_i18n::i18n!("locales", fallback = "en");

use chrono::Local;
use clap::{CommandFactory, Parser}; // CommandFactory 用于生成补全脚本
use clap_complete::generate; // 引入补全脚本生成函数
use cli::{Cli, Commands, ConfigAction, TimerAction};
use config::{ConfigStore, KEY_ENABLED, KEY_LAST_UPDATE, SETTINGS, STATE};
use error::Result;
use headless::{DailyUpdate, UpdateOutcome};
use install::{InstallOptions, InstallPaths, Installer, UninstallOutcome};
use notify::NotifySend;
use packager::{BuildOptions, Packager};
use paths::AppPaths;
use runner::SystemRunner;
use rust_i18n::t; // 引入翻译宏
use service::{ServiceManager, UnitParams};
use setter::{GnomeSetter, WallpaperSetter};
use source::WallpaperSource;
use source::bing::{BING_REGIONS, BingClient};
use source::custom::CustomUrlSource;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

/// 各子命令共用的上下文
struct App {
    paths: AppPaths,
    store: ConfigStore,
    runner: SystemRunner,
}

impl App {
    fn new(paths: AppPaths) -> Self {
        let store = ConfigStore::open_file(&paths.config_file, &paths.home);
        Self {
            paths,
            store,
            runner: SystemRunner,
        }
    }

    fn setter(&self) -> GnomeSetter<'_> {
        GnomeSetter::new(&self.runner)
    }

    fn services(&self) -> ServiceManager<'_> {
        ServiceManager::new(&self.paths.unit_dir, &self.runner)
    }

    /// 定时器应执行的程序及模板参数
    fn unit_params(&self) -> Result<UnitParams> {
        let cfg = self.store.settings()?;
        let (kind, params) = service::resolve_target(
            env::var_os("APPIMAGE").map(PathBuf::from),
            cfg.installed_appimage_path,
            &env::current_exe()?,
            &self.paths.home,
            service::dbus_address_from_env(),
        );
        info!("timer target resolved as {kind:?}");
        Ok(params)
    }
}

/// `#[tokio::main]` 宏将 async main 转换为同步 main + tokio 运行时
#[tokio::main]
async fn main() -> ExitCode {
    // 自动检测系统语言并设置
    let locale = env::var("LANG").unwrap_or_else(|_| "en".to_string());
    if locale.starts_with("zh") {
        rust_i18n::set_locale("zh-CN");
    } else {
        rust_i18n::set_locale("en");
    }

    // 用法错误退出码为 1，--help / --version 为 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if cli::is_informational(e.kind()) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    let paths = match AppPaths::from_env() {
        Ok(p) => p,
        Err(e) => {
            logging::init(cli.verbose, None);
            eprintln!("{}", t!("error_prefix", msg => e));
            return ExitCode::FAILURE;
        }
    };
    let debug = cli.verbose || matches!(cli.command, Some(Commands::Build { debug: true, .. }));
    logging::init(debug, Some(paths.log_file.as_path()));

    match run(cli, App::new(paths)).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("{}", t!("error_prefix", msg => e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, app: App) -> Result<ExitCode> {
    if let Some(args) = cli.internal_set_config {
        // clap 保证正好三个值
        if let [section, key, value] = args.as_slice() {
            app.store.set(section, key, value)?;
        }
        return Ok(ExitCode::SUCCESS);
    }
    if cli.headless {
        return handle_update(&app, false).await;
    }

    // 根据子命令分发执行逻辑，不带子命令时显示状态
    match cli.command.unwrap_or(Commands::Status) {
        Commands::Update { force } => return handle_update(&app, force).await,
        Commands::Status => handle_status(&app)?,
        Commands::Fetch { region, apply } => handle_fetch(&app, region, apply).await?,
        Commands::Custom { url, no_apply } => handle_custom(&app, &url, !no_apply).await?,
        Commands::Apply { image } => {
            println!("{}", t!("setting_wallpaper"));
            app.setter().set(&image)?;
            println!("{}", t!("set_done"));
        }
        Commands::History { limit } => handle_history(&app, limit)?,
        Commands::Clean { keep } => handle_clean(&app, keep)?,
        Commands::Regions => handle_regions(&app)?,
        Commands::Timer { action } => handle_timer(&app, action)?,
        Commands::Config { action } => handle_config(&app, action)?,
        Commands::Install {
            uninstall,
            yes,
            purge,
            from,
            root,
        } => handle_install(&app, uninstall, yes, purge, from, root).await?,
        Commands::Build {
            version_update,
            build_only,
            appimage,
            debug,
            root,
        } => {
            let opts = BuildOptions {
                version_update,
                build_only,
                appimage,
                debug,
            };
            handle_build(&app, &root, &opts).await?;
        }
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "chromadesk", &mut std::io::stdout());
        }
        Commands::CiSummary { pr, results } => {
            print!("{}", ci::render_comment(pr, &results));
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// 处理 update 子命令（以及 --headless）
async fn handle_update(app: &App, force: bool) -> Result<ExitCode> {
    let bing = BingClient::new(downloader::http_client()?)?;
    let setter = app.setter();
    let notifier = NotifySend::new(&app.runner);
    let update = DailyUpdate {
        store: &app.store,
        source: &bing,
        setter: &setter,
        notifier: &notifier,
        now: Local::now().naive_local(),
        force,
    };

    match update.run().await? {
        UpdateOutcome::Disabled => println!("{}", t!("update_disabled")),
        UpdateOutcome::AlreadyUpdated => println!("{}", t!("update_already_done")),
        UpdateOutcome::Updated {
            path,
            title,
            description,
        } => {
            println!("{}", t!("update_done", title => title));
            if !description.is_empty() {
                println!("  {description}");
            }
            println!("{}", t!("save_path", path => path.display()));
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// 处理 status 子命令：配置、定时器和最新壁纸
fn handle_status(app: &App) -> Result<()> {
    let cfg = app.store.settings()?;
    let timer = app.services().status();
    let yes_no = |b: bool| if b { t!("word_yes") } else { t!("word_no") };

    println!("{}", t!("status_title"));
    println!("{}", t!("config_path", path => app.store.location()));
    println!("{}", t!("status_enabled", value => yes_no(cfg.enabled)));
    println!("{}", t!("config_region", region => cfg.region));
    println!("{}", t!("config_wallpaper_dir", path => cfg.wallpaper_dir.display()));
    let last = cfg
        .last_update_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("{}", t!("status_last_update", date => last));
    println!(
        "{}",
        t!(
            "status_timer",
            enabled => yes_no(timer.enabled),
            active => yes_no(timer.active),
            files => yes_no(timer.unit_files_present)
        )
    );
    match history::sorted_history(&cfg.wallpaper_dir, 1)?.first() {
        Some(entry) => println!("{}", t!("status_latest", path => entry.path.display())),
        None => println!("{}", t!("history_empty")),
    }
    Ok(())
}

/// 处理 fetch 子命令：下载今天的 Bing 图片
async fn handle_fetch(app: &App, region: Option<String>, apply: bool) -> Result<()> {
    let cfg = app.store.settings()?;
    let region = region.unwrap_or(cfg.region);
    let bing = BingClient::new(downloader::http_client()?)?;
    let now = Local::now().naive_local();

    println!("{}", t!("fetch_start", region => region));
    let info = bing.latest(&region).await?;
    println!("{}", t!("fetch_info", title => info.title));
    let description = info.description();
    if !description.is_empty() {
        println!("  {description}");
    }

    let path = cfg.wallpaper_dir.join(history::filename_for(&info, now));
    if path.is_file() {
        println!("{}", t!("already_downloaded", path => path.display()));
    } else {
        bing.download(&info, &path).await?;
        println!("{}", t!("save_path", path => path.display()));
    }

    if apply {
        println!("{}", t!("setting_wallpaper"));
        app.setter().set(&path)?;
        app.store
            .set(STATE, KEY_LAST_UPDATE, &now.date().format("%Y-%m-%d").to_string())?;
        println!("{}", t!("set_done"));
    }
    history::cleanup(&cfg.wallpaper_dir, cfg.keep_history)?;
    Ok(())
}

/// 处理 custom 子命令：先下载到缓存目录，校验通过后再放进历史
async fn handle_custom(app: &App, url: &str, apply: bool) -> Result<()> {
    let cfg = app.store.settings()?;
    let source = CustomUrlSource::new(downloader::http_client()?, url)?;
    let now = Local::now().naive_local();

    let info = source.latest(&cfg.region).await?;
    let staging = app.paths.cache_dir.join(history::filename_for(&info, now));
    println!("{}", t!("custom_start", url => info.url));
    source.download(&info, &staging).await?;
    let saved = history::save_custom(&staging, &cfg.wallpaper_dir, cfg.keep_history, now);
    if let Err(e) = std::fs::remove_file(&staging) {
        warn!("could not remove {}: {e}", staging.display());
    }
    let saved = saved?;
    println!("{}", t!("save_path", path => saved.display()));

    if apply {
        println!("{}", t!("setting_wallpaper"));
        app.setter().set(&saved)?;
        println!("{}", t!("set_done"));
    }
    Ok(())
}

/// 处理 history 子命令
fn handle_history(app: &App, limit: Option<usize>) -> Result<()> {
    let cfg = app.store.settings()?;
    let entries = history::sorted_history(&cfg.wallpaper_dir, limit.unwrap_or(cfg.keep_history))?;
    if entries.is_empty() {
        println!("{}", t!("history_empty"));
        return Ok(());
    }
    println!("{}", t!("history_title", count => entries.len()));
    for entry in entries {
        let kind = match entry.source {
            source::SourceKind::Bing => "bing",
            source::SourceKind::Custom => "custom",
        };
        println!(
            "  {}  {:<6}  {}",
            entry.taken.format("%Y-%m-%d %H:%M"),
            kind,
            entry.path.display()
        );
    }
    Ok(())
}

/// 处理 clean 子命令
fn handle_clean(app: &App, keep: Option<usize>) -> Result<()> {
    let cfg = app.store.settings()?;
    let keep = keep.unwrap_or(cfg.keep_history);
    println!("{}", t!("cleaning_dir", path => cfg.wallpaper_dir.display()));
    let deleted = history::cleanup(&cfg.wallpaper_dir, keep)?;
    println!("{}", t!("clean_done", count => deleted));
    Ok(())
}

/// 处理 regions 子命令
fn handle_regions(app: &App) -> Result<()> {
    let current = app.store.settings()?.region;
    println!("{}", t!("regions_title"));
    for (name, code) in BING_REGIONS {
        let marker = if *code == current { "*" } else { " " };
        println!("  {marker} {code:<6} {name}");
    }
    Ok(())
}

/// 处理 timer 子命令
fn handle_timer(app: &App, action: TimerAction) -> Result<()> {
    let manager = app.services();
    match action {
        TimerAction::Enable => {
            manager.enable_timer(&app.unit_params()?)?;
            app.store.set(SETTINGS, KEY_ENABLED, "true")?;
            println!("{}", t!("timer_enabled"));
        }
        TimerAction::Disable => {
            manager.disable_timer()?;
            app.store.set(SETTINGS, KEY_ENABLED, "false")?;
            println!("{}", t!("timer_disabled"));
        }
        TimerAction::Status => {
            let status = manager.status();
            let yes_no = |b: bool| if b { t!("word_yes") } else { t!("word_no") };
            println!(
                "{}",
                t!(
                    "status_timer",
                    enabled => yes_no(status.enabled),
                    active => yes_no(status.active),
                    files => yes_no(status.unit_files_present)
                )
            );
        }
        TimerAction::Remove => {
            if manager.remove_unit_files()? {
                println!("{}", t!("timer_removed"));
            } else {
                println!("{}", t!("timer_nothing_to_remove"));
            }
        }
        TimerAction::Render => {
            let params = app.unit_params()?;
            println!("# {}", manager.service_path().display());
            println!("{}", service::render_service(&params)?);
            println!("# {}", manager.timer_path().display());
            println!("{}", service::render_timer());
        }
    }
    Ok(())
}

/// 处理 config 子命令：查看或修改配置
fn handle_config(app: &App, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let cfg = app.store.settings()?;
            println!("{}", t!("config_title"));
            println!("{}", t!("config_path", path => app.store.location()));
            println!("{}", t!("status_enabled", value => cfg.enabled));
            println!("{}", t!("config_region", region => cfg.region));
            println!("{}", t!("config_keep", count => cfg.keep_history));
            println!("{}", t!("config_wallpaper_dir", path => cfg.wallpaper_dir.display()));
            let installed = cfg
                .installed_appimage_path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{}", t!("config_installed", path => installed));
        }
        ConfigAction::Get { section, key } => match app.store.get(&section, &key)? {
            Some(value) => println!("{value}"),
            None => {
                let msg = t!("config_error_unknown_key", section => section, key => key);
                return Err(msg.to_string().into());
            }
        },
        ConfigAction::Set {
            section,
            key,
            value,
        } => {
            app.store.set(&section, &key, &value)?;
            println!("{}", t!("config_updated", key => key, value => value));
        }
        ConfigAction::Dump => print!("{}", app.store.dump()?),
        ConfigAction::Schema => println!("{}", config::schema()?),
        ConfigAction::Reset => {
            app.store.delete()?;
            println!("{}", t!("config_reset"));
        }
    }
    Ok(())
}

/// 处理 install 子命令
async fn handle_install(
    app: &App,
    uninstall: bool,
    yes: bool,
    purge: bool,
    from: Option<PathBuf>,
    root: PathBuf,
) -> Result<()> {
    // HTTP 客户端是必需依赖，初始化失败时不做任何文件操作
    let http = install::preflight()?;
    let installer = Installer {
        paths: InstallPaths::from_app_paths(&app.paths),
        project_root: root,
        self_exe: env::current_exe()?,
        runner: &app.runner,
        store: &app.store,
        http,
    };

    if uninstall {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        if let UninstallOutcome::Removed(files) = installer.uninstall(&mut input, &mut output, yes, purge).await? {
            info!("uninstall removed {} files", files.len());
        }
        return Ok(());
    }

    let opts = InstallOptions {
        from,
        appimage_env: env::var_os("APPIMAGE").map(PathBuf::from),
    };
    println!("{}", t!("install_start"));
    let report = installer.install(&opts).await?;
    println!("{}", t!("install_source", strategy => report.strategy));
    println!("{}", t!("install_done", path => report.binary.display()));
    if !report.recorded {
        println!("{}", t!("install_config_warning"));
    }
    Ok(())
}

/// 处理 build 子命令
async fn handle_build(app: &App, root: &Path, opts: &BuildOptions) -> Result<()> {
    let packager = Packager::new(root, &app.runner, downloader::http_client()?);
    let report = packager.run(opts).await?;
    if let Some(v) = &report.version {
        println!("{}", t!("build_version", version => v));
    }
    println!("{}", t!("build_binary", path => report.binary.display()));
    if let Some(dir) = &report.app_dir {
        println!("{}", t!("build_appdir", path => dir.display()));
    }
    if let Some(image) = &report.appimage {
        println!("{}", t!("build_appimage", path => image.display()));
    }
    Ok(())
}
