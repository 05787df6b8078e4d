// headless.rs — 每日自动更新流程
// 由 systemd 定时器以 `chromadesk --headless` 调用：
// 读取配置 → 检查开关与日期 → 获取 Bing 信息 → 下载 → 设置壁纸 → 记录状态 → 清理历史 → 通知

use crate::config::{ConfigStore, KEY_LAST_UPDATE, STATE};
use crate::error::{IoContext, Result};
use crate::history;
use crate::notify::{Notifier, Urgency};
use crate::setter::WallpaperSetter;
use crate::source::WallpaperSource;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use tracing::{error, info};

/// 一次更新需要的全部依赖
pub struct DailyUpdate<'a> {
    pub store: &'a ConfigStore,
    pub source: &'a dyn WallpaperSource,
    pub setter: &'a dyn WallpaperSetter,
    pub notifier: &'a dyn Notifier,
    pub now: NaiveDateTime,
    /// 忽略 enabled 开关与“今天已更新”检查
    pub force: bool,
}

/// 更新结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// 配置中未启用每日更新
    Disabled,
    /// 今天已经更新过
    AlreadyUpdated,
    Updated {
        path: PathBuf,
        title: String,
        description: String,
    },
}

impl DailyUpdate<'_> {
    /// 执行完整的每日更新
    pub async fn run(&self) -> Result<UpdateOutcome> {
        info!("starting daily update process");

        let config = self.store.settings().inspect_err(|e| {
            error!("failed to load configuration: {e}");
            self.notifier.notify(
                "ChromaDesk Error",
                "Failed to load configuration. Daily update aborted.",
                Urgency::Critical,
            );
        })?;
        info!(
            "config loaded: enabled={}, region={}, keep={}, last_update={:?}",
            config.enabled, config.region, config.keep_history, config.last_update_date
        );

        if !config.enabled && !self.force {
            info!("daily updates are disabled in configuration");
            return Ok(UpdateOutcome::Disabled);
        }

        let today = self.now.date();
        if config.last_update_date == Some(today) && !self.force {
            info!("wallpaper already updated today ({today})");
            return Ok(UpdateOutcome::AlreadyUpdated);
        }

        let dir = &config.wallpaper_dir;
        std::fs::create_dir_all(dir).at(dir).inspect_err(|e| {
            error!("cannot create wallpaper directory: {e}");
            self.notifier.notify(
                "ChromaDesk Error",
                "Cannot create or access wallpaper directory. Update failed.",
                Urgency::Critical,
            );
        })?;

        let info = self.source.latest(&config.region).await.inspect_err(|e| {
            error!("failed to fetch Bing wallpaper info: {e}");
            self.notifier.notify(
                "ChromaDesk Update Failed",
                &format!("Could not fetch Bing image information for region {}.", config.region),
                Urgency::Normal,
            );
        })?;
        let description = info.description();
        info!("fetched Bing info: title='{}', desc='{description}'", info.title);

        let local_path = dir.join(history::filename_for(&info, self.now));
        if local_path.is_file() {
            info!("today's image already downloaded: {}", local_path.display());
        } else if let Err(e) = self.source.download(&info, &local_path).await {
            error!("failed to download Bing image: {e}");
            self.notifier.notify(
                "ChromaDesk Update Failed",
                "Could not download the Bing image.",
                Urgency::Normal,
            );
            // 下载器只写入校验过的数据，这里只是兜底清理
            let _ = std::fs::remove_file(&local_path);
            return Err(e);
        }

        if let Err(e) = self.setter.set(&local_path) {
            error!("failed to set wallpaper: {e}");
            let name = local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.notifier.notify(
                "ChromaDesk Update Failed",
                &format!("Could not set the downloaded wallpaper: {name}"),
                Urgency::Critical,
            );
            return Err(e);
        }

        // 以下步骤失败不影响本次结果
        let today_str = today.format("%Y-%m-%d").to_string();
        info!("wallpaper set, updating last_update_date to {today_str}");
        if let Err(e) = self.store.set(STATE, KEY_LAST_UPDATE, &today_str) {
            error!("failed to update last_update_date: {e}");
        }

        info!("running history cleanup with keep={}", config.keep_history);
        if let Err(e) = history::cleanup(dir, config.keep_history) {
            error!("history cleanup failed: {e}");
        }

        let mut message = format!("'{}'", info.title);
        if !description.is_empty() {
            message.push('\n');
            message.push_str(&description);
        }
        self.notifier.notify("Wallpaper Updated", &message, Urgency::Normal);

        info!("daily update process completed successfully");
        Ok(UpdateOutcome::Updated {
            path: local_path,
            title: info.title,
            description,
        })
    }
}
