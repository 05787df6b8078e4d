// history.rs — 壁纸历史管理
// 历史文件只认两种命名：bing_YYYYMMDD.ext 与 custom_YYYYMMDD_HHMMSS.ext，
// 其余文件一律忽略，清理时也不会删除

use crate::error::{IoContext, Result};
use crate::source::{SourceKind, WallpaperInfo};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};
use url::Url;

static BING_FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^bing_(\d{8})\..+$").expect("valid regex"));
static CUSTOM_FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^custom_(\d{8}_\d{6})\..+$").expect("valid regex"));

/// 规范化扩展名：小写、带点，空时为 .jpg
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() { ".jpg".to_string() } else { format!(".{ext}") }
}

/// 取 URL 路径部分的扩展名
fn url_extension(image_url: &str) -> String {
    let ext = Url::parse(image_url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
        })
        .unwrap_or_default();
    normalize_extension(&ext)
}

/// Bing 图片文件名，如 bing_20231027.jpg
pub fn bing_filename(date: &str, image_url: &str) -> String {
    let date_part = date.split('T').next().unwrap_or_default().replace('-', "");
    let filename = format!("bing_{date_part}{}", url_extension(image_url));
    debug!("generated Bing filename '{filename}' for date '{date}'");
    filename
}

/// 自定义图片文件名，如 custom_20231027_153000.jpg
pub fn custom_filename(extension: &str, now: NaiveDateTime) -> String {
    format!(
        "custom_{}{}",
        now.format("%Y%m%d_%H%M%S"),
        normalize_extension(extension)
    )
}

/// 根据来源生成历史文件名
pub fn filename_for(info: &WallpaperInfo, now: NaiveDateTime) -> String {
    match info.source {
        SourceKind::Bing if !info.date.is_empty() => bing_filename(&info.date, &info.url),
        // 没有日期的 Bing 信息按当天处理
        SourceKind::Bing => bing_filename(&now.format("%Y%m%d").to_string(), &info.url),
        SourceKind::Custom => custom_filename(&url_extension(&info.url), now),
    }
}

/// 历史中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub path: PathBuf,
    pub taken: NaiveDateTime,
    pub source: SourceKind,
}

/// 从文件名解析时间；不是历史文件时返回 None
pub fn parse_entry(path: &Path) -> Option<HistoryEntry> {
    let name = path.file_name()?.to_str()?;
    if let Some(caps) = BING_FILENAME_RE.captures(name) {
        // Bing 图片代表一整天，按当天零点排序
        let date = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()?;
        return Some(HistoryEntry {
            path: path.to_path_buf(),
            taken: date.and_hms_opt(0, 0, 0)?,
            source: SourceKind::Bing,
        });
    }
    if let Some(caps) = CUSTOM_FILENAME_RE.captures(name) {
        let taken = NaiveDateTime::parse_from_str(&caps[1], "%Y%m%d_%H%M%S").ok()?;
        return Some(HistoryEntry {
            path: path.to_path_buf(),
            taken,
            source: SourceKind::Custom,
        });
    }
    None
}

/// 扫描目录，返回按时间从新到旧排列的历史（最多 max_items 项）
pub fn sorted_history(dir: &Path, max_items: usize) -> Result<Vec<HistoryEntry>> {
    if !dir.is_dir() {
        warn!("wallpaper directory not found: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for item in fs::read_dir(dir).at(dir)? {
        let path = item.at(dir)?.path();
        if !path.is_file() {
            continue;
        }
        match parse_entry(&path) {
            Some(entry) => entries.push(entry),
            None => debug!("ignoring non-history file {}", path.display()),
        }
    }

    // 新的在前；时间相同按文件名倒序，保证结果稳定
    entries.sort_by(|a, b| b.taken.cmp(&a.taken).then_with(|| b.path.cmp(&a.path)));
    info!("found {} history files, returning newest {max_items}", entries.len());
    entries.truncate(max_items);
    Ok(entries)
}

/// 删除最旧的历史文件，只保留最新的 keep 个，返回删除数量
pub fn cleanup(dir: &Path, keep: usize) -> Result<usize> {
    let all = sorted_history(dir, usize::MAX)?;
    if all.len() <= keep {
        info!("cleanup: {} files <= {keep}, nothing to do", all.len());
        return Ok(0);
    }

    let mut deleted = 0;
    for entry in &all[keep..] {
        match fs::remove_file(&entry.path) {
            Ok(()) => {
                info!("cleanup: deleted old wallpaper {}", entry.path.display());
                deleted += 1;
            }
            Err(e) => error!("cleanup: error deleting {}: {e}", entry.path.display()),
        }
    }
    Ok(deleted)
}

/// 把一张已校验的本地图片复制进历史目录，然后执行清理
pub fn save_custom(source: &Path, dir: &Path, keep: usize, now: NaiveDateTime) -> Result<PathBuf> {
    fs::create_dir_all(dir).at(dir)?;
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dest = dir.join(custom_filename(&ext, now));
    fs::copy(source, &dest).at(&dest)?;
    info!("saved custom wallpaper {} to {}", source.display(), dest.display());
    cleanup(dir, keep)?;
    Ok(dest)
}
