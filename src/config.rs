// config.rs — 配置管理模块
// 配置文件位于 ~/.config/chromadesk/config.toml，分为 [Settings] 与 [State] 两节
// ConfigStore 只通过 get/set 操作键值，底层存储由 ConfigBackend 注入

use crate::error::{Error, IoContext, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;
use toml::{Table, Value};
use tracing::{debug, info, warn};

pub const SETTINGS: &str = "Settings";
pub const STATE: &str = "State";

pub const KEY_ENABLED: &str = "enabled";
pub const KEY_REGION: &str = "region";
pub const KEY_KEEP_HISTORY: &str = "keep_history";
pub const KEY_WALLPAPER_DIR: &str = "wallpaper_dir";
pub const KEY_LAST_UPDATE: &str = "last_update_date";
pub const KEY_INSTALLED_PATH: &str = "installed_appimage_path";

/// Settings 节中已知的键
const SETTINGS_KEYS: [&str; 4] = [KEY_ENABLED, KEY_REGION, KEY_KEEP_HISTORY, KEY_WALLPAPER_DIR];

/// 展开路径中的 ~ 和环境变量，相对路径则相对于 home
fn expand_path(path_str: &str, home: &Path) -> PathBuf {
    let expanded = match shellexpand::full(path_str) {
        Ok(s) => s.into_owned(),
        Err(e) => {
            warn!("cannot expand '{path_str}': {e}; only expanding ~");
            shellexpand::tilde(path_str).into_owned()
        }
    };
    let p = PathBuf::from(expanded);
    if p.is_absolute() { p } else { home.join(p) }
}

/// 映射 config.toml 文件内容的结构体
#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct ConfigFile {
    #[serde(rename = "Settings", default)]
    settings: SettingsSection,
    #[serde(rename = "State", default)]
    state: StateSection,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SettingsSection {
    /// 是否启用每日自动更新（由 systemd 定时器触发）
    #[serde(default)]
    enabled: bool,
    /// Bing 市场区域，如 en-US、de-DE
    #[serde(default = "default_region")]
    region: String,
    /// 历史中保留的壁纸数量
    #[serde(default = "default_keep_history")]
    keep_history: u32,
    /// 壁纸保存目录 (支持 ~、$HOME 等环境变量)
    #[serde(default = "default_wallpaper_dir")]
    wallpaper_dir: String,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            region: default_region(),
            keep_history: default_keep_history(),
            wallpaper_dir: default_wallpaper_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct StateSection {
    /// 上次成功更新 Bing 壁纸的日期 (YYYY-MM-DD)
    #[serde(default)]
    last_update_date: String,
    /// 安装器写入的 AppImage 绝对路径
    #[serde(default)]
    installed_appimage_path: String,
}

fn default_region() -> String {
    "en-US".to_string()
}
fn default_keep_history() -> u32 {
    7
}
fn default_wallpaper_dir() -> String {
    "~/Pictures/wallpapers".to_string()
}

/// 配置的存储后端
pub trait ConfigBackend: Send + Sync {
    /// 读取原始内容，不存在时返回 None
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, contents: &str) -> Result<()>;
    /// 删除存储，返回删除前是否存在
    fn delete(&self) -> Result<bool>;
    /// 人类可读的位置描述
    fn location(&self) -> String;
}

/// 基于文件的后端
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigBackend for FileBackend {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn save(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        fs::write(&self.path, contents).at(&self.path)
    }

    fn delete(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// 内存后端，用于测试
#[cfg(test)]
#[derive(Default)]
pub struct MemoryBackend {
    contents: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

#[cfg(test)]
impl MemoryBackend {
    pub fn with_contents(contents: &str) -> Self {
        Self {
            contents: Mutex::new(Some(contents.to_string())),
            writes: Mutex::new(0),
        }
    }

    /// 当前保存的原始文本
    pub fn snapshot(&self) -> Option<String> {
        self.contents.lock().map(|c| c.clone()).unwrap_or(None)
    }

    /// save() 被调用的次数
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }
}

#[cfg(test)]
impl ConfigBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.snapshot())
    }

    fn save(&self, contents: &str) -> Result<()> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| Error::from("config backend lock poisoned"))?;
        *guard = Some(contents.to_string());
        if let Ok(mut w) = self.writes.lock() {
            *w += 1;
        }
        Ok(())
    }

    fn delete(&self) -> Result<bool> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| Error::from("config backend lock poisoned"))?;
        Ok(guard.take().is_some())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

/// 共享同一个后端（测试中用来在 store 之外观察写入）
impl<B: ConfigBackend + ?Sized> ConfigBackend for Arc<B> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, contents: &str) -> Result<()> {
        (**self).save(contents)
    }

    fn delete(&self) -> Result<bool> {
        (**self).delete()
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

/// 解析后的应用配置（只读视图）
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub enabled: bool,
    pub region: String,
    pub keep_history: usize,
    pub wallpaper_dir: PathBuf,
    pub last_update_date: Option<NaiveDate>,
    pub installed_appimage_path: Option<PathBuf>,
}

/// 配置服务：get / set 接口 + 可注入的存储后端
pub struct ConfigStore {
    backend: Box<dyn ConfigBackend>,
    home: PathBuf,
}

impl ConfigStore {
    /// `home` 用于展开 wallpaper_dir 中的相对路径
    pub fn new(backend: impl ConfigBackend + 'static, home: impl Into<PathBuf>) -> Self {
        Self {
            backend: Box::new(backend),
            home: home.into(),
        }
    }

    /// 打开默认的文件配置
    pub fn open_file(path: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(path), home)
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    fn defaults() -> Result<Table> {
        match Value::try_from(ConfigFile::default())? {
            Value::Table(t) => Ok(t),
            _ => Err(Error::from("default config did not serialize to a table")),
        }
    }

    /// 读取配置表
    /// - 文件不存在：写入默认配置
    /// - 缺少节或键：补齐默认值并保存
    /// - 无法解析：警告并使用内存中的默认值
    pub fn load_table(&self) -> Result<Table> {
        let defaults = Self::defaults()?;

        let Some(raw) = self.backend.load()? else {
            info!("config not found, creating defaults at {}", self.location());
            self.backend.save(&toml::to_string_pretty(&defaults)?)?;
            return Ok(defaults);
        };

        let mut table = match toml::from_str::<Table>(&raw) {
            Ok(t) => t,
            Err(e) => {
                warn!("error reading config {}: {e}; using defaults", self.location());
                return Ok(defaults);
            }
        };

        if merge_defaults(&mut table, &defaults) {
            self.backend.save(&toml::to_string_pretty(&table)?)?;
        }
        Ok(table)
    }

    /// 读取单个键，统一以字符串形式返回
    pub fn get(&self, section: &str, key: &str) -> Result<Option<String>> {
        let table = self.load_table()?;
        Ok(table
            .get(section)
            .and_then(Value::as_table)
            .and_then(|s| s.get(key))
            .map(value_to_string))
    }

    /// 写入单个键并保存；值与现有值相同时不写盘
    pub fn set(&self, section: &str, key: &str, value: &str) -> Result<()> {
        let mut table = self.load_table()?;
        let entry = table
            .entry(section.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        let Value::Table(section_table) = entry else {
            return Err(Error::ConfigValue {
                section: section.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                reason: "section is not a table".to_string(),
            });
        };

        if section == SETTINGS && !SETTINGS_KEYS.contains(&key) {
            warn!("[{SETTINGS}] has no setting named '{key}', storing it anyway");
        }

        let coerced = coerce_value(section_table.get(key), value).map_err(|reason| Error::ConfigValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason,
        })?;

        if section_table.get(key) == Some(&coerced) {
            debug!("[{section}] {key} already set to {value}");
            return Ok(());
        }

        section_table.insert(key.to_string(), coerced);
        self.backend.save(&toml::to_string_pretty(&table)?)?;
        info!("setting [{section}] {key} = {value} saved");
        Ok(())
    }

    /// 解析为类型化的 AppConfig；类型不符时警告并使用默认值
    pub fn settings(&self) -> Result<AppConfig> {
        let file: ConfigFile = match Value::Table(self.load_table()?).try_into() {
            Ok(f) => f,
            Err(e) => {
                warn!("invalid values in config {}: {e}; using defaults", self.location());
                ConfigFile::default()
            }
        };
        let last_update_date = match file.state.last_update_date.trim() {
            "" => None,
            s => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("ignoring malformed last_update_date '{s}': {e}");
                    None
                }
            },
        };
        let installed_appimage_path = match file.state.installed_appimage_path.trim() {
            "" => None,
            s => Some(PathBuf::from(s)),
        };
        Ok(AppConfig {
            enabled: file.settings.enabled,
            region: file.settings.region,
            keep_history: file.settings.keep_history as usize,
            wallpaper_dir: expand_path(&file.settings.wallpaper_dir, &self.home),
            last_update_date,
            installed_appimage_path,
        })
    }

    /// 删除配置文件，文件本就不存在也视为成功
    pub fn delete(&self) -> Result<()> {
        if self.backend.delete()? {
            info!("deleted config {}", self.location());
        } else {
            warn!("config {} already doesn't exist", self.location());
        }
        Ok(())
    }

    /// 当前完整配置的 TOML 文本
    pub fn dump(&self) -> Result<String> {
        Ok(toml::to_string_pretty(&self.load_table()?)?)
    }
}

/// 获取配置文件的 JSON Schema
pub fn schema() -> Result<String> {
    let schema = schemars::schema_for!(ConfigFile);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// 把 defaults 中缺失的节与键补进 table，返回是否有改动
fn merge_defaults(table: &mut Table, defaults: &Table) -> bool {
    let mut changed = false;
    for (section, default_value) in defaults {
        let Value::Table(default_keys) = default_value else {
            continue;
        };
        match table.get_mut(section) {
            Some(Value::Table(existing)) => {
                for (key, value) in default_keys {
                    if !existing.contains_key(key) {
                        info!("added missing key '{key}' to section [{section}]");
                        existing.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
            }
            _ => {
                info!("added missing section [{section}]");
                table.insert(section.clone(), default_value.clone());
                changed = true;
            }
        }
    }
    changed
}

/// 按已有值的类型把字符串转换为 TOML 值
fn coerce_value(existing: Option<&Value>, raw: &str) -> std::result::Result<Value, String> {
    match existing {
        Some(Value::Boolean(_)) => parse_bool(raw)
            .map(Value::Boolean)
            .ok_or_else(|| "expected a boolean".to_string()),
        Some(Value::Integer(_)) => raw
            .trim()
            .parse::<u32>()
            .map(|n| Value::Integer(i64::from(n)))
            .map_err(|_| format!("expected an integer between 0 and {}", u32::MAX)),
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 让测试能在 store 之外观察内存后端
    type Shared = Arc<MemoryBackend>;

    fn store() -> (ConfigStore, Shared) {
        let shared = Shared::default();
        (ConfigStore::new(shared.clone(), "/home/test"), shared)
    }

    #[test]
    fn first_load_writes_defaults() {
        let (store, backend) = store();
        let cfg = store.settings().unwrap();
        assert!(!cfg.enabled);
        assert_eq!(cfg.region, "en-US");
        assert_eq!(cfg.keep_history, 7);
        assert_eq!(
            cfg.wallpaper_dir,
            expand_path("~/Pictures/wallpapers", Path::new("/home/test"))
        );
        assert!(cfg.last_update_date.is_none());
        assert!(cfg.installed_appimage_path.is_none());
        let saved = backend.snapshot().unwrap();
        assert!(saved.contains("[Settings]"));
        assert!(saved.contains("[State]"));
    }

    #[test]
    fn missing_keys_are_merged_and_saved() {
        let backend = MemoryBackend::with_contents("[Settings]\nregion = \"de-DE\"\n");
        let shared = Arc::new(backend);
        let store = ConfigStore::new(shared.clone(), "/home/test");

        let cfg = store.settings().unwrap();
        assert_eq!(cfg.region, "de-DE");
        assert_eq!(cfg.keep_history, 7);

        let saved = shared.snapshot().unwrap();
        assert!(saved.contains("keep_history = 7"));
        assert!(saved.contains("[State]"));
        assert!(saved.contains("region = \"de-DE\""));
    }

    #[test]
    fn set_then_get_round_trips_string_values() {
        let (store, _) = store();
        store.set(STATE, KEY_INSTALLED_PATH, "/opt/ChromaDesk.AppImage").unwrap();
        assert_eq!(
            store.get(STATE, KEY_INSTALLED_PATH).unwrap().as_deref(),
            Some("/opt/ChromaDesk.AppImage")
        );
        let cfg = store.settings().unwrap();
        assert_eq!(cfg.installed_appimage_path, Some(PathBuf::from("/opt/ChromaDesk.AppImage")));
    }

    #[test]
    fn set_is_idempotent() {
        let (store, backend) = store();
        store.set(SETTINGS, KEY_REGION, "ja-JP").unwrap();
        let writes = backend.write_count();
        store.set(SETTINGS, KEY_REGION, "ja-JP").unwrap();
        assert_eq!(backend.write_count(), writes);
    }

    #[test]
    fn set_coerces_known_types() {
        let (store, _) = store();
        store.set(SETTINGS, KEY_ENABLED, "True").unwrap();
        store.set(SETTINGS, KEY_KEEP_HISTORY, "12").unwrap();
        let cfg = store.settings().unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.keep_history, 12);
        assert_eq!(store.get(SETTINGS, KEY_ENABLED).unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn set_rejects_bad_typed_values_without_writing() {
        let (store, backend) = store();
        store.load_table().unwrap();
        let before = backend.snapshot();
        let err = store.set(SETTINGS, KEY_KEEP_HISTORY, "many").unwrap_err();
        assert!(matches!(err, Error::ConfigValue { .. }));
        assert!(store.set(SETTINGS, KEY_ENABLED, "maybe").is_err());
        assert_eq!(backend.snapshot(), before);
    }

    #[test]
    fn unknown_keys_are_stored_as_strings() {
        let (store, _) = store();
        store.set("Extra", "colour", "blue").unwrap();
        assert_eq!(store.get("Extra", "colour").unwrap().as_deref(), Some("blue"));
        assert_eq!(store.get("Extra", "missing").unwrap(), None);
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let backend = MemoryBackend::with_contents("this is = = not toml");
        let store = ConfigStore::new(backend, "/home/test");
        let cfg = store.settings().unwrap();
        assert_eq!(cfg.region, "en-US");
    }

    #[test]
    fn malformed_last_update_is_ignored() {
        let backend = MemoryBackend::with_contents("[State]\nlast_update_date = \"yesterday\"\n");
        let store = ConfigStore::new(backend, "/home/test");
        assert!(store.settings().unwrap().last_update_date.is_none());
    }

    #[test]
    fn delete_tolerates_missing_store() {
        let (store, backend) = store();
        store.delete().unwrap();
        store.load_table().unwrap();
        store.delete().unwrap();
        assert!(backend.snapshot().is_none());
    }

    #[test]
    fn file_backend_persists_between_stores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        ConfigStore::open_file(&path, dir.path())
            .set(SETTINGS, KEY_REGION, "fr-FR")
            .unwrap();
        let reopened = ConfigStore::open_file(&path, dir.path());
        assert_eq!(reopened.settings().unwrap().region, "fr-FR");
    }

    #[test]
    fn relative_wallpaper_dir_is_under_home() {
        let backend = MemoryBackend::with_contents("[Settings]\nwallpaper_dir = \"Walls\"\n");
        let store = ConfigStore::new(backend, "/home/test");
        assert_eq!(store.settings().unwrap().wallpaper_dir, PathBuf::from("/home/test/Walls"));
    }

    #[test]
    fn env_vars_in_wallpaper_dir_are_expanded() {
        // SAFETY: 变量名只在本测试中使用
        unsafe { std::env::set_var("CHROMADESK_TEST_WALLS", "/srv/walls") };
        let backend =
            MemoryBackend::with_contents("[Settings]\nwallpaper_dir = \"$CHROMADESK_TEST_WALLS/daily\"\n");
        let store = ConfigStore::new(backend, "/home/test");
        assert_eq!(store.settings().unwrap().wallpaper_dir, PathBuf::from("/srv/walls/daily"));
    }

    #[test]
    fn undefined_env_var_keeps_raw_path() {
        let backend = MemoryBackend::with_contents(
            "[Settings]\nwallpaper_dir = \"/data/$CHROMADESK_TEST_UNSET_VAR\"\n",
        );
        let store = ConfigStore::new(backend, "/home/test");
        assert_eq!(
            store.settings().unwrap().wallpaper_dir,
            PathBuf::from("/data/$CHROMADESK_TEST_UNSET_VAR")
        );
    }

    #[test]
    fn keep_history_must_fit_u32() {
        let (store, backend) = store();
        store.load_table().unwrap();
        let before = backend.snapshot();
        assert!(store.set(SETTINGS, KEY_KEEP_HISTORY, "5000000000").is_err());
        assert!(store.set(SETTINGS, KEY_KEEP_HISTORY, "-1").is_err());
        assert_eq!(backend.snapshot(), before);
        assert_eq!(store.settings().unwrap().keep_history, 7);
    }

    #[test]
    fn out_of_range_values_in_file_fall_back_to_defaults() {
        let backend = MemoryBackend::with_contents(
            "[Settings]\nenabled = true\nkeep_history = 5000000000\n",
        );
        let store = ConfigStore::new(backend, "/home/test");
        let cfg = store.settings().unwrap();
        assert_eq!(cfg.keep_history, 7);
        assert!(!cfg.enabled);
    }

    #[test]
    fn schema_mentions_sections() {
        let s = schema().unwrap();
        assert!(s.contains("Settings"));
        assert!(s.contains("keep_history"));
    }
}
