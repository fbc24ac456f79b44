use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::config::palette::ColorPalette;
use crate::display::{TimestampFormat, DEFAULT_TIMESTAMP_FORMAT};

pub mod palette;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Notepad";
const APP_NAME: &str = "notepad";

pub const DEFAULT_CATEGORY_NAME: &str = "Default";
pub const DEFAULT_CATEGORY_COLOR: u32 = 0xFF21_96F3;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub state_dir: PathBuf,
    pub widget_bindings: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("NOTEPAD_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("NOTEPAD_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        // An overridden data dir also holds the state dir.
        let state_dir = match &override_data {
            Some(root) => root.join("state"),
            None => project_dirs
                .state_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| project_dirs.data_dir().join("state")),
        };
        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());

        Ok(Self::rooted(config_dir, config_file, data_root, state_dir))
    }

    /// Lays out every derived path beneath one directory.
    pub fn under(root: &Path) -> Self {
        let config_dir = root.join("config");
        let config_file = config_dir.join("config.toml");
        Self::rooted(config_dir, config_file, root.join("data"), root.join("state"))
    }

    fn rooted(
        config_dir: PathBuf,
        config_file: PathBuf,
        data_dir: PathBuf,
        state_dir: PathBuf,
    ) -> Self {
        Self {
            database_path: data_dir.join("notes.db"),
            widget_bindings: state_dir.join("widgets.json"),
            config_dir,
            config_file,
            data_dir,
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageOptions,
    pub categories: CategoryOptions,
    pub display: DisplayOptions,
}

impl AppConfig {
    fn post_load(&mut self) {
        let name = self.categories.default_name.trim();
        if name.is_empty() {
            tracing::warn!("empty default category name in config, falling back to {DEFAULT_CATEGORY_NAME}");
            self.categories.default_name = DEFAULT_CATEGORY_NAME.to_string();
        } else if name.len() != self.categories.default_name.len() {
            self.categories.default_name = name.to_string();
        }
        if !ColorPalette::default().contains(self.categories.default_color) {
            tracing::warn!(
                color = %palette::format_color(self.categories.default_color),
                "default category color is not part of the palette"
            );
        }
        if TimestampFormat::parse(&self.display.timestamp_format).is_err() {
            tracing::warn!(
                format = %self.display.timestamp_format,
                "invalid timestamp format in config, falling back to default"
            );
            self.display.timestamp_format = DEFAULT_TIMESTAMP_FORMAT.to_string();
        }
        if self.display.summary_max_chars == 0 {
            self.display.summary_max_chars = DisplayOptions::default().summary_max_chars;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    pub wal_autocheckpoint: u32,
    /// How long a writer waits for the database lock before giving up.
    pub busy_timeout_ms: u64,
    pub sort_direction: SortDirection,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            wal_autocheckpoint: 1000,
            busy_timeout_ms: 2000,
            sort_direction: SortDirection::Descending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryOptions {
    /// Fallback category for new notes and for notes whose category is deleted.
    pub default_name: String,
    pub default_color: u32,
    /// Insert the stock categories when the database is first created.
    pub seed_defaults: bool,
}

impl Default for CategoryOptions {
    fn default() -> Self {
        Self {
            default_name: DEFAULT_CATEGORY_NAME.to_string(),
            default_color: DEFAULT_CATEGORY_COLOR,
            seed_defaults: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub timestamp_format: String,
    pub summary_max_chars: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            summary_max_chars: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Descending
    }
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_or_init_writes_defaults_then_reads_them_back() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::under(temp.path()));

        let first = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(first.categories.default_name, DEFAULT_CATEGORY_NAME);

        let second = loader.load()?;
        assert_eq!(second.storage.busy_timeout_ms, 2000);
        assert_eq!(second.storage.sort_direction, SortDirection::Descending);
        assert_eq!(second.display.summary_max_chars, 100);
        Ok(())
    }

    #[test]
    fn partial_config_keeps_section_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::under(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[storage]\nsort_direction = \"ascending\"\n\n[categories]\ndefault_name = \"  Inbox  \"\n",
        )?;

        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.storage.sort_direction, SortDirection::Ascending);
        assert_eq!(cfg.storage.wal_autocheckpoint, 1000);
        assert_eq!(cfg.categories.default_name, "Inbox");
        assert_eq!(cfg.categories.default_color, DEFAULT_CATEGORY_COLOR);
        Ok(())
    }

    #[test]
    fn invalid_values_fall_back() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::under(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[categories]\ndefault_name = \"   \"\n\n[display]\ntimestamp_format = \"[bogus\"\nsummary_max_chars = 0\n",
        )?;

        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.categories.default_name, DEFAULT_CATEGORY_NAME);
        assert_eq!(cfg.display.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
        assert_eq!(cfg.display.summary_max_chars, 100);
        Ok(())
    }

    #[test]
    fn paths_under_root_share_the_root() {
        let paths = ConfigPaths::under(Path::new("/tmp/np"));
        assert_eq!(paths.database_path, Path::new("/tmp/np/data/notes.db"));
        assert_eq!(paths.widget_bindings, Path::new("/tmp/np/state/widgets.json"));
        assert_eq!(paths.config_file, Path::new("/tmp/np/config/config.toml"));
    }
}
