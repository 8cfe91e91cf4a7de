use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::layout::{OverflowPolicy, TileOptions, TwoPlayerSplit};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub tiler: TilerConfig,
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Класс приложения (WM_CLASS / resourceClass), окна которого раскладываем
    pub class: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutConfig {
    /// Что делать, если окон больше четырёх
    pub overflow: OverflowPolicy,
    /// Деление экрана для двух окон: side_by_side или stacked
    #[serde(default)]
    pub two_player: TwoPlayerSplit,
    pub disable_borders: bool,
}

impl LayoutConfig {
    pub fn tile_options(&self) -> TileOptions {
        TileOptions {
            overflow: self.overflow,
            two_player: self.two_player,
            disable_borders: self.disable_borders,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TilerConfig {
    /// Разложить окна сразу после запуска, не дожидаясь первого события
    #[serde(default)]
    pub retile_on_start: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    pub backend: String,
    #[serde(default)]
    pub display: Option<String>,
    pub kwin_script_path: PathBuf,
    pub kwin_plugin_name: String,
    pub simulation_interval_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            class: "gamescope".to_string(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            overflow: OverflowPolicy::TileFirst,
            two_player: TwoPlayerSplit::SideBySide,
            disable_borders: true,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            backend: "x11".to_string(),
            display: None,
            kwin_script_path: std::env::temp_dir().join("gamescope-tiler-kwin.js"),
            kwin_plugin_name: "splitscreen".to_string(),
            simulation_interval_ms: 3000,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("GSTILER_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.target.class.trim().is_empty() {
            anyhow::bail!("target.class не может быть пустым");
        }

        match self.host.backend.as_str() {
            "x11" | "kwin" => {}
            _ => anyhow::bail!("Неизвестный backend хоста: {}", self.host.backend),
        }

        if self.host.kwin_plugin_name.is_empty() {
            anyhow::bail!("host.kwin_plugin_name не может быть пустым");
        }

        if self.host.simulation_interval_ms < 100 {
            anyhow::bail!("simulation_interval_ms должно быть минимум 100");
        }

        Ok(())
    }
}
