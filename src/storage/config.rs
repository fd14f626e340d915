//! 配置文件管理模块

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 覆盖数据库路径的环境变量
pub const ENV_DATABASE: &str = "REGISTRAR_DATABASE";
/// 开启语句日志的环境变量（"1"/"true"/"yes"）
pub const ENV_VERBOSE: &str = "REGISTRAR_VERBOSE";

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    /// SQLite 数据库文件路径
    pub database: PathBuf,
    /// 是否记录每条执行的语句
    pub verbose: bool,
    /// 排行榜默认条数
    pub default_limit: usize,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            database: default_data_dir().join("registrar.db"),
            verbose: false,
            default_limit: 10,
        }
    }
}

impl RegistrarConfig {
    /// 应用环境变量覆盖
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_DATABASE).ok(),
            std::env::var(ENV_VERBOSE).ok(),
        )
    }

    fn with_overrides(mut self, database: Option<String>, verbose: Option<String>) -> Self {
        if let Some(path) = database.filter(|p| !p.trim().is_empty()) {
            self.database = PathBuf::from(path);
        }
        if let Some(flag) = verbose {
            self.verbose = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        self
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("edu", "registrar", "Registrar")
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 配置管理器
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// 获取默认配置路径
    pub fn default_path() -> PathBuf {
        project_dirs()
            .map(|d| d.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    /// 加载配置，文件不存在时使用默认值
    pub fn load(&self) -> Result<RegistrarConfig> {
        if self.config_path.exists() {
            let content = std::fs::read_to_string(&self.config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            tracing::debug!("配置文件不存在，使用默认配置: {}", self.config_path.display());
            Ok(RegistrarConfig::default())
        }
    }

    /// 保存配置
    pub fn save(&self, config: &RegistrarConfig) -> Result<()> {
        // 确保目录存在
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// 重置为默认配置
    pub fn reset(&self) -> Result<()> {
        self.save(&RegistrarConfig::default())
    }
}
