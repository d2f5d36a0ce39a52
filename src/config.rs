use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_STATS_URL: &str = "https://www.worldometers.info/coronavirus/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("not correct format config: {0}")]
    Format(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,

    /// 技能请求的路径, POST /{route}
    pub route: String,

    /// 统计数据页面
    pub stats_url: String,

    /// 统计表格的表头文本, 比较时忽略空白和大小写
    pub header_marker: String,

    /// 不设置时使用传输层默认值
    pub request_timeout_secs: Option<u64>,

    pub verification: Verification,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            route: "skill".to_string(),
            stats_url: DEFAULT_STATS_URL.to_string(),
            header_marker: "Country,Other".to_string(),
            request_timeout_secs: None,
            verification: Verification::default(),
        }
    }
}

/// 请求来源校验
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Verification {
    pub enabled: bool,
    pub timestamp_tolerance_secs: i64,
    /// 设置后只接受该技能id的请求
    pub application_id: Option<String>,
}

impl Default for Verification {
    fn default() -> Self {
        Verification {
            enabled: true,
            timestamp_tolerance_secs: 150,
            application_id: None,
        }
    }
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

pub fn parse(text: &str) -> Result<Config, ConfigError> {
    Ok(serde_yaml::from_str::<Config>(text)?)
}
