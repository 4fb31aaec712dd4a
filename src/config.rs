use crate::error::{Result, ScanError};
use crate::poller::PollPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// エンドポイント上書き用の環境変数
pub const ENDPOINT_ENV: &str = "PE_SCAN_ENDPOINT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// バックエンドのベースURL
    pub endpoint: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub poll_timeout_secs: u64,
    /// 未設定ならHTTPクライアントの既定値
    pub request_timeout_secs: Option<u64>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".into(),
            poll_interval_secs: 15,
            max_poll_attempts: 40,
            poll_timeout_secs: 900,
            request_timeout_secs: None,
            log_level: "info".into(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// 読めない・壊れた設定ファイルでも既定値で続行する（`config` コマンドでの修復用）
    ///
    /// 読み込みに失敗した場合はそのエラーも返す。検証はしない。
    pub fn load_lenient() -> (Self, Option<ScanError>) {
        let (mut config, error) = match Self::config_path() {
            Ok(path) => Self::load_lenient_from(&path),
            Err(e) => (Self::default(), Some(e)),
        };
        config.apply_env();
        (config, error)
    }

    pub fn load_lenient_from(path: &Path) -> (Self, Option<ScanError>) {
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// 環境変数を優先
    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint.trim().to_string();
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ScanError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("pe-scan").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ScanError::Config(format!(
                "endpoint は http:// か https:// で始めてください: {}",
                self.endpoint
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ScanError::Config("poll_interval_secs は1以上にしてください".into()));
        }
        if self.poll_timeout_secs == 0 {
            return Err(ScanError::Config("poll_timeout_secs は1以上にしてください".into()));
        }
        if self.max_poll_attempts == 0 {
            return Err(ScanError::Config("max_poll_attempts は1以上にしてください".into()));
        }
        Ok(())
    }

    pub fn set_endpoint(&mut self, endpoint: String) -> Result<()> {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self.validate()?;
        self.save()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.max_poll_attempts,
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }
}
