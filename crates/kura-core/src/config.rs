use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::anthropic::{AnthropicClient, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::Result;

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";

/// Kura 設定
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub anthropic: Option<AnthropicConfig>,
}

/// Anthropic API 設定
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AnthropicConfig {
    /// API キー（オプション、環境変数優先）
    pub api_key: Option<String>,
    /// API のベース URL（オプション、環境変数優先）
    pub base_url: Option<String>,
    /// 疎通確認に使うモデル
    pub model: Option<String>,
    /// HTTP タイムアウト（秒）
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// 設定ファイルのパスを取得
    pub fn config_path() -> Result<PathBuf> {
        let home = env::var("HOME")
            .map_err(|_| crate::Error::Config("HOME environment variable not set".into()))?;
        Ok(PathBuf::from(home).join(".kura").join("config.toml"))
    }

    /// 設定を読み込み
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスから設定を読み込み（存在しなければデフォルト）
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            crate::Error::Config(format!("Failed to parse config file: {}", e))
        })?;

        Ok(config)
    }

    /// 設定を保存
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // ディレクトリを作成
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                crate::Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::Error::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content).map_err(|e| {
            crate::Error::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Anthropic 設定を取得（なければ作成）
    pub fn anthropic_mut(&mut self) -> &mut AnthropicConfig {
        self.anthropic.get_or_insert_with(AnthropicConfig::default)
    }

    /// API キーを取得（環境変数優先）
    pub fn get_api_key(&self) -> Result<String> {
        env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.anthropic.as_ref().and_then(|a| a.api_key.clone()))
            .ok_or_else(|| {
                crate::Error::Config(format!("{} not found in environment or config", API_KEY_ENV))
            })
    }

    /// ベース URL を取得（環境変数優先）
    pub fn get_base_url(&self) -> String {
        env::var(BASE_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.anthropic.as_ref().and_then(|a| a.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// 疎通確認用のモデル名を取得
    pub fn get_model(&self) -> String {
        self.anthropic
            .as_ref()
            .and_then(|a| a.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn get_timeout(&self) -> Duration {
        let secs = self
            .anthropic
            .as_ref()
            .and_then(|a| a.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// AnthropicClient を作成
    pub fn create_client(&self) -> Result<AnthropicClient> {
        let api_key = self.get_api_key()?;
        AnthropicClient::new(&api_key, &self.get_base_url(), &self.get_model(), self.get_timeout())
    }
}

/// API キーを表示用にマスク
pub fn mask_secret(secret: &str) -> String {
    const MIN_VISIBLE_LEN: usize = 16;

    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < MIN_VISIBLE_LEN {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
