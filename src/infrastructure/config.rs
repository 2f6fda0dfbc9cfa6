//! 配置
//!
//! 两部分：
//! - 后端凭据、租户 id 与一次性登录令牌，来自环境注入，解析失败时降级为只读模式
//! - 服务进程自身的监听地址、超时与日志设置，来自 TOML 文件和环境变量覆盖

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::core::error::CoreError;

pub const ENV_BACKEND_CONFIG: &str = "MENU_BACKEND_CONFIG";
pub const ENV_APP_ID: &str = "MENU_APP_ID";
pub const ENV_INITIAL_AUTH_TOKEN: &str = "MENU_INITIAL_AUTH_TOKEN";

pub const DEFAULT_APP_ID: &str = "default-app-id";
pub const PLACEHOLDER_PROJECT_ID: &str = "placeholder-project";

/// 后端项目凭据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

impl BackendConfig {
    /// 不指向任何真实项目的占位配置
    pub fn placeholder() -> Self {
        Self {
            api_key: "placeholder-api-key".to_string(),
            auth_domain: format!("{PLACEHOLDER_PROJECT_ID}.example.invalid"),
            project_id: PLACEHOLDER_PROJECT_ID.to_string(),
            ..Self::default()
        }
    }

    /// 解析凭据，接受 JSON 对象或内容为 JSON 对象的 JSON 字符串
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("no backend credentials supplied".to_string());
        }

        let mut value: Value =
            serde_json::from_str(raw).map_err(|e| format!("credentials are not valid JSON: {e}"))?;
        if let Value::String(inner) = &value {
            value = serde_json::from_str(inner)
                .map_err(|e| format!("credentials string is not valid JSON: {e}"))?;
        }
        if !value.is_object() {
            return Err("credentials must be a JSON object".to_string());
        }

        let config: BackendConfig =
            serde_json::from_value(value).map_err(|e| format!("malformed credentials: {e}"))?;
        if config.project_id.trim().is_empty() {
            return Err("credentials are missing projectId".to_string());
        }
        Ok(config)
    }
}

/// 环境注入的原始值
#[derive(Debug, Clone, Default)]
pub struct EnvironmentInputs {
    pub backend_config: Option<String>,
    pub app_id: Option<String>,
    pub initial_auth_token: Option<String>,
}

impl EnvironmentInputs {
    pub fn from_env() -> Self {
        Self {
            backend_config: env_non_empty(ENV_BACKEND_CONFIG),
            app_id: env_non_empty(ENV_APP_ID),
            initial_auth_token: env_non_empty(ENV_INITIAL_AUTH_TOKEN),
        }
    }
}

/// 启动时解析出的配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub backend: BackendConfig,
    pub app_id: String,
    pub is_fallback: bool,
    pub fallback_reason: Option<String>,
    pub initial_auth_token: Option<String>,
}

impl ResolvedConfig {
    /// 从不失败：凭据不可用时使用占位配置并置 `is_fallback`
    pub fn resolve(inputs: &EnvironmentInputs) -> Self {
        let app_id = non_blank(inputs.app_id.as_deref())
            .unwrap_or(DEFAULT_APP_ID)
            .to_string();
        let initial_auth_token = non_blank(inputs.initial_auth_token.as_deref()).map(str::to_string);

        let parsed = match inputs.backend_config.as_deref() {
            Some(raw) => BackendConfig::parse(raw),
            None => Err("no backend credentials supplied".to_string()),
        };

        match parsed {
            Ok(backend) => {
                info!(project_id = %backend.project_id, app_id = %app_id, "backend configuration resolved");
                Self {
                    backend,
                    app_id,
                    is_fallback: false,
                    fallback_reason: None,
                    initial_auth_token,
                }
            }
            Err(reason) => {
                warn!(%reason, app_id = %app_id, "falling back to read-only placeholder configuration");
                Self {
                    backend: BackendConfig::placeholder(),
                    app_id,
                    is_fallback: true,
                    fallback_reason: Some(reason),
                    initial_auth_token,
                }
            }
        }
    }

    /// 需要真实后端的调用方使用（管理面板）
    pub fn require_backend(&self) -> Result<&BackendConfig, CoreError> {
        if self.is_fallback {
            let reason = self
                .fallback_reason
                .clone()
                .unwrap_or_else(|| "no backend credentials supplied".to_string());
            return Err(CoreError::Config(reason));
        }
        Ok(&self.backend)
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// 日志级别 (trace, debug, info, warn, error)，`RUST_LOG` 优先
    pub level: String,
    /// 设置后额外按天写入文件
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            file_prefix: "menu-board".to_string(),
        }
    }
}

/// 服务配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// 请求超时时间（秒）
    pub timeout_seconds: u64,
    /// 菜单空状态中指向管理面板的链接
    pub admin_url: String,
    pub log: LogSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            timeout_seconds: 30,
            admin_url: "/admin".to_string(),
            log: LogSettings::default(),
        }
    }
}

impl ServerConfig {
    /// 从配置文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::FileRead(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 按顺序查找配置文件，找不到则使用默认值；随后应用环境变量覆盖并校验
    pub fn load() -> Result<Self, ConfigError> {
        let config_paths = ["menu.toml", "./config/menu.toml"];

        let mut config = match config_paths.iter().find(|path| Path::new(path).exists()) {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(bind_address) = env_non_empty("MENU_BIND_ADDRESS") {
            self.bind_address = bind_address;
        }
        if let Some(port) = env_non_empty("MENU_PORT") {
            self.port = port
                .parse()
                .map_err(|e| ConfigError::Parse(format!("MENU_PORT: {e}")))?;
        }
        if let Some(admin_url) = env_non_empty("MENU_ADMIN_URL") {
            self.admin_url = admin_url;
        }
        if let Some(log_dir) = env_non_empty("MENU_LOG_DIR") {
            self.log.log_dir = Some(PathBuf::from(log_dir));
        }
        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation("bind_address must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Validation("port must be greater than 0".to_string()));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "invalid log level: {}, expected one of {:?}",
                self.log.level, valid_levels
            )));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Validation(String),
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn inputs(backend_config: Option<&str>) -> EnvironmentInputs {
        EnvironmentInputs {
            backend_config: backend_config.map(str::to_string),
            ..EnvironmentInputs::default()
        }
    }

    #[test]
    fn test_valid_credentials() {
        let resolved = ResolvedConfig::resolve(&EnvironmentInputs {
            backend_config: Some(r#"{"apiKey":"k","projectId":"menu-prod"}"#.to_string()),
            app_id: Some("bistro".to_string()),
            initial_auth_token: Some("  ".to_string()),
        });
        assert!(!resolved.is_fallback);
        assert_eq!(resolved.backend.project_id, "menu-prod");
        assert_eq!(resolved.app_id, "bistro");
        assert_eq!(resolved.initial_auth_token, None);
        assert!(resolved.require_backend().is_ok());
    }

    #[test]
    fn test_json_encoded_string_credentials() {
        let encoded = serde_json::to_string(r#"{"projectId":"menu-prod"}"#).unwrap();
        let resolved = ResolvedConfig::resolve(&inputs(Some(&encoded)));
        assert!(!resolved.is_fallback);
        assert_eq!(resolved.backend.project_id, "menu-prod");
    }

    #[test]
    fn test_malformed_or_missing_credentials_fall_back() {
        for raw in [
            None,
            Some(""),
            Some("not json"),
            Some("[1, 2]"),
            Some(r#""{broken""#),
            Some(r#"{"apiKey":"k"}"#),
            Some(r#"{"projectId":"   "}"#),
            Some(r#"{"projectId": 42}"#),
        ] {
            let resolved = ResolvedConfig::resolve(&inputs(raw));
            assert!(resolved.is_fallback, "expected fallback for {raw:?}");
            assert_eq!(resolved.backend, BackendConfig::placeholder());
            assert_eq!(resolved.app_id, DEFAULT_APP_ID);
            assert!(resolved.fallback_reason.is_some());
            assert!(matches!(
                resolved.require_backend(),
                Err(CoreError::Config(_))
            ));
        }
    }

    #[test]
    fn test_token_is_kept() {
        let resolved = ResolvedConfig::resolve(&EnvironmentInputs {
            initial_auth_token: Some("ct-123".to_string()),
            ..EnvironmentInputs::default()
        });
        assert_eq!(resolved.initial_auth_token.as_deref(), Some("ct-123"));
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr(), "127.0.0.1:8080");
        assert_eq!(config.admin_url, "/admin");
    }

    #[test]
    fn test_server_config_validation() {
        let mut config = ServerConfig::default();
        config.log.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_config_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("menu.toml");
        fs::write(
            &path,
            "port = 9090\nadmin_url = \"https://admin.example.com\"\n\n[log]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = ServerConfig::load_from_file(&path).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.admin_url, "https://admin.example.com");
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.bind_address, "127.0.0.1");
    }
}
