use crate::cli::{ServerArgs, DEFAULT_API_BASE_URL, DEFAULT_MODEL};
use crate::error::{AppError, Result};
use std::fmt;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// サーバー設定（起動時に一度だけ構築）
#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub mapping_config: PathBuf,
    pub template_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub static_dir: PathBuf,
    pub debug_dump_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_args(args: &ServerArgs) -> Self {
        Self {
            api_key: args.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: args.model.clone(),
            api_base_url: args.api_base_url.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
            host: args.host.clone(),
            port: args.port,
            mapping_config: args.mapping_config.clone(),
            template_dir: args.template_dir.clone(),
            temp_dir: args.temp_dir.clone(),
            output_dir: args.output_dir.clone(),
            static_dir: args.static_dir.clone(),
            debug_dump_dir: args.debug_dump_dir.clone(),
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
        }
    }

    /// 作業フォルダ一式を指定して構築（テスト・組み込み用）
    pub fn with_root(root: &std::path::Path) -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            username: "admin".into(),
            password: "password".into(),
            host: "127.0.0.1".into(),
            port: 8000,
            mapping_config: root.join("mapping_config.json"),
            template_dir: root.join("template"),
            temp_dir: root.join("temp"),
            output_dir: root.join("outputs"),
            static_dir: root.join("static"),
            debug_dump_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn get_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or(AppError::MissingApiKey)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 一時・出力フォルダを作成
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.temp_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        if let Some(dir) = &self.debug_dump_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "設定済み"))
            .field("model", &self.model)
            .field("username", &self.username)
            .field("bind", &self.bind_address())
            .field("mapping_config", &self.mapping_config)
            .field("template_dir", &self.template_dir)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}
