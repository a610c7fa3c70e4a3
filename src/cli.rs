use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Parser)]
#[command(name = "welfare-record")]
#[command(about = "障害福祉サービス記録AI入力・Excel帳票生成サーバー", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Webサーバーを起動（デフォルト）
    Serve,

    /// テンプレート設定を表示
    Templates {
        /// セル座標を検証
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Args, Clone, Debug)]
pub struct ServerArgs {
    /// 待ち受けアドレス
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// 待ち受けポート
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// テンプレート設定JSON
    #[arg(long, env = "MAPPING_CONFIG", default_value = "config/mapping_config.json")]
    pub mapping_config: PathBuf,

    /// テンプレートExcelの配置フォルダ
    #[arg(long, env = "TEMPLATE_DIR", default_value = "template")]
    pub template_dir: PathBuf,

    /// アップロード一時フォルダ
    #[arg(long, env = "TEMP_DIR", default_value = "temp")]
    pub temp_dir: PathBuf,

    /// 生成ファイルの出力フォルダ
    #[arg(long, env = "OUTPUT_DIR", default_value = "outputs")]
    pub output_dir: PathBuf,

    /// 静的ファイルフォルダ
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// アップロード上限（MB）
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "100")]
    pub max_upload_mb: usize,

    /// AIレスポンスをリクエスト単位で保存するフォルダ
    #[arg(long, env = "DEBUG_DUMP_DIR")]
    pub debug_dump_dir: Option<PathBuf>,

    /// Gemini APIキー
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Geminiモデル
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Gemini APIのベースURL
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// Basic認証ユーザー名
    #[arg(long, env = "APP_USERNAME", default_value = "admin")]
    pub username: String,

    /// Basic認証パスワード
    #[arg(long, env = "APP_PASSWORD", default_value = "password", hide_env_values = true)]
    pub password: String,
}
