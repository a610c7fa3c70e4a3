//! Welfare Record
//!
//! 障害福祉サービスの記録（音声・画像・PDF・テキスト）からAIで帳票項目を抽出し、
//! Excelテンプレートに書き込むWebサーバー

pub mod ai;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod interim;
pub mod pipeline;
pub mod server;
pub mod state;

pub use error::{AppError, Result};
pub use state::AppState;
