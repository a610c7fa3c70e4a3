//! 帳票項目のAI抽出
//!
//! - `FieldExtractor`: 抽出処理の境界（テストではモックに差し替える）
//! - `GeminiClient`: Gemini API を使った実装

pub mod gemini;
pub mod media;

pub use gemini::GeminiClient;

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use welfare_record_common::{
    build_extraction_prompt, interim_block, text_input_block, FieldMapping, TemplateDefinition,
    FINAL_INSTRUCTION,
};

/// アップロードされた入力ファイル
#[derive(Debug, Clone)]
pub struct UploadedInput {
    /// 一時保存先
    pub path: PathBuf,
    /// 元のファイル名
    pub display_name: String,
}

/// 抽出リクエスト
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub template: TemplateDefinition,
    /// 中間評価データ（最終評価のみ）
    pub interim: Option<String>,
    /// テキスト入力（手入力の基本情報を含む）
    pub text: Option<String>,
    pub files: Vec<UploadedInput>,
}

impl ExtractionRequest {
    /// ファイル以外のテキストパートを送信順に並べる
    ///
    /// 戻り値は (ファイルより前のパート, 最終指示)
    pub fn text_parts(&self) -> (Vec<String>, &'static str) {
        let mut parts = vec![build_extraction_prompt(&self.template)];

        if let Some(interim) = self.interim.as_deref().filter(|s| !s.is_empty()) {
            parts.push(interim_block(interim));
        }
        if let Some(text) = self.text.as_deref().filter(|s| !s.is_empty()) {
            parts.push(text_input_block(text));
        }

        (parts, FINAL_INSTRUCTION)
    }
}

/// 帳票項目の抽出
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    /// 1回だけ呼び出す（リトライしない）
    async fn extract(&self, request: &ExtractionRequest, request_id: &str) -> Result<FieldMapping>;
}
