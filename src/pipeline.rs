//! 帳票生成の一連の処理
//!
//! 入力検証 → テンプレート解決 → 中間評価データ読み込み → AI抽出
//! → 手入力値で上書き → ファイル名決定 → Excel書き込み

use crate::ai::media::is_spreadsheet;
use crate::ai::{ExtractionRequest, UploadedInput};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::export::fill_template;
use crate::interim::read_interim_data;
use crate::state::AppState;
use std::path::{Path, PathBuf};
use welfare_record_common::{output_file_name, resolve_overrides, ManualOverrides, TemplateDefinition};

/// 帳票生成リクエスト
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    pub template_id: String,
    pub text_input: Option<String>,
    pub overrides: ManualOverrides,
    pub files: Vec<UploadedInput>,
}

impl ProcessRequest {
    /// AIに渡すテキスト（入力テキスト + 手入力の基本情報）
    pub fn full_text(&self) -> String {
        let mut text = self.text_input.clone().unwrap_or_default();
        text.push_str(&self.overrides.prompt_block());
        text
    }
}

/// 帳票を生成し、出力ファイル名を返す
pub async fn process(state: &AppState, request: &ProcessRequest, request_id: &str) -> Result<String> {
    let template = state
        .registry()
        .get(&request.template_id)
        .ok_or_else(|| AppError::InvalidTemplate(request.template_id.clone()))?;

    let text = request.full_text();
    if text.trim().is_empty() && request.files.is_empty() {
        return Err(AppError::NoInput);
    }

    let template_path = resolve_template_path(state.config(), template)?;
    let extractor = state.extractor().ok_or(AppError::MissingApiKey)?;

    let interim = if template.reads_interim {
        load_interim(&request.files).await
    } else {
        None
    };

    tracing::info!(
        request_id,
        template = %template.id,
        files = request.files.len(),
        interim = interim.is_some(),
        "帳票生成開始"
    );

    let extraction = ExtractionRequest {
        template: template.clone(),
        interim,
        text: Some(text).filter(|t| !t.trim().is_empty()),
        files: request.files.clone(),
    };
    let extracted = extractor.extract(&extraction, request_id).await?;
    tracing::debug!(request_id, fields = extracted.len(), "AI抽出完了");

    let resolved = resolve_overrides(extracted, &request.overrides, &template.alias_table());
    let output_name = output_file_name(
        chrono::Local::now().date_naive(),
        &template.name,
        &resolved,
    );

    let output_dir = state.config().output_dir.clone();
    let definition = template.clone();
    tokio::task::spawn_blocking(move || {
        fill_template(&template_path, &output_dir, &resolved, &definition, &output_name)
    })
    .await
    .map_err(|e| AppError::Write(format!("書き込みタスクが異常終了: {}", e)))?
}

/// テンプレートファイルの場所（設定のパス → テンプレートフォルダ内の同名ファイル）
pub fn resolve_template_path(config: &Config, template: &TemplateDefinition) -> Result<PathBuf> {
    let configured = Path::new(&template.filename);
    if configured.is_file() {
        return Ok(configured.to_path_buf());
    }

    if let Some(name) = configured.file_name() {
        let fallback = config.template_dir.join(name);
        if fallback.is_file() {
            return Ok(fallback);
        }
    }

    Err(AppError::TemplateNotFound(template.filename.clone()))
}

/// アップロードされたExcelのうち最初に読めたものの中間評価データ
async fn load_interim(files: &[UploadedInput]) -> Option<String> {
    for file in files.iter().filter(|f| is_spreadsheet(&f.path)) {
        let path = file.path.clone();
        let text = tokio::task::spawn_blocking(move || read_interim_data(&path))
            .await
            .unwrap_or_default();
        if !text.is_empty() {
            tracing::debug!(file = %file.display_name, "中間評価データを読み込み");
            return Some(text);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(filename: &str) -> TemplateDefinition {
        TemplateDefinition {
            id: "case_meeting".into(),
            name: "ケース会議".into(),
            filename: filename.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_text_includes_manual_block() {
        let mut request = ProcessRequest {
            text_input: Some("面談メモ".into()),
            ..Default::default()
        };
        assert_eq!(request.full_text(), "面談メモ");

        request.overrides.user_name = Some("山田".into());
        let text = request.full_text();
        assert!(text.starts_with("面談メモ"));
        assert!(text.contains("【基本情報"));
        assert!(text.contains("山田"));
    }

    #[test]
    fn test_resolve_template_path_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(dir.path());
        std::fs::create_dir_all(&config.template_dir).unwrap();
        std::fs::write(config.template_dir.join("case.xlsx"), b"PK").unwrap();

        let path = resolve_template_path(&config, &definition("elsewhere/case.xlsx")).unwrap();
        assert_eq!(path, config.template_dir.join("case.xlsx"));

        let direct = dir.path().join("direct.xlsx");
        std::fs::write(&direct, b"PK").unwrap();
        let path = resolve_template_path(&config, &definition(direct.to_str().unwrap())).unwrap();
        assert_eq!(path, direct);
    }

    #[test]
    fn test_resolve_template_path_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(dir.path());
        let result = resolve_template_path(&config, &definition("template/none.xlsx"));
        assert!(matches!(result, Err(AppError::TemplateNotFound(_))));
    }
}
