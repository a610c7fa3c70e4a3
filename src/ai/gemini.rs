//! Gemini API連携
//!
//! 1リクエスト = 1回の `generateContent` 呼び出し。
//! パーツの送信順: 指示本文 → 中間評価データ → テキスト入力 → ファイル → 最終指示

use super::media::{is_spreadsheet, mime_type_for};
use super::{ExtractionRequest, FieldExtractor};
use crate::config::Config;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use welfare_record_common::{parse_field_mapping, FieldMapping};

const TEMPERATURE: f32 = 0.1;
const RESPONSE_MIME_TYPE: &str = "application/json";

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini APIクライアント
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    debug_dump_dir: Option<PathBuf>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: crate::cli::DEFAULT_API_BASE_URL.to_string(),
            debug_dump_dir: None,
        }
    }

    /// 設定から構築（APIキー未設定ならエラー）
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut client = Self::new(config.get_api_key()?, config.model.clone());
        client.base_url = config.api_base_url.trim_end_matches('/').to_string();
        client.debug_dump_dir = config.debug_dump_dir.clone();
        Ok(client)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    async fn build_request(&self, request: &ExtractionRequest) -> Result<GeminiRequest> {
        let (text_parts, final_instruction) = request.text_parts();
        let mut parts: Vec<Part> = text_parts.into_iter().map(|text| Part::Text { text }).collect();

        for file in &request.files {
            // Excelは中間評価データとしてテキスト化済み（インライン送信は非対応形式）
            if is_spreadsheet(&file.path) {
                tracing::debug!(file = %file.display_name, "Excelファイルはインライン送信しない");
                continue;
            }
            let bytes = tokio::fs::read(&file.path).await?;
            let mime_type = mime_type_for(&file.path);
            tracing::debug!(file = %file.display_name, mime = %mime_type, size = bytes.len(), "ファイル添付");
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type,
                    data: STANDARD.encode(&bytes),
                },
            });
        }

        parts.push(Part::Text {
            text: final_instruction.to_string(),
        });

        Ok(GeminiRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                response_mime_type: RESPONSE_MIME_TYPE,
            },
        })
    }

    async fn generate_content(&self, payload: &GeminiRequest) -> Result<String> {
        let res = self
            .client
            .post(self.endpoint())
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.without_url().to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| AppError::Upstream(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(AppError::Upstream(format!("status {}: {}", status, body)));
        }

        response_text(&body)
    }

    async fn dump_response(&self, request_id: &str, text: &str) {
        let Some(dir) = &self.debug_dump_dir else {
            return;
        };
        let path = dir.join(format!("{}.json", request_id));
        if let Err(e) = tokio::fs::write(&path, text).await {
            tracing::warn!(path = %path.display(), error = %e, "AIレスポンスの保存に失敗");
        }
    }
}

/// レスポンス本文から生成テキストを取り出す
fn response_text(body: &str) -> Result<String> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Upstream(format!("レスポンス形式が不正: {}", e)))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AppError::Upstream("AIレスポンスが空です".into()));
    }
    Ok(text)
}

#[async_trait]
impl FieldExtractor for GeminiClient {
    async fn extract(&self, request: &ExtractionRequest, request_id: &str) -> Result<FieldMapping> {
        let payload = self.build_request(request).await?;

        tracing::info!(
            request_id,
            model = %self.model,
            template = %request.template.id,
            files = request.files.len(),
            "Gemini API呼び出し"
        );

        let text = self.generate_content(&payload).await?;
        tracing::debug!(request_id, response = %text, "AIレスポンス");
        self.dump_response(request_id, &text).await;

        parse_field_mapping(&text).map_err(|e| {
            tracing::warn!(request_id, error = %e, "AIレスポンスの解釈に失敗");
            AppError::Unparseable(e.to_string())
        })
    }
}
