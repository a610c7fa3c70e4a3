use super::cleanup::spawn_cleanup;
use super::RequestId;
use crate::ai::UploadedInput;
use crate::error::{AppError, Result};
use crate::pipeline::{self, ProcessRequest};
use crate::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use welfare_record_common::{OverrideKey, TemplateRegistry};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub filename: String,
}

/// 操作画面
pub async fn index(State(state): State<AppState>) -> Result<Html<String>> {
    let path = state.config().static_dir.join("index.html");
    let html = tokio::fs::read_to_string(&path)
        .await
        .map_err(|_| AppError::NotFound(path.display().to_string()))?;
    Ok(Html(html))
}

/// テンプレート一覧
pub async fn templates(State(state): State<AppState>) -> Json<TemplateRegistry> {
    Json(state.registry().clone())
}

/// 帳票生成
pub async fn process(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>> {
    let mut saved = Vec::new();
    let result = process_upload(&state, multipart, &request_id, &mut saved).await;

    // 成否にかかわらずアップロードファイルは消す
    spawn_cleanup(saved);

    match result {
        Ok(filename) => {
            tracing::info!(filename = %filename, "帳票生成完了");
            Ok(Json(ProcessResponse { filename }))
        }
        Err(e) => {
            tracing::error!(error = %e, "帳票生成に失敗");
            Err(e)
        }
    }
}

async fn process_upload(
    state: &AppState,
    mut multipart: Multipart,
    request_id: &str,
    saved: &mut Vec<PathBuf>,
) -> Result<String> {
    let mut request = ProcessRequest::default();
    let mut template_id = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "files" {
            let Some(display_name) = field.file_name().and_then(upload_basename) else {
                continue;
            };
            let path = state
                .config()
                .temp_dir
                .join(format!("{}_{}", uuid::Uuid::new_v4(), display_name));
            saved.push(path.clone());

            let mut file = tokio::fs::File::create(&path).await?;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| AppError::Multipart(e.to_string()))?
            {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            tracing::debug!(file = %display_name, "アップロード保存");
            request.files.push(UploadedInput { path, display_name });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::Multipart(e.to_string()))?;

        match name.as_str() {
            "template_id" => template_id = Some(value),
            "text_input" => request.text_input = Some(value),
            other => match OverrideKey::from_form_name(other) {
                Some(key) => request.overrides.set(key, value),
                None => tracing::debug!(field = other, "未知のフォーム項目を無視"),
            },
        }
    }

    request.template_id =
        template_id.ok_or_else(|| AppError::Multipart("template_id がありません".into()))?;

    pipeline::process(state, &request, request_id).await
}

/// クライアントが送ってきたファイル名からディレクトリ部分を除く
fn upload_basename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    (!base.is_empty() && base != "." && base != "..").then(|| base.to_string())
}

/// 生成ファイルのダウンロード（送信後に削除）
pub async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> Result<Response> {
    if !is_plain_file_name(&filename) {
        return Err(AppError::NotFound(filename));
    }

    let path = state.config().output_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(filename));
        }
        Err(e) => return Err(e.into()),
    };

    spawn_cleanup(vec![path]);
    tracing::info!(filename = %filename, size = bytes.len(), "ダウンロード");

    let disposition = HeaderValue::from_str(&content_disposition(&filename))
        .map_err(|e| AppError::Write(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_MIME)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// RFC 5987 形式（UTF-8ファイル名 + ASCII代替名）
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
