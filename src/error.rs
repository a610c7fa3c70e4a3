use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("AIクライアントが初期化されていません。GEMINI_API_KEY を設定してください")]
    MissingApiKey,

    #[error("テンプレートファイルが見つかりません: {0}")]
    TemplateNotFound(String),

    #[error("テンプレートIDが不正です: {0}")]
    InvalidTemplate(String),

    #[error("入力がありません（ファイルまたはテキストを指定してください）")]
    NoInput,

    #[error("フォームデータが不正: {0}")]
    Multipart(String),

    #[error("API呼び出しエラー: {0}")]
    Upstream(String),

    #[error("AIレスポンスを解釈できません: {0}")]
    Unparseable(String),

    #[error("Excel生成エラー: {0}")]
    Write(String),

    #[error("ファイルが見つかりません: {0}")]
    NotFound(String),

    #[error("認証に失敗しました")]
    Unauthorized,

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] welfare_record_common::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidTemplate(_) | AppError::NoInput | AppError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::MissingApiKey
            | AppError::TemplateNotFound(_)
            | AppError::Upstream(_)
            | AppError::Unparseable(_)
            | AppError::Write(_)
            | AppError::JsonParse(_)
            | AppError::Io(_)
            | AppError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "detail": self.to_string() }));

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Basic")], body).into_response();
        }
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
