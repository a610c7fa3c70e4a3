//! Webサーバー
//!
//! - GET  /                     操作画面
//! - GET  /templates            テンプレート一覧
//! - POST /process              帳票生成（multipart）
//! - GET  /download/:filename   生成ファイルのダウンロード
//! - /static/*                  静的ファイル
//!
//! 全ルートBasic認証。

pub mod auth;
pub mod cleanup;
pub mod handlers;

use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tracing::Instrument;

/// リクエストごとの識別子（ログ・デバッグ出力の紐付け用）
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub fn router(state: AppState) -> Router {
    let static_dir = state.config().static_dir.clone();
    let body_limit = state.config().max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/templates", get(handlers::templates))
        .route("/process", post(handlers::process))
        .route("/download/:filename", get(handlers::download))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ))
        .layer(middleware::from_fn(request_context))
        .with_state(state)
}

/// リクエストIDを払い出し、以降のログをスパンで括る
async fn request_context(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    request.extensions_mut().insert(RequestId(request_id));

    async move {
        let response = next.run(request).await;
        tracing::debug!(status = %response.status(), "応答");
        response
    }
    .instrument(span)
    .await
}

/// 待ち受け開始（Ctrl+C で終了）
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let address = state.config().bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "サーバー起動");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("終了します");
        })
        .await
}
