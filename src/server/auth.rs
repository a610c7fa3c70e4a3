//! HTTP Basic認証
//!
//! 全ルート共通。失敗時は 401 + `WWW-Authenticate: Basic`。

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

pub async fn require_basic_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = state.config();
    if credentials_match(request.headers(), &config.username, &config.password) {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "認証失敗");
    AppError::Unauthorized.into_response()
}

/// Authorization ヘッダーの資格情報が一致するか
pub fn credentials_match(headers: &HeaderMap, username: &str, password: &str) -> bool {
    let Some((user, pass)) = basic_credentials(headers) else {
        return false;
    };
    // 両方とも比較してから判定する
    let user_ok = constant_time_eq(&user, username);
    let pass_ok = constant_time_eq(&pass, password);
    user_ok & pass_ok
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// 長さの違いも含めて比較時間が入力に依存しないよう、ハッシュ同士を比較
fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
