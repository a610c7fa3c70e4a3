//! APIレスポンスパーサー
//!
//! AIのレスポンスからコードフェンスを除去し、
//! 項目名 → 値 のJSONオブジェクトとして解釈する

use crate::error::{Error, Result};
use crate::types::FieldMapping;
use serde_json::Value;

/// 配列値を連結する区切り
const ARRAY_SEPARATOR: &str = "、";

/// Markdownのコードフェンスを除去
///
/// ```` ```json ```` / ```` ``` ```` で始まり ```` ``` ```` で終わる場合のみ除去する。
///
/// # Examples
/// ```
/// use welfare_record_common::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
/// ```
pub fn strip_code_fence(response: &str) -> &str {
    let mut text = response.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// 抽出レスポンスをパース
///
/// # Returns
/// * `Ok(FieldMapping)` - パース成功（キーはAIが返した順）
/// * `Err(Error::Parse)` - JSONでない、またはオブジェクトでない場合
pub fn parse_field_mapping(response: &str) -> Result<FieldMapping> {
    let json_str = strip_code_fence(response);
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| Error::Parse(format!("AIレスポンスを解釈できません: {}", e)))?;

    let Value::Object(object) = value else {
        return Err(Error::Parse(
            "AIレスポンスを解釈できません: JSONオブジェクトではありません".into(),
        ));
    };

    Ok(object
        .into_iter()
        .map(|(key, value)| (key, value_to_text(value)))
        .collect())
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(value_to_text).collect();
            Some(parts.join(ARRAY_SEPARATOR))
        }
        object @ Value::Object(_) => Some(object.to_string()),
    }
}
