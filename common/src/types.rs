//! 共通の型定義

use indexmap::IndexMap;

/// AI抽出結果: 項目名 → 値
///
/// `None` はテンプレートの既定値を残すことを意味する。
pub type FieldMapping = IndexMap<String, Option<String>>;
