//! 出力ファイル名の生成
//!
//! `YY.MM.DD_帳票名【利用者名】.xlsx`

use crate::types::FieldMapping;
use chrono::NaiveDate;

/// 利用者名を探す項目（優先順）
const USER_NAME_FIELDS: &[&str] = &["氏名", "利用者名", "利用者様", "利用者氏名"];

/// 利用者名がない場合の代替項目
const FURIGANA_FIELD: &str = "氏名のふりがな";

/// 利用者名が見つからない場合
pub const UNNAMED_USER: &str = "名称未設定";

/// ファイル名に使う利用者名
pub fn display_user_name(mapping: &FieldMapping) -> &str {
    let lookup = |key: &str| {
        mapping
            .get(key)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.is_empty())
    };

    USER_NAME_FIELDS
        .iter()
        .find_map(|key| lookup(*key))
        .or_else(|| lookup(FURIGANA_FIELD))
        .unwrap_or(UNNAMED_USER)
}

/// 英数字（全角・漢字含む）、半角/全角スペース、`_`、`-` のみ残す
pub fn sanitize_user_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '　' | '_' | '-'))
        .collect()
}

/// 帳票名のパス区切りを置換
fn sanitize_template_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

/// 出力ファイル名を生成
pub fn output_file_name(date: NaiveDate, template_name: &str, mapping: &FieldMapping) -> String {
    format!(
        "{}_{}【{}】.xlsx",
        date.format("%y.%m.%d"),
        sanitize_template_name(template_name),
        sanitize_user_name(display_user_name(mapping))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, Option<&str>)]) -> FieldMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(String::from)))
            .collect()
    }

    #[test]
    fn test_display_user_name_priority() {
        let m = mapping(&[("利用者氏名", Some("田中")), ("氏名", Some("佐藤"))]);
        assert_eq!(display_user_name(&m), "佐藤");
    }

    #[test]
    fn test_display_user_name_skips_empty() {
        let m = mapping(&[("氏名", Some("")), ("利用者様", None), ("利用者氏名", Some("田中"))]);
        assert_eq!(display_user_name(&m), "田中");
    }

    #[test]
    fn test_display_user_name_furigana_fallback() {
        let m = mapping(&[("氏名のふりがな", Some("たなか"))]);
        assert_eq!(display_user_name(&m), "たなか");
        assert_eq!(display_user_name(&FieldMapping::new()), UNNAMED_USER);
    }

    #[test]
    fn test_sanitize_user_name() {
        assert_eq!(sanitize_user_name("田中 太郎/../"), "田中 太郎");
        assert_eq!(sanitize_user_name("山田　花子_2-b"), "山田　花子_2-b");
        assert_eq!(sanitize_user_name("a:b*c?"), "abc");
    }

    #[test]
    fn test_output_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 5, 20).unwrap();
        let m = mapping(&[("利用者氏名", Some("田中 太郎"))]);
        assert_eq!(
            output_file_name(date, "モニタリング（中間）", &m),
            "26.05.20_モニタリング（中間）【田中 太郎】.xlsx"
        );
    }

    #[test]
    fn test_output_file_name_template_separator() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let name = output_file_name(date, "会議/記録", &FieldMapping::new());
        assert_eq!(name, "26.01.02_会議_記録【名称未設定】.xlsx");
    }
}
