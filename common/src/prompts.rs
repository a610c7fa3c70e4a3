//! プロンプト生成モジュール
//!
//! 帳票項目抽出用のプロンプトを組み立てる:
//! - build_extraction_prompt: 指示本文（役割・項目一覧・出力規則）
//! - interim_block / text_input_block: 入力データ部分
//! - FINAL_INSTRUCTION: 最後に付ける指示
//!
//! 送信順は「指示本文 → 中間評価データ → テキスト入力 → ファイル → 最終指示」。

use crate::template::TemplateDefinition;

/// チェック欄を表す項目名の目印
pub const CHECK_MARKER: &str = "_チェック";

/// チェック欄に入れる記号
pub const CHECK_GLYPH: &str = "✓";

/// 最後に付ける指示
pub const FINAL_INSTRUCTION: &str = "\nExtract the information and map it to the JSON structure.";

/// 指示本文を生成
///
/// 項目名のみを列挙し、セル座標はAIに渡さない。
///
/// # Arguments
/// * `template` - 対象帳票のテンプレート定義
pub fn build_extraction_prompt(template: &TemplateDefinition) -> String {
    let field_list = template
        .field_names()
        .map(|name| format!("- {}", name))
        .collect::<Vec<_>>()
        .join("\n");

    let context = template
        .context
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("\n\n--- Document Context ---\n{}\n------------------------\n", c))
        .unwrap_or_default();

    let style = template
        .style_instruction
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            format!(
                "\n\n--- Writing Style & Formatting Rules ---\n{}\n----------------------------------------\n",
                s
            )
        })
        .unwrap_or_default();

    format!(
        r#"You are an expert welfare record assistant specializing in Japanese disability welfare services (障害福祉サービス). Your task is to understand the provided audio/images/text and extract relevant information for official documentation.
{context}
You will receive:
1. A list of target fields to extract.
2. Input data (Audio, PDF, Images, or Text).

Instructions:
- Thoroughly analyze ALL input data to understand the context and meaning.
- Extract information that semantically matches each target field, even if exact wording differs.
- Map the extracted information to the following target fields:
{field_list}
{style}
- Return ONLY a valid JSON object where keys are the EXACT Field Names provided above and values are the extracted content.
- IMPORTANT: Use the field names exactly as listed above as your JSON keys. Do NOT use any other format.
- If a key contains '{CHECK_MARKER}' (underscore check), output the string '{CHECK_GLYPH}' if the condition is true/present, otherwise leave it empty.
- If a piece of information is missing, leave the value as an empty string or null.
- Do not include markdown formatting (like ```json), just the raw JSON string.
"#
    )
}

/// 中間評価データ部分
pub fn interim_block(interim: &str) -> String {
    format!(
        "--- 中間評価時のデータ (Interim Monitoring Data) ---\n{}\n--- 中間評価データここまで ---\n",
        interim
    )
}

/// テキスト入力部分
pub fn text_input_block(text: &str) -> String {
    format!("--- Input Data (Text) ---\n{}\n", text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn template(context: Option<&str>, style: Option<&str>) -> TemplateDefinition {
        let mut mapping = IndexMap::new();
        mapping.insert("利用者氏名".to_string(), "C3".to_string());
        mapping.insert("達成状況1_達成_チェック".to_string(), "E6".to_string());
        mapping.insert("その他の気づき".to_string(), "別紙!A22".to_string());

        TemplateDefinition {
            id: "monitoring_interim".into(),
            name: "モニタリング（中間）".into(),
            filename: "template/monitoring.xlsx".into(),
            mapping,
            context: context.map(String::from),
            style_instruction: style.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_prompt_lists_field_names_in_order() {
        let prompt = build_extraction_prompt(&template(None, None));
        let first = prompt.find("- 利用者氏名").unwrap();
        let second = prompt.find("- 達成状況1_達成_チェック").unwrap();
        let third = prompt.find("- その他の気づき").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_prompt_never_contains_cell_addresses() {
        let prompt = build_extraction_prompt(&template(None, None));
        assert!(!prompt.contains("C3"));
        assert!(!prompt.contains("別紙!A22"));
    }

    #[test]
    fn test_prompt_check_convention() {
        let prompt = build_extraction_prompt(&template(None, None));
        assert!(prompt.contains("'_チェック'"));
        assert!(prompt.contains("'✓'"));
        assert!(prompt.contains("valid JSON object"));
    }

    #[test]
    fn test_prompt_context_and_style_blocks() {
        let prompt = build_extraction_prompt(&template(Some("中間評価の記録"), Some("です・ます調")));
        assert!(prompt.contains("--- Document Context ---\n中間評価の記録"));
        assert!(prompt.contains("--- Writing Style & Formatting Rules ---\nです・ます調"));
    }

    #[test]
    fn test_prompt_omits_empty_blocks() {
        let prompt = build_extraction_prompt(&template(Some("  "), None));
        assert!(!prompt.contains("Document Context"));
        assert!(!prompt.contains("Writing Style"));
    }

    #[test]
    fn test_input_blocks() {
        assert!(interim_block("達成目標: 外出").contains("Interim Monitoring Data"));
        assert_eq!(
            text_input_block("本日の面談"),
            "--- Input Data (Text) ---\n本日の面談\n"
        );
    }
}
