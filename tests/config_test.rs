//! 同梱設定ファイルのテスト
//!
//! config/mapping_config.json が読み込め、全帳票のセル座標が正しいか検証

use std::path::Path;
use welfare_record_common::{OverrideKey, TemplateRegistry};

fn shipped_registry() -> TemplateRegistry {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/mapping_config.json");
    TemplateRegistry::from_file(&path).expect("設定ファイルを読めない")
}

/// 3帳票が定義され、座標がすべて有効
#[test]
fn test_shipped_config_is_valid() {
    let registry = shipped_registry();
    registry.validate().expect("セル座標が不正");

    let ids: Vec<&str> = registry.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["monitoring_interim", "monitoring_final", "case_meeting"]);
}

/// 最終評価のみ中間評価データを読む
#[test]
fn test_only_final_reads_interim() {
    let registry = shipped_registry();
    let readers: Vec<&str> = registry
        .iter()
        .filter(|t| t.reads_interim)
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(readers, ["monitoring_final"]);
}

/// ケース会議では作成担当者が記録者欄にも入る
#[test]
fn test_case_meeting_aliases() {
    let registry = shipped_registry();
    let case_meeting = registry.get("case_meeting").expect("case_meeting がない");
    let aliases = case_meeting.alias_table();

    assert!(aliases.fields_for(OverrideKey::StaffName).contains(&"記録者".to_string()));
    assert!(aliases.fields_for(OverrideKey::UserName).contains(&"利用者様".to_string()));
    assert!(case_meeting.mapping.contains_key("開催日（令和〇年〇月〇日）"));
}

/// モニタリング帳票は目標3件分の欄を持つ
#[test]
fn test_monitoring_goal_fields() {
    let registry = shipped_registry();
    for id in ["monitoring_interim", "monitoring_final"] {
        let template = registry.get(id).expect("テンプレートがない");
        for n in 1..=3 {
            for prefix in ["達成目標", "達成状況", "未達成原因・分析", "今後の対応"] {
                let field = format!("{}{}", prefix, n);
                assert!(template.mapping.contains_key(&field), "{} に {} がない", id, field);
            }
        }
    }
}
