//! 手入力値の優先上書き
//!
//! 画面で手入力された基本情報（利用者名・日付・開催場所など）は、
//! AIの抽出結果より常に優先する。帳票ごとに項目名が異なるため、
//! 1つの入力値をエイリアス表に従って複数の項目名へ展開する。

use crate::era::format_era_date;
use crate::types::FieldMapping;
use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 手入力項目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKey {
    UserName,
    UserNameFurigana,
    StaffName,
    Date,
    Location,
    Time,
    Count,
    NextDate,
    CmServiceManager,
    CmLocation,
    CmTime,
    CmAttendees,
}

impl OverrideKey {
    /// プロンプトに載せる順
    pub const ALL: [OverrideKey; 12] = [
        OverrideKey::UserName,
        OverrideKey::UserNameFurigana,
        OverrideKey::StaffName,
        OverrideKey::Date,
        OverrideKey::Location,
        OverrideKey::Time,
        OverrideKey::Count,
        OverrideKey::NextDate,
        OverrideKey::CmServiceManager,
        OverrideKey::CmLocation,
        OverrideKey::CmTime,
        OverrideKey::CmAttendees,
    ];

    /// フォームのフィールド名
    pub fn form_name(&self) -> &'static str {
        match self {
            OverrideKey::UserName => "user_name",
            OverrideKey::UserNameFurigana => "user_name_furigana",
            OverrideKey::StaffName => "staff_name",
            OverrideKey::Date => "date",
            OverrideKey::Location => "location",
            OverrideKey::Time => "time",
            OverrideKey::Count => "count",
            OverrideKey::NextDate => "next_date",
            OverrideKey::CmServiceManager => "cm_service_manager",
            OverrideKey::CmLocation => "cm_location",
            OverrideKey::CmTime => "cm_time",
            OverrideKey::CmAttendees => "cm_attendees",
        }
    }

    pub fn from_form_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.form_name() == name)
    }

    /// プロンプト用ラベル
    fn label(&self) -> &'static str {
        match self {
            OverrideKey::UserName => "利用者名 (User Name)",
            OverrideKey::UserNameFurigana => "利用者名ふりがな (User Name Furigana)",
            OverrideKey::StaffName => "作成担当者 (Staff Name)",
            OverrideKey::Date => "日付 (Date)",
            OverrideKey::Location => "開催場所 (Location)",
            OverrideKey::Time => "時間 (Time)",
            OverrideKey::Count => "回数 (Count)",
            OverrideKey::NextDate => "次回予定 (Next Date)",
            OverrideKey::CmServiceManager => "サービス管理責任者 (Service Manager)",
            OverrideKey::CmLocation => "開催場所 (Location)",
            OverrideKey::CmTime => "開催時間 (Time)",
            OverrideKey::CmAttendees => "会議出席者 (Attendees)",
        }
    }
}

/// 画面から手入力された基本情報
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualOverrides {
    pub user_name: Option<String>,
    pub user_name_furigana: Option<String>,
    pub staff_name: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub time: Option<String>,
    pub count: Option<String>,
    pub next_date: Option<String>,
    pub cm_service_manager: Option<String>,
    pub cm_location: Option<String>,
    pub cm_time: Option<String>,
    pub cm_attendees: Option<String>,
}

impl ManualOverrides {
    fn slot(&self, key: OverrideKey) -> &Option<String> {
        match key {
            OverrideKey::UserName => &self.user_name,
            OverrideKey::UserNameFurigana => &self.user_name_furigana,
            OverrideKey::StaffName => &self.staff_name,
            OverrideKey::Date => &self.date,
            OverrideKey::Location => &self.location,
            OverrideKey::Time => &self.time,
            OverrideKey::Count => &self.count,
            OverrideKey::NextDate => &self.next_date,
            OverrideKey::CmServiceManager => &self.cm_service_manager,
            OverrideKey::CmLocation => &self.cm_location,
            OverrideKey::CmTime => &self.cm_time,
            OverrideKey::CmAttendees => &self.cm_attendees,
        }
    }

    fn slot_mut(&mut self, key: OverrideKey) -> &mut Option<String> {
        match key {
            OverrideKey::UserName => &mut self.user_name,
            OverrideKey::UserNameFurigana => &mut self.user_name_furigana,
            OverrideKey::StaffName => &mut self.staff_name,
            OverrideKey::Date => &mut self.date,
            OverrideKey::Location => &mut self.location,
            OverrideKey::Time => &mut self.time,
            OverrideKey::Count => &mut self.count,
            OverrideKey::NextDate => &mut self.next_date,
            OverrideKey::CmServiceManager => &mut self.cm_service_manager,
            OverrideKey::CmLocation => &mut self.cm_location,
            OverrideKey::CmTime => &mut self.cm_time,
            OverrideKey::CmAttendees => &mut self.cm_attendees,
        }
    }

    /// 値を設定（フォーム解析用）
    pub fn set(&mut self, key: OverrideKey, value: impl Into<String>) {
        *self.slot_mut(key) = Some(value.into());
    }

    /// 空白除去後に空でなければ入力値をそのまま返す
    pub fn value(&self, key: OverrideKey) -> Option<&str> {
        self.slot(key)
            .as_deref()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        OverrideKey::ALL.iter().all(|key| self.value(*key).is_none())
    }

    /// プロンプトに追加する【基本情報】ブロック（未入力なら空文字）
    pub fn prompt_block(&self) -> String {
        let lines: Vec<String> = OverrideKey::ALL
            .iter()
            .filter_map(|key| self.value(*key).map(|v| format!("{}: {}", key.label(), v)))
            .collect();

        if lines.is_empty() {
            return String::new();
        }

        format!(
            "\n\n【基本情報 (Basic Information provided by User)】\n{}\n\
             IMPORTANT: Please use the above 'Basic Information' to fill the corresponding fields in the output JSON.\n",
            lines.join("\n")
        )
    }
}

/// 日付の展開形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// 令和8年5月20日
    Era,
    /// 2026年
    Year,
    /// 5月
    Month,
    /// 20日
    Day,
    /// 2026年05月20日
    Iso,
}

impl DateFormat {
    pub fn render(&self, date: NaiveDate) -> Option<String> {
        match self {
            DateFormat::Era => format_era_date(date),
            DateFormat::Year => Some(format!("{}年", date.year())),
            DateFormat::Month => Some(format!("{}月", date.month())),
            DateFormat::Day => Some(format!("{}日", date.day())),
            DateFormat::Iso => Some(date.format("%Y年%m月%d日").to_string()),
        }
    }
}

/// 手入力項目 → 帳票項目名のエイリアス表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    fields: IndexMap<OverrideKey, Vec<String>>,
    dates: IndexMap<String, DateFormat>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut table = Self {
            fields: IndexMap::new(),
            dates: IndexMap::new(),
        };

        table.extend_field(OverrideKey::UserName, ["利用者氏名", "氏名", "利用者様"].map(String::from));
        table.extend_field(
            OverrideKey::UserNameFurigana,
            ["利用者氏名_ふりがな", "氏名のふりがな"].map(String::from),
        );
        table.extend_field(OverrideKey::StaffName, ["作成者".to_string()]);
        table.extend_field(OverrideKey::CmLocation, ["開催場所".to_string()]);
        table.extend_field(OverrideKey::CmTime, ["開催時間".to_string()]);
        table.extend_field(OverrideKey::CmAttendees, ["会議出席者".to_string()]);
        table.extend_field(OverrideKey::CmServiceManager, ["サービス管理責任者".to_string()]);

        table.insert_date("作成年_西暦", DateFormat::Year);
        table.insert_date("作成月", DateFormat::Month);
        table.insert_date("作成日", DateFormat::Day);
        table.insert_date("作成年月日", DateFormat::Iso);
        table.insert_date("日付", DateFormat::Iso);
        table.insert_date("実施日", DateFormat::Iso);
        table.insert_date("開催日（令和〇年〇月〇日）", DateFormat::Era);

        table
    }
}

impl AliasTable {
    /// 項目名を追加（重複は無視）
    pub fn extend_field(&mut self, key: OverrideKey, fields: impl IntoIterator<Item = String>) {
        let entry = self.fields.entry(key).or_default();
        for field in fields {
            if !entry.contains(&field) {
                entry.push(field);
            }
        }
    }

    pub fn insert_date(&mut self, field: impl Into<String>, format: DateFormat) {
        self.dates.insert(field.into(), format);
    }

    pub fn fields_for(&self, key: OverrideKey) -> &[String] {
        self.fields.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn date_format(&self, field: &str) -> Option<DateFormat> {
        self.dates.get(field).copied()
    }
}

/// "YYYY-MM-DD" を解析
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// 手入力値でAI抽出結果を上書き
///
/// - 空白のみの入力は無視（抽出値を維持）
/// - 日付は ISO 形式のみ受け付け、不正な場合は日付展開のみスキップ
pub fn resolve_overrides(
    mut mapping: FieldMapping,
    overrides: &ManualOverrides,
    aliases: &AliasTable,
) -> FieldMapping {
    for key in OverrideKey::ALL {
        let Some(value) = overrides.value(key) else {
            continue;
        };
        for field in aliases.fields_for(key) {
            mapping.insert(field.clone(), Some(value.to_string()));
        }
    }

    if let Some(date) = overrides.value(OverrideKey::Date).and_then(parse_iso_date) {
        for (field, format) in &aliases.dates {
            if let Some(rendered) = format.render(date) {
                mapping.insert(field.clone(), Some(rendered));
            }
        }
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(pairs: &[(&str, &str)]) -> FieldMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    #[test]
    fn test_user_name_fans_out() {
        let overrides = ManualOverrides {
            user_name: Some("B".into()),
            ..Default::default()
        };
        let resolved = resolve_overrides(extracted(&[("氏名", "A")]), &overrides, &AliasTable::default());

        for key in ["氏名", "利用者氏名", "利用者様"] {
            assert_eq!(resolved.get(key).cloned().flatten().as_deref(), Some("B"), "{}", key);
        }
    }

    #[test]
    fn test_blank_override_keeps_extracted() {
        let overrides = ManualOverrides {
            user_name: Some("   ".into()),
            staff_name: Some(String::new()),
            ..Default::default()
        };
        let resolved = resolve_overrides(
            extracted(&[("氏名", "A"), ("作成者", "山田")]),
            &overrides,
            &AliasTable::default(),
        );
        assert_eq!(resolved["氏名"].as_deref(), Some("A"));
        assert_eq!(resolved["作成者"].as_deref(), Some("山田"));
        assert!(!resolved.contains_key("利用者様"));
    }

    #[test]
    fn test_date_fan_out() {
        let overrides = ManualOverrides {
            date: Some("2026-05-20".into()),
            ..Default::default()
        };
        let resolved = resolve_overrides(FieldMapping::new(), &overrides, &AliasTable::default());

        let era = resolved["開催日（令和〇年〇月〇日）"].clone().unwrap();
        assert!(era.contains("8年5月20日"));
        assert_eq!(era, "令和8年5月20日");
        for key in ["作成年月日", "日付", "実施日"] {
            assert_eq!(resolved[key].as_deref(), Some("2026年05月20日"));
        }
        assert_eq!(resolved["作成年_西暦"].as_deref(), Some("2026年"));
        assert_eq!(resolved["作成月"].as_deref(), Some("5月"));
        assert_eq!(resolved["作成日"].as_deref(), Some("20日"));
    }

    #[test]
    fn test_malformed_date_is_skipped() {
        let overrides = ManualOverrides {
            date: Some("2026/05/20".into()),
            user_name: Some("佐藤".into()),
            ..Default::default()
        };
        let resolved = resolve_overrides(
            extracted(&[("実施日", "5月20日")]),
            &overrides,
            &AliasTable::default(),
        );
        assert_eq!(resolved["実施日"].as_deref(), Some("5月20日"));
        assert!(!resolved.contains_key("作成年月日"));
        assert_eq!(resolved["利用者様"].as_deref(), Some("佐藤"));
    }

    #[test]
    fn test_case_meeting_fields() {
        let overrides = ManualOverrides {
            cm_location: Some("事業所会議室".into()),
            cm_time: Some("10:00〜11:00".into()),
            cm_attendees: Some("本人、母、相談支援専門員".into()),
            cm_service_manager: Some("鈴木".into()),
            ..Default::default()
        };
        let resolved = resolve_overrides(FieldMapping::new(), &overrides, &AliasTable::default());
        assert_eq!(resolved["開催場所"].as_deref(), Some("事業所会議室"));
        assert_eq!(resolved["開催時間"].as_deref(), Some("10:00〜11:00"));
        assert_eq!(resolved["会議出席者"].as_deref(), Some("本人、母、相談支援専門員"));
        assert_eq!(resolved["サービス管理責任者"].as_deref(), Some("鈴木"));
    }

    #[test]
    fn test_prompt_only_fields_not_written() {
        let overrides = ManualOverrides {
            location: Some("自宅".into()),
            count: Some("3".into()),
            ..Default::default()
        };
        let resolved = resolve_overrides(FieldMapping::new(), &overrides, &AliasTable::default());
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_prompt_block() {
        assert_eq!(ManualOverrides::default().prompt_block(), "");

        let overrides = ManualOverrides {
            user_name: Some("田中 太郎".into()),
            next_date: Some("6月".into()),
            ..Default::default()
        };
        let block = overrides.prompt_block();
        assert!(block.contains("【基本情報"));
        assert!(block.contains("利用者名 (User Name): 田中 太郎"));
        assert!(block.contains("次回予定 (Next Date): 6月"));
        assert!(!block.contains("Staff Name"));
    }

    #[test]
    fn test_form_names_round_trip() {
        for key in OverrideKey::ALL {
            assert_eq!(OverrideKey::from_form_name(key.form_name()), Some(key));
        }
        assert_eq!(OverrideKey::from_form_name("template_id"), None);
    }

    #[test]
    fn test_is_empty() {
        assert!(ManualOverrides::default().is_empty());
        let mut overrides = ManualOverrides::default();
        overrides.set(OverrideKey::Time, " ");
        assert!(overrides.is_empty());
        overrides.set(OverrideKey::Time, "14時");
        assert!(!overrides.is_empty());
    }
}
