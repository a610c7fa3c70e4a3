//! テンプレート定義モジュール
//!
//! 帳票テンプレート（Excelファイル・シート・項目→セル対応）の設定を保持する。
//! 設定は起動時に一度だけ読み込み、以降は読み取り専用。

use crate::cell::CellTarget;
use crate::error::{Error, Result};
use crate::overrides::{AliasTable, DateFormat, OverrideKey};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 帳票テンプレート定義
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// テンプレートID（レジストリのキー）
    #[serde(skip)]
    pub id: String,
    /// 表示名（出力ファイル名にも使用）
    pub name: String,
    /// テンプレートExcelファイルのパス
    pub filename: String,
    /// 書き込み対象シート（未指定時はアクティブシート）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    /// 項目名 → セル座標
    pub mapping: IndexMap<String, String>,
    /// 帳票の目的・意味（プロンプト用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// 文体・書式ルール（プロンプト用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_instruction: Option<String>,
    /// 中間評価データを読み込む帳票か
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reads_interim: bool,
    /// 手入力項目の追加エイリアス
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub aliases: IndexMap<OverrideKey, Vec<String>>,
    /// 日付の追加エイリアス
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub date_aliases: IndexMap<String, DateFormat>,
}

impl TemplateDefinition {
    /// 項目名一覧（定義順）
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.mapping.keys().map(String::as_str)
    }

    /// 既定のエイリアス表にこのテンプレートの追加分を反映
    pub fn alias_table(&self) -> AliasTable {
        let mut table = AliasTable::default();
        for (key, fields) in &self.aliases {
            table.extend_field(*key, fields.iter().cloned());
        }
        for (field, format) in &self.date_aliases {
            table.insert_date(field.clone(), *format);
        }
        table
    }

    /// 全セル座標を検証
    pub fn validate(&self) -> Result<()> {
        for (field, coord) in &self.mapping {
            CellTarget::parse(coord).map_err(|_| {
                Error::Config(format!(
                    "テンプレート '{}' の項目 '{}' のセル座標が不正: {}",
                    self.id, field, coord
                ))
            })?;
        }
        Ok(())
    }
}

/// テンプレートレジストリ
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TemplateRegistry {
    templates: IndexMap<String, TemplateDefinition>,
}

impl TemplateRegistry {
    /// JSON文字列から読み込み
    pub fn from_json(json: &str) -> Result<Self> {
        let mut templates: IndexMap<String, TemplateDefinition> = serde_json::from_str(json)?;
        for (id, template) in templates.iter_mut() {
            template.id = id.clone();
        }
        Ok(Self { templates })
    }

    /// JSONファイルから読み込み
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn get(&self, id: &str) -> Option<&TemplateDefinition> {
        self.templates.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateDefinition> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 全テンプレートのセル座標を検証
    pub fn validate(&self) -> Result<()> {
        self.iter().try_for_each(TemplateDefinition::validate)
    }
}
