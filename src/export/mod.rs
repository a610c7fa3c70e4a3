//! Excel帳票の書き込み
//!
//! テンプレートのxlsxをzipのまま開き、対象ワークシートのセルだけを書き換える。
//! 書き換えないパート（図形・印刷設定・入力規則など）はそのままコピーする。

pub mod package;
pub mod sheet;
pub mod styles;

use crate::error::{AppError, Result};
use indexmap::IndexMap;
use package::{drop_calc_chain, set_attribute, Package, WorkbookIndex, STYLES_PART, WORKBOOK_PART};
use sheet::SheetWrites;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;
use styles::StyleBook;
use welfare_record_common::{CellTarget, FieldMapping, TemplateDefinition};

pub(crate) fn write_err(msg: impl Into<String>) -> AppError {
    AppError::Write(msg.into())
}

/// テンプレートに値を書き込み、出力フォルダに保存
///
/// # Arguments
/// * `template_path` - テンプレートxlsx
/// * `output_dir` - 出力フォルダ
/// * `mapping` - 項目名 → 値（None・空文字は書き込まない）
/// * `definition` - 項目名 → セル座標の定義
/// * `output_name` - 出力ファイル名（同名があれば末尾に識別子を付ける）
///
/// # Returns
/// 保存したファイル名
pub fn fill_template(
    template_path: &Path,
    output_dir: &Path,
    mapping: &FieldMapping,
    definition: &TemplateDefinition,
    output_name: &str,
) -> Result<String> {
    let bytes = render_workbook(template_path, mapping, definition).map_err(|e| match e {
        AppError::Write(_) => e,
        other => write_err(other.to_string()),
    })?;

    let file_name = save_new_file(output_dir, output_name, &bytes)?;

    tracing::info!(file = %file_name, template = %definition.id, "帳票を保存");
    Ok(file_name)
}

/// 書き込み済みxlsxのバイト列を生成
fn render_workbook(
    template_path: &Path,
    mapping: &FieldMapping,
    definition: &TemplateDefinition,
) -> Result<Vec<u8>> {
    let mut package = Package::open(template_path)?;
    let index = WorkbookIndex::load(&package)?;
    let default_sheet = index.default_sheet(definition.sheet_name.as_deref()).clone();

    // シートのパート → 書き込み
    let mut by_sheet: IndexMap<String, SheetWrites> = IndexMap::new();

    for (field, value) in mapping {
        let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
            continue;
        };
        let Some(coord) = definition.mapping.get(field) else {
            continue;
        };

        let target = match CellTarget::parse(coord) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(field = %field, coord = %coord, error = %e, "セル座標が不正のためスキップ");
                continue;
            }
        };

        let sheet = match target.sheet.as_deref() {
            None => &default_sheet,
            Some(name) => match index.find(name) {
                Some(sheet) => sheet,
                None => {
                    tracing::warn!(field = %field, sheet = name, "シートが見つからないためスキップ");
                    continue;
                }
            },
        };

        by_sheet
            .entry(sheet.path.clone())
            .or_default()
            .entry(target.cell.row)
            .or_default()
            .insert(target.cell.column, sanitize_cell_text(value));
    }

    let mut styles = match package.get(STYLES_PART) {
        Some(xml) => Some(StyleBook::parse(xml)?),
        None => None,
    };

    let mut overwrote_formula = false;
    let mut written = 0;

    for (path, writes) in by_sheet {
        let Some(xml) = package.get(&path) else {
            tracing::warn!(part = %path, "ワークシートのパートがありません");
            continue;
        };
        let patch = sheet::patch_sheet(xml, writes, styles.as_mut())?;
        overwrote_formula |= patch.overwrote_formula;
        written += patch.written;
        package.replace(&path, patch.xml);
    }

    if let Some(book) = styles.as_ref().filter(|book| book.is_modified()) {
        if let Some(xml) = package.get(STYLES_PART) {
            let rendered = book.render(xml)?;
            package.replace(STYLES_PART, rendered);
        }
    }

    if overwrote_formula {
        drop_calc_chain(&mut package)?;
    }

    // 値を変えたセルを参照する数式を開いたときに再計算させる
    if written > 0 {
        let patched = match package.get(WORKBOOK_PART) {
            Some(xml) => set_attribute(xml, b"calcPr", "fullCalcOnLoad", "1")?,
            None => None,
        };
        if let Some(xml) = patched {
            package.replace(WORKBOOK_PART, xml);
        }
    }

    tracing::debug!(cells = written, "セル書き込み完了");
    package.to_bytes()
}

/// XMLに書けない制御文字を除去
pub fn sanitize_cell_text(value: &str) -> String {
    value
        .chars()
        .filter(|&c| match c {
            '\t' | '\n' | '\r' => true,
            '\u{FFFE}' | '\u{FFFF}' => false,
            c => c >= '\u{20}',
        })
        .collect()
}

/// 識別子の付け直しを試す上限
const MAX_NAME_ATTEMPTS: usize = 16;

/// 既存ファイルを上書きせずに新規作成して保存し、使ったファイル名を返す
///
/// 作成は `create_new` で行うため、同名の保存が同時に走っても片方が
/// `AlreadyExists` になり、識別子付きの名前で作り直す。
fn save_new_file(output_dir: &Path, name: &str, bytes: &[u8]) -> Result<String> {
    let mut candidate = name.to_string();

    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = output_dir.join(&candidate);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                candidate = suffixed_name(name);
                continue;
            }
            Err(e) => {
                return Err(write_err(format!("保存に失敗 ({}): {}", path.display(), e)));
            }
        };

        if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(write_err(format!("保存に失敗 ({}): {}", path.display(), e)));
        }
        return Ok(candidate);
    }

    Err(write_err(format!("出力ファイル名を決められません: {}", name)))
}

/// 末尾に8桁の識別子を付けたファイル名
fn suffixed_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}.xlsx", stem, &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_cell_text() {
        assert_eq!(sanitize_cell_text("a\u{0}b\u{1F}c"), "abc");
        assert_eq!(sanitize_cell_text("行1\n行2\tタブ"), "行1\n行2\tタブ");
        assert_eq!(sanitize_cell_text("x\u{FFFF}"), "x");
    }

    #[test]
    fn test_save_new_file_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let name = "26.05.20_ケース会議【山田】.xlsx";
        assert_eq!(save_new_file(dir.path(), name, b"first").unwrap(), name);

        let second = save_new_file(dir.path(), name, b"second").unwrap();
        assert_ne!(second, name);
        assert!(second.starts_with("26.05.20_ケース会議【山田】_"));
        assert!(second.ends_with(".xlsx"));

        // 先に保存したファイルは上書きされない
        assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join(&second)).unwrap(), b"second");
    }

    #[test]
    fn test_save_new_file_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = save_new_file(&dir.path().join("none"), "out.xlsx", b"x");
        assert!(matches!(result, Err(AppError::Write(_))));
    }

    #[test]
    fn test_missing_template_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = fill_template(
            &dir.path().join("none.xlsx"),
            dir.path(),
            &FieldMapping::new(),
            &TemplateDefinition::default(),
            "out.xlsx",
        );
        assert!(matches!(result, Err(AppError::Write(_))));
        assert!(!dir.path().join("out.xlsx").exists());
    }
}
