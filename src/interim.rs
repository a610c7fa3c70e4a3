//! 中間評価データ読み込み
//!
//! 前回作成したモニタリング（中間）のExcelから、目標・達成状況などを
//! 1行1項目のテキストにまとめる。最終評価のAI抽出に文脈として渡す。
//! 読み込みに失敗しても処理は止めず、空文字を返す。

use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;
use welfare_record_common::CellRef;

/// 中間評価シート名
pub const INTERIM_SHEET_NAME: &str = "モニタリング(中間)";

/// 目標ブロックの開始行
const GOAL_ROWS: [u32; 3] = [6, 11, 16];

/// 達成状況が未入力の場合
const UNDECIDED_STATUS: &str = "未定";

/// 中間評価データをテキスト化（失敗時は空文字）
pub fn read_interim_data(path: &Path) -> String {
    match load_interim_range(path) {
        Ok(range) => format_interim(&range),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "中間評価データの読み込みに失敗");
            String::new()
        }
    }
}

fn load_interim_range(path: &Path) -> Result<Range<Data>, calamine::Error> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names();

    let sheet_name = if sheet_names.iter().any(|s| s == INTERIM_SHEET_NAME) {
        INTERIM_SHEET_NAME.to_string()
    } else {
        sheet_names
            .first()
            .cloned()
            .ok_or_else(|| calamine::Error::Msg("シートがありません"))?
    };

    workbook.worksheet_range(&sheet_name)
}

fn format_interim(range: &Range<Data>) -> String {
    let cell = |coord: &str| cell_text(range, coord);

    let mut lines = vec![
        format!("利用者氏名: {}", cell("C3")),
        format!("利用者氏名_ふりがな: {}", cell("C2")),
        format!("作成者: {}", cell("J2")),
        format!("作成年月日: {}{}{}", cell("K3"), cell("L3"), cell("M3")),
    ];

    for (index, row) in GOAL_ROWS.iter().enumerate() {
        let status = ["E", "F", "G"]
            .iter()
            .map(|col| cell(&format!("{}{}", col, row)))
            .find(|v| !v.is_empty())
            .unwrap_or_else(|| UNDECIDED_STATUS.to_string());

        lines.push(format!("達成目標: {}", cell(&format!("B{}", row))));
        lines.push(format!("達成状況: {}", status));
        lines.push(format!("未達成原因・分析{}: {}", index + 1, cell(&format!("H{}", row))));
        lines.push(format!("今後の対応: {}", cell(&format!("L{}", row))));
    }

    lines.push(format!("その他の気づき: {}", cell("A22")));
    lines.join("\n")
}

fn cell_text(range: &Range<Data>, coord: &str) -> String {
    let Ok(cell) = CellRef::parse(coord) else {
        return String::new();
    };
    match range.get_value(cell.zero_based()) {
        None | Some(Data::Empty) => String::new(),
        Some(value) => value.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_returns_empty() {
        let text = read_interim_data(Path::new("/nonexistent/interim.xlsx"));
        assert!(text.is_empty());
    }

    #[test]
    fn test_corrupt_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip").unwrap();
        assert!(read_interim_data(&path).is_empty());
    }
}
