//! セル参照モジュール
//!
//! テンプレート設定のセル座標（"B6" / "シート名!B6"）を解析する。

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

/// Excelの最大列（XFD）
pub const MAX_COLUMN: u32 = 16_384;
/// Excelの最大行
pub const MAX_ROW: u32 = 1_048_576;

lazy_static! {
    static ref CELL_PATTERN: Regex = Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]+)$").unwrap();
}

/// セル座標（1始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// "B6" 形式を解析
    pub fn parse(value: &str) -> Result<Self> {
        let caps = CELL_PATTERN
            .captures(value.trim())
            .ok_or_else(|| Error::InvalidCell(value.to_string()))?;

        let column = letters_to_column(&caps[1])?;
        let row: u32 = caps[2]
            .parse()
            .map_err(|_| Error::InvalidCell(value.to_string()))?;

        if row == 0 || row > MAX_ROW {
            return Err(Error::InvalidCell(value.to_string()));
        }

        Ok(Self { row, column })
    }

    /// 0始まりの (行, 列)
    pub fn zero_based(&self) -> (u32, u32) {
        (self.row - 1, self.column - 1)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.column), self.row)
    }
}

/// 書き込み先（シート指定は任意）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTarget {
    pub sheet: Option<String>,
    pub cell: CellRef,
}

impl CellTarget {
    /// "B6" または "シート名!B6" を解析
    pub fn parse(value: &str) -> Result<Self> {
        match value.rsplit_once('!') {
            Some((sheet, cell)) => {
                let sheet = unquote_sheet_name(sheet.trim());
                if sheet.is_empty() {
                    return Err(Error::InvalidCell(value.to_string()));
                }
                Ok(Self {
                    sheet: Some(sheet),
                    cell: CellRef::parse(cell)?,
                })
            }
            None => Ok(Self {
                sheet: None,
                cell: CellRef::parse(value)?,
            }),
        }
    }
}

fn unquote_sheet_name(name: &str) -> String {
    if name.len() >= 2 && name.starts_with('\'') && name.ends_with('\'') {
        name[1..name.len() - 1].replace("''", "'")
    } else {
        name.to_string()
    }
}

/// 列番号（1始まり）を "A".."XFD" に変換
pub fn column_to_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// "A".."XFD" を列番号（1始まり）に変換
pub fn letters_to_column(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidCell(letters.to_string()));
    }

    let mut column: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(Error::InvalidCell(letters.to_string()));
        }
        let uc = ch.to_ascii_uppercase() as u8;
        column = column * 26 + (uc - b'A' + 1) as u32;
        if column > MAX_COLUMN {
            return Err(Error::InvalidCell(letters.to_string()));
        }
    }
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_cell() {
        let cell = CellRef::parse("B6").unwrap();
        assert_eq!(cell, CellRef::new(6, 2));
        assert_eq!(cell.to_string(), "B6");
        assert_eq!(cell.zero_based(), (5, 1));
    }

    #[test]
    fn test_parse_absolute_and_lowercase() {
        assert_eq!(CellRef::parse("$K$3").unwrap(), CellRef::new(3, 11));
        assert_eq!(CellRef::parse("aa10").unwrap(), CellRef::new(10, 27));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(CellRef::parse("").is_err());
        assert!(CellRef::parse("B0").is_err());
        assert!(CellRef::parse("6B").is_err());
        assert!(CellRef::parse("XFE1").is_err());
        assert!(CellRef::parse("ABCD1").is_err());
        assert!(CellRef::parse("B6:C7").is_err());
    }

    #[test]
    fn test_parse_target_with_sheet() {
        let target = CellTarget::parse("別紙!C12").unwrap();
        assert_eq!(target.sheet.as_deref(), Some("別紙"));
        assert_eq!(target.cell, CellRef::new(12, 3));
    }

    #[test]
    fn test_parse_target_quoted_sheet() {
        let target = CellTarget::parse("'My Sheet'!A1").unwrap();
        assert_eq!(target.sheet.as_deref(), Some("My Sheet"));
    }

    #[test]
    fn test_parse_target_without_sheet() {
        let target = CellTarget::parse("H6").unwrap();
        assert!(target.sheet.is_none());
        assert_eq!(target.cell, CellRef::new(6, 8));
    }

    #[test]
    fn test_parse_target_empty_sheet() {
        assert!(CellTarget::parse("!A1").is_err());
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_to_letters(1), "A");
        assert_eq!(column_to_letters(26), "Z");
        assert_eq!(column_to_letters(27), "AA");
        assert_eq!(column_to_letters(MAX_COLUMN), "XFD");
        assert_eq!(letters_to_column("XFD").unwrap(), MAX_COLUMN);
    }
}
