//! ワークシートXMLのセル書き換え
//!
//! sheetData をストリームで読み、対象セルだけインライン文字列に置き換える。
//! 存在しない行・セルは行番号・列番号の順を保って挿入する。
//! 既存セルの書式番号（s）はそのまま引き継ぐ。

use super::package::{attr_value, element_prefix, with_attribute};
use super::styles::{AlignmentRule, StyleBook};
use super::write_err;
use crate::error::Result;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};
use std::collections::{BTreeMap, HashSet};
use welfare_record_common::CellRef;

/// 列番号 → 値
pub type RowWrites = BTreeMap<u32, String>;
/// 行番号 → 行内の書き込み
pub type SheetWrites = BTreeMap<u32, RowWrites>;

/// 書き換え結果
#[derive(Debug)]
pub struct SheetPatch {
    pub xml: Vec<u8>,
    /// 数式セルを上書きしたか（calcChain の削除が必要）
    pub overwrote_formula: bool,
    pub written: usize,
}

/// 列の既定書式（<cols> の min..=max）
#[derive(Debug, Clone, Copy)]
struct ColumnStyle {
    min: u32,
    max: u32,
    style: u32,
}

struct SheetPatcher<'a> {
    writer: XmlWriter<Vec<u8>>,
    styles: Option<&'a mut StyleBook>,
    pending: SheetWrites,
    prefix: String,
    columns: Vec<ColumnStyle>,
    overwrote_formula: bool,
    /// 親セルを上書きした共有数式の si
    orphaned_shared: HashSet<String>,
    written: usize,
}

/// ワークシートXMLにセル値を書き込む
pub fn patch_sheet(xml: &[u8], writes: SheetWrites, styles: Option<&mut StyleBook>) -> Result<SheetPatch> {
    let bounds = write_bounds(&writes);
    let mut patcher = SheetPatcher {
        writer: XmlWriter::new(Vec::new()),
        styles,
        pending: writes,
        prefix: String::new(),
        columns: Vec::new(),
        overwrote_formula: false,
        orphaned_shared: HashSet::new(),
        written: 0,
    };

    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();

    let mut in_sheet_data = false;
    let mut last_row = 0u32;
    let mut last_col = 0u32;
    // 処理中の行: (行番号, 行の既定書式, 残りの書き込み)
    let mut current: Option<(u32, Option<u32>, RowWrites)> = None;
    // 置き換え中の元セルを読み飛ばす深さ
    let mut skip_depth = 0usize;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| write_err(format!("ワークシートXMLの解析に失敗: {}", e)))?
        {
            Event::Eof => break,

            event if skip_depth > 0 => match event {
                Event::Start(e) => {
                    if e.local_name().as_ref() == b"f" {
                        patcher.drop_formula(&e);
                    }
                    skip_depth += 1;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"f" => patcher.drop_formula(&e),
                Event::End(_) => skip_depth -= 1,
                _ => {}
            },

            Event::Start(e) if e.local_name().as_ref() == b"worksheet" => {
                patcher.prefix = element_prefix(&e);
                patcher.writer.write_event(Event::Start(e))?;
            }

            Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                let expanded = match (attr_value(&e, b"ref"), bounds) {
                    (Some(existing), Some(bounds)) => expand_dimension(&existing, bounds),
                    (Some(existing), None) => existing,
                    (None, _) => String::new(),
                };
                if expanded.is_empty() {
                    patcher.writer.write_event(Event::Empty(e))?;
                } else {
                    patcher
                        .writer
                        .write_event(Event::Empty(with_attribute(&e, "ref", &expanded)))?;
                }
            }

            Event::Empty(e) if e.local_name().as_ref() == b"col" => {
                if let Some(column) = parse_column_style(&e) {
                    patcher.columns.push(column);
                }
                patcher.writer.write_event(Event::Empty(e))?;
            }

            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
                patcher.writer.write_event(Event::Start(e))?;
            }

            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                let end = BytesEnd::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                patcher.writer.write_event(Event::Start(e))?;
                patcher.flush_rows(None)?;
                patcher.writer.write_event(Event::End(end))?;
            }

            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                in_sheet_data = false;
                patcher.flush_rows(None)?;
                patcher.writer.write_event(Event::End(e))?;
            }

            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_number(&e).unwrap_or(last_row + 1);
                last_row = row;
                last_col = 0;
                patcher.flush_rows(Some(row))?;

                match patcher.pending.remove(&row) {
                    Some(cells) => {
                        patcher.writer.write_event(Event::Start(without_spans(&e)))?;
                        current = Some((row, row_style(&e), cells));
                    }
                    None => patcher.writer.write_event(Event::Start(e))?,
                }
            }

            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_number(&e).unwrap_or(last_row + 1);
                last_row = row;
                patcher.flush_rows(Some(row))?;

                match patcher.pending.remove(&row) {
                    Some(cells) => {
                        let end = BytesEnd::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                        let style = row_style(&e);
                        patcher.writer.write_event(Event::Start(without_spans(&e)))?;
                        for (column, value) in cells {
                            let base = patcher.inherited_style(style, column);
                            patcher.write_cell(row, column, &value, base)?;
                        }
                        patcher.writer.write_event(Event::End(end))?;
                    }
                    None => patcher.writer.write_event(Event::Empty(e))?,
                }
            }

            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                if let Some((row, style, cells)) = current.take() {
                    for (column, value) in cells {
                        let base = patcher.inherited_style(style, column);
                        patcher.write_cell(row, column, &value, base)?;
                    }
                }
                patcher.writer.write_event(Event::End(e))?;
            }

            Event::Start(e) if current.is_some() && e.local_name().as_ref() == b"c" => {
                let column = cell_column(&e).unwrap_or(last_col + 1);
                last_col = column;
                if patcher.replace_cell(&mut current, &e, column)? {
                    skip_depth = 1;
                } else {
                    patcher.writer.write_event(Event::Start(e))?;
                }
            }

            Event::Empty(e) if current.is_some() && e.local_name().as_ref() == b"c" => {
                let column = cell_column(&e).unwrap_or(last_col + 1);
                last_col = column;
                if !patcher.replace_cell(&mut current, &e, column)? {
                    patcher.writer.write_event(Event::Empty(e))?;
                }
            }

            // 親を失った共有数式は外し、キャッシュ値だけ残す
            Event::Empty(e) if patcher.is_orphaned_shared(&e) => {}
            Event::Start(e) if patcher.is_orphaned_shared(&e) => skip_depth = 1,

            other => patcher.writer.write_event(other)?,
        }
        buf.clear();
    }

    for (row, cells) in &patcher.pending {
        for column in cells.keys() {
            tracing::warn!(cell = %CellRef::new(*row, *column), "sheetData がないため書き込めません");
        }
    }

    Ok(SheetPatch {
        xml: patcher.writer.into_inner(),
        overwrote_formula: patcher.overwrote_formula,
        written: patcher.written,
    })
}

impl SheetPatcher<'_> {
    /// 指定行より前（None なら全部）の新規行を書き出す
    fn flush_rows(&mut self, before: Option<u32>) -> Result<()> {
        let rows: Vec<u32> = match before {
            Some(limit) => self.pending.range(..limit).map(|(row, _)| *row).collect(),
            None => self.pending.keys().copied().collect(),
        };

        for row in rows {
            let Some(cells) = self.pending.remove(&row) else {
                continue;
            };
            let row_name = format!("{}row", self.prefix);
            let mut start = BytesStart::new(row_name.as_str());
            start.push_attribute(("r", row.to_string().as_str()));
            self.writer.write_event(Event::Start(start))?;
            for (column, value) in cells {
                let base = self.inherited_style(None, column);
                self.write_cell(row, column, &value, base)?;
            }
            self.writer
                .write_event(Event::End(BytesEnd::new(row_name.as_str())))?;
        }
        Ok(())
    }

    /// 既存セルの手前に新規セルを挿入し、既存セルが対象なら置き換える
    ///
    /// 置き換えた場合は true（元セルは呼び出し側で読み飛ばす）
    fn replace_cell(
        &mut self,
        current: &mut Option<(u32, Option<u32>, RowWrites)>,
        e: &BytesStart,
        column: u32,
    ) -> Result<bool> {
        let Some((row, row_style, cells)) = current.as_mut() else {
            return Ok(false);
        };
        let (row, row_style) = (*row, *row_style);

        let before: Vec<u32> = cells.range(..column).map(|(col, _)| *col).collect();
        for col in before {
            if let Some(value) = cells.remove(&col) {
                let base = self.inherited_style(row_style, col);
                self.write_cell(row, col, &value, base)?;
            }
        }

        match cells.remove(&column) {
            Some(value) => {
                let base = attr_value(e, b"s")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                self.write_cell(row, column, &value, base)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 上書きで消える数式を記録する
    fn drop_formula(&mut self, f: &BytesStart) {
        self.overwrote_formula = true;
        let shared = attr_value(f, b"t").is_some_and(|t| t == "shared");
        if shared && attr_value(f, b"ref").is_some() {
            if let Some(si) = attr_value(f, b"si") {
                self.orphaned_shared.insert(si);
            }
        }
    }

    fn is_orphaned_shared(&self, e: &BytesStart) -> bool {
        if self.orphaned_shared.is_empty() || e.local_name().as_ref() != b"f" {
            return false;
        }
        attr_value(e, b"t").is_some_and(|t| t == "shared")
            && attr_value(e, b"si").is_some_and(|si| self.orphaned_shared.contains(&si))
    }

    /// 新規セルの書式（行の既定 → 列の既定 → 0）
    fn inherited_style(&self, row_style: Option<u32>, column: u32) -> u32 {
        row_style
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|c| c.min <= column && column <= c.max)
                    .map(|c| c.style)
            })
            .unwrap_or(0)
    }

    fn write_cell(&mut self, row: u32, column: u32, value: &str, base: u32) -> Result<()> {
        let style = match (AlignmentRule::for_value(value), self.styles.as_deref_mut()) {
            (Some(rule), Some(book)) => book.style_for(base, rule),
            _ => base,
        };

        let c_name = format!("{}c", self.prefix);
        let is_name = format!("{}is", self.prefix);
        let t_name = format!("{}t", self.prefix);

        let mut cell = BytesStart::new(c_name.as_str());
        cell.push_attribute(("r", CellRef::new(row, column).to_string().as_str()));
        if style != 0 {
            cell.push_attribute(("s", style.to_string().as_str()));
        }
        cell.push_attribute(("t", "inlineStr"));

        let mut text = BytesStart::new(t_name.as_str());
        text.push_attribute(("xml:space", "preserve"));

        self.writer.write_event(Event::Start(cell))?;
        self.writer.write_event(Event::Start(BytesStart::new(is_name.as_str())))?;
        self.writer.write_event(Event::Start(text))?;
        self.writer.write_event(Event::Text(BytesText::new(value)))?;
        self.writer.write_event(Event::End(BytesEnd::new(t_name.as_str())))?;
        self.writer.write_event(Event::End(BytesEnd::new(is_name.as_str())))?;
        self.writer.write_event(Event::End(BytesEnd::new(c_name.as_str())))?;

        self.written += 1;
        Ok(())
    }
}

fn row_number(e: &BytesStart) -> Option<u32> {
    attr_value(e, b"r").and_then(|r| r.parse().ok())
}

/// customFormat が立っている行の既定書式
fn row_style(e: &BytesStart) -> Option<u32> {
    let custom = attr_value(e, b"customFormat").is_some_and(|v| v == "1" || v == "true");
    if !custom {
        return None;
    }
    attr_value(e, b"s").and_then(|s| s.parse().ok())
}

fn cell_column(e: &BytesStart) -> Option<u32> {
    attr_value(e, b"r")
        .and_then(|r| CellRef::parse(&r).ok())
        .map(|cell| cell.column)
}

fn parse_column_style(e: &BytesStart) -> Option<ColumnStyle> {
    let min = attr_value(e, b"min")?.parse().ok()?;
    let max = attr_value(e, b"max")?.parse().ok()?;
    let style = attr_value(e, b"style")?.parse().ok()?;
    Some(ColumnStyle { min, max, style })
}

/// spans は行内の列範囲のヒントなので、セルを足す行からは外す
fn without_spans(e: &BytesStart) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut elem = BytesStart::new(name);
    for a in e.attributes().with_checks(false).flatten() {
        if a.key.as_ref() != b"spans" {
            elem.push_attribute(a);
        }
    }
    elem
}

/// 書き込み範囲 (左上, 右下)
fn write_bounds(writes: &SheetWrites) -> Option<(CellRef, CellRef)> {
    let min_row = *writes.keys().next()?;
    let max_row = *writes.keys().next_back()?;
    let columns = writes.values().flat_map(|cells| cells.keys().copied());
    let (min_col, max_col) = columns.fold((u32::MAX, 0), |(lo, hi), c| (lo.min(c), hi.max(c)));
    if max_col == 0 {
        return None;
    }
    Some((CellRef::new(min_row, min_col), CellRef::new(max_row, max_col)))
}

/// dimension の ref を書き込み範囲まで広げる
fn expand_dimension(existing: &str, (top_left, bottom_right): (CellRef, CellRef)) -> String {
    let (first, last) = existing.split_once(':').unwrap_or((existing, existing));
    let (Ok(first), Ok(last)) = (CellRef::parse(first), CellRef::parse(last)) else {
        return existing.to_string();
    };

    let start = CellRef::new(first.row.min(top_left.row), first.column.min(top_left.column));
    let end = CellRef::new(last.row.max(bottom_right.row), last.column.max(bottom_right.column));
    if start == end {
        start.to_string()
    } else {
        format!("{}:{}", start, end)
    }
}
