//! テスト用のテンプレートExcel作成・読み取り

#![allow(dead_code)]

use calamine::{open_workbook, Data, Reader, Xlsx};
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use rust_xlsxwriter::Workbook;
use std::path::Path;
use welfare_record::export::package::{Package, WorkbookIndex};
use welfare_record_common::CellRef;

/// テンプレートを作成（cells は (シート名, セル, 値)）
pub fn write_template(path: &Path, sheets: &[&str], cells: &[(&str, &str, &str)], active: Option<usize>) {
    let mut workbook = Workbook::new();
    for (index, name) in sheets.iter().enumerate() {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (_, coord, value) in cells.iter().filter(|(s, _, _)| s == name) {
            let (row, col) = CellRef::parse(coord).unwrap().zero_based();
            sheet.write_string(row, col as u16, *value).unwrap();
        }
        if active == Some(index) {
            sheet.set_active(true);
        }
    }
    workbook.save(path).unwrap();
}

/// calamine で読んだセル値（空なら None）
pub fn read_cell(path: &Path, sheet: &str, coord: &str) -> Option<String> {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    let range = workbook.worksheet_range(sheet).unwrap();
    match range.get_value(CellRef::parse(coord).unwrap().zero_based()) {
        None | Some(Data::Empty) => None,
        Some(value) => Some(value.to_string()),
    }
}

/// パッケージ内パートのバイト列
pub fn part_bytes(path: &Path, name: &str) -> Option<Vec<u8>> {
    Package::open(path).unwrap().get(name).map(|b| b.to_vec())
}

/// シート名 → ワークシートXML
pub fn sheet_xml(path: &Path, sheet: &str) -> String {
    let package = Package::open(path).unwrap();
    let index = WorkbookIndex::load(&package).unwrap();
    let part = &index.find(sheet).unwrap().path;
    String::from_utf8(package.get(part).unwrap().to_vec()).unwrap()
}

/// セルの書式番号（s属性、なければ0）
pub fn cell_style(path: &Path, sheet: &str, coord: &str) -> u32 {
    let xml = sheet_xml(path, sheet);
    let mut reader = XmlReader::from_str(&xml);
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let attr = |key: &[u8]| {
                    e.try_get_attribute(key)
                        .unwrap()
                        .map(|a| a.unescape_value().unwrap().into_owned())
                };
                if attr(b"r").as_deref() == Some(coord) {
                    return attr(b"s").map(|s| s.parse().unwrap()).unwrap_or(0);
                }
            }
            Event::Eof => panic!("セル {} がありません", coord),
            _ => {}
        }
    }
}

/// styles.xml の cellXfs の index 番目にある alignment 属性（なければ空）
pub fn alignment_of(styles: &[u8], index: u32) -> Vec<(String, String)> {
    let mut reader = XmlReader::from_reader(styles);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut current: Option<u32> = None;
    let mut seen = 0u32;

    loop {
        match reader.read_event_into(&mut buf).unwrap() {
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => return Vec::new(),
            Event::Start(e) if in_cell_xfs && e.local_name().as_ref() == b"xf" => {
                current = Some(seen);
                seen += 1;
            }
            Event::Empty(e) if in_cell_xfs && e.local_name().as_ref() == b"xf" => {
                if seen == index {
                    return Vec::new();
                }
                seen += 1;
            }
            Event::End(e) if e.local_name().as_ref() == b"xf" => {
                if current == Some(index) {
                    return Vec::new();
                }
                current = None;
            }
            Event::Start(e) | Event::Empty(e)
                if current == Some(index) && e.local_name().as_ref() == b"alignment" =>
            {
                return e
                    .attributes()
                    .map(|a| {
                        let a = a.unwrap();
                        (
                            String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                            a.unescape_value().unwrap().into_owned(),
                        )
                    })
                    .collect();
            }
            Event::Eof => panic!("cellXfs に {} 番の書式がありません", index),
            _ => {}
        }
        buf.clear();
    }
}

/// 属性値の取得（alignment_of の結果用）
pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}
