//! xlsxパッケージ（zip）の読み書き
//!
//! 全エントリをメモリに読み込み、書き換えたパートだけ差し替えて
//! 同じ圧縮方式・更新日時で書き戻す。

use super::write_err;
use crate::error::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub const STYLES_PART: &str = "xl/styles.xml";
pub const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

struct PartEntry {
    name: String,
    data: Vec<u8>,
    options: SimpleFileOptions,
    is_dir: bool,
}

/// 展開済みのxlsxパッケージ
pub struct Package {
    parts: Vec<PartEntry>,
}

impl Package {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| write_err(format!("xlsxを読み込めません ({}): {}", path.display(), e)))?;

        let mut parts = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| write_err(format!("zipエントリ{}を読み込めません: {}", i, e)))?;

            let mut options = SimpleFileOptions::default().compression_method(file.compression());
            if let Some(dt) = file.last_modified() {
                options = options.last_modified_time(dt);
            }
            if let Some(mode) = file.unix_mode() {
                options = options.unix_permissions(mode);
            }

            let mut data = Vec::new();
            if !file.is_dir() {
                file.read_to_end(&mut data)?;
            }
            parts.push(PartEntry {
                name: file.name().to_string(),
                data,
                options,
                is_dir: file.is_dir(),
            });
        }

        Ok(Self { parts })
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }


    pub fn replace(&mut self, name: &str, data: Vec<u8>) {
        if let Some(part) = self.parts.iter_mut().find(|p| p.name == name) {
            part.data = data;
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|p| p.name != name);
        self.parts.len() != before
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = ZipWriter::new(Cursor::new(Vec::new()));

        for part in &self.parts {
            if part.is_dir {
                out.add_directory(part.name.as_str(), part.options)
                    .map_err(|e| write_err(format!("zipディレクトリ追加に失敗: {}", e)))?;
                continue;
            }
            out.start_file(part.name.as_str(), part.options)
                .map_err(|e| write_err(format!("zipエントリ書き込みに失敗: {}", e)))?;
            out.write_all(&part.data)?;
        }

        let cursor = out
            .finish()
            .map_err(|e| write_err(format!("zipの確定に失敗: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

/// ワークシート情報
#[derive(Debug, Clone, PartialEq)]
pub struct SheetInfo {
    pub name: String,
    /// パッケージ内パス（例: xl/worksheets/sheet1.xml）
    pub path: String,
}

/// workbook.xml から読み取ったシート一覧
#[derive(Debug, Clone)]
pub struct WorkbookIndex {
    pub sheets: Vec<SheetInfo>,
    pub active_tab: usize,
}

impl WorkbookIndex {
    pub fn load(package: &Package) -> Result<Self> {
        let workbook = package
            .get(WORKBOOK_PART)
            .ok_or_else(|| write_err("xl/workbook.xml がありません"))?;
        let rels = package
            .get(WORKBOOK_RELS_PART)
            .ok_or_else(|| write_err("xl/_rels/workbook.xml.rels がありません"))?;

        let targets = parse_relationship_targets(rels)?;
        let (sheet_rids, active_tab) = parse_workbook_sheets(workbook)?;

        let sheets: Vec<SheetInfo> = sheet_rids
            .into_iter()
            .filter_map(|(name, rid)| {
                targets.get(&rid).map(|target| SheetInfo {
                    name,
                    path: resolve_target("xl/", target),
                })
            })
            .collect();

        if sheets.is_empty() {
            return Err(write_err("ワークシートがありません"));
        }

        Ok(Self { sheets, active_tab })
    }

    pub fn find(&self, name: &str) -> Option<&SheetInfo> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// 既定の書き込みシート（指定名があればそれ、なければアクティブシート）
    pub fn default_sheet(&self, preferred: Option<&str>) -> &SheetInfo {
        if let Some(sheet) = preferred.and_then(|name| self.find(name)) {
            return sheet;
        }
        if let Some(name) = preferred {
            tracing::warn!(sheet = name, "指定シートがないためアクティブシートに書き込み");
        }
        self.sheets
            .get(self.active_tab)
            .unwrap_or(&self.sheets[0])
    }
}

/// 要素の属性値（ローカル名で照合）
pub fn attr_value(e: &BytesStart, local: &[u8]) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// 要素名のプレフィックス（`x:row` なら `x:`）
pub fn element_prefix(e: &BytesStart) -> String {
    e.name()
        .prefix()
        .map(|p| format!("{}:", String::from_utf8_lossy(p.as_ref())))
        .unwrap_or_default()
}

fn parse_workbook_sheets(xml: &[u8]) -> Result<(Vec<(String, String)>, usize)> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut active_tab = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"sheet" => {
                    if let (Some(name), Some(rid)) = (attr_value(&e, b"name"), attr_value(&e, b"id")) {
                        sheets.push((name, rid));
                    }
                }
                b"workbookView" => {
                    active_tab = attr_value(&e, b"activeTab")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(write_err(format!("workbook.xml の解析に失敗: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok((sheets, active_tab))
}

fn parse_relationship_targets(xml: &[u8]) -> Result<HashMap<String, String>> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr_value(&e, b"Id"), attr_value(&e, b"Target")) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(write_err(format!("リレーションの解析に失敗: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(targets)
}

/// リレーションのTargetをパッケージ内パスに解決
fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}{}", base_dir, target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// 条件に合う要素を取り除いたXMLを返す
pub fn remove_elements<F>(xml: &[u8], local: &[u8], matches: F) -> Result<Vec<u8>>
where
    F: Fn(&BytesStart) -> bool,
{
    let mut reader = XmlReader::from_reader(xml);
    let mut writer = XmlWriter::new(Vec::new());
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| write_err(format!("XML解析エラー: {}", e)))?
        {
            Event::Eof => break,
            Event::Start(_) if skip_depth > 0 => skip_depth += 1,
            Event::End(_) if skip_depth > 0 => skip_depth -= 1,
            _ if skip_depth > 0 => {}
            Event::Start(ref e) if e.local_name().as_ref() == local && matches(e) => skip_depth = 1,
            Event::Empty(ref e) if e.local_name().as_ref() == local && matches(e) => {}
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

/// 最初に見つかった要素の属性を設定したXMLを返す（要素がなければ None）
pub fn set_attribute(xml: &[u8], local: &[u8], key: &str, value: &str) -> Result<Option<Vec<u8>>> {
    let mut reader = XmlReader::from_reader(xml);
    let mut writer = XmlWriter::new(Vec::new());
    let mut buf = Vec::new();
    let mut found = false;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| write_err(format!("XML解析エラー: {}", e)))?
        {
            Event::Eof => break,
            Event::Start(ref e) if !found && e.local_name().as_ref() == local => {
                found = true;
                writer.write_event(Event::Start(with_attribute(e, key, value)))?;
            }
            Event::Empty(ref e) if !found && e.local_name().as_ref() == local => {
                found = true;
                writer.write_event(Event::Empty(with_attribute(e, key, value)))?;
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(found.then(|| writer.into_inner()))
}

/// 属性を置き換えた（なければ追加した）要素を作る
pub fn with_attribute(e: &BytesStart, key: &str, value: &str) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut elem = BytesStart::new(name);
    for a in e.attributes().with_checks(false).flatten() {
        if a.key.as_ref() == key.as_bytes() {
            continue;
        }
        elem.push_attribute(a);
    }
    elem.push_attribute((key, value));
    elem
}

/// 計算チェーンを削除（リレーション・コンテンツタイプも合わせて）
pub fn drop_calc_chain(package: &mut Package) -> Result<()> {
    if !package.remove(CALC_CHAIN_PART) {
        return Ok(());
    }

    if let Some(rels) = package.get(WORKBOOK_RELS_PART) {
        let patched = remove_elements(rels, b"Relationship", |e| {
            attr_value(e, b"Type").is_some_and(|t| t.ends_with("/calcChain"))
        })?;
        package.replace(WORKBOOK_RELS_PART, patched);
    }

    if let Some(types) = package.get(CONTENT_TYPES_PART) {
        let part_name = format!("/{}", CALC_CHAIN_PART);
        let patched = remove_elements(types, b"Override", |e| {
            attr_value(e, b"PartName").as_deref() == Some(part_name.as_str())
        })?;
        package.replace(CONTENT_TYPES_PART, patched);
    }

    tracing::debug!("数式セルを上書きしたため calcChain を削除");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("xl/", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl/", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_target("xl/", "../xl/worksheets/sheet3.xml"), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn test_parse_workbook_sheets() {
        let xml = r#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<bookViews><workbookView activeTab="1"/></bookViews>
<sheets><sheet name="表紙" sheetId="1" r:id="rId1"/><sheet name="記録" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;
        // シート名が日本語でも読める
        let (sheets, active) = parse_workbook_sheets(xml.as_bytes()).unwrap();
        assert_eq!(active, 1);
        assert_eq!(sheets[0], ("表紙".to_string(), "rId1".to_string()));
        assert_eq!(sheets[1].0, "記録");
    }

    #[test]
    fn test_remove_elements() {
        let xml = br#"<Relationships><Relationship Id="rId1" Type="x/worksheet" Target="a"/><Relationship Id="rId9" Type="x/calcChain" Target="calcChain.xml"/></Relationships>"#;
        let out = remove_elements(xml, b"Relationship", |e| {
            attr_value(e, b"Type").is_some_and(|t| t.ends_with("/calcChain"))
        })
        .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("rId1"));
        assert!(!out.contains("calcChain"));
    }

    #[test]
    fn test_set_attribute() {
        let xml = br#"<workbook><calcPr calcId="191029"/></workbook>"#;
        let out = set_attribute(xml, b"calcPr", "fullCalcOnLoad", "1").unwrap().unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(r#"calcId="191029""#));
        assert!(out.contains(r#"fullCalcOnLoad="1""#));

        assert!(set_attribute(b"<workbook/>", b"calcPr", "fullCalcOnLoad", "1")
            .unwrap()
            .is_none());
    }
}
