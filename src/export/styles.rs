//! セル書式（cellXfs）の派生
//!
//! 値の形に応じて配置を変える:
//! - `【` で始まる10文字未満: 縦書き・中央揃え
//! - 50文字を超える: 折り返し
//!
//! 既存の xf を複製して alignment だけ差し替え、cellXfs の末尾に追加する。
//! 同じ元書式・同じ規則の組み合わせは1つの xf を共有する。

use super::package::{element_prefix, with_attribute};
use super::write_err;
use crate::error::Result;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};
use std::collections::HashMap;
use std::io::Write;

/// 縦書きにする値の上限（文字数、未満）
const VERTICAL_MAX_CHARS: usize = 10;
/// 折り返しにする値の下限（文字数、超過）
const WRAP_MIN_CHARS: usize = 50;

/// 配置の規則
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignmentRule {
    /// 縦書き（状態欄「【達成】」など）
    Vertical,
    /// 長文の折り返し
    Wrap,
}

impl AlignmentRule {
    pub fn for_value(value: &str) -> Option<Self> {
        let chars = value.chars().count();
        if value.starts_with('【') && chars < VERTICAL_MAX_CHARS {
            Some(Self::Vertical)
        } else if chars > WRAP_MIN_CHARS {
            Some(Self::Wrap)
        } else {
            None
        }
    }

    /// 元の alignment 属性から新しい属性を作る
    fn apply(self, current: &[(String, String)]) -> Vec<(String, String)> {
        let get = |key: &str| {
            current
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let mut attrs: Vec<(String, String)> = match self {
            Self::Vertical => vec![
                ("horizontal".into(), "center".into()),
                ("vertical".into(), "center".into()),
                ("textRotation".into(), "255".into()),
                ("wrapText".into(), "1".into()),
            ],
            Self::Wrap => vec![
                ("horizontal".into(), get("horizontal").unwrap_or_else(|| "left".into())),
                ("vertical".into(), get("vertical").unwrap_or_else(|| "top".into())),
                ("wrapText".into(), "1".into()),
            ],
        };

        if let Some(indent) = get("indent") {
            attrs.push(("indent".into(), indent));
        }
        if self == Self::Vertical {
            if let Some(shrink) = get("shrinkToFit") {
                attrs.push(("shrinkToFit".into(), shrink));
            }
        }
        attrs
    }
}

#[derive(Debug, Clone)]
struct CellXf {
    attrs: Vec<(String, String)>,
    alignment: Vec<(String, String)>,
    /// alignment 以外の子要素（protection など）をそのまま保持
    extra: Vec<u8>,
}

impl Default for CellXf {
    fn default() -> Self {
        Self {
            attrs: ["numFmtId", "fontId", "fillId", "borderId", "xfId"]
                .iter()
                .map(|k| (k.to_string(), "0".to_string()))
                .collect(),
            alignment: Vec::new(),
            extra: Vec::new(),
        }
    }
}

/// styles.xml の cellXfs
#[derive(Debug, Default)]
pub struct StyleBook {
    xfs: Vec<CellXf>,
    original_count: usize,
    derived: HashMap<(u32, AlignmentRule), u32>,
    prefix: String,
}

impl StyleBook {
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = XmlReader::from_reader(xml);
        let mut buf = Vec::new();
        let mut book = StyleBook::default();

        let mut in_cell_xfs = false;
        let mut current: Option<CellXf> = None;
        let mut extra = XmlWriter::new(Vec::new());
        let mut depth = 0usize;

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| write_err(format!("styles.xml の解析に失敗: {}", e)))?
            {
                Event::Eof => break,
                Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => {
                    in_cell_xfs = true;
                    book.prefix = element_prefix(&e);
                }
                Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
                Event::Start(e) if in_cell_xfs && current.is_none() && e.local_name().as_ref() == b"xf" => {
                    current = Some(CellXf {
                        attrs: collect_attrs(&e),
                        ..CellXf::default()
                    });
                }
                Event::Empty(e) if in_cell_xfs && current.is_none() && e.local_name().as_ref() == b"xf" => {
                    book.xfs.push(CellXf {
                        attrs: collect_attrs(&e),
                        ..CellXf::default()
                    });
                }
                Event::End(e) if current.is_some() && depth == 0 && e.local_name().as_ref() == b"xf" => {
                    if let Some(mut xf) = current.take() {
                        xf.extra = std::mem::take(extra.get_mut());
                        book.xfs.push(xf);
                    }
                }
                Event::Empty(e) if current.is_some() && depth == 0 && e.local_name().as_ref() == b"alignment" => {
                    if let Some(xf) = current.as_mut() {
                        xf.alignment = collect_attrs(&e);
                    }
                }
                event if current.is_some() => {
                    match &event {
                        Event::Start(_) => depth += 1,
                        Event::End(_) => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    extra.write_event(event)?;
                }
                _ => {}
            }
            buf.clear();
        }

        book.original_count = book.xfs.len();
        Ok(book)
    }

    /// 元書式に規則を適用した書式番号（初回のみ xf を追加）
    pub fn style_for(&mut self, base: u32, rule: AlignmentRule) -> u32 {
        if let Some(&index) = self.derived.get(&(base, rule)) {
            return index;
        }

        let source = self.xfs.get(base as usize).cloned().unwrap_or_default();
        let mut attrs: Vec<(String, String)> = source
            .attrs
            .into_iter()
            .filter(|(k, _)| k != "applyAlignment")
            .collect();
        attrs.push(("applyAlignment".into(), "1".into()));

        self.xfs.push(CellXf {
            attrs,
            alignment: rule.apply(&source.alignment),
            extra: source.extra,
        });

        let index = (self.xfs.len() - 1) as u32;
        self.derived.insert((base, rule), index);
        index
    }

    pub fn is_modified(&self) -> bool {
        self.xfs.len() > self.original_count
    }

    /// 追加した xf を反映した styles.xml を生成
    pub fn render(&self, xml: &[u8]) -> Result<Vec<u8>> {
        let mut reader = XmlReader::from_reader(xml);
        let mut writer = XmlWriter::new(Vec::new());
        let mut buf = Vec::new();
        let count = self.xfs.len().to_string();

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| write_err(format!("styles.xml の解析に失敗: {}", e)))?
            {
                Event::Eof => break,
                Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => {
                    writer.write_event(Event::Start(with_attribute(&e, "count", &count)))?;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"cellXfs" => {
                    let start = with_attribute(&e, "count", &count);
                    let end = BytesEnd::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    writer.write_event(Event::Start(start))?;
                    self.write_derived(&mut writer)?;
                    writer.write_event(Event::End(end))?;
                }
                Event::End(e) if e.local_name().as_ref() == b"cellXfs" => {
                    self.write_derived(&mut writer)?;
                    writer.write_event(Event::End(e))?;
                }
                other => writer.write_event(other)?,
            }
            buf.clear();
        }

        Ok(writer.into_inner())
    }

    fn write_derived(&self, writer: &mut XmlWriter<Vec<u8>>) -> Result<()> {
        for xf in &self.xfs[self.original_count..] {
            let xf_name = format!("{}xf", self.prefix);
            let mut start = BytesStart::new(xf_name.as_str());
            for (k, v) in &xf.attrs {
                start.push_attribute((k.as_str(), v.as_str()));
            }
            writer.write_event(Event::Start(start))?;

            if !xf.alignment.is_empty() {
                let align_name = format!("{}alignment", self.prefix);
                let mut align = BytesStart::new(align_name.as_str());
                for (k, v) in &xf.alignment {
                    align.push_attribute((k.as_str(), v.as_str()));
                }
                writer.write_event(Event::Empty(align))?;
            }
            writer.get_mut().write_all(&xf.extra)?;
            writer.write_event(Event::End(BytesEnd::new(xf_name.as_str())))?;
        }
        Ok(())
    }
}

fn collect_attrs(e: &BytesStart) -> Vec<(String, String)> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .filter_map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            a.unescape_value().ok().map(|v| (key, v.into_owned()))
        })
        .collect()
}
