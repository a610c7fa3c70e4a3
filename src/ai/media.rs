//! 拡張子からMIMEタイプを判定

use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";

/// Geminiが受け付ける主な形式
const KNOWN_TYPES: &[(&str, &str)] = &[
    ("mp3", "audio/mp3"),
    ("wav", "audio/wav"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("flac", "audio/flac"),
    ("ogg", "audio/ogg"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
];

pub fn mime_type_for(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if let Some((_, mime)) = KNOWN_TYPES.iter().find(|(known, _)| *known == ext) {
        return mime.to_string();
    }

    mime_guess::from_path(path)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// Excelファイルか（中間評価データの読み込み対象）
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let ext = e.to_string_lossy().to_lowercase();
            ext == "xlsx" || ext == "xls"
        })
        .unwrap_or(false)
}
