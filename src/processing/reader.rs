//! CSV 解码与分隔符识别

use std::collections::BTreeSet;

use super::{parse::normalize_login, table::RawTable, ProcessingError};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// 去掉 UTF-8 BOM，非法 UTF-8 按 Latin-1 读取
pub fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&UTF8_BOM[..]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// 根据表头选择分隔符，tab 或 `;` 多于逗号时使用它们
pub fn detect_separator(first_line: &str) -> u8 {
    let commas = first_line.matches(',').count();
    if first_line.matches('\t').count() > commas {
        b'\t'
    } else if first_line.matches(';').count() > commas {
        b';'
    } else {
        b','
    }
}

fn reader_for(text: &str, has_headers: bool) -> csv::Reader<&[u8]> {
    let separator = detect_separator(text.lines().next().unwrap_or(""));
    csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

/// 读取带表头的 CSV，行短则补齐，行长则截断
pub fn read_table(bytes: &[u8], file: &'static str) -> Result<RawTable, ProcessingError> {
    let text = decode(bytes);
    let mut reader = reader_for(&text, true);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ProcessingError::Unreadable {
            file,
            reason: e.to_string(),
        })?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ProcessingError::NoHeader(file));
    }

    let mut table = RawTable::new(headers);
    let width = table.headers.len();

    for record in reader.records() {
        let record = record.map_err(|e| ProcessingError::Unreadable {
            file,
            reason: e.to_string(),
        })?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        let mut row: Vec<String> = record.iter().take(width).map(|c| c.to_string()).collect();
        row.resize(width, String::new());
        table.rows.push(row);
    }

    Ok(table)
}

/// 读取无表头的账号名单，每行第一列作为账号
pub fn read_login_set(bytes: &[u8], file: &'static str) -> Result<BTreeSet<String>, ProcessingError> {
    let text = decode(bytes);
    let mut reader = reader_for(&text, false);
    let mut logins = BTreeSet::new();

    for record in reader.records() {
        let record = record.map_err(|e| ProcessingError::Unreadable {
            file,
            reason: e.to_string(),
        })?;
        if let Some(first) = record.get(0) {
            let login = normalize_login(first);
            if !login.is_empty() {
                logins.insert(login);
            }
        }
    }

    Ok(logins)
}
