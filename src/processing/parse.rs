//! 数值、账号、货币与时间的解析工具

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::ProcessingError;

/// `<数字> USC` 金额，单位为美分
static USC_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d.\-]*)\s*usc").expect("USC pattern is valid")
});

const DATETIME_FORMATS: [&str; 6] = [
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y.%m.%d %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y"];

/// 保留 4 位小数，非有限值和负零返回 0
pub fn round4(x: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    let rounded = (x * 10_000.0).round() / 10_000.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// 只保留数字、`.` 和 `-` 后解析，无法解析时为 0
pub fn sanitize_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// 规范化交易账号，用于分组和名单匹配。
///
/// 表格导出有时把 `1001` 写成 `1001.0`，两者都映射为 `1001`
pub fn normalize_login(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("nan") {
        return String::new();
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 && trimmed.contains('.') => {
            format!("{}", v as i64)
        }
        _ => trimmed.to_string(),
    }
}

/// 把所有 `<n> USC` 改写为 `<n/100> USD`
pub fn convert_usc(cell: &str) -> String {
    if !cell.to_ascii_lowercase().contains("usc") {
        return cell.to_string();
    }
    USC_AMOUNT
        .replace_all(cell, |caps: &Captures| match caps[1].parse::<f64>() {
            Ok(cents) => format!("{:.4} USD", round4(cents / 100.0)),
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

/// 按交易导出常见格式解析时间，统一为 UTC
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }

    if let Some(date) = parse_date(s) {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// 成交过滤用的闭区间时间窗口
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// 展示用文本，如 `From 2024-01-01 to 2024-01-31`
    pub label: String,
}

impl DateRange {
    /// 解析用户输入的起止时间。只有日期时按当天 00:00:00 处理，两端均包含
    pub fn parse(start: &str, end: &str) -> Result<Self, ProcessingError> {
        let start_dt =
            parse_datetime(start).ok_or_else(|| ProcessingError::InvalidDate(start.to_string()))?;
        let end_dt =
            parse_datetime(end).ok_or_else(|| ProcessingError::InvalidDate(end.to_string()))?;

        if start_dt > end_dt {
            return Err(ProcessingError::InvertedDateRange);
        }

        Ok(Self {
            start: start_dt,
            end: end_dt,
            label: format!("From {} to {}", start.trim(), end.trim()),
        })
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at <= self.end
    }
}
