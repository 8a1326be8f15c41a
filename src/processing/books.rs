//! Book 分流、逐笔成交补充字段与按账号聚合

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use super::{
    parse::{convert_usc, normalize_login, parse_datetime, round4, sanitize_number, DateRange},
    table::{AggregateRow, AggregateTable, RawTable},
    ProcessingError,
};

pub const PROCESSING_RULE: &str = "Processing rule";
pub const DATE_TIME_COLUMN: &str = "Date & Time (UTC)";
pub const GROUP: &str = "Group";
pub const LOGIN: &str = "Login";
pub const NOTIONAL_VOLUME: &str = "Notional volume in USD";
pub const TRADER_PROFIT: &str = "Trader profit";
pub const SWAPS: &str = "Swaps";
pub const COMMISSION: &str = "Commission";
pub const TP_BROKER_PROFIT: &str = "TP broker profit";
pub const TOTAL_BROKER_PROFIT: &str = "Total broker profit";

/// 把成交从 Multi Book 分流出去的处理规则
const RULE_A_BOOK: &str = "Pipwise";
const RULE_B_BOOK: &str = "Retail B-book";

/// 成交导出文件中按位置取的列
const DEAL_ID_COLUMN: usize = 0;
const PROFIT_COLUMN: usize = 6;
const TIMESTAMP_COLUMN: usize = 7;

pub const ENRICHED_COLUMNS: [&str; 4] = ["Profit Value", "Profit Unit", "Date", "Time"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Book {
    A,
    B,
    Multi,
}

impl Book {
    pub const ALL: [Book; 3] = [Book::A, Book::B, Book::Multi];

    pub fn label(&self) -> &'static str {
        match self {
            Book::A => "A Book",
            Book::B => "B Book",
            Book::Multi => "Multi Book",
        }
    }

    pub fn for_rule(rule: &str) -> Book {
        match rule.trim() {
            RULE_A_BOOK => Book::A,
            RULE_B_BOOK => Book::B,
            _ => Book::Multi,
        }
    }
}

/// 每个 Book 一份数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookSet<T> {
    pub a: T,
    pub b: T,
    pub multi: T,
}

impl<T> BookSet<T> {
    pub fn get(&self, book: Book) -> &T {
        match book {
            Book::A => &self.a,
            Book::B => &self.b,
            Book::Multi => &self.multi,
        }
    }

    pub fn get_mut(&mut self, book: Book) -> &mut T {
        match book {
            Book::A => &mut self.a,
            Book::B => &mut self.b,
            Book::Multi => &mut self.multi,
        }
    }

    /// 按 A、B、Multi 顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (Book, &T)> + '_ {
        Book::ALL.into_iter().map(move |book| (book, self.get(book)))
    }

    pub fn try_map<U, E>(&self, mut f: impl FnMut(Book, &T) -> Result<U, E>) -> Result<BookSet<U>, E> {
        Ok(BookSet {
            a: f(Book::A, &self.a)?,
            b: f(Book::B, &self.b)?,
            multi: f(Book::Multi, &self.multi)?,
        })
    }

    pub fn map<U>(&self, mut f: impl FnMut(Book, &T) -> U) -> BookSet<U> {
        BookSet {
            a: f(Book::A, &self.a),
            b: f(Book::B, &self.b),
            multi: f(Book::Multi, &self.multi),
        }
    }
}

/// 聚合所需各数值列的位置
#[derive(Debug, Clone, Copy)]
pub struct DealColumns {
    pub login: usize,
    pub volume: usize,
    pub trader_profit: usize,
    pub swaps: usize,
    pub commission: usize,
    pub tp_profit: usize,
    pub broker_profit: usize,
}

impl DealColumns {
    pub fn locate(table: &RawTable) -> Result<Self, ProcessingError> {
        Ok(Self {
            login: table.require(LOGIN)?,
            volume: table.require(NOTIONAL_VOLUME)?,
            trader_profit: table.require(TRADER_PROFIT)?,
            swaps: table.require(SWAPS)?,
            commission: table.require(COMMISSION)?,
            tp_profit: table.require(TP_BROKER_PROFIT)?,
            broker_profit: table.require(TOTAL_BROKER_PROFIT)?,
        })
    }

    pub fn login(&self, row: &[String]) -> String {
        normalize_login(cell(row, self.login))
    }

    /// 把该行数值累加到 `into`，`net` 由调用方计算
    pub fn accumulate(&self, row: &[String], into: &mut AggregateRow) {
        into.total_volume += sanitize_number(cell(row, self.volume));
        into.trader_profit += sanitize_number(cell(row, self.trader_profit));
        into.swaps += sanitize_number(cell(row, self.swaps));
        into.commission += sanitize_number(cell(row, self.commission));
        into.tp_profit += sanitize_number(cell(row, self.tp_profit));
        into.broker_profit += sanitize_number(cell(row, self.broker_profit));
    }
}

pub(crate) fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

/// 账号都是数字时按数值排序，数字排在文本之前
pub(crate) fn compare_logins(a: &str, b: &str) -> Ordering {
    match (a.parse::<i128>(), b.parse::<i128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// 转换 USC 金额，并按处理规则把成交分到各 Book
pub fn split_books(deals: &RawTable) -> Result<BookSet<RawTable>, ProcessingError> {
    let rule_index = deals.require(PROCESSING_RULE)?;

    let mut books = BookSet {
        a: deals.empty_like(),
        b: deals.empty_like(),
        multi: deals.empty_like(),
    };

    for row in &deals.rows {
        let converted: Vec<String> = row.iter().map(|c| convert_usc(c)).collect();
        let book = Book::for_rule(cell(&converted, rule_index));
        books.get_mut(book).rows.push(converted);
    }

    tracing::debug!(
        a_book = books.a.rows.len(),
        b_book = books.b.rows.len(),
        multi_book = books.multi.rows.len(),
        "Deals split into books"
    );

    Ok(books)
}

/// 去掉重复的成交编号（保留第一条），追加盈亏数值、单位和日期、时间列
pub fn enrich_and_dedupe(table: &RawTable) -> RawTable {
    let mut headers = table.headers.clone();
    headers.extend(ENRICHED_COLUMNS.iter().map(|c| c.to_string()));
    let mut enriched = RawTable::new(headers);

    let mut seen = HashSet::new();
    for row in &table.rows {
        let deal = cell(row, DEAL_ID_COLUMN).trim().to_string();
        if !seen.insert(deal) {
            continue;
        }

        let raw_profit = cell(row, PROFIT_COLUMN);
        let value = round4(sanitize_number(raw_profit));
        let unit: String = raw_profit
            .chars()
            .filter(|c| !(c.is_ascii_digit() || *c == '.' || *c == '-'))
            .collect::<String>()
            .trim()
            .to_uppercase();

        let (date, time) = match parse_datetime(cell(row, TIMESTAMP_COLUMN)) {
            Some(dt) => (
                dt.format("%Y-%m-%d").to_string(),
                dt.format("%H:%M:%S").to_string(),
            ),
            None => (String::new(), String::new()),
        };

        let mut out = row.clone();
        out.extend([value.to_string(), unit, date, time]);
        enriched.rows.push(out);
    }

    enriched
}

/// 保留 `Date & Time (UTC)` 落在区间内的成交。
/// 没有该列的表原样返回
pub fn filter_by_date_range(table: &RawTable, range: &DateRange) -> RawTable {
    let Some(index) = table.column_index(DATE_TIME_COLUMN) else {
        return table.clone();
    };

    let mut filtered = table.empty_like();
    filtered.rows = table
        .rows
        .iter()
        .filter(|row| {
            parse_datetime(cell(row, index))
                .map(|at| range.contains(&at))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    filtered
}

/// 单个 Book 按账号汇总。
///
/// 排除账号不出现在 B Book 中。在 A 和 Multi Book 中保留交易量、
/// 客户盈亏和隔夜利息，但不计佣金、TP 盈亏和经纪商盈亏。
pub fn aggregate_book(
    table: &RawTable,
    excluded: &BTreeSet<String>,
    book: Book,
) -> Result<AggregateTable, ProcessingError> {
    if table.is_empty() {
        return Ok(AggregateTable::default());
    }

    let columns = DealColumns::locate(table)?;

    let mut totals: HashMap<String, AggregateRow> = HashMap::new();
    for row in &table.rows {
        let login = columns.login(row);
        if login.is_empty() {
            continue;
        }
        let entry = totals.entry(login.clone()).or_insert_with(|| AggregateRow {
            login,
            ..Default::default()
        });
        columns.accumulate(row, entry);
    }

    let mut logins: Vec<String> = totals.keys().cloned().collect();
    logins.sort_by(|a, b| compare_logins(a, b));

    let mut rows = Vec::with_capacity(logins.len());
    for login in logins {
        let Some(mut row) = totals.remove(&login) else {
            continue;
        };
        let is_excluded = excluded.contains(&login);

        if is_excluded {
            if book == Book::B {
                continue;
            }
            row.commission = 0.0;
            row.tp_profit = 0.0;
            row.broker_profit = 0.0;
        }

        row.net = row.trader_profit + row.swaps - row.commission;
        rows.push(row);
    }

    Ok(AggregateTable::from_rows(rows))
}
