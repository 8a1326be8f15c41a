//! 跨 Book 分析：中国客户、客户汇总、VIP 交易量与最终数值

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::{
    books::{cell, Book, BookSet, DealColumns, GROUP, LOGIN, NOTIONAL_VOLUME},
    parse::{normalize_login, round4, sanitize_number, DateRange},
    table::{AggregateRow, AggregateTable, Cell, RawTable, ReportTable},
};

pub const FINAL_COLUMNS: [&str; 3] = ["Source", "Description", "Value"];

/// 按账号累加，保持账号首次出现的顺序
#[derive(Default)]
struct FirstSeen {
    order: Vec<String>,
    totals: HashMap<String, AggregateRow>,
}

impl FirstSeen {
    fn entry(&mut self, login: &str) -> &mut AggregateRow {
        if !self.totals.contains_key(login) {
            self.order.push(login.to_string());
        }
        self.totals.entry(login.to_string()).or_insert_with(|| AggregateRow {
            login: login.to_string(),
            ..Default::default()
        })
    }

    fn into_rows(mut self) -> Vec<AggregateRow> {
        self.order
            .iter()
            .filter_map(|login| self.totals.remove(login))
            .collect()
    }
}

/// 分组以 `prefixes` 之一开头的客户，跨所有 Book 汇总。
/// 缺少必需列的 Book 会被跳过
pub fn chinese_clients(
    books: &BookSet<RawTable>,
    excluded: &BTreeSet<String>,
    prefixes: &[String],
) -> AggregateTable {
    let mut seen = FirstSeen::default();

    for (book, table) in books.iter() {
        if table.is_empty() {
            continue;
        }
        let (Ok(columns), Some(group_index)) = (DealColumns::locate(table), table.column_index(GROUP))
        else {
            tracing::debug!(book = book.label(), "Book lacks client columns, skipped");
            continue;
        };

        for row in &table.rows {
            let login = columns.login(row);
            if login.is_empty() || excluded.contains(&login) {
                continue;
            }
            let group = cell(row, group_index).trim();
            if !prefixes.iter().any(|p| group.starts_with(p.as_str())) {
                continue;
            }
            columns.accumulate(row, seen.entry(&login));
        }
    }

    let rows = seen
        .into_rows()
        .into_iter()
        .map(|mut row| {
            row.net = row.trader_profit + row.swaps - row.commission;
            row
        })
        .collect();

    AggregateTable::from_rows(rows)
}

/// 三个 Book 结果按账号合计
pub fn client_summary(results: &BookSet<AggregateTable>) -> AggregateTable {
    let mut seen = FirstSeen::default();

    for (_, result) in results.iter() {
        for row in &result.rows {
            let entry = seen.entry(&row.login);
            entry.total_volume += row.total_volume;
            entry.trader_profit += row.trader_profit;
            entry.swaps += row.swaps;
            entry.commission += row.commission;
            entry.tp_profit += row.tp_profit;
            entry.broker_profit += row.broker_profit;
            entry.net += row.net;
        }
    }

    AggregateTable::from_rows(seen.into_rows())
}

/// 未被排除的 VIP 客户的名义交易量
pub fn vip_volume(books: &BookSet<RawTable>, vip: &BTreeSet<String>, excluded: &BTreeSet<String>) -> f64 {
    let mut total = 0.0;

    for (_, table) in books.iter() {
        let (Some(login), Some(volume)) = (table.column_index(LOGIN), table.column_index(NOTIONAL_VOLUME))
        else {
            continue;
        };

        for row in &table.rows {
            let login = normalize_login(cell(row, login));
            if !login.is_empty() && vip.contains(&login) && !excluded.contains(&login) {
                total += sanitize_number(cell(row, volume));
            }
        }
    }

    round4(total)
}

/// 由各 Book 结果得出的最终数值
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinalFigures {
    pub a_book_result: f64,
    pub multi_book_a_result: f64,
    pub total_a_book: f64,

    pub b_book_result: f64,
    pub multi_book_b_result: f64,
    pub total_b_book: f64,

    pub client_spread: f64,
    pub client_commission: f64,
    pub total_swaps: f64,

    pub a_book_lots: f64,
    pub b_book_lots: f64,
    pub chinese_lots: f64,
    pub vip_lots: f64,
    pub retail_lots: f64,
    pub total_lots: f64,
}

impl FinalFigures {
    pub fn compute(
        results: &BookSet<AggregateTable>,
        chinese: &AggregateTable,
        vip_volume: f64,
        lot_size: f64,
    ) -> Self {
        let sum = |book: Book, field: fn(&AggregateRow) -> f64| results.get(book).summary_value(field);

        let a_commission = sum(Book::A, |r| r.commission);
        let a_tp = sum(Book::A, |r| r.tp_profit);
        let multi_commission = sum(Book::Multi, |r| r.commission);
        let multi_tp = sum(Book::Multi, |r| r.tp_profit);

        // B Book 的盈亏与客户方向相反
        let b_result = -sum(Book::B, |r| r.net);
        let multi_b_result = sum(Book::Multi, |r| r.broker_profit) - multi_tp;

        let a_volume = sum(Book::A, |r| r.total_volume);
        let b_volume = sum(Book::B, |r| r.total_volume);
        let multi_volume = sum(Book::Multi, |r| r.total_volume);

        let a_lots = (a_volume + multi_volume) / lot_size;
        let b_lots = b_volume / lot_size;
        let chinese_lots = chinese.summary_value(|r| r.total_volume) / lot_size;
        let vip_lots = vip_volume / lot_size;

        Self {
            a_book_result: round4(a_tp + a_commission),
            multi_book_a_result: round4(multi_tp + multi_commission),
            total_a_book: round4(a_tp + a_commission + multi_tp + multi_commission),
            b_book_result: round4(b_result),
            multi_book_b_result: round4(multi_b_result),
            total_b_book: round4(b_result + multi_b_result),
            client_spread: round4(a_tp + multi_tp),
            client_commission: round4(a_commission + multi_commission),
            total_swaps: round4(sum(Book::A, |r| r.swaps) + sum(Book::Multi, |r| r.swaps)),
            a_book_lots: round4(a_lots),
            b_book_lots: round4(b_lots),
            chinese_lots: round4(chinese_lots),
            vip_lots: round4(vip_lots),
            retail_lots: round4(a_lots + b_lots - chinese_lots - vip_lots),
            total_lots: round4(a_lots + b_lots),
        }
    }

    /// Source / Description / Value 三列布局，带分节标题和空行
    pub fn to_report_table(&self, name: &str, date_range: Option<&DateRange>) -> ReportTable {
        fn line(source: &str, description: &str, value: Cell) -> Vec<Cell> {
            vec![Cell::text(source), Cell::text(description), value]
        }
        fn heading(title: &str) -> Vec<Cell> {
            line(title, "", Cell::text(""))
        }
        fn header() -> Vec<Cell> {
            FINAL_COLUMNS.iter().map(|c| Cell::text(c)).collect()
        }
        let blank = || heading("");
        let num = Cell::Number;

        let mut rows = Vec::new();
        if let Some(range) = date_range {
            rows.push(line("DATE RANGE", "", Cell::text(&range.label)));
            rows.push(blank());
        }

        rows.extend([
            heading("A BOOK SUMMARY"),
            header(),
            line("A Book Result", "Sum of TP Broker Profit + Commission", num(self.a_book_result)),
            line("Multi Book Result", "Sum of TP Broker Profit + Commission", num(self.multi_book_a_result)),
            line("Total A Book", "Sum of above two values", num(self.total_a_book)),
            blank(),
            heading("B BOOK SUMMARY"),
            header(),
            line("B Book Result", "(-1) * Sum of (Trader + Swaps - Commission)", num(self.b_book_result)),
            line("Multi Book Result", "Total Broker Profit - TP Broker Profit", num(self.multi_book_b_result)),
            line("Total B Book", "Sum of above two values", num(self.total_b_book)),
            blank(),
            heading("EXTRA SUMMARY DATA"),
            line("A Book", "Client's Spread (TP Broker Profit)", num(self.client_spread)),
            line("A Book", "Client's Commission", num(self.client_commission)),
            line("Total Swap", "Sum of all Swaps", num(self.total_swaps)),
            line("A Book", "Volume (Lot)", num(self.a_book_lots)),
            line("B Book", "Volume (Lot)", num(self.b_book_lots)),
            line("Chinese Clients", "Volume (Lot)", num(self.chinese_lots)),
            line("VIP Clients", "Volume (Lot)", num(self.vip_lots)),
            line("Retail Clients", "Volume (Lot)", num(self.retail_lots)),
            line("Total Volume", "A Book + B Book", num(self.total_lots)),
        ]);

        ReportTable {
            name: name.to_string(),
            columns: FINAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::books::{
        COMMISSION, SWAPS, TOTAL_BROKER_PROFIT, TP_BROKER_PROFIT, TRADER_PROFIT,
    };

    fn deals(rows: &[[&str; 8]]) -> RawTable {
        let headers = [
            LOGIN,
            GROUP,
            NOTIONAL_VOLUME,
            TRADER_PROFIT,
            SWAPS,
            COMMISSION,
            TP_BROKER_PROFIT,
            TOTAL_BROKER_PROFIT,
        ];
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn logins(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn prefixes() -> Vec<String> {
        vec![r"real\Chines".to_string(), r"BBOOK\Chines".to_string()]
    }

    fn result_row(login: &str, volume: f64, commission: f64, tp: f64, broker: f64, net: f64) -> AggregateRow {
        AggregateRow {
            login: login.to_string(),
            total_volume: volume,
            commission,
            tp_profit: tp,
            broker_profit: broker,
            net,
            ..Default::default()
        }
    }

    #[test]
    fn test_chinese_clients_filters_by_group_prefix() {
        let books = BookSet {
            a: deals(&[
                ["2002", r"real\Chinese-1", "100", "1", "0", "0", "0", "0"],
                ["1001", r"real\Europe", "500", "1", "0", "0", "0", "0"],
            ]),
            b: deals(&[
                ["3003", r"BBOOK\Chinese", "50", "2", "1", "1", "0", "0"],
                ["2002", r"BBOOK\Chinese", "20", "1", "0", "0", "0", "0"],
                ["4004", r"BBOOK\Chinese", "999", "0", "0", "0", "0", "0"],
            ]),
            multi: RawTable::default(),
        };

        let table = chinese_clients(&books, &logins(&["4004"]), &prefixes());

        let order: Vec<&str> = table.rows.iter().map(|r| r.login.as_str()).collect();
        assert_eq!(order, vec!["2002", "3003"]);
        assert_eq!(table.rows[0].total_volume, 120.0);
        // 2 + 1 - 1
        assert_eq!(table.rows[1].net, 2.0);
        assert_eq!(table.summary_value(|r| r.total_volume), 170.0);
    }

    #[test]
    fn test_chinese_clients_skips_books_without_group() {
        let mut a = deals(&[["2002", r"real\Chinese", "100", "0", "0", "0", "0", "0"]]);
        a.headers[1] = "Segment".to_string();
        let books = BookSet {
            a,
            ..Default::default()
        };

        assert!(chinese_clients(&books, &BTreeSet::new(), &prefixes()).is_empty());
    }

    #[test]
    fn test_client_summary_merges_books_in_first_seen_order() {
        let results = BookSet {
            a: AggregateTable::from_rows(vec![result_row("20", 10.0, 1.0, 0.0, 0.0, 5.0)]),
            b: AggregateTable::from_rows(vec![
                result_row("10", 5.0, 0.0, 0.0, 0.0, 1.0),
                result_row("20", 2.0, 0.5, 0.0, 0.0, -1.0),
            ]),
            multi: AggregateTable::default(),
        };

        let summary = client_summary(&results);

        assert_eq!(summary.rows[0].login, "20");
        assert_eq!(summary.rows[0].total_volume, 12.0);
        assert_eq!(summary.rows[0].net, 4.0);
        assert_eq!(summary.rows[1].login, "10");
        assert_eq!(summary.summary_value(|r| r.commission), 1.5);
    }

    #[test]
    fn test_vip_volume_ignores_excluded() {
        let books = BookSet {
            a: deals(&[
                ["1", "", "100", "0", "0", "0", "0", "0"],
                ["2", "", "40", "0", "0", "0", "0", "0"],
            ]),
            multi: deals(&[["1", "", "25.5", "0", "0", "0", "0", "0"]]),
            ..Default::default()
        };

        assert_eq!(vip_volume(&books, &logins(&["1", "2"]), &logins(&["2"])), 125.5);
    }

    #[test]
    fn test_final_figures() {
        let results = BookSet {
            a: AggregateTable::from_rows(vec![result_row("1", 200_000.0, 10.0, 5.0, 0.0, 0.0)]),
            b: AggregateTable::from_rows(vec![result_row("2", 400_000.0, 0.0, 0.0, 0.0, -30.0)]),
            multi: AggregateTable::from_rows(vec![result_row("3", 200_000.0, 2.0, 3.0, 8.0, 0.0)]),
        };
        let chinese = AggregateTable::from_rows(vec![result_row("2", 100_000.0, 0.0, 0.0, 0.0, 0.0)]);

        let figures = FinalFigures::compute(&results, &chinese, 200_000.0, 200_000.0);

        assert_eq!(figures.a_book_result, 15.0);
        assert_eq!(figures.multi_book_a_result, 5.0);
        assert_eq!(figures.total_a_book, 20.0);
        assert_eq!(figures.b_book_result, 30.0);
        assert_eq!(figures.multi_book_b_result, 5.0);
        assert_eq!(figures.total_b_book, 35.0);
        assert_eq!(figures.a_book_lots, 2.0);
        assert_eq!(figures.b_book_lots, 2.0);
        assert_eq!(figures.chinese_lots, 0.5);
        assert_eq!(figures.vip_lots, 1.0);
        assert_eq!(figures.retail_lots, 2.5);
        assert_eq!(figures.total_lots, 4.0);
    }

    #[test]
    fn test_final_figures_keep_small_commissions() {
        let small = |login: &str| result_row(login, 0.0, 0.00004, 0.0, 0.0, 0.0);
        let results = BookSet {
            a: AggregateTable::from_rows(vec![small("1"), small("2"), small("3")]),
            ..Default::default()
        };

        let figures = FinalFigures::compute(&results, &AggregateTable::default(), 0.0, 100_000.0);

        assert_eq!(figures.a_book_result, 0.0001);
        assert_eq!(figures.client_commission, 0.0001);
        assert_eq!(figures.total_a_book, 0.0001);
    }

    #[test]
    fn test_final_table_layout() {
        let figures = FinalFigures::default();

        let plain = figures.to_report_table("Final Calculations", None);
        assert_eq!(plain.rows.len(), 22);
        assert_eq!(plain.rows[0][0], Cell::text("A BOOK SUMMARY"));

        let range = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        let dated = figures.to_report_table("Final Calculations", Some(&range));
        assert_eq!(dated.rows.len(), 24);
        assert_eq!(dated.rows[0][2], Cell::text("From 2024-01-01 to 2024-01-31"));
    }
}
