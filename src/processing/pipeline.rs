//! 基于三个上传文件的完整报表生成

use std::collections::BTreeSet;

use crate::config::ReportConfig;

use super::{
    analysis::{chinese_clients, client_summary, vip_volume, FinalFigures},
    books::{aggregate_book, enrich_and_dedupe, filter_by_date_range, split_books, Book, BookSet},
    parse::DateRange,
    reader::{read_login_set, read_table},
    table::{AggregateTable, RawTable, ReportTable},
    ProcessingError,
};

pub const DEFAULT_LOT_SIZE: f64 = 200_000.0;

pub const CHINESE_CLIENTS: &str = "Chinese Clients";
pub const CLIENT_SUMMARY: &str = "Client Summary";
pub const FINAL_CALCULATIONS: &str = "Final Calculations";

/// 上传文件的原始字节
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub deals: &'a [u8],
    pub excluded: &'a [u8],
    pub vip: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub date_range: Option<DateRange>,
    /// 每手对应的名义美元金额
    pub lot_size: f64,
    pub chinese_group_prefixes: Vec<String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            date_range: None,
            lot_size: DEFAULT_LOT_SIZE,
            chinese_group_prefixes: vec![r"real\Chines".to_string(), r"BBOOK\Chines".to_string()],
        }
    }
}

impl ReportOptions {
    pub fn from_config(config: &ReportConfig, date_range: Option<DateRange>) -> Self {
        Self {
            date_range,
            lot_size: config.lot_size,
            chinese_group_prefixes: config.chinese_group_prefixes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutput {
    /// 各 Book 经补充、去重和日期过滤后的成交
    pub raw: BookSet<RawTable>,
    pub results: BookSet<AggregateTable>,
    pub chinese_clients: AggregateTable,
    pub client_summary: AggregateTable,
    pub final_figures: FinalFigures,
    pub vip_volume: f64,
    pub date_range: Option<DateRange>,
    pub lot_size: f64,
}

impl ReportOutput {
    /// 按展示顺序排列的命名结果表
    pub fn tables(&self) -> Vec<ReportTable> {
        let mut tables = Vec::with_capacity(9);

        for (book, raw) in self.raw.iter() {
            tables.push(raw.to_report_table(&format!("{} Raw", book.label())));
        }
        for (book, result) in self.results.iter() {
            tables.push(result.to_report_table(&format!("{} Result", book.label())));
        }

        tables.push(self.chinese_clients.to_report_table(CHINESE_CLIENTS));
        tables.push(self.client_summary.to_report_table(CLIENT_SUMMARY));
        tables.push(
            self.final_figures
                .to_report_table(FINAL_CALCULATIONS, self.date_range.as_ref()),
        );
        tables
    }
}

/// 生成完整报表，相同的输入和选项总是得到相同结果
pub fn run(inputs: ReportInputs<'_>, options: &ReportOptions) -> Result<ReportOutput, ProcessingError> {
    let excluded: BTreeSet<String> = read_login_set(inputs.excluded, "excluded accounts")?;
    let vip: BTreeSet<String> = read_login_set(inputs.vip, "VIP clients")?;
    let deals = read_table(inputs.deals, "deals")?;

    tracing::debug!(
        deals = deals.rows.len(),
        excluded = excluded.len(),
        vip = vip.len(),
        "Report inputs loaded"
    );

    let split = split_books(&deals)?;
    let mut raw = split.map(|_, table| enrich_and_dedupe(table));

    if let Some(range) = &options.date_range {
        raw = raw.map(|_, table| filter_by_date_range(table, range));
        tracing::debug!(range = %range.label, "Date range applied");
    }

    let results = raw.try_map(|book: Book, table| aggregate_book(table, &excluded, book))?;

    let chinese = chinese_clients(&raw, &excluded, &options.chinese_group_prefixes);
    let summary = client_summary(&results);
    let vip_total = vip_volume(&raw, &vip, &excluded);
    let final_figures = FinalFigures::compute(&results, &chinese, vip_total, options.lot_size);

    Ok(ReportOutput {
        raw,
        results,
        chinese_clients: chinese,
        client_summary: summary,
        final_figures,
        vip_volume: vip_total,
        date_range: options.date_range.clone(),
        lot_size: options.lot_size,
    })
}
