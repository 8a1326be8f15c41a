//! 处理流程各阶段共用的表格类型

use serde::{Deserialize, Serialize};

use super::{parse::round4, ProcessingError};

/// 汇总表末尾合计行的标签
pub const SUMMARY_LABEL: &str = "Summary";

/// 按账户汇总表的列
pub const AGGREGATE_COLUMNS: [&str; 8] = [
    "Login",
    "Total Volume",
    "Trader Profit",
    "Swaps",
    "Commission",
    "TP Profit",
    "Broker Profit",
    "Net",
];

/// 原始 CSV 内容：表头加按表头宽度补齐的字符串行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// 必需列的位置，缺失时报错
    pub fn require(&self, name: &str) -> Result<usize, ProcessingError> {
        self.column_index(name)
            .ok_or_else(|| ProcessingError::MissingColumn(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 表头相同的空表
    pub fn empty_like(&self) -> Self {
        Self::new(self.headers.clone())
    }

    pub fn to_report_table(&self, name: &str) -> ReportTable {
        ReportTable {
            name: name.to_string(),
            columns: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(|c| Cell::Text(c.clone())).collect())
                .collect(),
        }
    }
}

/// 结果表单元格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

/// 返回给客户端的命名表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// 单个账户的交易量与盈亏合计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub login: String,
    pub total_volume: f64,
    pub trader_profit: f64,
    pub swaps: f64,
    pub commission: f64,
    pub tp_profit: f64,
    pub broker_profit: f64,
    pub net: f64,
}

impl AggregateRow {
    fn rounded(mut self) -> Self {
        self.total_volume = round4(self.total_volume);
        self.trader_profit = round4(self.trader_profit);
        self.swaps = round4(self.swaps);
        self.commission = round4(self.commission);
        self.tp_profit = round4(self.tp_profit);
        self.broker_profit = round4(self.broker_profit);
        self.net = round4(self.net);
        self
    }

    fn accumulate(&mut self, other: &AggregateRow) {
        self.total_volume += other.total_volume;
        self.trader_profit += other.trader_profit;
        self.swaps += other.swaps;
        self.commission += other.commission;
        self.tp_profit += other.tp_profit;
        self.broker_profit += other.broker_profit;
        self.net += other.net;
    }

    /// 展示时才四舍五入到 4 位小数
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.login.clone()),
            Cell::Number(round4(self.total_volume)),
            Cell::Number(round4(self.trader_profit)),
            Cell::Number(round4(self.swaps)),
            Cell::Number(round4(self.commission)),
            Cell::Number(round4(self.tp_profit)),
            Cell::Number(round4(self.broker_profit)),
            Cell::Number(round4(self.net)),
        ]
    }
}

/// 按账户的明细行，加上四舍五入后的合计行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTable {
    pub rows: Vec<AggregateRow>,
    pub summary: Option<AggregateRow>,
}

impl AggregateTable {
    /// 明细行保留原值，合计行为原值求和后再取 4 位小数。
    /// 没有明细行时不生成合计行
    pub fn from_rows(rows: Vec<AggregateRow>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }

        let mut summary = AggregateRow {
            login: SUMMARY_LABEL.to_string(),
            ..Default::default()
        };
        for row in &rows {
            summary.accumulate(row);
        }

        Self {
            rows,
            summary: Some(summary.rounded()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 合计行的某个值，空表为 0
    pub fn summary_value(&self, field: impl Fn(&AggregateRow) -> f64) -> f64 {
        self.summary.as_ref().map(field).unwrap_or(0.0)
    }

    pub fn to_report_table(&self, name: &str) -> ReportTable {
        ReportTable {
            name: name.to_string(),
            columns: AGGREGATE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .chain(self.summary.iter())
                .map(AggregateRow::cells)
                .collect(),
        }
    }
}
