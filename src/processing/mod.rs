//! 成交报表处理流程
//!
//! 把上传的三个 CSV 文件（成交、排除账号、VIP 客户）转换为报表接口返回的
//! 命名结果表和图表数据。
//! 这里全部是同步代码，只处理字节切片，服务层在阻塞线程上调用。

pub mod analysis;
pub mod books;
pub mod charts;
pub mod parse;
pub mod pipeline;
pub mod reader;
pub mod table;

use thiserror::Error;

pub use books::{Book, BookSet};
pub use charts::{build_charts, Chart, ChartKind, ChartPoint};
pub use parse::DateRange;
pub use pipeline::{run, ReportInputs, ReportOptions, ReportOutput};
pub use table::{AggregateRow, AggregateTable, Cell, RawTable, ReportTable};

/// 文件转换为报表过程中的错误
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Missing '{0}' column in the deals CSV.")]
    MissingColumn(String),

    #[error("The {0} file has no header row.")]
    NoHeader(&'static str),

    #[error("Could not read the {file} file: {reason}")]
    Unreadable { file: &'static str, reason: String },

    #[error("Invalid date: '{0}'")]
    InvalidDate(String),

    #[error("Start date must not be after end date.")]
    InvertedDateRange,
}
