//! 由生成好的报表导出图表数据

use serde::{Deserialize, Serialize};

use super::{parse::round4, pipeline::ReportOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub id: String,
    pub title: String,
    pub kind: ChartKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
    pub points: Vec<ChartPoint>,
}

fn point(label: &str, value: f64) -> ChartPoint {
    ChartPoint {
        label: label.to_string(),
        value: round4(value),
    }
}

pub fn build_charts(output: &ReportOutput) -> Vec<Chart> {
    let mut charts = Vec::new();

    let books_with_data: Vec<_> = output
        .results
        .iter()
        .filter_map(|(book, result)| result.summary.as_ref().map(|s| (book, s)))
        .collect();

    if !books_with_data.is_empty() {
        charts.push(Chart {
            id: "volume_by_book".to_string(),
            title: "Trading Volume by Book Type".to_string(),
            kind: ChartKind::Bar,
            x_label: Some("Book Type".to_string()),
            y_label: Some("Volume (USD)".to_string()),
            points: books_with_data
                .iter()
                .map(|(book, summary)| point(book.label(), summary.total_volume))
                .collect(),
        });

        charts.push(Chart {
            id: "profit_distribution".to_string(),
            title: "Broker Profit Distribution".to_string(),
            kind: ChartKind::Pie,
            x_label: None,
            y_label: None,
            points: books_with_data
                .iter()
                .map(|(book, summary)| point(book.label(), summary.broker_profit))
                .collect(),
        });
    }

    let figures = &output.final_figures;
    let client_points = vec![
        point("Chinese Clients", figures.chinese_lots * output.lot_size),
        point("VIP Clients", figures.vip_lots * output.lot_size),
        point("Retail Clients", figures.retail_lots * output.lot_size),
    ];
    if client_points.iter().any(|p| p.value > 0.0) {
        charts.push(Chart {
            id: "client_volume".to_string(),
            title: "Volume by Client Type".to_string(),
            kind: ChartKind::Bar,
            x_label: Some("Client Type".to_string()),
            y_label: Some("Volume (USD)".to_string()),
            points: client_points,
        });
    }

    charts
}
