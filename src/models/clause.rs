use serde::{Deserialize, Serialize};
use std::fmt;

/// 风险等级
///
/// 模型返回的是自由文本，`ClauseResult` 保留原文，这里只用于统计和判断。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl RiskLevel {
    pub fn name(self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
            RiskLevel::Unknown => "Unknown",
        }
    }

    /// 宽松解析（忽略大小写和首尾空白），无法识别时返回 `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => RiskLevel::High,
            "medium" => RiskLevel::Medium,
            "low" => RiskLevel::Low,
            _ => RiskLevel::Unknown,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 单个条款的分析结果
///
/// 由 Clause Analyzer 创建一次，之后只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseResult {
    pub clause_id: u64,
    pub clause: String,
    pub regulation: String,
    pub risk_level: String,
    pub risk_percent: String,
    pub summary: String,
    pub key_phrases: String,
}

impl ClauseResult {
    pub fn risk(&self) -> RiskLevel {
        RiskLevel::parse(&self.risk_level)
    }

    /// 风险百分比数值（"72%" -> 72.0），无法解析时返回 None
    pub fn risk_percent_value(&self) -> Option<f64> {
        parse_risk_percent(&self.risk_percent)
    }

    /// 转换为表格行，列顺序与 `SHEET_HEADER` 一致
    pub fn to_row(&self) -> SheetRow {
        SheetRow {
            clause_id: self.clause_id,
            cells: vec![
                self.clause_id.to_string(),
                self.clause.clone(),
                self.regulation.clone(),
                self.key_phrases.clone(),
                self.risk_level.clone(),
                self.risk_percent.clone(),
                self.summary.clone(),
            ],
        }
    }
}

/// 表格固定表头
pub const SHEET_HEADER: [&str; 7] = [
    "Clause ID",
    "Contract Clause",
    "Regulation",
    "Key Clauses (AI)",
    "Risk Level (AI)",
    "Risk % (AI)",
    "AI Summary",
];

/// 待写入表格的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub clause_id: u64,
    pub cells: Vec<String>,
}

/// 单个条款的处理状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClauseStatus {
    Analyzed,
    Failed { reason: String },
}

/// 单个条款的失败记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClauseFailure {
    pub clause_id: u64,
    pub clause: String,
    pub reason: String,
}

/// 改写建议
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteSuggestion {
    pub clause_id: u64,
    pub risk_level: String,
    pub original: String,
    pub rewritten: String,
    /// 低风险条款原样返回或改写失败时为 false
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 解析风险百分比
pub fn parse_risk_percent(s: &str) -> Option<f64> {
    s.replace('%', "").trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClauseResult {
        ClauseResult {
            clause_id: 7,
            clause: "The vendor stores data for 10 years.".to_string(),
            regulation: "GDPR".to_string(),
            risk_level: "High".to_string(),
            risk_percent: "85%".to_string(),
            summary: "Retention exceeds necessity.".to_string(),
            key_phrases: "stores data, 10 years".to_string(),
        }
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!(RiskLevel::parse("High"), RiskLevel::High);
        assert_eq!(RiskLevel::parse(" medium "), RiskLevel::Medium);
        assert_eq!(RiskLevel::parse("LOW"), RiskLevel::Low);
        assert_eq!(RiskLevel::parse("Severe"), RiskLevel::Unknown);
        assert_eq!(RiskLevel::parse(""), RiskLevel::Unknown);
    }

    #[test]
    fn test_risk_percent_value() {
        assert_eq!(parse_risk_percent("85%"), Some(85.0));
        assert_eq!(parse_risk_percent(" 12.5 % "), Some(12.5));
        assert_eq!(parse_risk_percent("N/A"), None);
        assert_eq!(sample().risk_percent_value(), Some(85.0));
    }

    #[test]
    fn test_row_follows_header_order() {
        let row = sample().to_row();
        assert_eq!(row.clause_id, 7);
        assert_eq!(row.cells.len(), SHEET_HEADER.len());
        assert_eq!(row.cells[0], "7");
        assert_eq!(row.cells[3], "stores data, 10 years");
        assert_eq!(row.cells[4], "High");
        assert_eq!(row.cells[6], "Retention exceeds necessity.");
    }
}
