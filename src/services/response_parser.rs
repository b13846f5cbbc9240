//! 分类响应解析
//!
//! 模型按固定四行格式返回：
//!
//! ```text
//! Regulation: <GDPR/HIPAA/Other/None>
//! Summary: <1-2 句摘要>
//! Risk: <High/Medium/Low>
//! Risk Percentage: <0-100>
//! ```
//!
//! 解析规则：
//! - 逐行处理，取第一个 `:` 之前的部分作为标签，精确匹配上面四个标签
//! - 标签两侧的 markdown 强调符号（`*`、`-` 列表符）会被忽略
//! - 无法识别的行直接跳过，不报错
//! - 标签存在但值为空时保留默认值
//! - 同一标签出现多次时，以最后一个非空值为准

use phf::phf_map;
use serde::Serialize;

/// 缺失字段的默认值
pub const NOT_AVAILABLE: &str = "N/A";
/// 缺失风险等级的默认值
pub const UNKNOWN_RISK: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Regulation,
    Summary,
    Risk,
    RiskPercentage,
}

static FIELD_LABELS: phf::Map<&'static str, Field> = phf_map! {
    "Regulation" => Field::Regulation,
    "Summary" => Field::Summary,
    "Risk" => Field::Risk,
    "Risk Percentage" => Field::RiskPercentage,
};

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub regulation: String,
    pub summary: String,
    pub risk_level: String,
    pub risk_percent: String,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            regulation: NOT_AVAILABLE.to_string(),
            summary: NOT_AVAILABLE.to_string(),
            risk_level: UNKNOWN_RISK.to_string(),
            risk_percent: NOT_AVAILABLE.to_string(),
        }
    }
}

/// 解析分类响应，从不失败
pub fn parse_classification(response: &str) -> Classification {
    let mut result = Classification::default();

    for line in response.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };

        let label = label.trim_matches(|c: char| c == '*' || c == '-' || c.is_whitespace());
        let Some(field) = FIELD_LABELS.get(label) else {
            continue;
        };

        let value = value.trim_matches(|c: char| c == '*' || c.is_whitespace());
        if value.is_empty() {
            continue;
        }

        let slot = match field {
            Field::Regulation => &mut result.regulation,
            Field::Summary => &mut result.summary,
            Field::Risk => &mut result.risk_level,
            Field::RiskPercentage => &mut result.risk_percent,
        };
        *slot = value.to_string();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_layout() {
        let response = "Regulation: GDPR\n\
                        Summary: Personal data is kept longer than necessary.\n\
                        Risk: High\n\
                        Risk Percentage: 85%";
        let parsed = parse_classification(response);
        assert_eq!(parsed.regulation, "GDPR");
        assert_eq!(parsed.summary, "Personal data is kept longer than necessary.");
        assert_eq!(parsed.risk_level, "High");
        assert_eq!(parsed.risk_percent, "85%");
    }

    #[test]
    fn test_missing_risk_percentage_keeps_sentinel() {
        let response = "Regulation: HIPAA\nSummary: Access is restricted.\nRisk: Low";
        let parsed = parse_classification(response);
        assert_eq!(parsed.risk_level, "Low");
        assert_eq!(parsed.risk_percent, NOT_AVAILABLE);
    }

    #[test]
    fn test_garbage_yields_defaults() {
        assert_eq!(
            parse_classification("I cannot analyze this clause."),
            Classification::default()
        );
        assert_eq!(parse_classification(""), Classification::default());
    }

    #[test]
    fn test_risk_label_does_not_swallow_percentage() {
        let parsed = parse_classification("Risk Percentage: 40\nRisk: Medium");
        assert_eq!(parsed.risk_level, "Medium");
        assert_eq!(parsed.risk_percent, "40");
    }

    #[test]
    fn test_summary_with_colon() {
        let parsed = parse_classification("Summary: Two duties: notify and delete.");
        assert_eq!(parsed.summary, "Two duties: notify and delete.");
    }

    #[test]
    fn test_markdown_emphasis_and_indent() {
        let response = "  **Regulation:** GDPR\n- Risk: High\n* **Risk Percentage**: 90%";
        let parsed = parse_classification(response);
        assert_eq!(parsed.regulation, "GDPR");
        assert_eq!(parsed.risk_level, "High");
        assert_eq!(parsed.risk_percent, "90%");
    }

    #[test]
    fn test_duplicate_label_last_non_empty_wins() {
        let response = "Risk: Low\nRisk: High\nRisk:   ";
        assert_eq!(parse_classification(response).risk_level, "High");
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        let parsed = parse_classification("regulation: GDPR\nRISK: High");
        assert_eq!(parsed.regulation, NOT_AVAILABLE);
        assert_eq!(parsed.risk_level, UNKNOWN_RISK);
    }
}
