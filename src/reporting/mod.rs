pub mod summary;

pub use summary::{
    write_report, ComplianceReport, DashboardSummary, Recommendation, RiskDistribution,
};
