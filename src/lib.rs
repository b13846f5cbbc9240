//! # Contract Compliance
//!
//! 合同条款合规分析：把合同切分成条款，用 LLM 给每个条款标注法规、风险等级和摘要，
//! 并按文档顺序写入结果表格。
//!
//! ## 架构设计
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 与 LLM provider 的连接
//! - `ChatTransport` - 探测 + 单次对话补全
//! - `TransportFactory` - 根据 provider 配置建立连接
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个条款
//! - `ModelSelector` - 按优先级选择第一个可用的模型
//! - `ClauseAnalyzer` - 分类 / 关键短语 / 改写
//! - `RequestLimiter` - 所有 worker 共享的请求限速
//! - `SheetStore` - 表格写入能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个条款"的完整处理流程
//! - `ClauseCtx` - 上下文封装（clause_id + 位置）
//! - `ClauseFlow` - 流程编排（分析 → 失败时切换模型重试一次）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/dispatcher` - 并发调度，按 Clause ID 排序结果
//! - `orchestrator/app` - 读取合同、写表格、生成报告
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod reporting;
pub mod services;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, LlmError};
pub use models::{ClauseResult, ProviderKind, ProviderRegistry, RiskLevel};
pub use orchestrator::{App, BatchReport, ClauseDispatcher, RunOutcome};
pub use reporting::{DashboardSummary, Recommendation};
pub use workflow::{ClauseCtx, ClauseFlow, ClauseOutcome};
