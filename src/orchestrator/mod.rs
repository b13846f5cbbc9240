//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行）
//! - 读取合同并切分条款
//! - 写入表格、生成改写建议和报告
//! - 输出全局统计信息
//!
//! ### `dispatcher` - 批量条款调度器
//! - 预分配 Clause ID
//! - 控制并发数量（Semaphore）
//! - 收集结果并按 Clause ID 排序
//!
//! ## 层次关系
//!
//! ```text
//! app (处理一个合同)
//!     ↓
//! dispatcher (处理 Vec<Clause>)
//!     ↓
//! workflow::ClauseFlow (处理单个条款)
//!     ↓
//! services (能力层：selector / analyzer / parser / sheet)
//!     ↓
//! clients (LLM 连接)
//! ```

pub mod app;
pub mod dispatcher;

// 重新导出主要类型
pub use app::{App, RunOutcome};
pub use dispatcher::{rewrite_all, BatchReport, ClauseDispatcher};
