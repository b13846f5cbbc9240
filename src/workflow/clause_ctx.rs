//! 条款处理上下文
//!
//! 封装"我正在处理第几个条款、它的 Clause ID 是多少"这一信息

use std::fmt::Display;

/// 条款处理上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClauseCtx {
    /// 预先分配的 Clause ID（起始 ID + 位置）
    pub clause_id: u64,

    /// 条款在文档中的位置（从 0 开始）
    pub index: usize,

    /// 本批条款总数（仅用于日志显示）
    pub total: usize,
}

impl ClauseCtx {
    /// 调用方需保证 `starting_id + index` 不溢出（见 `ClauseCtx::last_id`）
    pub fn new(starting_id: u64, index: usize, total: usize) -> Self {
        Self {
            clause_id: starting_id + index as u64,
            index,
            total,
        }
    }

    /// 一批 `count` 个条款中最后一个的 ID，溢出或为空时返回 None
    pub fn last_id(starting_id: u64, count: usize) -> Option<u64> {
        let offset = u64::try_from(count.checked_sub(1)?).ok()?;
        starting_id.checked_add(offset)
    }
}

impl Display for ClauseCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[条款 #{} ({}/{})]",
            self.clause_id,
            self.index + 1,
            self.total
        )
    }
}
