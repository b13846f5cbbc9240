//! 合同文本加载与条款切分
//!
//! PDF / DOCX 的文本抽取不在本 crate 内完成，这里只接受纯文本。

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;

use crate::error::InputError;

/// 短于该长度的片段（通常是标题）会并入相邻条款
pub const MIN_CLAUSE_CHARS: usize = 20;

/// 行首编号：`1.` `4)` `(a)` `(iv)`，以及后接大写字母的 `2.3 Payment`
///
/// 不带结尾标点的 `3.5` 必须后接大写字母，避免把换行后的 `3.5 million` 当成编号。
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:\d+(?:\.\d+)*[.)]|\([a-zA-Z0-9]{1,4}\))\s+|\d+\.\d+(?:\.\d+)*\s+[A-Z])",
    )
    .expect("heading regex is valid")
});

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("blank line regex is valid"));

/// 读取合同文本
pub async fn load_contract_text(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" | "text" => {}
        _ => return Err(InputError::UnsupportedFormat { extension }.into()),
    }

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取合同文件: {}", path.display()))?;

    tracing::info!(
        "正在加载: {} ({} 字符)",
        path.file_name().unwrap_or_default().to_string_lossy(),
        content.chars().count()
    );

    Ok(content)
}

/// 将合同文本切分为条款
///
/// 先按空行分段，再按行首编号拆分；过短的片段向后合并，
/// 末尾的过短片段并入最后一个条款。
pub fn chunk_clauses(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");

    let mut fragments: Vec<String> = Vec::new();
    for paragraph in BLANK_LINE.split(&normalized) {
        let mut current: Vec<&str> = Vec::new();
        for line in paragraph.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if HEADING.is_match(line) && !current.is_empty() {
                fragments.push(collapse_whitespace(&current.join(" ")));
                current.clear();
            }
            current.push(line);
        }
        if !current.is_empty() {
            fragments.push(collapse_whitespace(&current.join(" ")));
        }
    }

    let mut clauses: Vec<String> = Vec::new();
    let mut pending = String::new();
    for fragment in fragments {
        let merged = if pending.is_empty() {
            fragment
        } else {
            format!("{} {}", std::mem::take(&mut pending), fragment)
        };

        if merged.chars().count() < MIN_CLAUSE_CHARS {
            pending = merged;
        } else {
            clauses.push(merged);
        }
    }

    if !pending.is_empty() {
        match clauses.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(&pending);
            }
            None => clauses.push(pending),
        }
    }

    clauses
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
