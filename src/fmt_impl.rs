//! 日志行模板格式化
//!
//! 模板中的占位符：
//!
//! | 占位符 | 含义 |
//! |---|---|
//! | `%D` | 日期 `YYYY/MM/DD` |
//! | `%T` | 时间 `HH:MM:SS` |
//! | `%d` | 短日期 `MM/DD/YY` |
//! | `%t` | 短时间 `HH:MM` |
//! | `%L` | 级别名称 |
//! | `%S` | 来源 |
//! | `%s` | 来源的最后一段 |
//! | `%M` | 消息 |
//! | `%%` | 百分号 |
//!
//! 其他 `%x` 原样输出。

use std::fmt::Write;

use crate::config::Record;

/// 按模板格式化一条记录
///
/// 非空模板的结果总以换行结尾；空模板返回空串，因此空的页眉/页脚不会写出任何内容。
pub fn format_log_record(template: &str, record: &Record) -> String {
    if template.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(template.len() + record.message.len() + 32);
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('D') => {
                let _ = write!(out, "{}", record.created_at.format("%Y/%m/%d"));
            }
            Some('T') => {
                let _ = write!(out, "{}", record.created_at.format("%H:%M:%S"));
            }
            Some('d') => {
                let _ = write!(out, "{}", record.created_at.format("%m/%d/%y"));
            }
            Some('t') => {
                let _ = write!(out, "{}", record.created_at.format("%H:%M"));
            }
            Some('L') => out.push_str(record.level.as_str()),
            Some('S') => out.push_str(&record.source),
            Some('s') => out.push_str(short_source(&record.source)),
            Some('M') => out.push_str(&record.message),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    out.push('\n');
    out
}

fn short_source(source: &str) -> &str {
    let tail = source.rsplit("::").next().unwrap_or(source);
    tail.rsplit('/').next().unwrap_or(tail)
}
