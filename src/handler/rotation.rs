//! 轮转判定
//!
//! 在写入每条记录之前按固定顺序判断：先看行数/字节数阈值，再看日期。
//! 两者在同一条记录上互斥。

use chrono::NaiveDate;

/// 轮转判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Threshold,
    Daily,
}

/// 轮转阈值，0 表示不按该项轮转
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationPolicy {
    pub max_lines: u64,
    pub max_bytes: u64,
    pub daily: bool,
}

/// 当前文件的计数器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCounters {
    pub line_count: u64,
    pub byte_count: u64,
    pub opened_on: NaiveDate,
}

impl RotationCounters {
    pub fn new(opened_on: NaiveDate) -> Self {
        Self {
            line_count: 0,
            byte_count: 0,
            opened_on,
        }
    }
}

impl RotationPolicy {
    pub fn decide(&self, counters: &RotationCounters, arrival: NaiveDate) -> Rotation {
        let lines_full = self.max_lines > 0 && counters.line_count >= self.max_lines;
        let bytes_full = self.max_bytes > 0 && counters.byte_count >= self.max_bytes;

        if lines_full || bytes_full {
            Rotation::Threshold
        } else if self.daily && arrival != counters.opened_on {
            Rotation::Daily
        } else {
            Rotation::None
        }
    }
}
