//! rat_filelog - 按级别过滤的日志目的地与轮转文件写入器
//!
//! 每个目的地由一个消费者线程独占写入，支持按行数、字节数和日期轮转。

pub mod config;
pub mod core;
pub mod fmt_impl;
pub mod handler;
pub mod producer_consumer;

use std::path::Path;

// 重新导出主要类型
pub use config::{ConfigError, DestinationConfig, DestinationKind, FileConfig, Level, Record, parse_num_suffix};
pub use crate::core::{Filter, LOGGER, Logger, LoggerBuilder, LoggerError};
pub use fmt_impl::format_log_record;
pub use handler::{FileProcessor, TermConfig, TermProcessor};
pub use producer_consumer::{LogProcessor, ProcessorWorker};

// 日志宏
#[macro_export]
macro_rules! finest {
    ($($arg:tt)*) => ($crate::__private_log!($crate::Level::Finest, $($arg)*));
}

#[macro_export]
macro_rules! fine {
    ($($arg:tt)*) => ($crate::__private_log!($crate::Level::Fine, $($arg)*));
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => ($crate::__private_log!($crate::Level::Debug, $($arg)*));
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => ($crate::__private_log!($crate::Level::Trace, $($arg)*));
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => ($crate::__private_log!($crate::Level::Info, $($arg)*));
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ($crate::__private_log!($crate::Level::Warning, $($arg)*));
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => ($crate::__private_log!($crate::Level::Error, $($arg)*));
}

#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => ($crate::__private_log!($crate::Level::Critical, $($arg)*));
}

#[macro_export]
#[doc(hidden)]
macro_rules! __private_log {
    ($level:expr, $($arg:tt)*) => {
        $crate::__private_log_impl($level, module_path!(), line!(), format_args!($($arg)*))
    };
}

#[doc(hidden)]
pub fn __private_log_impl(level: Level, module_path: &str, line: u32, args: std::fmt::Arguments<'_>) {
    if LOGGER.enabled(level) {
        LOGGER.log_args(level, &format!("{}:{}", module_path, line), args);
    }
}

/// 默认文件目的地的参数
const DEFAULT_MAX_LINES: u64 = 100_000_000;
const DEFAULT_MAX_SIZE: u64 = 10_000_000_000;

fn default_file_config(path: &Path) -> FileConfig {
    FileConfig::new(path)
        .with_max_lines(DEFAULT_MAX_LINES)
        .with_max_size(DEFAULT_MAX_SIZE)
        .with_daily(true)
}

/// 在全局日志器上注册默认目的地
///
/// `to_file` 为 true 时在 `dir` 下创建三个按天轮转的文件：
///
/// - `<name>.sys.log`：INFO 及以上
/// - `<name>.run.log`：全部级别
/// - `<name>.err.log`：ERROR 及以上
///
/// 为 false 时只注册一个接受全部级别的终端目的地。已有的目的地会先被关闭。
pub fn init_file_log_writer<P: AsRef<Path>>(name: &str, dir: P, to_file: bool) -> Result<(), LoggerError> {
    let name = if name.is_empty() { "test" } else { name };
    let dir = dir.as_ref();

    let builder = if to_file {
        std::fs::create_dir_all(dir).map_err(|source| LoggerError::CannotOpen {
            path: dir.to_path_buf(),
            source,
        })?;
        [("sys", Level::Info), ("run", Level::Finest), ("err", Level::Error)]
            .into_iter()
            .fold(LoggerBuilder::new(), |builder, (kind, level)| {
                let file = dir.join(format!("{}.{}.log", name, kind));
                builder.add_file(format!("{}.{}", name, kind), level, default_file_config(&file))
            })
    } else {
        LoggerBuilder::new().add_terminal("console", Level::Finest)
    };

    builder.init()
}

/// 关闭全局日志器：排空所有队列并写入页脚
pub fn close() {
    LOGGER.close_all();
}
