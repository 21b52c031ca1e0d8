//! 终端日志处理器

use std::io::{self, BufWriter, Stdout, Write};
use std::path::PathBuf;

use crate::config::{DEFAULT_BUFFER_LEN, DEFAULT_FORMAT, Record};
use crate::core::LoggerError;
use crate::fmt_impl::format_log_record;
use crate::producer_consumer::{LogProcessor, ProcessorWorker};

/// 终端输出配置
#[derive(Debug, Clone)]
pub struct TermConfig {
    /// 日志行模板
    pub format: String,
    /// 队列容量
    pub buffer_len: usize,
}

impl Default for TermConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            buffer_len: DEFAULT_BUFFER_LEN,
        }
    }
}

/// 终端日志处理器 - 把格式化后的记录写到标准输出
pub struct TermProcessor {
    format: String,
    stdout: BufWriter<Stdout>,
}

impl TermProcessor {
    pub fn new() -> Self {
        Self::with_config(&TermConfig::default())
    }

    pub fn with_config(config: &TermConfig) -> Self {
        Self {
            format: config.format.clone(),
            stdout: BufWriter::new(io::stdout()),
        }
    }

    /// 创建处理器并启动消费者线程
    pub fn spawn(config: &TermConfig) -> ProcessorWorker {
        ProcessorWorker::new(Self::with_config(config), config.buffer_len)
    }

    fn io_error(source: io::Error) -> LoggerError {
        LoggerError::Write {
            path: PathBuf::from("<stdout>"),
            source,
        }
    }
}

impl Default for TermProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl LogProcessor for TermProcessor {
    fn name(&self) -> &str {
        "console"
    }

    fn process(&mut self, record: &Record) -> Result<(), LoggerError> {
        let line = format_log_record(&self.format, record);
        self.stdout.write_all(line.as_bytes()).map_err(Self::io_error)
    }

    fn handle_rotate(&mut self) -> Result<(), LoggerError> {
        self.stdout.write_all(b" \n").map_err(Self::io_error)
    }

    fn flush(&mut self) -> Result<(), LoggerError> {
        self.stdout.flush().map_err(Self::io_error)
    }

    fn cleanup(&mut self) -> Result<(), LoggerError> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Level;
    use std::sync::Arc;

    #[test]
    fn test_term_worker_lifecycle() {
        let worker = TermProcessor::spawn(&TermConfig {
            format: "[%L] %M".to_string(),
            buffer_len: 2,
        });
        assert_eq!(worker.name(), "console");
        for i in 0..5 {
            worker.submit(Arc::new(Record::new(Level::Info, "term_test", format!("终端消息 #{}", i))));
        }
        worker.rotate_now();
        worker.close();
        assert!(!worker.is_running());
    }
}
