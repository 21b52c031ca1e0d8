//! 日志处理器模块

use crate::config::{DestinationConfig, DestinationKind};
use crate::core::LoggerError;
use crate::producer_consumer::ProcessorWorker;

pub mod file;
pub mod rotation;
pub mod term;

pub use file::FileProcessor;
pub use rotation::{Rotation, RotationCounters, RotationPolicy};
pub use term::{TermConfig, TermProcessor};

/// 处理器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    Terminal,
    File,
}

impl From<DestinationKind> for HandlerType {
    fn from(kind: DestinationKind) -> Self {
        match kind {
            DestinationKind::File => HandlerType::File,
            DestinationKind::Console => HandlerType::Terminal,
        }
    }
}

/// 按目的地配置启动对应处理器的工作线程
pub fn spawn_processor(config: &DestinationConfig) -> Result<ProcessorWorker, LoggerError> {
    config.validate()?;
    match (HandlerType::from(config.kind), config.file.as_ref()) {
        (HandlerType::File, Some(file)) => FileProcessor::spawn(file),
        (HandlerType::File, None) => Err(crate::config::ConfigError::MissingField("file").into()),
        (HandlerType::Terminal, _) => Ok(TermProcessor::spawn(&TermConfig::default())),
    }
}
