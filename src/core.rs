//! 日志核心模块 - 按级别分发记录到各个命名目的地

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::{ConfigError, DestinationConfig, FileConfig, Level, Record};
use crate::handler::term::{TermConfig, TermProcessor};
use crate::handler::{FileProcessor, spawn_processor};
use crate::producer_consumer::ProcessorWorker;

/// 全局日志器实例
pub static LOGGER: Lazy<Logger> = Lazy::new(Logger::new);

/// 日志库错误
#[derive(Debug)]
pub enum LoggerError {
    /// 配置无效，目的地不会被创建
    Config(ConfigError),
    /// 文件无法打开
    CannotOpen { path: PathBuf, source: io::Error },
    /// 轮转时查找新文件名或重新打开失败
    Rotation { path: PathBuf, source: io::Error },
    /// 写入失败
    Write { path: PathBuf, source: io::Error },
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggerError::Config(e) => write!(f, "{}", e),
            LoggerError::CannotOpen { path, source } => {
                write!(f, "无法打开日志文件 {}: {}", path.display(), source)
            }
            LoggerError::Rotation { path, source } => {
                write!(f, "日志文件 {} 轮转失败: {}", path.display(), source)
            }
            LoggerError::Write { path, source } => {
                write!(f, "写入日志文件 {} 失败: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for LoggerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoggerError::Config(e) => Some(e),
            LoggerError::CannotOpen { source, .. }
            | LoggerError::Rotation { source, .. }
            | LoggerError::Write { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for LoggerError {
    fn from(e: ConfigError) -> Self {
        LoggerError::Config(e)
    }
}

/// 一个命名目的地：最低级别加上写入器
#[derive(Debug)]
pub struct Filter {
    pub threshold: Level,
    pub writer: ProcessorWorker,
}

impl Filter {
    pub fn new(threshold: Level, writer: ProcessorWorker) -> Self {
        Self { threshold, writer }
    }

    pub fn accepts(&self, level: Level) -> bool {
        level >= self.threshold
    }

    pub fn close(&self) {
        self.writer.close();
    }
}

/// 日志分发器
///
/// 目的地表在配置阶段建立，之后被任意多个调用点并发读取；
/// 增删目的地和关闭都持有写锁完成。
#[derive(Debug, Default)]
pub struct Logger {
    filters: RwLock<HashMap<String, Filter>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册目的地，返回被替换的旧目的地（由调用方决定是否关闭）
    pub fn add_filter<S: Into<String>>(&self, name: S, filter: Filter) -> Option<Filter> {
        self.filters.write().insert(name.into(), filter)
    }

    pub fn remove_filter(&self, name: &str) -> Option<Filter> {
        self.filters.write().remove(name)
    }

    /// 按配置创建目的地；`enabled = false` 时只校验配置
    pub fn create_destination<S: Into<String>>(&self, name: S, config: &DestinationConfig) -> Result<(), LoggerError> {
        config.validate()?;
        if !config.enabled {
            return Ok(());
        }
        let writer = spawn_processor(config)?;
        if let Some(old) = self.add_filter(name, Filter::new(config.level, writer)) {
            old.close();
        }
        Ok(())
    }

    /// 重新加载全部目的地
    ///
    /// 先校验全部配置并启动所有新写入器，全部成功后才替换并关闭旧表；
    /// 任何一步失败时旧表保持不变，已启动的新写入器随之关闭。
    pub fn load<'a, I>(&self, configs: I) -> Result<(), LoggerError>
    where
        I: IntoIterator<Item = (&'a str, &'a DestinationConfig)>,
    {
        let configs: Vec<_> = configs.into_iter().collect();
        for (_, config) in &configs {
            config.validate()?;
        }

        let mut filters = HashMap::with_capacity(configs.len());
        for (name, config) in configs {
            if !config.enabled {
                continue;
            }
            let writer = spawn_processor(config)?;
            if let Some(old) = filters.insert(name.to_string(), Filter::new(config.level, writer)) {
                old.close();
            }
        }

        let old = std::mem::replace(&mut *self.filters.write(), filters);
        for (_, filter) in old {
            filter.close();
        }
        Ok(())
    }

    /// 是否有目的地接受该级别
    pub fn enabled(&self, level: Level) -> bool {
        self.filters.read().values().any(|filter| filter.accepts(level))
    }

    /// 分发一条已经建好的记录，所有接受它的目的地共享同一份
    pub fn dispatch(&self, record: Record) {
        let record = Arc::new(record);
        for filter in self.filters.read().values() {
            if filter.accepts(record.level) {
                filter.writer.submit(Arc::clone(&record));
            }
        }
    }

    /// 记录一条日志；关闭后调用不做任何事
    pub fn log<S: Into<String>, M: Into<String>>(&self, level: Level, source: S, message: M) {
        if !self.enabled(level) {
            return;
        }
        self.dispatch(Record::new(level, source, message));
    }

    /// 只有在有目的地接受时才格式化参数
    pub fn log_args(&self, level: Level, source: &str, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        self.dispatch(Record::new(level, source, args.to_string()));
    }

    /// 要求所有写入器在下一条记录前轮转
    pub fn rotate_all(&self) {
        for filter in self.filters.read().values() {
            filter.writer.rotate_now();
        }
    }

    pub fn flush(&self) {
        for filter in self.filters.read().values() {
            filter.writer.flush();
        }
    }

    /// 关闭所有写入器并清空目的地表
    pub fn close_all(&self) {
        let filters = std::mem::take(&mut *self.filters.write());
        for (_, filter) in filters {
            filter.close();
        }
    }

    pub fn len(&self) -> usize {
        self.filters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.filters.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// 目的地的写入器是否仍在运行
    pub fn is_running(&self, name: &str) -> Option<bool> {
        self.filters.read().get(name).map(|filter| filter.writer.is_running())
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close_all();
    }
}

enum PendingDestination {
    File(FileConfig),
    Terminal(TermConfig),
}

/// 日志构建器
#[derive(Default)]
pub struct LoggerBuilder {
    destinations: Vec<(String, Level, PendingDestination)>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加文件目的地
    pub fn add_file<S: Into<String>>(mut self, name: S, level: Level, config: FileConfig) -> Self {
        self.destinations.push((name.into(), level, PendingDestination::File(config)));
        self
    }

    /// 添加终端目的地
    pub fn add_terminal<S: Into<String>>(self, name: S, level: Level) -> Self {
        self.add_terminal_with_config(name, level, TermConfig::default())
    }

    pub fn add_terminal_with_config<S: Into<String>>(mut self, name: S, level: Level, config: TermConfig) -> Self {
        self.destinations.push((name.into(), level, PendingDestination::Terminal(config)));
        self
    }

    fn build_filters(self) -> Result<Vec<(String, Filter)>, LoggerError> {
        for (_, _, destination) in &self.destinations {
            if let PendingDestination::File(config) = destination {
                config.validate()?;
            }
        }

        let mut filters = Vec::with_capacity(self.destinations.len());
        for (name, level, destination) in self.destinations {
            // 出错时已创建的写入器随 filters 一起被关闭
            let writer = match destination {
                PendingDestination::File(config) => FileProcessor::spawn(&config)?,
                PendingDestination::Terminal(config) => TermProcessor::spawn(&config),
            };
            filters.push((name, Filter::new(level, writer)));
        }
        Ok(filters)
    }

    /// 构建独立的日志器
    pub fn build(self) -> Result<Logger, LoggerError> {
        let logger = Logger::new();
        for (name, filter) in self.build_filters()? {
            if let Some(old) = logger.add_filter(name, filter) {
                old.close();
            }
        }
        Ok(logger)
    }

    /// 关闭全局日志器中的旧目的地并安装新的目的地
    pub fn init(self) -> Result<(), LoggerError> {
        let filters = self.build_filters()?;
        LOGGER.close_all();
        for (name, filter) in filters {
            if let Some(old) = LOGGER.add_filter(name, filter) {
                old.close();
            }
        }
        Ok(())
    }
}
