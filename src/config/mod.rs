//! 配置模块

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// 默认日志行格式
pub const DEFAULT_FORMAT: &str = "[%D %T] [%L] (%S) %M";

/// 默认队列长度
pub const DEFAULT_BUFFER_LEN: usize = 32;

/// 日志级别，从低到高排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Finest,
    Fine,
    Debug,
    Trace,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// 全部级别，按严重程度递增
    pub const ALL: [Level; 8] = [
        Level::Finest,
        Level::Fine,
        Level::Debug,
        Level::Trace,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Finest => "FINEST",
            Level::Fine => "FINE",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownLevel(s.to_string()))
    }
}

/// 日志记录，在调用点创建后只读
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub created_at: DateTime<Local>,
    pub source: String,
    pub message: String,
}

impl Record {
    /// 以当前时间创建记录
    pub fn new<S: Into<String>, M: Into<String>>(level: Level, source: S, message: M) -> Self {
        Self {
            level,
            created_at: Local::now(),
            source: source.into(),
            message: message.into(),
        }
    }

    /// 指定创建时间
    pub fn with_time(mut self, created_at: DateTime<Local>) -> Self {
        self.created_at = created_at;
        self
    }

    /// 页眉/页脚使用的合成记录：只有时间，其余字段为空
    pub fn synthetic(created_at: DateTime<Local>) -> Self {
        Self {
            level: Level::Finest,
            created_at,
            source: String::new(),
            message: String::new(),
        }
    }
}

/// 配置错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 缺少必填字段
    MissingField(&'static str),
    /// 字段值无效
    InvalidValue { field: &'static str, value: String },
    /// 未知的日志级别名称
    UnknownLevel(String),
    /// 未知的目的地类型
    UnknownDestinationType(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingField(field) => write!(f, "配置错误: 缺少必填字段 {}", field),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "配置错误: 字段 {} 的值无效: {:?}", field, value)
            }
            ConfigError::UnknownLevel(name) => write!(f, "配置错误: 未知的日志级别 {:?}", name),
            ConfigError::UnknownDestinationType(kind) => {
                write!(f, "配置错误: 未知的目的地类型 {:?}", kind)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// 解析带 K/M/G 后缀的数字，`mult` 为每一级的倍数（1000 或 1024）
pub fn parse_num_suffix(s: &str, mult: u64) -> Result<u64, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidValue {
        field: "number",
        value: s.to_string(),
    };

    let (digits, exp) = match s.chars().last() {
        Some('K' | 'k') if s.len() > 1 => (&s[..s.len() - 1], 1),
        Some('M' | 'm') if s.len() > 1 => (&s[..s.len() - 1], 2),
        Some('G' | 'g') if s.len() > 1 => (&s[..s.len() - 1], 3),
        _ => (s, 0),
    };

    let base: u64 = digits.trim().parse().map_err(|_| invalid())?;
    mult.checked_pow(exp)
        .and_then(|factor| base.checked_mul(factor))
        .ok_or_else(invalid)
}

fn parse_bool(value: &str) -> bool {
    value.trim() != "false"
}

/// 目的地类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    File,
    Console,
}

impl FromStr for DestinationKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "file" => Ok(DestinationKind::File),
            "console" => Ok(DestinationKind::Console),
            other => Err(ConfigError::UnknownDestinationType(other.to_string())),
        }
    }
}

/// 文件日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub filename: PathBuf,
    pub format: String,
    pub header: String,
    pub trailer: String,
    /// 按行数轮转，0 表示关闭
    pub max_lines: u64,
    /// 按字节数轮转，0 表示关闭
    pub max_size: u64,
    /// 按天轮转
    pub daily: bool,
    /// true 时备份序号只增不减；false 时每次轮转从 `backup_start` 重新探测，
    /// 复用已被清理掉的备份名。已写入的记录在两种模式下都不会被覆盖
    pub rotate: bool,
    /// 阈值轮转的起始备份序号
    pub backup_start: u32,
    pub buffer_len: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::new(),
            format: DEFAULT_FORMAT.to_string(),
            header: String::new(),
            trailer: String::new(),
            max_lines: 0,
            max_size: 0,
            daily: false,
            rotate: true,
            backup_start: 0,
            buffer_len: DEFAULT_BUFFER_LEN,
        }
    }
}

impl FileConfig {
    pub fn new<P: Into<PathBuf>>(filename: P) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// XML 记录格式的预设
    pub fn xml<P: Into<PathBuf>>(filename: P) -> Self {
        Self {
            format: "\t<record level=\"%L\">\n\t\t<timestamp>%D %T</timestamp>\n\t\t<source>%S</source>\n\t\t<message>%M</message>\n\t</record>".to_string(),
            header: "<log created=\"%D %T\">".to_string(),
            trailer: "</log>".to_string(),
            ..Self::new(filename)
        }
    }

    pub fn with_format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_header_trailer<H: Into<String>, T: Into<String>>(mut self, header: H, trailer: T) -> Self {
        self.header = header.into();
        self.trailer = trailer.into();
        self
    }

    pub fn with_max_lines(mut self, max_lines: u64) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_daily(mut self, daily: bool) -> Self {
        self.daily = daily;
        self
    }

    pub fn with_rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_backup_start(mut self, backup_start: u32) -> Self {
        self.backup_start = backup_start;
        self
    }

    pub fn with_buffer_len(mut self, buffer_len: usize) -> Self {
        self.buffer_len = buffer_len;
        self
    }

    /// 从 `(名称, 值)` 属性列表构建配置
    ///
    /// 支持 `filename`、`format`、`maxlines`、`maxsize`、`daily`、`rotate`、`maxbackup`。
    /// 未知属性只打印警告。
    pub fn from_properties<'a, I>(props: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (name, value) in props {
            let value = value.trim();
            match name {
                "filename" => config.filename = PathBuf::from(value),
                "format" => config.format = value.to_string(),
                "maxlines" => {
                    config.max_lines = parse_num_suffix(value, 1000).map_err(|_| ConfigError::InvalidValue {
                        field: "maxlines",
                        value: value.to_string(),
                    })?
                }
                "maxsize" => {
                    config.max_size = parse_num_suffix(value, 1024).map_err(|_| ConfigError::InvalidValue {
                        field: "maxsize",
                        value: value.to_string(),
                    })?
                }
                "daily" => config.daily = parse_bool(value),
                "rotate" => config.rotate = parse_bool(value),
                "maxbackup" => {
                    config.backup_start = value.parse().map_err(|_| ConfigError::InvalidValue {
                        field: "maxbackup",
                        value: value.to_string(),
                    })?
                }
                other => eprintln!("配置警告: 文件目的地的未知属性 {:?}", other),
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filename.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("filename"));
        }
        if self.buffer_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "buffer_len",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// 一个命名目的地的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub level: Level,
    pub kind: DestinationKind,
    /// false 时只做配置检查，不创建任何东西
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub file: Option<FileConfig>,
}

fn default_enabled() -> bool {
    true
}

impl DestinationConfig {
    pub fn file(level: Level, file: FileConfig) -> Self {
        Self {
            level,
            kind: DestinationKind::File,
            enabled: true,
            file: Some(file),
        }
    }

    pub fn console(level: Level) -> Self {
        Self {
            level,
            kind: DestinationKind::Console,
            enabled: true,
            file: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            DestinationKind::File => self
                .file
                .as_ref()
                .ok_or(ConfigError::MissingField("file"))?
                .validate(),
            DestinationKind::Console => Ok(()),
        }
    }
}
