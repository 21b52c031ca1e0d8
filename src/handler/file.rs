//! 文件日志处理器 - 支持按行数、字节数和日期轮转
//!
//! 轮转采用逻辑重命名：旧文件保留在原名下不再移动，之后的写入落到新名字上。
//! 新名字总是从配置的基础路径推导：
//!
//! - 阈值轮转：`<stem>.<yyyy-mm-dd>.<NNN><ext>`
//! - 日期轮转：`<stem>.<yyyy-mm-dd><ext>`

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};

use crate::config::{FileConfig, Record};
use crate::core::LoggerError;
use crate::fmt_impl::format_log_record;
use crate::handler::rotation::{Rotation, RotationCounters, RotationPolicy};
use crate::producer_consumer::{LogProcessor, ProcessorWorker};

/// 文件日志处理器，只在消费者线程上使用
pub struct FileProcessor {
    name: String,
    base: PathBuf,
    path: PathBuf,
    file: Option<BufWriter<File>>,
    format: String,
    header: String,
    trailer: String,
    policy: RotationPolicy,
    counters: RotationCounters,
    keep_backups: bool,
    backup_start: u32,
    backup_sequence: u32,
}

impl FileProcessor {
    /// 打开（或追加）文件并写入页眉
    pub fn open(config: &FileConfig) -> Result<Self, LoggerError> {
        config.validate()?;

        let now = Local::now();
        let mut processor = Self {
            name: config.filename.display().to_string(),
            base: config.filename.clone(),
            path: config.filename.clone(),
            file: None,
            format: config.format.clone(),
            header: config.header.clone(),
            trailer: config.trailer.clone(),
            policy: RotationPolicy {
                max_lines: config.max_lines,
                max_bytes: config.max_size,
                daily: config.daily,
            },
            counters: RotationCounters::new(now.date_naive()),
            keep_backups: config.rotate,
            backup_start: config.backup_start,
            backup_sequence: config.backup_start,
        };
        processor.open_current(now)?;
        Ok(processor)
    }

    /// 打开文件并启动消费者线程；打不开时不启动线程
    pub fn spawn(config: &FileConfig) -> Result<ProcessorWorker, LoggerError> {
        let processor = Self::open(config)?;
        Ok(ProcessorWorker::new(processor, config.buffer_len))
    }

    /// 当前写入的文件
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_count(&self) -> u64 {
        self.counters.line_count
    }

    pub fn byte_count(&self) -> u64 {
        self.counters.byte_count
    }

    /// 当前文件的打开日期
    pub fn opened_on(&self) -> NaiveDate {
        self.counters.opened_on
    }

    fn open_current(&mut self, at: DateTime<Local>) -> Result<(), LoggerError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path).map_err(|source| LoggerError::CannotOpen {
            path: self.path.clone(),
            source,
        })?;

        let mut writer = BufWriter::new(file);
        let header = format_log_record(&self.header, &Record::synthetic(Local::now()));
        writer
            .write_all(header.as_bytes())
            .map_err(|source| self.write_error(source))?;

        self.file = Some(writer);
        self.counters = RotationCounters::new(at.date_naive());
        Ok(())
    }

    /// 写页脚并关闭当前文件
    fn close_current(&mut self) -> Result<(), LoggerError> {
        if let Some(mut writer) = self.file.take() {
            let trailer = format_log_record(&self.trailer, &Record::synthetic(Local::now()));
            writer
                .write_all(trailer.as_bytes())
                .and_then(|_| writer.flush())
                .map_err(|source| self.write_error(source))?;
        }
        Ok(())
    }

    fn write_error(&self, source: io::Error) -> LoggerError {
        LoggerError::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn rotation_error(&self, source: io::Error) -> LoggerError {
        LoggerError::Rotation {
            path: self.path.clone(),
            source,
        }
    }

    /// 由基础路径推导轮转后的文件名
    pub fn backup_name(base: &Path, date: NaiveDate, sequence: Option<u32>) -> PathBuf {
        let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let mut name = format!("{}.{}", stem, date.format("%Y-%m-%d"));
        if let Some(sequence) = sequence {
            name.push_str(&format!(".{:03}", sequence));
        }
        if let Some(ext) = base.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        base.with_file_name(name)
    }

    /// 从 `start` 开始找第一个不存在的序号
    fn free_sequence(&self, date: NaiveDate, start: u32) -> Result<(PathBuf, u32), LoggerError> {
        let mut sequence = start;
        loop {
            let candidate = Self::backup_name(&self.base, date, Some(sequence));
            if !path_exists(&candidate).map_err(|e| self.rotation_error(e))? {
                return Ok((candidate, sequence));
            }
            sequence = sequence.checked_add(1).ok_or_else(|| {
                self.rotation_error(io::Error::other("备份序号已耗尽"))
            })?;
        }
    }

    fn rotate(&mut self, kind: Rotation, at: DateTime<Local>) -> Result<(), LoggerError> {
        let date = at.date_naive();
        self.close_current()?;

        match kind {
            Rotation::None => return self.open_current(at),
            Rotation::Threshold => {
                // 不保留序号时每次从起始序号探测，复用已被清理掉的备份名
                let start = if self.keep_backups {
                    self.backup_sequence
                } else {
                    self.backup_start
                };
                let (path, sequence) = self.free_sequence(date, start)?;
                self.path = path;
                self.backup_sequence = sequence + 1;
            }
            Rotation::Daily => {
                let candidate = Self::backup_name(&self.base, date, None);
                if path_exists(&candidate).map_err(|e| self.rotation_error(e))? {
                    let (path, sequence) = self.free_sequence(date, self.backup_start)?;
                    self.path = path;
                    self.backup_sequence = sequence + 1;
                } else {
                    self.path = candidate;
                    self.backup_sequence = self.backup_start;
                }
            }
        }

        self.open_current(at).map_err(|e| self.reopen_error(e))
    }

    /// 轮转后重新打开失败归为轮转失败
    fn reopen_error(&self, err: LoggerError) -> LoggerError {
        match err {
            LoggerError::CannotOpen { path, source } => LoggerError::Rotation { path, source },
            other => other,
        }
    }

    /// 文件被外部删除时重新创建
    fn ensure_file(&mut self) -> Result<(), LoggerError> {
        let missing = match fs::symlink_metadata(&self.path) {
            Ok(_) => false,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(_) => false,
        };
        if missing || self.file.is_none() {
            // 旧句柄指向已删除的文件，直接丢弃
            self.file = None;
            self.open_current(Local::now())?;
        }
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> Result<(), LoggerError> {
        let line = format_log_record(&self.format, record);
        let result = match self.file.as_mut() {
            Some(writer) => writer.write_all(line.as_bytes()),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "文件未打开")),
        };
        result.map_err(|source| self.write_error(source))?;

        self.counters.line_count += 1;
        self.counters.byte_count += line.len() as u64;
        Ok(())
    }
}

fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

impl LogProcessor for FileProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, record: &Record) -> Result<(), LoggerError> {
        match self.policy.decide(&self.counters, record.created_at.date_naive()) {
            Rotation::None => {}
            kind => self.rotate(kind, record.created_at)?,
        }
        self.ensure_file()?;
        self.write_record(record)
    }

    fn handle_rotate(&mut self) -> Result<(), LoggerError> {
        self.rotate(Rotation::Threshold, Local::now())
    }

    fn flush(&mut self) -> Result<(), LoggerError> {
        let result = match self.file.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        };
        result.map_err(|source| self.write_error(source))
    }

    fn cleanup(&mut self) -> Result<(), LoggerError> {
        self.close_current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Level;
    use chrono::Duration;
    use tempfile::TempDir;

    fn record(message: &str) -> Record {
        Record::new(Level::Info, "test", message)
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    fn config(dir: &TempDir) -> FileConfig {
        FileConfig::new(dir.path().join("app.log")).with_format("%M")
    }

    #[test]
    fn test_backup_name() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let base = Path::new("logs/app.log");
        assert_eq!(
            FileProcessor::backup_name(base, date, Some(7)),
            PathBuf::from("logs/app.2024-01-02.007.log")
        );
        assert_eq!(FileProcessor::backup_name(base, date, None), PathBuf::from("logs/app.2024-01-02.log"));
        assert_eq!(
            FileProcessor::backup_name(Path::new("plain"), date, Some(0)),
            PathBuf::from("plain.2024-01-02.000")
        );
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let config = FileConfig::new(dir.path().join("no/such/dir/app.log"));
        assert!(matches!(FileProcessor::open(&config), Err(LoggerError::CannotOpen { .. })));
    }

    #[test]
    fn test_line_threshold_rotation() {
        let dir = TempDir::new().unwrap();
        let mut processor = FileProcessor::open(&config(&dir).with_max_lines(2)).unwrap();
        let base = processor.path().to_path_buf();

        processor.process(&record("a")).unwrap();
        processor.process(&record("b")).unwrap();
        assert_eq!(processor.line_count(), 2);
        assert_eq!(processor.path(), base.as_path());

        processor.process(&record("c")).unwrap();
        assert_eq!(processor.line_count(), 1);
        let rotated = processor.path().to_path_buf();
        assert_ne!(rotated, base);
        assert_eq!(rotated, FileProcessor::backup_name(&base, Local::now().date_naive(), Some(0)));

        processor.cleanup().unwrap();
        assert_eq!(read(&base), "a\nb\n");
        assert_eq!(read(&rotated), "c\n");
    }

    #[test]
    fn test_byte_threshold_rotation() {
        let dir = TempDir::new().unwrap();
        let mut processor = FileProcessor::open(&config(&dir).with_max_size(6)).unwrap();

        processor.process(&record("abc")).unwrap();
        assert_eq!(processor.byte_count(), 4);
        processor.process(&record("def")).unwrap();
        assert_eq!(processor.byte_count(), 8);
        processor.process(&record("ghi")).unwrap();
        assert_eq!(processor.byte_count(), 4);
        processor.cleanup().unwrap();

        assert_eq!(read(&dir.path().join("app.log")), "abc\ndef\n");
    }

    #[test]
    fn test_rotation_skips_existing_names() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let today = Local::now().date_naive();
        let taken0 = FileProcessor::backup_name(&base, today, Some(0));
        let taken1 = FileProcessor::backup_name(&base, today, Some(1));
        fs::write(&taken0, "keep me 0\n").unwrap();
        fs::write(&taken1, "keep me 1\n").unwrap();

        let mut processor = FileProcessor::open(&config(&dir).with_max_lines(1)).unwrap();
        processor.process(&record("a")).unwrap();
        processor.process(&record("b")).unwrap();
        assert_eq!(processor.path(), FileProcessor::backup_name(&base, today, Some(2)).as_path());
        processor.process(&record("c")).unwrap();
        assert_eq!(processor.path(), FileProcessor::backup_name(&base, today, Some(3)).as_path());
        processor.cleanup().unwrap();

        assert_eq!(read(&taken0), "keep me 0\n");
        assert_eq!(read(&taken1), "keep me 1\n");
    }

    #[test]
    fn test_daily_rotation() {
        let dir = TempDir::new().unwrap();
        let mut processor = FileProcessor::open(&config(&dir).with_daily(true)).unwrap();
        let base = processor.path().to_path_buf();

        let day1 = Local::now();
        let day2 = day1 + Duration::days(1);
        processor.process(&record("first").with_time(day1)).unwrap();
        assert_eq!(processor.path(), base.as_path());

        processor.process(&record("second").with_time(day2)).unwrap();
        let rotated = FileProcessor::backup_name(&base, day2.date_naive(), None);
        assert_eq!(processor.path(), rotated.as_path());
        assert_eq!(processor.opened_on(), day2.date_naive());

        processor.process(&record("third").with_time(day2)).unwrap();
        processor.cleanup().unwrap();

        assert_eq!(read(&base), "first\n");
        assert_eq!(read(&rotated), "second\nthird\n");
    }

    #[test]
    fn test_daily_rotation_falls_back_to_sequence() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let day2 = Local::now() + Duration::days(1);
        let taken = FileProcessor::backup_name(&base, day2.date_naive(), None);
        fs::write(&taken, "old\n").unwrap();

        let mut processor = FileProcessor::open(&config(&dir).with_daily(true)).unwrap();
        processor.process(&record("x").with_time(day2)).unwrap();
        assert_eq!(
            processor.path(),
            FileProcessor::backup_name(&base, day2.date_naive(), Some(0)).as_path()
        );
        processor.cleanup().unwrap();
        assert_eq!(read(&taken), "old\n");
    }

    #[test]
    fn test_header_and_trailer() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir).with_header_trailer("BEGIN", "END").with_max_lines(1);
        let mut processor = FileProcessor::open(&config).unwrap();
        processor.process(&record("a")).unwrap();
        processor.process(&record("b")).unwrap();
        let rotated = processor.path().to_path_buf();
        processor.cleanup().unwrap();

        assert_eq!(read(&dir.path().join("app.log")), "BEGIN\na\nEND\n");
        assert_eq!(read(&rotated), "BEGIN\nb\nEND\n");
    }

    #[test]
    fn test_rotate_false_keeps_every_record() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let today = Local::now().date_naive();
        let mut processor =
            FileProcessor::open(&config(&dir).with_max_lines(2).with_daily(true).with_rotate(false)).unwrap();
        for message in ["a", "b", "c", "d", "e"] {
            processor.process(&record(message)).unwrap();
        }
        processor.cleanup().unwrap();

        assert_eq!(read(&base), "a\nb\n");
        assert_eq!(read(&FileProcessor::backup_name(&base, today, Some(0))), "c\nd\n");
        assert_eq!(read(&FileProcessor::backup_name(&base, today, Some(1))), "e\n");
    }

    #[test]
    fn test_rotate_false_reuses_freed_names() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let today = Local::now().date_naive();
        let first = FileProcessor::backup_name(&base, today, Some(0));
        let second = FileProcessor::backup_name(&base, today, Some(1));

        let mut processor = FileProcessor::open(&config(&dir).with_max_lines(1).with_rotate(false)).unwrap();
        processor.process(&record("a")).unwrap();
        processor.process(&record("b")).unwrap();
        assert_eq!(processor.path(), first.as_path());
        processor.process(&record("c")).unwrap();
        assert_eq!(processor.path(), second.as_path());

        processor.flush().unwrap();
        fs::remove_file(&first).unwrap();
        processor.process(&record("d")).unwrap();
        assert_eq!(processor.path(), first.as_path());
        processor.cleanup().unwrap();

        assert_eq!(read(&second), "c\n");
        assert_eq!(read(&first), "d\n");
    }

    #[test]
    fn test_backup_start() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let mut processor = FileProcessor::open(&config(&dir).with_max_lines(1).with_backup_start(5)).unwrap();
        processor.process(&record("a")).unwrap();
        processor.process(&record("b")).unwrap();
        assert_eq!(
            processor.path(),
            FileProcessor::backup_name(&base, Local::now().date_naive(), Some(5)).as_path()
        );
        processor.cleanup().unwrap();
    }

    #[test]
    fn test_rotation_into_removed_directory_fails() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir(&logs).unwrap();
        let mut processor = FileProcessor::open(&FileConfig::new(logs.join("app.log")).with_max_lines(1)).unwrap();
        processor.process(&record("a")).unwrap();

        fs::remove_dir_all(&logs).unwrap();
        assert!(matches!(processor.process(&record("b")), Err(LoggerError::Rotation { .. })));
    }

    #[test]
    fn test_reopen_after_external_removal() {
        let dir = TempDir::new().unwrap();
        let mut processor = FileProcessor::open(&config(&dir).with_header_trailer("H", "")).unwrap();
        processor.process(&record("a")).unwrap();
        processor.flush().unwrap();

        fs::remove_file(dir.path().join("app.log")).unwrap();
        processor.process(&record("b")).unwrap();
        assert_eq!(processor.line_count(), 1);
        processor.cleanup().unwrap();

        assert_eq!(read(&dir.path().join("app.log")), "H\nb\n");
    }

    #[test]
    fn test_forced_rotation() {
        let dir = TempDir::new().unwrap();
        let mut processor = FileProcessor::open(&config(&dir)).unwrap();
        processor.process(&record("a")).unwrap();
        processor.handle_rotate().unwrap();
        processor.process(&record("b")).unwrap();
        let rotated = processor.path().to_path_buf();
        processor.cleanup().unwrap();

        assert_ne!(rotated, dir.path().join("app.log"));
        assert_eq!(read(&dir.path().join("app.log")), "a\n");
        assert_eq!(read(&rotated), "b\n");
    }
}
