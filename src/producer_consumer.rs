//! 生产者消费者模式实现
//! 每个目的地一个消费者线程，独占该目的地的全部可变状态；
//! 生产者只通过有界队列投递不可变的记录。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use parking_lot::{Mutex, RwLock};

use crate::config::Record;
use crate::core::LoggerError;

/// 记录队列上的命令
#[derive(Debug, Clone)]
pub enum LogCommand {
    /// 写入一条记录
    Write(Arc<Record>),
    /// 强制刷新
    Flush,
}

/// 处理器 trait - 各个处理器实现具体的写入逻辑
///
/// 所有方法只会在消费者线程上调用。任何返回的错误对该处理器都是致命的。
pub trait LogProcessor: Send + 'static {
    /// 处理器名称，用于错误输出
    fn name(&self) -> &str;

    /// 处理单条记录
    fn process(&mut self, record: &Record) -> Result<(), LoggerError>;

    /// 处理外部轮转请求 - 默认忽略（只有文件处理器需要处理）
    fn handle_rotate(&mut self) -> Result<(), LoggerError> {
        Ok(())
    }

    /// 刷新操作
    fn flush(&mut self) -> Result<(), LoggerError>;

    /// 正常关闭时的清理（写页脚、关闭句柄）
    fn cleanup(&mut self) -> Result<(), LoggerError>;
}

/// 单个处理器的工作线程
///
/// 队列满时 `submit` 阻塞调用方（阻塞式背压），保证不丢记录。
pub struct ProcessorWorker {
    name: String,
    sender: RwLock<Option<Sender<LogCommand>>>,
    rotate_sender: Sender<()>,
    running: Arc<AtomicBool>,
    worker_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ProcessorWorker {
    /// 启动处理器的工作线程，`buffer_len` 为队列容量
    pub fn new<P>(processor: P, buffer_len: usize) -> Self
    where
        P: LogProcessor,
    {
        let (sender, receiver) = bounded(buffer_len.max(1));
        let (rotate_sender, rotate_receiver) = unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let name = processor.name().to_string();

        let thread_running = Arc::clone(&running);
        let worker_thread = thread::Builder::new()
            .name(format!("log-{}", name))
            .spawn(move || Self::worker_thread(processor, receiver, rotate_receiver, thread_running));

        let worker_thread = match worker_thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("[{}] 启动工作线程失败: {}", name, e);
                running.store(false, Ordering::SeqCst);
                None
            }
        };

        Self {
            name,
            sender: RwLock::new(Some(sender)),
            rotate_sender,
            running,
            worker_thread: Mutex::new(worker_thread),
        }
    }

    fn worker_thread<P>(
        mut processor: P,
        receiver: Receiver<LogCommand>,
        rotate_receiver: Receiver<()>,
        running: Arc<AtomicBool>,
    ) where
        P: LogProcessor,
    {
        if let Err(e) = Self::run(&mut processor, receiver, rotate_receiver) {
            eprintln!("[{}] 写入器已停止: {}", processor.name(), e);
        }
        running.store(false, Ordering::SeqCst);
    }

    /// 消费循环；返回错误即终止该处理器
    fn run<P>(processor: &mut P, receiver: Receiver<LogCommand>, rotate_receiver: Receiver<()>) -> Result<(), LoggerError>
    where
        P: LogProcessor,
    {
        loop {
            // 轮转请求优先于队列中的记录
            if rotate_receiver.try_recv().is_ok() {
                processor.handle_rotate()?;
                continue;
            }

            select! {
                recv(rotate_receiver) -> msg => match msg {
                    Ok(()) => processor.handle_rotate()?,
                    // 发送端随 ProcessorWorker 存活到线程结束之后
                    Err(_) => {}
                },
                recv(receiver) -> command => match command {
                    Ok(LogCommand::Write(record)) => {
                        if rotate_receiver.try_recv().is_ok() {
                            processor.handle_rotate()?;
                        }
                        processor.process(&record)?;
                        if receiver.is_empty() {
                            processor.flush()?;
                        }
                    }
                    Ok(LogCommand::Flush) => processor.flush()?,
                    // 发送端已关闭且队列已排空
                    Err(_) => {
                        processor.flush()?;
                        return processor.cleanup();
                    }
                },
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 投递一条记录；关闭后或处理器已停止时静默丢弃
    pub fn submit(&self, record: Arc<Record>) {
        if let Some(sender) = self.sender.read().as_ref() {
            let _ = sender.send(LogCommand::Write(record));
        }
    }

    /// 请求在处理下一条记录之前强制轮转
    pub fn rotate_now(&self) {
        let _ = self.rotate_sender.send(());
    }

    /// 请求刷新缓冲
    pub fn flush(&self) {
        if let Some(sender) = self.sender.read().as_ref() {
            let _ = sender.send(LogCommand::Flush);
        }
    }

    /// 消费者线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 停止接收新记录，排空队列，写页脚并关闭文件，等待线程结束。可重复调用。
    pub fn close(&self) {
        // 丢弃发送端后，消费者处理完剩余记录即退出
        drop(self.sender.write().take());

        if let Some(thread) = self.worker_thread.lock().take() {
            if thread.join().is_err() {
                eprintln!("[{}] 工作线程异常退出", self.name);
            }
        }
    }
}

impl Drop for ProcessorWorker {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ProcessorWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorWorker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
