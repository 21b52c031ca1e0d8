//! 文件日志示例
//!
//! 注册默认的 sys/run/err 三个目的地，再额外加一个按行数轮转的 XML 目的地。

use rat_filelog::{DestinationConfig, FileConfig, Level, LOGGER};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    rat_filelog::init_file_log_writer("gateway", "log/", true)?;

    let xml = FileConfig::xml("log/gateway.xml").with_max_lines(100);
    LOGGER.create_destination("xml", &DestinationConfig::file(Level::Warning, xml))?;

    rat_filelog::finest!("songshiqi");
    rat_filelog::error!("Oh no!  {} + {} = {}!", 2, 2, 2 + 2);
    rat_filelog::info!("all about songshiqi");

    for i in 0..250 {
        rat_filelog::warn!("警告 #{}", i);
    }

    rat_filelog::close();
    println!("日志已写入 log/ 目录");
    Ok(())
}
