use std::io::Write;

use anstyle::{AnsiColor, Color, RgbColor, Style};

/// 依赖库自身的日志过于频繁，只保留 warn 以上
const NOISY_TARGETS: &[&str] = &["winit", "calloop", "sctk", "gltf"];

const LOCATION_COLOR: RgbColor = RgbColor(110, 110, 110);
const BODY_COLOR: RgbColor = RgbColor(75, 75, 75);

/// 每个级别的前缀颜色
fn level_color(level: log::Level) -> AnsiColor {
    match level {
        log::Level::Error => AnsiColor::Red,
        log::Level::Warn => AnsiColor::Yellow,
        log::Level::Info => AnsiColor::Green,
        log::Level::Debug => AnsiColor::Blue,
        log::Level::Trace => AnsiColor::Magenta,
    }
}

/// 只保留源文件名，windows 与 unix 的分隔符都会出现
fn short_file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// 初始化全局 logger
///
/// 输出格式为 `[时间] 级别 [文件:行号] 内容`。默认级别为 Info，可以通过 `RUST_LOG` 覆盖；
/// 重复调用时保留第一次安装的 logger
pub fn init_log() {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let level_style = Style::new().bold().fg_color(Some(Color::Ansi(level_color(record.level()))));
            let location_style = Style::new().fg_color(Some(Color::Rgb(LOCATION_COLOR)));
            let body_style = Style::new().fg_color(Some(Color::Rgb(BODY_COLOR)));

            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let file = short_file_name(record.file().unwrap_or(""));
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "{level_style}[{time}] {:<5}{level_style:#} {location_style}[{file}:{line}]{location_style:#} \
                 {body_style}{}{body_style:#}",
                record.level(),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info);
    for target in NOISY_TARGETS {
        builder.filter_module(target, log::LevelFilter::Warn);
    }
    // RUST_LOG 最后解析，可以覆盖上面的默认值
    builder.parse_default_env();

    if builder.try_init().is_err() {
        log::debug!("logger already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_file_name() {
        assert_eq!(short_file_name("engine/crates/kascade-gfx/src/context.rs"), "context.rs");
        assert_eq!(short_file_name("engine\\crates\\kascade-gfx\\src\\context.rs"), "context.rs");
        assert_eq!(short_file_name("main.rs"), "main.rs");
        assert_eq!(short_file_name(""), "");
    }

    #[test]
    fn test_level_colors_are_distinct() {
        let levels = [log::Level::Error, log::Level::Warn, log::Level::Info, log::Level::Debug, log::Level::Trace];
        for (i, a) in levels.iter().enumerate() {
            for b in &levels[i + 1..] {
                assert_ne!(level_color(*a), level_color(*b));
            }
        }
        assert_eq!(level_color(log::Level::Error), AnsiColor::Red);
    }

    #[test]
    fn test_init_log_twice() {
        init_log();
        init_log();
        log::info!("logger installed");
    }
}
