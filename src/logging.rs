//! ログ初期化（log + env_logger）

use chrono::Local;
use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// ログ設定
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    pub level: LevelFilter,
    /// タイムスタンプを表示
    pub timestamps: bool,
    /// モジュールパスを表示
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            timestamps: true,
            module_path: false,
        }
    }
}

impl LogConfig {
    /// 設定ファイルの log_level から作る（不明な値は info）
    pub fn from_level_name(name: &str) -> Self {
        let level = parse_level(name).unwrap_or(LevelFilter::Info);
        Self {
            level,
            module_path: level >= LevelFilter::Debug,
            ..Default::default()
        }
    }

    /// `-v` 指定時
    pub fn verbose() -> Self {
        Self {
            level: LevelFilter::Debug,
            timestamps: true,
            module_path: true,
        }
    }

    /// `-q` 指定時（エラーのみ）
    pub fn quiet() -> Self {
        Self {
            level: LevelFilter::Error,
            timestamps: false,
            module_path: false,
        }
    }
}

fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// ロガーを初期化（RUST_LOG があればそちらを優先）
///
/// 二重初期化はエラーにせず無視する。
pub fn init_logging(config: LogConfig) {
    let mut builder = Builder::new();
    builder.filter_level(config.level);
    builder.parse_env(Env::default());

    builder.format(move |buf, record| {
        if config.timestamps {
            write!(buf, "{} ", Local::now().format("%H:%M:%S"))?;
        }
        write!(buf, "[{:<5}] ", record.level())?;
        if config.module_path {
            if let Some(path) = record.module_path() {
                write!(buf, "{}: ", path)?;
            }
        }
        writeln!(buf, "{}", record.args())
    });

    if builder.try_init().is_ok() {
        log::debug!("ログレベル: {:?}", config.level);
    }
}
