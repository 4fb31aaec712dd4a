//! 端末への描画
//!
//! `View` の差分だけを出力する。解析待ちの間はスピナーを回す。

use crate::session::ViewSink;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pe_scan_common::view::{REPUTATION_PENDING_TEXT, REPUTATION_PROCESSING_TEXT};
use pe_scan_common::{TextColor, View};
use std::io::IsTerminal;
use std::sync::Mutex;
use std::time::Duration;

const SPINNER_TICK: Duration = Duration::from_millis(120);

pub struct TerminalView {
    /// JSON出力時は何も描かない
    quiet: bool,
    is_tty: bool,
    last: Mutex<Option<View>>,
    spinner: Mutex<Option<ProgressBar>>,
}

impl TerminalView {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            is_tty: std::io::stderr().is_terminal(),
            last: Mutex::new(None),
            spinner: Mutex::new(None),
        }
    }

    fn start_spinner(&self, message: &str) {
        let mut slot = self.spinner.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_some() {
            return;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(SPINNER_TICK);
        *slot = Some(bar);
    }

    fn stop_spinner(&self) {
        let mut slot = self.spinner.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(bar) = slot.take() {
            bar.finish_and_clear();
        }
    }
}

/// 判定テキストを色付けする
pub fn paint_verdict(text: &str, color: TextColor) -> String {
    match color {
        TextColor::Danger => text.red().bold().to_string(),
        TextColor::Safe => text.green().bold().to_string(),
        TextColor::Default => text.to_string(),
    }
}

/// レポート6欄を字下げした行にする
pub fn report_lines(fields: &[String]) -> Vec<String> {
    fields.iter().map(|field| format!("  {}", field)).collect()
}

impl ViewSink for TerminalView {
    fn render(&self, view: &View) {
        if self.quiet {
            return;
        }

        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        let previous = last.as_ref();

        let verdict_changed = previous.map_or(true, |p| {
            p.verdict_text != view.verdict_text || p.verdict_color != view.verdict_color
        });
        if verdict_changed && !view.verdict_text.is_empty() {
            self.stop_spinner();
            println!("{}", paint_verdict(&view.verdict_text, view.verdict_color));
        }

        let status_changed = previous.map_or(true, |p| {
            p.status_text != view.status_text || p.status_visible != view.status_visible
        });
        if status_changed {
            let processing = view.status_visible && view.status_text == REPUTATION_PROCESSING_TEXT;
            if processing && self.is_tty {
                self.start_spinner(&view.status_text);
            } else {
                self.stop_spinner();
                if view.status_visible && !view.status_text.is_empty() {
                    if view.status_text == REPUTATION_PENDING_TEXT || processing {
                        println!("{}", view.status_text.dimmed());
                    } else {
                        println!("{}", view.status_text.yellow());
                    }
                }
            }
        }

        let fields_changed = previous.map_or(true, |p| p.report_fields != view.report_fields);
        if fields_changed {
            if let Some(fields) = &view.report_fields {
                self.stop_spinner();
                for line in report_lines(fields) {
                    println!("{}", line);
                }
            }
        }

        *last = Some(view.clone());
    }
}

impl Drop for TerminalView {
    fn drop(&mut self) {
        self.stop_spinner();
    }
}
