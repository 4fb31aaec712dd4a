use anyhow::{bail, Context};
use clap::Parser;
use pe_scan::{cli, client, config, logging, scanner, session, terminal};
use cli::{Cli, Commands};
use client::HttpBackend;
use config::Config;
use logging::{init_logging, LogConfig};
use pe_scan_common::{ReputationState, ScanState, SessionState, Signature};
use session::Session;
use std::path::Path;
use std::sync::Arc;
use terminal::TerminalView;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // config コマンドは設定ファイルが壊れていても動かす（修復用）
    let (mut config, load_error) = if matches!(cli.command, Commands::Config { .. }) {
        Config::load_lenient()
    } else {
        (Config::load().context("設定の読み込みに失敗しました")?, None)
    };

    init_logging(if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::from_level_name(&config.log_level)
    });

    if let Some(e) = &load_error {
        log::warn!("設定ファイルを読み込めないため既定値を使います: {}", e);
    }

    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.trim_end_matches('/').to_string();
        config.validate()?;
    }

    match cli.command {
        Commands::Sniff { file } => {
            let signature = scanner::sniff_path(&file).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "file": file.display().to_string(),
                        "recognized": signature.is_recognized(),
                    })
                );
            } else if signature.is_recognized() {
                println!("{}: 実行ファイル (MZ)", file.display());
            } else {
                println!("{}: 実行ファイルではありません", file.display());
            }
        }

        Commands::Scan { file } => {
            let session = open_session(&config, cli.json)?;
            select(&session, &file).await?;
            session.upload().await;
            finish(&session, cli.json)?;
        }

        Commands::Reputation { file } => {
            let session = open_session(&config, cli.json)?;
            select(&session, &file).await?;
            session.check_reputation().await;
            finish(&session, cli.json)?;
        }

        Commands::Run { file } => {
            let session = open_session(&config, cli.json)?;
            let signature = select(&session, &file).await?;
            if signature.is_recognized() {
                session.upload().await;
            }
            session.check_reputation().await;
            finish(&session, cli.json)?;
        }

        Commands::Config { set_endpoint, show } => {
            if let Some(endpoint) = set_endpoint {
                config.set_endpoint(endpoint)?;
                println!("✔ エンドポイントを保存しました: {}", config.endpoint);
            }
            if show {
                println!("設定ファイル: {}", Config::config_path()?.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn open_session(config: &Config, json: bool) -> anyhow::Result<Session> {
    let backend = HttpBackend::new(&config.endpoint, config.request_timeout())?;
    log::debug!("endpoint: {}", config.endpoint);
    Ok(Session::new(
        Arc::new(backend),
        config.poll_policy(),
        Arc::new(TerminalView::new(json)),
    ))
}

async fn select(session: &Session, file: &Path) -> anyhow::Result<Signature> {
    session
        .select(file)
        .await
        .with_context(|| format!("{} を選択できません", file.display()))
}

/// 最終表示を出力し、失敗したトラックがあればエラーで終わる
fn finish(session: &Session, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&session.view())?);
    }

    if let Some(message) = failure_message(&session.state()) {
        bail!(message);
    }
    Ok(())
}

fn failure_message(state: &SessionState) -> Option<String> {
    if let ScanState::ScanFailure(failure) = &state.scan {
        return Some(failure.message());
    }
    if let ReputationState::ReputationFailure(failure) = &state.reputation {
        return Some(failure.message());
    }
    None
}
