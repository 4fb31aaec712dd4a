use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pe-scan")]
#[command(about = "実行ファイル判定・マルウェア解析クライアント", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// エラー以外のログを出さない
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// 最終的な表示状態をJSONで出力
    #[arg(long, global = true)]
    pub json: bool,

    /// バックエンドのURL（設定ファイル・環境変数より優先）
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 先頭2バイトで実行ファイルかどうか判定（通信なし）
    Sniff {
        /// 対象ファイル
        #[arg(required = true)]
        file: PathBuf,
    },

    /// 分類バックエンドで判定
    Scan {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// レピュテーション確認（必要なら完了までポーリング）
    Reputation {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// 判定とレピュテーション確認を順に実行
    Run {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// 設定の表示・変更
    Config {
        /// エンドポイントを保存
        #[arg(long)]
        set_endpoint: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_globals() {
        let cli = Cli::parse_from(["pe-scan", "run", "setup.exe", "--json", "--endpoint", "http://10.0.0.2:5000"]);
        assert!(cli.json);
        assert_eq!(cli.endpoint.as_deref(), Some("http://10.0.0.2:5000"));
        assert!(matches!(cli.command, Commands::Run { ref file } if file == &PathBuf::from("setup.exe")));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["pe-scan", "-v", "-q", "sniff", "a.exe"]).is_err());
    }
}
