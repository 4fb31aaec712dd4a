//! スキャンセッション
//!
//! ファイル選択・アップロード・レピュテーション確認を `UiController` 経由で進め、
//! 遷移のたびに描画先（`ViewSink`）へ最新の `View` を渡す。
//! 表示状態を書き換えるのはここだけ。

use crate::client::ScanBackend;
use crate::error::{Result, ScanError};
use crate::poller::{poll_job, CancelToken, PollPolicy};
use crate::scanner::{self, matches_digest, sha256_hex};
use pe_scan_common::{
    sniff, Applied, Event, FileHandle, FlowTicket, ReputationReport, ReputationResponse,
    SessionState, Signature, UiController, View,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// 描画先
pub trait ViewSink: Send + Sync {
    fn render(&self, view: &View);
}

/// 描画しない
pub struct NullSink;

impl ViewSink for NullSink {
    fn render(&self, _view: &View) {}
}

#[derive(Debug, Clone)]
struct Selected {
    file: FileHandle,
    sha256: String,
}

pub struct Session {
    backend: Arc<dyn ScanBackend>,
    policy: PollPolicy,
    sink: Arc<dyn ViewSink>,
    ui: Mutex<UiController>,
    current: Mutex<Option<Selected>>,
    reputation_cancel: Mutex<CancelToken>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    pub fn new(backend: Arc<dyn ScanBackend>, policy: PollPolicy, sink: Arc<dyn ViewSink>) -> Self {
        Self {
            backend,
            policy,
            sink,
            ui: Mutex::new(UiController::new()),
            current: Mutex::new(None),
            reputation_cancel: Mutex::new(CancelToken::new()),
        }
    }

    pub fn view(&self) -> View {
        lock(&self.ui).view()
    }

    pub fn state(&self) -> SessionState {
        lock(&self.ui).state().clone()
    }

    /// ファイルを選択して判定する
    ///
    /// 進行中のレピュテーション確認は取り消され、結果は表示に反映されない。
    pub async fn select(&self, path: &Path) -> Result<Signature> {
        lock(&self.reputation_cancel).cancel();

        let loaded = scanner::load_file(path).await;

        let mut ui = lock(&self.ui);
        match loaded {
            Ok(file) => {
                let signature = sniff(&file);
                let sha256 = sha256_hex(file.bytes());
                log::info!("{}: {:?}", file.name(), signature);
                *lock(&self.current) = Some(Selected { file, sha256 });
                ui.select(signature);
                self.sink.render(&ui.view());
                Ok(signature)
            }
            Err(e) => {
                log::error!("{}", e);
                *lock(&self.current) = None;
                ui.selection_failed();
                self.sink.render(&ui.view());
                Err(e)
            }
        }
    }

    /// 選択中のファイルを分類バックエンドへ送る
    ///
    /// ファイル未選択・ボタン無効時は何もせず None。
    pub async fn upload(&self) -> Option<Applied> {
        let (ticket, selected) = {
            let mut ui = lock(&self.ui);
            let selected = lock(&self.current).clone()?;
            let ticket = ui.begin_upload()?;
            self.sink.render(&ui.view());
            (ticket, selected)
        };

        log::info!("アップロード: {}", selected.file.name());
        let event = match self.backend.upload(&selected.file).await {
            Ok(verdict) => {
                log::info!("判定: {:?}", verdict);
                Event::UploadCompleted(verdict)
            }
            Err(e) => {
                log::warn!("アップロード失敗: {}", e);
                Event::UploadFailed(e.failure())
            }
        };

        Some(self.apply(&ticket, event))
    }

    /// レピュテーション確認（必要ならポーリングまで）
    pub async fn check_reputation(&self) -> Option<Applied> {
        let (ticket, selected) = {
            let mut ui = lock(&self.ui);
            let selected = lock(&self.current).clone()?;
            let ticket = ui.begin_reputation()?;
            self.sink.render(&ui.view());
            (ticket, selected)
        };
        let cancel = self.renew_cancel_token();

        log::info!("レピュテーション確認: {}", selected.file.name());
        let outcome = self.resolve_reputation(&ticket, &selected.file, &cancel).await;

        let event = match outcome {
            Ok(report) => {
                if !matches_digest(&selected.sha256, report.sha256.as_deref()) {
                    log::warn!(
                        "レポートのSHA-256が選択中のファイルと一致しません: local={} report={}",
                        selected.sha256,
                        report.sha256.as_deref().unwrap_or_default()
                    );
                }
                Event::ReputationCompleted(report)
            }
            Err(e) if e.is_cancelled() => {
                log::info!("レピュテーション確認は取り消されました");
                return Some(Applied::Stale);
            }
            Err(e) => {
                log::warn!("レピュテーション確認失敗: {}", e);
                Event::ReputationFailed(e.failure())
            }
        };

        Some(self.apply(&ticket, event))
    }

    /// 即時結果・ポーリング結果を同じ ReputationReport にそろえる
    async fn resolve_reputation(
        &self,
        ticket: &FlowTicket,
        file: &FileHandle,
        cancel: &CancelToken,
    ) -> Result<ReputationReport> {
        match self.backend.submit_reputation(file).await? {
            ReputationResponse::Immediate(report) => Ok(report),
            ReputationResponse::Queued { job_id } => {
                log::info!("解析ジョブ投入: {}", job_id);
                let queued = Event::ReputationQueued {
                    job_id: job_id.clone(),
                };
                if self.apply(ticket, queued) != Applied::Changed {
                    return Err(ScanError::Cancelled);
                }

                let mut poll_ticket = self.policy.ticket(job_id);
                poll_job(self.backend.as_ref(), &mut poll_ticket, &self.policy, cancel).await
            }
        }
    }

    /// 前回のトークンを取り消して新しいものに差し替える
    fn renew_cancel_token(&self) -> CancelToken {
        let mut slot = lock(&self.reputation_cancel);
        slot.cancel();
        *slot = CancelToken::new();
        slot.clone()
    }

    fn apply(&self, ticket: &FlowTicket, event: Event) -> Applied {
        let mut ui = lock(&self.ui);
        let applied = ui.apply(ticket, event);
        match applied {
            Applied::Changed => self.sink.render(&ui.view()),
            Applied::Stale => log::info!("古い結果を破棄しました ({:?})", ticket.track),
            Applied::Rejected => log::warn!("受け付けない遷移です ({:?})", ticket.track),
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pe_scan_common::{JobStatus, ScanVerdict};
    use tempfile::tempdir;

    struct FixedBackend;

    #[async_trait]
    impl ScanBackend for FixedBackend {
        async fn upload(&self, _file: &FileHandle) -> Result<ScanVerdict> {
            Ok(ScanVerdict::Benign)
        }

        async fn submit_reputation(&self, _file: &FileHandle) -> Result<ReputationResponse> {
            Err(ScanError::Server {
                status: 429,
                message: "Failed to scan the file".into(),
            })
        }

        async fn job_status(&self, _job_id: &str) -> Result<JobStatus> {
            unreachable!()
        }
    }

    fn session() -> Session {
        Session::new(Arc::new(FixedBackend), PollPolicy::default(), Arc::new(NullSink))
    }

    #[tokio::test]
    async fn test_actions_without_selection_are_noops() {
        let session = session();
        assert!(session.upload().await.is_none());
        assert!(session.check_reputation().await.is_none());
    }

    #[tokio::test]
    async fn test_select_and_upload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.exe");
        std::fs::write(&path, b"MZ\x00\x00").unwrap();

        let session = session();
        assert_eq!(session.select(&path).await.unwrap(), Signature::Recognized);
        assert_eq!(session.upload().await, Some(Applied::Changed));
        assert_eq!(session.view().verdict_text, "FILE IS BENIGN!");
    }

    #[tokio::test]
    async fn test_server_error_surfaces_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, b"hello").unwrap();

        let session = session();
        session.select(&path).await.unwrap();
        assert_eq!(session.check_reputation().await, Some(Applied::Changed));

        let view = session.view();
        assert_eq!(view.status_text, "Failed to scan the file");
        assert!(view.upload.is_ready());
        assert!(view.reputation.is_ready());
    }

    #[tokio::test]
    async fn test_select_missing_file() {
        let session = session();
        let result = session.select(Path::new("/nonexistent/pe-scan/x.exe")).await;
        assert!(matches!(result, Err(ScanError::FileRead { .. })));
        assert_eq!(session.view().verdict_text, "Error: Failed to read file.");
        assert!(session.upload().await.is_none());
    }
}
