//! 非同期ジョブのポーリング
//!
//! 一定間隔で `/status/{id}` を問い合わせ、`completed` になったら結果を返す。
//! 回数上限・全体タイムアウト・取り消しトークンで必ず終わる。
//! 問い合わせでエラーが出たら再スケジュールせず即座に中断する。

use crate::client::ScanBackend;
use crate::error::{Result, ScanError};
use pe_scan_common::{JobStatus, PollTicket, ReputationReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout_at, Instant};

/// ポーリング方針
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// 問い合わせ間隔（初回の前にも待つ）
    pub interval: Duration,
    /// 最大問い合わせ回数
    pub max_attempts: u32,
    /// 全体の上限時間
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_attempts: 40,
            timeout: Duration::from_secs(900),
        }
    }
}

impl PollPolicy {
    /// このポリシーでジョブ用のチケットを発行
    pub fn ticket(&self, job_id: impl Into<String>) -> PollTicket {
        PollTicket::new(job_id, self.interval.as_millis() as u64)
    }
}

/// 要求単位の取り消しトークン
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// 取り消されるまで待つ
    pub async fn cancelled(&self) {
        loop {
            // フラグ確認より先に登録しておく（取りこぼし防止）
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// ジョブが終端状態になるまでポーリング
///
/// どの経路で終わってもチケットは無効化される。
pub async fn poll_job<B>(
    backend: &B,
    ticket: &mut PollTicket,
    policy: &PollPolicy,
    cancel: &CancelToken,
) -> Result<ReputationReport>
where
    B: ScanBackend + ?Sized,
{
    let result = run_poll_loop(backend, ticket, policy, cancel).await;
    ticket.deactivate();
    result
}

async fn run_poll_loop<B>(
    backend: &B,
    ticket: &PollTicket,
    policy: &PollPolicy,
    cancel: &CancelToken,
) -> Result<ReputationReport>
where
    B: ScanBackend + ?Sized,
{
    let deadline = Instant::now() + policy.timeout;
    let interval = Duration::from_millis(ticket.interval_ms);
    let job_id = ticket.job_id.as_str();
    let mut attempts = 0u32;

    let timed_out = |attempts: u32| {
        log::warn!("ポーリング上限: job={} attempts={}", job_id, attempts);
        ScanError::PollTimeout {
            job_id: job_id.to_string(),
            attempts,
        }
    };

    loop {
        if attempts >= policy.max_attempts || Instant::now() >= deadline {
            return Err(timed_out(attempts));
        }

        // 待機も期限で打ち切る
        let wait = interval.min(deadline.saturating_duration_since(Instant::now()));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            _ = sleep(wait) => {}
        }
        if Instant::now() >= deadline {
            return Err(timed_out(attempts));
        }

        attempts += 1;
        log::debug!("ステータス確認 {}/{}: job={}", attempts, policy.max_attempts, job_id);

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            status = timeout_at(deadline, backend.job_status(job_id)) => match status {
                Ok(status) => status,
                Err(_) => return Err(timed_out(attempts)),
            },
        };

        match status {
            Ok(JobStatus::Completed(report)) => {
                log::info!("ジョブ完了: job={} ({}回目)", job_id, attempts);
                return Ok(report);
            }
            Ok(JobStatus::Running(state)) => {
                log::debug!("ジョブ処理中: job={} status={}", job_id, state);
            }
            Err(source) => {
                log::warn!("ポーリング中断: job={}: {}", job_id, source);
                return Err(ScanError::PollingAbort {
                    job_id: job_id.to_string(),
                    source: Box::new(source),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pe_scan_common::{FileHandle, ReputationResponse, ScanVerdict};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 問い合わせ時刻を記録し、用意した応答を順に返す
    struct ScriptedStatus {
        replies: Mutex<VecDeque<Result<JobStatus>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedStatus {
        fn new(replies: Vec<Result<JobStatus>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScanBackend for ScriptedStatus {
        async fn upload(&self, _file: &FileHandle) -> Result<ScanVerdict> {
            unreachable!("not used by the poller")
        }

        async fn submit_reputation(&self, _file: &FileHandle) -> Result<ReputationResponse> {
            unreachable!("not used by the poller")
        }

        async fn job_status(&self, _job_id: &str) -> Result<JobStatus> {
            self.calls.lock().unwrap().push(Instant::now());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(JobStatus::Running("queued".into())))
        }
    }

    /// 応答に1分かかる
    struct SlowStatus;

    #[async_trait]
    impl ScanBackend for SlowStatus {
        async fn upload(&self, _file: &FileHandle) -> Result<ScanVerdict> {
            unreachable!("not used by the poller")
        }

        async fn submit_reputation(&self, _file: &FileHandle) -> Result<ReputationResponse> {
            unreachable!("not used by the poller")
        }

        async fn job_status(&self, _job_id: &str) -> Result<JobStatus> {
            sleep(Duration::from_secs(60)).await;
            Ok(JobStatus::Running("queued".into()))
        }
    }

    fn completed() -> JobStatus {
        JobStatus::Completed(ReputationReport {
            malicious: 1,
            undetected: 9,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_query_waits_full_interval() {
        let backend = ScriptedStatus::new(vec![Ok(completed())]);
        let policy = PollPolicy::default();
        let mut ticket = policy.ticket("job");
        let start = Instant::now();

        let report = poll_job(&backend, &mut ticket, &policy, &CancelToken::new()).await.unwrap();

        assert_eq!(report.detection_rate(), "1/10");
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0] - start >= Duration::from_secs(15));
        assert!(!ticket.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_interval_until_completed() {
        let backend = ScriptedStatus::new(vec![
            Ok(JobStatus::Running("queued".into())),
            Ok(JobStatus::Running("in-progress".into())),
            Ok(completed()),
        ]);
        let policy = PollPolicy::default();
        let mut ticket = policy.ticket("job");

        poll_job(&backend, &mut ticket, &policy, &CancelToken::new()).await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(15));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_aborts_without_reschedule() {
        let backend = ScriptedStatus::new(vec![
            Ok(JobStatus::Running("queued".into())),
            Err(ScanError::Server {
                status: 500,
                message: "Failed to get status. Status code: 500".into(),
            }),
            Ok(completed()),
        ]);
        let policy = PollPolicy::default();
        let mut ticket = policy.ticket("job");

        let err = poll_job(&backend, &mut ticket, &policy, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::PollingAbort { .. }));
        assert_eq!(backend.calls().len(), 2);
        assert!(!ticket.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_limit() {
        let backend = ScriptedStatus::new(Vec::new());
        let policy = PollPolicy {
            max_attempts: 3,
            ..Default::default()
        };
        let mut ticket = policy.ticket("job");

        let err = poll_job(&backend, &mut ticket, &policy, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::PollTimeout { attempts: 3, .. }));
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_timeout() {
        let backend = ScriptedStatus::new(Vec::new());
        let policy = PollPolicy {
            interval: Duration::from_secs(15),
            max_attempts: 1000,
            timeout: Duration::from_secs(60),
        };
        let mut ticket = policy.ticket("job");

        let err = poll_job(&backend, &mut ticket, &policy, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::PollTimeout { .. }));
        // 15, 30, 45秒。60秒ちょうどは期限切れ
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_query_after_deadline() {
        let backend = ScriptedStatus::new(Vec::new());
        let policy = PollPolicy {
            interval: Duration::from_secs(15),
            max_attempts: 1000,
            timeout: Duration::from_secs(20),
        };
        let mut ticket = policy.ticket("job");
        let start = Instant::now();

        let err = poll_job(&backend, &mut ticket, &policy, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::PollTimeout { attempts: 1, .. }));
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls.iter().all(|at| *at - start < Duration::from_secs(20)));
        // 2回目の間隔を待たずに期限で終わる
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
        assert!(!ticket.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_is_cut_at_deadline() {
        let backend = SlowStatus;
        let policy = PollPolicy {
            interval: Duration::from_secs(15),
            max_attempts: 10,
            timeout: Duration::from_secs(20),
        };
        let mut ticket = policy.ticket("job");
        let start = Instant::now();

        let err = poll_job(&backend, &mut ticket, &policy, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::PollTimeout { attempts: 1, .. }));
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_waiting() {
        let backend = Arc::new(ScriptedStatus::new(Vec::new()));
        let policy = PollPolicy::default();
        let cancel = CancelToken::new();

        let task = {
            let backend = Arc::clone(&backend);
            let cancel = cancel.clone();
            let policy = policy.clone();
            tokio::spawn(async move {
                let mut ticket = policy.ticket("job");
                let result = poll_job(&*backend, &mut ticket, &policy, &cancel).await;
                (result, ticket)
            })
        };

        // 2回問い合わせた後に取り消す
        sleep(Duration::from_secs(31)).await;
        cancel.cancel();

        let (result, ticket) = task.await.unwrap();
        assert!(matches!(result, Err(ScanError::Cancelled)));
        assert!(!ticket.is_active());
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let backend = ScriptedStatus::new(vec![Ok(completed())]);
        let policy = PollPolicy::default();
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut ticket = policy.ticket("job");
        let result = poll_job(&backend, &mut ticket, &policy, &cancel).await;
        assert!(matches!(result, Err(ScanError::Cancelled)));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_ticket_interval_from_policy() {
        let ticket = PollPolicy::default().ticket("abc");
        assert_eq!(ticket.interval_ms, 15_000);
        assert_eq!(ticket.job_id, "abc");
        assert!(ticket.is_active());
    }
}
