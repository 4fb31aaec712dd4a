use super::ScanBackend;
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use pe_scan_common::{
    extract_error_message, parse_reputation_response, parse_status_response,
    parse_upload_response, FileHandle, JobStatus, ReputationResponse, ScanVerdict,
};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use std::time::Duration;

/// エラーボディを表示用に切り詰める長さ
const BODY_SNIPPET_CHARS: usize = 200;

/// HTTPバックエンド
pub struct HttpBackend {
    base: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    /// `timeout` が None ならクライアント既定のまま（明示的なタイムアウトなし）
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| ScanError::Config(format!("endpoint が不正です ({}): {}", endpoint, e)))?;
        if base.cannot_be_a_base() {
            return Err(ScanError::Config(format!("endpoint が不正です: {}", endpoint)));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ScanError::Config(format!("HTTPクライアント初期化エラー: {}", e)))?;

        Ok(Self { base, client })
    }

    fn route(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn upload_url(&self) -> Url {
        self.route(&["upload"])
    }

    pub fn reputation_url(&self) -> Url {
        self.route(&["virusTotal"])
    }

    pub fn status_url(&self, job_id: &str) -> Url {
        self.route(&["status", job_id])
    }

    /// multipart `file` フィールドを1つ持つフォーム
    fn file_form(file: &FileHandle) -> Form {
        let part = Part::bytes(file.bytes().to_vec()).file_name(file.name().to_string());
        Form::new().part("file", part)
    }

    /// ボディを読む。2xx以外はサーバーエラーにする
    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await.map_err(ScanError::Network)?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(server_error(status.as_u16(), &body))
        }
    }

    async fn post_file(&self, url: Url, file: &FileHandle) -> Result<String> {
        log::debug!("POST {} ({} bytes)", url, file.len());
        let response = self
            .client
            .post(url)
            .multipart(Self::file_form(file))
            .send()
            .await
            .map_err(ScanError::Network)?;
        Self::read_body(response).await
    }
}

/// 2xx以外のレスポンスからエラーを作る
///
/// `{error: "..."}` があればその文言をそのまま使う。
pub fn server_error(status: u16, body: &str) -> ScanError {
    let message = extract_error_message(body).unwrap_or_else(|| {
        let snippet: String = body.trim().chars().take(BODY_SNIPPET_CHARS).collect();
        if snippet.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, snippet)
        }
    });
    ScanError::Server { status, message }
}

#[async_trait]
impl ScanBackend for HttpBackend {
    async fn upload(&self, file: &FileHandle) -> Result<ScanVerdict> {
        let body = self.post_file(self.upload_url(), file).await?;
        Ok(parse_upload_response(&body)?)
    }

    async fn submit_reputation(&self, file: &FileHandle) -> Result<ReputationResponse> {
        let body = self.post_file(self.reputation_url(), file).await?;
        Ok(parse_reputation_response(&body)?)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus> {
        let url = self.status_url(job_id);
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(ScanError::Network)?;
        let body = Self::read_body(response).await?;
        Ok(parse_status_response(&body)?)
    }
}
