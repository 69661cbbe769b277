use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::{youtube_video_id, Extractor};
use crate::error::ResolveError;

enum Outcome {
    /// `<video id>.wav`, or the given stem
    WriteWav(Option<String>),
    WriteNothing,
    Fail(String),
}

/// Stands in for yt-dlp: records invocations and writes a short WAV fixture
pub struct FakeExtractor {
    outcome: Outcome,
    calls: AtomicUsize,
    scratch_was_empty: Mutex<Vec<bool>>,
    gate: Option<Arc<Notify>>,
}

impl FakeExtractor {
    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            scratch_was_empty: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn writing_wav() -> Self {
        Self::with_outcome(Outcome::WriteWav(None))
    }

    pub fn writing_wav_named(stem: &str) -> Self {
        Self::with_outcome(Outcome::WriteWav(Some(stem.to_string())))
    }

    pub fn writing_nothing() -> Self {
        Self::with_outcome(Outcome::WriteNothing)
    }

    pub fn failing(reason: &str) -> Self {
        Self::with_outcome(Outcome::Fail(reason.to_string()))
    }

    /// Block every extraction until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn scratch_was_empty(&self) -> Vec<bool> {
        self.scratch_was_empty.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(
        &self,
        url: &str,
        output_dir: &Path,
        _transcoder_dir: Option<&Path>,
    ) -> Result<(), ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let empty = std::fs::read_dir(output_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true);
        self.scratch_was_empty.lock().unwrap().push(empty);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match &self.outcome {
            Outcome::WriteWav(stem) => {
                let stem = stem
                    .clone()
                    .or_else(|| youtube_video_id(url))
                    .unwrap_or_else(|| "unknown".to_string());
                crate::audio::testing::write_wav(&output_dir.join(format!("{}.wav", stem)), 22_050, 1, 2_205);
                Ok(())
            }
            Outcome::WriteNothing => Ok(()),
            Outcome::Fail(reason) => Err(ResolveError::extraction(url, reason.clone())),
        }
    }
}

/// A fixed reply served by [`serve_http`]
#[derive(Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Without a Content-Length the body runs until the connection closes
    pub content_length: bool,
}

impl CannedResponse {
    pub fn wav(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "audio/wav",
            body,
            content_length: true,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain",
            body: b"not found".to_vec(),
            content_length: true,
        }
    }

    pub fn without_length(mut self) -> Self {
        self.content_length = false;
        self
    }
}

/// Serve `response` for every request on a loopback port; returns `http://127.0.0.1:<port>`
pub async fn serve_http(response: CannedResponse) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let reason = if response.status == 200 { "OK" } else { "Not Found" };
                let mut head = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nConnection: close\r\n",
                    response.status, reason, response.content_type
                );
                if response.content_length {
                    head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
                }
                head.push_str("\r\n");

                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&response.body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

/// HTTP client that ignores proxy settings so loopback requests stay local
pub fn loopback_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
