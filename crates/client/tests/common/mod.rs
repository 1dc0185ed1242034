//! Shared test doubles: a scripted [`Transport`] and a recording [`Clock`].

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aigc_client::clock::Clock;
use aigc_client::transport::{ByteStream, Transport, TransportError, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Scripted outcome of one image download.
#[derive(Clone)]
pub enum Download {
    /// Stream these chunks.
    Chunks(Vec<Vec<u8>>),
    /// Fail before any byte is sent.
    Fail,
    /// Send one chunk, then fail.
    FailMidStream(Vec<u8>),
    /// Wait, then stream a single chunk.
    Delayed(Duration, Vec<u8>),
}

/// A recorded request: URL plus its form fields or query parameters.
pub type Call = (String, Vec<(String, String)>);

/// A [`Transport`] that replays queued responses and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    posts: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    polls: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    downloads: Mutex<HashMap<String, Download>>,
    pub post_calls: Mutex<Vec<Call>>,
    pub poll_calls: Mutex<Vec<Call>>,
    pub download_calls: Mutex<Vec<String>>,
}

fn ok_json(body: &str) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status: 200,
        body: body.to_string(),
    })
}

fn record(fields: &[(&str, String)]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post_json(self, body: &str) -> Self {
        self.posts.lock().unwrap().push_back(ok_json(body));
        self
    }

    pub fn poll_json(self, body: &str) -> Self {
        self.polls.lock().unwrap().push_back(ok_json(body));
        self
    }

    pub fn poll_error(self, status: u16) -> Self {
        self.polls.lock().unwrap().push_back(Err(TransportError::Status {
            status,
            body: "scripted failure".into(),
        }));
        self
    }

    pub fn download(self, url: &str, download: Download) -> Self {
        self.downloads
            .lock()
            .unwrap()
            .insert(url.to_string(), download);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn post_count(&self) -> usize {
        self.post_calls.lock().unwrap().len()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.lock().unwrap().len()
    }

    pub fn download_count(&self) -> usize {
        self.download_calls.lock().unwrap().len()
    }
}

fn exhausted() -> TransportError {
    TransportError::Status {
        status: 500,
        body: "no scripted response left".into(),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.post_calls
            .lock()
            .unwrap()
            .push((url.to_string(), record(fields)));
        let next = self.posts.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(exhausted()))
    }

    async fn get_query(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.poll_calls
            .lock()
            .unwrap()
            .push((url.to_string(), record(params)));
        let next = self.polls.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(exhausted()))
    }

    async fn get_stream(&self, url: &str) -> Result<ByteStream, TransportError> {
        self.download_calls.lock().unwrap().push(url.to_string());
        let download = self.downloads.lock().unwrap().get(url).cloned();
        match download {
            None | Some(Download::Fail) => Err(TransportError::Status {
                status: 404,
                body: format!("{url} not found"),
            }),
            Some(Download::Chunks(chunks)) => Ok(futures::stream::iter(
                chunks.into_iter().map(|c| Ok(Bytes::from(c))),
            )
            .boxed()),
            Some(Download::FailMidStream(first)) => Ok(futures::stream::iter(vec![
                Ok(Bytes::from(first)),
                Err(TransportError::MalformedBody("connection reset".into())),
            ])
            .boxed()),
            Some(Download::Delayed(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(futures::stream::iter(vec![Ok(Bytes::from(body))]).boxed())
            }
        }
    }
}

/// A [`Clock`] that returns immediately and remembers what it was asked
/// to sleep. Optionally cancels a token once a given number of sleeps
/// has started.
#[derive(Default)]
pub struct RecordingClock {
    pub sleeps: Mutex<Vec<Duration>>,
    cancel_on_sleep: Option<(usize, CancellationToken)>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` during the `n`-th sleep (1-based).
    pub fn cancelling_on_sleep(n: usize, token: CancellationToken) -> Self {
        Self {
            sleeps: Mutex::new(Vec::new()),
            cancel_on_sleep: Some((n, token)),
        }
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };
        if let Some((n, token)) = &self.cancel_on_sleep {
            if count == *n {
                token.cancel();
                // Give the cancellation branch a chance to win.
                std::future::pending::<()>().await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Canned response bodies
// ---------------------------------------------------------------------------

pub const SUBMIT_OK: &str = r#"{"status":"ok","taskid":"T1","token":"tok","timestamp":"100"}"#;

pub fn progress(percent: u8) -> String {
    format!(r#"{{"isGenerate":false,"progress":{percent}}}"#)
}

pub fn complete(urls: &[&str]) -> String {
    let pics: Vec<String> = urls
        .iter()
        .map(|u| format!(r#"{{"src":"{u}"}}"#))
        .collect();
    format!(
        r#"{{"isGenerate":true,"progress":100,"picArr":[{}]}}"#,
        pics.join(",")
    )
}

/// Look up a recorded field by name.
pub fn field<'a>(call: &'a Call, name: &str) -> Option<&'a str> {
    call.1
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}
