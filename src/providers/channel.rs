//! Producer/consumer hand-off for one summary.
//!
//! The producer task owns the upstream stream; the caller only sees
//! [`SummaryEvent`]s. Dropping the [`SummaryReceiver`] is the cancellation
//! signal: the producer notices, drops the stream and with it the connection
//! or local session.

use super::decoder::TextFragment;
use super::traits::Provider;
use super::SummaryRequest;
use crate::error::ProviderError;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug)]
pub enum SummaryEvent {
    Fragment(TextFragment),
    /// Terminal: the stream ended normally.
    Completed,
    /// Terminal: the stream ended with this error.
    Failed(ProviderError),
}

impl SummaryEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Fragment(_))
    }
}

pub struct SummaryReceiver {
    rx: mpsc::Receiver<SummaryEvent>,
}

impl SummaryReceiver {
    pub async fn recv(&mut self) -> Option<SummaryEvent> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> ReceiverStream<SummaryEvent> {
        ReceiverStream::new(self.rx)
    }
}

/// Spawn a producer for `request` and return the consuming end.
///
/// Exactly one terminal event is sent unless the receiver goes away first.
pub fn spawn_summary<P>(provider: Arc<P>, request: SummaryRequest, capacity: usize) -> SummaryReceiver
where
    P: Provider + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        let provider_id = provider.id();
        let terminal = tokio::select! {
            terminal = produce(provider.as_ref(), &request, &tx) => terminal,
            () = tx.closed() => None,
        };

        match terminal {
            Some(event) => {
                if tx.send(event).await.is_err() {
                    tracing::debug!(provider = %provider_id, "receiver gone before terminal event");
                }
            }
            None => tracing::debug!(provider = %provider_id, "summary abandoned by receiver"),
        }
    });

    SummaryReceiver { rx }
}

/// Forward fragments; returns the terminal event, or `None` once the receiver
/// is gone.
async fn produce<P>(
    provider: &P,
    request: &SummaryRequest,
    tx: &mpsc::Sender<SummaryEvent>,
) -> Option<SummaryEvent>
where
    P: Provider + ?Sized,
{
    let mut stream = match provider.summarize(request).await {
        Ok(stream) => stream,
        Err(err) => return Some(SummaryEvent::Failed(err)),
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                if tx.send(SummaryEvent::Fragment(fragment)).await.is_err() {
                    return None;
                }
            }
            Err(err) => return Some(SummaryEvent::Failed(err)),
        }
    }
    Some(SummaryEvent::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::local::{Availability, LocalEngine, LocalSession, OnDeviceProvider};
    use crate::providers::{FragmentStream, ProviderId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct ScriptedProvider {
        items: Vec<Result<&'static str, u16>>,
        open_error: bool,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn id(&self) -> ProviderId {
            ProviderId::OpenAi
        }

        async fn validate_key(&self, _credential: &str) -> bool {
            true
        }

        async fn list_models(&self, _credential: Option<&str>) -> Result<Vec<String>, ProviderError> {
            Ok(Vec::new())
        }

        async fn summarize(&self, _request: &SummaryRequest) -> Result<FragmentStream, ProviderError> {
            if self.open_error {
                return Err(ProviderError::missing_credential("OpenAI"));
            }
            let items: Vec<Result<TextFragment, ProviderError>> = self
                .items
                .iter()
                .map(|item| match item {
                    Ok(text) => Ok(TextFragment::new(*text).expect("scripted text is non-empty")),
                    Err(status) => Err(ProviderError::Transport {
                        provider: "OpenAI".into(),
                        status: Some(*status),
                        body: "boom".into(),
                    }),
                })
                .collect();
            Ok(Box::pin(futures_util::stream::iter(items)))
        }
    }

    fn request() -> SummaryRequest {
        SummaryRequest::new("text", "gpt-4o-mini")
    }

    async fn drain(mut rx: SummaryReceiver) -> Vec<SummaryEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn fragments_then_completed() {
        let provider = Arc::new(ScriptedProvider {
            items: vec![Ok("a"), Ok("b"), Ok("c")],
            open_error: false,
        });
        let events = drain(spawn_summary(provider, request(), 1)).await;
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                SummaryEvent::Fragment(f) => Some(f.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "abc");
        assert_eq!(events.len(), 4);
        assert!(matches!(events.last(), Some(SummaryEvent::Completed)));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn open_failure_is_single_failed_event() {
        let provider = Arc::new(ScriptedProvider {
            items: vec![],
            open_error: true,
        });
        let events = drain(spawn_summary(provider, request(), 4)).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SummaryEvent::Failed(ProviderError::Auth { .. })));
    }

    #[tokio::test]
    async fn mid_stream_error_keeps_partial_output() {
        let provider = Arc::new(ScriptedProvider {
            items: vec![Ok("partial"), Err(502), Ok("never")],
            open_error: false,
        });
        let events = drain(spawn_summary(provider, request(), 4)).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], SummaryEvent::Fragment(f) if f.as_str() == "partial"));
        assert!(matches!(&events[1], SummaryEvent::Failed(err) if err.status() == Some(502)));
    }

    struct EndlessEngine {
        released: Arc<AtomicBool>,
    }

    #[async_trait]
    impl LocalEngine for EndlessEngine {
        async fn availability(&self) -> Availability {
            Availability::Available
        }

        async fn open_session(&self, _prompt: String) -> Result<LocalSession, ProviderError> {
            let tokens = futures_util::stream::repeat_with(|| Ok::<_, anyhow::Error>("tick ".to_string()));
            let released = Arc::clone(&self.released);
            Ok(LocalSession::new(Box::pin(tokens)).on_release(move || {
                released.store(true, Ordering::SeqCst);
            }))
        }
    }

    #[tokio::test]
    async fn dropping_receiver_releases_session() {
        let released = Arc::new(AtomicBool::new(false));
        let provider = Arc::new(OnDeviceProvider::new(Arc::new(EndlessEngine {
            released: Arc::clone(&released),
        })));

        let mut rx = spawn_summary(provider, SummaryRequest::new("text", "on-device"), 2);
        assert!(matches!(rx.recv().await, Some(SummaryEvent::Fragment(_))));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), async {
            while !released.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("session should be released after the receiver is dropped");
    }

    #[tokio::test]
    async fn receiver_converts_to_stream() {
        let provider = Arc::new(ScriptedProvider {
            items: vec![Ok("x")],
            open_error: false,
        });
        let events: Vec<_> = spawn_summary(provider, request(), 4)
            .into_stream()
            .collect()
            .await;
        assert_eq!(events.len(), 2);
    }
}
