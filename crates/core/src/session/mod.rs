//! Client-side checkout session over the provider's embedded widget.
//!
//! The widget SDK is loaded once per process behind a single-flight guard,
//! and every opened session resolves to exactly one terminal event. The
//! widget itself (script interop, modal lifecycle) sits behind the
//! [`CheckoutWidget`] trait so the protocol can be driven without a browser.

use std::future::Future;
use std::sync::{Arc, Mutex};

use paylane_types::CheckoutRequest;
use tokio::sync::{OnceCell, oneshot};
use tracing::{debug, warn};

/// Terminal outcome of one widget interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    /// Buyer completed the provider flow; the token is single-use.
    Approved { checkout_token: String },
    /// Provider declined or the flow errored.
    Failed { reason: String },
    /// The submitted payload failed provider-side validation.
    ValidationFailed { fields: Vec<String> },
    /// Buyer dismissed the widget; no charge exists.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("checkout widget failed to load: {0}")]
pub struct SdkLoadError(pub String);

/// Accepts the first terminal event for a session and ignores the rest.
///
/// The widget's callback surface can fire more than once (a failure callback
/// racing a close callback); the session contract is exactly one event.
#[derive(Clone)]
pub struct EventSink {
    tx: Arc<Mutex<Option<oneshot::Sender<CheckoutEvent>>>>,
}

impl EventSink {
    pub fn channel() -> (EventSink, oneshot::Receiver<CheckoutEvent>) {
        let (tx, rx) = oneshot::channel();
        (
            EventSink {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Resolve the session. Returns false if a terminal event already won.
    pub fn resolve(&self, event: CheckoutEvent) -> bool {
        let sender = self.tx.lock().ok().and_then(|mut slot| slot.take());
        match sender {
            Some(sender) => sender.send(event).is_ok(),
            None => {
                debug!("checkout event discarded, session already resolved");
                false
            }
        }
    }
}

/// The embedded provider widget seam.
///
/// `open` is fire-and-forget: implementations hand the payload to the
/// provider flow and later resolve `sink` with the single terminal event.
pub trait CheckoutWidget: Send + Sync {
    fn open(&self, payload: &CheckoutRequest, sink: EventSink);
}

/// Memoized, lazily-initialized widget loader.
///
/// Concurrent callers await the same in-flight load instead of triggering
/// duplicate fetches; a successful load is cached for the life of the
/// process, a failed load is not (the next caller retries).
pub struct SdkLoader<W> {
    cell: OnceCell<Arc<W>>,
}

impl<W> Default for SdkLoader<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> SdkLoader<W> {
    pub fn new() -> Self {
        SdkLoader {
            cell: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<W>, SdkLoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<W, SdkLoadError>>,
    {
        self.cell
            .get_or_try_init(|| async { load().await.map(Arc::new) })
            .await
            .cloned()
    }
}

/// One buyer-initiated checkout attempt.
///
/// The built payload is retained so a failed or cancelled interaction can be
/// reopened without rebuilding from the cart; a previously issued checkout
/// token is never carried into a reopen.
pub struct CheckoutSession {
    payload: CheckoutRequest,
    checkout_token: Option<String>,
}

impl CheckoutSession {
    pub fn new(payload: CheckoutRequest) -> Self {
        CheckoutSession {
            payload,
            checkout_token: None,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.payload.order_id
    }

    pub fn total_minor(&self) -> i64 {
        self.payload.total
    }

    pub fn payload(&self) -> &CheckoutRequest {
        &self.payload
    }

    /// Token from the most recent approved interaction, if any.
    pub fn checkout_token(&self) -> Option<&str> {
        self.checkout_token.as_deref()
    }

    /// Drive one widget interaction to its terminal event.
    ///
    /// Any token from an earlier interaction is discarded up front; tokens
    /// are single-use and a retry must be a fresh provider interaction.
    pub async fn open<W: CheckoutWidget>(&mut self, widget: &W) -> CheckoutEvent {
        self.checkout_token = None;

        let (sink, rx) = EventSink::channel();
        widget.open(&self.payload, sink);

        let event = match rx.await {
            Ok(event) => event,
            // Widget torn down without resolving; treat as a dismissal.
            Err(_) => {
                warn!(order_id = %self.payload.order_id, "widget dropped session without an event");
                CheckoutEvent::Cancelled
            }
        };

        if let CheckoutEvent::Approved { checkout_token } = &event {
            self.checkout_token = Some(checkout_token.clone());
        }
        event
    }
}
