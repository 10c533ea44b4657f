//! Panel-side transport to the content script.

use super::state::{TabId, TabInfo};
use crate::protocol::{CONTENT_SCRIPT_FILES, Command, Reply, ReplyEnvelope, Request};
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future for transport operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Failure text reported by the browser when no listener is registered.
const NO_RESPONDER_MESSAGES: &[&str] = &[
    "Receiving end does not exist",
    "Could not establish connection",
];

/// Failure text reported when the listener went away before replying.
const DISCONNECTED_MESSAGES: &[&str] = &["message port closed", "message channel closed"];

/// URL prefixes the browser refuses to inject into.
const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "chrome-search://",
    "chrome-untrusted://",
    "devtools://",
    "edge://",
    "about:",
    "view-source:",
    "https://chrome.google.com/webstore",
    "https://chromewebstore.google.com",
];

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("No content script is listening")]
    NoResponder,
    #[error("Content script disconnected before replying")]
    Disconnected,
    #[error("Script injection failed: {0}")]
    Injection(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Classify a browser failure message.
    pub fn from_message(message: &str) -> Self {
        if NO_RESPONDER_MESSAGES.iter().any(|m| message.contains(m)) {
            TransportError::NoResponder
        } else if DISCONNECTED_MESSAGES.iter().any(|m| message.contains(m)) {
            TransportError::Disconnected
        } else {
            TransportError::Other(message.to_string())
        }
    }

    /// Whether re-injecting the content script may fix this failure.
    pub fn is_no_responder(&self) -> bool {
        match self {
            TransportError::NoResponder => true,
            TransportError::Other(message) => {
                NO_RESPONDER_MESSAGES.iter().any(|m| message.contains(m))
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}

/// Errors surfaced to the panel UI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    #[error("This page cannot be inspected: {0}")]
    RestrictedPage(String),
    #[error("No active tab")]
    NoActiveTab,
    #[error("Could not connect to the page: {0}")]
    Connection(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for panel operations.
pub type PanelResult<T> = Result<T, PanelError>;

/// Message delivery to a tab's content script.
///
/// Single-threaded: the panel runs on one event loop, so no `Send` bound.
pub trait PanelTransport {
    /// Deliver a request. Resolves with the reply envelope for deferred
    /// commands and `None` for fire-and-forget ones.
    fn send(
        &self,
        tab: TabId,
        request: &Request,
    ) -> BoxFuture<'_, Result<Option<ReplyEnvelope>, TransportError>>;

    /// Inject script files into the tab, in order.
    fn inject(&self, tab: TabId, files: &'static [&'static str]) -> BoxFuture<'_, Result<(), TransportError>>;
}

/// Whether the browser forbids content scripts on `url`.
pub fn is_restricted_url(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || RESTRICTED_PREFIXES.iter().any(|prefix| url.starts_with(prefix))
}

/// Sends commands with restricted-page detection and one re-injection retry.
pub struct CommandClient<T: PanelTransport> {
    transport: T,
    next_id: Cell<u64>,
}

impl<T: PanelTransport> CommandClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: Cell::new(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn next_request(&self, command: Command) -> Request {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Request::new(id, command)
    }

    /// Send `command` to `tab` and return its reply, if any.
    ///
    /// A missing content script is injected and the command retried once;
    /// a second failure is reported as [`PanelError::Connection`].
    pub async fn request(&self, tab: &TabInfo, command: Command) -> PanelResult<Option<Reply>> {
        if is_restricted_url(&tab.url) {
            return Err(PanelError::RestrictedPage(tab.url.clone()));
        }
        let request = self.next_request(command);

        match self.transport.send(tab.id, &request).await {
            Ok(envelope) => Ok(accept(&request, envelope)),
            Err(err) if err.is_no_responder() => {
                log::info!("No content script in tab {}, injecting", tab.id);
                self.transport
                    .inject(tab.id, CONTENT_SCRIPT_FILES)
                    .await
                    .map_err(|e| PanelError::Connection(e.to_string()))?;
                match self.transport.send(tab.id, &request).await {
                    Ok(envelope) => Ok(accept(&request, envelope)),
                    Err(err) => {
                        log::warn!("{} failed after injection: {}", request.command.name(), err);
                        Err(PanelError::Connection(err.to_string()))
                    }
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn accept(request: &Request, envelope: Option<ReplyEnvelope>) -> Option<Reply> {
    let envelope = envelope?;
    if envelope.request_id.is_some() && envelope.request_id != request.request_id {
        log::warn!(
            "Dropping reply {:?} for request {:?}",
            envelope.request_id,
            request.request_id
        );
        return None;
    }
    envelope.reply
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    /// Poll a future once with a waker that does nothing.
    pub fn poll_once<F: Future + ?Sized>(f: Pin<&mut F>) -> Poll<F::Output> {
        let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        f.poll(&mut cx)
    }

    /// Simple blocking executor for tests.
    pub fn block_on<F: Future>(f: F) -> F::Output {
        let mut f = std::pin::pin!(f);
        loop {
            if let Poll::Ready(result) = poll_once(f.as_mut()) {
                return result;
            }
        }
    }

    /// Transport replaying queued outcomes and recording traffic.
    ///
    /// Replies are stamped with the request id. An empty queue answers
    /// `Ok(None)`. While `hold` is set, sends stay pending.
    #[derive(Clone, Default)]
    pub struct ScriptedTransport {
        pub sent: Rc<RefCell<Vec<(TabId, Command)>>>,
        pub injected: Rc<RefCell<Vec<(TabId, Vec<&'static str>)>>>,
        pub outcomes: Rc<RefCell<VecDeque<Result<Option<Reply>, TransportError>>>>,
        pub inject_error: Rc<RefCell<Option<TransportError>>>,
        pub hold: Rc<Cell<bool>>,
    }

    impl ScriptedTransport {
        pub fn push(&self, outcome: Result<Option<Reply>, TransportError>) {
            self.outcomes.borrow_mut().push_back(outcome);
        }

        pub fn sent_to(&self, tab: TabId) -> Vec<Command> {
            self.sent
                .borrow()
                .iter()
                .filter(|(id, _)| *id == tab)
                .map(|(_, command)| command.clone())
                .collect()
        }
    }

    impl PanelTransport for ScriptedTransport {
        fn send(
            &self,
            tab: TabId,
            request: &Request,
        ) -> BoxFuture<'_, Result<Option<ReplyEnvelope>, TransportError>> {
            self.sent.borrow_mut().push((tab, request.command.clone()));
            let outcome = self.outcomes.borrow_mut().pop_front().unwrap_or(Ok(None));
            let request_id = request.request_id;
            let hold = self.hold.clone();
            Box::pin(async move {
                Released(hold).await;
                outcome.map(|reply| {
                    reply.map(|reply| ReplyEnvelope {
                        request_id,
                        reply: Some(reply),
                    })
                })
            })
        }

        fn inject(&self, tab: TabId, files: &'static [&'static str]) -> BoxFuture<'_, Result<(), TransportError>> {
            self.injected.borrow_mut().push((tab, files.to_vec()));
            let error = self.inject_error.borrow().clone();
            Box::pin(async move { error.map_or(Ok(()), Err) })
        }
    }

    /// Resolves once the hold flag is cleared.
    struct Released(Rc<Cell<bool>>);

    impl Future for Released {
        type Output = ();

        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
            if self.0.get() { Poll::Pending } else { Poll::Ready(()) }
        }
    }

    fn tab(id: TabId, url: &str) -> TabInfo {
        TabInfo {
            id,
            url: url.to_string(),
        }
    }

    #[test]
    fn test_restricted_urls() {
        assert!(is_restricted_url("chrome://extensions"));
        assert!(is_restricted_url("about:blank"));
        assert!(is_restricted_url("https://chromewebstore.google.com/detail/x"));
        assert!(is_restricted_url(""));
        assert!(!is_restricted_url("https://example.com/chrome://"));
        assert!(!is_restricted_url("file:///tmp/index.html"));
    }

    #[test]
    fn test_classify_browser_messages() {
        let err = TransportError::from_message(
            "Could not establish connection. Receiving end does not exist.",
        );
        assert_eq!(err, TransportError::NoResponder);
        assert!(err.is_no_responder());

        let err = TransportError::from_message(
            "The message port closed before a response was received.",
        );
        assert_eq!(err, TransportError::Disconnected);
        assert!(!err.is_no_responder());

        assert!(!TransportError::from_message("boom").is_no_responder());
    }

    #[test]
    fn test_restricted_page_sends_nothing() {
        let transport = ScriptedTransport::default();
        let client = CommandClient::new(transport.clone());

        let result = block_on(client.request(&tab(1, "chrome://settings"), Command::ScanPage));
        assert_eq!(result, Err(PanelError::RestrictedPage("chrome://settings".into())));
        assert!(transport.sent.borrow().is_empty());
        assert!(transport.injected.borrow().is_empty());
    }

    #[test]
    fn test_no_responder_injects_and_retries_once() {
        let transport = ScriptedTransport::default();
        transport.push(Err(TransportError::NoResponder));
        transport.push(Ok(Some(Reply::Assets(Vec::new()))));
        let client = CommandClient::new(transport.clone());

        let reply = block_on(client.request(&tab(4, "https://example.com"), Command::ScanAssets));
        assert_eq!(reply, Ok(Some(Reply::Assets(Vec::new()))));
        assert_eq!(transport.sent_to(4), vec![Command::ScanAssets, Command::ScanAssets]);
        assert_eq!(*transport.injected.borrow(), vec![(4, CONTENT_SCRIPT_FILES.to_vec())]);
    }

    #[test]
    fn test_second_failure_is_connection_error() {
        let transport = ScriptedTransport::default();
        transport.push(Err(TransportError::NoResponder));
        transport.push(Err(TransportError::NoResponder));
        transport.push(Ok(None));
        let client = CommandClient::new(transport.clone());

        let result = block_on(client.request(&tab(4, "https://example.com"), Command::ScanPage));
        assert!(matches!(result, Err(PanelError::Connection(_))));
        assert_eq!(transport.sent.borrow().len(), 2);
        assert_eq!(transport.injected.borrow().len(), 1);
    }

    #[test]
    fn test_injection_failure_is_connection_error() {
        let transport = ScriptedTransport::default();
        transport.push(Err(TransportError::NoResponder));
        *transport.inject_error.borrow_mut() = Some(TransportError::Injection("denied".into()));
        let client = CommandClient::new(transport.clone());

        let result = block_on(client.request(&tab(4, "https://example.com"), Command::ScanPage));
        assert!(matches!(result, Err(PanelError::Connection(_))));
        assert_eq!(transport.sent.borrow().len(), 1);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let transport = ScriptedTransport::default();
        transport.push(Err(TransportError::Disconnected));
        let client = CommandClient::new(transport.clone());

        let result = block_on(client.request(&tab(4, "https://example.com"), Command::ScanPage));
        assert_eq!(result, Err(PanelError::Transport(TransportError::Disconnected)));
        assert!(transport.injected.borrow().is_empty());
    }

    #[test]
    fn test_mismatched_reply_is_dropped() {
        let request = Request::new(5, Command::ScanAssets);
        let envelope = ReplyEnvelope {
            request_id: Some(6),
            reply: Some(Reply::Assets(Vec::new())),
        };
        assert_eq!(accept(&request, Some(envelope)), None);
    }
}
