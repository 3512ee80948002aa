use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use cognito_api::{AuthError, CookieSource, CrossTabSignal, IdentityProvider, Navigator, SignalMailbox};
use tokio::sync::broadcast;

pub const COOKIE_ENV: &str = "COGNITO_COOKIE";

/// Reads the cookie header from an environment variable (default `COGNITO_COOKIE`).
pub struct EnvCookieSource {
    var: String,
}

impl EnvCookieSource {
    pub fn new() -> Self {
        Self::with_var(COOKIE_ENV)
    }

    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCookieSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieSource for EnvCookieSource {
    fn cookie_header(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|v| !v.is_empty())
    }
}

/// In-memory cookie jar standing in for `document.cookie`.
///
/// Values are stored as written on the wire; no encoding is applied.
#[derive(Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<BTreeMap<String, String>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Replace the whole jar with the pairs of a `Cookie` header.
    pub fn replace_with_header(&self, header: &str) {
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        cookies.clear();
        for pair in header.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                cookies.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }

    pub fn clear(&self) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl CookieSource for MemoryCookieJar {
    fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        if cookies.is_empty() {
            return None;
        }
        let header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }
}

/// Browser-wide single-slot mailbox with change notification.
///
/// Tabs talk through their own [`TabMailbox`] handle from
/// [`open_tab`](Self::open_tab): a tab is never notified of its own writes,
/// like a storage event. Publishing on the `MemoryMailbox` itself acts as a
/// writer outside every tab and notifies all of them.
#[derive(Clone)]
pub struct MemoryMailbox {
    shared: Arc<MailboxShared>,
}

struct MailboxShared {
    slot: Mutex<Option<CrossTabSignal>>,
    /// One sender per subscription, tagged with the subscribing tab.
    listeners: Mutex<Vec<(Option<u64>, broadcast::Sender<CrossTabSignal>)>>,
    next_tab: AtomicU64,
}

impl MailboxShared {
    fn store(&self, signal: CrossTabSignal, origin: Option<u64>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal);

        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|(_, tx)| tx.receiver_count() > 0);
        for (tab, tx) in listeners.iter() {
            if origin.is_none() || *tab != origin {
                // A lagging receiver still sees the slot on its next take.
                let _ = tx.send(signal);
            }
        }
        tracing::debug!(%signal, tab = ?origin, "cross-tab signal published");
    }

    fn take(&self) -> Option<CrossTabSignal> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn peek(&self) -> Option<CrossTabSignal> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(&self, tab: Option<u64>) -> broadcast::Receiver<CrossTabSignal> {
        let (tx, rx) = broadcast::channel(16);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((tab, tx));
        rx
    }
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MailboxShared {
                slot: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                next_tab: AtomicU64::new(1),
            }),
        }
    }

    /// Handle for one tab of the browser.
    pub fn open_tab(&self) -> TabMailbox {
        TabMailbox {
            id: self.shared.next_tab.fetch_add(1, Ordering::Relaxed),
            shared: self.shared.clone(),
        }
    }

    /// Current slot value without consuming it.
    pub fn peek(&self) -> Option<CrossTabSignal> {
        self.shared.peek()
    }
}

impl Default for MemoryMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalMailbox for MemoryMailbox {
    fn publish(&self, signal: CrossTabSignal) {
        self.shared.store(signal, None);
    }

    fn take(&self) -> Option<CrossTabSignal> {
        self.shared.take()
    }

    fn subscribe(&self) -> broadcast::Receiver<CrossTabSignal> {
        self.shared.subscribe(None)
    }
}

/// One tab's view of a [`MemoryMailbox`].
pub struct TabMailbox {
    id: u64,
    shared: Arc<MailboxShared>,
}

impl TabMailbox {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peek(&self) -> Option<CrossTabSignal> {
        self.shared.peek()
    }
}

impl SignalMailbox for TabMailbox {
    fn publish(&self, signal: CrossTabSignal) {
        self.shared.store(signal, Some(self.id));
    }

    fn take(&self) -> Option<CrossTabSignal> {
        self.shared.take()
    }

    fn subscribe(&self) -> broadcast::Receiver<CrossTabSignal> {
        self.shared.subscribe(Some(self.id))
    }
}

/// Navigator that records reloads instead of performing them.
pub struct RecordingNavigator {
    url: RwLock<String>,
    reloads: AtomicUsize,
}

impl RecordingNavigator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: RwLock::new(url.into()),
            reloads: AtomicUsize::new(0),
        }
    }

    pub fn set_url(&self, url: impl Into<String>) {
        *self.url.write().unwrap_or_else(PoisonError::into_inner) = url.into();
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        path_of(&self.current_url()).to_string()
    }

    fn current_url(&self) -> String {
        self.url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(url = %self.current_url(), "reload requested");
    }
}

fn path_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| {
        rest.find('/').map_or("/", |start| &rest[start..])
    });
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    match &rest[..end] {
        "" => "/",
        path => path,
    }
}

/// Identity provider that records the redirect targets it was called with.
#[derive(Default)]
pub struct RecordingIdentityProvider {
    sign_ins: Mutex<Vec<String>>,
    sign_outs: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `AuthError::External` until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sign_in_targets(&self) -> Vec<String> {
        self.sign_ins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sign_out_targets(&self) -> Vec<String> {
        self.sign_outs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self, call: &str) -> Result<(), AuthError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::External(format!("{call} rejected")));
        }
        Ok(())
    }
}

impl IdentityProvider for RecordingIdentityProvider {
    fn federated_sign_in(&self, redirect_target: &str) -> Result<(), AuthError> {
        self.check("federated sign-in")?;
        self.sign_ins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(redirect_target.to_string());
        Ok(())
    }

    fn sign_out(&self, redirect_target: &str) -> Result<(), AuthError> {
        self.check("sign-out")?;
        self.sign_outs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(redirect_target.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jar_renders_header_and_forgets_removed_cookies() {
        let jar = MemoryCookieJar::new();
        assert_eq!(jar.cookie_header(), None);

        jar.set("a", "1");
        jar.set("b", "2");
        assert_eq!(jar.cookie_header().as_deref(), Some("a=1; b=2"));

        assert_eq!(jar.remove("a").as_deref(), Some("1"));
        assert_eq!(jar.cookie_header().as_deref(), Some("b=2"));

        jar.replace_with_header("x=9; y=8");
        assert_eq!(jar.cookie_header().as_deref(), Some("x=9; y=8"));
    }

    #[test]
    fn mailbox_take_clears_the_slot() {
        let mailbox = MemoryMailbox::new();
        let mut rx = mailbox.subscribe();

        mailbox.publish(CrossTabSignal::Login);
        assert_eq!(rx.try_recv().unwrap(), CrossTabSignal::Login);
        assert_eq!(mailbox.peek(), Some(CrossTabSignal::Login));

        assert_eq!(mailbox.take(), Some(CrossTabSignal::Login));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn tab_is_not_notified_of_its_own_signal() {
        let mailbox = MemoryMailbox::new();
        let writer = mailbox.open_tab();
        let reader = mailbox.open_tab();
        assert_ne!(writer.id(), reader.id());
        let mut own = writer.subscribe();
        let mut other = reader.subscribe();

        writer.publish(CrossTabSignal::Logout);
        assert!(own.try_recv().is_err());
        assert_eq!(other.try_recv().unwrap(), CrossTabSignal::Logout);

        // The slot is shared: whichever tab takes first clears it.
        assert_eq!(reader.peek(), Some(CrossTabSignal::Logout));
        assert_eq!(reader.take(), Some(CrossTabSignal::Logout));
        assert_eq!(writer.take(), None);

        mailbox.publish(CrossTabSignal::Login);
        assert_eq!(own.try_recv().unwrap(), CrossTabSignal::Login);
        assert_eq!(other.try_recv().unwrap(), CrossTabSignal::Login);
    }

    #[test]
    fn navigator_derives_path_from_url() {
        let nav = RecordingNavigator::new("https://app.example.com/token#id_token=x");
        assert_eq!(nav.current_path(), "/token");

        nav.set_url("https://app.example.com");
        assert_eq!(nav.current_path(), "/");

        nav.set_url("https://app.example.com/account/settings?tab=2");
        assert_eq!(nav.current_path(), "/account/settings");

        nav.reload();
        assert_eq!(nav.reloads(), 1);
    }

    #[test]
    fn failing_provider_records_nothing() {
        let idp = RecordingIdentityProvider::new();
        idp.sign_out("https://app.example.com/").unwrap();

        idp.set_failing(true);
        assert!(matches!(
            idp.federated_sign_in("https://app.example.com/"),
            Err(AuthError::External(_))
        ));
        assert_eq!(idp.sign_out_targets(), vec!["https://app.example.com/".to_string()]);
        assert!(idp.sign_in_targets().is_empty());
    }

    #[test]
    fn env_source_ignores_missing_variable() {
        let source = EnvCookieSource::with_var("COGNITO_COOKIE_TEST_UNSET_VARIABLE");
        assert_eq!(source.cookie_header(), None);
    }
}
