//! Waiting for the identity provider client to write the token cookies after
//! the hosted UI redirects back to the token-exchange route.
//!
//! The client library offers no completion callback, so the live cookie is
//! polled at a short interval until the identity token shows up.

use std::sync::Arc;
use std::time::Duration;

use cognito_api::CookieSource;
use cognito_auth::locate;
use cognito_core::ExchangeSettings;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const TOKEN_PARAMS: [&str; 2] = ["id_token", "access_token"];

/// True when a URL fragment (with or without the leading `#`) carries tokens.
pub fn fragment_has_token(fragment: &str) -> bool {
    fragment
        .trim_start_matches('#')
        .split('&')
        .filter_map(|pair| pair.split('=').next())
        .filter_map(|key| urlencoding::decode(key).ok())
        .any(|key| TOKEN_PARAMS.contains(&key.as_ref()))
}

/// Polls a [`CookieSource`] for the identity token cookie of one app client
/// while the token-exchange page waits for the sign-in to land.
#[derive(Clone)]
pub struct TokenExchangeWatcher {
    cookies: Arc<dyn CookieSource>,
    client_id: String,
    interval: Duration,
    max_wait: Duration,
}

impl TokenExchangeWatcher {
    /// Poll interval and maximum wait come from the `[exchange]` settings.
    pub fn new(
        cookies: Arc<dyn CookieSource>,
        client_id: impl Into<String>,
        settings: &ExchangeSettings,
    ) -> Self {
        Self {
            cookies,
            client_id: client_id.into(),
            interval: settings.poll_interval(),
            max_wait: settings.max_wait(),
        }
    }

    fn current_token(&self) -> Option<String> {
        let header = self.cookies.cookie_header();
        locate(header.as_deref(), &self.client_id).id_token
    }

    /// Poll until the identity token cookie exists.
    ///
    /// Returns `None` right away when the fragment carries no token, and
    /// `None` after `max_wait` or on cancellation.
    pub async fn wait_for_token(
        &self,
        fragment: &str,
        shutdown: &CancellationToken,
    ) -> Option<String> {
        if !fragment_has_token(fragment) {
            tracing::debug!("no token in fragment, nothing to wait for");
            return None;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = tokio::time::sleep(self.max_wait);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    tracing::debug!("token exchange wait cancelled");
                    return None;
                }
                _ = ticker.tick() => {
                    if let Some(token) = self.current_token() {
                        tracing::info!("token cookie observed");
                        return Some(token);
                    }
                }
                () = &mut deadline => {
                    tracing::warn!(
                        max_wait_ms = u64::try_from(self.max_wait.as_millis()).unwrap_or(u64::MAX),
                        "token cookie never appeared"
                    );
                    return None;
                }
            }
        }
    }

    /// Run [`wait_for_token`](Self::wait_for_token) on a task and hand the
    /// outcome to `on_complete`.
    ///
    /// The callback runs at most once. It is dropped without being called
    /// when the returned task is cancelled or dropped.
    pub fn spawn<F>(&self, fragment: impl Into<String>, on_complete: F) -> ExchangeTask
    where
        F: FnOnce(Option<String>) + Send + 'static,
    {
        let watcher = self.clone();
        let fragment = fragment.into();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let outcome = watcher.wait_for_token(&fragment, &token).await;
            if !token.is_cancelled() {
                on_complete(outcome);
            }
        });

        ExchangeTask {
            cancel,
            handle: Some(handle),
        }
    }
}

/// Handle to a running exchange wait. Dropping it cancels the polling.
pub struct ExchangeTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ExchangeTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the task to end without cancelling it.
    pub async fn finished(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "token exchange task failed");
            }
        }
    }
}

impl Drop for ExchangeTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_detection() {
        assert!(fragment_has_token("#id_token=abc&state=xyz"));
        assert!(fragment_has_token("state=xyz&access_token=abc"));
        assert!(fragment_has_token("#id%5Ftoken=abc"));
        assert!(!fragment_has_token(""));
        assert!(!fragment_has_token("#"));
        assert!(!fragment_has_token("#state=xyz&error=access_denied"));
        assert!(!fragment_has_token("#my_id_token=abc"));
    }
}
