//! Client-side session holder.
//!
//! A tab starts from the session its server render computed, re-resolves from
//! the live cookie once mounted, and afterwards reacts to cross-tab signals and
//! focus changes. Reactions are decided by [`SessionHook::on_event`] without
//! side effects; [`SessionHook::run`] performs them.

use std::sync::Arc;

use cognito_api::{CookieSource, CrossTabSignal, HostEvent, Navigator, SignalMailbox};
use cognito_auth::{Session, SessionResolver, locate};
use cognito_core::AuthSettings;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::actions::AuthActions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// Holding the server-computed session.
    Seeded,
    /// Re-resolved from the live cookie at least once.
    Resolved,
}

/// What the host must do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    None,
    Reload,
    SignOut { redirect: String },
}

/// Holds one tab's session and keeps it in line with the live cookie.
///
/// Consumers read it through [`subscribe`](Self::subscribe); the value is
/// replaced wholesale, never mutated.
pub struct SessionHook {
    resolver: Arc<SessionResolver>,
    cookies: Arc<dyn CookieSource>,
    mailbox: Arc<dyn SignalMailbox>,
    navigator: Arc<dyn Navigator>,
    settings: AuthSettings,
    phase: HookPhase,
    session: watch::Sender<Option<Session>>,
}

impl SessionHook {
    /// `seed` is the session the server rendered with. `mailbox` must be this
    /// tab's handle so the tab does not consume its own signals.
    pub fn new(
        resolver: Arc<SessionResolver>,
        seed: Option<Session>,
        cookies: Arc<dyn CookieSource>,
        mailbox: Arc<dyn SignalMailbox>,
        navigator: Arc<dyn Navigator>,
        settings: &AuthSettings,
    ) -> Self {
        let (session, _) = watch::channel(seed);
        Self {
            resolver,
            cookies,
            mailbox,
            navigator,
            settings: settings.clone(),
            phase: HookPhase::Seeded,
            session,
        }
    }

    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    /// The session currently held.
    pub fn session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    /// Live view of the session, updated whenever the held tokens change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    /// Replace the seed with what the live cookie says. Only the first call
    /// does anything.
    pub fn mount(&mut self) {
        if self.phase == HookPhase::Resolved {
            return;
        }
        let resolved = self.resolve_live();
        tracing::info!(
            signed_in = resolved.is_some(),
            seeded = self.session.borrow().is_some(),
            "session hook mounted"
        );
        self.phase = HookPhase::Resolved;
        self.session.send_replace(resolved);
    }

    /// Decide how to react to a host event.
    ///
    /// A `login` signal with a new identity token asks for a reload. A held
    /// session whose identity cookie is gone asks for a sign-out and is
    /// cleared. Neither happens on the token-exchange route. Otherwise the
    /// live cookie is re-resolved and published when the tokens changed.
    pub fn on_event(&mut self, event: HostEvent) -> Reaction {
        let on_exchange_route = self
            .settings
            .is_exchange_route(&self.navigator.current_path());
        let live_id_token = self.live_id_token();

        if event == HostEvent::Signal && self.mailbox.take() == Some(CrossTabSignal::Login) {
            let held_id_token = self.session.borrow().as_ref().map(|s| s.raw_id_token.clone());
            if live_id_token.is_some() && live_id_token != held_id_token {
                if on_exchange_route {
                    tracing::debug!("login signal on the token exchange route, reload suppressed");
                } else {
                    tracing::info!("login in another tab, reloading");
                    return Reaction::Reload;
                }
            }
        }

        let held_signed_in = self.session.borrow().is_some();
        if held_signed_in && live_id_token.is_none() {
            if on_exchange_route {
                tracing::debug!("identity cookie gone on the token exchange route, sign-out suppressed");
            } else {
                tracing::info!(?event, "identity cookie gone, signing out");
                self.session.send_replace(None);
                return Reaction::SignOut {
                    redirect: self.navigator.current_url(),
                };
            }
        }

        let live = self.resolve_live();
        self.session.send_if_modified(|held| {
            if same_session(held.as_ref(), live.as_ref()) {
                return false;
            }
            tracing::debug!(signed_in = live.is_some(), "session changed");
            *held = live;
            true
        });
        Reaction::None
    }

    /// Mount, then follow host events and mailbox notifications until the
    /// event channel closes or `shutdown` fires.
    ///
    /// Reaction failures are logged and never end the loop.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<HostEvent>,
        actions: AuthActions,
        shutdown: CancellationToken,
    ) {
        let mut signals = self.mailbox.subscribe();
        let mut signals_open = true;
        self.mount();

        loop {
            let event = tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("session hook stopped");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        tracing::info!("host event channel closed, session hook stopped");
                        break;
                    }
                },
                signal = signals.recv(), if signals_open => match signal {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => HostEvent::Signal,
                    Err(broadcast::error::RecvError::Closed) => {
                        signals_open = false;
                        continue;
                    }
                },
            };

            match self.on_event(event) {
                Reaction::None => {}
                Reaction::Reload => self.navigator.reload(),
                Reaction::SignOut { redirect } => {
                    if let Err(err) = actions.logout(Some(&redirect)) {
                        tracing::warn!(error = %err, "sign-out failed");
                    }
                }
            }
        }
    }

    fn live_header(&self) -> Option<String> {
        self.cookies.cookie_header()
    }

    fn live_id_token(&self) -> Option<String> {
        locate(self.live_header().as_deref(), self.resolver.client_id()).id_token
    }

    fn resolve_live(&self) -> Option<Session> {
        self.resolver.resolve(self.live_header().as_deref())
    }
}

fn same_session(a: Option<&Session>, b: Option<&Session>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_tokens(b),
        _ => false,
    }
}
