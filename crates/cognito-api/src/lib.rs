use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Value written to the cross-tab mailbox after a login or logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossTabSignal {
    Login,
    Logout,
}

impl CrossTabSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            CrossTabSignal::Login => "login",
            CrossTabSignal::Logout => "logout",
        }
    }
}

impl fmt::Display for CrossTabSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrossTabSignal {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "login" => Ok(CrossTabSignal::Login),
            "logout" => Ok(CrossTabSignal::Logout),
            other => Err(AuthError::Validation(format!("unknown signal {other}"))),
        }
    }
}

/// Something the host reports to a tab's session hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The cross-tab mailbox changed.
    Signal,
    /// The window regained focus.
    Focus,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("identity provider error: {0}")]
    External(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Read access to the cookies currently visible to the page
/// (`document.cookie` in a browser).
pub trait CookieSource: Send + Sync {
    fn cookie_header(&self) -> Option<String>;
}

/// Browser-wide single-slot mailbox shared by every tab.
///
/// `take` returns the stored value and clears the slot. Two tabs racing on
/// `take` may both observe `None` after the first one wins.
///
/// `subscribe` notifies about writes made by other tabs only, the way a
/// storage event never fires in the tab that wrote the value.
pub trait SignalMailbox: Send + Sync {
    fn publish(&self, signal: CrossTabSignal);
    fn take(&self) -> Option<CrossTabSignal>;
    fn subscribe(&self) -> broadcast::Receiver<CrossTabSignal>;
}

/// Page-level navigation owned by the host framework.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn current_url(&self) -> String;
    fn reload(&self);
}

/// Hosted UI entry points of the identity provider client.
pub trait IdentityProvider: Send + Sync {
    fn federated_sign_in(&self, redirect_target: &str) -> Result<(), AuthError>;
    fn sign_out(&self, redirect_target: &str) -> Result<(), AuthError>;
}

impl<T: CookieSource + ?Sized> CookieSource for std::sync::Arc<T> {
    fn cookie_header(&self) -> Option<String> {
        (**self).cookie_header()
    }
}

impl<T: SignalMailbox + ?Sized> SignalMailbox for std::sync::Arc<T> {
    fn publish(&self, signal: CrossTabSignal) {
        (**self).publish(signal);
    }

    fn take(&self) -> Option<CrossTabSignal> {
        (**self).take()
    }

    fn subscribe(&self) -> broadcast::Receiver<CrossTabSignal> {
        (**self).subscribe()
    }
}

impl<T: Navigator + ?Sized> Navigator for std::sync::Arc<T> {
    fn current_path(&self) -> String {
        (**self).current_path()
    }

    fn current_url(&self) -> String {
        (**self).current_url()
    }

    fn reload(&self) {
        (**self).reload();
    }
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for std::sync::Arc<T> {
    fn federated_sign_in(&self, redirect_target: &str) -> Result<(), AuthError> {
        (**self).federated_sign_in(redirect_target)
    }

    fn sign_out(&self, redirect_target: &str) -> Result<(), AuthError> {
        (**self).sign_out(redirect_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_parses_wire_values() {
        assert_eq!("login".parse::<CrossTabSignal>().unwrap(), CrossTabSignal::Login);
        assert_eq!("logout".parse::<CrossTabSignal>().unwrap(), CrossTabSignal::Logout);
        assert!("LOGIN".parse::<CrossTabSignal>().is_err());
        assert_eq!(CrossTabSignal::Logout.to_string(), "logout");
    }
}
