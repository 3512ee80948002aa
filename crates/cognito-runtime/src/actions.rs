use std::sync::Arc;

use cognito_api::{AuthError, CrossTabSignal, IdentityProvider, Navigator, SignalMailbox};

/// Login and logout entry points for one tab.
#[derive(Clone)]
pub struct AuthActions {
    provider: Arc<dyn IdentityProvider>,
    mailbox: Arc<dyn SignalMailbox>,
    navigator: Arc<dyn Navigator>,
}

impl AuthActions {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        mailbox: Arc<dyn SignalMailbox>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            provider,
            mailbox,
            navigator,
        }
    }

    /// Start the hosted sign-in flow, returning to `redirect` or the current URL.
    pub fn login(&self, redirect: Option<&str>) -> Result<(), AuthError> {
        let target = self.target(redirect);
        tracing::info!(%target, "starting federated sign-in");
        self.provider.federated_sign_in(&target)
    }

    /// Sign out with the identity provider, then tell the other tabs.
    pub fn logout(&self, redirect: Option<&str>) -> Result<(), AuthError> {
        let target = self.target(redirect);
        tracing::info!(%target, "starting sign-out");
        self.provider.sign_out(&target)?;
        self.mailbox.publish(CrossTabSignal::Logout);
        Ok(())
    }

    pub fn announce_login(&self) {
        self.mailbox.publish(CrossTabSignal::Login);
    }

    fn target(&self, redirect: Option<&str>) -> String {
        redirect.map_or_else(|| self.navigator.current_url(), str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognito_connectors::{MemoryMailbox, RecordingIdentityProvider, RecordingNavigator};

    struct Fixture {
        idp: Arc<RecordingIdentityProvider>,
        mailbox: Arc<MemoryMailbox>,
        actions: AuthActions,
    }

    fn fixture() -> Fixture {
        let idp = Arc::new(RecordingIdentityProvider::new());
        let mailbox = Arc::new(MemoryMailbox::new());
        let nav = Arc::new(RecordingNavigator::new("https://app.example.com/orders"));
        let actions = AuthActions::new(idp.clone(), mailbox.clone(), nav);
        Fixture {
            idp,
            mailbox,
            actions,
        }
    }

    #[test]
    fn login_defaults_to_current_url() {
        let f = fixture();
        f.actions.login(None).unwrap();
        f.actions.login(Some("https://app.example.com/cart")).unwrap();

        assert_eq!(
            f.idp.sign_in_targets(),
            vec![
                "https://app.example.com/orders".to_string(),
                "https://app.example.com/cart".to_string()
            ]
        );
        assert_eq!(f.mailbox.peek(), None);
    }

    #[test]
    fn logout_publishes_after_sign_out() {
        let f = fixture();
        f.actions.logout(None).unwrap();

        assert_eq!(f.idp.sign_out_targets().len(), 1);
        assert_eq!(f.mailbox.take(), Some(CrossTabSignal::Logout));
    }

    #[test]
    fn failed_sign_out_leaves_mailbox_alone() {
        let f = fixture();
        f.idp.set_failing(true);

        assert!(matches!(f.actions.logout(None), Err(AuthError::External(_))));
        assert_eq!(f.mailbox.peek(), None);
    }

    #[test]
    fn announce_login_writes_signal() {
        let f = fixture();
        f.actions.announce_login();
        assert_eq!(f.mailbox.take(), Some(CrossTabSignal::Login));
    }
}
