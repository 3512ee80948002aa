//! Browser-side session reconciliation: the session hook, the token-exchange
//! watcher and the login/logout actions.

mod actions;
mod exchange;
mod hook;

pub use actions::AuthActions;
pub use exchange::{ExchangeTask, TokenExchangeWatcher, fragment_has_token};
pub use hook::{HookPhase, Reaction, SessionHook};
