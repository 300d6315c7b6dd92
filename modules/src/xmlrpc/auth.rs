//! Resolving the caller of an RPC call from an authcookie and account name

use rustsvc_core::utils::string::is_placeholder;
use rustsvc_core::{Account, AccountStore, AuthCookieStore, Fault};
use tracing::debug;

/// Resolve `(token, account_name)` to the calling account.
///
/// `Ok(None)` is an anonymous call: both fields are empty or a single
/// placeholder character. Anything else must name an existing account and
/// carry a valid cookie for it.
pub fn resolve_caller(
    accounts: &dyn AccountStore,
    cookies: &dyn AuthCookieStore,
    token: &str,
    account_name: &str,
) -> Result<Option<Account>, Fault> {
    if is_placeholder(token) && is_placeholder(account_name) {
        return Ok(None);
    }

    let account = accounts.find_account(account_name).ok_or_else(|| {
        debug!("RPC caller {} is not registered", account_name);
        Fault::unknown_user()
    })?;

    if !cookies.validate(token, &account) {
        debug!("Rejected authcookie for {}", account.name);
        return Err(Fault::bad_auth_cookie());
    }

    Ok(Some(account))
}
