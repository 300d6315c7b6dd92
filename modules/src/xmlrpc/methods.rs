//! The `atheme.*` method handlers
//!
//! Each handler receives arguments that already passed its [`Sanitizer`]
//! and returns exactly one response. Fault codes and messages are part of
//! the wire contract.

use super::auth::resolve_caller;
use super::context::XmlRpcContext;
use super::dispatch::dispatch;
use super::response::{RpcResponse, RpcValue};
use super::sanitize::Sanitizer;
use async_trait::async_trait;
use rustsvc_core::database::keys;
use rustsvc_core::password::hash_password;
use rustsvc_core::utils::string::is_valid_account_name;
use rustsvc_core::utils::time::current_unix_timestamp;
use rustsvc_core::{
    verify_account_password, Account, AuditEventType, ConnectionHandle, Fault, FaultCode,
    RegisteredNick,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Source address recorded when the caller supplies none
const DEFAULT_SOURCE: &str = "127.0.0.1";

/// An RPC method
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Method name as called on the wire (e.g. "atheme.login")
    fn name(&self) -> &str;

    /// Argument rules checked before `call`
    fn sanitizer(&self) -> Sanitizer;

    async fn call(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> RpcResponse;
}

/// All methods provided by the gateway
pub fn builtin_methods() -> Vec<Arc<dyn MethodHandler>> {
    vec![
        Arc::new(LoginMethod),
        Arc::new(LogoutMethod),
        Arc::new(CommandMethod),
        Arc::new(PrivsetMethod),
        Arc::new(IsonMethod),
        Arc::new(MetadataMethod),
        Arc::new(RegisterMethod),
        Arc::new(VerifyMethod),
    ]
}

fn optional_source(arg: Option<&String>) -> Option<&str> {
    arg.map(String::as_str).filter(|s| !s.is_empty())
}

/// `atheme.login(account, password[, source ip])` -> authcookie
pub struct LoginMethod;

impl LoginMethod {
    fn run(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> Result<RpcResponse, Fault> {
        let [name, password, rest @ ..] = params else {
            return Err(Fault::need_more_params());
        };
        let source = optional_source(rest.first());

        let account = ctx
            .accounts
            .find_account(name)
            .ok_or_else(|| Fault::new(FaultCode::NoSuchSource, "The account is not registered."))?;

        if account.is_frozen() {
            warn!("xmlrpc: failed LOGIN to {} (frozen)", account.name);
            let event = ctx
                .external_event(conn, source, AuditEventType::LoginFailure)
                .with_target(account.name.clone())
                .with_detail(format!("failed LOGIN to {} (frozen)", account.name));
            ctx.audit.record(&event);
            return Err(Fault::new(FaultCode::NoPrivs, "The account has been frozen."));
        }

        if !verify_account_password(&account, password) {
            let event = ctx
                .external_event(conn, source, AuditEventType::LoginFailure)
                .with_target(account.name.clone())
                .with_detail(format!("failed LOGIN to {} (bad password)", account.name));
            ctx.audit.record(&event);
            ctx.failed_login
                .bad_password(&account, source.unwrap_or(conn.remote_addr.as_str()));
            return Err(Fault::new(
                FaultCode::AuthFail,
                "The password is not valid for this account.",
            ));
        }

        ctx.accounts
            .update_account(&account.name, &mut |acct: &mut Account| acct.last_login = chrono::Utc::now())?;

        let cookie = ctx.cookies.create(&account);
        ctx.log_external(conn, source, Some(&account), AuditEventType::Login, "LOGIN");

        Ok(RpcResponse::string(cookie.ticket))
    }
}

#[async_trait]
impl MethodHandler for LoginMethod {
    fn name(&self) -> &str {
        "atheme.login"
    }

    fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(2)
    }

    async fn call(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> RpcResponse {
        self.run(ctx, conn, params).unwrap_or_else(Into::into)
    }
}

/// `atheme.logout(authcookie, account)`
pub struct LogoutMethod;

impl LogoutMethod {
    fn run(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> Result<RpcResponse, Fault> {
        let [token, name, ..] = params else {
            return Err(Fault::need_more_params());
        };

        let account = ctx.accounts.find_account(name).ok_or_else(Fault::unknown_user)?;

        if !ctx.cookies.validate(token, &account) {
            return Err(Fault::bad_auth_cookie());
        }

        ctx.log_external(conn, None, Some(&account), AuditEventType::Logout, "LOGOUT");
        ctx.cookies.destroy(token);

        Ok(RpcResponse::string("You are now logged out."))
    }
}

#[async_trait]
impl MethodHandler for LogoutMethod {
    fn name(&self) -> &str {
        "atheme.logout"
    }

    fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(2)
    }

    async fn call(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> RpcResponse {
        self.run(ctx, conn, params).unwrap_or_else(Into::into)
    }
}

/// `atheme.command(authcookie, account, source, service, command, args...)`
pub struct CommandMethod;

#[async_trait]
impl MethodHandler for CommandMethod {
    fn name(&self) -> &str {
        "atheme.command"
    }

    fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(5).rejecting_empty()
    }

    async fn call(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> RpcResponse {
        dispatch(ctx, conn, params).await
    }
}

/// `atheme.privset(authcookie, account)` -> privileges of the caller's operclass
pub struct PrivsetMethod;

impl PrivsetMethod {
    fn run(&self, ctx: &XmlRpcContext, params: &[String]) -> Result<RpcResponse, Fault> {
        let [token, name, ..] = params else {
            return Err(Fault::need_more_params());
        };

        let caller = resolve_caller(ctx.accounts.as_ref(), ctx.cookies.as_ref(), token, name)?;

        // callers without privileges get an empty string, not a fault
        let privs = caller
            .and_then(|account| account.oper_class)
            .and_then(|class| ctx.accounts.find_operclass(&class))
            .map(|class| class.privs)
            .unwrap_or_default();

        Ok(RpcResponse::string(privs))
    }
}

#[async_trait]
impl MethodHandler for PrivsetMethod {
    fn name(&self) -> &str {
        "atheme.privset"
    }

    fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(2)
    }

    async fn call(&self, ctx: &XmlRpcContext, _conn: &ConnectionHandle, params: &[String]) -> RpcResponse {
        self.run(ctx, params).unwrap_or_else(Into::into)
    }
}

/// `atheme.ison(nick)` -> (online, account or "*")
pub struct IsonMethod;

#[async_trait]
impl MethodHandler for IsonMethod {
    fn name(&self) -> &str {
        "atheme.ison"
    }

    fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(1)
    }

    async fn call(&self, ctx: &XmlRpcContext, _conn: &ConnectionHandle, params: &[String]) -> RpcResponse {
        let Some(nick) = params.first() else {
            return Fault::need_more_params().into();
        };

        let (online, account) = match ctx.accounts.find_online_user(nick) {
            Some(user) => (true, user.account.unwrap_or_else(|| "*".to_string())),
            None => (false, "*".to_string()),
        };

        RpcResponse::Params(vec![RpcValue::Boolean(online), RpcValue::String(account)])
    }
}

/// `atheme.metadata(account | uid | #channel, key)` -> value
pub struct MetadataMethod;

impl MetadataMethod {
    fn run(&self, ctx: &XmlRpcContext, params: &[String]) -> Result<RpcResponse, Fault> {
        // a third (value) argument is accepted and ignored
        let [target, key, ..] = params else {
            return Err(Fault::need_more_params());
        };

        let value = if target.starts_with('#') {
            let channel = ctx.accounts.find_channel(target).ok_or_else(|| {
                Fault::new(
                    FaultCode::NoSuchSource,
                    "No channel registration was found for the provided channel name.",
                )
            })?;
            channel.metadata.get(key).cloned()
        } else {
            let account = ctx
                .accounts
                .find_account_by_name_or_alias(target)
                .or_else(|| ctx.accounts.find_account_by_uid(target))
                .ok_or_else(|| {
                    Fault::new(
                        FaultCode::NoSuchSource,
                        "No account was found for this accountname or UID.",
                    )
                })?;
            account.metadata(key).map(str::to_string)
        };

        value.map(RpcResponse::string).ok_or_else(|| {
            Fault::new(
                FaultCode::NoSuchSource,
                "No metadata found matching this account/channel and key.",
            )
        })
    }
}

#[async_trait]
impl MethodHandler for MetadataMethod {
    fn name(&self) -> &str {
        "atheme.metadata"
    }

    fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(2)
    }

    async fn call(&self, ctx: &XmlRpcContext, _conn: &ConnectionHandle, params: &[String]) -> RpcResponse {
        self.run(ctx, params).unwrap_or_else(Into::into)
    }
}

/// `atheme.register(account, password, email[, source ip[, verification key]])`
pub struct RegisterMethod;

impl RegisterMethod {
    fn run(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> Result<RpcResponse, Fault> {
        let [name, password, email, rest @ ..] = params else {
            return Err(Fault::need_more_params());
        };
        let settings = &ctx.settings;
        let nick_ownership = !settings.no_nick_ownership;

        if !is_valid_account_name(name, settings.max_account_length, nick_ownership) {
            return Err(Fault::new(FaultCode::BadParams, "Invalid username"));
        }

        if nick_ownership && ctx.accounts.find_online_user(name).is_some() {
            return Err(Fault::new(
                FaultCode::NoPrivs,
                "A user matching this account is already on IRC.",
            ));
        }

        let already_registered = ctx.accounts.find_account(name).is_some()
            || (nick_ownership && ctx.accounts.find_nick(name).is_some());
        if already_registered {
            return Err(Fault::new(FaultCode::AlreadyExists, "The account is already registered."));
        }

        // password strength, email validity and per-email limits are the
        // caller's business
        let mut account = Account::new(name.as_str(), hash_password(password)?, email.as_str());

        // a verification key is honoured whether or not email verification
        // is configured
        if let Some(key) = rest.get(1) {
            account.waiting_verification = true;
            account.metadata.insert(keys::VERIFY_KEY.to_string(), key.clone());
            account
                .metadata
                .insert(keys::VERIFY_TIMESTAMP.to_string(), current_unix_timestamp().to_string());
        }

        ctx.accounts.add_account(account.clone())?;

        if nick_ownership {
            if let Err(e) = ctx.accounts.add_nick(RegisteredNick::new(name.as_str(), account.name.as_str())) {
                warn!("Registered {} but could not claim its nickname: {}", account.name, e);
            }
        }

        info!("xmlrpc: registered account {}", account.name);
        let source = rest.first().map(String::as_str).unwrap_or(DEFAULT_SOURCE);
        ctx.log_external(conn, Some(source), Some(&account), AuditEventType::Register, "REGISTER");

        Ok(RpcResponse::string("Registration successful"))
    }
}

#[async_trait]
impl MethodHandler for RegisterMethod {
    fn name(&self) -> &str {
        "atheme.register"
    }

    fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(3)
    }

    async fn call(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> RpcResponse {
        self.run(ctx, conn, params).unwrap_or_else(Into::into)
    }
}

/// `atheme.verify(account, key[, source ip])`
pub struct VerifyMethod;

impl VerifyMethod {
    fn run(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> Result<RpcResponse, Fault> {
        let [name, key, rest @ ..] = params else {
            return Err(Fault::need_more_params());
        };

        let account = ctx
            .accounts
            .find_account(name)
            .ok_or_else(|| Fault::new(FaultCode::NoSuchTarget, "The account is not registered."))?;

        let stored = account
            .metadata(keys::VERIFY_KEY)
            .filter(|_| account.waiting_verification)
            .ok_or_else(|| Fault::new(FaultCode::BadParams, "Not awaiting verification"))?;

        if !key.eq_ignore_ascii_case(stored) {
            return Err(Fault::new(FaultCode::BadParams, "Invalid verification key"));
        }

        ctx.accounts.update_account(&account.name, &mut |acct: &mut Account| {
            acct.waiting_verification = false;
            acct.metadata.remove(keys::VERIFY_KEY);
            acct.metadata.remove(keys::VERIFY_TIMESTAMP);
        })?;

        let source = rest.first().map(String::as_str).unwrap_or(DEFAULT_SOURCE);
        ctx.log_external(conn, Some(source), Some(&account), AuditEventType::Verify, "VERIFY");

        Ok(RpcResponse::string("Verification successful"))
    }
}

#[async_trait]
impl MethodHandler for VerifyMethod {
    fn name(&self) -> &str {
        "atheme.verify"
    }

    fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(2)
    }

    async fn call(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> RpcResponse {
        self.run(ctx, conn, params).unwrap_or_else(Into::into)
    }
}
