//! `atheme.command`: run a services command on behalf of an RPC caller

use super::auth::resolve_caller;
use super::context::XmlRpcContext;
use super::reply::RpcReplySink;
use super::response::RpcResponse;
use rustsvc_core::utils::string::is_placeholder;
use rustsvc_core::{Account, AuditEvent, AuditEventType, ConnectionHandle, Fault, FaultCode};
use rustsvc_services::SourceInfo;
use tracing::debug;

/// Trailing arguments beyond this are dropped
pub const MAX_PARAMS: usize = 20;

/// Dispatch `(cookie, account, source, service, command, args...)`.
///
/// Arguments must already have passed sanitization.
pub async fn dispatch(ctx: &XmlRpcContext, conn: &ConnectionHandle, params: &[String]) -> RpcResponse {
    let [token, account_name, source_desc, service_name, command_name, trailing @ ..] = params else {
        return Fault::need_more_params().into();
    };

    let response = match resolve_caller(ctx.accounts.as_ref(), ctx.cookies.as_ref(), token, account_name) {
        Ok(caller) => run(ctx, conn, caller, source_desc, service_name, command_name, trailing).await,
        Err(fault) => fault.into(),
    };

    let mut event = AuditEvent::new(AuditEventType::Command)
        .with_service(service_name.clone())
        .with_command(command_name.to_uppercase())
        .with_transport("xmlrpc")
        .with_connection(conn.id)
        .with_source(source_desc.clone());
    if !is_placeholder(account_name) {
        event = event.with_account(account_name.clone());
    }
    if let RpcResponse::Fault(fault) = &response {
        event = event.with_error(fault.to_string());
    }
    ctx.audit.record(&event);

    response
}

async fn run(
    ctx: &XmlRpcContext,
    conn: &ConnectionHandle,
    caller: Option<Account>,
    source_desc: &str,
    service_name: &str,
    command_name: &str,
    trailing: &[String],
) -> RpcResponse {
    // literal service name first, then the configured nickname
    let service = ctx
        .services
        .find_service(service_name)
        .or_else(|| ctx.services.find_service_by_nick(service_name))
        .filter(|s| s.has_commands());
    let Some(service) = service else {
        debug!("xmlrpc command: invalid service {}", service_name);
        return RpcResponse::fault(FaultCode::NoSuchSource, "Invalid service name.");
    };

    let Some(command) = service.find_command(command_name) else {
        return RpcResponse::fault(FaultCode::NoSuchSource, "Invalid command name.");
    };

    let args = &trailing[..trailing.len().min(MAX_PARAMS)];

    let mut sink = RpcReplySink::new();
    {
        let mut si = SourceInfo::new(conn.clone(), &mut sink)
            .with_account(caller)
            .with_service(Some(service))
            .with_source_desc(Some(source_desc.to_string()).filter(|d| !d.is_empty()));
        ctx.services.invoke(&mut si, command.as_ref(), args).await;
    }

    sink.into_response()
}
