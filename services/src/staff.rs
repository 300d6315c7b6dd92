//! NickServ STAFF: marks an account as belonging to a staff member

use crate::framework::Command;
use crate::source::SourceInfo;
use async_trait::async_trait;
use rustsvc_core::database::keys;
use rustsvc_core::utils::time::current_unix_timestamp;
use rustsvc_core::{AccountStore, AuditEvent, AuditEventType, AuditSink, EntityRef, FaultCode};
use std::sync::Arc;

const USAGE: &str = "Usage: STAFF <account> <ON|OFF>";

/// `STAFF <account> <ON|OFF>`
pub struct StaffCommand {
    store: Arc<dyn AccountStore>,
    audit: Arc<dyn AuditSink>,
}

impl StaffCommand {
    pub fn new(store: Arc<dyn AccountStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    fn log_admin(&self, si: &SourceInfo<'_>, detail: String) {
        let mut event = AuditEvent::new(AuditEventType::Admin)
            .with_command("STAFF")
            .with_transport(si.transport())
            .with_connection(si.connection.id)
            .with_detail(detail);
        if let Some(account) = &si.account {
            event = event.with_account(account.name.clone());
        }
        if let Some(service) = &si.service {
            event = event.with_service(service.nick());
        }
        self.audit.record(&event);
    }

    fn set_on(&self, si: &mut SourceInfo<'_>, name: &str) {
        let entity = EntityRef::Account(name.to_string());
        if self.store.metadata_get(&entity, keys::STAFF_SETTER).is_some() {
            si.fail(
                FaultCode::BadParams,
                &format!("\x02{}\x02 is already a member of staff.", name),
            );
            return;
        }

        let setter = si.oper_name();
        let stored = self
            .store
            .metadata_set(&entity, keys::STAFF_SETTER, &setter)
            .and_then(|_| {
                self.store.metadata_set(
                    &entity,
                    keys::STAFF_TIMESTAMP,
                    &current_unix_timestamp().to_string(),
                )
            });
        if let Err(e) = stored {
            tracing::error!("STAFF ON for {} failed: {}", name, e);
            si.fail(FaultCode::NoSuchTarget, &format!("\x02{}\x02 is not registered.", name));
            return;
        }

        tracing::info!(target: "wallops", "{} set the STAFF option for the account {}.", setter, name);
        self.log_admin(si, format!("STAFF:ON: {}", name));
        si.success_nodata(&format!("\x02{}\x02 is now a member of staff.", name));
    }

    fn set_off(&self, si: &mut SourceInfo<'_>, name: &str) {
        let entity = EntityRef::Account(name.to_string());
        if self.store.metadata_get(&entity, keys::STAFF_SETTER).is_none() {
            si.fail(
                FaultCode::BadParams,
                &format!("\x02{}\x02 is not a member of staff.", name),
            );
            return;
        }

        let removed = self
            .store
            .metadata_delete(&entity, keys::STAFF_SETTER)
            .and_then(|_| self.store.metadata_delete(&entity, keys::STAFF_TIMESTAMP));
        if let Err(e) = removed {
            tracing::error!("STAFF OFF for {} failed: {}", name, e);
            si.fail(FaultCode::NoSuchTarget, &format!("\x02{}\x02 is not registered.", name));
            return;
        }

        tracing::info!(target: "wallops", "{} removed the STAFF option on the account {}.", si.oper_name(), name);
        self.log_admin(si, format!("STAFF:OFF: {}", name));
        si.success_nodata(&format!("\x02{}\x02 is no longer a member of staff.", name));
    }
}

#[async_trait]
impl Command for StaffCommand {
    fn name(&self) -> &str {
        "STAFF"
    }

    fn description(&self) -> &str {
        "Adds a flag to indicate that the account belongs to a staffer."
    }

    fn required_priv(&self) -> Option<&str> {
        Some("general:grant")
    }

    async fn execute(&self, si: &mut SourceInfo<'_>, params: &[String]) {
        let (Some(target), Some(action)) = (params.first(), params.get(1)) else {
            si.fail(FaultCode::NeedMoreParams, "Insufficient parameters for \x02STAFF\x02.");
            si.fail(FaultCode::NeedMoreParams, USAGE);
            return;
        };

        let Some(account) = self.store.find_account_by_name_or_alias(target) else {
            si.fail(FaultCode::NoSuchTarget, &format!("\x02{}\x02 is not registered.", target));
            return;
        };

        if action.eq_ignore_ascii_case("ON") {
            self.set_on(si, &account.name);
        } else if action.eq_ignore_ascii_case("OFF") {
            self.set_off(si, &account.name);
        } else {
            si.fail(FaultCode::NeedMoreParams, "Invalid parameters for \x02STAFF\x02.");
            si.fail(FaultCode::NeedMoreParams, USAGE);
        }
    }
}
