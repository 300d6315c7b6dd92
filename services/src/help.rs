//! HELP command, bound to every service

use crate::framework::Command;
use crate::source::SourceInfo;
use async_trait::async_trait;
use rustsvc_core::FaultCode;

/// Lists the commands of the service it is invoked through
pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "HELP"
    }

    fn description(&self) -> &str {
        "Displays contextual help information."
    }

    async fn execute(&self, si: &mut SourceInfo<'_>, params: &[String]) {
        let Some(service) = si.service.clone() else {
            si.fail(FaultCode::NoSuchSource, "No service to show help for.");
            return;
        };

        if let Some(topic) = params.first() {
            match service.find_command(topic) {
                Some(command) => {
                    si.success_nodata(&format!("Help for \x02{}\x02:", command.name()));
                    si.success_nodata(command.description());
                }
                None => si.fail(
                    FaultCode::NoSuchSource,
                    &format!("No help available for \x02{}\x02.", topic),
                ),
            }
            return;
        }

        si.success_nodata(&format!("***** \x02{} Help\x02 *****", service.nick()));
        for (name, description) in service.command_list() {
            si.success_nodata(&format!("{:<15} {}", name, description));
        }
        si.success_nodata("***** \x02End of Help\x02 *****");
    }
}
