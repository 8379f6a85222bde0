//! Host service installation: systemd unit generation.
//!
//! `configure --run-as-service` renders a unit file under the agent root and
//! drops a marker file the settings store answers `is_service_configured`
//! from. Enabling/starting the unit is left to the operator.

use std::path::{Path, PathBuf};

use crate::domain::AgentSettings;
use crate::error::Result;

/// Unit name as shown by `systemctl list-units`.
pub fn service_name(host: &str, settings: &AgentSettings) -> String {
    format!(
        "drover.agent.{}.{}.service",
        sanitize(host),
        sanitize(&settings.agent_name)
    )
}

/// Human-readable unit description.
pub fn display_name(host: &str, settings: &AgentSettings) -> String {
    format!("Drover Agent ({}.{})", sanitize(host), sanitize(&settings.agent_name))
}

/// Host name used in unit names and session ownership.
pub fn host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

/// Render the systemd unit for this agent.
pub fn unit_file(settings: &AgentSettings, exec_path: &Path) -> String {
    let description = display_name(&host_name(), settings);
    format!(
        "[Unit]\n\
         Description={description}\n\
         After=network.target\n\
         \n\
         [Service]\n\
         ExecStart={exec} run\n\
         WorkingDirectory={work}\n\
         Restart=on-failure\n\
         RestartSec=5\n\
         KillMode=process\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        exec = exec_path.display(),
        work = settings.work_folder.display(),
    )
}

/// Write the unit file under the agent root and return its path.
pub fn generate_unit(root: &Path, settings: &AgentSettings) -> Result<PathBuf> {
    let exec = std::env::current_exe()?;
    let name = service_name(&host_name(), settings);
    let path = root.join(&name);
    std::fs::write(&path, unit_file(settings, &exec))?;
    Ok(path)
}
