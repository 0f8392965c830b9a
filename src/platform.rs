//! Host facts captured once at startup and exposed to templates.
use std::fs;
use std::path::Path;

use serde::Serialize;

/// Identity of this machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Current hostname.
    pub hostname: String,
    /// Contents of `/etc/machine-id`.
    pub machineid: String,
}

/// Running kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Kernel {
    /// Kernel release string (`uname -r`).
    pub release: String,
    /// CPU architecture.
    pub architecture: String,
}

/// Distribution details from `os-release`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OsInfo {
    /// `PRETTY_NAME`, falling back to `NAME`.
    pub name: String,
    /// `ID`.
    pub vendor: String,
    /// `VERSION_ID`.
    pub version: String,
}

/// Snapshot of host facts, threaded through every plugin call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    /// Machine identity.
    pub node: Node,
    /// Kernel facts.
    pub kernel: Kernel,
    /// Distribution facts.
    pub os: OsInfo,
}

impl SystemInfo {
    /// Detect facts for the running host.  Unreadable sources yield empty
    /// fields.
    #[must_use]
    pub fn detect() -> Self {
        let hostname = nix::unistd::gethostname()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();
        let machineid = ["/etc/machine-id", "/var/lib/dbus/machine-id"]
            .iter()
            .find_map(|p| read_trimmed(Path::new(p)))
            .unwrap_or_default();
        let os = ["/etc/os-release", "/usr/lib/os-release"]
            .iter()
            .find_map(|p| fs::read_to_string(p).ok())
            .map(|c| parse_os_release(&c))
            .unwrap_or_default();
        Self {
            node: Node {
                hostname,
                machineid,
            },
            kernel: Kernel {
                release: read_trimmed(Path::new("/proc/sys/kernel/osrelease")).unwrap_or_default(),
                architecture: std::env::consts::ARCH.to_string(),
            },
            os,
        }
    }

    /// Facts for a host with the given name and nothing else known.
    #[must_use]
    pub fn with_hostname(hostname: &str) -> Self {
        Self {
            node: Node {
                hostname: hostname.to_string(),
                ..Node::default()
            },
            ..Self::default()
        }
    }

    /// The facts as a JSON tree, the `.Values` root of templates.
    #[must_use]
    pub fn values(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    let s = fs::read_to_string(path).ok()?;
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Extract name, vendor and version from `os-release` content.
fn parse_os_release(content: &str) -> OsInfo {
    let mut info = OsInfo::default();
    let mut name = String::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
        match key.trim() {
            "PRETTY_NAME" => info.name = value,
            "NAME" => name = value,
            "ID" => info.vendor = value,
            "VERSION_ID" => info.version = value,
            _ => {}
        }
    }
    if info.name.is_empty() {
        info.name = name;
    }
    info
}
