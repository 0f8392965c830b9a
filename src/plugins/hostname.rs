//! Sets the hostname in the kernel, `/etc/hostname` and `/etc/hosts`.
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context as _, Result, anyhow};
use rand::seq::SliceRandom as _;
use uuid::Uuid;

use crate::config::Step;
use crate::template;

use super::helpers::chmod;
use super::{Context, Plugin, combine};

const HOSTNAME_FILE: &str = "/etc/hostname";
const HOSTS_FILE: &str = "/etc/hosts";
const LOCALHOST: &str = "127.0.0.1";
const RANDOM_CHARS: &[u8] = b"1234567890abcdefghijklmnopqrstuvwxyz";
const RANDOM_LEN: usize = 32;

/// Applies the step's `hostname`.
///
/// The name may use `{{ .UUID }}`, `{{ .Random }}` and `{{ .MachineID }}`
/// besides the usual `.Values` facts, so patterns like `node-{{ .UUID }}`
/// give every machine its own name.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hostname;

impl Plugin for Hostname {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        if step.hostname.is_empty() {
            return Ok(());
        }
        let name = expand(ctx, &step.hostname)?;
        ctx.log.debug(&format!("setting hostname to {name}"));

        let mut errors = Vec::new();
        if ctx.fs.is_host() {
            if let Err(e) = nix::unistd::sethostname(&name) {
                errors.push(anyhow!(e).context(format!("sethostname {name}")));
            }
        } else {
            ctx.log
                .debug("filesystem is re-rooted; leaving the kernel hostname alone");
        }
        if let Err(e) = write_hostname(ctx, &name) {
            errors.push(e);
        }
        if let Err(e) = update_hosts(ctx, &name) {
            errors.push(e);
        }
        combine(errors)
    }
}

fn expand(ctx: &Context, pattern: &str) -> Result<String> {
    let values = serde_json::json!({
        "UUID": Uuid::new_v4().to_string(),
        "Random": random_string(RANDOM_LEN),
        "MachineID": ctx.system.node.machineid,
        "Values": ctx.system.values(),
    });
    template::render(pattern, &values).with_context(|| format!("failed rendering hostname '{pattern}'"))
}

fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .filter_map(|_| RANDOM_CHARS.choose(&mut rng).copied().map(char::from))
        .collect()
}

fn write_hostname(ctx: &Context, name: &str) -> Result<()> {
    write_0644(&ctx.resolve(HOSTNAME_FILE), &format!("{name}\n"))
}

/// Point every `127.0.0.1` line at the new name; other lines are kept
/// (trimmed).  A missing file gets a single loopback line.
fn update_hosts(ctx: &Context, name: &str) -> Result<()> {
    let path = ctx.resolve(HOSTS_FILE);
    let current = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => format!("{LOCALHOST}\n"),
        Err(e) => return Err(e).with_context(|| format!("failed to read {HOSTS_FILE}")),
    };
    let content: String = current
        .lines()
        .map(|line| {
            let line = line.trim();
            if line.split_whitespace().next() == Some(LOCALHOST) {
                format!("{LOCALHOST} localhost {name}\n")
            } else {
                format!("{line}\n")
            }
        })
        .collect();
    write_0644(&path, &content)
}

fn write_0644(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    chmod(path, 0o644)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::plugins::test_context;

    fn step(hostname: &str) -> Step {
        Step {
            hostname: hostname.to_string(),
            ..Step::default()
        }
    }

    #[test]
    fn writes_hostname_and_rewrites_loopback() {
        let (ctx, tmp) = test_context();
        let etc = tmp.path().join("etc");
        fs::create_dir(&etc).unwrap();
        fs::write(
            etc.join("hosts"),
            "127.0.0.1   localhost old\n  ::1 localhost  \n10.0.0.1 gw\n",
        )
        .unwrap();

        Hostname.run(&step("edge-1"), &ctx).unwrap();

        assert_eq!(fs::read_to_string(etc.join("hostname")).unwrap(), "edge-1\n");
        assert_eq!(
            fs::read_to_string(etc.join("hosts")).unwrap(),
            "127.0.0.1 localhost edge-1\n::1 localhost\n10.0.0.1 gw\n"
        );
    }

    #[test]
    fn missing_hosts_file_is_created() {
        let (ctx, tmp) = test_context();
        fs::create_dir(tmp.path().join("etc")).unwrap();
        Hostname.run(&step("solo"), &ctx).unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("etc/hosts")).unwrap(),
            "127.0.0.1 localhost solo\n"
        );
    }

    #[test]
    fn random_and_uuid_placeholders_expand() {
        let (ctx, _tmp) = test_context();
        let random = expand(&ctx, "node-{{ .Random }}").unwrap();
        assert_eq!(random.len(), "node-".len() + RANDOM_LEN);
        assert!(random.bytes().skip(5).all(|b| RANDOM_CHARS.contains(&b)));

        let id = expand(&ctx, "{{ .UUID }}").unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(expand(&ctx, "{{ .Values.node.hostname }}-x").unwrap(), "test-host-x");
    }

    #[test]
    fn bad_template_is_an_error() {
        let (ctx, _tmp) = test_context();
        assert!(Hostname.run(&step("{{ .Nope }}"), &ctx).is_err());
    }

    #[test]
    fn empty_hostname_is_noop() {
        let (ctx, tmp) = test_context();
        Hostname.run(&Step::default(), &ctx).unwrap();
        assert!(!tmp.path().join("etc/hostname").exists());
    }
}
