use std::{env, io, io::Write, process::ExitStatus, time::Duration};

use thiserror::Error;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracerouter_core::models::instances::Instance;
use tracing::info;

use crate::{gcp::ssh::remote_command, report::Report};

use self::process::{Invocation, ProcessOptions};

pub mod dns;
pub mod process;

const UNKNOWN_ADDRESS: &str = "unknown";

/// A failed unit of work. Reported inline, never fatal to the run.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("Error running {name}: {instance} has no access config with a public address")]
    NoPublicAddress { name: String, instance: String },
    #[error("Error running {name}: public address of this host is unknown")]
    SelfAddressUnknown { name: String },
    #[error(
        "Error running {}: exited with {status}: {stderr}\nCALL: {}",
        .invocation.name,
        .invocation.call_string()
    )]
    Subprocess {
        invocation: Invocation,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Error running {}: {source}\nCALL: {}", .invocation.name, .invocation.call_string())]
    Spawn {
        invocation: Invocation,
        source: io::Error,
    },
    #[error(
        "Error running {}: failed reading output: {source}\nCALL: {}",
        .invocation.name,
        .invocation.call_string()
    )]
    Stream {
        invocation: Invocation,
        source: io::Error,
    },
    #[error(
        "Error running {}: timed out after {after:?}\nCALL: {}",
        .invocation.name,
        .invocation.call_string()
    )]
    Timeout {
        invocation: Invocation,
        after: Duration,
    },
    #[error("Error running {}: cancelled\nCALL: {}", .invocation.name, .invocation.call_string())]
    Cancelled { invocation: Invocation },
}

/// External executables the runner shells out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub traceroute_bin: String,
    pub dig_bin: String,
    pub gcloud_bin: String,
}

impl ToolConfig {
    pub fn from_env(gcloud_bin: &str) -> Self {
        Self {
            traceroute_bin: env::var("TRACEROUTE_BIN").unwrap_or("traceroute".into()),
            dig_bin: env::var("DIG_BIN").unwrap_or("dig".into()),
            gcloud_bin: gcloud_bin.to_string(),
        }
    }
}

/// Where a traceroute for one instance is run from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    ForwardAndReverse,
}

pub struct DiagnosticRunner {
    tools: ToolConfig,
    opts: ProcessOptions,
    self_ip: OnceCell<Option<String>>,
}

impl DiagnosticRunner {
    pub fn new(tools: ToolConfig, timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        Self {
            tools,
            opts: ProcessOptions { timeout, cancel },
            self_ip: OnceCell::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.opts.cancel.is_cancelled()
    }

    /// Resolves once the run has been interrupted.
    pub async fn cancelled(&self) {
        self.opts.cancel.cancelled().await
    }

    /// Streams `invocation` into the report, reporting any failure.
    pub async fn stream<W: Write>(&self, invocation: &Invocation, report: &mut Report<W>) -> bool {
        let result = process::run(invocation, &self.opts, |line| report.line(line)).await;
        match result {
            Ok(()) => {
                report.blank();
                true
            }
            Err(e) => {
                report.failure(e);
                false
            }
        }
    }

    /// Public address of this host, looked up once per run.
    pub async fn self_address<W: Write>(&self, report: &mut Report<W>) -> Option<String> {
        self.self_ip
            .get_or_init(|| async move {
                let lookup = dns::self_ip_lookup(&self.tools.dig_bin);
                match process::capture(&lookup, &self.opts).await {
                    Ok(out) => {
                        let ip = dns::parse_short_answer(&out);
                        if ip.is_none() {
                            report.failure(format!(
                                "Error running {}: empty answer\nCALL: {}",
                                lookup.name,
                                lookup.call_string()
                            ));
                        }
                        ip
                    }
                    Err(e) => {
                        report.failure(e);
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// One TXT lookup revealing how an external resolver sees this host.
    pub async fn dig_lookup<W: Write>(&self, report: &mut Report<W>) -> bool {
        let lookup = dns::txt_lookup(&self.tools.dig_bin);
        report.line(format!("Running \"{}\"", lookup.call_string()));
        self.stream(&lookup, report).await
    }

    pub async fn traceroute_instance<W: Write>(
        &self,
        instance: &Instance,
        project: &str,
        zone: &str,
        direction: Direction,
        report: &mut Report<W>,
    ) {
        let Some(target) = instance.public_address() else {
            report.failure(DiagnosticError::NoPublicAddress {
                name: "Traceroute".into(),
                instance: instance.name.clone(),
            });
            return;
        };

        let self_ip = self.self_address(report).await;
        let shown_self = self_ip.as_deref().unwrap_or(UNKNOWN_ADDRESS);
        info!("tracing {} ({target}) in {zone}", instance.name);

        report.line(format!(
            "Traceroute TO {}: {shown_self} -> {target}",
            instance.name
        ));
        let forward = Invocation::new("Traceroute", &self.tools.traceroute_bin, [target]);
        self.stream(&forward, report).await;

        if direction == Direction::Forward {
            return;
        }

        report.line(format!(
            "Traceroute FROM {}: {target} -> {shown_self}",
            instance.name
        ));
        let Some(self_ip) = self_ip else {
            report.failure(DiagnosticError::SelfAddressUnknown {
                name: "Reverse Traceroute".into(),
            });
            return;
        };
        let reverse = remote_command(
            &self.tools.gcloud_bin,
            &instance.name,
            project,
            zone,
            &format!("traceroute {self_ip}"),
        );
        self.stream(&reverse, report).await;
    }
}
