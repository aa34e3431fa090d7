use std::{future::Future, io::Write};

use async_trait::async_trait;
use tracerouter_core::{
    matcher::InstanceMatcher,
    models::instances::{Instance, ZoneInstanceGroup},
    ComputeInventory,
};
use tracing::{info, warn};

use crate::{
    diagnostics::{DiagnosticError, DiagnosticRunner, Direction},
    error::Error,
    report::Report,
};

const RULE: &str = "----------------------------------------";
const INTERRUPTED: &str = "Interrupted, skipping remaining work";

/// Where the project and the inventory come from.
#[async_trait]
pub trait Backend: Send + Sync {
    type Inventory: ComputeInventory;

    async fn default_project(&self) -> Result<String, Error>;
    async fn connect(&self) -> Result<Self::Inventory, Error>;
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pattern: String,
    pub concurrency: usize,
    pub project: Option<String>,
    pub dig: bool,
    pub mode: Mode,
}

/// What to do with each matched instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Print,
    Trace(Direction),
}

impl Mode {
    pub fn from_flags(print: bool, reverse_traceroute: bool) -> Self {
        match (print, reverse_traceroute) {
            (true, _) => Mode::Print,
            (false, true) => Mode::Trace(Direction::ForwardAndReverse),
            (false, false) => Mode::Trace(Direction::Forward),
        }
    }
}

/// One full run: pattern, project, optional dig lookup, discovery and the
/// per-zone report. An interrupt at any stage ends the run cleanly.
pub async fn run<B, W>(
    opts: &RunOptions,
    backend: &B,
    runner: &DiagnosticRunner,
    report: &mut Report<W>,
) -> Result<(), Error>
where
    B: Backend,
    W: Write,
{
    // before anything that needs gcloud or the network
    let matcher = InstanceMatcher::new(&opts.pattern)?.with_concurrency(opts.concurrency);

    let project = match &opts.project {
        Some(project) => project.clone(),
        None => match until_cancelled(runner, backend.default_project()).await {
            Some(project) => project?,
            None => {
                interrupted(report);
                return Ok(());
            }
        },
    };
    info!("using project {project}");
    project_header(report, &project);

    if opts.dig {
        runner.dig_lookup(report).await;
    }

    let inventory = match until_cancelled(runner, backend.connect()).await {
        Some(inventory) => inventory?,
        None => {
            interrupted(report);
            return Ok(());
        }
    };
    discover_and_report(&matcher, &inventory, runner, opts.mode, &project, report).await
}

async fn until_cancelled<F: Future>(runner: &DiagnosticRunner, fut: F) -> Option<F::Output> {
    tokio::select! {
        out = fut => Some(out),
        _ = runner.cancelled() => None,
    }
}

fn interrupted<W: Write>(report: &mut Report<W>) {
    warn!("run interrupted");
    report.line(INTERRUPTED);
}

pub fn project_header<W: Write>(report: &mut Report<W>, project: &str) {
    report.line(format!("Project is: {project}"));
    report.line("#################################");
}

/// Discovers matching instances and runs `mode` against each of them.
///
/// Only a failure to list the inventory is returned; everything after that
/// is reported inline. An interrupt while listing skips the report.
pub async fn discover_and_report<I, W>(
    matcher: &InstanceMatcher,
    inventory: &I,
    runner: &DiagnosticRunner,
    mode: Mode,
    project: &str,
    report: &mut Report<W>,
) -> Result<(), Error>
where
    I: ComputeInventory + ?Sized,
    W: Write,
{
    report.line("Obtaining instances...");
    let group = match until_cancelled(runner, matcher.discover(inventory, project)).await {
        Some(group) => group?,
        None => {
            interrupted(report);
            return Ok(());
        }
    };
    report_zones(&group, runner, mode, project, report).await;
    summary(report);
    Ok(())
}

pub async fn report_zones<W: Write>(
    group: &ZoneInstanceGroup,
    runner: &DiagnosticRunner,
    mode: Mode,
    project: &str,
    report: &mut Report<W>,
) {
    for (zone, instances) in group.iter().filter(|(_, i)| !i.is_empty()) {
        report.blank();
        report.line(format!("Instances in {zone}"));
        report.line(RULE);

        for instance in instances {
            if runner.is_cancelled() {
                interrupted(report);
                return;
            }
            match mode {
                Mode::Print => print_instance(instance, report),
                Mode::Trace(direction) => {
                    runner
                        .traceroute_instance(instance, project, zone, direction, report)
                        .await
                }
            }
        }
    }
}

pub fn print_instance<W: Write>(instance: &Instance, report: &mut Report<W>) {
    match instance.public_address() {
        Some(address) => report.line(format!("{}: {address}", instance.name)),
        None => report.failure(DiagnosticError::NoPublicAddress {
            name: "Print".into(),
            instance: instance.name.clone(),
        }),
    }
}

pub fn summary<W: Write>(report: &mut Report<W>) {
    match report.failures() {
        0 => {}
        1 => report.line("1 diagnostic failed"),
        n => report.line(format!("{n} diagnostics failed")),
    }
}
