//! Human-readable rendering of supervisor reports.

use std::io::{self, Write};

use warden_supervisor::{
    BuildOutput, HealthStatus, OperationReport, StatusReport, StepOutcome, StopReport,
    WorkerHandle,
};

pub(crate) fn render_started<W: Write>(out: &mut W, worker: &WorkerHandle) -> io::Result<()> {
    writeln!(
        out,
        "worker started (pid {}) at {} from {}",
        worker.pid(),
        worker.launched_at_rfc3339(),
        worker.artifact().display()
    )
}

pub(crate) fn render_health<W: Write>(out: &mut W, health: &HealthStatus) -> io::Result<()> {
    writeln!(out, "health: {} ({})", health.health(), health.diagnostic())?;
    for warning in health.warnings() {
        writeln!(out, "warning: {warning}")?;
    }
    if let Some(count) = health.completed_units() {
        writeln!(out, "completed: {count}")?;
    }
    Ok(())
}

pub(crate) fn render_status<W: Write>(out: &mut W, status: &StatusReport) -> io::Result<()> {
    render_health(out, &status.health)?;
    if let Some(pid) = status.worker_pid {
        writeln!(out, "pid: {pid}")?;
    }
    writeln!(out, "log: {}", status.log_path.display())?;
    if status.recent_logs.is_empty() {
        return Ok(());
    }
    writeln!(out, "--- last {} lines ---", status.recent_logs.len())?;
    render_lines(out, &status.recent_logs)
}

pub(crate) fn render_lines<W: Write>(out: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

pub(crate) fn render_stop<W: Write>(out: &mut W, report: &StopReport) -> io::Result<()> {
    writeln!(out, "{report}")
}

pub(crate) fn render_build<W: Write>(out: &mut W, output: &BuildOutput) -> io::Result<()> {
    let kind = if output.clean { "clean build" } else { "build" };
    writeln!(
        out,
        "{kind} succeeded in {:.1}s",
        output.elapsed.as_secs_f64()
    )
}

pub(crate) fn render_operation<W: Write>(out: &mut W, report: &OperationReport) -> io::Result<()> {
    writeln!(out, "{}:", report.operation())?;
    for record in report.steps() {
        let marker = match record.outcome {
            StepOutcome::Succeeded(_) => "ok",
            StepOutcome::Partial(_) => "partial",
            StepOutcome::Failed(_) => "failed",
        };
        writeln!(
            out,
            "  [{marker}] {}: {}",
            record.step,
            record.outcome.detail()
        )?;
    }
    if let Some(health) = report.health() {
        render_health(out, health)?;
    }
    Ok(())
}
