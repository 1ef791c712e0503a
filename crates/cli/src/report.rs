//! Cargo-style status output for runsync
//!
//! ```text
//!      Synced 2 runs (1 final, 1 incremental), 4 already done in 3.21s
//!    Finished 1 synced, 1 failed, 4 already done in 2h 0m
//! ```

use std::io::Write as _;
use std::time::{Duration, Instant};

use runsync_core::Run;
use runsync_transport::ScanReport;

/// Status verbs (right-aligned to 12 chars)
struct Status;

impl Status {
    const SYNCED: &str = "Synced";
    const FINISHED: &str = "Finished";
    const SEEDED: &str = "Seeded";
    const DONE: &str = "Done";
    const READY: &str = "Ready";
    const RUNNING: &str = "Running";
}

fn print_status(status: &str, style: &console::Style, message: &str) {
    let mut term = console::Term::stderr();
    let _ = writeln!(term, "{:>12} {}", style.apply_to(status), message);
}

fn green() -> console::Style {
    console::Style::new().green().bold()
}

fn yellow() -> console::Style {
    console::Style::new().yellow().bold()
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// Summary line for one scan pass
pub fn scan_summary(report: &ScanReport, started: Instant) {
    let elapsed = format_elapsed(started.elapsed());
    let synced = report.finalized + report.incremental;

    if report.failed == 0 {
        print_status(
            Status::SYNCED,
            &green(),
            &format!(
                "{synced} runs ({} final, {} incremental), {} already done in {elapsed}",
                report.finalized, report.incremental, report.already_synced
            ),
        );
    } else {
        print_status(
            Status::FINISHED,
            &yellow(),
            &format!(
                "{synced} synced, {} failed, {} already done in {elapsed}",
                report.failed, report.already_synced
            ),
        );
    }
}

/// Summary line for marker seeding
pub fn seeded(count: usize) {
    print_status(Status::SEEDED, &green(), &format!("{count} runs marked as synced"));
}

/// One line per run describing what the next scan would do with it
pub fn run_status(runs: &[Run], stale_after: Duration) {
    for run in runs {
        let (status, style, detail) = if run.is_synced() {
            (Status::DONE, green(), "already synced".to_string())
        } else if let Some(signal) = run.completion_signal(stale_after) {
            (Status::READY, green(), format!("final sync pending ({signal})"))
        } else {
            (Status::RUNNING, yellow(), "incremental sync".to_string())
        };
        print_status(status, &style, &format!("{} {detail}", run.name()));
    }
}
