//! Plain-text batch summary for the terminal.

use std::fmt::Write;

use idforge_workflow::BatchSummary;

use crate::Args;

const RULE: &str = "============================================================";

pub fn render(summary: &BatchSummary, args: &Args) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_summary(&mut out, summary, args);
    out
}

fn write_summary(out: &mut String, summary: &BatchSummary, args: &Args) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "ONBOARDING SUMMARY ({})", summary.run_id)?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Total records processed: {}", summary.total)?;
    writeln!(out, "Onboarded:               {}", summary.onboarded())?;
    if summary.partial > 0 {
        writeln!(out, "  of which partial:      {}", summary.partial)?;
    }
    writeln!(out, "Failed:                  {}", summary.failed)?;
    if summary.unreadable > 0 {
        writeln!(out, "Unreadable rows:         {}", summary.unreadable)?;
    }
    writeln!(out, "Success rate:            {:.1}%", summary.success_rate())?;

    if summary.estimated_minutes_saved > 0 {
        writeln!(
            out,
            "\nEstimated time saved: {} minutes ({:.1} hours)",
            summary.estimated_minutes_saved,
            summary.estimated_minutes_saved as f64 / 60.0
        )?;
    }

    if !summary.errors_by_kind.is_empty() {
        writeln!(out, "\nErrors by kind:")?;
        for (kind, count) in &summary.errors_by_kind {
            writeln!(out, "  - {kind}: {count}")?;
        }
    }

    writeln!(out, "\nOutputs:")?;
    writeln!(out, "  - Credentials: {}", args.credentials_out.display())?;
    writeln!(out, "  - Failures:    {}", args.failures_out.display())?;
    if let Some(report) = &args.report_out {
        writeln!(out, "  - Report:      {}", report.display())?;
    }

    let needs_attention = summary.failed + summary.partial + summary.unreadable;
    if needs_attention > 0 {
        writeln!(
            out,
            "\n{needs_attention} record(s) need attention. Check {} for details.",
            args.failures_out.display()
        )?;
    }
    Ok(())
}
