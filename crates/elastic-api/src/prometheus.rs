//! Prometheus text exposition format.
//!
//! Renders the autoscaler status into the Prometheus text exposition
//! format for scraping by a Prometheus server or compatible agent.

use std::fmt::Write;

use elastic_autoscale::{AutoscalerStatus, ScaleDecision};

/// Render an autoscaler status snapshot into Prometheus text format.
///
/// Pool gauges are unlabelled; per-thread load carries `thread` and
/// `thread_id` labels.
pub fn render_prometheus(status: &AutoscalerStatus, running_workers: usize) -> String {
    let mut out = String::new();

    gauge(&mut out, "elastic_live_workers", "Workers in the autoscaler pool.", status.live_workers.len());
    gauge(&mut out, "elastic_running_worker_threads", "Worker threads currently running.", running_workers);
    gauge(&mut out, "elastic_pending_starts", "Worker starts in flight.", status.pending_starts);
    gauge(&mut out, "elastic_min_instances", "Configured pool floor.", status.min_instances);
    gauge(&mut out, "elastic_max_instances", "Configured pool ceiling.", status.max_instances);
    gauge(&mut out, "elastic_grace_counter", "Checking ticks left before scale-down is allowed.", status.grace_counter);

    out.push_str("# HELP elastic_checks_total Checking ticks evaluated.\n");
    out.push_str("# TYPE elastic_checks_total counter\n");
    let _ = writeln!(out, "elastic_checks_total {}", status.checks);

    out.push_str("# HELP elastic_last_decision Last scale decision (1 for the decision taken).\n");
    out.push_str("# TYPE elastic_last_decision gauge\n");
    for (decision, label) in [
        (ScaleDecision::ScaleUp, "scale_up"),
        (ScaleDecision::ScaleDown, "scale_down"),
        (ScaleDecision::Hold, "hold"),
    ] {
        let value = u8::from(status.last_decision == Some(decision));
        let _ = writeln!(out, "elastic_last_decision{{decision=\"{label}\"}} {value}");
    }

    out.push_str("# HELP elastic_thread_load Total CPU load of the latest interval (fraction of wall time).\n");
    out.push_str("# TYPE elastic_thread_load gauge\n");
    for t in &status.threads {
        if let Some(latest) = &t.latest {
            let _ = writeln!(
                out,
                "elastic_thread_load{{thread=\"{}\",thread_id=\"{}\"}} {:.4}",
                latest.thread_name, t.thread_id, latest.total
            );
        }
    }

    out.push_str("# HELP elastic_thread_violations Intervals above the load threshold in the window.\n");
    out.push_str("# TYPE elastic_thread_violations gauge\n");
    for t in &status.threads {
        let _ = writeln!(
            out,
            "elastic_thread_violations{{thread_id=\"{}\"}} {}",
            t.thread_id, t.violations
        );
    }

    out
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}
