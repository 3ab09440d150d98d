//! Event and summary output, as styled text or JSON lines.

use console::style;
use serde_json::json;
use tracing::warn;

use gpstracker::channel::render_event;
use gpstracker::{TrackerStatus, TrackingEvent};

/// Prints tracking events to stdout.
#[derive(Debug, Clone, Copy)]
pub struct EventPrinter {
    json: bool,
}

impl EventPrinter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn print(&self, event: &TrackingEvent) {
        if !self.json {
            println!("{}", format_event(event));
            return;
        }
        match render_event(event) {
            Ok((name, payload)) => println!("{}", json!({ "event": name, "payload": payload })),
            Err(e) => warn!(event = event.name(), error = %e, "Failed to render event"),
        }
    }

    pub fn summary(&self, status: &TrackerStatus) {
        let metrics = &status.metrics;
        if self.json {
            println!("{}", json!({ "event": "summary", "payload": metrics }));
            return;
        }

        println!();
        println!("{}", style("Session summary").bold());
        println!("  Source:      {} ({})", status.source, status.authorization.as_str());
        println!("  Received:    {}", metrics.fixes_received);
        println!(
            "  Accepted:    {} ({:.0}%)",
            metrics.fixes_accepted,
            metrics.acceptance_rate() * 100.0
        );
        println!("  Rejected:    {}", metrics.fixes_rejected);
        println!("  Errors:      {}", metrics.source_errors);
        if let Some(fix) = &status.last_fix {
            println!("  Last fix:    {}", fix);
        }
        if let Some(course) = status.course_deg {
            println!("  Course:      {:.0}°", course);
        }
    }
}

/// One-line human rendering of `event`.
pub fn format_event(event: &TrackingEvent) -> String {
    match event {
        TrackingEvent::FixAccepted(fix) => {
            let speed = fix
                .speed_kmh()
                .map(|kmh| format!("  {:.1} km/h", kmh))
                .unwrap_or_default();
            format!(
                "{} {} {:>10.6}, {:>11.6}  ±{:.0} m{}",
                style("fix  ").green(),
                fix.timestamp().wall().format("%H:%M:%S%.3f"),
                fix.latitude(),
                fix.longitude(),
                fix.horizontal_accuracy_m(),
                speed
            )
        }
        TrackingEvent::StateChanged(state) => {
            format!("{} {}", style("state").cyan(), state)
        }
        TrackingEvent::Error { kind, message } => {
            format!("{} {}: {}", style("error").red().bold(), kind, message)
        }
    }
}
