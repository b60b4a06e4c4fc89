use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::domain::entities::Alert;
use crate::domain::value_objects::{AlertStatus, Severity};

/// Strips ANSI/OSC escape sequences from a string to prevent terminal injection.
pub(crate) fn sanitize_terminal(input: &str) -> String {
    input.chars().filter(|c| *c != '\x1b').collect()
}

fn severity_badge(severity: Severity) -> String {
    let label = format!(" {severity} ");
    match severity {
        Severity::Critical => format!("{}", label.on_red().white().bold()),
        Severity::Error => format!("{}", label.on_yellow().black().bold()),
        Severity::Warning => format!("{}", label.on_bright_yellow().black()),
        Severity::Info => format!("{}", label.on_blue().white()),
    }
}

fn status_label(status: AlertStatus) -> String {
    match status {
        AlertStatus::Active => format!("{}", status.as_str().red()),
        AlertStatus::Acknowledged => format!("{}", status.as_str().yellow()),
        AlertStatus::Dismissed => format!("{}", status.as_str().dimmed()),
    }
}

/// Human age of an alert relative to `now`, e.g. `5m ago`.
fn age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - timestamp).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

pub fn format_alerts(alerts: &[Alert]) {
    let now = Utc::now();
    for alert in alerts {
        println!();
        println!(
            "{} {}",
            severity_badge(alert.severity),
            sanitize_terminal(&alert.title).bold()
        );
        println!(
            "  {} · {} · {} · {}",
            alert.id.dimmed(),
            alert.category,
            status_label(alert.status),
            age(alert.timestamp, now).dimmed()
        );
        for line in sanitize_terminal(&alert.message).lines() {
            println!("  {}", line.dimmed());
        }
    }
    println!();
}

pub fn print_no_alerts() {
    println!();
    println!("{}", "✅ No alerts".green().bold());
    println!();
}
