use colored::{ColoredString, Colorize};

use super::alert_fmt::sanitize_terminal;
use crate::domain::entities::HealthSnapshot;
use crate::presentation::handlers::StatusReport;

#[must_use]
pub fn progress_bar(value: f64, width: usize) -> String {
    let ratio = (value / 100.0).clamp(0.0, 1.0);
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    let bar_filled = "█".repeat(filled);
    let bar_empty = "░".repeat(empty);

    let colored_bar = if value >= 90.0 {
        bar_filled.red().bold()
    } else if value >= 70.0 {
        bar_filled.yellow()
    } else {
        bar_filled.green()
    };

    format!("{colored_bar}{bar_empty}")
}

#[must_use]
pub fn colorize_percent(value: f64) -> ColoredString {
    let text = format!("{value:.1}%");
    if value >= 90.0 {
        text.red().bold()
    } else if value >= 70.0 {
        text.yellow()
    } else {
        text.green()
    }
}

pub fn print_section_header(title: &str) {
    println!("{}", title.bold().cyan());
    let display_width = title.chars().count();
    println!("{}", "─".repeat(display_width).cyan());
}

/// Render a duration in seconds as `2d 3h 4m`, dropping leading zero units.
#[must_use]
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}

pub fn print_health(snapshot: &HealthSnapshot) {
    print_section_header("\n🖥️  CPU");
    println!(
        "  {} {}",
        progress_bar(snapshot.cpu_usage_percent, 30),
        colorize_percent(snapshot.cpu_usage_percent)
    );

    print_section_header("\n💾 Memory");
    println!(
        "  {} {}",
        progress_bar(snapshot.memory_usage_percent, 30),
        colorize_percent(snapshot.memory_usage_percent)
    );
    println!(
        "  Used: {:.0} MB / {:.0} MB",
        snapshot.memory_used_mb, snapshot.memory_total_mb
    );

    print_section_header("\n💿 Disk");
    println!(
        "  {} {}",
        progress_bar(snapshot.disk_usage_percent, 30),
        colorize_percent(snapshot.disk_usage_percent)
    );
    println!(
        "  Used: {:.1} GB / {:.1} GB",
        snapshot.disk_used_gb, snapshot.disk_total_gb
    );

    print_section_header("\n📦 Updates");
    let security = if snapshot.security_updates > 0 {
        format!("{} security", snapshot.security_updates).red().bold()
    } else {
        "0 security".green()
    };
    println!("  {} pending, {security}", snapshot.pending_updates);

    print_section_header("\n⚙️  Services");
    if snapshot.failed_services.is_empty() {
        println!("  {}", "no failed units".green());
    } else {
        for unit in &snapshot.failed_services {
            println!("  {} {}", "✗".red().bold(), sanitize_terminal(unit));
        }
    }

    println!();
    println!(
        "  Sampled at {}",
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
    );
}

pub fn print_status(report: &StatusReport) {
    println!(
        "{}",
        format!("{} {} — daemon status", report.name, report.version)
            .bold()
            .cyan()
    );
    println!("{}", "━".repeat(50));

    let state = if report.running {
        "running".green().bold()
    } else {
        "stopped".red().bold()
    };
    println!("  Monitor:     {state}");
    println!("  Uptime:      {}", format_uptime(report.uptime_secs));
    println!("  Interval:    {}s", report.check_interval_secs);
    println!(
        "  LLM backend: {} ({} pending)",
        report.llm_backend, report.enrichment_pending
    );

    let critical = if report.critical_alerts > 0 {
        report.critical_alerts.to_string().red().bold()
    } else {
        report.critical_alerts.to_string().green()
    };
    println!(
        "  Alerts:      {} active, {critical} critical",
        report.active_alerts
    );

    print_health(&report.health);
}
