//! Statistics display and formatting

use rft::{HashCheck, ReceiveReport, SendReport, TransferStats};
use std::io::Write;
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else if secs > 0 {
        format!("{}s", seconds)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Describe a hash comparison result
pub fn format_hash_check(check: Option<&HashCheck>) -> String {
    match check {
        Some(HashCheck::Passed) => "passed".to_string(),
        Some(HashCheck::Failed { expected, actual }) => {
            format!("FAILED (expected {}, got {})", expected, actual)
        }
        None => "no hash received".to_string(),
    }
}

/// Display the summary of a finished send
pub fn display_send_report(report: &SendReport) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ TRANSFER COMPLETE                                           │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ File:      {}", report.file_name);
    println!(
        "│ Size:      {} in {} chunks",
        format_bytes(report.bytes as u64),
        report.chunks
    );
    println!("│ MD5:       {}", report.digest);
    println!("│ Elapsed:   {}", format_duration(report.elapsed));
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Packets:   {} sent / {} acked / {} retransmitted / {} dropped",
        report.stats.packets_sent,
        report.stats.packets_acked,
        report.stats.packets_retransmitted,
        report.dropped
    );
    println!(
        "│ Window:    cwnd {} / threshold {} / {} timeouts",
        report.congestion.congestion_window, report.congestion.threshold, report.congestion.timeouts
    );
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// Display the summary of a received file
pub fn display_receive_report(report: &ReceiveReport) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ FILE RECEIVED                                               │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ File:      {}", report.file_name);
    println!("│ From:      {}", report.peer);
    println!("│ Saved to:  {}", report.stored_at);
    println!("│ Size:      {}", format_bytes(report.bytes as u64));
    println!(
        "│ MD5 check: {}",
        format_hash_check(report.hash_check.as_ref())
    );
    println!("│ Elapsed:   {}", format_duration(report.elapsed));
    println!(
        "│ Packets:   {} accepted / {} duplicate / {} out of order / {} corrupted",
        report.stats.packets_accepted,
        report.stats.packets_duplicate,
        report.stats.packets_out_of_order,
        report.stats.packets_corrupted + report.stats.packets_malformed
    );
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// Display compact stats on one line (for continuous updates)
pub fn display_compact_stats(stats: &TransferStats, elapsed: Duration) {
    if stats.packets_sent > 0 {
        print!(
            "\r[{:8}] Sent: {} | Acked: {} | Resent: {} | Dropped: {} | cwnd: {}/{}         ",
            format_duration(elapsed),
            stats.packets_sent,
            stats.packets_acked,
            stats.packets_retransmitted,
            stats.packets_dropped,
            stats.congestion_window,
            stats.threshold
        );
    } else {
        print!(
            "\r[{:8}] Accepted: {} | Discarded: {} | Received: {}         ",
            format_duration(elapsed),
            stats.packets_accepted,
            stats.packets_discarded,
            format_bytes(stats.bytes_received)
        );
    }

    let _ = std::io::stdout().flush();
}
