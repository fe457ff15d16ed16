use owo_colors::OwoColorize;

use linkharvest_core::Diagnostics;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!(
        "\n{} {} {}",
        "Linkharvest".bold().bright_blue(),
        "v".dimmed(),
        VERSION.dimmed()
    );
    eprintln!("{}", "Extract every link from a web page\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

fn print_field(label: &str, value: impl std::fmt::Display) {
    eprintln!("  {} {}", format!("{label}:").dimmed(), value.to_string().bright_white());
}

/// Print the diagnostics record for one extraction
pub fn print_diagnostics(diagnostics: &Diagnostics, elapsed: std::time::Duration) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Diagnostics".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());

    if let Some(method) = diagnostics.method {
        print_field("Method", format!("{method:?}"));
    }
    if let Some(status) = diagnostics.status_code {
        print_field("Status", status);
    }
    if let Some(content_type) = &diagnostics.content_type {
        print_field("Content-Type", content_type);
    }
    if let Some(length) = diagnostics.content_length {
        print_field("Size", format_size(length));
    }
    if let Some(final_url) = &diagnostics.final_url {
        let redirected = if diagnostics.redirected == Some(true) { " (redirected)" } else { "" };
        print_field("Final URL", format!("{final_url}{redirected}"));
    }
    if let Some(title) = &diagnostics.page_title {
        print_field("Title", title);
    }
    if let Some(parser) = &diagnostics.parser {
        print_field("Parser", parser);
    }
    if let Some(anchors) = diagnostics.anchor_tags_found {
        print_field("Anchors", anchors);
    }
    if let Some(unique) = diagnostics.unique_links_found {
        print_field("Unique links", unique);
    }
    if let Some(warning) = &diagnostics.page_load_warning {
        print_warning(warning);
    }

    eprintln!(
        "  {} {:>8.2}ms\n",
        "Elapsed:".dimmed(),
        elapsed.as_secs_f64() * 1000.0
    );
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
