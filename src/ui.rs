use colored::Colorize;
use declarative::{OperationResult, OperationStatus};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print one operation outcome
pub fn operation(result: &OperationResult) {
    let icon = match result.status {
        OperationStatus::Failed => "✗".red(),
        OperationStatus::Skipped => "○".dimmed(),
        status if status.is_planned() => "→".cyan(),
        _ => "✓".green(),
    };
    let mut note = result.status.to_string();
    if result.already_managed {
        note.push_str(", already managed");
    }
    println!("  {} {} {}", icon, result.key(), format!("({note})").dimmed());
    if let Some(err) = &result.error {
        for line in err.lines() {
            println!("      {}", line.dimmed());
        }
    }
}

/// Pluralize a count: `1 package`, `2 packages`
pub fn count(n: usize, singular: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {singular}s")
    }
}

// ============================================================================
// Tests
// ============================================================================
