use colored::*;
use jiff::civil::{Date, Time};

use crate::{
    models::{
        job::{Job, JobStatus},
        store::Store,
    },
    scheduling::conflicts::Conflict,
    services::board::Lane,
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

pub fn get_status_glyph(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Scheduled => "○".normal(),
        JobStatus::InProgress => "◐".yellow(),
        JobStatus::Completed => "✓".dimmed(),
        JobStatus::Cancelled => "✗".dimmed(),
    }
}

fn format_time(time: Time) -> String {
    time.strftime("%H:%M").to_string()
}

/// "09:00–10:30", or a dash for unscheduled jobs
pub fn format_window(job: &Job) -> String {
    match (job.start_time, job.end_time) {
        (Some(start), Some(end)) => format!("{}–{}", format_time(start), format_time(end)),
        _ => String::from("  --:--    "),
    }
}

/// Technician name for the right-hand side of a job line
fn get_job_context(job: &Job, store: &Store) -> Option<String> {
    let technician = store.get_technician(job.technician_id?)?;
    if technician.active {
        Some(technician.name.clone())
    } else {
        Some(format!("{} (inactive)", technician.name))
    }
}

/// Render a single job line with number, glyph, window, customer and
/// right-aligned technician.
pub fn render_job_line(job: &Job, store: &Store) {
    let terminal_width = get_terminal_width();

    let left_section = format!(
        "  {:>3}  {}  {}  {}",
        job.job_number,
        get_status_glyph(job.status),
        format_window(job),
        job.customer_name
    );
    let styled_left = if job.is_terminal() {
        left_section.dimmed()
    } else {
        left_section.bold()
    };

    let right_section = get_job_context(job, store).unwrap_or_else(|| String::from("unassigned"));
    // Glyph counts as one column; the styled string carries escape codes.
    let left_visible_len = format!(
        "  {:>3}  {}  {}  {}",
        job.job_number,
        " ",
        format_window(job),
        job.customer_name
    )
    .chars()
    .count();
    let right_visible_len = right_section.chars().count();
    let total_content = left_visible_len + right_visible_len;

    if total_content + 4 < terminal_width {
        let padding = terminal_width - total_content - 2;
        println!("{}{}{}", styled_left, " ".repeat(padding), right_section.dimmed());
    } else {
        println!("{}", styled_left);
    }

    if !job.description.is_empty() {
        println!("         {}", job.description.dimmed());
    }
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize) {
    let job_word = if count == 1 { "job" } else { "jobs" };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, job_word);
}

/// Render a section header (e.g., "North · Morning")
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

pub fn render_board(lanes: &[Lane], store: &Store, date: Date) {
    let total: usize = lanes
        .iter()
        .flat_map(|lane| &lane.columns)
        .map(|column| column.jobs.len())
        .sum();
    if total == 0 {
        println!("No jobs on {}", format_date_header(date));
        return;
    }

    render_view_header(&format!("Board · {}", format_date_header(date)), total);
    for lane in lanes {
        let zone = lane.zone.as_deref().unwrap_or("No zone");
        for column in lane.columns.iter().filter(|c| !c.jobs.is_empty()) {
            render_section_header(&format!("{} · {}", zone, column.bucket.label()));
            for job in &column.jobs {
                render_job_line(job, store);
            }
        }
    }
}

pub fn render_conflicts(conflicts: &[Conflict]) {
    eprintln!(
        "\n  {} ({})\n",
        "Conflicting bookings".red().bold(),
        conflicts.len()
    );
    for conflict in conflicts {
        eprintln!(
            "  {:>3}  {}–{}  {}  {}",
            conflict.job_number,
            format_time(conflict.start.time()),
            format_time(conflict.end.time()),
            conflict.customer_name,
            format!("[{}]", conflict.status).dimmed()
        );
    }
    eprintln!("\nRe-run with --force to book it anyway.");
}

/// Format a date as a human-readable header (e.g., "Tomorrow", "Monday, Feb 17")
pub fn format_date_header(date: Date) -> String {
    let today = jiff::Zoned::now().date();

    if date == today {
        "Today".to_string()
    } else if today.tomorrow().is_ok_and(|tomorrow| tomorrow == date) {
        "Tomorrow".to_string()
    } else {
        date.strftime("%A, %b %d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::{date, time};

    #[test]
    fn test_format_window() {
        let job = Job {
            start_time: Some(time(9, 0, 0, 0)),
            end_time: Some(time(10, 30, 0, 0)),
            ..Job::default()
        };
        assert_eq!(format_window(&job), "09:00–10:30");
        assert_eq!(format_window(&Job::default()).trim(), "--:--");
    }

    #[test]
    fn test_format_date_header_far_date() {
        assert_eq!(format_date_header(date(2020, 2, 17)), "Monday, Feb 17");
    }
}
