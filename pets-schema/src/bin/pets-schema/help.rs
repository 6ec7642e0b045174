//! Text appended to `--help`: sample invocations and environment variables.

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;

use crate::theme::{Tone, paint};

/// A sample invocation listed under a command's long help.
pub struct Example {
    pub command: &'static str,
    pub note: &'static str,
}

const ENVIRONMENT: &[(&str, &str)] = &[
    ("MONGODB_URI", "MongoDB connection string (default mongodb://localhost:27017)"),
    ("MONGODB_DATABASE", "Target database (default pets_search)"),
    ("RUST_LOG", "Log filter for diagnostic output, e.g. pets_schema=debug"),
];

/// Two aligned columns: left entries padded to the widest one.
fn columns<'a>(rows: impl Iterator<Item = (&'a str, &'a str)> + Clone, color: bool) -> String {
    let width = rows.clone().map(|(left, _)| left.len()).max().unwrap_or(0);
    rows.map(|(left, right)| {
        format!(
            "  {}  {}\n",
            paint(&format!("{left:<width$}"), Tone::Key, false, color),
            paint(right, Tone::Muted, false, color)
        )
    })
    .collect()
}

pub fn examples_section(examples: &[Example], color: bool) -> String {
    let rows = examples.iter().map(|example| (example.command, example.note));
    format!("{}\n{}", paint("Examples:", Tone::Heading, true, color), columns(rows, color))
}

pub fn environment_section(color: bool) -> String {
    format!(
        "{}\n{}\n{}",
        paint("Environment Variables:", Tone::Heading, true, color),
        columns(ENVIRONMENT.iter().copied(), color),
        paint("Run 'pets-schema <command> --help' for examples.", Tone::Muted, false, color)
    )
}

pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightBlue.on_default().bold())
        .usage(AnsiColor::BrightBlue.on_default().bold())
        .literal(AnsiColor::BrightCyan.on_default())
        .placeholder(AnsiColor::BrightBlack.on_default())
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().bold())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[Example] = &[
        Example {
            command: "pets-schema migrate deploy",
            note: "Create everything",
        },
        Example {
            command: "pets-schema migrate status",
            note: "Show history",
        },
        Example {
            command: "pets-schema schema show users",
            note: "One collection",
        },
    ];

    #[test]
    fn example_notes_line_up() {
        let text = examples_section(SAMPLE, false);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Examples:");
        assert_eq!(lines[1], "  pets-schema migrate deploy     Create everything");
        let columns: Vec<usize> = lines[1..]
            .iter()
            .map(|line| line.find(|c: char| c.is_uppercase()).unwrap())
            .collect();
        assert!(columns.iter().all(|&column| column == columns[0]));
    }

    #[test]
    fn environment_lists_connection_overrides() {
        let text = environment_section(false);
        assert!(text.starts_with("Environment Variables:\n"));
        assert!(text.contains("  MONGODB_URI       MongoDB connection string"));
        assert!(text.contains("MONGODB_DATABASE"));
    }
}
