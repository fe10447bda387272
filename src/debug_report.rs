use ansi::Role;
use ensemble::{EnsembleReport, PartKind, PartReport};

mod ansi {
    const RESET: &str = "\x1b[0m";

    /// What a painted fragment is, rather than which color it gets.
    #[derive(Debug, Clone, Copy)]
    pub enum Role {
        Title,
        Section,
        Label,
        PartName,
        Count,
        Namespace,
        Native,
        Procedure,
        Ensemble,
    }

    impl Role {
        fn code(self) -> &'static str {
            match self {
                Role::Title => "\x1b[1;36m",
                Role::Section => "\x1b[90m",
                Role::Label => "\x1b[2m",
                Role::PartName => "\x1b[1m",
                Role::Count => "\x1b[33m",
                Role::Namespace | Role::Procedure => "\x1b[34m",
                Role::Native => "\x1b[32m",
                Role::Ensemble => "\x1b[36m",
            }
        }
    }

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, role: Role) -> String {
            if self.enabled { format!("{}{}{RESET}", role.code(), s.as_ref()) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_ensembles(reports: &[EnsembleReport], color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.paint(format!("⚙  Ensembles ({})", reports.len()), Role::Title));

    if reports.is_empty() {
        println!("{}", palette.paint("  No ensembles defined", Role::Label));
        println!();
        return;
    }

    for report in reports {
        println!("\n{}", palette.paint(format!("━━━ {} ━━━", report.name), Role::Section));
        print_ensemble(report, 1, &palette);
    }
    println!();
}

fn print_ensemble(report: &EnsembleReport, depth: usize, palette: &ansi::Palette) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}{} {}  {} {}",
        palette.paint("id:", Role::Label),
        palette.paint(report.id.to_string(), Role::Count),
        palette.paint("│ namespace:", Role::Label),
        palette.paint(&report.namespace, Role::Namespace),
    );

    if report.parts.is_empty() {
        println!("{indent}{}", palette.paint("(no parts)", Role::Label));
        return;
    }

    let width = report.parts.iter().map(|part| part.name.chars().count()).max().unwrap_or(0);
    for part in &report.parts {
        print_part(part, width, depth, palette);
        if let PartKind::Ensemble(nested) = &part.kind {
            print_ensemble(nested, depth + 2, palette);
        }
    }
}

fn print_part(part: &PartReport, width: usize, depth: usize, palette: &ansi::Palette) {
    let indent = "  ".repeat(depth);
    let kind = match part.kind {
        PartKind::Native => palette.paint("native", Role::Native),
        PartKind::Procedure => palette.paint("proc", Role::Procedure),
        PartKind::Ensemble(_) => palette.paint("ensemble", Role::Ensemble),
    };
    println!(
        "{indent}{} {}  {} {}  {}",
        palette.paint(format!("{:<width$}", part.name), Role::PartName),
        palette.paint(format!("[{}]", part.min_chars), Role::Count),
        palette.paint("│", Role::Label),
        kind,
        palette.paint(&part.usage, Role::Label),
    );
}

#[cfg(test)]
mod tests {
    use super::ansi::{Palette, Role};

    #[test]
    fn palette_only_adds_escapes_when_enabled() {
        assert_eq!(Palette::new(false).paint("go", Role::PartName), "go");
        assert_eq!(Palette::new(true).paint("go", Role::Count), "\x1b[33mgo\x1b[0m");
    }
}
