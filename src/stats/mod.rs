use crate::refill::next_request;
use crate::registry::ApplicationFile;
use crate::units::format_from_bytes;
use chrono::{DateTime, Utc};
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Program-wide statistics over a registry snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    /// When this snapshot was taken
    pub generated_at: DateTime<Utc>,

    /// Applications included in the aggregates
    pub total_applications: usize,

    /// Byte total of all requested entitlements
    pub total_requested_bytes: u64,

    /// Byte total of all granted tranches
    pub total_granted_bytes: u64,

    /// Statistics grouped by lifecycle state
    pub by_state: HashMap<String, StateStats>,

    /// Applicants ordered by requested entitlement, largest first
    pub top_applicants: Vec<ApplicantStats>,

    /// Refill pipeline summary
    pub refills: RefillSummary,

    /// Staleness split at the configured threshold
    pub staleness: StalenessStats,

    /// Records whose capacity fields failed to parse (excluded above)
    pub invalid_records: Vec<String>,
}

/// Statistics for a single lifecycle state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateStats {
    pub count: usize,
    pub requested_bytes: u64,
    pub granted_bytes: u64,
}

/// Per-applicant roll-up for the top list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantStats {
    /// Applicant display name
    pub name: String,

    /// Record path inside the registry
    pub path: String,

    pub requested_bytes: u64,
    pub granted_bytes: u64,

    /// Tranches recorded so far
    pub request_count: usize,

    /// Suggested next request, zero sentinel included (e.g. `0GiB`)
    pub suggested_next: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefillSummary {
    /// Applications with a nonzero suggested next request
    pub due_count: usize,

    /// Byte total of those suggestions
    pub due_bytes: u64,

    /// Applications whose cumulative grants met their entitlement
    pub exhausted_count: usize,
}

/// Counts and byte totals split by update recency: (count, requested_bytes)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StalenessStats {
    pub stale_days: i64,
    pub fresh: (usize, u64),
    pub stale: (usize, u64),
    pub unknown: (usize, u64),
}

impl Statistics {
    /// Aggregate a registry snapshot. Records with malformed capacity fields
    /// are listed in `invalid_records` and excluded from every other number.
    pub fn from_applications(applications: &[ApplicationFile], stale_days: i64) -> Self {
        let mut stats = Self {
            generated_at: Utc::now(),
            total_applications: 0,
            total_requested_bytes: 0,
            total_granted_bytes: 0,
            by_state: HashMap::new(),
            top_applicants: Vec::new(),
            refills: RefillSummary::default(),
            staleness: StalenessStats {
                stale_days,
                ..Default::default()
            },
            invalid_records: Vec::new(),
        };

        for file in applications {
            let app = &file.application;

            let (requested, granted, suggested) = match (
                app.total_requested_bytes(),
                app.total_granted_bytes(),
                next_request(app),
            ) {
                (Ok(requested), Ok(granted), Ok(suggested)) => {
                    (requested, granted, suggested)
                }
                _ => {
                    stats.invalid_records.push(file.path.display().to_string());
                    continue;
                }
            };

            stats.total_applications += 1;
            stats.total_requested_bytes = stats.total_requested_bytes.saturating_add(requested);
            stats.total_granted_bytes = stats.total_granted_bytes.saturating_add(granted);

            let entry = stats
                .by_state
                .entry(app.lifecycle.state.as_str().to_string())
                .or_default();
            entry.count += 1;
            entry.requested_bytes = entry.requested_bytes.saturating_add(requested);
            entry.granted_bytes = entry.granted_bytes.saturating_add(granted);

            if !suggested.is_zero() {
                stats.refills.due_count += 1;
                stats.refills.due_bytes = stats
                    .refills
                    .due_bytes
                    .saturating_add(suggested.bytes().unwrap_or(0));
            }
            if granted >= requested {
                stats.refills.exhausted_count += 1;
            }

            let bucket = match app.days_since_update() {
                Some(days) if days >= stale_days => &mut stats.staleness.stale,
                Some(_) => &mut stats.staleness.fresh,
                None => &mut stats.staleness.unknown,
            };
            bucket.0 += 1;
            bucket.1 = bucket.1.saturating_add(requested);

            stats.top_applicants.push(ApplicantStats {
                name: file.label(),
                path: file.path.display().to_string(),
                requested_bytes: requested,
                granted_bytes: granted,
                request_count: app.request_count(),
                suggested_next: suggested.to_string(),
            });
        }

        stats
            .top_applicants
            .sort_by(|a, b| b.requested_bytes.cmp(&a.requested_bytes));

        stats
    }

    /// Display statistics to terminal with formatted tables
    pub fn display_terminal(&self, top_n: usize) {
        println!("\n{}", "Datacap Program Statistics".bright_cyan().bold());
        println!("{}", "=".repeat(80).bright_black());

        self.display_overview();
        self.display_by_state();
        self.display_top_applicants(top_n);
        self.display_refills();
        self.display_staleness();

        if !self.invalid_records.is_empty() {
            println!(
                "\n{} {} records with malformed capacity fields:",
                "!".red().bold(),
                self.invalid_records.len().to_string().red()
            );
            for path in &self.invalid_records {
                println!("  {}", path.red());
            }
        }

        println!();
    }

    fn display_overview(&self) {
        println!("\n{}", "Overview".bright_green().bold());
        println!(
            "  Applications: {}",
            self.total_applications.to_string().bright_white()
        );
        println!(
            "  Requested: {}",
            format_from_bytes(self.total_requested_bytes, true).bright_yellow()
        );
        println!(
            "  Granted: {}",
            format_from_bytes(self.total_granted_bytes, true).bright_yellow()
        );
    }

    fn display_by_state(&self) {
        println!("\n{}", "By Lifecycle State".bright_green().bold());

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(Row::new(vec![
            Cell::new("State"),
            Cell::new("Count"),
            Cell::new("Requested"),
            Cell::new("Granted"),
        ]));

        let mut states: Vec<_> = self.by_state.iter().collect();
        states.sort_by(|a, b| b.1.requested_bytes.cmp(&a.1.requested_bytes));

        for (state, stats) in states {
            table.add_row(Row::new(vec![
                Cell::new(state),
                Cell::new(&stats.count.to_string()),
                Cell::new(&format_from_bytes(stats.requested_bytes, true)),
                Cell::new(&format_from_bytes(stats.granted_bytes, true)),
            ]));
        }

        table.printstd();
    }

    fn display_top_applicants(&self, top_n: usize) {
        println!(
            "\n{}",
            format!("Top {} Applicants", top_n).bright_green().bold()
        );

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(Row::new(vec![
            Cell::new("#"),
            Cell::new("Applicant"),
            Cell::new("Requested"),
            Cell::new("Granted"),
            Cell::new("Tranches"),
            Cell::new("Next"),
        ]));

        for (i, applicant) in self.top_applicants.iter().take(top_n).enumerate() {
            table.add_row(Row::new(vec![
                Cell::new(&(i + 1).to_string()),
                Cell::new(&applicant.name),
                Cell::new(&format_from_bytes(applicant.requested_bytes, true)),
                Cell::new(&format_from_bytes(applicant.granted_bytes, true)),
                Cell::new(&applicant.request_count.to_string()),
                Cell::new(&applicant.suggested_next),
            ]));
        }

        table.printstd();
    }

    fn display_refills(&self) {
        println!("\n{}", "Refills".bright_green().bold());
        println!(
            "  Due: {} applications, {}",
            self.refills.due_count.to_string().bright_white(),
            format_from_bytes(self.refills.due_bytes, true).bright_yellow()
        );
        println!(
            "  Total datacap reached: {}",
            self.refills.exhausted_count.to_string().bright_white()
        );
    }

    fn display_staleness(&self) {
        println!("\n{}", "Activity".bright_green().bold());

        let (fresh_count, fresh_bytes) = self.staleness.fresh;
        let (stale_count, stale_bytes) = self.staleness.stale;
        let (unknown_count, unknown_bytes) = self.staleness.unknown;

        println!(
            "  Updated within {}d: {} applications, {}",
            self.staleness.stale_days,
            fresh_count,
            format_from_bytes(fresh_bytes, true).bright_white()
        );
        println!(
            "  Stale: {} applications, {}",
            stale_count,
            format_from_bytes(stale_bytes, true).bright_white()
        );
        if unknown_count > 0 {
            println!(
                "  Unknown update time: {} applications, {}",
                unknown_count,
                format_from_bytes(unknown_bytes, true).bright_white()
            );
        }
    }

    /// Export statistics as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Application;
    use crate::test_fixtures::application_json;
    use std::path::PathBuf;

    fn file(name: &str, total: &str, weekly: &str) -> ApplicationFile {
        let application: Application =
            serde_json::from_str(&application_json(name, total, weekly)).unwrap();
        ApplicationFile {
            path: PathBuf::from(format!("/registry/{name}.json")),
            application,
        }
    }

    #[test]
    fn aggregates_registry_snapshot() {
        let applications = vec![
            file("Alpha", "10PiB", "1PiB"),
            file("Beta", "5PiB", "500TiB"),
        ];

        let stats = Statistics::from_applications(&applications, 90);

        assert_eq!(stats.total_applications, 2);
        assert_eq!(stats.total_requested_bytes, 15 * (1u64 << 50));
        // Each fixture has one granted 512GiB tranche.
        assert_eq!(stats.total_granted_bytes, 2 * 512 * (1u64 << 30));
        assert_eq!(stats.by_state.get("Granted").unwrap().count, 2);
        assert_eq!(stats.top_applicants[0].name, "Alpha");
        assert_eq!(stats.refills.due_count, 2);
        assert!(stats.invalid_records.is_empty());
    }

    #[test]
    fn malformed_records_are_isolated() {
        let good = file("Alpha", "10PiB", "1PiB");
        let bad = file("Broken", "10QiB", "1PiB");

        let stats = Statistics::from_applications(&[good, bad], 90);

        assert_eq!(stats.total_applications, 1);
        assert_eq!(stats.invalid_records.len(), 1);
        assert!(stats.invalid_records[0].contains("Broken"));
    }

    #[test]
    fn exhausted_applications_are_counted() {
        // Entitlement 512GiB, already fully granted by the fixture tranche.
        let app = file("Done", "512GiB", "100GiB");
        let stats = Statistics::from_applications(&[app], 90);

        assert_eq!(stats.refills.exhausted_count, 1);
        assert_eq!(stats.refills.due_count, 0);
    }
}
