use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::engine::{
    BreakdownResult, CheckStayResult, MAX_PRESENCE_DAYS, MaxStayResult, Span, WindowSummary,
    normalize,
};
use crate::profile::ProfileBook;
use crate::trip::Trip;

const BAR_WIDTH: u32 = 31;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    json: bool,
}

impl Renderer {
    pub fn new(cfg: &Config, json: bool) -> anyhow::Result<Self> {
        let color = cfg.get_bool("display.color")?.unwrap_or(true);
        Ok(Self { color, json })
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn print_json<T: Serialize + ?Sized>(&mut self, value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, summary))]
    pub fn print_summary(&mut self, profile: &str, summary: &WindowSummary) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(summary);
        }
        let mut out = io::stdout().lock();

        let used = format!("{}/{}", summary.used, MAX_PRESENCE_DAYS);
        let used = if summary.used > MAX_PRESENCE_DAYS {
            self.paint(&used, "31")
        } else {
            used
        };

        writeln!(out, "profile    {profile}")?;
        writeln!(out, "date       {}", summary.reference)?;
        writeln!(out, "used       {used}")?;
        writeln!(out, "remaining  {}", summary.remaining)?;
        writeln!(out, "present    {}", if summary.present { "yes" } else { "no" })?;
        writeln!(out, "max stay   {}", describe_max_stay(&summary.max_stay))?;
        Ok(())
    }

    /// Lists stored trips as they are. The day total counts overlapping
    /// trips once, and rows that overlap an earlier row are flagged.
    #[tracing::instrument(skip(self, trips))]
    pub fn print_trips(&mut self, trips: &[Trip]) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(trips);
        }
        let mut out = io::stdout().lock();

        let headers = vec![
            "#".to_string(),
            "Entry".to_string(),
            "Exit".to_string(),
            "Days".to_string(),
            "ID".to_string(),
            String::new(),
        ];

        let rows = trips
            .iter()
            .zip(overlap_flags(trips))
            .enumerate()
            .map(|(idx, (trip, overlaps))| {
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    trip.entry_date().to_string(),
                    trip.exit_date().to_string(),
                    trip.days().to_string(),
                    trip.id.clone(),
                    if overlaps {
                        self.paint("overlap", "31")
                    } else {
                        String::new()
                    },
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        writeln!(out, "\n{}", trips_footer(trips))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, result))]
    pub fn print_check(&mut self, candidate: Span, result: &CheckStayResult) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(result);
        }
        let mut out = io::stdout().lock();

        writeln!(out, "trip       {} ({} days)", candidate, candidate.days())?;
        match result.violation_date {
            None => writeln!(out, "verdict    {}", self.paint("allowed", "32"))?,
            Some(day) => {
                writeln!(out, "verdict    {}", self.paint("over the limit", "31"))?;
                writeln!(out, "first day  {day}")?;
            }
        }
        writeln!(out, "on exit    {}/{}", result.used_on_exit, MAX_PRESENCE_DAYS)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, result))]
    pub fn print_max_stay(&mut self, result: &MaxStayResult) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(result);
        }
        let mut out = io::stdout().lock();
        writeln!(out, "{}", describe_max_stay(result))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, result))]
    pub fn print_breakdown(&mut self, result: &BreakdownResult) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(result);
        }
        let mut out = io::stdout().lock();

        writeln!(out, "window {}", result.window)?;
        let headers = vec!["Month".to_string(), "Days".to_string(), String::new()];
        let rows = result
            .monthly
            .iter()
            .map(|month| {
                let bar = "#".repeat(month.days.min(BAR_WIDTH) as usize);
                vec![month.label(), month.days.to_string(), self.paint(&bar, "36")]
            })
            .collect();
        write_table(&mut out, headers, rows)?;

        let total: u32 = result.monthly.iter().map(|month| month.days).sum();
        writeln!(out, "\ntotal {total}/{MAX_PRESENCE_DAYS}")?;

        if result.violations.is_empty() {
            writeln!(out, "no days over the limit")?;
        } else {
            let days = result
                .violations
                .iter()
                .map(|day| day.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(
                out,
                "{} day(s) over the limit: {}",
                result.violations.len(),
                self.paint(&days, "31")
            )?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, book))]
    pub fn print_profiles(&mut self, book: &ProfileBook) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(book.profiles());
        }
        let mut out = io::stdout().lock();

        let headers = vec![
            String::new(),
            "Name".to_string(),
            "Trips".to_string(),
            "Days".to_string(),
            "ID".to_string(),
        ];
        let rows = book
            .profiles()
            .iter()
            .map(|profile| {
                let marker = if book.is_active(profile) {
                    self.paint("*", "32")
                } else {
                    String::new()
                };
                let days = normalize(&profile.trips).total_days();
                vec![
                    marker,
                    profile.name.clone(),
                    profile.trips.len().to_string(),
                    days.to_string(),
                    profile.id.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_config(&mut self, cfg: &Config) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if let Some(path) = &cfg.loaded_file {
            writeln!(out, "# {}", path.display())?;
        }
        for (key, value) in cfg.iter() {
            writeln!(out, "{key}={value}")?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || text.is_empty() || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Marks each trip that starts on or before the latest exit seen so far.
/// Expects trips sorted by entry date.
fn overlap_flags(trips: &[Trip]) -> Vec<bool> {
    let mut reach: Option<NaiveDate> = None;
    trips
        .iter()
        .map(|trip| {
            let overlaps = reach.is_some_and(|end| trip.entry_date() <= end);
            reach = reach.max(Some(trip.exit_date()));
            overlaps
        })
        .collect()
}

fn trips_footer(trips: &[Trip]) -> String {
    format!("{} trip(s), {} day(s)", trips.len(), normalize(trips).total_days())
}

fn describe_max_stay(result: &MaxStayResult) -> String {
    match result.until {
        Some(until) => format!("{} day(s), until {}", result.max_days, until),
        None => "0 days; no room left in the window".to_string(),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
