use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::{ProfileRepository, export_profile, import_profile};
use crate::date::{parse_date_expr, today_in};
use crate::engine::{
    self, Span, add_range, breakdown, check_stay, extend_exit, max_safe_stay, remove_range,
    summary, toggle_presence,
};
use crate::profile::{Profile, ProfileBook};
use crate::render::Renderer;
use crate::trip::Trip;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "status",
        "trips",
        "check",
        "max",
        "extend",
        "breakdown",
        "toggle",
        "add",
        "remove",
        "profiles",
        "profile",
        "export",
        "import",
        "config",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// What a single run operates on.
pub struct Session<'a> {
    pub repo: &'a dyn ProfileRepository,
    pub cfg: &'a Config,
    /// One-shot profile selection; `None` means the active profile.
    pub profile: Option<&'a str>,
    pub today: NaiveDate,
}

impl<'a> Session<'a> {
    pub fn new(repo: &'a dyn ProfileRepository, cfg: &'a Config, profile: Option<&'a str>) -> Self {
        let tz = cfg.timezone();
        Self {
            repo,
            cfg,
            profile,
            today: today_in(tz.as_ref()),
        }
    }

    fn selected<'b>(&self, book: &'b ProfileBook) -> anyhow::Result<&'b Profile> {
        match self.profile {
            Some(selector) => book
                .find(selector)
                .ok_or_else(|| anyhow!("no profile named or identified by `{selector}`")),
            None => Ok(book.active()),
        }
    }

    fn selected_mut<'b>(&self, book: &'b mut ProfileBook) -> anyhow::Result<&'b mut Profile> {
        match self.profile {
            Some(selector) => book
                .find_mut(selector)
                .ok_or_else(|| anyhow!("no profile named or identified by `{selector}`")),
            None => Ok(book.active_mut()),
        }
    }

    fn date_arg(&self, raw: &str) -> anyhow::Result<NaiveDate> {
        Ok(parse_date_expr(raw, self.today)?)
    }

    fn date_arg_or_today(&self, raw: Option<&String>) -> anyhow::Result<NaiveDate> {
        raw.map_or(Ok(self.today), |raw| self.date_arg(raw))
    }
}

#[instrument(skip(session, renderer, inv), fields(command = %inv.command))]
pub fn dispatch(session: &Session<'_>, renderer: &mut Renderer, inv: Invocation) -> anyhow::Result<()> {
    let args = inv.command_args.as_slice();
    debug!(args = ?args, today = %session.today, "dispatching command");

    match inv.command.as_str() {
        "status" => cmd_status(session, renderer, args),
        "trips" => cmd_trips(session, renderer, args),
        "check" => cmd_check(session, renderer, args),
        "max" => cmd_max(session, renderer, args),
        "extend" => cmd_extend(session, renderer, args),
        "breakdown" => cmd_breakdown(session, renderer, args),
        "toggle" => cmd_toggle(session, renderer, args),
        "add" => cmd_add(session, renderer, args),
        "remove" => cmd_remove(session, renderer, args),
        "profiles" => cmd_profiles(session, renderer, args),
        "profile" => cmd_profile(session, renderer, args),
        "export" => cmd_export(session, args),
        "import" => cmd_import(session, args),
        "config" => {
            expect_args(args, 0, 0, "config")?;
            renderer.print_config(session.cfg)
        }
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn expect_args(args: &[String], min: usize, max: usize, usage: &str) -> anyhow::Result<()> {
    if args.len() < min || args.len() > max {
        return Err(anyhow!("usage: roam {usage}"));
    }
    Ok(())
}

#[instrument(skip(session, renderer, args))]
fn cmd_status(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 0, 1, "status [DATE]")?;
    let reference = session.date_arg_or_today(args.first())?;

    let book = session.repo.load()?;
    let profile = session.selected(&book)?;
    let result = summary(&profile.trips, reference);
    info!(profile = %profile.name, used = result.used, "computed status");
    renderer.print_summary(&profile.name, &result)
}

#[instrument(skip(session, renderer, args))]
fn cmd_trips(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 0, 0, "trips")?;
    let book = session.repo.load()?;
    let profile = session.selected(&book)?;

    let mut trips = profile.trips.clone();
    trips.sort_by_key(|trip| (trip.entry_date(), trip.exit_date()));
    renderer.print_trips(&trips)
}

#[instrument(skip(session, renderer, args))]
fn cmd_check(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 2, 2, "check ENTRY EXIT")?;
    let candidate = Span::new(session.date_arg(&args[0])?, session.date_arg(&args[1])?)?;

    let book = session.repo.load()?;
    let profile = session.selected(&book)?;
    let result = check_stay(&profile.trips, candidate);
    info!(candidate = %candidate, allowed = result.allowed, "checked stay");
    renderer.print_check(candidate, &result)
}

#[instrument(skip(session, renderer, args))]
fn cmd_max(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 0, 1, "max [ENTRY]")?;
    let entry = session.date_arg_or_today(args.first())?;

    let book = session.repo.load()?;
    let profile = session.selected(&book)?;
    let result = max_safe_stay(&profile.trips, entry);
    renderer.print_max_stay(&result)
}

#[instrument(skip(session, renderer, args))]
fn cmd_extend(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 2, 3, "extend ENTRY [EXIT] DAYS")?;
    let entry = session.date_arg(&args[0])?;
    let (exit, days) = match args {
        [_, exit, days] => (Some(session.date_arg(exit)?), days),
        [_, days] => (None, days),
        _ => return Err(anyhow!("usage: roam extend ENTRY [EXIT] DAYS")),
    };
    let days: u32 = days
        .trim_start_matches('+')
        .parse()
        .with_context(|| format!("invalid day count: {days}"))?;

    let candidate = extend_exit(entry, exit, days)?;
    debug!(candidate = %candidate, "extended planned trip");

    let book = session.repo.load()?;
    let profile = session.selected(&book)?;
    let result = check_stay(&profile.trips, candidate);
    renderer.print_check(candidate, &result)
}

#[instrument(skip(session, renderer, args))]
fn cmd_breakdown(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 0, 1, "breakdown [DATE]")?;
    let reference = session.date_arg_or_today(args.first())?;

    let book = session.repo.load()?;
    let profile = session.selected(&book)?;
    let result = breakdown(&profile.trips, reference);
    renderer.print_breakdown(&result)
}

/// Loads the book, swaps the selected profile's trips for `edit`'s output
/// and saves it back.
fn edit_trips<F>(session: &Session<'_>, renderer: &mut Renderer, edit: F) -> anyhow::Result<()>
where
    F: FnOnce(&[Trip]) -> Vec<Trip>,
{
    let mut book = session.repo.load()?;
    let profile = session.selected_mut(&mut book)?;
    let before = profile.trips.len();
    profile.trips = edit(&profile.trips);

    info!(
        profile = %profile.name,
        before,
        after = profile.trips.len(),
        "replaced trip list"
    );

    let trips = profile.trips.clone();
    session.repo.save(&book)?;

    if renderer.is_json() {
        renderer.print_json(&trips)
    } else {
        let days = engine::normalize(&trips).total_days();
        println!("{} trip(s), {} presence day(s).", trips.len(), days);
        Ok(())
    }
}

#[instrument(skip(session, renderer, args))]
fn cmd_toggle(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 1, 1, "toggle DATE")?;
    let date = session.date_arg(&args[0])?;
    edit_trips(session, renderer, |trips| toggle_presence(trips, date))
}

#[instrument(skip(session, renderer, args))]
fn cmd_add(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 1, 2, "add START [END]")?;
    let start = session.date_arg(&args[0])?;
    let end = match args.get(1) {
        Some(raw) => session.date_arg(raw)?,
        None => start,
    };
    edit_trips(session, renderer, |trips| add_range(trips, start, end))
}

#[instrument(skip(session, renderer, args))]
fn cmd_remove(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 1, 2, "remove START [END]")?;
    let start = session.date_arg(&args[0])?;
    let end = match args.get(1) {
        Some(raw) => session.date_arg(raw)?,
        None => start,
    };
    edit_trips(session, renderer, |trips| remove_range(trips, start, end))
}

#[instrument(skip(session, renderer, args))]
fn cmd_profiles(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 0, 0, "profiles")?;
    let book = session.repo.load()?;
    renderer.print_profiles(&book)
}

#[instrument(skip(session, renderer, args))]
fn cmd_profile(session: &Session<'_>, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    const USAGE: &str = "profile (new NAME | use NAME | rename NAME NEW | delete NAME)";

    let mut book = session.repo.load()?;
    match args {
        [] => return renderer.print_profiles(&book),
        [action, name] if action == "new" => {
            let created = book.create(name)?;
            println!("Created profile {}.", created.name);
        }
        [action, name] if action == "use" => {
            let active = book.switch(name)?;
            println!("Active profile is now {}.", active.name);
        }
        [action, name, new_name] if action == "rename" => {
            book.rename(name, new_name)?;
            println!("Renamed profile {name} to {}.", new_name.trim());
        }
        [action, name] if action == "delete" => {
            let removed = book.remove(name)?;
            println!(
                "Deleted profile {} ({} trip(s)). Active profile is {}.",
                removed.name,
                removed.trips.len(),
                book.active().name
            );
        }
        _ => return Err(anyhow!("usage: roam {USAGE}")),
    }

    session.repo.save(&book)
}

#[instrument(skip(session, args))]
fn cmd_export(session: &Session<'_>, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 1, 1, "export FILE")?;
    let book = session.repo.load()?;
    let profile = session.selected(&book)?;
    export_profile(Path::new(&args[0]), profile)?;
    println!("Exported profile {} to {}.", profile.name, args[0]);
    Ok(())
}

#[instrument(skip(session, args))]
fn cmd_import(session: &Session<'_>, args: &[String]) -> anyhow::Result<()> {
    expect_args(args, 1, 1, "import FILE")?;
    let imported = import_profile(Path::new(&args[0]))?;

    let mut book = session.repo.load()?;
    let added = book.insert_imported(imported);
    println!("Imported profile {} with {} trip(s).", added.name, added.trips.len());
    session.repo.save(&book)
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "roam [--profile NAME] [--json] <command> [args]\n\n\
         status [DATE]              usage, remaining days and longest safe stay\n\
         trips                      list recorded trips\n\
         check ENTRY EXIT           simulate a planned trip\n\
         max [ENTRY]                longest safe stay starting on ENTRY\n\
         extend ENTRY [EXIT] DAYS   extend a planned trip and simulate it\n\
         breakdown [DATE]           per-month usage and overstayed days\n\
         toggle DATE                flip presence on one day\n\
         add START [END]            mark a range of days as present\n\
         remove START [END]         clear a range of days\n\
         profiles                   list profiles\n\
         profile new|use|rename|delete NAME [NEW]\n\
         export FILE | import FILE  profile snapshots\n\
         config                     show effective configuration\n\n\
         Dates: YYYY-MM-DD, today, yesterday, tomorrow, +Nd, -Nw, +Nm"
    );
    Ok(())
}
