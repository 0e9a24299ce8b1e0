use std::fmt::Write as _;
use std::io;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use time::{macros::format_description, OffsetDateTime};

use crate::app::actions::MutationCoordinator;
use crate::app::selection::Selection;
use crate::app::App;
use crate::auth::{SessionFile, SessionProvider};
use crate::config::AppConfig;
use crate::records::{Category, Record, RecordFields, RecordId};
use crate::search::{build_query, month_from_number, parse_date, FilterState, Mode};
use crate::storage::{RecordStore, StorageHandle};

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Operator email address
    pub email: String,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[command(subcommand)]
    pub command: AddCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AddCommand {
    /// Add an NHIS record (missing fields are prompted for)
    Nhis(AddNhisArgs),
    /// Add a private insurance record (missing fields are prompted for)
    Private(AddPrivateArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddNhisArgs {
    #[arg(long)]
    pub opd: Option<String>,
    #[arg(long)]
    pub nhis: Option<String>,
    #[arg(long)]
    pub ccc: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddPrivateArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub membership: Option<String>,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub opd: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Record category (nhis or private)
    pub category: Category,
    /// OPD number contains
    #[arg(long)]
    pub opd: Option<String>,
    /// NHIS number contains (nhis only)
    #[arg(long)]
    pub nhis: Option<String>,
    /// CCC contains (nhis only)
    #[arg(long)]
    pub ccc: Option<String>,
    /// Name contains (private only)
    #[arg(long)]
    pub name: Option<String>,
    /// Membership number contains (private only)
    #[arg(long)]
    pub membership: Option<String>,
    /// Created in this year
    #[arg(long)]
    pub year: Option<i32>,
    /// Created in this month (1-12, requires --year)
    #[arg(long)]
    pub month: Option<u8>,
    /// Created on this day (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,
    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Record category (nhis or private)
    pub category: Category,
    /// Ids of the records to delete
    #[arg(required = true)]
    pub ids: Vec<String>,
}

pub fn run_tui(config: Arc<AppConfig>, storage: StorageHandle, sessions: SessionFile) -> Result<()> {
    if sessions.current()?.is_none() {
        bail!("no operator signed in; run `frontdesk login <email>` first");
    }
    let store: Arc<dyn RecordStore> = Arc::new(storage);
    let mut app = App::new(config, store, Box::new(sessions))?;
    app.run()?;
    if app.signed_out() {
        println!("Signed out");
    }
    Ok(())
}

pub fn login(sessions: &SessionFile, args: LoginArgs) -> Result<()> {
    let session = sessions.sign_in(&args.email)?;
    println!("Signed in as {}", session.email);
    Ok(())
}

pub fn logout(sessions: &SessionFile) -> Result<()> {
    sessions.sign_out()?;
    println!("Signed out");
    Ok(())
}

pub fn add_record(store: &dyn RecordStore, args: AddArgs) -> Result<()> {
    let (category, provided) = match args.command {
        AddCommand::Nhis(args) => (Category::Nhis, vec![args.opd, args.nhis, args.ccc]),
        AddCommand::Private(args) => (
            Category::Private,
            vec![args.name, args.membership, args.company, args.opd, args.phone],
        ),
    };
    let interactive = atty::is(atty::Stream::Stdin);
    let mut values = Vec::with_capacity(provided.len());
    for (spec, value) in category.fields().iter().zip(provided) {
        let value = match value {
            Some(value) => value,
            None if interactive => prompt(spec.label)?,
            None => String::new(),
        };
        values.push(value);
    }
    let record = insert_record(store, RecordFields::from_values(category, values))?;
    println!("Record added ({})", record.id);
    Ok(())
}

fn insert_record(store: &dyn RecordStore, fields: RecordFields) -> Result<Record> {
    MutationCoordinator::new(store)
        .insert(&fields)
        .context("adding record")
}

pub fn list_records(store: &dyn RecordStore, recent_limit: usize, args: ListArgs) -> Result<()> {
    let output = run_list(store, recent_limit, &args)?;
    print!("{output}");
    Ok(())
}

fn run_list(store: &dyn RecordStore, recent_limit: usize, args: &ListArgs) -> Result<String> {
    let filter = filter_from_args(args)?;
    let query = build_query(args.category, &filter, recent_limit);
    let records = store
        .list(args.category, &query)
        .context("listing records")?;
    if args.json {
        let mut out = serde_json::to_string_pretty(&records).context("serialising records")?;
        out.push('\n');
        return Ok(out);
    }
    format_records(args.category, &records, filter.mode())
}

fn filter_from_args(args: &ListArgs) -> Result<FilterState> {
    let mut filter = FilterState::default();
    let search_fields = args.category.search_fields();
    let flags = [
        ("--opd", "opd_number", &args.opd),
        ("--nhis", "nhis_number", &args.nhis),
        ("--ccc", "ccc", &args.ccc),
        ("--name", "name", &args.name),
        ("--membership", "membership_number", &args.membership),
    ];
    for (flag, column, value) in flags {
        let Some(value) = value else {
            continue;
        };
        let slot = search_fields
            .iter()
            .position(|spec| spec.column == column)
            .ok_or_else(|| anyhow!("{flag} does not apply to {} records", args.category))?;
        filter.terms[slot] = value.clone();
    }

    filter.year = args.year;
    if let Some(number) = args.month {
        if args.year.is_none() {
            bail!("--month requires --year");
        }
        let month = month_from_number(number).ok_or_else(|| anyhow!("--month must be 1-12"))?;
        filter.month = Some(month);
    }
    if let Some(raw) = &args.date {
        let date = parse_date(raw).ok_or_else(|| anyhow!("--date must be YYYY-MM-DD, got {raw:?}"))?;
        filter.date = Some(date);
    }
    Ok(filter)
}

fn format_records(category: Category, records: &[Record], mode: Mode) -> Result<String> {
    if records.is_empty() {
        return Ok("No records found.\n".to_string());
    }
    let mut out = String::new();
    for record in records {
        writeln!(
            &mut out,
            "{}  {}",
            format_timestamp(record.created_at),
            record.id
        )?;
        for (spec, value) in category.fields().iter().zip(record.fields.values()) {
            writeln!(&mut out, "    {:<18} {value}", spec.label)?;
        }
        out.push('\n');
    }
    let count = records.len();
    let plural = if count == 1 { "" } else { "s" };
    match mode {
        Mode::Searching => writeln!(&mut out, "Found {count} matching record{plural}")?,
        Mode::Browsing => writeln!(&mut out, "Showing last {count} record{plural}")?,
    }
    Ok(out)
}

fn format_timestamp(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

pub fn delete_records(store: &dyn RecordStore, args: DeleteArgs) -> Result<()> {
    let output = run_delete(store, &args)?;
    print!("{output}");
    Ok(())
}

fn run_delete(store: &dyn RecordStore, args: &DeleteArgs) -> Result<String> {
    let ids: Vec<RecordId> = args
        .ids
        .iter()
        .map(|id| RecordId::from(id.trim()))
        .collect();
    let mut selection = Selection::default();
    let removed = MutationCoordinator::new(store)
        .delete(args.category, &ids, &mut selection)
        .context("deleting records")?;
    let mut out = format!("{removed} record(s) deleted\n");
    let missing = ids.len().saturating_sub(removed);
    if missing > 0 {
        writeln!(&mut out, "{missing} id(s) not found")?;
    }
    Ok(out)
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}
