mod config;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use studioscope_logs::{
    DEFAULT_MAX_ERRORS, DateQueryOptions, ErrorQueryOptions, ExclusionFilter, LogDirectory,
    LogLevel, LogQuery, ReadOptions, RecentOptions, RunContext,
};

use config::Config;
use output::OutputFormat;

/// Studioscope - incremental, context-aware queries over Roblox Studio logs
#[derive(Parser, Debug)]
#[command(name = "studioscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.config/studioscope/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format, overrides the config file
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Log file to query (defaults to the latest Studio log)
    #[arg(long, global = true, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Select the newest log of the session that opened this place file
    #[arg(long, global = true, value_name = "PATH")]
    place_path: Option<String>,

    /// Select the newest log of the session that opened this place id
    #[arg(long, global = true, value_name = "ID")]
    place_id: Option<u64>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Category, exclusion and run-context options shared by text queries
#[derive(clap::Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Category to include (repeatable, defaults to Output/Warning/Error)
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Include every category
    #[arg(long, conflicts_with = "categories")]
    all_categories: bool,

    /// Keep Studio-internal noise
    #[arg(long)]
    no_exclude: bool,

    /// Only lines emitted in this run context (play, edit, server, client)
    #[arg(long, value_parser = parse_run_context)]
    context: Option<RunContext>,

    /// Prefix lines with [P]/[E]/[?]
    #[arg(long)]
    labels: bool,
}

impl FilterArgs {
    fn categories(&self) -> Option<Vec<String>> {
        if self.all_categories {
            Some(Vec::new())
        } else if self.categories.is_empty() {
            None
        } else {
            Some(self.categories.clone())
        }
    }
}

/// Line and date bounds
#[derive(clap::Args, Debug, Clone, Default)]
struct RangeArgs {
    /// Only lines after this line number
    #[arg(long, value_name = "LINE")]
    after: Option<u64>,

    /// Only lines before this line number
    #[arg(long, value_name = "LINE")]
    before: Option<u64>,

    /// Inclusive start (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS[.fff][Z])
    #[arg(long, value_name = "DATE")]
    start: Option<String>,

    /// Inclusive end; a bare date covers the whole day
    #[arg(long, value_name = "DATE")]
    end: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read user-visible output, bounded by the output budget
    Read {
        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Prefix lines with [HH:MM:SS]
        #[arg(long)]
        timestamps: bool,
    },

    /// Case-insensitive regex search over messages
    Search {
        pattern: String,

        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        timestamps: bool,
    },

    /// Extract warnings and errors
    Errors {
        #[command(flatten)]
        range: RangeArgs,

        /// Maximum number of entries returned
        #[arg(long, default_value_t = DEFAULT_MAX_ERRORS)]
        max: usize,

        #[arg(long, value_parser = parse_run_context)]
        context: Option<RunContext>,

        #[arg(long)]
        no_exclude: bool,
    },

    /// Read by calendar range, with timestamps
    ByDate {
        #[arg(long, value_name = "DATE")]
        start: Option<String>,

        #[arg(long, value_name = "DATE")]
        end: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Leave out the [HH:MM:SS] prefix
        #[arg(long)]
        no_timestamps: bool,
    },

    /// Show the run-context ranges of the log
    Context,

    /// Show the most recent records
    Recent {
        #[arg(long, default_value_t = 100)]
        limit: usize,

        #[arg(long = "category", value_name = "NAME")]
        categories: Vec<String>,

        #[arg(long, conflicts_with = "categories")]
        all_categories: bool,

        /// Only records of exactly this level
        #[arg(long, value_parser = parse_level)]
        level: Option<LogLevel>,

        #[arg(long)]
        no_exclude: bool,
    },

    /// List the newest Studio logs
    Latest {
        #[arg(long, default_value_t = 1)]
        limit: usize,
    },

    /// Delete logs older than a number of days
    Clean {
        #[arg(long, default_value_t = 7)]
        days: u64,
    },

    /// Print the log selected by --place-path or --place-id
    Find,

    /// Keep reading new output until interrupted
    Follow {
        /// Start after this line instead of the beginning
        #[arg(long, value_name = "LINE")]
        after: Option<u64>,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        timestamps: bool,

        /// Poll interval, overrides the config file
        #[arg(long, value_name = "MS")]
        interval: Option<u64>,
    },
}

fn parse_run_context(s: &str) -> Result<RunContext, String> {
    RunContext::from_str(s).ok_or_else(|| format!("unknown run context: {s}"))
}

fn parse_level(s: &str) -> Result<LogLevel, String> {
    match LogLevel::from_str(s) {
        LogLevel::Unknown if !s.eq_ignore_ascii_case("unknown") => {
            Err(format!("unknown log level: {s}"))
        }
        level => Ok(level),
    }
}

fn read_options(range: &RangeArgs, filter: &FilterArgs, timestamps: bool) -> ReadOptions {
    ReadOptions {
        after_line: range.after,
        before_line: range.before,
        start_date: range.start.clone(),
        end_date: range.end.clone(),
        timestamps,
        categories: filter.categories(),
        apply_exclusion_filter: !filter.no_exclude,
        run_context: filter.context,
        include_context_label: filter.labels,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

/// Resolved settings shared by every command
struct App {
    format: OutputFormat,
    directory: LogDirectory,
    exclusion: ExclusionFilter,
    poll_interval: Duration,
    log: Option<PathBuf>,
    place_path: Option<String>,
    place_id: Option<u64>,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let config = Config::load(args.config.as_deref()).context("failed to load config")?;
        debug!(log_dir = %config.log_dir().display(), "config loaded");

        Ok(Self {
            format: args.format.unwrap_or(config.output.format),
            directory: LogDirectory::new(config.log_dir()).with_index_file(config.index_file()),
            exclusion: config.exclusion_filter(),
            poll_interval: Duration::from_millis(config.follow.poll_interval_ms),
            log: args.log.clone(),
            place_path: args.place_path.clone(),
            place_id: args.place_id,
        })
    }

    /// Log chosen by --place-path or --place-id, if either was given
    fn find_session(&self) -> Result<Option<PathBuf>> {
        if let Some(place_path) = &self.place_path {
            let found = self.directory.find_by_place_path(place_path)?;
            return found
                .map(Some)
                .ok_or_else(|| anyhow!("no Studio log found for place file {place_path}"));
        }
        if let Some(place_id) = self.place_id {
            let found = self.directory.find_by_place_id(place_id)?;
            return found
                .map(Some)
                .ok_or_else(|| anyhow!("no Studio log found for place id {place_id}"));
        }
        Ok(None)
    }

    fn select_log(&self) -> Result<PathBuf> {
        if let Some(log) = &self.log {
            return Ok(log.clone());
        }
        if let Some(log) = self.find_session()? {
            return Ok(log);
        }
        self.directory.latest()?.ok_or_else(|| {
            anyhow!(
                "no Studio logs found in {}",
                self.directory.root().display()
            )
        })
    }

    fn query(&self) -> Result<LogQuery> {
        let log = self.select_log()?;
        debug!(log = %log.display(), "selected log");
        Ok(LogQuery::new(log).with_exclusion(self.exclusion.clone()))
    }

    fn print(&self, text: String) {
        if !text.is_empty() {
            println!("{}", text);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let app = App::new(&args)?;
    let format = app.format;

    match args.command {
        Command::Read {
            range,
            filter,
            timestamps,
        } => {
            let opts = read_options(&range, &filter, timestamps);
            let result = app.query()?.read_from(&opts)?;
            app.print(output::render_query(&result, format)?);
        }
        Command::Search {
            pattern,
            range,
            filter,
            timestamps,
        } => {
            let opts = read_options(&range, &filter, timestamps);
            let result = app.query()?.search(&pattern, &opts)?;
            app.print(output::render_query(&result, format)?);
        }
        Command::Errors {
            range,
            max,
            context,
            no_exclude,
        } => {
            let opts = ErrorQueryOptions {
                after_line: range.after,
                before_line: range.before,
                start_date: range.start,
                end_date: range.end,
                max_errors: max,
                run_context: context,
                apply_exclusion_filter: !no_exclude,
            };
            let report = app.query()?.find_errors(&opts)?;
            app.print(output::render_errors(&report, format)?);
        }
        Command::ByDate {
            start,
            end,
            filter,
            no_timestamps,
        } => {
            let opts = DateQueryOptions {
                start_date: start,
                end_date: end,
                timestamps: !no_timestamps,
                categories: filter.categories(),
                apply_exclusion_filter: !filter.no_exclude,
                run_context: filter.context,
                include_context_label: filter.labels,
            };
            let result = app.query()?.read_by_date(&opts)?;
            app.print(output::render_query(&result, format)?);
        }
        Command::Context => {
            let index = app.query()?.run_context_index()?;
            app.print(output::render_index(&index, format)?);
        }
        Command::Recent {
            limit,
            categories,
            all_categories,
            level,
            no_exclude,
        } => {
            let filter = FilterArgs {
                categories,
                all_categories,
                ..FilterArgs::default()
            };
            let opts = RecentOptions {
                limit,
                categories: filter.categories(),
                min_level: level,
                apply_exclusion_filter: !no_exclude,
            };
            let records = app.query()?.recent(&opts)?;
            app.print(output::render_records(&records, format)?);
        }
        Command::Latest { limit } => {
            let logs = app.directory.studio_logs(limit)?;
            app.print(output::render_paths(&logs, format)?);
        }
        Command::Clean { days } => {
            let removed = app.directory.clean(days)?;
            app.print(output::render_removed(removed, format)?);
        }
        Command::Find => {
            let Some(log) = app.find_session()? else {
                bail!("find needs --place-path or --place-id");
            };
            app.print(output::render_paths(&[log], format)?);
        }
        Command::Follow {
            after,
            filter,
            timestamps,
            interval,
        } => {
            let range = RangeArgs {
                after,
                ..RangeArgs::default()
            };
            let opts = read_options(&range, &filter, timestamps);
            let interval = interval
                .map(Duration::from_millis)
                .unwrap_or(app.poll_interval);
            follow(&app, app.query()?, opts, interval).await?;
        }
    }

    Ok(())
}

/// Poll the log with an advancing cursor until Ctrl-C
async fn follow(
    app: &App,
    query: LogQuery,
    mut opts: ReadOptions,
    interval: Duration,
) -> Result<()> {
    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    debug!(log = %query.path().display(), ?interval, "following log");

    while !token.is_cancelled() {
        let poll_query = query.clone();
        let poll_opts = opts.clone();
        let result = tokio::task::spawn_blocking(move || poll_query.read_from(&poll_opts))
            .await
            .context("follow poll task failed")??;

        if let Some(error) = result.error {
            bail!(error);
        }

        if result.match_count > 0 {
            opts.after_line = Some(result.last_line);
            let text = match app.format {
                OutputFormat::Text => result.logs.clone(),
                OutputFormat::Json => output::render_query(&result, app.format)?,
            };
            app.print(text);
        }

        if result.has_more {
            continue;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    debug!("follow stopped");
    Ok(())
}
