//! IES4 CLI
//!
//! One command for every asset:
//! - Adding, updating and removing entities described by definition files
//! - Inspecting region documents (list/show/stats/validate)
//! - Refreshing the analysis web service after an edit

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use colored::Colorize;
use ies4_notify::{HttpTransport, NotificationQueue, NotifierClient, NotifyStatus, StepStatus};
use ies4_registry::{
    inspect, EntityDefinition, EntityKind, PathResolver, RegionContext, RegionDocument,
    RegistryEditor, RegistryError, VerificationReport, WriteOptions,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod config;
mod report;

use config::Ies4Config;
use report::OperationReport;

#[derive(Parser)]
#[command(name = "ies4")]
#[command(author, version, about = "IES4 entity registry: edit region documents in place")]
struct Cli {
    /// Config file (JSON). Falls back to $IES4_CONFIG, then built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print a JSON report on stdout instead of progress lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct RegionArgs {
    /// Region code (e.g. OP7, usa, combined); defaults to the configured region
    #[arg(long)]
    db: Option<String>,
}

#[derive(Args, Clone)]
struct NotifyArgs {
    /// Do not refresh the web service after writing
    #[arg(long)]
    no_notify: bool,

    /// Override the configured web service base URL
    #[arg(long)]
    notify_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert or replace an entity (and its type) in a region document
    Add {
        /// Entity definition file (JSON)
        #[arg(long)]
        entity: PathBuf,
        #[command(flatten)]
        region: RegionArgs,
        #[command(flatten)]
        notify: NotifyArgs,
        /// Print path candidates and config, then re-read the file after writing
        #[arg(long)]
        diagnostic: bool,
    },

    /// Remove an entity, pruning its type once nothing references it
    Remove {
        /// Entity definition file (JSON)
        #[arg(long)]
        entity: PathBuf,
        #[command(flatten)]
        region: RegionArgs,
        #[command(flatten)]
        notify: NotifyArgs,
        /// Print path candidates and config, then re-read the file after writing
        #[arg(long)]
        diagnostic: bool,
    },

    /// List records of one kind, marking those an entity definition matches
    #[command(group(ArgGroup::new("target").required(true).args(["kind", "entity"])))]
    List {
        /// Entity kind (vehicle, aircraft, missileSystem, ...)
        #[arg(long)]
        kind: Option<String>,
        /// Entity definition file; its kind is listed and matches are marked
        #[arg(long)]
        entity: Option<PathBuf>,
        #[command(flatten)]
        region: RegionArgs,
    },

    /// Report residual matches and collection sizes without writing
    Verify {
        #[arg(long)]
        entity: PathBuf,
        #[command(flatten)]
        region: RegionArgs,
    },

    /// Print one record by id
    Show {
        id: String,
        #[command(flatten)]
        region: RegionArgs,
    },

    /// Collection counts, file size and digest
    Stats {
        #[command(flatten)]
        region: RegionArgs,
    },

    /// Structural checks: ids present and unique, type keys set
    Validate {
        #[command(flatten)]
        region: RegionArgs,
    },

    /// Configured regions and where their files resolve to
    Regions,

    /// Ask the web service to reload and re-analyze a region
    Refresh {
        #[command(flatten)]
        region: RegionArgs,
        /// Override the configured web service base URL
        #[arg(long)]
        notify_url: Option<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Add { .. } => "add",
            Commands::Remove { .. } => "remove",
            Commands::List { .. } => "list",
            Commands::Verify { .. } => "verify",
            Commands::Show { .. } => "show",
            Commands::Stats { .. } => "stats",
            Commands::Validate { .. } => "validate",
            Commands::Regions => "regions",
            Commands::Refresh { .. } => "refresh",
        }
    }
}

fn main() -> ExitCode {
    // Usage errors exit 1 like every other failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(cli.verbose);

    let report = match run(&cli) {
        Ok(report) => report,
        Err(err) => {
            if !cli.json {
                eprintln!("{} {err:#}", "error:".red().bold());
            }
            let mut report = OperationReport::new(cli.command.name()).failed(format!("{err:#}"));
            report.error_kind = err.downcast_ref::<RegistryError>().map(RegistryError::kind);
            report
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("{} failed to render report: {err}", "error:".red().bold());
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::from(report.exit_code())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<OperationReport> {
    let (config, config_path) = Ies4Config::load(cli.config.as_deref())?;
    let session = Session {
        resolver: PathResolver::standard(&config.registry.search_dirs),
        config,
        config_path,
        json: cli.json,
    };

    match &cli.command {
        Commands::Add {
            entity,
            region,
            notify,
            diagnostic,
        } => cmd_add(&session, entity, region, notify, *diagnostic),
        Commands::Remove {
            entity,
            region,
            notify,
            diagnostic,
        } => cmd_remove(&session, entity, region, notify, *diagnostic),
        Commands::List {
            kind,
            entity,
            region,
        } => cmd_list(&session, kind.as_deref(), entity.as_deref(), region),
        Commands::Verify { entity, region } => cmd_verify(&session, entity, region),
        Commands::Show { id, region } => cmd_show(&session, id, region),
        Commands::Stats { region } => cmd_stats(&session, region),
        Commands::Validate { region } => cmd_validate(&session, region),
        Commands::Regions => cmd_regions(&session),
        Commands::Refresh { region, notify_url } => {
            cmd_refresh(&session, region, notify_url.as_deref())
        }
    }
}

/// Resolved configuration shared by every command.
struct Session {
    config: Ies4Config,
    config_path: Option<PathBuf>,
    resolver: PathResolver,
    json: bool,
}

impl Session {
    fn context(&self, region: &RegionArgs) -> Result<RegionContext> {
        Ok(self
            .config
            .registry
            .context(region.db.as_deref(), &self.resolver)?)
    }

    fn editor(&self) -> RegistryEditor {
        RegistryEditor::new(WriteOptions::from(&self.config.registry))
    }

    /// Progress line on stderr; suppressed under `--json`.
    fn say(&self, line: impl std::fmt::Display) {
        if !self.json {
            eprintln!("{line}");
        }
    }

    /// Built before any write so a bad URL fails the command up front.
    fn notifier(
        &self,
        enabled: bool,
        notify_url: Option<&str>,
    ) -> Result<Option<NotifierClient<HttpTransport>>> {
        if !enabled {
            return Ok(None);
        }
        let mut config = self.config.notifier.clone();
        if let Some(url) = notify_url {
            config.base_url = url.to_string();
        }
        let client = NotifierClient::http(config).context("failed to set up web service notifier")?;
        Ok(Some(client))
    }

    fn notifier_for(&self, args: &NotifyArgs) -> Result<Option<NotifierClient<HttpTransport>>> {
        let enabled = !args.no_notify && (self.config.notifier.enabled || args.notify_url.is_some());
        if !enabled {
            tracing::info!("web service notification disabled");
        }
        self.notifier(enabled, args.notify_url.as_deref())
    }

    fn refresh(&self, client: &NotifierClient<HttpTransport>, ctx: &RegionContext) -> NotifyStatus {
        self.say(format!(
            "{} {} at {}",
            "Refreshing".green().bold(),
            ctx.code,
            client.base_url()
        ));
        let status = NotificationQueue::refresh(client, ctx.code.as_str()).run();
        for step in &status.steps {
            let mark = match step.status {
                StepStatus::Succeeded => "ok".green().bold(),
                StepStatus::Failed => "failed".red().bold(),
                StepStatus::Skipped => "skipped".yellow().bold(),
            };
            match &step.error {
                Some(err) if step.status == StepStatus::Failed => {
                    self.say(format!("  {mark} {} ({err})", step.endpoint))
                }
                _ => self.say(format!("  {mark} {}", step.endpoint)),
            }
        }
        status
    }

    fn diagnostic(&self, ctx: &RegionContext) -> Result<()> {
        let (_, entry) = self.config.registry.region(&ctx.code)?;
        eprintln!("{} {} ({})", "region".cyan().bold(), ctx.code, ctx.display_name);
        for candidate in self.resolver.candidates(&entry.file) {
            let mark = if candidate.is_file() {
                "found".green()
            } else {
                "absent".dimmed()
            };
            eprintln!("  {} {}", mark, candidate.display());
        }
        eprintln!("  {} {}", "→".cyan(), ctx.path.display());
        match &self.config_path {
            Some(path) => eprintln!("{} {}", "config".cyan().bold(), path.display()),
            None => eprintln!("{} built-in defaults", "config".cyan().bold()),
        }
        eprintln!("{}", serde_json::to_string_pretty(&self.config)?);
        Ok(())
    }

    fn print_verification(&self, report: &VerificationReport) {
        let residual = report.residual_matches();
        let mark = if residual == 0 {
            "ok".green().bold()
        } else {
            "residual".yellow().bold()
        };
        self.say(format!(
            "{mark} {residual} matching record(s), type {}",
            if report.type_present { "present" } else { "absent" }
        ));
        for id in &report.residual_ids {
            self.say(format!("  {} {id}", "→".yellow()));
        }
        for (name, size) in &report.collection_sizes {
            self.say(format!("  {name}: {size}"));
        }
    }

    /// Re-read after a write. A failed re-read is reported and otherwise
    /// ignored; the write already happened.
    fn verification_pass(
        &self,
        editor: &RegistryEditor,
        ctx: &RegionContext,
        def: &EntityDefinition,
    ) -> Option<VerificationReport> {
        match editor.verify_definition(ctx, def) {
            Ok(verification) => {
                self.print_verification(&verification);
                Some(verification)
            }
            Err(err) => {
                tracing::warn!(
                    path = %ctx.path.display(),
                    error = %err,
                    "verification re-read failed"
                );
                self.say(format!(
                    "{} could not re-read {}: {err}",
                    "warning:".yellow().bold(),
                    ctx.path.display()
                ));
                None
            }
        }
    }
}

fn load_definition(path: &Path) -> Result<EntityDefinition> {
    EntityDefinition::from_file(path)
        .with_context(|| format!("failed to load entity definition {}", path.display()))
}

fn cmd_add(
    session: &Session,
    entity: &Path,
    region: &RegionArgs,
    notify: &NotifyArgs,
    diagnostic: bool,
) -> Result<OperationReport> {
    let def = load_definition(entity)?;
    let ctx = session.context(region)?;
    if diagnostic {
        session.diagnostic(&ctx)?;
    }
    let notifier = session.notifier_for(notify)?;

    session.say(format!(
        "{} {} into {} ({})",
        "Adding".green().bold(),
        def.slug,
        ctx.display_name,
        ctx.path.display()
    ));
    let editor = session.editor();
    let outcome = editor
        .upsert_definition(&ctx, &def)
        .with_context(|| format!("failed to add {} to {}", def.slug, ctx.code))?;

    let verb = if outcome.replaced { "updated" } else { "added" };
    session.say(format!("{} {verb} {}", "ok".green().bold(), outcome.id.bold()));
    if outcome.type_created {
        session.say(format!("  {} new type {}", "→".cyan(), def.type_definition.id));
    }
    if let Some(old) = &outcome.type_pruned {
        session.say(format!("  {} pruned type {old}", "→".cyan()));
    }
    if let Some(backup) = &outcome.backup {
        session.say(format!("  {} backup {}", "→".cyan(), backup.display()));
    }

    let mut report = OperationReport::for_region("add", &ctx);
    report.upsert = Some(outcome);
    if diagnostic {
        report.verification = session.verification_pass(&editor, &ctx, &def);
    }
    report.notifications = notifier.map(|client| session.refresh(&client, &ctx));
    report.settle();
    Ok(report)
}

fn cmd_remove(
    session: &Session,
    entity: &Path,
    region: &RegionArgs,
    notify: &NotifyArgs,
    diagnostic: bool,
) -> Result<OperationReport> {
    let def = load_definition(entity)?;
    let ctx = session.context(region)?;
    if diagnostic {
        session.diagnostic(&ctx)?;
    }
    let notifier = session.notifier_for(notify)?;

    session.say(format!(
        "{} {} from {} ({})",
        "Removing".green().bold(),
        def.slug,
        ctx.display_name,
        ctx.path.display()
    ));
    let editor = session.editor();
    let outcome = editor
        .remove_definition(&ctx, &def)
        .with_context(|| format!("failed to remove {} from {}", def.slug, ctx.code))?;

    if outcome.document_missing {
        session.say(format!(
            "{} region file does not exist; nothing to remove",
            "info:".yellow().bold()
        ));
    } else if outcome.removed == 0 {
        session.say(format!("{} no matching records", "info:".yellow().bold()));
    } else {
        session.say(format!(
            "{} removed {} record(s)",
            "ok".green().bold(),
            outcome.removed
        ));
        for id in &outcome.removed_ids {
            session.say(format!("  {} {id}", "→".cyan()));
        }
        if outcome.type_pruned {
            session.say(format!("  {} pruned type {}", "→".cyan(), def.type_definition.id));
        }
    }

    let changed = outcome.removed > 0;
    let mut report = OperationReport::for_region("remove", &ctx);
    report.removal = Some(outcome);
    if diagnostic && ctx.path.is_file() {
        report.verification = session.verification_pass(&editor, &ctx, &def);
    }
    // Nothing on disk changed, so there is nothing for the web service to reload.
    if changed {
        report.notifications = notifier.map(|client| session.refresh(&client, &ctx));
    }
    report.settle();
    Ok(report)
}

fn cmd_list(
    session: &Session,
    kind: Option<&str>,
    entity: Option<&Path>,
    region: &RegionArgs,
) -> Result<OperationReport> {
    let ctx = session.context(region)?;
    let doc = RegionDocument::load(&ctx.path)?;
    let (kind, rows) = match (entity, kind) {
        (Some(path), _) => {
            let def = load_definition(path)?;
            let kind = def.kind()?;
            let rows = inspect::list(&doc, &kind, &def.matcher())?;
            (kind, rows)
        }
        (None, Some(name)) => {
            let kind = EntityKind::lookup(name)?;
            let rows = inspect::list(&doc, &kind, &|_: &Value| false)?;
            (kind, rows)
        }
        (None, None) => bail!("either --kind or --entity is required"),
    };

    session.say(format!(
        "{} {} record(s) in {}",
        kind.collection.bold(),
        rows.len(),
        ctx.display_name
    ));
    for row in &rows {
        let marker = if row.matches { "*".green().bold() } else { " ".normal() };
        session.say(format!(
            "{marker} {}  {}  {}",
            row.id,
            row.name.as_deref().unwrap_or("-"),
            row.type_key.as_deref().unwrap_or("-").dimmed()
        ));
    }

    let mut report = OperationReport::for_region("list", &ctx);
    report.data = Some(serde_json::json!({
        "collection": kind.collection,
        "records": rows,
    }));
    Ok(report)
}

fn cmd_verify(session: &Session, entity: &Path, region: &RegionArgs) -> Result<OperationReport> {
    let def = load_definition(entity)?;
    let ctx = session.context(region)?;
    let verification = session.editor().verify_definition(&ctx, &def)?;
    session.print_verification(&verification);

    let mut report = OperationReport::for_region("verify", &ctx);
    report.verification = Some(verification);
    Ok(report)
}

fn cmd_show(session: &Session, id: &str, region: &RegionArgs) -> Result<OperationReport> {
    let ctx = session.context(region)?;
    let doc = RegionDocument::load(&ctx.path)?;
    let Some(found) = inspect::find_entity(&doc, id) else {
        bail!("no entity with id `{id}` in {}", ctx.path.display());
    };
    if !session.json {
        if let Some(collection) = &found.entity_type {
            eprintln!("{} {id} in {collection}", "found".green().bold());
        }
        println!("{}", serde_json::to_string_pretty(&found.entity)?);
    }
    let mut report = OperationReport::for_region("show", &ctx);
    report.data = Some(serde_json::to_value(found)?);
    Ok(report)
}

fn cmd_stats(session: &Session, region: &RegionArgs) -> Result<OperationReport> {
    let ctx = session.context(region)?;
    let stats = inspect::stats(&ctx.path)?;
    session.say(format!(
        "{} {} ({} bytes, sha256 {})",
        ctx.display_name.bold(),
        stats.path.display(),
        stats.file_size,
        &stats.digest[..12.min(stats.digest.len())]
    ));
    for (name, count) in &stats.counts {
        session.say(format!("  {name}: {count}"));
    }
    let mut report = OperationReport::for_region("stats", &ctx);
    report.data = Some(serde_json::to_value(stats)?);
    Ok(report)
}

fn cmd_validate(session: &Session, region: &RegionArgs) -> Result<OperationReport> {
    let ctx = session.context(region)?;
    let root = RegionDocument::read_value(&ctx.path)?;
    let issues = inspect::validate(&root);

    let mut report = OperationReport::for_region("validate", &ctx);
    report.data = Some(serde_json::to_value(&issues)?);
    if issues.is_empty() {
        session.say(format!("{} {} is well formed", "ok".green().bold(), ctx.path.display()));
        return Ok(report);
    }

    for issue in &issues {
        let location = match (&issue.collection, issue.index) {
            (Some(c), Some(i)) => format!("{c}[{i}]"),
            (Some(c), None) => c.clone(),
            _ => "document".to_string(),
        };
        session.say(format!("  {} {location}: {}", "✗".red(), issue.message));
    }
    let summary = format!("{} validation issue(s) in {}", issues.len(), ctx.path.display());
    session.say(format!("{} {summary}", "error:".red().bold()));
    Ok(report.failed(summary))
}

fn cmd_regions(session: &Session) -> Result<OperationReport> {
    let registry = &session.config.registry;
    let mut rows = Vec::new();
    for (code, entry) in &registry.regions {
        let path = session.resolver.resolve(&entry.file);
        let exists = path.is_file();
        let default = code == &registry.default_region;
        session.say(format!(
            "{}{:<12} {:<24} {} {}",
            if default { "*" } else { " " },
            code.bold(),
            entry.display_name,
            path.display(),
            if exists { "".normal() } else { "(missing)".dimmed() }
        ));
        rows.push(serde_json::json!({
            "code": code,
            "displayName": entry.display_name,
            "path": path,
            "exists": exists,
            "default": default,
        }));
    }
    let mut report = OperationReport::new("regions");
    report.data = Some(Value::Array(rows));
    Ok(report)
}

fn cmd_refresh(
    session: &Session,
    region: &RegionArgs,
    notify_url: Option<&str>,
) -> Result<OperationReport> {
    let ctx = session.context(region)?;
    let mut report = OperationReport::for_region("refresh", &ctx);
    if let Some(client) = session.notifier(true, notify_url)? {
        let status = session.refresh(&client, &ctx);
        let failed = !status.all_succeeded();
        report.notifications = Some(status);
        // With no file written, a failed refresh is the whole operation failing.
        if failed {
            return Ok(report.failed("web service refresh did not complete"));
        }
    }
    report.settle();
    Ok(report)
}
