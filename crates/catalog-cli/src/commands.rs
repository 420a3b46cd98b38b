use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;

use catalog_audit::{AuditSink, InMemoryAuditLog, JsonLinesAuditLog};
use catalog_merge::{
    ChoiceResolver, GapAnalysis, MergeConfig, MergeEngine, MergeOutcome, MergePlan, MergePreview,
};
use catalog_schema::RelationDescriptor;
use catalog_store::sample::archive_snapshot;
use catalog_store::{InMemoryRecordStore, RecordStore, Snapshot};
use catalog_types::{ActorId, EntityType, RecordId, RecordRef};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Init(args) => cmd_init(args),
        Command::Relations(args) => cmd_relations(args, format),
        Command::Gaps(args) => cmd_gaps(args, format),
        Command::Preview(args) => cmd_preview(args, format),
        Command::Merge(args) => cmd_merge(args, format),
        Command::Replace(args) => cmd_replace(args, format),
    }
}

fn open_store(db: &DbArgs) -> anyhow::Result<InMemoryRecordStore> {
    let snapshot = Snapshot::load(&db.db)
        .with_context(|| format!("cannot read database {}", db.db.display()))?;
    Ok(InMemoryRecordStore::from_snapshot(snapshot)?)
}

fn save_store(store: &InMemoryRecordStore, path: &Path) -> anyhow::Result<()> {
    store
        .snapshot()?
        .save(path)
        .with_context(|| format!("cannot write database {}", path.display()))
}

fn audit_sink(path: Option<&Path>) -> anyhow::Result<Box<dyn AuditSink>> {
    Ok(match path {
        Some(path) => Box::new(JsonLinesAuditLog::open(path)?),
        None => Box::new(InMemoryAuditLog::new()),
    })
}

fn plan_for(args: &RecordsArgs) -> anyhow::Result<MergePlan> {
    let entity: EntityType = args.entity.parse()?;
    Ok(MergePlan::new(
        entity,
        RecordId::new(args.primary),
        args.secondaries.iter().copied().map(RecordId::new),
    ))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    let path = &args.db.db;
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let snapshot = archive_snapshot();
    let records: usize = snapshot.records.values().map(Vec::len).sum();
    snapshot.save(path)?;
    println!("{} Wrote sample archive to {}", "✓".green().bold(), path.display().to_string().bold());
    println!("  Entity types: {}", snapshot.schema.entities.len());
    println!("  Records: {records}");
    Ok(())
}

fn cmd_relations(args: RelationsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.db)?;
    let entity: EntityType = args.entity.parse()?;
    store.catalog().require_entity(&entity)?;
    let relations = store.catalog().relations_of(&entity, args.forward, !args.no_reverse);

    if let OutputFormat::Json = format {
        return print_json(&relations);
    }
    if relations.is_empty() {
        println!("No relations for {}.", entity.to_string().yellow());
    }
    for relation in relations {
        print_relation(relation);
    }
    Ok(())
}

fn print_relation(relation: &RelationDescriptor) {
    println!(
        "{} [{}]  {} -> {}  on delete {}",
        relation.name.bold(),
        relation.kind.to_string().cyan(),
        relation.owner,
        relation.target,
        relation.delete_policy.to_string().yellow(),
    );
    if let Some(join) = &relation.join {
        println!("  via {} ({} -> {})", join.entity, join.source_field, join.target_field);
    }
    for set in &relation.unique_together {
        println!("  unique ({})", set.join(", ").dimmed());
    }
}

fn print_analysis(analysis: &GapAnalysis) {
    if analysis.gaps.is_empty() {
        println!("No empty fields on the primary.");
        return;
    }
    println!("Empty fields: {}", analysis.gaps.join(", "));
    for (field, value) in &analysis.updates {
        println!("  {} {} = {}", "fill".green(), field.bold(), value);
    }
    for (field, candidates) in analysis.conflicts.iter() {
        println!("  {} {}", "conflict".red(), field.bold());
        for (index, value) in candidates.iter().enumerate() {
            println!("    [{index}] {value}");
        }
    }
}

fn cmd_gaps(args: RecordsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.db)?;
    let engine = MergeEngine::new(&store, MergeConfig::default());
    let analysis = engine.analyze(&plan_for(&args)?)?;
    match format {
        OutputFormat::Json => print_json(&analysis),
        OutputFormat::Text => {
            print_analysis(&analysis);
            Ok(())
        }
    }
}

fn print_preview(preview: &MergePreview) {
    print_analysis(&preview.analysis);
    if preview.references.is_empty() {
        println!("No references to move.");
        return;
    }
    println!("References:");
    for reference in &preview.references {
        println!(
            "  {:<28} {:<14} {:>4} rows  on delete {}",
            reference.end,
            reference.secondary.to_string(),
            reference.count,
            reference.on_delete.to_string().yellow(),
        );
    }
}

fn cmd_preview(args: RecordsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.db)?;
    let engine = MergeEngine::new(&store, MergeConfig::interactive());
    let preview = engine.preview(&plan_for(&args)?)?;
    match format {
        OutputFormat::Json => print_json(&preview),
        OutputFormat::Text => {
            print_preview(&preview);
            Ok(())
        }
    }
}

fn merge_heading(plan: &MergePlan) -> String {
    format!("Merged {} record(s) into {}", plan.secondaries.len(), plan.primary_ref())
}

fn print_outcome(outcome: &MergeOutcome, plan: &MergePlan, dry_run: bool) {
    if dry_run {
        println!("{} Dry run, nothing written", "~".yellow().bold());
    } else {
        println!("{} {}", "✓".green().bold(), merge_heading(plan).bold());
    }
    for (field, value) in &outcome.applied_updates {
        println!("  {} {} = {}", "filled".green(), field.bold(), value);
    }
    for field in &outcome.ignored_updates {
        println!("  {} {} (already set)", "kept".dimmed(), field);
    }
    for report in outcome.migrations.iter().filter(|m| m.found > 0) {
        println!(
            "  {:<28} moved {}, excluded {}, skipped {}, deleted {}",
            report.end, report.moved, report.excluded, report.skipped, report.deleted
        );
    }
    println!("  Rows deleted: {}", outcome.deleted.len());
    println!("  Audit entries: {}", outcome.audit.len());
}

fn cmd_merge(args: MergeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.records.db)?;
    let config = match &args.config {
        Some(path) => MergeConfig::load(path)?,
        None => MergeConfig::interactive(),
    };
    let engine = MergeEngine::new(&store, config);

    let mut plan = plan_for(&args.records)?
        .expand(!args.no_expand)
        .actor(ActorId::new(args.actor));
    if plan.expand {
        let mut resolver = ChoiceResolver::parse(&args.choose)?;
        if args.first_candidate {
            resolver = resolver.or_first_candidate();
        }
        plan = engine.prepare(&plan, &resolver)?;
    }

    let outcome = if args.dry_run {
        engine.dry_run(&plan)?
    } else {
        let sink = audit_sink(args.audit_log.as_deref())?;
        let (outcome, pending) = engine.merge_unaudited(&plan)?;
        save_store(&store, &args.records.db.db)?;
        pending
            .flush(sink.as_ref())
            .context("merge saved, but its audit entries were not written")?;
        outcome
    };

    match format {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Text => {
            print_outcome(&outcome, &plan, args.dry_run);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ReplaceReport {
    record: RecordRef,
    replacements: Vec<RecordRef>,
    changed: Vec<RecordRef>,
}

fn cmd_replace(args: ReplaceArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.db)?;
    let entity: EntityType = args.entity.parse()?;
    let record = RecordRef::new(entity.clone(), RecordId::new(args.id));
    let replacements: Vec<RecordRef> = args
        .replacements
        .iter()
        .map(|id| RecordRef::new(entity.clone(), RecordId::new(*id)))
        .collect();

    let engine = MergeEngine::new(&store, MergeConfig::default());
    let sink = audit_sink(args.audit_log.as_deref())?;
    let (changed, pending) =
        engine.replace_unaudited(&record, &replacements, ActorId::new(args.actor))?;
    save_store(&store, &args.db.db)?;
    pending
        .flush(sink.as_ref())
        .context("links saved, but their audit entries were not written")?;

    match format {
        OutputFormat::Json => print_json(&ReplaceReport {
            record,
            replacements,
            changed,
        }),
        OutputFormat::Text => {
            println!("{} Relinked {}", "✓".green().bold(), record.to_string().bold());
            for other in &changed {
                println!("  changed {other}");
            }
            Ok(())
        }
    }
}
