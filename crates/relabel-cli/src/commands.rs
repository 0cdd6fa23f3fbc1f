//! CLI command implementations

use crate::github::GitHubClient;
use anyhow::{Context as _, Result, bail};
use async_trait::async_trait;
use colored::Colorize;
use relabel_core::{
    Config, Issue, LabelSink, Plan, RuleTable, RunMode, RunSummary, SnapshotCache, build_plan,
    fetch_snapshot, match_rules, replay_issue,
};
use std::path::{Path, PathBuf};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;

/// Everything a command needs, built once from flags and the config file
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    token: Option<String>,
    pub json: bool,
}

impl Context {
    pub fn load(config: Option<PathBuf>, token: Option<String>, json: bool) -> Result<Self> {
        let config_path = Config::resolve_path(config.as_deref());
        let config = Config::load(&config_path)?;
        Ok(Self {
            config,
            config_path,
            token: token.filter(|t| !t.trim().is_empty()),
            json,
        })
    }

    /// Rule table, validated before any I/O happens
    fn rules(&self) -> Result<RuleTable> {
        Ok(self.config.rule_table()?)
    }

    fn snapshot(&self) -> SnapshotCache {
        SnapshotCache::new(self.config.snapshot_path())
    }

    fn client(&self) -> Result<GitHubClient> {
        self.config.github.slug()?;
        let token = self
            .token
            .as_deref()
            .context("GitHub token missing. Set GITHUB_TOKEN or pass --token.")?;
        Ok(GitHubClient::new(&self.config.github, token)?)
    }
}

/// Load the snapshot, fetching it first when missing or when asked to
async fn load_issues(ctx: &Context, refresh: bool) -> Result<Vec<Issue>> {
    let cache = ctx.snapshot();
    if !refresh
        && let Some(issues) = cache.load()?
    {
        info!(path = %cache.path().display(), "using cached snapshot");
        return Ok(issues);
    }

    info!("fetching snapshot from GitHub");
    let client = ctx.client()?;
    let issues = fetch_snapshot(&client, ctx.config.github.concurrency).await?;
    cache.save(&issues)?;
    Ok(issues)
}

pub async fn fetch(ctx: &Context) -> Result<()> {
    let issues = load_issues(ctx, true).await?;
    let events: usize = issues.iter().map(|i| i.timeline.len()).sum();
    let path = ctx.config.snapshot_path();

    if ctx.json {
        println!(
            "{}",
            serde_json::json!({
                "issues": issues.len(),
                "events": events,
                "path": path,
            })
        );
    } else {
        println!(
            "{} Fetched {} closed issues ({} timeline events)",
            "✓".green(),
            issues.len(),
            events
        );
        println!("  Snapshot: {}", path.display());
    }
    Ok(())
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Issue")]
    issue: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Add")]
    add: String,
    #[tabled(rename = "Remove")]
    remove: String,
}

fn print_plan(plan: &Plan) {
    let rows: Vec<PlanRow> = plan
        .pending()
        .map(|e| PlanRow {
            issue: format!("#{}", e.issue),
            rule: format!("P{} {}", e.rule.priority, e.rule.result),
            add: e.add.join(", "),
            remove: e.remove.join(", "),
        })
        .collect();

    if rows.is_empty() {
        println!("No label changes needed");
    } else {
        println!("{}", Table::new(rows).with(Style::rounded()));
    }
}

fn print_summary(summary: &RunSummary) {
    let mutated_label = if summary.dry_run {
        "would mutate"
    } else {
        "mutated"
    };
    println!();
    println!(
        "{} matched, {} unmatched, {} {}, {} unchanged, {} failed",
        summary.matched.to_string().cyan(),
        summary.unmatched,
        summary.mutated.to_string().green(),
        mutated_label,
        summary.unchanged,
        if summary.failed > 0 {
            summary.failed.to_string().red()
        } else {
            summary.failed.to_string().normal()
        }
    );
    for failure in &summary.failures {
        let label = failure
            .label
            .as_deref()
            .map(|l| format!(" ({})", l))
            .unwrap_or_default();
        println!(
            "  {} #{} {}{}: {}",
            "✗".red(),
            failure.issue,
            failure.kind,
            label,
            failure.reason
        );
    }
    if summary.dry_run {
        println!("{}", "Dry run: no issues were changed".yellow());
    }
}

pub async fn plan(ctx: &Context, refresh: bool) -> Result<()> {
    let rules = ctx.rules()?;
    let issues = load_issues(ctx, refresh).await?;
    let plan = build_plan(&issues, &rules, ctx.config.convergence);
    let summary = RunSummary::from_plan(&plan);

    if ctx.json {
        println!(
            "{}",
            serde_json::json!({ "plan": plan, "summary": summary })
        );
    } else {
        print_plan(&plan);
        print_summary(&summary);
    }
    Ok(())
}

/// Sink used for dry runs without credentials. The applier never calls it
/// in dry-run mode.
struct Detached;

#[async_trait]
impl LabelSink for Detached {
    async fn add_label(&self, issue: u64, label: &str) -> relabel_core::Result<()> {
        Err(detached(issue, label))
    }

    async fn remove_label(&self, issue: u64, label: &str) -> relabel_core::Result<()> {
        Err(detached(issue, label))
    }
}

fn detached(issue: u64, label: &str) -> relabel_core::Error {
    relabel_core::Error::Mutation {
        issue,
        label: label.to_string(),
        reason: "no GitHub client configured".into(),
    }
}

pub async fn apply(ctx: &Context, dry_run: bool, refresh: bool) -> Result<()> {
    let rules = ctx.rules()?;
    let mode = RunMode::from_dry_run(dry_run);
    // Fail on missing credentials before fetching or planning anything
    let client = if mode.is_dry_run() {
        None
    } else {
        Some(ctx.client()?)
    };

    let issues = load_issues(ctx, refresh).await?;
    let plan = build_plan(&issues, &rules, ctx.config.convergence);
    info!(
        matched = plan.matched(),
        pending = plan.pending().count(),
        dry_run,
        "plan built"
    );

    let report = match &client {
        Some(client) => relabel_core::apply(&plan, client, mode).await,
        None => relabel_core::apply(&plan, &Detached, mode).await,
    };
    let summary = RunSummary::new(&plan, &report);

    if ctx.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_plan(&plan);
        print_summary(&summary);
    }

    if !summary.is_clean() {
        bail!("{} issue(s) failed", summary.failed);
    }
    Ok(())
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Priority")]
    priority: u32,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Requires")]
    old: String,
}

pub fn rules(ctx: &Context) -> Result<()> {
    let rules = ctx.rules()?;

    if ctx.json {
        println!("{}", serde_json::to_string(&rules)?);
        return Ok(());
    }

    let rows: Vec<RuleRow> = rules
        .iter()
        .enumerate()
        .map(|(index, rule)| RuleRow {
            index,
            priority: rule.priority,
            result: rule.result.clone(),
            old: rule
                .old
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" + "),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    let source = if ctx.config.rules.is_empty() {
        "built-in rule table"
    } else {
        "rules from config"
    };
    println!(
        "{}",
        format!("({}, {} legacy labels)", source, rules.old_labels().len()).dimmed()
    );
    Ok(())
}

pub fn replay(ctx: &Context, number: u64) -> Result<()> {
    let rules = ctx.rules()?;
    let cache = ctx.snapshot();
    let issues = cache
        .load()?
        .context("No snapshot found. Run 'relabel fetch' first.")?;
    let issue = issues
        .iter()
        .find(|i| i.number == number)
        .with_context(|| format!("Issue #{} is not in the snapshot", number))?;

    let labels = replay_issue(issue)?;
    let matches = match_rules(&labels, &rules);

    if ctx.json {
        println!(
            "{}",
            serde_json::json!({
                "issue": issue.number,
                "labels": labels,
                "matches": matches.all,
                "winner": matches.winner,
            })
        );
        return Ok(());
    }

    println!("{} {}", format!("#{}", issue.number).cyan(), issue.title);
    println!("  Timeline events: {}", issue.timeline.len());
    println!();
    println!("{}", "Labels after replay:".bold());
    if labels.is_empty() {
        println!("  (none)");
    }
    for name in labels.names() {
        println!("  {}", name);
    }
    println!();
    println!("{}", "Matching rules:".bold());
    if matches.is_empty() {
        println!("  (none)");
    }
    for rule in &matches.all {
        let is_winner = matches.winner.is_some_and(|w| std::ptr::eq(w, *rule));
        if is_winner {
            println!("  {} {}", "→".green(), rule.to_string().green());
        } else {
            println!("    {}", rule);
        }
    }
    Ok(())
}

pub fn config_show(ctx: &Context) -> Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&ctx.config)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Current configuration:".bold(),
        ctx.config_path.display().to_string().dimmed()
    );
    println!();
    let content = toml::to_string_pretty(&ctx.config).context("Failed to render config")?;
    print!("{}", content);
    Ok(())
}

pub fn config_init(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(relabel_core::snapshot::RELABEL_DIR).join("config.toml"));

    if path.exists() && !force {
        bail!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, Config::default_with_comments())?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}
