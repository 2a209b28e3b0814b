use pakstore_core::domain::{has_update, DerivedState, Pak, PlatformFilter};
use pakstore_core::{
    InstallMode, InstallOutcome, PakStoreError, ProgressReporter, Result, Session, Settings,
    UserConfig,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::cli::{CommandCli, ConfigCommand, ConfigSetCommand, PakStoreCli};
use crate::outcome::{error_kind, ExecutionOutcome, Line};

pub fn execute(cli: &PakStoreCli) -> ExecutionOutcome {
    let settings = Settings::from_env();
    let result = match &cli.command {
        CommandCli::Config(command) => config(&settings, command),
        command => match Session::open(settings) {
            Ok(session) => run(&session, cli.filter_override(), command),
            Err(err) => {
                debug!(error = ?err, "store failed to start");
                return startup_failure(err);
            }
        },
    };
    result.unwrap_or_else(ExecutionOutcome::from)
}

fn startup_failure(err: PakStoreError) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::from(err);
    outcome.message = format!("unable to start the store: {}", outcome.message);
    outcome
}

fn run(
    session: &Session,
    filter: Option<PlatformFilter>,
    command: &CommandCli,
) -> Result<ExecutionOutcome> {
    match command {
        CommandCli::Browse(args) => browse(session, filter, args.category.as_deref()),
        CommandCli::Updates => updates(session, filter),
        CommandCli::Installed => installed(session, filter),
        CommandCli::Info(args) => info(session, &args.pak, args.screenshots),
        CommandCli::Install(args) => install(session, &args.pak),
        CommandCli::Update(args) => update(session, filter, &args.paks, args.all),
        CommandCli::Uninstall(args) => uninstall(session, &args.pak),
        CommandCli::Migrate => Ok(migrate(session)),
        CommandCli::Config(command) => config(session.settings(), command),
    }
}

fn browse(
    session: &Session,
    filter: Option<PlatformFilter>,
    category: Option<&str>,
) -> Result<ExecutionOutcome> {
    let state = session.derive(filter)?;
    let Some(category) = category else {
        let counts: serde_json::Map<String, Value> = state
            .browse_by_category
            .iter()
            .map(|(name, paks)| (name.clone(), json!(paks.len())))
            .collect();
        let lines = state
            .browse_by_category
            .iter()
            .map(|(name, paks)| Line::Item(format!("{name} ({})", paks.len())))
            .collect();
        let message = if state.has_available() {
            format!("{} categories", counts.len())
        } else {
            "No paks available to install".to_string()
        };
        return Ok(ExecutionOutcome::success(message, json!({ "categories": counts }))
            .with_lines(lines));
    };

    let Some(entries) = state.browse_by_category.get(category) else {
        return Ok(ExecutionOutcome::user_error(
            format!("no paks available in category '{category}'"),
            json!({ "category": category, "categories": state.categories() }),
        ));
    };
    let paks: Vec<&Pak> = entries.values().collect();
    let lines = paks
        .iter()
        .map(|pak| Line::Item(format!("{}  {}  {}", pak.display_name, pak.version, pak.description)))
        .collect();
    Ok(ExecutionOutcome::success(
        format!("{} paks in {category}", paks.len()),
        json!({ "category": category, "paks": paks }),
    )
    .with_lines(lines))
}

fn updates(session: &Session, filter: Option<PlatformFilter>) -> Result<ExecutionOutcome> {
    let state = session.derive(filter)?;
    if state.updates_available.is_empty() {
        return Ok(ExecutionOutcome::success(
            "All installed paks are up to date",
            json!({ "updates": [] }),
        ));
    }
    let lines = state
        .updates_available
        .iter()
        .map(|update| {
            Line::Item(format!(
                "{}  {} → {}",
                update.pak.display_name, update.installed_version, update.pak.version
            ))
        })
        .collect();
    let details: Vec<Value> = state
        .updates_available
        .iter()
        .map(|update| {
            json!({
                "identity": update.identity,
                "display_name": update.pak.display_name,
                "installed_version": update.installed_version,
                "latest_version": update.pak.version,
                "matched_by": update.matched_by.as_str(),
            })
        })
        .collect();
    Ok(ExecutionOutcome::success(
        format!("{} updates available", details.len()),
        json!({ "updates": details }),
    )
    .with_lines(lines))
}

fn install_status(state: &DerivedState, identity: &str) -> (&'static str, Option<String>) {
    if state.up_to_date.contains_key(identity) {
        return ("current", None);
    }
    match state
        .updates_available
        .iter()
        .find(|update| update.identity == identity)
    {
        Some(update) => ("update_available", Some(update.pak.version.clone())),
        None => ("not_in_catalog", None),
    }
}

fn installed(session: &Session, filter: Option<PlatformFilter>) -> Result<ExecutionOutcome> {
    let state = session.derive(filter)?;
    let mut lines = Vec::new();
    let mut details = Vec::new();
    for (identity, record) in &state.installed_by_identity {
        let (status, latest) = install_status(&state, identity);
        let suffix = match (status, &latest) {
            ("update_available", Some(latest)) => format!("update available: {latest}"),
            ("not_in_catalog", _) => "not in catalog".to_string(),
            _ => "up to date".to_string(),
        };
        lines.push(Line::Item(format!(
            "{}  {}  ({suffix})",
            record.display_name, record.version
        )));
        details.push(json!({
            "identity": identity,
            "record": record,
            "status": status,
            "latest_version": latest,
        }));
    }
    Ok(ExecutionOutcome::success(
        format!("{} paks installed", details.len()),
        json!({ "installed": details }),
    )
    .with_lines(lines))
}

fn info(session: &Session, query: &str, screenshots: bool) -> Result<ExecutionOutcome> {
    let pak = session.lookup(query)?;
    let record = session.installed_record(pak)?;
    let pending = record
        .as_ref()
        .is_some_and(|record| has_update(&record.version, &pak.version));

    let mut lines = vec![Line::Heading(format!("{} {}", pak.display_name, pak.version))];
    if !pak.author.is_empty() {
        lines.push(Line::Item(format!("by {}", pak.author)));
    }
    if !pak.description.is_empty() {
        lines.push(Line::Item(pak.description.clone()));
    }
    lines.push(Line::Item(format!("type: {}", pak.pak_type.as_str())));
    if !pak.platforms.is_empty() {
        lines.push(Line::Item(format!("platforms: {}", pak.platforms.join(", "))));
    }
    match &record {
        Some(record) => lines.push(Line::Item(format!("installed: {}", record.version))),
        None => lines.push(Line::Note("not installed".to_string())),
    }
    if pending {
        if let Some(notes) = pak.whats_new() {
            lines.push(Line::Heading(format!("What's new in {}", pak.version)));
            lines.push(Line::Item(notes.to_string()));
        }
    }
    let changelog = pak.changelog_newest_first();
    if !changelog.is_empty() {
        lines.push(Line::Heading("Changelog".to_string()));
        for (version, notes) in &changelog {
            lines.push(Line::Item(format!("{version}: {notes}")));
        }
    }

    let downloaded = if screenshots {
        let files = session.screenshots(pak)?;
        if !files.is_empty() {
            lines.push(Line::Heading("Screenshots".to_string()));
            lines.extend(files.iter().map(|path| Line::Item(path.display().to_string())));
        }
        files
    } else {
        Vec::new()
    };

    Ok(ExecutionOutcome::success(
        pak.display_name.clone(),
        json!({
            "pak": pak,
            "installed": record,
            "has_update": pending,
            "changelog": changelog
                .iter()
                .map(|(version, notes)| json!({ "version": version, "notes": notes }))
                .collect::<Vec<_>>(),
            "screenshots": downloaded,
        }),
    )
    .with_lines(lines))
}

fn install(session: &Session, query: &str) -> Result<ExecutionOutcome> {
    let pak = session.lookup(query)?;
    if pak.disabled {
        return Err(PakStoreError::NotFound(query.to_string()));
    }
    if let Some(record) = session.installed_record(pak)? {
        return Ok(ExecutionOutcome::user_error(
            format!("{} is already installed ({})", pak.display_name, record.version),
            json!({ "installed": record, "hint": "use `pakstore update` to update it" }),
        ));
    }

    let progress = ProgressReporter::download(format!("Downloading {}", pak.display_name));
    let outcome = session
        .installer()
        .install_or_update(pak, InstallMode::Install, &progress)?;
    Ok(match outcome {
        InstallOutcome::Completed {
            version,
            destination,
            store_updated,
            ..
        } => {
            progress.finish(format!("Installed {} {version}", pak.display_name));
            ExecutionOutcome::success(
                format!("Installed {} {version}", pak.display_name),
                json!({
                    "pak": pak.display_name,
                    "version": version,
                    "destination": destination,
                    "store_updated": store_updated,
                }),
            )
        }
        InstallOutcome::Cancelled => ExecutionOutcome::cancelled(
            format!("Installation of {} cancelled", pak.display_name),
            json!({ "pak": pak.display_name }),
        ),
    })
}

fn update(
    session: &Session,
    filter: Option<PlatformFilter>,
    names: &[String],
    all: bool,
) -> Result<ExecutionOutcome> {
    let targets: Vec<Pak> = if all {
        session
            .derive(filter)?
            .updates_available
            .into_iter()
            .map(|update| update.pak)
            .collect()
    } else {
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            let pak = session.lookup(name)?;
            if session.installed_record(pak)?.is_none() {
                return Ok(ExecutionOutcome::user_error(
                    format!("{} is not installed", pak.display_name),
                    json!({ "pak": pak.display_name, "hint": "use `pakstore install` first" }),
                ));
            }
            targets.push(pak.clone());
        }
        targets
    };
    if targets.is_empty() {
        return Ok(ExecutionOutcome::success(
            "All installed paks are up to date",
            json!({ "updated": [] }),
        ));
    }

    let report = session.installer().update_all(&targets, |pak| {
        ProgressReporter::download(format!("Updating {}", pak.display_name))
    });

    let failed: Vec<Value> = report
        .failed
        .iter()
        .map(|failure| {
            json!({
                "pak": failure.pak,
                "error": failure.error.to_string(),
                "kind": error_kind(&failure.error),
            })
        })
        .collect();
    let details = json!({
        "updated": report.updated,
        "failed": failed,
        "not_attempted": report.not_attempted,
        "cancelled": report.cancelled,
        "store_updated": report.store_updated,
    });
    let mut lines: Vec<Line> = report
        .updated
        .iter()
        .map(|name| Line::Item(format!("updated {name}")))
        .collect();
    lines.extend(
        report
            .failed
            .iter()
            .map(|failure| Line::Item(format!("failed {}: {}", failure.pak, failure.error))),
    );
    if report.store_updated {
        lines.push(Line::Note(
            "Pak Store updated itself; restart it to use the new version".to_string(),
        ));
    }

    let summary = format!("Updated {} of {} paks", report.updated.len(), targets.len());
    let outcome = if report.cancelled {
        ExecutionOutcome::cancelled(format!("{summary}; cancelled"), details)
    } else if !report.failed.is_empty() {
        ExecutionOutcome::failure(format!("{summary}; {} failed", report.failed.len()), details)
    } else {
        ExecutionOutcome::success(summary, details)
    };
    Ok(outcome.with_lines(lines))
}

fn uninstall(session: &Session, query: &str) -> Result<ExecutionOutcome> {
    let record = session.find_installed(query)?;
    let outcome = session.installer().uninstall(&record)?;
    let details = json!({
        "pak": record.display_name,
        "removed": outcome.removed,
        "removal_error": outcome.removal_error.as_ref().map(ToString::to_string),
    });
    Ok(match &outcome.removal_error {
        None => ExecutionOutcome::success(format!("Uninstalled {}", record.display_name), details),
        Some(err) => ExecutionOutcome::failure(
            format!(
                "Forgot {} but could not remove {}: {err}",
                record.display_name,
                outcome.removed.display()
            ),
            details,
        ),
    })
}

fn migrate(session: &Session) -> ExecutionOutcome {
    let report = session.migration();
    let mut lines: Vec<Line> = report
        .changes
        .iter()
        .map(|change| {
            Line::Item(format!(
                "{} → {} (matched by {})",
                change.previous_name,
                change.fields.display_name,
                change.matched_by.as_str()
            ))
        })
        .collect();
    lines.extend(
        report
            .failures
            .iter()
            .map(|failure| Line::Note(format!("{}: {}", failure.record, failure.error))),
    );
    let changes: Vec<Value> = report
        .changes
        .iter()
        .map(|change| {
            json!({
                "previous_name": change.previous_name,
                "display_name": change.fields.display_name,
                "pak_id": change.fields.pak_id,
                "repo_url": change.fields.repo_url,
                "matched_by": change.matched_by.as_str(),
            })
        })
        .collect();
    let failures: Vec<Value> = report
        .failures
        .iter()
        .map(|failure| json!({ "record": failure.record, "error": failure.error.to_string() }))
        .collect();
    let message = if changes.is_empty() {
        "Installed paks already match the catalog".to_string()
    } else {
        format!("Updated {} installed paks", changes.len())
    };
    ExecutionOutcome::success(message, json!({ "changes": changes, "failures": failures }))
        .with_lines(lines)
}

fn config(settings: &Settings, command: &ConfigCommand) -> Result<ExecutionOutcome> {
    let path = settings.config_path();
    match command {
        ConfigCommand::Show => {
            let user = UserConfig::load(&path)?;
            let details = json!({
                "platform": settings.platform,
                "platform_filter": user.platform_filter.as_str(),
                "sd_root": settings.sd_root,
                "tools_root": settings.tools_root,
                "emus_root": settings.emus_root,
                "data_dir": settings.data_dir,
                "cache_dir": settings.cache_dir,
                "storefront_url": settings.storefront_url,
                "storefront_override": settings.storefront_override,
            });
            let lines = details
                .as_object()
                .map(|map| {
                    map.iter()
                        .map(|(key, value)| match value {
                            Value::String(text) => Line::Item(format!("{key}: {text}")),
                            Value::Null => Line::Note(format!("{key}: (unset)")),
                            other => Line::Item(format!("{key}: {other}")),
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(ExecutionOutcome::success("Store settings", details).with_lines(lines))
        }
        ConfigCommand::Set(ConfigSetCommand::PlatformFilter(args)) => {
            let user = UserConfig {
                platform_filter: args.value.into(),
            };
            user.save(&path)?;
            Ok(ExecutionOutcome::success(
                format!("platform_filter set to {}", user.platform_filter.as_str()),
                json!({ "platform_filter": user.platform_filter.as_str(), "path": path }),
            ))
        }
    }
}
