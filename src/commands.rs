//! Command handlers: log in, build the Sync Controller and run one command.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local};
use console::Term;
use tokio::sync::mpsc;

use crate::auth::{self, User};
use crate::cli::{Cli, Command, SettingsAction};
use crate::config::{GradeFixConfig, RemoteSettings};
use crate::entry::{Action, Entry, EntryDraft, EntryPatch};
use crate::error::{GradeFixError, LifecycleError};
use crate::local::{self, LocalCache, REMOTE_SETTINGS_KEY};
use crate::report::{self, ListFilter, Stats};
use crate::store::FirestoreClient;
use crate::sync::{SyncController, SyncMode};
use crate::ui::{Printer, SyncProgress};

type Controller = SyncController<FirestoreClient>;

const BUDDHIST_ERA_OFFSET: i32 = 543;
const STATE_POLL: Duration = Duration::from_millis(500);

pub async fn run(cli: Cli) -> Result<()> {
    let config = GradeFixConfig::load()?;
    let printer = Printer::default();

    match cli.command {
        Command::Users => {
            printer.users(&auth::directory());
            Ok(())
        }
        Command::Settings { action } => settings(&config, &printer, action),
        command => {
            let user = login(&config, cli.user.as_deref(), cli.password.as_deref())?;
            tracing::debug!(username = %user.username, role = %user.role, "Logged in");
            let ctrl = build_controller(&config)?;
            session(&config, &printer, &ctrl, &user, command).await
        }
    }
}

fn login(config: &GradeFixConfig, username: Option<&str>, password: Option<&str>) -> Result<User> {
    let (Some(username), Some(password)) = (username, password) else {
        bail!("login required: pass --user and --password (or GRADEFIX_USER / GRADEFIX_PASSWORD)");
    };
    let overrides = local::load_password_overrides(&config.storage());
    Ok(auth::authenticate(
        &auth::directory(),
        &overrides,
        username,
        password,
    )?)
}

fn build_controller(config: &GradeFixConfig) -> Result<Arc<Controller>> {
    let store = if config.is_configured() {
        Some(FirestoreClient::new(
            &config.project_id,
            config.api_key.clone(),
            config.collection.clone(),
            config.request_timeout(),
        )?)
    } else {
        tracing::warn!("No remote store configured, working from the local cache");
        None
    };
    let cache = LocalCache::new(config.storage());
    let ctrl = Arc::new(SyncController::new(store, cache, config.reconcile_delay()));
    ctrl.load_cached();
    Ok(ctrl)
}

/// Foreground sync with the loading spinner. Failure is not fatal: the
/// controller has already fallen back to the cache.
async fn refresh(ctrl: &Controller) {
    let progress = SyncProgress::start("Syncing entries...");
    let _ = ctrl.sync(SyncMode::Foreground).await;
    progress.finish();
}

fn find_entry(ctrl: &Controller, id: &str) -> Result<Entry, GradeFixError> {
    ctrl.entries()
        .into_iter()
        .find(|e| e.id == id)
        .ok_or_else(|| GradeFixError::EntryNotFound(id.to_string()))
}

fn confirm_delete(entry: &Entry) -> Result<bool> {
    let term = Term::stdout();
    term.write_line(&format!(
        "Delete the entry for \"{}\" ({} {})? [y/N]",
        entry.student_name, entry.subject_code, entry.subject
    ))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn session(
    config: &GradeFixConfig,
    printer: &Printer,
    ctrl: &Arc<Controller>,
    user: &User,
    command: Command,
) -> Result<()> {
    match command {
        Command::List {
            search,
            status,
            cached,
        } => {
            let filter = ListFilter {
                search,
                status: status.map(Into::into),
            };
            let entries = if cached {
                ctrl.read_cache()
            } else {
                refresh(ctrl).await;
                printer.status_line(&ctrl.state());
                ctrl.entries()
            };
            printer.entries(report::filter_entries(&entries, user, &filter));
        }

        Command::Stats { scope } => {
            refresh(ctrl).await;
            printer.status_line(&ctrl.state());
            printer.stats(&Stats::compute(&ctrl.entries(), scope.into(), user));
        }

        Command::Add {
            student_id,
            student_name,
            subject,
            subject_code,
            grade,
            term,
            year,
        } => {
            let academic_year =
                year.unwrap_or_else(|| (Local::now().year() + BUDDHIST_ERA_OFFSET).to_string());
            let draft = EntryDraft {
                teacher_name: user.name.clone(),
                student_id,
                student_name,
                subject,
                subject_code,
                grade,
                term,
                academic_year,
            };
            let (entry, status) = ctrl.create_entry(draft).await?;
            printer.write_result(&format!("Saved entry {}", entry.id), &status);
            ctrl.settle().await;
        }

        Command::Edit {
            id,
            student_id,
            student_name,
            subject,
            subject_code,
            grade,
            term,
            year,
        } => {
            refresh(ctrl).await;
            let patch = EntryPatch {
                student_id,
                student_name,
                subject,
                subject_code,
                grade,
                term,
                academic_year: year,
                ..Default::default()
            };
            let status = ctrl.edit_entry(user, &id, patch).await?;
            printer.write_result(&format!("Updated entry {id}"), &status);
            ctrl.settle().await;
        }

        Command::Resolve {
            id,
            new_grade,
            date,
            note,
        } => {
            refresh(ctrl).await;
            let action = Action::Resolve {
                new_grade: new_grade.unwrap_or_default(),
                resolved_date: date.unwrap_or_else(|| Local::now().date_naive()),
                note,
            };
            let status = ctrl.transition(user, &id, &action).await?;
            printer.write_result(&format!("Marked {id} as resolved"), &status);
        }

        Command::Record { id } => {
            refresh(ctrl).await;
            let status = ctrl.transition(user, &id, &Action::Record).await?;
            printer.write_result(&format!("Recorded {id}"), &status);
        }

        Command::Delete { id, yes } => {
            refresh(ctrl).await;
            let entry = find_entry(ctrl, &id)?;
            let confirmed = yes || confirm_delete(&entry)?;
            match ctrl
                .transition(user, &id, &Action::Delete { confirmed })
                .await
            {
                Ok(status) => printer.write_result(&format!("Deleted {id}"), &status),
                Err(GradeFixError::Lifecycle(LifecycleError::NotConfirmed)) => {
                    println!("Cancelled.");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Command::Export {
            output,
            search,
            status,
        } => {
            refresh(ctrl).await;
            let filter = ListFilter {
                search,
                status: status.map(Into::into),
            };
            let entries = ctrl.entries();
            let rows = report::filter_entries(&entries, user, &filter);
            let path = output.unwrap_or_else(|| {
                report::default_export_name(Local::now().date_naive()).into()
            });
            std::fs::write(&path, report::export_csv(rows.iter().copied()))
                .with_context(|| format!("failed to write {}", path.display()))?;
            printer.success(&format!("Exported {} entries to {}", rows.len(), path.display()));
        }

        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let drafts = report::parse_import(&text, &user.name)?;
            let (mut imported, mut offline, mut skipped) = (0, 0, 0);
            for draft in drafts {
                match ctrl.create_entry(draft).await {
                    Ok((_, status)) => {
                        imported += 1;
                        if !status.is_confirmed() {
                            offline += 1;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "Skipping import row");
                        skipped += 1;
                    }
                }
            }
            let mut summary = format!("Imported {imported} entries");
            if offline > 0 {
                summary.push_str(&format!(", {offline} saved locally only"));
            }
            if skipped > 0 {
                summary.push_str(&format!(", {skipped} rows skipped"));
            }
            printer.success(&summary);
            ctrl.settle().await;
        }

        Command::Watch => watch(config, printer, ctrl, user).await?,

        Command::Passwd { old, new, confirm } => {
            auth::change_password_persisted(
                &config.storage(),
                &user.username,
                &old,
                &new,
                &confirm,
            )?;
            printer.success("Password changed");
        }

        Command::Users | Command::Settings { .. } => {}
    }
    Ok(())
}

/// Keeps the list on screen, refreshing every poll interval and whenever a
/// line arrives on stdin. Ctrl-C stops.
async fn watch(
    config: &GradeFixConfig,
    printer: &Printer,
    ctrl: &Arc<Controller>,
    user: &User,
) -> Result<()> {
    refresh(ctrl).await;

    let (tx, rx) = mpsc::channel(8);
    let refresh_task = ctrl.start_background(config.poll_interval(), rx);

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || tx.blocking_send(()).is_err() {
                break;
            }
        }
    });

    let render = || {
        let entries = ctrl.entries();
        println!();
        printer.status_line(&ctrl.state());
        printer.entries(report::filter_entries(&entries, user, &ListFilter::default()));
    };
    render();

    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    follow_state(ctrl, interrupted, render).await;

    refresh_task.stop();
    Ok(())
}

/// Calls `on_change` whenever the last sync time or the offline flag moves,
/// until `shutdown` resolves. `shutdown` is polled as one future for the
/// whole loop.
async fn follow_state(
    ctrl: &Controller,
    shutdown: impl Future<Output = ()>,
    mut on_change: impl FnMut(),
) {
    let snapshot = || {
        let s = ctrl.state();
        (s.last_sync, s.offline)
    };
    let mut seen = snapshot();
    let mut ticker = tokio::time::interval(STATE_POLL);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let now = snapshot();
                if now != seen {
                    seen = now;
                    on_change();
                }
            }
        }
    }
}

fn settings(config: &GradeFixConfig, printer: &Printer, action: SettingsAction) -> Result<()> {
    let storage = config.storage();
    match action {
        SettingsAction::Set {
            api_key,
            project_id,
        } => {
            let remote = RemoteSettings {
                api_key: api_key.trim().to_string(),
                project_id: project_id.trim().to_string(),
            };
            remote.validate()?;
            storage.set(REMOTE_SETTINGS_KEY, &remote)?;
            printer.success(&format!("Connected to project {}", remote.project_id));
        }
        SettingsAction::Show => {
            let masked = match config.api_key.chars().count() {
                0 => "-".to_string(),
                n if n <= 6 => "*".repeat(n),
                _ => format!("{}...", config.api_key.chars().take(6).collect::<String>()),
            };
            let project = match config.project_id.as_str() {
                "" => "-",
                p => p,
            };
            println!("project_id  {project}");
            println!("api_key     {masked}");
            println!("collection  {}", config.collection);
            println!("data_dir    {}", storage.dir().display());
            println!("configured  {}", config.is_configured());
        }
        SettingsAction::Clear => {
            storage.remove(REMOTE_SETTINGS_KEY)?;
            printer.success("Stored connection removed");
        }
    }
    Ok(())
}
