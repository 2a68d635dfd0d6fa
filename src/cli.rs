use crate::collaborator::{Generator, HttpGenerator, InMemoryPersistence, Persistence};
use crate::kinds::{
    Bnpl, CreditEngine, IslandHopper, ItineraryPlanner, ItineraryWizard, MovieMaker,
    MovieRenderer, RouteOptimizer, WizardType,
};
use crate::model::{Phase, WizardEvent, WizardSettings};
use crate::orchestrator::{run_controller, Collaborators, WizardCommand};
use crate::storage::{delete_result, export_json, load_recent, results_dir, JsonFilePersistence};
use crate::wizard::{Wizard, WizardKind};
use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

/// Parse `KEY=VALUE`; the value is read as JSON and falls back to a plain string.
fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in `{s}`"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "nusantarago-wizard",
    version,
    about = "Fill in and submit a NusantaraGo planning wizard from the command line"
)]
pub struct Cli {
    /// Wizard to run
    #[arg(value_enum, required_unless_present_any = ["list_saved", "delete_saved"])]
    pub wizard: Option<WizardType>,

    /// Set a draft field (repeatable), e.g. --set amount=5000000 --set title=Bali
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, Value)>,

    /// Append a value to a list field (repeatable), e.g. --push islands=Bali
    #[arg(long = "push", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub push: Vec<(String, Value)>,

    /// Print the final wizard state as JSON
    #[arg(long)]
    pub json: bool,

    /// Run silently: suppress all output except errors (for scripts)
    #[arg(long)]
    pub silent: bool,

    /// Remote generation endpoint; the built-in generator is used when omitted
    #[arg(long)]
    pub generator_url: Option<String>,

    /// Upper bound for one generation attempt
    #[arg(long, default_value = "30s")]
    pub generation_timeout: humantime::Duration,

    /// Wait for the generator without a time limit
    #[arg(long, conflicts_with = "generation_timeout")]
    pub no_timeout: bool,

    /// Use --auto-save true to store reviewed results on disk
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// Override the directory holding saved results
    #[arg(long)]
    pub data_dir: Option<std::path::PathBuf>,

    /// Export the final wizard state as JSON
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// List the N most recent saved results and exit
    #[arg(long, value_name = "N")]
    pub list_saved: Option<usize>,

    /// Delete the saved result with this id and exit
    #[arg(long, value_name = "ID", conflicts_with = "list_saved")]
    pub delete_saved: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    if let Some(limit) = args.list_saved {
        return list_saved(&args, limit);
    }
    if let Some(id) = args.delete_saved.as_deref() {
        return delete_saved(&args, id);
    }

    let wizard = args.wizard.context("a wizard type is required")?;
    match wizard {
        WizardType::IslandHopper => drive(IslandHopper, RouteOptimizer::default(), &args).await,
        WizardType::Bnpl => drive(Bnpl, CreditEngine, &args).await,
        WizardType::MovieMaker => drive(MovieMaker, MovieRenderer, &args).await,
        WizardType::Itinerary => drive(ItineraryWizard, ItineraryPlanner, &args).await,
    }
}

/// Build `WizardSettings` from CLI arguments.
pub fn build_settings(args: &Cli) -> WizardSettings {
    WizardSettings {
        generation_timeout: if args.no_timeout {
            None
        } else {
            Some(Duration::from(args.generation_timeout))
        },
        generator_url: args.generator_url.clone(),
        auto_save: args.auto_save,
        data_dir: args.data_dir.clone(),
        ..WizardSettings::default()
    }
}

fn generator_for<G>(
    builtin: impl Generator<G> + 'static,
    settings: &WizardSettings,
) -> Result<Arc<dyn Generator<G>>>
where
    G: DeserializeOwned + Send + 'static,
{
    let generator: Arc<dyn Generator<G>> = match settings.generator_url.as_deref() {
        Some(url) => Arc::new(HttpGenerator::new(url, settings)?),
        None => Arc::new(builtin),
    };
    Ok(generator)
}

/// Field assignments in application order: `--set` first, then one list per `--push` key.
fn draft_edits<K: WizardKind>(wizard: &Wizard<K>, args: &Cli) -> Vec<(String, Value)> {
    let mut edits = args.set.clone();
    let mut pushed: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (key, value) in &args.push {
        let list = pushed.entry(key.clone()).or_insert_with(|| {
            let base = edits
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v)
                .or_else(|| wizard.field(key));
            match base {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            }
        });
        list.push(value.clone());
    }
    edits.extend(pushed.into_iter().map(|(k, v)| (k, Value::Array(v))));
    edits
}

fn progress_line(ev: &WizardEvent) -> Option<String> {
    match ev {
        WizardEvent::StepChanged { index, step } => Some(format!("Step {}: {step}", index + 1)),
        WizardEvent::PhaseChanged { phase } => Some(format!("== {} ==", phase.as_str())),
        WizardEvent::TaskStarted { epoch } => Some(format!("Generating (attempt #{epoch})…")),
        WizardEvent::TaskFailed { reason } => Some(format!("Generation failed: {reason}")),
        WizardEvent::Rejected { error } => Some(format!("Rejected: {error}")),
        WizardEvent::Saved { id } => Some(format!("Saved: {id}")),
        WizardEvent::Info(info) => Some(info.to_message()),
        WizardEvent::FieldUpdated { .. } | WizardEvent::Reviewing { .. } => None,
    }
}

/// Fill the draft, walk every step, submit once, and report the outcome.
async fn drive<K: WizardKind>(
    kind: K,
    builtin: impl Generator<K::Generated> + 'static,
    args: &Cli,
) -> Result<()> {
    let settings = build_settings(args);
    let wizard = Wizard::new(kind);
    let generator = generator_for(builtin, &settings)?;
    let persistence: Arc<dyn Persistence> = if settings.auto_save {
        Arc::new(JsonFilePersistence::new(results_dir(&settings)?))
    } else {
        Arc::new(InMemoryPersistence::default())
    };
    let edits = draft_edits(&wizard, args);
    let step_count = wizard.kind().steps().len();

    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<WizardEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WizardCommand<K::Step>>();
    let controller = tokio::spawn(run_controller(
        wizard,
        Collaborators {
            generator,
            persistence,
        },
        settings,
        evt_tx,
        cmd_rx,
    ));

    for (key, value) in edits {
        let _ = cmd_tx.send(WizardCommand::SetField { key, value });
    }
    for _ in 1..step_count {
        let _ = cmd_tx.send(WizardCommand::Advance);
    }
    let _ = cmd_tx.send(WizardCommand::Submit);

    let (out_tx, out_handle) = if args.silent {
        (None, None)
    } else {
        let (tx, handle) = spawn_output_writer();
        (Some(tx), Some(handle))
    };

    let mut rejection: Option<String> = None;
    while let Some(ev) = evt_rx.recv().await {
        if !args.json {
            if let (Some(tx), Some(line)) = (out_tx.as_ref(), progress_line(&ev)) {
                let _ = tx.send(OutputLine::Stderr(line));
            }
        }
        match ev {
            WizardEvent::Rejected { error } if rejection.is_none() => {
                rejection = Some(error);
                let _ = cmd_tx.send(WizardCommand::Quit);
            }
            WizardEvent::Reviewing { .. } | WizardEvent::TaskFailed { .. } => {
                let _ = cmd_tx.send(WizardCommand::Quit);
            }
            WizardEvent::FieldUpdated { key } => {
                tracing::debug!(%key, "field updated");
            }
            _ => {}
        }
    }

    let wizard = controller.await.context("wizard controller task failed")?;

    if let Some(p) = args.export_json.as_deref() {
        export_json(p, &wizard.snapshot())?;
    }

    if let Some(tx) = out_tx.as_ref() {
        if args.json {
            let out = serde_json::to_string_pretty(&wizard.snapshot())?;
            let _ = tx.send(OutputLine::Stdout(out));
        } else {
            let summary = crate::text_summary::build_text_summary(&wizard)?;
            for line in summary.lines {
                let _ = tx.send(OutputLine::Stdout(line));
            }
        }
    }
    if let Some(tx) = out_tx {
        drop(tx);
    }
    if let Some(handle) = out_handle {
        let _ = handle.await;
    }

    if let Some(error) = rejection {
        anyhow::bail!("{} wizard stopped: {error}", wizard.kind().name());
    }
    if wizard.phase() != Phase::Reviewing {
        anyhow::bail!(
            "{} wizard did not produce a result: {}",
            wizard.kind().name(),
            wizard.task().error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn list_saved(args: &Cli, limit: usize) -> Result<()> {
    let dir = results_dir(&build_settings(args))?;
    let records = load_recent(&dir, limit)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if args.silent {
        return Ok(());
    }
    if records.is_empty() {
        println!("No saved results in {}", dir.display());
    }
    for r in records {
        println!("{}  {:<14} {}", r.saved_at_utc, r.wizard, r.id);
    }
    Ok(())
}

fn delete_saved(args: &Cli, id: &str) -> Result<()> {
    let dir = results_dir(&build_settings(args))?;
    let record = load_recent(&dir, usize::MAX)?
        .into_iter()
        .find(|r| r.id == id)
        .with_context(|| format!("no saved result with id {id} in {}", dir.display()))?;
    delete_result(&dir, &record)?;
    if !args.silent {
        println!("Deleted {} ({})", record.id, record.wizard);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assignments_parse_json_or_fall_back_to_text() {
        assert_eq!(
            parse_assignment("amount=5000000").unwrap(),
            ("amount".to_string(), json!(5_000_000))
        );
        assert_eq!(
            parse_assignment("title=Jejak Bali").unwrap(),
            ("title".to_string(), json!("Jejak Bali"))
        );
        assert_eq!(
            parse_assignment("islands=[\"Bali\",\"Lombok\"]").unwrap().1,
            json!(["Bali", "Lombok"])
        );
        assert!(parse_assignment("no-equals").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn pushes_extend_the_initial_list() {
        let args = Cli::parse_from([
            "nusantarago-wizard",
            "island-hopper",
            "--push",
            "islands=Bali",
            "--push",
            "islands=Lombok",
        ]);
        let wizard = Wizard::new(IslandHopper);
        let edits = draft_edits(&wizard, &args);
        assert_eq!(edits, vec![("islands".to_string(), json!(["Bali", "Lombok"]))]);
    }

    #[test]
    fn no_timeout_clears_the_generation_limit() {
        let args = Cli::parse_from(["nusantarago-wizard", "bnpl", "--no-timeout"]);
        let settings = build_settings(&args);
        assert_eq!(settings.generation_timeout, None);
        assert!(!settings.auto_save);

        let args = Cli::parse_from(["nusantarago-wizard", "bnpl", "--generation-timeout", "5s"]);
        assert_eq!(
            build_settings(&args).generation_timeout,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn wizard_is_optional_only_when_listing() {
        assert!(Cli::try_parse_from(["nusantarago-wizard"]).is_err());
        assert!(Cli::try_parse_from(["nusantarago-wizard", "--list-saved", "3"]).is_ok());
        assert!(Cli::try_parse_from(["nusantarago-wizard", "--delete-saved", "abc"]).is_ok());
    }

    #[tokio::test]
    async fn delete_saved_removes_only_the_named_record() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("results");
        for (id, at) in [("keep", "2026-01-01T00:00:00Z"), ("drop", "2026-02-01T00:00:00Z")] {
            crate::storage::save_result(
                &dir,
                &crate::model::SavedResult {
                    id: id.to_string(),
                    wizard: "bnpl".to_string(),
                    saved_at_utc: at.to_string(),
                    draft: json!({}),
                    result: json!({}),
                },
            )
            .unwrap();
        }

        let data_dir = tmp.path().to_str().unwrap();
        let args = Cli::parse_from([
            "nusantarago-wizard",
            "--data-dir",
            data_dir,
            "--delete-saved",
            "drop",
        ]);
        run(args).await.unwrap();
        let left: Vec<_> = load_recent(&dir, 10).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(left, vec!["keep".to_string()]);

        let again = Cli::parse_from([
            "nusantarago-wizard",
            "--data-dir",
            data_dir,
            "--delete-saved",
            "drop",
        ]);
        let err = run(again).await.unwrap_err();
        assert!(err.to_string().contains("no saved result with id drop"));
    }
}
