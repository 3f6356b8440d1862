use std::fmt::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

use git2onenote::{run, Cli, Commands};

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp config file");
    std::fs::write(file.path(), yaml).expect("write temp config");
    file
}

fn minimal_config() -> NamedTempFile {
    config_file(
        r#"gitlab:
  base_url: "https://gitlab.example.com"
  branch: main
links:
  - name: docs
    project_id: 42
    section_id: "1-abc"
"#,
    )
}

#[test]
fn help_lists_every_subcommand() {
    let mut cmd = Command::cargo_bin("git2onenote").expect("binary builds");
    cmd.arg("--help");

    cmd.assert().success().stdout(
        predicate::str::contains("sync")
            .and(predicate::str::contains("serve"))
            .and(predicate::str::contains("sections"))
            .and(predicate::str::contains("projects"))
            .and(predicate::str::contains("whoami")),
    );
}

#[test]
fn sync_fails_cleanly_when_the_config_file_is_missing() {
    let mut cmd = Command::cargo_bin("git2onenote").expect("binary builds");
    cmd.arg("sync").arg("--config").arg("definitely/not/here.yaml");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("read config file"));
}

#[test]
fn sync_fails_at_load_time_for_an_invalid_schedule() {
    let config = config_file(
        r#"gitlab:
  base_url: "https://gitlab.example.com"
  branch: main
sync:
  daily_at: "25:00"
links:
  - name: docs
    project_id: 42
    section_id: "1-abc"
"#,
    );

    let mut cmd = Command::cargo_bin("git2onenote").expect("binary builds");
    cmd.arg("sync").arg("--config").arg(config.path());

    // Validation must reject the file before any client construction.
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn sync_requires_the_gitlab_token_env_secret() {
    let config = minimal_config();

    let mut cmd = Command::cargo_bin("git2onenote").expect("binary builds");
    cmd.arg("sync")
        .arg("--config")
        .arg(config.path())
        .env_remove("GITLAB_TOKEN");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("GITLAB_TOKEN"));
}

/// Layer that keeps each event's `message` field for later inspection.
struct RecordingLayer {
    messages: Arc<Mutex<Vec<String>>>,
}

struct MessageVisitor<'a>(&'a mut String);

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{value:?}");
        }
    }
}

impl<S> Layer<S> for RecordingLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.messages.lock().unwrap().push(message);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let layer = RecordingLayer {
        messages: messages.clone(),
    };
    let _guard = tracing::subscriber::set_default(Registry::default().with(layer));

    // A dummy path is enough: the event fires before config loading.
    let cli = Cli {
        command: Commands::Sync {
            config: PathBuf::from("dummy.yaml"),
            link: None,
        },
    };
    let _ = run(cli).await;

    let recorded = messages.lock().unwrap();
    assert!(
        recorded.iter().any(|m| m.contains("trace_initialised")),
        "expected a 'trace_initialised' event, got: {recorded:?}"
    );
}
