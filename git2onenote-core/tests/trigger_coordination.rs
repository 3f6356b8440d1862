use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serial_test::serial;

use git2onenote_core::config::SyncConfig;
use git2onenote_core::contract::{
    CommitInfo, FileEntry, NameFilter, NewPage, NoteSink, PageEntry, RepoSource,
};
use git2onenote_core::error::{ClientError, SyncError};
use git2onenote_core::reconcile::PassOptions;
use git2onenote_core::registry::Link;
use git2onenote_core::trigger::{BusyPolicy, TriggerCoordinator};

/// Source whose listing call takes `delay` to complete, so tests can overlap
/// triggers while a pass is in flight.
struct SlowSource {
    delay: Duration,
    files: Vec<FileEntry>,
    fail_project: Option<u64>,
}

#[async_trait]
impl RepoSource for SlowSource {
    async fn list_files(
        &self,
        project_id: u64,
        _recursive: bool,
        _filter: NameFilter,
    ) -> Result<Vec<FileEntry>, ClientError> {
        tokio::time::sleep(self.delay).await;
        if self.fail_project == Some(project_id) {
            return Err(format!("project {project_id} unreachable").into());
        }
        Ok(self.files.clone())
    }

    async fn get_file_bytes(&self, _project_id: u64, _path: &str) -> Result<Vec<u8>, ClientError> {
        Ok(b"%PDF-1.4".to_vec())
    }

    async fn list_commits(&self, _project_id: u64) -> Result<Vec<CommitInfo>, ClientError> {
        Ok(vec![])
    }
}

/// Sink backed by an in-memory page store, so later passes observe what
/// earlier passes uploaded.
#[derive(Default)]
struct MemorySink {
    pages: Mutex<Vec<PageEntry>>,
    fail_create: bool,
}

#[async_trait]
impl NoteSink for MemorySink {
    async fn list_pages(&self, _section_id: &str) -> Result<Vec<PageEntry>, ClientError> {
        Ok(self.pages.lock().unwrap().clone())
    }

    async fn create_page<'a>(
        &self,
        _section_id: &str,
        page: NewPage<'a>,
    ) -> Result<(), ClientError> {
        if self.fail_create {
            return Err("create returned 503".into());
        }
        let mut pages = self.pages.lock().unwrap();
        let identifier = format!("page-{}", pages.len());
        pages.push(PageEntry {
            title: page.title.to_string(),
            identifier,
        });
        Ok(())
    }
}

fn file_entry(name: &str) -> FileEntry {
    FileEntry {
        name: name.to_string(),
        path: name.to_string(),
        identifier: format!("blob-{name}"),
    }
}

fn links(specs: &[(&str, u64)]) -> Vec<Link> {
    specs
        .iter()
        .map(|(name, project_id)| Link {
            name: name.to_string(),
            project_id: *project_id,
            section_id: format!("section-{name}"),
            last_sync_at: None,
        })
        .collect()
}

fn config(links: Vec<Link>, busy_policy: BusyPolicy) -> SyncConfig {
    SyncConfig {
        links,
        options: PassOptions::default(),
        busy_policy,
    }
}

#[tokio::test]
#[serial]
async fn second_trigger_for_same_link_is_rejected_while_running() {
    let source = SlowSource {
        delay: Duration::from_millis(200),
        files: vec![file_entry("a.pdf")],
        fail_project: None,
    };
    let coordinator = TriggerCoordinator::new(
        source,
        MemorySink::default(),
        config(links(&[("docs", 1)]), BusyPolicy::Reject),
    )
    .expect("valid config");

    let first = coordinator.run_sync("docs");
    let second = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.run_sync("docs").await
    };
    let (first, second) = futures::join!(first, second);

    assert!(first.is_ok(), "the in-flight pass completes normally: {first:?}");
    let err = second.expect_err("the overlapping trigger is rejected");
    assert!(matches!(err, SyncError::Busy(_)), "expected Busy, got {err:?}");
}

#[tokio::test]
#[serial]
async fn passes_for_different_links_overlap() {
    let source = SlowSource {
        delay: Duration::from_millis(200),
        files: vec![],
        fail_project: None,
    };
    let coordinator = TriggerCoordinator::new(
        source,
        MemorySink::default(),
        config(links(&[("docs", 1), ("wiki", 2)]), BusyPolicy::Reject),
    )
    .expect("valid config");

    let started = Instant::now();
    let (docs, wiki) = futures::join!(coordinator.run_sync("docs"), coordinator.run_sync("wiki"));
    let elapsed = started.elapsed();

    assert!(docs.is_ok(), "docs pass completes: {docs:?}");
    assert!(wiki.is_ok(), "wiki pass completes: {wiki:?}");
    assert!(
        elapsed < Duration::from_millis(350),
        "passes for distinct links must not serialize, took {elapsed:?}"
    );
}

#[tokio::test]
#[serial]
async fn wait_policy_waits_and_runs_a_fresh_pass() {
    let source = SlowSource {
        delay: Duration::from_millis(100),
        files: vec![file_entry("a.pdf")],
        fail_project: None,
    };
    let coordinator = TriggerCoordinator::new(
        source,
        MemorySink::default(),
        config(links(&[("docs", 1)]), BusyPolicy::Wait),
    )
    .expect("valid config");

    let first = coordinator.run_sync("docs");
    let second = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        coordinator.run_sync("docs").await
    };
    let (first, second) = futures::join!(first, second);

    let first = first.expect("first pass completes");
    let second = second.expect("waiting trigger runs once the slot frees");
    assert_eq!(first.uploaded, vec!["a.pdf"]);
    assert!(
        second.uploaded.is_empty(),
        "the fresh second pass must observe the page the first pass created"
    );
    assert_eq!(second.skipped, vec!["a.pdf"]);
}

#[tokio::test]
async fn completion_is_recorded_even_with_per_file_failures() {
    let source = SlowSource {
        delay: Duration::ZERO,
        files: vec![file_entry("a.pdf")],
        fail_project: None,
    };
    let sink = MemorySink {
        fail_create: true,
        ..MemorySink::default()
    };
    let coordinator = TriggerCoordinator::new(
        source,
        sink,
        config(links(&[("docs", 1)]), BusyPolicy::Reject),
    )
    .expect("valid config");

    let before = Utc::now();
    let result = coordinator
        .run_sync("docs")
        .await
        .expect("per-file failures do not fail the pass");
    assert!(result.has_failures());

    let link = coordinator.registry().get("docs").expect("known link");
    let recorded = link
        .last_sync_at
        .expect("a completed pass records its timestamp");
    assert!(recorded >= before);
}

#[tokio::test]
async fn aborted_pass_leaves_link_state_untouched() {
    let source = SlowSource {
        delay: Duration::ZERO,
        files: vec![],
        fail_project: Some(1),
    };
    let coordinator = TriggerCoordinator::new(
        source,
        MemorySink::default(),
        config(links(&[("docs", 1)]), BusyPolicy::Reject),
    )
    .expect("valid config");

    let err = coordinator
        .run_sync("docs")
        .await
        .expect_err("listing failure aborts the pass");
    assert!(matches!(err, SyncError::SourceUnavailable(_)));

    let link = coordinator.registry().get("docs").expect("known link");
    assert!(
        link.last_sync_at.is_none(),
        "an aborted pass must not record a completion"
    );
}

#[tokio::test]
async fn unknown_link_is_rejected_by_name() {
    let source = SlowSource {
        delay: Duration::ZERO,
        files: vec![],
        fail_project: None,
    };
    let coordinator = TriggerCoordinator::new(
        source,
        MemorySink::default(),
        config(links(&[("docs", 1)]), BusyPolicy::Reject),
    )
    .expect("valid config");

    let err = coordinator
        .run_sync("missing")
        .await
        .expect_err("unconfigured link names are rejected");
    assert!(
        matches!(err, SyncError::UnknownLink(ref name) if name == "missing"),
        "expected UnknownLink(missing), got {err:?}"
    );
}

#[tokio::test]
async fn run_all_reports_one_outcome_per_link_in_config_order() {
    let source = SlowSource {
        delay: Duration::ZERO,
        files: vec![file_entry("a.pdf")],
        fail_project: Some(2),
    };
    let coordinator = TriggerCoordinator::new(
        source,
        MemorySink::default(),
        config(links(&[("docs", 1), ("wiki", 2)]), BusyPolicy::Reject),
    )
    .expect("valid config");

    let outcomes = coordinator.run_all().await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].0, "docs");
    assert!(outcomes[0].1.is_ok(), "docs pass completes: {:?}", outcomes[0].1);
    assert_eq!(outcomes[1].0, "wiki");
    assert!(
        matches!(outcomes[1].1, Err(SyncError::SourceUnavailable(_))),
        "wiki pass must surface its listing failure, got {:?}",
        outcomes[1].1
    );
}
