//! End-to-end tests for the tour runner
//!
//! These drive the public library API against in-memory documents and the
//! scenario files under `tests/fixtures/`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use tour::document::{Effect, ElementFixture, EventKind, Reaction};
use tour::testing::{load_scenario, run_scenario, run_scenario_until};
use tour::tour::StepKind;
use tour::{
    Action, Document, ElementRef, Error, MemoryDocument, RunError, RunOptions, RunStatus,
    Selector, Step, TourRegistry, TourRunner,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn sel(s: &str) -> Selector {
    Selector::parse(s).unwrap()
}

fn fast() -> RunOptions {
    RunOptions {
        step_delay_ms: 0,
        timeout_ms_per_step: 250,
        poll_interval_ms: 5,
        debug: false,
    }
}

/// Page with `#a` and `#b`; clicking `#a` writes 'done' into `#b` when `wired`
fn page(wired: bool) -> Arc<MemoryDocument> {
    let root = ElementFixture::new("body")
        .child(ElementFixture::new("button").id("a").text("Go"))
        .child(ElementFixture::new("div").id("b"));
    let reactions = if wired {
        vec![Reaction {
            on: sel("#a"),
            event: EventKind::Click,
            delay_ms: 10,
            once: false,
            effects: vec![Effect::SetText {
                target: sel("#b"),
                text: "done".to_string(),
            }],
        }]
    } else {
        Vec::new()
    };
    Arc::new(MemoryDocument::with_reactions(root, reactions))
}

fn register_two_step(registry: &mut TourRegistry) {
    registry
        .register(
            "two_step",
            vec![
                Step::act("Click a", "#a", Action::Click).unwrap(),
                Step::check("b says done", "#b:contains('done')").unwrap(),
            ],
        )
        .unwrap();
}

/// Wraps a document and records every query, in order
struct Recording {
    inner: Arc<MemoryDocument>,
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl Document for Recording {
    async fn query(&self, selector: &Selector) -> Option<ElementRef> {
        self.queries.lock().unwrap().push(selector.to_string());
        self.inner.query(selector).await
    }

    async fn dispatch(&self, element: ElementRef, action: &Action) -> tour::Result<()> {
        self.inner.dispatch(element, action).await
    }
}

#[tokio::test]
async fn test_two_step_tour_passes_after_two_steps() {
    let mut registry = TourRegistry::new();
    register_two_step(&mut registry);
    let document = page(true);

    let runner = TourRunner::with_defaults(document.clone(), fast());
    let run = runner.run(&registry, "two_step", None).unwrap().wait().await;

    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!(run.steps_completed, 2);
    assert_eq!(document.dispatch_log().len(), 1);
}

#[tokio::test]
async fn test_two_step_tour_fails_at_step_one_when_page_never_reacts() {
    let mut registry = TourRegistry::new();
    register_two_step(&mut registry);

    let runner = TourRunner::with_defaults(page(false), fast());
    let started = Instant::now();
    let run = runner.run(&registry, "two_step", None).unwrap().wait().await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(started.elapsed() >= Duration::from_millis(250));
    match run.last_error {
        Some(RunError::StepTimeout {
            step_index,
            ref content,
            ref trigger,
            ..
        }) => {
            assert_eq!(step_index, 1);
            assert_eq!(content, "b says done");
            assert_eq!(trigger, "#b:contains('done')");
        }
        other => panic!("Expected StepTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_registration_leaves_first_intact() {
    let mut registry = TourRegistry::new();
    register_two_step(&mut registry);

    let err = registry
        .register("two_step", vec![Step::wait("only", "#a").unwrap()])
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateName(_)));

    let tour = registry.get("two_step").unwrap();
    assert_eq!(tour.len(), 2);
    assert!(matches!(tour.steps()[0].kind(), StepKind::Act(Action::Click)));
}

#[tokio::test]
async fn test_steps_are_evaluated_in_registration_order() {
    let recording = Arc::new(Recording {
        inner: page(true),
        queries: Mutex::new(Vec::new()),
    });
    let mut registry = TourRegistry::new();
    registry
        .register(
            "ordered",
            vec![
                Step::wait("body", "body").unwrap(),
                Step::act("click", "#a", Action::Click).unwrap(),
                Step::wait("b done", "#b:contains('done')").unwrap(),
                Step::wait("button", "button").unwrap(),
            ],
        )
        .unwrap();

    let run = TourRunner::with_defaults(recording.clone(), fast())
        .run(&registry, "ordered", None)
        .unwrap()
        .wait()
        .await;
    assert_eq!(run.status, RunStatus::Passed);

    let mut queries = recording.queries.lock().unwrap().clone();
    // Repeated polls of one trigger collapse into one entry
    queries.dedup();
    assert_eq!(
        queries,
        vec!["body", "#a", "#b:contains('done')", "button"]
    );
}

#[tokio::test]
async fn test_step_delay_throttles_the_run() {
    let mut registry = TourRegistry::new();
    registry
        .register(
            "slow",
            vec![
                Step::wait("1", "#a").unwrap(),
                Step::wait("2", "#a").unwrap(),
                Step::wait("3", "#a").unwrap(),
            ],
        )
        .unwrap();

    let options = RunOptions {
        step_delay_ms: 40,
        debug: true,
        ..fast()
    };
    let started = Instant::now();
    let run = TourRunner::new(page(false))
        .run(&registry, "slow", Some(options))
        .unwrap()
        .wait()
        .await;

    assert_eq!(run.status, RunStatus::Passed);
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn test_cancel_while_waiting() {
    let mut registry = TourRegistry::new();
    registry
        .register("stuck", vec![Step::wait("never", "#missing").unwrap()])
        .unwrap();
    let options = RunOptions {
        timeout_ms_per_step: 60_000,
        ..fast()
    };

    let handle = TourRunner::new(page(false))
        .run(&registry, "stuck", Some(options))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();

    let run = handle.wait().await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.last_error.unwrap().is_cancelled());

    // Terminal: further cancels change nothing
    handle.cancel();
    assert_eq!(handle.status(), RunStatus::Failed);
}

#[tokio::test]
async fn test_different_tours_run_concurrently_on_one_document() {
    let document = page(true);
    let mut registry = TourRegistry::new();
    registry
        .register("watcher", vec![Step::check("b done", "#b:contains('done')").unwrap()])
        .unwrap();
    registry
        .register("clicker", vec![Step::act("click a", "#a", Action::Click).unwrap()])
        .unwrap();

    let runner = TourRunner::with_defaults(document, fast());
    let watcher = runner.run(&registry, "watcher", None).unwrap();
    let clicker = runner.run(&registry, "clicker", None).unwrap();

    assert_eq!(clicker.wait().await.status, RunStatus::Passed);
    assert_eq!(watcher.wait().await.status, RunStatus::Passed);
}

#[tokio::test]
async fn test_portal_scenario_meets_expectations() {
    let result = run_scenario(
        &fixture("portal_unsubscribe.yaml"),
        None,
        RunOptions::default(),
        true,
    )
    .await
    .unwrap();

    assert_eq!(result.tours.len(), 3);
    for tour in &result.tours {
        assert!(tour.passed, "{}: {:?}", tour.name, tour.error);
        assert_eq!(tour.run.status, RunStatus::Passed);
    }
}

#[tokio::test]
async fn test_portal_check_step_ends_tour_early() {
    let result = run_scenario(
        &fixture("portal_unsubscribe.yaml"),
        Some("mailing_portal_unsubscribe_from_list_with_update"),
        RunOptions::default(),
        true,
    )
    .await
    .unwrap();

    // The check at index 9 passes the run; the remaining eight steps never execute
    let run = &result.tours[0].run;
    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!(run.steps_total, 18);
    assert_eq!(run.steps_completed, 10);
    assert_eq!(run.step_index, 9);
    assert!(run.last_error.is_none());
}

#[test]
fn test_portal_tours_keep_every_step() {
    let (_, registry) = load_scenario(&fixture("portal_unsubscribe.yaml")).unwrap();
    let tour = registry
        .get("mailing_portal_unsubscribe_from_list_with_update")
        .unwrap();

    assert_eq!(tour.len(), 18);
    let checks: Vec<usize> = tour
        .steps()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_check())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(checks, vec![9, 17]);
    assert_eq!(
        tour.steps()[13].content(),
        "Choose the mailing list 3 to come back"
    );
}

#[tokio::test]
async fn test_two_step_scenario_expected_failure() {
    let result = run_scenario(&fixture("two_step.yaml"), None, RunOptions::default(), true)
        .await
        .unwrap();

    assert!(result.passed());
    let unwired = result.tours.iter().find(|t| t.name == "unwired").unwrap();
    assert_eq!(unwired.run.status, RunStatus::Failed);
    assert_eq!(unwired.run.last_error.as_ref().unwrap().step_index(), 1);
}

#[tokio::test]
async fn test_interrupt_stops_scenario_after_current_tour() {
    // Tours run in name order: 'unwired' waits on a trigger that never appears
    let result = run_scenario_until(
        &fixture("two_step.yaml"),
        None,
        RunOptions::default(),
        true,
        tokio::time::sleep(Duration::from_millis(40)),
    )
    .await
    .unwrap();

    assert!(result.interrupted);
    assert!(!result.passed());
    assert_eq!(result.tours.len(), 1);
    let unwired = &result.tours[0];
    assert_eq!(unwired.name, "unwired");
    assert_eq!(unwired.run.status, RunStatus::Failed);
    assert!(unwired.run.last_error.as_ref().unwrap().is_cancelled());
}

#[tokio::test]
async fn test_unknown_tour_in_scenario() {
    let err = run_scenario(
        &fixture("two_step.yaml"),
        Some("missing"),
        RunOptions::default(),
        true,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_load_scenario_registers_tours() {
    let (scenario, registry) = load_scenario(&fixture("portal_unsubscribe.yaml")).unwrap();
    assert_eq!(scenario.name, "mailing-portal-unsubscribe");
    assert_eq!(
        registry.names(),
        vec![
            "mailing_portal_unsubscribe_from_list",
            "mailing_portal_unsubscribe_from_list_with_update",
            "mailing_portal_update_subscriptions",
        ]
    );
}

#[test]
fn test_scenario_with_bad_trigger_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(
        &path,
        r#"
name: bad
document:
  tag: body
tours:
  - name: broken
    steps:
      - trigger: "div:contains('unterminated"
"#,
    )
    .unwrap();

    let err = load_scenario(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidStep(_)), "{:?}", err);
}
