mod common;

use chrono::NaiveDate;
use common::*;
use labelgrab_engine::config::LabelgrabConfig;
use labelgrab_engine::protocol::{ContainerKind, CookieRecord, Element};
use labelgrab_engine::session::{AuthenticationError, Session, SessionError, SessionStore};
use labelgrab_engine::workflow::{
    EmptyReason, RunContext, RunError, RunOutcome, WorkflowStep, check_session, execute_run,
    logout,
};
use std::path::Path;
use tokio_util::sync::CancellationToken;

const SUBMIT_ID: u32 = 3;
const ORDERS_LINK: u32 = 10;
const TAB: u32 = 20;
const SELECT_ALL: u32 = 21;
const TRIGGER: u32 = 22;
const MODAL_DOWNLOAD: u32 = 30;
const BAR_DOWNLOAD: u32 = 31;
const FILTER: u32 = 40;
const FILTER_OPTION: u32 = 41;

fn fresh() -> CookieRecord {
    cookie("sid", "fresh")
}

fn context(config: LabelgrabConfig) -> RunContext {
    let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
    RunContext::for_date(config, date, CancellationToken::new())
}

fn orders_page() -> Vec<Element> {
    vec![
        tab(TAB, "Ready to Ship"),
        tab(23, "Pending"),
        select_all_checkbox(SELECT_ALL),
        with_classes(button(TRIGGER, "Label"), &["btn", "label-cta"]),
    ]
}

fn ready_dialog() -> Vec<Effect> {
    vec![
        Effect::ShowText("Labels generated".into()),
        Effect::Reveal(vec![inside(
            button(MODAL_DOWNLOAD, "Download"),
            ContainerKind::Dialog,
        )]),
    ]
}

/// A panel where the landing page links to the orders list and the
/// trigger button does whatever `on_trigger` says.
fn panel(on_trigger: Vec<Effect>) -> FakeBackend {
    FakeBackend::new()
        .gated_by(fresh())
        .page(
            LOGIN_URL,
            vec![
                input(1, "email"),
                input(2, "password"),
                input(SUBMIT_ID, "submit"),
            ],
            "",
        )
        .page(LANDING_URL, vec![link(ORDERS_LINK, "Orders")], "Orders Payments")
        .page(ORDERS_URL, orders_page(), "Orders Ready to Ship")
        .on_click(
            SUBMIT_ID,
            vec![
                Effect::SetCookies(vec![fresh()]),
                Effect::Navigate(LANDING_URL.into()),
            ],
        )
        .on_click(ORDERS_LINK, vec![Effect::Navigate(ORDERS_URL.into())])
        .on_click(SELECT_ALL, vec![Effect::Check(SELECT_ALL)])
        .on_click(TRIGGER, on_trigger)
        .on_click(
            MODAL_DOWNLOAD,
            vec![Effect::WriteArtifact("labels.pdf".into())],
        )
}

async fn save_fresh_session(config: &LabelgrabConfig) {
    SessionStore::new(config.session.file.clone())
        .save(&Session::new(vec![fresh()]))
        .await
        .unwrap();
}

fn file_names(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_prepare_removes_stale_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    std::fs::create_dir_all(&ctx.download_dir).unwrap();
    std::fs::write(ctx.download_dir.join("yesterday.pdf"), b"%PDF").unwrap();
    std::fs::write(ctx.download_dir.join("notes.txt"), b"keep").unwrap();

    let removed = ctx.prepare().await.unwrap();

    assert_eq!(removed, 1);
    assert!(!ctx.download_dir.join("yesterday.pdf").exists());
    assert!(ctx.download_dir.join("notes.txt").exists());
}

#[tokio::test]
async fn test_full_run_logs_in_and_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    std::fs::create_dir_all(&ctx.download_dir).unwrap();
    std::fs::write(ctx.download_dir.join("stale.pdf"), b"%PDF old").unwrap();
    let mut backend = panel(ready_dialog());

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Downloaded(ctx.download_dir.join("labels.pdf"))
    );
    assert!(!ctx.download_dir.join("stale.pdf").exists());
    assert_eq!(
        backend.clicks,
        vec![SUBMIT_ID, ORDERS_LINK, TAB, SELECT_ALL, TRIGGER, MODAL_DOWNLOAD]
    );
    assert!(backend.closed);
    assert_eq!(backend.download_dir.as_deref(), Some(ctx.download_dir.as_path()));

    let saved = SessionStore::new(ctx.config.session.file.clone())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.cookies(), &[fresh()]);
}

#[tokio::test]
async fn test_transient_failure_is_an_empty_success() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    save_fresh_session(&ctx.config).await;
    let mut on_trigger = vec![Effect::ShowText(
        "Temporary issue with Label Generation. Please try again later.".into(),
    )];
    on_trigger.extend(ready_dialog());
    let mut backend = panel(on_trigger);

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::NothingToDo(EmptyReason::TransientServerFailure)
    );
    assert!(!backend.clicks.contains(&MODAL_DOWNLOAD));
    assert!(!file_names(&ctx.download_dir).iter().any(|n| n.ends_with(".pdf")));
    assert!(backend.closed);
}

#[tokio::test]
async fn test_missing_trigger_fails_with_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    save_fresh_session(&ctx.config).await;
    let mut orders = orders_page();
    orders.retain(|e| e.id != TRIGGER);
    let mut backend = panel(vec![]).page(ORDERS_URL, orders, "Orders");

    let err = execute_run(&mut backend, &ctx).await.unwrap_err();

    assert!(matches!(
        err,
        RunError::LocatorNotFound {
            step: WorkflowStep::TriggerGeneration,
            ..
        }
    ));
    assert_eq!(err.code(), "LOCATOR_NOT_FOUND");
    let diagnostics = file_names(ctx.diagnostics.dir());
    assert!(
        diagnostics
            .iter()
            .any(|n| n.ends_with("failed-trigger_generation.html"))
    );
    assert!(
        diagnostics
            .iter()
            .any(|n| n.ends_with("failed-trigger_generation.png"))
    );
    assert!(backend.closed);
}

#[tokio::test]
async fn test_surface_after_tab_skips_to_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    save_fresh_session(&ctx.config).await;
    let mut backend = panel(vec![])
        .on_click(
            TAB,
            vec![
                Effect::ShowText("Labels are ready".into()),
                Effect::Reveal(vec![inside(
                    button(BAR_DOWNLOAD, "Download Labels"),
                    ContainerKind::BottomBar,
                )]),
            ],
        )
        .on_click(BAR_DOWNLOAD, vec![Effect::WriteArtifact("labels.pdf".into())]);

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Downloaded(_)));
    assert!(!backend.clicks.contains(&SELECT_ALL));
    assert!(!backend.clicks.contains(&TRIGGER));
    assert_eq!(backend.clicks.last(), Some(&BAR_DOWNLOAD));
}

#[tokio::test]
async fn test_surface_without_ready_text_uses_its_download_control() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    save_fresh_session(&ctx.config).await;
    let mut backend = panel(vec![])
        .on_click(
            TAB,
            vec![Effect::Reveal(vec![inside(
                button(BAR_DOWNLOAD, "Download Labels"),
                ContainerKind::BottomBar,
            )])],
        )
        .on_click(BAR_DOWNLOAD, vec![Effect::WriteArtifact("labels.pdf".into())]);

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Downloaded(ctx.download_dir.join("labels.pdf"))
    );
    assert_eq!(backend.clicks, vec![ORDERS_LINK, TAB, BAR_DOWNLOAD]);
}

#[tokio::test]
async fn test_bottom_bar_after_trigger_counts_as_ready() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    save_fresh_session(&ctx.config).await;
    let mut backend = panel(vec![Effect::Reveal(vec![inside(
        button(BAR_DOWNLOAD, "Download"),
        ContainerKind::BottomBar,
    )])])
    .on_click(BAR_DOWNLOAD, vec![Effect::WriteArtifact("labels.pdf".into())]);

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Downloaded(_)));
    assert_eq!(backend.clicks.last(), Some(&BAR_DOWNLOAD));
}

#[tokio::test]
async fn test_missing_login_fields_fail_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    let mut backend = panel(ready_dialog()).page(LOGIN_URL, vec![], "Sign in");

    let err = execute_run(&mut backend, &ctx).await.unwrap_err();

    assert!(matches!(
        err,
        RunError::Session {
            step: WorkflowStep::EnsureSession,
            source: SessionError::Authentication(AuthenticationError::FieldNotFound {
                field: "email",
                ..
            }),
        }
    ));
    assert_eq!(err.code(), "AUTHENTICATION_ERROR");
    assert!(backend.typed.is_empty());
    assert!(
        file_names(ctx.diagnostics.dir())
            .iter()
            .any(|n| n.ends_with("failed-ensure_session.html"))
    );
    assert!(backend.closed);
}

#[tokio::test]
async fn test_landing_navigation_timeout_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    let welcome = "https://panel.test/panel/v3/new/root/welcome";
    let mut backend = panel(ready_dialog())
        .page(welcome, vec![], "Welcome")
        .on_click(
            SUBMIT_ID,
            vec![
                Effect::SetCookies(vec![fresh()]),
                Effect::Navigate(welcome.into()),
            ],
        )
        .timing_out(LANDING_URL);

    let err = execute_run(&mut backend, &ctx).await.unwrap_err();

    match &err {
        RunError::NavigationTimeout { step, url } => {
            assert_eq!(*step, WorkflowStep::Navigate);
            assert_eq!(url, LANDING_URL);
        }
        other => panic!("expected navigation timeout, got {:?}", other),
    }
    assert_eq!(err.code(), "NAVIGATION_TIMEOUT");
    assert!(!backend.clicks.contains(&ORDERS_LINK));
    assert!(
        file_names(ctx.diagnostics.dir())
            .iter()
            .any(|n| n.ends_with("failed-navigate.png"))
    );
    assert!(backend.closed);
}

#[tokio::test]
async fn test_slow_direct_url_is_soft() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.site.landing_path = "/panel/v3/new/fulfillment/abc123/home".into();
    let landing = "https://panel.test/panel/v3/new/fulfillment/abc123/home";
    let ctx = context(config);
    save_fresh_session(&ctx.config).await;
    let mut backend = panel(ready_dialog())
        .page(landing, vec![], "Orders Payments")
        .timing_out(ORDERS_URL);

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Downloaded(_)));
    assert!(
        file_names(ctx.diagnostics.dir())
            .iter()
            .any(|n| n.ends_with("open_orders-soft.html"))
    );
    assert!(backend.clicks.contains(&TRIGGER));
}

#[tokio::test]
async fn test_rejected_download_dir_records_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    let mut backend = panel(ready_dialog());
    backend.refuse_downloads = true;

    let err = execute_run(&mut backend, &ctx).await.unwrap_err();

    assert_eq!(err.step(), WorkflowStep::Prepare);
    assert_eq!(err.code(), "INTERNAL_ERROR");
    assert!(
        file_names(ctx.diagnostics.dir())
            .iter()
            .any(|n| n.ends_with("failed-prepare.html"))
    );
    assert!(backend.navigations.is_empty());
    assert!(backend.closed);
}

#[tokio::test]
async fn test_direct_url_when_orders_link_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.site.landing_path = "/panel/v3/new/fulfillment/abc123/home".into();
    let landing = "https://panel.test/panel/v3/new/fulfillment/abc123/home";
    let ctx = context(config);
    save_fresh_session(&ctx.config).await;
    let mut backend = panel(ready_dialog()).page(landing, vec![], "Orders Payments");

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Downloaded(_)));
    assert!(backend.navigations.iter().any(|u| u == ORDERS_URL));
    assert!(!backend.clicks.contains(&ORDERS_LINK));
}

#[tokio::test]
async fn test_no_route_without_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    save_fresh_session(&ctx.config).await;
    let mut backend = panel(ready_dialog()).page(LANDING_URL, vec![], "Orders Payments");

    let err = execute_run(&mut backend, &ctx).await.unwrap_err();

    assert!(matches!(
        err,
        RunError::NoRoute {
            step: WorkflowStep::OpenOrders,
            ..
        }
    ));
    assert!(backend.closed);
}

#[tokio::test]
async fn test_generation_timeout_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.workflow.generation_timeout_ms = 300;
    let ctx = context(config);
    save_fresh_session(&ctx.config).await;
    let mut backend = panel(vec![]);

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::NothingToDo(EmptyReason::GenerationTimeout)
    );
    assert!(
        file_names(ctx.diagnostics.dir())
            .iter()
            .any(|n| n.contains("generation_timeout"))
    );
}

#[tokio::test]
async fn test_filter_is_applied_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.workflow.filter_value = Some("Today".into());
    let ctx = context(config);
    save_fresh_session(&ctx.config).await;

    let mut orders = orders_page();
    orders.push(button(FILTER, "Dispatch Date"));
    let option = Element {
        id: FILTER_OPTION,
        tag: "li".into(),
        role: Some("option".into()),
        text: "Today".into(),
        ..Default::default()
    };
    let mut backend = panel(ready_dialog())
        .page(ORDERS_URL, orders, "Orders")
        .on_click(FILTER, vec![Effect::Reveal(vec![option])]);

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Downloaded(_)));
    let filter_at = backend.clicks.iter().position(|&id| id == FILTER).unwrap();
    let option_at = backend
        .clicks
        .iter()
        .position(|&id| id == FILTER_OPTION)
        .unwrap();
    let trigger_at = backend.clicks.iter().position(|&id| id == TRIGGER).unwrap();
    assert!(filter_at < option_at && option_at < trigger_at);
}

#[tokio::test]
async fn test_missing_filter_is_soft() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.workflow.filter_value = Some("Today".into());
    let ctx = context(config);
    save_fresh_session(&ctx.config).await;
    let mut backend = panel(ready_dialog());

    let outcome = execute_run(&mut backend, &ctx).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Downloaded(_)));
    assert!(
        file_names(ctx.diagnostics.dir())
            .iter()
            .any(|n| n.ends_with("apply_filter-soft.html"))
    );
}

#[tokio::test]
async fn test_checked_select_all_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    save_fresh_session(&ctx.config).await;
    let mut orders = orders_page();
    for el in orders.iter_mut().filter(|e| e.id == SELECT_ALL) {
        el.checked = Some(true);
    }
    let mut backend = panel(ready_dialog()).page(ORDERS_URL, orders, "Orders");

    execute_run(&mut backend, &ctx).await.unwrap();

    assert!(!backend.clicks.contains(&SELECT_ALL));
    assert!(backend.clicks.contains(&TRIGGER));
}

#[tokio::test]
async fn test_cancelled_run_still_closes_browser() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));
    ctx.cancel.cancel();
    let mut backend = panel(ready_dialog());

    let err = execute_run(&mut backend, &ctx).await.unwrap_err();

    assert_eq!(err.code(), "CANCELLED");
    assert!(backend.clicks.is_empty());
    assert!(backend.closed);
}

#[tokio::test]
async fn test_check_session_and_logout() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(test_config(dir.path()));

    let mut backend = panel(vec![]);
    assert!(!check_session(&mut backend, &ctx).await.unwrap());
    assert!(!backend.launched);
    assert!(backend.closed);

    save_fresh_session(&ctx.config).await;
    let mut backend = panel(vec![]);
    assert!(check_session(&mut backend, &ctx).await.unwrap());
    assert!(backend.typed.is_empty());

    logout(&ctx.config).await.unwrap();
    assert!(!ctx.config.session.file.exists());
    logout(&ctx.config).await.unwrap();
}
