use super::*;
use crate::{
    auth::{Authenticator, InMemoryAuthenticator},
    load_coordinator::CoordinatorEvent,
    simulated::{Endpoint, SimulatedApiClient},
};
use crossbeam_channel::Receiver;
use shared::error::ErrorCode;
use std::time::Duration;

struct Harness {
    screen: Arc<ScreenController>,
    api: Arc<SimulatedApiClient>,
    auth: Arc<InMemoryAuthenticator>,
    events: Receiver<CoordinatorEvent>,
}

fn harness_with_latency(latency: Duration) -> Harness {
    let auth = Arc::new(InMemoryAuthenticator::new(Some("token".into())));
    let api = Arc::new(SimulatedApiClient::new(auth.clone(), "token").with_latency(latency));
    let (coordinator, events) = LoadCoordinator::marshaled();
    Harness {
        screen: Arc::new(ScreenController::new(api.clone(), coordinator)),
        api,
        auth,
        events,
    }
}

fn harness() -> Harness {
    harness_with_latency(Duration::ZERO)
}

fn loaded_events(events: &[CoordinatorEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, CoordinatorEvent::LoadStateChanged { loaded: true, .. }))
        .count()
}

fn login_events(events: &[CoordinatorEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, CoordinatorEvent::LoginRequired { .. }))
        .count()
}

#[tokio::test]
async fn home_screen_loads_both_views_and_reports_loaded() {
    let h = harness();

    let load = h
        .screen
        .load(Route::Home, ApiRequestOptions::default())
        .await
        .expect("load");

    let views = load.views.as_ref().expect("views");
    assert!(matches!(&views.main, Ok(MainView::Companies(companies)) if companies.len() == 4));
    assert_eq!(
        views.user_info.as_ref().expect("user info").display_name(),
        "Guest User"
    );
    assert!(load.errors().is_empty());
    assert!(load.redirect.is_none());

    let events: Vec<_> = h.events.try_iter().collect();
    assert_eq!(
        events,
        vec![
            CoordinatorEvent::LoadStateChanged {
                round: views.round,
                loaded: false
            },
            CoordinatorEvent::LoadStateChanged {
                round: views.round,
                loaded: false
            },
            CoordinatorEvent::LoadStateChanged {
                round: views.round,
                loaded: true
            },
        ]
    );
}

#[tokio::test]
async fn expired_token_in_both_views_escalates_login_once() {
    let h = harness();
    h.auth.expire_access_token();

    let load = h
        .screen
        .load(Route::Home, ApiRequestOptions::default())
        .await
        .expect("load");

    assert_eq!(load.errors().len(), 2);
    assert!(load.errors().iter().all(|err| err.requires_login()));

    let events: Vec<_> = h.events.try_iter().collect();
    assert_eq!(login_events(&events), 1);
    assert_eq!(loaded_events(&events), 0);
}

#[tokio::test]
async fn hidden_company_redirects_home_without_escalation() {
    let h = harness();

    let load = h
        .screen
        .load(Route::Transactions(CompanyId(3)), ApiRequestOptions::default())
        .await
        .expect("load");

    assert_eq!(load.redirect, Some(Route::Home));
    let events: Vec<_> = h.events.try_iter().collect();
    assert_eq!(login_events(&events), 0);
    assert_eq!(loaded_events(&events), 0);
}

#[tokio::test]
async fn failing_title_view_keeps_the_screen_unloaded() {
    let h = harness();
    h.api.fail_endpoint(
        Endpoint::UserInfo,
        ApiError::new(ErrorCode::NetworkError, "offline").with_status(503),
    );

    let load = h
        .screen
        .load(Route::Transactions(CompanyId(1)), ApiRequestOptions::default())
        .await
        .expect("load");

    let views = load.views.as_ref().expect("views");
    assert!(matches!(views.main, Ok(MainView::Transactions(_))));
    assert!(views.user_info.is_err());
    assert!(load.redirect.is_none());

    let events: Vec<_> = h.events.try_iter().collect();
    assert_eq!(loaded_events(&events), 0);
    assert_eq!(login_events(&events), 0);
}

#[tokio::test]
async fn login_required_route_starts_no_round() {
    let h = harness();
    let before = h.screen.coordinator().snapshot();

    let load = h
        .screen
        .load(Route::LoginRequired, ApiRequestOptions::default())
        .await
        .expect("load");

    assert!(load.views.is_none());
    assert_eq!(h.screen.coordinator().snapshot(), before);
    assert!(h.events.try_iter().next().is_none());
}

#[tokio::test]
async fn reload_during_a_slow_load_closes_only_the_new_round() {
    let h = harness_with_latency(Duration::from_millis(100));
    let mut outcomes = h.screen.coordinator().subscribe_outcomes();

    let first = {
        let screen = h.screen.clone();
        tokio::spawn(async move {
            screen
                .load(Route::Home, ApiRequestOptions::default())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = h
        .screen
        .load(Route::Home, ApiRequestOptions::default())
        .await
        .expect("second load");
    let first = first.await.expect("join").expect("first load");

    let first_round = first.views.expect("views").round;
    let second_round = second.views.expect("views").round;
    assert!(second_round > first_round);

    let outcome = outcomes.try_recv().expect("one outcome");
    assert_eq!(outcome.round, second_round);
    assert!(outcome.loaded());
    assert!(outcomes.try_recv().is_err());

    let events: Vec<_> = h.events.try_iter().collect();
    assert_eq!(loaded_events(&events), 1);
}
