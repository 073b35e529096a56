mod common;

use common::{Harness, PortalState, Response};
use index2_fetch::error::WorkflowError;
use index2_fetch::portal::{SearchCriteria, SearchSubmitter};

fn criteria() -> SearchCriteria {
    SearchCriteria::new("2015", "पुणे", "हवेली", "भोर", "123").unwrap()
}

#[test]
fn test_results_on_first_attempt() {
    let harness = Harness::new(PortalState::default());
    harness.open_form();

    let outcome = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap();

    assert_eq!(outcome.attempts_used, 1);
    assert_eq!(outcome.captcha_refreshes, 0);
    assert_eq!(harness.portal.state().submits, 1);
}

#[test]
fn test_captcha_mismatch_refreshes_once_within_attempt() {
    let state = PortalState::default()
        .with_responses(vec![Response::Banner("Error 1259: Please enter valid captcha".to_string()), Response::Results]);
    let harness = Harness::new(state);
    harness.open_form();

    let outcome = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap();

    assert_eq!(outcome.attempts_used, 1);
    assert_eq!(outcome.captcha_refreshes, 1);
    let state = harness.portal.state();
    assert_eq!(state.refresh_clicks, 1);
    assert_eq!(state.submits, 2);
    assert_eq!(state.submitted_captchas, vec!["Ab12", "Ab12"]);
    assert_eq!(harness.ocr.calls.get(), 1);
}

#[test]
fn test_header_only_grid_counts_as_retry() {
    let state = PortalState::default().with_responses(vec![Response::HeaderOnly, Response::Results]);
    let harness = Harness::new(state);
    harness.open_form();

    let outcome = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap();

    assert_eq!(outcome.attempts_used, 2);
    assert_eq!(harness.portal.state().submits, 2);
}

#[test]
fn test_retries_are_bounded_and_carry_last_error() {
    let mut state = PortalState::default();
    state.default_response = Response::Banner("Error 5000: Server busy".to_string());
    let harness = Harness::new(state);
    harness.open_form();

    let err = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap_err();

    match err {
        WorkflowError::Fatal(message) => assert!(message.contains("5000"), "{}", message),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(harness.portal.state().submits, 3);
}

#[test]
fn test_refresh_cap_ends_attempt() {
    let mut state = PortalState::default();
    state.default_response = Response::Banner("1259".to_string());
    let mut harness = Harness::new(state);
    harness.settings.submit.max_attempts = 2;
    harness.settings.submit.max_captcha_refreshes = 2;
    harness.open_form();

    let err = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap_err();

    assert!(matches!(err, WorkflowError::Fatal(_)));
    let state = harness.portal.state();
    assert_eq!(state.refresh_clicks, 4);
    // one initial submit plus one per refresh, per attempt
    assert_eq!(state.submits, 6);
}

#[test]
fn test_retry_refills_cleared_fields() {
    let mut state = PortalState::default().with_responses(vec![Response::Banner("Error 42".to_string()), Response::Results]);
    state.clear_fields_on_error = true;
    let harness = Harness::new(state);
    harness.open_form();

    let outcome = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap();

    assert_eq!(outcome.attempts_used, 2);
    let state = harness.portal.state();
    assert_eq!(state.property_value, "123");
    assert_eq!(state.submitted_captchas, vec!["Ab12", "Ab12"]);
    // captcha re-solved only because the portal cleared it
    assert_eq!(harness.ocr.calls.get(), 1);
}

#[test]
fn test_secondary_captcha_does_not_consume_attempt() {
    let state = PortalState::default().with_responses(vec![Response::SecondaryCaptcha]);
    let harness = Harness::new(state);
    harness.open_form();

    let outcome = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap();

    assert_eq!(outcome.attempts_used, 1);
    let state = harness.portal.state();
    assert_eq!(state.submits, 1);
    assert_eq!(state.secondary_submits, 1);
    assert_eq!(harness.ocr.calls.get(), 1);
}

#[test]
fn test_results_with_error_code_and_actions_is_success() {
    let state = PortalState::default().with_responses(vec![Response::BannerWithResults("Error 3046".to_string())]);
    let harness = Harness::new(state);
    harness.open_form();

    let outcome = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap();
    assert_eq!(outcome.attempts_used, 1);
}

#[test]
fn test_silent_portal_times_out_into_retry() {
    let state = PortalState::default().with_responses(vec![Response::Silent, Response::Results]);
    let harness = Harness::new(state);
    harness.open_form();

    let outcome = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap();
    assert_eq!(outcome.attempts_used, 2);
}

#[test]
fn test_missing_submit_with_visible_results_is_implicit_success() {
    let mut state = PortalState::default();
    state.submit_present = false;
    let harness = Harness::new(state);
    harness.show_results();

    let outcome = SearchSubmitter.submit(&harness.ctx(), &criteria()).unwrap();

    assert_eq!(outcome.attempts_used, 1);
    assert_eq!(harness.portal.state().submits, 0);
}
