use super::*;

// ============================================================================
// Geometry
// ============================================================================

#[test]
fn test_bounding_box_center() {
    let b = BoundingBox::new(10, 20, 100, 50);
    assert_eq!(b.center(), Point::new(60, 45));
}

#[test]
fn test_bounding_box_contains() {
    let b = BoundingBox::new(0, 0, 10, 10);
    assert!(b.contains(Point::new(0, 0)));
    assert!(b.contains(Point::new(9, 9)));
    assert!(!b.contains(Point::new(10, 5)));
    assert!(!b.contains(Point::new(-1, 5)));
}

#[test]
fn test_bounding_box_clamp_inside() {
    let b = BoundingBox::new(5, 5, 10, 10);
    assert_eq!(b.clamp_to(100, 100), Some(b));
}

#[test]
fn test_bounding_box_clamp_partial() {
    let b = BoundingBox::new(-5, 90, 20, 20);
    assert_eq!(b.clamp_to(100, 100), Some(BoundingBox::new(0, 90, 15, 10)));
}

#[test]
fn test_bounding_box_clamp_outside() {
    let b = BoundingBox::new(200, 200, 10, 10);
    assert_eq!(b.clamp_to(100, 100), None);
}

#[test]
fn test_screenshot_contains() {
    let shot = Screenshot::new(vec![], 1080, 1920);
    assert!(shot.contains(Point::new(0, 0)));
    assert!(shot.contains(Point::new(1079, 1919)));
    assert!(!shot.contains(Point::new(1080, 10)));
    assert!(!shot.contains(Point::new(10, -1)));
    assert_eq!(shot.center(), Point::new(540, 960));
}

#[test]
fn test_screenshot_base64_serde() {
    let shot = Screenshot::new(vec![1, 2, 3], 2, 2);
    assert_eq!(shot.to_base64(), "AQID");

    let json = serde_json::to_string(&shot).unwrap();
    assert!(json.contains("\"AQID\""));
    let parsed: Screenshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, shot);
}

// ============================================================================
// Actions
// ============================================================================

#[test]
fn test_action_kind_parse() {
    assert_eq!("tap".parse::<ActionKind>(), Ok(ActionKind::Tap));
    assert_eq!("long-press".parse::<ActionKind>(), Ok(ActionKind::LongPress));
    assert_eq!("Type_Text".parse::<ActionKind>(), Ok(ActionKind::TypeText));
    assert_eq!("scroll down".parse::<ActionKind>(), Ok(ActionKind::ScrollDown));
    assert!("fly".parse::<ActionKind>().is_err());
}

#[test]
fn test_action_kind_requirements() {
    assert!(ActionKind::Tap.requires_target());
    assert!(ActionKind::LongPress.requires_target());
    assert!(!ActionKind::ScrollUp.requires_target());
    assert!(ActionKind::TypeText.requires_text());
    assert!(ActionKind::SwipeLeft.is_directional());
    assert!(!ActionKind::Back.is_directional());
}

#[test]
fn test_action_kind_serde_snake_case() {
    let json = serde_json::to_string(&ActionKind::SwipeRight).unwrap();
    assert_eq!(json, "\"swipe_right\"");
}

#[test]
fn test_action_target_serde() {
    let target: ActionTarget = serde_json::from_str(r#"{"label": 4}"#).unwrap();
    assert_eq!(target, ActionTarget::Label(4));

    let target: ActionTarget = serde_json::from_str(r#"{"point": {"x": 3, "y": 7}}"#).unwrap();
    assert_eq!(target, ActionTarget::Point(Point::new(3, 7)));
}

#[test]
fn test_action_descriptor_compact() {
    let tap = ActionDescriptor::tap_label(3);
    assert_eq!(tap.compact(), "tap #3");

    let typed = ActionDescriptor::new(ActionKind::TypeText)
        .with_target(ActionTarget::Label(2))
        .with_text("alice");
    assert_eq!(typed.compact(), "type_text #2 \"alice\"");

    assert_eq!(ActionDescriptor::back().compact(), "back");
}

#[test]
fn test_action_error_display() {
    let err = ActionError::OutOfBounds {
        point: Point::new(2000, 10),
        width: 1080,
        height: 1920,
    };
    assert!(err.to_string().contains("(2000, 10)"));
    assert!(err.to_string().contains("1080x1920"));

    let err = ActionError::UnknownLabel { label: 42 };
    assert!(err.to_string().contains("42"));
}

// ============================================================================
// Screens
// ============================================================================

#[test]
fn test_fingerprint_distance() {
    let a = Fingerprint::from_bytes(vec![0b0000_0000, 0xff]);
    let b = Fingerprint::from_bytes(vec![0b0000_0111, 0xff]);
    assert_eq!(a.distance(&b), 3);
    assert_eq!(b.distance(&a), 3);
    assert_eq!(a.distance(&a), 0);
}

#[test]
fn test_fingerprint_distance_length_mismatch() {
    let a = Fingerprint::from_bytes(vec![0u8; 8]);
    let b = Fingerprint::from_bytes(vec![0u8; 7]);
    assert_eq!(a.distance(&b), 8);
}

#[test]
fn test_fingerprint_display_hex() {
    let fp = Fingerprint::from_bytes(vec![0x0a, 0xff]);
    assert_eq!(fp.to_string(), "0aff");
    assert_eq!(fp.bits(), 16);
}

#[test]
fn test_stuck_state_reason() {
    let stuck = StuckState::new(7, 3);
    assert_eq!(stuck.screen_id, 7);
    assert!(stuck.reason.contains("3 times"));
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn test_crawl_state_flags() {
    assert!(CrawlState::Stopped.is_terminal());
    assert!(CrawlState::Error.is_terminal());
    assert!(!CrawlState::Stopping.is_terminal());
    assert!(CrawlState::PausedStep.is_paused());
    assert_eq!(CrawlState::PausedManual.to_string(), "paused_manual");
}

#[test]
fn test_crawl_session_new() {
    let session = CrawlSession::new("com.example", "log in", CrawlBudget::steps(5));
    assert_eq!(session.id.len(), 36);
    assert_eq!(session.state, CrawlState::Uninitialized);
    assert!(session.budget.is_bounded());
    assert!(!CrawlBudget::default().is_bounded());
}

#[test]
fn test_completion_reason_names() {
    assert_eq!(CompletionReason::StepLimit.to_string(), "step_limit");
    assert_eq!(
        serde_json::to_string(&CompletionReason::NoActionsAvailable).unwrap(),
        "\"no_actions_available\""
    );
}

#[test]
fn test_step_record_terminal_navigated() {
    let mut record = StepRecord::new("s", 1);
    assert!(!record.terminal_navigated());

    record
        .results
        .push(ActionResult::succeeded(0, ActionKind::Tap, None, true, 5));
    record
        .results
        .push(ActionResult::succeeded(1, ActionKind::Tap, None, false, 5));
    assert!(!record.terminal_navigated());
    assert_eq!(record.executed_count(), 2);
    assert!(record.all_succeeded());
}

#[test]
fn test_step_error_display() {
    let err = StepError::InvalidResponse {
        reason: "no JSON object".to_string(),
        raw: "hello".to_string(),
    };
    assert_eq!(err.to_string(), "invalid response: no JSON object");
}
