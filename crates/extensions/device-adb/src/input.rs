//! Translation of gestures into `input` shell commands.

use std::time::Duration;

use visicrawl_protocols::{ActionKind, DeviceError, Gesture, Point};

const SWIPE_DURATION_MS: u64 = 300;
const DEFAULT_HOLD: Duration = Duration::from_millis(1000);
const KEYCODE_BACK: &str = "4";

/// Fraction of the screen a scroll travels vertically.
const SCROLL_SPAN: f32 = 0.4;
/// Fraction of the screen a swipe travels horizontally.
const SWIPE_SPAN: f32 = 0.6;

/// Shell argument lists, run in order, that perform `gesture` on a
/// `width` x `height` screen.
pub fn plan_gesture(gesture: &Gesture, (width, height): (u32, u32)) -> Result<Vec<Vec<String>>, DeviceError> {
    let center = gesture
        .point
        .unwrap_or_else(|| Point::new(width as i32 / 2, height as i32 / 2));

    let plan = match gesture.kind {
        ActionKind::Tap => vec![tap(required_point(gesture)?)],
        ActionKind::LongPress => {
            let point = required_point(gesture)?;
            let hold = gesture.hold.unwrap_or(DEFAULT_HOLD);
            vec![swipe(point, point, hold.as_millis() as u64)]
        }
        ActionKind::TypeText => {
            let text = gesture
                .text
                .as_deref()
                .ok_or_else(|| DeviceError::CommandFailed("type_text requires text".to_string()))?;
            let mut plan = Vec::with_capacity(2);
            if let Some(point) = gesture.point {
                plan.push(tap(point));
            }
            plan.push(args(["input", "text", &escape_input_text(text)]));
            plan
        }
        ActionKind::ScrollUp | ActionKind::ScrollDown => {
            let half = (height as f32 * SCROLL_SPAN / 2.0) as i32;
            let top = clamp(center.y - half, height);
            let bottom = clamp(center.y + half, height);
            // Scrolling down drags the content up.
            let (from, to) = if gesture.kind == ActionKind::ScrollDown {
                (bottom, top)
            } else {
                (top, bottom)
            };
            vec![swipe(
                Point::new(center.x, from),
                Point::new(center.x, to),
                SWIPE_DURATION_MS,
            )]
        }
        ActionKind::SwipeLeft | ActionKind::SwipeRight => {
            let half = (width as f32 * SWIPE_SPAN / 2.0) as i32;
            let left = clamp(center.x - half, width);
            let right = clamp(center.x + half, width);
            let (from, to) = if gesture.kind == ActionKind::SwipeLeft {
                (right, left)
            } else {
                (left, right)
            };
            vec![swipe(
                Point::new(from, center.y),
                Point::new(to, center.y),
                SWIPE_DURATION_MS,
            )]
        }
        ActionKind::Back => vec![args(["input", "keyevent", KEYCODE_BACK])],
    };
    Ok(plan)
}

/// Escape text for `input text`: spaces become `%s` and shell
/// metacharacters are backslash-escaped for the device shell.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' | '\t' | '\n' => out.push_str("%s"),
            '\\' | '\'' | '"' | '(' | ')' | '&' | '<' | '>' | ';' | '|' | '*' | '~' | '$' | '`'
            | '!' | '?' | '#' | '[' | ']' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn required_point(gesture: &Gesture) -> Result<Point, DeviceError> {
    gesture
        .point
        .ok_or_else(|| DeviceError::CommandFailed(format!("{} requires a point", gesture.kind)))
}

fn clamp(value: i32, extent: u32) -> i32 {
    value.clamp(1, (extent as i32 - 1).max(1))
}

fn tap(point: Point) -> Vec<String> {
    args(["input", "tap", &point.x.to_string(), &point.y.to_string()])
}

fn swipe(from: Point, to: Point, duration_ms: u64) -> Vec<String> {
    args([
        "input",
        "swipe",
        &from.x.to_string(),
        &from.y.to_string(),
        &to.x.to_string(),
        &to.y.to_string(),
        &duration_ms.to_string(),
    ])
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
