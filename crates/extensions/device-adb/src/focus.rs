//! Parsing of `dumpsys window` and `wm size` output.

use std::sync::LazyLock;

use regex::Regex;

use visicrawl_protocols::ForegroundApp;

static CURRENT_FOCUS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"mCurrentFocus=Window\{[^}]*?\s([\w.]+)/([\w.$]+)\}").ok());

static FOCUSED_APP: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"mFocusedApp=\S*\{[^}]*?\s([\w.]+)/([\w.$]+)").ok());

static WM_SIZE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(Physical|Override) size:\s*(\d+)x(\d+)").ok());

/// Foreground application from `dumpsys window` output.
///
/// Prefers the focused window; popups and dialogs without a component fall
/// back to the focused activity record.
pub fn parse_focus(dumpsys: &str) -> Option<ForegroundApp> {
    [&CURRENT_FOCUS, &FOCUSED_APP].into_iter().find_map(|pattern| {
        let caps = pattern.as_ref()?.captures(dumpsys)?;
        Some(ForegroundApp::new(&caps[1]).with_activity(&caps[2]))
    })
}

/// Raw focus line, used to notice navigation between two probes.
pub(crate) fn focus_signature(dumpsys: &str) -> Option<String> {
    dumpsys
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("mCurrentFocus="))
        .or_else(|| dumpsys.lines().map(str::trim).find(|line| line.starts_with("mFocusedApp=")))
        .map(str::to_string)
}

/// Display size from `wm size`; an override size wins over the physical one.
pub fn parse_wm_size(output: &str) -> Option<(u32, u32)> {
    let pattern = WM_SIZE.as_ref()?;
    let mut size = None;
    for caps in pattern.captures_iter(output) {
        let dims = (caps[2].parse().ok()?, caps[3].parse().ok()?);
        if &caps[1] == "Override" {
            return Some(dims);
        }
        size = Some(dims);
    }
    size
}
