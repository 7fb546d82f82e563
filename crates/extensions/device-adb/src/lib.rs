//! Android device adapter for VisiCrawl.
//!
//! Talks to a device through the `adb` binary:
//! - `exec-out screencap -p` for screenshots
//! - `shell input ...` for taps, swipes, text and the back key
//! - `shell dumpsys window` for the focused application
//! - `am force-stop` and `monkey` for relaunching

mod device;
mod focus;
mod input;
mod runner;

pub use device::AdbDevice;
pub use focus::{parse_focus, parse_wm_size};
pub use input::{escape_input_text, plan_gesture};
