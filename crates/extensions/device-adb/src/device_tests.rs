
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use image::{GrayImage, ImageFormat};
    use visicrawl_protocols::{ActionKind, Point};

    // Stand-in for adb: answers the handful of commands the adapter sends
    // and switches the focused activity when the back key is pressed.
    const EMULATOR: &str = r#"#!/bin/sh
if [ "$1" = "-s" ]; then shift 2; fi
echo "$*" >> "@DIR@/calls.log"
case "$*" in
  "exec-out screencap -p") cat "@DIR@/screen.png" ;;
  "shell dumpsys window") cat "@DIR@/focus.txt" ;;
  "shell wm size") echo "Physical size: 64x128" ;;
  "shell input keyevent 4")
    echo "  mCurrentFocus=Window{b2 u0 com.example.app/com.example.app.DetailActivity}" > "@DIR@/focus.txt" ;;
  "shell input"*) ;;
  "shell am force-stop"*) ;;
  "shell monkey"*) echo "Events injected: 1" ;;
  "reconnect"|"wait-for-device") ;;
  "get-state") echo "device" ;;
  *) echo "unknown command: $*" >&2; exit 1 ;;
esac
"#;

    const OFFLINE: &str = "#!/bin/sh\necho \"error: device offline\" >&2\nexit 1\n";

    const HANGING: &str = "#!/bin/sh\nsleep 5\n";

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body.replace("@DIR@", &dir.display().to_string())).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        GrayImage::new(width, height)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_from_config() {
        let config = DeviceConfig {
            serial: Some("emulator-5554".to_string()),
            adb_path: "/opt/android/adb".to_string(),
            command_timeout_secs: 3,
        };
        let device = AdbDevice::from_config(&config);
        assert_eq!(device.id(), "emulator-5554");
        assert_eq!(device.serial(), Some("emulator-5554"));

        let device = AdbDevice::from_config(&DeviceConfig::default());
        assert_eq!(device.id(), "adb");
        assert_eq!(device.serial(), None);
    }

    #[tokio::test]
    async fn test_invalid_app_id_is_rejected_before_adb() {
        let device = AdbDevice::new("/nonexistent/adb", None);
        let err = device.launch_app("com.example; reboot").await.unwrap_err();
        assert!(err.to_string().contains("invalid application id"));
    }

    // One test drives every scripted binary so no script is still open for
    // writing while another test spawns processes.
    #[tokio::test]
    async fn test_scripted_adb() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("screen.png"), png(64, 128)).unwrap();
        std::fs::write(
            dir.path().join("focus.txt"),
            "  mCurrentFocus=Window{a1 u0 com.example.app/com.example.app.MainActivity}\n",
        )
        .unwrap();
        let emulator = write_script(dir.path(), "adb", EMULATOR);
        let offline = write_script(dir.path(), "adb-offline", OFFLINE);
        let hanging = write_script(dir.path(), "adb-hanging", HANGING);

        let device = AdbDevice::new(emulator.display().to_string(), Some("emulator-5554".to_string()))
            .with_navigation_probe_delay(Duration::ZERO);

        let shot = device.capture_screenshot().await.unwrap();
        assert_eq!((shot.width, shot.height), (64, 128));

        let app = device.foreground_app().await.unwrap().unwrap();
        assert_eq!(app.app_id, "com.example.app");
        assert_eq!(app.activity.as_deref(), Some("com.example.app.MainActivity"));

        let tap = Gesture::new(ActionKind::Tap).at(Point::new(10, 20));
        assert!(!device.execute_gesture(&tap).await.unwrap().navigated);

        let scroll = Gesture::new(ActionKind::ScrollDown);
        assert!(!device.execute_gesture(&scroll).await.unwrap().navigated);

        let back = Gesture::new(ActionKind::Back);
        assert!(device.execute_gesture(&back).await.unwrap().navigated);
        let app = device.foreground_app().await.unwrap().unwrap();
        assert_eq!(app.activity.as_deref(), Some("com.example.app.DetailActivity"));

        device.launch_app("com.example.app").await.unwrap();
        device.reconnect().await.unwrap();

        let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
        assert!(calls.contains("shell input tap 10 20"));
        // Scroll geometry comes from the captured 64x128 frame.
        assert!(calls.contains("shell input swipe 32 89 32 39 300"));
        assert!(!calls.contains("wm size"));
        assert!(calls.contains("shell am force-stop com.example.app"));
        assert!(calls.contains("shell monkey -p com.example.app -c android.intent.category.LAUNCHER 1"));
        assert!(calls.contains("get-state"));

        let device = AdbDevice::new(offline.display().to_string(), None);
        let err = device.capture_screenshot().await.unwrap_err();
        assert!(err.is_unreachable(), "{}", err);
        let err = device.reconnect().await.unwrap_err();
        assert!(err.is_unreachable(), "{}", err);

        let device = AdbDevice::new(hanging.display().to_string(), None)
            .with_timeout(Duration::from_millis(200));
        let err = device.foreground_app().await.unwrap_err();
        assert!(matches!(err, DeviceError::Timeout(200)));
    }
