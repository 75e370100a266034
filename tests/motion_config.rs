use std::sync::Mutex;

use tempfile::Builder;

use frame_motion::{MotionConfig, SourceKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MOTION_CONFIG",
        "MOTION_SOURCE",
        "MOTION_SOURCE_URL",
        "MOTION_POLL_INTERVAL_MS",
        "MOTION_MASK_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    let json = r#"{
        "source": {
            "kind": "socket",
            "url": "10.0.0.7:80",
            "width": 640,
            "height": 480,
            "capture_width": 160,
            "capture_height": 120,
            "request_token": "FRAME\n"
        },
        "motion": {
            "pixel_threshold": 30,
            "neighbor_threshold": 5
        },
        "poll_interval_ms": 250
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("MOTION_CONFIG", file.path());
    std::env::set_var("MOTION_SOURCE_URL", "10.0.0.8:80");
    std::env::set_var("MOTION_MASK_PATH", "/tmp/mask.png");

    let cfg = MotionConfig::load().expect("load config");

    assert_eq!(cfg.source.kind, SourceKind::Socket);
    assert_eq!(cfg.source.url, "10.0.0.8:80");
    assert_eq!(cfg.source.width, 640);
    assert_eq!(cfg.source.height, 480);
    assert_eq!(cfg.source.capture_width, 160);
    assert_eq!(cfg.source.capture_height, 120);
    assert_eq!(cfg.source.request_token, b"FRAME\n");
    assert_eq!(cfg.motion.pixel_threshold, 30);
    assert_eq!(cfg.motion.neighbor_threshold, 5);
    assert_eq!(cfg.poll_interval.as_millis(), 250);
    assert_eq!(cfg.mask_path.unwrap().to_str(), Some("/tmp/mask.png"));

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r##"
        poll_interval_ms = 100

        [source]
        kind = "browser"
        url = "http://cam.local/view"
        selector = "#feed"
    "##;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = MotionConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.source.kind, SourceKind::Browser);
    assert_eq!(cfg.source.url, "http://cam.local/view");
    assert_eq!(cfg.source.selector, "#feed");
    assert_eq!(cfg.source.width, 960);
    assert_eq!(cfg.source.height, 720);
    assert_eq!(cfg.motion.pixel_threshold, 50);
    assert_eq!(cfg.motion.neighbor_threshold, 7);

    clear_env();
}

#[test]
fn env_source_switch_uses_that_kinds_default_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MOTION_SOURCE", "http");
    let cfg = MotionConfig::load().expect("load config");
    assert_eq!(cfg.source.kind, SourceKind::Http);
    assert_eq!(cfg.source.url, "http://192.168.122.100/");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MOTION_SOURCE", "carrier-pigeon");
    assert!(MotionConfig::load().is_err());
    clear_env();

    std::env::set_var("MOTION_POLL_INTERVAL_MS", "soon");
    assert!(MotionConfig::load().is_err());
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"source": {"width": 0}}"#).expect("write config");
    assert!(MotionConfig::load_from(Some(file.path())).is_err());

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"motion": {"neighbor_threshold": 9}}"#)
        .expect("write config");
    assert!(MotionConfig::load_from(Some(file.path())).is_err());

    clear_env();
}

#[test]
fn blank_env_overrides_are_ignored() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"poll_interval_ms": 250}"#).expect("write config");

    std::env::set_var("MOTION_POLL_INTERVAL_MS", "  ");
    std::env::set_var("MOTION_SOURCE", "");
    std::env::set_var("MOTION_MASK_PATH", "");

    let cfg = MotionConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.poll_interval.as_millis(), 250);
    assert_eq!(cfg.source.kind, SourceKind::Camera);
    assert!(cfg.mask_path.is_none());

    clear_env();
}
