use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::{CreateKind, ModifyKind};
use xdg_desktop_settings::{
    Collaborators, DesktopEnvironment, DesktopSettingsService, IconThemeRegistry, NoWindows, SettingsOptions,
};

#[derive(Default)]
struct Themes {
    applied: RefCell<Vec<String>>,
}

impl IconThemeRegistry for Themes {
    fn set_active_theme_name(&self, name: &str) {
        self.applied.borrow_mut().push(name.to_string());
    }
}

fn razor_env(root: &Path) -> HashMap<String, String> {
    HashMap::from([
        ("XDG_CURRENT_DESKTOP".to_string(), "Razor".to_string()),
        ("XDG_CONFIG_HOME".to_string(), root.join("home").display().to_string()),
        (
            "XDG_CONFIG_DIRS".to_string(),
            format!("{}:{}", root.join("sys-a").display(), root.join("sys-b").display()),
        ),
    ])
}

fn write_conf(dir: &Path, contents: &str) {
    let path = dir.join("razor/razor.conf");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn start(root: &Path, options: &SettingsOptions) -> (Rc<Themes>, DesktopSettingsService) {
    let themes = Rc::new(Themes::default());
    let collaborators = Collaborators {
        icon_themes: themes.clone(),
        windows: Rc::new(NoWindows),
        protocol: None,
    };
    let service = DesktopSettingsService::initialize(&razor_env(root), collaborators, options);
    (themes, service)
}

#[test]
fn test_second_system_dir_used_when_first_has_no_value() {
    let root = tempfile::tempdir().unwrap();
    write_conf(&root.path().join("sys-a"), "# nothing here\n");
    write_conf(&root.path().join("sys-b"), "icon_theme=Oxygen\n");

    let (themes, service) = start(root.path(), &SettingsOptions::default());

    assert_eq!(service.current_desktop_environment(), &DesktopEnvironment::Razor);
    assert_eq!(service.current_icon_theme_name(), "Oxygen");
    assert_eq!(*themes.applied.borrow(), vec!["Oxygen".to_string()]);
}

#[test]
fn test_configured_fallback_theme() {
    let root = tempfile::tempdir().unwrap();
    let options: SettingsOptions =
        serde_json::from_str(r#"{"file_source": {"fallback_theme": "nuoveXT2"}}"#).unwrap();

    let (_themes, service) = start(root.path(), &options);
    assert_eq!(service.current_icon_theme_name(), "nuoveXT2");
}

#[test]
fn test_user_file_edits_reach_handlers_once() {
    let root = tempfile::tempdir().unwrap();
    write_conf(&root.path().join("home"), "icon_theme=Papirus\n");
    let options: SettingsOptions = serde_json::from_str(r#"{"debounce_ms": 100}"#).unwrap();
    let (themes, mut service) = start(root.path(), &options);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    service.on_changed(move |name| sink.borrow_mut().push(name.to_string()));

    let user = root.path().join("home/razor/razor.conf");
    fs::write(&user, "icon_theme=Numix\n").unwrap();

    let t0 = Instant::now();
    let created = notify::Event::new(EventKind::Create(CreateKind::File)).add_path(user.clone());
    let modified = notify::Event::new(EventKind::Modify(ModifyKind::Any)).add_path(user);
    assert!(service.forward_file_event(&created, t0));
    assert!(service.forward_file_event(&modified, t0 + Duration::from_millis(30)));

    assert!(!service.dispatch_timers(t0 + Duration::from_millis(100)));
    assert!(service.dispatch_timers(t0 + Duration::from_millis(130)));

    assert_eq!(*seen.borrow(), vec!["Numix".to_string()]);
    assert_eq!(*themes.applied.borrow(), vec!["Papirus".to_string(), "Numix".to_string()]);

    service.shutdown();
    assert!(!service.is_change_pending());
}
