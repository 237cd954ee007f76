//! Registry semantics through the persisted snapshot.

use guest_bridge::bridge::{RegistrySnapshot, SurfaceBridge};
use tempfile::TempDir;

fn open_bridge() -> (TempDir, SurfaceBridge) {
    let dir = tempfile::tempdir().unwrap();
    let bridge = SurfaceBridge::new(dir.path()).unwrap();
    (dir, bridge)
}

fn feed(bridge: &mut SurfaceBridge, lines: &[&str]) {
    for line in lines {
        bridge.on_line(line).unwrap();
    }
}

fn read_snapshot(dir: &TempDir) -> RegistrySnapshot {
    let json = std::fs::read_to_string(dir.path().join("registry.json")).unwrap();
    serde_json::from_str(&json).unwrap()
}

const PROTOCOL: &[&str] = &[
    "CREATE id=1 role=toplevel title=shell w=640 h=480",
    "CREATE id=2 role=popup",
    "PARENT id=2 parent=1",
    "CONFIGURE id=2 x=10 y=20 w=200 h=100",
    "STATE id=1 states=maximized,active",
    "FOCUS id=2 focused=true",
];

#[test]
fn noise_interleaving_does_not_change_the_registry() {
    let (_clean_dir, mut clean) = open_bridge();
    feed(&mut clean, PROTOCOL);

    let noisy_lines: Vec<String> = PROTOCOL
        .iter()
        .flat_map(|line| {
            [
                "[    0.42] some kernel chatter".to_string(),
                (*line).to_string(),
                String::new(),
            ]
        })
        .collect();
    let (_noisy_dir, mut noisy) = open_bridge();
    for line in &noisy_lines {
        noisy.on_line(line).unwrap();
    }

    assert_eq!(
        RegistrySnapshot::render(clean.registry()),
        RegistrySnapshot::render(noisy.registry())
    );
}

#[test]
fn focused_window_is_always_the_z_order_tail() {
    let (dir, mut bridge) = open_bridge();
    feed(
        &mut bridge,
        &[
            "CREATE id=1",
            "CREATE id=2",
            "CREATE id=3",
            "FOCUS id=1 focused=true",
            "FOCUS id=3 focused=true",
            "FOCUS id=1 focused=true",
        ],
    );

    let snapshot = read_snapshot(&dir);
    assert_eq!(snapshot.focused_window_id.as_deref(), Some("win-1"));
    assert_eq!(snapshot.z_order, ["win-2", "win-3", "win-1"]);
    assert_eq!(
        snapshot.z_order.last().map(String::as_str),
        snapshot.focused_window_id.as_deref()
    );
}

#[test]
fn windows_section_resolves_hierarchy() {
    let (dir, mut bridge) = open_bridge();
    feed(&mut bridge, PROTOCOL);

    let snapshot = read_snapshot(&dir);
    let parent = &snapshot.windows["win-1"];
    let child = &snapshot.windows["win-2"];

    assert_eq!(parent.children, ["win-2"]);
    assert_eq!(parent.parent_window_id, None);
    assert_eq!(child.parent_window_id.as_deref(), Some("win-1"));
    assert_eq!((child.x, child.y, child.w, child.h), (Some(10), Some(20), Some(200), Some(100)));
    assert_eq!(parent.states, ["maximized", "active"]);
}

#[test]
fn destroying_the_parent_leaves_a_dangling_edge() {
    let (dir, mut bridge) = open_bridge();
    feed(
        &mut bridge,
        &["PARENT id=2 parent=1", "DESTROY id=1"],
    );

    let snapshot = read_snapshot(&dir);
    assert!(!snapshot.windows.contains_key("win-1"));
    assert_eq!(snapshot.windows["win-2"].parent_window_id, None);
    assert_eq!(
        snapshot.surfaces["2"].parent_surface_id.as_deref(),
        Some("1")
    );
}

#[test]
fn snapshot_is_rewritten_after_every_mutation() {
    let (dir, mut bridge) = open_bridge();
    feed(&mut bridge, &["CREATE id=1 role=toplevel"]);
    assert_eq!(read_snapshot(&dir).surfaces.len(), 1);

    feed(&mut bridge, &["CREATE id=2"]);
    assert_eq!(read_snapshot(&dir).surfaces.len(), 2);

    feed(&mut bridge, &["DESTROY id=1"]);
    let snapshot = read_snapshot(&dir);
    assert_eq!(snapshot.surfaces.len(), 1);
    assert_eq!(snapshot.z_order, ["win-2"]);
}

#[test]
fn implicit_creation_from_any_reference() {
    let (dir, mut bridge) = open_bridge();
    feed(
        &mut bridge,
        &[
            "ROLE id=10 role=panel",
            "FOCUS id=11 focused=true",
            "STATE id=12 states=hidden",
            "CONFIGURE id=13 w=1",
        ],
    );

    let snapshot = read_snapshot(&dir);
    assert_eq!(snapshot.surfaces.len(), 4);
    for id in ["10", "11", "12", "13"] {
        assert!(snapshot.windows.contains_key(&format!("win-{id}")));
    }
    assert_eq!(snapshot.focused_window_id.as_deref(), Some("win-11"));
}
