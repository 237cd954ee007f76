//! Bridge module tests.

mod registry_test;

/// Verify all public bridge types are exported from the library.
#[test]
fn test_all_bridge_types_exported() {
    use guest_bridge::bridge::{
        content_sha256, window_id, BridgeError, DecodedLine, FrameBuffer, FrameKey,
        ProtocolTag, RegistrySnapshot, Surface, SurfaceBridge, SurfaceEvent, SurfaceRegistry,
    };

    let _ = SurfaceRegistry::new();
    let _ = Surface::default();
    let _ = FrameBuffer::new(FrameKey {
        surface_id: "1".to_string(),
        seq: 0,
    });
    let _ = SurfaceEvent::parse("CREATE id=1");
    assert_eq!(
        SurfaceEvent::decode("DESTROY"),
        DecodedLine::Malformed {
            tag: ProtocolTag::Destroy
        }
    );
    assert_eq!(window_id("1"), "win-1");
    assert_eq!(content_sha256(b"").len(), 64);

    let dir = tempfile::tempdir().unwrap();
    let bridge = SurfaceBridge::new(dir.path()).unwrap();
    let _ = RegistrySnapshot::render(bridge.registry());

    let _: fn() -> BridgeError = || BridgeError::CreateDir {
        path: std::path::PathBuf::from("/x"),
        source: std::io::Error::other("boom"),
    };
}
