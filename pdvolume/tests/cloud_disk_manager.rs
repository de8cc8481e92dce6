//! Integration tests for CloudDiskManager over fake provider and mounter.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pdvolume::disk::{AttachOptions, CloudDiskManager};
use pdvolume::{DiskManager, DiskRef, MountFlags, PdError};
use pdvolume_test_utils::{FakeMounter, FakeVolumeProvider, MountAction, MountFailure};
use tempfile::TempDir;

const PD_NAME: &str = "aws://us-east-1a/vol-1";

// ============================================================================
// TEST FIXTURES
// ============================================================================

struct TestContext {
    provider: Arc<FakeVolumeProvider>,
    mounter: Arc<FakeMounter>,
    manager: CloudDiskManager,
    device: PathBuf,
    global_path: PathBuf,
    _temp_dir: TempDir, // Dropped after test
}

impl TestContext {
    /// Provider hands out `device`; it exists only if `create_device` is set.
    fn new(create_device: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let device = temp_dir.path().join("xvdf");
        if create_device {
            std::fs::write(&device, b"").expect("Failed to create device node");
        }
        let global_path = temp_dir.path().join("mounts/aws/us-east-1a/vol-1");

        let provider = Arc::new(FakeVolumeProvider::new(&device));
        let mounter = Arc::new(FakeMounter::new());
        let manager =
            CloudDiskManager::new(provider.clone(), mounter.clone()).with_options(AttachOptions {
                poll_interval: Duration::from_millis(1),
                poll_attempts: 3,
            });

        Self {
            provider,
            mounter,
            manager,
            device,
            global_path,
            _temp_dir: temp_dir,
        }
    }
}

fn disk(read_only: bool) -> DiskRef<'static> {
    DiskRef {
        pd_name: PD_NAME,
        fs_type: Some("ext4"),
        partition: None,
        read_only,
    }
}

// ============================================================================
// ATTACH TESTS
// ============================================================================

#[test]
fn attach_mounts_device_at_global_path() {
    let ctx = TestContext::new(true);

    ctx.manager
        .attach_and_mount_disk(&disk(false), &ctx.global_path)
        .unwrap();

    assert_eq!(ctx.provider.attach_calls(), vec![PD_NAME.to_string()]);
    assert!(ctx.global_path.is_dir());
    assert_eq!(
        ctx.mounter.actions(),
        vec![MountAction::Mount {
            source: ctx.device.clone(),
            target: ctx.global_path.clone(),
            flags: MountFlags::empty(),
        }]
    );
}

#[test]
fn attach_read_only_mounts_read_only() {
    let ctx = TestContext::new(true);

    ctx.manager
        .attach_and_mount_disk(&disk(true), &ctx.global_path)
        .unwrap();

    let Some(MountAction::Mount { flags, .. }) = ctx.mounter.actions().into_iter().next() else {
        panic!("expected a mount");
    };
    assert!(flags.contains(MountFlags::READ_ONLY));
}

#[test]
fn attach_skips_mount_when_already_mounted() {
    let ctx = TestContext::new(true);
    std::fs::create_dir_all(&ctx.global_path).unwrap();
    ctx.mounter
        .add_mount(&ctx.device.display().to_string(), &ctx.global_path);

    ctx.manager
        .attach_and_mount_disk(&disk(false), &ctx.global_path)
        .unwrap();

    assert_eq!(ctx.provider.attach_calls().len(), 1);
    assert_eq!(ctx.mounter.mount_calls(), 0);
}

#[test]
fn attach_fails_when_device_never_appears() {
    let ctx = TestContext::new(false);

    let err = ctx
        .manager
        .attach_and_mount_disk(&disk(false), &ctx.global_path)
        .unwrap_err();

    assert!(matches!(err, PdError::RemoteAttach { .. }));
    assert!(!ctx.global_path.exists());
    assert_eq!(ctx.mounter.mount_calls(), 0);
}

#[test]
fn attach_provider_failure_is_returned() {
    let ctx = TestContext::new(true);
    ctx.provider.fail_attach("throttled");

    let err = ctx
        .manager
        .attach_and_mount_disk(&disk(false), &ctx.global_path)
        .unwrap_err();

    assert!(matches!(err, PdError::RemoteAttach { .. }));
    assert!(!ctx.global_path.exists());
}

#[test]
fn attach_mount_failure_removes_global_dir() {
    let ctx = TestContext::new(true);
    ctx.mounter.fail_next_mount(MountFailure::Clean);

    // Read-only mounts are never formatted, so the first error is final.
    let err = ctx
        .manager
        .attach_and_mount_disk(&disk(true), &ctx.global_path)
        .unwrap_err();

    assert!(matches!(err, PdError::Mount { .. }));
    assert!(!ctx.global_path.exists());
}

#[test]
fn attach_uses_partition_device() {
    let ctx = TestContext::new(false);
    let partition = PathBuf::from(format!("{}1", ctx.device.display()));
    std::fs::write(&partition, b"").unwrap();

    let disk = DiskRef {
        partition: Some(1),
        ..disk(false)
    };
    ctx.manager
        .attach_and_mount_disk(&disk, &ctx.global_path)
        .unwrap();

    let Some(MountAction::Mount { source, .. }) = ctx.mounter.actions().into_iter().next() else {
        panic!("expected a mount");
    };
    assert_eq!(source, partition);
}

// ============================================================================
// DETACH TESTS
// ============================================================================

#[test]
fn detach_unmounts_and_detaches() {
    let ctx = TestContext::new(true);
    ctx.manager
        .attach_and_mount_disk(&disk(false), &ctx.global_path)
        .unwrap();

    ctx.manager.detach_disk(&disk(false), &ctx.global_path).unwrap();

    assert!(!ctx.mounter.is_mounted(&ctx.global_path));
    assert!(!ctx.global_path.exists());
    assert_eq!(ctx.provider.detach_calls(), vec![PD_NAME.to_string()]);
}

#[test]
fn detach_without_global_mount_still_detaches() {
    let ctx = TestContext::new(true);

    ctx.manager.detach_disk(&disk(false), &ctx.global_path).unwrap();

    assert_eq!(ctx.mounter.unmount_calls(), 0);
    assert_eq!(ctx.provider.detach_calls(), vec![PD_NAME.to_string()]);
}
