//! Lifecycle properties of the registry, checked against both stores.

use std::collections::BTreeMap;
use std::path::PathBuf;

use libvolume::{CreateRequest, MountRequest, VolumeDriver, VolumeError};

use crate::common::{ALL_STORES, StoreKind, registry, subdirs};

#[tokio::test]
async fn create_is_idempotent() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(kind, tmp.path());

        let first = reg.create(CreateRequest::named("data")).await.unwrap();
        std::fs::write(first.mountpoint.join("keep.txt"), b"contents").unwrap();
        let second = reg.create(CreateRequest::named("data")).await.unwrap();

        assert_eq!(first.mountpoint, second.mountpoint, "{kind:?}");
        assert_eq!(reg.list().await.len(), 1, "{kind:?}");
        // The second create must not have touched the directory.
        assert!(second.mountpoint.join("keep.txt").exists(), "{kind:?}");
    }
}

#[tokio::test]
async fn remove_of_unknown_volume_is_a_noop() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(kind, tmp.path());
        reg.create(CreateRequest::named("keep")).await.unwrap();
        let before = reg.list().await;

        reg.remove("ghost").await.unwrap();
        reg.remove("ghost").await.unwrap();

        assert_eq!(reg.list().await, before, "{kind:?}");
        assert_eq!(subdirs(tmp.path()), vec!["keep"], "{kind:?}");
    }
}

#[tokio::test]
async fn removed_volume_is_not_found() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(kind, tmp.path());

        reg.create(CreateRequest::named("tmp")).await.unwrap();
        reg.remove("tmp").await.unwrap();

        assert_eq!(
            reg.get("tmp").await.unwrap_err(),
            VolumeError::NotFound("tmp".into()),
            "{kind:?}"
        );
        assert!(matches!(reg.path("tmp").await, Err(VolumeError::NotFound(_))));
        assert!(!tmp.path().join("tmp").exists(), "{kind:?}");
    }
}

#[tokio::test]
async fn list_returns_exactly_created_volumes() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("volumes");
        let reg = registry(kind, &root);
        for name in ["c", "a", "b"] {
            reg.create(CreateRequest::named(name)).await.unwrap();
        }

        let listed: BTreeMap<String, PathBuf> = reg
            .list()
            .await
            .into_iter()
            .map(|v| (v.name.to_string(), v.mountpoint))
            .collect();
        let expected: BTreeMap<String, PathBuf> = ["a", "b", "c"]
            .into_iter()
            .map(|n| (n.to_owned(), root.join(n)))
            .collect();
        assert_eq!(listed, expected, "{kind:?}");
    }
}

#[tokio::test]
async fn list_with_missing_root_is_empty() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(kind, &tmp.path().join("created-lazily"));
        assert!(reg.list().await.is_empty(), "{kind:?}");
    }
}

#[tokio::test]
async fn mount_unknown_and_known() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(kind, tmp.path());

        assert_eq!(
            reg.mount(MountRequest::new("data", "id1")).await.unwrap_err(),
            VolumeError::NotFound("data".into()),
            "{kind:?}"
        );

        reg.create(CreateRequest::named("data")).await.unwrap();
        let path = reg.mount(MountRequest::new("data", "id1")).await.unwrap();
        assert_eq!(path, tmp.path().join("data"), "{kind:?}");
        assert_eq!(reg.path("data").await.unwrap(), path, "{kind:?}");
    }
}

#[tokio::test]
async fn unmount_without_mount() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(kind, tmp.path());

        // Strict on unknown volumes.
        assert!(matches!(
            reg.unmount(MountRequest::new("data", "id1")).await,
            Err(VolumeError::NotFound(_))
        ));

        // Lenient on IDs that never mounted.
        reg.create(CreateRequest::named("data")).await.unwrap();
        let before = reg.get("data").await.unwrap();
        reg.unmount(MountRequest::new("data", "id1")).await.unwrap();
        reg.unmount(MountRequest::new("data", "id1")).await.unwrap();
        assert_eq!(reg.get("data").await.unwrap(), before, "{kind:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_creates_make_one_directory() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(kind, tmp.path());

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let reg = reg.clone();
                tokio::spawn(async move { reg.create(CreateRequest::named("vol")).await })
            })
            .collect();

        for handle in handles {
            let volume = handle.await.unwrap().unwrap();
            assert_eq!(volume.mountpoint, tmp.path().join("vol"));
        }

        assert_eq!(subdirs(tmp.path()), vec!["vol"], "{kind:?}");
        assert_eq!(reg.list().await.len(), 1, "{kind:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn interleaved_create_remove_stays_consistent() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(kind, tmp.path());

        let handles: Vec<_> = (0..200)
            .map(|i| {
                let reg = reg.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        reg.create(CreateRequest::named("shared")).await.map(|_| ())
                    } else {
                        reg.remove("shared").await
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let registered = reg.get("shared").await.is_ok();
        let on_disk = tmp.path().join("shared").is_dir();
        assert_eq!(registered, on_disk, "{kind:?}");
    }
}

#[tokio::test]
async fn traversal_names_never_escape_root() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let reg = registry(kind, &root);

        for name in ["../escape", "..", "a/../../escape", "/escape"] {
            let err = reg.create(CreateRequest::named(name)).await.unwrap_err();
            assert!(matches!(err, VolumeError::InvalidName(_)), "{kind:?} {name}");
        }

        assert!(!tmp.path().join("escape").exists(), "{kind:?}");
        assert!(subdirs(tmp.path()).iter().all(|d| d == "root"), "{kind:?}");
        assert!(reg.list().await.is_empty(), "{kind:?}");
    }
}

#[tokio::test]
async fn disk_store_survives_restart() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let reg = registry(StoreKind::Disk, tmp.path());
        reg.create(CreateRequest::named("persisted")).await.unwrap();
    }

    let reg = registry(StoreKind::Disk, tmp.path());
    let vol = reg.get("persisted").await.unwrap();
    assert_eq!(vol.mountpoint, tmp.path().join("persisted"));
}

#[tokio::test]
async fn symlink_at_volume_path_is_refused() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let outside = tmp.path().join("outside");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("v")).unwrap();
        let reg = registry(kind, &root);

        let err = reg.create(CreateRequest::named("v")).await.unwrap_err();
        assert!(matches!(err, VolumeError::Creation { .. }), "{kind:?}: {err:?}");
        assert_eq!(
            reg.mount(MountRequest::new("v", "c1")).await.unwrap_err(),
            VolumeError::NotFound("v".into()),
            "{kind:?}"
        );
        assert!(reg.list().await.is_empty(), "{kind:?}");
        assert!(subdirs(&outside).is_empty(), "{kind:?}");
    }
}

#[tokio::test]
async fn create_over_regular_file_fails() {
    for kind in ALL_STORES {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("taken"), b"x").unwrap();
        let reg = registry(kind, tmp.path());

        let err = reg.create(CreateRequest::named("taken")).await.unwrap_err();
        match err {
            VolumeError::Creation { name, .. } => assert_eq!(name, "taken", "{kind:?}"),
            other => panic!("{kind:?}: unexpected error {other:?}"),
        }
        assert!(matches!(reg.get("taken").await, Err(VolumeError::NotFound(_))));
        assert!(reg.list().await.is_empty(), "{kind:?}");
    }
}

#[tokio::test]
async fn failed_removal_keeps_volume_registered() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = registry(StoreKind::Memory, tmp.path());
    reg.create(CreateRequest::named("v")).await.unwrap();

    // The directory is replaced by a file the store cannot remove as a tree.
    std::fs::remove_dir(tmp.path().join("v")).unwrap();
    std::fs::write(tmp.path().join("v"), b"x").unwrap();

    let err = reg.remove("v").await.unwrap_err();
    assert!(matches!(err, VolumeError::Removal { .. }), "{err:?}");
    let vol = reg.get("v").await.unwrap();
    assert_eq!(vol.mountpoint, tmp.path().join("v"));
    assert_eq!(reg.list().await.len(), 1);
}
