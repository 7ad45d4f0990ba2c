//! Persistence across reopen
//!
//! A file-backed store keeps its interned values and entries, and ids keep
//! increasing after a restart even when the newest entries were deleted.

use slon_core::{CascadePolicy, Slon, SlonConfig, Topology};
use tempfile::TempDir;

fn store_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("slon.db")
}

#[test]
fn test_entries_survive_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let slon = Slon::open_path(store_path(&dir)).unwrap();
        let program = slon.insert(("program", "A"), ()).unwrap();
        slon.insert(("@", "init"), &program).unwrap();
    }

    let slon = Slon::open_path(store_path(&dir)).unwrap();
    let found = slon.path([("program", "A"), ("*", "*")]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].to_string(), "2. @ | init & null");
    assert_eq!(slon.intern("program").unwrap().index(), 1);
}

#[test]
fn test_ids_are_not_reused_after_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let slon = Slon::open_path(store_path(&dir)).unwrap();
        slon.insert_all([("a", "1"), ("a", "2"), ("a", "3")], ())
            .unwrap();
        slon.delete(("a", "3"), ()).unwrap();
    }

    let slon = Slon::open_path(store_path(&dir)).unwrap();
    let entry = slon.insert(("a", "4"), ()).unwrap().remove(0);
    assert_eq!(entry.id().get(), 4);
}

#[test]
fn test_config_file_drives_open() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("slon.toml");

    SlonConfig::new()
        .with_database(store_path(&dir))
        .with_topology(Topology::Tree)
        .with_cascade(CascadePolicy::Reject)
        .with_page_size(2)
        .to_file(&config_path)
        .unwrap();

    let config = SlonConfig::from_file(&config_path).unwrap();
    let slon = Slon::open(config).unwrap();
    assert_eq!(slon.config().topology, Topology::Tree);
    assert_eq!(slon.config().cascade, CascadePolicy::Reject);

    for n in 0..5 {
        slon.insert(("n", n.to_string()), ()).unwrap();
    }
    assert_eq!(slon.find(("n", "*"), ()).unwrap().len(), 5);
    assert!(store_path(&dir).exists());
}
