use crate::*;
use bucketkv::error::{ErrorKind, Result};
use bucketkv::storage::backends::InMemoryStore;
use bucketkv::storage::{AccessOptions, KeyValueAccess};
use std::sync::Arc;

const SAMPLE_PATHS: &[&str] = &[
    "",
    "/",
    "a",
    "/a/b/",
    "//a//b//c",
    "a/./b/../c",
    "/group/dataset/0/0/0",
];

pub fn tests(kva: &TestAccess, tests: &mut Vec<Trial>) {
    tests.extend(async_trials!(
        kva,
        test_normalize_is_idempotent,
        test_compose_of_components_normalizes,
        test_relativize_round_trip,
        test_parent,
        test_uri_keeps_container_prefix,
        test_invalid_locator
    ));
}

pub async fn test_normalize_is_idempotent(kva: TestAccess) -> Result<()> {
    for path in SAMPLE_PATHS {
        let once = kva.normalize(path);
        assert_eq!(kva.normalize(&once), once, "normalize({path:?})");
    }
    Ok(())
}

pub async fn test_compose_of_components_normalizes(kva: TestAccess) -> Result<()> {
    for path in SAMPLE_PATHS.iter().filter(|p| !p.contains('.')) {
        assert_eq!(
            kva.compose(kva.components(path)),
            kva.normalize(path),
            "compose(components({path:?}))"
        );
    }
    assert_eq!(kva.compose(Vec::<String>::new()), "");
    assert_eq!(kva.components("//a//b/"), vec!["a", "b"]);
    Ok(())
}

pub async fn test_relativize_round_trip(kva: TestAccess) -> Result<()> {
    let cases = [("group/sub/dataset", "group"), ("a/b", "a/b"), ("x/y/z", "")];
    for (path, base) in cases {
        let path_key = kva.uri(&format!("/{path}")).key().to_string();
        let base_key = kva.uri(&format!("/{base}")).key().to_string();
        let relative = kva.relativize(&path_key, &base_key);
        assert_eq!(kva.compose([base, relative.as_str()]), kva.normalize(path));

        // absolute and relative inputs give the same answer
        let stripped = kva.relativize(
            path_key.trim_start_matches('/'),
            base_key.trim_start_matches('/'),
        );
        assert_eq!(stripped, relative);
    }
    Ok(())
}

pub async fn test_parent(kva: TestAccess) -> Result<()> {
    assert_eq!(kva.parent("/a/b/c"), "a/b");
    assert_eq!(kva.parent("a"), "");
    assert_eq!(kva.parent("/"), "");
    Ok(())
}

pub async fn test_uri_keeps_container_prefix(kva: TestAccess) -> Result<()> {
    assert_eq!(kva.uri("c").to_string(), format!("{TEST_CONTAINER}/c"));
    assert_eq!(kva.uri("/").to_string(), TEST_CONTAINER);

    let nested = KeyValueAccess::from_locator(
        Arc::new(InMemoryStore::new("bucket")),
        "gs://bucket/a/b",
        AccessOptions::default(),
    )?;
    assert_eq!(nested.key("c"), "a/b/c");
    assert_eq!(nested.uri("c").key(), "/a/b/c");
    Ok(())
}

pub async fn test_invalid_locator(kva: TestAccess) -> Result<()> {
    let store = kva.store().clone();
    let err = match KeyValueAccess::from_locator(
        store,
        "ftp://nowhere/x",
        AccessOptions::default(),
    ) {
        Ok(_) => panic!("ftp locator must be rejected"),
        Err(err) => err,
    };
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("ftp://nowhere/x"));
    Ok(())
}
