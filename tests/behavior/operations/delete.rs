use crate::*;
use bucketkv::error::{ErrorKind, Result};
use bucketkv::storage::backends::InMemoryStore;
use bucketkv::storage::{AccessOptions, KeyValueAccess};
use std::sync::Arc;

pub fn tests(kva: &TestAccess, tests: &mut Vec<Trial>) {
    tests.extend(async_trials!(
        kva,
        test_remove_keeps_ancestors,
        test_remove_file,
        test_remove_keeps_prefix_siblings,
        test_remove_without_batch_delete,
        test_remove_bucket_root,
        test_remove_nonexistent
    ));
}

pub async fn test_remove_keeps_ancestors(kva: TestAccess) -> Result<()> {
    let base = TEST_FIXTURE.new_dir_path();
    kva.create_directories(&format!("/{base}one/two/three")).await?;

    kva.delete(&format!("/{base}one/two/three")).await?;
    assert!(!kva.exists(&format!("/{base}one/two/three")).await?);
    assert!(kva.exists(&format!("/{base}one/two")).await?);
    assert!(kva.exists(&format!("/{base}one")).await?);

    kva.delete(&format!("/{base}one")).await?;
    assert!(!kva.exists(&format!("/{base}one")).await?);
    assert!(!kva.exists(&format!("/{base}one/two")).await?);
    Ok(())
}

pub async fn test_remove_file(kva: TestAccess) -> Result<()> {
    let (path, content, _) = TEST_FIXTURE.new_file();
    kva.write(&path, content).await?;
    kva.delete(&path).await?;
    assert!(!kva.exists(&path).await?);
    assert_eq!(kva.size(&path).await.unwrap_err().kind(), ErrorKind::NoSuchKey);
    Ok(())
}

pub async fn test_remove_keeps_prefix_siblings(kva: TestAccess) -> Result<()> {
    let base = TEST_FIXTURE.new_dir_path();
    kva.create_directories(&format!("{base}one/two")).await?;
    kva.write(&format!("{base}onetwo"), "sibling").await?;

    kva.delete(&format!("{base}one")).await?;
    assert!(kva.is_file(&format!("{base}onetwo")).await?);
    assert_eq!(kva.list(&base).await?, vec!["onetwo"]);
    Ok(())
}

pub async fn test_remove_without_batch_delete(_kva: TestAccess) -> Result<()> {
    let kva = new_access(
        InMemoryStore::new(TEST_BUCKET).without_batch_delete(),
        AccessOptions::default(),
    )?;
    for i in 0..25 {
        kva.write(&format!("group/c{i}"), vec![i as u8]).await?;
    }
    kva.delete("group").await?;
    assert!(!kva.exists("group").await?);
    assert!(kva.store().keys().is_empty());
    Ok(())
}

pub async fn test_remove_bucket_root(_kva: TestAccess) -> Result<()> {
    let store = Arc::new(InMemoryStore::new(TEST_BUCKET));
    let bucket_root = format!("gs://{TEST_BUCKET}");

    let unmanaged =
        KeyValueAccess::from_locator(store.clone(), &bucket_root, AccessOptions::default())?;
    let err = unmanaged.delete("/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let managed = KeyValueAccess::from_locator(
        store,
        &bucket_root,
        AccessOptions {
            create_bucket: true,
            ..AccessOptions::default()
        },
    )?;
    managed.create_directories("a/b").await?;
    managed.write("a/b/c", "data").await?;
    managed.delete("/").await?;
    assert!(!managed.bucket_exists().await?);
    Ok(())
}

pub async fn test_remove_nonexistent(kva: TestAccess) -> Result<()> {
    let path = TEST_FIXTURE.new_file_path();
    kva.delete(&path).await?;
    assert!(!kva.exists(&path).await?);
    Ok(())
}
