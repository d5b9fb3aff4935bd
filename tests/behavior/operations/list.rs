use crate::*;
use bucketkv::error::{ErrorKind, Result};
use bucketkv::storage::AccessOptions;
use bucketkv::storage::backends::InMemoryStore;

pub fn tests(kva: &TestAccess, tests: &mut Vec<Trial>) {
    tests.extend(async_trials!(
        kva,
        test_list_created_hierarchy,
        test_list_container_root,
        test_list_directories_only,
        test_list_invalid_group,
        test_list_empty_group
    ));
}

pub async fn test_list_created_hierarchy(kva: TestAccess) -> Result<()> {
    let base = TEST_FIXTURE.new_dir_path();
    kva.create_directories(&format!("/{base}one/two/three")).await?;

    assert_eq!(kva.list(&format!("/{base}")).await?, vec!["one"]);
    assert_eq!(kva.list(&format!("/{base}one")).await?, vec!["two"]);
    assert_eq!(kva.list(&format!("/{base}one/two")).await?, vec!["three"]);
    assert!(kva.list(&format!("/{base}one/two/three")).await?.is_empty());
    Ok(())
}

pub async fn test_list_container_root(_kva: TestAccess) -> Result<()> {
    let kva = new_access(InMemoryStore::new(TEST_BUCKET), AccessOptions::default())?;
    kva.create_directories("/one/two/three").await?;
    assert_eq!(kva.list("/").await?, vec!["one"]);
    assert_eq!(kva.list_directories("").await?, vec!["one"]);
    Ok(())
}

pub async fn test_list_directories_only(kva: TestAccess) -> Result<()> {
    let base = TEST_FIXTURE.new_dir_path();
    kva.create_directories(&format!("{base}group/s0")).await?;
    kva.write(&format!("{base}group/attributes.json"), "{}").await?;
    kva.write(&format!("{base}group/d0/0/0"), vec![0u8; 16]).await?;

    let mut all = kva.list(&format!("{base}group")).await?;
    all.sort();
    assert_eq!(all, vec!["attributes.json", "d0", "s0"]);

    let mut groups = kva.list_directories(&format!("{base}group")).await?;
    groups.sort();
    assert_eq!(groups, vec!["d0", "s0"]);
    Ok(())
}

pub async fn test_list_invalid_group(kva: TestAccess) -> Result<()> {
    let base = TEST_FIXTURE.new_dir_path();
    kva.create_directories(&format!("/{base}one/two")).await?;

    let err = kva.list(&format!("/{base}one/tw")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert!(err.to_string().contains("is not a valid group"));

    // a dataset is not a group either
    let (path, content, _) = TEST_FIXTURE.new_file();
    kva.write(&path, content).await?;
    assert!(kva.list(&path).await.is_err());
    Ok(())
}

pub async fn test_list_empty_group(kva: TestAccess) -> Result<()> {
    let base = TEST_FIXTURE.new_dir_path();
    kva.create_directories(&base).await?;
    assert!(kva.list(&base).await?.is_empty());
    assert!(kva.list_directories(&base).await?.is_empty());
    Ok(())
}
