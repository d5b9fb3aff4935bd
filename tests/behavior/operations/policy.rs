use crate::*;
use bucketkv::error::{ErrorKind, Result};
use bucketkv::storage::AccessOptions;
use bucketkv::storage::backends::InMemoryStore;
use bucketkv::storage::policy::IoPolicy;

pub fn tests(kva: &TestAccess, tests: &mut Vec<Trial>) {
    tests.extend(async_trials!(
        kva,
        test_round_trip_unsafe,
        test_round_trip_generation_match,
        test_generation_match_detects_concurrent_write,
        test_unsafe_returns_latest_write,
        test_read_missing_key,
        test_size_and_slices
    ));
}

fn access_with(io_policy: IoPolicy) -> Result<TestAccess> {
    new_access(
        InMemoryStore::new(TEST_BUCKET),
        AccessOptions {
            io_policy,
            ..AccessOptions::default()
        },
    )
}

async fn round_trip(kva: &TestAccess) -> Result<()> {
    let (path, content, size) = TEST_FIXTURE.new_file();
    kva.write(&path, content.clone()).await?;

    let handle = kva.read(&path);
    assert_eq!(handle.require_length().await?, size as u64);
    assert_eq!(handle.all_bytes().await?.as_ref(), content.as_slice());
    handle.close();
    Ok(())
}

pub async fn test_round_trip_unsafe(kva: TestAccess) -> Result<()> {
    round_trip(&kva).await
}

pub async fn test_round_trip_generation_match(_kva: TestAccess) -> Result<()> {
    round_trip(&access_with(IoPolicy::GenerationMatch)?).await
}

pub async fn test_generation_match_detects_concurrent_write(_kva: TestAccess) -> Result<()> {
    let kva = access_with(IoPolicy::GenerationMatch)?;
    kva.write("dataset/0", "first version").await?;

    let handle = kva.read("dataset/0");
    handle.require_length().await?;
    let pinned = handle.pinned_generation();
    assert!(pinned.is_some());

    // a second writer updates the object
    let other = kva.clone();
    other.write("dataset/0", "second version").await?;

    let err = handle.all_bytes().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
    assert!(err.to_string().contains(&pinned.unwrap_or_default().to_string()));

    handle.close();
    assert_eq!(handle.all_bytes().await?.as_ref(), b"second version");
    Ok(())
}

pub async fn test_unsafe_returns_latest_write(_kva: TestAccess) -> Result<()> {
    let kva = access_with(IoPolicy::Unsafe)?;
    kva.write("dataset/0", "first version").await?;

    let handle = kva.read("dataset/0");
    handle.require_length().await?;
    kva.write("dataset/0", "second version").await?;

    assert_eq!(handle.all_bytes().await?.as_ref(), b"second version");
    assert_eq!(handle.pinned_generation(), None);
    Ok(())
}

pub async fn test_read_missing_key(kva: TestAccess) -> Result<()> {
    let path = TEST_FIXTURE.new_file_path();
    let err = kva.read(&path).all_bytes().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchKey);
    assert_eq!(kva.size(&path).await.unwrap_err().kind(), ErrorKind::NoSuchKey);
    Ok(())
}

pub async fn test_size_and_slices(kva: TestAccess) -> Result<()> {
    let (path, content, size) = TEST_FIXTURE.new_file_with_range(
        uuid::Uuid::new_v4().to_string(),
        64..4096,
    );
    kva.write(&path, content.clone()).await?;
    assert_eq!(kva.size(&path).await?, size as u64);

    let handle = kva.read(&path);
    let slice = handle.slice(10, Some(20));
    assert_eq!(slice.require_length().await?, 20);
    assert_eq!(slice.all_bytes().await?.as_ref(), &content[10..30]);
    assert_eq!(slice.materialize(5, Some(5)).await?.as_ref(), &content[15..20]);

    let err = slice.materialize(15, Some(10)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    Ok(())
}
