use crate::*;
use bucketkv::error::{ErrorKind, Result};
use futures::StreamExt;

pub fn tests(kva: &TestAccess, tests: &mut Vec<Trial>) {
    tests.extend(async_trials!(
        kva,
        test_write_then_read_channel,
        test_ranged_write_preserves_surrounding_bytes,
        test_ranged_write_creates_missing_object,
        test_ranged_read,
        test_missing_key_surfaces_on_read,
        test_close_during_read_fails_reader,
        test_read_channel_rejects_writes,
        test_text_reader_and_writer
    ));
}

pub async fn test_write_then_read_channel(kva: TestAccess) -> Result<()> {
    let (path, content, _) = TEST_FIXTURE.new_file();

    let channel = kva.lock_for_writing(&path).await?;
    let mut output = channel.new_output_stream()?;
    for chunk in content.chunks(1000) {
        output.write_all(chunk)?;
    }
    channel.close().await?;

    let channel = kva.lock_for_reading(&path);
    let mut input = channel.new_input_stream().await?;
    let mut read = Vec::new();
    while let Some(chunk) = input.next().await {
        read.extend_from_slice(&chunk?);
    }
    channel.close().await?;
    assert_eq!(read, content);
    Ok(())
}

pub async fn test_ranged_write_preserves_surrounding_bytes(kva: TestAccess) -> Result<()> {
    let (path, content, size) = TEST_FIXTURE.new_file_with_range(
        uuid::Uuid::new_v4().to_string(),
        100..2048,
    );
    kva.write(&path, content.clone()).await?;

    let start = size / 3;
    let patch = vec![0xAB_u8; size / 4];
    let channel = kva
        .lock_for_writing_range(&path, start as u64, Some(patch.len() as u64))
        .await?;
    let mut output = channel.new_output_stream()?;
    output.write_all(&patch)?;
    output.close().await?;
    channel.close().await?;

    let read = kva.read(&path).all_bytes().await?;
    assert_eq!(read.len(), size);
    assert_eq!(&read[..start], &content[..start]);
    assert_eq!(&read[start..start + patch.len()], patch.as_slice());
    assert_eq!(&read[start + patch.len()..], &content[start + patch.len()..]);
    Ok(())
}

pub async fn test_ranged_write_creates_missing_object(kva: TestAccess) -> Result<()> {
    let path = TEST_FIXTURE.new_file_path();
    let channel = kva.lock_for_writing_range(&path, 4, None).await?;
    channel.new_output_stream()?.write_all(b"tail")?;
    channel.close().await?;

    assert_eq!(kva.read(&path).all_bytes().await?.as_ref(), b"\0\0\0\0tail");
    Ok(())
}

pub async fn test_ranged_read(kva: TestAccess) -> Result<()> {
    let (path, content, size) = TEST_FIXTURE.new_file_with_range(
        uuid::Uuid::new_v4().to_string(),
        32..1024,
    );
    kva.write(&path, content.clone()).await?;

    let channel = kva.lock_for_reading_range(&path, 8, Some(16));
    let read = channel.new_input_stream().await?.read_to_end().await?;
    assert_eq!(read.as_ref(), &content[8..24]);

    let channel = kva.lock_for_reading_range(&path, 8, None);
    let read = channel.new_input_stream().await?.read_to_end().await?;
    assert_eq!(read.len(), size - 8);
    channel.close().await?;
    Ok(())
}

pub async fn test_missing_key_surfaces_on_read(kva: TestAccess) -> Result<()> {
    let path = TEST_FIXTURE.new_file_path();
    let channel = kva.lock_for_reading(&path);
    // opening succeeds, the store reports the missing key with the first chunk
    let mut input = channel.new_input_stream().await?;
    let err = input.read_to_end().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchKey);
    channel.close().await?;
    Ok(())
}

pub async fn test_close_during_read_fails_reader(kva: TestAccess) -> Result<()> {
    let (path, content, _) = TEST_FIXTURE.new_file_with_range(
        uuid::Uuid::new_v4().to_string(),
        20_000..40_000,
    );
    kva.write(&path, content).await?;

    let channel = kva.lock_for_reading(&path);
    let mut input = channel.new_input_stream().await?;
    let first = input.next().await.transpose()?.unwrap_or_default();
    assert!(!first.is_empty());

    channel.close().await?;
    // the rest of the object is gone with the channel, not silently truncated
    let err = input.read_to_end().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(input.next().await.is_some_and(|chunk| chunk.is_err()));
    Ok(())
}

pub async fn test_read_channel_rejects_writes(kva: TestAccess) -> Result<()> {
    let path = TEST_FIXTURE.new_file_path();
    let channel = kva.lock_for_reading(&path);
    let err = match channel.new_output_stream() {
        Ok(_) => panic!("read channel handed out an output stream"),
        Err(err) => err,
    };
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(channel.new_writer().is_err());
    channel.close().await?;
    channel.close().await?;
    Ok(())
}

pub async fn test_text_reader_and_writer(kva: TestAccess) -> Result<()> {
    let path = TEST_FIXTURE.new_file_path();
    let text = "{\"dimensions\":[64,64],\"dataType\":\"uint8\"}";

    let channel = kva.lock_for_writing(&path).await?;
    let mut writer = channel.new_writer()?;
    writer.write_str(text)?;
    // closing the channel commits the open writer
    channel.close().await?;

    let channel = kva.lock_for_reading(&path);
    let read = channel.new_reader().await?.read_to_string().await?;
    channel.close().await?;
    assert_eq!(read, text);
    Ok(())
}
