use std::{sync::Arc, time::Duration};

use aes::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use hlsrec::{
    decrypt::derive_iv,
    fetch::{SegmentOutcome, SegmentWriter, SkipReason},
    hls::{EncryptionDescriptor, SegmentDescriptor},
    HttpClient, Progress,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use super::HlsMock;

const KEY: [u8; 16] = *b"0123456789abcdef";

fn encrypt(data: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Vec<u8> {
    let mut buf = data.to_vec();
    let len = buf.len();
    cbc::Encryptor::<aes::Aes128>::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .unwrap();
    buf
}

fn descriptor(
    server: &MockServer,
    name: &str,
    sequence: u64,
    key: Option<Arc<EncryptionDescriptor>>,
) -> SegmentDescriptor {
    SegmentDescriptor {
        uri: format!("{}/{name}", server.uri()),
        sequence,
        key,
        recorded: Duration::from_secs(sequence),
    }
}

fn aes_key(server: &MockServer, name: &str) -> Arc<EncryptionDescriptor> {
    Arc::new(EncryptionDescriptor {
        method: "AES-128".to_string(),
        uri: format!("{}/{name}", server.uri()),
        iv: None,
    })
}

async fn write_all(segments: Vec<SegmentDescriptor>) -> anyhow::Result<(Vec<u8>, Arc<Progress>)> {
    let (sender, receiver) = mpsc::channel(1024);
    for segment in segments {
        sender.send(segment).await?;
    }
    drop(sender);

    let progress = Arc::new(Progress::new());
    let writer =
        SegmentWriter::new(HttpClient::default(), Vec::new()).with_progress(progress.clone());
    let output = writer.run(receiver, CancellationToken::new()).await?;
    Ok((output, progress))
}

#[tokio::test]
async fn missing_segment_is_skipped() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock("/a.ts", "AAAA")
        .await
        .mock_status("/b.ts", 404)
        .await
        .mock("/c.ts", "CCCC")
        .await;

    let (output, progress) = write_all(vec![
        descriptor(&server, "a.ts", 0, None),
        descriptor(&server, "b.ts", 1, None),
        descriptor(&server, "c.ts", 2, None),
    ])
    .await?;

    assert_eq!(output, b"AAAACCCC");
    assert_eq!(progress.finished(), 2);
    assert_eq!(progress.skipped(), 1);

    Ok(())
}

#[tokio::test]
async fn consume_reports_outcomes() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock("/a.ts", "AAAA")
        .await
        .mock_status("/b.ts", 404)
        .await;

    let token = CancellationToken::new();
    let mut writer = SegmentWriter::new(HttpClient::default(), Vec::new());

    let outcome = writer
        .consume(&descriptor(&server, "a.ts", 0, None), &token)
        .await?;
    assert!(matches!(
        outcome,
        SegmentOutcome::Appended {
            bytes: 4,
            degraded: false
        }
    ));

    let outcome = writer
        .consume(&descriptor(&server, "b.ts", 1, None), &token)
        .await?;
    assert!(matches!(
        outcome,
        SegmentOutcome::Skipped(SkipReason::Status(status)) if status.as_u16() == 404
    ));

    token.cancel();
    let outcome = writer
        .consume(&descriptor(&server, "a.ts", 2, None), &token)
        .await?;
    assert!(matches!(outcome, SegmentOutcome::Discarded));

    Ok(())
}

#[tokio::test]
async fn encrypted_segments_share_one_key_request() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/key.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(KEY.to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let first = [0x11u8; 32];
    let second = [0x22u8; 48];
    server
        .mock_bytes("/s5.ts", encrypt(&first, &KEY, &derive_iv(5)))
        .await
        .mock_bytes("/s6.ts", encrypt(&second, &KEY, &derive_iv(6)))
        .await;

    let key = aes_key(&server, "key.bin");
    let (output, _) = write_all(vec![
        descriptor(&server, "s5.ts", 5, Some(key.clone())),
        descriptor(&server, "s6.ts", 6, Some(key)),
    ])
    .await?;

    let mut expected = first.to_vec();
    expected.extend_from_slice(&second);
    assert_eq!(output, expected);

    Ok(())
}

#[tokio::test]
async fn failed_key_fetch_writes_raw_bytes() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let encrypted = encrypt(&[0x33u8; 16], &KEY, &derive_iv(0));
    server
        .mock_status("/key.bin", 500)
        .await
        .mock_bytes("/s0.ts", encrypted.clone())
        .await
        .mock("/s1.ts", "clear")
        .await;

    let token = CancellationToken::new();
    let mut writer = SegmentWriter::new(HttpClient::default(), Vec::new());

    let outcome = writer
        .consume(
            &descriptor(&server, "s0.ts", 0, Some(aes_key(&server, "key.bin"))),
            &token,
        )
        .await?;
    assert!(matches!(
        outcome,
        SegmentOutcome::Appended {
            bytes: 16,
            degraded: true
        }
    ));

    let outcome = writer
        .consume(&descriptor(&server, "s1.ts", 1, None), &token)
        .await?;
    assert!(matches!(
        outcome,
        SegmentOutcome::Appended {
            degraded: false,
            ..
        }
    ));

    let key = aes_key(&server, "key.bin");
    let (output, progress) = write_all(vec![
        descriptor(&server, "s0.ts", 0, Some(key)),
        descriptor(&server, "s1.ts", 1, None),
    ])
    .await?;
    assert_eq!(output, [encrypted, b"clear".to_vec()].concat());
    assert_eq!(progress.finished(), 2);

    Ok(())
}
