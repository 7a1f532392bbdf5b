// Integration tests for the turn broker
//
// A scripted upstream stands in for the live model so each test controls
// exactly which events arrive and when.

mod common;

use anyhow::Result;
use common::{Script, ScriptedConnector, Sent};
use std::sync::Arc;
use std::time::Duration;
use tutor_voice::audio::{pcm, wav};
use tutor_voice::broker::{BrokerSettings, Completion, TurnBroker, TurnError};
use tutor_voice::live::LiveEvent;
use tutor_voice::protocol::{Gender, SpeakerProfile, VoiceTurnRequest};
use tutor_voice::WavSpec;

fn broker(connector: &ScriptedConnector, turn_timeout: Duration) -> TurnBroker {
    TurnBroker::new(
        Arc::new(connector.clone()),
        BrokerSettings {
            turn_timeout,
            ..Default::default()
        },
    )
}

fn audio_chunk(bytes: &[u8]) -> LiveEvent {
    LiveEvent::AudioChunk(pcm::to_base64(bytes))
}

fn pcm_request() -> VoiceTurnRequest {
    VoiceTurnRequest::audio(vec![0u8; 3200], SpeakerProfile::default(), None)
}

#[tokio::test]
async fn test_audio_turn_joins_chunks_in_order() -> Result<()> {
    let connector = ScriptedConnector::replying(vec![
        audio_chunk(&[1, 1]),
        LiveEvent::TextChunk("Hola, ".to_string()),
        audio_chunk(&[2, 2]),
        LiveEvent::TextChunk("María.".to_string()),
        audio_chunk(&[3, 3]),
        LiveEvent::TurnComplete,
        audio_chunk(&[9, 9]),
    ]);

    let outcome = broker(&connector, Duration::from_secs(5))
        .run(&pcm_request())
        .await?;

    assert_eq!(outcome.completion, Completion::TurnComplete);
    assert_eq!(outcome.pcm, vec![1, 1, 2, 2, 3, 3]);
    assert_eq!(outcome.chunk_count, 3);
    assert_eq!(outcome.transcript.as_deref(), Some("Hola, María."));

    // Input then end marker, and the session is always closed
    assert_eq!(
        connector.sent(),
        vec![
            Sent::Audio {
                bytes: 3200,
                sample_rate: 16000
            },
            Sent::TurnComplete,
            Sent::Closed,
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_result_is_wav_with_output_spec() -> Result<()> {
    let connector = ScriptedConnector::replying(vec![
        audio_chunk(&[0u8; 480]),
        LiveEvent::TurnComplete,
    ]);

    let outcome = broker(&connector, Duration::from_secs(5))
        .run(&pcm_request())
        .await?;
    let result = outcome.into_result(WavSpec::mono_16bit(24000));

    assert!(!result.fallback);
    let audio = result.combined_audio.expect("audio");
    assert_eq!(audio.len(), wav::WAV_HEADER_LEN + 480);

    let (spec, data) = wav::decode(&audio)?;
    assert_eq!(spec, WavSpec::mono_16bit(24000));
    assert_eq!(data.len(), 480);

    Ok(())
}

#[tokio::test]
async fn test_text_only_reply_is_fallback() -> Result<()> {
    let connector = ScriptedConnector::replying(vec![
        LiveEvent::TextChunk("Muy bien".to_string()),
        LiveEvent::TurnComplete,
    ]);

    let outcome = broker(&connector, Duration::from_secs(5))
        .run(&pcm_request())
        .await?;
    let result = outcome.into_result(WavSpec::default());

    assert!(result.fallback);
    assert!(result.combined_audio.is_none());
    assert_eq!(result.transcript_text.as_deref(), Some("Muy bien"));

    Ok(())
}

#[tokio::test]
async fn test_closed_stream_keeps_partial_audio() -> Result<()> {
    let connector = ScriptedConnector::replying(vec![audio_chunk(&[4, 4]), audio_chunk(&[5, 5])]);

    let outcome = broker(&connector, Duration::from_secs(5))
        .run(&pcm_request())
        .await?;

    assert_eq!(outcome.completion, Completion::Closed);
    assert_eq!(outcome.pcm, vec![4, 4, 5, 5]);

    Ok(())
}

#[tokio::test]
async fn test_timeout_is_an_error_even_with_partial_audio() -> Result<()> {
    let connector = ScriptedConnector::new(Script {
        events: vec![audio_chunk(&[1, 2])],
        hang: true,
        ..Default::default()
    });

    let err = broker(&connector, Duration::from_millis(100))
        .run(&pcm_request())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.reason(), "timeout");
    assert_eq!(connector.sent().last(), Some(&Sent::Closed));

    Ok(())
}

#[tokio::test]
async fn test_slow_events_hit_the_ceiling() -> Result<()> {
    let connector = ScriptedConnector::new(Script {
        events: vec![audio_chunk(&[1]), audio_chunk(&[2]), LiveEvent::TurnComplete],
        event_delay: Duration::from_millis(80),
        ..Default::default()
    });

    let err = broker(&connector, Duration::from_millis(150))
        .run(&pcm_request())
        .await
        .unwrap_err();

    assert!(matches!(err, TurnError::Timeout(_)));

    Ok(())
}

#[tokio::test]
async fn test_stalled_close_does_not_hold_the_request() -> Result<()> {
    let connector = ScriptedConnector::new(Script {
        hang: true,
        hang_on_close: true,
        ..Default::default()
    });
    let broker = TurnBroker::new(
        Arc::new(connector.clone()),
        BrokerSettings {
            turn_timeout: Duration::from_millis(100),
            close_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );

    let started = std::time::Instant::now();
    let err = tokio::time::timeout(Duration::from_secs(2), broker.run(&pcm_request()))
        .await?
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(connector.sent().last(), Some(&Sent::Closed));

    Ok(())
}

#[tokio::test]
async fn test_closed_after_successful_turn_even_if_close_stalls() -> Result<()> {
    let connector = ScriptedConnector::new(Script {
        events: vec![audio_chunk(&[7, 7]), LiveEvent::TurnComplete],
        hang_on_close: true,
        ..Default::default()
    });
    let broker = TurnBroker::new(
        Arc::new(connector.clone()),
        BrokerSettings {
            close_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );

    let outcome = tokio::time::timeout(Duration::from_secs(2), broker.run(&pcm_request())).await??;

    assert_eq!(outcome.pcm, vec![7, 7]);

    Ok(())
}

#[tokio::test]
async fn test_upstream_error_fails_the_turn() -> Result<()> {
    let connector = ScriptedConnector::replying(vec![
        audio_chunk(&[1, 1]),
        LiveEvent::Error("quota exceeded".to_string()),
    ]);

    let err = broker(&connector, Duration::from_secs(5))
        .run(&pcm_request())
        .await
        .unwrap_err();

    assert!(matches!(err, TurnError::Upstream(ref m) if m == "quota exceeded"));
    assert_eq!(connector.sent().last(), Some(&Sent::Closed));

    Ok(())
}

#[tokio::test]
async fn test_connect_failure() -> Result<()> {
    let connector = ScriptedConnector::new(Script {
        fail_open: true,
        ..Default::default()
    });

    let err = broker(&connector, Duration::from_secs(5))
        .run(&pcm_request())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), "upstream_connect");
    assert!(connector.sent().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_wav_upload_is_unwrapped() -> Result<()> {
    let connector = ScriptedConnector::replying(vec![LiveEvent::TurnComplete]);
    let upload = wav::encode(&[0u8; 640], WavSpec::mono_16bit(44100));
    let request = VoiceTurnRequest::audio(upload, SpeakerProfile::default(), None);

    broker(&connector, Duration::from_secs(5)).run(&request).await?;

    assert_eq!(
        connector.sent()[0],
        Sent::Audio {
            bytes: 640,
            sample_rate: 44100
        }
    );

    Ok(())
}

#[tokio::test]
async fn test_stereo_wav_upload_rejected() -> Result<()> {
    let connector = ScriptedConnector::replying(vec![LiveEvent::TurnComplete]);
    let spec = WavSpec {
        sample_rate: 16000,
        channels: 2,
        bits_per_sample: 16,
    };
    let request = VoiceTurnRequest::audio(
        wav::encode(&[0u8; 64], spec),
        SpeakerProfile::default(),
        None,
    );

    let err = broker(&connector, Duration::from_secs(5))
        .run(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, TurnError::InvalidInput(_)));
    assert!(connector.sent().is_empty(), "nothing should reach upstream");

    Ok(())
}

#[tokio::test]
async fn test_text_turn_carries_profile_into_instruction() -> Result<()> {
    let connector = ScriptedConnector::replying(vec![LiveEvent::TurnComplete]);
    let profile = SpeakerProfile {
        name: Some("Lucía".to_string()),
        gender: Some(Gender::Female),
    };
    let request = VoiceTurnRequest::text(
        "¿Qué tal?",
        profile,
        Some("Tutor: Buenos días".to_string()),
    );

    broker(&connector, Duration::from_secs(5)).run(&request).await?;

    assert_eq!(connector.sent()[0], Sent::Text("¿Qué tal?".to_string()));
    let instruction = connector.last_instruction().expect("setup sent");
    assert!(instruction.contains("Lucía"));
    assert!(instruction.contains("Tutor: Buenos días"));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_turns_are_independent() -> Result<()> {
    let a = ScriptedConnector::replying(vec![audio_chunk(&[1]), LiveEvent::TurnComplete]);
    let b = ScriptedConnector::replying(vec![audio_chunk(&[2]), LiveEvent::TurnComplete]);
    let broker_a = broker(&a, Duration::from_secs(5));
    let broker_b = broker(&b, Duration::from_secs(5));
    let request = pcm_request();

    let (ra, rb) = tokio::join!(broker_a.run(&request), broker_b.run(&request));

    assert_eq!(ra?.pcm, vec![1]);
    assert_eq!(rb?.pcm, vec![2]);

    Ok(())
}
