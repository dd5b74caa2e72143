//! Transcript lifecycle scenarios: format monotonicity, caption-track
//! shortcut, and content-addressed artifact staging

mod helpers;

use helpers::*;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use gavel_gather::models::{Collection, TranscriptFormat};
use gavel_gather::modules::WebVttModel;
use gavel_gather::types::Database;

#[tokio::test]
async fn test_transcript_format_never_downgrades() {
    let pipeline = TestPipeline::new().await;
    let splitter = CountingSplitter::new();

    // Run 1: model can only produce timestamped words
    let words_model = ScriptedSrModel::producing(TranscriptFormat::TimestampedWords);
    let run1 = pipeline.orchestrator(
        vec![descriptor("4053", Some("https://example.gov/videos/v1.mp4"))],
        splitter.clone(),
        words_model,
    );
    run1.run(test_span(), CancellationToken::new()).await.unwrap();

    let transcripts = pipeline
        .db
        .select_rows_as_list(Collection::Transcript)
        .await
        .unwrap();
    assert_eq!(transcripts.len(), 1);
    assert_eq!(transcripts[0]["format"], "timestamped-words");
    let transcript_id = transcripts[0]["id"].as_str().unwrap().to_string();

    // Run 2: reprocessing (new video URI) yields sentences — supersede
    let sentences_model = ScriptedSrModel::producing(TranscriptFormat::TimestampedSentences);
    let run2 = pipeline.orchestrator(
        vec![descriptor("4053", Some("https://example.gov/videos/v2.mp4"))],
        splitter.clone(),
        sentences_model,
    );
    run2.run(test_span(), CancellationToken::new()).await.unwrap();

    let transcripts = pipeline
        .db
        .select_rows_as_list(Collection::Transcript)
        .await
        .unwrap();
    assert_eq!(transcripts.len(), 1, "superseded, not duplicated");
    assert_eq!(transcripts[0]["format"], "timestamped-sentences");
    assert_eq!(transcripts[0]["id"], transcript_id.as_str());

    // Run 3: a lower-fidelity reprocess never downgrades the record
    let words_again = ScriptedSrModel::producing(TranscriptFormat::TimestampedWords);
    let run3 = pipeline.orchestrator(
        vec![descriptor("4053", Some("https://example.gov/videos/v3.mp4"))],
        splitter,
        words_again,
    );
    run3.run(test_span(), CancellationToken::new()).await.unwrap();

    let transcripts = pipeline
        .db
        .select_rows_as_list(Collection::Transcript)
        .await
        .unwrap();
    assert_eq!(transcripts.len(), 1);
    assert_eq!(transcripts[0]["format"], "timestamped-sentences");
}

#[tokio::test]
async fn test_caption_track_bypasses_audio_pipeline() {
    let pipeline = TestPipeline::new().await;
    let splitter = CountingSplitter::new();
    let sr_model = ScriptedSrModel::producing(TranscriptFormat::TimestampedWords);

    let captions = "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nGood afternoon, everyone.\n";
    let caption_path = pipeline.store_dir.path().join("captions.vtt");
    std::fs::write(&caption_path, captions).unwrap();

    let mut event = descriptor("4053", Some("https://example.gov/videos/4053.mp4"));
    event.caption_uri = Some(caption_path.to_str().unwrap().to_string());

    let orchestrator = pipeline.orchestrator_with(
        vec![event],
        splitter.clone(),
        sr_model.clone(),
        Some(Arc::new(WebVttModel::new())),
        serial_options(),
    );
    let summary = orchestrator
        .run(test_span(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.merged, 1);
    assert_eq!(splitter.call_count(), 0, "captions make splitting unnecessary");
    assert_eq!(sr_model.call_count(), 0);

    let transcripts = pipeline
        .db
        .select_rows_as_list(Collection::Transcript)
        .await
        .unwrap();
    assert_eq!(transcripts.len(), 1);
    assert_eq!(transcripts[0]["format"], "timestamped-sentences");
    assert_eq!(transcripts[0]["confidence"], 1.0);
}

#[tokio::test]
async fn test_identical_bytes_stage_exactly_one_object() {
    let pipeline = TestPipeline::new().await;
    let splitter = CountingSplitter::new();
    let sr_model = ScriptedSrModel::producing(TranscriptFormat::TimestampedSentences);

    // Two distinct events sharing one video stream: the splitter
    // re-derives identical audio bytes for each
    let shared_video = "https://example.gov/videos/joint-session.mp4";
    let orchestrator = pipeline.orchestrator_with(
        vec![
            descriptor("4060", Some(shared_video)),
            descriptor("4061", Some(shared_video)),
        ],
        splitter.clone(),
        sr_model,
        None,
        serial_options(),
    );
    orchestrator
        .run(test_span(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(splitter.call_count(), 2, "both candidates derive media");

    // One audio object, one sentences payload, one raw payload, one
    // split log — identical bytes collapsed to single stored objects
    let files = pipeline.db.select_rows_as_list(Collection::File).await.unwrap();
    assert_eq!(files.len(), 4);
    assert_eq!(pipeline.stored_object_count(), 4);

    // Both events reference the same transcript content
    let transcripts = pipeline
        .db
        .select_rows_as_list(Collection::Transcript)
        .await
        .unwrap();
    assert_eq!(transcripts.len(), 2);
    assert_eq!(transcripts[0]["file_id"], transcripts[1]["file_id"]);
}

#[tokio::test]
async fn test_transcript_file_contains_wire_payload() {
    let pipeline = TestPipeline::new().await;
    let splitter = CountingSplitter::new();
    let sr_model = ScriptedSrModel::producing(TranscriptFormat::TimestampedSentences);

    let orchestrator = pipeline.orchestrator(
        vec![descriptor("4053", Some("https://example.gov/videos/4053.mp4"))],
        splitter,
        sr_model,
    );
    orchestrator
        .run(test_span(), CancellationToken::new())
        .await
        .unwrap();

    let transcripts = pipeline
        .db
        .select_rows_as_list(Collection::Transcript)
        .await
        .unwrap();
    let file_id = transcripts[0]["file_id"].as_str().unwrap();

    let file = pipeline
        .db
        .find_by_id(Collection::File, file_id)
        .await
        .unwrap()
        .unwrap();
    let uri = file["uri"].as_str().unwrap();
    let path = uri.strip_prefix("file://").unwrap();

    let payload: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(payload["format"], "timestamped-sentences");
    assert_eq!(payload["confidence"], 0.9);
    assert_eq!(payload["data"][0]["text"], "Meeting called to order.");
    assert!(payload["data"][0]["start_time"].is_number());
    assert!(payload["data"][0]["end_time"].is_number());
}
