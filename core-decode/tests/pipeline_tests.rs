mod common;

use common::*;
use core_decode::{
    collect_pcm, decode_buffered, mpeg::Id3Decision, DecodeConfig, DecodeError, EventSequencer,
    FrameAssembler, Id3TagSkipper, SessionPhase, StreamFormat, SynthesisEvent,
};
use std::ops::Range;

/// Frame byte ranges found when `chunks` are fed one after another.
fn frame_ranges(chunks: &[Vec<u8>]) -> Vec<Range<u64>> {
    let mut assembler = FrameAssembler::new();
    let mut tag_resolved = false;
    let mut ranges = Vec::new();

    for chunk in chunks {
        assembler.append(chunk);
        if !tag_resolved {
            match Id3TagSkipper::inspect(assembler.pending()) {
                Id3Decision::NeedMoreData => continue,
                Id3Decision::Skip(len) => assembler.discard(len),
            }
            tag_resolved = true;
        }
        ranges.extend(assembler.extract_frames().iter().map(|f| f.stream_range()));
    }
    ranges
}

fn run(chunks: &[Vec<u8>], factory: &FakeFactory) -> Vec<SynthesisEvent> {
    let mut sequencer = EventSequencer::new(factory.shared(), DecodeConfig::default());
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(sequencer.process(chunk));
    }
    events.extend(sequencer.finish());
    sequencer.close();
    events
}

#[test]
fn test_id3_tag_skip_length() {
    let data = mpeg_fixture(1);
    assert_eq!(Id3TagSkipper::inspect(&data), Id3Decision::Skip(267));

    let ranges = frame_ranges(&[data]);
    assert_eq!(ranges, vec![267..684]);
}

#[test]
fn test_frame_ranges_independent_of_chunking() {
    let data = mpeg_fixture(8);
    let reference = frame_ranges(&[data.clone()]);
    assert_eq!(reference.len(), 8);

    // mid-ID3 header, mid-ID3 body, mid-frame header, mid-frame
    for offsets in [
        vec![5],
        vec![9, 10, 11],
        vec![100, 266, 268],
        vec![269, 270, 271],
        vec![10, 600],
        vec![684, 685, 1102],
    ] {
        assert_eq!(
            frame_ranges(&split_at(&data, &offsets)),
            reference,
            "offsets {:?}",
            offsets
        );
    }

    for seed in 0..32 {
        let offsets = pseudo_random_splits(data.len(), seed, 12);
        assert_eq!(
            frame_ranges(&split_at(&data, &offsets)),
            reference,
            "seed {}",
            seed
        );
    }
}

#[test]
fn test_end_to_end_three_chunks() {
    let data = mpeg_fixture(6);

    let whole = run(&[data.clone()], &FakeFactory::new());
    let factory = FakeFactory::new();
    let split = run(&split_at(&data, &[10, 600]), &factory);

    assert!(matches!(
        split[0],
        SynthesisEvent::Started(format) if format == StreamFormat::new(44100, 2, 16)
    ));
    assert_well_formed(&split);
    assert!(matches!(split.last(), Some(SynthesisEvent::Done)));

    let pcm = collect_pcm(&split);
    assert_eq!(pcm.len(), 6 * PCM_PER_FRAME);
    assert_eq!(pcm, collect_pcm(&whole));

    assert_eq!(*factory.probe.frame_lengths.lock(), vec![417, 418, 417, 418, 417, 418]);
    assert_eq!(factory.probe.created(), 1);
    assert_eq!(factory.probe.releases(), 1);
}

#[test]
fn test_event_pattern_under_random_chunking() {
    let data = mpeg_fixture(5);
    for seed in 0..16 {
        let factory = FakeFactory::new().busy_every(3);
        let events = run(&split_at(&data, &pseudo_random_splits(data.len(), seed, 20)), &factory);

        assert_well_formed(&events);
        assert_eq!(
            events.iter().filter(|e| matches!(e, SynthesisEvent::Started(_))).count(),
            1
        );
        assert_eq!(collect_pcm(&events).len(), 5 * PCM_PER_FRAME);
        assert_eq!(factory.probe.releases(), 1);
    }
}

#[test]
fn test_audio_preserves_frame_order_with_busy_engine() {
    let factory = FakeFactory::new().busy_every(2);
    let events = run(&[mpeg_fixture(7)], &factory);

    let order: Vec<u8> = events
        .iter()
        .filter_map(SynthesisEvent::pcm)
        .map(|chunk| chunk[0])
        .collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(factory.probe.frame_lengths.lock().len(), 7);
}

#[test]
fn test_engine_failure_keeps_earlier_audio() {
    let factory = FakeFactory::new().fail_at(3);
    let events = run(&split_at(&mpeg_fixture(6), &[1000]), &factory);

    assert_well_formed(&events);
    let kinds = kinds(&events);
    assert_eq!(kinds.first(), Some(&"started"));
    assert_eq!(kinds.last(), Some(&"error"));
    assert!(!kinds.contains(&"done"));
    assert!(!collect_pcm(&events).is_empty());
    assert_eq!(factory.probe.releases(), 1);

    match events.last() {
        Some(SynthesisEvent::Error { cause, .. }) => {
            assert!(cause.as_deref().is_some_and(DecodeError::is_engine_error))
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[test]
fn test_close_twice_releases_once() {
    let factory = FakeFactory::new();
    let mut sequencer = EventSequencer::new(factory.shared(), DecodeConfig::default());

    let events = sequencer.process(&mpeg_fixture(2));
    assert_eq!(kinds(&events)[0], "started");

    // cancelled mid-stream
    sequencer.close();
    sequencer.close();
    assert_eq!(factory.probe.releases(), 1);

    drop(sequencer);
    assert_eq!(factory.probe.releases(), 1);
}

#[test]
fn test_close_before_any_frame() {
    let factory = FakeFactory::new();
    let mut sequencer = EventSequencer::new(factory.shared(), DecodeConfig::default());
    assert!(sequencer.process(&id3_tag()[..50]).is_empty());
    assert_eq!(sequencer.phase(), SessionPhase::AwaitingId3);

    sequencer.close();
    sequencer.close();
    assert_eq!(factory.probe.created(), 0);
    assert_eq!(factory.probe.releases(), 0);
}

#[test]
fn test_resync_after_leading_garbage() {
    let mut data = vec![0xFF, 0x00, 0x55, 0xFF, 0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    data.extend(frame());
    data.extend(padded_frame());

    let factory = FakeFactory::new();
    let mut sequencer = EventSequencer::new(factory.shared(), DecodeConfig::default());
    let mut events = sequencer.process(&data);
    events.extend(sequencer.finish());

    assert_well_formed(&events);
    assert_eq!(collect_pcm(&events).len(), 2 * PCM_PER_FRAME);
    assert_eq!(sequencer.stats().bytes_skipped, 11);
}

#[test]
fn test_truncated_stream_without_frame_fails() {
    let factory = FakeFactory::new();
    let events = run(&[id3_tag()], &factory);

    assert_eq!(kinds(&events), vec!["error"]);
    assert_eq!(factory.probe.created(), 0);
}

#[test]
fn test_header_without_complete_frame_finishes() {
    let factory = FakeFactory::new();
    let mut data = id3_tag();
    data.extend(&frame()[..300]);

    let events = run(&split_at(&data, &[270]), &factory);

    assert_eq!(kinds(&events), vec!["started", "done"]);
    assert!(matches!(
        events[0],
        SynthesisEvent::Started(format) if format == StreamFormat::pcm16(44100, 2)
    ));
    assert_eq!(factory.probe.created(), 1);
    assert_eq!(factory.probe.releases(), 1);
}

#[test]
fn test_decode_buffered_mpeg() {
    let factory = FakeFactory::new();
    let result =
        decode_buffered(&mpeg_fixture(4), factory.shared(), &DecodeConfig::default()).unwrap();

    assert_eq!(result.sample_rate, 44100);
    assert_eq!(result.channels, 2);
    assert_eq!(result.bits_per_sample, 16);
    assert_eq!(result.pcm.len(), 4 * PCM_PER_FRAME);
    assert_eq!(factory.probe.releases(), 1);
}

#[test]
fn test_decode_buffered_wav() {
    let pcm: Vec<u8> = (0..=255u8).collect();
    let result = decode_buffered(
        &wav_fixture(24000, 1, &pcm),
        FakeFactory::new().shared(),
        &DecodeConfig::default(),
    )
    .unwrap();

    assert_eq!(result.format(), StreamFormat::new(24000, 1, 16));
    assert_eq!(result.pcm.as_ref(), pcm.as_slice());
}

#[test]
fn test_decode_buffered_rejects_non_wave_riff() {
    let factory = FakeFactory::new();
    let err = decode_buffered(
        &riff_with_bad_form_type(),
        factory.shared(),
        &DecodeConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(err, DecodeError::Format(ref msg) if msg.contains("WAVX")));
    assert_eq!(factory.probe.created(), 0);
}

#[test]
fn test_decode_buffered_errors() {
    let factory = FakeFactory::new();
    let err = decode_buffered(b"no audio in here", factory.shared(), &DecodeConfig::default())
        .unwrap_err();
    assert!(matches!(err, DecodeError::SyncNotFound { scanned: 16 }));

    let err = decode_buffered(
        &mpeg_fixture(3),
        FakeFactory::new().fail_at(0).shared(),
        &DecodeConfig::default(),
    )
    .unwrap_err();
    assert!(err.is_engine_error());
}
