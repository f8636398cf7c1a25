//! Playback coordinator tests
//!
//! Exclusive sounds, narration routing (cache hit vs speech fallback) and
//! the stale narration guard, against recording test doubles.

mod helpers;

use helpers::{wav_bytes, CountingStatics, CountingStore, OutputEvent, RecordingOutput, RecordingSpeech};
use mqz_audio::audio::{pcm, AudioAsset, NullOutput};
use mqz_audio::cache::{DirectorySource, TieredAudioCache};
use mqz_audio::playback::{PlaybackCoordinator, SpeechSettings};
use mqz_common::phrases;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

struct Rig {
    output: Arc<RecordingOutput>,
    speech: Arc<RecordingSpeech>,
    coordinator: PlaybackCoordinator,
}

fn rig(cache: TieredAudioCache) -> Rig {
    let output = Arc::new(RecordingOutput::default());
    let speech = Arc::new(RecordingSpeech::default());
    let coordinator = PlaybackCoordinator::new(
        cache,
        output.clone(),
        speech.clone(),
        SpeechSettings::default(),
    );
    Rig {
        output,
        speech,
        coordinator,
    }
}

fn memory_only() -> TieredAudioCache {
    TieredAudioCache::new(None, None)
}

#[tokio::test(start_paused = true)]
async fn test_celebration_cancels_heartbeat() {
    let rig = rig(memory_only());

    rig.coordinator.start_suspense_music();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(rig.output.tone_count(), 4);
    assert!(rig.coordinator.synth().is_repeating());

    rig.coordinator.play_celebration_music();
    assert!(!rig.coordinator.synth().is_repeating());
    assert!(!rig.output.stopped().is_empty());

    let after_celebration = rig.output.tone_count();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(rig.output.tone_count(), after_celebration);
}

#[tokio::test(start_paused = true)]
async fn test_stop_suspense_leaves_other_tones() {
    let rig = rig(memory_only());

    rig.coordinator.start_suspense_music();
    rig.coordinator.play_ding();
    rig.coordinator.stop_suspense_music();

    assert!(!rig.coordinator.synth().is_repeating());
    assert!(rig.output.stopped().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(rig.output.tone_count(), 4);
}

#[tokio::test]
async fn test_non_exclusive_effects_overlap() {
    let rig = rig(memory_only());

    rig.coordinator.play_wrong_sound();
    rig.coordinator.play_phone_ring();
    rig.coordinator.play_audience_thinking();
    rig.coordinator.play_correct_sound();

    // Only the exclusive wrong buzz stopped anything (and nothing was playing)
    assert!(rig.output.stopped().is_empty());
    assert!(rig.coordinator.synth().live_voices() > 0);
}

#[tokio::test]
async fn test_miss_speaks_exactly_once() {
    let rig = rig(memory_only());

    rig.coordinator
        .speak("seven plus five equals ?", "ar-SA", None)
        .await;

    let utterances = rig.speech.utterances();
    assert_eq!(utterances.len(), 1);
    assert_eq!(utterances[0].text, "seven plus five equals ?");
    assert_eq!(utterances[0].lang, "ar-SA");
    assert_eq!(utterances[0].voice.as_deref(), Some("Maged"));
    assert!((utterances[0].rate - 0.9).abs() < f32::EPSILON);
    assert!((utterances[0].pitch - 1.1).abs() < f32::EPSILON);
    assert!(rig.output.clips().is_empty());
}

#[tokio::test]
async fn test_voice_list_loaded_once() {
    let rig = rig(memory_only());

    rig.coordinator.speak("one", "en-US", None).await;
    rig.coordinator.speak("two", "en-US", None).await;

    assert_eq!(rig.speech.voice_listings.load(Ordering::SeqCst), 1);
    let utterances = rig.speech.utterances();
    assert_eq!(utterances.len(), 2);
    assert_eq!(utterances[1].voice.as_deref(), Some("Samantha"));
}

#[tokio::test]
async fn test_unknown_language_uses_engine_default() {
    let rig = rig(memory_only());
    rig.coordinator.speak("bonjour", "fr-FR", None).await;
    assert_eq!(rig.speech.utterances()[0].voice, None);
}

#[tokio::test]
async fn test_math_mul_3_4_scenario() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("math_mul_3_4.mp3"), wav_bytes(24000, 12000)).unwrap();
    let cache = TieredAudioCache::new(
        Some(Arc::new(DirectorySource::new(dir.path().to_path_buf()))),
        None,
    );
    let rig = rig(cache);

    // Something audible before the question
    rig.coordinator.play_ding();
    let ding_voices = rig.output.tone_count();

    rig.coordinator
        .preload("three times four equals ?", "ar-SA", Some("math_mul_3_4.mp3"));
    rig.coordinator
        .speak("three times four equals ?", "ar-SA", Some("math_mul_3_4.mp3"))
        .await;

    // Every ding voice was stopped before narration started
    assert_eq!(rig.output.stopped().len(), ding_voices);
    assert_eq!(
        rig.output.events().last(),
        Some(&OutputEvent::Clip {
            id: rig.output.clips()[0],
            frames: 12000
        })
    );
    assert!(rig.speech.utterances().is_empty());

    let stats = rig.coordinator.cache().stats();
    assert_eq!(stats.static_hits, 1);
    assert!(rig.coordinator.cache().contains("ar-SA:three times four equals ?"));
}

#[tokio::test]
async fn test_new_narration_stops_previous_clip() {
    let store = Arc::new(CountingStore::default());
    let payload = pcm::encode_base64(&AudioAsset::new(vec![0.2; 2400], 24000)).unwrap();
    store.insert("math_mul_2_5.mp3", &payload);
    store.insert("math_mul_5_2.mp3", &payload);
    let rig = rig(TieredAudioCache::new(None, Some(store)));

    rig.coordinator
        .speak("two times five equals ?", "ar-SA", Some("math_mul_2_5.mp3"))
        .await;
    rig.coordinator
        .speak("five times two equals ?", "ar-SA", Some("math_mul_5_2.mp3"))
        .await;

    let clips = rig.output.clips();
    assert_eq!(clips.len(), 2);
    assert_eq!(rig.output.stopped(), vec![clips[0]]);
}

#[tokio::test(start_paused = true)]
async fn test_stale_narration_is_discarded() {
    let store = Arc::new(CountingStore::with_latency(Duration::from_millis(50)));
    let payload = pcm::encode_base64(&AudioAsset::new(vec![0.2; 2400], 24000)).unwrap();
    store.insert("math_div_20_4.mp3", &payload);
    let rig = rig(TieredAudioCache::new(None, Some(store)));

    tokio::join!(
        rig.coordinator
            .speak("twenty divided by four equals ?", "ar-SA", Some("math_div_20_4.mp3")),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            rig.coordinator.stop_all_sounds();
        }
    );

    assert!(rig.output.clips().is_empty());
    assert!(rig.speech.utterances().is_empty());

    // The lookup still completed and is cached for next time
    assert!(rig.coordinator.cache().contains("math_div_20_4.mp3"));
}

#[tokio::test(start_paused = true)]
async fn test_later_speak_wins() {
    let store = Arc::new(CountingStore::with_latency(Duration::from_millis(50)));
    let slow = pcm::encode_base64(&AudioAsset::new(vec![0.2; 2400], 24000)).unwrap();
    store.insert("math_mul_9_9.mp3", &slow);
    let cache = TieredAudioCache::new(None, Some(store));
    cache
        .persist("math_mul_2_2.mp3", Arc::new(AudioAsset::new(vec![0.1; 480], 24000)))
        .await
        .unwrap();
    let rig = rig(cache);

    tokio::join!(
        rig.coordinator
            .speak("nine times nine equals ?", "ar-SA", Some("math_mul_9_9.mp3")),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            rig.coordinator
                .speak("two times two equals ?", "ar-SA", Some("math_mul_2_2.mp3"))
                .await;
        }
    );

    let clip_frames: Vec<usize> = rig
        .output
        .events()
        .into_iter()
        .filter_map(|e| match e {
            OutputEvent::Clip { frames, .. } => Some(frames),
            _ => None,
        })
        .collect();
    assert_eq!(clip_frames, vec![480]);
}

#[tokio::test]
async fn test_stop_all_sounds_is_idempotent() {
    let rig = rig(memory_only());

    rig.coordinator.stop_all_sounds();
    rig.coordinator.play_intro_music();
    rig.coordinator.stop_all_sounds();
    let stopped = rig.output.stopped().len();
    assert!(stopped > 0);

    rig.coordinator.stop_all_sounds();
    assert_eq!(rig.output.stopped().len(), stopped);
    assert_eq!(rig.speech.cancels.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_encourage_wrong_answer_speaks_arabic() {
    let rig = rig(memory_only());
    rig.coordinator.encourage(false).await;

    let utterances = rig.speech.utterances();
    assert_eq!(utterances.len(), 1);
    assert_eq!(utterances[0].lang, "ar-SA");
    assert!(phrases::arabic_wrong()
        .iter()
        .any(|p| p.text == utterances[0].text));
}

#[tokio::test]
async fn test_warm_up_preloads_fixed_phrases() {
    let intro = phrases::generic_intro();
    let statics = Arc::new(CountingStatics::default().with_file(&intro.static_id, wav_bytes(22050, 2205)));
    let rig = rig(TieredAudioCache::new(Some(statics.clone()), None));

    rig.coordinator.warm_up();
    rig.coordinator
        .speak(intro.text, intro.lang, Some(&intro.static_id))
        .await;

    assert_eq!(statics.fetches(), phrases::all().len());
    assert_eq!(rig.output.clips().len(), 1);
    assert!(rig.speech.utterances().is_empty());
}

#[tokio::test]
async fn test_no_output_device() {
    let speech = Arc::new(RecordingSpeech::default());
    let store = Arc::new(CountingStore::default());
    let payload = pcm::encode_base64(&AudioAsset::new(vec![0.2; 240], 24000)).unwrap();
    store.insert("intro_generic.mp3", &payload);
    let coordinator = PlaybackCoordinator::new(
        TieredAudioCache::new(None, Some(store)),
        Arc::new(NullOutput),
        speech.clone(),
        SpeechSettings::default(),
    );

    coordinator.play_intro_music();
    coordinator.speak("hello", "en-US", Some("intro_generic.mp3")).await;
    coordinator.stop_all_sounds();

    assert_eq!(coordinator.synth().live_voices(), 0);
    assert!(speech.utterances().is_empty());
}
