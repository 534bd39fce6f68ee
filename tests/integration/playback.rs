use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

use tunes::commands::music::utils::music_manager::{ErrorKind, MusicError};
use tunes::{PlaybackManager, PlaybackPhase, PlaybackSink, QueueRegistry, ReplyTarget};

use crate::common::fixtures::*;
use crate::common::mocks::{FakeResolver, FakeSink, PanickingResolver, RecordingReply};
use crate::common::{wait_for_phase, wait_until};
use crate::test_utils;

const SHORT_TRACK: Duration = Duration::from_millis(30);

fn manager_with(resolver: FakeResolver) -> (PlaybackManager, Arc<FakeResolver>) {
    let resolver = Arc::new(resolver);
    (PlaybackManager::new(resolver.clone()), resolver)
}

#[tokio::test]
async fn test_three_urls_play_in_order_one_at_a_time() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::auto_finish(SHORT_TRACK));
    let reply = RecordingReply::new();

    for url in [VIDEO_X, VIDEO_Y, VIDEO_Z] {
        manager
            .enqueue(guild_a(), entry(url, reply.clone()), sink.clone())
            .await
            .unwrap();
    }

    wait_until(|| reply.count() == 3).await;
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;

    assert_eq!(
        reply.messages(),
        vec![
            now_playing_for(VIDEO_X),
            now_playing_for(VIDEO_Y),
            now_playing_for(VIDEO_Z),
        ]
    );
    assert_eq!(sink.play_count(), 3);
    assert_eq!(sink.max_concurrent(), 1);
}

#[tokio::test]
async fn test_failed_download_is_skipped_silently() {
    test_utils::init();
    let (manager, resolver) = manager_with(FakeResolver::new().failing(VIDEO_Y));
    let sink = Arc::new(FakeSink::auto_finish(SHORT_TRACK));
    let reply = RecordingReply::new();

    for url in [VIDEO_X, VIDEO_Y, VIDEO_Z] {
        manager
            .enqueue(guild_a(), entry(url, reply.clone()), sink.clone())
            .await
            .unwrap();
    }

    wait_until(|| reply.count() == 2).await;
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;

    assert_eq!(
        reply.messages(),
        vec![now_playing_for(VIDEO_X), now_playing_for(VIDEO_Z)]
    );
    assert_eq!(resolver.downloads(), vec![VIDEO_X, VIDEO_Y, VIDEO_Z]);
    assert_eq!(sink.play_count(), 2);
}

#[tokio::test]
async fn test_skip_while_idle_is_state_error() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());

    // Unknown guild
    let err = manager.skip(guild_a()).await.unwrap_err();
    assert_matches!(err, MusicError::NothingPlaying);
    assert_eq!(err.kind(), ErrorKind::State);

    // Known guild that went back to idle
    let sink = Arc::new(FakeSink::auto_finish(SHORT_TRACK));
    let reply = RecordingReply::new();
    manager
        .enqueue(guild_a(), entry(VIDEO_X, reply.clone()), sink.clone())
        .await
        .unwrap();
    wait_until(|| reply.count() == 1).await;
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;

    let err = manager.skip(guild_a()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(manager.phase(guild_a()).await, PlaybackPhase::Idle);
    assert_eq!(manager.registry().len(guild_a()).await, 0);
    assert_eq!(sink.stops(), 0);
}

#[tokio::test]
async fn test_disconnect_mid_playback_stops_everything() {
    test_utils::init();
    let (manager, resolver) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::manual());
    let reply = RecordingReply::new();

    for url in [VIDEO_X, VIDEO_Y, VIDEO_Z] {
        manager
            .enqueue(guild_a(), entry(url, reply.clone()), sink.clone())
            .await
            .unwrap();
    }
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;

    assert_eq!(manager.disconnect(guild_a()).await, 2);
    assert_eq!(manager.phase(guild_a()).await, PlaybackPhase::Idle);
    assert_eq!(manager.registry().len(guild_a()).await, 0);
    assert_eq!(sink.stops(), 1);

    // Give a stale loop the chance to misbehave
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(reply.messages(), vec![now_playing_for(VIDEO_X)]);
    assert_eq!(resolver.downloads(), vec![VIDEO_X]);
    assert_eq!(sink.play_count(), 1);
    assert_eq!(manager.phase(guild_a()).await, PlaybackPhase::Idle);
}

#[tokio::test]
async fn test_disconnect_during_download_discards_asset() {
    test_utils::init();
    let (manager, resolver) = manager_with(FakeResolver::new());
    let release = resolver.hold(VIDEO_X);
    let sink = Arc::new(FakeSink::manual());
    let reply = RecordingReply::new();

    manager
        .enqueue(guild_a(), entry(VIDEO_X, reply.clone()), sink.clone())
        .await
        .unwrap();
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Resolving).await;

    assert_eq!(manager.disconnect(guild_a()).await, 0);
    release.notify_one();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.play_count(), 0);
    assert_eq!(reply.count(), 0);
    assert_eq!(manager.phase(guild_a()).await, PlaybackPhase::Idle);
}

#[tokio::test]
async fn test_new_request_after_disconnect_starts_fresh_loop() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::manual());
    let reply = RecordingReply::new();

    manager
        .enqueue(guild_a(), entry(VIDEO_X, reply.clone()), sink.clone())
        .await
        .unwrap();
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;
    manager.disconnect(guild_a()).await;

    manager
        .enqueue(guild_a(), entry(VIDEO_Y, reply.clone()), sink.clone())
        .await
        .unwrap();
    wait_until(|| reply.count() == 2).await;

    assert_eq!(
        reply.messages(),
        vec![now_playing_for(VIDEO_X), now_playing_for(VIDEO_Y)]
    );
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;
    assert!(sink.finish());
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
}

#[tokio::test]
async fn test_skip_advances_to_next_entry() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::manual());
    let reply = RecordingReply::new();

    for url in [VIDEO_X, VIDEO_Y] {
        manager
            .enqueue(guild_a(), entry(url, reply.clone()), sink.clone())
            .await
            .unwrap();
    }
    wait_until(|| reply.count() == 1).await;
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;

    manager.skip(guild_a()).await.unwrap();
    wait_until(|| reply.count() == 2).await;
    assert_eq!(reply.messages()[1], now_playing_for(VIDEO_Y));

    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;
    manager.skip(guild_a()).await.unwrap();
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
    assert_eq!(sink.stops(), 2);
}

#[tokio::test]
async fn test_downloaded_files_are_removed_after_playback() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::manual());
    let reply = RecordingReply::new();

    for url in [VIDEO_X, VIDEO_Y] {
        manager
            .enqueue(guild_a(), entry(url, reply.clone()), sink.clone())
            .await
            .unwrap();
    }

    // Natural end
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;
    let first = sink.plays()[0].path.clone();
    assert!(first.exists());
    assert!(sink.finish());

    // Skip
    wait_until(|| sink.play_count() == 2).await;
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;
    let second = sink.plays()[1].path.clone();
    manager.skip(guild_a()).await.unwrap();
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;

    assert!(sink.plays().iter().all(|play| play.existed));
    wait_until(|| !first.exists() && !second.exists()).await;
}

#[tokio::test]
async fn test_confirmation_arrives_before_now_playing() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::auto_finish(SHORT_TRACK));
    let reply = RecordingReply::new();

    let confirmations = reply.clone();
    let position = manager
        .enqueue_confirmed(
            guild_a(),
            entry(VIDEO_X, reply.clone()),
            sink.clone(),
            |position| async move {
                // A slow Discord round-trip must not let the loop overtake us
                tokio::time::sleep(Duration::from_millis(50)).await;
                confirmations
                    .send_text(&format!("Added to queue at #{}", position))
                    .await
                    .unwrap();
            },
        )
        .await
        .unwrap();

    assert_eq!(position, 1);
    wait_until(|| reply.count() == 2).await;
    assert_eq!(
        reply.messages(),
        vec!["Added to queue at #1".to_string(), now_playing_for(VIDEO_X)]
    );
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
}

#[tokio::test]
async fn test_same_video_in_two_guilds_keeps_separate_files() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink_a = Arc::new(FakeSink::manual());
    let sink_b = Arc::new(FakeSink::manual());
    let reply = RecordingReply::new();

    manager
        .enqueue(guild_a(), entry(VIDEO_X, reply.clone()), sink_a.clone())
        .await
        .unwrap();
    manager
        .enqueue(guild_b(), entry(VIDEO_X, reply.clone()), sink_b.clone())
        .await
        .unwrap();
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;
    wait_for_phase(&manager, guild_b(), PlaybackPhase::Playing).await;

    let file_a = sink_a.plays()[0].path.clone();
    let file_b = sink_b.plays()[0].path.clone();
    assert_ne!(file_a, file_b);

    // Guild A finishes first; guild B is still streaming its copy
    assert!(sink_a.finish());
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
    wait_until(|| !file_a.exists()).await;
    assert!(file_b.exists());
    assert_eq!(manager.phase(guild_b()).await, PlaybackPhase::Playing);

    assert!(sink_b.finish());
    wait_for_phase(&manager, guild_b(), PlaybackPhase::Idle).await;
    wait_until(|| !file_b.exists()).await;
}

#[tokio::test]
async fn test_stale_download_does_not_remove_fresh_copy() {
    test_utils::init();
    let (manager, resolver) = manager_with(FakeResolver::new());
    let release = resolver.hold(VIDEO_X);
    let sink = Arc::new(FakeSink::manual());
    let reply = RecordingReply::new();

    manager
        .enqueue(guild_a(), entry(VIDEO_X, reply.clone()), sink.clone())
        .await
        .unwrap();
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Resolving).await;
    manager.disconnect(guild_a()).await;

    // Same video requested again while the old download is still running
    resolver.unhold(VIDEO_X);
    manager
        .enqueue(guild_a(), entry(VIDEO_X, reply.clone()), sink.clone())
        .await
        .unwrap();
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;
    let fresh = sink.plays()[0].path.clone();

    // The old loop now gets its file, notices it is stale and drops it
    release.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(resolver.downloads(), vec![VIDEO_X, VIDEO_X]);
    assert_eq!(sink.play_count(), 1);
    assert!(fresh.exists());
    assert_eq!(manager.phase(guild_a()).await, PlaybackPhase::Playing);

    assert!(sink.finish());
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_start_exactly_one_loop() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::auto_finish(Duration::from_millis(2)));
    let reply = RecordingReply::new();
    const REQUESTS: usize = 40;

    let tasks: Vec<_> = (0..REQUESTS)
        .map(|i| {
            let manager = manager.clone();
            let sink: Arc<dyn PlaybackSink> = sink.clone();
            let reply = reply.clone();
            tokio::spawn(async move {
                let url = format!("https://youtu.be/video{:06}", i);
                manager
                    .enqueue(guild_a(), entry(&url, reply), sink)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let positions = futures::future::join_all(tasks).await;
    assert!(positions.into_iter().all(|position| position.unwrap() >= 1));

    // Every request is announced once, none is stranded
    wait_until(|| reply.count() == REQUESTS).await;
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
    assert_eq!(sink.max_concurrent(), 1);
    assert_eq!(manager.registry().len(guild_a()).await, 0);
}

#[tokio::test]
async fn test_request_during_draining_is_not_stranded() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::auto_finish(Duration::from_millis(1)));
    let reply = RecordingReply::new();

    // Keep enqueueing right as the previous track ends
    for i in 0..10 {
        let url = format!("https://youtu.be/late{:07}", i);
        manager
            .enqueue(guild_a(), entry(&url, reply.clone()), sink.clone())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    wait_until(|| reply.count() == 10).await;
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
    assert_eq!(manager.registry().len(guild_a()).await, 0);
}

#[tokio::test]
async fn test_slow_guild_does_not_block_other_guilds() {
    test_utils::init();
    let (manager, resolver) = manager_with(FakeResolver::new());
    let _never_released = resolver.hold(VIDEO_X);
    let sink_a = Arc::new(FakeSink::manual());
    let sink_b = Arc::new(FakeSink::manual());
    let reply_a = RecordingReply::new();
    let reply_b = RecordingReply::new();

    manager
        .enqueue(guild_a(), entry(VIDEO_X, reply_a.clone()), sink_a.clone())
        .await
        .unwrap();
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Resolving).await;

    manager
        .enqueue(guild_b(), entry(VIDEO_Y, reply_b.clone()), sink_b.clone())
        .await
        .unwrap();
    wait_until(|| reply_b.count() == 1).await;
    wait_for_phase(&manager, guild_b(), PlaybackPhase::Playing).await;

    assert_eq!(manager.phase(guild_a()).await, PlaybackPhase::Resolving);
    assert_eq!(reply_a.count(), 0);

    // Skip in one guild leaves the other alone
    manager.skip(guild_b()).await.unwrap();
    wait_for_phase(&manager, guild_b(), PlaybackPhase::Idle).await;
    assert_eq!(manager.phase(guild_a()).await, PlaybackPhase::Resolving);
}

#[tokio::test]
async fn test_inactive_sink_abandons_queue() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::manual());
    sink.set_active(false);
    let reply = RecordingReply::new();

    for url in [VIDEO_X, VIDEO_Y] {
        manager
            .enqueue(guild_a(), entry(url, reply.clone()), sink.clone())
            .await
            .unwrap();
    }

    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
    assert_eq!(manager.registry().len(guild_a()).await, 0);
    assert_eq!(sink.play_count(), 0);
    assert_eq!(reply.count(), 0);
}

#[tokio::test]
async fn test_sink_play_failure_releases_slot() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let broken = Arc::new(FakeSink::manual());
    broken.fail_play();
    let reply = RecordingReply::new();

    manager
        .enqueue(guild_a(), entry(VIDEO_X, reply.clone()), broken.clone())
        .await
        .unwrap();
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
    // A track that never started is not announced
    assert_eq!(reply.count(), 0);

    // A later request with a working sink plays normally
    let working = Arc::new(FakeSink::auto_finish(SHORT_TRACK));
    manager
        .enqueue(guild_a(), entry(VIDEO_Y, reply.clone()), working.clone())
        .await
        .unwrap();
    wait_until(|| working.play_count() == 1).await;
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Idle).await;
    assert_eq!(reply.messages(), vec![now_playing_for(VIDEO_Y)]);
}

#[tokio::test]
async fn test_crashed_loop_frees_the_slot() {
    test_utils::init();
    let registry = Arc::new(QueueRegistry::new());
    let crashing = PlaybackManager::with_registry(registry.clone(), Arc::new(PanickingResolver));
    let sink = Arc::new(FakeSink::manual());
    let reply = RecordingReply::new();

    crashing
        .enqueue(guild_a(), entry(VIDEO_X, reply.clone()), sink.clone())
        .await
        .unwrap();
    crashing
        .enqueue(guild_a(), entry(VIDEO_Y, reply.clone()), sink.clone())
        .await
        .unwrap();
    wait_for_phase(&crashing, guild_a(), PlaybackPhase::Idle).await;
    assert_eq!(registry.len(guild_a()).await, 0);

    // Same registry, healthy resolver: the guild is usable again
    let healthy = PlaybackManager::with_registry(registry, Arc::new(FakeResolver::new()));
    healthy
        .enqueue(guild_a(), entry(VIDEO_Z, reply.clone()), sink.clone())
        .await
        .unwrap();
    wait_until(|| reply.count() == 1).await;
    assert_eq!(reply.messages(), vec![now_playing_for(VIDEO_Z)]);
    wait_for_phase(&healthy, guild_a(), PlaybackPhase::Playing).await;
    assert!(sink.finish());
}

#[tokio::test]
async fn test_snapshot_reports_now_playing_and_pending() {
    test_utils::init();
    let (manager, _) = manager_with(FakeResolver::new());
    let sink = Arc::new(FakeSink::manual());
    let reply = RecordingReply::new();

    assert!(manager.snapshot(guild_a()).await.is_none());

    for url in [VIDEO_X, VIDEO_Y, VIDEO_Z] {
        manager
            .enqueue(guild_a(), entry(url, reply.clone()), sink.clone())
            .await
            .unwrap();
    }
    wait_for_phase(&manager, guild_a(), PlaybackPhase::Playing).await;

    let snapshot = manager.snapshot(guild_a()).await.unwrap();
    assert_eq!(snapshot.phase, PlaybackPhase::Playing);
    let now = snapshot.now_playing.unwrap();
    assert_eq!(now.title, format!("Title of {}", VIDEO_X));
    assert_eq!(now.requested_by, REQUESTER);
    let pending: Vec<_> = snapshot.pending.iter().map(|e| e.url()).collect();
    assert_eq!(pending, vec![VIDEO_Y, VIDEO_Z]);

    manager.disconnect(guild_a()).await;
}
