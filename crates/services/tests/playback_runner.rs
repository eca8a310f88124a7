use std::sync::Arc;
use std::time::Duration;

use gateway::{InMemorySessionGateway, SessionAssets};
use services::playback::{FailedOperation, PlaybackError, PlaybackEvent, PlaybackStatus};
use services::{Clock, PlaybackConfig, PlaybackHandle, PlaybackRunner};
use sim_core::model::{
    Hotspot, HotspotWidget, ImageRef, Position, Rect, SequenceItem, SequenceModel, SimulationId,
    Slide, SlideId,
};
use sim_core::policy::{Interaction, InteractionKind};
use sim_core::time::fixed_now;
use tokio::task::JoinHandle;

const SIM: SimulationId = SimulationId::new(1);

fn button() -> SequenceItem {
    SequenceItem::Hotspot(Hotspot::new(
        Rect::new(10.0, 10.0, 40.0, 20.0),
        HotspotWidget::Button { label: None },
    ))
}

fn register(gateway: InMemorySessionGateway, items: Vec<SequenceItem>) -> InMemorySessionGateway {
    let model = SequenceModel::new(vec![Slide::new(
        SlideId::new(1),
        ImageRef::new("one.png"),
        items,
    )])
    .unwrap();
    let assets = SessionAssets::new().with_image(SlideId::new(1), vec![0_u8; 16]);
    gateway.with_simulation(SIM, model, assets)
}

fn spawn(gateway: &Arc<InMemorySessionGateway>) -> (PlaybackHandle, JoinHandle<()>) {
    let (runner, handle) = PlaybackRunner::new(
        SIM,
        gateway.clone(),
        &Clock::fixed(fixed_now()),
        PlaybackConfig::default(),
    );
    (handle, runner.spawn())
}

async fn status(handle: &PlaybackHandle, status: PlaybackStatus) {
    handle
        .wait_for(|s| s.state.status == status)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn customer_greeting_then_trainee_reply_completes_session() {
    let gateway = Arc::new(register(
        InMemorySessionGateway::new(),
        vec![SequenceItem::customer("Hi"), SequenceItem::trainee("Hello")],
    ));
    let (handle, task) = spawn(&gateway);
    let mut events = handle.subscribe();

    handle.start().await.unwrap();
    let snapshot = handle
        .wait_for(|s| s.state.position == Position::new(0, 1))
        .await
        .unwrap();
    assert!(snapshot.state.awaiting_input);

    handle
        .interact(Interaction::new(
            Position::new(0, 1),
            InteractionKind::Submit("Hello".into()),
        ))
        .await
        .unwrap();
    handle.wait_for(|s| s.state.end_of_content).await.unwrap();

    handle.end().await.unwrap();
    status(&handle, PlaybackStatus::Completed).await;
    assert_eq!(handle.snapshot().passed, Some(true));
    assert_eq!(gateway.end_calls(), 1);
    assert_eq!(gateway.end_requests()[0].transcript.len(), 1);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(PlaybackEvent::Started { .. })));
    assert!(seen.contains(&PlaybackEvent::EndOfContent));
    assert!(seen.contains(&PlaybackEvent::Completed { passed: true }));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn repeated_end_reaches_gateway_once() {
    let gateway = Arc::new(
        register(InMemorySessionGateway::new(), vec![button()])
            .with_end_latency(Duration::from_secs(2)),
    );
    let (handle, task) = spawn(&gateway);

    handle.start().await.unwrap();
    status(&handle, PlaybackStatus::Playing).await;

    handle.end().await.unwrap();
    handle.end().await.unwrap();
    handle.end().await.unwrap();
    status(&handle, PlaybackStatus::Completed).await;

    assert_eq!(gateway.end_calls(), 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_start_errors_and_can_be_retried() {
    let gateway = Arc::new(register(InMemorySessionGateway::new(), vec![button()]));
    gateway.fail_next_start("offline");
    let (handle, task) = spawn(&gateway);

    handle.start().await.unwrap();
    status(&handle, PlaybackStatus::Errored).await;
    let failure = handle.snapshot().state.failure.unwrap();
    assert_eq!(failure.operation, FailedOperation::StartSession);

    handle.start().await.unwrap();
    status(&handle, PlaybackStatus::Playing).await;
    assert_eq!(gateway.start_calls(), 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_end_keeps_session_playing() {
    let gateway = Arc::new(register(InMemorySessionGateway::new(), vec![button()]));
    let (handle, task) = spawn(&gateway);
    handle.start().await.unwrap();
    status(&handle, PlaybackStatus::Playing).await;

    gateway.fail_next_end("scorer down");
    let mut events = handle.subscribe();
    handle.end().await.unwrap();
    loop {
        if let PlaybackEvent::EndFailed { message } = events.recv().await.unwrap() {
            assert!(message.contains("scorer down"));
            break;
        }
    }
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state.status, PlaybackStatus::Playing);
    assert!(!snapshot.state.ending);

    handle.end().await.unwrap();
    status(&handle, PlaybackStatus::Completed).await;
    assert_eq!(gateway.end_calls(), 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_elapsed_time() {
    let gateway = Arc::new(register(InMemorySessionGateway::new(), vec![button()]));
    let (handle, task) = spawn(&gateway);
    handle.start().await.unwrap();
    status(&handle, PlaybackStatus::Playing).await;

    handle
        .wait_for(|s| s.state.elapsed_seconds == 2)
        .await
        .unwrap();
    handle.toggle_pause().await.unwrap();
    status(&handle, PlaybackStatus::Paused).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(handle.snapshot().state.elapsed_seconds, 2);

    handle.toggle_pause().await.unwrap();
    let snapshot = handle
        .wait_for(|s| s.state.elapsed_seconds == 3)
        .await
        .unwrap();
    assert_eq!(snapshot.state.status, PlaybackStatus::Playing);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_slide_image_errors() {
    let model = SequenceModel::new(vec![Slide::new(
        SlideId::new(1),
        ImageRef::new("one.png"),
        vec![button()],
    )])
    .unwrap();
    let gateway = Arc::new(InMemorySessionGateway::new().with_simulation(
        SIM,
        model,
        SessionAssets::new(),
    ));
    let (handle, task) = spawn(&gateway);

    handle.start().await.unwrap();
    status(&handle, PlaybackStatus::Errored).await;
    let failure = handle.snapshot().state.failure.unwrap();
    assert_eq!(
        failure.operation,
        FailedOperation::LoadSlideAsset {
            slide: SlideId::new(1)
        }
    );

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn commands_after_shutdown_report_closed_runner() {
    let gateway = Arc::new(register(InMemorySessionGateway::new(), vec![button()]));
    let (handle, task) = spawn(&gateway);

    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(handle.start().await, Err(PlaybackError::RunnerClosed));
}
