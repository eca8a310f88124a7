use gateway::{
    EndRequest, FileSessionGateway, SessionEndError, SessionGateway, SessionStartError, StartRequest,
};
use sim_core::model::{PASS_METRIC, Position, Response, SimulationId, SlideId, TranscriptEntry};

const SCENARIO: &str = r#"{
    "simulationId": 3,
    "slides": [
        {
            "id": 10,
            "imageRef": "desk.png",
            "items": [
                {"type": "message", "speaker": "customer", "text": "My card was declined."},
                {"type": "message", "speaker": "trainee", "text": "I can help with that."},
                {"type": "hotspot", "kind": "button", "rect": {"x": 5, "y": 5, "w": 20, "h": 10},
                 "label": "Open account", "settings": {"timeoutSeconds": 4}}
            ]
        }
    ]
}"#;

fn write_scenario(dir: &tempfile::TempDir, with_image: bool) -> std::path::PathBuf {
    let path = dir.path().join("scenario.json");
    std::fs::write(&path, SCENARIO).unwrap();
    if with_image {
        std::fs::write(dir.path().join("desk.png"), [137_u8, 80, 78, 71]).unwrap();
    }
    path
}

#[tokio::test]
async fn file_gateway_loads_scenario_and_scores_it() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FileSessionGateway::new(write_scenario(&dir, true));

    let started = gateway
        .start(&StartRequest::new(SimulationId::new(3)))
        .await
        .unwrap();
    assert_eq!(started.model.item_count(), 3);
    assert_eq!(started.assets.get(SlideId::new(10)).unwrap().len(), 4);

    let result = gateway
        .end(&EndRequest {
            session_id: started.session_id,
            simulation_id: SimulationId::new(3),
            duration_seconds: 17,
            reached_items: 3,
            transcript: vec![TranscriptEntry::new(
                Position::new(0, 1),
                2,
                Response::Submitted("i can help with THAT.".into()),
            )],
        })
        .await
        .unwrap();

    assert_eq!(result.score(PASS_METRIC), Some(100.0));
    assert!(result.passed());
    assert_eq!(result.duration_seconds(), 17);
}

#[tokio::test]
async fn missing_slide_image_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FileSessionGateway::new(write_scenario(&dir, false));

    let err = gateway
        .start(&StartRequest::new(SimulationId::new(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionStartError::MissingAsset { slide, .. } if slide == SlideId::new(10)));
}

#[tokio::test]
async fn mismatched_simulation_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FileSessionGateway::new(write_scenario(&dir, true));

    let err = gateway
        .start(&StartRequest::new(SimulationId::new(4)))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionStartError::NotFound(_)));
}

#[tokio::test]
async fn bundled_demo_scenario_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos/refund-call/scenario.json");
    let gateway = FileSessionGateway::new(path);

    let started = gateway
        .start(&StartRequest::new(SimulationId::new(1)))
        .await
        .unwrap();
    assert_eq!(started.model.slides().len(), 2);
    assert_eq!(started.model.item_count(), 9);
    assert_eq!(started.assets.len(), 2);
}

#[tokio::test]
async fn scored_session_is_forgotten() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FileSessionGateway::new(write_scenario(&dir, true));
    let started = gateway
        .start(&StartRequest::new(SimulationId::new(3)))
        .await
        .unwrap();
    let request = EndRequest {
        session_id: started.session_id,
        simulation_id: SimulationId::new(3),
        duration_seconds: 5,
        reached_items: 1,
        transcript: Vec::new(),
    };

    let first = gateway.end(&request).await.unwrap();
    assert_eq!(first.score(PASS_METRIC), Some(0.0));

    let err = gateway.end(&request).await.unwrap_err();
    assert!(matches!(err, SessionEndError::UnknownSession(id) if id == started.session_id));
}
