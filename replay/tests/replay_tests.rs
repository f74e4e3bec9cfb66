use beamplot_config::SessionConfig;
use beamplot_replay::replay;
use beamplot_session::PlotSession;
use beamplot_shared::{ClientMessage, RawArrayPayload, StatusType};
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_replay_recorded_session() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("session.yaml");
    fs::write(
        &config_path,
        "client:\n  uuid: recorder\n  shared: false\n  plot_ids: [p0, p1]\nlogging:\n  level: warn\n",
    )
    .unwrap();
    let config = SessionConfig::load(&config_path).unwrap();

    let multiline = serde_json::json!({
        "plot_id": "p0",
        "type": "new_multiline_data",
        "params": {
            "axes_parameters": {"title": "Scan"},
            "ml_data": [{
                "key": "i0",
                "y": RawArrayPayload::from_vec(&[3i32, 1, 2]),
            }],
        },
    });
    let append = serde_json::json!({
        "plot_id": "p0",
        "type": "append_line_data",
        "params": {
            "al_data": [{
                "key": "i0",
                "y": RawArrayPayload::from_vec(&[7i32]),
            }],
        },
    });
    let input = format!("{}\n{}\n", multiline, append);

    let report = replay(PlotSession::from_config(&config), &input).await.unwrap();
    assert_eq!(report.stats.messages_accepted, 2);
    assert_eq!(report.summaries.len(), 2);

    let p0 = &report.summaries[0];
    assert_eq!(p0.plot_id, "p0");
    assert_eq!(p0.title.as_deref(), Some("Scan"));
    assert_eq!(p0.shapes, vec![vec![4]]);
    assert_eq!(p0.y_domain.map(|d| (d.min(), d.max())), Some((1.0, 7.0)));

    assert_eq!(
        report.outbound,
        vec![
            ClientMessage::Status {
                plot_id: "p0".to_string(),
                status: StatusType::Ready,
            };
            2
        ]
    );
}
