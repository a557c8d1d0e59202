mod common;

use bulletin::config::{ContentConfig, DispatchConfig};
use bulletin::content::{ContentAggregator, ContentFilter, HttpContentStore};
use bulletin::dispatch::{DeliveryStatus, DispatchRequest, FailureReason};
use bulletin::errors::BulletinError;
use bulletin::session::SessionStatus;
use common::{InstantPairing, RecordingTransport, address_book_with, connected_session, engine};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_format_and_send_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "n1",
                "nameEn": "Harvest festival",
                "nameAr": "مهرجان الحصاد",
                "sourceEn": "Village council",
                "createdAt": "2024-06-01T10:00:00Z"
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/places"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{"id": "pl1", "nameEn": "Old mill", "createdAt": "2023-01-01T00:00:00Z"}]
        })))
        .mount(&server)
        .await;

    let store = HttpContentStore::new(&ContentConfig {
        base_url: server.uri(),
        ..Default::default()
    })
    .unwrap();
    let items = ContentAggregator::new(Arc::new(store))
        .fetch_all(&ContentFilter::default())
        .await;
    assert_eq!(
        items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
        vec!["n1", "pl1"]
    );

    let pairing = Arc::new(InstantPairing::default());
    let session = connected_session(pairing.clone()).await;
    let (book, ids) = address_book_with(&[("Ann", "+15550003"), ("Bob", "0015550004")]);
    let transport = Arc::new(RecordingTransport::unreachable(&["+15550004"]));
    let engine = engine(
        session.clone(),
        book,
        transport.clone(),
        DispatchConfig::default(),
    );

    let report = engine
        .send(DispatchRequest {
            items,
            contact_ids: ids,
            inter_message_delay_secs: 1,
            ..Default::default()
        })
        .await
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.starts_with("📰 *Harvest festival* | *مهرجان الحصاد*"));
    assert!(sent[0].text.contains("Source: Village council | N/A"));
    assert!(sent[1].text.starts_with("📍 *Old mill*"));
    assert_eq!(
        sent[0].recipients,
        vec!["+15550003".to_string(), "+15550004".to_string()]
    );

    assert_eq!(report.succeeded, BTreeSet::from(["+15550003".to_string()]));
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().all(|f| f.recipient == "+15550004"));
    assert_eq!(report.delivered_count(), 2);

    session.disconnect().await.unwrap();
    assert_eq!(session.current_state().status, SessionStatus::Disconnected);
    assert_eq!(pairing.teardowns.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_loss_fails_remaining_items() {
    let pairing = Arc::new(InstantPairing::default());
    let session = connected_session(pairing.clone()).await;
    let (book, ids) = address_book_with(&[("Ann", "+15550003"), ("Bob", "+15550004")]);
    let transport = Arc::new(RecordingTransport {
        drop_after_first: Some(pairing),
        ..Default::default()
    });
    let engine = engine(session.clone(), book, transport.clone(), DispatchConfig::default());

    let report = engine
        .send(DispatchRequest {
            items: vec![news("x"), news("y"), news("z")],
            contact_ids: ids,
            inter_message_delay_secs: 30,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(transport.sent().len(), 1);
    assert_eq!(session.current_state().status, SessionStatus::Disconnected);
    assert_eq!(report.deliveries.len(), 6);
    let lost: Vec<&str> = report
        .deliveries
        .iter()
        .filter(|d| d.status == DeliveryStatus::Failed(FailureReason::SessionLost))
        .map(|d| d.item_id.as_str())
        .collect();
    assert_eq!(lost, vec!["y", "y", "z", "z"]);
    assert!(report.succeeded.is_empty());

    let err = engine
        .send(DispatchRequest {
            items: vec![news("x")],
            contact_ids: vec![],
            inter_message_delay_secs: 2,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BulletinError::CooldownActive { .. }));

    tokio::time::advance(Duration::from_secs(4)).await;
    let err = engine
        .send(DispatchRequest {
            items: vec![news("x")],
            inter_message_delay_secs: 2,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BulletinError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_batches_are_rejected() {
    let session = connected_session(Arc::new(InstantPairing::default())).await;
    let (book, ids) = address_book_with(&[("Ann", "+15550003")]);
    let transport = Arc::new(RecordingTransport::default());
    let engine = engine(session, book, transport.clone(), DispatchConfig::default());

    let first = DispatchRequest {
        items: vec![news("x"), news("y")],
        contact_ids: ids.clone(),
        inter_message_delay_secs: 5,
        ..Default::default()
    };
    let second = DispatchRequest {
        items: vec![news("z")],
        contact_ids: ids,
        inter_message_delay_secs: 5,
        ..Default::default()
    };
    let (a, b) = futures_util::future::join(engine.send(first), engine.send(second)).await;

    assert!(a.unwrap().is_complete_success());
    assert!(matches!(b.unwrap_err(), BulletinError::BatchInProgress));
    assert_eq!(transport.sent().len(), 2);
    assert!(engine.cooldown_remaining().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_disconnect_gets_new_session() {
    let pairing = Arc::new(InstantPairing::default());
    let session = connected_session(pairing.clone()).await;
    let first_id = session.current_state().id;

    let mut state_rx = session.subscribe();
    pairing.drop_connection("logged out").await;
    state_rx
        .wait_for(|s| s.status == SessionStatus::Disconnected)
        .await
        .unwrap();

    session.request_connection().await.unwrap();
    state_rx.wait_for(|s| s.is_connected()).await.unwrap();
    let second = session.current_state();
    assert_ne!(second.id, first_id);
    assert_eq!(second.linked_phone_number.as_deref(), Some("+15550100"));
    assert!(session.history().iter().any(|s| s.id == first_id));
}

fn news(id: &str) -> bulletin::content::ShareableItem {
    use bulletin::content::{Bilingual, ContentCategory, ItemDetails, ShareableItem};
    ShareableItem {
        id: id.to_string(),
        category: ContentCategory::News,
        name_en: format!("Story {}", id),
        name_ar: "خبر".to_string(),
        title_en: None,
        title_ar: None,
        description_en: None,
        description_ar: None,
        icon_url: None,
        media_refs: Vec::new(),
        created_at: None,
        details: ItemDetails::News {
            published_date: None,
            source: Bilingual::default(),
        },
    }
}
