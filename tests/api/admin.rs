use wiremock::matchers::{body_json, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helper::{ADMIN_TOKEN, SEND_PATH, spawn_app};

#[tokio::test]
async fn admin_endpoints_require_the_bearer_token() {
    // Arrange
    let app = spawn_app().await;
    let client = &app.api_client;
    let test_cases = vec![
        (client.get(format!("{}/admin/subscribers", &app.address)), "list"),
        (client.delete(format!("{}/admin/subscribers/1", &app.address)), "delete"),
        (
            client
                .post(format!("{}/admin/notifications/test", &app.address))
                .json(&serde_json::json!({"title": "Hi", "body": "There"})),
            "test notification",
        ),
        (
            client
                .put(format!("{}/admin/posts/1", &app.address))
                .json(&serde_json::json!({"post_type": "post", "status": "draft"})),
            "save post",
        ),
        (client.post(format!("{}/admin/posts/1/publish", &app.address)), "publish"),
    ];

    for (request, endpoint) in test_cases {
        // Act
        let response = request.send().await.expect("Failed to execute request.");

        // Assert
        assert_eq!(
            401,
            response.status().as_u16(),
            "The {} endpoint did not reject an anonymous request.",
            endpoint
        );
        assert_eq!(response.headers()["WWW-Authenticate"], "Bearer");
    }
}

#[tokio::test]
async fn a_wrong_admin_token_is_rejected() {
    // Arrange
    let app = spawn_app().await;
    let near_misses = vec![
        "guess".to_string(),
        ADMIN_TOKEN[..ADMIN_TOKEN.len() - 1].to_string(),
        format!("{}-longer", ADMIN_TOKEN),
        ADMIN_TOKEN.to_uppercase(),
    ];

    for token in near_misses {
        // Act
        let response = app
            .api_client
            .get(format!("{}/admin/subscribers", &app.address))
            .bearer_auth(&token)
            .send()
            .await
            .expect("Failed to execute request.");

        // Assert
        assert_eq!(
            401,
            response.status().as_u16(),
            "The token `{}` was accepted.",
            token
        );
    }
}

#[tokio::test]
async fn subscribers_are_listed_in_registration_order() {
    // Arrange
    let app = spawn_app().await;
    for n in 1..=3 {
        app.post_subscribe(&serde_json::json!({
            "device_token": format!("token-{}", n),
            "device_uuid": format!("uuid-{}", n),
        }))
        .await;
    }

    // Act
    let response = app.get_subscribers(None).await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    let subscribers = response.json::<Vec<serde_json::Value>>().await.unwrap();
    let uuids: Vec<_> = subscribers
        .iter()
        .map(|subscriber| subscriber["device_uuid"].as_str().unwrap())
        .collect();
    assert_eq!(uuids, ["uuid-1", "uuid-2", "uuid-3"]);
    assert_eq!(subscribers[0]["subscribed"], true);
}

#[tokio::test]
async fn search_matches_name_and_other_data_case_insensitively() {
    // Arrange
    let app = spawn_app().await;
    app.post_subscribe(&serde_json::json!({
        "device_token": "token-1",
        "device_uuid": "uuid-1",
        "device_name": "Alice's Pixel"
    }))
    .await;
    app.post_subscribe(&serde_json::json!({
        "device_token": "token-2",
        "device_uuid": "uuid-2",
        "device_name": "Tablet",
        "other_data": {"user": "BOB"}
    }))
    .await;

    let test_cases = vec![
        ("ALICE", vec!["uuid-1"]),
        ("bob", vec!["uuid-2"]),
        ("   ", vec!["uuid-1", "uuid-2"]),
        ("carol", vec![]),
        ("%", vec![]),
    ];

    for (search, expected) in test_cases {
        // Act
        let response = app.get_subscribers(Some(search)).await;

        // Assert
        assert_eq!(200, response.status().as_u16());
        let subscribers = response.json::<Vec<serde_json::Value>>().await.unwrap();
        let uuids: Vec<_> = subscribers
            .iter()
            .map(|subscriber| subscriber["device_uuid"].as_str().unwrap())
            .collect();
        assert_eq!(uuids, expected, "Unexpected result for search `{}`.", search);
    }
}

#[tokio::test]
async fn listed_other_data_is_structured_json() {
    // Arrange
    let app = spawn_app().await;
    app.post_subscribe(&serde_json::json!({
        "device_token": "token-1",
        "device_uuid": "uuid-1",
        "other_data": {"locale": "de", "beta": true}
    }))
    .await;

    // Act
    let subscribers = app
        .get_subscribers(None)
        .await
        .json::<Vec<serde_json::Value>>()
        .await
        .unwrap();

    // Assert
    assert_eq!(
        subscribers[0]["other_data"],
        serde_json::json!({"locale": "de", "beta": true})
    );
}

#[tokio::test]
async fn delete_removes_the_subscriber_and_leaves_the_topic() {
    // Arrange
    let app = spawn_app().await;
    app.post_subscribe(&serde_json::json!({"device_token": "token-1", "device_uuid": "uuid-1"}))
        .await;
    let id = app.find_subscriber("uuid-1").await.unwrap().id;

    Mock::given(path("/iid/v1:batchRemove"))
        .and(body_json(serde_json::json!({
            "to": "/topics/all",
            "registration_tokens": ["token-1"]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.fcm_server)
        .await;

    // Act
    let response = app.delete_subscriber(id).await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    assert!(app.find_subscriber("uuid-1").await.is_none());
}

#[tokio::test]
async fn delete_succeeds_when_the_topic_api_fails() {
    // Arrange
    let app = spawn_app().await;
    app.post_subscribe(&serde_json::json!({"device_token": "token-1", "device_uuid": "uuid-1"}))
        .await;
    let id = app.find_subscriber("uuid-1").await.unwrap().id;

    Mock::given(path("/iid/v1:batchRemove"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.fcm_server)
        .await;

    // Act
    let response = app.delete_subscriber(id).await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    assert!(app.find_subscriber("uuid-1").await.is_none());
}

#[tokio::test]
async fn search_folds_case_beyond_ascii() {
    // Arrange
    let app = spawn_app().await;
    app.post_subscribe(&serde_json::json!({
        "device_token": "token-1",
        "device_uuid": "uuid-1",
        "device_name": "Ömer's Tablet"
    }))
    .await;
    app.post_subscribe(&serde_json::json!({
        "device_token": "token-2",
        "device_uuid": "uuid-2",
        "other_data": {"city": "ZÜRICH"}
    }))
    .await;

    let test_cases = vec![("ömer", vec!["uuid-1"]), ("zürich", vec!["uuid-2"])];

    for (search, expected) in test_cases {
        // Act
        let subscribers = app
            .get_subscribers(Some(search))
            .await
            .json::<Vec<serde_json::Value>>()
            .await
            .unwrap();

        // Assert
        let uuids: Vec<_> = subscribers
            .iter()
            .map(|subscriber| subscriber["device_uuid"].as_str().unwrap())
            .collect();
        assert_eq!(uuids, expected, "Unexpected result for search `{}`.", search);
    }
}

#[tokio::test]
async fn deleting_an_unknown_subscriber_returns_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.delete_subscriber(4242).await;

    // Assert
    assert_eq!(404, response.status().as_u16());
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_notification_is_sent_to_the_broadcast_topic() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "projects/demo-project/messages/1"
        })))
        .expect(1)
        .mount(&app.fcm_server)
        .await;

    // Act
    let response = app
        .post_test_notification(&serde_json::json!({"title": "Hello", "body": "World"}))
        .await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    let sent = app.received_bodies(SEND_PATH).await;
    assert_eq!(
        sent[0],
        serde_json::json!({
            "message": {
                "topic": "all",
                "notification": {"title": "Hello", "body": "World"}
            }
        })
    );
}

#[tokio::test]
async fn test_notification_needs_a_title() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.fcm_server)
        .await;

    // Act
    let response = app
        .post_test_notification(&serde_json::json!({"body": "World"}))
        .await;

    // Assert
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn a_failing_send_endpoint_does_not_fail_the_request() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .expect(1)
        .mount(&app.fcm_server)
        .await;

    // Act
    let response = app
        .post_test_notification(&serde_json::json!({"title": "Hello", "body": "World"}))
        .await;

    // Assert
    assert_eq!(200, response.status().as_u16());
}
