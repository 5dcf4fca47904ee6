use std::time::Duration;

use fridgeread::domoticz::{DomoticzClient, DomoticzError};
use httpmock::prelude::*;
use serde_json::json;

fn client(server: &MockServer) -> DomoticzClient {
    DomoticzClient::new(server.base_url(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_update_device() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/json.htm")
                .query_param("type", "command")
                .query_param("param", "udevice")
                .query_param("idx", "62")
                .query_param("nvalue", "0")
                .query_param("svalue", "-3");
            then.status(200).json_body(json!({"status": "OK", "title": "Update Device"}));
        })
        .await;

    client(&server).update_device("62", "-3", 0).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_update_device_not_ok() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json.htm");
            then.status(200).json_body(json!({"status": "ERR"}));
        })
        .await;

    let result = client(&server).update_device("62", "4", 0).await;
    assert!(matches!(result, Err(DomoticzError::NotOk(Some(status), idx)) if status == "ERR" && idx == "62"));
}

#[tokio::test]
async fn test_update_device_http_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json.htm");
            then.status(500);
        })
        .await;

    let result = client(&server).update_device("62", "4", 0).await;
    assert!(matches!(result, Err(DomoticzError::Status(status)) if status.as_u16() == 500));
}

#[tokio::test]
async fn test_get_setpoint_from_data() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/json.htm").query_param("type", "devices").query_param("rid", "61");
            then.status(200)
                .json_body(json!({"status": "OK", "result": [{"idx": "61", "Data": "4.5 C", "SetPoint": "9.0"}]}));
        })
        .await;

    let setpoint = client(&server).get_setpoint("61").await.unwrap();
    assert_eq!(setpoint, 4.5);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_setpoint_fallbacks() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json.htm").query_param("rid", "61");
            then.status(200).json_body(json!({"status": "OK", "result": [{"svalue1": "-2"}]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json.htm").query_param("rid", "63");
            then.status(200).json_body(json!({"status": "OK", "result": [{"SetPoint": "7.0"}]}));
        })
        .await;

    let client = client(&server);
    assert_eq!(client.get_setpoint("61").await.unwrap(), -2.0);
    assert_eq!(client.get_setpoint("63").await.unwrap(), 7.0);
}

#[tokio::test]
async fn test_get_setpoint_missing() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json.htm").query_param("rid", "61");
            then.status(200).json_body(json!({"status": "OK", "result": [{"Name": "Fridge"}]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json.htm").query_param("rid", "64");
            then.status(200).json_body(json!({"status": "OK"}));
        })
        .await;

    let client = client(&server);
    assert!(matches!(client.get_setpoint("61").await, Err(DomoticzError::MissingValue(_))));
    assert!(matches!(client.get_setpoint("64").await, Err(DomoticzError::MissingValue(_))));
}

#[tokio::test]
async fn test_get_setpoint_unparsable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json.htm");
            then.status(200).json_body(json!({"status": "OK", "result": [{"Data": "Off"}]}));
        })
        .await;

    let result = client(&server).get_setpoint("61").await;
    assert!(matches!(result, Err(DomoticzError::BadSetpoint { value, .. }) if value == "Off"));
}

#[tokio::test]
async fn test_update_device_requires_200() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json.htm");
            then.status(202).json_body(json!({"status": "OK"}));
        })
        .await;

    let result = client(&server).update_device("62", "4", 0).await;
    assert!(matches!(result, Err(DomoticzError::Status(status)) if status.as_u16() == 202));
}
