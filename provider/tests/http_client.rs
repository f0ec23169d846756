//! HTTP-level tests for the provider client against a mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use plansync_provider::{
    HttpProviderClient, ProviderClient, ProviderErrorKind, ProviderSettings,
};
use plansync_runtime::{CircuitBreakerConfig, RetryPolicy, State};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<planList version="1.0">
  <output>
    <base_plan base_plan_id="291" sell_mode="online" title="Camela en concierto">
      <plan plan_start_date="2021-06-30T21:00:00" plan_end_date="2021-06-30T22:00:00" sell_from="2020-07-01T00:00:00" sell_to="2021-06-30T20:00:00" sold_out="false">
        <zone zone_id="40" capacity="243" price="20.00" name="Platea" numbered="true"/>
      </plan>
    </base_plan>
    <base_plan base_plan_id="1591" sell_mode="offline" organizer_company_id="1" title="Los Morancos">
      <plan plan_start_date="2021-07-31T20:00:00" plan_end_date="2021-07-31T21:00:00" sell_from="2021-06-26T00:00:00" sell_to="2021-07-31T19:50:00" sold_out="false">
        <zone zone_id="186" capacity="2" price="75.00" name="Amfiteatre" numbered="true"/>
      </plan>
    </base_plan>
  </output>
</planList>"#;

fn settings(server: &MockServer) -> ProviderSettings {
    ProviderSettings {
        url: format!("{}/api/events", server.uri()),
        timeout: Duration::from_secs(2),
        retry: RetryPolicy::builder()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(5))
            .build(),
        circuit_breaker: CircuitBreakerConfig::builder()
            .window_size(10)
            .minimum_calls(5)
            .build(),
    }
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

#[tokio::test]
async fn test_fetch_returns_online_plans_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/events"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(settings(&server)).unwrap();
    let plans = client.fetch_plans().await.unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].base_plan_id, "291");
    assert_eq!(plans[0].zones[0].price, "20.00");
    assert_eq!(client.circuit_state(), State::Closed);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such feed"))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(settings(&server)).unwrap();
    let err = client.fetch_plans().await.unwrap_err();

    assert_eq!(
        err.kind(),
        &ProviderErrorKind::HttpError {
            status: 404,
            body_preview: "no such feed".to_string()
        }
    );
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_server_error_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(settings(&server)).unwrap();
    let plans = client.fetch_plans().await.unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(request_count(&server).await, 3);
    let stats = client.circuit_breaker().stats();
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.total_successes, 1);
}

#[tokio::test]
async fn test_server_error_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(settings(&server)).unwrap();
    let err = client.fetch_plans().await.unwrap_err();

    assert!(matches!(
        err.kind(),
        ProviderErrorKind::HttpError { status: 500, .. }
    ));
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_malformed_xml_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<planList><output><base_plan"))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(settings(&server)).unwrap();
    let err = client.fetch_plans().await.unwrap_err();

    assert_eq!(err.kind(), &ProviderErrorKind::ParseError);
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_empty_body_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(settings(&server)).unwrap();
    let err = client.fetch_plans().await.unwrap_err();

    assert_eq!(err.kind(), &ProviderErrorKind::InvalidResponse);
    assert_eq!(err.message(), "Invalid provider response: Empty response from provider");
}

#[tokio::test]
async fn test_slow_provider_hits_the_time_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(FEED)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.timeout = Duration::from_millis(150);
    let client = HttpProviderClient::new(settings).unwrap();

    let err = client.fetch_plans().await.unwrap_err();

    assert_eq!(err.kind(), &ProviderErrorKind::Timeout);
    assert_eq!(client.circuit_breaker().stats().total_failures, 1);
}

#[tokio::test]
async fn test_breaker_opens_and_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(ProviderSettings {
        url: format!("{}/api/events", server.uri()),
        timeout: Duration::from_secs(2),
        retry: RetryPolicy::builder().max_attempts(1).build(),
        circuit_breaker: CircuitBreakerConfig::builder()
            .window_size(2)
            .minimum_calls(2)
            .open_wait(Duration::from_secs(60))
            .build(),
    })
    .unwrap();

    for _ in 0..2 {
        let _ = client.fetch_plans().await;
    }
    assert_eq!(client.circuit_state(), State::Open);

    let err = client.fetch_plans().await.unwrap_err();

    assert_eq!(err.kind(), &ProviderErrorKind::CircuitBreakerOpen);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_unreachable_provider_is_a_network_error() {
    let server = MockServer::start().await;
    let url = format!("{}/api/events", server.uri());
    drop(server);

    let client = HttpProviderClient::new(ProviderSettings {
        url,
        timeout: Duration::from_secs(2),
        retry: RetryPolicy::builder()
            .max_attempts(2)
            .initial_delay(Duration::from_millis(5))
            .build(),
        circuit_breaker: CircuitBreakerConfig::default(),
    })
    .unwrap();

    let err = client.fetch_plans().await.unwrap_err();

    assert_eq!(err.kind(), &ProviderErrorKind::NetworkError);
}
