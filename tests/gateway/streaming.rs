use gistline::config::Config;
use gistline::providers::{
    Provider, ProviderGateway, ProviderId, SummaryEvent, SummaryRequest, collect_text,
    spawn_summary,
};
use gistline::ProviderError;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(id: ProviderId, server: &MockServer) -> Config {
    let mut config = Config::default();
    config.provider = id.to_string();
    match id {
        ProviderId::OnDevice => config.on_device.base_url = Some(server.uri()),
        _ => {
            if let Some(provider) = config.provider_config_mut(id) {
                provider.base_url = Some(server.uri());
                provider.api_key = Some("sk-ant-integration".to_string());
            }
        }
    }
    config
}

fn request(config: &Config, id: ProviderId, model: &str) -> SummaryRequest {
    SummaryRequest::new("The meeting covered budget and hiring.", model)
        .with_language("en")
        .with_credential(config.credential(id).map(String::from))
}

async fn drain(gateway: ProviderGateway, request: SummaryRequest) -> Vec<SummaryEvent> {
    let mut rx = spawn_summary(Arc::new(gateway), request, 4);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn text_of(events: &[SummaryEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            SummaryEvent::Fragment(fragment) => Some(fragment.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn openai_stream_through_channel() {
    let server = MockServer::start().await;
    let sse = concat!(
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Budget \"}}]}\r\n\r\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"approved.\"}}]}\n\n",
        "data: [DONE]\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let config = config_for(ProviderId::OpenAi, &server);
    let gateway = ProviderGateway::from_config(ProviderId::OpenAi, &config);
    let events = drain(gateway, request(&config, ProviderId::OpenAi, "gpt-4o-mini")).await;

    assert_eq!(text_of(&events), "Budget approved.");
    assert!(matches!(events.last(), Some(SummaryEvent::Completed)));
}

#[tokio::test]
async fn anthropic_auth_failure_yields_single_failed_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-integration"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            "{\"type\":\"error\",\"error\":{\"type\":\"authentication_error\"}}",
        ))
        .mount(&server)
        .await;

    let config = config_for(ProviderId::Anthropic, &server);
    let gateway = ProviderGateway::from_config(ProviderId::Anthropic, &config);
    let events = drain(
        gateway,
        request(&config, ProviderId::Anthropic, "claude-3-5-haiku-latest"),
    )
    .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        SummaryEvent::Failed(ProviderError::Auth { .. })
    ));
}

#[tokio::test]
async fn gemini_server_error_before_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend overloaded"))
        .mount(&server)
        .await;

    let config = config_for(ProviderId::Gemini, &server);
    let gateway = ProviderGateway::from_config(ProviderId::Gemini, &config);
    let events = drain(gateway, request(&config, ProviderId::Gemini, "gemini-2.0-flash")).await;

    assert!(text_of(&events).is_empty());
    assert_eq!(events.len(), 1);
    match &events[0] {
        SummaryEvent::Failed(err) => {
            assert_eq!(err.status(), Some(503));
            assert!(err.to_string().contains("backend overloaded"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn gemini_array_with_braces_in_text() {
    let server = MockServer::start().await;
    let body = r#"[{"candidates":[{"content":{"parts":[{"text":"a { b } c"}]}}]}
,
{"candidates":[{"content":{"parts":[{"text":" and \"}\" too"}]}}]}
]"#;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let config = config_for(ProviderId::Gemini, &server);
    let gateway = ProviderGateway::from_config(ProviderId::Gemini, &config);
    let stream = gateway
        .summarize(&request(&config, ProviderId::Gemini, "gemini-1.5-flash"))
        .await
        .unwrap();
    assert_eq!(collect_text(stream).await.unwrap(), "a { b } c and \"}\" too");
}

#[tokio::test]
async fn on_device_reports_missing_model_before_generating() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"models": [{"name": "phi3:latest"}]})),
        )
        .mount(&server)
        .await;

    let config = config_for(ProviderId::OnDevice, &server);
    let gateway = ProviderGateway::from_config(ProviderId::OnDevice, &config);
    let events = drain(gateway, SummaryRequest::new("text", "on-device")).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        SummaryEvent::Failed(ProviderError::Availability(state)) if !state.is_available()
    ));
    let generate_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/generate")
        .count();
    assert_eq!(generate_calls, 0);
}
