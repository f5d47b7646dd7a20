
use harness::{client, GatewayProcess, MIXED_WILDCARD_CONFIG, WILDCARD_CONFIG};
use serde_json::{json, Value};
use uuid::Uuid;

fn message_activity(conversation_id: &str, user_id: &str, text: &str) -> Value {
    json!({
        "type": "message",
        "id": Uuid::new_v4().to_string(),
        "channelId": "directline",
        "serviceUrl": "https://caller.example/api",
        "conversation": { "id": conversation_id },
        "from": { "id": user_id },
        "recipient": { "id": "bot-skill" },
        "text": text,
    })
}

fn end_of_conversation(conversation_id: &str) -> Value {
    json!({
        "type": "endOfConversation",
        "channelId": "directline",
        "serviceUrl": "https://caller.example/api",
        "conversation": { "id": conversation_id },
        "recipient": { "id": "bot-skill" },
    })
}

#[serial_test::serial]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contract_inbound_echo_and_stable_conversation_handle() {
    let process = GatewayProcess::spawn().await;
    let client = client();

    let first = client
        .post(format!("{}/api/skill/activities", process.base_url))
        .bearer_auth(&process.parent_token)
        .json(&message_activity("conv-parent-1", "user-7", "hello"))
        .send()
        .await
        .expect("inbound response");
    assert!(first.status().is_success());
    let first: Value = first.json().await.expect("json body");
    assert_eq!(first["text"], "Echo: hello");

    let handle = first["conversation"]["id"].as_str().expect("handle").to_string();
    // The opaque handle never embeds the caller's own identifiers.
    assert!(!handle.contains("conv-parent-1"));

    let second = client
        .post(format!("{}/api/skill/activities", process.base_url))
        .bearer_auth(&process.parent_token)
        .json(&message_activity("conv-parent-1", "user-7", "again"))
        .send()
        .await
        .expect("second inbound response");
    let second: Value = second.json().await.expect("json body");
    assert_eq!(
        second["conversation"]["id"].as_str(),
        Some(handle.as_str()),
        "same caller conversation resolves to the same handle"
    );
}

#[serial_test::serial]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contract_unlisted_caller_is_forbidden_and_leaves_no_state() {
    let process = GatewayProcess::spawn().await;
    let client = client();

    let resp = client
        .post(format!("{}/api/skill/activities", process.base_url))
        .bearer_auth(&process.stranger_token)
        .json(&message_activity("conv-stranger-1", "user-x", "let me in"))
        .send()
        .await
        .expect("inbound response");
    assert_eq!(resp.status().as_u16(), 403);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["code"], "AUTH.FORBIDDEN");

    // The rejected call stored nothing: no continuation to resume.
    let notify = client
        .post(format!("{}/api/notify/user-x", process.base_url))
        .send()
        .await
        .expect("notify response");
    assert_eq!(notify.status().as_u16(), 404);
}

#[serial_test::serial]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contract_missing_credential_is_unauthenticated() {
    let process = GatewayProcess::spawn().await;
    let resp = client()
        .post(format!("{}/api/skill/activities", process.base_url))
        .json(&message_activity("conv-parent-1", "user-7", "hello"))
        .send()
        .await
        .expect("inbound response");
    assert_eq!(resp.status().as_u16(), 401);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["code"], "AUTH.UNAUTHENTICATED");
}

#[serial_test::serial]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contract_reply_routes_by_issued_handle() {
    let process = GatewayProcess::spawn().await;
    let client = client();

    let opened: Value = client
        .post(format!("{}/api/skill/activities", process.base_url))
        .bearer_auth(&process.parent_token)
        .json(&message_activity("conv-parent-1", "user-7", "open"))
        .send()
        .await
        .expect("inbound response")
        .json()
        .await
        .expect("json body");
    let handle = opened["conversation"]["id"].as_str().expect("handle");

    let reply: Value = client
        .post(format!(
            "{}/api/skill/conversations/{handle}/activities",
            process.base_url
        ))
        .bearer_auth(&process.parent_token)
        .json(&message_activity("conv-parent-1", "user-7", "follow-up"))
        .send()
        .await
        .expect("reply response")
        .json()
        .await
        .expect("json body");
    assert_eq!(reply["text"], "Echo: follow-up");
    assert_eq!(reply["conversation"]["id"].as_str(), Some(handle));
}

#[serial_test::serial]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contract_unknown_handle_is_not_found() {
    let process = GatewayProcess::spawn().await;
    let resp = client()
        .post(format!(
            "{}/api/skill/conversations/{}/activities",
            process.base_url,
            Uuid::new_v4()
        ))
        .bearer_auth(&process.parent_token)
        .json(&message_activity("conv-parent-1", "user-7", "anyone there?"))
        .send()
        .await
        .expect("reply response");
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["code"], "CONVERSATION.NOT_FOUND");
}

#[serial_test::serial]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contract_end_of_conversation_tears_down_state() {
    let process = GatewayProcess::spawn().await;
    let client = client();

    let opened: Value = client
        .post(format!("{}/api/skill/activities", process.base_url))
        .bearer_auth(&process.parent_token)
        .json(&message_activity("conv-parent-1", "user-7", "open"))
        .send()
        .await
        .expect("inbound response")
        .json()
        .await
        .expect("json body");
    let handle = opened["conversation"]["id"].as_str().expect("handle").to_string();

    let ended = client
        .post(format!("{}/api/skill/activities", process.base_url))
        .bearer_auth(&process.parent_token)
        .json(&end_of_conversation("conv-parent-1"))
        .send()
        .await
        .expect("end response");
    assert!(ended.status().is_success());

    let stale = client
        .post(format!(
            "{}/api/skill/conversations/{handle}/activities",
            process.base_url
        ))
        .bearer_auth(&process.parent_token)
        .json(&message_activity("conv-parent-1", "user-7", "still there?"))
        .send()
        .await
        .expect("stale reply response");
    assert_eq!(stale.status().as_u16(), 404);

    // Continuations anchored to the ended conversation are gone too.
    let notify = client
        .post(format!("{}/api/notify/user-7", process.base_url))
        .send()
        .await
        .expect("notify response");
    assert_eq!(notify.status().as_u16(), 404);
}

#[serial_test::serial]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contract_proactive_notify_resumes_stored_conversation() {
    let process = GatewayProcess::spawn().await;
    let client = client();

    client
        .post(format!("{}/api/skill/activities", process.base_url))
        .bearer_auth(&process.parent_token)
        .json(&message_activity("conv-parent-1", "user-7", "remember me"))
        .send()
        .await
        .expect("inbound response")
        .error_for_status()
        .expect("inbound ok");

    let notify: Value = client
        .post(format!("{}/api/notify/user-7", process.base_url))
        .json(&json!({ "text": "wake up" }))
        .send()
        .await
        .expect("notify response")
        .error_for_status()
        .expect("notify ok")
        .json()
        .await
        .expect("json body");
    assert_eq!(notify["delivered"], true);

    let missing = client
        .post(format!("{}/api/notify/user-unknown", process.base_url))
        .send()
        .await
        .expect("notify response");
    assert_eq!(missing.status().as_u16(), 404);
}

#[serial_test::serial]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contract_wildcard_allow_list_accepts_any_caller() {
    let process = GatewayProcess::spawn_with_config(WILDCARD_CONFIG).await;
    let resp = client()
        .post(format!("{}/api/skill/activities", process.base_url))
        .bearer_auth(&process.stranger_token)
        .json(&message_activity("conv-any-1", "user-x", "hello"))
        .send()
        .await
        .expect("inbound response");
    assert!(resp.status().is_success());
}

#[serial_test::serial]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contract_mixed_wildcard_configuration_is_startup_fatal() {
    GatewayProcess::spawn_expecting_startup_failure(MIXED_WILDCARD_CONFIG).await;
}
