use std::{collections::HashMap, env, fs, net::SocketAddr, path::Path, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use axum::{
    extract::{Path as RoutePath, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use config::Config;
use serde::{Deserialize, Serialize};
use serde_json::json;
use skillgate_auth::prelude::{
    AllowList, AllowedCallersValidator, AuthError, CredentialVerifier, StaticTokenVerifier,
};
use skillgate_conversation::prelude::{
    ContinuationParameters, ConversationError, ConversationIdentityStore,
    ProactiveContinuationStore,
};
use skillgate_errors::prelude::*;
use skillgate_storage::{KvStore, MemoryKvStore};
use skillgate_types::prelude::*;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GatewayConfig::load()?;
    let state = AppState::new(&config)?;

    if config.conversations.idle_expiry_secs > 0 {
        spawn_idle_sweep(state.conversations.clone(), &config.conversations);
    }

    let app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/api/skill/activities", post(handle_inbound))
        .route(
            "/api/skill/conversations/:conversation_id/activities",
            post(handle_reply),
        )
        .route("/api/notify/:key", post(handle_notify))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port)
        .parse()
        .context("invalid server address/port")?;

    info!(%addr, "skill gateway listening");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server failure")?;

    Ok(())
}

fn init_tracing() {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .finish(),
    )
    .is_err()
    {
        // Subscriber already set by tests or external runtime.
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to install shutdown handler");
    }
}

fn spawn_idle_sweep(store: ConversationIdentityStore, config: &ConversationBootstrap) {
    let max_age_ms = (config.idle_expiry_secs as i64) * 1_000;
    let interval = Duration::from_secs(config.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match store.purge_idle(max_age_ms).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "expired idle conversations"),
                Err(err) => error!(error = %err.0, "idle sweep failed"),
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
struct GatewayConfig {
    #[serde(default)]
    server: ServerConfig,
    auth: AuthBootstrap,
    #[serde(default)]
    conversations: ConversationBootstrap,
}

impl GatewayConfig {
    fn load() -> anyhow::Result<Self> {
        let config_file = env::var("SKILLGATE_CONFIG_FILE")
            .unwrap_or_else(|_| "config/skillgate.local.toml".to_string());

        let mut builder = Config::builder()
            .set_default("server.address", ServerConfig::default_address())?
            .set_default("server.port", ServerConfig::default_port())?;

        if Path::new(&config_file).exists() {
            builder = builder.add_source(config::File::from(Path::new(&config_file)));
        }

        builder = builder.add_source(config::Environment::with_prefix("SKILLGATE").separator("__"));

        let config: GatewayConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration (is `auth.allowed_callers` set?)")?;

        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ServerConfig {
    #[serde(default = "ServerConfig::default_address")]
    address: String,
    #[serde(default = "ServerConfig::default_port")]
    port: u16,
}

impl ServerConfig {
    fn default_address() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        3980
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct AuthBootstrap {
    /// Parent app ids allowed to invoke this skill, or the sole wildcard
    /// entry "*". Absent configuration fails startup.
    allowed_callers: Vec<String>,
    #[serde(default)]
    tokens: Vec<ApiTokenConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ApiTokenConfig {
    name: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    token_env: Option<String>,
    #[serde(default)]
    token_file: Option<String>,
    app_id: String,
    #[serde(default)]
    tenant: Option<String>,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    audience: Option<String>,
}

impl ApiTokenConfig {
    fn resolve(&self) -> anyhow::Result<(String, CallerIdentity)> {
        let token = resolve_secret_source(
            &self.token,
            &self.token_env,
            &self.token_file,
            &format!("auth.tokens[{}].token", self.name),
        )?;
        Ok((
            token,
            CallerIdentity {
                app_id: Some(self.app_id.clone()),
                tenant: self.tenant.clone(),
                issuer: self.issuer.clone(),
                audience: self.audience.clone(),
            },
        ))
    }
}

fn resolve_secret_source(
    literal: &Option<String>,
    env_key: &Option<String>,
    file_path: &Option<String>,
    field: &str,
) -> anyhow::Result<String> {
    if let Some(env_var) = env_key.as_ref() {
        let value = env::var(env_var)
            .with_context(|| format!("environment variable {env_var} for {field} not set"))?;
        return Ok(value);
    }
    if let Some(path) = file_path.as_ref() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read secret file {path} for {field}"))?;
        return Ok(contents.trim().to_string());
    }
    if let Some(value) = literal.as_ref() {
        if value.is_empty() {
            return Err(anyhow!("{field} literal secret cannot be empty"));
        }
        return Ok(value.clone());
    }
    Err(anyhow!(
        "{field} secret must be provided via literal/env/file"
    ))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ConversationBootstrap {
    /// 0 disables the idle sweep.
    #[serde(default)]
    idle_expiry_secs: u64,
    #[serde(default = "ConversationBootstrap::default_sweep_interval_secs")]
    sweep_interval_secs: u64,
}

impl ConversationBootstrap {
    fn default_sweep_interval_secs() -> u64 {
        300
    }
}

impl Default for ConversationBootstrap {
    fn default() -> Self {
        Self {
            idle_expiry_secs: 0,
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct AppState {
    verifier: Arc<dyn CredentialVerifier>,
    claims: Arc<AllowedCallersValidator>,
    conversations: ConversationIdentityStore,
    continuations: ProactiveContinuationStore,
    boundary: ErrorBoundary,
    version: VersionInfo,
}

impl AppState {
    fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let allow = AllowList::from_entries(config.auth.allowed_callers.clone())
            .map_err(|err| anyhow!("invalid auth.allowed_callers: {err}"))?;
        let claims = Arc::new(AllowedCallersValidator::new(allow));

        let mut tokens = HashMap::new();
        for token_cfg in &config.auth.tokens {
            let (token, identity) = token_cfg.resolve()?;
            tokens.insert(token, identity);
        }
        let verifier: Arc<dyn CredentialVerifier> = Arc::new(StaticTokenVerifier::new(tokens));

        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let conversations = ConversationIdentityStore::new(kv.clone());
        let continuations = ProactiveContinuationStore::new(kv);

        Ok(Self {
            verifier,
            claims,
            conversations,
            continuations,
            boundary: ErrorBoundary::new(Arc::new(EchoTurnProcessor)),
            version: VersionInfo::from_env(),
        })
    }

    fn dispatcher(&self) -> ProactiveDispatcher {
        ProactiveDispatcher {
            continuations: self.continuations.clone(),
            conversations: self.conversations.clone(),
            claims: self.claims.clone(),
            boundary: self.boundary.clone(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct VersionInfo {
    version: String,
    commit: Option<String>,
}

impl VersionInfo {
    fn from_env() -> Self {
        Self {
            version: env::var("SKILLGATE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            commit: env::var("GIT_COMMIT_HASH").ok(),
        }
    }
}

// ---------------------------------------------------------------------------
// Turn processing seam
// ---------------------------------------------------------------------------

/// The only conversation identity the collaborator ever sees.
#[derive(Clone, Debug)]
struct TurnContext {
    skill_conversation_id: SkillConversationId,
}

/// What a turn produces; the gateway translates it onto the caller's
/// transport representation.
#[derive(Clone, Debug)]
struct OutboundActivity {
    kind: ActivityKind,
    text: Option<String>,
    value: Option<serde_json::Value>,
}

type TurnError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
trait TurnProcessor: Send + Sync {
    async fn process_turn(
        &self,
        cx: &TurnContext,
        activity: &Activity,
    ) -> Result<Option<OutboundActivity>, TurnError>;
}

/// Built-in processor for the shipped binary: echoes messages, acknowledges
/// events. Real deployments replace this with their dialog runtime.
struct EchoTurnProcessor;

#[async_trait]
impl TurnProcessor for EchoTurnProcessor {
    async fn process_turn(
        &self,
        _cx: &TurnContext,
        activity: &Activity,
    ) -> Result<Option<OutboundActivity>, TurnError> {
        let text = match activity.kind {
            ActivityKind::Message => {
                format!("Echo: {}", activity.text.as_deref().unwrap_or_default())
            }
            ActivityKind::Event => "Proactive event received.".to_string(),
            ActivityKind::EndOfConversation => return Ok(None),
        };
        Ok(Some(OutboundActivity {
            kind: ActivityKind::Message,
            text: Some(text),
            value: activity.value.clone(),
        }))
    }
}

/// Catches collaborator failures: full detail to the log, a generic error to
/// the caller, and no store teardown so a retry can succeed.
#[derive(Clone)]
struct ErrorBoundary {
    inner: Arc<dyn TurnProcessor>,
}

impl ErrorBoundary {
    fn new(inner: Arc<dyn TurnProcessor>) -> Self {
        Self { inner }
    }

    async fn process(
        &self,
        cx: &TurnContext,
        activity: &Activity,
    ) -> Result<Option<OutboundActivity>, ErrorObj> {
        match self.inner.process_turn(cx, activity).await {
            Ok(outbound) => Ok(outbound),
            Err(err) => {
                error!(
                    conversation = %cx.skill_conversation_id.0,
                    error = %err,
                    "turn processing failed"
                );
                Err(ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                    .dev_msg(err.to_string())
                    .build())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Proactive dispatch
// ---------------------------------------------------------------------------

/// Payload content a proactive trigger supplies; the dispatcher anchors it to
/// the stored conversation.
#[derive(Clone, Debug, Default, Deserialize)]
struct ProactivePayload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error("no continuation recorded for key")]
    NoSuchConversation,
    #[error("stored caller no longer passes the allow-list")]
    Rejected(#[source] AuthError),
    #[error("turn processing failed")]
    Turn(ErrorObj),
    #[error(transparent)]
    Store(#[from] ConversationError),
}

struct ProactiveDispatcher {
    continuations: ProactiveContinuationStore,
    conversations: ConversationIdentityStore,
    claims: Arc<AllowedCallersValidator>,
    boundary: ErrorBoundary,
}

impl ProactiveDispatcher {
    /// Resumes the conversation stored under `key`. The claims snapshot is
    /// re-validated so a caller removed from the allow-list after the record
    /// was stored cannot be resumed. Unknown keys have no side effects.
    async fn dispatch<F>(
        &self,
        key: &ContinuationKey,
        build_payload: F,
    ) -> Result<Option<OutboundActivity>, DispatchError>
    where
        F: FnOnce(&TurnContext) -> ProactivePayload + Send,
    {
        let Some(params) = self.continuations.get(key).await? else {
            return Err(DispatchError::NoSuchConversation);
        };

        self.claims
            .validate(&params.claims)
            .map_err(DispatchError::Rejected)?;

        let Some(id) = self.conversations.find(&params.conversation).await? else {
            // Continuation outlived its conversation mapping.
            return Err(DispatchError::NoSuchConversation);
        };

        let cx = TurnContext {
            skill_conversation_id: id,
        };
        let payload = build_payload(&cx);
        let activity = Activity {
            kind: ActivityKind::Event,
            id: Some(Id::new_random().0),
            channel_id: params.conversation.channel_id.clone(),
            service_url: params.conversation.service_url.clone(),
            conversation: ConversationAccount {
                id: cx.skill_conversation_id.0.clone(),
            },
            from: params.conversation.user.clone(),
            recipient: Some(params.conversation.bot.clone()),
            text: payload.text,
            value: payload.value,
            reply_to_id: None,
        };

        self.boundary
            .process(&cx, &activity)
            .await
            .map_err(DispatchError::Turn)
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct VersionResponse {
    version: String,
    commit: Option<String>,
}

async fn version(State(state): State<AppState>) -> impl IntoResponse {
    Json(VersionResponse {
        version: state.version.version.clone(),
        commit: state.version.commit.clone(),
    })
}

fn error_response(obj: &ErrorObj) -> Response {
    let status = StatusCode::from_u16(obj.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(obj.to_public_json())).into_response()
}

fn schema_error(detail: &str) -> ErrorObj {
    ErrorBuilder::new(codes::SCHEMA_VALIDATION).dev_msg(detail).build()
}

/// Steps 1 and 2 of the inbound pipeline: credential, then allow-list. No
/// store is touched before both pass.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CallerIdentity, ErrorObj> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AuthError::unauthenticated("missing or non-bearer authorization header").into_inner()
        })?;

    let identity = state
        .verifier
        .verify(bearer)
        .await
        .map_err(AuthError::into_inner)?;

    state
        .claims
        .validate(&identity)
        .map_err(AuthError::into_inner)?;

    Ok(identity)
}

fn parse_activity(body: serde_json::Value) -> Result<Activity, ErrorObj> {
    serde_json::from_value(body).map_err(|err| schema_error(&format!("invalid activity: {err}")))
}

/// Initial entry point for a parent-to-skill call. Allocates (or re-reads)
/// the conversation mapping and answers with the translated reply.
async fn handle_inbound(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let identity = match authenticate(&state, &headers).await {
        Ok(identity) => identity,
        Err(obj) => return error_response(&obj),
    };
    let activity = match parse_activity(body) {
        Ok(activity) => activity,
        Err(obj) => return error_response(&obj),
    };
    let Some(reference) = activity.conversation_reference() else {
        return error_response(&schema_error(
            "activity is missing recipient/conversation routing fields",
        ));
    };

    if activity.kind == ActivityKind::EndOfConversation {
        return match teardown_conversation(&state, &reference).await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(obj) => error_response(&obj),
        };
    }

    let id = match state
        .conversations
        .get_or_create(&reference, identity.audience.clone())
        .await
    {
        Ok(id) => id,
        Err(err) => return error_response(&err.0),
    };

    run_turn(&state, id, &identity, &reference, &activity).await
}

/// Subsequent exchange within an issued conversation. The path id is the
/// opaque handle this gateway handed out; unknown ids are expected churn.
async fn handle_reply(
    State(state): State<AppState>,
    RoutePath(conversation_id): RoutePath<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let identity = match authenticate(&state, &headers).await {
        Ok(identity) => identity,
        Err(obj) => return error_response(&obj),
    };
    let activity = match parse_activity(body) {
        Ok(activity) => activity,
        Err(obj) => return error_response(&obj),
    };

    let id = SkillConversationId(conversation_id);
    let record = match state.conversations.get_reference(&id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return error_response(
                &ErrorBuilder::new(codes::CONVERSATION_NOT_FOUND)
                    .dev_msg(format!("unknown skill conversation id {}", id.0))
                    .build(),
            )
        }
        Err(err) => return error_response(&err.0),
    };

    if activity.kind == ActivityKind::EndOfConversation {
        return match teardown_conversation(&state, &record.conversation).await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(obj) => error_response(&obj),
        };
    }

    run_turn(&state, id, &identity, &record.conversation, &activity).await
}

async fn run_turn(
    state: &AppState,
    id: SkillConversationId,
    identity: &CallerIdentity,
    reference: &ConversationReference,
    activity: &Activity,
) -> Response {
    let cx = TurnContext {
        skill_conversation_id: id,
    };

    let outbound = match state.boundary.process(&cx, activity).await {
        Ok(outbound) => outbound,
        Err(obj) => return error_response(&obj),
    };

    // Preserve the reference for future proactive use, keyed by the sending
    // user. Refresh replaces the previous snapshot wholesale.
    if let Some(user) = activity.from.as_ref().or(reference.user.as_ref()) {
        let params = ContinuationParameters {
            conversation: reference.clone(),
            claims: identity.clone(),
            state: None,
        };
        if let Err(err) = state
            .continuations
            .put(&ContinuationKey(user.id.clone()), &params)
            .await
        {
            return error_response(&err.0);
        }
    }

    match outbound {
        Some(out) => Json(translate_reply(&cx, reference, activity, out)).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

/// Step 5 of the inbound pipeline: the reply travels under the caller's
/// channel coordinates but names only the opaque conversation handle.
fn translate_reply(
    cx: &TurnContext,
    reference: &ConversationReference,
    inbound: &Activity,
    outbound: OutboundActivity,
) -> Activity {
    Activity {
        kind: outbound.kind,
        id: Some(Id::new_random().0),
        channel_id: reference.channel_id.clone(),
        service_url: reference.service_url.clone(),
        conversation: ConversationAccount {
            id: cx.skill_conversation_id.0.clone(),
        },
        from: Some(reference.bot.clone()),
        recipient: reference.user.clone(),
        text: outbound.text,
        value: outbound.value,
        reply_to_id: inbound.id.clone(),
    }
}

/// Explicit conversation end: both stores shed their records; records stay
/// deletable twice without error.
async fn teardown_conversation(
    state: &AppState,
    reference: &ConversationReference,
) -> Result<(), ErrorObj> {
    if let Some(id) = state
        .conversations
        .find(reference)
        .await
        .map_err(|err| err.0)?
    {
        state.conversations.delete(&id).await.map_err(|err| err.0)?;
    }
    state
        .continuations
        .remove_for_reference(reference)
        .await
        .map_err(|err| err.0)?;
    Ok(())
}

/// Proactive trigger surface. The body is optional payload content.
async fn handle_notify(
    State(state): State<AppState>,
    RoutePath(key): RoutePath<String>,
    body: Option<Json<ProactivePayload>>,
) -> Response {
    let payload = body.map(|Json(p)| p).unwrap_or_default();
    let result = state
        .dispatcher()
        .dispatch(&ContinuationKey(key), move |_cx| payload)
        .await;

    match result {
        Ok(outbound) => Json(json!({
            "delivered": true,
            "reply": outbound.map(|o| json!({"text": o.text, "value": o.value})),
        }))
        .into_response(),
        Err(DispatchError::NoSuchConversation) => error_response(
            &ErrorBuilder::new(codes::CONVERSATION_NOT_FOUND)
                .dev_msg("no continuation recorded for key")
                .build(),
        ),
        Err(DispatchError::Rejected(err)) => error_response(&err.into_inner()),
        Err(DispatchError::Turn(obj)) => error_response(&obj),
        Err(DispatchError::Store(err)) => error_response(&err.0),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
