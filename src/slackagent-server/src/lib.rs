//! Slackagent Server - the processes of the Slack assistant.
//!
//! This crate provides:
//! - The A2A agent server (one persona per process)
//! - The Slack Events API ingress
//! - The queue poster that delivers replies to Slack
//! - The verification pipeline and reply routing shared by them
//!
//! Clients are built once here and injected into handler state.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod a2a;
pub mod config;
pub mod error;
pub mod ingress;
pub mod middleware;
pub mod pipeline;
pub mod poster;
pub mod reply_router;
pub mod state;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;

use slackagent_aws::{
    AwsCredentials, DynamoTokenStore, SigV4Signer, SqsClient, StaticTokenStore, TokenStore,
};
use slackagent_engine::{
    A2aClient, AGENTCORE_SIGNING_SERVICE, AgentFactory, BedrockClient, BedrockSettings, Persona,
};
use slackagent_slack::{SlackApi, SlackClient, SlackClientOptions};

pub use config::{AppConfig, Role};
pub use error::{AppError, AppResult};
pub use pipeline::{VerificationOutcome, VerificationPipeline};
pub use poster::{PosterWorker, SlackPoster};
pub use state::{AgentState, IngressState};

/// Version reported by `/ping` and the agent card.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const BEDROCK_SIGNING_SERVICE: &str = "bedrock";
const SQS_SIGNING_SERVICE: &str = "sqs";
const DYNAMODB_SIGNING_SERVICE: &str = "dynamodb";

fn signer(region: &str, service: &str) -> anyhow::Result<SigV4Signer> {
    let credentials =
        AwsCredentials::from_env().context("AWS credentials are required for this role")?;
    Ok(SigV4Signer::new(credentials, region, service))
}

fn slack_client(config: &AppConfig) -> anyhow::Result<Arc<dyn SlackApi>> {
    let mut options = SlackClientOptions {
        history_timeout: config.slack.thread_context_timeout_duration(),
        ..Default::default()
    };
    if let Some(base_url) = &config.slack.api_base_url {
        options.base_url = base_url.clone();
    }
    Ok(Arc::new(SlackClient::new(options)?))
}

fn queue_client(config: &AppConfig, http: reqwest::Client) -> anyhow::Result<SqsClient> {
    let queue_url = config
        .aws
        .queue_url
        .as_deref()
        .context("SLACK_POST_QUEUE_URL is not set")?;
    Ok(SqsClient::new(
        http,
        queue_url,
        signer(&config.model.region, SQS_SIGNING_SERVICE)?,
    )?)
}

/// Build the state of an agent server for `persona`.
pub fn build_agent_state(config: &AppConfig, persona: Persona) -> anyhow::Result<AgentState> {
    let http = reqwest::Client::new();
    let region = config.model.region.as_str();

    let mut settings = BedrockSettings::new(&config.model.model_id);
    if let Some(endpoint) = &config.model.endpoint {
        settings = settings.with_endpoint(Url::parse(endpoint).context("invalid BEDROCK_ENDPOINT_URL")?);
    }
    let model = BedrockClient::new(
        http.clone(),
        signer(region, BEDROCK_SIGNING_SERVICE)?,
        settings,
    )?;

    let mut factory = AgentFactory::new(Arc::new(model))
        .with_settings(config.model.agent_settings())
        .with_tool_settings(config.tools.tool_settings());

    if persona == Persona::Verification {
        let specialists = config.agents.specialists()?;
        let mut client = A2aClient::new(http.clone());
        for (specialist, url) in &specialists {
            client = client.with_endpoint(specialist.as_str(), url.clone());
        }
        if config.aws.sign_agent_calls {
            client = client.with_signer(signer(region, AGENTCORE_SIGNING_SERVICE)?);
        }
        info!(specialists = ?client.agents(), "Delegation enabled");
        factory = factory.with_delegation(
            Arc::new(client),
            specialists.into_iter().map(|(persona, _)| persona),
        );
    }

    let agent = factory.build(persona)?;
    let state = AgentState::new(persona, agent.clone(), &config.server.public_url, VERSION);
    if persona != Persona::Verification {
        return Ok(state);
    }

    let pipeline = VerificationPipeline::new(
        agent,
        config.validation.agent_validator(),
        slack_client(config)?,
        Arc::new(queue_client(config, http)?),
    )
    .with_thread_context(
        config.slack.thread_context_limit,
        config.slack.thread_context_timeout_duration(),
    );
    Ok(state.with_pipeline(pipeline))
}

/// Build the state of the Slack events endpoint.
pub fn build_ingress_state(config: &AppConfig) -> anyhow::Result<IngressState> {
    let http = reqwest::Client::new();
    let region = config.model.region.as_str();

    let signing_secret = config
        .slack
        .signing_secret
        .as_ref()
        .context("SLACK_SIGNING_SECRET is not set")?
        .expose_secret()
        .to_string();

    let tokens: Arc<dyn TokenStore> = match (&config.aws.token_table, &config.slack.bot_token) {
        (Some(table), _) => Arc::new(DynamoTokenStore::new(
            http.clone(),
            table,
            signer(region, DYNAMODB_SIGNING_SERVICE)?,
        )?),
        (None, Some(token)) => Arc::new(StaticTokenStore::single(token.expose_secret())),
        (None, None) => anyhow::bail!("WORKSPACE_TOKEN_TABLE or SLACK_BOT_TOKEN must be set"),
    };

    let verification = config
        .agents
        .get(Persona::Verification)
        .context("VERIFICATION_AGENT_URL is not set")?;
    let mut invoker = A2aClient::new(http).with_endpoint(
        Persona::Verification.as_str(),
        Url::parse(verification).context("invalid VERIFICATION_AGENT_URL")?,
    );
    if config.aws.sign_agent_calls {
        invoker = invoker.with_signer(signer(region, AGENTCORE_SIGNING_SERVICE)?);
    }

    Ok(IngressState {
        signing_secret,
        tokens,
        slack: slack_client(config)?,
        invoker: Arc::new(invoker),
        validator: config.validation.ingress_validator(),
    })
}

fn with_http_layers(router: Router) -> Router {
    router
        .layer(axum::middleware::from_fn(middleware::timing_middleware))
        .layer(axum::middleware::from_fn(middleware::correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Create the agent router with an Arc-wrapped state.
pub fn create_agent_router(state: Arc<AgentState>) -> Router {
    with_http_layers(a2a::routes().with_state(state))
}

/// Create the ingress router with an Arc-wrapped state.
pub fn create_ingress_router(state: Arc<IngressState>) -> Router {
    with_http_layers(ingress::routes().with_state(state))
}

/// Serve `app` until `shutdown` resolves, then give in-flight requests
/// `grace` to finish.
async fn serve<F>(app: Router, listen_addr: &str, grace: Duration, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {listen_addr}"))?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    let (stopped_tx, mut stopped_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            let _ = stopped_tx.send(true);
        })
        .into_future();
    let drain_deadline = async move {
        let _ = stopped_rx.wait_for(|stopped| *stopped).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result?,
        _ = drain_deadline => warn!("Shutdown timeout elapsed with requests still in flight"),
    }
    Ok(())
}

/// Run an agent server until `shutdown` resolves.
pub async fn run_agent<F>(config: AppConfig, persona: Persona, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate_for(Role::Agent(persona))?;
    let state = Arc::new(build_agent_state(&config, persona)?);
    info!(agent = %persona, model = %config.model.model_id, "Starting agent server");
    serve(
        create_agent_router(state),
        &config.server.listen_addr,
        Duration::from_secs(config.server.shutdown_timeout),
        shutdown,
    )
    .await
}

/// Run the Slack events endpoint until `shutdown` resolves.
pub async fn run_ingress<F>(config: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate_for(Role::Ingress)?;
    let state = Arc::new(build_ingress_state(&config)?);
    info!("Starting Slack ingress");
    serve(
        create_ingress_router(state),
        &config.server.listen_addr,
        Duration::from_secs(config.server.shutdown_timeout),
        shutdown,
    )
    .await
}

/// Run the queue poster until `shutdown` resolves.
pub async fn run_poster<F>(config: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate_for(Role::Poster)?;
    let queue = queue_client(&config, reqwest::Client::new())?;
    let poster = SlackPoster::new(slack_client(&config)?, config.slack.canvas_enabled);
    info!(queue = queue.queue_url(), canvas = config.slack.canvas_enabled, "Starting poster");
    PosterWorker::new(Arc::new(queue), poster).run(shutdown).await;
    Ok(())
}
