use std::sync::Arc;
use std::time::Duration;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use callguard::config::AppConfig;
use callguard::handlers;
use callguard::services::ai::classifier::LlmClassifier;
use callguard::services::ai::ollama::OllamaProvider;
use callguard::services::ai::openai::OpenAiProvider;
use callguard::services::ai::summary::CallSummaryBuilder;
use callguard::services::ai::LlmProvider;
use callguard::services::audio::{LogSink, SilentLineCapture};
use callguard::services::calendar::google::GoogleCalendarBackend;
use callguard::services::clock::SystemClock;
use callguard::services::orchestrator::{greeting_for, Collaborators, SessionConfig};
use callguard::services::scheduling::{SchedulingConfig, SchedulingEngine};
use callguard::services::speech::elevenlabs::ElevenLabsSynthesis;
use callguard::services::speech::SpeechSynthesisService;
use callguard::services::transcription::dev::DevTranscription;
use callguard::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let llm: Arc<dyn LlmProvider> = match config.llm_provider.as_str() {
        "openai" => {
            anyhow::ensure!(
                !config.openai_api_key.is_empty(),
                "OPENAI_API_KEY must be set when LLM_PROVIDER=openai"
            );
            tracing::info!("using OpenAI-compatible LLM provider (model: {})", config.openai_model);
            Arc::new(OpenAiProvider::new(
                config.openai_base_url.clone(),
                config.openai_api_key.clone(),
                config.openai_model.clone(),
                config.openai_temperature,
            ))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Arc::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            ))
        }
    };

    if config.google_calendar_token.is_empty() {
        tracing::warn!("GOOGLE_CALENDAR_TOKEN not set, callers will be offered fallback times");
    }
    let calendar = Arc::new(GoogleCalendarBackend::new(
        config.google_calendar_token.clone(),
        config.google_calendar_id.clone(),
        config.calendar_time_zone.clone(),
    ));
    let scheduler = Arc::new(SchedulingEngine::new(calendar, SchedulingConfig::default()));

    let synthesis = Arc::new(ElevenLabsSynthesis::new(
        config.elevenlabs_api_key.clone(),
        config.elevenlabs_voice_id.clone(),
        config.elevenlabs_model_id.clone(),
    ));

    let session = SessionConfig {
        owner_name: config.owner_name.clone(),
        silence_timeout: Duration::from_secs(config.silence_timeout_secs),
        audio_poll_interval: Duration::from_millis(config.audio_poll_ms),
        ..SessionConfig::default()
    };

    // Warm the greeting cache so answering a call does not wait on synthesis.
    match synthesis.connect().await {
        Ok(()) => {
            if let Err(e) = synthesis.greeting(&greeting_for(&session.owner_name)).await {
                tracing::warn!(error = %e, "failed to pre-synthesize greeting");
            }
        }
        Err(e) => tracing::warn!(error = %e, "speech synthesis not configured, calls will fail to start"),
    }

    let dev_transcription = Arc::new(DevTranscription::new());
    let collaborators = Collaborators {
        capture: Arc::new(SilentLineCapture::new(
            config.audio_sample_rate,
            config.audio_chunk_size,
        )),
        transcription: dev_transcription.clone(),
        classifier: Arc::new(LlmClassifier::new(llm.clone(), &config.owner_name)),
        synthesis,
        sink: Arc::new(LogSink),
        scheduler,
        summarizer: Arc::new(CallSummaryBuilder::new(llm)),
        clock: Arc::new(SystemClock),
    };

    let state = Arc::new(AppState::new(session, collaborators, dev_transcription));
    let app = handlers::router(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
