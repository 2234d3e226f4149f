use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub owner_name: String,
    pub llm_provider: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    pub ollama_url: String,
    pub ollama_model: String,
    pub elevenlabs_api_key: String,
    pub elevenlabs_voice_id: String,
    pub elevenlabs_model_id: String,
    pub google_calendar_token: String,
    pub google_calendar_id: String,
    pub calendar_time_zone: String,
    pub silence_timeout_secs: u64,
    pub audio_sample_rate: u32,
    pub audio_chunk_size: usize,
    pub audio_poll_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parsed("PORT", 3000),
            owner_name: env::var("OWNER_NAME").unwrap_or_else(|_| "the owner".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_temperature: parsed("OPENAI_TEMPERATURE", 0.7),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            elevenlabs_api_key: env::var("ELEVENLABS_API_KEY").unwrap_or_default(),
            elevenlabs_voice_id: env::var("ELEVENLABS_VOICE_ID").unwrap_or_default(),
            elevenlabs_model_id: env::var("ELEVENLABS_MODEL_ID")
                .unwrap_or_else(|_| "eleven_turbo_v2".to_string()),
            google_calendar_token: env::var("GOOGLE_CALENDAR_TOKEN").unwrap_or_default(),
            google_calendar_id: env::var("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|_| "primary".to_string()),
            calendar_time_zone: env::var("CALENDAR_TIME_ZONE")
                .unwrap_or_else(|_| "America/New_York".to_string()),
            silence_timeout_secs: parsed("SILENCE_TIMEOUT_SECS", 10),
            audio_sample_rate: parsed("AUDIO_SAMPLE_RATE", 16000),
            audio_chunk_size: parsed("AUDIO_CHUNK_SIZE", 1024),
            audio_poll_ms: parsed("AUDIO_POLL_MS", 10),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
