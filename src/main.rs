use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use fluency_coach::{
    config::{load_config, AnalysisConfig, ModelPaths},
    models::ModelService,
    pipeline::AnalysisPipeline,
    server::{build_router, AppState, UploadConfig},
    transcript::{CmuDictionary, GoogleSpeechClient, GraphemeToPhoneme},
};

#[derive(Parser)]
#[command(name = "fluency-coach")]
#[command(about = "Fluency analysis server for children's speech-practice exercises")]
#[command(long_about = "
Fluency analysis server. Accepts WAV recordings of speech exercises over HTTP and
returns a pass/fail verdict, stutter type and encouraging feedback.

EXAMPLES:
  # Start with models in ./models and the CMU dictionary
  fluency-coach --cmu-dict data/cmudict.dict

  # Stricter gatekeeper on a custom port
  fluency-coach --bind 0.0.0.0:8080 --binary-threshold 0.75

Requires GOOGLE_SPEECH_API_KEY in the environment or a .env file.
")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "FLUENCY_BIND", default_value = "127.0.0.1:5000")]
    bind: String,

    /// Waveform embedding model (TFLite)
    #[arg(long, env = "FLUENCY_EMBEDDING_MODEL", default_value = "models/yamnet.tflite")]
    embedding_model: PathBuf,

    /// Binary fluent/disfluent model (TFLite)
    #[arg(long, env = "FLUENCY_GATEKEEPER_MODEL", default_value = "models/gatekeeper.tflite")]
    gatekeeper_model: PathBuf,

    /// Stutter-type model (TFLite)
    #[arg(long, env = "FLUENCY_SPECIALIST_MODEL", default_value = "models/specialist.tflite")]
    specialist_model: PathBuf,

    /// CMU Pronouncing Dictionary; without it words are spelled out letter by letter
    #[arg(long, env = "FLUENCY_CMU_DICT")]
    cmu_dict: Option<PathBuf>,

    /// Gatekeeper score above which a clip counts as disfluent
    #[arg(long, default_value = "0.60")]
    binary_threshold: f32,

    /// Upload size limit in megabytes
    #[arg(long, default_value = "16")]
    max_upload_mb: usize,
}

#[cfg(feature = "tflite")]
fn model_service(paths: ModelPaths) -> anyhow::Result<ModelService> {
    Ok(ModelService::new(move || {
        fluency_coach::models::load_tflite_models(&paths)
    }))
}

#[cfg(not(feature = "tflite"))]
fn model_service(_paths: ModelPaths) -> anyhow::Result<ModelService> {
    anyhow::bail!("built without the `tflite` feature, no model backend available")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    info!("🚀 Initializing fluency-coach v{}", env!("CARGO_PKG_VERSION"));

    // Configuration errors are fatal at startup
    let api_config = load_config()?;

    let paths = ModelPaths {
        embedding: args.embedding_model,
        gatekeeper: args.gatekeeper_model,
        specialist: args.specialist_model,
    };
    paths.validate()?;
    let models = Arc::new(model_service(paths)?);
    info!("🧠 Model files found, loading on first request");

    let mut analysis = AnalysisConfig::default();
    analysis.cascade.binary_threshold = args.binary_threshold;
    analysis.validate()?;

    let g2p: Arc<dyn GraphemeToPhoneme> = match &args.cmu_dict {
        Some(path) => Arc::new(
            CmuDictionary::load(path)
                .with_context(|| format!("loading CMU dictionary {}", path.display()))?,
        ),
        None => {
            warn!("💡 No CMU dictionary given, phonemes will be spelled out");
            Arc::new(CmuDictionary::default())
        }
    };

    let transcriber = Arc::new(GoogleSpeechClient::new(api_config.google_speech_key()));
    let pipeline = AnalysisPipeline::new(models, transcriber, g2p, analysis);

    let upload = UploadConfig {
        max_bytes: args.max_upload_mb * 1024 * 1024,
        ..UploadConfig::default()
    };
    let app = build_router(AppState::new(pipeline, upload));

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!("🎧 Listening on http://{}", args.bind);
    info!("   Health check: http://{}/health", args.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
