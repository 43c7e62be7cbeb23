use anyhow::{Context, Result};
use clap::Parser;
use interview_live::audio::capture::CpalCaptureBackend;
use interview_live::audio::playback::CpalSink;
use interview_live::session::{
    GeminiFeedbackAnalyzer, InterviewConfig, InterviewController, Phase, WsConnector,
};
use interview_live::transcript::Speaker;
use interview_live::Config;
use tracing::info;

/// Voice mock-interview session from the terminal.
#[derive(Parser, Debug)]
#[command(name = "interview-live", version)]
struct Args {
    /// Role to interview for
    #[arg(long, default_value = "Software Engineer")]
    role: String,

    /// Plain-text resume file to give the interviewer as context
    #[arg(long)]
    resume: Option<std::path::PathBuf>,

    /// Config file path (without extension)
    #[arg(long, default_value = "config/interview-live")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load_or_default(&args.config)?;
    info!("{} starting", cfg.service.name);

    let resume_context = match &args.resume {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read resume file {}", path.display()))?,
        ),
        None => None,
    };

    let ws_url = cfg.live_url()?;
    let analyzer = GeminiFeedbackAnalyzer::new(cfg.analysis_url()?);

    let interview = InterviewConfig {
        role: args.role.clone(),
        resume_context,
        voice: cfg.api.voice.clone(),
        ws_url,
        model: cfg.api.model.clone(),
        capture_sample_rate: cfg.audio.capture_sample_rate,
        frame_samples: cfg.audio.frame_samples,
        ..Default::default()
    };

    let capture = Box::new(CpalCaptureBackend::new(interview.capture_config()));
    let sink = CpalSink::new()?;

    let connector = WsConnector {
        url: interview.ws_url.clone(),
    };
    let mut controller = InterviewController::new(interview, capture, sink);

    controller.start(&connector).await?;
    println!("Interview for \"{}\" started. Press Ctrl-C to finish.", args.role);

    let mut printed_turns = 0;
    loop {
        tokio::select! {
            event = controller.next_event() => {
                let Some(event) = event else { break };
                controller.handle_event(event).await;

                for turn in &controller.transcript()[printed_turns..] {
                    let who = match turn.speaker {
                        Speaker::Model => "Interviewer",
                        Speaker::User => "You",
                    };
                    println!("{}: {}", who, turn.text);
                }
                printed_turns = controller.transcript().len();

                if controller.phase() == Phase::Error {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nFinishing up, analyzing your answers...");
                let _ = controller.finish(&analyzer).await;
                break;
            }
        }
    }

    match controller.phase() {
        Phase::Report => {
            let Some(report) = controller.report() else {
                anyhow::bail!("Session finished without a report");
            };
            println!("\n===== Feedback =====");
            println!("Overall:     {}/100", report.overall);
            println!("Clarity:     {}/100", report.clarity);
            println!("Relevance:   {}/100", report.relevance);
            println!("Confidence:  {}/100", report.confidence);
            println!("STAR method: {}/100", report.star_method);
            println!("Filler words: {}", report.filler_words);
            println!("Sentiment:   {:?}", report.sentiment);
            if !report.keywords.is_empty() {
                println!("Keywords:    {}", report.keywords.join(", "));
            }
            println!("\n{}", report.overall_feedback);
            for example in &report.examples {
                println!("\nYou said:  {}", example.original);
                println!("Try this:  {}", example.improved);
            }
            Ok(())
        }
        Phase::Error => {
            let message = controller
                .error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown failure".to_string());
            anyhow::bail!("{}", message)
        }
        other => {
            anyhow::bail!("Session ended unexpectedly in phase {}", other)
        }
    }
}
