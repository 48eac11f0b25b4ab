//! `verify-identity`: run one verification attempt from the command line.
//!
//! The live capture is served from a photo on disk through the same countdown
//! flow a camera would use. The attempt summary is written to stdout as JSON;
//! logs go to stderr.

use std::ffi::OsString;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cap_std::{ambient_authority, fs::Dir};
use clap::Parser;
use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use serde::Serialize;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use verification_client::config::{GatewaySettings, REQUEST_TIMEOUT};
use verification_client::domain::{
    CameraCaptureSession, CountdownSettings, FaceMatchResult, ImagePayload, Step,
    StepStateMachine,
};
use verification_client::outbound::gateway::HttpVerificationGateway;
use verification_client::outbound::media::{JpegFrameEncoder, StillImageCapture};
use verification_client::outbound::timer::TokioCountdownTimer;

/// `verify-identity` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "verify-identity",
    about = "Verify an identity document, a live photo and a one-time code",
    version
)]
struct CliArgs {
    /// Image of the identity document.
    #[arg(long, value_name = "path")]
    document: PathBuf,
    /// Photo served as the live camera capture.
    #[arg(long = "live-photo", value_name = "path")]
    live_photo: PathBuf,
    /// One-time code. Read from stdin when omitted.
    #[arg(long, value_name = "digits")]
    code: Option<String>,
    /// Countdown length in seconds before the capture.
    #[arg(long, value_name = "seconds", default_value_t = 3)]
    countdown: u32,
}

/// JSON summary of a finished attempt.
#[derive(Debug, Serialize)]
struct AttemptSummary<'a> {
    attempt_id: Uuid,
    step: Step,
    document_number: Option<&'a str>,
    phone_number: Option<&'a str>,
    face_match: Option<&'a FaceMatchResult>,
    otp_verified: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: CliArgs) -> Result<()> {
    let settings = GatewaySettings::load_from_iter([OsString::from("verify-identity")])
        .map_err(|err| eyre!("load gateway settings: {err}"))?;
    let base_url = settings.base_url()?;
    let gateway = HttpVerificationGateway::new(&base_url, REQUEST_TIMEOUT)?;
    let machine = StepStateMachine::new(Arc::new(gateway));
    info!(base_url = %base_url, attempt_id = %machine.session().attempt_id(), "verification started");

    let document = ImagePayload::new(read_file(&args.document)?, media_type_for(&args.document));
    let fields = machine
        .submit_document(&document)
        .await
        .wrap_err("document upload failed")?;
    info!(has_phone = fields.phone_number.is_some(), "document accepted");

    let live_photo = read_file(&args.live_photo)?;
    let (camera, mut events) = CameraCaptureSession::with_settings(
        Arc::new(StillImageCapture::from_encoded(&live_photo)?),
        Arc::new(TokioCountdownTimer::from_current()?),
        Arc::new(JpegFrameEncoder::default()),
        CountdownSettings {
            start_from: args.countdown,
            period: Duration::from_secs(1),
        },
    );
    let camera = Arc::new(camera);
    machine.attach_camera(Arc::clone(&camera));
    camera.activate().await.wrap_err("camera activation failed")?;
    camera.begin_countdown_capture()?;
    let event = events
        .recv()
        .await
        .ok_or_else(|| eyre!("camera closed before capturing"))?;
    let face = machine
        .submit_capture_event(event)
        .await
        .wrap_err("live face check failed")?;
    info!(confidence = face.confidence, "face matched");

    machine
        .request_code()
        .await
        .wrap_err("could not send the one-time code")?;
    let code = match args.code {
        Some(code) => code,
        None => prompt_for_code()?,
    };
    machine
        .confirm_code(&code)
        .await
        .wrap_err("one-time code was not accepted")?;

    let session = machine.session();
    let summary = AttemptSummary {
        attempt_id: session.attempt_id(),
        step: session.step(),
        document_number: session
            .document()
            .and_then(|document| document.document_number.as_deref()),
        phone_number: session.phone_number(),
        face_match: session.face_result(),
        otp_verified: session.otp_verified(),
    };
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &summary)?;
    writeln!(stdout)?;
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("{} is not a file path", path.display()))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .wrap_err_with(|| format!("open directory {}", parent.display()))?;
    dir.read(Path::new(file_name))
        .wrap_err_with(|| format!("read {}", path.display()))
}

fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

fn prompt_for_code() -> Result<String> {
    let mut stderr = io::stderr().lock();
    write!(stderr, "one-time code: ")?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}
