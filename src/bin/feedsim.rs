//! Detection feed simulator - scripted scenarios against the feed listener
//!
//! Streams synthetic per-frame detection JSONL to a running watchpost
//! instance, standing in for the real detector process. Useful for
//! end-to-end poking without a camera or a model.
//!
//! Scenarios:
//! - steady: a bottle and a laptop, visible every frame
//! - theft: steady scene through calibration, then the bottle vanishes
//! - intrusion: steady scene, then a person walks in and stays
//! - reset: steady scene, an operator reset mid-stream, steady again
//!
//! Usage:
//!   cargo run --bin feedsim -- --scenario theft

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(name = "feedsim")]
#[command(about = "Detection feed simulator for local testing")]
struct Args {
    /// Watchpost feed host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Watchpost feed port
    #[arg(long, default_value = "8898")]
    port: u16,

    /// Scenario to run: steady | theft | intrusion | reset
    #[arg(long, default_value = "steady")]
    scenario: String,

    /// Frames per second
    #[arg(long, default_value = "10")]
    fps: u64,

    /// Calibration window length the watchpost instance is configured with
    #[arg(long, default_value = "30")]
    calibration_frames: u32,
}

/// One synthetic detection: label, confidence, box center
fn detection(label: &str, confidence: f64, cx: f64, cy: f64) -> serde_json::Value {
    json!({
        "label": label,
        "confidence": confidence,
        "bbox": { "x1": cx - 40.0, "y1": cy - 40.0, "x2": cx + 40.0, "y2": cy + 40.0 }
    })
}

fn steady_scene() -> Vec<serde_json::Value> {
    vec![
        detection("bottle", 0.88, 320.0, 420.0),
        detection("laptop", 0.93, 760.0, 380.0),
    ]
}

struct Feed {
    stream: TcpStream,
    frame_interval: Duration,
    frames_sent: u64,
}

impl Feed {
    async fn connect(host: &str, port: u16, fps: u64) -> anyhow::Result<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("failed to connect to watchpost feed at {}", addr))?;
        println!("connected to {}", addr);
        Ok(Self {
            stream,
            frame_interval: Duration::from_millis(1000 / fps.max(1)),
            frames_sent: 0,
        })
    }

    async fn send_frame(&mut self, detections: Vec<serde_json::Value>) -> anyhow::Result<()> {
        let line = json!({ "detections": detections }).to_string();
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.frames_sent += 1;
        tokio::time::sleep(self.frame_interval).await;
        Ok(())
    }

    async fn send_frames(&mut self, count: u32, detections: Vec<serde_json::Value>) -> anyhow::Result<()> {
        for _ in 0..count {
            self.send_frame(detections.clone()).await?;
        }
        Ok(())
    }

    async fn send_reset(&mut self) -> anyhow::Result<()> {
        self.stream.write_all(b"RESET\n").await?;
        println!("sent RESET");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut feed = Feed::connect(&args.host, args.port, args.fps).await?;

    // Every scenario calibrates on the steady scene first, with some
    // margin past the configured window
    let calibration = args.calibration_frames + 5;

    match args.scenario.as_str() {
        "steady" => {
            println!("scenario: steady scene, ctrl-c to stop");
            loop {
                feed.send_frame(steady_scene()).await?;
            }
        }
        "theft" => {
            println!("scenario: theft (bottle vanishes after calibration)");
            feed.send_frames(calibration, steady_scene()).await?;
            println!("calibrated; removing bottle");
            let without_bottle = vec![detection("laptop", 0.93, 760.0, 380.0)];
            feed.send_frames(50, without_bottle).await?;
        }
        "intrusion" => {
            println!("scenario: intrusion (person enters after calibration)");
            feed.send_frames(calibration, steady_scene()).await?;
            println!("calibrated; person entering");
            let mut with_person = steady_scene();
            with_person.push(detection("person", 0.95, 540.0, 300.0));
            feed.send_frames(120, with_person).await?;
        }
        "reset" => {
            println!("scenario: reset (recalibrate mid-stream)");
            feed.send_frames(calibration, steady_scene()).await?;
            feed.send_reset().await?;
            feed.send_frames(calibration, steady_scene()).await?;
        }
        other => {
            anyhow::bail!("unknown scenario '{}', expected steady|theft|intrusion|reset", other);
        }
    }

    println!("done, {} frames sent", feed.frames_sent);
    Ok(())
}
