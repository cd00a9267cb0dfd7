//! # Decode File Example
//!
//! Streams a local WAV or MP3 file through the synthesis driver as if it
//! were a network response body, and reports what a playback sink would
//! have received.
//!
//! Run with: `cargo run --example decode_file --package core-decode -- speech.mp3`
//!
//! Press Ctrl-C to cancel mid-stream.

use core_decode::{DecodeConfig, SynthesisDriver, SynthesisEvent};
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )?;

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: decode_file <audio-file>");
        std::process::exit(2);
    };

    let driver = SynthesisDriver::with_symphonia(DecodeConfig::low_latency())?;
    let body = tokio::fs::File::open(&path).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    // Stand-in for the audio device: counts what it would have played.
    let (mut tx, mut rx) = mpsc::unbounded_channel::<SynthesisEvent>();
    let player = tokio::spawn(async move {
        let mut format = None;
        let mut chunks = 0usize;
        let mut pcm_bytes = 0usize;
        while let Some(event) = rx.recv().await {
            match event {
                SynthesisEvent::Started(f) => format = Some(f),
                SynthesisEvent::Audio(pcm) => {
                    chunks += 1;
                    pcm_bytes += pcm.len();
                }
                SynthesisEvent::Error { message, .. } => println!("synthesis failed: {}", message),
                SynthesisEvent::Done => println!("synthesis done"),
            }
        }
        (format, chunks, pcm_bytes)
    });

    let outcome = driver.run(body, &mut tx, &cancel).await?;
    drop(tx);
    let (format, chunks, pcm_bytes) = player.await?;

    println!("outcome:    {:?}", outcome);
    if let Some(format) = format {
        let bytes_per_second = format.sample_rate as f64 * format.bytes_per_frame() as f64;
        let seconds = pcm_bytes as f64 / bytes_per_second;
        println!(
            "format:     {} Hz, {} ch, {} bit",
            format.sample_rate, format.channels, format.bits_per_sample
        );
        println!("audio:      {} chunks, {} bytes ({:.2} s)", chunks, pcm_bytes, seconds);
    }

    Ok(())
}
