use std::io::Write;

use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use arys_client::cli::{resolve_identity, Args};
use arys_client::config::ClientConfig;
use arys_client::ChatClient;

#[cfg(feature = "playback")]
use arys_client::audio::{AudioPlaybackQueue, RodioSink};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("arys_client=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(ClientConfig::default_path);
    let mut config = ClientConfig::load(&config_path)?;
    if let Some(server) = &args.server {
        config.base_url = server.clone();
    }

    let client = ChatClient::from_config(config)?;

    let identity = resolve_identity(
        args.contact.clone(),
        args.password.clone(),
        std::env::var("ARYS_CONTACT").ok(),
        std::env::var("ARYS_PASSWORD").ok(),
    );

    if let Some(names) = &args.register {
        let identity = identity
            .clone()
            .ok_or("registration needs --contact and --password")?;
        client.register(identity, names).await?;
        println!("{}", "Account registered and logged in.".bright_green());
    } else if client.auth().current().is_none() {
        match identity.clone() {
            Some(identity) => {
                client.log_in(identity).await?;
            }
            None => {
                return Err(
                    "no stored session; pass --contact/--password or set ARYS_CONTACT/ARYS_PASSWORD"
                        .into(),
                )
            }
        }
    }

    println!(
        "{}",
        "Arys chat — /image <prompt>, /speak <file>, /history, /quit"
            .bright_blue()
            .bold()
    );

    if !args.no_history {
        show_history(&client, args.history).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you:".bright_green());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if line == "/quit" {
            break;
        } else if line == "/history" {
            show_history(&client, args.history).await;
        } else if let Some(prompt) = line.strip_prefix("/image ") {
            image_turn(&client, prompt.trim()).await;
        } else if let Some(path) = line.strip_prefix("/speak ") {
            speak_turn(&client, path.trim()).await;
        } else {
            chat_turn(&client, &line).await;
        }
    }

    Ok(())
}

/// One chat round trip, printing fragments as they arrive.
async fn chat_turn(client: &ChatClient, message: &str) {
    print!("{} ", "arys:".bright_cyan());
    let _ = std::io::stdout().flush();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(fragment) = rx.recv().await {
            print!("{fragment}");
            let _ = std::io::stdout().flush();
        }
    });

    let result = client.send_message(message, Some(tx)).await;
    let _ = printer.await;

    match result {
        Ok(summary) => {
            println!();
            if summary.stats.skipped > 0 {
                eprintln!(
                    "{}",
                    format!("({} malformed stream objects dropped)", summary.stats.skipped)
                        .yellow()
                );
            }
        }
        Err(e) => {
            println!();
            print_error(&format!("could not complete the request: {e}"));
        }
    }
}

async fn image_turn(client: &ChatClient, prompt: &str) {
    match client.generate_image(prompt).await {
        Ok(bytes) => {
            let stamp = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let name = format!("arys-image-{stamp}.png");
            match std::fs::write(&name, &bytes) {
                Ok(()) => println!(
                    "{} image saved to {} ({} bytes)",
                    "arys:".bright_cyan(),
                    name.bright_white(),
                    bytes.len()
                ),
                Err(e) => print_error(&format!("could not save image: {e}")),
            }
        }
        Err(e) => print_error(&format!("could not generate the image: {e}")),
    }
}

#[cfg(feature = "playback")]
async fn speak_turn(client: &ChatClient, path: &str) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            print_error(&format!("could not read {path}: {e}"));
            return;
        }
    };
    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());

    let sink = match RodioSink::open_default() {
        Ok(sink) => sink,
        Err(e) => {
            print_error(&format!("no audio output: {e}"));
            return;
        }
    };
    let queue = AudioPlaybackQueue::new(Box::new(sink));

    match client.speak(&file_name, bytes, &queue).await {
        Ok(_) => {
            queue.wait_idle().await;
            println!(
                "{} played {} fragments ({} skipped)",
                "arys:".bright_cyan(),
                queue.played(),
                queue.skipped()
            );
        }
        Err(e) => print_error(&format!("speech request failed: {e}")),
    }
}

#[cfg(not(feature = "playback"))]
async fn speak_turn(_client: &ChatClient, _path: &str) {
    println!(
        "{}",
        "Speech playback needs a build with --features playback.".yellow()
    );
}

async fn show_history(client: &ChatClient, page_size: u32) {
    match client.fetch_history(page_size, 0).await {
        Ok(history) => {
            for entry in history.data {
                if let Some(user) = entry.user {
                    println!("{} {user}", "you:".bright_green());
                }
                if let Some(link) = entry.img_link {
                    println!("{} {}", "arys:".bright_cyan(), link.underline());
                } else if let Some(arys) = entry.arys {
                    println!("{} {arys}", "arys:".bright_cyan());
                }
            }
        }
        Err(e) => print_error(&format!("could not load history: {e}")),
    }
}

fn print_error(message: &str) {
    println!("{} {}", "Error:".bright_red(), message);
}
