use anyhow::{Context, Result, bail};
use cinder_core::id::is_valid_paste_id;
use cinder_shared::{PasteContents, PasteCreated, SubmitPasteRequest};
use clap::{Parser, Subcommand};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a new paste to the server
    Send {
        /// The paste content to store
        ///
        /// This can be any UTF-8 text. Consider quoting the value
        /// if it contains spaces or special characters.
        #[arg(short, long, value_name = "TEXT")]
        text: String,

        /// How long the paste stays readable, e.g. 15m, 1h30m or 2days
        ///
        /// If omitted or not understood by the server, the paste
        /// expires after 15 minutes.
        #[arg(short, long, value_name = "DURATION")]
        validity: Option<String>,

        /// Base URL of the server, including any base path
        #[arg(short, long, value_name = "URL", default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Retrieve a paste from the server. This destroys it.
    Recv {
        /// Full URL returned by the `send` command
        #[arg(long, value_name = "URL")]
        source: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let client = reqwest::blocking::Client::new();

    match cli.command {
        Command::Send {
            text,
            validity,
            server,
        } => {
            let request = SubmitPasteRequest {
                paste: text,
                validity,
            };

            let submit_url = format!("{}/paste/submit", server.trim_end_matches('/'));
            let created: PasteCreated = reqwest_json(client.post(submit_url).json(&request))
                .context("Failed to create paste")?;

            println!("{}", created.url);
            println!("Expires at {} ({})", created.expires_at, created.validity);
        }
        Command::Recv { source } => {
            let (id, _key) = split_source(&source)?;
            if !is_valid_paste_id(id) {
                bail!("Could not find the paste id in the paste link.");
            }

            let contents: PasteContents =
                reqwest_json(client.get(&source)).context("Failed to retrieve paste")?;

            println!("{}", contents.paste);
        }
    }
    Ok(())
}

/// Pulls `(id, key)` out of `.../paste/{id}/{key}`.
fn split_source(source: &str) -> Result<(&str, &str)> {
    let mut segments = source.trim_end_matches('/').rsplit('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(key), Some(id), Some("paste")) => Ok((id, key)),
        _ => bail!("Not a paste link: {source}"),
    }
}

fn reqwest_json<T: serde::de::DeserializeOwned>(
    req: reqwest::blocking::RequestBuilder,
) -> Result<T, reqwest::Error> {
    req.send()?.error_for_status()?.json()
}
