use adflow::config::AdsConfig;
use adflow::event::{AdsEvent, EventType, MediaEvent, Prefix};
use adflow::macros::{self, MacroContext};
use adflow::replay::{self, Trace};
use adflow::state::{self, AdState, Conditions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adflow", about = "Ad-lifecycle orchestration engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON event trace against a simulated element
    Replay {
        /// Trace file
        trace: PathBuf,
        /// Session config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print step reports as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print the state transition table
    Table,
    /// Expand ad-URL macros in a template
    Macro {
        template: String,
        /// Percent-encode substituted values
        #[arg(long)]
        uri_encode: bool,
        #[arg(long, default_value = "")]
        player_id: String,
        /// Media duration in seconds
        #[arg(long, default_value = "0")]
        duration: f64,
        /// Media info object (JSON)
        #[arg(long)]
        mediainfo: Option<String>,
        /// Page variables object (JSON)
        #[arg(long)]
        page_vars: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("adflow=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            trace,
            config,
            json,
        } => {
            let config = match config {
                Some(path) => match AdsConfig::load(&path) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Error: {}: {}", path.display(), e);
                        std::process::exit(1);
                    }
                },
                None => AdsConfig::default(),
            };
            let trace = match Trace::load(&trace) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Error: {}: {}", trace.display(), e);
                    std::process::exit(1);
                }
            };

            let (session, reports) = replay::run(&trace, config);
            for report in &reports {
                if json {
                    match serde_json::to_string(report) {
                        Ok(line) => println!("{}", line),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                    continue;
                }
                for t in &report.transitions {
                    println!(
                        "[{:>6} ms] {} triggered: {} -> {}",
                        t.at_ms, t.trigger, t.from, t.to
                    );
                }
                if !report.events.is_empty() {
                    println!("[{:>6} ms]   events: {}", report.at_ms, report.events.join(", "));
                }
            }
            if !json {
                println!(
                    "Final state: {} at {} ms ({} timer(s) pending)",
                    session.state(),
                    session.now(),
                    session.timers().pending_count()
                );
            }
        }
        Commands::Table => print_table(),
        Commands::Macro {
            template,
            uri_encode,
            player_id,
            duration,
            mediainfo,
            page_vars,
        } => {
            let media_info = mediainfo.map(|s| parse_json_arg("--mediainfo", &s));
            let page_variables = page_vars
                .map(|s| parse_json_arg("--page-vars", &s))
                .unwrap_or(serde_json::Value::Null);
            let ctx = MacroContext {
                player_id,
                media_info,
                duration,
                page_variables,
                ..MacroContext::default()
            };
            println!(
                "{}",
                macros::ad_macro_replacement(&template, uri_encode, None, &ctx)
            );
        }
    }
}

fn parse_json_arg(flag: &str, raw: &str) -> serde_json::Value {
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {} is not valid JSON: {}", flag, e);
            std::process::exit(1);
        }
    }
}

fn print_table() {
    let events: Vec<EventType> = vec![
        EventType::PLAY,
        EventType::PLAYING,
        EventType::ENDED,
        EventType::Ads(AdsEvent::AdsReady),
        EventType::Ads(AdsEvent::AdsCanceled),
        EventType::Ads(AdsEvent::AdSkip),
        EventType::Ads(AdsEvent::AdsError),
        EventType::Ads(AdsEvent::AdStart),
        EventType::Ads(AdsEvent::AdEnd),
        EventType::Ads(AdsEvent::AdTimeout),
        EventType::Ads(AdsEvent::NoPreroll),
        EventType::Ads(AdsEvent::ContentUpdate),
        EventType::Ads(AdsEvent::ContentResumed),
        EventType::Prefixed(Prefix::Content, MediaEvent::Ended),
    ];
    let variants = [
        ("", Conditions::default()),
        (
            " (paused)",
            Conditions {
                paused: true,
                ..Conditions::default()
            },
        ),
        (
            " (content ended before)",
            Conditions {
                content_has_ended: true,
                ..Conditions::default()
            },
        ),
    ];

    for from in AdState::ALL {
        println!("{}", from);
        for event in &events {
            let mut seen: Vec<String> = Vec::new();
            for (label, cond) in &variants {
                let Some(decision) = state::decide(from, *event, cond) else {
                    continue;
                };
                let dest = decision
                    .next
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "(stay)".to_string());
                let line = if decision.effects.is_empty() {
                    dest
                } else {
                    format!("{} {:?}", dest, decision.effects)
                };
                if seen.first() == Some(&line) {
                    continue;
                }
                println!("  {:<16} -> {}{}", event.to_string(), line, label);
                seen.push(line);
            }
        }
    }
}
