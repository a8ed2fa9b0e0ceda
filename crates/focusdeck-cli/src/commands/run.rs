use std::io::Write;

use clap::Args;
use focusdeck_core::{Config, Event, Mode, TimerService};
use tokio::sync::mpsc;

use super::{save_engine, Session};

#[derive(Args)]
pub struct RunArgs {
    /// Switch to this mode before starting
    #[arg(long)]
    mode: Option<Mode>,
    /// Keep going through auto-started modes instead of stopping at the first completion
    #[arg(long)]
    follow: bool,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_live(config, args))
}

async fn run_live(config: Config, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let Session {
        mut engine,
        gateway,
        writer,
    } = Session::open(&config)?;
    let writer = writer.spawn();

    // Catch up on time that passed since the last invocation.
    engine.tick();
    if let Some(mode) = args.mode {
        engine.change_mode(mode);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let service = TimerService::new(engine);
    service.subscribe(move |ev: &Event| {
        let _ = tx.send(ev.clone());
    });
    service.start();
    render(&service);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                service.pause();
                println!();
                break;
            }
            Some(event) = rx.recv() => match event {
                Event::SessionCompleted { mode, next_mode, auto_started, .. } => {
                    println!();
                    println!("{} finished, next up: {}", mode.label(), next_mode.label());
                    if !(auto_started && args.follow) {
                        break;
                    }
                }
                Event::CompletionAborted { reason, .. } => {
                    println!();
                    eprintln!("could not record the session: {reason}");
                    break;
                }
                _ => render(&service),
            }
        }
    }

    service.with_engine(|engine| save_engine(&gateway, engine))?;
    // Releases the engine and its dispatcher so the writer can drain.
    drop(service);
    let report = writer.await?;
    tracing::info!(saved = report.saved, failed = report.failed, "run finished");
    Ok(())
}

fn render(service: &TimerService) {
    let (title, progress) = service.with_engine(|e| (e.snapshot().title(), e.step_progress()));
    let mut out = std::io::stdout();
    let _ = write!(out, "\r{title} [{:>3.0}%]   ", progress * 100.0);
    let _ = out.flush();
}
