use clap::Subcommand;
use focusdeck_core::{Config, Database};

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List recent sessions, newest first
    List {
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: SessionsAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;

    match action {
        SessionsAction::List { limit, json } => {
            let sessions = db.recent_sessions(&config.persistence.user_id, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
                return Ok(());
            }
            if sessions.is_empty() {
                println!("No sessions recorded yet.");
                return Ok(());
            }
            for s in &sessions {
                println!(
                    "{}  {:<11}  {:>3} min{}",
                    s.completed_at.format("%Y-%m-%d %H:%M"),
                    s.mode.label(),
                    s.duration_secs / 60,
                    if s.completed { "" } else { "  (incomplete)" }
                );
            }
        }
    }
    Ok(())
}
