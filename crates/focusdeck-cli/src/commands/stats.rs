use clap::Subcommand;
use focusdeck_core::{Config, Database};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today,
    /// All-time stats
    All,
    /// Focus minutes per day
    Daily {
        /// Number of days to include, counting today
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let user = &config.persistence.user_id;
    let db = Database::open()?;

    match action {
        StatsAction::Today => {
            let stats = db.stats_today(user)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::All => {
            let stats = db.stats_all(user)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Daily { days } => {
            let daily = db.daily_stats(user, days)?;
            println!("{}", serde_json::to_string_pretty(&daily)?);
        }
    }
    Ok(())
}
