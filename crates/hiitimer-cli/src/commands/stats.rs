use clap::Subcommand;
use hiitimer_core::storage::Database;

#[derive(Subcommand)]
pub enum StatsAction {
    /// All-time stats
    All,
    /// All-time stats for one user
    User {
        /// User id
        id: i64,
    },
    /// Most recent sessions
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::All => {
            let stats = db.stats_all()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::User { id } => {
            let stats = db.stats_for_user(id)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Recent { limit } => {
            let sessions = db.recent_sessions(limit)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
    }
    Ok(())
}
