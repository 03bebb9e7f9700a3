use clap::Args;
use hiitimer_core::{ConfigFile, ExerciseSource, Session, SettingsSource};

#[derive(Args)]
pub struct PlanArgs {
    /// Seed for the exercise draw
    #[arg(long)]
    seed: Option<u64>,
}

pub fn run(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = ConfigFile::default_location()?;
    if let Some(seed) = args.seed {
        source = source.with_seed(seed);
    }

    let settings = source.session_settings()?;
    let plan = source.resolve(&settings)?;
    let session = Session::build(&settings, &plan.entries, &plan.users);
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}
