use std::time::Duration;

use clap::Args;
use hiitimer_core::exercise::ExerciseSide;
use hiitimer_core::timer::{RunningSnapshot, DEFAULT_TICK_MS};
use hiitimer_core::{
    beep_channel, ConfigFile, Database, DialogState, SessionHandle, SessionServices,
    SessionViewState, SystemClock,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Args)]
pub struct RunArgs {
    /// Seed for the exercise draw
    #[arg(long)]
    seed: Option<u64>,
    /// Countdown tick period in milliseconds
    #[arg(long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run_session(args));
    // A pending stdin read would otherwise block shutdown until the next line.
    runtime.shutdown_background();
    result
}

async fn run_session(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.tick_ms == 0 {
        return Err("--tick-ms must be greater than 0".into());
    }

    let mut source = ConfigFile::default_location()?;
    if let Some(seed) = args.seed {
        source = source.with_seed(seed);
    }
    let recorder = Database::open()?;
    let (beep, mut beeps) = beep_channel();

    let services = SessionServices::new(
        Box::new(source.clone()),
        Box::new(source),
        Box::new(recorder),
        Box::new(SystemClock),
        beep,
    )
    .with_tick_period(Duration::from_millis(args.tick_ms));
    let (handle, task) = SessionHandle::spawn(services);

    tokio::spawn(async move {
        while beeps.recv().await.is_some() {
            eprint!("\x07");
        }
    });

    let mut state = handle.state();
    let mut dialog = handle.dialog();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!("p = pause, r = resume, a = abort, q = quit");
    handle.on_ready_to_start();

    let outcome: Result<(), Box<dyn std::error::Error>> = loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let view = state.borrow_and_update().clone();
                match view {
                    SessionViewState::Loading => {}
                    SessionViewState::InitialCountDown { count_down } => {
                        println!("get ready  {}", count_down.seconds_display);
                    }
                    SessionViewState::RunningNominal(snapshot) => println!("{}", render(&snapshot)),
                    SessionViewState::Finished(summary) => {
                        println!(
                            "session finished: {} ({} exercises)",
                            summary.duration_formatted,
                            summary.work_steps.len()
                        );
                        break Ok(());
                    }
                    SessionViewState::Error { code } => {
                        break Err(format!("session failed: {code}").into());
                    }
                }
            }
            changed = dialog.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                if *dialog.borrow_and_update() == DialogState::Pause {
                    println!("paused (r = resume, a = abort)");
                }
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    debug!(input = %line.trim(), "command");
                    match line.trim() {
                        "p" => handle.pause(),
                        "r" => handle.resume(),
                        "a" => handle.abort_session(),
                        "q" => break Ok(()),
                        "" => {}
                        other => eprintln!("unknown command: {other}"),
                    }
                }
                None => stdin_open = false,
            },
        }
    };

    drop(handle);
    let _ = task.await;
    outcome
}

fn render(snapshot: &RunningSnapshot) -> String {
    let side = match snapshot.side {
        ExerciseSide::None => "",
        ExerciseSide::Left => " (left)",
        ExerciseSide::Right => " (right)",
    };
    let step = match snapshot.step_type {
        hiitimer_core::StepType::Work => "WORK",
        _ => "next",
    };
    let mut line = format!(
        "{step:<4}  {}{side}  {} / {}  session {}",
        snapshot.exercise.name,
        snapshot.step_remaining_formatted,
        snapshot.step_duration_formatted,
        snapshot.session_remaining_formatted,
    );
    if let Some(count_down) = &snapshot.count_down {
        line.push_str(&format!("  {}", count_down.seconds_display));
    }
    line
}
