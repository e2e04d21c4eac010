#[macro_use]
extern crate tracing;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use std::{env, fs};

use anyhow::{anyhow, Context as _};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopHandle, RegistrationToken};
use clap::Parser;
use sluice::backend::Headless;
use sluice::root::{Event, Options, Root};
use sluice::script::ScriptRunner;
use sluice_config::{Config, ConfigPath};
use sluice_ipc::Script;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: `$XDG_CONFIG_HOME/sluice/config.kdl`).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// JSON script of timed actions to replay.
    script: PathBuf,
}

struct State {
    root: Root,
    backend: Headless,
    runner: ScriptRunner,
    start: Instant,
    deadline_timer: Option<(Duration, RegistrationToken)>,
    script_done: bool,
    error: Option<anyhow::Error>,
}

impl State {
    fn fire_deadlines(&mut self) {
        for deadline in self.backend.advance_to(self.start.elapsed()) {
            self.root
                .step(&mut self.backend, Event::DeadlineReached(deadline));
        }
    }

    /// Makes sure the event loop wakes up for the earliest armed deadline.
    fn refresh_deadline_timer(&mut self, handle: &LoopHandle<'static, State>) -> anyhow::Result<()> {
        let next = self.backend.next_deadline().map(|(at, _)| at);
        if self.deadline_timer.as_ref().map(|(at, _)| *at) == next {
            return Ok(());
        }

        if let Some((_, token)) = self.deadline_timer.take() {
            handle.remove(token);
        }

        if let Some(at) = next {
            let timer = Timer::from_deadline(self.start + at);
            let token = handle
                .insert_source(timer, |_, _, state| {
                    state.deadline_timer = None;
                    state.fire_deadlines();
                    TimeoutAction::Drop
                })
                .map_err(|err| anyhow!("error inserting deadline timer: {}", err.error))?;
            self.deadline_timer = Some((at, token));
        }

        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let directives = env::var("RUST_LOG").unwrap_or_else(|_| "sluice=debug,info".to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();

    let _client = tracy_client::Client::start();

    let config = match cli.config.map(ConfigPath::Explicit).or_else(ConfigPath::regular) {
        Some(path) => path.load().map_err(|err| anyhow!("{err:?}"))?,
        None => {
            warn!("could not determine the config directory, using the default config");
            Config::default()
        }
    };

    let text = fs::read_to_string(&cli.script)
        .with_context(|| format!("error reading {:?}", cli.script))?;
    let script: Script = serde_json::from_str(&text).context("error parsing script")?;
    info!("replaying {} steps", script.0.len());

    let mut event_loop: EventLoop<'static, State> =
        EventLoop::try_new().context("error creating event loop")?;
    let handle = event_loop.handle();

    let mut backend = Headless::new();
    let root = Root::new(Options::from_config(&config), &mut backend);
    let mut state = State {
        root,
        backend,
        runner: ScriptRunner::new(),
        start: Instant::now(),
        deadline_timer: None,
        script_done: false,
        error: None,
    };

    let mut steps = VecDeque::from(script.0);
    match steps.front() {
        Some(first) => {
            let timer = Timer::from_duration(Duration::from_millis(first.delay_ms));
            handle
                .insert_source(timer, move |_, _, state| {
                    let Some(step) = steps.pop_front() else {
                        state.script_done = true;
                        return TimeoutAction::Drop;
                    };

                    // Deadlines armed by this step count from now.
                    state.fire_deadlines();

                    let res = state
                        .runner
                        .perform(&mut state.root, &mut state.backend, &step.action);
                    if let Err(err) = res {
                        state.error = Some(err.context(format!("error performing {:?}", step.action)));
                        state.script_done = true;
                        return TimeoutAction::Drop;
                    }

                    match steps.front() {
                        Some(next) => TimeoutAction::ToDuration(Duration::from_millis(next.delay_ms)),
                        None => {
                            state.script_done = true;
                            TimeoutAction::Drop
                        }
                    }
                })
                .map_err(|err| anyhow!("error inserting script timer: {}", err.error))?;
        }
        None => state.script_done = true,
    }

    loop {
        state.fire_deadlines();

        if let Some(err) = state.error.take() {
            return Err(err);
        }

        // Once the script is over, keep running until every deadline resolved.
        if state.script_done && state.backend.next_deadline().is_none() {
            break;
        }

        state.refresh_deadline_timer(&handle)?;

        let _span = tracy_client::span!("dispatch");
        event_loop
            .dispatch(None, &mut state)
            .context("error dispatching the event loop")?;
    }

    print!("{}", state.backend.dump());
    for output in state.root.outputs().iter() {
        let geometry = state.root.output_layout().geometry(output.id());
        println!(
            "{} ({}): {}, tags {:?}",
            output.name,
            output.id(),
            geometry.map_or_else(|| String::from("inactive"), |g| g.to_string()),
            output.current.tags,
        );
    }
    println!(
        "{} transactions committed",
        state.root.committed_transactions()
    );

    Ok(())
}
