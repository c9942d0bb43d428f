//! `aces simulate`: both boards, a plant model and a scripted console.
//!
//! The default mode steps every board on one thread over in-memory wires,
//! so a run is deterministic and finishes as fast as the host allows.
//! `--realtime` runs each board on its own threads over socket pairs, paced
//! by the wall clock.

use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use aces_engine::{EngineConfig, EngineState};
use aces_link::{runtime, ControllerBoard, LinkConfig, LinkError, SensorBoard};
use aces_transport::{wire, SerialStream, WireRx, WireTx};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cmd::SimulateArgs;
use crate::console::ScriptedConsole;
use crate::exit::{
    engine_error, io_error, link_error, transport_error, CliError, CliResult, FAILURE, INTERNAL,
    SUCCESS, USAGE,
};
use crate::output::{print_summary, print_timeline, OutputFormat, SimulationSummary};
use crate::sim::{Plant, PlantInputs};

const CONSOLE_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Contents of a `--config` file. Missing sections take their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SimulationConfig {
    engine: EngineConfig,
    link: LinkConfig,
}

fn load_config(path: Option<&Path>) -> CliResult<SimulationConfig> {
    let Some(path) = path else {
        return Ok(SimulationConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("cannot read {}", path.display()), err))?;
    let config: SimulationConfig = serde_json::from_str(&text)
        .map_err(|err| CliError::new(USAGE, format!("invalid config {}: {err}", path.display())))?;
    config
        .engine
        .validate()
        .map_err(|err| engine_error("invalid config", err))?;
    Ok(config)
}

struct Outcome {
    console: ScriptedConsole,
    final_state: EngineState,
    simulated: Duration,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(args.config.as_deref())?;
    let console = ScriptedConsole::new(args.throttle, Duration::from_secs(args.run_secs));
    let limit = Duration::from_secs(args.max_secs);

    let outcome = if args.realtime {
        run_realtime(config, console, limit)?
    } else {
        run_stepped(config, console, limit)?
    };

    print_timeline(outcome.console.timeline(), format);
    let summary = SimulationSummary {
        outcome: if outcome.console.succeeded() {
            "completed"
        } else if outcome.console.fault().is_some() {
            "fault"
        } else {
            "incomplete"
        },
        fault: outcome.console.fault().map(|status| status.name()),
        final_state: outcome.final_state.to_string(),
        simulated_ms: outcome.simulated.as_millis() as u64,
    };
    print_summary(&summary, format);

    if outcome.console.succeeded() {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}

/// Both boards on in-memory wires, stepped one sample window at a time.
struct Bench {
    ecu: ControllerBoard<WireTx, WireTx>,
    esb: SensorBoard<WireTx, PlantInputs>,
    ecu_to_esb: WireRx,
    esb_to_ecu: WireRx,
    ecu_to_console: WireRx,
    plant: Plant,
}

impl Bench {
    fn new(config: SimulationConfig) -> CliResult<Self> {
        let (ecu_esb_tx, ecu_to_esb) = wire();
        let (esb_tx, esb_to_ecu) = wire();
        let (console_tx, ecu_to_console) = wire();
        let plant = Plant::new(&config.engine);
        let esb = SensorBoard::new(config.engine, &config.link, PlantInputs::default(), esb_tx)
            .map_err(|err| link_error("sensor board", err))?;
        Ok(Self {
            ecu: ControllerBoard::new(&config.link, ecu_esb_tx, console_tx),
            esb,
            ecu_to_esb,
            esb_to_ecu,
            ecu_to_console,
            plant,
        })
    }

    /// Deliver everything in flight between the boards.
    fn shuttle(&mut self) -> aces_link::Result<()> {
        // replies land on the opposite wire, so run until both are quiet
        while self.ecu_to_esb.pending() + self.esb_to_ecu.pending() > 0 {
            for &byte in self.ecu_to_esb.drain().iter() {
                self.esb.on_byte(byte)?;
            }
            for &byte in self.esb_to_ecu.drain().iter() {
                self.ecu.on_esb_byte(byte)?;
            }
        }
        Ok(())
    }

    fn step(&mut self, window: Duration) -> aces_link::Result<EngineState> {
        self.plant.advance(window, self.esb.sequencer().actuators());
        self.ecu.on_tick(&self.plant.controller_readings(window))?;
        self.shuttle()?;
        let state = self
            .esb
            .on_sample_window(&self.plant.sensor_readings(window))?;
        self.shuttle()?;
        Ok(state)
    }

    fn console_exchange(
        &mut self,
        console: &mut ScriptedConsole,
        now: Duration,
    ) -> aces_link::Result<()> {
        let inbound = self.ecu_to_console.drain();
        let mut outbound = console.on_bytes(now, &inbound);
        outbound.extend(console.poll(now));
        for byte in outbound {
            self.ecu.on_console_byte(byte)?;
        }
        self.shuttle()
    }
}

fn run_stepped(
    config: SimulationConfig,
    mut console: ScriptedConsole,
    limit: Duration,
) -> CliResult<Outcome> {
    let window = config.engine.window();
    let mut bench = Bench::new(config)?;
    let mut now = Duration::ZERO;
    let mut last_state = bench.esb.sequencer().state();

    while now < limit && !console.is_done() {
        now += window;
        let state = bench
            .step(window)
            .map_err(|err| link_error("simulation step", err))?;
        if state != last_state {
            info!(
                t_ms = now.as_millis() as u64,
                state = %state,
                rpm = bench.plant.rpm().round(),
                egt = bench.plant.egt().round(),
                lit = bench.plant.is_lit(),
                "engine state"
            );
            last_state = state;
        }
        bench
            .console_exchange(&mut console, now)
            .map_err(|err| link_error("console exchange", err))?;
    }
    if !console.is_done() {
        warn!(limit_s = limit.as_secs(), "simulation stopped at time limit");
    }

    Ok(Outcome {
        final_state: bench.esb.sequencer().state(),
        console,
        simulated: now,
    })
}

fn run_realtime(
    config: SimulationConfig,
    mut console: ScriptedConsole,
    limit: Duration,
) -> CliResult<Outcome> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let window = config.engine.window();
    let (ecu_esb, esb_ecu) =
        SerialStream::pair().map_err(|err| transport_error("socket pair", err))?;
    let (ecu_console, mut console_stream) =
        SerialStream::pair().map_err(|err| transport_error("socket pair", err))?;
    for stream in [&ecu_esb, &esb_ecu, &ecu_console, &console_stream] {
        stream
            .set_read_timeout(Some(CONSOLE_READ_TIMEOUT))
            .map_err(|err| transport_error("read timeout", err))?;
    }
    let clone = |stream: &SerialStream| {
        stream
            .try_clone()
            .map_err(|err| transport_error("socket clone", err))
    };

    let plant = Arc::new(Mutex::new(Plant::new(&config.engine)));
    let ecu = Arc::new(Mutex::new(ControllerBoard::new(
        &config.link,
        clone(&ecu_esb)?,
        clone(&ecu_console)?,
    )));
    let esb = Arc::new(Mutex::new(
        SensorBoard::new(
            config.engine,
            &config.link,
            PlantInputs::default(),
            clone(&esb_ecu)?,
        )
        .map_err(|err| link_error("sensor board", err))?,
    ));

    let ecu_plant = plant.clone();
    let esb_plant = plant.clone();
    let spawned: Vec<aces_link::Result<JoinHandle<aces_link::Result<()>>>> = vec![
        runtime::spawn_receiver("ecu-esb", ecu_esb, ecu.clone(), running.clone(), |b, byte| {
            b.on_esb_byte(byte)
        }),
        runtime::spawn_receiver(
            "ecu-console",
            ecu_console,
            ecu.clone(),
            running.clone(),
            |b, byte| b.on_console_byte(byte),
        ),
        runtime::spawn_receiver("esb", esb_ecu, esb.clone(), running.clone(), |b, byte| {
            b.on_byte(byte)
        }),
        runtime::spawn_ticker("ecu", window, ecu.clone(), running.clone(), move |b, elapsed| {
            let readings = ecu_plant
                .lock()
                .map_err(|_| LinkError::Poisoned)?
                .controller_readings(elapsed);
            b.on_tick(&readings)
        }),
        runtime::spawn_ticker("esb", window, esb.clone(), running.clone(), move |b, elapsed| {
            let mut plant = esb_plant.lock().map_err(|_| LinkError::Poisoned)?;
            plant.advance(elapsed, b.sequencer().actuators());
            b.on_sample_window(&plant.sensor_readings(elapsed))?;
            Ok(())
        }),
    ];
    let mut handles = Vec::with_capacity(spawned.len());
    for handle in spawned {
        match handle {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                running.store(false, Ordering::SeqCst);
                return Err(link_error("spawn failed", err));
            }
        }
    }

    let started = Instant::now();
    let result = drive_console(&mut console, &mut console_stream, &running, window, limit);
    let simulated = started.elapsed();
    running.store(false, Ordering::SeqCst);

    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(link_error("board thread failed", err)),
            Err(_) => return Err(CliError::new(INTERNAL, "board thread panicked")),
        }
    }
    result?;

    let final_state = esb
        .lock()
        .map_err(|_| CliError::new(INTERNAL, "sensor board lock poisoned"))?
        .sequencer()
        .state();
    Ok(Outcome {
        console,
        final_state,
        simulated,
    })
}

fn drive_console(
    console: &mut ScriptedConsole,
    stream: &mut SerialStream,
    running: &AtomicBool,
    window: Duration,
    limit: Duration,
) -> CliResult<()> {
    let started = Instant::now();
    let mut next_poll = started;
    let mut chunk = [0u8; 64];

    while running.load(Ordering::SeqCst) && !console.is_done() && started.elapsed() < limit {
        let reply = match stream.read(&mut chunk) {
            Ok(0) => return Err(CliError::new(INTERNAL, "controller closed console link")),
            Ok(n) => console.on_bytes(started.elapsed(), &chunk[..n]),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                ) =>
            {
                Vec::new()
            }
            Err(err) => return Err(io_error("console read", err)),
        };
        stream
            .write_all(&reply)
            .map_err(|err| io_error("console write", err))?;

        if Instant::now() >= next_poll {
            next_poll += window;
            let out = console.poll(started.elapsed());
            stream
                .write_all(&out)
                .map_err(|err| io_error("console write", err))?;
        }
    }
    if !running.load(Ordering::SeqCst) {
        info!("interrupted");
    }
    Ok(())
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
