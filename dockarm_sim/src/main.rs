mod arm;
mod cli;
mod policy;

use anyhow::{bail, Context, Result};
use cli::{Cli, Mode};
use dockarm_core::prelude::*;
use dockarm_core::telemetry::PoseRecord;
use nalgebra::{Isometry3, Point3, Vector3};
use policy::{PolicyWorker, ScriptedPolicy};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{debug, info, warn};

/// Where the standoff pose sits relative to the initial TCP, before jitter
const STANDOFF_OFFSET: [f64; 3] = [0.04, 0.0, 0.03];

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting dockarm-sim");
    info!("Mode: {:?}", cli.mode);

    run(&cli)
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SessionConfig::find_and_load()?.unwrap_or_default(),
    };

    config.targeting = match cli.mode {
        Mode::Scripted => TargetingMode::Scripted,
        Mode::Standoff | Mode::Policy => TargetingMode::Standoff,
    };
    Ok(config)
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let action_scale = config.policy.action_scale;

    let mut graph = TransformGraph::new("world");
    let scene = arm::build(&mut graph)?;

    let mut chain = KinematicChain::default();
    if let Some(path) = &cli.limits {
        let store = FileLimitStore::open(path)
            .with_context(|| format!("failed to open joint limits at {}", path.display()))?;
        chain = chain.with_limit_store(Box::new(store));
    }
    chain.set_end_effector(Some(scene.plug));

    let mut session = Session::with_chain(config, chain);
    let resolved = session.attach(&mut graph, scene.base);
    if resolved == 0 {
        bail!("no joints resolved under the arm base");
    }

    let socket = place_socket(cli, &mut graph, &scene, &session)?;
    info!(
        "Socket at [{:.3}, {:.3}, {:.3}]",
        socket.translation.x, socket.translation.y, socket.translation.z
    );

    let worker = match cli.mode {
        Mode::Policy => Some(PolicyWorker::spawn(ScriptedPolicy::new(action_scale))?),
        Mode::Standoff | Mode::Scripted => None,
    };

    let mut telemetry_out = match &cli.telemetry {
        Some(path) => Some(BufWriter::new(File::create(path).with_context(|| {
            format!("failed to create telemetry file {}", path.display())
        })?)),
        None => None,
    };

    let mut last = session.telemetry(&graph, Some(&socket));
    for _ in 0..cli.ticks {
        let action = match (&worker, session.policy_phase()) {
            (Some(worker), PolicyPhase::Rl) => {
                let tcp = session
                    .chain()
                    .end_effector_pose(&graph)
                    .context("end effector has no pose")?;
                let observation = PolicyPhaseMachine::observation(&relative_pose(&tcp, &socket));
                Some(worker.query(observation)?)
            }
            _ => None,
        };

        let mut input = TickInput::with_socket(socket);
        if let Some(action) = &action {
            input = input.action(action);
        }
        let report = session.tick(&mut graph, input);

        if let Some((from, to)) = report.task_transition {
            info!("Tick {}: task {} -> {}", report.telemetry.tick, from, to);
        }
        if let Some((from, to)) = report.policy_transition {
            info!("Tick {}: policy {} -> {}", report.telemetry.tick, from, to);
        }
        if let Some(ik) = &report.ik {
            debug!(
                "Tick {}: ik pos_err={:.5} ori_err={:.5}",
                report.telemetry.tick, ik.position_error, ik.orientation_error
            );
        }

        if let Some(out) = telemetry_out.as_mut() {
            writeln!(out, "{}", report.telemetry.to_json_line()?)?;
        }

        last = report.telemetry;
        if is_finished(cli.mode, &session, &last) {
            break;
        }
    }

    if let Some(mut out) = telemetry_out {
        out.flush()?;
    }

    summarize(cli.mode, &session, &last);
    Ok(())
}

/// Put the charger where the standoff pose is a short reach from the TCP
fn place_socket(
    cli: &Cli,
    graph: &mut TransformGraph,
    scene: &arm::ArmScene,
    session: &Session,
) -> Result<Isometry3<f64>> {
    let tcp = session
        .chain()
        .end_effector_pose(&*graph)
        .context("end effector has no pose")?;

    let mut offset = Vector3::from(STANDOFF_OFFSET);
    let jitter = cli.socket_jitter;
    if jitter.is_finite() && jitter > 0.0 {
        let mut rng = StdRng::seed_from_u64(cli.seed);
        for axis in offset.iter_mut() {
            *axis += rng.gen_range(-jitter..=jitter);
        }
        debug!("Standoff offset with jitter: {:?}", offset);
    }

    let approach = session.config().approach;
    let socket = arm::socket_for_standoff(
        &tcp,
        &Isometry3::translation(offset.x, offset.y, offset.z),
        &approach.rotation(),
        approach.standoff,
    );
    arm::place_charger(graph, scene, &socket)?;

    graph
        .world_pose(scene.port)
        .context("port frame has no pose")
}

/// Scripted runs end once the TCP has settled on the backed-off insertion
/// point (or the task machine reports done); policy runs end on DONE.
fn is_finished(mode: Mode, session: &Session, last: &Telemetry) -> bool {
    match mode {
        Mode::Standoff => false,
        Mode::Scripted => {
            session.task_phase().is_done()
                || insertion_settled(
                    session.task_phase(),
                    last.tcp.as_ref(),
                    session.config().task.done_distance,
                )
        }
        Mode::Policy => session.policy_phase() == PolicyPhase::Done,
    }
}

/// True in the insert phase once the TCP is within `tolerance` of the
/// insertion point
fn insertion_settled(phase: TaskPhase, tcp: Option<&PoseRecord>, tolerance: f64) -> bool {
    let (TaskPhase::Insert { insertion_point }, Some(tcp)) = (phase, tcp) else {
        return false;
    };
    let p = Point3::new(tcp.position.x, tcp.position.y, tcp.position.z);
    (p - insertion_point).norm() < tolerance
}

fn summarize(mode: Mode, session: &Session, last: &Telemetry) {
    let distance = last
        .relative
        .as_ref()
        .map(|rel| Vector3::new(rel.position.x, rel.position.y, rel.position.z).norm());

    info!(
        "Finished after {} ticks: task={} policy={} distance={}",
        session.tick_count(),
        session.task_phase(),
        session.policy_phase(),
        distance.map_or_else(|| "n/a".to_string(), |d| format!("{:.4}", d))
    );
    debug!("Final joints (Motor1..Motor7): {:?}", last.joint_vector());

    if is_finished(mode, session, last) {
        info!("Docked");
    } else if mode != Mode::Standoff {
        warn!("Not docked within the tick budget");
    }
}
