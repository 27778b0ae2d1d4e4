//! Invocation wiring for the scale-up and scale-down entry points.
//!
//! Lenient by default: whatever happens, the process exits cleanly and the
//! outcome lives in the logs. Strict mode turns faults into a failed exit.

use std::io::Read;
use std::path::Path;

use anyhow::Context as _;
use tracing::{error, info, warn};

use docscale_autoscale::{Autoscaler, Invocation, Procedure, TriggerEvent, handler};
use docscale_core::ScalerConfig;
use docscale_state::StateStore;

/// Everything an invocation needs, loaded once at start-up.
pub struct Context {
    pub config: ScalerConfig,
    pub store: StateStore,
    strict: bool,
}

/// Load the context and run one procedure. A context that cannot be
/// loaded is reported like any other fault.
pub async fn run(
    procedure: Procedure,
    config_path: Option<&Path>,
    data_dir: &Path,
    strict: bool,
    event: Option<&Path>,
) -> anyhow::Result<()> {
    let ctx = match Context::load(config_path, data_dir, strict) {
        Ok(ctx) => ctx,
        Err(e) if strict => return Err(e),
        Err(e) => {
            let error = format!("{e:#}");
            error!(%procedure, %error, "invocation could not start");
            return Ok(());
        }
    };
    match procedure {
        Procedure::ScaleUp => ctx.scale_up(event).await,
        Procedure::ScaleDown => ctx.scale_down(event).await,
    }
}

impl Context {
    pub fn load(config_path: Option<&Path>, data_dir: &Path, strict: bool) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => ScalerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ScalerConfig::from_env().context("loading configuration from environment")?,
        };
        info!(
            cluster = %config.cluster_identifier,
            min = config.min_capacity,
            max = config.max_capacity,
            alarm = %config.scaleup_alarm_name,
            metric = %config.metric_name,
            statistic = %config.statistic,
            period = config.period,
            target = config.target,
            scaledown_target = config.scaledown_target,
            cooldown = config.cooldown,
            dispatch = ?config.dispatch.policy,
            "configuration loaded"
        );

        let store = open_store(data_dir)?;
        let strict = strict || config.strict;
        Ok(Self {
            config,
            store,
            strict,
        })
    }

    pub async fn scale_up(&self, event: Option<&Path>) -> anyhow::Result<()> {
        let event = self.event(event)?;
        let scaler = Autoscaler::new(&self.config, &self.store, &self.store, &self.store);
        let invocation = handler::scale_up(&scaler, &event).await;
        self.finish(invocation)
    }

    pub async fn scale_down(&self, event: Option<&Path>) -> anyhow::Result<()> {
        let event = self.event(event)?;
        let scaler = Autoscaler::new(&self.config, &self.store, &self.store, &self.store);
        let invocation = handler::scale_down(&scaler, &event).await;
        self.finish(invocation)
    }

    /// An unusable event counts as one without an alarm name unless strict.
    fn event(&self, path: Option<&Path>) -> anyhow::Result<TriggerEvent> {
        match read_event(path) {
            Ok(event) => Ok(event),
            Err(e) if self.strict => Err(e),
            Err(e) => {
                let error = format!("{e:#}");
                warn!(%error, "trigger event unusable, continuing without an alarm name");
                Ok(TriggerEvent::default())
            }
        }
    }

    fn finish(&self, invocation: Invocation) -> anyhow::Result<()> {
        if self.strict && invocation.is_fault() {
            if let Err(e) = invocation.result {
                return Err(anyhow::Error::new(e)
                    .context(format!("{} invocation failed", invocation.procedure)));
            }
        }
        Ok(())
    }
}

pub fn open_store(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    let db_path = data_dir.join("docscale.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(store)
}

/// Read a trigger event from a file, from stdin ("-"), or default to a
/// manual invocation with no alarm.
fn read_event(path: Option<&Path>) -> anyhow::Result<TriggerEvent> {
    let raw = match path {
        None => return Ok(TriggerEvent::default()),
        Some(p) if p.as_os_str() == "-" => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("reading event {}", p.display()))?,
    };
    let event = TriggerEvent::from_json(&raw).context("parsing trigger event")?;
    info!(alarm = ?event.alarm_name, "trigger event read");
    Ok(event)
}
