//! The STEM pipeline wired onto a [`RecomputationGraph`].
//!
//! Parameters are graph sources. The beam, sampling and grid are cheap and
//! derived synchronously; the probe, specimen phase and diffraction pattern
//! are expensive and recomputed in the background after edits settle.
//!
//! ```text
//! voltage ─► electron ─┬──────────────► probe ◄── aperture, aberrations
//!                      │                  │
//! max angle ─► sampling ─► extent ─► grid ┼──► object
//!                                  ▲      │      │
//! grid shape ──────────────────────┘      ▼      ▼
//!                                       pattern ◄── scan position
//! ```

use super::config::{
    ConfigError, SimulationParameters, check_aberrations, check_aperture, check_grid_shape,
    check_max_angle, check_scan_position, check_voltage,
};
use super::error::{EngineError, GraphError};
use super::graph::{Derived, Handle, RecomputationGraph, Snapshot, Source};
use crate::core::atoms::cell::UnitCell;
use crate::core::atoms::lattice::object_phase;
use crate::core::electron::Electron;
use crate::core::grid::{ReciprocalGrid, sampling_for_max_angle};
use crate::core::optics::aberration::Aberration;
use crate::core::optics::diffraction::diffraction_pattern;
use crate::core::optics::probe::{FormedProbe, ProbeIntensity, form_probe};
use crate::core::spectral::fftshift;
use ndarray::Array2;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{info, warn};

/// The expensive, background-computed stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probe,
    Object,
    Pattern,
}

/// Freshness of one output, as shown to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Fresh,
    Stale,
    Failed(String),
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Fresh => write!(f, "fresh"),
            NodeState::Stale => write!(f, "stale"),
            NodeState::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

fn state_of<T>(snapshot: &Snapshot<T>) -> NodeState {
    match snapshot {
        Snapshot::Pending => NodeState::Pending,
        Snapshot::Ready { stale: false, .. } => NodeState::Fresh,
        Snapshot::Ready { stale: true, .. } => NodeState::Stale,
        Snapshot::Failed { error, .. } => NodeState::Failed(error.to_string()),
    }
}

/// An interactive simulation session.
///
/// Must be created and driven inside a [`tokio::task::LocalSet`].
pub struct Simulation {
    graph: RecomputationGraph,

    voltage_kv: Source<f64>,
    max_angle_mrad: Source<f64>,
    grid_shape: Source<[usize; 2]>,
    aperture_mrad: Source<f64>,
    aberrations: Source<Vec<Aberration>>,
    scan_position: Source<[f64; 2]>,

    electron: Derived<Electron>,
    sampling: Derived<f64>,
    extent: Derived<[f64; 2]>,
    grid: Derived<ReciprocalGrid>,

    probe: Derived<FormedProbe>,
    object: Derived<Array2<f64>>,
    pattern: Derived<Array2<f64>>,

    probe_intensity: Derived<ProbeIntensity>,
    specimen_phase: Derived<Array2<f64>>,
}

impl Simulation {
    pub fn new(params: &SimulationParameters, cell: UnitCell) -> Result<Self, EngineError> {
        Self::with_graph(params, cell, RecomputationGraph::new())
    }

    pub fn with_debounce(
        params: &SimulationParameters,
        cell: UnitCell,
        debounce: Duration,
    ) -> Result<Self, EngineError> {
        Self::with_graph(params, cell, RecomputationGraph::with_debounce(debounce))
    }

    fn with_graph(
        params: &SimulationParameters,
        cell: UnitCell,
        graph: RecomputationGraph,
    ) -> Result<Self, EngineError> {
        params.validate()?;
        let cell = Rc::new(cell);

        let voltage_kv = graph.add_source("voltage_kv", params.voltage_kv);
        let max_angle_mrad = graph.add_source("max_angle_mrad", params.max_angle_mrad);
        let grid_shape = graph.add_source("grid_shape", params.grid_shape);
        let aperture_mrad = graph.add_source("aperture_mrad", params.aperture_mrad);
        let aberrations = graph.add_source("aberrations", params.aberrations.clone());
        let scan_position = graph.add_source("scan_position", params.scan_position);

        let electron = graph.add_sync("electron", &[voltage_kv.key()], move |inputs| {
            Ok(Electron::from_kilovolts(*inputs.get(&voltage_kv)?)?)
        })?;

        let sampling = graph.add_sync(
            "sampling",
            &[electron.key(), max_angle_mrad.key()],
            move |inputs| {
                let electron = inputs.get(&electron)?;
                Ok(sampling_for_max_angle(
                    electron.wavelength,
                    *inputs.get(&max_angle_mrad)?,
                )?)
            },
        )?;

        let extent = graph.add_sync(
            "extent",
            &[sampling.key(), grid_shape.key()],
            move |inputs| {
                let s = *inputs.get(&sampling)?;
                let [ny, nx] = *inputs.get(&grid_shape)?;
                Ok([s * ny as f64, s * nx as f64])
            },
        )?;

        let grid = graph.add_sync(
            "grid",
            &[extent.key(), grid_shape.key()],
            move |inputs| {
                Ok(ReciprocalGrid::new(
                    *inputs.get(&extent)?,
                    *inputs.get(&grid_shape)?,
                )?)
            },
        )?;

        let probe = graph.add_async(
            "probe",
            &[
                grid.key(),
                electron.key(),
                aperture_mrad.key(),
                aberrations.key(),
            ],
            move |inputs| {
                Ok(form_probe(
                    inputs.get(&grid)?,
                    inputs.get(&electron)?.wavelength,
                    *inputs.get(&aperture_mrad)?,
                    inputs.get(&aberrations)?,
                )?)
            },
        )?;

        let object = graph.add_async("object", &[grid.key(), electron.key()], move |inputs| {
            Ok(object_phase(
                inputs.get(&grid)?,
                inputs.get(&electron)?,
                &cell,
            )?)
        })?;

        let pattern = graph.add_async(
            "pattern",
            &[grid.key(), probe.key(), object.key(), scan_position.key()],
            move |inputs| {
                Ok(diffraction_pattern(
                    inputs.get(&grid)?,
                    inputs.get(&probe)?,
                    inputs.get(&object)?,
                    *inputs.get(&scan_position)?,
                )?)
            },
        )?;

        let probe_intensity = graph.add_sync("probe_intensity", &[probe.key()], move |inputs| {
            Ok(inputs.get(&probe)?.intensity())
        })?;

        let specimen_phase = graph.add_sync("specimen_phase", &[object.key()], move |inputs| {
            Ok(fftshift(inputs.get(&object)?))
        })?;

        info!(
            voltage_kv = params.voltage_kv,
            grid = ?params.grid_shape,
            debounce_ms = graph.debounce().as_millis() as u64,
            "Simulation session created."
        );

        Ok(Self {
            graph,
            voltage_kv,
            max_angle_mrad,
            grid_shape,
            aperture_mrad,
            aberrations,
            scan_position,
            electron,
            sampling,
            extent,
            grid,
            probe,
            object,
            pattern,
            probe_intensity,
            specimen_phase,
        })
    }

    fn write<T: 'static>(
        &self,
        source: &Source<T>,
        checked: Result<T, ConfigError>,
    ) -> Result<(), EngineError> {
        let value = checked.inspect_err(|e| {
            warn!(error = %e, "Ignoring invalid parameter; keeping the previous value.");
        })?;
        self.graph.set(source, value)?;
        Ok(())
    }

    pub fn set_voltage(&self, kv: f64) -> Result<(), EngineError> {
        self.write(&self.voltage_kv, check_voltage(kv))
    }

    pub fn set_max_angle(&self, mrad: f64) -> Result<(), EngineError> {
        self.write(&self.max_angle_mrad, check_max_angle(mrad))
    }

    pub fn set_grid_shape(&self, shape: [usize; 2]) -> Result<(), EngineError> {
        self.write(&self.grid_shape, check_grid_shape(shape))
    }

    pub fn set_aperture(&self, mrad: f64) -> Result<(), EngineError> {
        self.write(&self.aperture_mrad, check_aperture(mrad))
    }

    /// Replaces the whole aberration list.
    pub fn set_aberrations(&self, aberrations: Vec<Aberration>) -> Result<(), EngineError> {
        let checked = check_aberrations(&aberrations).map(|()| aberrations);
        self.write(&self.aberrations, checked)
    }

    pub fn set_scan_position(&self, position: [f64; 2]) -> Result<(), EngineError> {
        self.write(&self.scan_position, check_scan_position(position))
    }

    /// Writes every parameter at once. Nothing is written unless all of them
    /// are valid.
    pub fn apply(&self, params: &SimulationParameters) -> Result<(), EngineError> {
        params.validate().inspect_err(|e| {
            warn!(error = %e, "Ignoring invalid parameter set; keeping the previous values.");
        })?;
        self.graph.set(&self.voltage_kv, params.voltage_kv)?;
        self.graph.set(&self.max_angle_mrad, params.max_angle_mrad)?;
        self.graph.set(&self.grid_shape, params.grid_shape)?;
        self.graph.set(&self.aperture_mrad, params.aperture_mrad)?;
        self.graph.set(&self.aberrations, params.aberrations.clone())?;
        self.graph.set(&self.scan_position, params.scan_position)?;
        Ok(())
    }

    /// The parameters currently held by the sources.
    pub fn parameters(&self) -> Result<SimulationParameters, EngineError> {
        Ok(SimulationParameters {
            voltage_kv: *self.current(&self.voltage_kv)?,
            max_angle_mrad: *self.current(&self.max_angle_mrad)?,
            grid_shape: *self.current(&self.grid_shape)?,
            aperture_mrad: *self.current(&self.aperture_mrad)?,
            aberrations: (*self.current(&self.aberrations)?).clone(),
            scan_position: *self.current(&self.scan_position)?,
        })
    }

    fn current<T: 'static>(&self, source: &Source<T>) -> Result<Rc<T>, GraphError> {
        self.graph
            .get(source)?
            .value()
            .cloned()
            .ok_or(GraphError::UnknownNode)
    }

    pub fn electron(&self) -> Result<Snapshot<Electron>, GraphError> {
        self.graph.get(&self.electron)
    }

    /// Real-space pixel size (Å).
    pub fn sampling(&self) -> Result<Snapshot<f64>, GraphError> {
        self.graph.get(&self.sampling)
    }

    /// Field of view `(y, x)` in Å.
    pub fn extent(&self) -> Result<Snapshot<[f64; 2]>, GraphError> {
        self.graph.get(&self.extent)
    }

    pub fn grid(&self) -> Result<Snapshot<ReciprocalGrid>, GraphError> {
        self.graph.get(&self.grid)
    }

    pub fn probe(&self) -> Result<Snapshot<FormedProbe>, GraphError> {
        self.graph.get(&self.probe)
    }

    /// Specimen phase in FFT order, as consumed by the diffraction stage.
    pub fn object(&self) -> Result<Snapshot<Array2<f64>>, GraphError> {
        self.graph.get(&self.object)
    }

    pub fn pattern(&self) -> Result<Snapshot<Array2<f64>>, GraphError> {
        self.graph.get(&self.pattern)
    }

    pub fn probe_intensity(&self) -> Result<Snapshot<ProbeIntensity>, GraphError> {
        self.graph.get(&self.probe_intensity)
    }

    /// Specimen phase centred for display.
    pub fn specimen_phase(&self) -> Result<Snapshot<Array2<f64>>, GraphError> {
        self.graph.get(&self.specimen_phase)
    }

    /// State of every user-facing output, in pipeline order.
    pub fn status(&self) -> Result<Vec<(&'static str, NodeState)>, GraphError> {
        Ok(vec![
            ("probe", state_of(&self.probe()?)),
            ("object", state_of(&self.object()?)),
            ("pattern", state_of(&self.pattern()?)),
            ("probe_intensity", state_of(&self.probe_intensity()?)),
            ("specimen_phase", state_of(&self.specimen_phase()?)),
        ])
    }

    /// Number of completed recomputations of a background stage.
    pub fn recomputations(&self, stage: Stage) -> u64 {
        let key = match stage {
            Stage::Probe => self.probe.key(),
            Stage::Object => self.object.key(),
            Stage::Pattern => self.pattern.key(),
        };
        self.graph.computations(key)
    }

    pub fn is_settled(&self) -> bool {
        !self.graph.has_pending()
    }

    /// Waits for every background stage to catch up with the parameters.
    pub async fn settle(&self) {
        self.graph.settle().await
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("settled", &self.is_settled())
            .finish_non_exhaustive()
    }
}

/// Parameters for a quick session: the application defaults on a small grid.
pub fn preview_parameters(grid_size: usize) -> SimulationParameters {
    SimulationParameters {
        grid_shape: [grid_size, grid_size],
        ..SimulationParameters::default()
    }
}
