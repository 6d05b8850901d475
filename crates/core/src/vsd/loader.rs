//! Frame-by-frame VSD projection driver

use super::params::VsdParams;
use super::weighting::{
    accumulate_frame, compute_links, DepthAttenuation, SignalTransform, WeightedLink,
};
use crate::attenuation::AttenuationCurve;
use crate::core_types::time::effective_dt;
use crate::core_types::{Aabb, Timeline, Vec3};
use crate::error::{EmsimError, Result};
use crate::geometry::load_compartment_geometry;
use crate::grid::Volume;
use crate::provider::{CircuitProvider, Gid, GidSet, ReportProvider};
use tracing::{debug, info};

/// Soma of one cell and the voxel containing it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SomaPixel {
    /// Cell id
    pub gid: Gid,
    /// Soma position
    pub position: Vec3,
    /// `floor((position - origin) / voxel_size)`, unbounded
    pub voxel: [i64; 3],
}

/// Projects voltage frames into a sensor volume
///
/// All geometry is resolved at construction. Each call to
/// [`VsdLoader::load_next_frame`] only reads one report frame and scatters it
/// through the precomputed links.
pub struct VsdLoader {
    voltage: Box<dyn ReportProvider>,
    gids: GidSet,
    soma_positions: Vec<Vec3>,
    circuit_bounds: Aabb,
    volume: Volume,
    links: Vec<WeightedLink>,
    transform: SignalTransform,
    timeline: Timeline,
    current_frame: usize,
}

impl VsdLoader {
    /// Select cells, load their geometry and precompute voxel links
    ///
    /// The sensor volume is a square of side `sensor_dim` centered on the
    /// circuit in x and z, spans the circuit bounds in y, and uses cubic
    /// voxels of `sensor_dim / sensor_res`.
    ///
    /// # Arguments
    /// * `params` - Run configuration
    /// * `circuit` - Source of ids, morphologies and soma positions
    /// * `voltage` - Membrane voltage report, read once per frame
    /// * `area` - Compartment area report, read once
    ///
    /// # Errors
    /// Fails on invalid parameters, an invalid time range, mismatched report
    /// sizes or any provider failure.
    pub fn new(
        params: &VsdParams,
        circuit: &dyn CircuitProvider,
        mut voltage: Box<dyn ReportProvider>,
        area: &mut dyn ReportProvider,
    ) -> Result<Self> {
        if params.sensor_res == 0 {
            return Err(EmsimError::InvalidParameter(
                "sensor resolution must be positive".to_string(),
            ));
        }

        let gids = circuit.select_gids(&params.target, params.fraction)?;
        if gids.is_empty() {
            return Err(EmsimError::InvalidParameter(format!(
                "target '{}' selects no cells",
                params.target
            )));
        }
        info!("Selected {} cells", gids.len());

        let report_dt = voltage.timestep();
        let dt = effective_dt(params.time_step.unwrap_or(report_dt), report_dt);
        info!("TimeStep rounded to a multiple of the report time step: {}", dt);
        let timeline =
            Timeline::resolve(params.time_range, voltage.start_time(), voltage.end_time(), dt)?;

        voltage.update_mapping(&gids)?;
        area.update_mapping(&gids)?;
        if voltage.frame_size() != area.frame_size() {
            return Err(EmsimError::ReportSizeMismatch {
                voltage: voltage.frame_size(),
                area: area.frame_size(),
            });
        }
        let areas = area.load_frame(area.start_time())?;

        let geometry =
            load_compartment_geometry(circuit, voltage.as_mut(), &gids, params.cells_per_batch)?;
        let circuit_bounds = geometry.bounds;

        let center = circuit_bounds.center();
        let half = params.sensor_dim / 2.0;
        let sensor_bounds = Aabb::from_corners(
            Vec3::new(center.x - half, circuit_bounds.min.y, center.z - half),
            Vec3::new(center.x + half, circuit_bounds.max.y, center.z + half),
        );
        let volume = Volume::new(
            Vec3::repeat(params.voxel_size()),
            Vec3::zeros(),
            &sensor_bounds,
        )?;
        info!("Volume AABB: {}", sensor_bounds);

        let curve = AttenuationCurve::load(params.curve_file.as_deref(), params.depth);
        let weighting = DepthAttenuation {
            areas: &areas,
            sigma: params.sigma,
            depth: params.depth,
            curve: &curve,
            interpolate: params.interpolate_attenuation,
        };
        let links = compute_links(&geometry.positions, &volume, &weighting);
        let dropped = links.iter().filter(|link| link.is_dropped()).count();
        debug!("{} of {} compartments fall outside the volume", dropped, links.len());

        let soma_positions = circuit.positions(&gids)?;

        Ok(Self {
            voltage,
            gids,
            soma_positions,
            circuit_bounds,
            volume,
            links,
            transform: SignalTransform {
                ap_threshold: params.ap_threshold,
                v0: params.v0,
                g0: params.g0,
            },
            timeline,
            current_frame: 0,
        })
    }

    /// Clear the volume and accumulate the next voltage frame into it
    ///
    /// # Errors
    /// Fails once every frame has been projected, or if the report fails or
    /// returns a frame of the wrong size.
    pub fn load_next_frame(&mut self) -> Result<&Volume> {
        if self.current_frame >= self.timeline.frames_count() {
            return Err(EmsimError::InvalidParameter(format!(
                "all {} frames are already projected",
                self.timeline.frames_count()
            )));
        }
        let time = self.timeline.time_of(self.current_frame);
        let values = self.voltage.load_frame(time)?;
        if values.len() != self.links.len() {
            return Err(EmsimError::Provider(format!(
                "frame at {time} holds {} values, expected {}",
                values.len(),
                self.links.len()
            )));
        }

        self.volume.clear(0.0);
        accumulate_frame(&mut self.volume, &self.links, &values, &self.transform);
        info!("Frame: {} done", time);
        self.current_frame += 1;
        Ok(&self.volume)
    }

    /// Soma voxel of every loaded cell, in ascending id order
    pub fn soma_pixels(&self) -> Vec<SomaPixel> {
        self.gids
            .iter()
            .zip(&self.soma_positions)
            .map(|(&gid, position)| SomaPixel {
                gid,
                position: *position,
                voxel: self.volume.voxel_coordinates(position),
            })
            .collect()
    }

    /// Sensor volume holding the most recent frame
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Static links, one per compartment slot
    pub fn links(&self) -> &[WeightedLink] {
        &self.links
    }

    /// Bounds of the loaded compartments
    pub fn circuit_bounds(&self) -> &Aabb {
        &self.circuit_bounds
    }

    /// Resolved time axis
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Number of frames in the time range
    pub fn frames_count(&self) -> usize {
        self.timeline.frames_count()
    }

    /// Number of frames projected so far
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Frame interval (ms)
    pub fn dt(&self) -> f32 {
        self.timeline.dt()
    }

    /// Unit of the voltage report
    pub fn data_unit(&self) -> &str {
        self.voltage.data_unit()
    }

    /// Loaded cell ids
    pub fn gids(&self) -> &GidSet {
        &self.gids
    }
}
