//! File writers for volumes, images, probe tables and soma pixels
//!
//! Every output name is derived from a base path by appending a suffix, e.g.
//! `out/run` + `_volume_floats_1.5.raw`. Raw files hold native-endian `f32`
//! in the in-memory layout of the grid.

use crate::core_types::{time_suffix, Timeline};
use crate::error::{EmsimError, Result};
use crate::field::SamplePoints;
use crate::grid::{Image, Volume};
use crate::vsd::SomaPixel;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the exported data came from, written into every text header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    /// Scene file the circuit and reports were read from
    pub scene: String,
    /// Cell target
    pub target: String,
    /// Report name
    pub report: String,
}

/// `base` with `suffix` appended to its final component
pub fn output_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Units of the exported field: currents (A) produce potentials (V)
pub fn field_unit(data_unit: &str) -> String {
    data_unit.replace('A', "V")
}

fn write_file(
    path: &Path,
    body: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<()> {
    let file = File::create(path).map_err(|e| EmsimError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    body(&mut writer)
        .and_then(|()| writer.flush())
        .map_err(|e| EmsimError::io(path, e))
}

fn write_header(
    out: &mut impl Write,
    provenance: &Provenance,
    time: f32,
    unit: &str,
) -> std::io::Result<()> {
    writeln!(out, "# File generated by EMSim tool:")?;
    writeln!(out, "# - Scene: {}", provenance.scene)?;
    writeln!(out, "# - Target: {}", provenance.target)?;
    writeln!(out, "# - Report: {}", provenance.report)?;
    writeln!(out, "# - Time step: {time}")?;
    writeln!(out, "# - Units: {unit}")
}

/// Write `<base>_volume_floats_<t>.raw` and `<base>_volume_info_<t>.txt`
///
/// # Errors
/// Returns [`EmsimError::Io`] naming the file that could not be written.
pub fn write_volume(
    base: &Path,
    time: f32,
    volume: &Volume,
    data_unit: &str,
    provenance: &Provenance,
) -> Result<(PathBuf, PathBuf)> {
    let suffix = time_suffix(time);
    let raw = output_path(base, &format!("_volume_floats_{suffix}.raw"));
    write_file(&raw, |out| out.write_all(volume.as_bytes()))?;

    let info_path = output_path(base, &format!("_volume_info_{suffix}.txt"));
    let size = volume.size();
    let microns = volume.extent_in_microns();
    write_file(&info_path, |out| {
        write_header(out, provenance, time, &field_unit(data_unit))?;
        writeln!(out, "# - SizeInVoxels: {} {} {}", size.x, size.y, size.z)?;
        writeln!(out, "# - SizeInMicrons: {} {} {}", microns.x, microns.y, microns.z)?;
        writeln!(out, "#")
    })?;

    info!("Volume for timestep {} written to disk", suffix);
    Ok((raw, info_path))
}

/// Write a MetaImage header `<base>_volume_<t>.mhd` and its `.raw` payload
///
/// # Errors
/// Returns [`EmsimError::Io`] naming the file that could not be written.
pub fn write_meta_image(base: &Path, time: f32, volume: &Volume) -> Result<PathBuf> {
    let suffix = time_suffix(time);
    let raw = output_path(base, &format!("_volume_{suffix}.raw"));
    write_file(&raw, |out| out.write_all(volume.as_bytes()))?;

    let raw_name = raw
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let header = output_path(base, &format!("_volume_{suffix}.mhd"));
    let (size, spacing, origin) = (volume.size(), volume.voxel_size(), volume.origin());
    let byte_order_msb = if cfg!(target_endian = "big") { "True" } else { "False" };
    write_file(&header, |out| {
        writeln!(out, "ObjectType = Image")?;
        writeln!(out, "NDims = 3")?;
        writeln!(out, "BinaryData = True")?;
        writeln!(out, "BinaryDataByteOrderMSB = {byte_order_msb}")?;
        writeln!(out, "DimSize = {} {} {}", size.x, size.y, size.z)?;
        writeln!(out, "ElementSpacing = {} {} {}", spacing.x, spacing.y, spacing.z)?;
        writeln!(out, "Offset = {} {} {}", origin.x, origin.y, origin.z)?;
        writeln!(out, "ElementType = MET_FLOAT")?;
        writeln!(out, "ElementDataFile = {raw_name}")
    })?;

    info!("Volume written as {}", header.display());
    Ok(header)
}

/// Write `<base>_image_floats_<t>.raw` and `<base>_image_info_<t>.txt`
///
/// # Errors
/// Returns [`EmsimError::Io`] naming the file that could not be written.
pub fn write_image(
    base: &Path,
    time: f32,
    image: &Image,
    data_unit: &str,
    provenance: &Provenance,
) -> Result<(PathBuf, PathBuf)> {
    let suffix = time_suffix(time);
    let raw = output_path(base, &format!("_image_floats_{suffix}.raw"));
    write_file(&raw, |out| out.write_all(image.as_bytes()))?;

    let info_path = output_path(base, &format!("_image_info_{suffix}.txt"));
    let microns = image.size_in_microns();
    write_file(&info_path, |out| {
        write_header(out, provenance, time, data_unit)?;
        writeln!(out, "# - SizeInPixels: {} {}", image.width, image.height)?;
        writeln!(out, "# - PixelSpacing: {} {}", image.spacing.0, image.spacing.1)?;
        writeln!(out, "# - SizeInMicrons: {} {}", microns.0, microns.1)?;
        writeln!(out, "#")
    })?;

    info!("Image for timestep {} written to disk", suffix);
    Ok((raw, info_path))
}

/// Write the probe table to `<base>_sample_points.txt`
///
/// One row per computed frame: the frame time followed by one value (µV)
/// per probe.
///
/// # Errors
/// Returns [`EmsimError::Io`] if the file cannot be written.
pub fn write_sample_points(
    base: &Path,
    samples: &SamplePoints,
    timeline: &Timeline,
    provenance: &Provenance,
) -> Result<PathBuf> {
    let path = output_path(base, "_sample_points.txt");
    write_file(&path, |out| {
        writeln!(out, "# File generated by EMSim tool:")?;
        writeln!(out, "# - Scene: {}", provenance.scene)?;
        writeln!(out, "# - Target: {}", provenance.target)?;
        writeln!(out, "# - Report: {}", provenance.report)?;
        writeln!(
            out,
            "# - Time range: [{} {}] with DT: {}",
            timeline.start(),
            timeline.end(),
            timeline.dt()
        )?;
        writeln!(out, "# - Units: µV")?;
        for (i, position) in samples.positions().iter().enumerate() {
            writeln!(out, "# - Point {i}: {} {} {}", position.x, position.y, position.z)?;
        }
        writeln!(out, "#")?;

        for frame in 0..samples.computed_frames() {
            write!(out, "{}", timeline.time_of(frame))?;
            for probe in 0..samples.positions().len() {
                write!(out, " {}", samples.value(frame, probe))?;
            }
            writeln!(out)?;
        }
        Ok(())
    })?;

    info!("Sample points written as {}", path.display());
    Ok(path)
}

/// Write `<base>_soma_pixels.txt`
///
/// # Errors
/// Returns [`EmsimError::Io`] if the file cannot be written.
pub fn write_soma_pixels(base: &Path, pixels: &[SomaPixel]) -> Result<PathBuf> {
    let path = output_path(base, "_soma_pixels.txt");
    write_file(&path, |out| {
        writeln!(
            out,
            "# Soma position and corresponding pixel index for each cell, in the following format:"
        )?;
        writeln!(out, "#     gid [ posX posY posZ ]: i j k")?;
        writeln!(out)?;
        for pixel in pixels {
            let [i, j, k] = pixel.voxel;
            writeln!(
                out,
                "{} [ {} {} {} ]: {} {} {}",
                pixel.gid, pixel.position.x, pixel.position.y, pixel.position.z, i, j, k
            )?;
        }
        Ok(())
    })?;

    info!("Soma positions written as {}", path.display());
    Ok(path)
}
