mod config;
mod options;

use anyhow::{bail, Context, Error as AnyError};
use clap::Parser;
use geogrid::{GeoRect, ReadMode};
use geotiles::{
    sample_line,
    sources::{AdrgSource, DtedSource, FloatGridSource, LandUseSource, ZoneSource},
    Format, Layer, Layers, TileManager, TileService, TileSource,
};
use log::info;
use options::{Cli, Command as CliCmd, LatLon, SourceArg};
use serde::Serialize;
use std::{collections::BTreeMap, io::Write, path::Path, sync::Arc};

fn main() -> Result<(), AnyError> {
    env_logger::init();
    let cli = Cli::parse();
    config::check_unknown(std::env::vars().map(|(name, _)| name))?;

    let mode = if cli.mmap {
        ReadMode::MemMap
    } else {
        ReadMode::InMem
    };
    let layers = Layers::new();
    for (layer, args) in cli.sources() {
        if let Some(service) = build_service(layer, args, mode)? {
            layers.register(layer, service);
        }
    }
    if !Layer::ALL.iter().any(|&layer| layers.contains(layer)) {
        bail!("no layer sources given");
    }

    match cli.cmd {
        CliCmd::Point { at } => point(&layers, at, cli.json),
        CliCmd::Line {
            start,
            dest,
            points,
        } => line(&layers, start, dest, points, cli.json),
    }
}

/// Builds one manager holding every source of `layer`.
fn build_service(
    layer: Layer,
    args: &[SourceArg],
    mode: ReadMode,
) -> Result<Option<Arc<dyn TileService>>, AnyError> {
    let Some(first) = args.first() else {
        return Ok(None);
    };
    if let Some(other) = args.iter().find(|arg| arg.format != first.format) {
        bail!(
            "{layer} sources mix {} and {} formats",
            first.format,
            other.format
        );
    }

    let service = match first.format {
        Format::Dted => {
            let mut source = DtedSource::new();
            source.set_read_mode(mode);
            source.set_validate_checksum(config::dted_checksum(config::env)?);
            for arg in args {
                let level = arg.level.unwrap_or(1);
                source
                    .add_directory(&arg.path, level)
                    .with_context(|| format!("{layer} source {}", arg.path.display()))?;
            }
            manage(source)?
        }
        Format::Adrg => {
            let mut source = AdrgSource::new();
            source.set_read_mode(mode);
            add_paths(layer, args, |path| {
                if path.is_dir() {
                    source.add_directory(path).map(drop)
                } else {
                    source.add_file(path)
                }
            })?;
            manage(source)?
        }
        Format::FloatGrid => {
            let mut source = FloatGridSource::new();
            source.set_read_mode(mode);
            add_paths(layer, args, |path| {
                if path.is_dir() {
                    source.add_directory(path, GeoRect::world()).map(drop)
                } else {
                    source.add_file(path)
                }
            })?;
            manage(source)?
        }
        Format::LandUse => {
            let mut source = LandUseSource::new();
            source.set_read_mode(mode);
            add_paths(layer, args, |path| {
                if path.is_dir() {
                    source.add_directory(path, GeoRect::world()).map(drop)
                } else {
                    source.add_file(path)
                }
            })?;
            manage(source)?
        }
        Format::GeoTiff | Format::Bathymetry => {
            let mut source = if first.format == Format::GeoTiff {
                ZoneSource::geotiff()
            } else {
                ZoneSource::bathymetry()
            };
            source.set_read_mode(mode);
            add_paths(layer, args, |path| {
                if path.is_dir() {
                    source.add_directory(path).map(drop)
                } else {
                    source.add_file(path)
                }
            })?;
            manage(source)?
        }
    };
    info!("{layer} layer served by {} {} source(s)", args.len(), first.format);
    Ok(Some(service))
}

fn add_paths(
    layer: Layer,
    args: &[SourceArg],
    mut add: impl FnMut(&Path) -> Result<(), geotiles::TileError>,
) -> Result<(), AnyError> {
    for arg in args {
        add(&arg.path).with_context(|| format!("{layer} source {}", arg.path.display()))?;
    }
    Ok(())
}

fn manage<S: TileSource + 'static>(source: S) -> Result<Arc<dyn TileService>, AnyError> {
    let policy = config::cache_policy(source.format(), config::env)?;
    Ok(Arc::new(TileManager::with_policy(source, policy)))
}

/// Values of every registered layer, keyed by layer name.
fn sample_all(layers: &Layers, lat: f64, lon: f64) -> BTreeMap<String, f64> {
    Layer::ALL
        .iter()
        .filter(|&&layer| layers.contains(layer))
        .map(|&layer| (layer.to_string(), layers.interp(layer, lat, lon)))
        .collect()
}

#[derive(Serialize)]
struct JsonEntry {
    location: [f64; 2],
    values: BTreeMap<String, f64>,
}

fn point(layers: &Layers, at: LatLon, json: bool) -> Result<(), AnyError> {
    let LatLon(coord) = at;
    let values = sample_all(layers, coord.y, coord.x);
    let mut stdout = std::io::stdout().lock();
    if json {
        let entry = JsonEntry {
            location: [coord.x, coord.y],
            values,
        };
        writeln!(stdout, "{}", serde_json::to_string(&entry)?)?;
    } else {
        for (layer, value) in values {
            writeln!(stdout, "{layer}: {value}")?;
        }
    }
    Ok(())
}

fn line(
    layers: &Layers,
    start: LatLon,
    dest: LatLon,
    points: usize,
    json: bool,
) -> Result<(), AnyError> {
    let mut columns: Vec<(Layer, Vec<f64>)> = Vec::new();
    let mut great_circle = Vec::new();
    let mut distance = 0.0;
    for layer in Layer::ALL {
        let Some(service) = layers.get(layer) else {
            continue;
        };
        let profile = sample_line(service.as_ref(), start.0, dest.0, points);
        info!(
            "{layer}: {} tile switches over {:.0} m",
            profile.switches, profile.distance
        );
        distance = profile.distance;
        great_circle = profile.great_circle;
        columns.push((layer, profile.values));
    }

    let entries: Vec<JsonEntry> = great_circle
        .iter()
        .enumerate()
        .map(|(i, point)| JsonEntry {
            location: [point.x(), point.y()],
            values: columns
                .iter()
                .map(|(layer, values)| (layer.to_string(), values[i]))
                .collect(),
        })
        .collect();

    let mut stdout = std::io::stdout().lock();
    if json {
        writeln!(stdout, "{}", serde_json::to_string(&entries)?)?;
        return Ok(());
    }
    writeln!(stdout, "distance: {distance:.1} m")?;
    for (i, entry) in entries.iter().enumerate() {
        let [lon, lat] = entry.location;
        write!(stdout, "{i:4}: {lat:.6},{lon:.6}")?;
        for (layer, value) in &entry.values {
            write!(stdout, "  {layer}={value}")?;
        }
        writeln!(stdout)?;
    }
    Ok(())
}
