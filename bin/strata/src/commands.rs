use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;
use strata_index::GeoJsonSource;
use strata_pip::{Coordinates, Layer, LookupResult, ReverseGeocoder};
use strata_postal::{PostalCandidate, PostalTable};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::output::Answer;

/// Batch lookups allowed in flight before output is drained.
const BATCH_WINDOW: usize = 256;

async fn start(config: &Config) -> anyhow::Result<ReverseGeocoder> {
	ReverseGeocoder::create(config.geocoder_options(), Arc::new(GeoJsonSource::new()))
		.await
		.with_context(|| format!("loading layers from {}", config.datapath.display()))
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
	let mut stdout = std::io::stdout().lock();
	serde_json::to_writer(&mut stdout, value)?;
	writeln!(stdout)?;
	Ok(())
}

pub async fn lookup(config: &Config, lat: f64, lon: f64, layers: Option<Vec<Layer>>) -> anyhow::Result<()> {
	let point = Coordinates::new(lat, lon)?;
	let geocoder = start(config).await?;
	let result = geocoder.lookup(point, layers.as_deref()).await;
	geocoder.shutdown().await;

	print_json(&Answer::lookup(None, point, &result))?;
	result?;
	Ok(())
}

/// Parses `lat,lon` (comma and/or whitespace separated).
fn parse_point(line: &str) -> Result<Coordinates, String> {
	let mut parts = line.split(|c: char| c == ',' || c.is_whitespace()).filter(|p| !p.is_empty());
	let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
		return Err("expected `lat,lon`".to_string());
	};
	let lat: f64 = lat.parse().map_err(|_| format!("invalid latitude `{lat}`"))?;
	let lon: f64 = lon.parse().map_err(|_| format!("invalid longitude `{lon}`"))?;
	Coordinates::new(lat, lon).map_err(|err| err.to_string())
}

enum Pending {
	Lookup(Coordinates, JoinHandle<LookupResult>),
	Rejected(String),
}

async fn emit(line: usize, pending: Pending) -> anyhow::Result<()> {
	match pending {
		Pending::Lookup(point, handle) => {
			let result = handle.await.context("lookup task failed")?;
			print_json(&Answer::lookup(Some(line), point, &result))
		}
		Pending::Rejected(error) => print_json(&Answer::rejected(line, error)),
	}
}

pub async fn batch(config: &Config, layers: Option<Vec<Layer>>) -> anyhow::Result<()> {
	let geocoder = Arc::new(start(config).await?);
	let layers: Option<Arc<[Layer]>> = layers.map(Arc::from);
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut window: VecDeque<(usize, Pending)> = VecDeque::new();
	let mut line_no = 0usize;

	while let Some(line) = lines.next_line().await.context("reading stdin")? {
		line_no += 1;
		if line.trim().is_empty() {
			continue;
		}
		let pending = match parse_point(&line) {
			Ok(point) => {
				let geocoder = Arc::clone(&geocoder);
				let layers = layers.clone();
				Pending::Lookup(point, tokio::spawn(async move { geocoder.lookup(point, layers.as_deref()).await }))
			}
			Err(error) => Pending::Rejected(error),
		};
		window.push_back((line_no, pending));

		while window.len() >= BATCH_WINDOW {
			if let Some((line, pending)) = window.pop_front() {
				emit(line, pending).await?;
			}
		}
	}

	while let Some((line, pending)) = window.pop_front() {
		emit(line, pending).await?;
	}

	tracing::info!(lines = line_no, "strata.batch.done");
	geocoder.shutdown().await;
	Ok(())
}

#[derive(Serialize)]
struct PostalAnswer<'a> {
	country: &'a str,
	code: &'a str,
	candidates: &'a [PostalCandidate],
}

pub fn postal(config: &Config, country: &str, code: &str, table: Option<PathBuf>) -> anyhow::Result<()> {
	let Some(path) = table.or_else(|| config.postal_table.clone()) else {
		bail!("no postal table configured; pass --table or set `postal_table`");
	};
	let table = PostalTable::load(&path)?;
	print_json(&PostalAnswer {
		country,
		code,
		candidates: table.lookup(country, code).unwrap_or_default(),
	})
}

#[derive(Serialize)]
struct LayersAnswer<'a> {
	datapath: String,
	active: &'a [Layer],
	missing: Vec<Layer>,
	records: usize,
}

pub async fn layers(config: &Config) -> anyhow::Result<()> {
	let geocoder = start(config).await?;
	let active = geocoder.active_layers();
	let requested = (!config.layers.is_empty()).then_some(config.layers.as_slice());
	let missing = strata_pip::effective_layers(requested, &Layer::ALL)
		.into_iter()
		.filter(|layer| !active.contains(layer))
		.collect();

	print_json(&LayersAnswer {
		datapath: config.datapath.display().to_string(),
		active,
		missing,
		records: geocoder.dataset().len(),
	})?;
	geocoder.shutdown().await;
	Ok(())
}
