//! Preview preparation: splitting multi-trace CSV files and thinning
//! long traces while keeping spike peaks.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use mimic_core::{Dataset, Metadata, MimicError, Result, Time, Voltage};
use tracing::{info, warn};

const TIME_COLUMNS: [&str; 3] = ["time", "t", "ms"];

fn is_number(cell: &str) -> bool {
    cell.parse::<f64>().is_ok()
}

fn parse_all<'a>(cells: impl IntoIterator<Item = &'a str>) -> Option<Vec<f64>> {
    cells.into_iter().map(|c| c.parse::<f64>().ok()).collect()
}

fn trace(label: &str, times: Vec<Time>, voltages: Vec<Voltage>) -> Dataset {
    Dataset {
        times: Some(times),
        voltages: Some(voltages),
        metadata: Metadata::named(label),
        ..Dataset::default()
    }
}

fn read_rows(reader: impl Read) -> Result<Vec<Vec<String>>> {
    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record?;
        if record.iter().any(|cell| !cell.is_empty()) {
            rows.push(record.iter().map(str::to_string).collect());
        }
    }
    Ok(rows)
}

/// First row `label,t0,t1,...` with a non-numeric label and numeric rest
fn is_row_oriented(rows: &[Vec<String>]) -> bool {
    let Some(first) = rows.first() else {
        return false;
    };
    rows.len() >= 2
        && first.first().is_some_and(|c| !is_number(c))
        && first.len() > 1
        && first[1..].iter().all(|c| is_number(c))
}

fn split_rows(rows: &[Vec<String>]) -> Vec<Dataset> {
    let times: Vec<f64> = rows[0][1..].iter().filter_map(|c| c.parse().ok()).collect();
    let mut out = Vec::new();
    for row in &rows[1..] {
        let label = match row.first().map(String::as_str) {
            Some(l) if !l.is_empty() => l,
            _ => "series",
        };
        match parse_all(row[1..].iter().map(String::as_str)) {
            Some(values) if values.len() == times.len() => out.push(trace(label, times.clone(), values)),
            Some(values) => warn!(label, samples = values.len(), expected = times.len(), "skipping row of wrong length"),
            None => warn!(label, "skipping non-numeric row"),
        }
    }
    out
}

fn split_columns(rows: &[Vec<String>]) -> Result<Vec<Dataset>> {
    let first: Vec<String> = rows[0].iter().map(|c| c.to_lowercase()).collect();
    let has_header = first.iter().any(|c| !c.is_empty() && !is_number(c));
    let (header, data) = if has_header {
        (first, &rows[1..])
    } else {
        ((0..rows[0].len()).map(|i| format!("col{i}")).collect(), rows)
    };

    // columns end where the shortest row ends
    let width = data.iter().map(Vec::len).min().unwrap_or(0);
    let column = move |i: usize| data.iter().map(move |row| row[i].as_str());

    let time_idx = TIME_COLUMNS
        .iter()
        .find_map(|name| header.iter().position(|h| h == *name))
        .unwrap_or(0);
    if time_idx >= width {
        return Err(MimicError::MalformedDataset("CSV has no time column".into()));
    }
    let times = parse_all(column(time_idx))
        .ok_or_else(|| MimicError::MalformedDataset("time column is not numeric".into()))?;

    let mut out = Vec::new();
    for i in (0..width).filter(|&i| i != time_idx) {
        let label = header.get(i).cloned().unwrap_or_else(|| format!("col{i}"));
        match parse_all(column(i)) {
            Some(values) => out.push(trace(&label, times.clone(), values)),
            None => warn!(label = %label, "skipping non-numeric column"),
        }
    }
    Ok(out)
}

/// Split a CSV holding a time axis and several voltage series into one
/// trace dataset per series, named by its label.
///
/// Row-oriented files put the label first on every row (`time,0,1,...`
/// then `WT,-65,-64,...`). Otherwise columns are read, with an optional
/// header naming the time column `time`, `t` or `ms` (else the first).
pub fn split_csv(reader: impl Read) -> Result<Vec<Dataset>> {
    let rows = read_rows(reader)?;
    if rows.is_empty() {
        return Err(MimicError::MalformedDataset("CSV has no non-empty rows".into()));
    }
    if is_row_oriented(&rows) {
        Ok(split_rows(&rows))
    } else {
        split_columns(&rows)
    }
}

/// Split `path` and write `<stem>_<label>.json` files into `out_dir`.
pub fn split_csv_file(path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let file = fs::File::open(path)?;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("series");

    let mut written = Vec::new();
    for dataset in split_csv(file)? {
        let label = dataset.name().unwrap_or("series").replace(' ', "_");
        let target = out_dir.join(format!("{stem}_{label}.json"));
        fs::write(&target, dataset.to_json_string()?)?;
        info!(path = %target.display(), "wrote preview");
        written.push(target);
    }
    Ok(written)
}

/// Thin a trace to about `max_points` samples, keeping each bucket's
/// extremes.
///
/// Samples are grouped in buckets of `ceil(n / max_points)`; each bucket
/// contributes its minimum then maximum voltage, both at the bucket's first
/// time. A trailing partial bucket is dropped. Traces at or under the limit
/// are returned unchanged.
pub fn minmax_downsample(times: &[Time], voltages: &[Voltage], max_points: usize) -> (Vec<Time>, Vec<Voltage>) {
    let n = times.len().min(voltages.len());
    let max_points = max_points.max(1);
    if n <= max_points {
        return (times[..n].to_vec(), voltages[..n].to_vec());
    }

    let k = n.div_ceil(max_points);
    let buckets = n / k;
    let mut out_t = Vec::with_capacity(buckets * 2);
    let mut out_v = Vec::with_capacity(buckets * 2);
    for (t, v) in times.chunks_exact(k).zip(voltages.chunks_exact(k)).take(buckets) {
        let lo = v.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        out_t.extend([t[0], t[0]]);
        out_v.extend([lo, hi]);
    }
    (out_t, out_v)
}

/// [`minmax_downsample`] applied to a trace dataset; other datasets are
/// returned as they are.
pub fn downsample_dataset(dataset: &Dataset, max_points: usize) -> Dataset {
    match (&dataset.times, &dataset.voltages) {
        (Some(times), Some(voltages)) => {
            let (times, voltages) = minmax_downsample(times, voltages, max_points);
            Dataset {
                times: Some(times),
                voltages: Some(voltages),
                ..dataset.clone()
            }
        }
        _ => dataset.clone(),
    }
}
