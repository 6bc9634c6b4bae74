//! Nearby-block query, textual compression, and placement/stand analysis
//! (C8).
//!
//! Every one of the seven (really eight, once the "3D-box merge" bullet is
//! counted — §4.8 lists it separately from "the following seven") candidate
//! encodings is modeled uniformly as a [`Cell`]: a cross product of an
//! x/y/z axis specification, where each axis specification is a
//! disjoint-run set. A raw per-point encoding is a cell per point with
//! every axis a single-value run; a run-merged encoding widens one axis to
//! a multi-value run; a slab/signature encoding widens two. This lets one
//! `format`/`parse`/`expand` triple serve every candidate instead of eight
//! bespoke ones.

use crate::block_cache::BlockCache;
use agent_core::block::EMPTY_BLOCK_NAMES;
use agent_core::position::BlockPosition;
use std::collections::{HashMap, HashSet};

/// A disjoint, sorted, inclusive-range set over one axis.
type AxisSpec = Vec<(i64, i64)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub x: AxisSpec,
    pub y: AxisSpec,
    pub z: AxisSpec,
}

/// Sorts, dedups, and merges consecutive integers into inclusive runs.
fn run_compress(values: &[i64]) -> AxisSpec {
    let mut sorted: Vec<i64> = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut runs = Vec::new();
    let mut iter = sorted.into_iter();
    if let Some(first) = iter.next() {
        let mut start = first;
        let mut end = first;
        for v in iter {
            if v == end + 1 {
                end = v;
            } else {
                runs.push((start, end));
                start = v;
                end = v;
            }
        }
        runs.push((start, end));
    }
    runs
}

fn format_run(run: (i64, i64)) -> String {
    if run.0 == run.1 {
        run.0.to_string()
    } else {
        format!("{}~{}", run.0, run.1)
    }
}

fn format_axis(spec: &AxisSpec) -> String {
    if spec.len() == 1 {
        format_run(spec[0])
    } else {
        format!(
            "[{}]",
            spec.iter().map(|r| format_run(*r)).collect::<Vec<_>>().join(",")
        )
    }
}

fn parse_run(s: &str) -> Option<(i64, i64)> {
    match s.split_once('~') {
        Some((a, b)) => Some((a.parse().ok()?, b.parse().ok()?)),
        None => {
            let v: i64 = s.parse().ok()?;
            Some((v, v))
        }
    }
}

fn parse_axis(s: &str) -> Option<AxisSpec> {
    if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        inner.split(',').map(parse_run).collect()
    } else {
        parse_run(s).map(|r| vec![r])
    }
}

fn format_cell(c: &Cell) -> String {
    format!(
        "(x={},y={},z={})",
        format_axis(&c.x),
        format_axis(&c.y),
        format_axis(&c.z)
    )
}

fn parse_cell(s: &str) -> Option<Cell> {
    let inner = s.strip_prefix('(')?.strip_suffix(')')?;
    // Fields are separated by top-level commas; commas inside `[...]` groups
    // are not field separators, so track bracket depth while splitting.
    let mut fields = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, ch) in inner.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                fields.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&inner[start..]);
    if fields.len() != 3 {
        return None;
    }
    let mut x = None;
    let mut y = None;
    let mut z = None;
    for field in fields {
        let (key, val) = field.split_once('=')?;
        let axis = parse_axis(val)?;
        match key {
            "x" => x = Some(axis),
            "y" => y = Some(axis),
            "z" => z = Some(axis),
            _ => return None,
        }
    }
    Some(Cell {
        x: x?,
        y: y?,
        z: z?,
    })
}

fn expand_cell(c: &Cell, out: &mut HashSet<(i64, i64, i64)>) {
    for &(xa, xb) in &c.x {
        for x in xa..=xb {
            for &(ya, yb) in &c.y {
                for y in ya..=yb {
                    for &(za, zb) in &c.z {
                        for z in za..=zb {
                            out.insert((x, y, z));
                        }
                    }
                }
            }
        }
    }
}

fn encode_cells(cells: &[Cell]) -> String {
    cells.iter().map(format_cell).collect::<Vec<_>>().join(",")
}

/// Decodes a compressed encoding back into the set of positions it
/// represents, used both by the compressor's own candidate selection and by
/// round-trip tests.
pub fn decode_positions(encoding: &str) -> HashSet<(i64, i64, i64)> {
    let mut out = HashSet::new();
    if encoding.is_empty() {
        return out;
    }
    for cell_str in split_top_level_cells(encoding) {
        if let Some(cell) = parse_cell(cell_str) {
            expand_cell(&cell, &mut out);
        }
    }
    out
}

fn split_top_level_cells(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    out.push(&s[start..=i]);
                    start = i + 1;
                }
            }
            _ => {}
        }
    }
    out
}

fn encode_raw(positions: &[BlockPosition]) -> String {
    let cells: Vec<Cell> = positions
        .iter()
        .map(|p| Cell {
            x: vec![(p.x, p.x)],
            y: vec![(p.y, p.y)],
            z: vec![(p.z, p.z)],
        })
        .collect();
    encode_cells(&cells)
}

/// Groups by the two fixed axes and run-compresses the third.
fn encode_axis_run(positions: &[BlockPosition], run: Axis) -> String {
    let mut groups: HashMap<(i64, i64), Vec<i64>> = HashMap::new();
    for p in positions {
        let (group_key, run_val) = split_axes(p, run);
        groups.entry(group_key).or_default().push(run_val);
    }
    let cells: Vec<Cell> = groups
        .into_iter()
        .map(|(key, vals)| build_cell(run, key, run_compress(&vals)))
        .collect();
    encode_cells(&cells)
}

/// Groups by `slab` axis, then within each slab groups by `inner` axis and
/// computes a `sig` (the remaining axis) signature per inner value; merges
/// consecutive `inner` values sharing an identical signature into a run.
fn encode_slab(positions: &[BlockPosition], slab: Axis, inner: Axis, merge_across_slab: bool) -> String {
    let sig = third_axis(slab, inner);
    let mut by_slab: HashMap<i64, HashMap<i64, Vec<i64>>> = HashMap::new();
    for p in positions {
        let slab_val = axis_value(p, slab);
        let inner_val = axis_value(p, inner);
        let sig_val = axis_value(p, sig);
        by_slab
            .entry(slab_val)
            .or_default()
            .entry(inner_val)
            .or_default()
            .push(sig_val);
    }

    // (slab_val, inner_run, sig_runs) groups, before any cross-slab merge.
    let mut groups: Vec<(i64, (i64, i64), AxisSpec)> = Vec::new();
    for (slab_val, inner_map) in by_slab {
        let mut entries: Vec<(i64, AxisSpec)> = inner_map
            .into_iter()
            .map(|(inner_val, sigs)| (inner_val, run_compress(&sigs)))
            .collect();
        entries.sort_by_key(|(v, _)| *v);
        let mut idx = 0;
        while idx < entries.len() {
            let (start, sig_spec) = entries[idx].clone();
            let mut end = start;
            let mut j = idx + 1;
            while j < entries.len() && entries[j].0 == end + 1 && entries[j].1 == sig_spec {
                end = entries[j].0;
                j += 1;
            }
            groups.push((slab_val, (start, end), sig_spec));
            idx = j;
        }
    }

    if merge_across_slab {
        groups.sort_by(|a, b| (a.1.clone(), a.2.clone(), a.0).cmp(&(b.1.clone(), b.2.clone(), b.0)));
        let mut merged: Vec<(AxisSpec, (i64, i64), AxisSpec)> = Vec::new();
        let mut idx = 0;
        while idx < groups.len() {
            let (start_slab, inner_run, sig_spec) = groups[idx].clone();
            let mut slab_run = (start_slab, start_slab);
            let mut j = idx + 1;
            while j < groups.len()
                && groups[j].1 == inner_run
                && groups[j].2 == sig_spec
                && groups[j].0 == slab_run.1 + 1
            {
                slab_run.1 = groups[j].0;
                j += 1;
            }
            merged.push((vec![slab_run], inner_run, sig_spec));
            idx = j;
        }
        merged
            .into_iter()
            .map(|(slab_spec, inner_run, sig_spec)| build_slab_cell(slab, inner, slab_spec, vec![inner_run], sig_spec))
            .map(|c| format_cell(&c))
            .collect::<Vec<_>>()
            .join(",")
    } else {
        groups
            .into_iter()
            .map(|(slab_val, inner_run, sig_spec)| {
                build_slab_cell(slab, inner, vec![(slab_val, slab_val)], vec![inner_run], sig_spec)
            })
            .map(|c| format_cell(&c))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
    Z,
}

fn axis_value(p: &BlockPosition, axis: Axis) -> i64 {
    match axis {
        Axis::X => p.x,
        Axis::Y => p.y,
        Axis::Z => p.z,
    }
}

fn third_axis(a: Axis, b: Axis) -> Axis {
    for axis in [Axis::X, Axis::Y, Axis::Z] {
        if axis != a && axis != b {
            return axis;
        }
    }
    unreachable!()
}

/// Splits a position into `(group_key_over_the_other_two_axes, run_axis_value)`.
fn split_axes(p: &BlockPosition, run: Axis) -> ((i64, i64), i64) {
    match run {
        Axis::X => ((p.y, p.z), p.x),
        Axis::Y => ((p.x, p.z), p.y),
        Axis::Z => ((p.x, p.y), p.z),
    }
}

fn build_cell(run: Axis, group_key: (i64, i64), run_spec: AxisSpec) -> Cell {
    match run {
        Axis::X => Cell {
            x: run_spec,
            y: vec![(group_key.0, group_key.0)],
            z: vec![(group_key.1, group_key.1)],
        },
        Axis::Y => Cell {
            x: vec![(group_key.0, group_key.0)],
            y: run_spec,
            z: vec![(group_key.1, group_key.1)],
        },
        Axis::Z => Cell {
            x: vec![(group_key.0, group_key.0)],
            y: vec![(group_key.1, group_key.1)],
            z: run_spec,
        },
    }
}

fn build_slab_cell(slab: Axis, inner: Axis, slab_spec: AxisSpec, inner_spec: AxisSpec, sig_spec: AxisSpec) -> Cell {
    let mut cell = Cell {
        x: Vec::new(),
        y: Vec::new(),
        z: Vec::new(),
    };
    let sig = third_axis(slab, inner);
    for (axis, spec) in [(slab, slab_spec), (inner, inner_spec), (sig, sig_spec)] {
        match axis {
            Axis::X => cell.x = spec,
            Axis::Y => cell.y = spec,
            Axis::Z => cell.z = spec,
        }
    }
    cell
}

/// Chooses, among the candidate encodings, the shortest string. Ties break
/// toward the earliest (simplest) candidate.
pub fn compress_positions(positions: &[BlockPosition]) -> String {
    if positions.is_empty() {
        return String::new();
    }
    let candidates = [
        encode_raw(positions),
        encode_axis_run(positions, Axis::X),
        encode_axis_run(positions, Axis::Y),
        encode_axis_run(positions, Axis::Z),
        encode_slab(positions, Axis::Z, Axis::Y, false),
        encode_slab(positions, Axis::Y, Axis::Z, false),
        encode_slab(positions, Axis::X, Axis::Z, false),
        encode_slab(positions, Axis::Z, Axis::Y, true),
    ];
    candidates
        .into_iter()
        .min_by_key(|c| c.len())
        .unwrap_or_default()
}

/// Groups cached blocks by type and renders each group's compressed
/// encoding, applying §4.8's visibility/radius filter first.
pub fn nearby_blocks_text(
    cache: &BlockCache,
    center: BlockPosition,
    full_distance: f64,
    can_see_distance: f64,
) -> HashMap<String, String> {
    let gather_radius = full_distance.max(can_see_distance);
    let blocks = cache.blocks_in_range(center, gather_radius);

    let mut by_type: HashMap<String, Vec<BlockPosition>> = HashMap::new();
    for b in blocks {
        let dist = b.position.distance(&center);
        let keep = (!EMPTY_BLOCK_NAMES.contains(&b.block_type.as_str()) && dist <= full_distance)
            || (b.can_see && dist <= can_see_distance);
        if keep {
            by_type.entry(b.block_type.clone()).or_default().push(b.position);
        }
    }

    by_type
        .into_iter()
        .map(|(name, positions)| (name, compress_positions(&positions)))
        .collect()
}

/// A placement candidate: a position the bot could stand a block against
/// (C8's placement analysis).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementCandidate {
    pub position: BlockPosition,
    pub displacing: Option<String>,
}

const PLACEABLE_TYPES: &[&str] = &["air", "water", "lava"];

/// Every position whose block type is air/water/lava and whose known,
/// non-empty axis-neighbor count is in `1..=5`.
pub fn placement_candidates(cache: &BlockCache, center: BlockPosition, radius: f64) -> Vec<PlacementCandidate> {
    let blocks = cache.blocks_in_range(center, radius);
    let mut out = Vec::new();
    for b in &blocks {
        if !PLACEABLE_TYPES.contains(&b.block_type.as_str()) {
            continue;
        }
        let mut known_non_empty = 0usize;
        for n in b.position.axis_neighbors() {
            if let Some(neighbor) = cache.get(n) {
                if !EMPTY_BLOCK_NAMES.contains(&neighbor.block_type.as_str()) {
                    known_non_empty += 1;
                }
            }
        }
        if (1..=5).contains(&known_non_empty) {
            let displacing = match b.block_type.as_str() {
                "water" => Some("water".to_string()),
                "lava" => Some("lava".to_string()),
                _ => None,
            };
            out.push(PlacementCandidate {
                position: b.position,
                displacing,
            });
        }
    }
    out
}

/// Every position usable as a Move target: air, with a known non-air block
/// below and air above (C8's stand-candidate analysis).
pub fn stand_candidates(cache: &BlockCache, center: BlockPosition, radius: f64) -> Vec<BlockPosition> {
    let blocks = cache.blocks_in_range(center, radius);
    let mut out = Vec::new();
    for b in &blocks {
        if !EMPTY_BLOCK_NAMES.contains(&b.block_type.as_str()) {
            continue;
        }
        let below = BlockPosition::new(b.position.x, b.position.y - 1, b.position.z);
        let above = BlockPosition::new(b.position.x, b.position.y + 1, b.position.z);
        let Some(below_block) = cache.get(below) else {
            continue;
        };
        if EMPTY_BLOCK_NAMES.contains(&below_block.block_type.as_str()) {
            continue;
        }
        let Some(above_block) = cache.get(above) else {
            continue;
        };
        if !EMPTY_BLOCK_NAMES.contains(&above_block.block_type.as_str()) {
            continue;
        }
        out.push(b.position);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_set(positions: &[(i64, i64, i64)]) -> HashSet<(i64, i64, i64)> {
        positions.iter().copied().collect()
    }

    #[test]
    fn run_compress_merges_consecutive_and_splits_gaps() {
        assert_eq!(run_compress(&[1, 2, 3, 5, 6]), vec![(1, 3), (5, 6)]);
        assert_eq!(run_compress(&[3]), vec![(3, 3)]);
    }

    #[test]
    fn compression_round_trips_a_run_of_stone() {
        let mut positions: Vec<BlockPosition> = (1..=5).map(|x| BlockPosition::new(x, 64, 0)).collect();
        positions.push(BlockPosition::new(3, 65, 0));
        let encoding = compress_positions(&positions);
        let decoded = decode_positions(&encoding);
        let expected = pos_set(&[(1, 64, 0), (2, 64, 0), (3, 64, 0), (4, 64, 0), (5, 64, 0), (3, 65, 0)]);
        assert_eq!(decoded, expected);
    }

    #[test]
    fn compression_chooses_the_shortest_candidate() {
        let positions: Vec<BlockPosition> = (1..=20).map(|x| BlockPosition::new(x, 0, 0)).collect();
        let encoding = compress_positions(&positions);
        // A run-compressed encoding of 20 collinear blocks must always beat
        // the raw per-point rendering.
        assert!(encoding.len() < encode_raw(&positions).len());
    }

    #[test]
    fn single_point_round_trips() {
        let positions = vec![BlockPosition::new(-1, 64, 7)];
        let encoding = compress_positions(&positions);
        assert_eq!(decode_positions(&encoding), pos_set(&[(-1, 64, 7)]));
    }

    #[test]
    fn placement_requires_one_to_five_known_non_empty_neighbors() {
        let cache = BlockCache::new();
        let target = BlockPosition::new(0, 64, 0);
        cache.observe("air".into(), target, true);
        cache.observe("stone".into(), BlockPosition::new(1, 64, 0), true);
        let candidates = placement_candidates(&cache, target, 5.0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].position, target);
    }

    #[test]
    fn stand_candidate_requires_air_body_solid_below_air_above() {
        let cache = BlockCache::new();
        let body = BlockPosition::new(0, 65, 0);
        cache.observe("air".into(), body, true);
        cache.observe("stone".into(), BlockPosition::new(0, 64, 0), true);
        cache.observe("air".into(), BlockPosition::new(0, 66, 0), true);
        let candidates = stand_candidates(&cache, body, 5.0);
        assert_eq!(candidates, vec![body]);
    }

    #[test]
    fn stand_candidate_rejected_when_below_is_also_air() {
        let cache = BlockCache::new();
        let body = BlockPosition::new(0, 65, 0);
        cache.observe("air".into(), body, true);
        cache.observe("air".into(), BlockPosition::new(0, 64, 0), true);
        cache.observe("air".into(), BlockPosition::new(0, 66, 0), true);
        assert!(stand_candidates(&cache, body, 5.0).is_empty());
    }
}
