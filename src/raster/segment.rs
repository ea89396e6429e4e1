//! Multi-character splitting by vertical ink projection.
//!
//! Column analysis runs on a small copy of the ink crop scaled to
//! `seg_target_height`. Segment ranges are then mapped back to the crop's
//! own resolution before sub-rasters or cut points are produced.

use image::imageops;
use image::GrayImage;

use crate::config::SegmentationConfig;
use crate::raster::{ink_bounds, resize_to_height, InkBounds, InkRaster};

/// Inclusive column span in working-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnRange {
    start: u32,
    end: u32,
}

impl ColumnRange {
    fn width(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// Outcome of column analysis over one raster.
#[derive(Debug)]
struct SegmentPlan {
    bounds: InkBounds,
    /// Per-character `[x0, x1)` spans in crop coordinates, before padding.
    /// Fewer than two spans means the content is a single character.
    spans: Vec<(u32, u32)>,
}

/// Split a raster into per-character sub-rasters, left to right.
///
/// Returns an empty list when there is no ink and a single crop when the
/// content does not look like more than one character. At most
/// `config.max_chars` pieces are returned; any further ink stays in the last
/// piece.
pub fn split_to_characters(raster: &InkRaster, config: &SegmentationConfig) -> Vec<InkRaster> {
    let Some(plan) = plan_segments(raster, config) else {
        return Vec::new();
    };
    let crop = raster.crop(plan.bounds);
    if plan.spans.len() < 2 {
        return vec![crop];
    }

    let crop_width = plan.bounds.width;
    plan.spans
        .iter()
        .map(|&(x0, x1)| {
            let left = x0.saturating_sub(config.out_pad_px);
            let right = x1.saturating_add(config.out_pad_px).min(crop_width);
            crop.crop(InkBounds {
                left,
                top: 0,
                width: right - left,
                height: plan.bounds.height,
            })
        })
        .collect()
}

/// Cut x-coordinates between neighbouring characters, in the coordinate
/// space of the original raster. Empty for single-character content.
pub fn estimate_char_cut_points(raster: &InkRaster, config: &SegmentationConfig) -> Vec<u32> {
    let Some(plan) = plan_segments(raster, config) else {
        return Vec::new();
    };
    if plan.spans.len() < 2 {
        return Vec::new();
    }
    plan.spans
        .windows(2)
        .map(|pair| {
            let (_, prev_end) = pair[0];
            let (next_start, _) = pair[1];
            plan.bounds.left + (prev_end + next_start) / 2
        })
        .collect()
}

/// Keep at most `cap` ranges; ink past the cap joins the last kept range.
fn cap_ranges(ranges: &mut Vec<ColumnRange>, cap: usize) {
    let Some(&last) = ranges.last() else {
        return;
    };
    if ranges.len() <= cap {
        return;
    }
    ranges.truncate(cap);
    if let Some(kept) = ranges.last_mut() {
        kept.end = last.end;
    }
}

fn plan_segments(raster: &InkRaster, config: &SegmentationConfig) -> Option<SegmentPlan> {
    let luma = raster.to_luma();
    let bounds = ink_bounds(&luma, config.ink_threshold)?;
    let crop = imageops::crop_imm(&luma, bounds.left, bounds.top, bounds.width, bounds.height)
        .to_image();
    drop(luma);

    let working = resize_to_height(&crop, config.seg_target_height.max(1));
    drop(crop);

    let ink_columns = ink_columns(&working, config);
    let ranges = column_ranges(&ink_columns, config.min_gap_px.max(1))
        .into_iter()
        .filter(|r| r.width() >= config.min_segment_width_px)
        .collect::<Vec<_>>();
    let mut ranges = merge_ranges(ranges, config);

    tracing::debug!(
        working_width = working.width(),
        ranges = ranges.len(),
        "segment: column ranges after merge"
    );

    if ranges.len() < 2 {
        return Some(SegmentPlan {
            bounds,
            spans: Vec::new(),
        });
    }
    cap_ranges(&mut ranges, config.max_chars.max(1));
    if ranges.len() < 2 {
        return Some(SegmentPlan {
            bounds,
            spans: Vec::new(),
        });
    }

    let scale = bounds.width as f64 / working.width() as f64;
    let spans = ranges
        .iter()
        .map(|r| {
            let x0 = (r.start as f64 * scale).floor() as u32;
            let x1 = (((r.end + 1) as f64 * scale).ceil() as u32).min(bounds.width);
            (x0.min(x1.saturating_sub(1)), x1.max(1))
        })
        .collect();

    Some(SegmentPlan { bounds, spans })
}

fn ink_columns(working: &GrayImage, config: &SegmentationConfig) -> Vec<bool> {
    let min_pixels = config.min_ink_pixels_per_column.max(1);
    (0..working.width())
        .map(|x| {
            let count = (0..working.height())
                .filter(|&y| working.get_pixel(x, y).0[0] < config.ink_threshold)
                .count() as u32;
            count >= min_pixels
        })
        .collect()
}

/// Group ink columns into ranges; a blank run of `min_gap` columns ends one.
fn column_ranges(ink_columns: &[bool], min_gap: u32) -> Vec<ColumnRange> {
    let mut ranges = Vec::new();
    let mut start: Option<u32> = None;
    let mut last_ink = 0u32;
    let mut gap = 0u32;

    for (x, &is_ink) in ink_columns.iter().enumerate() {
        let x = x as u32;
        if is_ink {
            if start.is_none() {
                start = Some(x);
            }
            last_ink = x;
            gap = 0;
            continue;
        }
        if let Some(s) = start {
            gap += 1;
            if gap >= min_gap {
                ranges.push(ColumnRange {
                    start: s,
                    end: last_ink,
                });
                start = None;
                gap = 0;
            }
        }
    }
    if let Some(s) = start {
        ranges.push(ColumnRange {
            start: s,
            end: last_ink,
        });
    }
    ranges
}

fn merge_ranges(ranges: Vec<ColumnRange>, config: &SegmentationConfig) -> Vec<ColumnRange> {
    let thin = config.thin_segment_width_px;
    let mut merged: Vec<ColumnRange> = Vec::with_capacity(ranges.len());

    for next in ranges {
        let Some(current) = merged.last_mut() else {
            merged.push(next);
            continue;
        };
        let gap = next.start - current.end - 1;
        if gap <= config.merge_gap_px || current.width() <= thin || next.width() <= thin {
            current.end = next.end;
        } else {
            merged.push(next);
        }
    }

    // Two thin strokes (e.g. the halves of "ハ") read as one glyph.
    if let [first, second] = merged.as_slice() {
        if first.width() <= thin && second.width() <= thin {
            return vec![ColumnRange {
                start: first.start,
                end: second.end,
            }];
        }
    }
    merged
}
