//! Reference cross-check
//!
//! Renders a frame with both tile implementations and compares the results
//! byte for byte. Any difference is a correctness fault in the fast path;
//! there is no tolerance.

use serde::Serialize;
use tracing::{info, warn};

use crate::coeffs::CoefficientTable;
use crate::error::{DewarpError, Result};
use crate::frame::Nv12Frame;
use crate::warp::{Dewarper, Implementation};

/// First differing sample of a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub x: usize,
    pub y: usize,
    /// 0 for luma, 0 (U) or 1 (V) for chroma
    pub component: usize,
    pub expected: u8,
    pub actual: u8,
}

/// Comparison result for one plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaneDiff {
    pub plane: &'static str,
    pub samples: usize,
    pub mismatches: usize,
    pub first: Option<Mismatch>,
}

impl PlaneDiff {
    fn compare(
        plane: &'static str,
        components: usize,
        width: usize,
        height: usize,
        expected: (&[u8], usize),
        actual: (&[u8], usize),
    ) -> Self {
        let (exp, exp_stride) = expected;
        let (act, act_stride) = actual;
        let row_bytes = width * components;
        let mut diff = Self {
            plane,
            samples: row_bytes * height,
            mismatches: 0,
            first: None,
        };
        for y in 0..height {
            let a = &exp[y * exp_stride..y * exp_stride + row_bytes];
            let b = &act[y * act_stride..y * act_stride + row_bytes];
            if a == b {
                continue;
            }
            for (i, (&e, &v)) in a.iter().zip(b).enumerate() {
                if e != v {
                    diff.mismatches += 1;
                    diff.first.get_or_insert(Mismatch {
                        x: i / components,
                        y,
                        component: i % components,
                        expected: e,
                        actual: v,
                    });
                }
            }
        }
        diff
    }
}

/// Outcome of comparing two renderings of the same frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossCheckReport {
    pub width: u32,
    pub height: u32,
    pub luma: PlaneDiff,
    pub chroma: PlaneDiff,
}

impl CrossCheckReport {
    /// True when every byte matched
    pub fn is_exact(&self) -> bool {
        self.luma.mismatches == 0 && self.chroma.mismatches == 0
    }

    pub fn mismatches(&self) -> usize {
        self.luma.mismatches + self.chroma.mismatches
    }
}

/// Compare two frames of the same size, ignoring row padding.
pub fn compare_frames(expected: &Nv12Frame, actual: &Nv12Frame) -> Result<CrossCheckReport> {
    if (expected.width(), expected.height()) != (actual.width(), actual.height()) {
        return Err(DewarpError::InvalidDimensions {
            width: actual.width(),
            height: actual.height(),
        });
    }
    let w = expected.width() as usize;
    let h = expected.height() as usize;
    Ok(CrossCheckReport {
        width: expected.width(),
        height: expected.height(),
        luma: PlaneDiff::compare(
            "luma",
            1,
            w,
            h,
            (expected.luma(), expected.luma_stride()),
            (actual.luma(), actual.luma_stride()),
        ),
        chroma: PlaneDiff::compare(
            "chroma",
            2,
            w / 2,
            h / 2,
            (expected.chroma(), expected.chroma_stride()),
            (actual.chroma(), actual.chroma_stride()),
        ),
    })
}

/// Render `src` with the reference and the fast implementation and diff them.
pub fn cross_check(table: &CoefficientTable, src: &Nv12Frame, parallel: bool) -> Result<CrossCheckReport> {
    let dewarper = Dewarper::new(table.clone()).with_parallel(parallel);
    let expected = dewarper
        .clone()
        .with_implementation(Implementation::Reference)
        .warp(src)?;
    let actual = dewarper.with_implementation(Implementation::Fast).warp(src)?;

    let report = compare_frames(&expected, &actual)?;
    if report.is_exact() {
        info!(
            "Cross-check passed: {}x{} frame, {} samples identical",
            report.width,
            report.height,
            report.luma.samples + report.chroma.samples
        );
    } else {
        for diff in [&report.luma, &report.chroma] {
            if let Some(m) = diff.first {
                warn!(
                    "{} mismatch: {} samples differ, first at ({}, {}) component {}: reference={} fast={}",
                    diff.plane, diff.mismatches, m.x, m.y, m.component, m.expected, m.actual
                );
            }
        }
    }
    Ok(report)
}
