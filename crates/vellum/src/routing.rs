//! Delayed link routing and orthogonal overlap correction.
//!
//! While routing is suspended, links whose ports move are queued instead of
//! re-routed. [`Document::do_delayed_routing`] drains the queue once the
//! gesture that caused the moves is over, then spreads apart orthogonal
//! segments that ended up on top of each other.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexSet;
use log::{debug, trace, warn};

use vellum_core::{geometry::Bounds, key::PartKey};

use crate::{Document, Result};

/// An interior segment of an orthogonal link: `points[index]` to
/// `points[index + 1]`.
#[derive(Debug, Clone, Copy)]
struct Segment {
    link: PartKey,
    index: usize,
    vertical: bool,
    /// Fixed coordinate: x for vertical segments, y for horizontal ones.
    coord: f32,
    start: f32,
    end: f32,
}

/// A planned move of one segment to a new fixed coordinate.
#[derive(Debug, Clone, Copy)]
struct Shift {
    index: usize,
    vertical: bool,
    coord: f32,
}

impl Document {
    pub fn suspends_routing(&self) -> bool {
        self.suspends_routing
    }

    /// While set, links needing a new route are queued rather than routed.
    pub fn set_suspends_routing(&mut self, suspends: bool) {
        if suspends != self.suspends_routing {
            trace!(suspends; "Routing suspension changed");
        }
        self.suspends_routing = suspends;
    }

    /// Links waiting to be routed, in the order they were queued.
    pub fn pending_routes(&self) -> impl Iterator<Item = PartKey> + '_ {
        self.pending_routes.iter().copied()
    }

    /// Routes every queued link.
    ///
    /// When configured, links near any avoidable part in `moved` are queued
    /// first. Routing one link may queue another, so the queue is drained
    /// repeatedly, up to the configured pass limit. A single overlap
    /// correction pass follows when anything was routed.
    pub fn do_delayed_routing(&mut self, moved: &[PartKey]) -> Result<()> {
        if self.config.routing().route_after_nodes_dragged() {
            self.queue_links_near(moved);
        }

        let was_suspended = std::mem::replace(&mut self.suspends_routing, true);
        let result = self.drain_pending_routes().and_then(|routed| {
            if !routed.is_empty() && self.config.routing().avoid_orthogonal_overlaps() {
                self.correct_orthogonal_overlaps()
            } else {
                Ok(())
            }
        });
        self.suspends_routing = was_suspended;
        result
    }

    fn queue_links_near(&mut self, moved: &[PartKey]) {
        let margin = self.config.grid().inflate();
        let areas: Vec<Bounds> = moved
            .iter()
            .filter_map(|key| self.parts.get(*key))
            .filter(|part| part.is_avoidable())
            .map(|part| part.bounds().inflate(margin))
            .collect();
        if areas.is_empty() {
            return;
        }
        let near: Vec<PartKey> = self
            .parts
            .iter()
            .filter(|(key, part)| part.is_link() && self.parts.is_attached(*key))
            .filter(|(_, part)| areas.iter().any(|area| area.intersects(&part.bounds())))
            .map(|(key, _)| key)
            .collect();
        trace!(links = near.len(); "Queued links near moved parts");
        self.pending_routes.extend(near);
    }

    fn drain_pending_routes(&mut self) -> Result<IndexSet<PartKey>> {
        let max_passes = self.config.routing().max_drain_passes();
        let mut routed = IndexSet::new();
        let mut passes = 0;
        while !self.pending_routes.is_empty() {
            if passes == max_passes {
                warn!(passes, remaining = self.pending_routes.len(); "Routing drain hit its pass limit");
                break;
            }
            passes += 1;
            let batch: Vec<PartKey> = self.pending_routes.drain(..).collect();
            for link in batch {
                if self.parts.is_attached(link) {
                    self.route_link(link)?;
                    routed.insert(link);
                }
            }
        }
        debug!(passes, routed = routed.len(); "Delayed routing drained");
        Ok(routed)
    }

    /// Spreads overlapping interior segments of orthogonal links that share
    /// a grid band. Runs once; a shifted segment may still overlap a
    /// segment of a neighboring band.
    fn correct_orthogonal_overlaps(&mut self) -> Result<()> {
        let cell_size = self.config.grid().cell_size();
        let spacing = self.config.routing().orthogonal_spacing();

        let mut bands: BTreeMap<(bool, i64), Vec<Segment>> = BTreeMap::new();
        for segment in self.orthogonal_segments() {
            let band = (segment.coord / cell_size).floor() as i64;
            bands.entry((segment.vertical, band)).or_default().push(segment);
        }

        let mut shifts: BTreeMap<PartKey, Vec<Shift>> = BTreeMap::new();
        for ((_, band), mut segments) in bands {
            segments.sort_by(|a, b| a.start.total_cmp(&b.start));
            let center = (band as f32 + 0.5) * cell_size;
            for cluster in overlapping_clusters(&segments) {
                self.plan_cluster(cluster, center, spacing, &mut shifts);
            }
        }

        for (link, planned) in shifts {
            self.apply_shifts(link, &planned)?;
        }
        Ok(())
    }

    fn orthogonal_segments(&self) -> Vec<Segment> {
        let mut segments = Vec::new();
        for (key, part) in self.parts.iter() {
            let Some(link) = part.link() else {
                continue;
            };
            if !link.is_orthogonal() || link.points().len() < 4 || !self.parts.is_attached(key) {
                continue;
            }
            let points = link.points();
            for index in 1..points.len() - 2 {
                let (a, b) = (points[index], points[index + 1]);
                let segment = if a.x() == b.x() && a.y() != b.y() {
                    Segment {
                        link: key,
                        index,
                        vertical: true,
                        coord: a.x(),
                        start: a.y().min(b.y()),
                        end: a.y().max(b.y()),
                    }
                } else if a.y() == b.y() && a.x() != b.x() {
                    Segment {
                        link: key,
                        index,
                        vertical: false,
                        coord: a.y(),
                        start: a.x().min(b.x()),
                        end: a.x().max(b.x()),
                    }
                } else {
                    continue;
                };
                segments.push(segment);
            }
        }
        segments
    }

    /// Assigns every segment of `cluster` a parallel offset from the band
    /// center, one offset per endpoint group.
    fn plan_cluster(
        &self,
        cluster: &[Segment],
        center: f32,
        spacing: f32,
        shifts: &mut BTreeMap<PartKey, Vec<Shift>>,
    ) {
        let links: HashSet<PartKey> = cluster.iter().map(|s| s.link).collect();
        if links.len() < 2 {
            return;
        }

        let endpoint = |segment: &Segment, from: bool| -> PartKey {
            self.parts
                .get(segment.link)
                .and_then(|part| part.link())
                .and_then(|link| if from { link.from_port() } else { link.to_port() })
                .unwrap_or(segment.link)
        };
        let distinct = |from: bool| cluster.iter().map(|s| endpoint(s, from)).collect::<HashSet<_>>().len();
        let by_from = distinct(true) <= distinct(false);

        let mut groups: Vec<(f32, PartKey)> = Vec::new();
        for segment in cluster {
            let key = endpoint(segment, by_from);
            if groups.iter().any(|(_, k)| *k == key) {
                continue;
            }
            let anchor = self.parts.get(key).map(|part| part.bounds().center());
            let order = anchor.map_or(segment.start, |c| if segment.vertical { c.y() } else { c.x() });
            groups.push((order, key));
        }
        groups.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let middle = (groups.len() as f32 - 1.0) / 2.0;
        for segment in cluster {
            let key = endpoint(segment, by_from);
            let Some(rank) = groups.iter().position(|(_, k)| *k == key) else {
                continue;
            };
            let coord = center + spacing * (rank as f32 - middle);
            shifts.entry(segment.link).or_default().push(Shift {
                index: segment.index,
                vertical: segment.vertical,
                coord,
            });
        }
    }

    fn apply_shifts(&mut self, link: PartKey, shifts: &[Shift]) -> Result<()> {
        let Some(role) = self.parts.get(link).and_then(|part| part.link()) else {
            return Ok(());
        };
        let avoids_nodes = role.avoids_nodes();
        let mut points = role.points().to_vec();

        for shift in shifts {
            let (a, b) = (points[shift.index], points[shift.index + 1]);
            let (a, b) = if shift.vertical {
                (a.with_x(shift.coord), b.with_x(shift.coord))
            } else {
                (a.with_y(shift.coord), b.with_y(shift.coord))
            };
            if avoids_nodes {
                let Some(swept) = Bounds::enclosing([a, b]) else {
                    continue;
                };
                if !self.is_unoccupied(&swept, None) {
                    trace!(link:?, index = shift.index; "Segment shift blocked by an avoidable part");
                    continue;
                }
            }
            points[shift.index] = a;
            points[shift.index + 1] = b;
        }
        self.set_link_points(link, points)
    }
}

/// Splits segments sorted by start into runs whose intervals overlap.
fn overlapping_clusters(segments: &[Segment]) -> Vec<&[Segment]> {
    let mut clusters = Vec::new();
    let mut first = 0;
    let mut reach = f32::NEG_INFINITY;
    for (i, segment) in segments.iter().enumerate() {
        if i > first && segment.start >= reach {
            clusters.push(&segments[first..i]);
            first = i;
            reach = segment.end;
        } else {
            reach = reach.max(segment.end);
        }
    }
    if first < segments.len() {
        clusters.push(&segments[first..]);
    }
    clusters
}
