use gpx::TrackSegment;

/// Collapses `segments` into at most one segment by repeatedly appending the
/// second segment onto the first. Points are never re-sorted, so if the
/// segments were recorded out of order the merged timestamps will not be
/// monotonic.
pub fn merge_segments(segments: &mut Vec<TrackSegment>) {
    while segments.len() > 1 {
        let next = segments.remove(1);
        segments[0].points.extend(next.points);
    }
}
