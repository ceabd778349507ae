//! Choose which located faces get classified this cycle.

use crate::types::Rectangle;
use std::cmp::Reverse;

/// Default number of faces classified per frame.
pub const DEFAULT_MAX_FACES: usize = 2;

/// Return at most `max_faces` rectangles, largest area first.
///
/// The sort is stable, so equal-area faces keep their detection order.
pub fn select_faces(located: &[Rectangle], max_faces: usize) -> Vec<Rectangle> {
    let mut selected = located.to_vec();
    selected.sort_by_key(|r| Reverse(r.area()));
    selected.truncate(max_faces);
    selected
}
