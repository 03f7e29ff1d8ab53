/*!
 * Row-then-column reading order for the text blocks of a page.
 *
 * Blocks are bucketed into rows by vertical center: a block joins the
 * current row when its center lies within `row_gap_threshold` points of the
 * center of the row's first block. Rows read top to bottom, blocks within a
 * row read left to right.
 */

use std::cmp::Ordering;

use super::model::TextBlock;

fn by_center_then_x(a: &TextBlock, b: &TextBlock) -> Ordering {
    a.bbox
        .center_y()
        .total_cmp(&b.bbox.center_y())
        .then_with(|| a.bbox.x.total_cmp(&b.bbox.x))
}

/// Sort `blocks` into reading order and renumber `reading_order` from zero
pub fn assign_reading_order(blocks: &mut Vec<TextBlock>, row_gap_threshold: f32) {
    if blocks.is_empty() {
        return;
    }
    blocks.sort_by(by_center_then_x);

    let mut rows: Vec<Vec<TextBlock>> = Vec::new();
    let mut row_anchor = f32::NEG_INFINITY;
    for block in blocks.drain(..) {
        let center = block.bbox.center_y();
        match rows.last_mut() {
            Some(row) if center - row_anchor <= row_gap_threshold => row.push(block),
            _ => {
                row_anchor = center;
                rows.push(vec![block]);
            }
        }
    }

    for mut row in rows {
        row.sort_by(|a, b| a.bbox.x.total_cmp(&b.bbox.x).then_with(|| by_center_then_x(a, b)));
        blocks.extend(row);
    }
    for (index, block) in blocks.iter_mut().enumerate() {
        block.reading_order = index;
    }
}
