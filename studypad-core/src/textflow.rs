//! Reconstructs readable page text from positioned extraction items.
//!
//! The raw item stream carries no line or word structure: items are grouped
//! into lines by baseline proximity, ordered top-to-bottom (descending y in
//! PDF coordinate space) and left-to-right, and word spacing is re-inserted
//! only where the geometry shows an actual gap.

use serde::{Deserialize, Serialize};

/// One positioned text item in PDF coordinate space (y grows upward).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// Baseline jitter tolerated when grouping items into one line.
const LINE_Y_TOLERANCE: f32 = 6.0;

/// Horizontal gap above which adjacent items get a separating space.
const WORD_GAP_THRESHOLD: f32 = 3.0;

pub fn reconstruct_page_text(items: &[TextItem]) -> String {
    let mut lines: Vec<(f32, Vec<&TextItem>)> = Vec::new();

    for item in items {
        if item.text.is_empty() {
            continue;
        }
        match lines
            .iter_mut()
            .find(|(anchor, _)| (item.y - *anchor).abs() <= LINE_Y_TOLERANCE)
        {
            Some((_, line)) => line.push(item),
            None => lines.push((item.y, vec![item])),
        }
    }

    // PDF y grows upward, so the topmost line has the largest y.
    lines.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut out = String::new();
    for (index, (_, mut line)) in lines.into_iter().enumerate() {
        line.sort_by(|a, b| a.x.total_cmp(&b.x));

        if index > 0 {
            out.push('\n');
        }
        let mut previous_right: Option<f32> = None;
        for item in line {
            if let Some(right) = previous_right {
                if item.x - right > WORD_GAP_THRESHOLD {
                    out.push(' ');
                }
            }
            out.push_str(&item.text);
            previous_right = Some(item.x + item.width);
        }
    }

    out
}

/// Concatenates reconstructed pages, each headed by a 1-based page marker,
/// into the context blob pushed to the tutoring collaborator.
pub fn compose_context(pages: &[(usize, String)]) -> String {
    let mut out = String::new();
    for (index, (page_index, text)) in pages.iter().enumerate() {
        if index > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&format!("[Page {}]\n{}", page_index + 1, text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, x: f32, y: f32, width: f32) -> TextItem {
        TextItem {
            text: text.to_string(),
            x,
            y,
            width,
        }
    }

    #[test]
    fn items_within_tolerance_share_a_line() {
        let items = [item("Hello", 10.0, 100.0, 30.0), item("World", 45.0, 104.0, 30.0)];
        assert_eq!(reconstruct_page_text(&items), "Hello World");
    }

    #[test]
    fn items_outside_tolerance_split_lines() {
        let items = [item("Hello", 10.0, 110.0, 30.0), item("World", 10.0, 100.0, 30.0)];
        assert_eq!(reconstruct_page_text(&items), "Hello\nWorld");
    }

    #[test]
    fn lines_order_top_to_bottom_by_descending_y() {
        let items = [
            item("bottom", 0.0, 20.0, 30.0),
            item("top", 0.0, 700.0, 20.0),
            item("middle", 0.0, 350.0, 30.0),
        ];
        assert_eq!(reconstruct_page_text(&items), "top\nmiddle\nbottom");
    }

    #[test]
    fn gap_of_exactly_three_units_does_not_insert_space() {
        // "Hello" ends at x=50; "World" starts at x=53 -> gap 3, not > 3.
        let items = [item("Hello", 20.0, 100.0, 30.0), item("World", 53.0, 100.0, 30.0)];
        assert_eq!(reconstruct_page_text(&items), "HelloWorld");
    }

    #[test]
    fn gap_above_threshold_inserts_space() {
        let items = [item("Hello", 20.0, 100.0, 30.0), item("World", 54.0, 100.0, 30.0)];
        assert_eq!(reconstruct_page_text(&items), "Hello World");
    }

    #[test]
    fn items_arrive_unsorted_within_a_line() {
        let items = [
            item("World", 54.0, 100.0, 30.0),
            item("Hello", 20.0, 102.0, 30.0),
        ];
        assert_eq!(reconstruct_page_text(&items), "Hello World");
    }

    #[test]
    fn empty_items_are_skipped() {
        let items = [item("", 0.0, 100.0, 0.0), item("only", 10.0, 100.0, 20.0)];
        assert_eq!(reconstruct_page_text(&items), "only");
    }

    #[test]
    fn context_marks_pages_one_based() {
        let pages = vec![
            (1, "second page".to_string()),
            (2, "third page".to_string()),
        ];
        assert_eq!(
            compose_context(&pages),
            "[Page 2]\nsecond page\n\n[Page 3]\nthird page"
        );
    }

    #[test]
    fn empty_window_composes_to_empty_context() {
        assert_eq!(compose_context(&[]), "");
    }
}
