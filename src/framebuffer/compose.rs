//! Tree compositing: laid-out store nodes → framebuffer cells.
//!
//! Nodes paint in pre-order so children cover their parents. Per node the
//! order is background, content, children, then border, which keeps the
//! border ring on top of anything that reached the edge cells.
//!
//! Screen position accumulates down the parent chain:
//!
//! ```text
//! screen = parent_screen + computed_offset − parent_scroll
//! ```
//!
//! Coordinates stay signed until the final cell write; content scrolled
//! out of view sits at negative positions and the clip chain drops it.
//! A child subtree is clipped by every ancestor whose overflow is not
//! `visible`.

use crate::layout::text_measure::{clip_to_width, display_width, wrap_words};
use crate::store::Store;
use crate::types::{
    Attr, BorderStyle, ClipRect, ComponentType, Overflow, Rgba, TextAlign, TextWrap, unpack_color,
};

use super::{BorderSides, FrameBuffer};

/// A screen rectangle owned by a node, for mouse hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRegion {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub node: usize,
}

/// Where the focused input wants the hardware cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub x: u16,
    pub y: u16,
    /// 0 block, 1 bar, 2 underline.
    pub style: u8,
}

/// Everything a compose pass produces besides the cells.
#[derive(Debug, Default)]
pub struct ComposeOutput {
    pub hit_regions: Vec<HitRegion>,
    pub caret: Option<Caret>,
}

/// Unset store colors (packed 0) mean "terminal default" for foregrounds
/// and "transparent" for backgrounds.
#[inline]
fn fg_of(packed: u32) -> Rgba {
    if packed == 0 {
        Rgba::TERMINAL_DEFAULT
    } else {
        unpack_color(packed)
    }
}

#[inline]
fn bg_of(packed: u32) -> Rgba {
    if packed == 0 {
        Rgba::TRANSPARENT
    } else {
        unpack_color(packed)
    }
}

/// Compose the whole tree into `fb`.
pub fn compose(store: &Store, fb: &mut FrameBuffer) -> ComposeOutput {
    fb.clear();
    let mut out = ComposeOutput::default();

    let count = store.node_count();
    if count == 0 {
        return out;
    }

    // Child map in paint order: sibling order first, then stacking.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut roots: Vec<usize> = Vec::new();
    for i in 0..count {
        if store.component_type(i) == ComponentType::None as u8 || !store.visible(i) {
            continue;
        }
        match store.parent_index(i) {
            Some(p) if p < count => children[p].push(i),
            _ => roots.push(i),
        }
    }
    for list in children.iter_mut() {
        list.sort_by_key(|&c| store.sibling_order(c));
        list.sort_by_key(|&c| store.hit_z(c));
    }
    roots.sort_by_key(|&r| store.hit_z(r));

    let screen = fb.bounds();
    for &root in &roots {
        paint_node(store, fb, root, &children, &mut out, &screen, 0, 0);
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn paint_node(
    store: &Store,
    fb: &mut FrameBuffer,
    node: usize,
    children: &[Vec<usize>],
    out: &mut ComposeOutput,
    clip: &ClipRect,
    parent_x: i32,
    parent_y: i32,
) {
    if store.component_type(node) == ComponentType::None as u8 || !store.visible(node) {
        return;
    }

    let w = store.computed_w(node).max(0.0) as u16;
    let h = store.computed_h(node).max(0.0) as u16;
    if w == 0 || h == 0 {
        return;
    }

    // Transform through the parent's scroll offset.
    let (scroll_x, scroll_y) = match store.parent_index(node) {
        Some(p) => (store.scroll_x(p) as i32, store.scroll_y(p) as i32),
        None => (0, 0),
    };
    let x = parent_x + store.computed_x(node) as i32 - scroll_x;
    let y = parent_y + store.computed_y(node) as i32 - scroll_y;

    let bounds = ClipRect::new(x, y, w, h);
    let Some(paint_clip) = bounds.intersect(clip) else {
        return;
    };

    // Background.
    let bg = bg_of(store.bg_color(node));
    if !bg.is_transparent() {
        fb.fill_rect(x, y, w, h, bg, Some(&paint_clip));
    }

    // Hit region for the visible portion; later writes overwrite earlier
    // ones in the grid, so the topmost node wins.
    if let Some((vx, vy, vw, vh)) = paint_clip.visible_on_screen() {
        out.hit_regions.push(HitRegion {
            x: vx,
            y: vy,
            width: vw,
            height: vh,
            node,
        });
    }

    // Content box.
    let bt = if store.border_t_width(node) > 0 { 1 } else { 0 };
    let br = if store.border_r_width(node) > 0 { 1 } else { 0 };
    let bb = if store.border_b_width(node) > 0 { 1 } else { 0 };
    let bl = if store.border_l_width(node) > 0 { 1 } else { 0 };
    let pad_t = store.padding_t(node).max(0.0) as i32;
    let pad_r = store.padding_r(node).max(0.0) as i32;
    let pad_b = store.padding_b(node).max(0.0) as i32;
    let pad_l = store.padding_l(node).max(0.0) as i32;
    let content_x = x + bl + pad_l;
    let content_y = y + bt + pad_t;
    let content_w = (w as i32 - bl - br - pad_l - pad_r).max(0) as u16;
    let content_h = (h as i32 - bt - bb - pad_t - pad_b).max(0) as u16;
    let content_box = ClipRect::new(content_x, content_y, content_w, content_h);

    let ty = ComponentType::from(store.component_type(node));
    if content_w > 0 && content_h > 0 {
        if let Some(content_clip) = content_box.intersect(&paint_clip) {
            match ty {
                ComponentType::Text => {
                    paint_text(store, fb, node, &content_box, &content_clip);
                }
                ComponentType::Input => {
                    paint_input(store, fb, node, &content_box, &content_clip, out);
                }
                ComponentType::Box | ComponentType::None => {}
            }
        }
    }

    // Children, clipped by this node only when its overflow says so.
    let child_clip = if Overflow::from(store.overflow(node)).clips() {
        content_box.intersect(&paint_clip)
    } else {
        Some(paint_clip)
    };
    if let Some(child_clip) = child_clip {
        for &child in &children[node] {
            paint_node(store, fb, child, children, out, &child_clip, content_x, content_y);
        }
    }

    // Border ring last, over anything that reached the edge.
    let style = BorderStyle::from(store.border_style(node));
    let sides = BorderSides {
        top: bt > 0,
        right: br > 0,
        bottom: bb > 0,
        left: bl > 0,
    };
    if style != BorderStyle::None && sides != BorderSides::NONE {
        let color = fg_of(store.border_color(node));
        fb.draw_border(x, y, w, h, style, sides, color, Some(&paint_clip));
    }
}

fn paint_text(
    store: &Store,
    fb: &mut FrameBuffer,
    node: usize,
    content: &ClipRect,
    clip: &ClipRect,
) {
    let text = store.text(node);
    if text.is_empty() {
        return;
    }
    let fg = fg_of(store.fg_color(node));
    let bg = bg_of(store.bg_color(node));
    let bg = if bg.is_transparent() { None } else { Some(bg) };
    let attrs = Attr::from_bits_truncate(store.attrs(node));
    let align = TextAlign::from(store.text_align(node));
    let width = content.width as usize;

    let lines: Vec<String> = match TextWrap::from(store.text_wrap(node)) {
        TextWrap::Wrap => wrap_words(text, width),
        TextWrap::NoWrap => text.split('\n').map(str::to_string).collect(),
        TextWrap::Truncate => text
            .split('\n')
            .map(|line| clip_to_width(line, width, "…"))
            .collect(),
    };

    for (li, line) in lines.iter().enumerate() {
        let row = content.y + li as i32;
        if row >= content.y + content.height as i32 {
            break;
        }
        let line_w = display_width(line) as i32;
        let col = match align {
            TextAlign::Left => content.x,
            TextAlign::Center => content.x + (content.width as i32 - line_w).max(0) / 2,
            TextAlign::Right => content.x + (content.width as i32 - line_w).max(0),
        };
        fb.draw_text(col, row, line, fg, bg, attrs, Some(clip));
    }
}

fn paint_input(
    store: &Store,
    fb: &mut FrameBuffer,
    node: usize,
    content: &ClipRect,
    clip: &ClipRect,
    out: &mut ComposeOutput,
) {
    let text = store.text(node);
    let fg = fg_of(store.fg_color(node));
    let bg = bg_of(store.bg_color(node));
    let bg = if bg.is_transparent() { None } else { Some(bg) };
    let attrs = Attr::from_bits_truncate(store.attrs(node));
    let width = content.width as usize;

    // Single line, horizontally scrolled so the caret stays in view.
    let caret_chars = store.caret(node).max(0) as usize;
    let caret_cells: usize = text
        .chars()
        .take(caret_chars)
        .map(|c| super::cluster_width(c.encode_utf8(&mut [0u8; 4])))
        .sum();
    let shift = caret_cells.saturating_sub(width.saturating_sub(1));

    let visible: String = {
        let mut cells = 0usize;
        let mut skipped = String::new();
        for c in text.chars() {
            let cw = super::cluster_width(c.encode_utf8(&mut [0u8; 4]));
            if cells >= shift {
                skipped.push(c);
            }
            cells += cw;
        }
        clip_to_width(&skipped, width, "")
    };
    fb.draw_text(content.x, content.y, &visible, fg, bg, attrs, Some(clip));

    if store.focused_index() == Some(node) {
        let col = content.x + (caret_cells - shift) as i32;
        if clip.contains(col, content.y) && col >= 0 && content.y >= 0 {
            out.caret = Some(Caret {
                x: col as u16,
                y: content.y as u16,
                style: store.cursor_style(node),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use crate::types::{Dimension, pack_color};

    fn setup() -> (Store, FrameBuffer) {
        let store = Store::allocate(StoreConfig {
            capacity: 32,
            text_pool_size: 2048,
            ring_size: 8,
        })
        .unwrap();
        store.set_terminal_size(20, 6);
        (store, FrameBuffer::new(20, 6))
    }

    fn laid_out_box(store: &Store, parent: Option<usize>, x: f32, y: f32, w: f32, h: f32) -> usize {
        let i = store.reserve_node().unwrap();
        store.set_component_type(i, ComponentType::Box as u8);
        store.set_parent(i, parent).unwrap();
        store.set_computed_x(i, x);
        store.set_computed_y(i, y);
        store.set_computed_w(i, w);
        store.set_computed_h(i, h);
        i
    }

    fn row_string(fb: &FrameBuffer, y: u16) -> String {
        (0..fb.width())
            .filter_map(|x| fb.get(x, y))
            .filter(|c| c.glyph != 0)
            .map(|c| char::from_u32(c.glyph).unwrap_or(' '))
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[test]
    fn background_fill() {
        let (store, mut fb) = setup();
        let b = laid_out_box(&store, None, 0.0, 0.0, 4.0, 2.0);
        store.set_bg_color(b, pack_color(Rgba::BLUE));
        compose(&store, &mut fb);
        assert_eq!(fb.get(0, 0).unwrap().bg, Rgba::BLUE);
        assert_eq!(fb.get(3, 1).unwrap().bg, Rgba::BLUE);
        assert_eq!(fb.get(4, 0).unwrap().bg, Rgba::TERMINAL_DEFAULT);
    }

    #[test]
    fn text_paints_at_content_origin() {
        let (store, mut fb) = setup();
        let root = laid_out_box(&store, None, 0.0, 0.0, 20.0, 6.0);
        let t = store.reserve_node().unwrap();
        store.set_component_type(t, ComponentType::Text as u8);
        store.set_parent(t, Some(root)).unwrap();
        store.set_computed_x(t, 2.0);
        store.set_computed_y(t, 1.0);
        store.set_computed_w(t, 10.0);
        store.set_computed_h(t, 1.0);
        store.write_text(t, "hi").unwrap();
        compose(&store, &mut fb);
        assert_eq!(fb.get(2, 1).unwrap().glyph, 'h' as u32);
        assert_eq!(fb.get(3, 1).unwrap().glyph, 'i' as u32);
    }

    #[test]
    fn child_scrolled_out_is_clipped() {
        let (store, mut fb) = setup();
        let outer = laid_out_box(&store, None, 0.0, 0.0, 20.0, 3.0);
        store.set_overflow(outer, Overflow::Scroll as u8);
        store.set_scroll_y(outer, 2.0);
        let inner = store.reserve_node().unwrap();
        store.set_component_type(inner, ComponentType::Text as u8);
        store.set_parent(inner, Some(outer)).unwrap();
        store.set_computed_x(inner, 0.0);
        store.set_computed_y(inner, 0.0);
        store.set_computed_w(inner, 5.0);
        store.set_computed_h(inner, 1.0);
        store.write_text(inner, "gone").unwrap();
        compose(&store, &mut fb);
        // Scrolled 2 rows up out of a 3-row viewport: the row-0 text now
        // sits at y = -2, fully clipped.
        assert_eq!(row_string(&fb, 0).trim(), "");
    }

    #[test]
    fn overflow_visible_does_not_clip_children() {
        let (store, mut fb) = setup();
        let parent = laid_out_box(&store, None, 0.0, 0.0, 4.0, 2.0);
        let child = store.reserve_node().unwrap();
        store.set_component_type(child, ComponentType::Text as u8);
        store.set_parent(child, Some(parent)).unwrap();
        store.set_computed_x(child, 6.0);
        store.set_computed_y(child, 0.0);
        store.set_computed_w(child, 5.0);
        store.set_computed_h(child, 1.0);
        store.write_text(child, "out").unwrap();
        compose(&store, &mut fb);
        assert_eq!(fb.get(6, 0).unwrap().glyph, 'o' as u32);
    }

    #[test]
    fn overflow_hidden_clips_children() {
        let (store, mut fb) = setup();
        let parent = laid_out_box(&store, None, 0.0, 0.0, 4.0, 2.0);
        store.set_overflow(parent, Overflow::Hidden as u8);
        let child = store.reserve_node().unwrap();
        store.set_component_type(child, ComponentType::Text as u8);
        store.set_parent(child, Some(parent)).unwrap();
        store.set_computed_x(child, 6.0);
        store.set_computed_y(child, 0.0);
        store.set_computed_w(child, 5.0);
        store.set_computed_h(child, 1.0);
        store.write_text(child, "out").unwrap();
        compose(&store, &mut fb);
        assert_eq!(fb.get(6, 0).unwrap().glyph, b' ' as u32);
    }

    #[test]
    fn border_drawn_over_edge() {
        let (store, mut fb) = setup();
        let b = laid_out_box(&store, None, 0.0, 0.0, 6.0, 3.0);
        store.set_border_style(b, BorderStyle::Single as u8);
        store.set_border_t_width(b, 1);
        store.set_border_r_width(b, 1);
        store.set_border_b_width(b, 1);
        store.set_border_l_width(b, 1);
        compose(&store, &mut fb);
        assert_eq!(fb.get(0, 0).unwrap().glyph, '┌' as u32);
        assert_eq!(fb.get(5, 2).unwrap().glyph, '┘' as u32);
    }

    #[test]
    fn hit_regions_topmost_last() {
        let (store, mut fb) = setup();
        let a = laid_out_box(&store, None, 0.0, 0.0, 10.0, 3.0);
        let b = laid_out_box(&store, Some(a), 1.0, 1.0, 4.0, 1.0);
        let out = compose(&store, &mut fb);
        assert_eq!(out.hit_regions.len(), 2);
        assert_eq!(out.hit_regions[0].node, a);
        assert_eq!(out.hit_regions[1].node, b);
    }

    #[test]
    fn focused_input_reports_caret() {
        let (store, mut fb) = setup();
        let root = laid_out_box(&store, None, 0.0, 0.0, 20.0, 3.0);
        let input = store.reserve_node().unwrap();
        store.set_component_type(input, ComponentType::Input as u8);
        store.set_parent(input, Some(root)).unwrap();
        store.set_computed_x(input, 1.0);
        store.set_computed_y(input, 1.0);
        store.set_computed_w(input, 10.0);
        store.set_computed_h(input, 1.0);
        store.write_text(input, "abc").unwrap();
        store.set_caret(input, 2);
        store.set_focused_index(Some(input));
        let out = compose(&store, &mut fb);
        let caret = out.caret.unwrap();
        assert_eq!((caret.x, caret.y), (3, 1));
    }

    #[test]
    fn hit_z_orders_siblings() {
        let (store, mut fb) = setup();
        let root = laid_out_box(&store, None, 0.0, 0.0, 20.0, 3.0);
        let low = laid_out_box(&store, Some(root), 0.0, 0.0, 5.0, 1.0);
        let high = laid_out_box(&store, Some(root), 0.0, 0.0, 5.0, 1.0);
        store.set_hit_z(low, 5);
        store.set_hit_z(high, 1);
        store.set_bg_color(low, pack_color(Rgba::RED));
        store.set_bg_color(high, pack_color(Rgba::BLUE));
        compose(&store, &mut fb);
        // The node with the greater z paints later and wins the cells.
        assert_eq!(fb.get(0, 0).unwrap().bg, Rgba::RED);
    }

    #[test]
    fn text_alignment() {
        let (store, mut fb) = setup();
        let root = laid_out_box(&store, None, 0.0, 0.0, 10.0, 2.0);
        let t = store.reserve_node().unwrap();
        store.set_component_type(t, ComponentType::Text as u8);
        store.set_parent(t, Some(root)).unwrap();
        store.set_computed_w(t, 10.0);
        store.set_computed_h(t, 1.0);
        store.write_text(t, "hi").unwrap();
        store.set_text_align(t, TextAlign::Right as u8);
        compose(&store, &mut fb);
        assert_eq!(fb.get(8, 0).unwrap().glyph, 'h' as u32);
        assert_eq!(fb.get(9, 0).unwrap().glyph, 'i' as u32);
    }

    #[test]
    fn truncate_mode_adds_ellipsis() {
        let (store, mut fb) = setup();
        let root = laid_out_box(&store, None, 0.0, 0.0, 5.0, 1.0);
        let t = store.reserve_node().unwrap();
        store.set_component_type(t, ComponentType::Text as u8);
        store.set_parent(t, Some(root)).unwrap();
        store.set_computed_w(t, 5.0);
        store.set_computed_h(t, 1.0);
        store.write_text(t, "overlong").unwrap();
        store.set_text_wrap(t, TextWrap::Truncate as u8);
        compose(&store, &mut fb);
        assert_eq!(row_string(&fb, 0), "over…");
    }

    #[test]
    fn width_dimension_unused_is_fine() {
        // Compose reads computed outputs only; style dims are layout's
        // concern. Regression guard for the phase split.
        let (store, mut fb) = setup();
        let b = laid_out_box(&store, None, 0.0, 0.0, 3.0, 1.0);
        store.set_width(b, Dimension::Percent(50.0).encode());
        compose(&store, &mut fb);
        assert_eq!(fb.get(0, 0).unwrap().bg, Rgba::TERMINAL_DEFAULT);
    }
}
