//! Flexbox layout over the node store.
//!
//! # Passes
//!
//! 1. Validate parent links and build the parent→children adjacency
//! 2. BFS traversal for parents-before-children order
//! 3. Intrinsic sizes, bottom-up (text measured in terminal cells)
//! 4. Flex resolution and positioning, top-down
//! 5. Absolutely positioned nodes against their parent's padding box
//!
//! Sizes and positions are solved in `f32` and rounded to the cell grid
//! only when written back, using endpoint rounding so a row of items
//! always fills exactly the space the float math gave it: the last item
//! absorbs any rounding residue.
//!
//! Computed positions are relative to the parent's content box; the
//! compositor accumulates them through the ancestor chain and applies
//! scroll offsets on the way down.

pub mod text_measure;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{
    AlignContent, AlignItems, AlignSelf, ComponentType, Dimension, Display, FlexDirection,
    FlexWrap, JustifyContent, Overflow, Position, TextWrap,
};
use text_measure::{display_width, wrapped_height};

// =============================================================================
// Context
// =============================================================================

/// Working state reused across frames to avoid reallocation.
#[derive(Default)]
pub struct LayoutContext {
    live: Vec<bool>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    order: Vec<usize>,
    intrinsic_w: Vec<f32>,
    intrinsic_h: Vec<f32>,
    pos_x: Vec<f32>,
    pos_y: Vec<f32>,
    size_w: Vec<f32>,
    size_h: Vec<f32>,
}

impl LayoutContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, count: usize) {
        self.live.clear();
        self.live.resize(count, false);
        if self.children.len() < count {
            self.children.resize_with(count, Vec::new);
        }
        for list in self.children.iter_mut().take(count) {
            list.clear();
        }
        self.roots.clear();
        self.order.clear();
        for v in [&mut self.intrinsic_w, &mut self.intrinsic_h] {
            v.clear();
            v.resize(count, 0.0);
        }
        for v in [
            &mut self.pos_x,
            &mut self.pos_y,
            &mut self.size_w,
            &mut self.size_h,
        ] {
            v.clear();
            v.resize(count, 0.0);
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Non-finite style inputs are clamped to zero (NaN-as-auto is decoded
/// before this applies).
#[inline]
fn sane(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

#[inline]
fn resolve_dim(encoded: f32, base: f32) -> Option<f32> {
    Dimension::decode(encoded).resolve(base).map(sane)
}

/// Apply min/max constraints, percents resolved against `base`.
fn clamp_dim(value: f32, min_enc: f32, max_enc: f32, base: f32) -> f32 {
    let mut v = value;
    if let Some(max) = resolve_dim(max_enc, base) {
        v = v.min(max);
    }
    if let Some(min) = resolve_dim(min_enc, base) {
        v = v.max(min);
    }
    v.max(0.0)
}

struct Edges {
    t: f32,
    r: f32,
    b: f32,
    l: f32,
}

impl Edges {
    fn horizontal(&self) -> f32 {
        self.l + self.r
    }

    fn vertical(&self) -> f32 {
        self.t + self.b
    }
}

fn padding(store: &Store, i: usize) -> Edges {
    Edges {
        t: sane(store.padding_t(i)),
        r: sane(store.padding_r(i)),
        b: sane(store.padding_b(i)),
        l: sane(store.padding_l(i)),
    }
}

fn margin(store: &Store, i: usize) -> Edges {
    Edges {
        t: sane(store.margin_t(i)),
        r: sane(store.margin_r(i)),
        b: sane(store.margin_b(i)),
        l: sane(store.margin_l(i)),
    }
}

fn border(store: &Store, i: usize) -> Edges {
    Edges {
        t: if store.border_t_width(i) > 0 { 1.0 } else { 0.0 },
        r: if store.border_r_width(i) > 0 { 1.0 } else { 0.0 },
        b: if store.border_b_width(i) > 0 { 1.0 } else { 0.0 },
        l: if store.border_l_width(i) > 0 { 1.0 } else { 0.0 },
    }
}

/// Intrinsic text width: the widest unwrapped line.
fn text_intrinsic_width(text: &str) -> f32 {
    text.split('\n')
        .map(display_width)
        .max()
        .unwrap_or(0) as f32
}

// =============================================================================
// Entry point
// =============================================================================

/// Compute layout for every visible node.
///
/// `constrain_height` pins root heights to the terminal (fullscreen
/// mode); inline mode lets roots take their content height.
pub fn compute_layout(
    store: &Store,
    ctx: &mut LayoutContext,
    constrain_height: bool,
) -> Result<()> {
    let count = store.node_count();
    ctx.reset(count);
    if count == 0 {
        return Ok(());
    }

    let (term_w, term_h) = store.terminal_size();
    let term_w = term_w as f32;
    let term_h = term_h as f32;

    // Pass 1: validate links, mark the live set, build adjacency.
    // A node is live when it has a component, is visible, and its parent
    // (if any) is live; index order guarantees parents are decided first.
    for i in 0..count {
        match store.parent_index(i) {
            Some(p) if p >= i => return Err(Error::InvalidTree { node: i }),
            _ => {}
        }

        let hidden = store.component_type(i) == ComponentType::None as u8
            || !store.visible(i)
            || Display::from(store.display(i)) == Display::None;
        if hidden {
            continue;
        }

        match store.parent_index(i) {
            Some(p) => {
                if ctx.live[p] {
                    ctx.live[i] = true;
                    ctx.children[p].push(i);
                }
            }
            None => {
                ctx.live[i] = true;
                ctx.roots.push(i);
            }
        }
    }

    // Keyed reconcilers reorder siblings by rewriting sibling_order; the
    // sort is stable so untouched lists keep index order.
    for list in ctx.children.iter_mut().take(count) {
        if list.len() > 1 {
            list.sort_by_key(|&c| store.sibling_order(c));
        }
    }

    // Pass 2: BFS for parents-before-children order.
    ctx.order.extend_from_slice(&ctx.roots);
    let mut head = 0;
    while head < ctx.order.len() {
        let parent = ctx.order[head];
        head += 1;
        for i in 0..ctx.children[parent].len() {
            let child = ctx.children[parent][i];
            ctx.order.push(child);
        }
    }

    // Pass 3: intrinsic sizes, bottom-up.
    for idx in (0..ctx.order.len()).rev() {
        let i = ctx.order[idx];
        measure_intrinsic(store, ctx, i, term_w);
    }

    // Pass 4: size roots, then lay out children top-down.
    for r in 0..ctx.roots.len() {
        let root = ctx.roots[r];
        let w = resolve_dim(store.width(root), term_w).unwrap_or(term_w);
        let h = match resolve_dim(store.height(root), term_h) {
            Some(h) => h,
            None if constrain_height => term_h,
            None => ctx.intrinsic_h[root].max(1.0),
        };
        ctx.pos_x[root] = 0.0;
        ctx.pos_y[root] = 0.0;
        ctx.size_w[root] = w;
        ctx.size_h[root] = h;
    }

    for idx in 0..ctx.order.len() {
        let parent = ctx.order[idx];
        layout_children(store, ctx, parent);
    }

    // Pass 5: absolute positioning against the parent's padding box.
    for idx in 0..ctx.order.len() {
        let i = ctx.order[idx];
        if Position::from(store.position(i)) == Position::Absolute {
            layout_absolute(store, ctx, i, term_w, term_h);
        }
    }

    write_outputs(store, ctx, count);
    Ok(())
}

// =============================================================================
// Pass 3: intrinsic measurement
// =============================================================================

fn measure_intrinsic(store: &Store, ctx: &mut LayoutContext, i: usize, term_w: f32) {
    let ty = ComponentType::from(store.component_type(i));
    match ty {
        ComponentType::Text => {
            let text = store.text(i);
            if text.is_empty() {
                return;
            }
            let w = text_intrinsic_width(text);
            // Height before wrapping; re-measured once the final width is
            // known in pass 4.
            let h = text.split('\n').count() as f32;
            ctx.intrinsic_w[i] = w;
            ctx.intrinsic_h[i] = h;
        }
        ComponentType::Input => {
            let pad = padding(store, i);
            let bord = border(store, i);
            ctx.intrinsic_w[i] =
                display_width(store.text(i)) as f32 + 1.0 + pad.horizontal() + bord.horizontal();
            ctx.intrinsic_h[i] = 1.0 + pad.vertical() + bord.vertical();
        }
        ComponentType::Box => {
            let dir = FlexDirection::from(store.flex_direction(i));
            let pad = padding(store, i);
            let bord = border(store, i);
            let (main_gap, _) = gaps(store, i, dir);

            let mut sum_main = 0.0f32;
            let mut max_cross = 0.0f32;
            let mut flow_count = 0u32;
            for idx in 0..ctx.children[i].len() {
                let c = ctx.children[i][idx];
                if Position::from(store.position(c)) == Position::Absolute {
                    continue;
                }
                flow_count += 1;
                let m = margin(store, c);
                let cw = resolve_dim(store.width(c), term_w).unwrap_or(ctx.intrinsic_w[c]);
                let ch = resolve_dim(store.height(c), term_w).unwrap_or(ctx.intrinsic_h[c]);
                if dir.is_row() {
                    sum_main += cw + m.horizontal();
                    max_cross = max_cross.max(ch + m.vertical());
                } else {
                    sum_main += ch + m.vertical();
                    max_cross = max_cross.max(cw + m.horizontal());
                }
            }
            if flow_count > 1 {
                sum_main += main_gap * (flow_count - 1) as f32;
            }

            let extra_w = pad.horizontal() + bord.horizontal();
            let extra_h = pad.vertical() + bord.vertical();
            if dir.is_row() {
                ctx.intrinsic_w[i] = sum_main + extra_w;
                ctx.intrinsic_h[i] = max_cross + extra_h;
            } else {
                ctx.intrinsic_w[i] = max_cross + extra_w;
                ctx.intrinsic_h[i] = sum_main + extra_h;
            }
        }
        ComponentType::None => {}
    }
}

/// Main-axis and cross-axis (line) gaps for a container.
fn gaps(store: &Store, i: usize, dir: FlexDirection) -> (f32, f32) {
    let base = sane(store.gap(i));
    let row = {
        let v = sane(store.row_gap(i));
        if v != 0.0 { v } else { base }
    };
    let col = {
        let v = sane(store.column_gap(i));
        if v != 0.0 { v } else { base }
    };
    if dir.is_row() { (col, row) } else { (row, col) }
}

// =============================================================================
// Pass 4: flex resolution
// =============================================================================

struct FlexItem {
    node: usize,
    base_main: f32,
    main: f32,
    cross: f32,
    margin_main_start: f32,
    margin_main_end: f32,
    margin_cross_start: f32,
    margin_cross_end: f32,
    grow: f32,
    shrink: f32,
}

fn layout_children(store: &Store, ctx: &mut LayoutContext, parent: usize) {
    if ctx.children[parent].is_empty() {
        return;
    }

    let dir = FlexDirection::from(store.flex_direction(parent));
    let wrap = FlexWrap::from(store.flex_wrap(parent));
    let justify = JustifyContent::from(store.justify_content(parent));
    let align_items = AlignItems::from(store.align_items(parent));
    let align_content = AlignContent::from(store.align_content(parent));
    let overflow = Overflow::from(store.overflow(parent));
    let (main_gap, line_gap) = gaps(store, parent, dir);

    let pad = padding(store, parent);
    let bord = border(store, parent);
    let inner_w = (ctx.size_w[parent] - pad.horizontal() - bord.horizontal()).max(0.0);
    let inner_h = (ctx.size_h[parent] - pad.vertical() - bord.vertical()).max(0.0);
    let (main_size, cross_size) = if dir.is_row() {
        (inner_w, inner_h)
    } else {
        (inner_h, inner_w)
    };

    // Collect flow items with their base sizes.
    let mut items: Vec<FlexItem> = Vec::new();
    for idx in 0..ctx.children[parent].len() {
        let c = ctx.children[parent][idx];
        if Position::from(store.position(c)) == Position::Absolute {
            continue;
        }
        let m = margin(store, c);
        let explicit_main = if dir.is_row() {
            resolve_dim(store.width(c), inner_w)
        } else {
            resolve_dim(store.height(c), inner_h)
        };
        let basis = resolve_dim(store.flex_basis(c), main_size);
        let intrinsic_main = if dir.is_row() {
            ctx.intrinsic_w[c]
        } else {
            ctx.intrinsic_h[c]
        };
        let base_main = basis.or(explicit_main).unwrap_or(intrinsic_main);

        let explicit_cross = if dir.is_row() {
            resolve_dim(store.height(c), inner_h)
        } else {
            resolve_dim(store.width(c), inner_w)
        };
        let intrinsic_cross = if dir.is_row() {
            ctx.intrinsic_h[c]
        } else {
            ctx.intrinsic_w[c]
        };

        let (mms, mme, mcs, mce) = if dir.is_row() {
            (m.l, m.r, m.t, m.b)
        } else {
            (m.t, m.b, m.l, m.r)
        };

        items.push(FlexItem {
            node: c,
            base_main,
            main: base_main,
            // Resolved fully after line cross sizes are known.
            cross: explicit_cross.unwrap_or(intrinsic_cross),
            margin_main_start: mms,
            margin_main_end: mme,
            margin_cross_start: mcs,
            margin_cross_end: mce,
            grow: sane(store.flex_grow(c)),
            shrink: sane(store.flex_shrink(c)),
        });
    }
    if items.is_empty() {
        return;
    }

    // Break into flex lines using base sizes.
    let mut lines: Vec<(usize, usize)> = Vec::new(); // [start, end)
    if wrap == FlexWrap::NoWrap {
        lines.push((0, items.len()));
    } else {
        let mut start = 0;
        let mut used = 0.0f32;
        for (fi, item) in items.iter().enumerate() {
            let outer = item.base_main + item.margin_main_start + item.margin_main_end;
            let extra = if fi > start { main_gap } else { 0.0 };
            if fi > start && used + extra + outer > main_size {
                lines.push((start, fi));
                start = fi;
                used = outer;
            } else {
                used += extra + outer;
            }
        }
        lines.push((start, items.len()));
    }

    // Resolve grow/shrink per line.
    let scroll_main = overflow.scrolls();
    for &(l_start, l_end) in &lines {
        let line = &mut items[l_start..l_end];
        let count = line.len() as f32;
        let gaps_total = main_gap * (count - 1.0);
        let outer_sum: f32 = line
            .iter()
            .map(|it| it.base_main + it.margin_main_start + it.margin_main_end)
            .sum();
        let free = main_size - outer_sum - gaps_total;

        if free > 0.0 {
            let total_grow: f32 = line.iter().map(|it| it.grow).sum();
            if total_grow > 0.0 {
                for it in line.iter_mut() {
                    it.main = it.base_main + free * it.grow / total_grow;
                }
            }
        } else if free < 0.0 && !scroll_main {
            let total_shrink: f32 = line.iter().map(|it| it.shrink).sum();
            if total_shrink > 0.0 {
                for it in line.iter_mut() {
                    it.main = (it.base_main + free * it.shrink / total_shrink).max(0.0);
                }
            }
        }

        for it in line.iter_mut() {
            let (min_enc, max_enc, base) = if dir.is_row() {
                (store.min_w(it.node), store.max_w(it.node), inner_w)
            } else {
                (store.min_h(it.node), store.max_h(it.node), inner_h)
            };
            it.main = clamp_dim(it.main, min_enc, max_enc, base);
        }
    }

    // Line cross sizes and align-content placement.
    let line_cross: Vec<f32> = lines
        .iter()
        .map(|&(s, e)| {
            items[s..e]
                .iter()
                .map(|it| it.cross + it.margin_cross_start + it.margin_cross_end)
                .fold(0.0f32, f32::max)
        })
        .collect();
    let lines_total: f32 =
        line_cross.iter().sum::<f32>() + line_gap * (lines.len() - 1) as f32;
    let cross_free = (cross_size - lines_total).max(0.0);

    let (mut cross_cursor, line_spacing, line_stretch) = if lines.len() == 1 {
        // A single line fills the cross axis.
        (0.0, 0.0, cross_free)
    } else {
        match align_content {
            AlignContent::Start => (0.0, 0.0, 0.0),
            AlignContent::End => (cross_free, 0.0, 0.0),
            AlignContent::Center => (cross_free / 2.0, 0.0, 0.0),
            AlignContent::Stretch => (0.0, 0.0, cross_free / lines.len() as f32),
            AlignContent::SpaceBetween => {
                (0.0, cross_free / (lines.len() - 1) as f32, 0.0)
            }
            AlignContent::SpaceAround => {
                let around = cross_free / lines.len() as f32;
                (around / 2.0, around, 0.0)
            }
        }
    };

    // Content origin inside the parent's border box.
    let (content_main_start, content_cross_start) = if dir.is_row() {
        (bord.l + pad.l, bord.t + pad.t)
    } else {
        (bord.t + pad.t, bord.l + pad.l)
    };

    let mut extent_main = 0.0f32;
    let mut extent_cross = 0.0f32;

    for (li, &(l_start, l_end)) in lines.iter().enumerate() {
        let this_line_cross = line_cross[li] + line_stretch;
        let count = (l_end - l_start) as f32;

        // Justify along the main axis. space-between with one item acts
        // like flex-start.
        let line_main: f32 = items[l_start..l_end]
            .iter()
            .map(|it| it.main + it.margin_main_start + it.margin_main_end)
            .sum::<f32>()
            + main_gap * (count - 1.0);
        let remaining = (main_size - line_main).max(0.0);
        let (mut main_cursor, item_spacing) = match justify {
            JustifyContent::Start => (0.0, 0.0),
            JustifyContent::End => (remaining, 0.0),
            JustifyContent::Center => (remaining / 2.0, 0.0),
            JustifyContent::SpaceBetween if count > 1.0 => {
                (0.0, remaining / (count - 1.0))
            }
            JustifyContent::SpaceBetween => (0.0, 0.0),
            JustifyContent::SpaceAround => {
                let around = remaining / count;
                (around / 2.0, around)
            }
            JustifyContent::SpaceEvenly => {
                let even = remaining / (count + 1.0);
                (even, even)
            }
        };

        for fi in l_start..l_end {
            let item = &mut items[fi];
            let node = item.node;

            // Cross size: stretch fills the line when the dimension is auto.
            let align = AlignSelf::from(store.align_self(node)).resolve(align_items);
            let cross_auto = if dir.is_row() {
                Dimension::decode(store.height(node)) == Dimension::Auto
            } else {
                Dimension::decode(store.width(node)) == Dimension::Auto
            };
            let mut cross = item.cross;
            if align == AlignItems::Stretch && cross_auto {
                cross = (this_line_cross - item.margin_cross_start - item.margin_cross_end)
                    .max(0.0);
            }
            let (min_enc, max_enc, base) = if dir.is_row() {
                (store.min_h(node), store.max_h(node), inner_h)
            } else {
                (store.min_w(node), store.max_w(node), inner_w)
            };
            cross = clamp_dim(cross, min_enc, max_enc, base);

            let cross_offset = match align {
                AlignItems::Start | AlignItems::Stretch | AlignItems::Baseline => 0.0,
                AlignItems::Center => {
                    (this_line_cross - cross - item.margin_cross_start - item.margin_cross_end)
                        .max(0.0)
                        / 2.0
                }
                AlignItems::End => {
                    (this_line_cross - cross - item.margin_cross_start - item.margin_cross_end)
                        .max(0.0)
                }
            };

            let main_pos = if dir.is_reverse() {
                main_size - main_cursor - item.margin_main_end - item.main
            } else {
                main_cursor + item.margin_main_start
            };
            let cross_pos = cross_cursor + cross_offset + item.margin_cross_start;

            let (x, y, w, h) = if dir.is_row() {
                (
                    content_main_start + main_pos,
                    content_cross_start + cross_pos,
                    item.main,
                    cross,
                )
            } else {
                (
                    content_cross_start + cross_pos,
                    content_main_start + main_pos,
                    cross,
                    item.main,
                )
            };
            ctx.pos_x[node] = x;
            ctx.pos_y[node] = y;
            ctx.size_w[node] = w;
            ctx.size_h[node] = h;

            // Text height is re-measured against the final inner width.
            if ComponentType::from(store.component_type(node)) == ComponentType::Text
                && TextWrap::from(store.text_wrap(node)) == TextWrap::Wrap
            {
                let text = store.text(node);
                if !text.is_empty() {
                    let height_auto =
                        Dimension::decode(store.height(node)) == Dimension::Auto;
                    if height_auto {
                        ctx.size_h[node] =
                            (wrapped_height(text, ctx.size_w[node].max(1.0) as usize) as f32)
                                .max(1.0);
                    }
                }
            }

            let outer_main_end =
                main_cursor + item.margin_main_start + item.main + item.margin_main_end;
            let outer_cross_end = cross_pos + if dir.is_row() {
                ctx.size_h[node]
            } else {
                ctx.size_w[node]
            } + item.margin_cross_end;
            extent_main = extent_main.max(outer_main_end);
            extent_cross = extent_cross.max(outer_cross_end);

            main_cursor = outer_main_end + main_gap + item_spacing;
        }

        cross_cursor += this_line_cross + line_gap + line_spacing;
    }

    // Content size and scroll clamps for the container.
    let (content_w, content_h) = if dir.is_row() {
        (extent_main, extent_cross)
    } else {
        (extent_cross, extent_main)
    };
    store.set_content_w(parent, content_w);
    store.set_content_h(parent, content_h);

    let max_x = (content_w - inner_w).max(0.0);
    let max_y = (content_h - inner_h).max(0.0);
    store.set_scroll_max_x(parent, max_x);
    store.set_scroll_max_y(parent, max_y);
    store.set_scroll_x(parent, sane(store.scroll_x(parent)).clamp(0.0, max_x));
    store.set_scroll_y(parent, sane(store.scroll_y(parent)).clamp(0.0, max_y));
    store.set_scrollable(parent, overflow.scrolls() as u8);
}

// =============================================================================
// Pass 5: absolute positioning
// =============================================================================

/// Place an absolute node inside its parent's padding box using the
/// inset fields. Unset insets fall back to the node's normal-flow slot.
fn layout_absolute(store: &Store, ctx: &mut LayoutContext, i: usize, term_w: f32, term_h: f32) {
    let parent = store.parent_index(i);
    let (pb_w, pb_h, origin_x, origin_y) = match parent {
        Some(p) => {
            let bord = border(store, p);
            (
                (ctx.size_w[p] - bord.horizontal()).max(0.0),
                (ctx.size_h[p] - bord.vertical()).max(0.0),
                bord.l,
                bord.t,
            )
        }
        None => (term_w, term_h, 0.0, 0.0),
    };

    let inset_t = store.inset_t(i);
    let inset_r = store.inset_r(i);
    let inset_b = store.inset_b(i);
    let inset_l = store.inset_l(i);
    let has = |v: f32| !v.is_nan();

    let mut w = resolve_dim(store.width(i), pb_w).unwrap_or(ctx.intrinsic_w[i]);
    if has(inset_l) && has(inset_r) && resolve_dim(store.width(i), pb_w).is_none() {
        w = (pb_w - sane(inset_l) - sane(inset_r)).max(0.0);
    }
    let mut h = resolve_dim(store.height(i), pb_h).unwrap_or(ctx.intrinsic_h[i]);
    if has(inset_t) && has(inset_b) && resolve_dim(store.height(i), pb_h).is_none() {
        h = (pb_h - sane(inset_t) - sane(inset_b)).max(0.0);
    }
    w = clamp_dim(w, store.min_w(i), store.max_w(i), pb_w);
    h = clamp_dim(h, store.min_h(i), store.max_h(i), pb_h);

    let x = if has(inset_l) {
        origin_x + sane(inset_l)
    } else if has(inset_r) {
        origin_x + pb_w - sane(inset_r) - w
    } else {
        ctx.pos_x[i]
    };
    let y = if has(inset_t) {
        origin_y + sane(inset_t)
    } else if has(inset_b) {
        origin_y + pb_h - sane(inset_b) - h
    } else {
        ctx.pos_y[i]
    };

    ctx.pos_x[i] = x;
    ctx.pos_y[i] = y;
    ctx.size_w[i] = w;
    ctx.size_h[i] = h;
}

// =============================================================================
// Output
// =============================================================================

/// Round to the cell grid and write back. Endpoint rounding keeps
/// `x + w` consistent, so rounding residue lands on the trailing edge.
fn write_outputs(store: &Store, ctx: &LayoutContext, count: usize) {
    for i in 0..count {
        if !ctx.live.get(i).copied().unwrap_or(false) {
            continue;
        }
        let x = ctx.pos_x[i];
        let y = ctx.pos_y[i];
        let rx = x.round();
        let ry = y.round();
        store.set_computed_x(i, rx);
        store.set_computed_y(i, ry);
        store.set_computed_w(i, ((x + ctx.size_w[i]).round() - rx).max(0.0));
        store.set_computed_h(i, ((y + ctx.size_h[i]).round() - ry).max(0.0));
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;

    fn test_store() -> Store {
        let store = Store::allocate(StoreConfig {
            capacity: 64,
            text_pool_size: 4096,
            ring_size: 8,
        })
        .unwrap();
        store.set_terminal_size(80, 24);
        store
    }

    fn add_box(store: &Store, parent: Option<usize>) -> usize {
        let i = store.reserve_node().unwrap();
        store.set_component_type(i, ComponentType::Box as u8);
        store.set_parent(i, parent).unwrap();
        i
    }

    fn add_text(store: &Store, parent: usize, content: &str) -> usize {
        let i = store.reserve_node().unwrap();
        store.set_component_type(i, ComponentType::Text as u8);
        store.set_parent(i, Some(parent)).unwrap();
        store.write_text(i, content).unwrap();
        i
    }

    fn run(store: &Store) -> LayoutContext {
        let mut ctx = LayoutContext::new();
        compute_layout(store, &mut ctx, true).unwrap();
        ctx
    }

    fn rect(store: &Store, i: usize) -> (f32, f32, f32, f32) {
        (
            store.computed_x(i),
            store.computed_y(i),
            store.computed_w(i),
            store.computed_h(i),
        )
    }

    #[test]
    fn root_fills_terminal_when_constrained() {
        let store = test_store();
        let root = add_box(&store, None);
        run(&store);
        assert_eq!(rect(&store, root), (0.0, 0.0, 80.0, 24.0));
    }

    #[test]
    fn space_between_row() {
        // Container 40 wide, three children of width 10: x = 0, 15, 30.
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_height(root, 3.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        store.set_justify_content(root, JustifyContent::SpaceBetween as u8);
        let kids: Vec<usize> = (0..3)
            .map(|_| {
                let c = add_box(&store, Some(root));
                store.set_width(c, 10.0);
                store.set_height(c, 1.0);
                c
            })
            .collect();
        run(&store);
        let xs: Vec<f32> = kids.iter().map(|&c| store.computed_x(c)).collect();
        assert_eq!(xs, vec![0.0, 15.0, 30.0]);
    }

    #[test]
    fn space_around_rounds_residue_to_last() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_height(root, 3.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        store.set_justify_content(root, JustifyContent::SpaceAround as u8);
        let kids: Vec<usize> = (0..3)
            .map(|_| {
                let c = add_box(&store, Some(root));
                store.set_width(c, 10.0);
                store.set_height(c, 1.0);
                c
            })
            .collect();
        run(&store);
        let xs: Vec<f32> = kids.iter().map(|&c| store.computed_x(c)).collect();
        assert_eq!(xs, vec![2.0, 15.0, 28.0]);
    }

    #[test]
    fn space_between_single_child_acts_like_start() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        store.set_justify_content(root, JustifyContent::SpaceBetween as u8);
        let c = add_box(&store, Some(root));
        store.set_width(c, 10.0);
        store.set_height(c, 1.0);
        run(&store);
        assert_eq!(store.computed_x(c), 0.0);
    }

    #[test]
    fn grow_distributes_free_space() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 30.0);
        store.set_height(root, 4.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        let a = add_box(&store, Some(root));
        store.set_flex_grow(a, 1.0);
        let b = add_box(&store, Some(root));
        store.set_flex_grow(b, 2.0);
        run(&store);
        assert_eq!(store.computed_w(a), 10.0);
        assert_eq!(store.computed_w(b), 20.0);
        assert_eq!(store.computed_x(b), 10.0);
    }

    #[test]
    fn shrink_when_overflowing() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 20.0);
        store.set_height(root, 4.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        let a = add_box(&store, Some(root));
        store.set_width(a, 20.0);
        let b = add_box(&store, Some(root));
        store.set_width(b, 20.0);
        run(&store);
        assert_eq!(store.computed_w(a), 10.0);
        assert_eq!(store.computed_w(b), 10.0);
    }

    #[test]
    fn column_stacks_children() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 20.0);
        store.set_height(root, 10.0);
        let a = add_box(&store, Some(root));
        store.set_height(a, 2.0);
        let b = add_box(&store, Some(root));
        store.set_height(b, 3.0);
        run(&store);
        assert_eq!(store.computed_y(a), 0.0);
        assert_eq!(store.computed_y(b), 2.0);
        // Stretch fills the cross axis by default.
        assert_eq!(store.computed_w(a), 20.0);
    }

    #[test]
    fn gap_separates_items() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_height(root, 3.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        store.set_gap(root, 2.0);
        let a = add_box(&store, Some(root));
        store.set_width(a, 5.0);
        let b = add_box(&store, Some(root));
        store.set_width(b, 5.0);
        run(&store);
        assert_eq!(store.computed_x(b), 7.0);
    }

    #[test]
    fn padding_and_border_shift_content() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 20.0);
        store.set_height(root, 10.0);
        store.set_padding_t(root, 1.0);
        store.set_padding_l(root, 2.0);
        store.set_border_t_width(root, 1);
        store.set_border_l_width(root, 1);
        let c = add_box(&store, Some(root));
        store.set_height(c, 1.0);
        run(&store);
        assert_eq!(store.computed_x(c), 3.0);
        assert_eq!(store.computed_y(c), 2.0);
    }

    #[test]
    fn percent_resolves_against_parent_inner() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_height(root, 10.0);
        let c = add_box(&store, Some(root));
        store.set_width(c, Dimension::Percent(50.0).encode());
        store.set_height(c, 2.0);
        run(&store);
        assert_eq!(store.computed_w(c), 20.0);
    }

    #[test]
    fn min_max_clamp_applies() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_height(root, 4.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        let c = add_box(&store, Some(root));
        store.set_flex_grow(c, 1.0);
        store.set_max_w(c, 15.0);
        run(&store);
        assert_eq!(store.computed_w(c), 15.0);
    }

    #[test]
    fn wrap_breaks_lines() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 20.0);
        store.set_height(root, 10.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        store.set_flex_wrap(root, FlexWrap::Wrap as u8);
        store.set_align_content(root, AlignContent::Start as u8);
        let kids: Vec<usize> = (0..3)
            .map(|_| {
                let c = add_box(&store, Some(root));
                store.set_width(c, 9.0);
                store.set_height(c, 2.0);
                store.set_align_self(c, AlignSelf::Start as u8);
                c
            })
            .collect();
        run(&store);
        // Two items fit per 20-wide line; the third wraps.
        assert_eq!(store.computed_y(kids[0]), 0.0);
        assert_eq!(store.computed_y(kids[1]), 0.0);
        assert_eq!(store.computed_y(kids[2]), 2.0);
        assert_eq!(store.computed_x(kids[2]), 0.0);
    }

    #[test]
    fn align_items_center_in_row() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 20.0);
        store.set_height(root, 10.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        store.set_align_items(root, AlignItems::Center as u8);
        let c = add_box(&store, Some(root));
        store.set_width(c, 4.0);
        store.set_height(c, 2.0);
        run(&store);
        assert_eq!(store.computed_y(c), 4.0);
    }

    #[test]
    fn absolute_uses_insets_against_parent_padding_box() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_height(root, 20.0);
        store.set_border_t_width(root, 1);
        store.set_border_l_width(root, 1);
        let c = add_box(&store, Some(root));
        store.set_position(c, Position::Absolute as u8);
        store.set_inset_t(c, 2.0);
        store.set_inset_l(c, 3.0);
        store.set_width(c, 5.0);
        store.set_height(c, 2.0);
        run(&store);
        assert_eq!(rect(&store, c), (4.0, 3.0, 5.0, 2.0));
    }

    #[test]
    fn absolute_stretches_between_insets() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_height(root, 20.0);
        let c = add_box(&store, Some(root));
        store.set_position(c, Position::Absolute as u8);
        store.set_inset_l(c, 5.0);
        store.set_inset_r(c, 5.0);
        store.set_height(c, 2.0);
        run(&store);
        assert_eq!(store.computed_x(c), 5.0);
        assert_eq!(store.computed_w(c), 30.0);
    }

    #[test]
    fn scroll_clamps_written() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_height(root, 10.0);
        store.set_overflow(root, Overflow::Scroll as u8);
        let c = add_box(&store, Some(root));
        store.set_height(c, 25.0);
        run(&store);
        assert_eq!(store.scroll_max_y(root), 15.0);
        assert_eq!(store.scroll_max_x(root), 0.0);
        assert_eq!(store.scrollable(root), 1);

        // Out-of-range scroll is clamped back on the next pass.
        store.set_scroll_y(root, 99.0);
        run(&store);
        assert_eq!(store.scroll_y(root), 15.0);
    }

    #[test]
    fn text_measures_and_rewraps() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 11.0);
        store.set_height(root, 10.0);
        let t = add_text(&store, root, "hello brave world");
        run(&store);
        // "hello brave" / "world" at width 11.
        assert_eq!(store.computed_h(t), 2.0);
    }

    #[test]
    fn invisible_subtree_skipped() {
        let store = test_store();
        let root = add_box(&store, None);
        let hidden = add_box(&store, Some(root));
        store.set_visible(hidden, false);
        let child = add_box(&store, Some(hidden));
        store.set_width(child, 10.0);
        run(&store);
        assert_eq!(store.computed_w(child), 0.0);
    }

    #[test]
    fn sibling_order_overrides_index_order() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 30.0);
        store.set_height(root, 3.0);
        store.set_flex_direction(root, FlexDirection::Row as u8);
        let a = add_box(&store, Some(root));
        store.set_width(a, 10.0);
        let b = add_box(&store, Some(root));
        store.set_width(b, 10.0);
        store.set_sibling_order(a, 1);
        store.set_sibling_order(b, 0);
        run(&store);
        assert_eq!(store.computed_x(b), 0.0);
        assert_eq!(store.computed_x(a), 10.0);
    }

    #[test]
    fn row_reverse_lays_out_from_the_end() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 40.0);
        store.set_height(root, 3.0);
        store.set_flex_direction(root, FlexDirection::RowReverse as u8);
        let a = add_box(&store, Some(root));
        store.set_width(a, 10.0);
        let b = add_box(&store, Some(root));
        store.set_width(b, 10.0);
        run(&store);
        assert_eq!(store.computed_x(a), 30.0);
        assert_eq!(store.computed_x(b), 20.0);
    }

    #[test]
    fn backward_parent_link_is_invalid_tree() {
        let store = test_store();
        let a = store.reserve_node().unwrap();
        let b = store.reserve_node().unwrap();
        store.set_component_type(a, ComponentType::Box as u8);
        store.set_component_type(b, ComponentType::Box as u8);
        store.set_parent_unchecked(a, b as i32);
        let mut ctx = LayoutContext::new();
        assert!(matches!(
            compute_layout(&store, &mut ctx, true),
            Err(Error::InvalidTree { node: 0 })
        ));
    }

    #[test]
    fn non_finite_inputs_clamped() {
        let store = test_store();
        let root = add_box(&store, None);
        store.set_width(root, 20.0);
        store.set_height(root, 10.0);
        store.set_padding_l(root, f32::INFINITY);
        let c = add_box(&store, Some(root));
        store.set_height(c, 1.0);
        run(&store);
        assert_eq!(store.computed_x(c), 0.0);
    }
}
