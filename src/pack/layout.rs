//! Placement strategies for sprite sheets.
//!
//! Every strategy works on item footprints (image size plus padding) and
//! returns one offset per item in input order. Trailing padding is trimmed
//! from the final sheet size.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Packing strategy name, as accepted by `--algorithm` and `sprite.yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Stack vertically, shortest first
    TopDown,
    /// Line up horizontally, narrowest first
    LeftRight,
    /// Step down and to the right
    Diagonal,
    /// Step down and to the left
    AltDiagonal,
    /// Growing binary-tree bin packing, largest first
    #[default]
    BinaryTree,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::TopDown => "top-down",
            Algorithm::LeftRight => "left-right",
            Algorithm::Diagonal => "diagonal",
            Algorithm::AltDiagonal => "alt-diagonal",
            Algorithm::BinaryTree => "binary-tree",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of laying out a set of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Offset of each item, in input order.
    pub positions: Vec<(u32, u32)>,
    pub width: u32,
    pub height: u32,
}

/// Lay out items of the given `(width, height)` sizes.
pub fn layout(sizes: &[(u32, u32)], algorithm: Algorithm, padding: u32) -> Layout {
    if sizes.is_empty() {
        return Layout {
            positions: vec![],
            width: 0,
            height: 0,
        };
    }

    let footprints: Vec<(u32, u32)> = sizes
        .iter()
        .map(|&(w, h)| (w + padding, h + padding))
        .collect();
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    let mut positions = vec![(0u32, 0u32); sizes.len()];

    match algorithm {
        Algorithm::TopDown => {
            order.sort_by_key(|&i| footprints[i].1);
            let mut y = 0;
            for &i in &order {
                positions[i] = (0, y);
                y += footprints[i].1;
            }
        }
        Algorithm::LeftRight => {
            order.sort_by_key(|&i| footprints[i].0);
            let mut x = 0;
            for &i in &order {
                positions[i] = (x, 0);
                x += footprints[i].0;
            }
        }
        Algorithm::Diagonal => {
            order.sort_by_key(|&i| diagonal(footprints[i]));
            let (mut x, mut y) = (0, 0);
            for &i in &order {
                positions[i] = (x, y);
                x += footprints[i].0;
                y += footprints[i].1;
            }
        }
        Algorithm::AltDiagonal => {
            order.sort_by_key(|&i| diagonal(footprints[i]));
            let mut x: u32 = footprints.iter().map(|f| f.0).sum();
            let mut y = 0;
            for &i in &order {
                x -= footprints[i].0;
                positions[i] = (x, y);
                y += footprints[i].1;
            }
        }
        Algorithm::BinaryTree => {
            order.sort_by(|&a, &b| {
                let side = |i: usize| footprints[i].0.max(footprints[i].1);
                side(b).cmp(&side(a))
            });
            let first = footprints[order[0]];
            let mut packer = GrowingPacker::new(first.0, first.1);
            for &i in &order {
                positions[i] = packer.insert(footprints[i].0, footprints[i].1);
            }
        }
    }

    let width = positions
        .iter()
        .zip(&footprints)
        .map(|(p, f)| p.0 + f.0)
        .max()
        .unwrap_or(0)
        .saturating_sub(padding);
    let height = positions
        .iter()
        .zip(&footprints)
        .map(|(p, f)| p.1 + f.1)
        .max()
        .unwrap_or(0)
        .saturating_sub(padding);

    Layout {
        positions,
        width,
        height,
    }
}

fn diagonal((w, h): (u32, u32)) -> u64 {
    let (w, h) = (u64::from(w), u64::from(h));
    w * w + h * h
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    used: bool,
    right: Option<usize>,
    down: Option<usize>,
}

impl Slot {
    fn free(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            used: false,
            right: None,
            down: None,
        }
    }
}

/// Binary-tree packer whose root grows right or down when nothing fits.
struct GrowingPacker {
    slots: Vec<Slot>,
    root: usize,
}

impl GrowingPacker {
    fn new(w: u32, h: u32) -> Self {
        Self {
            slots: vec![Slot::free(0, 0, w, h)],
            root: 0,
        }
    }

    fn insert(&mut self, w: u32, h: u32) -> (u32, u32) {
        match self.find(self.root, w, h) {
            Some(slot) => self.split(slot, w, h),
            None => self.grow(w, h),
        }
    }

    fn push(&mut self, slot: Slot) -> usize {
        self.slots.push(slot);
        self.slots.len() - 1
    }

    fn find(&self, index: usize, w: u32, h: u32) -> Option<usize> {
        let slot = self.slots[index];
        if slot.used {
            slot.right
                .and_then(|r| self.find(r, w, h))
                .or_else(|| slot.down.and_then(|d| self.find(d, w, h)))
        } else if w <= slot.w && h <= slot.h {
            Some(index)
        } else {
            None
        }
    }

    fn split(&mut self, index: usize, w: u32, h: u32) -> (u32, u32) {
        let slot = self.slots[index];
        let down = self.push(Slot::free(slot.x, slot.y + h, slot.w, slot.h - h));
        let right = self.push(Slot::free(slot.x + w, slot.y, slot.w - w, h));
        let slot = &mut self.slots[index];
        slot.used = true;
        slot.down = Some(down);
        slot.right = Some(right);
        (slot.x, slot.y)
    }

    fn grow(&mut self, w: u32, h: u32) -> (u32, u32) {
        let root = self.slots[self.root];
        let can_grow_down = w <= root.w;
        let can_grow_right = h <= root.h;
        let should_grow_right = can_grow_right && root.h >= root.w + w;
        let should_grow_down = can_grow_down && root.w >= root.h + h;

        if should_grow_right || (!should_grow_down && can_grow_right) {
            self.grow_right(w, h)
        } else {
            self.grow_down(w, h)
        }
    }

    fn grow_right(&mut self, w: u32, h: u32) -> (u32, u32) {
        let old = self.slots[self.root];
        let extra = self.push(Slot::free(old.w, 0, w, old.h));
        let root = self.push(Slot {
            x: 0,
            y: 0,
            w: old.w + w,
            h: old.h,
            used: true,
            right: Some(extra),
            down: Some(self.root),
        });
        self.root = root;
        let target = self.find(root, w, h).unwrap_or(extra);
        self.split(target, w, h)
    }

    fn grow_down(&mut self, w: u32, h: u32) -> (u32, u32) {
        let old = self.slots[self.root];
        // wider than the sheet so far: widen the new strip
        let width = old.w.max(w);
        let extra = self.push(Slot::free(0, old.h, width, h));
        let root = self.push(Slot {
            x: 0,
            y: 0,
            w: width,
            h: old.h + h,
            used: true,
            right: Some(self.root),
            down: Some(extra),
        });
        self.root = root;
        let target = self.find(root, w, h).unwrap_or(extra);
        self.split(target, w, h)
    }
}
