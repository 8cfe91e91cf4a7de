//! Layout computation: fixed split-screen tables for 1–4 windows.
//!
//! Everything here is pure and deterministic. Screen state is passed in, no
//! I/O is performed, and nothing is cached between calls.

pub mod plan;

pub use plan::{plan_retile, MutationRequest, RetileOutcome, RetilePlan, TileOptions};

use crate::error::{Result, TilerError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Максимальное число окон, для которого есть раскладка
pub const MAX_TILED: usize = 4;

/// Активный экран: размер в пикселях и смещение монитора в общем пространстве корня
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn with_origin(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

impl fmt::Display for ScreenGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Прямоугольник рамки окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Что делать, когда подходящих окон больше, чем слотов в раскладке
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Разложить первые четыре окна по сетке 2x2, остальные не трогать
    TileFirst,
    /// Не трогать ни одно окно
    Skip,
}

/// Как делить экран на двоих
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoPlayerSplit {
    /// Две колонки во всю высоту
    #[default]
    SideBySide,
    /// Одно окно над другим, оба во всю ширину
    Stacked,
}

/// Граница по одной оси в половинах экрана: 0, середина или край.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    Half,
    End,
}

impl Edge {
    /// Координата границы для стороны длиной `extent`.
    /// Середина округляется вниз, поэтому правая/нижняя половина получает лишний пиксель.
    pub fn resolve(self, extent: u32) -> u32 {
        match self {
            Edge::Start => 0,
            Edge::Half => extent / 2,
            Edge::End => extent,
        }
    }
}

/// Слот раскладки: [left, right) x [top, bottom)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub left: Edge,
    pub top: Edge,
    pub right: Edge,
    pub bottom: Edge,
}

impl Cell {
    const fn new(left: Edge, top: Edge, right: Edge, bottom: Edge) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn to_rect(&self, screen: ScreenGeometry) -> Rect {
        let x0 = self.left.resolve(screen.width);
        let x1 = self.right.resolve(screen.width);
        let y0 = self.top.resolve(screen.height);
        let y1 = self.bottom.resolve(screen.height);
        Rect::new(screen.x + x0 as i32, screen.y + y0 as i32, x1 - x0, y1 - y0)
    }
}

use Edge::{End, Half, Start};

const ONE: [Cell; 1] = [Cell::new(Start, Start, End, End)];

// Две колонки во всю высоту
const TWO: [Cell; 2] = [
    Cell::new(Start, Start, Half, End),
    Cell::new(Half, Start, End, End),
];

const TWO_STACKED: [Cell; 2] = [
    Cell::new(Start, Start, End, Half),
    Cell::new(Start, Half, End, End),
];

// Сверху во всю ширину, снизу две половины
const THREE: [Cell; 3] = [
    Cell::new(Start, Start, End, Half),
    Cell::new(Start, Half, Half, End),
    Cell::new(Half, Half, End, End),
];

const FOUR: [Cell; 4] = [
    Cell::new(Start, Start, Half, Half),
    Cell::new(Half, Start, End, Half),
    Cell::new(Start, Half, Half, End),
    Cell::new(Half, Half, End, End),
];

/// Таблица слотов для заданного числа окон.
/// `split` влияет только на раскладку для двух окон.
pub fn layout_cells(count: usize, split: TwoPlayerSplit) -> Result<&'static [Cell]> {
    match (count, split) {
        (1, _) => Ok(&ONE),
        (2, TwoPlayerSplit::SideBySide) => Ok(&TWO),
        (2, TwoPlayerSplit::Stacked) => Ok(&TWO_STACKED),
        (3, _) => Ok(&THREE),
        (4, _) => Ok(&FOUR),
        (n, _) => Err(TilerError::UnsupportedCount(n)),
    }
}

/// Прямоугольники для `count` окон на экране `width` x `height`, по одному на слот.
pub fn compute_layout(width: u32, height: u32, count: usize) -> Result<Vec<Rect>> {
    compute_layout_on(ScreenGeometry::new(width, height), count, TwoPlayerSplit::SideBySide)
}

/// То же, что `compute_layout`, но на экране со смещением и с выбором деления для двух окон
pub fn compute_layout_on(screen: ScreenGeometry, count: usize, split: TwoPlayerSplit) -> Result<Vec<Rect>> {
    Ok(layout_cells(count, split)?
        .iter()
        .map(|cell| cell.to_rect(screen))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(r: &Rect) -> u64 {
        r.width as u64 * r.height as u64
    }

    fn intersects(a: &Rect, b: &Rect) -> bool {
        let (ax1, ay1) = (a.x as i64 + a.width as i64, a.y as i64 + a.height as i64);
        let (bx1, by1) = (b.x as i64 + b.width as i64, b.y as i64 + b.height as i64);
        (a.x as i64) < bx1 && (b.x as i64) < ax1 && (a.y as i64) < by1 && (b.y as i64) < ay1
    }

    fn assert_tiles_screen(width: u32, height: u32, rects: &[Rect]) {
        let total: u64 = rects.iter().map(area).sum();
        assert_eq!(total, width as u64 * height as u64, "площадь не совпадает с экраном");

        for (i, a) in rects.iter().enumerate() {
            assert!(a.x >= 0 && a.y >= 0);
            assert!(a.x as u32 + a.width <= width);
            assert!(a.y as u32 + a.height <= height);
            for b in &rects[i + 1..] {
                assert!(!intersects(a, b), "{} пересекается с {}", a, b);
            }
        }
    }

    #[test]
    fn test_single_window_fills_screen() {
        let rects = compute_layout(1920, 1080, 1).unwrap();
        assert_eq!(rects, vec![Rect::new(0, 0, 1920, 1080)]);
    }

    #[test]
    fn test_two_windows_side_by_side() {
        let rects = compute_layout(1920, 1080, 2).unwrap();
        assert_eq!(
            rects,
            vec![Rect::new(0, 0, 960, 1080), Rect::new(960, 0, 960, 1080)]
        );
    }

    #[test]
    fn test_three_windows_top_and_two_bottom() {
        let rects = compute_layout(1920, 1080, 3).unwrap();
        assert_eq!(
            rects,
            vec![
                Rect::new(0, 0, 1920, 540),
                Rect::new(0, 540, 960, 540),
                Rect::new(960, 540, 960, 540),
            ]
        );
    }

    #[test]
    fn test_four_windows_quadrants() {
        let rects = compute_layout(2560, 1440, 4).unwrap();
        assert_eq!(
            rects,
            vec![
                Rect::new(0, 0, 1280, 720),
                Rect::new(1280, 0, 1280, 720),
                Rect::new(0, 720, 1280, 720),
                Rect::new(1280, 720, 1280, 720),
            ]
        );
    }

    #[test]
    fn test_layouts_tile_screen_exactly() {
        for &(w, h) in &[(1920, 1080), (1280, 800), (1921, 1081), (3, 3), (1, 1)] {
            for count in 1..=MAX_TILED {
                let rects = compute_layout(w, h, count).unwrap();
                assert_eq!(rects.len(), count);
                assert_tiles_screen(w, h, &rects);
            }
        }
    }

    #[test]
    fn test_odd_width_gives_extra_pixel_to_right_half() {
        let rects = compute_layout(1921, 1080, 2).unwrap();
        assert_eq!(rects[0], Rect::new(0, 0, 960, 1080));
        assert_eq!(rects[1], Rect::new(960, 0, 961, 1080));
    }

    #[test]
    fn test_two_windows_stacked() {
        let screen = ScreenGeometry::new(1920, 1080);
        let rects = compute_layout_on(screen, 2, TwoPlayerSplit::Stacked).unwrap();
        assert_eq!(
            rects,
            vec![Rect::new(0, 0, 1920, 540), Rect::new(0, 540, 1920, 540)]
        );

        let odd = compute_layout_on(ScreenGeometry::new(1280, 801), 2, TwoPlayerSplit::Stacked).unwrap();
        assert_tiles_screen(1280, 801, &odd);
        assert_eq!(odd[1], Rect::new(0, 400, 1280, 401));
    }

    #[test]
    fn test_split_only_changes_two_window_layout() {
        for count in [1, 3, 4] {
            let screen = ScreenGeometry::new(1920, 1080);
            assert_eq!(
                compute_layout_on(screen, count, TwoPlayerSplit::Stacked).unwrap(),
                compute_layout(1920, 1080, count).unwrap()
            );
        }
    }

    #[test]
    fn test_screen_origin_offsets_every_rect() {
        // Второй монитор справа от основного
        let screen = ScreenGeometry::new(1920, 1080).with_origin(2560, 0);
        let rects = compute_layout_on(screen, 4, TwoPlayerSplit::SideBySide).unwrap();
        assert_eq!(
            rects,
            vec![
                Rect::new(2560, 0, 960, 540),
                Rect::new(3520, 0, 960, 540),
                Rect::new(2560, 540, 960, 540),
                Rect::new(3520, 540, 960, 540),
            ]
        );
        assert_eq!(screen.to_string(), "1920x1080+2560+0");
    }

    #[test]
    fn test_unsupported_counts() {
        assert!(matches!(
            compute_layout(1920, 1080, 0),
            Err(TilerError::UnsupportedCount(0))
        ));
        assert!(matches!(
            compute_layout(1920, 1080, 5),
            Err(TilerError::UnsupportedCount(5))
        ));
        assert!(matches!(
            layout_cells(5, TwoPlayerSplit::Stacked),
            Err(TilerError::UnsupportedCount(5))
        ));
    }
}
