//! Планирование перестройки раскладки: детерминированно, без I/O

use super::{compute_layout_on, OverflowPolicy, Rect, ScreenGeometry, TwoPlayerSplit, MAX_TILED};
use crate::events::{WindowId, WindowInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Запрос на изменение окна, который исполняет хост
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationRequest {
    pub window: WindowId,
    pub no_border: bool,
    pub geometry: Rect,
}

impl fmt::Display for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (no_border: {})", self.window, self.geometry, self.no_border)
    }
}

/// Параметры раскладки, которые не зависят от состояния хоста
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOptions {
    pub overflow: OverflowPolicy,
    pub two_player: TwoPlayerSplit,
    pub disable_borders: bool,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            overflow: OverflowPolicy::TileFirst,
            two_player: TwoPlayerSplit::SideBySide,
            disable_borders: true,
        }
    }
}

/// Итог планирования
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetileOutcome {
    /// Подходящих окон нет
    Idle,
    Tiled { count: usize },
    /// Окон больше, чем слотов: разложено `tiled` из `matched`
    Overflow { matched: usize, tiled: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetilePlan {
    pub requests: Vec<MutationRequest>,
    pub outcome: RetileOutcome,
}

impl RetilePlan {
    fn idle() -> Self {
        Self {
            requests: Vec::new(),
            outcome: RetileOutcome::Idle,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Строит список изменений для окон класса `target_class`.
///
/// Окна берутся в порядке списка хоста. Окна другого класса в план не попадают.
pub fn plan_retile(
    windows: &[WindowInfo],
    screen: ScreenGeometry,
    target_class: &str,
    options: TileOptions,
) -> RetilePlan {
    let matched: Vec<&WindowInfo> = windows
        .iter()
        .filter(|w| w.matches_class(target_class))
        .collect();

    let (tiled, outcome) = match matched.len() {
        0 => return RetilePlan::idle(),
        n if n <= MAX_TILED => (n, RetileOutcome::Tiled { count: n }),
        n => match options.overflow {
            OverflowPolicy::TileFirst => (
                MAX_TILED,
                RetileOutcome::Overflow {
                    matched: n,
                    tiled: MAX_TILED,
                },
            ),
            OverflowPolicy::Skip => {
                return RetilePlan {
                    requests: Vec::new(),
                    outcome: RetileOutcome::Overflow { matched: n, tiled: 0 },
                }
            }
        },
    };

    // tiled всегда в диапазоне 1..=MAX_TILED, таблица для него есть
    let slots = match compute_layout_on(screen, tiled, options.two_player) {
        Ok(slots) => slots,
        Err(_) => return RetilePlan::idle(),
    };

    let requests = matched
        .iter()
        .zip(slots)
        .map(|(window, geometry)| MutationRequest {
            window: window.id,
            no_border: options.disable_borders,
            geometry,
        })
        .collect();

    RetilePlan { requests, outcome }
}
