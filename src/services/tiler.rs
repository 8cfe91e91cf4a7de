use crate::config::Config;
use crate::error::Result;
use crate::events::WindowEvent;
use crate::layout::{plan_retile, RetileOutcome, RetilePlan};
use crate::services::host::WindowHost;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Tiler: перестраивает раскладку окон целевого класса на каждое событие окна.
///
/// Состояния между вызовами нет: экран и список окон читаются у хоста заново,
/// план строится чистой функцией `plan_retile` и целиком отдаётся хосту.
pub struct Tiler {
    config: Arc<Config>,
    host: Arc<dyn WindowHost>,
}

impl Tiler {
    pub fn new(config: Arc<Config>, host: Arc<dyn WindowHost>) -> Self {
        info!(
            "Инициализация Tiler (класс: '{}', хост: {})",
            config.target.class,
            host.name()
        );
        Self { config, host }
    }

    /// Прочитать состояние хоста, построить план и применить его
    pub async fn retile(&self) -> Result<RetilePlan> {
        let screen = self.host.screen_size().await?;
        let windows = self.host.list_windows().await?;

        let plan = plan_retile(
            &windows,
            screen,
            &self.config.target.class,
            self.config.layout.tile_options(),
        );

        match plan.outcome {
            RetileOutcome::Idle => {
                debug!("Окон класса '{}' нет, раскладка не меняется", self.config.target.class);
                return Ok(plan);
            }
            RetileOutcome::Tiled { count } => {
                info!("Раскладка {} окон на экране {}", count, screen);
            }
            RetileOutcome::Overflow { matched, tiled } => {
                warn!(
                    "Окон класса '{}' больше, чем слотов: {} (разложено {}, политика {:?})",
                    self.config.target.class, matched, tiled, self.config.layout.overflow
                );
            }
        }

        if plan.is_empty() {
            return Ok(plan);
        }

        for request in &plan.requests {
            debug!("Изменение окна: {}", request);
        }
        self.host.apply(&plan.requests).await?;

        Ok(plan)
    }

    /// Обработка события окна: любое добавление или удаление ведёт к полной перестройке
    pub async fn handle_window_event(&self, event: &WindowEvent) -> Result<RetilePlan> {
        debug!("Обработка события окна: {}", event);
        self.retile().await
    }

    /// Обрабатывать события по одному, пока канал не закроется.
    /// При `tiler.retile_on_start` сначала раскладывает уже открытые окна.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<WindowEvent>) -> Result<()> {
        if self.config.tiler.retile_on_start {
            if let Err(e) = self.retile().await {
                warn!("Начальная раскладка не удалась: {}", e);
            }
        }

        info!("Tiler запущен, ожидаем события окон");

        while let Some(event) = events.recv().await {
            // Ошибка хоста не останавливает цикл: следующее событие попробует снова
            if let Err(e) = self.handle_window_event(&event).await {
                error!("Не удалось перестроить раскладку после {}: {}", event, e);
            }
        }

        info!("Поток событий окон закрыт, Tiler останавливается");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TilerError;
    use crate::events::{WindowId, WindowInfo};
    use crate::layout::{MutationRequest, OverflowPolicy, Rect, ScreenGeometry, TwoPlayerSplit};
    use crate::services::host::DryRunHost;

    fn tiler_with(host: &Arc<DryRunHost>, config: Config) -> Tiler {
        Tiler::new(Arc::new(config), Arc::clone(host) as Arc<dyn WindowHost>)
    }

    fn geometries(batch: &[MutationRequest]) -> Vec<Rect> {
        batch.iter().map(|r| r.geometry).collect()
    }

    #[tokio::test]
    async fn test_no_matching_windows_issue_no_mutations() {
        let host = Arc::new(DryRunHost::new(ScreenGeometry::new(1920, 1080)));
        host.add_window("konsole", "shell");
        let tiler = tiler_with(&host, Config::default());

        let plan = tiler.retile().await.unwrap();
        assert_eq!(plan.outcome, RetileOutcome::Idle);
        assert!(host.applied().is_empty());
    }

    #[tokio::test]
    async fn test_retile_applies_layout_and_skips_other_classes() {
        let host = Arc::new(DryRunHost::new(ScreenGeometry::new(1920, 1080)));
        let p1 = host.add_window("gamescope", "Player 1");
        host.add_window("konsole", "shell");
        let p2 = host.add_window("gamescope", "Player 2");
        let p3 = host.add_window("gamescope", "Player 3");
        let tiler = tiler_with(&host, Config::default());

        tiler.retile().await.unwrap();

        let applied = host.applied();
        assert_eq!(applied.len(), 1);
        let ids: Vec<_> = applied[0].iter().map(|r| r.window).collect();
        assert_eq!(ids, vec![p1, p2, p3]);
        assert_eq!(
            geometries(&applied[0]),
            vec![
                Rect::new(0, 0, 1920, 540),
                Rect::new(0, 540, 960, 540),
                Rect::new(960, 540, 960, 540),
            ]
        );
        assert!(applied[0].iter().all(|r| r.no_border));
    }

    #[tokio::test]
    async fn test_repeated_retile_is_stable() {
        let host = Arc::new(DryRunHost::new(ScreenGeometry::new(2560, 1440)));
        for i in 0..4 {
            host.add_window("gamescope", &format!("Player {}", i + 1));
        }
        let tiler = tiler_with(&host, Config::default());

        tiler.retile().await.unwrap();
        tiler.retile().await.unwrap();

        let applied = host.applied();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0], applied[1]);
    }

    #[tokio::test]
    async fn test_overflow_skip_policy() {
        let host = Arc::new(DryRunHost::new(ScreenGeometry::new(1920, 1080)));
        for i in 0..5 {
            host.add_window("gamescope", &format!("Player {}", i + 1));
        }
        let mut config = Config::default();
        config.layout.overflow = OverflowPolicy::Skip;
        let tiler = tiler_with(&host, config);

        let plan = tiler.retile().await.unwrap();
        assert_eq!(plan.outcome, RetileOutcome::Overflow { matched: 5, tiled: 0 });
        assert!(host.applied().is_empty());
    }

    #[tokio::test]
    async fn test_every_event_triggers_one_retile() {
        let host = Arc::new(DryRunHost::new(ScreenGeometry::new(1920, 1080)));
        let events = host.subscribe().unwrap();
        let tiler = tiler_with(&host, Config::default());

        let p1 = host.add_window("gamescope", "Player 1");
        let p2 = host.add_window("gamescope", "Player 2");
        host.add_window("konsole", "shell");
        host.remove_window(p1);
        host.close_events();

        tiler.run(events).await.unwrap();

        let applied = host.applied();
        // Четыре события; каждое видит итоговый список окон и раскладывает p2 во весь экран
        assert_eq!(applied.len(), 4);
        for batch in &applied {
            assert_eq!(batch.len(), 1);
            assert_eq!(batch[0].window, p2);
            assert_eq!(batch[0].geometry, Rect::new(0, 0, 1920, 1080));
        }
    }

    #[tokio::test]
    async fn test_retile_on_start_tiles_before_first_event() {
        let host = Arc::new(DryRunHost::new(ScreenGeometry::new(1920, 1080)));
        let p1 = host.add_window("gamescope", "Player 1");
        let p2 = host.add_window("gamescope", "Player 2");
        let events = host.subscribe().unwrap();
        host.close_events();

        let mut config = Config::default();
        config.tiler.retile_on_start = true;
        tiler_with(&host, config).run(events).await.unwrap();

        let applied = host.applied();
        assert_eq!(applied.len(), 1);
        let ids: Vec<_> = applied[0].iter().map(|r| r.window).collect();
        assert_eq!(ids, vec![p1, p2]);
    }

    #[tokio::test]
    async fn test_no_initial_retile_by_default() {
        let host = Arc::new(DryRunHost::new(ScreenGeometry::new(1920, 1080)));
        host.add_window("gamescope", "Player 1");
        let events = host.subscribe().unwrap();
        host.close_events();

        tiler_with(&host, Config::default()).run(events).await.unwrap();
        assert!(host.applied().is_empty());
    }

    #[tokio::test]
    async fn test_host_shutdown_ends_run() {
        let host = Arc::new(DryRunHost::new(ScreenGeometry::new(1920, 1080)));
        let events = host.subscribe().unwrap();
        let tiler = Arc::new(tiler_with(&host, Config::default()));

        let handle = {
            let tiler = tiler.clone();
            tokio::spawn(async move { tiler.run(events).await })
        };

        host.add_window("gamescope", "Player 1");
        host.shutdown();

        let finished = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        assert!(matches!(finished, Ok(Ok(Ok(())))));
        assert_eq!(host.applied().len(), 1);
    }

    #[tokio::test]
    async fn test_stacked_two_player_config() {
        let host = Arc::new(DryRunHost::new(ScreenGeometry::new(1920, 1080)));
        host.add_window("gamescope", "Player 1");
        host.add_window("gamescope", "Player 2");
        let mut config = Config::default();
        config.layout.two_player = TwoPlayerSplit::Stacked;

        tiler_with(&host, config).retile().await.unwrap();
        assert_eq!(
            geometries(&host.applied()[0]),
            vec![Rect::new(0, 0, 1920, 540), Rect::new(0, 540, 1920, 540)]
        );
    }

    struct FailingHost;

    #[async_trait::async_trait]
    impl WindowHost for FailingHost {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn screen_size(&self) -> Result<ScreenGeometry> {
            TilerError::host_unavailable("screen query failed")
        }

        async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
            Ok(vec![WindowInfo::new(WindowId(1)).with_class("gamescope")])
        }

        async fn apply(&self, _requests: &[MutationRequest]) -> Result<()> {
            panic!("apply must not be reached");
        }

        fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<WindowEvent>> {
            let (_tx, rx) = mpsc::unbounded_channel();
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn test_host_errors_are_reported_and_loop_survives() {
        let tiler = Tiler::new(Arc::new(Config::default()), Arc::new(FailingHost));
        assert!(matches!(tiler.retile().await, Err(TilerError::HostUnavailable(_))));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(WindowEvent::added(WindowId(1))).unwrap();
        tx.send(WindowEvent::removed(WindowId(1))).unwrap();
        drop(tx);
        assert!(tiler.run(rx).await.is_ok());

        // Неудачная начальная раскладка тоже не останавливает цикл
        let mut config = Config::default();
        config.tiler.retile_on_start = true;
        let tiler = Tiler::new(Arc::new(config), Arc::new(FailingHost));
        let (tx, rx) = mpsc::unbounded_channel::<WindowEvent>();
        drop(tx);
        assert!(tiler.run(rx).await.is_ok());
    }
}
