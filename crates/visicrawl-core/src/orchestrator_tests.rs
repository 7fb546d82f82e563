
    use super::*;
    use async_trait::async_trait;
    use visicrawl_protocols::{
        DetectionError, DeviceError, ForegroundApp, Generation, Gesture, GestureOutcome,
        ProviderError, ProviderSettings, Screenshot, TextDetection,
    };

    struct IdleDevice;

    #[async_trait]
    impl DeviceAdapter for IdleDevice {
        fn id(&self) -> &str {
            "idle"
        }

        async fn capture_screenshot(&self) -> Result<Screenshot, DeviceError> {
            Err(DeviceError::CommandFailed("no screen".into()))
        }

        async fn execute_gesture(&self, _gesture: &Gesture) -> Result<GestureOutcome, DeviceError> {
            Ok(GestureOutcome::stayed())
        }

        async fn foreground_app(&self) -> Result<Option<ForegroundApp>, DeviceError> {
            Ok(None)
        }

        async fn launch_app(&self, _app_id: &str) -> Result<(), DeviceError> {
            Ok(())
        }

        async fn reconnect(&self) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    struct SilentProvider;

    #[async_trait]
    impl DecisionProvider for SilentProvider {
        fn id(&self) -> &str {
            "silent"
        }

        async fn initialize(&self, _settings: &ProviderSettings) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn generate(&self, _prompt: &str, _image: &Screenshot) -> Result<Generation, ProviderError> {
            Ok(Generation::new("{}"))
        }
    }

    struct BlindDetector;

    #[async_trait]
    impl TextDetector for BlindDetector {
        async fn detect(&self, _image: &Screenshot) -> Result<Vec<TextDetection>, DetectionError> {
            Ok(Vec::new())
        }
    }

    fn running(max_steps: Option<u32>, max_duration_secs: Option<u64>) -> StepOrchestrator {
        let mut config = CrawlConfig::default();
        config.target.app_id = "com.example".into();
        config.budget.max_steps = max_steps;
        config.budget.max_duration_secs = max_duration_secs;

        let mut orchestrator = StepOrchestrator::builder(config)
            .device(Arc::new(IdleDevice))
            .provider(Arc::new(SilentProvider))
            .detector(Arc::new(BlindDetector))
            .build()
            .unwrap();
        orchestrator.clock = Some(PauseClock::start());
        assert!(orchestrator.set_state(CrawlState::Initializing));
        assert!(orchestrator.set_state(CrawlState::Running));
        orchestrator
    }

    #[tokio::test]
    async fn test_step_budget_is_exact() {
        let mut orchestrator = running(Some(3), None);
        orchestrator.step = 2;
        assert!(orchestrator.should_continue());
        orchestrator.step = 3;
        assert!(!orchestrator.should_continue());
        assert_eq!(orchestrator.completion_reason(), Some(CompletionReason::StepLimit));
    }

    #[tokio::test]
    async fn test_first_completion_reason_wins() {
        let mut orchestrator = running(Some(1), None);
        orchestrator.step = 1;
        assert!(!orchestrator.should_continue());

        orchestrator.control().stop();
        assert!(!orchestrator.should_continue());
        assert_eq!(orchestrator.completion_reason(), Some(CompletionReason::StepLimit));
    }

    #[tokio::test]
    async fn test_stop_checked_before_budgets() {
        let mut orchestrator = running(Some(1), None);
        orchestrator.step = 1;
        orchestrator.control().stop();
        assert!(!orchestrator.should_continue());
        assert_eq!(orchestrator.completion_reason(), Some(CompletionReason::UserStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_budget_uses_active_time() {
        let mut orchestrator = running(None, Some(10));

        if let Some(clock) = orchestrator.clock.as_mut() {
            clock.begin_pause();
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        if let Some(clock) = orchestrator.clock.as_mut() {
            clock.end_pause();
        }
        assert!(orchestrator.should_continue());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!orchestrator.should_continue());
        assert_eq!(orchestrator.completion_reason(), Some(CompletionReason::DurationLimit));
    }

    #[tokio::test]
    async fn test_step_mode_only_gates_step_boundaries() {
        let mut orchestrator = running(Some(5), None);
        orchestrator.control().set_step_mode(true);

        // Mid-step checkpoints pass straight through.
        assert!(orchestrator.checkpoint(false).await);
        assert_eq!(orchestrator.state(), CrawlState::Running);

        orchestrator.control().advance();
        assert!(orchestrator.checkpoint(true).await);
        assert_eq!(orchestrator.state(), CrawlState::Running);
    }

    #[tokio::test]
    async fn test_halt_moves_to_error() {
        let mut orchestrator = running(Some(5), None);
        orchestrator.halt(2, "device gone");
        assert_eq!(orchestrator.state(), CrawlState::Error);
        assert_eq!(orchestrator.session().state, CrawlState::Error);
        assert_eq!(
            orchestrator.completion_reason(),
            Some(CompletionReason::UnrecoverableError)
        );
        assert!(!orchestrator.should_continue());
    }

    #[test]
    fn test_builder_defaults() {
        let mut config = CrawlConfig::default();
        config.target.app_id = "com.example".into();
        config.budget.max_steps = Some(4);

        let orchestrator = StepOrchestrator::builder(config)
            .device(Arc::new(IdleDevice))
            .provider(Arc::new(SilentProvider))
            .detector(Arc::new(BlindDetector))
            .build()
            .unwrap();

        assert_eq!(orchestrator.state(), CrawlState::Uninitialized);
        assert_eq!(orchestrator.session().budget.max_steps, Some(4));
        assert_eq!(orchestrator.session().target_app, "com.example");
        assert!(orchestrator.history().is_empty());
        assert!(orchestrator.screen_graph().is_empty());
    }
